//! Preview column extraction
//!
//! Splits a result set's columns into PII and PHI groups for display. When the
//! service declares a schema it is used directly; otherwise the first row's
//! key prefixes (`PII_`, `PHI_`) decide. Rows that differ from the first row
//! are not reflected in the preview but are still exported in full.

use std::collections::BTreeSet;

use serde::Serialize;
use serde_json::Value;

use super::{FieldCategory, ResultSet, StructuredRow};

const PII_PREFIX: &str = "PII_";
const PHI_PREFIX: &str = "PHI_";

/// A previewed column: the row key it reads and its display label
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PreviewColumn {
    pub key: String,
    pub label: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PreviewColumns {
    pub pii: Vec<PreviewColumn>,
    pub phi: Vec<PreviewColumn>,
}

impl PreviewColumns {
    pub fn pii_labels(&self) -> Vec<&str> {
        self.pii.iter().map(|c| c.label.as_str()).collect()
    }

    pub fn phi_labels(&self) -> Vec<&str> {
        self.phi.iter().map(|c| c.label.as_str()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.pii.is_empty() && self.phi.is_empty()
    }
}

/// Display values of one row, aligned with `PreviewColumns`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PreviewRow {
    pub pii: Vec<String>,
    pub phi: Vec<String>,
}

pub struct ResultSchemaExtractor;

impl ResultSchemaExtractor {
    /// Derive the PII/PHI preview columns of a result set
    pub fn extract_columns(results: &ResultSet) -> PreviewColumns {
        let Some(first) = results.rows.first() else {
            return PreviewColumns::default();
        };

        match &results.schema {
            Some(declared) => {
                let mut columns = PreviewColumns::default();
                for field in declared {
                    let column = PreviewColumn {
                        key: field.name.clone(),
                        label: display_label(strip_category_prefix(&field.name)),
                    };
                    match field.category {
                        FieldCategory::Pii => columns.pii.push(column),
                        FieldCategory::Phi => columns.phi.push(column),
                        FieldCategory::Plain => {}
                    }
                }
                columns
            }
            None => Self::columns_from_row(first),
        }
    }

    /// Prefix-based grouping of a single row's keys
    pub fn columns_from_row(row: &StructuredRow) -> PreviewColumns {
        let mut columns = PreviewColumns::default();
        for key in row.keys() {
            if let Some(name) = key.strip_prefix(PII_PREFIX) {
                columns.pii.push(PreviewColumn {
                    key: key.clone(),
                    label: display_label(name),
                });
            } else if let Some(name) = key.strip_prefix(PHI_PREFIX) {
                columns.phi.push(PreviewColumn {
                    key: key.clone(),
                    label: display_label(name),
                });
            }
        }
        columns
    }

    /// Indices of rows whose key set differs from the first row's
    pub fn divergent_rows(results: &ResultSet) -> Vec<usize> {
        let Some(first) = results.rows.first() else {
            return Vec::new();
        };
        let reference: BTreeSet<&String> = first.keys().collect();

        results
            .rows
            .iter()
            .enumerate()
            .skip(1)
            .filter(|(_, row)| row.keys().collect::<BTreeSet<_>>() != reference)
            .map(|(idx, _)| idx)
            .collect()
    }

    /// Project every row onto the preview columns; missing cells are empty
    pub fn preview_rows(results: &ResultSet, columns: &PreviewColumns) -> Vec<PreviewRow> {
        results
            .rows
            .iter()
            .map(|row| PreviewRow {
                pii: columns.pii.iter().map(|c| cell_text(row.get(&c.key))).collect(),
                phi: columns.phi.iter().map(|c| cell_text(row.get(&c.key))).collect(),
            })
            .collect()
    }
}

fn strip_category_prefix(name: &str) -> &str {
    name.strip_prefix(PII_PREFIX)
        .or_else(|| name.strip_prefix(PHI_PREFIX))
        .unwrap_or(name)
}

fn display_label(name: &str) -> String {
    name.replace('_', " ")
}

fn cell_text(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}
