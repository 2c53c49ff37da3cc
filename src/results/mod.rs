//! Result types returned by a completed processing job

pub mod schema;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

pub use schema::{PreviewColumn, PreviewColumns, PreviewRow, ResultSchemaExtractor};

/// One output row: column name -> value, in the order the service sent them
pub type StructuredRow = Map<String, Value>;

/// Structured output of one completed job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultSet {
    pub files_processed: u64,
    pub pii_items_removed: u64,
    pub phi_items_detected: u64,
    #[serde(deserialize_with = "processing_time")]
    pub processing_time: String,
    #[serde(rename = "piiPhiData", default)]
    pub rows: Vec<StructuredRow>,

    /// Server-side session identifier
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,

    /// Per-file outcome report
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub processed_files: Vec<ProcessedFile>,

    /// Column categories declared by the service, when it sends them
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<Vec<DeclaredField>>,
}

impl ResultSet {
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Key count of the first row (0 when there are no rows)
    pub fn column_count(&self) -> usize {
        self.rows.first().map(|row| row.len()).unwrap_or(0)
    }

    /// Files the service reported as failed
    pub fn failed_files(&self) -> impl Iterator<Item = &ProcessedFile> {
        self.processed_files
            .iter()
            .filter(|f| f.status == FileStatus::Failed)
    }
}

/// Outcome for one uploaded file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessedFile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub filename: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pii_items: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phi_items: Option<u64>,
    pub status: FileStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileStatus {
    Completed,
    Failed,
    #[serde(other)]
    Unknown,
}

/// A column with an explicit category
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeclaredField {
    pub name: String,
    pub category: FieldCategory,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldCategory {
    Pii,
    Phi,
    #[serde(other)]
    Plain,
}

/// Accept `processingTime` as text or as a number of seconds
fn processing_time<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Seconds(f64),
    }

    Ok(match Raw::deserialize(deserializer)? {
        Raw::Text(text) => text,
        Raw::Seconds(secs) => format!("{}s", secs),
    })
}
