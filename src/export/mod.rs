//! Result export
//!
//! Sends the rows of a completed job to the service for spreadsheet rendering
//! and saves the returned payload to the export directory.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{Local, NaiveDate};
use serde::Serialize;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::results::StructuredRow;
use crate::service::DetectionService;

pub const EXPORT_FILE_PREFIX: &str = "PII_PHI_Results";
pub const EXPORT_FILE_EXTENSION: &str = "xlsx";

/// Numbered copies tried before an export gives up
const MAX_COPIES: u32 = 999;

/// `PII_PHI_Results_<YYYY-MM-DD>.xlsx`
pub fn export_filename(date: NaiveDate) -> String {
    format!(
        "{}_{}.{}",
        EXPORT_FILE_PREFIX,
        date.format("%Y-%m-%d"),
        EXPORT_FILE_EXTENSION
    )
}

/// `PII_PHI_Results_<YYYY-MM-DD> (<copy>).xlsx`; copy 0 is the plain name
pub fn numbered_export_filename(date: NaiveDate, copy: u32) -> String {
    if copy == 0 {
        return export_filename(date);
    }
    format!(
        "{}_{} ({}).{}",
        EXPORT_FILE_PREFIX,
        date.format("%Y-%m-%d"),
        copy,
        EXPORT_FILE_EXTENSION
    )
}

/// Create the first free export file for `date` in `dir`
async fn create_export_file(dir: &Path, date: NaiveDate) -> Result<(PathBuf, tokio::fs::File)> {
    for copy in 0..=MAX_COPIES {
        let path = dir.join(numbered_export_filename(date, copy));
        match tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
        {
            Ok(file) => return Ok((path, file)),
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                debug!(path = %path.display(), "Export name taken");
            }
            Err(e) => return Err(e.into()),
        }
    }
    Err(std::io::Error::new(
        std::io::ErrorKind::AlreadyExists,
        format!("{} numbered exports already exist in {}", MAX_COPIES, dir.display()),
    )
    .into())
}

/// What a successful export produced
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportReport {
    pub path: PathBuf,
    pub row_count: usize,
    /// Key count of the first row
    pub column_count: usize,
    pub bytes_written: u64,
}

pub struct ExportCoordinator<S: ?Sized> {
    service: Arc<S>,
    output_dir: PathBuf,
}

impl<S: DetectionService + ?Sized> ExportCoordinator<S> {
    pub fn new(service: Arc<S>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            service,
            output_dir: output_dir.into(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Request a spreadsheet for `rows` and save it locally.
    ///
    /// Missing or empty rows fail with `DownloadUnavailable` before any
    /// request is made. Service failures are returned as-is; nothing is
    /// retried. An existing export is never replaced: later exports on the
    /// same day get a numbered name.
    pub async fn prepare_export(&self, rows: Option<&[StructuredRow]>) -> Result<ExportReport> {
        let rows = match rows {
            Some(rows) if !rows.is_empty() => rows,
            _ => return Err(Error::DownloadUnavailable),
        };

        let payload = match self.service.download_results(rows).await {
            Ok(payload) => payload,
            Err(e) => {
                warn!(rows = rows.len(), error = %e, "Export failed");
                return Err(e);
            }
        };

        tokio::fs::create_dir_all(&self.output_dir).await?;
        let (path, mut file) =
            create_export_file(&self.output_dir, Local::now().date_naive()).await?;
        file.write_all(&payload).await?;
        file.flush().await?;

        let report = ExportReport {
            path,
            row_count: rows.len(),
            column_count: rows.first().map(|row| row.len()).unwrap_or(0),
            bytes_written: payload.len() as u64,
        };

        info!(
            path = %report.path.display(),
            rows = report.row_count,
            columns = report.column_count,
            bytes = report.bytes_written,
            "Exported results"
        );

        Ok(report)
    }
}
