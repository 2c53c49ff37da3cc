//! Detection Service Interface
//!
//! The remote service detects and replaces PII/PHI and renders result
//! spreadsheets. This module defines the wire types and the trait the
//! orchestrator and export coordinator talk to; `http` holds the reqwest
//! implementation.

mod http;
pub mod http_client;

use std::path::Path;

use async_trait::async_trait;
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{Error, Result};
use crate::intake::{FileContent, StagedFile};
use crate::results::{ResultSet, StructuredRow};

pub use http::HttpDetectionService;

/// Fallback message when a processing failure carries no detail
pub const PROCESSING_FAILED: &str = "Processing failed";

/// Fallback message when an export failure carries no detail
pub const DOWNLOAD_FAILED: &str = "Download failed";

/// Fallback message when the history lookup carries no detail
pub const HISTORY_FAILED: &str = "Failed to load history";

/// Content of one upload part
#[derive(Debug)]
pub enum UploadBody {
    /// Staged from memory
    Bytes(Vec<u8>),
    /// Opened on disk and streamed into the request body
    File { file: tokio::fs::File, len: u64 },
}

impl UploadBody {
    /// Open a staged file so the upload reads it in chunks
    pub async fn open(path: &Path) -> std::io::Result<Self> {
        let file = tokio::fs::File::open(path).await?;
        let len = file.metadata().await?.len();
        Ok(Self::File { file, len })
    }

    pub fn len(&self) -> u64 {
        match self {
            Self::Bytes(bytes) => bytes.len() as u64,
            Self::File { len, .. } => *len,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// In-memory content, if the part is not streamed from disk
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::Bytes(bytes) => Some(bytes),
            Self::File { .. } => None,
        }
    }
}

/// One file part of a processing upload
#[derive(Debug)]
pub struct UploadFile {
    pub name: String,
    pub mime_type: String,
    pub body: UploadBody,
}

/// Multipart processing request
#[derive(Debug)]
pub struct ProcessRequest {
    pub files: Vec<UploadFile>,
    /// Optional user scope (`userId` form field)
    pub user_id: Option<String>,
}

impl ProcessRequest {
    /// Open every staged file for upload.
    ///
    /// Files staged from disk are not read here; only their handle and length
    /// are kept, so peak memory does not grow with the batch size.
    pub async fn load(files: &[StagedFile], user_id: Option<String>) -> Result<Self> {
        let mut uploads = Vec::with_capacity(files.len());
        for file in files {
            let body = match &file.content {
                FileContent::Memory(bytes) => UploadBody::Bytes(bytes.to_vec()),
                FileContent::Path(path) => UploadBody::open(path).await.map_err(|e| {
                    Error::TransportFailure(format!("Failed to read {}: {}", file.name, e))
                })?,
            };
            uploads.push(UploadFile {
                name: file.name.clone(),
                mime_type: file.mime_type(),
                body,
            });
        }
        Ok(Self {
            files: uploads,
            user_id,
        })
    }

    pub fn total_bytes(&self) -> u64 {
        self.files.iter().map(|f| f.body.len()).sum()
    }
}

/// Terminal response to a processing request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub results: Option<ResultSet>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl ProcessResponse {
    pub fn succeeded(results: ResultSet) -> Self {
        Self {
            success: true,
            results: Some(results),
            detail: None,
        }
    }

    pub fn failed(detail: Option<&str>) -> Self {
        Self {
            success: false,
            results: None,
            detail: detail.map(str::to_string),
        }
    }
}

/// JSON body of an export request
#[derive(Debug, Serialize)]
pub struct ExportRequest<'a> {
    #[serde(rename = "piiPhiData")]
    pub rows: &'a [StructuredRow],
}

/// Error body the service returns on failed requests
#[derive(Debug, Default, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub detail: Option<String>,
}

/// Service health report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceHealth {
    pub status: String,
    #[serde(default)]
    pub service: Option<String>,
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub pii_detection_available: Option<bool>,
}

impl ServiceHealth {
    pub fn is_healthy(&self) -> bool {
        self.status.eq_ignore_ascii_case("healthy")
    }
}

/// One past processing run recorded for a user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RedactionRecord {
    #[serde(deserialize_with = "text_or_number")]
    pub id: String,
    pub filename: String,
    #[serde(default)]
    pub processed_at: Option<String>,
    #[serde(default)]
    pub session_id: Option<String>,
}

/// Body of a history lookup
#[derive(Debug, Default, Deserialize)]
pub struct HistoryResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub history: Vec<RedactionRecord>,
    #[serde(default)]
    pub detail: Option<String>,
}

/// Record ids come back as text or as spreadsheet row numbers
fn text_or_number<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Number(serde_json::Number),
    }

    Ok(match Raw::deserialize(deserializer)? {
        Raw::Text(text) => text,
        Raw::Number(n) => n.to_string(),
    })
}

/// Remote PII/PHI detection service
#[async_trait]
pub trait DetectionService: Send + Sync {
    /// Upload files for processing; resolves once the service answers.
    ///
    /// A well-formed answer is returned as `Ok` even when `success` is false.
    async fn process_files(&self, request: ProcessRequest) -> Result<ProcessResponse>;

    /// Render rows into a spreadsheet and return its bytes
    async fn download_results(&self, rows: &[StructuredRow]) -> Result<Vec<u8>>;

    /// Past processing runs recorded for `user_id`, newest last
    async fn redactions_history(&self, user_id: &str) -> Result<Vec<RedactionRecord>>;

    async fn health(&self) -> Result<ServiceHealth>;
}
