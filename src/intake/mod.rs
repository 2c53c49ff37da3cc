//! File Intake
//!
//! Validates user-selected files against the upload policy and keeps the
//! ordered list of files staged for the next submission. Rejected files never
//! enter the list.

pub mod policy;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{Error, RejectReason, Result};

pub use policy::{ALLOWED_EXTENSIONS, MAX_FILE_SIZE};

/// Where a file's bytes live until they are uploaded
#[derive(Debug, Clone)]
pub enum FileContent {
    /// Opened and streamed from disk at submit time
    Path(PathBuf),
    /// Already in memory
    Memory(Arc<[u8]>),
}

/// A file offered for staging, not yet validated
#[derive(Debug, Clone)]
pub struct CandidateFile {
    pub name: String,
    pub byte_size: u64,
    pub content: FileContent,
}

impl CandidateFile {
    /// Candidate backed by in-memory bytes
    pub fn from_bytes(name: impl Into<String>, bytes: impl Into<Arc<[u8]>>) -> Self {
        let bytes = bytes.into();
        Self {
            name: name.into(),
            byte_size: bytes.len() as u64,
            content: FileContent::Memory(bytes),
        }
    }

    /// Candidate backed by a file on disk; only metadata is read here
    pub async fn from_path(path: &Path) -> Result<Self> {
        let metadata = tokio::fs::metadata(path).await?;
        if !metadata.is_file() {
            return Err(Error::ValidationRejected {
                file: path.display().to_string(),
                reason: RejectReason::Unreadable,
            });
        }
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.display().to_string());

        Ok(Self {
            name,
            byte_size: metadata.len(),
            content: FileContent::Path(path.to_path_buf()),
        })
    }
}

/// A validated file waiting for submission
#[derive(Debug, Clone)]
pub struct StagedFile {
    pub name: String,
    pub byte_size: u64,
    /// Lowercased, always on the whitelist
    pub extension: String,
    pub content: FileContent,
}

impl StagedFile {
    /// MIME type used for the multipart upload
    pub fn mime_type(&self) -> String {
        mime_guess::from_ext(&self.extension)
            .first_or_octet_stream()
            .to_string()
    }
}

/// A single refused candidate
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rejection {
    pub file: String,
    pub byte_size: Option<u64>,
    pub reason: RejectReason,
}

/// Outcome of one `add_files` call
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntakeReport {
    pub accepted: usize,
    pub rejected: Vec<Rejection>,
}

/// Build candidates from disk paths, reading metadata only.
///
/// Paths that cannot be read (missing, not a regular file) come back as
/// `unreadable` rejections.
pub async fn load_candidates<P: AsRef<Path>>(paths: &[P]) -> (Vec<CandidateFile>, Vec<Rejection>) {
    let mut candidates = Vec::with_capacity(paths.len());
    let mut unreadable = Vec::new();

    for path in paths {
        let path = path.as_ref();
        match CandidateFile::from_path(path).await {
            Ok(candidate) => candidates.push(candidate),
            Err(e) => {
                info!(path = %path.display(), error = %e, "Could not read candidate file");
                unreadable.push(Rejection {
                    file: path.display().to_string(),
                    byte_size: None,
                    reason: RejectReason::Unreadable,
                });
            }
        }
    }

    (candidates, unreadable)
}

/// Owner of the staged-file list
#[derive(Debug, Clone, Default)]
pub struct FileIntake {
    staged: Vec<StagedFile>,
}

impl FileIntake {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate and append candidates, keeping selection order.
    ///
    /// Duplicate names are allowed; each candidate is judged on its own.
    pub fn add_files<I>(&mut self, candidates: I) -> IntakeReport
    where
        I: IntoIterator<Item = CandidateFile>,
    {
        let mut report = IntakeReport::default();

        for candidate in candidates {
            match policy::check(&candidate.name, candidate.byte_size) {
                Ok(extension) => {
                    debug!(file = %candidate.name, size = candidate.byte_size, "Staged file");
                    self.staged.push(StagedFile {
                        name: candidate.name,
                        byte_size: candidate.byte_size,
                        extension,
                        content: candidate.content,
                    });
                    report.accepted += 1;
                }
                Err(reason) => {
                    info!(file = %candidate.name, size = candidate.byte_size, %reason, "Rejected file");
                    report.rejected.push(Rejection {
                        file: candidate.name,
                        byte_size: Some(candidate.byte_size),
                        reason,
                    });
                }
            }
        }

        report
    }

    /// Stage files from disk; paths whose metadata cannot be read are
    /// reported as `unreadable`.
    pub async fn add_paths<P: AsRef<Path>>(&mut self, paths: &[P]) -> IntakeReport {
        let (candidates, unreadable) = load_candidates(paths).await;
        let mut report = self.add_files(candidates);
        report.rejected.extend(unreadable);
        report
    }

    /// Remove the staged entry at `index`
    pub fn remove_file(&mut self, index: usize) -> Result<StagedFile> {
        if index >= self.staged.len() {
            return Err(Error::IndexOutOfRange {
                index,
                len: self.staged.len(),
            });
        }
        Ok(self.staged.remove(index))
    }

    pub fn clear_all(&mut self) {
        self.staged.clear();
    }

    pub fn files(&self) -> &[StagedFile] {
        &self.staged
    }

    pub fn len(&self) -> usize {
        self.staged.len()
    }

    pub fn is_empty(&self) -> bool {
        self.staged.is_empty()
    }

    pub fn total_bytes(&self) -> u64 {
        self.staged.iter().map(|f| f.byte_size).sum()
    }
}
