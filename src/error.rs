//! Error types shared by every stage of a processing session.

use std::fmt;

use serde::{Deserialize, Serialize};

pub type Result<T> = std::result::Result<T, Error>;

/// Why a candidate file was refused at intake
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RejectReason {
    /// Extension is not on the upload whitelist
    UnsupportedType,
    /// File exceeds the 100 MiB cap
    TooLarge,
    /// File metadata could not be read from disk
    Unreadable,
}

impl RejectReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UnsupportedType => "unsupported-type",
            Self::TooLarge => "too-large",
            Self::Unreadable => "unreadable",
        }
    }
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("{file} rejected: {reason}")]
    ValidationRejected { file: String, reason: RejectReason },

    #[error("a processing job is already running")]
    SubmissionConflict,

    #[error("no files are staged for processing")]
    NothingStaged,

    #[error("transport failure: {0}")]
    TransportFailure(String),

    #[error("{0}")]
    BackendError(String),

    #[error("no results available to download")]
    DownloadUnavailable,

    #[error("no staged file at index {index} ({len} staged)")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("cannot apply {command} while {state}")]
    InvalidTransition {
        command: &'static str,
        state: &'static str,
    },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether this error moves the active job into `Failed`.
    ///
    /// Every other kind is handled locally and leaves the session untouched.
    pub fn fails_job(&self) -> bool {
        matches!(self, Self::TransportFailure(_) | Self::BackendError(_))
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Self::TransportFailure(err.to_string())
    }
}
