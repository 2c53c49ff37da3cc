use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::intake::StagedFile;

/// Lifecycle state of the processing session
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    /// Nothing staged, no job
    Idle,
    /// Files staged, ready to submit
    Staged,
    /// Submission accepted locally, request being prepared
    Submitting,
    /// Request handed to the transport, waiting for the response
    InProgress,
    /// Job finished and results are available
    Completed,
    /// Job failed; staged files are kept for retry
    Failed,
}

impl JobState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Staged => "staged",
            Self::Submitting => "submitting",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    /// Whether a job occupies the single active slot
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Submitting | Self::InProgress)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One submit-to-terminal processing attempt
#[derive(Debug, Clone)]
pub struct ProcessingJob {
    /// Unique job identifier
    pub job_id: String,
    pub state: JobState,
    /// Snapshot of the staged list taken at submit time
    pub files: Vec<StagedFile>,
    pub progress_percent: u8,
    pub status_message: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    /// Error message if failed
    pub error: Option<String>,
}

impl ProcessingJob {
    /// Create a job in `Submitting` for a copy of the staged files
    pub fn new(files: Vec<StagedFile>) -> Self {
        Self {
            job_id: format!("job-{}", uuid::Uuid::new_v4()),
            state: JobState::Submitting,
            files,
            progress_percent: 0,
            status_message: "Submitting files...".to_string(),
            started_at: Utc::now(),
            finished_at: None,
            error: None,
        }
    }

    pub fn mark_in_progress(&mut self) {
        self.state = JobState::InProgress;
    }

    /// Record a pacing point; returns false when it would move progress backwards
    pub fn record_progress(&mut self, percent: u8, message: &str) -> bool {
        let percent = percent.min(100);
        if percent < self.progress_percent {
            return false;
        }
        self.progress_percent = percent;
        self.status_message = message.to_string();
        true
    }

    /// Mark job as completed
    pub fn mark_completed(&mut self) {
        self.state = JobState::Completed;
        self.finished_at = Some(Utc::now());
    }

    /// Mark job as failed
    pub fn mark_failed(&mut self, error: &str) {
        self.state = JobState::Failed;
        self.error = Some(error.to_string());
        self.status_message = error.to_string();
        self.finished_at = Some(Utc::now());
    }

    /// Wall-clock time from submit to terminal state
    pub fn elapsed(&self) -> Option<chrono::Duration> {
        self.finished_at.map(|end| end - self.started_at)
    }
}
