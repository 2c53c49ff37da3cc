//! Progress pacing
//!
//! The service answers a submission with one long-lived request and reports
//! no incremental status. These pacing points keep the caller informed while
//! the request is open; they are not real backend progress.

use serde::Serialize;

/// A (percent, message) pair shown to the user
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProgressUpdate {
    pub percent: u8,
    pub message: String,
}

impl ProgressUpdate {
    pub fn new(percent: u8, message: impl Into<String>) -> Self {
        Self {
            percent,
            message: message.into(),
        }
    }

    /// Final update emitted when a job completes
    pub fn complete() -> Self {
        Self::new(100, "Processing complete")
    }
}

/// Callback receiving progress updates
pub type ProgressCallback = Box<dyn Fn(&ProgressUpdate) + Send + Sync>;

/// Pacing points emitted while a request is in flight (holds at the last one)
pub const PACING_SCHEDULE: &[(u8, &str)] = &[
    (10, "Uploading files..."),
    (30, "Extracting text..."),
    (55, "Detecting PII/PHI..."),
    (75, "Replacing identifiers..."),
    (90, "Preparing results..."),
];

/// Walks the pacing schedule once
#[derive(Debug, Default)]
pub struct ProgressPacer {
    next: usize,
}

impl ProgressPacer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_exhausted(&self) -> bool {
        self.next >= PACING_SCHEDULE.len()
    }
}

impl Iterator for ProgressPacer {
    type Item = ProgressUpdate;

    fn next(&mut self) -> Option<Self::Item> {
        let (percent, message) = PACING_SCHEDULE.get(self.next)?;
        self.next += 1;
        Some(ProgressUpdate::new(*percent, *message))
    }
}
