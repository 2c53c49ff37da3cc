//! Session context
//!
//! Holds the mutable state of one user session: the staged files, the current
//! (or last) job and the last result set. Built at session start and cleared on
//! reset or sign-out. Only the orchestrator writes to it.

use crate::intake::{FileIntake, StagedFile};
use crate::jobs::{JobState, ProcessingJob};
use crate::results::ResultSet;

#[derive(Debug, Default)]
pub struct SessionContext {
    intake: FileIntake,
    job: Option<ProcessingJob>,
    last_result: Option<ResultSet>,
    user_id: Option<String>,
}

impl SessionContext {
    pub fn new(user_id: Option<String>) -> Self {
        Self {
            user_id,
            ..Self::default()
        }
    }

    /// Current lifecycle state
    pub fn state(&self) -> JobState {
        match &self.job {
            Some(job) => job.state,
            None if self.intake.is_empty() => JobState::Idle,
            None => JobState::Staged,
        }
    }

    pub fn intake(&self) -> &FileIntake {
        &self.intake
    }

    pub(crate) fn intake_mut(&mut self) -> &mut FileIntake {
        &mut self.intake
    }

    pub fn staged_files(&self) -> &[StagedFile] {
        self.intake.files()
    }

    pub fn job(&self) -> Option<&ProcessingJob> {
        self.job.as_ref()
    }

    pub(crate) fn job_mut(&mut self) -> Option<&mut ProcessingJob> {
        self.job.as_mut()
    }

    /// Install a new job, discarding any previous job and result set
    pub(crate) fn start_job(&mut self, job: ProcessingJob) {
        self.last_result = None;
        self.job = Some(job);
    }

    pub fn last_result(&self) -> Option<&ResultSet> {
        self.last_result.as_ref()
    }

    pub(crate) fn store_result(&mut self, results: ResultSet) {
        self.last_result = Some(results);
    }

    pub fn user_id(&self) -> Option<&str> {
        self.user_id.as_deref()
    }

    /// Back to `Idle`: staged files, job and results are dropped
    pub(crate) fn reset(&mut self) {
        self.intake.clear_all();
        self.job = None;
        self.last_result = None;
    }

    /// Reset and forget the user scope
    pub(crate) fn sign_out(&mut self) {
        self.reset();
        self.user_id = None;
    }
}
