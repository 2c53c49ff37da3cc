//! Processing Orchestrator
//!
//! Drives one session through the staging, submit, in-flight and terminal
//! states. State changes go through [`machine::apply`]; this type carries out
//! the resulting effects: it uploads staged files, paces progress updates
//! while the single long-lived request is open, and stores the result set.
//!
//! Everything runs on the caller's task. The session lock is only held while
//! a command is applied, never across an `.await`, so a second `submit` made
//! while a job is in flight sees the active state and is refused.

pub mod machine;
pub mod progress;

use std::future::Future;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::config::ServiceConfig;
use crate::error::{Error, Result};
use crate::intake::{self, CandidateFile, IntakeReport, StagedFile};
use crate::jobs::{JobState, ProcessingJob};
use crate::results::{PreviewColumns, ResultSchemaExtractor, ResultSet};
use crate::service::{DetectionService, ProcessRequest};
use crate::session::SessionContext;

pub use machine::{Command, Effect, JobFailure};
pub use progress::{ProgressCallback, ProgressPacer, ProgressUpdate, PACING_SCHEDULE};

/// Failure recorded when a `submit` future is dropped before its job ends
pub const PROCESSING_INTERRUPTED: &str = "Processing interrupted";

/// Fails the in-flight job if `submit` is dropped before a terminal command
struct InFlightJob<'a> {
    session: &'a Mutex<SessionContext>,
    job_id: Option<String>,
}

impl<'a> InFlightJob<'a> {
    fn new(session: &'a Mutex<SessionContext>, job_id: String) -> Self {
        Self {
            session,
            job_id: Some(job_id),
        }
    }

    /// The caller is about to dispatch the terminal command itself
    fn disarm(&mut self) {
        self.job_id = None;
    }
}

impl Drop for InFlightJob<'_> {
    fn drop(&mut self) {
        let Some(job_id) = self.job_id.take() else {
            return;
        };
        let mut session = self
            .session
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let command = Command::Failed {
            job_id: job_id.clone(),
            failure: JobFailure::Transport(PROCESSING_INTERRUPTED.to_string()),
        };
        match machine::apply(&mut session, command) {
            Ok(_) => warn!(job_id = %job_id, "Submission dropped before the job finished"),
            Err(e) => debug!(job_id = %job_id, error = %e, "Dropped job already settled"),
        }
    }
}

pub struct ProcessingOrchestrator<S: ?Sized> {
    session: Mutex<SessionContext>,
    service: Arc<S>,
    progress_interval: Duration,
    on_progress: Option<ProgressCallback>,
}

impl<S: DetectionService + ?Sized> ProcessingOrchestrator<S> {
    pub fn new(service: Arc<S>, config: &ServiceConfig) -> Self {
        Self {
            session: Mutex::new(SessionContext::new(config.user_id.clone())),
            service,
            progress_interval: config.progress_interval,
            on_progress: None,
        }
    }

    /// Receive every progress update, including the final 100%
    pub fn with_progress_callback(mut self, callback: ProgressCallback) -> Self {
        self.on_progress = Some(callback);
        self
    }

    fn lock(&self) -> MutexGuard<'_, SessionContext> {
        self.session.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Apply a command and carry out its immediate effects
    fn dispatch(&self, command: Command) -> Result<Vec<Effect>> {
        let effects = {
            let mut session = self.lock();
            machine::apply(&mut session, command)?
        };
        self.notify(&effects);
        Ok(effects)
    }

    fn notify(&self, effects: &[Effect]) {
        for effect in effects {
            match effect {
                Effect::EmitProgress(update) => {
                    debug!(percent = update.percent, message = %update.message, "Progress");
                    if let Some(callback) = &self.on_progress {
                        callback(update);
                    }
                }
                Effect::PublishResults { job_id } => debug!(job_id = %job_id, "Results published"),
                Effect::ClearPreview => debug!("Preview cleared"),
                Effect::Intake(_)
                | Effect::FileRemoved(_)
                | Effect::StagedCleared
                | Effect::SendProcessingRequest { .. }
                | Effect::ReportFailure { .. } => {}
            }
        }
    }

    // ---- intake ----

    pub fn add_files(&self, candidates: Vec<CandidateFile>) -> IntakeReport {
        match self.dispatch(Command::AddFiles(candidates)) {
            Ok(effects) => effects
                .into_iter()
                .find_map(|effect| match effect {
                    Effect::Intake(report) => Some(report),
                    _ => None,
                })
                .unwrap_or_default(),
            Err(e) => {
                warn!(error = %e, "Staging failed");
                IntakeReport::default()
            }
        }
    }

    /// Stage files from disk (metadata is read before the session is touched)
    pub async fn add_paths<P: AsRef<Path>>(&self, paths: &[P]) -> IntakeReport {
        let (candidates, unreadable) = intake::load_candidates(paths).await;
        let mut report = self.add_files(candidates);
        report.rejected.extend(unreadable);
        report
    }

    pub fn remove_file(&self, index: usize) -> Result<StagedFile> {
        self.dispatch(Command::RemoveFile(index))?
            .into_iter()
            .find_map(|effect| match effect {
                Effect::FileRemoved(file) => Some(file),
                _ => None,
            })
            .ok_or(Error::IndexOutOfRange { index, len: 0 })
    }

    pub fn clear_all(&self) {
        // Clearing the staged list is valid in every state
        let _ = self.dispatch(Command::ClearAll);
    }

    // ---- lifecycle ----

    /// Back to `Idle` from any state without an active job, discarding staged files
    pub fn reset(&self) -> Result<()> {
        self.dispatch(Command::Reset).map(|_| ())
    }

    /// Reset and drop the user scope
    pub fn sign_out(&self) -> Result<()> {
        self.dispatch(Command::SignOut).map(|_| ())
    }

    /// Submit the staged files and wait for the terminal response.
    ///
    /// Returns `SubmissionConflict` (no request issued, no state change) while
    /// another job is active. Transport and service failures move the job to
    /// `Failed`, keep the staged files and are returned as errors. Dropping the
    /// returned future before it resolves also fails the job, with
    /// [`PROCESSING_INTERRUPTED`].
    pub async fn submit(&self) -> Result<ResultSet> {
        let effects = self.dispatch(Command::Submit)?;
        let Some((job_id, files, user_id)) = effects.into_iter().find_map(|effect| match effect {
            Effect::SendProcessingRequest {
                job_id,
                files,
                user_id,
            } => Some((job_id, files, user_id)),
            _ => None,
        }) else {
            return Err(Error::InvalidTransition {
                command: "submit",
                state: self.state().as_str(),
            });
        };

        info!(job_id = %job_id, files = files.len(), "Submitting job");
        let mut in_flight = InFlightJob::new(&self.session, job_id.clone());

        let request = match ProcessRequest::load(&files, user_id).await {
            Ok(request) => request,
            Err(e) => {
                in_flight.disarm();
                return Err(self.fail(&job_id, JobFailure::from(e)));
            }
        };

        self.dispatch(Command::RequestAccepted {
            job_id: job_id.clone(),
        })?;

        let response = self
            .with_progress(&job_id, self.service.process_files(request))
            .await;

        let outcome = match response {
            Ok(response) => match (response.success, response.results) {
                (true, Some(results)) => Ok(results),
                (_, _) => Err(JobFailure::Backend {
                    detail: response.detail,
                }),
            },
            Err(e) => Err(JobFailure::from(e)),
        };

        in_flight.disarm();
        match outcome {
            Ok(results) => {
                let divergent = ResultSchemaExtractor::divergent_rows(&results);
                if !divergent.is_empty() {
                    warn!(
                        job_id = %job_id,
                        rows = ?divergent,
                        "Rows differ from the first row's columns; preview shows first-row columns only"
                    );
                }
                self.dispatch(Command::Succeeded {
                    job_id,
                    results: results.clone(),
                })?;
                Ok(results)
            }
            Err(failure) => Err(self.fail(&job_id, failure)),
        }
    }

    /// Move the job to `Failed` and return the matching error
    fn fail(&self, job_id: &str, failure: JobFailure) -> Error {
        if let Err(e) = self.dispatch(Command::Failed {
            job_id: job_id.to_string(),
            failure: failure.clone(),
        }) {
            warn!(job_id = %job_id, error = %e, "Could not record job failure");
        }
        failure.into_error()
    }

    /// Await `request`, emitting pacing points until it resolves
    async fn with_progress<F, T>(&self, job_id: &str, request: F) -> T
    where
        F: Future<Output = T>,
    {
        tokio::pin!(request);
        let mut pacer = ProgressPacer::new();
        let mut ticker = tokio::time::interval(self.progress_interval);

        loop {
            tokio::select! {
                biased;
                output = &mut request => return output,
                _ = ticker.tick(), if !pacer.is_exhausted() => {
                    if let Some(update) = pacer.next() {
                        let command = Command::Progress { job_id: job_id.to_string(), update };
                        if let Err(e) = self.dispatch(command) {
                            debug!(job_id = %job_id, error = %e, "Dropped progress update");
                        }
                    }
                }
            }
        }
    }

    // ---- queries ----

    pub fn state(&self) -> JobState {
        self.lock().state()
    }

    pub fn staged_files(&self) -> Vec<StagedFile> {
        self.lock().staged_files().to_vec()
    }

    pub fn job(&self) -> Option<ProcessingJob> {
        self.lock().job().cloned()
    }

    pub fn last_result(&self) -> Option<ResultSet> {
        self.lock().last_result().cloned()
    }

    /// Preview columns of the last result set, if any
    pub fn preview_columns(&self) -> Option<PreviewColumns> {
        self.lock()
            .last_result()
            .map(ResultSchemaExtractor::extract_columns)
    }

    pub fn service(&self) -> &Arc<S> {
        &self.service
    }
}
