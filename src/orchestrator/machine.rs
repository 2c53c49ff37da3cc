//! Processing state machine
//!
//! Every user action and every transport outcome is a [`Command`]. Applying a
//! command to the [`SessionContext`] either fails without touching the session
//! or mutates it and returns the [`Effect`]s the caller must carry out. No I/O
//! happens here.

use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::intake::{CandidateFile, IntakeReport, StagedFile};
use crate::jobs::{JobState, ProcessingJob};
use crate::results::ResultSet;
use crate::service::PROCESSING_FAILED;
use crate::session::SessionContext;

use super::progress::ProgressUpdate;

/// Why a job ended in `Failed`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobFailure {
    /// Network or local I/O failure before a response arrived
    Transport(String),
    /// The service answered without success
    Backend { detail: Option<String> },
}

impl JobFailure {
    /// Message shown to the user; falls back when the service gave no detail
    pub fn message(&self) -> String {
        match self {
            Self::Transport(msg) => msg.clone(),
            Self::Backend { detail: Some(detail) } if !detail.trim().is_empty() => detail.clone(),
            Self::Backend { .. } => PROCESSING_FAILED.to_string(),
        }
    }

    pub fn into_error(self) -> Error {
        match self {
            Self::Transport(msg) => Error::TransportFailure(msg),
            backend => Error::BackendError(backend.message()),
        }
    }
}

impl From<Error> for JobFailure {
    fn from(err: Error) -> Self {
        match err {
            Error::TransportFailure(msg) => Self::Transport(msg),
            Error::BackendError(msg) => Self::Backend { detail: Some(msg) },
            other => Self::Transport(other.to_string()),
        }
    }
}

#[derive(Debug, Clone)]
pub enum Command {
    AddFiles(Vec<CandidateFile>),
    RemoveFile(usize),
    ClearAll,
    Submit,
    RequestAccepted { job_id: String },
    Progress { job_id: String, update: ProgressUpdate },
    Succeeded { job_id: String, results: ResultSet },
    Failed { job_id: String, failure: JobFailure },
    Reset,
    SignOut,
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Self::AddFiles(_) => "add_files",
            Self::RemoveFile(_) => "remove_file",
            Self::ClearAll => "clear_all",
            Self::Submit => "submit",
            Self::RequestAccepted { .. } => "request_accepted",
            Self::Progress { .. } => "progress",
            Self::Succeeded { .. } => "succeeded",
            Self::Failed { .. } => "failed",
            Self::Reset => "reset",
            Self::SignOut => "sign_out",
        }
    }
}

#[derive(Debug, Clone)]
pub enum Effect {
    /// Outcome of staging candidates
    Intake(IntakeReport),
    FileRemoved(StagedFile),
    StagedCleared,
    /// Upload this snapshot of the staged files
    SendProcessingRequest {
        job_id: String,
        files: Vec<StagedFile>,
        user_id: Option<String>,
    },
    EmitProgress(ProgressUpdate),
    /// A result set is stored and ready for preview/export
    PublishResults { job_id: String },
    ReportFailure { job_id: String, message: String },
    /// Any previously shown results are gone
    ClearPreview,
}

/// Apply one command to the session
pub fn apply(session: &mut SessionContext, command: Command) -> Result<Vec<Effect>> {
    let name = command.name();

    match command {
        Command::AddFiles(candidates) => {
            let report = session.intake_mut().add_files(candidates);
            Ok(vec![Effect::Intake(report)])
        }

        Command::RemoveFile(index) => {
            let removed = session.intake_mut().remove_file(index)?;
            Ok(vec![Effect::FileRemoved(removed)])
        }

        Command::ClearAll => {
            session.intake_mut().clear_all();
            Ok(vec![Effect::StagedCleared])
        }

        Command::Submit => {
            let state = session.state();
            if state.is_active() {
                warn!(%state, "Rejected submit while a job is running");
                return Err(Error::SubmissionConflict);
            }
            if session.intake().is_empty() {
                return Err(Error::NothingStaged);
            }

            let had_results = session.last_result().is_some();
            let files = session.staged_files().to_vec();
            let job = ProcessingJob::new(files.clone());
            let job_id = job.job_id.clone();
            session.start_job(job);

            info!(job_id = %job_id, files = files.len(), "Job submitting");

            let mut effects = Vec::with_capacity(2);
            if had_results {
                effects.push(Effect::ClearPreview);
            }
            effects.push(Effect::SendProcessingRequest {
                job_id,
                files,
                user_id: session.user_id().map(str::to_string),
            });
            Ok(effects)
        }

        Command::RequestAccepted { job_id } => {
            let job = current_job(session, &job_id, name, &[JobState::Submitting])?;
            job.mark_in_progress();
            debug!(job_id = %job_id, "Job in progress");
            Ok(Vec::new())
        }

        Command::Progress { job_id, update } => {
            let job = current_job(session, &job_id, name, &[JobState::InProgress])?;
            if job.record_progress(update.percent, &update.message) {
                Ok(vec![Effect::EmitProgress(update)])
            } else {
                Ok(Vec::new())
            }
        }

        Command::Succeeded { job_id, results } => {
            let job = current_job(session, &job_id, name, &[JobState::InProgress])?;
            let done = ProgressUpdate::complete();
            job.record_progress(done.percent, &done.message);
            job.mark_completed();

            info!(
                job_id = %job_id,
                files = results.files_processed,
                rows = results.row_count(),
                pii = results.pii_items_removed,
                phi = results.phi_items_detected,
                "Job completed"
            );

            session.intake_mut().clear_all();
            session.store_result(results);
            Ok(vec![Effect::EmitProgress(done), Effect::PublishResults { job_id }])
        }

        Command::Failed { job_id, failure } => {
            let job = current_job(
                session,
                &job_id,
                name,
                &[JobState::Submitting, JobState::InProgress],
            )?;
            let message = failure.message();
            job.mark_failed(&message);
            warn!(job_id = %job_id, error = %message, "Job failed");
            Ok(vec![Effect::ReportFailure { job_id, message }])
        }

        Command::Reset => reset(session, name, SessionContext::reset),

        Command::SignOut => reset(session, name, SessionContext::sign_out),
    }
}

/// Return to `Idle` from any state without an active job.
///
/// `Idle` and `Staged` are accepted too: a reset there discards the staged
/// list, the same as [`Command::ClearAll`]. An active job cannot be aborted.
fn reset(
    session: &mut SessionContext,
    command: &'static str,
    clear: fn(&mut SessionContext),
) -> Result<Vec<Effect>> {
    let state = session.state();
    if state.is_active() {
        return Err(Error::InvalidTransition {
            command,
            state: state.as_str(),
        });
    }
    clear(session);
    debug!(from = %state, command, "Session reset");
    Ok(vec![Effect::ClearPreview])
}

/// The session's job, if it is `job_id` and in one of `allowed` states
fn current_job<'a>(
    session: &'a mut SessionContext,
    job_id: &str,
    command: &'static str,
    allowed: &[JobState],
) -> Result<&'a mut ProcessingJob> {
    let state = session.state();
    match session.job_mut() {
        Some(job) if job.job_id == job_id && allowed.contains(&job.state) => Ok(job),
        _ => Err(Error::InvalidTransition {
            command,
            state: state.as_str(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn pdf(name: &str) -> CandidateFile {
        CandidateFile::from_bytes(name, vec![0u8; 2048])
    }

    fn results() -> ResultSet {
        serde_json::from_value(json!({
            "filesProcessed": 1,
            "piiItemsRemoved": 3,
            "phiItemsDetected": 2,
            "processingTime": "1.2s",
            "piiPhiData": [{"PII_Name": "Jane Doe", "PHI_Diagnosis": "Flu"}]
        }))
        .unwrap()
    }

    fn staged_session() -> SessionContext {
        let mut session = SessionContext::new(Some("user-7".into()));
        apply(&mut session, Command::AddFiles(vec![pdf("record.pdf")])).unwrap();
        session
    }

    fn submit(session: &mut SessionContext) -> String {
        let effects = apply(session, Command::Submit).unwrap();
        effects
            .into_iter()
            .find_map(|e| match e {
                Effect::SendProcessingRequest { job_id, .. } => Some(job_id),
                _ => None,
            })
            .unwrap()
    }

    #[test]
    fn test_submit_snapshots_staged_files() {
        let mut session = staged_session();
        assert_eq!(session.state(), JobState::Staged);

        let effects = apply(&mut session, Command::Submit).unwrap();
        assert_eq!(session.state(), JobState::Submitting);
        match &effects[..] {
            [Effect::SendProcessingRequest { files, user_id, .. }] => {
                assert_eq!(files.len(), 1);
                assert_eq!(files[0].name, "record.pdf");
                assert_eq!(user_id.as_deref(), Some("user-7"));
            }
            other => panic!("unexpected effects: {:?}", other),
        }
        // copy, not move
        assert_eq!(session.staged_files().len(), 1);
    }

    #[test]
    fn test_submit_with_nothing_staged() {
        let mut session = SessionContext::default();
        assert!(matches!(
            apply(&mut session, Command::Submit),
            Err(Error::NothingStaged)
        ));
        assert_eq!(session.state(), JobState::Idle);
    }

    #[test]
    fn test_submit_while_active_is_a_conflict() {
        let mut session = staged_session();
        let job_id = submit(&mut session);

        assert!(matches!(
            apply(&mut session, Command::Submit),
            Err(Error::SubmissionConflict)
        ));
        assert_eq!(session.state(), JobState::Submitting);

        apply(&mut session, Command::RequestAccepted { job_id: job_id.clone() }).unwrap();
        assert!(matches!(
            apply(&mut session, Command::Submit),
            Err(Error::SubmissionConflict)
        ));
        assert_eq!(session.state(), JobState::InProgress);
        assert_eq!(session.job().unwrap().job_id, job_id);
    }

    #[test]
    fn test_success_clears_staged_and_stores_results() {
        let mut session = staged_session();
        let job_id = submit(&mut session);
        apply(&mut session, Command::RequestAccepted { job_id: job_id.clone() }).unwrap();

        let effects = apply(
            &mut session,
            Command::Succeeded { job_id: job_id.clone(), results: results() },
        )
        .unwrap();

        assert_eq!(session.state(), JobState::Completed);
        assert!(session.staged_files().is_empty());
        assert_eq!(session.last_result().unwrap().row_count(), 1);
        assert!(matches!(
            &effects[0],
            Effect::EmitProgress(update) if update.percent == 100
        ));
        assert_eq!(session.job().unwrap().progress_percent, 100);
    }

    #[test]
    fn test_failure_keeps_staged_files() {
        let mut session = staged_session();
        let job_id = submit(&mut session);
        apply(&mut session, Command::RequestAccepted { job_id: job_id.clone() }).unwrap();

        let effects = apply(
            &mut session,
            Command::Failed {
                job_id,
                failure: JobFailure::Backend { detail: Some("service unavailable".into()) },
            },
        )
        .unwrap();

        assert_eq!(session.state(), JobState::Failed);
        assert_eq!(session.staged_files().len(), 1);
        assert!(matches!(
            &effects[..],
            [Effect::ReportFailure { message, .. }] if message == "service unavailable"
        ));
    }

    #[test]
    fn test_failure_without_detail_uses_fallback() {
        let failure = JobFailure::Backend { detail: None };
        assert_eq!(failure.message(), PROCESSING_FAILED);
        assert!(matches!(failure.into_error(), Error::BackendError(m) if m == PROCESSING_FAILED));
    }

    #[test]
    fn test_failure_from_submitting() {
        let mut session = staged_session();
        let job_id = submit(&mut session);
        apply(
            &mut session,
            Command::Failed { job_id, failure: JobFailure::Transport("unreadable".into()) },
        )
        .unwrap();
        assert_eq!(session.state(), JobState::Failed);
    }

    #[test]
    fn test_second_terminal_transition_is_rejected() {
        let mut session = staged_session();
        let job_id = submit(&mut session);
        apply(&mut session, Command::RequestAccepted { job_id: job_id.clone() }).unwrap();
        apply(
            &mut session,
            Command::Succeeded { job_id: job_id.clone(), results: results() },
        )
        .unwrap();

        let late = apply(
            &mut session,
            Command::Failed { job_id, failure: JobFailure::Transport("late".into()) },
        );
        assert!(matches!(late, Err(Error::InvalidTransition { .. })));
        assert_eq!(session.state(), JobState::Completed);
    }

    #[test]
    fn test_commands_for_other_jobs_are_rejected() {
        let mut session = staged_session();
        submit(&mut session);
        let stale = apply(
            &mut session,
            Command::RequestAccepted { job_id: "job-stale".into() },
        );
        assert!(matches!(stale, Err(Error::InvalidTransition { .. })));
        assert_eq!(session.state(), JobState::Submitting);
    }

    #[test]
    fn test_progress_is_monotonic() {
        let mut session = staged_session();
        let job_id = submit(&mut session);
        apply(&mut session, Command::RequestAccepted { job_id: job_id.clone() }).unwrap();

        let up = apply(
            &mut session,
            Command::Progress { job_id: job_id.clone(), update: ProgressUpdate::new(55, "a") },
        )
        .unwrap();
        assert_eq!(up.len(), 1);

        let down = apply(
            &mut session,
            Command::Progress { job_id, update: ProgressUpdate::new(10, "b") },
        )
        .unwrap();
        assert!(down.is_empty());
        assert_eq!(session.job().unwrap().progress_percent, 55);
    }

    #[test]
    fn test_reset_from_terminal_states() {
        let mut session = staged_session();
        let job_id = submit(&mut session);
        apply(&mut session, Command::RequestAccepted { job_id: job_id.clone() }).unwrap();
        apply(
            &mut session,
            Command::Failed { job_id, failure: JobFailure::Transport("down".into()) },
        )
        .unwrap();

        apply(&mut session, Command::Reset).unwrap();
        assert_eq!(session.state(), JobState::Idle);
        assert!(session.staged_files().is_empty());
        assert!(session.job().is_none());
        assert_eq!(session.user_id(), Some("user-7"));
    }

    #[test]
    fn test_reset_before_submitting_discards_staged_files() {
        let mut session = staged_session();
        assert_eq!(session.state(), JobState::Staged);

        let effects = apply(&mut session, Command::Reset).unwrap();
        assert!(matches!(&effects[..], [Effect::ClearPreview]));
        assert_eq!(session.state(), JobState::Idle);
        assert!(session.staged_files().is_empty());

        apply(&mut session, Command::SignOut).unwrap();
        assert_eq!(session.state(), JobState::Idle);
        assert_eq!(session.user_id(), None);
    }

    #[test]
    fn test_reset_is_refused_while_active() {
        let mut session = staged_session();
        submit(&mut session);
        assert!(matches!(
            apply(&mut session, Command::Reset),
            Err(Error::InvalidTransition { command: "reset", state: "submitting" })
        ));
        assert_eq!(session.state(), JobState::Submitting);
    }

    #[test]
    fn test_resubmit_after_failure_and_after_completion() {
        let mut session = staged_session();
        let first = submit(&mut session);
        apply(&mut session, Command::RequestAccepted { job_id: first.clone() }).unwrap();
        apply(
            &mut session,
            Command::Failed { job_id: first.clone(), failure: JobFailure::Transport("x".into()) },
        )
        .unwrap();

        let second = submit(&mut session);
        assert_ne!(first, second);
        apply(&mut session, Command::RequestAccepted { job_id: second.clone() }).unwrap();
        apply(&mut session, Command::Succeeded { job_id: second, results: results() }).unwrap();
        assert!(session.last_result().is_some());

        apply(&mut session, Command::AddFiles(vec![pdf("next.pdf")])).unwrap();
        let effects = apply(&mut session, Command::Submit).unwrap();
        assert!(matches!(effects[0], Effect::ClearPreview));
        assert!(session.last_result().is_none());
    }

    #[test]
    fn test_remove_out_of_range_leaves_session_untouched() {
        let mut session = staged_session();
        assert!(matches!(
            apply(&mut session, Command::RemoveFile(5)),
            Err(Error::IndexOutOfRange { index: 5, len: 1 })
        ));
        assert_eq!(session.staged_files().len(), 1);

        let effects = apply(&mut session, Command::RemoveFile(0)).unwrap();
        assert!(matches!(&effects[..], [Effect::FileRemoved(f)] if f.name == "record.pdf"));
        assert_eq!(session.state(), JobState::Idle);
    }

    #[test]
    fn test_transport_error_maps_to_failure() {
        let failure: JobFailure = Error::TransportFailure("connection refused".into()).into();
        assert_eq!(failure, JobFailure::Transport("connection refused".into()));

        let failure: JobFailure = Error::BackendError("bad gateway".into()).into();
        assert_eq!(failure.message(), "bad gateway");
    }
}
