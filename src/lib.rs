pub mod config;
pub mod error;
pub mod export;
pub mod intake;
pub mod jobs;
pub mod orchestrator;
pub mod results;
pub mod service;
pub mod session;

pub use config::ServiceConfig;
pub use error::{Error, RejectReason, Result};
pub use export::{ExportCoordinator, ExportReport};
pub use intake::{CandidateFile, FileIntake, IntakeReport, Rejection, StagedFile};
pub use jobs::{JobState, ProcessingJob};
pub use orchestrator::{ProcessingOrchestrator, ProgressCallback, ProgressUpdate};
pub use results::{PreviewColumns, ResultSchemaExtractor, ResultSet, StructuredRow};
pub use service::{DetectionService, HttpDetectionService};
pub use session::SessionContext;

use tracing_subscriber::EnvFilter;

/// Load `.env` and install the fmt subscriber.
///
/// Safe to call more than once; later calls leave the first subscriber in place.
pub fn init_tracing() {
    // Load .env file - current dir first, then the parent directory
    if dotenvy::dotenv().is_err() {
        let _ = dotenvy::from_path("../.env");
    }

    // Default: warn for most crates, info for ours (job summaries visible)
    // Use RUST_LOG=debug for per-transition logs
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("warn,aviality_client=info")),
        )
        .try_init();
}
