//! Aviality command line client
//!
//! Usage:
//!     aviality check record.pdf scan.png
//!     aviality process record.pdf --user-id u-42 --export
//!     aviality history --user-id u-42
//!     aviality health --base-url http://localhost:5000

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use aviality_client::{
    ExportCoordinator, FileIntake, HttpDetectionService, IntakeReport, ProcessingOrchestrator,
    ProgressUpdate, ResultSchemaExtractor, ResultSet, ServiceConfig,
};
use aviality_client::service::DetectionService;
use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "aviality", version, about = "PII/PHI de-identification client")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Validate files against the upload policy without submitting
    Check {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Stage, submit and wait for a processing job
    Process {
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// User scope sent with the submission
        #[arg(long, env = "AVIALITY_USER_ID")]
        user_id: Option<String>,

        /// Save the result spreadsheet after a successful job
        #[arg(long)]
        export: bool,

        /// Export directory (defaults to the downloads folder)
        #[arg(long)]
        export_dir: Option<PathBuf>,

        #[arg(long)]
        base_url: Option<String>,
    },
    /// List past processing runs for a user
    History {
        #[arg(long, env = "AVIALITY_USER_ID")]
        user_id: Option<String>,

        #[arg(long)]
        base_url: Option<String>,
    },
    /// Query the service health endpoint
    Health {
        #[arg(long)]
        base_url: Option<String>,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    aviality_client::init_tracing();
    let cli = Cli::parse();

    match run(cli).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

/// Returns `Ok(false)` when the command ran but its outcome was a failure
async fn run(cli: Cli) -> aviality_client::Result<bool> {
    match cli.command {
        Commands::Check { files } => {
            let mut intake = FileIntake::new();
            let report = intake.add_paths(&files).await;
            print_intake(&report);
            for file in intake.files() {
                println!("  staged   {} ({} bytes, {})", file.name, file.byte_size, file.mime_type());
            }
            Ok(report.rejected.is_empty())
        }

        Commands::Process {
            files,
            user_id,
            export,
            export_dir,
            base_url,
        } => {
            let mut config = ServiceConfig::from_env()?;
            if let Some(url) = base_url {
                config = config.with_base_url(&url)?;
            }
            if user_id.is_some() {
                config.user_id = user_id;
            }
            if let Some(dir) = export_dir {
                config.export_dir = dir;
            }

            let service = Arc::new(HttpDetectionService::new(config.clone()));
            let orchestrator = ProcessingOrchestrator::new(service.clone(), &config)
                .with_progress_callback(Box::new(|update: &ProgressUpdate| {
                    println!("[{:>3}%] {}", update.percent, update.message);
                }));

            let report = orchestrator.add_paths(&files).await;
            print_intake(&report);

            let results = match orchestrator.submit().await {
                Ok(results) => results,
                Err(e) => {
                    eprintln!("Processing failed: {}", e);
                    return Ok(false);
                }
            };
            print_summary(&results);

            if export {
                let coordinator = ExportCoordinator::new(service, config.export_dir.clone());
                match coordinator.prepare_export(Some(results.rows.as_slice())).await {
                    Ok(saved) => println!(
                        "Exported {} rows x {} columns to {}",
                        saved.row_count,
                        saved.column_count,
                        saved.path.display()
                    ),
                    Err(e) => {
                        eprintln!("Export failed: {}", e);
                        return Ok(false);
                    }
                }
            }
            Ok(true)
        }

        Commands::History { user_id, base_url } => {
            let mut config = ServiceConfig::from_env()?;
            if let Some(url) = base_url {
                config = config.with_base_url(&url)?;
            }
            let user_id = user_id
                .or(config.user_id.clone())
                .map(|id| id.trim().to_string())
                .filter(|id| !id.is_empty())
                .ok_or_else(|| {
                    aviality_client::Error::Config(
                        "history needs --user-id or AVIALITY_USER_ID".to_string(),
                    )
                })?;

            let service = HttpDetectionService::new(config);
            let history = service.redactions_history(&user_id).await?;
            if history.is_empty() {
                println!("No processing history for {}", user_id);
            }
            for record in &history {
                println!(
                    "  {:>6}  {}  {}",
                    record.id,
                    record.processed_at.as_deref().unwrap_or("-"),
                    record.filename
                );
            }
            Ok(true)
        }

        Commands::Health { base_url } => {
            let mut config = ServiceConfig::from_env()?;
            if let Some(url) = base_url {
                config = config.with_base_url(&url)?;
            }
            let service = HttpDetectionService::new(config);
            let health = service.health().await?;

            println!("status: {}", health.status);
            if let Some(name) = &health.service {
                println!("service: {}", name);
            }
            if let Some(available) = health.pii_detection_available {
                println!("pii detection: {}", if available { "available" } else { "unavailable" });
            }
            Ok(health.is_healthy())
        }
    }
}

fn print_intake(report: &IntakeReport) {
    println!("{} file(s) accepted", report.accepted);
    for rejection in &report.rejected {
        match rejection.byte_size {
            Some(size) => println!("  rejected {} ({} bytes): {}", rejection.file, size, rejection.reason),
            None => println!("  rejected {}: {}", rejection.file, rejection.reason),
        }
    }
}

fn print_summary(results: &ResultSet) {
    println!();
    println!("Files processed:    {}", results.files_processed);
    println!("PII items removed:  {}", results.pii_items_removed);
    println!("PHI items detected: {}", results.phi_items_detected);
    println!("Processing time:    {}", results.processing_time);

    for file in results.failed_files() {
        println!(
            "  failed: {} ({})",
            file.filename,
            file.error.as_deref().unwrap_or("no reason given")
        );
    }

    let columns = ResultSchemaExtractor::extract_columns(results);
    if columns.is_empty() {
        return;
    }
    println!();
    println!("PII columns: {}", columns.pii_labels().join(", "));
    println!("PHI columns: {}", columns.phi_labels().join(", "));

    for (idx, row) in ResultSchemaExtractor::preview_rows(results, &columns)
        .iter()
        .enumerate()
        .take(10)
    {
        println!("  {:>3}  {} | {}", idx + 1, row.pii.join(", "), row.phi.join(", "));
    }
}
