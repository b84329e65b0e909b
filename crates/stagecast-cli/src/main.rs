//! Stagecast admin CLI.
//!
//! Talks to the database and blob storage directly with the same
//! configuration as the API (DATABASE_URL, STORAGE_BACKEND, ...).

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde_json::json;
use stagecast_api::setup::{database, services, storage, WorkerMode};
use stagecast_api::AppState;
use stagecast_cli::{parse_uuids, print_json, MediaRow};
use stagecast_core::{Config, MediaId};
use stagecast_processing::TranscodeOutcome;
use std::sync::Arc;
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "stagecast", about = "Stagecast media engine admin")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply pending database migrations
    Migrate,
    /// Reconcile a cloud connection's projects now; the media sync is queued
    Sync {
        connection: Uuid,
        /// Re-fetch every project, changed or not
        #[arg(long)]
        force: bool,
    },
    /// Transcode a video to HLS (no-op when already done)
    Transcode {
        /// Media id, raw UUID or media name
        media: String,
    },
    /// Delete a media and everything derived from it
    Delete { media_name: String },
    /// List the media of projects plus everything derived from them
    Closure {
        #[arg(required = true)]
        projects: Vec<String>,
    },
    /// Refresh the organizations a cloud connection can reach
    Organizations { connection: Uuid },
}

async fn connect(config: &Config) -> Result<Arc<AppState>> {
    let pool = database::setup_database(config).await?;
    let (blobs, uploads) = storage::setup_storage(config).await?;
    services::initialize_services(config, pool, blobs, uploads, None, WorkerMode::SubmitOnly)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::from_env().context("Failed to load configuration")?;
    config.validate()?;
    stagecast_infra::init_telemetry(config.log_json());

    if let Commands::Migrate = cli.command {
        database::setup_database(&config).await?;
        return print_json(&json!({ "migrated": true }));
    }

    let state = connect(&config).await?;
    match cli.command {
        Commands::Migrate => {}
        Commands::Sync { connection, force } => {
            let report = state.project_reconciler.sync(connection, force).await?;
            if report.jobs_enqueued > 0 {
                tracing::info!(
                    refreshed = report.refreshed.len(),
                    "Media sync queued for the API worker"
                );
            }
            print_json(&report)?;
        }
        Commands::Transcode { media } => {
            let id = MediaId::resolve(&media)?;
            let outcome = state.transcoder.run(id).await?;
            match outcome {
                TranscodeOutcome::Completed(metadata) => print_json(&metadata)?,
                TranscodeOutcome::AlreadyTranscoded => {
                    print_json(&json!({ "mediaId": id, "status": "already_transcoded" }))?
                }
            }
        }
        Commands::Delete { media_name } => {
            let deleted = state.media.delete_media(&media_name).await?;
            print_json(&json!({ "deleted": deleted }))?;
        }
        Commands::Closure { projects } => {
            let project_ids = parse_uuids(&projects)?;
            let media = state
                .project_media
                .all_media_of_projects(&state.media, &project_ids)
                .await?;
            let rows: Vec<MediaRow> = media.iter().map(MediaRow::from).collect();
            print_json(&rows)?;
        }
        Commands::Organizations { connection } => {
            let slugs =
                stagecast_sync::refresh_organization_list(&state.sync, &state.connector, connection)
                    .await?;
            print_json(&slugs)?;
        }
    }

    Ok(())
}
