//! # News Harvester
//!
//! Continuously scrapes Russian-language news sites into a deduplicated CSV
//! corpus, and decides when the downstream news classifier should be
//! retrained from it.
//!
//! ## Features
//!
//! - Scrapes articles from several news sources (Lenta.ru and RBC) on a fixed
//!   interval, all sources concurrently
//! - Appends only articles whose link has never been stored before
//! - Keeps a small `info.json` with the dataset size and last update time
//! - Runs an external trainer once the dataset is large enough, and again
//!   whenever the model goes stale
//!
//! ## Usage
//!
//! ```sh
//! news_harvester -d ./data run --trainer-command ./train.sh
//! ```
//!
//! ## Architecture
//!
//! Two independent loops share the data directory:
//! 1. **Ingestion**: fetch every source, deduplicate, append to `dataset.csv`,
//!    refresh `info.json`
//! 2. **Trigger**: read `info.json` and the model artifact, train when due
//!
//! They only communicate through the files, so each can run in its own
//! process (`ingest`, `trigger`) or both in one (`run`).

use clap::Parser;
use std::error::Error;
use std::path::Path;
use tracing::{debug, error, info};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::fmt::time::UtcTime;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod cli;
mod dataset;
mod errors;
mod http;
mod models;
mod orchestrator;
mod scrapers;
mod trigger;
mod utils;

use cli::{Cli, Command, IngestArgs, TriggerArgs};
use dataset::{IngestionWriter, MetadataTracker};
use orchestrator::FetchOrchestrator;
use trigger::{CommandTrainer, RetrainTrigger};
use utils::ensure_writable_dir;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let args = Cli::parse();
    // Dropping the guard flushes the file writer; keep it for the whole run.
    let _log_guard = init_tracing(args.log_dir.as_deref())?;

    info!(version = env!("CARGO_PKG_VERSION"), "news_harvester starting up");
    debug!(?args, "Parsed CLI arguments");

    prelaunch(&args).await?;

    match &args.command {
        Command::Ingest(ingest) => fetch_loop(&args, ingest).run().await,
        Command::Trigger(trigger) => retrain_loop(&args, trigger).run().await,
        Command::Run { ingest, trigger } => {
            let fetcher = fetch_loop(&args, ingest);
            let retrainer = retrain_loop(&args, trigger);
            tokio::join!(fetcher.run(), retrainer.run());
        }
    }

    Ok(())
}

/// Console output always; daily-rotated files as well when `log_dir` is set.
/// `RUST_LOG` overrides the default `info` level.
fn init_tracing(log_dir: Option<&Path>) -> Result<Option<WorkerGuard>, Box<dyn Error>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)?;
            let appender = RollingFileAppender::builder()
                .rotation(Rotation::DAILY)
                .filename_prefix("news_harvester")
                .filename_suffix("log")
                .build(dir)?;
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = tfmt::layer()
                .with_ansi(false)
                .with_target(true)
                .with_timer(UtcTime::rfc_3339())
                .with_writer(writer);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tfmt::layer()
                .with_target(true)
                .with_file(false)
                .with_line_number(false)
                .with_timer(UtcTime::rfc_3339()),
        )
        .with(file_layer)
        .init();

    Ok(guard)
}

/// Make sure the data directory is usable and `info.json` exists before any
/// loop starts. Failures here are fatal.
async fn prelaunch(args: &Cli) -> Result<(), Box<dyn Error>> {
    if let Err(e) = ensure_writable_dir(&args.data_dir).await {
        error!(
            path = %args.data_dir.display(),
            error = %e,
            "Data directory is not writable (fix perms or choose a different path)"
        );
        return Err(e);
    }

    let metadata = MetadataTracker::new(args.metadata_path());
    match metadata.initialize() {
        Ok(true) => info!(path = %metadata.path().display(), "Created dataset metadata"),
        Ok(false) => debug!(path = %metadata.path().display(), "Dataset metadata already present"),
        Err(e) => {
            error!(error = %e, "Cannot initialize dataset metadata");
            return Err(e.into());
        }
    }
    Ok(())
}

fn fetch_loop(args: &Cli, ingest: &IngestArgs) -> FetchOrchestrator {
    let writer = IngestionWriter::new(
        args.dataset_path(),
        MetadataTracker::new(args.metadata_path()),
    );
    FetchOrchestrator::new(
        scrapers::registered_sources(),
        writer,
        ingest.http_settings(),
        ingest.cycle_interval(),
    )
}

fn retrain_loop(args: &Cli, trigger: &TriggerArgs) -> RetrainTrigger<CommandTrainer> {
    let trainer = CommandTrainer::new(
        trigger.trainer_command.clone(),
        trigger.trainer_args.clone(),
        trigger.artifacts(),
    );
    RetrainTrigger::new(
        MetadataTracker::new(args.metadata_path()),
        trigger.model_path.clone(),
        trigger.policy(),
        trigger.interval(),
        trainer,
    )
}
