//! Command-line interface definitions for the news harvester.
//!
//! This module defines the CLI arguments and options using the `clap` crate.
//! All arguments can be provided via command-line flags or environment variables.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration as StdDuration;

use crate::dataset::{DATASET_FILE, METADATA_FILE};
use crate::http::HttpSettings;
use crate::trigger::{RetrainPolicy, TrainedArtifacts};

/// Command-line arguments for the news harvester.
///
/// # Examples
///
/// ```sh
/// # Scrape forever into ./data
/// news_harvester ingest
///
/// # Only watch the dataset and retrain when due
/// news_harvester trigger --trainer-command ./train.sh
///
/// # Both loops in one process, with daily log files
/// news_harvester --log-dir ./logs run --trainer-command ./train.sh
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Directory holding dataset.csv and info.json
    #[arg(short, long, env = "DATA_DIR", default_value = "./data", global = true)]
    pub data_dir: PathBuf,

    /// Also write daily-rotated log files into this directory
    #[arg(long, env = "LOG_DIR", global = true)]
    pub log_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the periodic multi-source fetch loop
    Ingest(IngestArgs),
    /// Run the periodic retraining trigger
    Trigger(TriggerArgs),
    /// Run both loops in one process
    Run {
        #[command(flatten)]
        ingest: IngestArgs,
        #[command(flatten)]
        trigger: TriggerArgs,
    },
}

#[derive(Args, Debug, Clone)]
pub struct IngestArgs {
    /// Pause between two fetch cycles, in seconds
    #[arg(long, env = "CYCLE_INTERVAL_SECS", default_value_t = 3600)]
    pub cycle_interval_secs: u64,

    /// Timeout of a single HTTP request, in seconds
    #[arg(long, env = "REQUEST_TIMEOUT_SECS", default_value_t = 30)]
    pub request_timeout_secs: u64,

    /// Retries of a failed HTTP request before the page is skipped
    #[arg(long, env = "REQUEST_RETRIES", default_value_t = 3)]
    pub request_retries: usize,
}

impl IngestArgs {
    pub fn cycle_interval(&self) -> StdDuration {
        StdDuration::from_secs(self.cycle_interval_secs)
    }

    pub fn http_settings(&self) -> HttpSettings {
        HttpSettings {
            timeout: StdDuration::from_secs(self.request_timeout_secs),
            max_retries: self.request_retries,
            ..HttpSettings::default()
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct TriggerArgs {
    /// Pause between two trigger evaluations, in seconds
    #[arg(long, env = "TRIGGER_INTERVAL_SECS", default_value_t = 6000)]
    pub trigger_interval_secs: u64,

    /// Minimum dataset size in MB before the first model is trained
    #[arg(long, env = "SIZE_THRESHOLD_MB", default_value_t = 10.0)]
    pub size_threshold_mb: f64,

    /// Retrain once the dataset was last updated more than this many days ago
    #[arg(long, env = "STALENESS_DAYS", default_value_t = 30)]
    pub staleness_days: i64,

    /// Model artifact whose presence means a model has been trained
    #[arg(long, env = "MODEL_PATH", default_value = "./model/model.joblib")]
    pub model_path: PathBuf,

    /// Category mapping written next to the model by the trainer
    #[arg(long, env = "CATEGORY_MAPPING_PATH", default_value = "./model/category_mapping.json")]
    pub category_mapping_path: PathBuf,

    /// Program that trains the classifier
    #[arg(long, env = "TRAINER_COMMAND")]
    pub trainer_command: String,

    /// Extra arguments passed to the trainer program
    #[arg(long = "trainer-arg", allow_hyphen_values = true)]
    pub trainer_args: Vec<String>,
}

impl TriggerArgs {
    pub fn interval(&self) -> StdDuration {
        StdDuration::from_secs(self.trigger_interval_secs)
    }

    pub fn policy(&self) -> RetrainPolicy {
        RetrainPolicy {
            size_threshold_mb: self.size_threshold_mb,
            max_staleness: chrono::Duration::days(self.staleness_days),
        }
    }

    pub fn artifacts(&self) -> TrainedArtifacts {
        TrainedArtifacts {
            model: self.model_path.clone(),
            category_mapping: self.category_mapping_path.clone(),
        }
    }
}

impl Cli {
    pub fn dataset_path(&self) -> PathBuf {
        self.data_dir.join(DATASET_FILE)
    }

    pub fn metadata_path(&self) -> PathBuf {
        self.data_dir.join(METADATA_FILE)
    }
}
