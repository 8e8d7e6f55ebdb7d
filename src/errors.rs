//! Error types for each layer of the pipeline.
//!
//! Errors are grouped by the boundary that absorbs them:
//! - [`SourceError`] never leaves an adapter (it becomes an empty batch)
//! - [`StoreError`] aborts one write batch
//! - [`MetadataError`] aborts one trigger iteration
//! - [`TrainerError`] and [`TickError`] are logged by the trigger loop
//! - [`CycleError`] restarts the fetch cycle after a backoff

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Failure while talking to or parsing a news source.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("request to {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{url} answered with HTTP {status}")]
    Status { url: String, status: u16 },
    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),
    #[error("invalid css selector `{css}`: {reason}")]
    Selector { css: &'static str, reason: String },
    #[error("expected element `{0}` not found")]
    MissingElement(&'static str),
}

impl SourceError {
    /// Transport failures, timeouts, 408, 429 and 5xx are worth another attempt.
    pub fn is_retryable(&self) -> bool {
        match self {
            SourceError::Http { .. } => true,
            SourceError::Status { status, .. } => {
                *status == 408 || *status == 429 || *status >= 500
            }
            _ => false,
        }
    }
}

/// Failure reading or appending to the dataset file.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("dataset io error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("dataset csv error on {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
    #[error(transparent)]
    Metadata(#[from] MetadataError),
}

/// Failure reading, parsing or rewriting the metadata document.
#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("metadata io error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("metadata file {path} is not valid JSON: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("metadata file {path} is not a JSON object")]
    NotAnObject { path: PathBuf },
    #[error("malformed dataset_size `{0}` (expected e.g. `12.34 МБ`)")]
    MalformedSize(String),
    #[error("malformed dataset_last_update `{0}` (expected `YYYY-MM-DD HH:MM:SS`)")]
    MalformedTimestamp(String),
}

/// Failure of the external training collaborator.
#[derive(Debug, Error)]
pub enum TrainerError {
    #[error("could not launch trainer `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },
    #[error("trainer `{program}` exited with {status}")]
    Failed { program: String, status: String },
    #[error("trainer finished but model artifact {0} is missing")]
    MissingArtifact(PathBuf),
}

/// Failure of one trigger iteration.
#[derive(Debug, Error)]
pub enum TickError {
    #[error(transparent)]
    Metadata(#[from] MetadataError),
    #[error(transparent)]
    Trainer(#[from] TrainerError),
}

/// Failure of the fetch-cycle scaffolding itself.
#[derive(Debug, Error)]
pub enum CycleError {
    #[error("could not build http session: {0}")]
    Session(#[source] reqwest::Error),
    #[error("could not load known articles: {0}")]
    Dedup(#[from] StoreError),
}
