//! Durable state of the pipeline: the article dataset and its metadata.
//!
//! # Submodules
//!
//! - [`dedup`]: in-memory set of known article links, rebuilt from the dataset
//! - [`writer`]: appends accepted articles to the dataset file
//! - [`metadata`]: keyed JSON document with the dataset size and last update
//!
//! # On-disk layout
//!
//! ```text
//! data_dir/
//! ├── dataset.csv   # append-only, one row per unique article_link
//! └── info.json     # {"dataset_size": "...", "dataset_last_update": "..."}
//! ```
//!
//! Both files have a single writer (the ingestion pipeline). Readers such as
//! the retrain trigger must treat them as eventually consistent.

pub mod dedup;
pub mod metadata;
pub mod writer;

pub use dedup::DedupStore;
pub use metadata::MetadataTracker;
pub use writer::{IngestionWriter, WriteOutcome};

/// File name of the dataset inside the data directory.
pub const DATASET_FILE: &str = "dataset.csv";

/// File name of the metadata document inside the data directory.
pub const METADATA_FILE: &str = "info.json";
