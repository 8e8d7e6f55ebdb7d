//! Keyed JSON document describing the dataset.
//!
//! ```json
//! {
//!     "dataset_size": "12.34 МБ",
//!     "dataset_last_update": "2026-10-16 14:32:00"
//! }
//! ```
//!
//! Single writer: only the prelaunch check and the ingestion writer modify
//! it. Rewrites go through a sibling temp file and a rename so the trigger
//! never reads a half-written document.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, info, instrument};

use crate::errors::MetadataError;
use crate::models::DatasetMetadata;
use crate::utils::{TIMESTAMP_FORMAT, human_readable_size};

pub const SIZE_KEY: &str = "dataset_size";
pub const LAST_UPDATE_KEY: &str = "dataset_last_update";

#[derive(Debug, Clone)]
pub struct MetadataTracker {
    path: PathBuf,
}

impl MetadataTracker {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Create the document with empty fields unless it already exists.
    ///
    /// Returns `true` when the file was created.
    #[instrument(level = "info", skip_all, fields(path = %self.path.display()))]
    pub fn initialize(&self) -> Result<bool, MetadataError> {
        if self.path.exists() {
            debug!("Metadata file already present");
            return Ok(false);
        }
        let mut doc = Map::new();
        doc.insert(SIZE_KEY.to_string(), Value::String(String::new()));
        doc.insert(LAST_UPDATE_KEY.to_string(), Value::String(String::new()));
        self.write_document(&doc)?;
        info!("Created metadata file");
        Ok(true)
    }

    /// Read the document.
    pub fn read(&self) -> Result<DatasetMetadata, MetadataError> {
        let bytes = fs::read(&self.path).map_err(|source| self.io_err(source))?;
        serde_json::from_slice(&bytes).map_err(|source| MetadataError::Json {
            path: self.path.clone(),
            source,
        })
    }

    /// Store the size and time of a write that accepted rows.
    #[instrument(level = "debug", skip(self))]
    pub fn record_dataset_write(
        &self,
        size_bytes: u64,
        at: NaiveDateTime,
    ) -> Result<(), MetadataError> {
        let size = human_readable_size(size_bytes);
        let stamp = at.format(TIMESTAMP_FORMAT).to_string();
        self.update(&[(SIZE_KEY, &size), (LAST_UPDATE_KEY, &stamp)])?;
        info!(dataset_size = %size, last_update = %stamp, "Dataset metadata updated");
        Ok(())
    }

    /// Set the given keys in one rewrite, keeping every other key as it was.
    pub fn update(&self, pairs: &[(&str, &str)]) -> Result<(), MetadataError> {
        let mut doc = match fs::read(&self.path) {
            Ok(bytes) => match serde_json::from_slice::<Value>(&bytes) {
                Ok(Value::Object(map)) => map,
                Ok(_) => {
                    return Err(MetadataError::NotAnObject {
                        path: self.path.clone(),
                    });
                }
                Err(source) => {
                    return Err(MetadataError::Json {
                        path: self.path.clone(),
                        source,
                    });
                }
            },
            Err(e) if e.kind() == io::ErrorKind::NotFound => Map::new(),
            Err(source) => return Err(self.io_err(source)),
        };
        for (key, value) in pairs {
            doc.insert((*key).to_string(), Value::String((*value).to_string()));
        }
        self.write_document(&doc)
    }

    fn write_document(&self, doc: &Map<String, Value>) -> Result<(), MetadataError> {
        let mut buf = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
        let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
        doc.serialize(&mut ser).map_err(|source| MetadataError::Json {
            path: self.path.clone(),
            source,
        })?;

        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);
        fs::write(&tmp, &buf).map_err(|source| self.io_err(source))?;
        fs::rename(&tmp, &self.path).map_err(|source| self.io_err(source))
    }

    fn io_err(&self, source: io::Error) -> MetadataError {
        MetadataError::Io {
            path: self.path.clone(),
            source,
        }
    }
}
