//! Append-only writer for the article dataset.
//!
//! Every accepted article becomes one CSV row. Each row is encoded into its
//! own buffer and handed to the file with a single `write_all` before its
//! link is registered in the [`DedupStore`], so a link is only ever marked
//! as seen once the row has reached the operating system, and a failed row
//! is never written later behind the writer's back. On the first failing
//! row the rest of the batch is abandoned; those articles stay unseen and
//! are picked up again by a later cycle.

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::Local;
use serde::Serialize;
use tracing::{debug, error, info, instrument};

use crate::dataset::{DedupStore, MetadataTracker};
use crate::errors::StoreError;
use crate::models::{DATASET_COLUMNS, RawArticle};

/// How a batch was split between new rows and already-known links.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct WriteOutcome {
    pub accepted: usize,
    pub duplicates: usize,
}

#[derive(Debug, Clone)]
pub struct IngestionWriter {
    path: PathBuf,
    metadata: MetadataTracker,
}

impl IngestionWriter {
    pub fn new(path: impl Into<PathBuf>, metadata: MetadataTracker) -> Self {
        Self {
            path: path.into(),
            metadata,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append the articles of `batch` whose links `store` does not know yet.
    ///
    /// An empty batch returns immediately without touching any file. When at
    /// least one row was accepted the metadata document is refreshed, even if
    /// a later row failed.
    #[instrument(level = "info", skip_all, fields(path = %self.path.display(), batch = batch.len()))]
    pub fn write(
        &self,
        store: &DedupStore,
        batch: &[RawArticle],
    ) -> Result<WriteOutcome, StoreError> {
        let mut outcome = WriteOutcome::default();
        if batch.is_empty() {
            debug!("No articles to write");
            return Ok(outcome);
        }

        let result = self
            .open_for_append()
            .and_then(|mut file| self.append_new(&mut file, store, batch, &mut outcome));
        self.finish(batch.len(), outcome, result)
    }

    /// Refresh the metadata after accepted rows and report the batch.
    fn finish(
        &self,
        batch_len: usize,
        outcome: WriteOutcome,
        result: Result<(), StoreError>,
    ) -> Result<WriteOutcome, StoreError> {
        let skipped = batch_len - outcome.accepted - outcome.duplicates;
        if let Err(e) = &result {
            error!(
                accepted = outcome.accepted,
                skipped,
                error = %e,
                "Batch aborted after write failure"
            );
        }

        if outcome.accepted > 0 {
            let size = std::fs::metadata(&self.path)
                .map_err(|source| self.io_err(source))?
                .len();
            self.metadata
                .record_dataset_write(size, Local::now().naive_local())?;
        }

        result?;
        info!(
            accepted = outcome.accepted,
            duplicates = outcome.duplicates,
            "Batch written"
        );
        Ok(outcome)
    }

    fn append_new(
        &self,
        out: &mut impl Write,
        store: &DedupStore,
        batch: &[RawArticle],
        outcome: &mut WriteOutcome,
    ) -> Result<(), StoreError> {
        for article in batch {
            if store.contains(&article.article_link) {
                outcome.duplicates += 1;
                continue;
            }
            let row = self.encode(article)?;
            out.write_all(&row).map_err(|source| self.io_err(source))?;
            store.add(article.article_link.clone());
            outcome.accepted += 1;
            debug!(link = %article.article_link, source = %article.source_name, "Article appended");
        }
        Ok(())
    }

    /// Open the dataset in append mode, writing the header into an empty file.
    fn open_for_append(&self) -> Result<File, StoreError> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|source| self.io_err(source))?;
        let is_empty = file
            .metadata()
            .map_err(|source| self.io_err(source))?
            .len()
            == 0;

        if is_empty {
            let header = self.encode(DATASET_COLUMNS)?;
            file.write_all(&header)
                .map_err(|source| self.io_err(source))?;
            info!("Created dataset with header row");
        }
        Ok(file)
    }

    /// One CSV record, terminator included.
    fn encode(&self, record: impl Serialize) -> Result<Vec<u8>, StoreError> {
        let mut encoder = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(Vec::new());
        encoder
            .serialize(record)
            .map_err(|source| self.csv_err(source))?;
        encoder
            .into_inner()
            .map_err(|e| self.io_err(e.into_error()))
    }

    fn io_err(&self, source: io::Error) -> StoreError {
        StoreError::Io {
            path: self.path.clone(),
            source,
        }
    }

    fn csv_err(&self, source: csv::Error) -> StoreError {
        StoreError::Csv {
            path: self.path.clone(),
            source,
        }
    }
}
