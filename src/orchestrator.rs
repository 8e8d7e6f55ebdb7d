//! Periodic multi-source fetch loop.
//!
//! One cycle:
//! 1. rebuild the [`DedupStore`] from the dataset file
//! 2. open one shared [`Session`]
//! 3. poll every adapter concurrently on this task
//! 4. write each batch as soon as its adapter finishes
//! 5. drop the session and sleep until the next cycle
//!
//! Adapter failures are absorbed by [`fetch_from_source`]. A failure of the
//! cycle itself (no session, unreadable dataset) is logged and the cycle is
//! retried after [`RESTART_BACKOFF`]. The loop never returns.

use futures::stream::{FuturesUnordered, StreamExt};
use std::time::{Duration as StdDuration, Instant};
use tokio::time::sleep;
use tracing::{error, info, instrument, warn};

use crate::dataset::{DedupStore, IngestionWriter, WriteOutcome};
use crate::errors::CycleError;
use crate::http::{HttpSettings, Session};
use crate::scrapers::{SourceAdapter, fetch_from_source};

/// Pause before retrying a cycle whose scaffolding failed.
pub const RESTART_BACKOFF: StdDuration = StdDuration::from_secs(10);

/// Per-source line of a [`CycleSummary`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceReport {
    pub source: String,
    pub fetched: usize,
    pub accepted: usize,
    pub duplicates: usize,
    /// The adapter failed, or its batch could not be persisted.
    pub failed: bool,
}

/// What one cycle did, in adapter completion order.
#[derive(Debug, Clone, Default)]
pub struct CycleSummary {
    pub sources: Vec<SourceReport>,
    pub elapsed: StdDuration,
}

impl CycleSummary {
    pub fn accepted(&self) -> usize {
        self.sources.iter().map(|s| s.accepted).sum()
    }

    pub fn duplicates(&self) -> usize {
        self.sources.iter().map(|s| s.duplicates).sum()
    }

    pub fn failed_sources(&self) -> usize {
        self.sources.iter().filter(|s| s.failed).count()
    }
}

pub struct FetchOrchestrator {
    sources: Vec<Box<dyn SourceAdapter>>,
    writer: IngestionWriter,
    http: HttpSettings,
    cycle_interval: StdDuration,
}

impl FetchOrchestrator {
    pub fn new(
        sources: Vec<Box<dyn SourceAdapter>>,
        writer: IngestionWriter,
        http: HttpSettings,
        cycle_interval: StdDuration,
    ) -> Self {
        Self {
            sources,
            writer,
            http,
            cycle_interval,
        }
    }

    /// Run cycles forever.
    pub async fn run(&self) {
        info!(
            sources = self.sources.len(),
            interval_secs = self.cycle_interval.as_secs(),
            "Scraper process started"
        );
        loop {
            match self.run_cycle().await {
                Ok(summary) => {
                    for report in &summary.sources {
                        info!(
                            source = %report.source,
                            fetched = report.fetched,
                            accepted = report.accepted,
                            duplicates = report.duplicates,
                            failed = report.failed,
                            "Source summary"
                        );
                    }
                    info!(
                        accepted = summary.accepted(),
                        duplicates = summary.duplicates(),
                        failed_sources = summary.failed_sources(),
                        elapsed_secs = summary.elapsed.as_secs(),
                        "Scraping cycle completed"
                    );
                    info!(
                        minutes = self.cycle_interval.as_secs() / 60,
                        "Waiting until the next cycle"
                    );
                    sleep(self.cycle_interval).await;
                }
                Err(e) => {
                    error!(error = %e, "Scraping cycle failed");
                    info!(
                        backoff_secs = RESTART_BACKOFF.as_secs(),
                        "Restarting the cycle after backoff"
                    );
                    sleep(RESTART_BACKOFF).await;
                }
            }
        }
    }

    /// Fetch from every source once and persist what is new.
    #[instrument(level = "info", skip_all)]
    pub async fn run_cycle(&self) -> Result<CycleSummary, CycleError> {
        let t0 = Instant::now();
        info!("Starting the scraper");

        let store = DedupStore::load(self.writer.path())?;
        if store.is_empty() {
            info!("Dataset is empty; every fetched article counts as new");
        } else {
            info!(known_links = store.len(), "Loaded stored article links");
        }
        let session = Session::open(&self.http, store.clone()).map_err(CycleError::Session)?;

        let mut in_flight: FuturesUnordered<_> = self
            .sources
            .iter()
            .map(|source| fetch_from_source(&session, source.as_ref()))
            .collect();

        let mut summary = CycleSummary::default();
        while let Some(batch) = in_flight.next().await {
            let mut report = SourceReport {
                source: batch.source,
                fetched: batch.articles.len(),
                accepted: 0,
                duplicates: 0,
                failed: !batch.succeeded,
            };
            match self.writer.write(&store, &batch.articles) {
                Ok(WriteOutcome {
                    accepted,
                    duplicates,
                }) => {
                    report.accepted = accepted;
                    report.duplicates = duplicates;
                }
                Err(e) => {
                    warn!(source = %report.source, error = %e, "Batch not persisted");
                    report.failed = true;
                }
            }
            summary.sources.push(report);
        }
        drop(in_flight);
        drop(session);

        summary.elapsed = t0.elapsed();
        Ok(summary)
    }
}
