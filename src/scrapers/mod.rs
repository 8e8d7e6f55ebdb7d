//! News source adapters.
//!
//! Every source implements [`SourceAdapter`]: one `fetch` call that returns
//! the source's new articles using the cycle's shared [`Session`]. The
//! orchestrator never calls `fetch` directly but goes through
//! [`fetch_from_source`], which turns every error and panic into an empty
//! batch so one broken source cannot abort the cycle for the others.
//!
//! # Supported Sources
//!
//! | Source | Module | Method | Notes |
//! |--------|--------|--------|-------|
//! | Lenta.ru | [`lenta`] | HTML scraping | Rubric pages from the top menu |
//! | RBC | [`rbk`] | HTML scraping | Rubrics from the footer list |
//! | RIA Novosti | [`ria`] | HTML scraping | Headlines taken from the rubric listing |
//! | Gazeta.ru | [`gazeta`] | HTML scraping | Rubric segment stripped from article paths |
//!
//! HTML sources share the three-stage walk in [`site`]: categories, article
//! links per category (skipping links already in the dataset), then one page
//! per article.

pub mod gazeta;
pub mod lenta;
pub mod rbk;
pub mod ria;
pub mod site;

use async_trait::async_trait;
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::time::Instant;
use tracing::{debug, error, info, instrument};

use crate::errors::SourceError;
use crate::http::Session;
use crate::models::RawArticle;

pub use site::{SiteLayout, SiteScraper};

/// Capability of one news source.
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    /// Short stable name, used in logs and in the `source_name` column.
    fn name(&self) -> &str;

    /// Collect the source's current articles.
    async fn fetch(&self, session: &Session) -> Result<Vec<RawArticle>, SourceError>;
}

/// Every source the harvester polls, in registration order.
pub fn registered_sources() -> Vec<Box<dyn SourceAdapter>> {
    vec![
        Box::new(SiteScraper::new(lenta::Lenta)),
        Box::new(SiteScraper::new(rbk::Rbk)),
        Box::new(SiteScraper::new(ria::Ria)),
        Box::new(SiteScraper::new(gazeta::Gazeta)),
    ]
}

/// Articles returned by one adapter in one cycle.
#[derive(Debug)]
pub struct SourceBatch {
    pub source: String,
    pub articles: Vec<RawArticle>,
    /// `false` when the adapter failed and `articles` is empty because of it.
    pub succeeded: bool,
}

/// Run one adapter behind its failure boundary.
///
/// Errors and panics are logged and reported as an empty, unsuccessful batch.
#[instrument(level = "info", skip_all, fields(source = %adapter.name()))]
pub async fn fetch_from_source(session: &Session, adapter: &dyn SourceAdapter) -> SourceBatch {
    let source = adapter.name().to_string();
    let t0 = Instant::now();
    debug!("Start scraping");

    match AssertUnwindSafe(adapter.fetch(session)).catch_unwind().await {
        Ok(Ok(articles)) => {
            info!(
                count = articles.len(),
                elapsed_ms = t0.elapsed().as_millis(),
                "Fetched articles"
            );
            SourceBatch {
                source,
                articles,
                succeeded: true,
            }
        }
        Ok(Err(e)) => {
            error!(error = %e, "Source fetch failed");
            SourceBatch {
                source,
                articles: Vec::new(),
                succeeded: false,
            }
        }
        Err(panic) => {
            let reason = panic
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            error!(%reason, "Source panicked");
            SourceBatch {
                source,
                articles: Vec::new(),
                succeeded: false,
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Scripted adapters for exercising the orchestration code offline.

    use super::*;

    pub enum Script {
        Articles(Vec<RawArticle>),
        Fail,
        Panic,
    }

    pub struct ScriptedSource {
        pub name: &'static str,
        pub script: Script,
    }

    #[async_trait]
    impl SourceAdapter for ScriptedSource {
        fn name(&self) -> &str {
            self.name
        }

        async fn fetch(&self, _session: &Session) -> Result<Vec<RawArticle>, SourceError> {
            match &self.script {
                Script::Articles(articles) => Ok(articles.clone()),
                Script::Fail => Err(SourceError::MissingElement("h1")),
                Script::Panic => panic!("selector table out of date"),
            }
        }
    }

    pub fn article(source: &str, link: &str) -> RawArticle {
        RawArticle {
            source_name: source.to_string(),
            source_link: format!("https://{source}.example/"),
            category_name: "Мир".to_string(),
            category_link: format!("https://{source}.example/world/"),
            published_at: "2026-10-16 12:00:00".to_string(),
            article_link: link.to_string(),
            title: format!("Title of {link}"),
            body_text: "Body".to_string(),
        }
    }
}
