//! Shared HTTP session with per-request timeouts and retry logic.
//!
//! One [`Session`] is opened per fetch cycle and lent to every source adapter;
//! adapters never build their own clients. Page downloads go through
//! [`RetryFetch`], which adds exponential backoff with jitter on top of any
//! [`FetchPage`] implementation.
//!
//! # Retry Strategy
//!
//! - Transport errors, timeouts, 408, 429 and 5xx are retried
//! - Other 4xx answers fail immediately
//! - Exponential backoff starting at `base_delay`, capped at 30 seconds
//! - Random jitter (0-250ms) added to prevent thundering herd

use rand::{Rng, rng};
use std::fmt;
use std::time::{Duration as StdDuration, Instant};
use tokio::time::sleep;
use tracing::{debug, error, instrument, warn};

use crate::dataset::DedupStore;
use crate::errors::SourceError;

/// Trait for downloading one page as text.
///
/// The production implementation is [`ClientFetcher`]; decorators such as
/// [`RetryFetch`] wrap another implementation.
pub trait FetchPage {
    async fn fetch_page(&self, url: &str) -> Result<String, SourceError>;
}

/// Request settings applied to every page download in a cycle.
#[derive(Debug, Clone)]
pub struct HttpSettings {
    /// Upper bound for one request, connect to last body byte.
    pub timeout: StdDuration,
    /// Retries after the first attempt.
    pub max_retries: usize,
    /// Initial delay between retries (doubles with each attempt).
    pub base_delay: StdDuration,
    pub user_agent: String,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            timeout: StdDuration::from_secs(30),
            max_retries: 3,
            base_delay: StdDuration::from_secs(1),
            user_agent: format!("news_harvester/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// [`FetchPage`] backed by a `reqwest` client.
#[derive(Debug, Clone)]
pub struct ClientFetcher {
    client: reqwest::Client,
}

impl FetchPage for ClientFetcher {
    #[instrument(level = "debug", skip(self))]
    async fn fetch_page(&self, url: &str) -> Result<String, SourceError> {
        let http_err = |source| SourceError::Http {
            url: url.to_string(),
            source,
        };
        let response = self.client.get(url).send().await.map_err(http_err)?;
        let status = response.status();
        if !status.is_success() {
            return Err(SourceError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        response.text().await.map_err(http_err)
    }
}

/// Wrapper that adds exponential backoff retry logic to any [`FetchPage`].
///
/// The delay between retries follows this formula:
/// ```text
/// delay = min(base_delay * 2^(attempt-1), max_delay) + random_jitter(0..250ms)
/// ```
pub struct RetryFetch<T> {
    inner: T,
    max_retries: usize,
    base_delay: StdDuration,
    max_delay: StdDuration,
}

impl<T> RetryFetch<T>
where
    T: FetchPage,
{
    pub fn new(inner: T, max_retries: usize, base_delay: StdDuration) -> Self {
        Self {
            inner,
            max_retries,
            base_delay,
            max_delay: StdDuration::from_secs(30),
        }
    }
}

impl<T> fmt::Debug for RetryFetch<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryFetch")
            .field("max_retries", &self.max_retries)
            .field("base_delay", &self.base_delay)
            .field("max_delay", &self.max_delay)
            .finish()
    }
}

impl<T> FetchPage for RetryFetch<T>
where
    T: FetchPage,
{
    async fn fetch_page(&self, url: &str) -> Result<String, SourceError> {
        let total_t0 = Instant::now();
        let mut attempt = 0usize;

        loop {
            match self.inner.fetch_page(url).await {
                Ok(body) => return Ok(body),
                Err(e) => {
                    attempt += 1;
                    let total_dt = total_t0.elapsed();

                    if !e.is_retryable() || attempt > self.max_retries {
                        if e.is_retryable() {
                            error!(
                                %url,
                                attempt,
                                max = self.max_retries,
                                elapsed_ms_total = total_dt.as_millis(),
                                error = %e,
                                "fetch exhausted retries"
                            );
                        }
                        return Err(e);
                    }

                    // backoff calc
                    let shift = (attempt - 1).min(16) as u32;
                    let delay = self
                        .base_delay
                        .saturating_mul(1 << shift)
                        .min(self.max_delay);
                    let jitter_ms: u64 = rng().random_range(0..=250);
                    let delay = delay + StdDuration::from_millis(jitter_ms);

                    warn!(
                        %url,
                        attempt,
                        max = self.max_retries,
                        elapsed_ms_total = total_dt.as_millis(),
                        ?delay,
                        error = %e,
                        "fetch attempt failed; backing off"
                    );
                    sleep(delay).await;
                }
            }
        }
    }
}

/// Network resources shared by all adapters during one cycle.
///
/// Besides the HTTP client the session carries the cycle's [`DedupStore`] so
/// adapters can skip links that are already in the dataset before spending a
/// request on them.
#[derive(Debug)]
pub struct Session {
    fetcher: RetryFetch<ClientFetcher>,
    seen: DedupStore,
}

impl Session {
    /// Build the cycle's client. Fails only if the TLS backend cannot start.
    pub fn open(settings: &HttpSettings, seen: DedupStore) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(settings.timeout)
            .connect_timeout(settings.timeout.min(StdDuration::from_secs(10)))
            .user_agent(settings.user_agent.clone())
            .build()?;
        debug!(?settings, "HTTP session opened");
        Ok(Self {
            fetcher: RetryFetch::new(
                ClientFetcher { client },
                settings.max_retries,
                settings.base_delay,
            ),
            seen,
        })
    }

    /// Download `url` as text, retrying transient failures.
    pub async fn get_html(&self, url: &str) -> Result<String, SourceError> {
        self.fetcher.fetch_page(url).await
    }

    /// Links already stored in (or written to) the dataset this cycle.
    pub fn seen(&self) -> &DedupStore {
        &self.seen
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Fails with `error` for the first `failures` calls, then succeeds.
    struct Flaky {
        failures: usize,
        status: u16,
        calls: AtomicUsize,
    }

    impl Flaky {
        fn new(failures: usize, status: u16) -> Self {
            Self {
                failures,
                status,
                calls: AtomicUsize::new(0),
            }
        }
    }

    impl FetchPage for Flaky {
        async fn fetch_page(&self, url: &str) -> Result<String, SourceError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.failures {
                Err(SourceError::Status {
                    url: url.to_string(),
                    status: self.status,
                })
            } else {
                Ok("<html></html>".to_string())
            }
        }
    }

    #[tokio::test]
    async fn test_retry_recovers_from_transient_errors() {
        let fetch = RetryFetch::new(Flaky::new(2, 503), 3, StdDuration::from_millis(1));
        let body = fetch.fetch_page("https://example.com").await.unwrap();
        assert_eq!(body, "<html></html>");
        assert_eq!(fetch.inner.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retry_gives_up_after_max_retries() {
        let fetch = RetryFetch::new(Flaky::new(10, 502), 2, StdDuration::from_millis(1));
        let err = fetch.fetch_page("https://example.com").await.unwrap_err();
        assert!(matches!(err, SourceError::Status { status: 502, .. }));
        assert_eq!(fetch.inner.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_client_errors_are_not_retried() {
        let fetch = RetryFetch::new(Flaky::new(10, 404), 5, StdDuration::from_millis(1));
        assert!(fetch.fetch_page("https://example.com").await.is_err());
        assert_eq!(fetch.inner.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_session_shares_dedup_store() {
        let store = DedupStore::default();
        let session = Session::open(&HttpSettings::default(), store.clone()).unwrap();
        store.add("https://example.com/a");
        assert!(session.seen().contains("https://example.com/a"));
    }
}
