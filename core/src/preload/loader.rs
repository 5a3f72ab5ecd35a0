//! Image preloading with bounded retries.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::Instant;

use crate::config::PreloadConfig;
use crate::error::ReaderError;
use crate::provider::ImageFetcher;
use crate::stats::{PreloadSnapshot, PreloadStats};
use crate::types::SessionToken;

use super::state::{LoadState, LoadTable};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
    pub placeholder_url: String,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&PreloadConfig::default())
    }
}

impl From<&PreloadConfig> for RetryPolicy {
    fn from(config: &PreloadConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            delay: config.retry_delay(),
            placeholder_url: config.placeholder_url.clone(),
        }
    }
}

/// Loads page images in background tasks and exposes their [`LoadState`].
///
/// At most one load sequence runs per page index; a repeated `load` for an index that is
/// loading or settled does nothing. Must be used from within a Tokio runtime.
#[derive(Clone)]
pub struct ImagePreloader {
    fetcher: Arc<dyn ImageFetcher>,
    table: Arc<Mutex<LoadTable>>,
    policy: Arc<RetryPolicy>,
    stats: Arc<PreloadStats>,
}

impl std::fmt::Debug for ImagePreloader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImagePreloader")
            .field("policy", &self.policy)
            .field("table", &self.table)
            .finish_non_exhaustive()
    }
}

impl ImagePreloader {
    pub fn new(fetcher: Arc<dyn ImageFetcher>, policy: RetryPolicy) -> Self {
        Self {
            fetcher,
            table: Arc::new(Mutex::new(LoadTable::default())),
            policy: Arc::new(policy),
            stats: Arc::new(PreloadStats::new()),
        }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Start loading `url` for the 0-based page `index`. Returns whether a load was started.
    pub fn load(&self, index: usize, url: &str) -> bool {
        let mut table = self.table.lock();
        if !table.begin(index) {
            return false;
        }
        self.stats.record_started();

        let job = LoadJob {
            fetcher: Arc::clone(&self.fetcher),
            table: Arc::clone(&self.table),
            policy: Arc::clone(&self.policy),
            stats: Arc::clone(&self.stats),
            token: table.token(),
            index,
            url: url.to_string(),
        };
        tracing::trace!(target: "preload", index, url, "queued page load");
        table.track(index, tokio::spawn(job.run()));
        true
    }

    pub fn state(&self, index: usize) -> LoadState {
        self.table.lock().get(index)
    }

    pub fn states(&self) -> BTreeMap<usize, LoadState> {
        self.table.lock().snapshot()
    }

    /// Forget every page and abort outstanding loads; subsequent completions tagged with an
    /// older token are dropped.
    pub fn reset(&self, token: SessionToken) {
        let abandoned = self.table.lock().reset(token);
        if abandoned > 0 {
            tracing::debug!(target: "preload", abandoned, "abandoned in-flight loads");
            self.stats.record_abandoned(abandoned);
        }
    }

    pub fn stats(&self) -> PreloadSnapshot {
        self.stats.snapshot()
    }
}

struct LoadJob {
    fetcher: Arc<dyn ImageFetcher>,
    table: Arc<Mutex<LoadTable>>,
    policy: Arc<RetryPolicy>,
    stats: Arc<PreloadStats>,
    token: SessionToken,
    index: usize,
    url: String,
}

impl LoadJob {
    async fn run(self) {
        let started = Instant::now();
        for attempt in 1..=self.policy.max_attempts {
            self.stats.record_attempt(attempt);
            match self.fetcher.fetch(&self.url).await {
                Ok(bytes) => {
                    let settled = self.table.lock().settle(
                        self.token,
                        self.index,
                        LoadState::Loaded(self.url.clone()),
                    );
                    if settled {
                        self.stats.record_loaded(started.elapsed(), bytes);
                        tracing::trace!(target: "preload", index = self.index, attempt, bytes, "page loaded");
                    }
                    return;
                }
                Err(err) => {
                    tracing::debug!(target: "preload", index = self.index, attempt, error = %err, "page load attempt failed");
                    if attempt < self.policy.max_attempts {
                        tokio::time::sleep(self.policy.delay).await;
                    }
                }
            }
        }

        let settled = self.table.lock().settle(
            self.token,
            self.index,
            LoadState::Failed(self.policy.placeholder_url.clone()),
        );
        if settled {
            self.stats.record_failed();
            let err =
                ReaderError::ImageLoadFailure { index: self.index, attempts: self.policy.max_attempts };
            tracing::warn!(target: "preload", url = %self.url, "{err}, showing placeholder");
        }
    }
}
