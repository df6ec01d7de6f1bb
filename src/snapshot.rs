//! Cached top-100 snapshot computation.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::cache::{CacheStats, TtlCache, DEFAULT_TTL};
use crate::models::{AssetQuote, Snapshot};
use crate::providers::QuoteProvider;
use crate::reconcile::{reconcile, TOP_N};

/// The single cache key holding the current reconciled snapshot.
pub const SNAPSHOT_CACHE_KEY: &str = "top100:reconciled";

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SnapshotError {
    /// Both provider fetches failed. A single-source failure is tolerated
    /// and never surfaces as this error.
    #[error("both quote providers are unavailable")]
    AllSourcesUnavailable,
}

/// Serves the reconciled top-100 list, computing it on cache miss.
///
/// This service is the sole reader and writer of the snapshot cache entry;
/// the entry is always replaced whole, never patched in place.
pub struct SnapshotService {
    cache: Arc<TtlCache<Snapshot>>,
    primary: Arc<dyn QuoteProvider>,
    secondary: Arc<dyn QuoteProvider>,
    ttl: Duration,
}

impl SnapshotService {
    pub fn new(
        cache: Arc<TtlCache<Snapshot>>,
        primary: Arc<dyn QuoteProvider>,
        secondary: Arc<dyn QuoteProvider>,
    ) -> Self {
        Self {
            cache,
            primary,
            secondary,
            ttl: DEFAULT_TTL,
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Return the current snapshot, from cache when fresh.
    ///
    /// On a miss both providers are queried concurrently; either failure is
    /// caught independently so one failing cannot cancel the other. Only
    /// the both-failed case is an error, and nothing is cached for it.
    pub async fn snapshot(&self) -> Result<Snapshot, SnapshotError> {
        if let Some(snapshot) = self.cache.get(SNAPSHOT_CACHE_KEY) {
            debug!(count = snapshot.len(), "returning cached snapshot");
            return Ok(snapshot);
        }

        let (primary, secondary) = tokio::join!(
            self.fetch_one(self.primary.as_ref()),
            self.fetch_one(self.secondary.as_ref())
        );

        let snapshot = reconcile(primary.as_deref(), secondary.as_deref())?;
        self.cache.set(SNAPSHOT_CACHE_KEY, snapshot.clone(), self.ttl);

        info!(count = snapshot.len(), "reconciled snapshot computed");
        Ok(snapshot)
    }

    /// Evict the cached snapshot and recompute it.
    pub async fn refresh(&self) -> Result<Snapshot, SnapshotError> {
        if self.cache.remove(SNAPSHOT_CACHE_KEY) {
            info!("snapshot cache entry evicted for refresh");
        }
        self.snapshot().await
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    async fn fetch_one(&self, provider: &dyn QuoteProvider) -> Option<Vec<AssetQuote>> {
        match provider.fetch_top(TOP_N).await {
            Ok(quotes) => {
                debug!(
                    provider = provider.name(),
                    count = quotes.len(),
                    "provider fetch succeeded"
                );
                Some(quotes)
            }
            Err(err) => {
                warn!(provider = provider.name(), error = %err, "provider fetch failed");
                None
            }
        }
    }
}
