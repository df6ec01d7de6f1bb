//! Upstream quote providers.
//!
//! Each provider returns a ranked listing of asset quotes or fails with a
//! provider-specific error; callers decide how to tolerate a failure.

use std::time::Duration;

use anyhow::Result;

use crate::models::AssetQuote;

pub mod coingecko;
pub mod coinmarketcap;

pub use coingecko::CoinGeckoProvider;
pub use coinmarketcap::CoinMarketCapProvider;

/// Upper bound on a single provider call so one slow upstream cannot
/// stall snapshot computation.
pub const PROVIDER_TIMEOUT: Duration = Duration::from_secs(10);

#[async_trait::async_trait]
pub trait QuoteProvider: Send + Sync {
    /// Fetch up to `limit` ranked asset quotes from this source.
    async fn fetch_top(&self, limit: usize) -> Result<Vec<AssetQuote>>;

    fn name(&self) -> &str;
}
