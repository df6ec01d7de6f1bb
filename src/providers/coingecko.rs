//! CoinGecko ranked-listings provider.
//!
//! Uses the public `/coins/markets` endpoint ordered by market cap. No API
//! key is required for basic usage, though rate limits apply; a pro key is
//! passed through when configured.

use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use reqwest::Client;
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::debug;

use crate::models::AssetQuote;
use crate::providers::{QuoteProvider, PROVIDER_TIMEOUT};

const COINGECKO_API_BASE: &str = "https://api.coingecko.com/api/v3";

#[derive(Debug, Deserialize)]
struct MarketRecord {
    market_cap_rank: Option<u32>,
    name: String,
    symbol: Option<String>,
    current_price: Option<Decimal>,
    market_cap: Option<Decimal>,
    circulating_supply: Option<Decimal>,
}

/// CoinGecko provider.
pub struct CoinGeckoProvider {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    timeout: Duration,
}

impl CoinGeckoProvider {
    pub fn new() -> Self {
        Self {
            client: Client::new(),
            base_url: COINGECKO_API_BASE.to_string(),
            api_key: None,
            timeout: PROVIDER_TIMEOUT,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn to_quote(record: MarketRecord) -> Option<AssetQuote> {
        let Some(rank) = record.market_cap_rank else {
            debug!(name = %record.name, "skipping CoinGecko record without rank");
            return None;
        };
        let Some(symbol) = record.symbol else {
            debug!(name = %record.name, "skipping CoinGecko record without symbol");
            return None;
        };

        Some(AssetQuote {
            rank,
            name: record.name,
            symbol: symbol.to_uppercase(),
            price_usd: record.current_price,
            market_cap_usd: record.market_cap,
            circulating_supply: record.circulating_supply,
        })
    }
}

impl Default for CoinGeckoProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl QuoteProvider for CoinGeckoProvider {
    async fn fetch_top(&self, limit: usize) -> Result<Vec<AssetQuote>> {
        let url = format!("{}/coins/markets", self.base_url);

        let mut request = self
            .client
            .get(&url)
            .timeout(self.timeout)
            .query(&[
                ("vs_currency", "usd"),
                ("order", "market_cap_desc"),
                ("per_page", limit.to_string().as_str()),
                ("page", "1"),
                ("sparkline", "false"),
            ])
            .header("Accept", "application/json");

        if let Some(key) = &self.api_key {
            request = request.query(&[("x_cg_pro_api_key", key.as_str())]);
        }

        let response = request.send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!("CoinGecko API error: {status} - {body}"));
        }

        let data: Vec<MarketRecord> = response
            .json()
            .await
            .context("Failed to parse CoinGecko markets response")?;

        Ok(data.into_iter().filter_map(Self::to_quote).collect())
    }

    fn name(&self) -> &str {
        "coingecko"
    }
}
