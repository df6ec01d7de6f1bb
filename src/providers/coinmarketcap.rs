//! CoinMarketCap ranked-listings provider.
//!
//! Uses the `/v1/cryptocurrency/listings/latest` endpoint with USD quotes.
//! Docs: https://coinmarketcap.com/api/documentation/v1/

use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use reqwest::Client;
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::debug;

use crate::models::AssetQuote;
use crate::providers::{QuoteProvider, PROVIDER_TIMEOUT};

const CMC_API_BASE: &str = "https://pro-api.coinmarketcap.com";

#[derive(Debug, Deserialize)]
struct ListingsResponse {
    data: Vec<Listing>,
}

#[derive(Debug, Deserialize)]
struct Listing {
    cmc_rank: Option<u32>,
    name: String,
    symbol: String,
    circulating_supply: Option<Decimal>,
    quote: Option<QuoteMap>,
}

#[derive(Debug, Deserialize)]
struct QuoteMap {
    #[serde(rename = "USD")]
    usd: Option<UsdQuote>,
}

#[derive(Debug, Deserialize)]
struct UsdQuote {
    price: Option<Decimal>,
    market_cap: Option<Decimal>,
}

/// CoinMarketCap provider. An API key is required by the real endpoint but
/// optional here so tests can point the provider at a mock server.
pub struct CoinMarketCapProvider {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    timeout: Duration,
}

impl CoinMarketCapProvider {
    pub fn new() -> Self {
        Self {
            client: Client::new(),
            base_url: CMC_API_BASE.to_string(),
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

    fn to_quote(listing: Listing) -> Option<AssetQuote> {
        let Some(rank) = listing.cmc_rank else {
            debug!(symbol = %listing.symbol, "skipping CoinMarketCap listing without rank");
            return None;
        };

        let usd = listing.quote.and_then(|q| q.usd);
        Some(AssetQuote {
            rank,
            name: listing.name,
            symbol: listing.symbol.to_uppercase(),
            price_usd: usd.as_ref().and_then(|u| u.price),
            market_cap_usd: usd.as_ref().and_then(|u| u.market_cap),
            circulating_supply: listing.circulating_supply,
        })
    }
}

impl Default for CoinMarketCapProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl QuoteProvider for CoinMarketCapProvider {
    async fn fetch_top(&self, limit: usize) -> Result<Vec<AssetQuote>> {
        let url = format!("{}/v1/cryptocurrency/listings/latest", self.base_url);

        let mut request = self
            .client
            .get(&url)
            .timeout(self.timeout)
            .query(&[
                ("limit", limit.to_string().as_str()),
                ("convert", "USD"),
                ("sort", "market_cap"),
                ("sort_dir", "desc"),
            ])
            .header("Accept", "application/json");

        if let Some(key) = &self.api_key {
            request = request.header("X-CMC_PRO_API_KEY", key);
        }

        let response = request.send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!("CoinMarketCap API error: {status} - {body}"));
        }

        let data: ListingsResponse = response
            .json()
            .await
            .context("Failed to parse CoinMarketCap listings response")?;

        Ok(data.data.into_iter().filter_map(Self::to_quote).collect())
    }

    fn name(&self) -> &str {
        "coinmarketcap"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_LISTINGS: &str = r#"{
        "data": [
            {
                "cmc_rank": 1,
                "name": "Bitcoin",
                "symbol": "BTC",
                "circulating_supply": 19000000,
                "quote": {
                    "USD": {
                        "price": 42850.12,
                        "market_cap": 840123456789.0
                    }
                }
            },
            {
                "cmc_rank": 2,
                "name": "Ethereum",
                "symbol": "eth",
                "circulating_supply": null,
                "quote": {
                    "USD": {
                        "price": 2534.89,
                        "market_cap": null
                    }
                }
            },
            {
                "cmc_rank": null,
                "name": "Unranked",
                "symbol": "UNR",
                "circulating_supply": 5,
                "quote": null
            }
        ]
    }"#;

    #[test]
    fn parse_listings_response() {
        let response: ListingsResponse =
            serde_json::from_str(SAMPLE_LISTINGS).expect("parse listings");
        assert_eq!(response.data.len(), 3);
        assert_eq!(response.data[0].symbol, "BTC");
        assert!(response.data[1].circulating_supply.is_none());
        assert!(response.data[2].cmc_rank.is_none());
    }

    #[test]
    fn to_quote_uppercases_symbol_and_carries_nulls() {
        let response: ListingsResponse =
            serde_json::from_str(SAMPLE_LISTINGS).expect("parse listings");
        let quotes: Vec<AssetQuote> = response
            .data
            .into_iter()
            .filter_map(CoinMarketCapProvider::to_quote)
            .collect();

        assert_eq!(quotes.len(), 2, "unranked listing must be skipped");
        assert_eq!(quotes[0].symbol, "BTC");
        assert_eq!(
            quotes[0].circulating_supply,
            Some(Decimal::from(19_000_000_u64))
        );
        assert_eq!(quotes[1].symbol, "ETH");
        assert!(quotes[1].circulating_supply.is_none());
        assert!(quotes[1].market_cap_usd.is_none());
        assert!(quotes[1].price_usd.is_some());
    }

    #[test]
    fn with_base_url_strips_trailing_slash() {
        let provider = CoinMarketCapProvider::new().with_base_url("http://localhost:9/");
        assert_eq!(provider.base_url, "http://localhost:9");
    }

    #[test]
    fn provider_name() {
        assert_eq!(CoinMarketCapProvider::new().name(), "coinmarketcap");
    }
}
