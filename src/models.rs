use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One ranked asset record as reported by a single provider.
///
/// `symbol` is the join key across providers and is always uppercased by
/// the provider adapters. Price, market cap, and supply may each be absent
/// upstream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetQuote {
    pub rank: u32,
    pub name: String,
    pub symbol: String,
    pub price_usd: Option<Decimal>,
    pub market_cap_usd: Option<Decimal>,
    pub circulating_supply: Option<Decimal>,
}

/// Merge-internal record: display fields plus the raw supply reading from
/// each source, retained for auditability while the median is computed.
#[derive(Debug, Clone, PartialEq)]
pub struct MergedAsset {
    pub rank: u32,
    pub name: String,
    pub symbol: String,
    pub price_usd: Option<Decimal>,
    pub market_cap_usd: Option<Decimal>,
    pub supply_primary: Option<Decimal>,
    pub supply_secondary: Option<Decimal>,
    pub circulating_supply_median: Option<u64>,
}

impl MergedAsset {
    pub fn from_quote(quote: &AssetQuote) -> Self {
        Self {
            rank: quote.rank,
            name: quote.name.clone(),
            symbol: quote.symbol.clone(),
            price_usd: quote.price_usd,
            market_cap_usd: quote.market_cap_usd,
            supply_primary: None,
            supply_secondary: None,
            circulating_supply_median: None,
        }
    }
}

/// One entry of the published top-100 snapshot. Provenance fields from the
/// merge are intentionally not part of this contract.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotEntry {
    pub rank: u32,
    pub name: String,
    pub symbol: String,
    pub price_usd: Option<Decimal>,
    pub market_cap_usd: Option<Decimal>,
    pub circulating_supply_median: u64,
}

/// The cached, ranked, reconciled asset list.
pub type Snapshot = Vec<SnapshotEntry>;
