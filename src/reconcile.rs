//! Two-source merge and the median-of-two supply estimator.
//!
//! The merge combines the ranked listings of two providers into a single
//! symbol-keyed top-100 list. "Median of two" is the specific combining
//! rule below, not a general statistical median: with two readings it is
//! the rounded average, with one it is that reading rounded, with none
//! the entry carries no estimate and is dropped from the output.

use std::collections::HashMap;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};

use crate::models::{AssetQuote, MergedAsset, Snapshot, SnapshotEntry};
use crate::snapshot::SnapshotError;

/// The published list never exceeds this many entries.
pub const TOP_N: usize = 100;

fn valid_supply(value: Option<Decimal>) -> Option<Decimal> {
    // A circulating supply is a non-negative quantity; anything else is
    // treated the same as an absent reading.
    value.filter(|v| !v.is_sign_negative())
}

/// Combine up to two supply readings into a single integer estimate.
///
/// Both readings valid: round((a + b) / 2). Exactly one valid: round it.
/// Neither valid: `None`. Rounding is half-away-from-zero, and a value
/// whose rounded form does not fit in `u64` counts as invalid.
pub fn median_of_two(a: Option<Decimal>, b: Option<Decimal>) -> Option<u64> {
    let estimate = match (valid_supply(a), valid_supply(b)) {
        (Some(a), Some(b)) => a.checked_add(b)? / Decimal::TWO,
        (Some(v), None) | (None, Some(v)) => v,
        (None, None) => return None,
    };

    estimate
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_u64()
}

/// Merge the two provider listings into the ranked top-100 snapshot.
///
/// The primary source wins display fields (rank, name, price, market cap)
/// for every symbol it reports; the secondary source contributes display
/// fields only for symbols the primary lacks. Fails only when both inputs
/// are absent.
pub fn reconcile(
    primary: Option<&[AssetQuote]>,
    secondary: Option<&[AssetQuote]>,
) -> Result<Snapshot, SnapshotError> {
    if primary.is_none() && secondary.is_none() {
        return Err(SnapshotError::AllSourcesUnavailable);
    }

    let mut merged: HashMap<String, MergedAsset> = HashMap::new();

    if let Some(quotes) = primary {
        for quote in quotes {
            let mut entry = MergedAsset::from_quote(quote);
            entry.supply_primary = quote.circulating_supply;
            merged.insert(quote.symbol.clone(), entry);
        }
    }

    if let Some(quotes) = secondary {
        for quote in quotes {
            match merged.get_mut(&quote.symbol) {
                Some(entry) => {
                    entry.supply_secondary = quote.circulating_supply;
                    entry.circulating_supply_median =
                        median_of_two(entry.supply_primary, entry.supply_secondary);
                }
                None => {
                    let mut entry = MergedAsset::from_quote(quote);
                    entry.supply_secondary = quote.circulating_supply;
                    entry.circulating_supply_median =
                        median_of_two(None, quote.circulating_supply);
                    merged.insert(quote.symbol.clone(), entry);
                }
            }
        }
    }

    // Entries the secondary never reported still need an estimate from the
    // primary reading alone.
    for entry in merged.values_mut() {
        if entry.circulating_supply_median.is_none() && entry.supply_secondary.is_none() {
            entry.circulating_supply_median = median_of_two(entry.supply_primary, None);
        }
    }

    let mut snapshot: Snapshot = merged
        .into_values()
        .filter_map(|entry| {
            let median = entry.circulating_supply_median?;
            Some(SnapshotEntry {
                rank: entry.rank,
                name: entry.name,
                symbol: entry.symbol,
                price_usd: entry.price_usd,
                market_cap_usd: entry.market_cap_usd,
                circulating_supply_median: median,
            })
        })
        .collect();

    // The symbol tiebreak keeps the output deterministic when two providers
    // hand the same rank to different symbols.
    snapshot.sort_by(|a, b| a.rank.cmp(&b.rank).then_with(|| a.symbol.cmp(&b.symbol)));
    snapshot.truncate(TOP_N);

    Ok(snapshot)
}
