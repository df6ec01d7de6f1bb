#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use rust_decimal::Decimal;
use tokio::sync::Notify;

use supply_oracle::cache::TtlCache;
use supply_oracle::ledger::{ConfirmedUpdate, LedgerClient, LedgerError, PendingUpdate};
use supply_oracle::models::AssetQuote;
use supply_oracle::providers::QuoteProvider;
use supply_oracle::snapshot::SnapshotService;

pub fn quote(rank: u32, symbol: &str, supply: Option<i64>) -> AssetQuote {
    AssetQuote {
        rank,
        name: symbol.to_string(),
        symbol: symbol.to_string(),
        price_usd: Some(Decimal::from(100)),
        market_cap_usd: None,
        circulating_supply: supply.map(Decimal::from),
    }
}

/// Provider returning canned quote lists, one list per call. The last list
/// repeats once the script runs out.
pub struct ScriptedProvider {
    name: String,
    responses: Vec<Vec<AssetQuote>>,
    fail: bool,
    calls: AtomicUsize,
}

impl ScriptedProvider {
    pub fn new(name: &str, quotes: Vec<AssetQuote>) -> Self {
        Self::with_responses(name, vec![quotes])
    }

    pub fn with_responses(name: &str, responses: Vec<Vec<AssetQuote>>) -> Self {
        assert!(!responses.is_empty(), "scripted provider needs a response");
        Self {
            name: name.to_string(),
            responses,
            fail: false,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing(name: &str) -> Self {
        Self {
            name: name.to_string(),
            responses: Vec::new(),
            fail: true,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl QuoteProvider for ScriptedProvider {
    async fn fetch_top(&self, _limit: usize) -> Result<Vec<AssetQuote>> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(anyhow!("{} is unavailable", self.name));
        }
        let idx = call.min(self.responses.len() - 1);
        Ok(self.responses[idx].clone())
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Pair of signals for parking a confirmation mid-flight: the ledger fires
/// `entered` when the wait begins and parks until `release`.
#[derive(Clone)]
pub struct ConfirmationHold {
    pub entered: Arc<Notify>,
    pub release: Arc<Notify>,
}

impl ConfirmationHold {
    pub fn new() -> Self {
        Self {
            entered: Arc::new(Notify::new()),
            release: Arc::new(Notify::new()),
        }
    }
}

/// In-memory ledger that records every submitted batch.
pub struct RecordingLedger {
    batches: Mutex<Vec<(Vec<String>, Vec<u64>)>>,
    fail_submission: bool,
    block_number: u64,
    hold: Option<ConfirmationHold>,
}

impl RecordingLedger {
    pub fn new() -> Self {
        Self {
            batches: Mutex::new(Vec::new()),
            fail_submission: false,
            block_number: 7,
            hold: None,
        }
    }

    pub fn failing_submission() -> Self {
        Self {
            fail_submission: true,
            ..Self::new()
        }
    }

    pub fn holding(hold: ConfirmationHold) -> Self {
        Self {
            hold: Some(hold),
            ..Self::new()
        }
    }

    pub fn batches(&self) -> Vec<(Vec<String>, Vec<u64>)> {
        self.batches.lock().expect("batches mutex poisoned").clone()
    }
}

#[async_trait]
impl LedgerClient for RecordingLedger {
    async fn submit_batch(
        &self,
        symbols: &[String],
        supplies: &[u64],
    ) -> Result<PendingUpdate, LedgerError> {
        if self.fail_submission {
            return Err(LedgerError::Submission("relay offline".to_string()));
        }
        let mut batches = self.batches.lock().expect("batches mutex poisoned");
        batches.push((symbols.to_vec(), supplies.to_vec()));
        Ok(PendingUpdate {
            tx_hash: format!("0xmock{}", batches.len()),
        })
    }

    async fn wait_for_confirmation(
        &self,
        pending: &PendingUpdate,
        _timeout: Duration,
    ) -> Result<ConfirmedUpdate, LedgerError> {
        if let Some(hold) = &self.hold {
            hold.entered.notify_one();
            hold.release.notified().await;
        }
        Ok(ConfirmedUpdate {
            tx_hash: pending.tx_hash.clone(),
            block_number: self.block_number,
        })
    }

    fn name(&self) -> &str {
        "recording"
    }
}

pub fn snapshot_service(
    primary: Arc<dyn QuoteProvider>,
    secondary: Arc<dyn QuoteProvider>,
) -> Arc<SnapshotService> {
    let cache = Arc::new(TtlCache::new(Duration::from_secs(300)));
    Arc::new(SnapshotService::new(cache, primary, secondary))
}
