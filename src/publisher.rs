//! Periodic supply publishing to the external ledger.
//!
//! One publish cycle obtains the current snapshot (a cache hit is fine),
//! submits a single batched write, and waits for confirmation. Cycles are
//! serialized: a new trigger is refused while one is in flight, because
//! overlapping batched writes from the same signer could conflict. Cycle
//! failures are logged and swallowed; the next interval retries.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::sync::watch;
use tracing::{info, warn};

use crate::ledger::{LedgerClient, LedgerError};
use crate::snapshot::{SnapshotError, SnapshotService};

/// Default wall-clock publish interval.
pub const DEFAULT_PUBLISH_INTERVAL: Duration = Duration::from_secs(30 * 60);

/// Default bound on the ledger confirmation wait.
pub const DEFAULT_CONFIRMATION_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PublisherStatus {
    Idle,
    Publishing,
}

#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error("a publish cycle is already in flight")]
    CycleInProgress,

    #[error(transparent)]
    Snapshot(#[from] SnapshotError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishOutcome {
    Published {
        entries: usize,
        tx_hash: String,
        block_number: u64,
    },
    /// The reconciled list was empty; no ledger call was made.
    SkippedEmpty,
}

/// Publishes the reconciled snapshot to the ledger on a fixed interval.
pub struct SupplyPublisher {
    snapshots: Arc<SnapshotService>,
    ledger: Arc<dyn LedgerClient>,
    interval: Duration,
    confirmation_timeout: Duration,
    state: Mutex<PublisherStatus>,
}

/// Restores the publisher to Idle on every exit path of a cycle.
struct CycleGuard<'a> {
    state: &'a Mutex<PublisherStatus>,
}

impl Drop for CycleGuard<'_> {
    fn drop(&mut self) {
        *lock_state(self.state) = PublisherStatus::Idle;
    }
}

fn lock_state<'a>(
    state: &'a Mutex<PublisherStatus>,
) -> MutexGuard<'a, PublisherStatus> {
    state.lock().expect("publisher state mutex poisoned")
}

impl SupplyPublisher {
    pub fn new(snapshots: Arc<SnapshotService>, ledger: Arc<dyn LedgerClient>) -> Self {
        Self {
            snapshots,
            ledger,
            interval: DEFAULT_PUBLISH_INTERVAL,
            confirmation_timeout: DEFAULT_CONFIRMATION_TIMEOUT,
            state: Mutex::new(PublisherStatus::Idle),
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_confirmation_timeout(mut self, timeout: Duration) -> Self {
        self.confirmation_timeout = timeout;
        self
    }

    pub fn status(&self) -> PublisherStatus {
        *lock_state(&self.state)
    }

    fn begin_cycle(&self) -> Result<CycleGuard<'_>, PublishError> {
        let mut state = lock_state(&self.state);
        if *state == PublisherStatus::Publishing {
            return Err(PublishError::CycleInProgress);
        }
        *state = PublisherStatus::Publishing;
        Ok(CycleGuard { state: &self.state })
    }

    /// Run one publish cycle. Refuses to start while another is in flight.
    pub async fn publish_once(&self) -> Result<PublishOutcome, PublishError> {
        let _guard = self.begin_cycle()?;

        let snapshot = self.snapshots.snapshot().await?;
        if snapshot.is_empty() {
            info!("reconciled snapshot is empty; skipping ledger write");
            return Ok(PublishOutcome::SkippedEmpty);
        }

        let symbols: Vec<String> = snapshot.iter().map(|e| e.symbol.clone()).collect();
        let supplies: Vec<u64> = snapshot
            .iter()
            .map(|e| e.circulating_supply_median)
            .collect();

        let pending = self.ledger.submit_batch(&symbols, &supplies).await?;
        info!(
            tx_hash = %pending.tx_hash,
            entries = symbols.len(),
            ledger = self.ledger.name(),
            "batch write submitted; awaiting confirmation"
        );

        let confirmed = self
            .ledger
            .wait_for_confirmation(&pending, self.confirmation_timeout)
            .await?;

        Ok(PublishOutcome::Published {
            entries: symbols.len(),
            tx_hash: confirmed.tx_hash,
            block_number: confirmed.block_number,
        })
    }

    async fn run_cycle(&self, reason: &str) {
        match self.publish_once().await {
            Ok(PublishOutcome::Published {
                entries,
                tx_hash,
                block_number,
            }) => {
                info!(reason, entries, tx_hash = %tx_hash, block_number, "publish cycle complete");
            }
            Ok(PublishOutcome::SkippedEmpty) => {
                info!(reason, "publish cycle skipped: nothing to write");
            }
            Err(PublishError::CycleInProgress) => {
                warn!(reason, "previous publish cycle still in flight; skipping this trigger");
            }
            Err(err) => {
                warn!(reason, error = %err, "publish cycle failed; retrying next interval");
            }
        }
    }

    /// Start the interval loop. The first cycle fires immediately when
    /// `publish_on_start` is set. The returned handle owns the task.
    pub fn spawn(self: Arc<Self>, publish_on_start: bool) -> PublisherHandle {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);

        let publisher = self;
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(publisher.interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

            // An interval's first tick completes immediately; consume it
            // when no startup cycle is wanted.
            if !publish_on_start {
                ticker.tick().await;
            }
            let mut reason = if publish_on_start { "startup" } else { "scheduled" };

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        publisher.run_cycle(reason).await;
                        reason = "scheduled";
                    }
                    _ = shutdown_rx.changed() => {
                        info!("publisher shutting down");
                        break;
                    }
                }
            }
        });

        PublisherHandle {
            shutdown: shutdown_tx,
            task,
        }
    }
}

/// Owns the publish loop task; dropping without `shutdown` detaches it.
pub struct PublisherHandle {
    shutdown: watch::Sender<bool>,
    task: tokio::task::JoinHandle<()>,
}

impl PublisherHandle {
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        let _ = self.task.await;
    }
}
