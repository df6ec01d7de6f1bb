//! External ledger boundary.
//!
//! The ledger executes one batched supply write per publish cycle and
//! exposes a handle that can be awaited for confirmation. The trait keeps
//! the publisher independent of the transport; the HTTP implementation
//! talks to a transaction relay that signs and submits the batch on-chain.

use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

const LEDGER_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Default pause between confirmation polls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);

#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("symbol and supply batches differ in length ({symbols} vs {supplies})")]
    BatchMismatch { symbols: usize, supplies: usize },

    #[error("ledger request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("ledger submission failed: {0}")]
    Submission(String),

    #[error("ledger rejected transaction {tx_hash}: {reason}")]
    Rejected { tx_hash: String, reason: String },

    /// The write was accepted but never reached a confirmed state within
    /// the wait bound. A publish-cycle failure, never a crash.
    #[error("transaction {tx_hash} unconfirmed after {waited:?}")]
    ConfirmationTimeout { tx_hash: String, waited: Duration },
}

/// A submitted but not yet confirmed batch write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingUpdate {
    pub tx_hash: String,
}

/// A confirmed batch write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfirmedUpdate {
    pub tx_hash: String,
    pub block_number: u64,
}

#[async_trait::async_trait]
pub trait LedgerClient: Send + Sync {
    /// Submit one batched write covering all entries. `symbols` and
    /// `supplies` are parallel, equal-length lists.
    async fn submit_batch(
        &self,
        symbols: &[String],
        supplies: &[u64],
    ) -> Result<PendingUpdate, LedgerError>;

    /// Wait until the write is confirmed, bounded by `timeout`.
    async fn wait_for_confirmation(
        &self,
        pending: &PendingUpdate,
        timeout: Duration,
    ) -> Result<ConfirmedUpdate, LedgerError>;

    fn name(&self) -> &str;
}

#[derive(Serialize)]
struct SubmitRequest<'a> {
    symbols: &'a [String],
    /// Decimal strings so supply values never pass through JSON floats.
    supplies: Vec<String>,
}

#[derive(Deserialize)]
struct SubmitResponse {
    tx_hash: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
enum UpdateStatus {
    Pending,
    Confirmed,
    Failed,
}

#[derive(Deserialize)]
struct StatusResponse {
    status: UpdateStatus,
    block_number: Option<u64>,
    error: Option<String>,
}

/// Ledger client backed by an HTTP transaction relay.
pub struct HttpLedgerClient {
    client: Client,
    endpoint: String,
    poll_interval: Duration,
}

impl HttpLedgerClient {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    async fn fetch_status(&self, tx_hash: &str) -> Result<StatusResponse, LedgerError> {
        let url = format!("{}/updates/{tx_hash}", self.endpoint);
        let response = self
            .client
            .get(&url)
            .timeout(LEDGER_REQUEST_TIMEOUT)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(LedgerError::Submission(format!(
                "status lookup returned {status}: {body}"
            )));
        }

        Ok(response.json().await?)
    }
}

#[async_trait::async_trait]
impl LedgerClient for HttpLedgerClient {
    async fn submit_batch(
        &self,
        symbols: &[String],
        supplies: &[u64],
    ) -> Result<PendingUpdate, LedgerError> {
        if symbols.len() != supplies.len() {
            return Err(LedgerError::BatchMismatch {
                symbols: symbols.len(),
                supplies: supplies.len(),
            });
        }

        let request = SubmitRequest {
            symbols,
            supplies: supplies.iter().map(u64::to_string).collect(),
        };

        let url = format!("{}/updates", self.endpoint);
        let response = self
            .client
            .post(&url)
            .timeout(LEDGER_REQUEST_TIMEOUT)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(LedgerError::Submission(format!(
                "batch submit returned {status}: {body}"
            )));
        }

        let submitted: SubmitResponse = response.json().await?;
        debug!(tx_hash = %submitted.tx_hash, entries = symbols.len(), "batch write submitted");

        Ok(PendingUpdate {
            tx_hash: submitted.tx_hash,
        })
    }

    async fn wait_for_confirmation(
        &self,
        pending: &PendingUpdate,
        timeout: Duration,
    ) -> Result<ConfirmedUpdate, LedgerError> {
        let deadline = tokio::time::Instant::now() + timeout;

        loop {
            let status = self.fetch_status(&pending.tx_hash).await?;

            match status.status {
                UpdateStatus::Confirmed => {
                    let block_number = status.block_number.ok_or_else(|| {
                        LedgerError::Submission(
                            "confirmation response missing block number".to_string(),
                        )
                    })?;
                    return Ok(ConfirmedUpdate {
                        tx_hash: pending.tx_hash.clone(),
                        block_number,
                    });
                }
                UpdateStatus::Failed => {
                    return Err(LedgerError::Rejected {
                        tx_hash: pending.tx_hash.clone(),
                        reason: status.error.unwrap_or_else(|| "unspecified".to_string()),
                    });
                }
                UpdateStatus::Pending => {
                    if tokio::time::Instant::now() + self.poll_interval > deadline {
                        return Err(LedgerError::ConfirmationTimeout {
                            tx_hash: pending.tx_hash.clone(),
                            waited: timeout,
                        });
                    }
                    tokio::time::sleep(self.poll_interval).await;
                }
            }
        }
    }

    fn name(&self) -> &str {
        "http-relay"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_status_response_variants() {
        let pending: StatusResponse =
            serde_json::from_str(r#"{"status": "pending", "block_number": null, "error": null}"#)
                .expect("parse pending");
        assert!(matches!(pending.status, UpdateStatus::Pending));

        let confirmed: StatusResponse =
            serde_json::from_str(r#"{"status": "confirmed", "block_number": 184333021}"#)
                .expect("parse confirmed");
        assert!(matches!(confirmed.status, UpdateStatus::Confirmed));
        assert_eq!(confirmed.block_number, Some(184_333_021));

        let failed: StatusResponse =
            serde_json::from_str(r#"{"status": "failed", "error": "reverted"}"#)
                .expect("parse failed");
        assert!(matches!(failed.status, UpdateStatus::Failed));
        assert_eq!(failed.error.as_deref(), Some("reverted"));
    }

    #[test]
    fn submit_request_serializes_supplies_as_strings() {
        let symbols = vec!["BTC".to_string(), "ETH".to_string()];
        let request = SubmitRequest {
            symbols: &symbols,
            supplies: vec!["19000025".to_string(), "120500000".to_string()],
        };

        let json = serde_json::to_value(&request).expect("serialize request");
        assert_eq!(json["symbols"][0], "BTC");
        assert_eq!(json["supplies"][0], "19000025");
    }

    #[tokio::test]
    async fn submit_batch_rejects_mismatched_lengths() {
        let client = HttpLedgerClient::new("http://localhost:9");
        let err = client
            .submit_batch(&["BTC".to_string()], &[1, 2])
            .await
            .expect_err("expected mismatch error");
        assert!(matches!(
            err,
            LedgerError::BatchMismatch {
                symbols: 1,
                supplies: 2
            }
        ));
    }
}
