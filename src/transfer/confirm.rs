//! Receipt polling.
//!
//! Only reads happen here; the transaction is never re-sent.

use alloy::primitives::TxHash;
use rand::Rng;
use serde_json::json;
use std::time::Duration;
use tokio::time::{sleep, timeout, Instant};

use crate::blockchain::ConfirmationStatus;
use crate::connector::WalletConnector;

/// Delay before poll number `attempt` (0-based): none for the first poll,
/// then doubling from `base_ms` up to `max_ms`, plus up to 10% jitter.
pub fn poll_delay(attempt: u32, base_ms: u64, max_ms: u64) -> Duration {
    if attempt == 0 {
        return Duration::ZERO;
    }
    let delay_ms = base_ms.saturating_mul(2u64.saturating_pow(attempt - 1)).min(max_ms);
    let jitter_range = delay_ms / 10;
    let jitter = if jitter_range > 0 {
        rand::thread_rng().gen_range(0..jitter_range)
    } else {
        0
    };
    Duration::from_millis(delay_ms + jitter)
}

/// Polling parameters.
#[derive(Debug, Clone, Copy)]
pub struct ConfirmationPolicy {
    pub timeout: Duration,
    pub base_interval_ms: u64,
    pub max_interval_ms: u64,
}

/// Poll `eth_getTransactionReceipt` until the transaction is mined or the
/// policy's timeout passes. Returns `None` on timeout.
pub async fn await_receipt(
    connector: &WalletConnector,
    tx_hash: TxHash,
    policy: ConfirmationPolicy,
) -> Option<ConfirmationStatus> {
    let started = Instant::now();
    let polling = async {
        let mut attempt = 0u32;
        loop {
            sleep(poll_delay(attempt, policy.base_interval_ms, policy.max_interval_ms)).await;
            attempt = attempt.saturating_add(1);

            let response = match connector.provider_lease().await {
                Ok(lease) => lease.request("eth_getTransactionReceipt", json!([tx_hash])).await,
                Err(e) => {
                    tracing::warn!(tx_hash = %tx_hash, error = %e, "Provider gone while awaiting receipt");
                    return None;
                }
            };

            match response {
                Ok(receipt) => match ConfirmationStatus::from_receipt(&receipt) {
                    ConfirmationStatus::Pending => {
                        tracing::debug!(tx_hash = %tx_hash, attempt, "Transaction pending");
                    }
                    status => return Some(status),
                },
                Err(e) => {
                    tracing::warn!(tx_hash = %tx_hash, error = %e, "Receipt lookup failed, polling again");
                }
            }
        }
    };

    let status = timeout(policy.timeout, polling).await.ok().flatten();
    if status.is_some() {
        crate::observability::metrics::record_confirmation_latency(started.elapsed().as_secs_f64());
    }
    status
}
