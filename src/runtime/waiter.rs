//! Bounded finality polling.

use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::adapters::ChainAdapter;
use crate::error::{GovernanceError, Result};
use crate::types::{Confirmation, TxHash, TxStatus};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);
pub const DEFAULT_MAX_ATTEMPTS: u32 = 120;

/// Polls a chain for finality of one transaction.
///
/// Each `status` call counts as one attempt, whether it reports `Pending`,
/// `Unknown` or fails in transport. The wait gives up with `ConfirmationTimeout`
/// once `max_attempts` polls have been made and not before.
#[derive(Clone, Debug)]
pub struct ConfirmationWaiter {
    poll_interval: Duration,
    max_attempts: u32,
}

impl ConfirmationWaiter {
    pub fn new(poll_interval: Duration, max_attempts: u32) -> Self {
        Self { poll_interval, max_attempts: max_attempts.max(1) }
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Wait for `tx_hash` without a way to cancel.
    pub async fn wait_for(
        &self,
        adapter: &dyn ChainAdapter,
        tx_hash: &TxHash,
    ) -> Result<Confirmation> {
        let (_keep, cancel) = watch::channel(false);
        self.wait_for_cancellable(adapter, tx_hash, cancel).await
    }

    /// Wait for `tx_hash`, returning `Cancelled` as soon as `cancel` turns true.
    ///
    /// Cancelling only stops the local wait; the transaction stays outstanding.
    pub async fn wait_for_cancellable(
        &self,
        adapter: &dyn ChainAdapter,
        tx_hash: &TxHash,
        mut cancel: watch::Receiver<bool>,
    ) -> Result<Confirmation> {
        for attempt in 1..=self.max_attempts {
            if *cancel.borrow_and_update() {
                return Err(GovernanceError::Cancelled { tx_hash: tx_hash.clone() });
            }

            match adapter.status(tx_hash).await {
                Ok(TxStatus::Confirmed { height }) => {
                    debug!(tx_hash = %tx_hash, height, attempt, "transaction finalized");
                    return Ok(Confirmation {
                        tx_hash: tx_hash.clone(),
                        chain: adapter.chain_name().to_string(),
                        finalized_at: height,
                    });
                }
                Ok(status) => {
                    debug!(tx_hash = %tx_hash, ?status, attempt, "transaction not final yet")
                }
                Err(e) => warn!(tx_hash = %tx_hash, attempt, error = %e, "status query failed"),
            }

            if attempt == self.max_attempts {
                break;
            }

            tokio::select! {
                _ = tokio::time::sleep(self.poll_interval) => {}
                _ = cancelled(&mut cancel) => {
                    return Err(GovernanceError::Cancelled { tx_hash: tx_hash.clone() });
                }
            }
        }

        Err(GovernanceError::ConfirmationTimeout {
            tx_hash: tx_hash.clone(),
            attempts: self.max_attempts,
        })
    }
}

impl Default for ConfirmationWaiter {
    fn default() -> Self {
        Self::new(DEFAULT_POLL_INTERVAL, DEFAULT_MAX_ATTEMPTS)
    }
}

/// Resolves once the flag turns true. Never resolves if the sender is gone.
async fn cancelled(cancel: &mut watch::Receiver<bool>) {
    loop {
        if *cancel.borrow_and_update() {
            return;
        }
        if cancel.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}
