//! Waiting for submitted transactions to confirm.

use std::time::Duration;

use backon::{ConstantBuilder, ExponentialBuilder, Retryable};
use serde::{Deserialize, Serialize};

use crate::chain::{ChainClient, ChainError, TransactionRequest, TxReceipt};

/// Default interval between receipt polls.
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 500;

/// How the bootstrap waits for a transaction receipt.
///
/// With no `max_retries` the receipt is polled at a constant interval until it
/// shows up; with `max_retries` the interval grows exponentially and the wait
/// gives up after that many polls. `max_wait_secs` bounds the whole wait in both
/// modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfirmationPolicy {
    /// Interval between polls (initial interval in exponential mode).
    pub poll_interval_ms: u64,
    /// Upper bound for the exponential interval.
    pub max_poll_interval_ms: u64,
    /// Give up after this many polls. `None` polls forever.
    pub max_retries: Option<usize>,
    /// Give up after this many seconds. `None` waits forever.
    pub max_wait_secs: Option<u64>,
}

impl Default for ConfirmationPolicy {
    fn default() -> Self {
        Self::wait_indefinitely()
    }
}

impl ConfirmationPolicy {
    /// Poll forever. Only suitable for local and development networks.
    pub const fn wait_indefinitely() -> Self {
        Self {
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            max_poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            max_retries: None,
            max_wait_secs: None,
        }
    }

    /// Exponential backoff with an overall deadline, for public networks.
    pub const fn bounded(max_retries: usize, max_wait_secs: u64) -> Self {
        Self {
            poll_interval_ms: 1_000,
            max_poll_interval_ms: 15_000,
            max_retries: Some(max_retries),
            max_wait_secs: Some(max_wait_secs),
        }
    }

    fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Poll for the receipt of `tx_hash` until it is available.
    ///
    /// Pending receipts and transport errors are retried. A [`ChainError`] is
    /// returned at once since the node would only repeat it. A mined but
    /// reverted transaction is returned as is, the caller decides what it means.
    pub async fn wait_for_receipt<C: ChainClient>(
        &self,
        client: &C,
        tx_hash: alloy_core::primitives::B256,
    ) -> anyhow::Result<TxReceipt> {
        let fetch = || async move {
            client
                .transaction_receipt(tx_hash)
                .await?
                .ok_or_else(|| anyhow::anyhow!("transaction {tx_hash} is still pending"))
        };

        let notify = |err: &anyhow::Error, after: Duration| {
            tracing::trace!(%tx_hash, error = %err, ?after, "Receipt not available, polling again...");
        };

        let wait = async {
            match self.max_retries {
                Some(max_retries) => {
                    fetch
                        .retry(
                            ExponentialBuilder::default()
                                .with_min_delay(self.poll_interval())
                                .with_max_delay(Duration::from_millis(self.max_poll_interval_ms))
                                .with_max_times(max_retries),
                        )
                        .when(is_transient)
                        .notify(notify)
                        .await
                }
                None => {
                    fetch
                        .retry(
                            ConstantBuilder::default()
                                .with_delay(self.poll_interval())
                                .with_max_times(usize::MAX),
                        )
                        .when(is_transient)
                        .notify(notify)
                        .await
                }
            }
        };

        match self.max_wait_secs {
            Some(secs) => tokio::time::timeout(Duration::from_secs(secs), wait)
                .await
                .map_err(|_| {
                    anyhow::anyhow!("transaction {tx_hash} not confirmed after {secs}s")
                })?,
            None => wait.await,
        }
    }

    /// Submit `tx` and wait for its receipt.
    pub async fn send_and_confirm<C: ChainClient>(
        &self,
        client: &C,
        tx: TransactionRequest,
    ) -> anyhow::Result<TxReceipt> {
        let tx_hash = client.send_transaction(tx).await?;
        tracing::debug!(%tx_hash, "Transaction submitted, waiting for confirmation...");
        self.wait_for_receipt(client, tx_hash).await
    }
}

/// Whether polling again may produce a receipt.
fn is_transient(err: &anyhow::Error) -> bool {
    err.downcast_ref::<ChainError>().is_none()
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use alloy_core::primitives::{Address, B256, Bytes};

    use super::*;

    /// A node that accepts transactions and answers every receipt poll the same way.
    struct StuckNode {
        receipt: fn() -> anyhow::Result<Option<TxReceipt>>,
        polls: AtomicUsize,
    }

    impl StuckNode {
        fn new(receipt: fn() -> anyhow::Result<Option<TxReceipt>>) -> Self {
            Self {
                receipt,
                polls: AtomicUsize::new(0),
            }
        }

        fn polls(&self) -> usize {
            self.polls.load(Ordering::SeqCst)
        }
    }

    impl ChainClient for StuckNode {
        async fn chain_id(&self) -> anyhow::Result<u64> {
            Ok(1)
        }

        async fn accounts(&self) -> anyhow::Result<Vec<Address>> {
            Ok(vec![])
        }

        async fn send_transaction(&self, _tx: TransactionRequest) -> anyhow::Result<B256> {
            Ok(B256::repeat_byte(0xab))
        }

        async fn transaction_receipt(&self, _tx_hash: B256) -> anyhow::Result<Option<TxReceipt>> {
            self.polls.fetch_add(1, Ordering::SeqCst);
            (self.receipt)()
        }

        async fn call(&self, _to: Address, _data: Bytes) -> anyhow::Result<Bytes> {
            Ok(Bytes::new())
        }

        async fn code_at(&self, _address: Address) -> anyhow::Result<Bytes> {
            Ok(Bytes::new())
        }
    }

    fn fast_retries(max_retries: usize) -> ConfirmationPolicy {
        ConfirmationPolicy {
            poll_interval_ms: 10,
            max_poll_interval_ms: 20,
            max_retries: Some(max_retries),
            max_wait_secs: None,
        }
    }

    #[test]
    fn test_default_waits_indefinitely() {
        let policy = ConfirmationPolicy::default();
        assert!(policy.max_retries.is_none());
        assert!(policy.max_wait_secs.is_none());
    }

    #[test]
    fn test_policy_from_partial_toml() {
        let policy: ConfirmationPolicy = toml::from_str("max_wait_secs = 120").unwrap();
        assert_eq!(policy.max_wait_secs, Some(120));
        assert_eq!(policy.poll_interval_ms, DEFAULT_POLL_INTERVAL_MS);
        assert!(policy.max_retries.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_gives_up_after_max_retries() {
        let node = StuckNode::new(|| Ok(None));

        let err = fast_retries(2)
            .wait_for_receipt(&node, B256::ZERO)
            .await
            .unwrap_err();

        assert!(err.to_string().contains("still pending"));
        assert_eq!(node.polls(), 3, "one poll plus two retries");
    }

    #[tokio::test(start_paused = true)]
    async fn test_gives_up_after_max_wait() {
        let node = StuckNode::new(|| Ok(None));
        let policy = ConfirmationPolicy {
            max_wait_secs: Some(3),
            ..ConfirmationPolicy::wait_indefinitely()
        };

        let err = policy.wait_for_receipt(&node, B256::ZERO).await.unwrap_err();

        assert!(err.to_string().contains("not confirmed after 3s"));
        assert!(node.polls() > 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transport_errors_are_retried() {
        let node = StuckNode::new(|| {
            Err(anyhow::anyhow!("Failed to send eth_getTransactionReceipt request"))
        });

        let err = fast_retries(2)
            .wait_for_receipt(&node, B256::ZERO)
            .await
            .unwrap_err();

        assert!(err.to_string().contains("Failed to send"));
        assert_eq!(node.polls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_malformed_receipt_fails_without_waiting_forever() {
        let node = StuckNode::new(|| {
            Err(ChainError::MalformedResponse {
                method: "eth_getTransactionReceipt".to_string(),
                reason: "invalid type".to_string(),
            }
            .into())
        });

        let err = ConfirmationPolicy::default()
            .send_and_confirm(&node, TransactionRequest::create(Address::ZERO, Bytes::new()))
            .await
            .unwrap_err();

        assert!(matches!(
            err.downcast_ref::<ChainError>(),
            Some(ChainError::MalformedResponse { .. })
        ));
        assert_eq!(node.polls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rejected_poll_is_not_retried() {
        let node = StuckNode::new(|| Err(ChainError::Rejected("unknown transaction".to_string()).into()));

        let err = ConfirmationPolicy::default()
            .wait_for_receipt(&node, B256::ZERO)
            .await
            .unwrap_err();

        assert_eq!(err.to_string(), "RPC error: unknown transaction");
        assert_eq!(node.polls(), 1);
    }
}
