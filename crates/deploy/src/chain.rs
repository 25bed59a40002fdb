//! The seam between the bootstrap and a network.

use std::future::Future;

use alloy_core::primitives::{Address, B256, Bytes};
use anyhow::Result;
use serde::{Deserialize, Serialize};

/// A transaction submitted from an unlocked account of the node.
///
/// `to == None` is a contract creation; `data` then holds the creation bytecode
/// followed by the ABI-encoded constructor arguments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionRequest {
    pub from: Address,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to: Option<Address>,
    pub data: Bytes,
}

impl TransactionRequest {
    /// A contract creation transaction.
    pub fn create(from: Address, init_code: Bytes) -> Self {
        Self {
            from,
            to: None,
            data: init_code,
        }
    }

    /// A call to an existing contract.
    pub fn call(from: Address, to: Address, data: impl Into<Bytes>) -> Self {
        Self {
            from,
            to: Some(to),
            data: data.into(),
        }
    }
}

/// A node answer that asking again will not change.
///
/// Receipt polling retries anything else (a pending receipt, a dropped
/// connection) but gives up on these right away.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChainError {
    /// The node answered with a JSON-RPC error object.
    #[error("RPC error: {0}")]
    Rejected(String),
    /// The node answered with something that does not decode.
    #[error("malformed {method} response: {reason}")]
    MalformedResponse { method: String, reason: String },
}

/// The confirmed outcome of a transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxReceipt {
    pub tx_hash: B256,
    pub block_number: u64,
    /// `false` when the transaction was mined but reverted.
    pub success: bool,
    /// Set for successful contract creations.
    pub contract_address: Option<Address>,
}

/// Minimal client interface every network backend provides.
///
/// Implementations are expected to be cheap to share by reference; one bootstrap
/// run issues every call through the same client, strictly one after another.
pub trait ChainClient: Send + Sync {
    /// The network id (EIP-155 chain id).
    fn chain_id(&self) -> impl Future<Output = Result<u64>> + Send;

    /// Accounts the node signs for, in the node's order.
    fn accounts(&self) -> impl Future<Output = Result<Vec<Address>>> + Send;

    /// Submit a transaction and return its hash without waiting for it.
    fn send_transaction(
        &self,
        tx: TransactionRequest,
    ) -> impl Future<Output = Result<B256>> + Send;

    /// Fetch the receipt of a transaction, `None` while it is still pending.
    fn transaction_receipt(
        &self,
        tx_hash: B256,
    ) -> impl Future<Output = Result<Option<TxReceipt>>> + Send;

    /// Execute a read-only call against the latest state.
    fn call(&self, to: Address, data: Bytes) -> impl Future<Output = Result<Bytes>> + Send;

    /// The runtime code deployed at `address` (empty when there is none).
    fn code_at(&self, address: Address) -> impl Future<Output = Result<Bytes>> + Send;
}
