//! Read access to a deployed system for a frontend.
//!
//! The bridge only knows what a manifest recorded. Reads are side-effect free
//! and may run concurrently; a failed read is "no data", never a crash. Writes
//! go through [`ReadBridge::submit_write`] and report their progress on a watch
//! channel without blocking reads.

use std::{
    collections::{BTreeMap, HashSet},
    sync::Arc,
};

use alloy_core::primitives::{Address, B256, Bytes, U256};
use alloy_sol_types::SolCall;
use parking_lot::Mutex;
use tokio::sync::watch;

use crate::{
    chain::{ChainClient, TransactionRequest},
    confirm::ConfirmationPolicy,
    contracts::{ContractKind, IMercado, IMintableToken},
    manifest::Manifest,
    registry::ContractRecord,
};

/// A read that produced no usable data.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("read of {contract} failed: {reason}")]
pub struct ReadFailed {
    pub contract: String,
    pub reason: String,
}

impl ReadFailed {
    fn new(contract: &str, reason: impl Into<String>) -> Self {
        Self {
            contract: contract.to_string(),
            reason: reason.into(),
        }
    }
}

/// A token contract listed in the manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackedToken {
    pub name: String,
    pub address: Address,
    pub decimals: u8,
}

/// Progress of a submitted write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteStatus {
    Pending,
    Confirmed { tx_hash: B256, block_number: u64 },
    Failed { reason: String },
}

impl WriteStatus {
    pub fn is_pending(&self) -> bool {
        matches!(self, WriteStatus::Pending)
    }
}

/// Observer of a write submitted through [`ReadBridge::submit_write`].
#[derive(Debug, Clone)]
pub struct WriteHandle {
    status: watch::Receiver<WriteStatus>,
}

impl WriteHandle {
    fn resolved(status: WriteStatus) -> Self {
        let (_, rx) = watch::channel(status);
        Self { status: rx }
    }

    /// Current status, without waiting.
    pub fn status(&self) -> WriteStatus {
        self.status.borrow().clone()
    }

    /// Wait until the write is confirmed or failed.
    pub async fn wait(mut self) -> WriteStatus {
        let settled = self
            .status
            .wait_for(|status| !status.is_pending())
            .await
            .map(|status| status.clone());
        // The sender only goes away after publishing a final status.
        settled.unwrap_or_else(|_| self.status.borrow().clone())
    }
}

/// Manifest-backed view of one network.
pub struct ReadBridge<C> {
    client: Arc<C>,
    network: u64,
    contracts: BTreeMap<String, ContractRecord>,
    verified: Mutex<HashSet<Address>>,
    confirmation: ConfirmationPolicy,
}

impl<C: ChainClient + 'static> ReadBridge<C> {
    pub fn new(manifest: &Manifest, network: u64, client: Arc<C>) -> Self {
        let contracts = manifest
            .network(network)
            .map(|n| n.contracts.clone())
            .unwrap_or_default();
        if contracts.is_empty() {
            tracing::warn!(network, "Manifest has no contracts for this network");
        }

        Self {
            client,
            network,
            contracts,
            verified: Mutex::new(HashSet::new()),
            confirmation: ConfirmationPolicy::default(),
        }
    }

    pub fn with_confirmation(mut self, confirmation: ConfirmationPolicy) -> Self {
        self.confirmation = confirmation;
        self
    }

    pub fn network(&self) -> u64 {
        self.network
    }

    pub fn contracts(&self) -> impl Iterator<Item = &ContractRecord> {
        self.contracts.values()
    }

    pub fn resolve_address(&self, name: &str) -> Option<Address> {
        self.contracts.get(name).map(|record| record.address)
    }

    /// Tokens recorded in the manifest, by name.
    pub fn tracked_tokens(&self) -> Vec<TrackedToken> {
        self.contracts
            .values()
            .filter_map(|record| match record.kind {
                ContractKind::Token { decimals } => Some(TrackedToken {
                    name: record.name.clone(),
                    address: record.address,
                    decimals,
                }),
                _ => None,
            })
            .collect()
    }

    /// Markets recorded in the manifest, by name.
    pub fn markets(&self) -> Vec<String> {
        self.contracts
            .values()
            .filter(|record| record.kind == ContractKind::Market)
            .map(|record| record.name.clone())
            .collect()
    }

    /// Raw read-only call to a named contract.
    ///
    /// The first read of a contract checks that its address holds code; an
    /// address from a stale manifest is never trusted blindly.
    pub async fn read_field(&self, name: &str, calldata: Bytes) -> Result<Bytes, ReadFailed> {
        let address = self
            .resolve_address(name)
            .ok_or_else(|| ReadFailed::new(name, format!("not deployed on network {}", self.network)))?;

        if !self.verified.lock().contains(&address) {
            let code = self
                .client
                .code_at(address)
                .await
                .map_err(|e| ReadFailed::new(name, format!("{e:#}")))?;
            if code.is_empty() {
                return Err(ReadFailed::new(name, format!("no code at {address}")));
            }
            self.verified.lock().insert(address);
        }

        self.client
            .call(address, calldata)
            .await
            .map_err(|e| ReadFailed::new(name, format!("{e:#}")))
    }

    async fn read<T: SolCall>(&self, name: &str, call: &T) -> Result<T::Return, ReadFailed> {
        let output = self.read_field(name, call.abi_encode().into()).await?;
        T::abi_decode_returns(&output, true)
            .map_err(|e| ReadFailed::new(name, format!("cannot decode {}: {e}", T::SIGNATURE)))
    }

    pub async fn token_balance(&self, token: &str, account: Address) -> Option<U256> {
        match self
            .read(token, &IMintableToken::balanceOfCall { account })
            .await
        {
            Ok(ret) => Some(ret._0),
            Err(err) => {
                tracing::debug!(%err, %account, "Token balance unavailable");
                None
            }
        }
    }

    pub async fn loan_ids(&self, market: &str, account: Address) -> Vec<U256> {
        match self
            .read(market, &IMercado::getUsersLoanIdsCall { user: account })
            .await
        {
            Ok(ret) => ret._0,
            Err(err) => {
                tracing::debug!(%err, %account, "Loan ids unavailable");
                Vec::new()
            }
        }
    }

    pub async fn loan(&self, market: &str, id: U256) -> Option<IMercado::Loan> {
        match self.read(market, &IMercado::getLoanCall { loanId: id }).await {
            Ok(ret) => Some(ret._0),
            Err(err) => {
                tracing::debug!(%err, %id, "Loan unavailable");
                None
            }
        }
    }

    /// Loans of `account`. Id 0 is the market's "no loan" sentinel and is skipped.
    pub async fn positions(&self, market: &str, account: Address) -> Vec<IMercado::Loan> {
        let mut loans = Vec::new();
        for id in self.loan_ids(market, account).await {
            if id.is_zero() {
                continue;
            }
            if let Some(loan) = self.loan(market, id).await {
                loans.push(loan);
            }
        }
        loans
    }

    /// Send a state-changing call to a named contract from `from`.
    ///
    /// Returns immediately; the handle reports `Pending` until the transaction
    /// confirms or fails.
    pub fn submit_write(&self, name: &str, from: Address, calldata: Bytes) -> WriteHandle {
        let Some(to) = self.resolve_address(name) else {
            return WriteHandle::resolved(WriteStatus::Failed {
                reason: format!("{name} is not deployed on network {}", self.network),
            });
        };

        let (tx, rx) = watch::channel(WriteStatus::Pending);
        let client = Arc::clone(&self.client);
        let confirmation = self.confirmation;
        let name = name.to_string();

        tokio::spawn(async move {
            let request = TransactionRequest::call(from, to, calldata);
            let status = match confirmation.send_and_confirm(client.as_ref(), request).await {
                Ok(receipt) if receipt.success => WriteStatus::Confirmed {
                    tx_hash: receipt.tx_hash,
                    block_number: receipt.block_number,
                },
                Ok(receipt) => WriteStatus::Failed {
                    reason: format!("transaction {} reverted", receipt.tx_hash),
                },
                Err(err) => WriteStatus::Failed {
                    reason: format!("{err:#}"),
                },
            };
            tracing::debug!(contract = %name, ?status, "Write settled");
            let _ = tx.send(status);
        });

        WriteHandle { status: rx }
    }
}
