//! Deployed contracts of one or more networks, keyed by logical name.

use std::collections::BTreeMap;

use alloy_core::{
    dyn_abi::DynSolValue,
    json_abi::JsonAbi,
    primitives::{Address, B256, U256},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{contracts::ContractKind, error::BootstrapError};

/// A resolved constructor argument, as it was passed to the contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", tag = "type", content = "value")]
pub enum ArgValue {
    Address(Address),
    Uint(U256),
    Bool(bool),
    String(String),
}

impl ArgValue {
    pub fn to_sol_value(&self) -> DynSolValue {
        match self {
            ArgValue::Address(address) => DynSolValue::Address(*address),
            ArgValue::Uint(value) => DynSolValue::Uint(*value, 256),
            ArgValue::Bool(value) => DynSolValue::Bool(*value),
            ArgValue::String(value) => DynSolValue::String(value.clone()),
        }
    }

    /// ABI-encode a constructor argument list (as function parameters).
    pub fn encode_params(args: &[ArgValue]) -> Vec<u8> {
        if args.is_empty() {
            return Vec::new();
        }
        DynSolValue::Tuple(args.iter().map(ArgValue::to_sol_value).collect()).abi_encode_params()
    }
}

/// One successful deployment of a contract on a network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractRecord {
    /// Logical name, unique per network.
    pub name: String,
    pub kind: ContractKind,
    pub address: Address,
    pub abi: JsonAbi,
    /// Constructor arguments the contract was created with.
    pub constructor_args: Vec<ArgValue>,
    /// Hash of creation bytecode and encoded constructor arguments.
    pub fingerprint: String,
    /// Hash of the creation transaction.
    pub tx_hash: B256,
    pub block_number: u64,
    pub deployed_at: DateTime<Utc>,
}

/// Mapping from `(network id, logical name)` to [`ContractRecord`].
///
/// A registry is owned by a single bootstrap run and handed to every step by
/// mutable reference; it is never shared between runs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AddressRegistry {
    networks: BTreeMap<u64, BTreeMap<String, ContractRecord>>,
}

impl AddressRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) the record of `record.name` on `network`.
    pub fn record(&mut self, network: u64, record: ContractRecord) {
        tracing::debug!(
            network,
            name = %record.name,
            address = %record.address,
            "Contract registered"
        );
        self.networks
            .entry(network)
            .or_default()
            .insert(record.name.clone(), record);
    }

    /// Look up a deployed contract.
    pub fn resolve(&self, name: &str, network: u64) -> Result<&ContractRecord, BootstrapError> {
        self.get(name, network)
            .ok_or_else(|| BootstrapError::DependencyUnresolved {
                name: name.to_string(),
                network,
            })
    }

    pub fn get(&self, name: &str, network: u64) -> Option<&ContractRecord> {
        self.networks.get(&network).and_then(|records| records.get(name))
    }

    pub fn contains(&self, name: &str, network: u64) -> bool {
        self.get(name, network).is_some()
    }

    /// Records of a network, ordered by name.
    pub fn network(&self, network: u64) -> impl Iterator<Item = &ContractRecord> {
        self.networks.get(&network).into_iter().flat_map(|records| records.values())
    }

    pub fn networks(&self) -> impl Iterator<Item = u64> + '_ {
        self.networks.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.networks.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Take every record of `network`, leaving it empty.
    pub fn take_network(&mut self, network: u64) -> BTreeMap<String, ContractRecord> {
        self.networks.remove(&network).unwrap_or_default()
    }

    pub(crate) fn insert_network(&mut self, network: u64, records: BTreeMap<String, ContractRecord>) {
        self.networks.insert(network, records);
    }
}
