//! Named accounts participating in a bootstrap.

use std::collections::BTreeMap;

use alloy_core::primitives::Address;
use alloy_signer_local::{MnemonicBuilder, coins_bip39::English};
use anyhow::Context;
use derive_more::Deref;

use crate::error::BootstrapError;

/// Role of the account that pays for and authorizes every deployment.
pub const DEPLOYER: &str = "deployer";

/// The well-known development mnemonic shared by Hardhat and Anvil.
pub const DEV_MNEMONIC: &str = "test test test test test test test test test test test junk";

/// Role name of the `n`th demonstration account (1-based).
pub fn demo_role(n: usize) -> String {
    format!("demo-{n}")
}

/// Derive the first `count` addresses of a BIP-39 mnemonic (`m/44'/60'/0'/0/i`).
pub fn derive_addresses(mnemonic: &str, count: usize) -> anyhow::Result<Vec<Address>> {
    (0..count)
        .map(|index| {
            let signer = MnemonicBuilder::<English>::default()
                .phrase(mnemonic)
                .index(index as u32)
                .with_context(|| format!("Invalid derivation index {index}"))?
                .build()
                .with_context(|| format!("Failed to derive account {index} from mnemonic"))?;
            Ok(Address::from_slice(signer.address().as_slice()))
        })
        .collect()
}

/// Mapping from account role to address.
///
/// Always contains the [`DEPLOYER`] role; demonstration accounts are registered
/// as `demo-1`, `demo-2`, ...
#[derive(Debug, Clone, PartialEq, Eq, Deref)]
pub struct AccountBook(BTreeMap<String, Address>);

impl AccountBook {
    pub fn new(deployer: Address) -> Self {
        Self(BTreeMap::from([(DEPLOYER.to_string(), deployer)]))
    }

    /// Register the demonstration accounts, replacing previously registered ones.
    pub fn with_demo_accounts(mut self, demo: impl IntoIterator<Item = Address>) -> Self {
        self.0.retain(|role, _| role == DEPLOYER);
        for (i, address) in demo.into_iter().enumerate() {
            self.0.insert(demo_role(i + 1), address);
        }
        self
    }

    pub fn with_account(mut self, role: impl Into<String>, address: Address) -> Self {
        self.0.insert(role.into(), address);
        self
    }

    pub fn deployer(&self) -> Address {
        self.0[DEPLOYER]
    }

    /// Demonstration account roles, in registration order.
    pub fn demo_roles(&self) -> Vec<String> {
        let mut roles: Vec<(usize, String)> = self
            .0
            .keys()
            .filter_map(|role| {
                role.strip_prefix("demo-")
                    .and_then(|n| n.parse::<usize>().ok())
                    .map(|n| (n, role.clone()))
            })
            .collect();
        roles.sort();
        roles.into_iter().map(|(_, role)| role).collect()
    }

    pub fn resolve(&self, role: &str) -> Result<Address, BootstrapError> {
        self.0
            .get(role)
            .copied()
            .ok_or_else(|| BootstrapError::UnknownAccount {
                role: role.to_string(),
            })
    }
}
