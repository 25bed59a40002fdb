//! Seeding actions: allocate, approve, deposit.

use alloy_core::primitives::{Address, U256};
use alloy_sol_types::SolCall;

use crate::{
    accounts::{AccountBook, DEPLOYER},
    chain::{ChainClient, TransactionRequest},
    confirm::ConfirmationPolicy,
    contracts::{IBodega, IMintableToken, call_view},
    error::BootstrapError,
    plan::{Amount, SeedingAction},
    registry::AddressRegistry,
};

/// `units` whole tokens in base units, `None` when that does not fit in 256 bits.
fn scale_units(units: u64, decimals: u8) -> Option<U256> {
    U256::from(10u8)
        .checked_pow(U256::from(decimals))
        .and_then(|scale| scale.checked_mul(U256::from(units)))
}

/// Addresses of a seeding action, resolved before anything is sent.
struct Resolved {
    sender: Address,
    target: Address,
    token: Address,
    /// Account whose balance `Amount::Balance` refers to.
    holder: Address,
    /// Recipient, spender or beneficiary.
    counterparty: Address,
}

/// Executes seeding actions one by one, each confirmed before returning.
pub struct Seeder<'a, C> {
    client: &'a C,
    network: u64,
    accounts: &'a AccountBook,
    confirmation: ConfirmationPolicy,
}

impl<'a, C: ChainClient> Seeder<'a, C> {
    pub fn new(
        client: &'a C,
        network: u64,
        accounts: &'a AccountBook,
        confirmation: ConfirmationPolicy,
    ) -> Self {
        Self {
            client,
            network,
            accounts,
            confirmation,
        }
    }

    fn resolve(
        &self,
        registry: &AddressRegistry,
        action: &SeedingAction,
    ) -> Result<Resolved, BootstrapError> {
        let contract = |name: &str| registry.resolve(name, self.network).map(|r| r.address);
        let at = |address: &crate::plan::AddressRef| {
            address.resolve(registry, self.network, self.accounts)
        };

        Ok(match action {
            SeedingAction::Allocate { token, to, .. } => {
                let token = contract(token)?;
                let to = at(to)?;
                Resolved {
                    sender: self.accounts.resolve(DEPLOYER)?,
                    target: token,
                    token,
                    holder: to,
                    counterparty: to,
                }
            }
            SeedingAction::Approve {
                token,
                owner,
                spender,
                ..
            } => {
                let token = contract(token)?;
                let owner = self.accounts.resolve(owner)?;
                Resolved {
                    sender: owner,
                    target: token,
                    token,
                    holder: owner,
                    counterparty: at(spender)?,
                }
            }
            SeedingAction::Deposit {
                vault,
                token,
                depositor,
                beneficiary,
                ..
            } => {
                let depositor = self.accounts.resolve(depositor)?;
                Resolved {
                    sender: depositor,
                    target: contract(vault)?,
                    token: contract(token)?,
                    holder: depositor,
                    counterparty: at(beneficiary)?,
                }
            }
        })
    }

    async fn amount(&self, amount: Amount, token: Address, holder: Address) -> anyhow::Result<U256> {
        Ok(match amount {
            Amount::Units(units) => {
                let decimals = call_view(self.client, token, &IMintableToken::decimalsCall {})
                    .await?
                    ._0;
                scale_units(units, decimals).ok_or_else(|| {
                    anyhow::anyhow!("{units} tokens with {decimals} decimals overflow uint256")
                })?
            }
            Amount::Raw(raw) => raw,
            Amount::Unlimited => U256::MAX,
            Amount::Balance => {
                call_view(
                    self.client,
                    token,
                    &IMintableToken::balanceOfCall { account: holder },
                )
                .await?
                ._0
            }
        })
    }

    /// Run one action to confirmation.
    ///
    /// Returns `false` when the action had nothing to do (a deposit of a zero
    /// balance).
    pub async fn run(
        &self,
        registry: &AddressRegistry,
        action: &SeedingAction,
    ) -> anyhow::Result<bool> {
        let resolved = self.resolve(registry, action)?;

        let failed = |reason: String| BootstrapError::SeedingActionFailed {
            action: action.to_string(),
            reason,
        };

        let amount_spec = match action {
            SeedingAction::Allocate { amount, .. }
            | SeedingAction::Approve { amount, .. }
            | SeedingAction::Deposit { amount, .. } => *amount,
        };
        let amount = self
            .amount(amount_spec, resolved.token, resolved.holder)
            .await
            .map_err(|e| failed(format!("failed to compute amount: {e:#}")))?;

        let calldata = match action {
            SeedingAction::Allocate { .. } => IMintableToken::allocateToCall {
                to: resolved.counterparty,
                amount,
            }
            .abi_encode(),
            SeedingAction::Approve { .. } => IMintableToken::approveCall {
                spender: resolved.counterparty,
                amount,
            }
            .abi_encode(),
            SeedingAction::Deposit { .. } => {
                if amount.is_zero() {
                    tracing::warn!(%action, "Nothing to deposit, skipping");
                    return Ok(false);
                }
                IBodega::depositCall {
                    amount,
                    onBehalfOf: resolved.counterparty,
                }
                .abi_encode()
            }
        };

        tracing::info!(%action, %amount, sender = %resolved.sender, "Seeding...");

        let receipt = self
            .confirmation
            .send_and_confirm(
                self.client,
                TransactionRequest::call(resolved.sender, resolved.target, calldata),
            )
            .await
            .map_err(|e| failed(format!("{e:#}")))?;

        if !receipt.success {
            return Err(failed(format!("transaction {} reverted", receipt.tx_hash)).into());
        }

        tracing::debug!(%action, tx_hash = %receipt.tx_hash, "Seeding action confirmed");
        Ok(true)
    }
}
