//! Executing a [`BootstrapPlan`] against one network.

use alloy_core::primitives::{Address, Bytes};
use anyhow::{Context, Result};

use crate::{
    accounts::AccountBook,
    artifact::ArtifactSource,
    chain::{ChainClient, TransactionRequest},
    confirm::ConfirmationPolicy,
    contracts::selector,
    deployer::{ContractDeployer, DeployOutcome},
    error::BootstrapError,
    fingerprint::{SeedingRecord, json_hash},
    manifest::NetworkManifest,
    plan::{BindStep, BootstrapPlan, Step},
    registry::AddressRegistry,
    seed::Seeder,
};

/// What a bootstrap run did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BootstrapReport {
    pub network: u64,
    /// Contracts deployed by this run.
    pub deployed: Vec<String>,
    /// Contracts reused from an earlier run.
    pub reused: Vec<String>,
    /// Bindings established by this run, as `contract -> counterpart`.
    pub bound: Vec<String>,
    /// Bindings that were already in place.
    pub already_bound: Vec<String>,
    /// Seeding actions that sent a transaction.
    pub seeded: usize,
    /// Seeding was skipped because it already ran for this plan.
    pub seeding_skipped: bool,
    /// Seeding marker to persist with the manifest.
    pub seeding: Option<SeedingRecord>,
}

/// Runs the deploy, bind and seed phases of a plan, one confirmed transaction
/// at a time.
pub struct Bootstrap<'a, C> {
    client: &'a C,
    network: u64,
    accounts: &'a AccountBook,
    artifacts: &'a dyn ArtifactSource,
    previous: Option<&'a NetworkManifest>,
    confirmation: ConfirmationPolicy,
    reseed: bool,
}

impl<'a, C: ChainClient> Bootstrap<'a, C> {
    pub fn new(
        client: &'a C,
        network: u64,
        accounts: &'a AccountBook,
        artifacts: &'a dyn ArtifactSource,
    ) -> Self {
        Self {
            client,
            network,
            accounts,
            artifacts,
            previous: None,
            confirmation: ConfirmationPolicy::default(),
            reseed: false,
        }
    }

    /// What an earlier run recorded for this network.
    pub fn with_previous(mut self, previous: Option<&'a NetworkManifest>) -> Self {
        self.previous = previous;
        self
    }

    pub fn with_confirmation(mut self, confirmation: ConfirmationPolicy) -> Self {
        self.confirmation = confirmation;
        self
    }

    /// Run seeding even when it already completed for the same plan.
    pub fn with_reseed(mut self, reseed: bool) -> Self {
        self.reseed = reseed;
        self
    }

    /// Execute `plan`, registering deployments into `registry` as they confirm.
    ///
    /// The plan is validated before the first transaction. On failure the run
    /// stops at the failing step; everything registered up to that point stays
    /// in `registry`.
    pub async fn run(
        &self,
        plan: &BootstrapPlan,
        registry: &mut AddressRegistry,
    ) -> Result<BootstrapReport> {
        plan.validate(self.network, self.accounts)
            .context("Bootstrap plan is invalid")?;

        let mut report = BootstrapReport {
            network: self.network,
            ..Default::default()
        };

        let plan_hash = json_hash(&plan.seeding)?;
        let deployer = self.accounts.deployer();
        let contract_deployer =
            ContractDeployer::new(self.client, self.network, self.artifacts, self.confirmation)
                .with_previous(self.previous);
        let seeder = Seeder::new(self.client, self.network, self.accounts, self.confirmation);

        tracing::info!(
            network = self.network,
            %deployer,
            deploys = plan.deploys.len(),
            bindings = plan.bindings.len(),
            seeding = plan.seeding.len(),
            "Starting bootstrap"
        );

        let mut seeding_decided = false;
        for (i, step) in plan.steps().into_iter().enumerate() {
            let step_context = || format!("bootstrap step #{} ({step}) failed", i + 1);

            match step {
                Step::Deploy(deploy) => {
                    let outcome = contract_deployer
                        .deploy(registry, self.accounts, deploy, deployer)
                        .await
                        .with_context(step_context)?;
                    match outcome {
                        DeployOutcome::Deployed(record) => report.deployed.push(record.name),
                        DeployOutcome::Reused(record) => report.reused.push(record.name),
                    }
                }
                Step::Bind(bind) => {
                    let changed = self
                        .bind(registry, bind, deployer)
                        .await
                        .with_context(step_context)?;
                    let label = format!("{} -> {}", bind.contract, bind.counterpart);
                    if changed {
                        report.bound.push(label);
                    } else {
                        report.already_bound.push(label);
                    }
                }
                Step::Seed(action) => {
                    if !seeding_decided {
                        seeding_decided = true;
                        report.seeding_skipped = self.seeding_done(&plan_hash, &report);
                        if report.seeding_skipped {
                            tracing::info!(
                                network = self.network,
                                "Seeding already completed for this plan, skipping (use --reseed to force)"
                            );
                        }
                    }
                    if report.seeding_skipped {
                        continue;
                    }
                    if seeder
                        .run(registry, action)
                        .await
                        .with_context(step_context)?
                    {
                        report.seeded += 1;
                    }
                }
            }
        }

        report.seeding = if report.seeding_skipped {
            self.previous.and_then(|previous| previous.seeding.clone())
        } else {
            Some(SeedingRecord::new(plan_hash))
        };

        tracing::info!(
            network = self.network,
            deployed = report.deployed.len(),
            reused = report.reused.len(),
            bound = report.bound.len(),
            seeded = report.seeded,
            "Bootstrap complete"
        );

        Ok(report)
    }

    /// Whether an earlier run already seeded the exact same contracts.
    fn seeding_done(&self, plan_hash: &str, report: &BootstrapReport) -> bool {
        if self.reseed || !report.deployed.is_empty() {
            return false;
        }
        self.previous
            .and_then(|previous| previous.seeding.as_ref())
            .is_some_and(|seeding| seeding.plan_hash == plan_hash)
    }

    /// Establish a binding. Returns `false` when it was already in place.
    async fn bind(
        &self,
        registry: &AddressRegistry,
        bind: &BindStep,
        from: Address,
    ) -> Result<bool> {
        let contract = registry.resolve(&bind.contract, self.network)?.address;
        let counterpart = registry.resolve(&bind.counterpart, self.network)?.address;

        let current = self.read_binding(contract, &bind.getter).await?;
        if current == counterpart {
            tracing::info!(
                contract = %bind.contract,
                counterpart = %bind.counterpart,
                "Binding already in place"
            );
            return Ok(false);
        }
        if !current.is_zero() {
            return Err(BootstrapError::BindingConflict {
                contract: bind.contract.clone(),
                current,
                requested: counterpart,
            }
            .into());
        }

        tracing::info!(
            contract = %bind.contract,
            counterpart = %bind.counterpart,
            setter = %bind.setter,
            "Binding..."
        );

        let receipt = self
            .confirmation
            .send_and_confirm(
                self.client,
                TransactionRequest::call(from, contract, setter_calldata(&bind.setter, counterpart)),
            )
            .await
            .with_context(|| format!("Failed to send {} to {}", bind.setter, bind.contract))?;
        if !receipt.success {
            anyhow::bail!(
                "{} on {} reverted in transaction {}",
                bind.setter,
                bind.contract,
                receipt.tx_hash
            );
        }

        let bound = self.read_binding(contract, &bind.getter).await?;
        if bound != counterpart {
            anyhow::bail!(
                "{} of {} returns {bound} after binding, expected {counterpart}",
                bind.getter,
                bind.contract
            );
        }

        Ok(true)
    }

    async fn read_binding(&self, contract: Address, getter: &str) -> Result<Address> {
        let output = self
            .client
            .call(contract, Bytes::copy_from_slice(&selector(getter)))
            .await
            .with_context(|| format!("{getter} on {contract} failed"))?;
        decode_address_word(&output).with_context(|| format!("Unexpected {getter} output"))
    }
}

fn setter_calldata(setter: &str, address: Address) -> Bytes {
    let mut data = Vec::with_capacity(36);
    data.extend_from_slice(&selector(setter));
    data.extend_from_slice(address.into_word().as_slice());
    data.into()
}

fn decode_address_word(output: &[u8]) -> Result<Address> {
    if output.len() != 32 {
        anyhow::bail!("expected a 32-byte word, got {} bytes", output.len());
    }
    if output[..12].iter().any(|b| *b != 0) {
        anyhow::bail!("word 0x{} is not an address", hex::encode(output));
    }
    Ok(Address::from_slice(&output[12..]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contracts::{BODEGA_MERCADO_SETTER, IBodega};
    use alloy_sol_types::SolCall;

    #[test]
    fn test_setter_calldata_matches_abi_encoding() {
        let mercado = Address::with_last_byte(0x42);
        let expected = IBodega::setMercadoCall { mercado }.abi_encode();
        assert_eq!(
            setter_calldata(BODEGA_MERCADO_SETTER, mercado).to_vec(),
            expected
        );
    }

    #[test]
    fn test_decode_address_word() {
        let address = Address::with_last_byte(9);
        assert_eq!(
            decode_address_word(address.into_word().as_slice()).unwrap(),
            address
        );
        assert!(decode_address_word(&[0u8; 31]).is_err());
        assert!(decode_address_word(&[0xffu8; 32]).is_err());
    }
}
