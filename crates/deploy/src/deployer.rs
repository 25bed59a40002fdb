//! Publishing a single contract, idempotently per network.

use alloy_core::primitives::{Address, Bytes};
use anyhow::{Context, Result};
use chrono::Utc;

use crate::{
    accounts::AccountBook,
    artifact::ArtifactSource,
    chain::{ChainClient, TransactionRequest},
    confirm::ConfirmationPolicy,
    error::BootstrapError,
    fingerprint::DeploymentFingerprint,
    manifest::NetworkManifest,
    plan::DeployStep,
    registry::{AddressRegistry, ArgValue, ContractRecord},
};

/// What [`ContractDeployer::deploy`] did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeployOutcome {
    /// A creation transaction was sent and confirmed.
    Deployed(ContractRecord),
    /// An identical earlier deployment is live and was reused.
    Reused(ContractRecord),
}

impl DeployOutcome {
    pub fn record(&self) -> &ContractRecord {
        match self {
            DeployOutcome::Deployed(record) | DeployOutcome::Reused(record) => record,
        }
    }

    pub fn is_reused(&self) -> bool {
        matches!(self, DeployOutcome::Reused(_))
    }
}

/// Deploys contracts on one network and registers them.
///
/// `previous` is what an earlier run recorded for the same network; deployments
/// whose fingerprint matches a live previous record are not repeated.
pub struct ContractDeployer<'a, C> {
    client: &'a C,
    network: u64,
    artifacts: &'a dyn ArtifactSource,
    previous: Option<&'a NetworkManifest>,
    confirmation: ConfirmationPolicy,
}

impl<'a, C: ChainClient> ContractDeployer<'a, C> {
    pub fn new(
        client: &'a C,
        network: u64,
        artifacts: &'a dyn ArtifactSource,
        confirmation: ConfirmationPolicy,
    ) -> Self {
        Self {
            client,
            network,
            artifacts,
            previous: None,
            confirmation,
        }
    }

    pub fn with_previous(mut self, previous: Option<&'a NetworkManifest>) -> Self {
        self.previous = previous;
        self
    }

    /// Deploy `step` from the `from` account.
    ///
    /// Constructor arguments are resolved before anything is sent, so a missing
    /// dependency fails with [`BootstrapError::DependencyUnresolved`] and no
    /// transaction. On any failure nothing is registered.
    pub async fn deploy(
        &self,
        registry: &mut AddressRegistry,
        accounts: &AccountBook,
        step: &DeployStep,
        from: Address,
    ) -> Result<DeployOutcome> {
        let args = step
            .args
            .iter()
            .map(|arg| arg.resolve(registry, self.network, accounts))
            .collect::<Result<Vec<ArgValue>, BootstrapError>>()?;

        let artifact = self
            .artifacts
            .load(&step.artifact)
            .with_context(|| format!("Failed to load artifact for {}", step.name))?;

        let encoded_args = ArgValue::encode_params(&args);
        let fingerprint = DeploymentFingerprint {
            bytecode: &artifact.bytecode,
            encoded_args: &encoded_args,
        }
        .compute_hash();

        if let Some(record) = self.live_previous_record(&step.name, &fingerprint).await? {
            tracing::info!(
                name = %step.name,
                address = %record.address,
                "Contract already deployed with identical bytecode and arguments, skipping"
            );
            registry.record(self.network, record.clone());
            return Ok(DeployOutcome::Reused(record));
        }

        tracing::info!(
            name = %step.name,
            network = self.network,
            %from,
            args = args.len(),
            "Deploying contract..."
        );

        let init_code: Bytes = [artifact.bytecode.as_ref(), encoded_args.as_slice()]
            .concat()
            .into();
        let failed = |reason: String| BootstrapError::DeploymentFailed {
            name: step.name.clone(),
            reason,
        };

        let receipt = self
            .confirmation
            .send_and_confirm(self.client, TransactionRequest::create(from, init_code))
            .await
            .map_err(|e| failed(format!("{e:#}")))?;

        if !receipt.success {
            return Err(failed(format!("creation transaction {} reverted", receipt.tx_hash)).into());
        }
        let address = receipt.contract_address.ok_or_else(|| {
            failed(format!(
                "receipt of {} carries no contract address",
                receipt.tx_hash
            ))
        })?;

        let record = ContractRecord {
            name: step.name.clone(),
            kind: step.kind,
            address,
            abi: artifact.abi,
            constructor_args: args,
            fingerprint,
            tx_hash: receipt.tx_hash,
            block_number: receipt.block_number,
            deployed_at: Utc::now(),
        };

        tracing::info!(
            name = %record.name,
            address = %record.address,
            tx_hash = %record.tx_hash,
            block = record.block_number,
            "Contract deployed"
        );

        registry.record(self.network, record.clone());
        Ok(DeployOutcome::Deployed(record))
    }

    /// The previous record of `name` if it has the same fingerprint and its
    /// address still holds code (a restarted dev node loses everything).
    async fn live_previous_record(
        &self,
        name: &str,
        fingerprint: &str,
    ) -> Result<Option<ContractRecord>> {
        let Some(record) = self
            .previous
            .and_then(|previous| previous.contracts.get(name))
        else {
            return Ok(None);
        };

        if record.fingerprint != fingerprint {
            tracing::info!(
                name,
                previous = %record.address,
                "Bytecode or constructor arguments changed, redeploying"
            );
            return Ok(None);
        }

        let code = self
            .client
            .code_at(record.address)
            .await
            .with_context(|| format!("Failed to fetch code of {name} at {}", record.address))?;
        if code.is_empty() {
            tracing::warn!(
                name,
                address = %record.address,
                "Recorded deployment has no code on chain (network reset?), redeploying"
            );
            return Ok(None);
        }

        Ok(Some(record.clone()))
    }
}
