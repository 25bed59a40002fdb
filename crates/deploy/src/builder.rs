//! Builder module for running the MercadoSantaFe bootstrap on one network.
//!
//! This module provides the [`NetworkRunBuilder`] struct which connects to the
//! network, resolves the participating accounts, loads the previous manifest,
//! runs the [`Bootstrap`] and persists what it registered.

use std::path::PathBuf;

use anyhow::{Context, Result};

use crate::{
    accounts::{AccountBook, DEV_MNEMONIC, derive_addresses},
    artifact::{ArtifactDir, ArtifactSource, SyntheticArtifacts},
    bootstrap::{Bootstrap, BootstrapReport},
    chain::ChainClient,
    config::{NetworkSettings, Settings},
    devnet::{DEVNET_CHAIN_ID, Devnet},
    fingerprint::SeedingRecord,
    manifest::{DEFAULT_MANIFEST_PATH, ManifestStore, NetworkManifest},
    plan::{BootstrapPlan, SeedingConfig},
    registry::AddressRegistry,
    rpc::RpcClient,
};

/// Builder for a bootstrap run against a single network.
///
/// # Example
///
/// ```no_run
/// use mercado_deploy::{NetworkRunBuilder, Settings};
///
/// # async fn example() -> anyhow::Result<()> {
/// let settings = Settings::load(None)?;
/// let report = NetworkRunBuilder::from_settings(&settings, "localhost")?
///     .reseed(true)
///     .run()
///     .await?;
/// println!("deployed {:?}", report.deployed);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct NetworkRunBuilder {
    /// The configured network name (used in logs only).
    name: String,
    /// Connection settings of the network.
    network: NetworkSettings,
    /// Seeding parameters of the plan.
    seeding: SeedingConfig,
    /// Path of the manifest to read and update.
    manifest: PathBuf,
    /// Directory of compiled artifacts (ignored on the devnet).
    artifacts: PathBuf,
    /// Whether to seed again even if seeding already completed.
    reseed: bool,
    /// Whether to write the manifest. Off by default for the devnet.
    persist: bool,
}

impl NetworkRunBuilder {
    /// Create a new [`NetworkRunBuilder`] with default paths and seeding.
    pub fn new(name: impl Into<String>, network: NetworkSettings) -> Self {
        Self {
            name: name.into(),
            persist: !network.is_devnet(),
            network,
            seeding: SeedingConfig::default(),
            manifest: PathBuf::from(DEFAULT_MANIFEST_PATH),
            artifacts: PathBuf::from(crate::config::DEFAULT_ARTIFACTS_DIR),
            reseed: false,
        }
    }

    /// Create a builder for the configured network `name`.
    pub fn from_settings(settings: &Settings, name: &str) -> Result<Self> {
        Ok(Self::new(name, settings.network(name)?.clone())
            .seeding(settings.seeding.clone())
            .manifest_path(settings.manifest.clone())
            .artifacts_dir(settings.artifacts.clone()))
    }

    pub fn seeding(mut self, seeding: SeedingConfig) -> Self {
        self.seeding = seeding;
        self
    }

    pub fn manifest_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.manifest = path.into();
        self
    }

    pub fn artifacts_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.artifacts = path.into();
        self
    }

    /// Run seeding even if it already completed for the same plan.
    pub fn reseed(mut self, reseed: bool) -> Self {
        self.reseed = reseed;
        self
    }

    /// Set whether the manifest is written after the run.
    pub fn persist(mut self, persist: bool) -> Self {
        self.persist = persist;
        self
    }

    /// Connect to the configured backend and run the bootstrap.
    pub async fn run(self) -> Result<BootstrapReport> {
        match &self.network.rpc_url {
            Some(url) => {
                tracing::info!(network = %self.name, rpc_url = %url, "Connecting to node...");
                let client = RpcClient::new(url.clone())?;
                let artifacts = ArtifactDir::new(&self.artifacts);
                self.run_on(&client, &artifacts).await
            }
            None => {
                tracing::info!(
                    network = %self.name,
                    "Running against the in-process devnet (dry run)"
                );
                let chain_id = self.network.chain_id.unwrap_or(DEVNET_CHAIN_ID);
                let plan = BootstrapPlan::mercado_santa_fe(&self.seeding, &[]);
                let client = Devnet::from_plan(chain_id, &plan)?;
                self.run_on(&client, &SyntheticArtifacts).await
            }
        }
    }

    /// Run the bootstrap through `client`.
    ///
    /// This method:
    /// 1. Checks the chain id against the configured one
    /// 2. Resolves the deployer and the demonstration accounts
    /// 3. Builds and orders the plan
    /// 4. Runs it against what the manifest recorded for this chain
    /// 5. Persists the registry, on success and on failure
    pub async fn run_on<C: ChainClient>(
        &self,
        client: &C,
        artifacts: &dyn ArtifactSource,
    ) -> Result<BootstrapReport> {
        let chain_id = client
            .chain_id()
            .await
            .with_context(|| format!("Failed to fetch chain id of network {}", self.name))?;
        if let Some(expected) = self.network.chain_id {
            if expected != chain_id {
                anyhow::bail!(
                    "Network {} reports chain id {chain_id}, configuration expects {expected}",
                    self.name
                );
            }
        }

        let accounts = self.accounts(client).await?;
        let plan = BootstrapPlan::mercado_santa_fe(&self.seeding, &accounts.demo_roles())
            .sorted()
            .context("Failed to order the bootstrap plan")?;

        let store = ManifestStore::new(&self.manifest);
        let manifest = store.load()?;
        let previous = manifest.network(chain_id);

        tracing::info!(
            network = %self.name,
            chain_id,
            deployer = %accounts.deployer(),
            demo_accounts = accounts.demo_roles().len(),
            previous_contracts = previous.map(|p| p.contracts.len()).unwrap_or_default(),
            "Bootstrapping MercadoSantaFe..."
        );

        let mut registry = AddressRegistry::new();
        let result = Bootstrap::new(client, chain_id, &accounts, artifacts)
            .with_previous(previous)
            .with_confirmation(self.network.confirmation)
            .with_reseed(self.reseed)
            .run(&plan, &mut registry)
            .await;

        if !self.persist {
            tracing::info!(network = %self.name, "Dry run, manifest not written");
            return result;
        }

        match result {
            Ok(report) => {
                store.update(chain_id, &registry, report.seeding.clone())?;
                Ok(report)
            }
            Err(err) => {
                let (registry, seeding) = after_failure(previous, chain_id, registry);
                if let Err(save_err) = store.update(chain_id, &registry, seeding) {
                    tracing::error!(error = %format!("{save_err:#}"), "Failed to save partial manifest");
                }
                Err(err)
            }
        }
    }

    async fn accounts<C: ChainClient>(&self, client: &C) -> Result<AccountBook> {
        let deployer = match self.network.deployer {
            Some(deployer) => deployer,
            None => client
                .accounts()
                .await
                .with_context(|| format!("Failed to list accounts of network {}", self.name))?
                .first()
                .copied()
                .with_context(|| {
                    format!(
                        "Network {} has no unlocked accounts; set a deployer in the configuration",
                        self.name
                    )
                })?,
        };

        // Index 0 of the dev mnemonic is the usual deployer; demo accounts follow it.
        let demo = derive_addresses(DEV_MNEMONIC, self.seeding.demo_accounts + 1)?
            .into_iter()
            .skip(1);
        Ok(AccountBook::new(deployer).with_demo_accounts(demo))
    }
}

/// What to persist after a failed run.
///
/// Records of the previous run that this run did not reach are kept, so the
/// next run can still reuse them. The previous seeding marker survives only if
/// this run deployed nothing new.
fn after_failure(
    previous: Option<&NetworkManifest>,
    network: u64,
    mut registry: AddressRegistry,
) -> (AddressRegistry, Option<SeedingRecord>) {
    let Some(previous) = previous else {
        return (registry, None);
    };

    let deployed_new = registry
        .network(network)
        .any(|record| previous.contracts.get(&record.name) != Some(record));
    let seeding = if deployed_new {
        None
    } else {
        previous.seeding.clone()
    };

    let mut merged = previous.contracts.clone();
    merged.extend(registry.take_network(network));
    registry.insert_network(network, merged);

    (registry, seeding)
}
