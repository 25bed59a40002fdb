//! Persisted deployment manifest, consumed by readers that never deploy.
//!
//! The manifest is a versioned JSON document keyed by network id and logical
//! contract name:
//!
//! ```json
//! {
//!   "version": 1,
//!   "networks": {
//!     "31337": {
//!       "contracts": { "XOCToken": { "address": "0x...", "abi": [...], ... } },
//!       "seeding": { "plan_hash": "...", "completed_at": "...", "mercado_version": "0.1.0" }
//!     }
//!   }
//! }
//! ```

use std::{
    collections::BTreeMap,
    fs::OpenOptions,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use fs2::FileExt;
use serde::{Deserialize, Serialize};

use crate::{
    fingerprint::SeedingRecord,
    registry::{AddressRegistry, ContractRecord},
};

/// Current manifest schema version.
pub const MANIFEST_VERSION: u32 = 1;

/// Default location of the manifest, relative to the working directory.
pub const DEFAULT_MANIFEST_PATH: &str = "deployments/manifest.json";

/// Everything recorded about one network.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkManifest {
    #[serde(default)]
    pub contracts: BTreeMap<String, ContractRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seeding: Option<SeedingRecord>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    pub version: u32,
    #[serde(default)]
    pub networks: BTreeMap<u64, NetworkManifest>,
}

impl Default for Manifest {
    fn default() -> Self {
        Self {
            version: MANIFEST_VERSION,
            networks: BTreeMap::new(),
        }
    }
}

impl Manifest {
    pub fn network(&self, network: u64) -> Option<&NetworkManifest> {
        self.networks.get(&network)
    }

    pub fn contract(&self, network: u64, name: &str) -> Option<&ContractRecord> {
        self.network(network).and_then(|n| n.contracts.get(name))
    }

    /// Replace the contracts of `network` with what `registry` holds for it.
    ///
    /// The seeding marker is replaced too; `None` clears a previous marker.
    pub fn merge_network(
        &mut self,
        network: u64,
        registry: &AddressRegistry,
        seeding: Option<SeedingRecord>,
    ) {
        let contracts = registry
            .network(network)
            .map(|record| (record.name.clone(), record.clone()))
            .collect();
        self.networks.insert(
            network,
            NetworkManifest {
                contracts,
                seeding,
            },
        );
    }

    /// Registry view of every network in the manifest.
    pub fn to_registry(&self) -> AddressRegistry {
        let mut registry = AddressRegistry::new();
        for (network, manifest) in &self.networks {
            registry.insert_network(*network, manifest.contracts.clone());
        }
        registry
    }

    fn parse(content: &str, path: &Path) -> Result<Self> {
        let manifest: Self = serde_json::from_str(content)
            .with_context(|| format!("Failed to parse manifest {}", path.display()))?;
        if manifest.version != MANIFEST_VERSION {
            anyhow::bail!(
                "Unsupported manifest version {} in {} (expected {})",
                manifest.version,
                path.display(),
                MANIFEST_VERSION
            );
        }
        Ok(manifest)
    }
}

/// File-backed manifest.
///
/// Updates take an exclusive lock on a sibling `.lock` file, so bootstrap runs
/// against different networks can merge their sections into the same file.
#[derive(Debug, Clone)]
pub struct ManifestStore {
    path: PathBuf,
}

impl ManifestStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the manifest. A missing file is an empty manifest.
    pub fn load(&self) -> Result<Manifest> {
        if !self.path.exists() {
            tracing::debug!(path = %self.path.display(), "No manifest yet, starting empty");
            return Ok(Manifest::default());
        }

        let content = std::fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read manifest {}", self.path.display()))?;
        Manifest::parse(&content, &self.path)
    }

    /// Replace the section of `network` with the content of `registry`.
    pub fn update(
        &self,
        network: u64,
        registry: &AddressRegistry,
        seeding: Option<SeedingRecord>,
    ) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create manifest directory {}", parent.display())
            })?;
        }

        let lock_path = self.path.with_extension("json.lock");
        let lock = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&lock_path)
            .with_context(|| format!("Failed to open manifest lock {}", lock_path.display()))?;
        lock.lock_exclusive()
            .context("Failed to acquire manifest lock")?;

        let result = self.load().and_then(|mut manifest| {
            manifest.merge_network(network, registry, seeding);
            self.write(&manifest)
        });

        lock.unlock().context("Failed to release manifest lock")?;
        result?;

        tracing::info!(
            path = %self.path.display(),
            network,
            contracts = registry.network(network).count(),
            "Manifest saved"
        );
        Ok(())
    }

    fn write(&self, manifest: &Manifest) -> Result<()> {
        let json =
            serde_json::to_string_pretty(manifest).context("Failed to serialize manifest")?;
        let tmp_path = self.path.with_extension("json.tmp");
        std::fs::write(&tmp_path, json)
            .with_context(|| format!("Failed to write manifest to {}", tmp_path.display()))?;
        std::fs::rename(&tmp_path, &self.path)
            .with_context(|| format!("Failed to move manifest into {}", self.path.display()))?;
        Ok(())
    }
}
