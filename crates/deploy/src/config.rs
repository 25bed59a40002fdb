//! `Mercado.toml` configuration.
//!
//! Values are layered: built-in defaults, then the TOML file, then `MERCADO_`
//! environment variables (`__` separates nested keys, e.g.
//! `MERCADO_NETWORKS__LOCALHOST__RPC_URL`).

use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

use alloy_core::primitives::Address;
use anyhow::{Context, Result};
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::{
    confirm::ConfirmationPolicy, devnet::DEVNET_CHAIN_ID, manifest::DEFAULT_MANIFEST_PATH,
    plan::SeedingConfig,
};

/// The default name of the configuration file.
pub const CONFIG_FILENAME: &str = "Mercado.toml";

/// Prefix of environment variable overrides.
pub const ENV_PREFIX: &str = "MERCADO_";

/// Built-in network backed by a node on the default JSON-RPC port.
pub const LOCALHOST: &str = "localhost";

/// Built-in network backed by the in-process devnet.
pub const DEVNET: &str = "devnet";

const LOCALHOST_RPC_URL: &str = "http://127.0.0.1:8545";

/// Default directory of compiled contract artifacts.
pub const DEFAULT_ARTIFACTS_DIR: &str = "artifacts";

/// One deployment target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkSettings {
    /// JSON-RPC endpoint. Without one the network runs on the in-process devnet.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rpc_url: Option<Url>,
    /// Expected chain id; checked against the node before anything is sent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chain_id: Option<u64>,
    /// Deployer account. Defaults to the node's first unlocked account.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deployer: Option<Address>,
    #[serde(default)]
    pub confirmation: ConfirmationPolicy,
}

impl NetworkSettings {
    pub fn rpc(url: Url) -> Self {
        Self {
            rpc_url: Some(url),
            chain_id: None,
            deployer: None,
            confirmation: ConfirmationPolicy::default(),
        }
    }

    pub fn devnet() -> Self {
        Self {
            rpc_url: None,
            chain_id: Some(DEVNET_CHAIN_ID),
            deployer: None,
            confirmation: ConfirmationPolicy::default(),
        }
    }

    pub fn is_devnet(&self) -> bool {
        self.rpc_url.is_none()
    }
}

/// Resolved configuration of the `mercado` tool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Path of the deployment manifest.
    pub manifest: PathBuf,
    /// Directory of compiled contract artifacts.
    pub artifacts: PathBuf,
    pub seeding: SeedingConfig,
    pub networks: BTreeMap<String, NetworkSettings>,
}

impl Default for Settings {
    fn default() -> Self {
        let mut networks = BTreeMap::new();
        if let Ok(url) = Url::parse(LOCALHOST_RPC_URL) {
            networks.insert(LOCALHOST.to_string(), NetworkSettings::rpc(url));
        }
        networks.insert(DEVNET.to_string(), NetworkSettings::devnet());

        Self {
            manifest: PathBuf::from(DEFAULT_MANIFEST_PATH),
            artifacts: PathBuf::from(DEFAULT_ARTIFACTS_DIR),
            seeding: SeedingConfig::default(),
            networks,
        }
    }
}

impl Settings {
    /// The layered configuration sources.
    ///
    /// With no explicit path, `Mercado.toml` in the working directory is used if
    /// present.
    pub fn figment(path: Option<&Path>) -> Figment {
        let file = path
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from(CONFIG_FILENAME));

        Figment::from(Serialized::defaults(Settings::default()))
            .merge(Toml::file(file))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// Load the configuration. An explicit path must exist; it may also be a
    /// directory containing `Mercado.toml`.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(path) if !path.exists() => {
                anyhow::bail!("Configuration file not found: {}", path.display())
            }
            Some(path) if path.is_dir() => Some(path.join(CONFIG_FILENAME)),
            Some(path) => Some(path.to_path_buf()),
            None => None,
        };

        let settings: Self = Self::figment(path.as_deref())
            .extract()
            .context("Failed to load configuration")?;

        tracing::debug!(
            networks = settings.networks.len(),
            manifest = %settings.manifest.display(),
            "Configuration loaded"
        );
        Ok(settings)
    }

    /// Save the configuration to a TOML file.
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let content =
            toml::to_string_pretty(self).context("Failed to serialize configuration to TOML")?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config to {}", path.display()))?;
        tracing::info!(path = %path.display(), "Configuration saved");
        Ok(())
    }

    /// The networks to bootstrap concurrently, in the order given.
    ///
    /// A name given twice is kept once. Two names backed by the same node would
    /// race each other on the deployer's nonce, so they are rejected; devnet
    /// networks are separate in-process chains and never collide.
    pub fn deployment_targets(&self, names: &[String]) -> Result<Vec<String>> {
        let mut targets: Vec<String> = Vec::with_capacity(names.len());
        let mut nodes: BTreeMap<&Url, &str> = BTreeMap::new();

        for name in names {
            if targets.contains(name) {
                tracing::warn!(network = %name, "Network given more than once, running it once");
                continue;
            }

            if let Some(url) = &self.network(name)?.rpc_url {
                if let Some(other) = nodes.insert(url, name.as_str()) {
                    anyhow::bail!(
                        "Networks '{other}' and '{name}' both use {url}; deploy to one node at a time"
                    );
                }
            }
            targets.push(name.clone());
        }

        Ok(targets)
    }

    pub fn network(&self, name: &str) -> Result<&NetworkSettings> {
        self.networks.get(name).with_context(|| {
            format!(
                "Unknown network '{name}' (configured: {})",
                self.networks
                    .keys()
                    .map(String::as_str)
                    .collect::<Vec<_>>()
                    .join(", ")
            )
        })
    }
}
