//! mercado-deploy - Deployment library for the MercadoSantaFe demo.
//!
//! This crate deploys the demo contracts in dependency order, binds their
//! circular references, seeds balances and liquidity, and persists a manifest
//! that read-only frontends consume through the [`ReadBridge`].

mod accounts;
pub use accounts::{AccountBook, DEPLOYER, DEV_MNEMONIC, demo_role, derive_addresses};

mod artifact;
pub use artifact::{ArtifactDir, ArtifactSource, ContractArtifact, SyntheticArtifacts};

mod bootstrap;
pub use bootstrap::{Bootstrap, BootstrapReport};

mod bridge;
pub use bridge::{ReadBridge, ReadFailed, TrackedToken, WriteHandle, WriteStatus};

mod builder;
pub use builder::NetworkRunBuilder;

mod chain;
pub use chain::{ChainClient, ChainError, TransactionRequest, TxReceipt};

mod config;
pub use config::{CONFIG_FILENAME, DEVNET, LOCALHOST, NetworkSettings, Settings};

mod confirm;
pub use confirm::ConfirmationPolicy;

pub mod contracts;
pub use contracts::ContractKind;

mod deployer;
pub use deployer::{ContractDeployer, DeployOutcome};

mod devnet;
pub use devnet::{DEVNET_CHAIN_ID, Devnet, ORACLE_PRICE};

mod error;
pub use error::BootstrapError;

mod fingerprint;
pub use fingerprint::{DeploymentFingerprint, SeedingRecord, json_hash};

mod manifest;
pub use manifest::{DEFAULT_MANIFEST_PATH, MANIFEST_VERSION, Manifest, ManifestStore, NetworkManifest};

pub mod plan;
pub use plan::{
    AddressRef, Amount, BindStep, BootstrapPlan, ConstructorArg, DeployStep, SeedingAction,
    SeedingConfig,
};

mod registry;
pub use registry::{AddressRegistry, ArgValue, ContractRecord};

mod rpc;
pub use rpc::RpcClient;

mod seed;
pub use seed::Seeder;
