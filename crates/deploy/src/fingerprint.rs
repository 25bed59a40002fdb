//! Content hashes used to detect what a re-run may skip.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Identity of a contract deployment: what code is created with which arguments.
///
/// Two deployments with the same fingerprint on the same network are
/// interchangeable, so the second one can reuse the first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeploymentFingerprint<'a> {
    /// Creation bytecode of the contract.
    pub bytecode: &'a [u8],
    /// ABI-encoded constructor arguments.
    pub encoded_args: &'a [u8],
}

impl DeploymentFingerprint<'_> {
    /// Compute a SHA-256 hash of the bytecode and constructor arguments.
    ///
    /// The bytecode length is hashed first so that moving bytes between the
    /// bytecode and the arguments changes the hash.
    pub fn compute_hash(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update((self.bytecode.len() as u64).to_be_bytes());
        hasher.update(self.bytecode);
        hasher.update(self.encoded_args);
        hex::encode(hasher.finalize())
    }
}

/// SHA-256 of the JSON serialization of `value`.
pub fn json_hash<T: Serialize>(value: &T) -> Result<String> {
    let json = serde_json::to_vec(value).context("Failed to serialize value for hashing")?;
    Ok(hex::encode(Sha256::digest(&json)))
}

/// Marker stored in the manifest once the seeding phase of a plan completed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeedingRecord {
    /// Hash of the seeding actions that ran.
    pub plan_hash: String,
    /// When the last seeding action confirmed.
    pub completed_at: DateTime<Utc>,
    /// Version of mercado that ran the seeding.
    pub mercado_version: String,
}

impl SeedingRecord {
    pub fn new(plan_hash: String) -> Self {
        Self {
            plan_hash,
            completed_at: Utc::now(),
            mercado_version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}
