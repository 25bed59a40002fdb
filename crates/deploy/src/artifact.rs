//! Compiled contract artifacts (ABI + creation bytecode).

use std::path::{Path, PathBuf};

use alloy_core::{json_abi::JsonAbi, primitives::{Bytes, keccak256}};
use anyhow::Context;
use serde::Deserialize;

/// ABI and creation bytecode of a contract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContractArtifact {
    pub name: String,
    pub abi: JsonAbi,
    pub bytecode: Bytes,
}

/// On-disk artifact shape shared by Hardhat and Foundry.
///
/// Foundry nests the bytecode as `{ "object": "0x..." }`, Hardhat stores it as a
/// plain string.
#[derive(Debug, Deserialize)]
struct ArtifactFile {
    abi: JsonAbi,
    bytecode: BytecodeField,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum BytecodeField {
    Plain(Bytes),
    Object { object: Bytes },
}

impl From<BytecodeField> for Bytes {
    fn from(field: BytecodeField) -> Self {
        match field {
            BytecodeField::Plain(bytes) | BytecodeField::Object { object: bytes } => bytes,
        }
    }
}

/// Resolves artifacts by contract name.
pub trait ArtifactSource: Send + Sync {
    fn load(&self, name: &str) -> anyhow::Result<ContractArtifact>;
}

/// Artifacts read from a build output directory.
///
/// Looks up `<root>/<Name>.json`, then the Hardhat layout
/// `<root>/contracts/<Name>.sol/<Name>.json`, then the Foundry layout
/// `<root>/<Name>.sol/<Name>.json`.
#[derive(Debug, Clone)]
pub struct ArtifactDir {
    root: PathBuf,
}

impl ArtifactDir {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn candidates(&self, name: &str) -> [PathBuf; 3] {
        let file = format!("{name}.json");
        let sol_dir = format!("{name}.sol");
        [
            self.root.join(&file),
            self.root.join("contracts").join(&sol_dir).join(&file),
            self.root.join(&sol_dir).join(&file),
        ]
    }

    fn read(name: &str, path: &Path) -> anyhow::Result<ContractArtifact> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read artifact {}", path.display()))?;
        let file: ArtifactFile = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse artifact {}", path.display()))?;

        let bytecode = Bytes::from(file.bytecode);
        if bytecode.is_empty() {
            anyhow::bail!(
                "Artifact {} has no creation bytecode (abstract contract or interface?)",
                path.display()
            );
        }

        Ok(ContractArtifact {
            name: name.to_string(),
            abi: file.abi,
            bytecode,
        })
    }
}

impl ArtifactSource for ArtifactDir {
    fn load(&self, name: &str) -> anyhow::Result<ContractArtifact> {
        let path = self
            .candidates(name)
            .into_iter()
            .find(|path| path.is_file())
            .with_context(|| {
                format!(
                    "No artifact for {name} under {}; compile the contracts first",
                    self.root.display()
                )
            })?;

        tracing::debug!(name, path = %path.display(), "Loading contract artifact");
        Self::read(name, &path)
    }
}

/// Deterministic placeholder artifacts for the in-process devnet.
///
/// The bytecode is `keccak256("mercado:<name>")`, which is unique per name and
/// lets the devnet recognise what is being deployed.
#[derive(Debug, Clone, Copy, Default)]
pub struct SyntheticArtifacts;

impl SyntheticArtifacts {
    pub fn bytecode(name: &str) -> Bytes {
        Bytes::from(keccak256(format!("mercado:{name}")).to_vec())
    }
}

impl ArtifactSource for SyntheticArtifacts {
    fn load(&self, name: &str) -> anyhow::Result<ContractArtifact> {
        Ok(ContractArtifact {
            name: name.to_string(),
            abi: JsonAbi::default(),
            bytecode: Self::bytecode(name),
        })
    }
}
