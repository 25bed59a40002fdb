//! Failure kinds raised while bootstrapping a network.
//!
//! These travel inside [`anyhow::Error`] like every other error in the crate.
//! Callers that need to classify a failure use `err.downcast_ref::<BootstrapError>()`.

use alloy_core::primitives::Address;

/// A classified bootstrap failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BootstrapError {
    /// The creation transaction for a contract reverted or never confirmed.
    #[error("deployment of {name} failed: {reason}")]
    DeploymentFailed { name: String, reason: String },

    /// A step referenced a contract that is not in the registry yet.
    #[error("{name} is not registered on network {network}; it must be deployed by an earlier step")]
    DependencyUnresolved { name: String, network: u64 },

    /// The constructor references of the plan form a cycle.
    #[error("constructor dependencies form a cycle between: {}", names.join(", "))]
    DependencyCycle { names: Vec<String> },

    /// Two deploy steps share the same logical name.
    #[error("{name} is deployed by more than one step")]
    DuplicateContract { name: String },

    /// An account role is not present in the account book.
    #[error("unknown account role '{role}'")]
    UnknownAccount { role: String },

    /// A binding call would redirect a live contract to another counterpart.
    #[error(
        "{contract} is already bound to {current}, refusing to rebind it to {requested}"
    )]
    BindingConflict {
        contract: String,
        current: Address,
        requested: Address,
    },

    /// An allocate, approve or deposit call reverted.
    #[error("seeding action '{action}' failed: {reason}")]
    SeedingActionFailed { action: String, reason: String },
}

impl BootstrapError {
    /// Short machine-friendly name of the failure kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::DeploymentFailed { .. } => "DeploymentFailed",
            Self::DependencyUnresolved { .. } => "DependencyUnresolved",
            Self::DependencyCycle { .. } => "DependencyCycle",
            Self::DuplicateContract { .. } => "DuplicateContract",
            Self::UnknownAccount { .. } => "UnknownAccount",
            Self::BindingConflict { .. } => "BindingConflict",
            Self::SeedingActionFailed { .. } => "SeedingActionFailed",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_downcast_through_context() {
        let err = anyhow::Error::new(BootstrapError::DependencyUnresolved {
            name: "BodegaDeChocolates".to_string(),
            network: 31337,
        })
        .context("bootstrap step #4 (deploy MercadoSantaFe) failed");

        let kind = err
            .downcast_ref::<BootstrapError>()
            .expect("context must keep the typed error reachable");
        assert_eq!(kind.kind(), "DependencyUnresolved");
        assert!(format!("{err:#}").contains("BodegaDeChocolates"));
    }

    #[test]
    fn test_cycle_message_lists_names() {
        let err = BootstrapError::DependencyCycle {
            names: vec!["A".to_string(), "B".to_string()],
        };
        assert_eq!(
            err.to_string(),
            "constructor dependencies form a cycle between: A, B"
        );
    }
}
