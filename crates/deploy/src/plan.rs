//! Bootstrap plans: what to deploy, bind and seed, in which order.
//!
//! A plan is an explicit dependency graph. Deploy steps reference earlier
//! deployments through their constructor arguments; circular references are
//! expressed as separate [`BindStep`]s that run once both sides exist.

use std::{collections::BTreeSet, fmt};

use alloy_core::primitives::{Address, U256};
use serde::{Deserialize, Serialize};

use crate::{
    accounts::{AccountBook, DEPLOYER},
    contracts::{BODEGA_MERCADO_GETTER, BODEGA_MERCADO_SETTER, ContractKind},
    error::BootstrapError,
    registry::{AddressRegistry, ArgValue},
};

pub const USDC_TOKEN: &str = "USDCToken";
pub const XOC_TOKEN: &str = "XOCToken";
pub const PRICE_ORACLE: &str = "USDToMXNOracle";
pub const BODEGA: &str = "BodegaDeChocolates";
pub const MERCADO: &str = "MercadoSantaFe";

/// Reference to an address known at the time a step runs.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AddressRef {
    /// A contract deployed by an earlier step.
    Contract(String),
    /// An account of the account book, by role.
    Account(String),
    Literal(Address),
}

impl AddressRef {
    pub fn contract(name: impl Into<String>) -> Self {
        Self::Contract(name.into())
    }

    pub fn account(role: impl Into<String>) -> Self {
        Self::Account(role.into())
    }

    pub fn deployer() -> Self {
        Self::Account(DEPLOYER.to_string())
    }

    /// Resolve against what is registered and known right now.
    pub fn resolve(
        &self,
        registry: &AddressRegistry,
        network: u64,
        accounts: &AccountBook,
    ) -> Result<Address, BootstrapError> {
        match self {
            AddressRef::Contract(name) => Ok(registry.resolve(name, network)?.address),
            AddressRef::Account(role) => accounts.resolve(role),
            AddressRef::Literal(address) => Ok(*address),
        }
    }
}

impl fmt::Display for AddressRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AddressRef::Contract(name) | AddressRef::Account(name) => f.write_str(name),
            AddressRef::Literal(address) => write!(f, "{address}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConstructorArg {
    Address(AddressRef),
    Uint(U256),
    Bool(bool),
    String(String),
}

impl ConstructorArg {
    pub fn resolve(
        &self,
        registry: &AddressRegistry,
        network: u64,
        accounts: &AccountBook,
    ) -> Result<ArgValue, BootstrapError> {
        Ok(match self {
            ConstructorArg::Address(address) => {
                ArgValue::Address(address.resolve(registry, network, accounts)?)
            }
            ConstructorArg::Uint(value) => ArgValue::Uint(*value),
            ConstructorArg::Bool(value) => ArgValue::Bool(*value),
            ConstructorArg::String(value) => ArgValue::String(value.clone()),
        })
    }
}

/// Deploy one contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeployStep {
    /// Logical name the contract is registered under.
    pub name: String,
    /// Artifact providing ABI and bytecode.
    pub artifact: String,
    pub kind: ContractKind,
    pub args: Vec<ConstructorArg>,
}

impl DeployStep {
    pub fn new(name: impl Into<String>, kind: ContractKind) -> Self {
        let name = name.into();
        Self {
            artifact: name.clone(),
            name,
            kind,
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: ConstructorArg) -> Self {
        self.args.push(arg);
        self
    }

    pub fn address_arg(self, address: AddressRef) -> Self {
        self.arg(ConstructorArg::Address(address))
    }

    /// Contracts this step needs deployed first.
    pub fn dependencies(&self) -> impl Iterator<Item = &str> {
        self.args.iter().filter_map(|arg| match arg {
            ConstructorArg::Address(AddressRef::Contract(name)) => Some(name.as_str()),
            _ => None,
        })
    }

    fn accounts(&self) -> impl Iterator<Item = &str> {
        self.args.iter().filter_map(|arg| match arg {
            ConstructorArg::Address(AddressRef::Account(role)) => Some(role.as_str()),
            _ => None,
        })
    }
}

/// Tell `contract` the address of `counterpart` after both are deployed.
///
/// `getter` and `setter` are Solidity signatures, e.g. `mercado()` and
/// `setMercado(address)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BindStep {
    pub contract: String,
    pub counterpart: String,
    pub getter: String,
    pub setter: String,
}

/// Token amount of a seeding action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Amount {
    /// Whole tokens, scaled by the token's `decimals()`.
    Units(u64),
    /// Base units.
    Raw(U256),
    /// `U256::MAX`, the oversized allowance used for demo accounts.
    Unlimited,
    /// The acting account's token balance at the time the action runs.
    Balance,
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Amount::Units(units) => write!(f, "{units} units"),
            Amount::Raw(raw) => write!(f, "{raw} base units"),
            Amount::Unlimited => f.write_str("unlimited"),
            Amount::Balance => f.write_str("full balance"),
        }
    }
}

/// State-mutating call issued after deployment to leave the system usable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", tag = "action")]
pub enum SeedingAction {
    /// Mint `amount` of `token` to `to`, sent by the deployer.
    Allocate {
        token: String,
        to: AddressRef,
        amount: Amount,
    },
    /// Let `spender` move `owner`'s `token`, sent by `owner`.
    Approve {
        token: String,
        owner: String,
        spender: AddressRef,
        amount: Amount,
    },
    /// Deposit `depositor`'s `token` into `vault`, credited to `beneficiary`.
    Deposit {
        vault: String,
        token: String,
        depositor: String,
        beneficiary: AddressRef,
        amount: Amount,
    },
}

impl SeedingAction {
    fn contracts(&self) -> Vec<&str> {
        match self {
            SeedingAction::Allocate { token, to, .. } => [Some(token.as_str()), contract_of(to)]
                .into_iter()
                .flatten()
                .collect(),
            SeedingAction::Approve { token, spender, .. } => {
                [Some(token.as_str()), contract_of(spender)]
                    .into_iter()
                    .flatten()
                    .collect()
            }
            SeedingAction::Deposit {
                vault,
                token,
                beneficiary,
                ..
            } => [Some(vault.as_str()), Some(token.as_str()), contract_of(beneficiary)]
                .into_iter()
                .flatten()
                .collect(),
        }
    }

    fn accounts(&self) -> Vec<&str> {
        match self {
            SeedingAction::Allocate { to, .. } => account_of(to).into_iter().collect(),
            SeedingAction::Approve { owner, spender, .. } => [Some(owner.as_str()), account_of(spender)]
                .into_iter()
                .flatten()
                .collect(),
            SeedingAction::Deposit {
                depositor,
                beneficiary,
                ..
            } => [Some(depositor.as_str()), account_of(beneficiary)]
                .into_iter()
                .flatten()
                .collect(),
        }
    }
}

fn contract_of(address: &AddressRef) -> Option<&str> {
    match address {
        AddressRef::Contract(name) => Some(name),
        _ => None,
    }
}

fn account_of(address: &AddressRef) -> Option<&str> {
    match address {
        AddressRef::Account(role) => Some(role),
        _ => None,
    }
}

impl fmt::Display for SeedingAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SeedingAction::Allocate { token, to, amount } => {
                write!(f, "allocate {amount} of {token} to {to}")
            }
            SeedingAction::Approve {
                token,
                owner,
                spender,
                amount,
            } => write!(f, "approve {spender} for {amount} of {owner}'s {token}"),
            SeedingAction::Deposit {
                vault,
                token,
                depositor,
                beneficiary,
                amount,
            } => write!(
                f,
                "deposit {amount} of {depositor}'s {token} into {vault} for {beneficiary}"
            ),
        }
    }
}

/// One executable step of a plan, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step<'a> {
    Deploy(&'a DeployStep),
    Bind(&'a BindStep),
    Seed(&'a SeedingAction),
}

impl fmt::Display for Step<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Step::Deploy(step) => write!(f, "deploy {}", step.name),
            Step::Bind(step) => write!(f, "bind {} to {}", step.contract, step.counterpart),
            Step::Seed(action) => write!(f, "{action}"),
        }
    }
}

/// Seeding parameters of the MercadoSantaFe plan.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct SeedingConfig {
    /// Whole tokens allocated to the deployer and each demo account, per token.
    pub allocation_units: u64,
    /// Number of demonstration accounts derived from the dev mnemonic.
    pub demo_accounts: usize,
    /// Approve exactly the deposit instead of an unlimited allowance.
    pub exact_allowance: bool,
}

impl Default for SeedingConfig {
    fn default() -> Self {
        Self {
            allocation_units: 1_000_000,
            demo_accounts: 0,
            exact_allowance: false,
        }
    }
}

/// Ordered deploy, bind and seed steps.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BootstrapPlan {
    pub deploys: Vec<DeployStep>,
    pub bindings: Vec<BindStep>,
    pub seeding: Vec<SeedingAction>,
}

impl BootstrapPlan {
    /// The canonical MercadoSantaFe bootstrap.
    ///
    /// Tokens and oracle first, then the vault (XOC + deployer as admin), then the
    /// market (USDC, vault, oracle), then the vault is bound back to the market.
    /// Seeding allocates both tokens to the deployer and every demo account, and
    /// deposits the deployer's whole XOC balance into the vault.
    pub fn mercado_santa_fe(seeding: &SeedingConfig, demo_roles: &[String]) -> Self {
        let deploys = vec![
            DeployStep::new(USDC_TOKEN, ContractKind::Token { decimals: 6 }),
            DeployStep::new(XOC_TOKEN, ContractKind::Token { decimals: 18 }),
            DeployStep::new(PRICE_ORACLE, ContractKind::Oracle),
            DeployStep::new(BODEGA, ContractKind::Vault)
                .address_arg(AddressRef::contract(XOC_TOKEN))
                .address_arg(AddressRef::deployer()),
            DeployStep::new(MERCADO, ContractKind::Market)
                .address_arg(AddressRef::contract(USDC_TOKEN))
                .address_arg(AddressRef::contract(BODEGA))
                .address_arg(AddressRef::contract(PRICE_ORACLE)),
        ];

        let bindings = vec![BindStep {
            contract: BODEGA.to_string(),
            counterpart: MERCADO.to_string(),
            getter: BODEGA_MERCADO_GETTER.to_string(),
            setter: BODEGA_MERCADO_SETTER.to_string(),
        }];

        let recipients =
            std::iter::once(DEPLOYER.to_string()).chain(demo_roles.iter().cloned());
        let mut actions = Vec::new();
        for recipient in recipients {
            for token in [USDC_TOKEN, XOC_TOKEN] {
                actions.push(SeedingAction::Allocate {
                    token: token.to_string(),
                    to: AddressRef::Account(recipient.clone()),
                    amount: Amount::Units(seeding.allocation_units),
                });
            }
        }
        actions.push(SeedingAction::Approve {
            token: XOC_TOKEN.to_string(),
            owner: DEPLOYER.to_string(),
            spender: AddressRef::contract(BODEGA),
            amount: if seeding.exact_allowance {
                Amount::Balance
            } else {
                Amount::Unlimited
            },
        });
        actions.push(SeedingAction::Deposit {
            vault: BODEGA.to_string(),
            token: XOC_TOKEN.to_string(),
            depositor: DEPLOYER.to_string(),
            beneficiary: AddressRef::deployer(),
            amount: Amount::Balance,
        });

        Self {
            deploys,
            bindings,
            seeding: actions,
        }
    }

    /// All steps in execution order: deploys, then bindings, then seeding.
    pub fn steps(&self) -> Vec<Step<'_>> {
        self.deploys
            .iter()
            .map(Step::Deploy)
            .chain(self.bindings.iter().map(Step::Bind))
            .chain(self.seeding.iter().map(Step::Seed))
            .collect()
    }

    pub fn deploy_step(&self, name: &str) -> Option<&DeployStep> {
        self.deploys.iter().find(|step| step.name == name)
    }

    /// Check that the declared order never references a contract before the
    /// step that deploys it, and that every account role exists.
    pub fn validate(&self, network: u64, accounts: &AccountBook) -> Result<(), BootstrapError> {
        let mut deployed: BTreeSet<&str> = BTreeSet::new();
        let unresolved = |name: &str| BootstrapError::DependencyUnresolved {
            name: name.to_string(),
            network,
        };

        for step in &self.deploys {
            if let Some(missing) = step.dependencies().find(|dep| !deployed.contains(dep)) {
                return Err(unresolved(missing));
            }
            for role in step.accounts() {
                accounts.resolve(role)?;
            }
            if !deployed.insert(step.name.as_str()) {
                return Err(BootstrapError::DuplicateContract {
                    name: step.name.clone(),
                });
            }
        }

        for bind in &self.bindings {
            for name in [&bind.contract, &bind.counterpart] {
                if !deployed.contains(name.as_str()) {
                    return Err(unresolved(name));
                }
            }
        }

        for action in &self.seeding {
            if let Some(missing) = action
                .contracts()
                .into_iter()
                .find(|name| !deployed.contains(name))
            {
                return Err(unresolved(missing));
            }
            for role in action.accounts() {
                accounts.resolve(role)?;
            }
        }

        Ok(())
    }

    /// Reorder the deploy steps topologically.
    ///
    /// Among steps whose dependencies are satisfied, declaration order wins, so
    /// an already valid plan is returned unchanged. References to contracts the
    /// plan never deploys are left for [`BootstrapPlan::validate`] to report.
    pub fn sorted(mut self) -> Result<Self, BootstrapError> {
        let planned: BTreeSet<String> = self.deploys.iter().map(|s| s.name.clone()).collect();
        let mut pending = std::mem::take(&mut self.deploys);
        let mut done: BTreeSet<String> = BTreeSet::new();

        while !pending.is_empty() {
            let ready = pending.iter().position(|step| {
                step.dependencies()
                    .all(|dep| done.contains(dep) || !planned.contains(dep))
            });

            match ready {
                Some(index) => {
                    let step = pending.remove(index);
                    done.insert(step.name.clone());
                    self.deploys.push(step);
                }
                None => {
                    return Err(BootstrapError::DependencyCycle {
                        names: pending.into_iter().map(|step| step.name).collect(),
                    });
                }
            }
        }

        Ok(self)
    }
}
