//! Integration tests for mercado-deploy.
//!
//! Whole bootstrap runs against the in-process devnet. Each test uses its own
//! devnet and, where a manifest is written, its own temporary directory.
//! Run with: cargo test --test bootstrap_test

use std::sync::Arc;

use alloy_core::primitives::{Address, B256, Bytes, U256};
use alloy_sol_types::SolCall;
use anyhow::Result;
use mercado_deploy::{
    AccountBook, AddressRef, AddressRegistry, ArtifactSource, Bootstrap, BootstrapError,
    BootstrapPlan, BootstrapReport, ChainClient, ConfirmationPolicy, ConstructorArg,
    ContractDeployer, DEVNET_CHAIN_ID, Devnet, Manifest, ManifestStore, NetworkManifest,
    NetworkRunBuilder, NetworkSettings, ReadBridge, SeedingAction, SeedingConfig,
    SyntheticArtifacts, TransactionRequest, TxReceipt, WriteStatus,
    contracts::{IBodega, IMercado, IMintableToken, call_view},
    plan::{BODEGA, MERCADO, PRICE_ORACLE, USDC_TOKEN, XOC_TOKEN},
};
use rand::Rng;
use tempdir::TempDir;

const ALL_CONTRACTS: [&str; 5] = [USDC_TOKEN, XOC_TOKEN, PRICE_ORACLE, BODEGA, MERCADO];

/// Base units of `units` whole tokens.
fn units(units: u64, decimals: u8) -> U256 {
    U256::from(units) * U256::from(10u64).pow(U256::from(decimals))
}

/// Test setup context: a devnet, its accounts and the matching plan.
struct TestContext {
    devnet: Arc<Devnet>,
    accounts: AccountBook,
    plan: BootstrapPlan,
}

impl TestContext {
    fn new(seeding: SeedingConfig) -> Self {
        let chain_id = DEVNET_CHAIN_ID;
        let plan_for_programs = BootstrapPlan::mercado_santa_fe(&seeding, &[]);
        let devnet = Arc::new(Devnet::from_plan(chain_id, &plan_for_programs).unwrap());

        let demo = devnet.dev_accounts()[1..=seeding.demo_accounts].to_vec();
        let accounts = AccountBook::new(devnet.dev_accounts()[0]).with_demo_accounts(demo);
        let plan = BootstrapPlan::mercado_santa_fe(&seeding, &accounts.demo_roles());

        Self {
            devnet,
            accounts,
            plan,
        }
    }

    fn deployer(&self) -> Address {
        self.accounts.deployer()
    }

    async fn run(
        &self,
        plan: &BootstrapPlan,
        previous: Option<&NetworkManifest>,
        reseed: bool,
    ) -> (Result<BootstrapReport>, AddressRegistry) {
        let mut registry = AddressRegistry::new();
        let result = Bootstrap::new(
            self.devnet.as_ref(),
            DEVNET_CHAIN_ID,
            &self.accounts,
            &SyntheticArtifacts,
        )
        .with_previous(previous)
        .with_confirmation(ConfirmationPolicy::bounded(5, 10))
        .with_reseed(reseed)
        .run(plan, &mut registry)
        .await;
        (result, registry)
    }

    fn address(registry: &AddressRegistry, name: &str) -> Address {
        registry.resolve(name, DEVNET_CHAIN_ID).unwrap().address
    }

    async fn balance(&self, token: Address, account: Address) -> U256 {
        call_view(
            self.devnet.as_ref(),
            token,
            &IMintableToken::balanceOfCall { account },
        )
        .await
        .unwrap()
        ._0
    }
}

fn manifest_of(registry: &AddressRegistry, report: &BootstrapReport) -> NetworkManifest {
    let mut manifest = Manifest::default();
    manifest.merge_network(DEVNET_CHAIN_ID, registry, report.seeding.clone());
    manifest.network(DEVNET_CHAIN_ID).cloned().unwrap()
}

fn bootstrap_error(err: &anyhow::Error) -> &BootstrapError {
    err.downcast_ref::<BootstrapError>()
        .unwrap_or_else(|| panic!("expected a bootstrap error, got: {err:#}"))
}

#[tokio::test]
async fn test_fresh_run_registers_every_contract() {
    let ctx = TestContext::new(SeedingConfig::default());

    let (result, registry) = ctx.run(&ctx.plan, None, false).await;
    let report = result.unwrap();

    assert_eq!(report.deployed, ALL_CONTRACTS.map(String::from).to_vec());
    assert!(report.reused.is_empty());
    assert_eq!(report.bound, vec![format!("{BODEGA} -> {MERCADO}")]);
    assert!(!report.seeding_skipped);
    assert!(report.seeding.is_some());

    assert_eq!(registry.len(), ALL_CONTRACTS.len());
    for name in ALL_CONTRACTS {
        let record = registry.resolve(name, DEVNET_CHAIN_ID).unwrap();
        assert!(
            !ctx.devnet.code_at(record.address).await.unwrap().is_empty(),
            "{name} should have code"
        );
    }

    // Constructor references point at the registered contracts.
    let bodega = TestContext::address(&registry, BODEGA);
    let mercado = TestContext::address(&registry, MERCADO);
    let asset = call_view(ctx.devnet.as_ref(), bodega, &IBodega::assetCall {})
        .await
        .unwrap();
    assert_eq!(asset._0, TestContext::address(&registry, XOC_TOKEN));
    let bound = call_view(ctx.devnet.as_ref(), bodega, &IBodega::mercadoCall {})
        .await
        .unwrap();
    assert_eq!(bound._0, mercado);
    let vault = call_view(ctx.devnet.as_ref(), mercado, &IMercado::bodegaCall {})
        .await
        .unwrap();
    assert_eq!(vault._0, bodega);
}

#[tokio::test]
async fn test_rerun_reuses_everything_and_skips_seeding() {
    let ctx = TestContext::new(SeedingConfig::default());

    let (result, first) = ctx.run(&ctx.plan, None, false).await;
    let previous = manifest_of(&first, &result.unwrap());
    let transactions = ctx.devnet.transactions().len();

    let (result, second) = ctx.run(&ctx.plan, Some(&previous), false).await;
    let report = result.unwrap();

    assert!(report.deployed.is_empty());
    assert_eq!(report.reused.len(), ALL_CONTRACTS.len());
    assert_eq!(report.already_bound.len(), 1);
    assert!(report.seeding_skipped);
    assert_eq!(report.seeding, previous.seeding);
    assert_eq!(ctx.devnet.transactions().len(), transactions, "no transaction expected");
    for name in ALL_CONTRACTS {
        assert_eq!(
            TestContext::address(&first, name),
            TestContext::address(&second, name)
        );
    }
}

#[tokio::test]
async fn test_reseed_runs_seeding_again() {
    let ctx = TestContext::new(SeedingConfig::default());

    let (result, first) = ctx.run(&ctx.plan, None, false).await;
    let previous = manifest_of(&first, &result.unwrap());
    let usdc = TestContext::address(&first, USDC_TOKEN);

    let (result, _) = ctx.run(&ctx.plan, Some(&previous), true).await;
    let report = result.unwrap();

    assert!(!report.seeding_skipped);
    assert_eq!(report.seeded, ctx.plan.seeding.len());
    assert_eq!(ctx.balance(usdc, ctx.deployer()).await, units(2_000_000, 6));
}

#[tokio::test]
async fn test_node_reset_triggers_redeploy() {
    let ctx = TestContext::new(SeedingConfig::default());

    let (result, first) = ctx.run(&ctx.plan, None, false).await;
    let previous = manifest_of(&first, &result.unwrap());

    ctx.devnet.reset();

    let (result, _) = ctx.run(&ctx.plan, Some(&previous), false).await;
    let report = result.unwrap();
    assert_eq!(report.deployed.len(), ALL_CONTRACTS.len());
    assert!(!report.seeding_skipped, "fresh contracts must be seeded again");
}

#[tokio::test]
async fn test_binding_conflict_leaves_binding_untouched() {
    let ctx = TestContext::new(SeedingConfig::default());

    let (result, first) = ctx.run(&ctx.plan, None, false).await;
    let previous = manifest_of(&first, &result.unwrap());

    let bodega = TestContext::address(&first, BODEGA);
    let stranger = Address::with_last_byte(0x99);
    ctx.devnet.force_vault_binding(bodega, stranger).unwrap();

    let (result, _) = ctx.run(&ctx.plan, Some(&previous), false).await;
    let err = result.unwrap_err();
    assert_eq!(
        bootstrap_error(&err),
        &BootstrapError::BindingConflict {
            contract: BODEGA.to_string(),
            current: stranger,
            requested: TestContext::address(&first, MERCADO),
        }
    );
    assert!(format!("{err:#}").contains("bootstrap step #6 (bind BodegaDeChocolates to MercadoSantaFe)"));

    let bound = call_view(ctx.devnet.as_ref(), bodega, &IBodega::mercadoCall {})
        .await
        .unwrap();
    assert_eq!(bound._0, stranger);
}

#[tokio::test]
async fn test_seeding_conserves_tokens() {
    let ctx = TestContext::new(SeedingConfig {
        demo_accounts: 2,
        ..Default::default()
    });

    let (result, registry) = ctx.run(&ctx.plan, None, false).await;
    result.unwrap();

    let xoc = TestContext::address(&registry, XOC_TOKEN);
    let bodega = TestContext::address(&registry, BODEGA);
    let allocation = units(1_000_000, 18);

    let supply = call_view(ctx.devnet.as_ref(), xoc, &IMintableToken::totalSupplyCall {})
        .await
        .unwrap()
        ._0;
    assert_eq!(supply, allocation * U256::from(3u64));

    // The deployer's whole allocation moved into the vault, credited to the deployer.
    assert_eq!(ctx.balance(xoc, ctx.deployer()).await, U256::ZERO);
    assert_eq!(ctx.balance(xoc, bodega).await, allocation);
    let deposit = call_view(
        ctx.devnet.as_ref(),
        bodega,
        &IBodega::balanceOfCall {
            account: ctx.deployer(),
        },
    )
    .await
    .unwrap()
    ._0;
    assert_eq!(deposit, allocation);

    let mut held = ctx.balance(xoc, ctx.deployer()).await + ctx.balance(xoc, bodega).await;
    for role in ctx.accounts.demo_roles() {
        let account = ctx.accounts.resolve(&role).unwrap();
        let balance = ctx.balance(xoc, account).await;
        assert_eq!(balance, allocation);
        held += balance;
    }
    assert_eq!(held, supply);
}

#[tokio::test]
async fn test_token_decimals_scale_allocations() {
    let ctx = TestContext::new(SeedingConfig::default());

    let (result, registry) = ctx.run(&ctx.plan, None, false).await;
    result.unwrap();

    let usdc = TestContext::address(&registry, USDC_TOKEN);
    let xoc = TestContext::address(&registry, XOC_TOKEN);

    let usdc_decimals = call_view(ctx.devnet.as_ref(), usdc, &IMintableToken::decimalsCall {})
        .await
        .unwrap()
        ._0;
    let xoc_decimals = call_view(ctx.devnet.as_ref(), xoc, &IMintableToken::decimalsCall {})
        .await
        .unwrap()
        ._0;
    assert_eq!(usdc_decimals, 6);
    assert_eq!(xoc_decimals, 18);

    assert_eq!(
        ctx.balance(usdc, ctx.deployer()).await,
        U256::from(1_000_000_000_000u64)
    );
    let vault_xoc = ctx
        .balance(xoc, TestContext::address(&registry, BODEGA))
        .await;
    assert_eq!(vault_xoc, "1000000000000000000000000".parse::<U256>().unwrap());
}

#[tokio::test]
async fn test_allowance_modes() {
    let unlimited = TestContext::new(SeedingConfig::default());
    let (result, registry) = unlimited.run(&unlimited.plan, None, false).await;
    result.unwrap();
    let allowance = call_view(
        unlimited.devnet.as_ref(),
        TestContext::address(&registry, XOC_TOKEN),
        &IMintableToken::allowanceCall {
            owner: unlimited.deployer(),
            spender: TestContext::address(&registry, BODEGA),
        },
    )
    .await
    .unwrap()
    ._0;
    assert_eq!(allowance, U256::MAX);

    let exact = TestContext::new(SeedingConfig {
        exact_allowance: true,
        ..Default::default()
    });
    let (result, registry) = exact.run(&exact.plan, None, false).await;
    result.unwrap();
    let allowance = call_view(
        exact.devnet.as_ref(),
        TestContext::address(&registry, XOC_TOKEN),
        &IMintableToken::allowanceCall {
            owner: exact.deployer(),
            spender: TestContext::address(&registry, BODEGA),
        },
    )
    .await
    .unwrap()
    ._0;
    assert_eq!(allowance, U256::ZERO, "the exact allowance is consumed by the deposit");
}

#[tokio::test]
async fn test_forward_reference_sends_nothing() {
    let ctx = TestContext::new(SeedingConfig::default());
    let mut plan = ctx.plan.clone();
    let market = plan.deploys.remove(4);
    plan.deploys.insert(0, market);

    let (result, registry) = ctx.run(&plan, None, false).await;
    let err = result.unwrap_err();

    assert!(matches!(
        bootstrap_error(&err),
        BootstrapError::DependencyUnresolved { name, .. } if name == USDC_TOKEN
    ));
    assert!(registry.is_empty());
    assert!(ctx.devnet.transactions().is_empty());

    // Sorting repairs the declaration order.
    let (result, _) = ctx.run(&plan.sorted().unwrap(), None, false).await;
    result.unwrap();
}

#[tokio::test]
async fn test_unresolved_dependency_sends_no_market_transaction() {
    let ctx = TestContext::new(SeedingConfig::default());
    let market = ctx.plan.deploy_step(MERCADO).unwrap();
    let mut registry = AddressRegistry::new();

    let deployer = ContractDeployer::new(
        ctx.devnet.as_ref(),
        DEVNET_CHAIN_ID,
        &SyntheticArtifacts,
        ConfirmationPolicy::default(),
    );
    let err = deployer
        .deploy(&mut registry, &ctx.accounts, market, ctx.deployer())
        .await
        .unwrap_err();

    assert_eq!(
        bootstrap_error(&err),
        &BootstrapError::DependencyUnresolved {
            name: USDC_TOKEN.to_string(),
            network: DEVNET_CHAIN_ID,
        }
    );
    assert_eq!(ctx.devnet.creations(), 0);
    assert!(!registry.contains(MERCADO, DEVNET_CHAIN_ID));
}

/// A node that accepts every transaction and never mines any.
struct NeverMined;

impl ChainClient for NeverMined {
    async fn chain_id(&self) -> Result<u64> {
        Ok(DEVNET_CHAIN_ID)
    }

    async fn accounts(&self) -> Result<Vec<Address>> {
        Ok(vec![])
    }

    async fn send_transaction(&self, _tx: TransactionRequest) -> Result<B256> {
        Ok(B256::repeat_byte(0x42))
    }

    async fn transaction_receipt(&self, _tx_hash: B256) -> Result<Option<TxReceipt>> {
        Ok(None)
    }

    async fn call(&self, _to: Address, _data: Bytes) -> Result<Bytes> {
        Ok(Bytes::new())
    }

    async fn code_at(&self, _address: Address) -> Result<Bytes> {
        Ok(Bytes::new())
    }
}

#[tokio::test(start_paused = true)]
async fn test_unconfirmed_creation_is_deployment_failed() {
    let ctx = TestContext::new(SeedingConfig::default());
    let usdc = ctx.plan.deploy_step(USDC_TOKEN).unwrap();
    let mut registry = AddressRegistry::new();

    let deployer = ContractDeployer::new(
        &NeverMined,
        DEVNET_CHAIN_ID,
        &SyntheticArtifacts,
        ConfirmationPolicy::bounded(2, 1),
    );
    let err = deployer
        .deploy(&mut registry, &ctx.accounts, usdc, ctx.deployer())
        .await
        .unwrap_err();

    assert!(matches!(
        bootstrap_error(&err),
        BootstrapError::DeploymentFailed { name, reason }
            if name == USDC_TOKEN && reason.contains("not confirmed")
    ));
    assert!(registry.is_empty());
}

#[tokio::test]
async fn test_reverted_creation_is_deployment_failed() {
    let ctx = TestContext::new(SeedingConfig::default());
    let mut plan = ctx.plan.clone();
    plan.deploys[3].args[0] = ConstructorArg::Address(AddressRef::Literal(Address::ZERO));

    let (result, registry) = ctx.run(&plan, None, false).await;
    let err = result.unwrap_err();

    assert!(matches!(
        bootstrap_error(&err),
        BootstrapError::DeploymentFailed { name, .. } if name == BODEGA
    ));
    assert!(format!("{err:#}").contains("bootstrap step #4 (deploy BodegaDeChocolates)"));
    assert_eq!(registry.len(), 3, "earlier deployments stay registered");
    assert!(!registry.contains(BODEGA, DEVNET_CHAIN_ID));
    assert!(!registry.contains(MERCADO, DEVNET_CHAIN_ID));
}

#[tokio::test]
async fn test_missing_approval_is_seeding_action_failed() {
    let ctx = TestContext::new(SeedingConfig::default());
    let mut plan = ctx.plan.clone();
    plan.seeding
        .retain(|action| !matches!(action, SeedingAction::Approve { .. }));

    let (result, registry) = ctx.run(&plan, None, false).await;
    let err = result.unwrap_err();

    match bootstrap_error(&err) {
        BootstrapError::SeedingActionFailed { action, reason } => {
            assert!(action.starts_with("deposit"));
            assert!(reason.contains("insufficient allowance"), "{reason}");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(registry.len(), ALL_CONTRACTS.len());
}

#[tokio::test]
async fn test_bridge_reads_and_writes() {
    let ctx = TestContext::new(SeedingConfig::default());
    let (result, registry) = ctx.run(&ctx.plan, None, false).await;
    let report = result.unwrap();

    let mut manifest = Manifest::default();
    manifest.merge_network(DEVNET_CHAIN_ID, &registry, report.seeding);
    let bridge = ReadBridge::new(&manifest, DEVNET_CHAIN_ID, Arc::clone(&ctx.devnet))
        .with_confirmation(ConfirmationPolicy::bounded(5, 10));

    let tokens: Vec<String> = bridge.tracked_tokens().into_iter().map(|t| t.name).collect();
    assert_eq!(tokens, vec![USDC_TOKEN.to_string(), XOC_TOKEN.to_string()]);
    assert_eq!(bridge.markets(), vec![MERCADO.to_string()]);
    assert_eq!(
        bridge.token_balance(USDC_TOKEN, ctx.deployer()).await,
        Some(units(1_000_000, 6))
    );
    assert!(bridge.positions(MERCADO, ctx.deployer()).await.is_empty());

    let calldata: Bytes = IMercado::requestLoanCall {
        amount: units(500, 6),
        installments: U256::from(3u64),
    }
    .abi_encode()
    .into();
    let handle = bridge.submit_write(MERCADO, ctx.deployer(), calldata);
    assert!(matches!(handle.wait().await, WriteStatus::Confirmed { .. }));

    let ids = bridge.loan_ids(MERCADO, ctx.deployer()).await;
    assert_eq!(ids, vec![U256::from(1u64)]);
    let positions = bridge.positions(MERCADO, ctx.deployer()).await;
    assert_eq!(positions.len(), 1);
    assert_eq!(positions[0].borrower, ctx.deployer());
    assert_eq!(positions[0].amount, units(500, 6));

    // A reverting write reports failure and reads keep working.
    let bad: Bytes = IMercado::requestLoanCall {
        amount: U256::ZERO,
        installments: U256::from(3u64),
    }
    .abi_encode()
    .into();
    let handle = bridge.submit_write(MERCADO, ctx.deployer(), bad);
    assert!(matches!(handle.wait().await, WriteStatus::Failed { .. }));
    assert_eq!(bridge.positions(MERCADO, ctx.deployer()).await.len(), 1);
}

#[tokio::test]
async fn test_bridge_rejects_stale_addresses() {
    let ctx = TestContext::new(SeedingConfig::default());
    let (result, registry) = ctx.run(&ctx.plan, None, false).await;
    let report = result.unwrap();

    let mut manifest = Manifest::default();
    manifest.merge_network(DEVNET_CHAIN_ID, &registry, report.seeding);
    ctx.devnet.reset();

    let bridge = ReadBridge::new(&manifest, DEVNET_CHAIN_ID, Arc::clone(&ctx.devnet));
    assert!(bridge.resolve_address(XOC_TOKEN).is_some());
    assert!(bridge.token_balance(XOC_TOKEN, ctx.deployer()).await.is_none());
    let err = bridge
        .read_field(XOC_TOKEN, IMintableToken::totalSupplyCall {}.abi_encode().into())
        .await
        .unwrap_err();
    assert!(err.reason.contains("no code"), "{err}");
}

#[tokio::test]
async fn test_network_run_persists_manifest_and_resumes() {
    let temp_dir = TempDir::new("mercado-test").expect("Failed to create temp dir");
    let manifest_path = temp_dir.path().join("deployments/manifest.json");
    let plan = BootstrapPlan::mercado_santa_fe(&SeedingConfig::default(), &[]);
    let devnet = Devnet::from_plan(DEVNET_CHAIN_ID, &plan).unwrap();

    let builder = NetworkRunBuilder::new("devnet", NetworkSettings::devnet())
        .manifest_path(&manifest_path)
        .persist(true);

    let first = builder.run_on(&devnet, &SyntheticArtifacts).await.unwrap();
    assert_eq!(first.deployed.len(), ALL_CONTRACTS.len());

    let manifest = ManifestStore::new(&manifest_path).load().unwrap();
    let network = manifest.network(DEVNET_CHAIN_ID).unwrap();
    assert_eq!(network.contracts.len(), ALL_CONTRACTS.len());
    assert!(network.seeding.is_some());

    let second = builder.run_on(&devnet, &SyntheticArtifacts).await.unwrap();
    assert!(second.deployed.is_empty());
    assert!(second.seeding_skipped);
}

/// Artifacts for every contract except the market, whose creation then reverts.
struct WithoutMarket;

impl ArtifactSource for WithoutMarket {
    fn load(&self, name: &str) -> Result<mercado_deploy::ContractArtifact> {
        let mut artifact = SyntheticArtifacts.load(name)?;
        if name == MERCADO {
            artifact.bytecode = Bytes::from_static(&[0xfe]);
        }
        Ok(artifact)
    }
}

#[tokio::test]
async fn test_failed_run_persists_partial_manifest() {
    let temp_dir = TempDir::new("mercado-test").expect("Failed to create temp dir");
    let manifest_path = temp_dir.path().join("manifest.json");
    let plan = BootstrapPlan::mercado_santa_fe(&SeedingConfig::default(), &[]);
    let devnet = Devnet::from_plan(DEVNET_CHAIN_ID, &plan).unwrap();

    let builder = NetworkRunBuilder::new("devnet", NetworkSettings::devnet())
        .manifest_path(&manifest_path)
        .persist(true);

    let err = builder.run_on(&devnet, &WithoutMarket).await.unwrap_err();
    assert!(matches!(
        bootstrap_error(&err),
        BootstrapError::DeploymentFailed { name, .. } if name == MERCADO
    ));

    let manifest = ManifestStore::new(&manifest_path).load().unwrap();
    let network = manifest.network(DEVNET_CHAIN_ID).unwrap();
    assert_eq!(network.contracts.len(), 4);
    assert!(network.seeding.is_none());

    // The re-run reuses the four contracts and finishes the job.
    let report = builder.run_on(&devnet, &SyntheticArtifacts).await.unwrap();
    assert_eq!(report.reused.len(), 4);
    assert_eq!(report.deployed, vec![MERCADO.to_string()]);
}

#[tokio::test]
async fn test_networks_bootstrap_concurrently_into_one_manifest() {
    let temp_dir = TempDir::new("mercado-test").expect("Failed to create temp dir");
    let manifest_path = temp_dir.path().join("manifest.json");
    let plan = BootstrapPlan::mercado_santa_fe(&SeedingConfig::default(), &[]);

    let chain_ids: Vec<u64> = {
        let mut rng = rand::rng();
        let first = rng.random_range(100_000..=499_999);
        vec![first, first + 500_000]
    };
    let devnets = chain_ids
        .iter()
        .map(|chain_id| Devnet::from_plan(*chain_id, &plan).unwrap())
        .collect::<Vec<_>>();
    let builders = chain_ids
        .iter()
        .map(|chain_id| {
            let settings = NetworkSettings {
                chain_id: Some(*chain_id),
                ..NetworkSettings::devnet()
            };
            NetworkRunBuilder::new(format!("devnet-{chain_id}"), settings)
                .manifest_path(&manifest_path)
                .persist(true)
        })
        .collect::<Vec<_>>();

    let results = futures::future::join_all(
        builders
            .iter()
            .zip(&devnets)
            .map(|(builder, devnet)| builder.run_on(devnet, &SyntheticArtifacts)),
    )
    .await;
    for result in results {
        result.unwrap();
    }

    let manifest = ManifestStore::new(&manifest_path).load().unwrap();
    for chain_id in chain_ids {
        assert_eq!(
            manifest.network(chain_id).unwrap().contracts.len(),
            ALL_CONTRACTS.len()
        );
    }
}

#[tokio::test]
async fn test_chain_id_mismatch_is_rejected() {
    let plan = BootstrapPlan::mercado_santa_fe(&SeedingConfig::default(), &[]);
    let devnet = Devnet::from_plan(1, &plan).unwrap();

    let err = NetworkRunBuilder::new("devnet", NetworkSettings::devnet())
        .run_on(&devnet, &SyntheticArtifacts)
        .await
        .unwrap_err();
    assert!(err.to_string().contains("chain id"));
    assert!(devnet.transactions().is_empty());
}
