//! mercado deploys the MercadoSantaFe demo contracts in dependency order and
//! seeds them so a frontend can use them right away.

mod cli;

use std::sync::Arc;

use alloy_core::primitives::{Address, utils::format_units};
use anyhow::{Context, Result};
use clap::Parser;
use comfy_table::{Table, presets::UTF8_FULL};
use futures::future::join_all;

use cli::{Cli, Command, DeployArgs, StatusArgs};
use mercado_deploy::{
    BootstrapError, BootstrapReport, ChainClient, ManifestStore, NetworkRunBuilder, ReadBridge,
    RpcClient, Settings,
};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize the logger.
    tracing_subscriber::fmt()
        .with_max_level(cli.verbosity)
        .init();

    let settings = Settings::load(cli.config.as_deref())?;

    match cli.command {
        Command::Deploy(args) => deploy(settings, args).await,
        Command::Status(args) => status(settings, args).await,
        Command::Config(args) => settings.save_to_file(&args.output),
    }
}

async fn deploy(mut settings: Settings, args: DeployArgs) -> Result<()> {
    if let Some(manifest) = args.manifest {
        settings.manifest = manifest;
    }

    // Resolve every network before starting any of them.
    let networks = settings.deployment_targets(&args.networks)?;
    let builders = networks
        .iter()
        .map(|name| {
            NetworkRunBuilder::from_settings(&settings, name).map(|b| b.reseed(args.reseed))
        })
        .collect::<Result<Vec<_>>>()?;

    let results = join_all(builders.into_iter().map(NetworkRunBuilder::run)).await;

    let mut failed = 0;
    for (name, result) in networks.iter().zip(results) {
        match result {
            Ok(report) => print_report(name, &report),
            Err(err) => {
                failed += 1;
                let kind = err
                    .downcast_ref::<BootstrapError>()
                    .map(BootstrapError::kind)
                    .unwrap_or("Error");
                tracing::error!(network = %name, kind, "{err:#}");
            }
        }
    }

    if failed > 0 {
        anyhow::bail!("{failed} of {} network(s) failed to bootstrap", networks.len());
    }
    Ok(())
}

fn print_report(name: &str, report: &BootstrapReport) {
    tracing::info!(
        network = %name,
        chain_id = report.network,
        deployed = ?report.deployed,
        reused = ?report.reused,
        bound = ?report.bound,
        already_bound = ?report.already_bound,
        seeded = report.seeded,
        seeding_skipped = report.seeding_skipped,
        "Network ready"
    );
}

async fn status(settings: Settings, args: StatusArgs) -> Result<()> {
    let network = settings.network(&args.network)?;
    let Some(rpc_url) = network.rpc_url.clone() else {
        anyhow::bail!(
            "Network '{}' runs on the in-process devnet, which keeps no state between runs",
            args.network
        );
    };

    let manifest_path = args.manifest.unwrap_or(settings.manifest.clone());
    let manifest = ManifestStore::new(manifest_path).load()?;

    let client = Arc::new(RpcClient::new(rpc_url)?);
    let chain_id = client
        .chain_id()
        .await
        .with_context(|| format!("Failed to fetch chain id of network {}", args.network))?;

    let account = match args.account.or(network.deployer) {
        Some(account) => account,
        None => client
            .accounts()
            .await?
            .first()
            .copied()
            .context("No account given and the node has no unlocked accounts")?,
    };

    let bridge = ReadBridge::new(&manifest, chain_id, client);
    print_status(&bridge, account).await;
    Ok(())
}

async fn print_status<C: ChainClient + 'static>(bridge: &ReadBridge<C>, account: Address) {
    let mut contracts = Table::new();
    contracts.load_preset(UTF8_FULL);
    contracts.set_header(vec!["Contract", "Kind", "Address", "Block"]);
    for record in bridge.contracts() {
        contracts.add_row(vec![
            record.name.clone(),
            record.kind.to_string(),
            record.address.to_string(),
            record.block_number.to_string(),
        ]);
    }
    println!("Contracts on chain {}\n{contracts}", bridge.network());

    let mut balances = Table::new();
    balances.load_preset(UTF8_FULL);
    balances.set_header(vec!["Token", "Balance"]);
    for token in bridge.tracked_tokens() {
        let balance = match bridge.token_balance(&token.name, account).await {
            Some(balance) => {
                format_units(balance, token.decimals).unwrap_or_else(|_| balance.to_string())
            }
            None => "-".to_string(),
        };
        balances.add_row(vec![token.name, balance]);
    }
    println!("Balances of {account}\n{balances}");

    for market in bridge.markets() {
        let mut loans = Table::new();
        loans.load_preset(UTF8_FULL);
        loans.set_header(vec!["Id", "Amount", "Total payment", "Installments", "APY (bps)"]);
        for loan in bridge.positions(&market, account).await {
            loans.add_row(vec![
                loan.id.to_string(),
                loan.amount.to_string(),
                loan.totalPayment.to_string(),
                loan.installments.to_string(),
                loan.apyBps.to_string(),
            ]);
        }
        println!("Loans of {account} on {market}\n{loans}");
    }
}
