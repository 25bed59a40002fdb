use std::path::PathBuf;

use alloy_core::primitives::Address;
use clap::{Args, Parser, Subcommand};
use mercado_deploy::CONFIG_FILENAME;
use tracing::level_filters::LevelFilter;

#[derive(Parser)]
#[command(name = "mercado")]
#[command(
    author,
    version,
    about = "Deploy, wire and seed the MercadoSantaFe demo contracts"
)]
pub struct Cli {
    /// The verbosity level.
    #[arg(short, long, global = true, env = "MERCADO_VERBOSITY", default_value_t = LevelFilter::INFO)]
    pub verbosity: LevelFilter,

    /// Path to a Mercado.toml configuration file (or a directory containing one).
    ///
    /// If not provided, ./Mercado.toml is used when it exists. Built-in networks
    /// `localhost` and `devnet` are always available.
    #[arg(long, alias = "conf", global = true, env = "MERCADO_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Deploy, bind and seed the contracts on one or more networks.
    Deploy(DeployArgs),
    /// Show the deployed contracts, token balances and loans of an account.
    Status(StatusArgs),
    /// Write the resolved configuration to a TOML file.
    Config(ConfigArgs),
}

#[derive(Debug, Args)]
pub struct DeployArgs {
    /// Network to deploy to. Repeat to deploy to several networks concurrently.
    #[arg(short, long = "network", required = true)]
    pub networks: Vec<String>,

    /// Run the seeding phase again even if it already completed.
    #[arg(long, env = "MERCADO_RESEED", default_value_t = false)]
    pub reseed: bool,

    /// Override the manifest path from the configuration.
    #[arg(long, env = "MERCADO_MANIFEST")]
    pub manifest: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct StatusArgs {
    /// Network to inspect.
    #[arg(short, long)]
    pub network: String,

    /// Account whose balances and loans are shown. Defaults to the deployer.
    #[arg(short, long)]
    pub account: Option<Address>,

    /// Override the manifest path from the configuration.
    #[arg(long, env = "MERCADO_MANIFEST")]
    pub manifest: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct ConfigArgs {
    /// Where to write the configuration.
    #[arg(short, long, default_value = CONFIG_FILENAME)]
    pub output: PathBuf,
}
