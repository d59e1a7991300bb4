//! Multisig Vault CLI Application
//!
//! A command-line tool for building vault signature bundles, navigating
//! owner lists and running a local vault simulation.

use clap::{Parser, Subcommand};
use multisig_vault::cli;
use multisig_vault::config::Network;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "vault")]
#[command(version = "0.1.0")]
#[command(about = "Client tooling for threshold-signature vault contracts", long_about = None)]
struct Cli {
    /// Config file (network, singleton and proxy factory addresses)
    #[arg(short, long, default_value = "vault.json")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Encode signatures into an execTransaction bundle
    Bundle {
        /// Owner with a mined approveHash (repeatable)
        #[arg(short, long)]
        approver: Vec<String>,

        /// ECDSA signature as <signer>:<65-byte hex> (repeatable)
        #[arg(long)]
        ecdsa: Vec<String>,

        /// Contract signature as <signer>:<hex payload> (repeatable)
        #[arg(long)]
        dynamic: Vec<String>,
    },

    /// Print the pre-approval signature of an owner
    Approval {
        /// Owner address
        #[arg(short, long)]
        signer: String,
    },

    /// Find the owner pointing at another in the on-chain list
    PrevOwner {
        /// Owner to look up
        #[arg(short, long)]
        owner: String,

        /// Owners in on-chain order (comma-separated)
        #[arg(long, value_delimiter = ',')]
        owners: Vec<String>,
    },

    /// Sign a vault transaction hash off-chain
    Sign {
        /// Hex private key
        #[arg(short, long)]
        key: String,

        /// 32-byte transaction hash
        #[arg(long)]
        hash: String,
    },

    /// Convert an address between hex and base58
    Address {
        /// 0x-prefixed hex or base58 address
        value: String,

        /// Network for hex to base58 (defaults to the config's)
        #[arg(short, long)]
        network: Option<Network>,
    },

    /// Config file operations
    Config {
        #[command(subcommand)]
        action: ConfigCommands,
    },

    /// Run deploy, approve, execute and owner removal on a local chain
    Simulate,
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Write a new config file
    Init {
        #[arg(short, long, default_value = "testnet")]
        network: Network,

        /// Singleton address
        #[arg(long)]
        singleton: Option<String>,

        /// Proxy factory address
        #[arg(long)]
        proxy_factory: Option<String>,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Bundle {
            approver,
            ecdsa,
            dynamic,
        } => cli::cmd_bundle(&approver, &ecdsa, &dynamic),
        Commands::Approval { signer } => cli::cmd_approval(&signer),
        Commands::PrevOwner { owner, owners } => cli::cmd_prev_owner(&owner, &owners),
        Commands::Sign { key, hash } => cli::cmd_sign(&key, &hash),
        Commands::Address { value, network } => {
            let network = match network {
                Some(network) => network,
                None => cli::load_context(&cli.config)?.network,
            };
            cli::cmd_address(&value, network)
        }
        Commands::Config { action } => match action {
            ConfigCommands::Init {
                network,
                singleton,
                proxy_factory,
                force,
            } => cli::cmd_config_init(
                &cli.config,
                network,
                singleton.as_deref(),
                proxy_factory.as_deref(),
                force,
            ),
        },
        Commands::Simulate => {
            let context = cli::load_context(&cli.config)?;
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(cli::cmd_simulate(&context))
        }
    }
}
