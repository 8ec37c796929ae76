use alloy::primitives::Address;
use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::config::properties::{LEDGER_DIR_ENV, PROPERTIES_ENV};
use crate::config::Properties;
use crate::funding::Funder;
use crate::networks::{self, Environment, NonceMode, PRIMARY, PRIMARY_L1};
use crate::persistence::Ledgers;
use crate::utils::{display_eth, eth_to_wei, init_logging};

/// Inspect and maintain the harness ledgers.
#[derive(Parser)]
#[clap(name = "ten-harness", version)]
pub struct Cli {
    /// Properties file
    #[clap(long, env = PROPERTIES_ENV, default_value = crate::config::properties::DEFAULT_PROPERTIES_FILE)]
    pub properties: PathBuf,

    /// Ledger directory, overriding the properties file
    #[clap(long, env = LEDGER_DIR_ENV)]
    pub ledger_dir: Option<PathBuf>,

    /// Default log filter when RUST_LOG is not set
    #[clap(long, default_value = "info")]
    pub log: String,

    #[clap(subcommand)]
    pub cmd: Cmd,
}

#[derive(Subcommand)]
pub enum Cmd {
    /// Nonce ledger
    Nonce {
        #[clap(subcommand)]
        action: NonceCmd,
    },
    /// Funds ledger
    Funds {
        #[clap(subcommand)]
        action: FundsCmd,
    },
    /// Contract ledger
    Contracts {
        #[clap(subcommand)]
        action: ContractsCmd,
    },
    /// Results ledger
    Results {
        #[clap(subcommand)]
        action: ResultsCmd,
    },
    /// Top up an address from the environment's funded account (or faucet)
    Fund {
        #[clap(long)]
        env: Environment,
        #[clap(long)]
        address: Address,
        /// Target balance in ETH; defaults to the funding policy amount
        #[clap(long)]
        amount: Option<f64>,
        /// Fund on the environment's layer 1
        #[clap(long)]
        l1: bool,
    },
}

#[derive(Subcommand)]
pub enum NonceCmd {
    /// List entries, optionally for one network key (`ten.local/ten-local`)
    Show {
        #[clap(long)]
        network: Option<String>,
    },
    /// Forget nonces after a chain reset
    Reset {
        #[clap(long)]
        network: String,
        #[clap(long)]
        address: Option<Address>,
    },
}

#[derive(Subcommand)]
pub enum FundsCmd {
    Show {
        #[clap(long)]
        network: Option<String>,
    },
}

#[derive(Subcommand)]
pub enum ContractsCmd {
    List {
        #[clap(long)]
        network: String,
    },
    /// Drop a fixture so the next run redeploys it
    Forget {
        #[clap(long)]
        network: String,
        #[clap(long)]
        name: String,
    },
}

#[derive(Subcommand)]
pub enum ResultsCmd {
    Summary {
        #[clap(long)]
        env: Environment,
    },
}

fn load_properties(cli: &Cli) -> Result<Properties> {
    let mut props = if cli.properties.exists() {
        Properties::load(&cli.properties)?
    } else {
        Properties::default()
    };
    if let Some(dir) = &cli.ledger_dir {
        props.ledger_dir = Some(dir.clone());
    }
    Ok(props)
}

pub async fn run_cli() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log);
    let props = load_properties(&cli)?;
    let ledgers = Ledgers::open(props.ledger_dir()?)?;

    match cli.cmd {
        Cmd::Nonce { action: NonceCmd::Show { network } } => {
            for e in ledgers.nonces.entries(network.as_deref().unwrap_or(""))? {
                println!("{:<32} {:#x} next={}", e.network, e.address, e.next);
            }
        }
        Cmd::Nonce { action: NonceCmd::Reset { network, address } } => {
            let removed = ledgers.nonces.reset(&network, address)?;
            println!("removed {removed} nonce entries for {network}");
        }
        Cmd::Funds { action: FundsCmd::Show { network } } => {
            for (net, address, entry) in ledgers.funds.entries(network.as_deref().unwrap_or(""))? {
                let flag = if entry.adequate { "ok" } else { "low" };
                println!(
                    "{:<32} {:#x} {} ETH {} ({})",
                    net,
                    address,
                    display_eth(entry.balance),
                    flag,
                    entry.updated_at.to_rfc3339()
                );
            }
        }
        Cmd::Contracts { action: ContractsCmd::List { network } } => {
            for (name, entry) in ledgers.contracts.list(&network)? {
                println!("{:<24} {:#x} tx={:#x} ({})", name, entry.address, entry.tx_hash, entry.deployed_at.to_rfc3339());
            }
        }
        Cmd::Contracts { action: ContractsCmd::Forget { network, name } } => {
            if ledgers.contracts.delete(&network, &name)? {
                println!("forgot {name} on {network}");
            } else {
                println!("no entry for {name} on {network}");
            }
        }
        Cmd::Results { action: ResultsCmd::Summary { env } } => {
            for (test, s) in ledgers.results.summary(env.as_str())? {
                println!("{:<40} passed={} failed={} errored={}", test, s.passed, s.failed, s.errored);
            }
        }
        Cmd::Fund { env, address, amount, l1 } => {
            let primary = networks::for_environment(env, PRIMARY, &props, ledgers.nonces.clone())?;
            let funder = Funder::new(env, primary.clone(), &props, ledgers.funds.clone())?;
            let amount = match amount {
                Some(eth) => eth_to_wei(eth)?,
                None => funder.policy().fund_amount()?,
            };

            if !l1 && funder.has_faucet() {
                funder.fund_native_from_faucet(address).await?;
                println!("faucet request sent for {address}");
            } else {
                let network = if l1 {
                    networks::l1_for_environment(env, PRIMARY_L1, &props, ledgers.nonces.clone())?
                } else {
                    primary
                };
                let key = funder.source_key_for(network.identity())?;
                let gas_limit = funder.policy().transfer_gas_limit;
                match funder.fund_native(network.as_ref(), address, amount, key, NonceMode::Persisted, gas_limit).await? {
                    Some(receipt) => println!("funded {address} in tx {:#x}", receipt.transaction_hash),
                    None => println!("{address} already holds {} ETH or more", display_eth(amount)),
                }
            }
        }
    }

    ledgers.close()?;
    Ok(())
}
