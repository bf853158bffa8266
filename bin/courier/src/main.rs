//! Courier peer tracker binary.

mod cli;
mod config;
mod logging;
mod simulate;

use clap::Parser;
use courier_net_peer_store::BlacklistStore;
use eyre::{Result, WrapErr};

use crate::cli::{BlacklistArgs, Cli, Commands};
use crate::config::CourierConfig;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init_logging(&cli.log_args)?;

    let config = CourierConfig::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Simulate(args) => simulate::run(config, args).await,
        Commands::Blacklist(args) => list_blacklist(config, args),
    }
}

fn list_blacklist(mut config: CourierConfig, args: BlacklistArgs) -> Result<()> {
    if let Some(path) = args.blacklist_file {
        config.blacklist_file = Some(path);
    }
    if config.blacklist_file.is_none() {
        eyre::bail!("no blacklist file configured, pass --blacklist-file or set blacklist_file");
    }

    let blacklist = simulate::open_blacklist(&config)?;
    let mut peers = blacklist.blacklisted().wrap_err("failed to list blacklist")?;
    peers.sort();

    for peer in peers {
        println!("{peer}");
    }
    Ok(())
}
