//! `flightbridge` - telemetry relay for front-end development
//!
//! This binary wires configuration, the selected data source, and the two
//! servers together, then runs until interrupted.

#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

use anyhow::Context;
use clap::Parser;

use flightbridge::cli::Cli;
use flightbridge::{init_logging, Config, Relay};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbosity());

    let mut config =
        Config::load_from(cli.config.clone()).context("failed to resolve configuration")?;
    cli.apply_to(&mut config);
    config.validate()?;

    let relay = Relay::new(&config, cli.mode())?;
    relay.run().await?;
    Ok(())
}
