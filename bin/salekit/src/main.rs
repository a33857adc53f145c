//! salekit deploys token sale contracts and configures them for each supported network.

mod cli;
mod summary;

use std::{path::PathBuf, process::ExitCode};

use anyhow::{Context, Result};
use clap::Parser;

use cli::Cli;
use salekit_deploy::{Orchestrator, Registry, RpcDeployer, RunConfig};

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    // Initialize the logger.
    tracing_subscriber::fmt()
        .with_max_level(cli.verbosity)
        .init();

    let config_path = PathBuf::from(&cli.config);
    let mut config = RunConfig::load(Some(&config_path))?;
    cli.apply(&mut config);
    config.validate()?;

    let registry = match &config.registry_path {
        Some(path) => Registry::from_file(path)?,
        None => Registry::bundled()?,
    };

    if cli.plan {
        let network = config
            .network
            .context("A network is required to print a plan")?;
        println!(
            "{}",
            summary::plan_table(&registry, network, &config.contracts)?
        );
        return Ok(ExitCode::SUCCESS);
    }

    if let Some(path) = &cli.save_config {
        config.save_to_file(&PathBuf::from(path))?;
    }

    tracing::info!(
        rpc_url = %config.rpc_url,
        mode = %config.mode,
        contracts = ?config.contracts,
        redeploy = config.force_redeploy,
        "Starting deployment..."
    );

    let deployer = RpcDeployer::connect(&config).await?;
    let orchestrator = Orchestrator::new(registry, config.mode);

    let outcomes = orchestrator
        .run_all(deployer.network(), &deployer, &config.contracts)
        .await?;

    println!("{}", summary::outcomes_table(&outcomes));

    if outcomes.iter().all(|outcome| outcome.is_success()) {
        Ok(ExitCode::SUCCESS)
    } else {
        tracing::error!("Some contracts are only partially configured; rerun to resume");
        Ok(ExitCode::FAILURE)
    }
}
