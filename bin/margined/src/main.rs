//! margined deploys the Margined perpetuals contracts to a local or testnet network.

mod cli;

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;

use cli::{Cli, OutData};
use margined_deploy::{
    DeployerBuilder, DeploymentReport, Identity, MockChainClient, Network, NetworkSelection,
    OutDataPath, Secrets, SettingsOverrides, TracingReporter, select_network,
};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize the logger.
    tracing_subscriber::fmt()
        .with_max_level(cli.verbosity)
        .init();

    let overrides = cli.settings_overrides()?;

    let report = if cli.dry_run {
        dry_run(&cli, &overrides).await?
    } else {
        deploy(&cli, &overrides).await?
    };

    println!("{report}");

    Ok(())
}

/// Deploy against the selected network.
async fn deploy(cli: &Cli, overrides: &SettingsOverrides) -> Result<DeploymentReport> {
    let secrets = Secrets {
        mnemonic: cli.mnemonic.clone(),
    };

    let NetworkSelection {
        profile,
        settings,
        mut client,
        identity,
        ..
    } = select_network(&cli.network, overrides, &secrets)?;

    let mut builder = DeployerBuilder::new(&settings.chain_id).artifacts_dir(&cli.artifacts);

    // Set output data path if provided
    if let Some(outdata) = &cli.outdata {
        let outdata_path = match outdata {
            OutData::TempDir => OutDataPath::TempDir,
            OutData::Path(path) => OutDataPath::Path(PathBuf::from(path)),
        };
        builder = builder.outdata(outdata_path);
    }

    let deployer = builder.build()?;

    tracing::info!(
        network = %profile.network,
        chain_id = %settings.chain_id,
        artifacts = %cli.artifacts.display(),
        "Deploying Margined contracts..."
    );

    Ok(deployer
        .run(&profile, &mut client, &identity, &TracingReporter)
        .await?)
}

/// Walk the pipeline against an in-memory chain.
async fn dry_run(cli: &Cli, overrides: &SettingsOverrides) -> Result<DeploymentReport> {
    let network = Network::parse(&cli.network)?;
    let profile = network.profile()?;
    let settings = network.default_settings().with_overrides(overrides);

    let deployer = DeployerBuilder::new(&settings.chain_id)
        .artifacts_dir(&cli.artifacts)
        .write_manifest(false)
        .check_artifacts(false)
        .build()?;

    tracing::info!(network = %profile.network, "Dry run: no transaction will be sent");

    Ok(deployer
        .run(
            &profile,
            &mut MockChainClient::default(),
            &Identity::from_key(&settings.key_name),
            &TracingReporter,
        )
        .await?)
}
