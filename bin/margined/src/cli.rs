use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use margined_deploy::{DEFAULT_ARTIFACTS_DIR, SettingsOverrides};
use serde::Serialize;
use tracing::level_filters::LevelFilter;
use url::Url;

/// The default settings file.
pub const DEFAULT_CONFIG_FILE: &str = "Margined.toml";

/// Prefix of every environment variable read by the CLI.
pub const ENV_PREFIX: &str = "MARGINED_";

#[derive(Debug, Clone, PartialEq, Eq, Hash, strum::EnumString)]
#[strum(serialize_all = "kebab-case")]
pub enum OutData {
    TempDir,
    #[strum(default)]
    Path(String),
}

#[derive(Parser)]
#[command(name = "margined")]
#[command(
    author,
    version,
    about = "Deploy and wire the Margined perpetuals contracts on a local or testnet network"
)]
pub struct Cli {
    /// The verbosity level.
    #[arg(short, long, env = "MARGINED_VERBOSITY", default_value_t = LevelFilter::INFO)]
    pub verbosity: LevelFilter,

    /// The network to deploy to: `local` or `testnet`.
    #[arg(short, long, env = "MARGINED_NETWORK", default_value = "local")]
    pub network: String,

    /// Settings file. Tables named after a network override the `[default]` table.
    #[arg(short, long, env = "MARGINED_CONFIG", default_value = DEFAULT_CONFIG_FILE)]
    pub config: PathBuf,

    /// Directory holding the compiled `.wasm` contracts.
    #[arg(long, env = "MARGINED_ARTIFACTS", default_value = DEFAULT_ARTIFACTS_DIR)]
    pub artifacts: PathBuf,

    /// Where the deployment manifest is written.
    ///
    /// Either a path or `temp-dir`. Defaults to the current directory.
    #[arg(long, env = "MARGINED_OUTDATA")]
    pub outdata: Option<OutData>,

    /// Mnemonic of the deployer account. Required on testnet.
    #[arg(long, env = "MARGINED_MNEMONIC", hide_env_values = true)]
    pub mnemonic: Option<String>,

    /// Run against an in-memory chain. Nothing is sent and no manifest is written.
    #[arg(long)]
    pub dry_run: bool,

    #[command(flatten)]
    pub overrides: CliOverrides,
}

/// Network settings given on the command line. They win over the settings
/// file and the environment.
#[derive(Debug, Clone, Default, clap::Args, Serialize)]
pub struct CliOverrides {
    /// Tendermint RPC endpoint of the node.
    #[arg(long)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node_url: Option<Url>,

    #[arg(long)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chain_id: Option<String>,

    /// Node CLI binary used to sign and broadcast.
    #[arg(long)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub binary: Option<String>,

    /// Name of the signing key in the node keyring.
    #[arg(long)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_name: Option<String>,

    #[arg(long)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keyring_backend: Option<String>,

    #[arg(long)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gas_prices: Option<String>,

    #[arg(long)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gas_adjustment: Option<f64>,

    /// Seconds to wait for a transaction to be included.
    #[arg(long)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confirmation_timeout_secs: Option<u64>,

    /// Use block broadcast instead of polling for inclusion.
    #[arg(long)]
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub no_wait: bool,
}

impl Cli {
    /// Settings overrides of the selected network.
    pub fn settings_overrides(&self) -> Result<SettingsOverrides> {
        load_overrides(&self.config, &self.network, &self.overrides)
    }
}

/// Merge the settings file, `MARGINED_*` environment variables and command line
/// overrides, in increasing order of precedence.
pub fn load_overrides(
    config: &Path,
    network: &str,
    cli: &CliOverrides,
) -> Result<SettingsOverrides> {
    if config.is_file() {
        tracing::debug!(config = %config.display(), "Loading settings file");
    }

    Figment::new()
        .merge(Toml::file(config).nested())
        .merge(Env::prefixed(ENV_PREFIX).global())
        .merge(Serialized::globals(cli))
        .select(network)
        .extract()
        .with_context(|| format!("Failed to load settings from {}", config.display()))
}
