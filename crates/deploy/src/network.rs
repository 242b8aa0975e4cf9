//! Network selection: profile, chain client and signing identity for a run mode.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::{
    CliChainClient, ConfigurationProfile, DeployError, DeployResult, Identity, profile::profile_for,
};

/// Mnemonic of the `test1` account pre-funded by LocalTerra.
pub const LOCALTERRA_TEST1_MNEMONIC: &str = "notice oak worry limit wrap speak medal online prefer cluster roof addict wrist behave treat actual wasp year salad speed social layer crew genius";

/// Default node RPC endpoint of LocalTerra.
pub const LOCALTERRA_NODE_URL: &str = "http://localhost:26657";

/// Default node binary used to sign and broadcast transactions.
pub const DEFAULT_BINARY: &str = "terrad";

/// The networks a deployment can target.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::EnumIter,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum Network {
    Local,
    Testnet,
}

impl Network {
    /// Parse a run mode, rejecting anything but `local` and `testnet`.
    pub fn parse(mode: &str) -> DeployResult<Self> {
        Self::from_str(mode).map_err(|_| {
            DeployError::Configuration(format!(
                "unknown network '{mode}' (expected 'local' or 'testnet')"
            ))
        })
    }

    /// The static configuration profile of the network.
    pub fn profile(&self) -> DeployResult<ConfigurationProfile> {
        profile_for(&self.to_string())
    }

    /// Endpoint and signing defaults of the network.
    pub fn default_settings(&self) -> NetworkSettings {
        match self {
            Network::Local => NetworkSettings {
                chain_id: "localterra".to_string(),
                node_url: Some(LOCALTERRA_NODE_URL.to_string()),
                binary: DEFAULT_BINARY.to_string(),
                keyring_backend: "test".to_string(),
                key_name: "test1".to_string(),
                gas_prices: "0.15uluna".to_string(),
                gas_adjustment: 1.4,
                confirmation: ConfirmationMode::Block,
            },
            Network::Testnet => NetworkSettings {
                chain_id: "bombay-12".to_string(),
                node_url: None,
                binary: DEFAULT_BINARY.to_string(),
                keyring_backend: "test".to_string(),
                key_name: "margined-deployer".to_string(),
                gas_prices: "0.15uluna".to_string(),
                gas_adjustment: 1.4,
                confirmation: ConfirmationMode::Poll {
                    timeout_secs: 60,
                    interval_secs: 2,
                },
            },
        }
    }
}

/// How the chain client waits for a transaction to be committed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "mode")]
pub enum ConfirmationMode {
    /// Broadcast in block mode: the node answers once the tx is committed.
    Block,
    /// Broadcast in sync mode, then poll the node until the tx is included.
    Poll { timeout_secs: u64, interval_secs: u64 },
}

/// Connection and signing settings of the chain client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkSettings {
    pub chain_id: String,
    /// Tendermint RPC endpoint of a node.
    pub node_url: Option<String>,
    /// Node CLI binary (wasmd compatible).
    pub binary: String,
    pub keyring_backend: String,
    pub key_name: String,
    pub gas_prices: String,
    pub gas_adjustment: f64,
    pub confirmation: ConfirmationMode,
}

/// Operator-supplied overrides of [`NetworkSettings`].
///
/// Every `Some` field replaces the network default.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SettingsOverrides {
    pub chain_id: Option<String>,
    pub node_url: Option<String>,
    pub binary: Option<String>,
    pub keyring_backend: Option<String>,
    pub key_name: Option<String>,
    pub gas_prices: Option<String>,
    pub gas_adjustment: Option<f64>,
    pub confirmation_timeout_secs: Option<u64>,
    /// Force block confirmation regardless of the network default.
    pub no_wait: bool,
}

impl NetworkSettings {
    /// Apply overrides on top of these settings.
    pub fn with_overrides(mut self, overrides: &SettingsOverrides) -> Self {
        if let Some(chain_id) = &overrides.chain_id {
            self.chain_id = chain_id.clone();
        }
        if let Some(node_url) = &overrides.node_url {
            self.node_url = Some(node_url.clone());
        }
        if let Some(binary) = &overrides.binary {
            self.binary = binary.clone();
        }
        if let Some(backend) = &overrides.keyring_backend {
            self.keyring_backend = backend.clone();
        }
        if let Some(key_name) = &overrides.key_name {
            self.key_name = key_name.clone();
        }
        if let Some(gas_prices) = &overrides.gas_prices {
            self.gas_prices = gas_prices.clone();
        }
        if let Some(adjustment) = overrides.gas_adjustment {
            self.gas_adjustment = adjustment;
        }
        if let (Some(timeout), ConfirmationMode::Poll { timeout_secs, .. }) =
            (overrides.confirmation_timeout_secs, &mut self.confirmation)
        {
            *timeout_secs = timeout;
        }
        if overrides.no_wait {
            self.confirmation = ConfirmationMode::Block;
        }
        self
    }

    /// Check the settings and return the parsed node URL.
    pub fn validate(&self) -> DeployResult<Url> {
        let invalid = |reason: String| DeployError::Configuration(reason);

        if self.chain_id.trim().is_empty() {
            return Err(invalid("chain id is empty".to_string()));
        }
        if self.binary.trim().is_empty() {
            return Err(invalid("node binary is empty".to_string()));
        }
        if self.key_name.trim().is_empty() {
            return Err(invalid("signing key name is empty".to_string()));
        }
        if !(self.gas_adjustment > 0.0) {
            return Err(invalid(format!(
                "gas adjustment must be positive, got {}",
                self.gas_adjustment
            )));
        }
        if let ConfirmationMode::Poll {
            timeout_secs,
            interval_secs,
        } = self.confirmation
        {
            if timeout_secs == 0 || interval_secs == 0 {
                return Err(invalid(
                    "confirmation timeout and interval must be positive".to_string(),
                ));
            }
        }

        let node_url = self.node_url.as_deref().ok_or_else(|| {
            invalid(format!("no node URL configured for chain '{}'", self.chain_id))
        })?;
        Url::parse(node_url).map_err(|e| invalid(format!("invalid node URL '{node_url}': {e}")))
    }
}

/// Secrets supplied by the operator.
#[derive(Clone, Default)]
pub struct Secrets {
    pub mnemonic: Option<String>,
}

impl std::fmt::Debug for Secrets {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Secrets")
            .field("mnemonic", &self.mnemonic.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Everything a run needs to talk to its network.
#[derive(Debug)]
pub struct NetworkSelection {
    pub network: Network,
    pub profile: ConfigurationProfile,
    pub settings: NetworkSettings,
    pub client: CliChainClient,
    pub identity: Identity,
}

/// Resolve the profile, chain client and identity of a run mode.
///
/// Only local configuration is read; nothing is sent to the network.
pub fn select_network(
    mode: &str,
    overrides: &SettingsOverrides,
    secrets: &Secrets,
) -> DeployResult<NetworkSelection> {
    let network = Network::parse(mode)?;

    let profile = network.profile()?;
    profile.validate()?;

    let settings = network.default_settings().with_overrides(overrides);
    let node_url = settings.validate()?;

    let mnemonic = secrets
        .mnemonic
        .as_deref()
        .map(str::trim)
        .filter(|mnemonic| !mnemonic.is_empty());

    let identity = match (network, mnemonic) {
        (_, Some(mnemonic)) => Identity::from_mnemonic(&settings.key_name, mnemonic),
        (Network::Local, None) => {
            Identity::from_mnemonic(&settings.key_name, LOCALTERRA_TEST1_MNEMONIC)
        }
        (Network::Testnet, None) => {
            return Err(DeployError::Configuration(
                "a deployer mnemonic is required for testnet deployments".to_string(),
            ));
        }
    };

    tracing::debug!(
        %network,
        chain_id = %settings.chain_id,
        node_url = %node_url,
        key_name = %settings.key_name,
        confirmation = ?settings.confirmation,
        "Network selected"
    );

    let client = CliChainClient::new(settings.clone(), node_url)
        .map_err(|e| DeployError::Configuration(format!("{e:#}")))?;

    Ok(NetworkSelection {
        network,
        profile,
        settings,
        client,
        identity,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    fn testnet_overrides() -> SettingsOverrides {
        SettingsOverrides {
            node_url: Some("https://rpc.testnet.example:443".to_string()),
            ..Default::default()
        }
    }

    fn testnet_secrets() -> Secrets {
        Secrets {
            mnemonic: Some("word ".repeat(24)),
        }
    }

    #[test]
    fn test_every_network_profile_validates() {
        for network in Network::iter() {
            network.profile().unwrap().validate().unwrap();
        }
    }

    #[test]
    fn test_select_local_uses_localterra_defaults() {
        let selection =
            select_network("local", &SettingsOverrides::default(), &Secrets::default()).unwrap();

        assert_eq!(selection.network, Network::Local);
        assert_eq!(selection.profile, ConfigurationProfile::local());
        assert_eq!(selection.settings.chain_id, "localterra");
        assert_eq!(selection.settings.confirmation, ConfirmationMode::Block);
        assert_eq!(selection.identity.key_name(), "test1");
        assert_eq!(selection.identity.mnemonic(), Some(LOCALTERRA_TEST1_MNEMONIC));
    }

    #[test]
    fn test_select_testnet() {
        let selection = select_network("testnet", &testnet_overrides(), &testnet_secrets()).unwrap();

        assert_eq!(selection.network, Network::Testnet);
        assert_eq!(selection.settings.chain_id, "bombay-12");
        assert_eq!(selection.profile, ConfigurationProfile::testnet());
        assert!(matches!(selection.settings.confirmation, ConfirmationMode::Poll { .. }));
    }

    #[test]
    fn test_unknown_mode_is_rejected() {
        let err = select_network("mainnet", &SettingsOverrides::default(), &Secrets::default())
            .unwrap_err();
        assert!(matches!(err, DeployError::Configuration(_)));
    }

    #[test]
    fn test_testnet_requires_mnemonic() {
        let err = select_network("testnet", &testnet_overrides(), &Secrets::default()).unwrap_err();
        assert!(err.to_string().contains("mnemonic"));

        let blank = Secrets {
            mnemonic: Some("   ".to_string()),
        };
        assert!(select_network("testnet", &testnet_overrides(), &blank).is_err());
    }

    #[test]
    fn test_testnet_requires_node_url() {
        let err = select_network("testnet", &SettingsOverrides::default(), &testnet_secrets())
            .unwrap_err();
        assert!(err.to_string().contains("node URL"));
    }

    #[test]
    fn test_overrides_apply() {
        let overrides = SettingsOverrides {
            chain_id: Some("pisco-1".to_string()),
            gas_adjustment: Some(2.0),
            confirmation_timeout_secs: Some(120),
            ..testnet_overrides()
        };
        let settings = Network::Testnet.default_settings().with_overrides(&overrides);

        assert_eq!(settings.chain_id, "pisco-1");
        assert_eq!(settings.gas_adjustment, 2.0);
        assert_eq!(
            settings.confirmation,
            ConfirmationMode::Poll {
                timeout_secs: 120,
                interval_secs: 2
            }
        );

        let no_wait = SettingsOverrides {
            no_wait: true,
            ..overrides
        };
        let settings = Network::Testnet.default_settings().with_overrides(&no_wait);
        assert_eq!(settings.confirmation, ConfirmationMode::Block);
    }

    #[test]
    fn test_invalid_settings() {
        let mut settings = Network::Local.default_settings();
        settings.node_url = Some("not a url".to_string());
        assert!(settings.validate().is_err());

        let mut settings = Network::Local.default_settings();
        settings.gas_adjustment = 0.0;
        assert!(settings.validate().is_err());
    }
}
