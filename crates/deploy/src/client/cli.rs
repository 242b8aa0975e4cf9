//! Chain client backed by a wasmd-compatible node CLI (`terrad`, `wasmd`, ...).

use std::{collections::HashSet, path::Path, process::Stdio, time::Duration};

use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::Value;
use tokio::{io::AsyncWriteExt, process::Command};
use url::Url;

use super::{ChainClient, DeployedContract, ExecuteAck, Identity, message_name};
use crate::{
    network::{ConfirmationMode, NetworkSettings},
    rpc::{self, TxEvent, TxResult, find_attribute},
};

/// Response printed by `tx ... --output json`.
#[derive(Debug, Deserialize)]
struct BroadcastResponse {
    txhash: String,
    #[serde(default)]
    code: u32,
    #[serde(default)]
    raw_log: String,
    #[serde(default)]
    logs: Vec<TxLog>,
    #[serde(default)]
    events: Vec<TxEvent>,
}

#[derive(Debug, Deserialize)]
struct TxLog {
    #[serde(default)]
    events: Vec<TxEvent>,
}

/// Response printed by `query wasm contract-state smart --output json`.
#[derive(Debug, Deserialize)]
struct SmartQueryResponse {
    data: Value,
}

/// Key printed by `keys add ... --output json`.
#[derive(Debug, Deserialize)]
struct KeyOutput {
    address: String,
}

/// What to do with the keyring before signing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum KeyAction {
    /// The keyring already holds the expected key.
    UseExisting,
    /// Recover the key from the mnemonic.
    Recover,
}

/// Decide how to obtain the signing key from the address currently stored
/// under `key_name` and the address derived from the operator's mnemonic.
///
/// A stored key that does not match the mnemonic is an error: signing with it
/// would deploy from another account.
fn key_action(
    key_name: &str,
    keyring_address: Option<&str>,
    mnemonic_address: Option<&str>,
) -> Result<KeyAction> {
    match (keyring_address, mnemonic_address) {
        (Some(stored), Some(expected)) if stored == expected => Ok(KeyAction::UseExisting),
        (Some(stored), Some(expected)) => anyhow::bail!(
            "Key '{}' in the keyring is {} but the mnemonic derives {}; use another key name or remove the existing key",
            key_name,
            stored,
            expected
        ),
        (Some(_), None) => Ok(KeyAction::UseExisting),
        (None, Some(_)) => Ok(KeyAction::Recover),
        (None, None) => anyhow::bail!(
            "Key '{}' is not in the keyring and no mnemonic was provided",
            key_name
        ),
    }
}

/// A committed transaction.
#[derive(Debug)]
struct CommittedTx {
    hash: String,
    events: Vec<TxEvent>,
}

/// Signs and broadcasts through the node binary, confirming per [`ConfirmationMode`].
#[derive(Debug)]
pub struct CliChainClient {
    settings: NetworkSettings,
    node_url: Url,
    http: reqwest::Client,
    /// Keys known to be present in the keyring.
    prepared_keys: HashSet<String>,
}

impl CliChainClient {
    pub fn new(settings: NetworkSettings, node_url: Url) -> Result<Self> {
        Ok(Self {
            settings,
            node_url,
            http: rpc::create_client()?,
            prepared_keys: HashSet::new(),
        })
    }

    pub fn settings(&self) -> &NetworkSettings {
        &self.settings
    }

    /// Run the node binary and return its standard output.
    async fn run(&self, args: &[String], stdin: Option<&str>) -> Result<String> {
        tracing::trace!(binary = %self.settings.binary, ?args, "Running node command");

        let mut child = Command::new(&self.settings.binary)
            .args(args)
            .stdin(if stdin.is_some() { Stdio::piped() } else { Stdio::null() })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("Failed to start {}", self.settings.binary))?;

        if let (Some(input), Some(mut pipe)) = (stdin, child.stdin.take()) {
            pipe.write_all(input.as_bytes())
                .await
                .context("Failed to write to node command stdin")?;
            pipe.write_all(b"\n").await?;
        }

        let output = child
            .wait_with_output()
            .await
            .with_context(|| format!("Failed to wait for {}", self.settings.binary))?;

        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!(
                "{} {} exited with {}: {}",
                self.settings.binary,
                args.first().map(String::as_str).unwrap_or_default(),
                output.status,
                if stderr.trim().is_empty() { stdout.trim() } else { stderr.trim() }
            );
        }

        Ok(stdout)
    }

    fn keyring_args(&self) -> Vec<String> {
        vec![
            "--keyring-backend".to_string(),
            self.settings.keyring_backend.clone(),
        ]
    }

    fn tx_args(&self, identity: &Identity) -> Vec<String> {
        let broadcast_mode = match self.settings.confirmation {
            ConfirmationMode::Block => "block",
            ConfirmationMode::Poll { .. } => "sync",
        };

        let mut args = vec![
            "--from".to_string(),
            identity.key_name().to_string(),
            "--chain-id".to_string(),
            self.settings.chain_id.clone(),
            "--node".to_string(),
            self.node_url.to_string(),
            "--gas".to_string(),
            "auto".to_string(),
            "--gas-adjustment".to_string(),
            self.settings.gas_adjustment.to_string(),
            "--gas-prices".to_string(),
            self.settings.gas_prices.clone(),
            "--broadcast-mode".to_string(),
            broadcast_mode.to_string(),
            "--output".to_string(),
            "json".to_string(),
            "--yes".to_string(),
        ];
        args.extend(self.keyring_args());
        args
    }

    /// Address stored under `key_name` in the keyring, if the key exists.
    async fn keyring_address(&self, key_name: &str) -> Option<String> {
        let mut show = vec![
            "keys".to_string(),
            "show".to_string(),
            key_name.to_string(),
            "--address".to_string(),
        ];
        show.extend(self.keyring_args());

        self.run(&show, None)
            .await
            .ok()
            .map(|address| address.trim().to_string())
            .filter(|address| !address.is_empty())
    }

    /// Address derived from `mnemonic`, without touching the keyring.
    async fn mnemonic_address(&self, key_name: &str, mnemonic: &str) -> Result<String> {
        let mut derive = vec![
            "keys".to_string(),
            "add".to_string(),
            key_name.to_string(),
            "--recover".to_string(),
            "--dry-run".to_string(),
            "--output".to_string(),
            "json".to_string(),
        ];
        derive.extend(self.keyring_args());

        let stdout = self
            .run(&derive, Some(mnemonic))
            .await
            .context("Failed to derive the deployer address from the mnemonic")?;
        let key: KeyOutput =
            serde_json::from_str(stdout.trim()).context("Failed to parse derived key")?;
        Ok(key.address)
    }

    /// Make sure the keyring holds the key of `identity`, recovering it from
    /// the mnemonic if needed.
    async fn ensure_key(&mut self, identity: &Identity) -> Result<()> {
        let key_name = identity.key_name();
        if self.prepared_keys.contains(key_name) {
            return Ok(());
        }

        let keyring_address = self.keyring_address(key_name).await;
        let mnemonic_address = match identity.mnemonic() {
            Some(mnemonic) => Some(self.mnemonic_address(key_name, mnemonic).await?),
            None => None,
        };

        match key_action(
            key_name,
            keyring_address.as_deref(),
            mnemonic_address.as_deref(),
        )? {
            KeyAction::UseExisting => {
                tracing::debug!(key_name, "Deployer key found in the keyring");
            }
            KeyAction::Recover => {
                tracing::info!(key_name, "Recovering deployer key into the keyring...");

                let mut add = vec![
                    "keys".to_string(),
                    "add".to_string(),
                    key_name.to_string(),
                    "--recover".to_string(),
                ];
                add.extend(self.keyring_args());
                self.run(&add, identity.mnemonic())
                    .await
                    .with_context(|| format!("Failed to recover key '{}'", key_name))?;
            }
        }

        self.prepared_keys.insert(key_name.to_string());
        Ok(())
    }

    /// Broadcast a transaction and wait for it to be committed.
    async fn broadcast(&mut self, identity: &Identity, mut args: Vec<String>) -> Result<CommittedTx> {
        self.ensure_key(identity).await?;
        args.extend(self.tx_args(identity));

        let stdout = self.run(&args, None).await?;
        let response: BroadcastResponse =
            serde_json::from_str(&stdout).context("Failed to parse broadcast response")?;

        if response.code != 0 {
            anyhow::bail!(
                "transaction {} failed with code {}: {}",
                response.txhash,
                response.code,
                response.raw_log
            );
        }

        match self.settings.confirmation {
            ConfirmationMode::Block => {
                let mut events = response.events;
                events.extend(response.logs.into_iter().flat_map(|log| log.events));
                Ok(CommittedTx {
                    hash: response.txhash,
                    events,
                })
            }
            ConfirmationMode::Poll {
                timeout_secs,
                interval_secs,
            } => {
                let result: TxResult = rpc::wait_for_tx(
                    &self.http,
                    self.node_url.as_str(),
                    &response.txhash,
                    Duration::from_secs(timeout_secs),
                    Duration::from_secs(interval_secs),
                )
                .await?;

                if result.code != 0 {
                    anyhow::bail!(
                        "transaction {} failed with code {}: {}",
                        response.txhash,
                        result.code,
                        result.log
                    );
                }

                Ok(CommittedTx {
                    hash: response.txhash,
                    events: result.events,
                })
            }
        }
    }
}

impl ChainClient for CliChainClient {
    async fn account_address(&mut self, identity: &Identity) -> Result<String> {
        self.ensure_key(identity).await?;

        let mut args = vec![
            "keys".to_string(),
            "show".to_string(),
            identity.key_name().to_string(),
            "--address".to_string(),
        ];
        args.extend(self.keyring_args());

        Ok(self.run(&args, None).await?.trim().to_string())
    }

    async fn deploy(
        &mut self,
        identity: &Identity,
        artifact: &Path,
        init_msg: &Value,
        label: &str,
    ) -> Result<DeployedContract> {
        let store = self
            .broadcast(
                identity,
                vec![
                    "tx".to_string(),
                    "wasm".to_string(),
                    "store".to_string(),
                    artifact.display().to_string(),
                ],
            )
            .await
            .with_context(|| format!("Failed to store {}", artifact.display()))?;

        let code_id: u64 = find_attribute(&store.events, "store_code", "code_id")
            .with_context(|| format!("No code id in store transaction {}", store.hash))?
            .parse()
            .context("Code id is not a number")?;

        tracing::debug!(artifact = %artifact.display(), code_id, tx_hash = %store.hash, "Contract code stored");

        let instantiate = self
            .broadcast(
                identity,
                vec![
                    "tx".to_string(),
                    "wasm".to_string(),
                    "instantiate".to_string(),
                    code_id.to_string(),
                    init_msg.to_string(),
                    "--label".to_string(),
                    label.to_string(),
                    "--no-admin".to_string(),
                ],
            )
            .await
            .with_context(|| format!("Failed to instantiate code id {}", code_id))?;

        let address = find_attribute(&instantiate.events, "instantiate", "_contract_address")
            .with_context(|| {
                format!("No contract address in instantiate transaction {}", instantiate.hash)
            })?;

        Ok(DeployedContract {
            address,
            code_id: Some(code_id),
        })
    }

    async fn execute(
        &mut self,
        identity: &Identity,
        contract: &str,
        msg: &Value,
    ) -> Result<ExecuteAck> {
        let tx = self
            .broadcast(
                identity,
                vec![
                    "tx".to_string(),
                    "wasm".to_string(),
                    "execute".to_string(),
                    contract.to_string(),
                    msg.to_string(),
                ],
            )
            .await
            .with_context(|| format!("Failed to execute {} on {}", message_name(msg), contract))?;

        Ok(ExecuteAck { tx_hash: tx.hash })
    }

    async fn query(&mut self, contract: &str, msg: &Value) -> Result<Value> {
        let args = vec![
            "query".to_string(),
            "wasm".to_string(),
            "contract-state".to_string(),
            "smart".to_string(),
            contract.to_string(),
            msg.to_string(),
            "--node".to_string(),
            self.node_url.to_string(),
            "--output".to_string(),
            "json".to_string(),
        ];

        let stdout = self
            .run(&args, None)
            .await
            .with_context(|| format!("Failed to query {} on {}", message_name(msg), contract))?;

        let response: SmartQueryResponse =
            serde_json::from_str(&stdout).context("Failed to parse query response")?;
        Ok(response.data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::Network;
    use serde_json::json;

    fn client(network: Network) -> CliChainClient {
        let mut settings = network.default_settings();
        settings.node_url = Some("http://localhost:26657".to_string());
        let url = settings.validate().unwrap();
        CliChainClient::new(settings, url).unwrap()
    }

    #[test]
    fn test_tx_args_follow_confirmation_mode() {
        let identity = Identity::from_key("test1");

        let local = client(Network::Local).tx_args(&identity);
        let mode = local.iter().position(|arg| arg == "--broadcast-mode").unwrap();
        assert_eq!(local[mode + 1], "block");
        assert!(local.windows(2).any(|w| w[0] == "--from" && w[1] == "test1"));
        assert!(local.windows(2).any(|w| w[0] == "--chain-id" && w[1] == "localterra"));

        let testnet = client(Network::Testnet).tx_args(&identity);
        let mode = testnet.iter().position(|arg| arg == "--broadcast-mode").unwrap();
        assert_eq!(testnet[mode + 1], "sync");
    }

    #[test]
    fn test_parse_block_broadcast_response() {
        let response: BroadcastResponse = serde_json::from_value(json!({
            "height": "12",
            "txhash": "ABCDEF",
            "code": 0,
            "raw_log": "[]",
            "logs": [{ "msg_index": 0, "events": [
                { "type": "instantiate", "attributes": [
                    { "key": "_contract_address", "value": "terra1contract" },
                    { "key": "code_id", "value": "4" }
                ]}
            ]}]
        }))
        .unwrap();

        let events: Vec<TxEvent> = response.logs.into_iter().flat_map(|log| log.events).collect();
        assert_eq!(
            find_attribute(&events, "instantiate", "_contract_address").as_deref(),
            Some("terra1contract")
        );
    }

    #[test]
    fn test_parse_smart_query_response() {
        let response: SmartQueryResponse =
            serde_json::from_str(r#"{"data":{"open":true}}"#).unwrap();
        assert_eq!(response.data, json!({ "open": true }));
    }

    #[test]
    fn test_key_action() {
        assert_eq!(
            key_action("test1", Some("terra1abc"), Some("terra1abc")).unwrap(),
            KeyAction::UseExisting
        );
        assert_eq!(
            key_action("test1", Some("terra1abc"), None).unwrap(),
            KeyAction::UseExisting
        );
        assert_eq!(
            key_action("test1", None, Some("terra1abc")).unwrap(),
            KeyAction::Recover
        );
        assert!(key_action("test1", None, None).is_err());
    }

    #[test]
    fn test_key_action_rejects_mismatched_keyring_key() {
        let err = key_action("margined-deployer", Some("terra1other"), Some("terra1expected"))
            .unwrap_err()
            .to_string();

        assert!(err.contains("margined-deployer"));
        assert!(err.contains("terra1other"));
        assert!(err.contains("terra1expected"));
    }

    #[test]
    fn test_parse_derived_key() {
        let key: KeyOutput = serde_json::from_str(
            r#"{"name":"test1","type":"local","address":"terra1derived","pubkey":"{}"}"#,
        )
        .unwrap();
        assert_eq!(key.address, "terra1derived");
    }

    #[tokio::test]
    async fn test_missing_binary_is_reported() {
        let mut settings = Network::Local.default_settings();
        settings.binary = "margined-no-such-binary".to_string();
        let url = settings.validate().unwrap();
        let client = CliChainClient::new(settings, url).unwrap();

        let err = client.run(&["version".to_string()], None).await.unwrap_err();
        assert!(format!("{err:#}").contains("margined-no-such-binary"));
    }
}
