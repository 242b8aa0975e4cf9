//! Tendermint JSON-RPC helpers used to confirm transactions.

use std::time::Duration;

use anyhow::Context;
use backon::{ConstantBuilder, Retryable};
use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use serde::{Deserialize, de::DeserializeOwned};
use serde_json::Value;

/// Default timeout for RPC requests.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Create an HTTP client configured for JSON-RPC requests.
pub fn create_client() -> Result<reqwest::Client, anyhow::Error> {
    reqwest::Client::builder()
        .timeout(DEFAULT_TIMEOUT)
        .build()
        .context("Failed to create HTTP client")
}

/// Make a JSON-RPC call and deserialize the result.
///
/// # Arguments
/// * `client` - The HTTP client to use
/// * `url` - The RPC endpoint URL
/// * `method` - The RPC method name
/// * `params` - The method parameters (positional array or named object)
pub async fn json_rpc_call<T: DeserializeOwned>(
    client: &reqwest::Client,
    url: &str,
    method: &str,
    params: Value,
) -> Result<T, anyhow::Error> {
    let response = client
        .post(url)
        .json(&serde_json::json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params,
            "id": 1
        }))
        .send()
        .await
        .with_context(|| format!("Failed to send {} request", method))?;

    let result: Value = response
        .json()
        .await
        .with_context(|| format!("Failed to parse {} response", method))?;

    if let Some(error) = result.get("error") {
        anyhow::bail!(
            "RPC error: {}",
            error
                .get("data")
                .or_else(|| error.get("message"))
                .and_then(|m| m.as_str())
                .unwrap_or("unknown")
        );
    }

    let result_value = result
        .get("result")
        .context("No result in response")?
        .clone();

    serde_json::from_value(result_value)
        .with_context(|| format!("Failed to deserialize {} result", method))
}

/// An ABCI event emitted by a transaction.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TxEvent {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub attributes: Vec<EventAttribute>,
}

/// Key/value attribute of an event. Older nodes base64-encode both fields.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct EventAttribute {
    pub key: String,
    #[serde(default)]
    pub value: Option<String>,
}

/// Find the value of attribute `key` on the first event of type `kind` carrying it.
pub fn find_attribute(events: &[TxEvent], kind: &str, key: &str) -> Option<String> {
    let decode = |raw: &str| {
        BASE64
            .decode(raw)
            .ok()
            .and_then(|bytes| String::from_utf8(bytes).ok())
    };

    events
        .iter()
        .filter(|event| event.kind == kind)
        .flat_map(|event| event.attributes.iter())
        .find_map(|attribute| {
            let value = attribute.value.as_deref().unwrap_or_default();
            if attribute.key == key {
                Some(value.to_string())
            } else if decode(&attribute.key).as_deref() == Some(key) {
                decode(value)
            } else {
                None
            }
        })
}

/// Outcome of a transaction included in a block.
#[derive(Debug, Clone, Deserialize)]
pub struct TxResult {
    #[serde(default)]
    pub code: u32,
    #[serde(default)]
    pub log: String,
    #[serde(default)]
    pub events: Vec<TxEvent>,
}

#[derive(Debug, Deserialize)]
struct TxQueryResponse {
    tx_result: TxResult,
}

/// Number of retries that fit in `timeout` when waiting `interval` between
/// attempts. Always at least one.
fn retry_attempts(timeout: Duration, interval: Duration) -> usize {
    (timeout.as_millis() / interval.as_millis().max(1)).max(1) as usize
}

/// Poll the node until the transaction with hex hash `tx_hash` is included.
///
/// Gives up once `timeout` has elapsed. A transaction that was included but
/// failed is returned as is; checking its code is left to the caller.
pub async fn wait_for_tx(
    client: &reqwest::Client,
    url: &str,
    tx_hash: &str,
    timeout: Duration,
    interval: Duration,
) -> Result<TxResult, anyhow::Error> {
    let hash_bytes = hex::decode(tx_hash).context("Transaction hash is not hex encoded")?;
    let params = serde_json::json!({ "hash": BASE64.encode(hash_bytes), "prove": false });

    let attempts = retry_attempts(timeout, interval);

    let fetch = || {
        let params = params.clone();
        async move {
            json_rpc_call::<TxQueryResponse>(client, url, "tx", params)
                .await
                .map(|response| response.tx_result)
        }
    };

    fetch
        .retry(
            ConstantBuilder::default()
                .with_delay(interval)
                .with_max_times(attempts),
        )
        .sleep(tokio::time::sleep)
        .notify(|err: &anyhow::Error, _| {
            tracing::trace!(error = %err, tx_hash, "Transaction not confirmed yet, retrying...");
        })
        .await
        .with_context(|| {
            format!(
                "Timeout waiting for transaction {} after {}s",
                tx_hash,
                timeout.as_secs()
            )
        })
}
