//! In-memory chain client for dry runs and tests.

use std::{collections::HashSet, path::Path};

use anyhow::Result;
use serde_json::{Value, json};

use super::{ChainClient, DeployedContract, ExecuteAck, Identity, message_name};

/// Default prefix of the addresses handed out by the mock.
pub const DEFAULT_ADDRESS_PREFIX: &str = "terra1mock";

/// A call received by [`MockChainClient`].
#[derive(Debug, Clone, PartialEq)]
pub enum MockCall {
    Deploy {
        artifact: String,
        init_msg: Value,
        label: String,
    },
    Execute {
        contract: String,
        msg: Value,
    },
    Query {
        contract: String,
        msg: Value,
    },
}

/// Deterministic chain client.
///
/// The n-th deployment (starting at 1) is assigned `<prefix><n>`, executes are
/// acknowledged with a synthetic tx hash and queries return a canned state.
/// Failures can be injected per artifact, per execute message or for queries.
#[derive(Debug, Clone)]
pub struct MockChainClient {
    address_prefix: String,
    deployments: usize,
    executions: usize,
    calls: Vec<MockCall>,
    query_response: Value,
    failing_artifacts: HashSet<String>,
    failing_messages: HashSet<String>,
    failing_queries: bool,
}

impl Default for MockChainClient {
    fn default() -> Self {
        Self::new(DEFAULT_ADDRESS_PREFIX)
    }
}

impl MockChainClient {
    pub fn new(address_prefix: impl Into<String>) -> Self {
        Self {
            address_prefix: address_prefix.into(),
            deployments: 0,
            executions: 0,
            calls: Vec::new(),
            query_response: json!({
                "quote_asset_reserve": "1200000000000",
                "base_asset_reserve": "1000000000",
                "total_position_size": "0",
                "funding_rate": "0",
                "next_funding_time": 0
            }),
            failing_artifacts: HashSet::new(),
            failing_messages: HashSet::new(),
            failing_queries: false,
        }
    }

    /// Answer every query with `response`.
    pub fn with_query_response(mut self, response: Value) -> Self {
        self.query_response = response;
        self
    }

    /// Fail deployments of the artifact named `artifact` (e.g. `margined_vamm`).
    pub fn failing_deploy(mut self, artifact: impl Into<String>) -> Self {
        self.failing_artifacts.insert(artifact.into());
        self
    }

    /// Fail executes whose message variant is `message` (e.g. `set_open`).
    pub fn failing_execute(mut self, message: impl Into<String>) -> Self {
        self.failing_messages.insert(message.into());
        self
    }

    /// Fail every query.
    pub fn failing_queries(mut self) -> Self {
        self.failing_queries = true;
        self
    }

    /// Calls received so far, in order.
    pub fn calls(&self) -> &[MockCall] {
        &self.calls
    }
}

impl ChainClient for MockChainClient {
    async fn account_address(&mut self, identity: &Identity) -> Result<String> {
        Ok(format!("{}-{}", self.address_prefix, identity.key_name()))
    }

    async fn deploy(
        &mut self,
        _identity: &Identity,
        artifact: &Path,
        init_msg: &Value,
        label: &str,
    ) -> Result<DeployedContract> {
        let artifact_name = artifact
            .file_stem()
            .map(|stem| stem.to_string_lossy().to_string())
            .unwrap_or_default();

        self.calls.push(MockCall::Deploy {
            artifact: artifact_name.clone(),
            init_msg: init_msg.clone(),
            label: label.to_string(),
        });

        if self.failing_artifacts.contains(&artifact_name) {
            anyhow::bail!("instantiation of {} rejected by mock chain", artifact_name);
        }

        self.deployments += 1;
        Ok(DeployedContract {
            address: format!("{}{}", self.address_prefix, self.deployments),
            code_id: Some(self.deployments as u64),
        })
    }

    async fn execute(
        &mut self,
        _identity: &Identity,
        contract: &str,
        msg: &Value,
    ) -> Result<ExecuteAck> {
        self.calls.push(MockCall::Execute {
            contract: contract.to_string(),
            msg: msg.clone(),
        });

        let name = message_name(msg);
        if self.failing_messages.contains(name) {
            anyhow::bail!("execute {} on {} rejected by mock chain: unauthorized", name, contract);
        }

        self.executions += 1;
        Ok(ExecuteAck {
            tx_hash: format!("{:064X}", self.executions),
        })
    }

    async fn query(&mut self, contract: &str, msg: &Value) -> Result<Value> {
        self.calls.push(MockCall::Query {
            contract: contract.to_string(),
            msg: msg.clone(),
        });

        if self.failing_queries {
            anyhow::bail!("query {} on {} failed on mock chain", message_name(msg), contract);
        }

        Ok(self.query_response.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_addresses_are_sequential() {
        let mut client = MockChainClient::new("A");
        let identity = Identity::from_key("test1");

        let first = client
            .deploy(&identity, Path::new("artifacts/one.wasm"), &json!({}), "one")
            .await
            .unwrap();
        let second = client
            .deploy(&identity, Path::new("artifacts/two.wasm"), &json!({}), "two")
            .await
            .unwrap();

        assert_eq!(first.address, "A1");
        assert_eq!(second.address, "A2");
        assert_eq!(client.calls().len(), 2);
    }

    #[tokio::test]
    async fn test_injected_failures() {
        let mut client = MockChainClient::new("A")
            .failing_deploy("margined_vamm")
            .failing_execute("set_open")
            .failing_queries();
        let identity = Identity::from_key("test1");

        assert!(
            client
                .deploy(&identity, Path::new("margined_vamm.wasm"), &json!({}), "vamm")
                .await
                .is_err()
        );
        assert!(
            client
                .execute(&identity, "A1", &json!({ "set_open": { "open": true } }))
                .await
                .is_err()
        );
        assert!(
            client
                .execute(&identity, "A1", &json!({ "update_config": {} }))
                .await
                .is_ok()
        );
        assert!(client.query("A1", &json!({ "state": {} })).await.is_err());

        // Failed calls are still recorded.
        assert_eq!(client.calls().len(), 4);
    }
}
