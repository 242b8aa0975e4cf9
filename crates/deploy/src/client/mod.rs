//! Chain client abstraction used by the deployer.
//!
//! A [`ChainClient`] performs one confirmed round trip per call: when a future
//! resolves, the operation is either committed on chain or has failed.

mod cli;
mod mock;

use std::{fmt, future::Future, path::Path};

use anyhow::Result;
use serde_json::Value;

pub use cli::CliChainClient;
pub use mock::{MockCall, MockChainClient};

/// The account that signs every transaction of a run.
///
/// The key is looked up by name in the node keyring. When a mnemonic is
/// present the key is recovered from it if the keyring does not have it yet.
#[derive(Clone, PartialEq, Eq)]
pub struct Identity {
    key_name: String,
    mnemonic: Option<String>,
}

impl Identity {
    /// An identity already present in the keyring.
    pub fn from_key(key_name: impl Into<String>) -> Self {
        Self {
            key_name: key_name.into(),
            mnemonic: None,
        }
    }

    /// An identity recovered from a mnemonic under `key_name`.
    pub fn from_mnemonic(key_name: impl Into<String>, mnemonic: impl Into<String>) -> Self {
        Self {
            key_name: key_name.into(),
            mnemonic: Some(mnemonic.into()),
        }
    }

    pub fn key_name(&self) -> &str {
        &self.key_name
    }

    pub fn mnemonic(&self) -> Option<&str> {
        self.mnemonic.as_deref()
    }
}

impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Identity")
            .field("key_name", &self.key_name)
            .field("mnemonic", &self.mnemonic.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// A contract instantiated by [`ChainClient::deploy`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeployedContract {
    pub address: String,
    pub code_id: Option<u64>,
}

/// Acknowledgment of a committed execute transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecuteAck {
    pub tx_hash: String,
}

/// Upload, instantiate, execute and query primitives of a chain.
pub trait ChainClient: Send {
    /// Address of the account behind `identity`.
    fn account_address(
        &mut self,
        identity: &Identity,
    ) -> impl Future<Output = Result<String>> + Send;

    /// Store the artifact at `artifact` and instantiate it with `init_msg`.
    fn deploy(
        &mut self,
        identity: &Identity,
        artifact: &Path,
        init_msg: &Value,
        label: &str,
    ) -> impl Future<Output = Result<DeployedContract>> + Send;

    /// Execute `msg` on the contract at `contract`.
    fn execute(
        &mut self,
        identity: &Identity,
        contract: &str,
        msg: &Value,
    ) -> impl Future<Output = Result<ExecuteAck>> + Send;

    /// Run a smart query against the contract at `contract`.
    fn query(&mut self, contract: &str, msg: &Value) -> impl Future<Output = Result<Value>> + Send;
}

/// Name of the top-level variant of a JSON message, e.g. `set_open`.
pub(crate) fn message_name(msg: &Value) -> &str {
    msg.as_object()
        .and_then(|object| object.keys().next())
        .map(String::as_str)
        .unwrap_or("<empty>")
}
