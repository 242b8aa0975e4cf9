//! Errors surfaced by a deployment run.

use std::path::PathBuf;

use crate::ContractName;

/// Every way a deployment run can stop.
///
/// Remote failures keep the adapter error as their `source`, so printing the
/// error chain (`{:#}` on an `anyhow::Error`) shows the step label, the contract
/// involved and the underlying node message.
#[derive(Debug, thiserror::Error)]
pub enum DeployError {
    /// Bad or missing run mode, endpoint setting, secret or profile field.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Upload or instantiation of a contract failed.
    #[error("step '{label}' failed to deploy {contract}")]
    Deployment {
        label: String,
        contract: ContractName,
        #[source]
        source: anyhow::Error,
    },

    /// A transaction against a deployed contract was rejected.
    #[error("step '{label}' failed to execute on {contract} ({address})")]
    Execution {
        label: String,
        contract: ContractName,
        address: String,
        #[source]
        source: anyhow::Error,
    },

    /// A smart query against a deployed contract failed.
    #[error("step '{label}' failed to query {contract} ({address})")]
    Query {
        label: String,
        contract: ContractName,
        address: String,
        #[source]
        source: anyhow::Error,
    },

    /// A contract name was recorded twice in the same run.
    #[error("contract {name} is already registered at {existing}")]
    DuplicateRegistration { name: ContractName, existing: String },

    /// A step referenced a contract that no earlier step produced.
    #[error("contract {name} has not been deployed yet{}", step_suffix(.step))]
    UnknownContract {
        name: ContractName,
        step: Option<String>,
    },

    /// The deployment manifest could not be read or written.
    #[error("deployment manifest error at {}", path.display())]
    Manifest {
        path: PathBuf,
        #[source]
        source: anyhow::Error,
    },
}

fn step_suffix(step: &Option<String>) -> String {
    step.as_ref()
        .map(|label| format!(" (referenced by step '{label}')"))
        .unwrap_or_default()
}

impl DeployError {
    /// The label of the step that failed, when the error belongs to one.
    pub fn step_label(&self) -> Option<&str> {
        match self {
            Self::Deployment { label, .. }
            | Self::Execution { label, .. }
            | Self::Query { label, .. } => Some(label),
            Self::UnknownContract { step, .. } => step.as_deref(),
            _ => None,
        }
    }
}

pub type DeployResult<T> = Result<T, DeployError>;
