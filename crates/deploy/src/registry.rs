//! Run-scoped registry of deployed contracts.

use derive_more::Deref;
use serde::{Deserialize, Serialize};

use crate::{ContractName, DeployError, DeployResult};

/// A contract instantiated during a run. Never modified once recorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractDeploymentRecord {
    pub name: ContractName,
    pub address: String,
    /// Position of the deployment within the run, starting at 1.
    pub ordinal: usize,
    /// Unix timestamp (seconds) at which the deployment was confirmed.
    pub deployed_at: i64,
    /// Artifact file the contract was instantiated from.
    pub artifact: String,
    /// Code id of the stored artifact, when the chain client reports one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code_id: Option<u64>,
}

/// Maps contract names to the contracts deployed so far in the current run.
///
/// Names are written at most once: recording a name twice is rejected and the
/// first record is kept. Dereferences to the records in deployment order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deref)]
pub struct ContractRegistry {
    #[deref]
    records: Vec<ContractDeploymentRecord>,
}

impl ContractRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a freshly deployed contract and return its record.
    pub fn record(
        &mut self,
        name: ContractName,
        address: impl Into<String>,
        artifact: impl Into<String>,
        code_id: Option<u64>,
    ) -> DeployResult<&ContractDeploymentRecord> {
        if let Some(existing) = self.get(name) {
            return Err(DeployError::DuplicateRegistration {
                name,
                existing: existing.address.clone(),
            });
        }

        self.records.push(ContractDeploymentRecord {
            name,
            address: address.into(),
            ordinal: self.records.len() + 1,
            deployed_at: chrono::Utc::now().timestamp(),
            artifact: artifact.into(),
            code_id,
        });

        tracing::debug!(contract = %name, count = self.records.len(), "Contract recorded in registry");

        Ok(&self.records[self.records.len() - 1])
    }

    /// Address of a recorded contract.
    pub fn resolve(&self, name: ContractName) -> DeployResult<&str> {
        self.get(name)
            .map(|record| record.address.as_str())
            .ok_or(DeployError::UnknownContract { name, step: None })
    }

    pub fn get(&self, name: ContractName) -> Option<&ContractDeploymentRecord> {
        self.records.iter().find(|record| record.name == name)
    }

    pub fn contains(&self, name: ContractName) -> bool {
        self.get(name).is_some()
    }

    /// Records in deployment order.
    pub fn records(&self) -> &[ContractDeploymentRecord] {
        &self.records
    }
}
