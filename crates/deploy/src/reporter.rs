//! Operator-facing output of a deployment run.

use std::{fmt, sync::Mutex};

use comfy_table::{ContentArrangement, Table, presets::UTF8_FULL};
use serde_json::Value;

use crate::{ContractDeploymentRecord, ExecuteAck, PipelineStep, pipeline::StepKind};

/// Result of a single pipeline step.
#[derive(Debug, Clone, PartialEq)]
pub enum StepOutcome {
    /// A contract was instantiated and recorded.
    Deployed(ContractDeploymentRecord),
    /// An execute transaction was committed.
    Executed(ExecuteAck),
    /// A query returned this snapshot.
    Queried(Value),
    /// A diagnostic query failed. The run continues.
    QueryFailed(String),
    /// The step failed and the run stops.
    Failed(String),
}

/// Observes step outcomes. Reporting never changes the course of a run.
pub trait Reporter: Sync {
    /// Called before a step is sent to the chain.
    fn step_started(&self, _step: &PipelineStep) {}

    /// Called after every step, successful or not.
    fn report(&self, step: &PipelineStep, outcome: &StepOutcome);
}

/// Logs every step through `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingReporter;

impl Reporter for TracingReporter {
    fn step_started(&self, step: &PipelineStep) {
        tracing::info!(contract = %step.contract, kind = %step.kind, "{}...", step.label);
    }

    fn report(&self, step: &PipelineStep, outcome: &StepOutcome) {
        match outcome {
            StepOutcome::Deployed(record) => tracing::info!(
                contract = %record.name,
                address = %record.address,
                code_id = ?record.code_id,
                "✓ {}: {}",
                step.label,
                record.address
            ),
            StepOutcome::Executed(ack) => {
                tracing::info!(tx_hash = %ack.tx_hash, "✓ {}", step.label)
            }
            StepOutcome::Queried(snapshot) => tracing::info!(
                "✓ {}:\n{}",
                step.label,
                serde_json::to_string_pretty(snapshot).unwrap_or_else(|_| snapshot.to_string())
            ),
            StepOutcome::QueryFailed(error) => {
                tracing::warn!(error = %error, "✗ {} (diagnostic only)", step.label)
            }
            StepOutcome::Failed(error) => {
                tracing::error!(contract = %step.contract, error = %error, "✗ {}", step.label)
            }
        }
    }
}

/// Keeps every reported outcome in memory.
#[derive(Debug, Default)]
pub struct RecordingReporter {
    entries: Mutex<Vec<(String, StepOutcome)>>,
}

impl RecordingReporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reported `(label, outcome)` pairs, in order.
    pub fn entries(&self) -> Vec<(String, StepOutcome)> {
        self.entries
            .lock()
            .map(|entries| entries.clone())
            .unwrap_or_default()
    }
}

impl Reporter for RecordingReporter {
    fn report(&self, step: &PipelineStep, outcome: &StepOutcome) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.push((step.label.clone(), outcome.clone()));
        }
    }
}

/// Outcome of one executed step, as kept in the run report.
#[derive(Debug, Clone, PartialEq)]
pub struct StepReport {
    pub label: String,
    pub kind: StepKind,
    pub outcome: StepOutcome,
}

/// Summary of a completed run.
#[derive(Debug, Clone, PartialEq)]
pub struct DeploymentReport {
    pub network: String,
    pub profile_fingerprint: String,
    /// Account that signed the run's transactions.
    pub deployer_address: String,
    pub contracts: Vec<ContractDeploymentRecord>,
    pub steps: Vec<StepReport>,
    /// vAMM state read at the end of the run, if the query succeeded.
    pub vamm_state: Option<Value>,
}

impl DeploymentReport {
    /// Address of a deployed contract, by name.
    pub fn address_of(&self, name: crate::ContractName) -> Option<&str> {
        self.contracts
            .iter()
            .find(|record| record.name == name)
            .map(|record| record.address.as_str())
    }

    /// Table of the deployed contracts.
    pub fn contracts_table(&self) -> Table {
        let mut table = Table::new();
        table
            .load_preset(UTF8_FULL)
            .set_content_arrangement(ContentArrangement::Dynamic)
            .set_header(vec!["#", "Contract", "Address", "Code ID"]);

        for record in &self.contracts {
            table.add_row(vec![
                record.ordinal.to_string(),
                record.name.to_string(),
                record.address.clone(),
                record
                    .code_id
                    .map(|id| id.to_string())
                    .unwrap_or_else(|| "-".to_string()),
            ]);
        }

        table
    }
}

impl fmt::Display for DeploymentReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Network:  {}", self.network)?;
        writeln!(f, "Deployer: {}", self.deployer_address)?;
        writeln!(f, "Profile:  {}", self.profile_fingerprint)?;
        writeln!(f)?;
        writeln!(f, "{}", self.contracts_table())?;

        match &self.vamm_state {
            Some(state) => writeln!(
                f,
                "vAMM state:\n{}",
                serde_json::to_string_pretty(state).unwrap_or_else(|_| state.to_string())
            ),
            None => writeln!(f, "vAMM state: unavailable"),
        }
    }
}
