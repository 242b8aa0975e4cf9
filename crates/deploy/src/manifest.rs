//! Deployment manifest persisted after each run.
//!
//! The manifest is a JSON file holding one entry per network. Writing the entry
//! of a network leaves the entries of other networks untouched.

use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::{ContractDeploymentRecord, ContractRegistry};

/// The default name of the manifest file inside the output directory.
pub const MANIFEST_FILENAME: &str = "deployments.json";

/// Progress of the run that last wrote a network entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RunStatus {
    InProgress,
    Completed,
    Failed,
}

/// Contracts deployed on one network by the last run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkDeployment {
    /// Chain id the contracts live on.
    pub chain_id: String,
    /// Fingerprint of the configuration profile used.
    pub profile_fingerprint: String,
    pub status: RunStatus,
    /// Unix timestamp of the last write.
    pub updated_at: i64,
    /// Margined deployer version that wrote the entry.
    pub deployer_version: String,
    pub contracts: Vec<ContractDeploymentRecord>,
}

impl NetworkDeployment {
    pub fn new(
        chain_id: impl Into<String>,
        profile_fingerprint: impl Into<String>,
        status: RunStatus,
        registry: &ContractRegistry,
    ) -> Self {
        Self {
            chain_id: chain_id.into(),
            profile_fingerprint: profile_fingerprint.into(),
            status,
            updated_at: chrono::Utc::now().timestamp(),
            deployer_version: env!("CARGO_PKG_VERSION").to_string(),
            contracts: registry.records().to_vec(),
        }
    }
}

/// All recorded deployments, keyed by network name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentManifest {
    #[serde(flatten)]
    pub networks: BTreeMap<String, NetworkDeployment>,
}

impl DeploymentManifest {
    /// Load the manifest, or an empty one if the file does not exist yet.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .context(format!("Failed to read deployment manifest from {}", path.display()))?;

        serde_json::from_str(&content).context("Failed to parse deployment manifest JSON")
    }

    /// Save the manifest as formatted JSON, creating parent directories.
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).context(format!(
                "Failed to create manifest directory {}",
                parent.display()
            ))?;
        }

        let json =
            serde_json::to_string_pretty(self).context("Failed to serialize deployment manifest")?;

        std::fs::write(path, json)
            .context(format!("Failed to write deployment manifest to {}", path.display()))?;

        Ok(())
    }

    /// Replace the entry of one network in the manifest file at `path`.
    pub fn upsert(path: &Path, network: &str, deployment: NetworkDeployment) -> Result<()> {
        let mut manifest = Self::load_or_default(path)?;
        manifest.networks.insert(network.to_string(), deployment);
        manifest.save_to_file(path)?;

        tracing::debug!(path = %path.display(), network, "Deployment manifest updated");
        Ok(())
    }

    pub fn network(&self, network: &str) -> Option<&NetworkDeployment> {
        self.networks.get(network)
    }
}

/// Where a run writes its manifest, if anywhere.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestTarget {
    pub path: PathBuf,
    pub chain_id: String,
}
