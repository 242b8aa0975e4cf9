//! Logical contract names and their build artifacts.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::{DeployError, DeployResult};

/// Default artifacts directory, relative to the working directory.
pub const DEFAULT_ARTIFACTS_DIR: &str = "../artifacts";

/// File extension of compiled contract artifacts.
pub const ARTIFACT_EXTENSION: &str = "wasm";

/// The contracts making up a Margined deployment.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ContractName {
    InsuranceFund,
    FeePool,
    PriceFeed,
    Vamm,
    Engine,
}

impl ContractName {
    /// Name of the build artifact, without extension.
    pub fn artifact(&self) -> &'static str {
        match self {
            ContractName::InsuranceFund => "margined_insurance_fund",
            ContractName::FeePool => "margined_fee_pool",
            ContractName::PriceFeed => "mock_pricefeed",
            ContractName::Vamm => "margined_vamm",
            ContractName::Engine => "margined_engine",
        }
    }

    /// Human-readable contract title used in step labels.
    pub fn title(&self) -> &'static str {
        match self {
            ContractName::InsuranceFund => "Insurance Fund",
            ContractName::FeePool => "Fee Pool",
            ContractName::PriceFeed => "Mock PriceFeed",
            ContractName::Vamm => "vAMM",
            ContractName::Engine => "Margin Engine",
        }
    }
}

/// Resolves contract names to artifact files inside one directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactStore {
    root: PathBuf,
}

impl Default for ArtifactStore {
    fn default() -> Self {
        Self::new(DEFAULT_ARTIFACTS_DIR)
    }
}

impl ArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_for(&self, contract: ContractName) -> PathBuf {
        self.root
            .join(contract.artifact())
            .with_extension(ARTIFACT_EXTENSION)
    }

    /// Check that the artifact of every listed contract is a readable file.
    ///
    /// All missing artifacts are listed in a single error.
    pub fn ensure_present(
        &self,
        contracts: impl IntoIterator<Item = ContractName>,
    ) -> DeployResult<()> {
        let missing: Vec<String> = contracts
            .into_iter()
            .map(|contract| self.path_for(contract))
            .filter(|path| !path.is_file())
            .map(|path| path.display().to_string())
            .collect();

        if missing.is_empty() {
            return Ok(());
        }

        Err(DeployError::Configuration(format!(
            "missing contract artifacts: {}",
            missing.join(", ")
        )))
    }
}
