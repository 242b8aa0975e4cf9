//! Builder module for creating a [`Deployer`] configuration.
//!
//! This module provides the [`DeployerBuilder`] struct which resolves the
//! artifacts directory and creates the output data directory that receives the
//! deployment manifest.

use std::path::PathBuf;

use anyhow::{Context, Result};

use crate::{
    ArtifactStore, Deployer,
    contracts::DEFAULT_ARTIFACTS_DIR,
    fs::FsHandler,
    manifest::{MANIFEST_FILENAME, ManifestTarget},
};

/// Specifies how the output data directory should be created.
#[derive(Debug, Clone)]
pub enum OutDataPath {
    /// Use a fresh temporary directory. It is kept after the run.
    TempDir,
    /// Use a specific path.
    Path(PathBuf),
}

/// Builder for creating a [`Deployer`] configuration.
///
/// # Example
///
/// ```no_run
/// use margined_deploy::DeployerBuilder;
///
/// # fn example() -> anyhow::Result<()> {
/// let deployer = DeployerBuilder::new("localterra")
///     .artifacts_dir("../artifacts")
///     .outdata_path("./data")
///     .build()?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct DeployerBuilder {
    /// Chain id recorded in the manifest.
    chain_id: String,
    /// Directory holding the `.wasm` artifacts.
    artifacts_dir: Option<PathBuf>,
    /// The output data path specification.
    outdata: Option<OutDataPath>,
    /// Whether to write the deployment manifest.
    write_manifest: bool,
    /// Whether to check artifacts before the first step.
    check_artifacts: bool,
}

impl DeployerBuilder {
    /// Create a new [`DeployerBuilder`] for the given chain id.
    pub fn new(chain_id: impl Into<String>) -> Self {
        Self {
            chain_id: chain_id.into(),
            artifacts_dir: None,
            outdata: None,
            write_manifest: true,
            check_artifacts: true,
        }
    }

    /// Set the artifacts directory. Defaults to `../artifacts`.
    pub fn artifacts_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.artifacts_dir = Some(path.into());
        self
    }

    /// Set the output data directory path.
    ///
    /// If not set, defaults to the current directory.
    pub fn outdata(mut self, outdata: OutDataPath) -> Self {
        self.outdata = Some(outdata);
        self
    }

    /// Set the output data directory to a specific path.
    pub fn outdata_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.outdata = Some(OutDataPath::Path(path.into()));
        self
    }

    pub fn write_manifest(mut self, write_manifest: bool) -> Self {
        self.write_manifest = write_manifest;
        self
    }

    pub fn check_artifacts(mut self, check_artifacts: bool) -> Self {
        self.check_artifacts = check_artifacts;
        self
    }

    /// Build the [`Deployer`] configuration.
    ///
    /// Creates the output data directory if the manifest is enabled.
    pub fn build(self) -> Result<Deployer> {
        let artifacts = ArtifactStore::new(
            self.artifacts_dir
                .unwrap_or_else(|| PathBuf::from(DEFAULT_ARTIFACTS_DIR)),
        );

        let manifest = if self.write_manifest {
            let outdata_path = match self.outdata {
                None => PathBuf::from("."),
                Some(OutDataPath::TempDir) => tempdir::TempDir::new("data-margined-")
                    .context("Failed to create temporary directory")?
                    .into_path(),
                Some(OutDataPath::Path(path)) => path,
            };

            FsHandler::create_output_directory(&outdata_path)?;

            let outdata_path = outdata_path
                .canonicalize()
                .context("Failed to canonicalize output data directory path")?;

            Some(ManifestTarget {
                path: outdata_path.join(MANIFEST_FILENAME),
                chain_id: self.chain_id.clone(),
            })
        } else {
            None
        };

        tracing::info!(
            chain_id = %self.chain_id,
            artifacts = %artifacts.root().display(),
            manifest = ?manifest.as_ref().map(|target| target.path.display().to_string()),
            "Building deployer configuration..."
        );

        Ok(Deployer {
            artifacts,
            manifest,
            check_artifacts: self.check_artifacts,
        })
    }
}
