//! File system utils.

use std::path::Path;

use anyhow::Context;

pub struct FsHandler;

impl FsHandler {
    /// Create the output data directory if it doesn't exist.
    ///
    /// Permissions of an existing directory are left as they are; a read-only
    /// directory is an error.
    pub fn create_output_directory(path: &Path) -> anyhow::Result<()> {
        if !path.try_exists().context(format!(
            "Failed to check if output data directory exists at path {}. Ensure you provided valid permissions to the directory.",
            path.display()
        ))? {
            std::fs::create_dir_all(path).context("Failed to create output data directory")?;
            tracing::debug!("Created output data directory: {}", path.display());
        }

        let metadata = std::fs::metadata(path).context("Failed to get metadata for output data directory")?;
        if !metadata.is_dir() {
            anyhow::bail!("Output data path {} is not a directory", path.display());
        }
        if metadata.permissions().readonly() {
            anyhow::bail!("Output data directory {} is read-only", path.display());
        }

        Ok(())
    }
}
