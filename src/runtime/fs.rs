//! File system operations used for credential storage.

use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

use super::RealRuntime;

impl RealRuntime {
    #[tracing::instrument(skip(self))]
    pub(crate) fn read_to_string_impl(&self, path: &Path) -> Result<String> {
        fs::read_to_string(path)
            .with_context(|| format!("Failed to read file {}", path.display()))
    }

    #[tracing::instrument(skip(self, contents))]
    pub(crate) fn write_impl(&self, path: &Path, contents: &[u8]) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).context("Failed to create directory")?;
        }
        fs::write(path, contents)
            .with_context(|| format!("Failed to write to file {}", path.display()))?;
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    pub(crate) fn exists_impl(&self, path: &Path) -> bool {
        path.exists()
    }
}

#[cfg(test)]
mod tests {
    use crate::runtime::{RealRuntime, Runtime};
    use tempfile::tempdir;

    #[test]
    fn test_real_runtime_write_creates_parents() {
        let runtime = RealRuntime;
        let dir = tempdir().unwrap();
        let path = dir.path().join("telematics").join("credentials.json");

        assert!(!runtime.exists(&path));
        runtime.write(&path, b"{}").unwrap();
        assert!(runtime.exists(&path));
        assert_eq!(runtime.read_to_string(&path).unwrap(), "{}");
    }

    #[test]
    fn test_real_runtime_read_missing_file() {
        let runtime = RealRuntime;
        let dir = tempdir().unwrap();
        let err = runtime
            .read_to_string(&dir.path().join("missing.json"))
            .unwrap_err();
        assert!(err.to_string().contains("Failed to read file"));
    }
}
