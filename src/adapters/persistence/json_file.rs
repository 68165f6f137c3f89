//! Atomic JSON File - Crash-safe Small File Storage
//!
//! Every write goes to a sibling `.tmp` file which is then renamed over
//! the target, so readers only ever see the old or the new version.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::fs;

/// One JSON document on disk.
#[derive(Debug, Clone)]
pub struct JsonFile {
    path: PathBuf,
    tmp_path: PathBuf,
}

impl JsonFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let mut tmp = path.clone().into_os_string();
        tmp.push(".tmp");
        Self {
            path,
            tmp_path: PathBuf::from(tmp),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Parsed contents, `None` when the file does not exist.
    pub async fn read<T: DeserializeOwned>(&self) -> Result<Option<T>> {
        let json = match fs::read_to_string(&self.path).await {
            Ok(json) => json,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to read {}", self.path.display()));
            }
        };
        let value = serde_json::from_str(&json)
            .with_context(|| format!("Failed to parse {}", self.path.display()))?;
        Ok(Some(value))
    }

    /// Write atomically (tmp, then rename).
    pub async fn write<T: Serialize + ?Sized>(&self, value: &T) -> Result<()> {
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)
                .await
                .context("Failed to create cache directory")?;
        }
        let json = serde_json::to_string_pretty(value).context("Failed to serialize")?;
        fs::write(&self.tmp_path, &json)
            .await
            .context("Failed to write tmp file")?;
        fs::rename(&self.tmp_path, &self.path)
            .await
            .context("Failed to rename tmp file")?;
        Ok(())
    }
}
