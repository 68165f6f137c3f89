//! Capability Cache - Detected Plan Tiers on Disk
//!
//! `.plans.json` maps credential fingerprints to detected tiers. Entries
//! written for other keys are preserved on save.

use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{info, instrument};

use crate::domain::capability::PlanCapability;
use crate::ports::cache::CapabilityStore;

use super::json_file::JsonFile;

pub const PLANS_FILE: &str = ".plans.json";

/// File-backed [`CapabilityStore`].
pub struct FileCapabilityStore {
    file: JsonFile,
    /// Serializes read-modify-write cycles.
    lock: Mutex<()>,
}

impl FileCapabilityStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            file: JsonFile::new(path),
            lock: Mutex::new(()),
        }
    }

    async fn entries(&self) -> Result<BTreeMap<String, PlanCapability>> {
        Ok(self.file.read().await?.unwrap_or_default())
    }
}

#[async_trait]
impl CapabilityStore for FileCapabilityStore {
    async fn load(&self, fingerprint: &str) -> Result<Option<PlanCapability>> {
        let _guard = self.lock.lock().await;
        Ok(self.entries().await?.remove(fingerprint))
    }

    #[instrument(skip(self, plan))]
    async fn save(&self, fingerprint: &str, plan: &PlanCapability) -> Result<()> {
        let _guard = self.lock.lock().await;
        // A corrupt file is replaced rather than blocking the save.
        let mut entries = self.entries().await.unwrap_or_default();
        entries.insert(fingerprint.to_string(), *plan);
        self.file.write(&entries).await?;
        info!(path = %self.file.path().display(), "Plan capability cached");
        Ok(())
    }
}
