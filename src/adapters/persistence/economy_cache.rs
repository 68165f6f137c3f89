//! Economy Cache File - Last Economy Snapshot on Disk

use std::path::PathBuf;

use anyhow::Result;
use async_trait::async_trait;
use tracing::{debug, instrument};

use crate::domain::economy::EconomySnapshot;
use crate::ports::cache::EconomyStore;

use super::json_file::JsonFile;

pub const ECONOMY_FILE: &str = ".econ_cache.json";

/// File-backed [`EconomyStore`].
pub struct FileEconomyStore {
    file: JsonFile,
}

impl FileEconomyStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            file: JsonFile::new(path),
        }
    }
}

#[async_trait]
impl EconomyStore for FileEconomyStore {
    async fn load(&self) -> Result<Option<EconomySnapshot>> {
        self.file.read().await
    }

    #[instrument(skip_all)]
    async fn save(&self, snapshot: &EconomySnapshot) -> Result<()> {
        self.file.write(snapshot).await?;
        debug!(fetched_at = %snapshot.fetched_at, "Economy snapshot cached");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::economy::{EconomyKind, EconomyRecord, LaborMarket, TreasuryYields};
    use chrono::{TimeZone, Utc};

    #[tokio::test]
    async fn test_snapshot_survives_restart() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join(ECONOMY_FILE);
        let at = Utc.with_ymd_and_hms(2024, 3, 12, 21, 0, 0).unwrap();

        let mut snap = EconomySnapshot::empty(at);
        snap.apply(
            EconomyRecord::Treasury(TreasuryYields {
                yield_10_year: Some(4.21),
                ..TreasuryYields::default()
            }),
            at,
        );
        snap.apply(EconomyRecord::Labor(LaborMarket::default()), at);
        snap.stale.insert(EconomyKind::Inflation);

        FileEconomyStore::new(&path).save(&snap).await.unwrap();
        let loaded = FileEconomyStore::new(&path).load().await.unwrap().unwrap();
        assert_eq!(loaded, snap);
    }

    #[tokio::test]
    async fn test_missing_file_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileEconomyStore::new(dir.path().join(ECONOMY_FILE));
        assert!(store.load().await.unwrap().is_none());
    }
}
