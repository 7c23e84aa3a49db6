use async_trait::async_trait;
use log::{debug, info, warn};
use std::collections::HashSet;
use std::ffi::OsString;
use std::io::Write;
use std::path::{Path, PathBuf};

use super::{CommitOutcome, RecordStore, StoreKind};
use crate::api::types::ScrapedRecord;
use crate::error::{HarvestError, Result};

/// Whole-collection JSON snapshot.
///
/// Records live in memory; a flush writes `{file}.tmp`, syncs it and renames
/// it over the canonical file, so the canonical file is always a complete
/// snapshot. Commits flush every `flush_every` records.
#[derive(Debug)]
pub struct SnapshotStore {
    path: PathBuf,
    records: Vec<ScrapedRecord>,
    ids: HashSet<u64>,
    flush_every: usize,
    pending: usize,
}

impl SnapshotStore {
    /// Load the snapshot at `path`. A missing file is an empty store; a file
    /// that cannot be decoded is an error and is left untouched.
    pub async fn open<P: AsRef<Path>>(path: P, flush_every: usize) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        let records: Vec<ScrapedRecord> = match tokio::fs::read(&path).await {
            Ok(bytes) if bytes.iter().all(u8::is_ascii_whitespace) => Vec::new(),
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(|e| {
                HarvestError::Storage(format!("snapshot {} is unreadable: {}", path.display(), e))
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(e.into()),
        };

        let mut ids = HashSet::with_capacity(records.len());
        let mut unique = Vec::with_capacity(records.len());
        for record in records {
            if ids.insert(record.external_id) {
                unique.push(record);
            } else {
                warn!("Dropping duplicate snapshot entry {}", record.external_id);
            }
        }

        info!("Loaded {} records from {}", unique.len(), path.display());
        Ok(Self {
            path,
            records: unique,
            ids,
            flush_every: flush_every.max(1),
            pending: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Commits accepted since the last flush.
    pub fn pending(&self) -> usize {
        self.pending
    }

    pub(crate) fn temp_path(&self) -> PathBuf {
        let mut tmp: OsString = self.path.as_os_str().to_owned();
        tmp.push(".tmp");
        PathBuf::from(tmp)
    }

    /// First half of a flush: the full collection, synced, under the temp name.
    pub(crate) async fn write_temp(&self) -> Result<PathBuf> {
        let bytes = serde_json::to_vec_pretty(&self.records)?;
        let tmp = self.temp_path();
        let target = tmp.clone();

        tokio::task::spawn_blocking(move || -> Result<()> {
            let mut file = std::fs::File::create(&target)?;
            file.write_all(&bytes)?;
            file.sync_all()?;
            Ok(())
        })
        .await
        .map_err(|e| HarvestError::Storage(format!("snapshot write task failed: {}", e)))??;

        Ok(tmp)
    }

    /// Second half: atomically replace the canonical file.
    async fn promote(&self, tmp: PathBuf) -> Result<()> {
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || -> Result<()> {
            std::fs::rename(&tmp, &path)?;
            #[cfg(unix)]
            {
                if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                    std::fs::File::open(parent)?.sync_all()?;
                }
            }
            Ok(())
        })
        .await
        .map_err(|e| HarvestError::Storage(format!("snapshot rename task failed: {}", e)))?
    }

    fn rollback_last(&mut self) {
        if let Some(record) = self.records.pop() {
            self.ids.remove(&record.external_id);
            self.pending = self.pending.saturating_sub(1);
        }
    }
}

#[async_trait]
impl RecordStore for SnapshotStore {
    fn kind(&self) -> StoreKind {
        StoreKind::Json
    }

    async fn load_known_ids(&self) -> Result<HashSet<u64>> {
        Ok(self.ids.clone())
    }

    async fn commit(&mut self, record: &ScrapedRecord) -> Result<CommitOutcome> {
        if self.ids.contains(&record.external_id) {
            return Ok(CommitOutcome::Duplicate);
        }

        self.ids.insert(record.external_id);
        self.records.push(record.clone());
        self.pending += 1;

        if self.pending >= self.flush_every {
            if let Err(e) = self.flush().await {
                self.rollback_last();
                return Err(e);
            }
        }
        Ok(CommitOutcome::Inserted)
    }

    async fn flush(&mut self) -> Result<()> {
        if self.pending == 0 && tokio::fs::try_exists(&self.path).await.unwrap_or(false) {
            return Ok(());
        }

        let tmp = self.write_temp().await?;
        self.promote(tmp).await?;
        info!("Progress saved: {} records in {}", self.records.len(), self.path.display());
        self.pending = 0;
        Ok(())
    }

    async fn records(&self) -> Result<Vec<ScrapedRecord>> {
        debug!("Listing {} snapshot records", self.records.len());
        Ok(self.records.clone())
    }
}
