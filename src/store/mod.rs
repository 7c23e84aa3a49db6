//! Durable record storage and the index of already captured bills.

pub mod snapshot;
pub mod sqlite;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::api::types::ScrapedRecord;
use crate::error::{HarvestError, Result};

pub use snapshot::SnapshotStore;
pub use sqlite::SqliteStore;

/// Result of committing one record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitOutcome {
    Inserted,
    /// The external id was already stored; nothing changed.
    Duplicate,
}

/// Storage backend selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum StoreKind {
    /// Single JSON snapshot file
    Json,
    /// SQLite database
    Sqlite,
}

impl StoreKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Sqlite => "sqlite",
        }
    }

    /// Default file name inside the data directory.
    pub fn file_name(&self) -> &'static str {
        match self {
            Self::Json => "projects.json",
            Self::Sqlite => "vozcivica.db",
        }
    }
}

impl fmt::Display for StoreKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StoreKind {
    type Err = HarvestError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "json" | "snapshot" => Ok(Self::Json),
            "sqlite" | "db" => Ok(Self::Sqlite),
            _ => Err(HarvestError::Config(format!(
                "unknown storage backend '{}' (expected json or sqlite)",
                s
            ))),
        }
    }
}

/// Durable-state contract shared by every backend.
///
/// `commit` is idempotent: a second commit of the same external id is a
/// [`CommitOutcome::Duplicate`] and leaves the store unchanged. A failed
/// commit leaves no trace of the record.
#[async_trait]
pub trait RecordStore: Send + Sync {
    fn kind(&self) -> StoreKind;

    /// External ids of every stored record.
    async fn load_known_ids(&self) -> Result<HashSet<u64>>;

    async fn commit(&mut self, record: &ScrapedRecord) -> Result<CommitOutcome>;

    /// Make every accepted commit durable.
    async fn flush(&mut self) -> Result<()>;

    /// Stored records in insertion order.
    async fn records(&self) -> Result<Vec<ScrapedRecord>>;
}

/// Set of external ids already captured.
///
/// Built once from the store at startup and grown only after a successful
/// commit.
#[derive(Debug, Clone, Default)]
pub struct KnownIndex {
    ids: HashSet<u64>,
}

impl KnownIndex {
    pub async fn load(store: &dyn RecordStore) -> Result<Self> {
        Ok(Self {
            ids: store.load_known_ids().await?,
        })
    }

    pub fn contains(&self, id: u64) -> bool {
        self.ids.contains(&id)
    }

    /// Returns false if the id was already known.
    pub fn insert(&mut self, id: u64) -> bool {
        self.ids.insert(id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

impl FromIterator<u64> for KnownIndex {
    fn from_iter<T: IntoIterator<Item = u64>>(iter: T) -> Self {
        Self {
            ids: iter.into_iter().collect(),
        }
    }
}

/// Store file for `kind` under `data_dir`.
pub fn store_path(kind: StoreKind, data_dir: &Path) -> PathBuf {
    data_dir.join(kind.file_name())
}

/// Open the configured backend at `path`.
pub async fn open_store(kind: StoreKind, path: &Path, flush_every: usize) -> Result<Box<dyn RecordStore>> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await?;
        }
    }

    match kind {
        StoreKind::Json => Ok(Box::new(SnapshotStore::open(path, flush_every).await?)),
        StoreKind::Sqlite => Ok(Box::new(SqliteStore::open(path).await?)),
    }
}
