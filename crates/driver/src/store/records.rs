use super::{read_snapshot, write_snapshot};
use crate::{gate::Gate, types::GameRecord};
use anyhow::Result;
use async_trait::async_trait;
use std::{collections::BTreeMap, path::PathBuf};

/// The record store as every writer sees it: a repository behind the process-wide [Gate].
pub type RecordGate = Gate<Box<dyn RecordRepository>>;

/// The [RecordRepository] trait abstracts the keyed game record store so the backing
/// medium can change without touching dispatch, job, or reveal logic.
///
/// Mutations only touch the in-memory view; [RecordRepository::persist] writes the whole
/// collection in one replacement.
#[async_trait]
pub trait RecordRepository: Send + Sync {
    /// The record for `id`, if known.
    fn get(&self, id: u64) -> Option<&GameRecord>;

    /// Mutable access to the record for `id`, if known.
    fn get_mut(&mut self, id: u64) -> Option<&mut GameRecord>;

    /// The record for `id`, created empty if absent.
    fn get_or_create(&mut self, id: u64) -> &mut GameRecord;

    /// Inserts or replaces `record` under its id.
    fn upsert(&mut self, record: GameRecord);

    /// Every record, ordered by ascending id.
    fn list_all(&self) -> Vec<&GameRecord>;

    /// Whether `id` is known.
    fn contains(&self, id: u64) -> bool {
        self.get(id).is_some()
    }

    /// Persists the full collection.
    async fn persist(&self) -> Result<()>;
}

/// A [RecordRepository] that lives only in memory.
#[derive(Debug, Default)]
pub struct MemoryRecordStore {
    records: BTreeMap<u64, GameRecord>,
}

impl MemoryRecordStore {
    /// Creates a [MemoryRecordStore] seeded with `records`.
    pub fn with_records(records: impl IntoIterator<Item = GameRecord>) -> Self {
        Self {
            records: records.into_iter().map(|r| (r.id, r)).collect(),
        }
    }
}

#[async_trait]
impl RecordRepository for MemoryRecordStore {
    fn get(&self, id: u64) -> Option<&GameRecord> {
        self.records.get(&id)
    }

    fn get_mut(&mut self, id: u64) -> Option<&mut GameRecord> {
        self.records.get_mut(&id)
    }

    fn get_or_create(&mut self, id: u64) -> &mut GameRecord {
        self.records.entry(id).or_insert_with(|| GameRecord::new(id))
    }

    fn upsert(&mut self, record: GameRecord) {
        self.records.insert(record.id, record);
    }

    fn list_all(&self) -> Vec<&GameRecord> {
        self.records.values().collect()
    }

    async fn persist(&self) -> Result<()> {
        Ok(())
    }
}

/// A [RecordRepository] persisted as a single JSON array of records, ordered by id.
#[derive(Debug)]
pub struct FileRecordStore {
    path: PathBuf,
    inner: MemoryRecordStore,
}

impl FileRecordStore {
    /// Loads the records document at `path`, starting empty if it does not exist.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let records: Vec<GameRecord> = read_snapshot(&path).await?.unwrap_or_default();
        tracing::info!(target: "record-store", "Loaded {} game records from {}", records.len(), path.display());
        Ok(Self {
            path,
            inner: MemoryRecordStore::with_records(records),
        })
    }
}

#[async_trait]
impl RecordRepository for FileRecordStore {
    fn get(&self, id: u64) -> Option<&GameRecord> {
        self.inner.get(id)
    }

    fn get_mut(&mut self, id: u64) -> Option<&mut GameRecord> {
        self.inner.get_mut(id)
    }

    fn get_or_create(&mut self, id: u64) -> &mut GameRecord {
        self.inner.get_or_create(id)
    }

    fn upsert(&mut self, record: GameRecord) {
        self.inner.upsert(record)
    }

    fn list_all(&self) -> Vec<&GameRecord> {
        self.inner.list_all()
    }

    async fn persist(&self) -> Result<()> {
        write_snapshot(&self.path, &self.inner.list_all()).await
    }
}
