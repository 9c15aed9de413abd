use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;

use super::{upsert_into, RecordStore, UpsertOutcome};
use crate::error::StoreError;
use crate::models::{RepoId, RepositoryRecord};

/// In-process store. Contents are lost when the value is dropped.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: RwLock<HashMap<RepoId, RepositoryRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_records(records: impl IntoIterator<Item = RepositoryRecord>) -> Self {
        Self {
            records: RwLock::new(records.into_iter().map(|r| (r.id, r)).collect()),
        }
    }

    /// Snapshot of every record, ordered by identity.
    pub fn records(&self) -> Vec<RepositoryRecord> {
        let mut all: Vec<_> = self.records.read().values().cloned().collect();
        all.sort_by_key(|r| r.id);
        all
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn get(&self, id: RepoId) -> Result<Option<RepositoryRecord>, StoreError> {
        Ok(self.records.read().get(&id).cloned())
    }

    async fn upsert(&self, record: RepositoryRecord) -> Result<UpsertOutcome, StoreError> {
        Ok(upsert_into(&mut self.records.write(), record))
    }

    async fn len(&self) -> Result<usize, StoreError> {
        Ok(self.records.read().len())
    }
}
