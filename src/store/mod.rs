//! Record persistence keyed by repository identity.

pub mod json_file;
pub mod memory;

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::models::{monotonic_timestamp, RepoId, RepositoryRecord};

pub use json_file::JsonFileStore;
pub use memory::MemoryStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpsertOutcome {
    Inserted,
    Updated,
}

#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn get(&self, id: RepoId) -> Result<Option<RepositoryRecord>, StoreError>;

    /// Insert or replace the record for `record.id`. Repeating the same
    /// upsert leaves exactly one record and never moves `last_observed_at`
    /// backwards.
    async fn upsert(&self, record: RepositoryRecord) -> Result<UpsertOutcome, StoreError>;

    async fn len(&self) -> Result<usize, StoreError>;
}

/// Shared upsert rule for the map-backed stores.
pub(crate) fn upsert_into(
    records: &mut HashMap<RepoId, RepositoryRecord>,
    mut record: RepositoryRecord,
) -> UpsertOutcome {
    match records.get_mut(&record.id) {
        Some(existing) => {
            record.last_observed_at =
                monotonic_timestamp(&record.last_observed_at, &existing.last_observed_at);
            *existing = record;
            UpsertOutcome::Updated
        }
        None => {
            records.insert(record.id, record);
            UpsertOutcome::Inserted
        }
    }
}
