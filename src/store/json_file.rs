use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use parking_lot::RwLock;

use super::{upsert_into, RecordStore, UpsertOutcome};
use crate::error::StoreError;
use crate::models::{RepoId, RepositoryRecord};

/// Store backed by a JSON array on disk, rewritten after every upsert.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    records: RwLock<HashMap<RepoId, RepositoryRecord>>,
}

impl JsonFileStore {
    /// Load `path` if it exists, otherwise start empty. The parent directory
    /// is created on open.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let records: Vec<RepositoryRecord> = if path.exists() {
            let data = std::fs::read_to_string(&path)?;
            if data.trim().is_empty() {
                Vec::new()
            } else {
                serde_json::from_str(&data)?
            }
        } else {
            Vec::new()
        };
        tracing::info!("Loaded {} records from {}", records.len(), path.display());

        Ok(Self {
            path,
            records: RwLock::new(records.into_iter().map(|r| (r.id, r)).collect()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Atomic write via temp file + rename.
    fn persist(&self, records: &HashMap<RepoId, RepositoryRecord>) -> Result<(), StoreError> {
        let mut sorted: Vec<&RepositoryRecord> = records.values().collect();
        sorted.sort_by_key(|r| r.id);
        let data = serde_json::to_string_pretty(&sorted)?;
        let tmp_path = self.path.with_extension("json.tmp");
        std::fs::write(&tmp_path, data)?;
        std::fs::rename(&tmp_path, &self.path)?;
        Ok(())
    }
}

#[async_trait]
impl RecordStore for JsonFileStore {
    async fn get(&self, id: RepoId) -> Result<Option<RepositoryRecord>, StoreError> {
        Ok(self.records.read().get(&id).cloned())
    }

    async fn upsert(&self, record: RepositoryRecord) -> Result<UpsertOutcome, StoreError> {
        let mut records = self.records.write();
        let id = record.id;
        let previous = records.get(&id).cloned();
        let outcome = upsert_into(&mut records, record);

        if let Err(e) = self.persist(&records) {
            // Keep memory and disk in agreement.
            match previous {
                Some(prev) => records.insert(id, prev),
                None => records.remove(&id),
            };
            return Err(e);
        }
        Ok(outcome)
    }

    async fn len(&self) -> Result<usize, StoreError> {
        Ok(self.records.read().len())
    }
}
