use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::Utc;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Signature;

use super::{MetadataStore, Result};
use crate::error::StoreError;
use crate::types::{MetadataRecord, RecordId, ResourceId, SubmissionKind};

struct StoredRecord {
    sequence: u64,
    record: MetadataRecord,
}

struct MemoryInner {
    records: HashMap<RecordId, StoredRecord>,
    next_sequence: u64,
}

impl MemoryInner {
    fn new() -> Self {
        Self {
            records: HashMap::new(),
            next_sequence: 0,
        }
    }

    fn pair(&self, resource_id: &ResourceId, identity: &Pubkey) -> Vec<&StoredRecord> {
        self.records
            .values()
            .filter(|stored| &stored.record.resource_id == resource_id && &stored.record.identity == identity)
            .collect()
    }
}

/// In-process metadata table. Clones share the same rows.
#[derive(Clone)]
pub struct MemoryMetadataStore {
    inner: Arc<Mutex<MemoryInner>>,
    unique_pairs: bool,
}

impl MemoryMetadataStore {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(MemoryInner::new())),
            unique_pairs: true,
        }
    }

    /// Accepts several rows per (resource id, identity), like a table created without
    /// the unique index.
    pub fn without_unique_constraint() -> Self {
        Self {
            unique_pairs: false,
            ..Self::new()
        }
    }

    pub fn len(&self) -> Result<usize> {
        Ok(self.lock_inner()?.records.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.lock_inner()?.records.is_empty())
    }

    pub fn records(&self) -> Result<Vec<MetadataRecord>> {
        let inner = self.lock_inner()?;
        let mut stored: Vec<&StoredRecord> = inner.records.values().collect();
        stored.sort_by_key(|stored| stored.sequence);
        Ok(stored.into_iter().map(|stored| stored.record.clone()).collect())
    }

    fn lock_inner(&self) -> Result<MutexGuard<'_, MemoryInner>> {
        self.inner
            .lock()
            .map_err(|_| StoreError::Backend("memory store lock poisoned".to_string()))
    }
}

impl Default for MemoryMetadataStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MetadataStore for MemoryMetadataStore {
    async fn insert(&self, record: MetadataRecord) -> Result<RecordId> {
        let mut inner = self.lock_inner()?;
        if self.unique_pairs && !inner.pair(&record.resource_id, &record.identity).is_empty() {
            return Err(StoreError::UniqueViolation {
                resource_id: record.resource_id,
                identity: record.identity,
            });
        }

        let id = record.id;
        let sequence = inner.next_sequence;
        inner.next_sequence += 1;
        inner.records.insert(id, StoredRecord { sequence, record });

        Ok(id)
    }

    async fn query(&self, resource_id: &ResourceId, identity: &Pubkey) -> Result<Vec<MetadataRecord>> {
        let inner = self.lock_inner()?;
        let mut stored = inner.pair(resource_id, identity);
        stored.sort_by(|a, b| {
            b.record
                .created_at
                .cmp(&a.record.created_at)
                .then(b.sequence.cmp(&a.sequence))
        });

        Ok(stored.into_iter().map(|stored| stored.record.clone()).collect())
    }

    async fn delete(&self, id: RecordId) -> Result<()> {
        self.lock_inner()?.records.remove(&id);
        Ok(())
    }

    async fn mark_confirmed(&self, id: RecordId, signature: &Signature) -> Result<MetadataRecord> {
        let mut inner = self.lock_inner()?;
        let stored = inner.records.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        stored.record.confirm(signature, Utc::now());

        Ok(stored.record.clone())
    }

    async fn count_for_resource(&self, resource_id: &ResourceId, kind: SubmissionKind) -> Result<u64> {
        let inner = self.lock_inner()?;
        let count = inner
            .records
            .values()
            .filter(|stored| &stored.record.resource_id == resource_id && stored.record.kind == kind)
            .count();

        Ok(count as u64)
    }
}
