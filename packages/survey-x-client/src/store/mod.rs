use async_trait::async_trait;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Signature;

use crate::error::StoreError;
use crate::types::{MetadataRecord, RecordId, ResourceId, SubmissionKind};

pub mod memory;
pub mod postgrest;

pub use memory::MemoryMetadataStore;
pub use postgrest::PostgrestStore;

pub type Result<T> = std::result::Result<T, StoreError>;

/// Off-chain metadata table. Uniqueness of (resource id, identity) is enforced by the
/// backend where it can be; `insert` then reports [`StoreError::UniqueViolation`].
#[async_trait]
pub trait MetadataStore: Send + Sync {
    async fn insert(&self, record: MetadataRecord) -> Result<RecordId>;

    /// Live records for the pair, newest first.
    async fn query(&self, resource_id: &ResourceId, identity: &Pubkey) -> Result<Vec<MetadataRecord>>;

    /// Deleting a record that is already gone succeeds.
    async fn delete(&self, id: RecordId) -> Result<()>;

    async fn mark_confirmed(&self, id: RecordId, signature: &Signature) -> Result<MetadataRecord>;

    /// Live records of one kind on the resource, across every identity.
    async fn count_for_resource(&self, resource_id: &ResourceId, kind: SubmissionKind) -> Result<u64>;
}
