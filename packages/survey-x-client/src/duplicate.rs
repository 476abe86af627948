use std::sync::Arc;

use derive_new::new;
use solana_sdk::pubkey::Pubkey;
use tracing::{info, instrument, warn};

use crate::error::SubmissionError;
use crate::store::MetadataStore;
use crate::types::{MetadataRecord, ResourceId};

/// Enforces one live record per (resource, identity) and collapses orphans left by
/// compensation that never completed.
#[derive(Clone, new)]
pub struct DuplicateGuard {
    store: Arc<dyn MetadataStore>,
}

impl DuplicateGuard {
    #[instrument(skip_all, fields(%resource_id, %identity))]
    pub async fn check(&self, resource_id: &ResourceId, identity: &Pubkey) -> Result<(), SubmissionError> {
        let records = self
            .store
            .query(resource_id, identity)
            .await
            .map_err(SubmissionError::StoreUnavailable)?;

        let Some((newest, stale)) = records.split_first() else {
            return Ok(());
        };

        let reconciled = if stale.is_empty() {
            0
        } else {
            self.reconcile(newest, stale).await
        };

        Err(SubmissionError::AlreadySubmitted {
            resource_id: resource_id.clone(),
            identity: *identity,
            reconciled,
        })
    }

    /// Deletes every stale record, returning how many went away.
    async fn reconcile(&self, newest: &MetadataRecord, stale: &[MetadataRecord]) -> usize {
        warn!(kept = %newest.id, stale = stale.len(), "reconciling duplicate records");

        let mut deleted = 0;
        for record in stale {
            match self.store.delete(record.id).await {
                Ok(()) => deleted += 1,
                Err(err) => warn!(record_id = %record.id, error = %err, "orphan delete failed"),
            }
        }

        info!(deleted, "reconciliation finished");
        deleted
    }
}
