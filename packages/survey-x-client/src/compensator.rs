use std::sync::Arc;

use derive_new::new;
use thiserror::Error;
use tracing::{info, instrument, warn};

use crate::error::StoreError;
use crate::store::MetadataStore;
use crate::types::RecordId;

#[derive(Debug, Error)]
#[error("failed to delete record {record_id}: {source}")]
pub struct CompensationFailed {
    pub record_id: RecordId,
    #[source]
    pub source: StoreError,
}

/// Outcome of undoing an attempt's writes. Attached to the error the caller receives.
#[derive(Debug, Default)]
pub struct CompensationReport {
    pub deleted: Vec<RecordId>,
    pub failed: Vec<CompensationFailed>,
}

impl CompensationReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Best-effort removal of records whose ledger transaction never confirmed. Leftovers
/// are collapsed later by the duplicate guard.
#[derive(Clone, new)]
pub struct Compensator {
    store: Arc<dyn MetadataStore>,
}

impl Compensator {
    #[instrument(skip(self))]
    pub async fn compensate(&self, record_ids: &[RecordId]) -> CompensationReport {
        let mut report = CompensationReport::default();

        for &record_id in record_ids {
            match self.store.delete(record_id).await {
                Ok(()) => report.deleted.push(record_id),
                Err(source) => {
                    warn!(%record_id, error = %source, "compensation delete failed");
                    report.failed.push(CompensationFailed { record_id, source });
                }
            }
        }

        info!(
            deleted = report.deleted.len(),
            failed = report.failed.len(),
            "compensation finished"
        );
        report
    }
}
