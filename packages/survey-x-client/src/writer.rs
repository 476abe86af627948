use std::sync::Arc;

use chrono::Utc;
use derive_new::new;
use tracing::{info, instrument};

use crate::error::{StoreError, SubmissionError};
use crate::store::MetadataStore;
use crate::types::{CiphertextEnvelope, MetadataRecord, SubmissionRequest};

/// Writes the speculative `pending` record ahead of the ledger transaction.
#[derive(Clone, new)]
pub struct MetadataWriter {
    store: Arc<dyn MetadataStore>,
}

impl MetadataWriter {
    #[instrument(skip_all, fields(resource_id = %request.resource_id, computation_offset = envelope.computation_offset))]
    pub async fn write(
        &self,
        request: &SubmissionRequest,
        envelope: &CiphertextEnvelope,
    ) -> Result<MetadataRecord, SubmissionError> {
        let mut record = MetadataRecord::pending(request, envelope, Utc::now());

        record.id = match self.store.insert(record.clone()).await {
            Ok(id) => id,
            Err(StoreError::UniqueViolation { resource_id, identity }) => {
                return Err(SubmissionError::AlreadySubmitted {
                    resource_id,
                    identity,
                    reconciled: 0,
                })
            }
            Err(err) => return Err(SubmissionError::StoreUnavailable(err)),
        };

        info!(record_id = %record.id, "pending record written");
        Ok(record)
    }
}
