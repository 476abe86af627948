use std::sync::Arc;

use derive_new::new;
use tokio::time::Instant;
use tracing::{info, instrument, warn};

use crate::balance::BalanceGuard;
use crate::compensator::Compensator;
use crate::config::CoordinatorSettings;
use crate::duplicate::DuplicateGuard;
use crate::encryption::{EnvelopeCipher, ExecutorKeySource, PayloadEncryptor, X25519ChaCha};
use crate::error::SubmissionError;
use crate::ledger::{Ledger, WalletSigner};
use crate::notifier::{PendingResult, ResultChannel, ResultNotifier};
use crate::store::MetadataStore;
use crate::submitter::OnChainSubmitter;
use crate::types::{LedgerTransaction, MetadataRecord, ResourceId, SubmissionKind, SubmissionRequest};
use crate::writer::MetadataWriter;

/// External systems one coordinator talks to.
#[derive(Clone, new)]
pub struct Collaborators {
    pub ledger: Arc<dyn Ledger>,
    pub executor_keys: Arc<dyn ExecutorKeySource>,
    pub store: Arc<dyn MetadataStore>,
    pub results: Arc<dyn ResultChannel>,
}

/// A submission that landed on both sides.
#[derive(Debug)]
pub struct SubmissionReceipt {
    pub record: MetadataRecord,
    pub transaction: LedgerTransaction,
    pub result: PendingResult,
}

/// Runs one create/submit action as an ordered saga: balance guard, encryption,
/// duplicate guard, pending record write, ledger submission, and on ledger failure a
/// compensating delete of the record.
///
/// Either the record and a confirmed transaction both exist afterwards, or neither
/// does. A compensation that fails leaves an orphan the duplicate guard collapses on
/// the next attempt for the same pair.
#[derive(Clone)]
pub struct SubmissionCoordinator {
    balance: BalanceGuard,
    encryptor: PayloadEncryptor,
    duplicates: DuplicateGuard,
    writer: MetadataWriter,
    submitter: OnChainSubmitter,
    compensator: Compensator,
    notifier: ResultNotifier,
    store: Arc<dyn MetadataStore>,
}

impl SubmissionCoordinator {
    pub fn new(settings: &CoordinatorSettings, collaborators: Collaborators) -> Self {
        Self::with_cipher(settings, collaborators, Arc::new(X25519ChaCha))
    }

    pub fn with_cipher(
        settings: &CoordinatorSettings,
        collaborators: Collaborators,
        cipher: Arc<dyn EnvelopeCipher>,
    ) -> Self {
        let Collaborators {
            ledger,
            executor_keys,
            store,
            results,
        } = collaborators;

        Self {
            balance: BalanceGuard::new(ledger.clone(), settings.min_balance_lamports),
            encryptor: PayloadEncryptor::new(executor_keys, cipher),
            duplicates: DuplicateGuard::new(store.clone()),
            writer: MetadataWriter::new(store.clone()),
            submitter: OnChainSubmitter::new(ledger, settings.programs, settings.confirmation_timeout),
            compensator: Compensator::new(store.clone()),
            notifier: ResultNotifier::new(results, settings.result_timeout),
            store,
        }
    }

    pub async fn submit(
        &self,
        request: SubmissionRequest,
        signer: &dyn WalletSigner,
    ) -> Result<SubmissionReceipt, SubmissionError> {
        self.run(request, signer, None).await
    }

    /// Like [`Self::submit`], but the confirmation wait never runs past `deadline`.
    /// Compensation still runs when it expires.
    pub async fn submit_with_deadline(
        &self,
        request: SubmissionRequest,
        signer: &dyn WalletSigner,
        deadline: Instant,
    ) -> Result<SubmissionReceipt, SubmissionError> {
        self.run(request, signer, Some(deadline)).await
    }

    #[instrument(
        skip_all,
        fields(identity = %request.identity, resource_id = %request.resource_id, kind = ?request.kind)
    )]
    async fn run(
        &self,
        request: SubmissionRequest,
        signer: &dyn WalletSigner,
        deadline: Option<Instant>,
    ) -> Result<SubmissionReceipt, SubmissionError> {
        let signer_key = signer.pubkey();
        if signer_key != request.identity {
            return Err(SubmissionError::SignerMismatch {
                identity: request.identity,
                signer: signer_key,
            });
        }

        self.balance.check(&request.identity).await?;
        let envelope = self.encryptor.encrypt(&request.payload).await?;
        self.duplicates
            .check(&request.resource_id, &request.identity)
            .await?;
        if let Some(capacity) = request.max_submissions {
            self.check_capacity(&request.resource_id, capacity).await?;
        }

        let record = self.writer.write(&request, &envelope).await?;

        let transaction = match self
            .submitter
            .submit(request.kind.computation(), &envelope, signer, deadline)
            .await
        {
            Ok(transaction) => transaction,
            Err(failure) => {
                warn!(record_id = %record.id, error = %failure, "ledger step failed, compensating");
                let compensation = self.compensator.compensate(&[record.id]).await;
                return Err(SubmissionError::Ledger {
                    failure,
                    compensation,
                });
            }
        };

        let record = self.promote(record, &transaction).await;
        let result = self
            .notifier
            .watch(envelope.computation_offset, &request.resource_id)
            .await;

        info!(
            record_id = %record.id,
            signature = %transaction.signature,
            computation_offset = transaction.computation_offset,
            "submission confirmed"
        );
        Ok(SubmissionReceipt {
            record,
            transaction,
            result,
        })
    }

    async fn check_capacity(&self, resource_id: &ResourceId, capacity: u32) -> Result<(), SubmissionError> {
        let live = self
            .store
            .count_for_resource(resource_id, SubmissionKind::Response)
            .await
            .map_err(SubmissionError::StoreUnavailable)?;

        if live >= u64::from(capacity) {
            return Err(SubmissionError::CapacityReached {
                resource_id: resource_id.clone(),
                capacity,
            });
        }
        Ok(())
    }

    /// The ledger transaction is the system of record, so a failed promotion only
    /// leaves the row `pending`.
    async fn promote(&self, record: MetadataRecord, transaction: &LedgerTransaction) -> MetadataRecord {
        match self.store.mark_confirmed(record.id, &transaction.signature).await {
            Ok(confirmed) => confirmed,
            Err(err) => {
                warn!(record_id = %record.id, error = %err, "record promotion failed");
                record
            }
        }
    }
}
