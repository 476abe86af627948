use std::sync::Arc;
use std::time::Duration;

use derive_new::new;
use solana_sdk::message::Message;
use solana_sdk::signature::Signature;
use solana_sdk::transaction::Transaction;
use survey_x_std::account::Programs;
use survey_x_std::instruction::{queue_computation, ComputationKind};
use tokio::time::Instant;
use tracing::{info, instrument, warn};

use crate::error::{LedgerError, LedgerFailure};
use crate::ledger::{Ledger, WalletSigner};
use crate::types::{CiphertextEnvelope, ConfirmationState, LedgerTransaction};

/// Builds, signs and lands the queue-computation transaction.
#[derive(Clone, new)]
pub struct OnChainSubmitter {
    ledger: Arc<dyn Ledger>,
    programs: Programs,
    confirmation_timeout: Duration,
}

impl OnChainSubmitter {
    #[instrument(skip_all, fields(?kind, computation_offset = envelope.computation_offset))]
    pub async fn submit(
        &self,
        kind: ComputationKind,
        envelope: &CiphertextEnvelope,
        signer: &dyn WalletSigner,
        deadline: Option<Instant>,
    ) -> Result<LedgerTransaction, LedgerFailure> {
        let payer = signer.pubkey();
        let (instruction, accounts) =
            queue_computation(&self.programs, kind, &payer, &envelope.queue_args());

        let blockhash = self
            .ledger
            .latest_blockhash()
            .await
            .map_err(|err| LedgerFailure::Unavailable(err.to_string()))?;
        let message = Message::new_with_blockhash(&[instruction], Some(&payer), &blockhash);

        let transaction = signer
            .sign(Transaction::new_unsigned(message))
            .await
            .map_err(|err| LedgerFailure::SigningRejected(err.to_string()))?;

        let signature = match self.ledger.submit(&transaction).await {
            Ok(signature) => {
                info!(%signature, "queue computation submitted");
                signature
            }
            // The send may have reached the cluster before the transport failed.
            Err(LedgerError::Unavailable(reason)) => {
                let signature = transaction
                    .signatures
                    .first()
                    .copied()
                    .ok_or_else(|| LedgerFailure::Unavailable(reason.clone()))?;
                warn!(%signature, %reason, "submit outcome unknown, checking status");
                signature
            }
            Err(err @ LedgerError::Rejected(_)) => {
                return Err(LedgerFailure::SubmissionRejected(err.to_string()));
            }
        };

        let state = self.await_confirmation(&signature, deadline).await?;

        Ok(LedgerTransaction {
            signature,
            computation_offset: envelope.computation_offset,
            accounts,
            state,
        })
    }

    fn wait_budget(&self, deadline: Option<Instant>) -> Duration {
        match deadline {
            Some(deadline) => self
                .confirmation_timeout
                .min(deadline.saturating_duration_since(Instant::now())),
            None => self.confirmation_timeout,
        }
    }

    async fn await_confirmation(
        &self,
        signature: &Signature,
        deadline: Option<Instant>,
    ) -> Result<ConfirmationState, LedgerFailure> {
        let waited = self.wait_budget(deadline);

        let state = match tokio::time::timeout(waited, self.ledger.confirm(signature, waited)).await {
            Ok(Ok(state)) => state,
            Ok(Err(err)) => {
                warn!(%signature, error = %err, "confirmation wait failed");
                ConfirmationState::Pending
            }
            Err(_) => ConfirmationState::Pending,
        };

        match state {
            ConfirmationState::Confirmed => Ok(ConfirmationState::Confirmed),
            ConfirmationState::Failed(reason) => Err(LedgerFailure::SubmissionRejected(reason)),
            ConfirmationState::Pending => self.recheck(signature, waited).await,
        }
    }

    /// One last status read before the attempt is declared timed out; the transaction
    /// may have landed while the wait was giving up.
    async fn recheck(&self, signature: &Signature, waited: Duration) -> Result<ConfirmationState, LedgerFailure> {
        match self.ledger.signature_status(signature).await {
            Ok(ConfirmationState::Confirmed) => {
                info!(%signature, "transaction confirmed after the wait expired");
                Ok(ConfirmationState::Confirmed)
            }
            Ok(ConfirmationState::Failed(reason)) => Err(LedgerFailure::SubmissionRejected(reason)),
            Ok(ConfirmationState::Pending) => Err(LedgerFailure::ConfirmationTimeout {
                signature: *signature,
                waited,
            }),
            Err(err) => {
                warn!(%signature, error = %err, "status re-check failed");
                Err(LedgerFailure::ConfirmationTimeout {
                    signature: *signature,
                    waited,
                })
            }
        }
    }
}
