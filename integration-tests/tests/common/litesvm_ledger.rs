use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use litesvm::LiteSVM;
use solana_sdk::hash::Hash;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Signature;
use solana_sdk::transaction::Transaction;
use survey_x_client::error::LedgerError;
use survey_x_client::ledger::Ledger;
use survey_x_client::ConfirmationState;

/// In-process SVM behind the coordinator's ledger interface. Transactions execute on
/// submit, so confirmation is immediate.
pub struct LiteSvmLedger {
    svm: Mutex<LiteSVM>,
    outcomes: Mutex<HashMap<Signature, ConfirmationState>>,
}

impl LiteSvmLedger {
    pub fn new(svm: LiteSVM) -> Self {
        Self {
            svm: Mutex::new(svm),
            outcomes: Mutex::new(HashMap::new()),
        }
    }

    pub fn airdrop(&self, pubkey: &Pubkey, lamports: u64) {
        self.svm().airdrop(pubkey, lamports).unwrap();
    }

    pub fn account_exists(&self, pubkey: &Pubkey) -> bool {
        self.svm().get_account(pubkey).is_some()
    }

    fn svm(&self) -> MutexGuard<'_, LiteSVM> {
        self.svm.lock().unwrap()
    }

    fn outcome(&self, signature: &Signature) -> ConfirmationState {
        self.outcomes
            .lock()
            .unwrap()
            .get(signature)
            .cloned()
            .unwrap_or(ConfirmationState::Pending)
    }
}

#[async_trait]
impl Ledger for LiteSvmLedger {
    async fn balance(&self, identity: &Pubkey) -> Result<u64, LedgerError> {
        Ok(self.svm().get_balance(identity).unwrap_or_default())
    }

    async fn latest_blockhash(&self) -> Result<Hash, LedgerError> {
        Ok(self.svm().latest_blockhash())
    }

    async fn submit(&self, transaction: &Transaction) -> Result<Signature, LedgerError> {
        let signature = transaction.signatures[0];
        let result = self.svm().send_transaction(transaction.clone());

        match result {
            Ok(_) => {
                self.outcomes
                    .lock()
                    .unwrap()
                    .insert(signature, ConfirmationState::Confirmed);
                Ok(signature)
            }
            Err(failed) => Err(LedgerError::Rejected(failed.err.to_string())),
        }
    }

    async fn confirm(
        &self,
        signature: &Signature,
        _timeout: Duration,
    ) -> Result<ConfirmationState, LedgerError> {
        Ok(self.outcome(signature))
    }

    async fn signature_status(&self, signature: &Signature) -> Result<ConfirmationState, LedgerError> {
        Ok(self.outcome(signature))
    }
}
