use std::time::Duration;

use async_trait::async_trait;
use solana_sdk::hash::Hash;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::{Keypair, Signature};
use solana_sdk::signer::Signer;
use solana_sdk::transaction::Transaction;

use crate::error::{LedgerError, SignerError};
use crate::types::ConfirmationState;

/// The public ledger the computation is queued on.
#[async_trait]
pub trait Ledger: Send + Sync {
    async fn balance(&self, identity: &Pubkey) -> Result<u64, LedgerError>;

    async fn latest_blockhash(&self) -> Result<Hash, LedgerError>;

    async fn submit(&self, transaction: &Transaction) -> Result<Signature, LedgerError>;

    /// Waits up to `timeout` for the transaction to settle. Returns `Pending` when it
    /// has not settled by then.
    async fn confirm(
        &self,
        signature: &Signature,
        timeout: Duration,
    ) -> Result<ConfirmationState, LedgerError>;

    /// Single non-blocking status read.
    async fn signature_status(&self, signature: &Signature) -> Result<ConfirmationState, LedgerError>;
}

#[async_trait]
pub trait WalletSigner: Send + Sync {
    fn pubkey(&self) -> Pubkey;

    async fn sign(&self, transaction: Transaction) -> Result<Transaction, SignerError>;
}

/// Signs with a local keypair. Never rejects unless the message needs other signers.
pub struct KeypairSigner {
    keypair: Keypair,
}

impl KeypairSigner {
    pub fn new(keypair: Keypair) -> Self {
        Self { keypair }
    }

    pub fn keypair(&self) -> &Keypair {
        &self.keypair
    }
}

#[async_trait]
impl WalletSigner for KeypairSigner {
    fn pubkey(&self) -> Pubkey {
        self.keypair.pubkey()
    }

    async fn sign(&self, mut transaction: Transaction) -> Result<Transaction, SignerError> {
        let blockhash = transaction.message.recent_blockhash;
        transaction
            .try_sign(&[&self.keypair], blockhash)
            .map_err(|err| SignerError::Rejected(err.to_string()))?;

        Ok(transaction)
    }
}
