//! Scripted collaborators for exercising the coordinator without a cluster, a key
//! service or a database.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use solana_sdk::hash::Hash;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Signature;
use solana_sdk::transaction::Transaction;

use crate::encryption::{ExecutorKeySource, StaticExecutorKey};
use crate::error::{KeySourceError, LedgerError, SignerError, StoreError};
use crate::ledger::{Ledger, WalletSigner};
use crate::store::{self, MemoryMetadataStore, MetadataStore};
use crate::types::{ConfirmationState, MetadataRecord, RecordId, ResourceId, SubmissionKind};

/// How the scripted ledger answers a submit call.
#[derive(Clone, Debug, PartialEq, Eq)]
enum SubmitBehavior {
    Accept,
    Reject(String),
    /// Lands the transaction but reports a transport error.
    LoseResponse(String),
    /// Transport error before the transaction reaches the ledger.
    Drop(String),
}

/// What the scripted ledger does with a submitted transaction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConfirmBehavior {
    Confirmed,
    Failed(String),
    /// Never settles.
    Dropped,
    /// Settles right after the confirmation wait gives up.
    ConfirmedLate,
}

struct Script {
    balance: u64,
    balance_error: Option<String>,
    blockhash_error: Option<String>,
    submit: SubmitBehavior,
    confirm: ConfirmBehavior,
    submitted: Vec<Transaction>,
}

pub struct ScriptedLedger {
    script: Mutex<Script>,
    balance_calls: AtomicUsize,
    status_calls: AtomicUsize,
}

impl ScriptedLedger {
    pub fn funded(lamports: u64) -> Self {
        Self {
            script: Mutex::new(Script {
                balance: lamports,
                balance_error: None,
                blockhash_error: None,
                submit: SubmitBehavior::Accept,
                confirm: ConfirmBehavior::Confirmed,
                submitted: Vec::new(),
            }),
            balance_calls: AtomicUsize::new(0),
            status_calls: AtomicUsize::new(0),
        }
    }

    pub fn fail_balance(&self, reason: &str) {
        if let Ok(mut script) = self.script.lock() {
            script.balance_error = Some(reason.to_string());
        }
    }

    pub fn fail_blockhash(&self, reason: &str) {
        if let Ok(mut script) = self.script.lock() {
            script.blockhash_error = Some(reason.to_string());
        }
    }

    pub fn reject_submissions(&self, reason: &str) {
        self.submit_with(SubmitBehavior::Reject(reason.to_string()));
    }

    pub fn lose_submit_responses(&self, reason: &str) {
        self.submit_with(SubmitBehavior::LoseResponse(reason.to_string()));
    }

    pub fn drop_submissions(&self, reason: &str) {
        self.submit_with(SubmitBehavior::Drop(reason.to_string()));
    }

    fn submit_with(&self, behavior: SubmitBehavior) {
        if let Ok(mut script) = self.script.lock() {
            script.submit = behavior;
        }
    }

    pub fn confirm_with(&self, behavior: ConfirmBehavior) {
        if let Ok(mut script) = self.script.lock() {
            script.confirm = behavior;
        }
    }

    pub fn balance_calls(&self) -> usize {
        self.balance_calls.load(Ordering::SeqCst)
    }

    pub fn status_calls(&self) -> usize {
        self.status_calls.load(Ordering::SeqCst)
    }

    pub fn submitted(&self) -> Vec<Transaction> {
        self.script
            .lock()
            .map(|script| script.submitted.clone())
            .unwrap_or_default()
    }

    fn lock_script(&self) -> Result<MutexGuard<'_, Script>, LedgerError> {
        self.script
            .lock()
            .map_err(|_| LedgerError::Unavailable("scripted ledger lock poisoned".to_string()))
    }

    fn is_known(&self, signature: &Signature) -> Result<bool, LedgerError> {
        Ok(self
            .lock_script()?
            .submitted
            .iter()
            .any(|transaction| transaction.signatures.first() == Some(signature)))
    }
}

#[async_trait]
impl Ledger for ScriptedLedger {
    async fn balance(&self, _identity: &Pubkey) -> Result<u64, LedgerError> {
        self.balance_calls.fetch_add(1, Ordering::SeqCst);
        let script = self.lock_script()?;
        match &script.balance_error {
            Some(reason) => Err(LedgerError::Unavailable(reason.clone())),
            None => Ok(script.balance),
        }
    }

    async fn latest_blockhash(&self) -> Result<Hash, LedgerError> {
        match &self.lock_script()?.blockhash_error {
            Some(reason) => Err(LedgerError::Unavailable(reason.clone())),
            None => Ok(Hash::new_unique()),
        }
    }

    async fn submit(&self, transaction: &Transaction) -> Result<Signature, LedgerError> {
        let mut script = self.lock_script()?;
        match script.submit.clone() {
            SubmitBehavior::Reject(reason) => return Err(LedgerError::Rejected(reason)),
            SubmitBehavior::Drop(reason) => return Err(LedgerError::Unavailable(reason)),
            SubmitBehavior::Accept | SubmitBehavior::LoseResponse(_) => {}
        }
        transaction
            .verify()
            .map_err(|err| LedgerError::Rejected(err.to_string()))?;

        let signature = transaction
            .signatures
            .first()
            .copied()
            .ok_or_else(|| LedgerError::Rejected("unsigned transaction".to_string()))?;
        script.submitted.push(transaction.clone());

        match &script.submit {
            SubmitBehavior::LoseResponse(reason) => Err(LedgerError::Unavailable(reason.clone())),
            _ => Ok(signature),
        }
    }

    async fn confirm(
        &self,
        signature: &Signature,
        timeout: Duration,
    ) -> Result<ConfirmationState, LedgerError> {
        if !self.is_known(signature)? {
            tokio::time::sleep(timeout).await;
            return Ok(ConfirmationState::Pending);
        }
        let behavior = self.lock_script()?.confirm.clone();
        match behavior {
            ConfirmBehavior::Confirmed => Ok(ConfirmationState::Confirmed),
            ConfirmBehavior::Failed(reason) => Ok(ConfirmationState::Failed(reason)),
            ConfirmBehavior::Dropped | ConfirmBehavior::ConfirmedLate => {
                tokio::time::sleep(timeout).await;
                Ok(ConfirmationState::Pending)
            }
        }
    }

    async fn signature_status(&self, signature: &Signature) -> Result<ConfirmationState, LedgerError> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        if !self.is_known(signature)? {
            return Ok(ConfirmationState::Pending);
        }
        let behavior = self.lock_script()?.confirm.clone();
        Ok(match behavior {
            ConfirmBehavior::Confirmed | ConfirmBehavior::ConfirmedLate => ConfirmationState::Confirmed,
            ConfirmBehavior::Failed(reason) => ConfirmationState::Failed(reason),
            ConfirmBehavior::Dropped => ConfirmationState::Pending,
        })
    }
}

/// Static executor key that counts how often it was asked.
pub struct CountingKeySource {
    inner: StaticExecutorKey,
    calls: AtomicUsize,
}

impl CountingKeySource {
    pub fn new(key: [u8; 32]) -> Self {
        Self {
            inner: StaticExecutorKey::new(key),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ExecutorKeySource for CountingKeySource {
    async fn executor_public_key(&self) -> Result<[u8; 32], KeySourceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.executor_public_key().await
    }
}

/// Memory store that counts every call and can be told to fail deletes.
#[derive(Default)]
pub struct ObservedStore {
    inner: MemoryMetadataStore,
    calls: AtomicUsize,
    fail_deletes: AtomicBool,
}

impl ObservedStore {
    pub fn new(inner: MemoryMetadataStore) -> Self {
        Self {
            inner,
            calls: AtomicUsize::new(0),
            fail_deletes: AtomicBool::new(false),
        }
    }

    pub fn inner(&self) -> &MemoryMetadataStore {
        &self.inner
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn fail_deletes(&self, fail: bool) {
        self.fail_deletes.store(fail, Ordering::SeqCst);
    }

    fn observe(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl MetadataStore for ObservedStore {
    async fn insert(&self, record: MetadataRecord) -> store::Result<RecordId> {
        self.observe();
        self.inner.insert(record).await
    }

    async fn query(&self, resource_id: &ResourceId, identity: &Pubkey) -> store::Result<Vec<MetadataRecord>> {
        self.observe();
        self.inner.query(resource_id, identity).await
    }

    async fn delete(&self, id: RecordId) -> store::Result<()> {
        self.observe();
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("delete refused".to_string()));
        }
        self.inner.delete(id).await
    }

    async fn mark_confirmed(&self, id: RecordId, signature: &Signature) -> store::Result<MetadataRecord> {
        self.observe();
        self.inner.mark_confirmed(id, signature).await
    }

    async fn count_for_resource(&self, resource_id: &ResourceId, kind: SubmissionKind) -> store::Result<u64> {
        self.observe();
        self.inner.count_for_resource(resource_id, kind).await
    }
}

/// Wallet whose user declines every signature request.
pub struct RejectingSigner {
    pubkey: Pubkey,
}

impl RejectingSigner {
    pub fn new(pubkey: Pubkey) -> Self {
        Self { pubkey }
    }
}

#[async_trait]
impl WalletSigner for RejectingSigner {
    fn pubkey(&self) -> Pubkey {
        self.pubkey
    }

    async fn sign(&self, _transaction: Transaction) -> Result<Transaction, SignerError> {
        Err(SignerError::Rejected("user declined".to_string()))
    }
}
