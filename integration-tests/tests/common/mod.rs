#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use derive_more::Deref;
use litesvm::LiteSVM;
use rand::random;
use serde_json::{json, Value};
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Keypair;
use survey_x_client::encryption::X25519ChaCha;
use survey_x_client::ledger::{KeypairSigner, Ledger, WalletSigner};
use survey_x_client::notifier::MemoryResultChannel;
use survey_x_client::store::MemoryMetadataStore;
use survey_x_client::testing::{CountingKeySource, ObservedStore, ScriptedLedger};
use survey_x_client::{
    Collaborators, CoordinatorSettings, ErrorKind, MetadataRecord, ResourceId, SubmissionCoordinator,
    SubmissionError, SubmissionReceipt, SubmissionRequest,
};

pub use litesvm_ledger::LiteSvmLedger;

mod litesvm_ledger;

pub const CONFIRMATION_TIMEOUT: Duration = Duration::from_millis(100);
pub const RESULT_TIMEOUT: Duration = Duration::from_secs(2);

pub type SubmissionResult = Result<SubmissionReceipt, SubmissionError>;

#[derive(Deref)]
pub struct Context<L: Ledger + 'static = ScriptedLedger> {
    #[deref]
    coordinator: SubmissionCoordinator,
    executor_secret: [u8; 32],
    pub ledger: Arc<L>,
    pub store: Arc<ObservedStore>,
    pub executor_keys: Arc<CountingKeySource>,
    pub results: Arc<MemoryResultChannel>,
    pub identity: KeypairSigner,
}

impl Default for Context {
    fn default() -> Self {
        Self::with_store(MemoryMetadataStore::new())
    }
}

impl Context {
    pub fn with_store(store: MemoryMetadataStore) -> Self {
        Self::new(
            ScriptedLedger::funded(sol_amount(1.0)),
            store,
            settings(),
        )
    }
}

impl Context<LiteSvmLedger> {
    /// Backed by an SVM where the MXE program is not deployed, so every queued
    /// computation is rejected on submit.
    pub fn litesvm() -> Self {
        Self::new(
            LiteSvmLedger::new(LiteSVM::new()),
            MemoryMetadataStore::new(),
            settings(),
        )
    }
}

impl<L: Ledger + 'static> Context<L> {
    pub fn new(ledger: L, store: MemoryMetadataStore, settings: CoordinatorSettings) -> Self {
        let executor_secret = random::<[u8; 32]>();
        let ledger = Arc::new(ledger);
        let store = Arc::new(ObservedStore::new(store));
        let executor_keys = Arc::new(CountingKeySource::new(X25519ChaCha::public_key(
            &executor_secret,
        )));
        let results = Arc::new(MemoryResultChannel::new());

        let coordinator = SubmissionCoordinator::new(
            &settings,
            Collaborators::new(
                ledger.clone(),
                executor_keys.clone(),
                store.clone(),
                results.clone(),
            ),
        );

        Self {
            coordinator,
            executor_secret,
            ledger,
            store,
            executor_keys,
            results,
            identity: KeypairSigner::new(Keypair::new()),
        }
    }

    pub fn coordinator(&self) -> SubmissionCoordinator {
        self.coordinator.clone()
    }

    pub fn response(&self, resource_id: &ResourceId) -> SubmissionRequest {
        SubmissionRequest::response(self.identity.pubkey(), resource_id.clone(), rand_payload())
    }

    pub async fn submit_as_identity(&self, request: SubmissionRequest) -> SubmissionResult {
        self.coordinator.submit(request, &self.identity).await
    }

    pub fn live_records(&self, resource_id: &ResourceId) -> Vec<MetadataRecord> {
        self.store
            .inner()
            .records()
            .unwrap()
            .into_iter()
            .filter(|record| &record.resource_id == resource_id)
            .collect()
    }

    /// What the MPC executor would see after decrypting the record's ciphertext.
    pub fn open(&self, record: &MetadataRecord) -> Value {
        let plaintext = X25519ChaCha::open(&self.executor_secret, &record.envelope()).unwrap();
        serde_json::from_slice(&plaintext).unwrap()
    }

    pub fn identity_pubkey(&self) -> Pubkey {
        self.identity.pubkey()
    }
}

pub fn settings() -> CoordinatorSettings {
    CoordinatorSettings {
        confirmation_timeout: CONFIRMATION_TIMEOUT,
        result_timeout: RESULT_TIMEOUT,
        ..CoordinatorSettings::default()
    }
}

pub fn rand_resource() -> ResourceId {
    ResourceId::generate_survey()
}

pub fn rand_payload() -> Value {
    json!({
        "answers": (0..4).map(|question| json!({
            "question": question,
            "choice": random::<u8>() % 5,
        })).collect::<Vec<_>>(),
        "comment": format!("{:x}", random::<u64>()),
    })
}

pub fn sol_amount(amount: f64) -> u64 {
    (amount * 1_000_000_000.0) as u64
}

pub fn is_kind(expected: ErrorKind) -> impl Fn(SubmissionError) -> bool {
    move |actual: SubmissionError| actual.kind() == expected
}
