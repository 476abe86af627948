use chrono::{DateTime, Utc};
use derive_more::Display;
use serde::{Deserialize, Serialize};
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Signature;
use survey_x_std::account::ComputationAccounts;
use survey_x_std::event::ResponseEvent;
use survey_x_std::instruction::{ComputationKind, QueueComputationArgs};
use survey_x_std::Bytes32;
use uuid::Uuid;

use crate::serde_helpers::{display, hex_bytes};

pub type RecordId = Uuid;

const SURVEY_ID_PREFIX: &str = "survey";
const SURVEY_ID_SUFFIX_LEN: usize = 9;
const SURVEY_ID_ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

/// Opaque identifier of the survey or quiz a submission targets.
#[derive(Clone, Debug, Display, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceId(String);

impl ResourceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// `survey_<unix millis>_<9 random lowercase alphanumerics>`.
    pub fn generate_survey() -> Self {
        let suffix: String = (0..SURVEY_ID_SUFFIX_LEN)
            .map(|_| {
                let index = rand::random_range(0..SURVEY_ID_ALPHABET.len());
                char::from(SURVEY_ID_ALPHABET[index])
            })
            .collect();

        Self(format!(
            "{SURVEY_ID_PREFIX}_{}_{suffix}",
            Utc::now().timestamp_millis()
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ResourceId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for ResourceId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionKind {
    SurveyDefinition,
    Response,
}

impl SubmissionKind {
    /// Column value in the metadata table.
    pub fn as_str(&self) -> &'static str {
        match self {
            SubmissionKind::SurveyDefinition => "survey_definition",
            SubmissionKind::Response => "response",
        }
    }

    pub fn computation(&self) -> ComputationKind {
        match self {
            SubmissionKind::SurveyDefinition => ComputationKind::CreateSurvey,
            SubmissionKind::Response => ComputationKind::SubmitResponse,
        }
    }
}

/// Plaintext fields kept next to the ciphertext so the record stays discoverable.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Descriptor {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct SubmissionRequest {
    pub identity: Pubkey,
    pub resource_id: ResourceId,
    pub kind: SubmissionKind,
    pub payload: serde_json::Value,
    pub descriptor: Descriptor,
    /// Live submissions the resource accepts in total. `None` means unbounded.
    pub max_submissions: Option<u32>,
}

impl SubmissionRequest {
    pub fn response(
        identity: Pubkey,
        resource_id: impl Into<ResourceId>,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            identity,
            resource_id: resource_id.into(),
            kind: SubmissionKind::Response,
            payload,
            descriptor: Descriptor::default(),
            max_submissions: None,
        }
    }

    /// A new survey under a freshly generated resource id.
    pub fn survey_definition(identity: Pubkey, payload: serde_json::Value) -> Self {
        Self {
            identity,
            resource_id: ResourceId::generate_survey(),
            kind: SubmissionKind::SurveyDefinition,
            payload,
            descriptor: Descriptor::default(),
            max_submissions: None,
        }
    }

    pub fn with_descriptor(mut self, descriptor: Descriptor) -> Self {
        self.descriptor = descriptor;
        self
    }

    pub fn with_max_submissions(mut self, max_submissions: u32) -> Self {
        self.max_submissions = Some(max_submissions);
        self
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CiphertextEnvelope {
    pub ciphertext: Vec<u8>,
    pub ephemeral_public_key: [u8; 32],
    pub nonce: u128,
    pub computation_offset: u64,
}

impl CiphertextEnvelope {
    /// What the ledger instruction's 32-byte ciphertext slot carries.
    pub fn commitment(&self) -> Bytes32 {
        Bytes32::sha256(&self.ciphertext)
    }

    pub fn queue_args(&self) -> QueueComputationArgs {
        QueueComputationArgs::new(
            self.computation_offset,
            self.commitment(),
            self.ephemeral_public_key.into(),
            self.nonce,
        )
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordStatus {
    Pending,
    Confirmed,
}

/// One row of the off-chain metadata table.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MetadataRecord {
    pub id: RecordId,
    pub resource_id: ResourceId,
    #[serde(with = "display")]
    pub identity: Pubkey,
    pub kind: SubmissionKind,
    pub status: RecordStatus,
    #[serde(with = "display")]
    pub computation_offset: u64,
    #[serde(with = "hex_bytes")]
    pub ciphertext: Vec<u8>,
    #[serde(with = "hex_bytes")]
    pub commitment: [u8; 32],
    #[serde(with = "hex_bytes")]
    pub ephemeral_public_key: [u8; 32],
    #[serde(with = "display")]
    pub nonce: u128,
    #[serde(default)]
    pub signature: Option<String>,
    #[serde(flatten)]
    pub descriptor: Descriptor,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl MetadataRecord {
    pub fn pending(
        request: &SubmissionRequest,
        envelope: &CiphertextEnvelope,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            resource_id: request.resource_id.clone(),
            identity: request.identity,
            kind: request.kind,
            status: RecordStatus::Pending,
            computation_offset: envelope.computation_offset,
            ciphertext: envelope.ciphertext.clone(),
            commitment: *envelope.commitment(),
            ephemeral_public_key: envelope.ephemeral_public_key,
            nonce: envelope.nonce,
            signature: None,
            descriptor: request.descriptor.clone(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn envelope(&self) -> CiphertextEnvelope {
        CiphertextEnvelope {
            ciphertext: self.ciphertext.clone(),
            ephemeral_public_key: self.ephemeral_public_key,
            nonce: self.nonce,
            computation_offset: self.computation_offset,
        }
    }

    pub fn confirm(&mut self, signature: &Signature, now: DateTime<Utc>) {
        self.status = RecordStatus::Confirmed;
        self.signature = Some(signature.to_string());
        self.updated_at = now;
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConfirmationState {
    Pending,
    Confirmed,
    Failed(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LedgerTransaction {
    pub signature: Signature,
    pub computation_offset: u64,
    pub accounts: ComputationAccounts,
    pub state: ConfirmationState,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ComputationResult {
    pub computation_offset: u64,
    pub output: Vec<u8>,
    pub nonce: [u8; 16],
    pub completed_at: DateTime<Utc>,
}

impl ComputationResult {
    pub fn from_event(computation_offset: u64, event: ResponseEvent) -> Self {
        Self {
            computation_offset,
            output: event.response.to_vec(),
            nonce: event.nonce,
            completed_at: Utc::now(),
        }
    }
}
