use std::time::Duration;

use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Signature;
use thiserror::Error;

use crate::compensator::CompensationReport;
use crate::types::{RecordId, ResourceId};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("a record for {identity} on {resource_id} already exists")]
    UniqueViolation {
        resource_id: ResourceId,
        identity: Pubkey,
    },
    #[error("record {0} not found")]
    NotFound(RecordId),
    #[error("store backend error: {0}")]
    Backend(String),
    #[error("store returned malformed data: {0}")]
    Malformed(String),
}

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("ledger rpc unavailable: {0}")]
    Unavailable(String),
    #[error("transaction rejected: {0}")]
    Rejected(String),
}

#[derive(Debug, Error)]
pub enum KeySourceError {
    #[error("executor key service unavailable: {0}")]
    Unavailable(String),
    #[error("executor key malformed: {0}")]
    Malformed(String),
}

#[derive(Debug, Error)]
pub enum SignerError {
    #[error("signature request rejected: {0}")]
    Rejected(String),
}

#[derive(Debug, Error)]
pub enum EnvelopeError {
    #[error("payload encoding failed: {0}")]
    Encoding(#[from] serde_json::Error),
    #[error("executor key does not yield a contributory shared secret")]
    WeakExecutorKey,
    #[error("payload cipher failed")]
    Cipher,
}

#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("result channel unavailable: {0}")]
    Unavailable(String),
    #[error("computation {0} is already being watched")]
    AlreadyRegistered(u64),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error(transparent)]
    Figment(#[from] figment::Error),
    #[error("invalid pubkey for {field}: {value}")]
    InvalidPubkey { field: &'static str, value: String },
    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Error)]
pub enum LoggingError {
    #[error(transparent)]
    Filter(#[from] tracing_subscriber::filter::ParseError),
    #[error(transparent)]
    Init(#[from] tracing_subscriber::util::TryInitError),
}

/// Terminal failures of the ledger step. Each one is raised after the record write.
#[derive(Debug, Error)]
pub enum LedgerFailure {
    #[error("signing rejected: {0}")]
    SigningRejected(String),
    #[error("submission rejected: {0}")]
    SubmissionRejected(String),
    #[error("ledger unavailable: {0}")]
    Unavailable(String),
    #[error("transaction {signature} not confirmed within {waited:?}")]
    ConfirmationTimeout {
        signature: Signature,
        waited: Duration,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    InsufficientFunds,
    LedgerUnavailable,
    EncryptionUnavailable,
    SignerMismatch,
    CapacityReached,
    AlreadySubmitted,
    StoreUnavailable,
    SigningRejected,
    SubmissionRejected,
    ConfirmationTimeout,
}

#[derive(Debug, Error)]
pub enum SubmissionError {
    #[error("insufficient funds: {available} lamports available, {required} required")]
    InsufficientFunds { required: u64, available: u64 },
    #[error("ledger unavailable: {0}")]
    LedgerUnavailable(#[source] LedgerError),
    #[error("encryption unavailable: {0}")]
    EncryptionUnavailable(String),
    #[error("signer {signer} does not match submitting identity {identity}")]
    SignerMismatch { identity: Pubkey, signer: Pubkey },
    #[error("{resource_id} already holds {capacity} submissions")]
    CapacityReached {
        resource_id: ResourceId,
        capacity: u32,
    },
    #[error("{identity} already submitted to {resource_id}")]
    AlreadySubmitted {
        resource_id: ResourceId,
        identity: Pubkey,
        reconciled: usize,
    },
    #[error("metadata store unavailable: {0}")]
    StoreUnavailable(#[source] StoreError),
    #[error("{failure}")]
    Ledger {
        #[source]
        failure: LedgerFailure,
        compensation: CompensationReport,
    },
}

impl SubmissionError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SubmissionError::InsufficientFunds { .. } => ErrorKind::InsufficientFunds,
            SubmissionError::LedgerUnavailable(_) => ErrorKind::LedgerUnavailable,
            SubmissionError::EncryptionUnavailable(_) => ErrorKind::EncryptionUnavailable,
            SubmissionError::SignerMismatch { .. } => ErrorKind::SignerMismatch,
            SubmissionError::CapacityReached { .. } => ErrorKind::CapacityReached,
            SubmissionError::AlreadySubmitted { .. } => ErrorKind::AlreadySubmitted,
            SubmissionError::StoreUnavailable(_) => ErrorKind::StoreUnavailable,
            SubmissionError::Ledger { failure, .. } => match failure {
                LedgerFailure::SigningRejected(_) => ErrorKind::SigningRejected,
                LedgerFailure::SubmissionRejected(_) => ErrorKind::SubmissionRejected,
                LedgerFailure::Unavailable(_) => ErrorKind::LedgerUnavailable,
                LedgerFailure::ConfirmationTimeout { .. } => ErrorKind::ConfirmationTimeout,
            },
        }
    }

    /// Present exactly when the failure happened after the record write.
    pub fn compensation(&self) -> Option<&CompensationReport> {
        match self {
            SubmissionError::Ledger { compensation, .. } => Some(compensation),
            _ => None,
        }
    }

    pub fn is_post_write(&self) -> bool {
        self.compensation().is_some()
    }
}
