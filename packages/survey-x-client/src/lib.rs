pub mod balance;
pub mod compensator;
pub mod config;
pub mod coordinator;
pub mod duplicate;
pub mod encryption;
pub mod error;
pub mod ledger;
pub mod logging;
pub mod notifier;
mod serde_helpers;
pub mod store;
pub mod submitter;
#[cfg(any(test, feature = "test-utils"))]
pub mod testing;
pub mod types;
pub mod writer;

pub use compensator::{CompensationFailed, CompensationReport};
pub use config::{AppConfig, CoordinatorSettings};
pub use coordinator::{Collaborators, SubmissionCoordinator, SubmissionReceipt};
pub use error::{ErrorKind, LedgerFailure, SubmissionError};
pub use notifier::{PendingResult, ResultOutcome};
pub use types::{
    CiphertextEnvelope, ComputationResult, ConfirmationState, Descriptor, LedgerTransaction,
    MetadataRecord, RecordId, RecordStatus, ResourceId, SubmissionKind, SubmissionRequest,
};
