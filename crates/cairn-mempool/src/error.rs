//! Error types for the transaction pool.

use cairn_types::{ContractId, OutputId};
use thiserror::Error;

/// Pool admission errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MempoolError {
    /// An input is already spent by a pooled transaction.
    #[error("output {0} is already spent by a pooled transaction")]
    ConflictingSpend(OutputId),

    /// A storage proof for the same contract is already pooled.
    #[error("a storage proof for contract {0} is already pooled")]
    ConflictingProof(ContractId),

    /// Transactions without inputs have nothing to anchor on.
    #[error("transaction has no inputs")]
    NoInputs,
}

/// Result type for pool operations.
pub type MempoolResult<T> = Result<T, MempoolError>;
