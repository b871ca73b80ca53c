//! Error types for synchronization.

use thiserror::Error;

/// Synchronization errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SyncError {
    /// None of the requester's known blocks sit on this chain: the peers
    /// are on different blockchains altogether. Try another peer.
    #[error("no matching block found in the known-block list")]
    NoMatchingBlock,

    /// The transport failed; the chain state is untouched.
    #[error("peer unreachable: {0}")]
    PeerUnreachable(String),
}

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;
