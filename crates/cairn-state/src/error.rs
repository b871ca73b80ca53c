//! Error types for block and transaction acceptance.

use cairn_consensus::ConsensusError;
use cairn_mempool::MempoolError;
use cairn_types::{BlockHeight, BlockId, OutputId, Timestamp};
use thiserror::Error;

/// State-layer errors. The acceptance variants are part of the engine's
/// contract: callers dispatch on them to decide between dropping, retrying,
/// and triggering a peer sync.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StateError {
    /// Block already sits in the tree. Droppable, not a failure.
    #[error("block is already known")]
    BlockKnown,

    /// Block previously failed validation; it will never be reconsidered.
    #[error("block is known to be invalid")]
    BadBlock,

    /// Orphan seen before. The peer sync it should have triggered is
    /// already in flight.
    #[error("block is a known orphan")]
    KnownOrphan,

    /// First sighting of an orphan; the caller may want to catch up with
    /// the sending peer.
    #[error("block is an unknown orphan")]
    UnknownOrphan,

    /// Timestamp runs ahead of the local clock. The block is queued and
    /// retried automatically once the clock catches up.
    #[error("block timestamp {block_time} is past the future limit {limit}; queued for retry")]
    FutureBlock {
        block_time: Timestamp,
        limit: Timestamp,
    },

    /// A consensus rule failed. Inside a block this poisons the block.
    #[error(transparent)]
    Consensus(#[from] ConsensusError),

    /// Transaction conflicts with the pool. Whether to displace the
    /// incumbent is policy that lives above the engine.
    #[error("conflicting transaction exists in transaction pool: {0}")]
    ConflictingTransaction(MempoolError),

    /// Height query off the end of the active chain.
    #[error("no block at height {0}")]
    UnknownHeight(BlockHeight),

    /// ID query for a block the tree has never seen.
    #[error("no block with id {0}")]
    UnknownBlock(BlockId),

    /// Output query outside the unspent set.
    #[error("output {0} is not in the unspent set")]
    UnknownOutput(OutputId),

    /// An internal invariant failed to hold. Panics in debug builds;
    /// surfaced as this fatal error in release builds.
    #[error("internal invariant violated: {0}")]
    Internal(String),
}

impl From<MempoolError> for StateError {
    fn from(err: MempoolError) -> Self {
        StateError::ConflictingTransaction(err)
    }
}

/// Result type for state operations.
pub type StateResult<T> = Result<T, StateError>;
