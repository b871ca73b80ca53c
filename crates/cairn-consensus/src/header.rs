//! Block header validation.
//!
//! Header checks run against the parent node only; transaction work is
//! deferred until the block lands on the heaviest fork.

use crate::error::{ConsensusError, ConsensusResult};
use crate::params::{ChainParams, MEDIAN_TIMESTAMP_WINDOW};
use cairn_types::{Block, Encode, Target, Timestamp};

/// Everything about the parent (and the clock) that header validation needs.
#[derive(Debug, Clone, Copy)]
pub struct HeaderContext {
    /// Target the parent demands of its children.
    pub parent_target: Target,
    /// Median of the parent's recent-timestamp window.
    pub earliest_timestamp: Timestamp,
    /// Local wall clock, seconds since the epoch.
    pub now: Timestamp,
}

/// Validate a block's header fields. A [`ConsensusError::FutureBlock`]
/// result is retryable; every other error marks the block bad.
pub fn validate_header(
    params: &ChainParams,
    ctx: &HeaderContext,
    block: &Block,
) -> ConsensusResult<()> {
    if !block.meets_target(ctx.parent_target) {
        return Err(ConsensusError::TargetNotMet);
    }

    // Exactly the median is legal.
    if block.timestamp < ctx.earliest_timestamp {
        return Err(ConsensusError::EarlyTimestamp {
            block_time: block.timestamp,
            earliest: ctx.earliest_timestamp,
        });
    }

    // Exactly at the threshold is legal; one past it is not.
    let limit = ctx.now.saturating_add(params.future_threshold);
    if block.timestamp > limit {
        return Err(ConsensusError::FutureBlock {
            block_time: block.timestamp,
            limit,
        });
    }

    let size = block.encode().len();
    if size > params.block_size_limit {
        return Err(ConsensusError::BlockTooLarge {
            size,
            max: params.block_size_limit,
        });
    }

    let computed = block.transaction_merkle_root();
    if block.merkle_root != computed {
        return Err(ConsensusError::MerkleRootMismatch {
            declared: block.merkle_root,
            computed,
        });
    }

    Ok(())
}

/// Median of a recent-timestamp window: the earliest legal timestamp for a
/// child block.
pub fn median_timestamp(window: &[Timestamp; MEDIAN_TIMESTAMP_WINDOW]) -> Timestamp {
    let mut sorted = *window;
    sorted.sort_unstable();
    sorted[MEDIAN_TIMESTAMP_WINDOW / 2]
}

#[cfg(test)]
mod tests {
    use super::*;
    use cairn_types::{hash_bytes, Block, Hash256, Target};

    fn easy_target() -> Target {
        Target::MAX
    }

    fn context() -> HeaderContext {
        HeaderContext {
            parent_target: easy_target(),
            earliest_timestamp: 1000,
            now: 1000,
        }
    }

    fn block(timestamp: Timestamp) -> Block {
        Block {
            parent_id: cairn_types::BlockId(hash_bytes(b"parent")),
            nonce: 0,
            timestamp,
            miner_address: hash_bytes(b"miner"),
            merkle_root: Hash256::ZERO,
            transactions: vec![],
        }
    }

    #[test]
    fn accepts_clean_header() {
        let params = ChainParams::default();
        assert!(validate_header(&params, &context(), &block(1000)).is_ok());
    }

    #[test]
    fn timestamp_equal_to_median_is_legal() {
        let params = ChainParams::default();
        let ctx = context();
        assert!(validate_header(&params, &ctx, &block(ctx.earliest_timestamp)).is_ok());
        assert!(matches!(
            validate_header(&params, &ctx, &block(ctx.earliest_timestamp - 1)),
            Err(ConsensusError::EarlyTimestamp { .. })
        ));
    }

    #[test]
    fn future_boundary_is_inclusive() {
        let params = ChainParams::default();
        let ctx = context();
        let at_limit = ctx.now + params.future_threshold;
        assert!(validate_header(&params, &ctx, &block(at_limit)).is_ok());
        assert!(matches!(
            validate_header(&params, &ctx, &block(at_limit + 1)),
            Err(ConsensusError::FutureBlock { .. })
        ));
    }

    #[test]
    fn rejects_missed_target() {
        let params = ChainParams::default();
        let mut ctx = context();
        ctx.parent_target = Target([0u8; 32]);
        assert_eq!(
            validate_header(&params, &ctx, &block(1000)),
            Err(ConsensusError::TargetNotMet)
        );
    }

    #[test]
    fn rejects_wrong_merkle_root() {
        let params = ChainParams::default();
        let mut b = block(1000);
        b.merkle_root = hash_bytes(b"not the root");
        assert!(matches!(
            validate_header(&params, &context(), &b),
            Err(ConsensusError::MerkleRootMismatch { .. })
        ));
    }

    #[test]
    fn median_is_order_insensitive() {
        let mut window = [0u64; MEDIAN_TIMESTAMP_WINDOW];
        for (i, slot) in window.iter_mut().enumerate() {
            *slot = (MEDIAN_TIMESTAMP_WINDOW - i) as u64;
        }
        assert_eq!(median_timestamp(&window), 6);
    }
}
