//! Difficulty retargeting and depth accumulation.
//!
//! Every block retargets: the new target is the parent's scaled by the
//! ratio of observed to ideal elapsed time over the trailing window, with
//! the ratio clamped so timestamp games cannot swing difficulty faster than
//! a few percent per block. Depth is the running sum of `1/target` along
//! the chain, computed exactly and stored inverted in 32 bytes.

use crate::params::ChainParams;
use cairn_types::{BlockHeight, Target, Timestamp};
use num_bigint::BigInt;
use num_rational::BigRational;

/// Target for a child block.
///
/// `window` is how many blocks actually separate the new block from
/// `ancestor_timestamp`'s block — `min(height, target_window)` at the call
/// site, and at least one.
pub fn child_target(
    params: &ChainParams,
    ancestor_timestamp: Timestamp,
    new_timestamp: Timestamp,
    window: BlockHeight,
    parent_target: Target,
) -> Target {
    debug_assert!(window > 0);
    let elapsed = new_timestamp as i128 - ancestor_timestamp as i128;
    let expected = (window * params.block_frequency) as i128;

    // Blocks faster than ideal shrink the ratio below one; a shrinking
    // target means rising difficulty.
    let mut adjustment = BigRational::new(BigInt::from(elapsed), BigInt::from(expected));
    // The bounds clamp the ratio itself, never its inverse; the endpoints
    // are consensus-critical. See DESIGN.md, "Difficulty clamp bounds".
    if adjustment > params.max_adjustment_up {
        adjustment = params.max_adjustment_up.clone();
    } else if adjustment < params.max_adjustment_down {
        adjustment = params.max_adjustment_down.clone();
    }

    let target = parent_target.mul_ratio(&adjustment);
    target.min(params.root_depth)
}

/// Depth of a chain extended by one block of `child_target`.
///
/// Stored depths are inverted: `depth.inverse()` is the accumulated work,
/// so the new stored value is `1 / (1/parent_depth + 1/child_target)`.
pub fn child_depth(parent_depth: Target, child_target: Target) -> Target {
    let cumulative = parent_depth.inverse() + child_target.inverse();
    Target::from_rat(&cumulative.recip())
}

#[cfg(test)]
mod tests {
    use super::*;
    use num_bigint::BigUint;

    fn target(n: u64) -> Target {
        Target::from_int(&BigUint::from(n))
    }

    #[test]
    fn ideal_timing_keeps_target() {
        let params = ChainParams::default();
        let t = target(1_000_000);
        // 80 blocks at exactly 10 seconds each.
        let next = child_target(&params, 0, 800, 80, t);
        assert_eq!(next, t);
    }

    #[test]
    fn fast_blocks_shrink_target() {
        let params = ChainParams::default();
        let t = target(1_000_000);
        // Half the ideal elapsed time: clamped at 97/100.
        let next = child_target(&params, 0, 400, 80, t);
        assert_eq!(next, target(970_000));
    }

    #[test]
    fn slow_blocks_grow_target() {
        let params = ChainParams::default();
        let t = target(1_000_000);
        // Double the ideal elapsed time: clamped at 103/100.
        let next = child_target(&params, 0, 1600, 80, t);
        assert_eq!(next, target(1_030_000));
    }

    #[test]
    fn mild_drift_is_not_clamped() {
        let params = ChainParams::default();
        let t = target(1_000_000);
        // 1% slow: 808s over 80 blocks of 10s.
        let next = child_target(&params, 0, 808, 80, t);
        assert_eq!(next, target(1_010_000));
    }

    #[test]
    fn backwards_timestamps_clamp_down() {
        let params = ChainParams::default();
        let t = target(1_000_000);
        // Negative elapsed time must behave like "far too fast".
        let next = child_target(&params, 1000, 900, 80, t);
        assert_eq!(next, target(970_000));
    }

    #[test]
    fn depth_accumulates_weight() {
        let d0 = Target::MAX; // empty chain: essentially zero work
        let t = target(1000);
        let d1 = child_depth(d0, t);
        let d2 = child_depth(d1, t);
        // More accumulated work stores as a smaller value.
        assert!(d1 < d0);
        assert!(d2 < d1);
        // One block of weight 1/1000 plus the root's sliver of work puts the
        // stored inverse just under 1000; a second block just under 500.
        assert_eq!(d1.to_int(), BigUint::from(999u32));
        assert_eq!(d2.to_int(), BigUint::from(499u32));
    }

    #[test]
    fn depth_inverse_round_trips_work() {
        let t = target(1000);
        let d1 = child_depth(Target::MAX, t);
        let work = d1.inverse();
        // Within truncation error of one part in the stored integer.
        assert!(work >= t.inverse());
    }
}
