//! Chain parameters.
//!
//! The consensus-critical constants are frozen; changing any of them forks
//! the chain. They are carried in a [`ChainParams`] value rather than bare
//! globals so tests can shrink the windows and soften the root target
//! without touching production rules.

use cairn_types::{BlockHeight, CoinAddress, Currency, Target, Timestamp};
use num_bigint::BigInt;
use num_rational::BigRational;
use serde::{Deserialize, Serialize};

/// Blocks considered when judging whether a timestamp is in the past.
/// Odd by construction so the median is a single element.
pub const MEDIAN_TIMESTAMP_WINDOW: usize = 11;

/// The consensus rules' tunable surface.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChainParams {
    /// Maximum encoded block size in bytes.
    pub block_size_limit: usize,
    /// Ideal seconds between blocks.
    pub block_frequency: Timestamp,
    /// Blocks sampled when retargeting.
    pub target_window: BlockHeight,
    /// Seconds into the future a timestamp may run ahead of the local clock.
    pub future_threshold: Timestamp,
    /// Upper clamp on the retarget ratio (blocks arriving too slowly).
    pub max_adjustment_up: BigRational,
    /// Lower clamp on the retarget ratio (blocks arriving too quickly).
    pub max_adjustment_down: BigRational,
    /// Fraction of one block's weight a competing fork must lead by before
    /// the node reorganizes onto it.
    pub surpass_threshold: BigRational,
    /// Subsidy at height zero.
    pub initial_coinbase: Currency,
    /// Subsidy floor.
    pub minimum_coinbase: Currency,
    /// Target of the genesis block's children.
    pub root_target: Target,
    /// Depth of the empty chain.
    pub root_depth: Target,
    pub genesis_timestamp: Timestamp,
    /// Payout address of the genesis subsidy. The zero address in test
    /// networks; deployments override it when constructing genesis.
    pub genesis_address: CoinAddress,
}

impl Default for ChainParams {
    fn default() -> Self {
        let mut root_target = [0u8; 32];
        root_target[2] = 8;
        Self {
            // Protocol-inherited value; suspect (nothing moves 1 GB blocks
            // in 10 seconds) but frozen for compatibility.
            block_size_limit: 1024 * 1024 * 1024,
            block_frequency: 10,
            target_window: 80,
            future_threshold: 3 * 60 * 60,
            max_adjustment_up: ratio(103, 100),
            max_adjustment_down: ratio(97, 100),
            surpass_threshold: ratio(5, 100),
            initial_coinbase: 300_000,
            minimum_coinbase: 30_000,
            root_target: Target(root_target),
            root_depth: Target::MAX,
            genesis_timestamp: 1_417_070_299,
            genesis_address: CoinAddress::ZERO,
        }
    }
}

impl ChainParams {
    /// Parameters for tests: an easy root target so single-nonce mining
    /// succeeds, one-second blocks, and a window wide enough that the
    /// retarget clamp never bites mid-test.
    pub fn regtest() -> Self {
        let mut root_target = [0u8; 32];
        root_target[0] = 0xFF;
        Self {
            block_frequency: 1,
            target_window: 1000,
            max_adjustment_up: ratio(1005, 1000),
            max_adjustment_down: ratio(995, 1000),
            root_target: Target(root_target),
            ..Self::default()
        }
    }

    /// The subsidy created by the block at `height`, before fees.
    pub fn calculate_coinbase(&self, height: BlockHeight) -> Currency {
        self.initial_coinbase
            .saturating_sub(height)
            .max(self.minimum_coinbase)
    }
}

fn ratio(n: i64, d: i64) -> BigRational {
    BigRational::new(BigInt::from(n), BigInt::from(d))
}
