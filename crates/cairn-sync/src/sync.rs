//! The catch-up driver.

use crate::error::{SyncError, SyncResult};
use crate::protocol::{build_block_locator, BlockRange, BLOCK_LOCATOR_LEN};
use cairn_state::{State, StateError};
use cairn_types::BlockId;
use tracing::{debug, info, instrument};

/// A peer that can serve catch-up requests. Implementations wrap the
/// actual transport; [`catch_up`] never holds the state lock across a
/// call into one.
pub trait SyncPeer {
    /// The peer's `send_blocks` responder.
    fn send_blocks(&self, known: [BlockId; BLOCK_LOCATOR_LEN]) -> SyncResult<BlockRange>;
}

/// What a catch-up run did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CatchUpStats {
    /// Blocks the peer sent.
    pub received: u64,
    /// Blocks that produced a state transition here.
    pub applied: u64,
    /// Round trips made.
    pub round_trips: u64,
}

/// Synchronize with a peer: exchange locators for batches of blocks and
/// feed every returned block through the normal acceptance path, so
/// reorganization and orphan handling apply uniformly. Repeats while the
/// peer reports more blocks.
#[instrument(skip_all)]
pub fn catch_up<P: SyncPeer>(state: &State, peer: &P) -> SyncResult<CatchUpStats> {
    let mut stats = CatchUpStats::default();
    loop {
        // Gather under the read lock, release, then talk to the network.
        let locator = build_block_locator(state);
        let range = peer.send_blocks(locator)?;
        stats.round_trips += 1;
        stats.received += range.blocks.len() as u64;

        for block in range.blocks {
            let id = block.id();
            match state.accept_block(block) {
                Ok(change) if !change.is_empty() => stats.applied += 1,
                Ok(_) => {}
                // Blocks we already have are expected at every batch seam.
                Err(StateError::BlockKnown) => {}
                Err(err) => {
                    debug!(%id, %err, "catch-up block did not accept");
                }
            }
        }

        if !range.more_available {
            break;
        }
    }
    info!(
        height = state.height(),
        received = stats.received,
        applied = stats.applied,
        round_trips = stats.round_trips,
        "catch-up finished"
    );
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A peer that always claims a foreign chain.
    struct ForeignPeer;

    impl SyncPeer for ForeignPeer {
        fn send_blocks(&self, _known: [BlockId; BLOCK_LOCATOR_LEN]) -> SyncResult<BlockRange> {
            Err(SyncError::NoMatchingBlock)
        }
    }

    #[test]
    fn foreign_peer_error_propagates() {
        let state = State::new(cairn_consensus::ChainParams::regtest());
        assert_eq!(
            catch_up(&state, &ForeignPeer),
            Err(SyncError::NoMatchingBlock)
        );
    }
}
