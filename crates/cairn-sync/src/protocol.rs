//! The catch-up wire protocol: locator construction and the responder.

use crate::error::{SyncError, SyncResult};
use crate::MAX_CATCH_UP_BLOCKS;
use cairn_state::State;
use cairn_types::{Block, BlockHeight, BlockId};
use tracing::debug;

/// Entries in a block locator.
pub const BLOCK_LOCATOR_LEN: usize = 32;

/// A batch of blocks from a peer, plus whether more remain.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlockRange {
    /// Successive active-chain blocks, ascending height.
    pub blocks: Vec<Block>,
    /// True when the responder had more than fit in one batch; the
    /// requester should re-issue.
    pub more_available: bool,
}

/// Build the known-block list a requester sends: the 12 most recent block
/// IDs, then exponentially sparser ancestors (12·2^k for k = 1…), and
/// always the genesis ID. The back-off guarantees an intersection with any
/// peer that shares our genesis. Unused slots hold the zero ID.
pub fn build_block_locator(state: &State) -> [BlockId; BLOCK_LOCATOR_LEN] {
    let height = state.height();
    let mut ids = Vec::with_capacity(BLOCK_LOCATOR_LEN);

    for back in 0..12 {
        let Some(h) = height.checked_sub(back) else {
            break;
        };
        if let Ok(block) = state.block_at_height(h) {
            ids.push(block.id());
        }
    }

    let mut backtrace: BlockHeight = 12;
    while ids.len() < BLOCK_LOCATOR_LEN - 1 {
        backtrace *= 2;
        let Some(h) = height.checked_sub(backtrace) else {
            break;
        };
        if let Ok(block) = state.block_at_height(h) {
            ids.push(block.id());
        } else {
            break;
        }
    }

    let genesis = state.genesis_id();
    if !ids.contains(&genesis) {
        ids.push(genesis);
    }

    let mut locator = [BlockId::default(); BLOCK_LOCATOR_LEN];
    locator[..ids.len()].copy_from_slice(&ids);
    locator
}

/// Serve a catch-up request: find the highest entry of `known` on our
/// active chain and return up to [`MAX_CATCH_UP_BLOCKS`] blocks from
/// there.
pub fn send_blocks(
    state: &State,
    known: &[BlockId; BLOCK_LOCATOR_LEN],
) -> SyncResult<BlockRange> {
    // Highest known block that is on our active chain.
    let mut start: Option<BlockHeight> = None;
    for id in known {
        let Ok(height) = state.height_of_block(id) else {
            continue;
        };
        let on_active = state
            .block_at_height(height)
            .map(|b| b.id() == *id)
            .unwrap_or(false);
        if on_active {
            start = Some(start.map_or(height, |s| s.max(height)));
        }
    }
    // The genesis ID is in every honest locator; no match means a foreign
    // chain.
    let start = start.ok_or(SyncError::NoMatchingBlock)?;

    let mut blocks = Vec::new();
    for height in start..start + MAX_CATCH_UP_BLOCKS as BlockHeight {
        match state.block_at_height(height) {
            Ok(block) => blocks.push(block),
            Err(_) => break,
        }
    }
    let more_available = state
        .block_at_height(start + MAX_CATCH_UP_BLOCKS as BlockHeight)
        .is_ok();

    debug!(
        start,
        count = blocks.len(),
        more_available,
        "serving catch-up blocks"
    );
    Ok(BlockRange {
        blocks,
        more_available,
    })
}
