//! Test harness: a [`State`] plus a miner that can extend any known fork.
//!
//! The engine only advertises the tip's target and earliest timestamp, so
//! the harness shadows per-block consensus data (target, timestamp window)
//! for everything it mines, recomputing them with the same retargeting
//! functions the engine uses. That lets tests grind valid blocks on side
//! forks, which is what reorganization scenarios need.

use cairn_consensus::{child_target, median_timestamp, ChainParams, MEDIAN_TIMESTAMP_WINDOW};
use cairn_state::{ConsensusChange, State, StateResult};
use cairn_sync::{send_blocks, BlockRange, SyncPeer, SyncResult, BLOCK_LOCATOR_LEN};
use cairn_types::{Block, BlockHeight, BlockId, CoinAddress, Target, Timestamp, Transaction};
use std::collections::HashMap;

#[derive(Clone)]
struct NodeInfo {
    parent: BlockId,
    height: BlockHeight,
    /// Target this block's children must meet.
    target: Target,
    /// Trailing timestamps, this block's own in the last slot.
    timestamps: [Timestamp; MEDIAN_TIMESTAMP_WINDOW],
}

/// A consensus state plus the bookkeeping to mine on any of its forks.
pub struct TestChain {
    pub state: State,
    pub params: ChainParams,
    info: HashMap<BlockId, NodeInfo>,
}

impl TestChain {
    /// A fresh chain under regtest parameters.
    pub fn new() -> Self {
        Self::with_params(ChainParams::regtest())
    }

    pub fn with_params(params: ChainParams) -> Self {
        let state = State::new(params.clone());
        let genesis = state.genesis_id();
        let info = NodeInfo {
            parent: BlockId::default(),
            height: 0,
            target: params.root_target,
            timestamps: [params.genesis_timestamp; MEDIAN_TIMESTAMP_WINDOW],
        };
        Self {
            state,
            params,
            info: [(genesis, info)].into_iter().collect(),
        }
    }

    pub fn genesis_id(&self) -> BlockId {
        self.state.genesis_id()
    }

    /// Grind a valid block extending `parent` (which must be genesis or a
    /// block this harness mined). The block is returned unsubmitted.
    pub fn mine_on(
        &mut self,
        parent: BlockId,
        transactions: Vec<Transaction>,
        miner_address: CoinAddress,
    ) -> Block {
        let parent_info = self.info.get(&parent).expect("mining on an unknown parent").clone();

        // One second past the parent keeps forks with equal shape at equal
        // difficulty; never earlier than the median rule allows.
        let earliest = median_timestamp(&parent_info.timestamps);
        let timestamp = earliest.max(parent_info.timestamps[MEDIAN_TIMESTAMP_WINDOW - 1] + 1);

        let mut block = Block {
            parent_id: parent,
            nonce: 0,
            timestamp,
            miner_address,
            merkle_root: Default::default(),
            transactions,
        };
        block.merkle_root = block.transaction_merkle_root();
        while !block.meets_target(parent_info.target) {
            block.nonce += 1;
        }

        let height = parent_info.height + 1;
        let mut timestamps = parent_info.timestamps;
        timestamps.rotate_left(1);
        timestamps[MEDIAN_TIMESTAMP_WINDOW - 1] = timestamp;

        let window = height.min(self.params.target_window);
        let ancestor_timestamp = self.timestamp_of_ancestor(parent, window - 1);
        let target = child_target(
            &self.params,
            ancestor_timestamp,
            timestamp,
            window,
            parent_info.target,
        );

        self.info.insert(
            block.id(),
            NodeInfo {
                parent,
                height,
                target,
                timestamps,
            },
        );
        block
    }

    fn timestamp_of_ancestor(&self, mut id: BlockId, steps: BlockHeight) -> Timestamp {
        for _ in 0..steps {
            id = self.info[&id].parent;
        }
        self.info[&id].timestamps[MEDIAN_TIMESTAMP_WINDOW - 1]
    }

    /// Mine a block of `transactions` on the current tip.
    pub fn mine(&mut self, transactions: Vec<Transaction>, miner_address: CoinAddress) -> Block {
        let tip = self.state.current_block_id();
        self.mine_on(tip, transactions, miner_address)
    }

    /// Mine on the tip and submit, expecting acceptance.
    pub fn mine_and_accept(
        &mut self,
        transactions: Vec<Transaction>,
        miner_address: CoinAddress,
    ) -> ConsensusChange {
        let block = self.mine(transactions, miner_address);
        self.state
            .accept_block(block)
            .expect("harness-mined block accepts")
    }

    /// Mine `count` empty blocks on the tip.
    pub fn mine_empty_blocks(&mut self, count: u64, miner_address: CoinAddress) {
        for _ in 0..count {
            self.mine_and_accept(Vec::new(), miner_address);
        }
    }

    pub fn accept(&self, block: Block) -> StateResult<ConsensusChange> {
        self.state.accept_block(block)
    }
}

impl Default for TestChain {
    fn default() -> Self {
        Self::new()
    }
}

/// An in-process peer: catch-up against another node's state without a
/// transport.
pub struct LocalPeer<'a>(pub &'a State);

impl SyncPeer for LocalPeer<'_> {
    fn send_blocks(&self, known: [BlockId; BLOCK_LOCATOR_LEN]) -> SyncResult<BlockRange> {
        send_blocks(self.0, &known)
    }
}
