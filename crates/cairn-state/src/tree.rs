//! The block tree.
//!
//! Every block ever seen with a valid header lives here, valid fork or not.
//! Nodes sit in an append-only arena and refer to each other by 32-bit
//! index, which sidesteps shared-ownership cycles and keeps the
//! reorganization walk cache-friendly. Orphans wait in a double map keyed
//! by their absent parent.

use crate::error::StateError;
use cairn_consensus::{child_depth, child_target, median_timestamp, ChainParams,
    MEDIAN_TIMESTAMP_WINDOW};
use cairn_types::{Block, BlockHeight, BlockId, ContractId, OpenContract, OutputId, Target,
    Timestamp};
use std::collections::{HashMap, HashSet};

/// Stable index of a node in the tree arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct NodeIdx(pub u32);

/// A contract window that closed without a proof at a specific block.
/// Missed proofs are passive — they happen in the absence of a transaction
/// — so the node itself must remember them for rewinds to be exact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissedStorageProof {
    pub output_id: OutputId,
    pub contract_id: ContractId,
}

/// One block's position in the tree, with the cached consensus values its
/// children and the fork-choice rule need.
#[derive(Debug, Clone)]
pub(crate) struct BlockNode {
    pub block: Block,
    pub parent: Option<NodeIdx>,
    pub children: Vec<NodeIdx>,
    pub height: BlockHeight,
    /// Target this node's children must meet.
    pub target: Target,
    /// Cumulative depth through this node, stored inverted.
    pub depth: Target,
    /// The trailing timestamps feeding the median rule.
    pub recent_timestamps: [Timestamp; MEDIAN_TIMESTAMP_WINDOW],
    /// Windows that closed without a proof when this block applied.
    pub missed_proofs: Vec<MissedStorageProof>,
    /// Contracts that closed when this block applied, with final state.
    pub terminations: Vec<OpenContract>,
    /// Contracts whose satisfied window flag was cleared at this boundary.
    pub reset_windows: Vec<ContractId>,
}

impl BlockNode {
    /// Earliest timestamp a valid child may carry.
    pub fn earliest_child_timestamp(&self) -> Timestamp {
        median_timestamp(&self.recent_timestamps)
    }
}

/// Arena-backed tree of every known block plus the orphan pool and the
/// bad-block set.
pub(crate) struct BlockTree {
    nodes: Vec<BlockNode>,
    block_map: HashMap<BlockId, NodeIdx>,
    bad_blocks: HashSet<BlockId>,
    /// absent parent -> (orphan id -> orphan block)
    missing_parents: HashMap<BlockId, HashMap<BlockId, Block>>,
}

impl BlockTree {
    /// A tree holding only the genesis block.
    pub fn new(genesis: Block, params: &ChainParams) -> Self {
        let node = BlockNode {
            recent_timestamps: [genesis.timestamp; MEDIAN_TIMESTAMP_WINDOW],
            block: genesis.clone(),
            parent: None,
            children: Vec::new(),
            height: 0,
            target: params.root_target,
            depth: params.root_depth,
            missed_proofs: Vec::new(),
            terminations: Vec::new(),
            reset_windows: Vec::new(),
        };
        Self {
            nodes: vec![node],
            block_map: [(genesis.id(), NodeIdx(0))].into_iter().collect(),
            bad_blocks: HashSet::new(),
            missing_parents: HashMap::new(),
        }
    }

    pub fn root(&self) -> NodeIdx {
        NodeIdx(0)
    }

    pub fn get(&self, idx: NodeIdx) -> &BlockNode {
        &self.nodes[idx.0 as usize]
    }

    pub fn get_mut(&mut self, idx: NodeIdx) -> &mut BlockNode {
        &mut self.nodes[idx.0 as usize]
    }

    pub fn index_of(&self, id: &BlockId) -> Option<NodeIdx> {
        self.block_map.get(id).copied()
    }

    pub fn contains(&self, id: &BlockId) -> bool {
        self.block_map.contains_key(id)
    }

    pub fn is_bad(&self, id: &BlockId) -> bool {
        self.bad_blocks.contains(id)
    }

    pub fn mark_bad(&mut self, id: BlockId) {
        self.bad_blocks.insert(id);
    }

    /// Mark a node and every descendant as bad.
    pub fn mark_bad_subtree(&mut self, idx: NodeIdx) {
        let mut stack = vec![idx];
        while let Some(current) = stack.pop() {
            let node = self.get(current);
            let id = node.block.id();
            let children = node.children.clone();
            self.bad_blocks.insert(id);
            stack.extend(children);
        }
    }

    /// Walk `steps` parents up from `from`. Callers stay within the chain.
    pub fn ancestor(&self, from: NodeIdx, steps: BlockHeight) -> NodeIdx {
        let mut idx = from;
        for _ in 0..steps {
            idx = self.get(idx).parent.expect("walked past the root");
        }
        idx
    }

    /// Attach a header-valid block under its parent, computing the child's
    /// height, timestamp window, target, and depth.
    pub fn attach(&mut self, parent: NodeIdx, block: Block, params: &ChainParams) -> NodeIdx {
        let parent_node = self.get(parent);
        let height = parent_node.height + 1;
        let parent_target = parent_node.target;
        let parent_depth = parent_node.depth;

        let mut recent_timestamps = parent_node.recent_timestamps;
        recent_timestamps.rotate_left(1);
        recent_timestamps[MEDIAN_TIMESTAMP_WINDOW - 1] = block.timestamp;

        // Retarget over the trailing window, clamped to the chain's actual
        // length near genesis.
        let window = height.min(params.target_window);
        let window_start = self.ancestor(parent, window - 1);
        let target = child_target(
            params,
            self.get(window_start).block.timestamp,
            block.timestamp,
            window,
            parent_target,
        );
        let depth = child_depth(parent_depth, parent_target);

        let idx = NodeIdx(self.nodes.len() as u32);
        self.block_map.insert(block.id(), idx);
        self.nodes.push(BlockNode {
            block,
            parent: Some(parent),
            children: Vec::new(),
            height,
            target,
            depth,
            recent_timestamps,
            missed_proofs: Vec::new(),
            terminations: Vec::new(),
            reset_windows: Vec::new(),
        });
        self.get_mut(parent).children.push(idx);
        idx
    }

    /// File a block whose parent is unknown. Always returns an error: which
    /// one tells the caller whether this sighting is new.
    pub fn file_orphan(&mut self, block: Block) -> StateError {
        debug_assert!(
            !self.contains(&block.parent_id),
            "orphan filed for a known parent"
        );
        let id = block.id();
        let siblings = self.missing_parents.entry(block.parent_id).or_default();
        if siblings.contains_key(&id) {
            return StateError::KnownOrphan;
        }
        siblings.insert(id, block);
        StateError::UnknownOrphan
    }

    /// Claim the orphans that were waiting for `parent`.
    pub fn take_orphans(&mut self, parent: &BlockId) -> Vec<Block> {
        self.missing_parents
            .remove(parent)
            .map(|children| children.into_values().collect())
            .unwrap_or_default()
    }
}
