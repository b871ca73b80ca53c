//! The consensus state container and its exported entry points.
//!
//! A process-wide reader-writer lock guards everything: queries take the
//! read lock, `accept_block` / `accept_transaction` / `subscribe` take the
//! write lock, and internal callees take no further locks. All work under
//! the lock is CPU plus memory; network I/O stays outside.

use crate::diff::ConsensusChange;
use crate::error::{StateError, StateResult};
use crate::notify::SubscriberRegistry;
use crate::tree::{BlockNode, BlockTree, NodeIdx};
use cairn_consensus::{
    validate_header, validate_transaction, ChainParams, ConsensusError, HeaderContext, StateView,
};
use cairn_mempool::TransactionPool;
use cairn_types::{
    hash_object, merkle_root, Block, BlockHeight, BlockId, ContractId, Hash256, OpenContract,
    Output, OutputId, Target, Timestamp, Transaction,
};
use crossbeam_channel::Receiver;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, info, instrument};

fn unix_now() -> Timestamp {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// The consensus engine: block tree, UTXO and contract state, mempool, and
/// subscriber registry, all behind one lock.
pub struct State {
    inner: RwLock<StateInner>,
}

pub(crate) struct StateInner {
    pub(crate) params: ChainParams,
    pub(crate) tree: BlockTree,
    /// Tip of the heaviest fully validated fork.
    pub(crate) current: NodeIdx,
    /// Block IDs of the active chain, indexed by height.
    pub(crate) current_path: Vec<BlockId>,
    pub(crate) unspent_outputs: HashMap<OutputId, Output>,
    /// Outputs consumed on the active chain, retained so inversion can
    /// restore their value and spend hash.
    pub(crate) spent_outputs: HashMap<OutputId, Output>,
    pub(crate) open_contracts: HashMap<ContractId, OpenContract>,
    pub(crate) pool: TransactionPool,
    pub(crate) subscribers: SubscriberRegistry,
    /// Blocks rejected only for running ahead of the clock, retried once
    /// it catches up.
    pub(crate) future_blocks: HashMap<BlockId, Block>,
}

impl StateView for StateInner {
    fn height(&self) -> BlockHeight {
        self.tree.get(self.current).height
    }

    fn unspent_output(&self, id: &OutputId) -> Option<Output> {
        self.unspent_outputs.get(id).copied()
    }

    fn open_contract(&self, id: &ContractId) -> Option<&OpenContract> {
        self.open_contracts.get(id)
    }

    fn block_id_at_height(&self, height: BlockHeight) -> Option<BlockId> {
        self.current_path.get(height as usize).copied()
    }
}

impl StateInner {
    fn genesis(params: ChainParams) -> Self {
        let genesis = Block {
            timestamp: params.genesis_timestamp,
            miner_address: params.genesis_address,
            ..Block::default()
        };
        let genesis_id = genesis.id();
        let subsidy = Output {
            value: params.calculate_coinbase(0),
            spend_hash: params.genesis_address,
        };
        let tree = BlockTree::new(genesis.clone(), &params);
        let inner = Self {
            current: tree.root(),
            tree,
            current_path: vec![genesis_id],
            unspent_outputs: [(genesis.subsidy_id(), subsidy)].into_iter().collect(),
            spent_outputs: HashMap::new(),
            open_contracts: HashMap::new(),
            pool: TransactionPool::new(),
            subscribers: SubscriberRegistry::default(),
            future_blocks: HashMap::new(),
            params,
        };
        info!(genesis = %genesis_id, "consensus state initialized");
        inner
    }

    pub(crate) fn current_node(&self) -> &BlockNode {
        self.tree.get(self.current)
    }

    pub(crate) fn genesis_id(&self) -> BlockId {
        self.current_path[0]
    }

    pub(crate) fn on_current_path(&self, idx: NodeIdx) -> bool {
        let node = self.tree.get(idx);
        self.current_path.get(node.height as usize) == Some(&node.block.id())
    }

    /// Accept one block, recursing into any orphans it adopts.
    fn process_new_block(&mut self, block: Block, now: Timestamp) -> StateResult<ConsensusChange> {
        let id = block.id();

        if self.tree.is_bad(&id) {
            return Err(StateError::BadBlock);
        }
        if self.tree.contains(&id) || self.future_blocks.contains_key(&id) {
            return Err(StateError::BlockKnown);
        }
        // Children of poisoned blocks are poisoned without further work.
        if self.tree.is_bad(&block.parent_id) {
            self.tree.mark_bad(id);
            return Err(StateError::BadBlock);
        }
        let Some(parent_idx) = self.tree.index_of(&block.parent_id) else {
            return Err(self.tree.file_orphan(block));
        };

        let parent = self.tree.get(parent_idx);
        let ctx = HeaderContext {
            parent_target: parent.target,
            earliest_timestamp: parent.earliest_child_timestamp(),
            now,
        };
        match validate_header(&self.params, &ctx, &block) {
            Ok(()) => {}
            Err(ConsensusError::FutureBlock { block_time, limit }) => {
                debug!(%id, block_time, limit, "block from the future queued for retry");
                self.future_blocks.insert(id, block);
                return Err(StateError::FutureBlock { block_time, limit });
            }
            Err(err) => {
                self.tree.mark_bad(id);
                return Err(err.into());
            }
        }

        let idx = self.tree.attach(parent_idx, block, &self.params);
        let mut change = ConsensusChange::default();
        if self.heavier_fork(idx) {
            change = self.fork_blockchain(idx)?;
            self.prune_invalid_pool_entries();
            self.subscribers.notify(&change);
        } else {
            debug!(%id, "block attached to a side fork");
        }

        self.debug_consistency_check();

        // The new block may be the parent some orphans were waiting on.
        for orphan in self.tree.take_orphans(&id) {
            let orphan_id = orphan.id();
            if let Err(err) = self.process_new_block(orphan, now) {
                debug!(%orphan_id, %err, "queued orphan did not accept");
            }
        }

        Ok(change)
    }

    /// Re-run queued future blocks whose timestamps the clock has reached.
    fn retry_future_blocks(&mut self, now: Timestamp) {
        let limit_floor = now.saturating_add(self.params.future_threshold);
        let mature: Vec<BlockId> = self
            .future_blocks
            .iter()
            .filter(|(_, b)| b.timestamp <= limit_floor)
            .map(|(id, _)| *id)
            .collect();
        for id in mature {
            let block = self.future_blocks.remove(&id).expect("id just listed");
            if let Err(err) = self.process_new_block(block, now) {
                debug!(%id, %err, "matured future block did not accept");
            }
        }
    }

    /// Drop pooled transactions the new committed state no longer admits,
    /// keeping every remaining pool entry valid at all times.
    pub(crate) fn prune_invalid_pool_entries(&mut self) {
        // `retain` needs `&mut self.pool` while validation reads the rest
        // of the state, so swap the pool out for the duration.
        let mut pool = std::mem::take(&mut self.pool);
        let before = pool.len();
        pool.retain(|t| validate_transaction(self, t).is_ok());
        let dropped = before - pool.len();
        if dropped > 0 {
            debug!(dropped, "pruned pool entries invalidated by the new state");
        }
        self.pool = pool;
    }

    /// Merkle root over everything consensus currently holds true.
    pub(crate) fn state_hash(&self) -> Hash256 {
        let node = self.current_node();
        let mut leaves = vec![
            self.current_path[node.height as usize].0,
            hash_object(&node.height),
            hash_object(&node.target),
            hash_object(&node.depth),
            hash_object(&node.earliest_child_timestamp()),
            self.genesis_id().0,
        ];
        for id in &self.current_path {
            leaves.push(id.0);
        }

        let mut utxo_ids: Vec<&OutputId> = self.unspent_outputs.keys().collect();
        utxo_ids.sort();
        for id in utxo_ids {
            leaves.push(hash_object(&self.unspent_outputs[id]));
        }

        let mut contract_ids: Vec<&ContractId> = self.open_contracts.keys().collect();
        contract_ids.sort();
        for id in contract_ids {
            leaves.push(hash_object(&self.open_contracts[id]));
        }

        merkle_root(&leaves)
    }

    /// Cheap structural invariants, run after every accepted block in
    /// debug builds.
    fn debug_consistency_check(&self) {
        #[cfg(any(debug_assertions, feature = "strict-checks"))]
        {
            let tip = self.current_node();
            assert_eq!(
                self.current_path.len() as BlockHeight,
                tip.height + 1,
                "current path length disagrees with tip height"
            );
            for (height, id) in self.current_path.iter().enumerate() {
                let idx = self
                    .tree
                    .index_of(id)
                    .expect("current path entry missing from the block map");
                assert_eq!(self.tree.get(idx).height as usize, height);
            }
            assert_eq!(
                *self.current_path.last().expect("path never empty"),
                tip.block.id()
            );
            for id in self.unspent_outputs.keys() {
                assert!(
                    !self.spent_outputs.contains_key(id),
                    "output {id} is both spent and unspent"
                );
            }
        }
        #[cfg(feature = "strict-checks")]
        self.strict_replay_check();
    }

    /// Rebuild the state from genesis by replaying the active chain and
    /// compare state hashes. Catches any drift between incremental
    /// application and ground truth.
    #[cfg(feature = "strict-checks")]
    fn strict_replay_check(&self) {
        let mut rebuilt = StateInner::genesis(self.params.clone());
        for id in self.current_path.iter().skip(1) {
            let idx = self.tree.index_of(id).expect("path entry known");
            let block = self.tree.get(idx).block.clone();
            let parent_idx = rebuilt
                .tree
                .index_of(&block.parent_id)
                .expect("replay parent known");
            let new_idx = rebuilt.tree.attach(parent_idx, block, &rebuilt.params);
            rebuilt
                .apply_block(new_idx)
                .expect("active chain must replay cleanly");
        }
        assert_eq!(
            rebuilt.state_hash(),
            self.state_hash(),
            "incremental state diverged from a from-scratch replay"
        );
    }
}

impl State {
    /// A fresh state holding the genesis block, its subsidy output, and
    /// nothing else.
    pub fn new(params: ChainParams) -> Self {
        Self {
            inner: RwLock::new(StateInner::genesis(params)),
        }
    }

    /// A fresh state under the frozen production parameters.
    pub fn with_default_params() -> Self {
        Self::new(ChainParams::default())
    }

    /// Submit a block. On a state transition the returned change carries
    /// the rewound blocks, applied blocks, and output diffs, and every
    /// subscriber is notified; orphans and duplicates return errors and
    /// notify no one. The diffs are freshly built per call and safe to
    /// retain.
    #[instrument(skip(self, block), fields(id = %block.id()))]
    pub fn accept_block(&self, block: Block) -> StateResult<ConsensusChange> {
        let mut inner = self.inner.write();
        let now = unix_now();
        inner.retry_future_blocks(now);
        let change = inner.process_new_block(block, now)?;
        if !change.is_empty() {
            info!(
                height = inner.height(),
                rewound = change.rewound_blocks.len(),
                applied = change.applied_blocks.len(),
                "active chain advanced"
            );
        }
        Ok(change)
    }

    /// Submit a transaction to the mempool. It must be fully valid against
    /// the committed state on its own: the pool refuses both conflicts with
    /// pooled transactions and dependencies on them.
    #[instrument(skip(self, t), fields(id = %t.id()))]
    pub fn accept_transaction(&self, t: Transaction) -> StateResult<()> {
        let mut inner = self.inner.write();
        if let Some(conflict) = inner.pool.conflict(&t) {
            return Err(conflict.into());
        }
        validate_transaction(&*inner, &t)?;
        inner.pool.insert(t)?;
        Ok(())
    }

    /// Validate a transaction against the committed state without touching
    /// the pool.
    pub fn validate_transaction(&self, t: &Transaction) -> StateResult<()> {
        let inner = self.inner.read();
        validate_transaction(&*inner, t)?;
        Ok(())
    }

    /// Drop pooled transactions that no longer validate. Removal otherwise
    /// happens only through block application and reorganization.
    pub fn prune_pool(&self) {
        self.inner.write().prune_invalid_pool_entries();
    }

    /// Open a subscription. The receiver gets one [`ConsensusChange`] per
    /// state transition from now on; see [`crate::SUBSCRIBER_QUEUE_DEPTH`]
    /// for the lagging policy.
    pub fn subscribe(&self) -> Receiver<ConsensusChange> {
        self.inner.write().subscribers.subscribe()
    }

    /// Height of the heaviest fork.
    pub fn height(&self) -> BlockHeight {
        let inner = self.inner.read();
        inner.height()
    }

    /// Depth of the heaviest fork, stored inverted.
    pub fn depth(&self) -> Target {
        self.inner.read().current_node().depth
    }

    /// The block at the tip of the heaviest fork.
    pub fn current_block(&self) -> Block {
        self.inner.read().current_node().block.clone()
    }

    /// ID of the block at the tip of the heaviest fork.
    pub fn current_block_id(&self) -> BlockId {
        self.inner.read().current_node().block.id()
    }

    /// Target the next block must meet.
    pub fn current_target(&self) -> Target {
        self.inner.read().current_node().target
    }

    /// Earliest timestamp the next block may carry: the median of the 11
    /// most recent.
    pub fn earliest_timestamp(&self) -> Timestamp {
        self.inner.read().current_node().earliest_child_timestamp()
    }

    /// ID of the genesis block.
    pub fn genesis_id(&self) -> BlockId {
        self.inner.read().genesis_id()
    }

    /// The active-chain block at `height`.
    pub fn block_at_height(&self, height: BlockHeight) -> StateResult<Block> {
        let inner = self.inner.read();
        let id = inner
            .current_path
            .get(height as usize)
            .ok_or(StateError::UnknownHeight(height))?;
        let idx = inner.tree.index_of(id).expect("path entries stay mapped");
        Ok(inner.tree.get(idx).block.clone())
    }

    /// Any known block by ID, active fork or not.
    pub fn block(&self, id: &BlockId) -> StateResult<Block> {
        let inner = self.inner.read();
        let idx = inner.tree.index_of(id).ok_or(StateError::UnknownBlock(*id))?;
        Ok(inner.tree.get(idx).block.clone())
    }

    /// Height of any known block by ID.
    pub fn height_of_block(&self, id: &BlockId) -> StateResult<BlockHeight> {
        let inner = self.inner.read();
        let idx = inner.tree.index_of(id).ok_or(StateError::UnknownBlock(*id))?;
        Ok(inner.tree.get(idx).height)
    }

    /// An unspent output by ID.
    pub fn output(&self, id: &OutputId) -> StateResult<Output> {
        self.inner
            .read()
            .unspent_outputs
            .get(id)
            .copied()
            .ok_or(StateError::UnknownOutput(*id))
    }

    /// The whole unspent set, sorted by output ID.
    pub fn sorted_utxo_set(&self) -> Vec<(OutputId, Output)> {
        let inner = self.inner.read();
        let mut set: Vec<(OutputId, Output)> = inner
            .unspent_outputs
            .iter()
            .map(|(id, output)| (*id, *output))
            .collect();
        set.sort_by_key(|(id, _)| *id);
        set
    }

    /// Unspent outputs payable to `spend_hash`, sorted by ID. What a
    /// wallet scans for.
    pub fn outputs_for(&self, spend_hash: &Hash256) -> Vec<(OutputId, Output)> {
        let inner = self.inner.read();
        let mut set: Vec<(OutputId, Output)> = inner
            .unspent_outputs
            .iter()
            .filter(|(_, output)| output.spend_hash == *spend_hash)
            .map(|(id, output)| (*id, *output))
            .collect();
        set.sort_by_key(|(id, _)| *id);
        set
    }

    /// Every open storage contract, sorted by contract ID.
    pub fn open_contracts(&self) -> Vec<OpenContract> {
        let inner = self.inner.read();
        let mut contracts: Vec<OpenContract> = inner.open_contracts.values().cloned().collect();
        contracts.sort_by_key(|c| c.contract_id);
        contracts
    }

    /// Snapshot of the mempool in deterministic order. What a miner packs.
    pub fn transaction_pool_dump(&self) -> Vec<Transaction> {
        self.inner.read().pool.dump()
    }

    /// Number of pooled transactions.
    pub fn transaction_pool_len(&self) -> usize {
        self.inner.read().pool.len()
    }

    /// Merkle root over the full consensus state. Equal hashes mean
    /// byte-identical consensus.
    pub fn state_hash(&self) -> Hash256 {
        self.inner.read().state_hash()
    }

    /// The parameters this state enforces.
    pub fn params(&self) -> ChainParams {
        self.inner.read().params.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cairn_types::hash_bytes;

    #[test]
    fn genesis_state_shape() {
        let state = State::new(ChainParams::regtest());
        assert_eq!(state.height(), 0);
        let utxos = state.sorted_utxo_set();
        assert_eq!(utxos.len(), 1);
        assert_eq!(utxos[0].1.value, ChainParams::regtest().calculate_coinbase(0));
        assert_eq!(state.current_block_id(), state.genesis_id());
        assert_eq!(
            state.block_at_height(0).unwrap().id(),
            state.genesis_id()
        );
        assert!(matches!(
            state.block_at_height(1),
            Err(StateError::UnknownHeight(1))
        ));
    }

    #[test]
    fn genesis_subsidy_is_at_the_derived_id() {
        let state = State::new(ChainParams::regtest());
        let genesis = state.block_at_height(0).unwrap();
        assert!(state.output(&genesis.subsidy_id()).is_ok());
    }

    #[test]
    fn state_hash_is_deterministic() {
        let a = State::new(ChainParams::regtest());
        let b = State::new(ChainParams::regtest());
        assert_eq!(a.state_hash(), b.state_hash());
        // Different parameters change the root target, and the hash sees it.
        let c = State::new(ChainParams::default());
        assert_ne!(a.state_hash(), c.state_hash());
    }

    #[test]
    fn unknown_queries_error() {
        let state = State::new(ChainParams::regtest());
        let ghost = BlockId(hash_bytes(b"ghost"));
        assert!(matches!(
            state.block(&ghost),
            Err(StateError::UnknownBlock(_))
        ));
        assert!(matches!(
            state.output(&OutputId(hash_bytes(b"ghost"))),
            Err(StateError::UnknownOutput(_))
        ));
    }

    #[test]
    fn invalid_transaction_rejected_from_pool() {
        let state = State::new(ChainParams::regtest());
        let err = state.accept_transaction(Transaction::default()).unwrap_err();
        assert_eq!(err, StateError::Consensus(ConsensusError::NoInputs));
        assert_eq!(state.transaction_pool_len(), 0);
    }
}
