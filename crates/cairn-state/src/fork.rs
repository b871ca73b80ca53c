//! Fork choice and reorganization.
//!
//! A competing fork wins only when its depth beats the active tip's by
//! more than the surpass threshold: a fraction of one block's weight at
//! the current target. Without the margin, near-tied tips would make
//! honest miners thrash; with it, a lone slightly-heavier block is ignored
//! while a genuinely stronger branch still takes over.
//!
//! A reorganization is atomic from the outside: if the winning branch
//! turns out to hide an invalid transaction, the branch is poisoned and
//! the original chain is restored before the error surfaces.

use crate::diff::ConsensusChange;
use crate::error::{StateError, StateResult};
use crate::state::StateInner;
use crate::tree::NodeIdx;
use cairn_types::Block;
use tracing::{debug, warn};

impl StateInner {
    /// Whether the block at `idx` is a heavier tip than the current one,
    /// by more than the surpass threshold.
    pub(crate) fn heavier_fork(&self, idx: NodeIdx) -> bool {
        let current = self.current_node();
        let threshold = current.target.inverse() * self.params.surpass_threshold.clone();
        let required = current.depth.inverse() + threshold;
        self.tree.get(idx).depth.inverse() > required
    }

    /// Make `new_tip` the active tip: rewind to the common ancestor, then
    /// apply the winning branch. A plain extension is the degenerate case
    /// that rewinds nothing.
    pub(crate) fn fork_blockchain(&mut self, new_tip: NodeIdx) -> StateResult<ConsensusChange> {
        // Walk down from the new tip until the active chain is underfoot.
        let mut fork_path: Vec<NodeIdx> = Vec::new();
        let mut walker = new_tip;
        while !self.on_current_path(walker) {
            fork_path.push(walker);
            walker = self
                .tree
                .get(walker)
                .parent
                .expect("genesis is always on the active chain");
        }
        let common_ancestor = walker;

        // Rewind the losing branch, tip first.
        let mut change = ConsensusChange::default();
        while self.current != common_ancestor {
            let (block, diffs) = self.invert_block();
            change.rewound_blocks.push(block);
            change.output_diffs.extend(diffs.outputs);
            change.contract_diffs.extend(diffs.contracts);
        }
        if !change.rewound_blocks.is_empty() {
            debug!(
                rewound = change.rewound_blocks.len(),
                ancestor_height = self.tip_height(),
                "rewound to the common ancestor"
            );
        }

        // Apply the winning branch, lowest height first. The blocks were
        // only header-validated on arrival; their transactions get their
        // first full check here.
        for (applied_count, &idx) in fork_path.iter().rev().enumerate() {
            match self.apply_block(idx) {
                Ok(diffs) => {
                    change.applied_blocks.push(self.tree.get(idx).block.clone());
                    change.output_diffs.extend(diffs.outputs);
                    change.contract_diffs.extend(diffs.contracts);
                }
                Err(err) => {
                    warn!(
                        bad_block = %self.tree.get(idx).block.id(),
                        %err,
                        "fork hid an invalid block; poisoning its subtree and restoring"
                    );
                    self.tree.mark_bad_subtree(idx);
                    self.restore_original_branch(applied_count, &change.rewound_blocks)?;
                    return Err(err);
                }
            }
        }

        Ok(change)
    }

    /// Undo a partially applied fork and replay the branch that was
    /// active before it. The observer-visible state ends exactly where it
    /// started.
    fn restore_original_branch(
        &mut self,
        applied_count: usize,
        rewound: &[Block],
    ) -> StateResult<()> {
        for _ in 0..applied_count {
            let _ = self.invert_block();
        }
        // `rewound` is in descending height order; replay it back up.
        for block in rewound.iter().rev() {
            let idx = self
                .tree
                .index_of(&block.id())
                .expect("rewound blocks stay in the tree");
            if let Err(err) = self.apply_block(idx) {
                debug_assert!(false, "original branch failed to reapply: {err}");
                return Err(StateError::Internal(format!(
                    "original branch failed to reapply: {err}"
                )));
            }
        }
        self.prune_invalid_pool_entries();
        Ok(())
    }
}
