//! Reversible block and transaction application.
//!
//! Application and inversion are exact mirrors: the diff sequence a block
//! produces, replayed in reverse with each variant flipped, restores the
//! prior state byte for byte. Transaction validity is re-checked here
//! because fork blocks arrive header-validated only.

use crate::diff::{DiffSet, OutputDiff};
use crate::error::StateResult;
use crate::state::StateInner;
use crate::tree::NodeIdx;
use cairn_consensus::validate_transaction;
use cairn_types::{Block, BlockHeight, Currency, Output, Transaction};
use tracing::debug;

impl StateInner {
    /// Height of the active tip.
    pub(crate) fn tip_height(&self) -> BlockHeight {
        self.tree.get(self.current).height
    }

    /// Apply the block at `idx`, which must be a child of the current tip.
    /// On a transaction failing validation the partial application is
    /// unwound and the state is exactly as before.
    pub(crate) fn apply_block(&mut self, idx: NodeIdx) -> StateResult<DiffSet> {
        debug_assert_eq!(
            self.tree.get(idx).parent,
            Some(self.current),
            "blocks apply only onto the current tip"
        );
        let block = self.tree.get(idx).block.clone();
        let height = self.tree.get(idx).height;

        // The block joins the active chain first: in-block validation and
        // proof-window arithmetic see the block's own height.
        self.current_path.push(block.id());
        self.current = idx;

        let mut diffs = DiffSet::default();

        // Subsidy: the coinbase for this height plus every fee inside.
        let fees: Currency = block
            .transactions
            .iter()
            .flat_map(|t| t.miner_fees.iter())
            .sum();
        let subsidy_id = block.subsidy_id();
        let subsidy = Output {
            value: self.params.calculate_coinbase(height).saturating_add(fees),
            spend_hash: block.miner_address,
        };
        self.unspent_outputs.insert(subsidy_id, subsidy);
        diffs.outputs.push(OutputDiff::Created {
            id: subsidy_id,
            output: subsidy,
        });

        // Transactions, in block order, each validated against the state
        // its predecessors left behind.
        for (i, t) in block.transactions.iter().enumerate() {
            if let Err(err) = validate_transaction(self, t) {
                debug!(height, tx = i, %err, "block carries an invalid transaction");
                let mut scratch = DiffSet::default();
                for applied in block.transactions[..i].iter().rev() {
                    self.invert_transaction(applied, &mut scratch);
                }
                self.unspent_outputs.remove(&subsidy_id);
                self.current_path.pop();
                self.current = self.tree.get(idx).parent.expect("non-genesis block");
                return Err(err.into());
            }
            self.apply_transaction(t, &mut diffs);
        }

        // Passive effects: windows that closed at this height.
        self.apply_contract_maintenance(idx, &mut diffs);

        Ok(diffs)
    }

    /// Apply one validated transaction.
    pub(crate) fn apply_transaction(&mut self, t: &Transaction, diffs: &mut DiffSet) {
        // Pooled transactions that this confirmation contradicts lose.
        self.pool.remove_conflicts(t);

        for input in &t.inputs {
            let output = self
                .unspent_outputs
                .remove(&input.output_id)
                .expect("validated input resolves to an unspent output");
            self.spent_outputs.insert(input.output_id, output);
            diffs.outputs.push(OutputDiff::Removed {
                id: input.output_id,
                output,
            });
        }
        for (i, output) in t.outputs.iter().enumerate() {
            let id = t.output_id(i);
            self.unspent_outputs.insert(id, *output);
            diffs.outputs.push(OutputDiff::Created { id, output: *output });
        }
        for proof in &t.storage_proofs {
            self.apply_storage_proof(proof, diffs);
        }
        for (i, contract) in t.file_contracts.iter().enumerate() {
            self.open_new_contract(contract.clone(), t.file_contract_id(i), diffs);
        }
    }

    /// Exact inverse of [`Self::apply_transaction`]: creations unwind
    /// first, inputs return to the unspent set last.
    pub(crate) fn invert_transaction(&mut self, t: &Transaction, diffs: &mut DiffSet) {
        for i in (0..t.file_contracts.len()).rev() {
            self.unwind_new_contract(t.file_contract_id(i), diffs);
        }
        for proof in t.storage_proofs.iter().rev() {
            self.invert_storage_proof(proof, diffs);
        }
        for i in (0..t.outputs.len()).rev() {
            let id = t.output_id(i);
            let output = self
                .unspent_outputs
                .remove(&id)
                .expect("created output still unspent during inversion");
            diffs.outputs.push(OutputDiff::Removed { id, output });
        }
        for input in t.inputs.iter().rev() {
            let output = self
                .spent_outputs
                .remove(&input.output_id)
                .expect("spent output retained for inversion");
            self.unspent_outputs.insert(input.output_id, output);
            diffs.outputs.push(OutputDiff::Created {
                id: input.output_id,
                output,
            });
        }
    }

    /// Invert the block at the tip, shrinking the active chain by one.
    /// The block's transactions are requeued into the mempool best-effort;
    /// conflict-causing ones are dropped.
    pub(crate) fn invert_block(&mut self) -> (Block, DiffSet) {
        let idx = self.current;
        debug_assert!(self.tree.get(idx).height > 0, "genesis cannot be inverted");
        let block = self.tree.get(idx).block.clone();
        let mut diffs = DiffSet::default();

        // Passive effects come back out first, then transactions in
        // reverse, then the subsidy.
        self.invert_contract_maintenance(idx, &mut diffs);
        for t in block.transactions.iter().rev() {
            self.invert_transaction(t, &mut diffs);
        }

        let subsidy_id = block.subsidy_id();
        let output = self
            .unspent_outputs
            .remove(&subsidy_id)
            .expect("subsidy still unspent during inversion");
        diffs.outputs.push(OutputDiff::Removed {
            id: subsidy_id,
            output,
        });

        self.current_path.pop();
        self.current = self.tree.get(idx).parent.expect("non-genesis block");

        for t in &block.transactions {
            if !t.inputs.is_empty() && self.pool.conflict(t).is_none() {
                let _ = self.pool.insert(t.clone());
            }
        }

        (block, diffs)
    }
}
