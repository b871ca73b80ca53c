//! Transaction pool implementation.
//!
//! Transactions are stored once, keyed by their first input's output ID
//! (the anchor). Two side indices map every spent output and every proven
//! contract back to the owning anchor, which makes conflict detection and
//! block-driven eviction single lookups.

use crate::{MempoolError, MempoolResult};
use cairn_types::{ContractId, OutputId, Transaction};
use std::collections::HashMap;
use tracing::debug;

/// The pending-transaction pool.
#[derive(Debug, Default)]
pub struct TransactionPool {
    /// Pooled transactions keyed by their anchor (first input's output ID).
    transactions: HashMap<OutputId, Transaction>,
    /// Every output spent by a pooled transaction, to its anchor.
    outputs: HashMap<OutputId, OutputId>,
    /// Every contract proven by a pooled transaction, to its anchor.
    proofs: HashMap<ContractId, OutputId>,
}

impl TransactionPool {
    /// An empty pool.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of pooled transactions.
    pub fn len(&self) -> usize {
        self.transactions.len()
    }

    /// True when nothing is pending.
    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }

    /// Whether a pooled transaction already spends `output`.
    pub fn spends(&self, output: &OutputId) -> bool {
        self.outputs.contains_key(output)
    }

    /// Whether a pooled transaction already proves `contract`.
    pub fn proves(&self, contract: &ContractId) -> bool {
        self.proofs.contains_key(contract)
    }

    /// First conflict between `t` and the pool, if any.
    pub fn conflict(&self, t: &Transaction) -> Option<MempoolError> {
        for input in &t.inputs {
            if self.spends(&input.output_id) {
                return Some(MempoolError::ConflictingSpend(input.output_id));
            }
        }
        for proof in &t.storage_proofs {
            if self.proves(&proof.contract_id) {
                return Some(MempoolError::ConflictingProof(proof.contract_id));
            }
        }
        None
    }

    /// Admit a transaction. The caller has already validated it against
    /// committed state; this only enforces pool-level conflicts.
    pub fn insert(&mut self, t: Transaction) -> MempoolResult<()> {
        let anchor = t.inputs.first().ok_or(MempoolError::NoInputs)?.output_id;
        if let Some(conflict) = self.conflict(&t) {
            return Err(conflict);
        }

        for input in &t.inputs {
            self.outputs.insert(input.output_id, anchor);
        }
        for proof in &t.storage_proofs {
            self.proofs.insert(proof.contract_id, anchor);
        }
        self.transactions.insert(anchor, t);

        debug!(pooled = self.transactions.len(), "transaction pooled");
        Ok(())
    }

    /// Drop every pooled transaction that conflicts with `t` — shares a
    /// spent output or proves the same contract. Called as blocks apply.
    pub fn remove_conflicts(&mut self, t: &Transaction) {
        for input in &t.inputs {
            if let Some(anchor) = self.outputs.get(&input.output_id).copied() {
                self.remove_by_anchor(anchor);
            }
        }
        for proof in &t.storage_proofs {
            if let Some(anchor) = self.proofs.get(&proof.contract_id).copied() {
                self.remove_by_anchor(anchor);
            }
        }
    }

    /// Remove one transaction and unwind its index entries.
    fn remove_by_anchor(&mut self, anchor: OutputId) {
        let Some(t) = self.transactions.remove(&anchor) else {
            return;
        };
        for input in &t.inputs {
            self.outputs.remove(&input.output_id);
        }
        for proof in &t.storage_proofs {
            self.proofs.remove(&proof.contract_id);
        }
    }

    /// Drop every pooled transaction failing `keep`. Used after
    /// reorganizations and by caller-driven pruning.
    pub fn retain<F>(&mut self, mut keep: F)
    where
        F: FnMut(&Transaction) -> bool,
    {
        let doomed: Vec<OutputId> = self
            .transactions
            .iter()
            .filter(|(_, t)| !keep(t))
            .map(|(anchor, _)| *anchor)
            .collect();
        for anchor in doomed {
            self.remove_by_anchor(anchor);
        }
    }

    /// Snapshot of every pooled transaction, in anchor order for
    /// determinism. This is what a miner packs into a block.
    pub fn dump(&self) -> Vec<Transaction> {
        let mut anchors: Vec<&OutputId> = self.transactions.keys().collect();
        anchors.sort();
        anchors
            .into_iter()
            .map(|a| self.transactions[a].clone())
            .collect()
    }

    /// Iterate the pooled transactions in arbitrary order.
    pub fn iter(&self) -> impl Iterator<Item = &Transaction> {
        self.transactions.values()
    }
}
