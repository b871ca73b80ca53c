//! Storage-contract state transitions.
//!
//! Proof application and inversion are transaction-driven; window closes
//! and terminations are passive, so their records live on the block node
//! that triggered them (see [`crate::tree::BlockNode`]) and are drained
//! back off it on inversion.

use crate::diff::{ContractDiff, DiffSet, OutputDiff};
use crate::state::StateInner;
use crate::tree::{MissedStorageProof, NodeIdx};
use cairn_types::{
    contract_termination_output_id, storage_proof_output_id, ContractId, FileContract,
    OpenContract, Output, StorageProof,
};

impl StateInner {
    /// Start enforcing a newly created contract.
    pub(crate) fn open_new_contract(
        &mut self,
        contract: FileContract,
        id: ContractId,
        diffs: &mut DiffSet,
    ) {
        let open = OpenContract {
            funds_remaining: contract.contract_fund,
            contract_id: id,
            file_contract: contract,
            failures: 0,
            window_satisfied: false,
        };
        self.open_contracts.insert(id, open.clone());
        diffs.contracts.push(ContractDiff::Opened { id, contract: open });
    }

    /// Remove a contract created by a transaction being inverted. Windows
    /// cannot have advanced yet (contracts start strictly after their
    /// creating block), so removal at creation state is exact.
    pub(crate) fn unwind_new_contract(&mut self, id: ContractId, diffs: &mut DiffSet) {
        let open = self
            .open_contracts
            .remove(&id)
            .expect("inverting a transaction whose contract is open");
        debug_assert_eq!(open.failures, 0);
        diffs.contracts.push(ContractDiff::Closed { id, contract: open });
    }

    /// Credit a valid storage proof: pay the window's payout (clamped to
    /// the escrow) and mark the window satisfied.
    pub(crate) fn apply_storage_proof(&mut self, proof: &StorageProof, diffs: &mut DiffSet) {
        let height = self.tip_height();
        let open = self
            .open_contracts
            .get_mut(&proof.contract_id)
            .expect("validated proof references an open contract");
        let window = open
            .file_contract
            .window_index(height)
            .expect("validated proof height is inside the contract span");

        let payout = open.file_contract.valid_proof_payout.min(open.funds_remaining);
        let id = storage_proof_output_id(open.contract_id, window, true);
        let output = Output {
            value: payout,
            spend_hash: open.file_contract.valid_proof_address,
        };
        open.window_satisfied = true;
        open.funds_remaining -= payout;
        self.unspent_outputs.insert(id, output);
        diffs.outputs.push(OutputDiff::Created { id, output });
    }

    /// Exact inverse of [`Self::apply_storage_proof`], run while the block
    /// carrying the proof is still the tip.
    pub(crate) fn invert_storage_proof(&mut self, proof: &StorageProof, diffs: &mut DiffSet) {
        let height = self.tip_height();
        let open = self
            .open_contracts
            .get_mut(&proof.contract_id)
            .expect("inverted proof references an open contract");
        let window = open
            .file_contract
            .window_index(height)
            .expect("inverted proof height is inside the contract span");

        let id = storage_proof_output_id(open.contract_id, window, true);
        let output = self
            .unspent_outputs
            .remove(&id)
            .expect("proof payout still unspent during inversion");
        open.funds_remaining += output.value;
        open.window_satisfied = false;
        diffs.outputs.push(OutputDiff::Removed { id, output });
    }

    /// Scan every open contract after a block's transactions applied:
    /// close out missed windows, re-arm or terminate, and record the
    /// passive effects on the block node for exact rewind.
    pub(crate) fn apply_contract_maintenance(&mut self, idx: NodeIdx, diffs: &mut DiffSet) {
        let height = self.tree.get(idx).height;
        debug_assert!(
            self.tree.get(idx).missed_proofs.is_empty()
                && self.tree.get(idx).terminations.is_empty()
                && self.tree.get(idx).reset_windows.is_empty(),
            "maintenance records not drained by a prior inversion"
        );

        let mut missed = Vec::new();
        let mut resets = Vec::new();
        let mut terminations = Vec::new();

        // Deterministic order: contract IDs ascending.
        let mut ids: Vec<ContractId> = self.open_contracts.keys().copied().collect();
        ids.sort();

        for id in ids {
            let open = self.open_contracts.get_mut(&id).expect("listed contract");
            let contract = open.file_contract.clone();

            // A window boundary: the window ending at this height closed.
            if height > contract.start
                && (height - contract.start) % contract.challenge_window == 0
            {
                if open.window_satisfied {
                    resets.push(id);
                } else {
                    let payout = contract.missed_proof_payout.min(open.funds_remaining);
                    let closed_window =
                        (height - contract.start) / contract.challenge_window - 1;
                    let output_id = storage_proof_output_id(id, closed_window, false);
                    let output = Output {
                        value: payout,
                        spend_hash: contract.missed_proof_address,
                    };
                    open.funds_remaining -= payout;
                    open.failures += 1;
                    self.unspent_outputs.insert(output_id, output);
                    diffs.outputs.push(OutputDiff::Created {
                        id: output_id,
                        output,
                    });
                    missed.push(MissedStorageProof {
                        output_id,
                        contract_id: id,
                    });
                }
                open.window_satisfied = false;
            }

            // Expiry: out of funds, out of time, or out of patience.
            if open.funds_remaining == 0
                || height == contract.end
                || open.failures == contract.tolerance
            {
                let success = open.failures != contract.tolerance;
                if open.funds_remaining > 0 {
                    let output_id = contract_termination_output_id(id, success);
                    let output = Output {
                        value: open.funds_remaining,
                        spend_hash: if success {
                            contract.valid_proof_address
                        } else {
                            contract.missed_proof_address
                        },
                    };
                    self.unspent_outputs.insert(output_id, output);
                    diffs.outputs.push(OutputDiff::Created {
                        id: output_id,
                        output,
                    });
                }
                let snapshot = self
                    .open_contracts
                    .remove(&id)
                    .expect("terminating contract is open");
                diffs.contracts.push(ContractDiff::Closed {
                    id,
                    contract: snapshot.clone(),
                });
                terminations.push(snapshot);
            }
        }

        let node = self.tree.get_mut(idx);
        node.missed_proofs = missed;
        node.reset_windows = resets;
        node.terminations = terminations;
    }

    /// Undo a block's passive contract effects, draining the records off
    /// its node. Runs before transaction inversion so contracts are open
    /// again when their proofs invert.
    pub(crate) fn invert_contract_maintenance(&mut self, idx: NodeIdx, diffs: &mut DiffSet) {
        let node = self.tree.get_mut(idx);
        let missed = std::mem::take(&mut node.missed_proofs);
        let resets = std::mem::take(&mut node.reset_windows);
        let terminations = std::mem::take(&mut node.terminations);

        // Reopen terminated contracts at their final recorded state.
        for snapshot in terminations.into_iter().rev() {
            let id = snapshot.contract_id;
            if snapshot.funds_remaining > 0 {
                let success = snapshot.failures != snapshot.file_contract.tolerance;
                let output_id = contract_termination_output_id(id, success);
                let output = self
                    .unspent_outputs
                    .remove(&output_id)
                    .expect("termination payout still unspent during inversion");
                diffs.outputs.push(OutputDiff::Removed {
                    id: output_id,
                    output,
                });
            }
            diffs.contracts.push(ContractDiff::Opened {
                id,
                contract: snapshot.clone(),
            });
            self.open_contracts.insert(id, snapshot);
        }

        // Take back missed-window payouts and their failure counts.
        for record in missed.into_iter().rev() {
            let output = self
                .unspent_outputs
                .remove(&record.output_id)
                .expect("missed payout still unspent during inversion");
            let open = self
                .open_contracts
                .get_mut(&record.contract_id)
                .expect("contract reopened before its missed proofs invert");
            open.funds_remaining += output.value;
            open.failures -= 1;
            open.window_satisfied = false;
            diffs.outputs.push(OutputDiff::Removed {
                id: record.output_id,
                output,
            });
        }

        // Windows that had been satisfied get their flag back.
        for id in resets.into_iter().rev() {
            self.open_contracts
                .get_mut(&id)
                .expect("reset contract is open")
                .window_satisfied = true;
        }
    }
}
