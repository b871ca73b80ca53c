//! Transaction validation.
//!
//! [`validate_transaction`] is a pure function over a [`StateView`]: it
//! mutates nothing and holds no locks, so the state layer can run it both
//! when a transaction enters the mempool and when a block is replayed onto
//! a fork. Side-effecting application assumes these checks already passed.

use crate::error::{ConsensusError, ConsensusResult};
use cairn_types::{
    hash_all, verify_bytes, BlockHeight, BlockId, ContractId, FileContract, OpenContract, Output,
    OutputId, PublicKey, StorageProof, Transaction,
};
use num_bigint::BigUint;
use std::collections::{HashMap, HashSet};

/// Read-only view of consensus state, as validation needs it.
pub trait StateView {
    /// Height of the active chain's tip.
    fn height(&self) -> BlockHeight;

    /// Look up an unspent output.
    fn unspent_output(&self, id: &OutputId) -> Option<Output>;

    /// Look up an open storage contract.
    fn open_contract(&self, id: &ContractId) -> Option<&OpenContract>;

    /// ID of the active-chain block at a height, if within the chain.
    fn block_id_at_height(&self, height: BlockHeight) -> Option<BlockId>;
}

/// Per-input signature bookkeeping: how many signatures are still owed, and
/// which keys have already been consumed.
struct InputSignatures<'a> {
    remaining: u64,
    possible_keys: &'a [PublicKey],
    used_keys: HashSet<u64>,
}

/// Check one transaction's legality against `view`. Read-only.
pub fn validate_transaction<V: StateView>(view: &V, t: &Transaction) -> ConsensusResult<()> {
    if t.inputs.is_empty() {
        return Err(ConsensusError::NoInputs);
    }
    let height = view.height();

    // Resolve every input, building the signature ledger as we go.
    let mut input_sum: u128 = 0;
    let mut signature_state: HashMap<OutputId, InputSignatures<'_>> = HashMap::new();
    for input in &t.inputs {
        let output = view
            .unspent_output(&input.output_id)
            .ok_or(ConsensusError::UnknownOutput(input.output_id))?;

        if input.spend_conditions.coin_address() != output.spend_hash {
            return Err(ConsensusError::SpendConditionsMismatch(input.output_id));
        }
        if input.spend_conditions.timelock > height {
            return Err(ConsensusError::InputTimelocked {
                output: input.output_id,
                unlocks_at: input.spend_conditions.timelock,
                height,
            });
        }
        if signature_state.contains_key(&input.output_id) {
            return Err(ConsensusError::RepeatedOutput(input.output_id));
        }
        signature_state.insert(
            input.output_id,
            InputSignatures {
                remaining: input.spend_conditions.num_signatures,
                possible_keys: &input.spend_conditions.public_keys,
                used_keys: HashSet::new(),
            },
        );
        input_sum += output.value as u128;
    }

    // Outgoing value: outputs, fees, and contract escrow.
    let mut outgoing: u128 = 0;
    for output in &t.outputs {
        outgoing += output.value as u128;
    }
    for fee in &t.miner_fees {
        outgoing += *fee as u128;
    }
    for contract in &t.file_contracts {
        validate_contract(height, contract)?;
        outgoing += contract.contract_fund as u128;
    }

    for proof in &t.storage_proofs {
        validate_storage_proof(view, proof)?;
    }

    // Strict equality: a surplus burns coins and is as illegal as a deficit.
    if input_sum != outgoing {
        return Err(ConsensusError::Conservation {
            inputs: input_sum,
            outgoing,
        });
    }

    // Walk the signatures, charging each against its input's threshold.
    for (i, sig) in t.signatures.iter().enumerate() {
        let entry = signature_state
            .get_mut(&sig.input_id)
            .ok_or(ConsensusError::UnmatchedSignature(sig.input_id))?;

        if entry.remaining == 0 {
            return Err(ConsensusError::FrivolousSignature(sig.input_id));
        }
        let key = entry
            .possible_keys
            .get(sig.public_key_index as usize)
            .ok_or(ConsensusError::KeyIndexOutOfRange {
                index: sig.public_key_index,
                keys: entry.possible_keys.len(),
            })?;
        if !entry.used_keys.insert(sig.public_key_index) {
            return Err(ConsensusError::KeyReused {
                index: sig.public_key_index,
            });
        }
        if sig.timelock > height {
            return Err(ConsensusError::SignatureTimelocked {
                unlocks_at: sig.timelock,
                height,
            });
        }

        let sig_hash = t.sig_hash(i);
        if !verify_bytes(sig_hash.as_bytes(), key, &sig.signature) {
            return Err(ConsensusError::InvalidSignature);
        }
        entry.remaining -= 1;
    }

    // Every input must have reached its threshold.
    for (output, entry) in &signature_state {
        if entry.remaining != 0 {
            return Err(ConsensusError::MissingSignatures {
                output: *output,
                remaining: entry.remaining,
            });
        }
    }

    Ok(())
}

/// Structural checks on a new file contract.
fn validate_contract(height: BlockHeight, contract: &FileContract) -> ConsensusResult<()> {
    if contract.start <= height {
        return Err(ConsensusError::ContractStartsInPast {
            start: contract.start,
            height,
        });
    }
    if contract.end <= contract.start {
        return Err(ConsensusError::ContractEndsBeforeStart {
            start: contract.start,
            end: contract.end,
        });
    }
    if contract.challenge_window == 0 {
        return Err(ConsensusError::EmptyChallengeWindow);
    }
    if contract.file_size == 0 {
        return Err(ConsensusError::EmptyContractFile);
    }
    Ok(())
}

/// Check a storage proof against its open contract and the chain.
fn validate_storage_proof<V: StateView>(view: &V, proof: &StorageProof) -> ConsensusResult<()> {
    let open = view
        .open_contract(&proof.contract_id)
        .ok_or(ConsensusError::UnknownContract(proof.contract_id))?;

    if open.window_satisfied {
        return Err(ConsensusError::WindowAlreadySatisfied(proof.contract_id));
    }

    let segment_index = storage_proof_segment(view, open)?;
    let ok = cairn_types::verify_segment_proof(
        open.file_contract.file_merkle_root,
        &proof.segment,
        segment_index,
        open.file_contract.segment_count(),
        &proof.hash_set,
    );
    if !ok {
        return Err(ConsensusError::InvalidStorageProof(proof.contract_id));
    }
    Ok(())
}

/// The segment a contract must currently prove.
///
/// The challenge is seeded by the block preceding the current window: its ID
/// hashed with the contract ID, reduced modulo the file's segment count.
pub fn storage_proof_segment<V: StateView>(
    view: &V,
    open: &OpenContract,
) -> ConsensusResult<u64> {
    let height = view.height();
    let contract = &open.file_contract;
    let window_index =
        contract
            .window_index(height)
            .ok_or(ConsensusError::ProofOutsideWindow {
                contract: open.contract_id,
                height,
            })?;

    // `start > 0` is guaranteed by contract validation at creation.
    let trigger_height = contract.start + window_index * contract.challenge_window - 1;
    let trigger_id = view
        .block_id_at_height(trigger_height)
        .ok_or(ConsensusError::MissingTriggerBlock(trigger_height))?;

    let seed = hash_all(&[trigger_id.as_bytes(), open.contract_id.as_bytes()]);
    let segments = contract.segment_count();
    debug_assert!(segments > 0, "validated contracts cover at least one segment");
    let index = BigUint::from_bytes_be(seed.as_bytes()) % BigUint::from(segments);
    Ok(index.try_into().expect("index below segment count"))
}
