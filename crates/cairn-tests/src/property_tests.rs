//! Property-based tests for the codec, hashing, and consensus arithmetic.

use cairn_consensus::{median_timestamp, ChainParams};
use cairn_types::{
    build_segment_proof, hash_bytes, merkle_root, verify_segment_proof, Block, BlockId, Decode,
    Encode, FileContract, Hash256, Input, Output, OutputId, PublicKey, Segment, SignatureBytes,
    SpendConditions, StorageProof, Target, Transaction, TransactionSignature, SEGMENT_SIZE,
};
use num_bigint::BigUint;
use proptest::prelude::*;

// ============ Strategies ============

fn arb_hash() -> impl Strategy<Value = Hash256> {
    prop::array::uniform32(any::<u8>()).prop_map(Hash256)
}

fn arb_output() -> impl Strategy<Value = Output> {
    (any::<u64>(), arb_hash()).prop_map(|(value, spend_hash)| Output { value, spend_hash })
}

fn arb_spend_conditions() -> impl Strategy<Value = SpendConditions> {
    (
        any::<u64>(),
        0u64..4,
        prop::collection::vec(prop::array::uniform32(any::<u8>()).prop_map(PublicKey), 0..4),
    )
        .prop_map(|(timelock, num_signatures, public_keys)| SpendConditions {
            timelock,
            num_signatures,
            public_keys,
        })
}

fn arb_input() -> impl Strategy<Value = Input> {
    (arb_hash(), arb_spend_conditions()).prop_map(|(id, spend_conditions)| Input {
        output_id: OutputId(id),
        spend_conditions,
    })
}

fn arb_signature() -> impl Strategy<Value = TransactionSignature> {
    (
        arb_hash(),
        any::<u64>(),
        any::<u64>(),
        prop::collection::vec(any::<u8>(), 64),
    )
        .prop_map(|(id, public_key_index, timelock, bytes)| TransactionSignature {
            input_id: OutputId(id),
            public_key_index,
            timelock,
            signature: SignatureBytes(bytes.try_into().expect("64 bytes")),
        })
}

fn arb_contract() -> impl Strategy<Value = FileContract> {
    (
        any::<u64>(),
        arb_hash(),
        1u64..1_000_000,
        (1u64..1000, 1u64..1000, 1u64..50),
        any::<u64>(),
        (any::<u64>(), arb_hash()),
        (any::<u64>(), arb_hash()),
    )
        .prop_map(
            |(fund, root, size, (start, len, window), tolerance, valid, missed)| FileContract {
                contract_fund: fund,
                file_merkle_root: root,
                file_size: size,
                start,
                end: start + len,
                challenge_window: window,
                tolerance,
                valid_proof_payout: valid.0,
                valid_proof_address: valid.1,
                missed_proof_payout: missed.0,
                missed_proof_address: missed.1,
            },
        )
}

fn arb_storage_proof() -> impl Strategy<Value = StorageProof> {
    (
        arb_hash(),
        prop::collection::vec(any::<u8>(), SEGMENT_SIZE),
        prop::collection::vec(arb_hash(), 0..8),
    )
        .prop_map(|(id, segment, hash_set)| StorageProof {
            contract_id: cairn_types::ContractId(id),
            segment: Segment(segment.try_into().expect("segment bytes")),
            hash_set,
        })
}

fn arb_transaction() -> impl Strategy<Value = Transaction> {
    (
        prop::collection::vec(arb_input(), 0..3),
        prop::collection::vec(arb_output(), 0..3),
        prop::collection::vec(any::<u64>(), 0..3),
        prop::collection::vec(arb_contract(), 0..2),
        prop::collection::vec(arb_storage_proof(), 0..2),
        prop::collection::vec(arb_signature(), 0..3),
    )
        .prop_map(
            |(inputs, outputs, miner_fees, file_contracts, storage_proofs, signatures)| {
                Transaction {
                    inputs,
                    outputs,
                    miner_fees,
                    file_contracts,
                    storage_proofs,
                    signatures,
                }
            },
        )
}

fn arb_block() -> impl Strategy<Value = Block> {
    (
        arb_hash(),
        any::<u64>(),
        any::<u64>(),
        arb_hash(),
        arb_hash(),
        prop::collection::vec(arb_transaction(), 0..3),
    )
        .prop_map(
            |(parent, nonce, timestamp, miner_address, merkle_root, transactions)| Block {
                parent_id: BlockId(parent),
                nonce,
                timestamp,
                miner_address,
                merkle_root,
                transactions,
            },
        )
}

// ============ Round-Trip Laws ============

proptest! {
    #[test]
    fn transaction_codec_round_trips(t in arb_transaction()) {
        let bytes = t.encode();
        prop_assert_eq!(Transaction::decode(&bytes).unwrap(), t);
    }

    #[test]
    fn block_codec_round_trips(b in arb_block()) {
        let bytes = b.encode();
        prop_assert_eq!(Block::decode(&bytes).unwrap(), b);
    }

    #[test]
    fn encoding_and_ids_are_stable(t in arb_transaction()) {
        prop_assert_eq!(t.encode(), t.encode());
        prop_assert_eq!(t.id(), t.id());
    }

    #[test]
    fn target_int_round_trips(bytes in prop::array::uniform32(any::<u8>())) {
        let target = Target(bytes);
        prop_assert_eq!(Target::from_int(&target.to_int()), target);
    }

    #[test]
    fn block_id_meets_its_own_value_as_target(b in arb_block()) {
        // The target comparison is inclusive, and anything above still
        // passes.
        let id = b.id();
        prop_assert!(Target(id.0 .0).is_met_by(id.0));
        let above = BigUint::from_bytes_be(&id.0 .0) + 1u8;
        prop_assert!(Target::from_int(&above).is_met_by(id.0));
    }
}

// ============ Consensus Arithmetic ============

proptest! {
    #[test]
    fn coinbase_never_dips_below_the_floor(height in any::<u64>()) {
        let params = ChainParams::default();
        let subsidy = params.calculate_coinbase(height);
        prop_assert!(subsidy >= params.minimum_coinbase);
        prop_assert!(subsidy <= params.initial_coinbase);
    }

    #[test]
    fn median_is_permutation_invariant(
        mut window in prop::array::uniform11(any::<u64>()),
        rotation in 0usize..11,
    ) {
        let before = median_timestamp(&window);
        window.rotate_left(rotation);
        prop_assert_eq!(median_timestamp(&window), before);
    }

    #[test]
    fn segment_proofs_verify_only_at_their_index(
        count in 1u64..12,
        pick in any::<u64>(),
    ) {
        let index = pick % count;
        let segments: Vec<Segment> = (0..count)
            .map(|i| {
                let mut bytes = [0u8; SEGMENT_SIZE];
                bytes[..8].copy_from_slice(&i.to_le_bytes());
                Segment(bytes)
            })
            .collect();
        let leaves: Vec<Hash256> = segments.iter().map(|s| hash_bytes(&s.0)).collect();
        let root = merkle_root(&leaves);
        let branch = build_segment_proof(&leaves, index);
        prop_assert!(verify_segment_proof(
            root,
            &segments[index as usize],
            index,
            count,
            &branch
        ));
        if count > 1 {
            let wrong = (index + 1) % count;
            prop_assert!(!verify_segment_proof(
                root,
                &segments[index as usize],
                wrong,
                count,
                &branch
            ));
        }
    }
}
