//! Test data generators: keys, spends, contracts, files, and proofs.

use cairn_types::{
    build_segment_proof, hash_all, hash_bytes, merkle_root, BlockHeight, BlockId, CoinAddress,
    ContractId, Currency, FileContract, Hash256, Input, Keypair, Output, OutputId, Segment,
    SignatureBytes, SpendConditions, StorageProof, Transaction, TransactionSignature,
    SEGMENT_SIZE,
};

/// A deterministic keypair for a test seed.
pub fn keypair(seed: u8) -> Keypair {
    Keypair::from_seed([seed; 32])
}

/// Single-signature spend conditions for a keypair.
pub fn single_sig(kp: &Keypair) -> SpendConditions {
    SpendConditions {
        timelock: 0,
        num_signatures: 1,
        public_keys: vec![kp.public_key()],
    }
}

/// The address of a keypair's single-signature conditions.
pub fn address(kp: &Keypair) -> CoinAddress {
    single_sig(kp).coin_address()
}

/// An arbitrary address nothing can spend.
pub fn burn_address(tag: u8) -> CoinAddress {
    hash_bytes(&[0xAD, tag])
}

/// Sign every input of `t` with `kp` (key index 0), replacing any existing
/// signatures.
pub fn sign_all(t: &mut Transaction, kp: &Keypair) {
    t.signatures = t
        .inputs
        .iter()
        .map(|input| TransactionSignature {
            input_id: input.output_id,
            public_key_index: 0,
            timelock: 0,
            signature: SignatureBytes::zero(),
        })
        .collect();
    for i in 0..t.signatures.len() {
        let sig_hash = t.sig_hash(i);
        t.signatures[i].signature = kp.sign(sig_hash.as_bytes());
    }
}

/// A signed transaction spending one output owned by `kp`: `amount` to
/// `dest`, `fee` to the miner, change back to the sender.
pub fn transfer(
    kp: &Keypair,
    source: OutputId,
    source_value: Currency,
    dest: CoinAddress,
    amount: Currency,
    fee: Currency,
) -> Transaction {
    let change = source_value - amount - fee;
    let mut outputs = vec![Output {
        value: amount,
        spend_hash: dest,
    }];
    if change > 0 {
        outputs.push(Output {
            value: change,
            spend_hash: address(kp),
        });
    }
    let mut t = Transaction {
        inputs: vec![Input {
            output_id: source,
            spend_conditions: single_sig(kp),
        }],
        outputs,
        miner_fees: if fee > 0 { vec![fee] } else { vec![] },
        ..Transaction::default()
    };
    sign_all(&mut t, kp);
    t
}

/// A file small enough to test against, segment by segment.
pub struct TestFile {
    pub segments: Vec<Segment>,
    pub leaf_hashes: Vec<Hash256>,
    pub root: Hash256,
    pub size: u64,
}

/// Build an in-memory file of `segment_count` distinct segments.
pub fn test_file(segment_count: u64) -> TestFile {
    let segments: Vec<Segment> = (0..segment_count)
        .map(|i| {
            let mut bytes = [0u8; SEGMENT_SIZE];
            bytes[0] = i as u8;
            bytes[1] = 0x5E;
            Segment(bytes)
        })
        .collect();
    let leaf_hashes: Vec<Hash256> = segments.iter().map(|s| hash_bytes(&s.0)).collect();
    TestFile {
        root: merkle_root(&leaf_hashes),
        size: segment_count * SEGMENT_SIZE as u64,
        segments,
        leaf_hashes,
    }
}

/// A contract covering `file`, funded with `fund`, challenged every
/// `challenge_window` blocks over `[start, end)`.
pub fn contract_for(
    file: &TestFile,
    fund: Currency,
    start: BlockHeight,
    end: BlockHeight,
    challenge_window: BlockHeight,
    tolerance: u64,
    payout: Currency,
    valid_address: CoinAddress,
    missed_address: CoinAddress,
) -> FileContract {
    FileContract {
        contract_fund: fund,
        file_merkle_root: file.root,
        file_size: file.size,
        start,
        end,
        challenge_window,
        tolerance,
        valid_proof_payout: payout,
        valid_proof_address: valid_address,
        missed_proof_payout: payout,
        missed_proof_address: missed_address,
    }
}

/// A signed transaction that funds `contract` out of `source` and pays
/// the rest back to the sender.
pub fn contract_transaction(
    kp: &Keypair,
    source: OutputId,
    source_value: Currency,
    contract: FileContract,
) -> Transaction {
    let change = source_value - contract.contract_fund;
    let mut outputs = Vec::new();
    if change > 0 {
        outputs.push(Output {
            value: change,
            spend_hash: address(kp),
        });
    }
    let mut t = Transaction {
        inputs: vec![Input {
            output_id: source,
            spend_conditions: single_sig(kp),
        }],
        outputs,
        file_contracts: vec![contract],
        ..Transaction::default()
    };
    sign_all(&mut t, kp);
    t
}

/// The storage proof for `contract` as challenged at `proof_height`, built
/// from the full file. `trigger_id` is the active-chain block at
/// `start + window_index * challenge_window - 1`.
pub fn storage_proof_for(
    file: &TestFile,
    contract_id: ContractId,
    contract: &FileContract,
    proof_height: BlockHeight,
    trigger_id: BlockId,
) -> StorageProof {
    debug_assert!(contract.window_index(proof_height).is_some());
    let seed = hash_all(&[trigger_id.as_bytes(), contract_id.as_bytes()]);
    let index = seed_mod(seed, file.segments.len() as u64);
    StorageProof {
        contract_id,
        segment: file.segments[index as usize],
        hash_set: build_segment_proof(&file.leaf_hashes, index),
    }
}

/// 256-bit big-endian seed reduced modulo the segment count, digit by
/// digit — the same reduction consensus performs.
fn seed_mod(seed: Hash256, segments: u64) -> u64 {
    let mut rem: u128 = 0;
    for byte in seed.0 {
        rem = ((rem << 8) | byte as u128) % segments as u128;
    }
    rem as u64
}
