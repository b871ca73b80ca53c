//! File contracts and storage proofs.
//!
//! A file contract escrows funds against periodic proofs that a host still
//! holds a file. The chain challenges one 64-byte segment per window; the
//! host answers with the segment and a Merkle branch to the committed root.

use crate::encoding::{CodecResult, Decode, Encode, Reader};
use crate::hash::{hash_all, CoinAddress, ContractId, Hash256, OutputId};
use crate::{BlockHeight, Currency};
use std::fmt;

/// Bytes per proof segment.
pub const SEGMENT_SIZE: usize = 64;

/// One file segment, the unit a storage proof reveals.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Segment(pub [u8; SEGMENT_SIZE]);

impl fmt::Debug for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Segment({})", hex::encode(&self.0[..8]))
    }
}

impl Encode for Segment {
    fn encode_into(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(&self.0);
    }
}

impl Decode for Segment {
    fn decode_from(r: &mut Reader<'_>) -> CodecResult<Self> {
        let bytes = r.take(SEGMENT_SIZE)?;
        Ok(Segment(bytes.try_into().expect("segment bytes")))
    }
}

/// The terms of a storage agreement.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FileContract {
    /// Total escrow the contract locks up.
    pub contract_fund: Currency,
    /// Merkle root of the stored file's segments.
    pub file_merkle_root: Hash256,
    /// Size of the stored file in bytes.
    pub file_size: u64,
    /// First height of the first challenge window.
    pub start: BlockHeight,
    /// Height at which the contract expires.
    pub end: BlockHeight,
    /// Blocks per challenge window.
    pub challenge_window: BlockHeight,
    /// Missed proofs allowed before the contract fails outright.
    pub tolerance: u64,
    /// Paid out each window a proof arrives.
    pub valid_proof_payout: Currency,
    pub valid_proof_address: CoinAddress,
    /// Paid out each window a proof does not arrive.
    pub missed_proof_payout: Currency,
    pub missed_proof_address: CoinAddress,
}

impl FileContract {
    /// The challenge window that `height` falls in, starting from zero.
    /// `None` outside `[start, end)`.
    pub fn window_index(&self, height: BlockHeight) -> Option<BlockHeight> {
        if height < self.start || height >= self.end || self.challenge_window == 0 {
            return None;
        }
        Some((height - self.start) / self.challenge_window)
    }

    /// Number of segments in the committed file.
    pub fn segment_count(&self) -> u64 {
        crate::merkle::segment_count(self.file_size)
    }
}

/// Deterministic ID of the payout created for one challenge window.
pub fn storage_proof_output_id(
    contract_id: ContractId,
    window_index: BlockHeight,
    proof_valid: bool,
) -> OutputId {
    let tag: &[u8] = if proof_valid {
        b"valid proof"
    } else {
        b"missed proof"
    };
    OutputId(hash_all(&[
        contract_id.as_bytes(),
        tag,
        &window_index.to_le_bytes(),
    ]))
}

/// Deterministic ID of the payout created when a contract closes with funds
/// left over.
pub fn contract_termination_output_id(contract_id: ContractId, success: bool) -> OutputId {
    let tag: &[u8] = if success {
        b"contract success"
    } else {
        b"contract failure"
    };
    OutputId(hash_all(&[contract_id.as_bytes(), tag]))
}

/// A Merkle-branch demonstration that a host holds one segment of a file
/// under contract.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StorageProof {
    pub contract_id: ContractId,
    /// The challenged segment's bytes.
    pub segment: Segment,
    /// Sibling hashes from the segment up to the committed root.
    pub hash_set: Vec<Hash256>,
}

/// A contract the chain is still enforcing, with the bookkeeping needed to
/// enforce it without replaying history.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OpenContract {
    pub file_contract: FileContract,
    pub contract_id: ContractId,
    /// Escrow not yet disbursed.
    pub funds_remaining: Currency,
    /// Windows missed so far.
    pub failures: u64,
    /// Whether a proof has already landed in the current window.
    pub window_satisfied: bool,
}

impl Encode for FileContract {
    fn encode_into(&self, buf: &mut Vec<u8>) {
        self.contract_fund.encode_into(buf);
        self.file_merkle_root.encode_into(buf);
        self.file_size.encode_into(buf);
        self.start.encode_into(buf);
        self.end.encode_into(buf);
        self.challenge_window.encode_into(buf);
        self.tolerance.encode_into(buf);
        self.valid_proof_payout.encode_into(buf);
        self.valid_proof_address.encode_into(buf);
        self.missed_proof_payout.encode_into(buf);
        self.missed_proof_address.encode_into(buf);
    }
}

impl Decode for FileContract {
    fn decode_from(r: &mut Reader<'_>) -> CodecResult<Self> {
        Ok(FileContract {
            contract_fund: Currency::decode_from(r)?,
            file_merkle_root: Hash256::decode_from(r)?,
            file_size: u64::decode_from(r)?,
            start: BlockHeight::decode_from(r)?,
            end: BlockHeight::decode_from(r)?,
            challenge_window: BlockHeight::decode_from(r)?,
            tolerance: u64::decode_from(r)?,
            valid_proof_payout: Currency::decode_from(r)?,
            valid_proof_address: CoinAddress::decode_from(r)?,
            missed_proof_payout: Currency::decode_from(r)?,
            missed_proof_address: CoinAddress::decode_from(r)?,
        })
    }
}

impl Encode for StorageProof {
    fn encode_into(&self, buf: &mut Vec<u8>) {
        self.contract_id.encode_into(buf);
        self.segment.encode_into(buf);
        self.hash_set.encode_into(buf);
    }
}

impl Decode for StorageProof {
    fn decode_from(r: &mut Reader<'_>) -> CodecResult<Self> {
        Ok(StorageProof {
            contract_id: ContractId::decode_from(r)?,
            segment: Segment::decode_from(r)?,
            hash_set: Vec::<Hash256>::decode_from(r)?,
        })
    }
}

impl Encode for OpenContract {
    fn encode_into(&self, buf: &mut Vec<u8>) {
        self.file_contract.encode_into(buf);
        self.contract_id.encode_into(buf);
        self.funds_remaining.encode_into(buf);
        self.failures.encode_into(buf);
        self.window_satisfied.encode_into(buf);
    }
}
