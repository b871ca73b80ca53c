//! # cairn-types
//!
//! Primitive types for the cairn blockchain.
//!
//! This crate provides:
//! - Currency, timestamp, and height scalars
//! - 32-byte identifiers for blocks, transactions, outputs, and contracts
//! - The canonical little-endian binary codec that defines object identity
//! - BLAKE2b-256 hashing and Merkle roots over the codec
//! - Target (difficulty) arithmetic over 32-byte big-endian integers
//! - The block / transaction / file-contract data model
//! - Thin ed25519 signature wrappers

mod block;
mod contract;
mod crypto;
mod encoding;
mod hash;
mod merkle;
mod target;
mod transaction;

pub use block::Block;
pub use contract::{
    contract_termination_output_id, storage_proof_output_id, FileContract, OpenContract,
    StorageProof, Segment, SEGMENT_SIZE,
};
pub use crypto::{verify_bytes, Keypair, PublicKey, SignatureBytes};
pub use encoding::{CodecError, CodecResult, Decode, Encode, Reader};
pub use hash::{hash_all, hash_bytes, hash_object, BlockId, CoinAddress, ContractId, Hash256,
    OutputId, TransactionId};
pub use merkle::{build_segment_proof, merkle_root, segment_count, verify_segment_proof};
pub use target::Target;
pub use transaction::{Input, Output, SpendConditions, Transaction, TransactionSignature};

/// A quantity of coins.
pub type Currency = u64;

/// Seconds since the UNIX epoch.
pub type Timestamp = u64;

/// A position in the chain, genesis at zero.
pub type BlockHeight = u64;
