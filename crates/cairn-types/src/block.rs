//! Blocks and block identity.

use crate::encoding::{CodecResult, Decode, Encode, Reader};
use crate::hash::{hash_all, hash_object, BlockId, CoinAddress, Hash256, OutputId};
use crate::merkle::merkle_root;
use crate::target::Target;
use crate::transaction::Transaction;
use crate::Timestamp;

/// A block. Its ID is the hash of the header fields only; the Merkle root
/// commits to the transaction list.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Block {
    pub parent_id: BlockId,
    /// Ground until the ID meets the target.
    pub nonce: u64,
    pub timestamp: Timestamp,
    /// Where the subsidy for this block is paid.
    pub miner_address: CoinAddress,
    /// Merkle root over the transaction list.
    pub merkle_root: Hash256,
    pub transactions: Vec<Transaction>,
}

impl Block {
    /// The block ID: a hash of the header fields, excluding transactions.
    pub fn id(&self) -> BlockId {
        BlockId(hash_all(&[
            self.parent_id.as_bytes(),
            &self.nonce.to_le_bytes(),
            &self.timestamp.to_le_bytes(),
            self.miner_address.as_bytes(),
            self.merkle_root.as_bytes(),
        ]))
    }

    /// ID of the subsidy output this block creates for its miner.
    pub fn subsidy_id(&self) -> OutputId {
        OutputId(hash_all(&[self.id().as_bytes(), b"block subsidy"]))
    }

    /// Recompute the Merkle root over the carried transactions.
    pub fn transaction_merkle_root(&self) -> Hash256 {
        let leaves: Vec<Hash256> = self.transactions.iter().map(hash_object).collect();
        merkle_root(&leaves)
    }

    /// Whether this block's ID satisfies `target`.
    pub fn meets_target(&self, target: Target) -> bool {
        target.is_met_by(self.id().0)
    }
}

impl Encode for Block {
    fn encode_into(&self, buf: &mut Vec<u8>) {
        self.parent_id.encode_into(buf);
        self.nonce.encode_into(buf);
        self.timestamp.encode_into(buf);
        self.miner_address.encode_into(buf);
        self.merkle_root.encode_into(buf);
        self.transactions.encode_into(buf);
    }
}

impl Decode for Block {
    fn decode_from(r: &mut Reader<'_>) -> CodecResult<Self> {
        Ok(Block {
            parent_id: BlockId::decode_from(r)?,
            nonce: u64::decode_from(r)?,
            timestamp: Timestamp::decode_from(r)?,
            miner_address: CoinAddress::decode_from(r)?,
            merkle_root: Hash256::decode_from(r)?,
            transactions: Vec::<Transaction>::decode_from(r)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::hash_bytes;

    fn block() -> Block {
        Block {
            parent_id: BlockId(hash_bytes(b"parent")),
            nonce: 42,
            timestamp: 1_417_070_299,
            miner_address: hash_bytes(b"miner"),
            merkle_root: Hash256::ZERO,
            transactions: vec![],
        }
    }

    #[test]
    fn id_excludes_transactions() {
        let b = block();
        let mut with_tx = b.clone();
        with_tx.transactions.push(Transaction::default());
        // Same header fields, same ID, even though the bodies differ.
        assert_eq!(b.id(), with_tx.id());
    }

    #[test]
    fn id_covers_every_header_field() {
        let base = block();
        let mut nonce = base.clone();
        nonce.nonce += 1;
        let mut ts = base.clone();
        ts.timestamp += 1;
        let mut addr = base.clone();
        addr.miner_address = hash_bytes(b"other");
        let mut root = base.clone();
        root.merkle_root = hash_bytes(b"root");
        for other in [&nonce, &ts, &addr, &root] {
            assert_ne!(base.id(), other.id());
        }
    }

    #[test]
    fn empty_merkle_root_is_zero() {
        assert_eq!(block().transaction_merkle_root(), Hash256::ZERO);
    }

    #[test]
    fn codec_round_trip() {
        let b = block();
        assert_eq!(Block::decode(&b.encode()).unwrap(), b);
    }
}
