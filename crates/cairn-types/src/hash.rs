//! BLAKE2b-256 hashing and the 32-byte identifier types derived from it.

use crate::encoding::{CodecResult, Decode, Encode, Reader};
use blake2::digest::consts::U32;
use blake2::{Blake2b, Digest};
use serde::{Deserialize, Serialize};
use std::fmt;

type Blake2b256 = Blake2b<U32>;

/// A 256-bit BLAKE2b digest.
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Hash256(pub [u8; 32]);

impl Hash256 {
    /// The all-zero digest.
    pub const ZERO: Hash256 = Hash256([0u8; 32]);

    /// View as a byte slice.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for Hash256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Hash256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl Encode for Hash256 {
    fn encode_into(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(&self.0);
    }
}

impl Decode for Hash256 {
    fn decode_from(r: &mut Reader<'_>) -> CodecResult<Self> {
        Ok(Hash256(r.take_array_32()?))
    }
}

/// Hash a byte slice.
pub fn hash_bytes(bytes: &[u8]) -> Hash256 {
    let mut hasher = Blake2b256::new();
    hasher.update(bytes);
    Hash256(hasher.finalize().into())
}

/// Hash the concatenation of several byte slices.
pub fn hash_all(parts: &[&[u8]]) -> Hash256 {
    let mut hasher = Blake2b256::new();
    for part in parts {
        hasher.update(part);
    }
    Hash256(hasher.finalize().into())
}

/// Hash an object's canonical encoding.
pub fn hash_object<T: Encode>(obj: &T) -> Hash256 {
    hash_bytes(&obj.encode())
}

/// The hash of a spend-conditions object. Doubles as a payment address: an
/// output commits to the conditions that may spend it by carrying this hash.
pub type CoinAddress = Hash256;

macro_rules! id_type {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(
            Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        pub struct $name(pub Hash256);

        impl $name {
            /// View as a byte slice.
            pub fn as_bytes(&self) -> &[u8] {
                self.0.as_bytes()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl Encode for $name {
            fn encode_into(&self, buf: &mut Vec<u8>) {
                self.0.encode_into(buf);
            }
        }

        impl Decode for $name {
            fn decode_from(r: &mut Reader<'_>) -> CodecResult<Self> {
                Ok($name(Hash256::decode_from(r)?))
            }
        }
    };
}

id_type!(
    /// Identifies a block: the hash of its header fields.
    BlockId
);
id_type!(
    /// Identifies a transaction: the hash of its canonical encoding.
    TransactionId
);
id_type!(
    /// Identifies an output, derived from its producing transaction or block.
    OutputId
);
id_type!(
    /// Identifies a file contract, derived from its creating transaction.
    ContractId
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digest_is_stable() {
        // BLAKE2b-256 of the empty input, fixed by the algorithm.
        assert_eq!(
            hash_bytes(b"").to_string(),
            "0e5751c026e543b2e8ab2eb06099daa1d1e5df47778f7787faab45cdf12fe3a8"
        );
    }

    #[test]
    fn hash_all_matches_concatenation() {
        assert_eq!(hash_all(&[b"ab", b"cd"]), hash_bytes(b"abcd"));
    }

    #[test]
    fn ids_display_as_hex() {
        let id = BlockId(hash_bytes(b"x"));
        assert_eq!(id.to_string().len(), 64);
    }
}
