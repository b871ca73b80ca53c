//! Difficulty targets.
//!
//! A target is a 256-bit big-endian unsigned integer; a block ID meets the
//! target when, read as an integer, it is no greater. The weight of a block
//! is `1/target` as an exact rational. Chain depth is stored in the same
//! 32-byte form: the depth value's inverse is the accumulated work, so
//! smaller stored depths mean heavier chains.
//!
//! Arithmetic happens in `BigUint`/`BigRational` and is truncated back into
//! 32 bytes only at rest.

use crate::encoding::{CodecResult, Decode, Encode, Reader};
use crate::hash::Hash256;
use num_bigint::{BigInt, BigUint};
use num_rational::BigRational;
use num_traits::{One, Signed, Zero};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A 256-bit big-endian difficulty target.
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Target(pub [u8; 32]);

impl Target {
    /// The largest representable target (lowest difficulty, also the depth
    /// of an empty chain).
    pub const MAX: Target = Target([0xFF; 32]);

    /// Build from a big integer, saturating at [`Target::MAX`].
    pub fn from_int(n: &BigUint) -> Target {
        let bytes = n.to_bytes_be();
        if bytes.len() > 32 {
            return Target::MAX;
        }
        let mut out = [0u8; 32];
        out[32 - bytes.len()..].copy_from_slice(&bytes);
        Target(out)
    }

    /// The target as a big integer.
    pub fn to_int(&self) -> BigUint {
        BigUint::from_bytes_be(&self.0)
    }

    /// Build from an exact rational, truncating toward zero and clamping to
    /// `[1, Target::MAX]`. The lower clamp keeps `inverse` defined.
    pub fn from_rat(r: &BigRational) -> Target {
        if r.is_negative() || r.is_zero() {
            let mut min = [0u8; 32];
            min[31] = 1;
            return Target(min);
        }
        let floored = r.numer() / r.denom();
        let (_, bytes) = floored.to_bytes_be();
        Target::from_int(&BigUint::from_bytes_be(&bytes))
    }

    /// The weight `1/target` as an exact rational.
    pub fn inverse(&self) -> BigRational {
        let n = self.to_int();
        debug_assert!(!n.is_zero(), "zero target has no weight");
        let n = if n.is_zero() { BigUint::one() } else { n };
        BigRational::new(BigInt::one(), n.into())
    }

    /// Multiply by a rational adjustment, truncating back into 32 bytes.
    pub fn mul_ratio(&self, ratio: &BigRational) -> Target {
        let scaled = BigRational::from_integer(self.to_int().into()) * ratio;
        Target::from_rat(&scaled)
    }

    /// Whether a block ID, read as a 256-bit integer, meets this target.
    /// Big-endian byte order makes the lexicographic comparison numeric.
    pub fn is_met_by(&self, id: Hash256) -> bool {
        id.0 <= self.0
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl Encode for Target {
    fn encode_into(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(&self.0);
    }
}

impl Decode for Target {
    fn decode_from(r: &mut Reader<'_>) -> CodecResult<Self> {
        Ok(Target(r.take_array_32()?))
    }
}
