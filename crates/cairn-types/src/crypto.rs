//! Thin wrappers over the ed25519 signature scheme.
//!
//! The engine only needs `verify(msg, pubkey, sig) -> bool`; signing lives
//! here as well so wallets and test generators can produce valid spends.

use crate::encoding::{CodecResult, Decode, Encode, Reader};
use ed25519_dalek::{Signature, Signer, SigningKey, VerifyingKey};
use serde::{Deserialize, Serialize};
use std::fmt;

/// An ed25519 public key.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PublicKey(pub [u8; 32]);

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

/// Raw ed25519 signature bytes.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct SignatureBytes(pub [u8; 64]);

impl SignatureBytes {
    /// The all-zero signature, used when hashing a transaction for signing.
    pub fn zero() -> Self {
        SignatureBytes([0u8; 64])
    }
}

impl fmt::Debug for SignatureBytes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

/// Verify a signature over a message. Malformed keys or signatures simply
/// fail verification.
pub fn verify_bytes(msg: &[u8], pubkey: &PublicKey, sig: &SignatureBytes) -> bool {
    let Ok(vk) = VerifyingKey::from_bytes(&pubkey.0) else {
        return false;
    };
    let sig = Signature::from_bytes(&sig.0);
    vk.verify_strict(msg, &sig).is_ok()
}

/// A signing keypair.
pub struct Keypair {
    signing: SigningKey,
}

impl Keypair {
    /// Derive a keypair from a 32-byte seed.
    pub fn from_seed(seed: [u8; 32]) -> Self {
        Self {
            signing: SigningKey::from_bytes(&seed),
        }
    }

    /// The public half.
    pub fn public_key(&self) -> PublicKey {
        PublicKey(self.signing.verifying_key().to_bytes())
    }

    /// Sign a message.
    pub fn sign(&self, msg: &[u8]) -> SignatureBytes {
        SignatureBytes(self.signing.sign(msg).to_bytes())
    }
}

impl Encode for PublicKey {
    fn encode_into(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(&self.0);
    }
}

impl Decode for PublicKey {
    fn decode_from(r: &mut Reader<'_>) -> CodecResult<Self> {
        Ok(PublicKey(r.take_array_32()?))
    }
}

impl Encode for SignatureBytes {
    fn encode_into(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(&self.0);
    }
}

impl Decode for SignatureBytes {
    fn decode_from(r: &mut Reader<'_>) -> CodecResult<Self> {
        let bytes = r.take(64)?;
        Ok(SignatureBytes(bytes.try_into().expect("64 bytes")))
    }
}
