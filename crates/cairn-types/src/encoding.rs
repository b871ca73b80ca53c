//! Canonical binary encoding.
//!
//! The codec is the definition of object identity: block and transaction IDs
//! are hashes of these bytes, so every implementation must produce identical
//! output. The rules are small:
//!
//! - fixed-width integers are little-endian
//! - variable-length sequences carry an 8-byte little-endian length prefix
//! - a struct is the concatenation of its fields in declaration order

use thiserror::Error;

/// Decoding errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// Ran out of bytes mid-object.
    #[error("unexpected end of input: wanted {wanted} bytes, {remaining} remaining")]
    UnexpectedEnd { wanted: usize, remaining: usize },

    /// Input continued past the end of the decoded object.
    #[error("{0} trailing bytes after decoded object")]
    TrailingBytes(usize),

    /// A sequence length prefix larger than the remaining input.
    #[error("sequence length {0} exceeds remaining input")]
    LengthOverflow(u64),

    /// A byte that is not a valid encoding of the expected value.
    #[error("invalid byte {byte:#04x} for {expected}")]
    InvalidByte { byte: u8, expected: &'static str },
}

/// Result type for decoding.
pub type CodecResult<T> = Result<T, CodecError>;

/// Types with a canonical binary form.
pub trait Encode {
    /// Append the canonical encoding of `self` to `buf`.
    fn encode_into(&self, buf: &mut Vec<u8>);

    /// The canonical encoding of `self` as a fresh buffer.
    fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        self.encode_into(&mut buf);
        buf
    }
}

/// Types that can be rebuilt from their canonical binary form.
pub trait Decode: Sized {
    /// Decode one object from the reader, leaving the cursor after it.
    fn decode_from(r: &mut Reader<'_>) -> CodecResult<Self>;

    /// Decode an object that must span the entire input.
    fn decode(bytes: &[u8]) -> CodecResult<Self> {
        let mut r = Reader::new(bytes);
        let value = Self::decode_from(&mut r)?;
        if !r.is_empty() {
            return Err(CodecError::TrailingBytes(r.remaining()));
        }
        Ok(value)
    }
}

/// A cursor over undecoded input.
pub struct Reader<'a> {
    buf: &'a [u8],
}

impl<'a> Reader<'a> {
    /// Wrap a byte slice.
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf }
    }

    /// Number of bytes not yet consumed.
    pub fn remaining(&self) -> usize {
        self.buf.len()
    }

    /// True when all input has been consumed.
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Consume exactly `n` bytes.
    pub fn take(&mut self, n: usize) -> CodecResult<&'a [u8]> {
        if self.buf.len() < n {
            return Err(CodecError::UnexpectedEnd {
                wanted: n,
                remaining: self.buf.len(),
            });
        }
        let (head, tail) = self.buf.split_at(n);
        self.buf = tail;
        Ok(head)
    }

    /// Consume a little-endian u64.
    pub fn take_u64(&mut self) -> CodecResult<u64> {
        let bytes = self.take(8)?;
        Ok(u64::from_le_bytes(bytes.try_into().expect("8 bytes")))
    }

    /// Consume a 32-byte array.
    pub fn take_array_32(&mut self) -> CodecResult<[u8; 32]> {
        let bytes = self.take(32)?;
        Ok(bytes.try_into().expect("32 bytes"))
    }

    /// Consume a sequence length prefix, bounded by the remaining input so a
    /// corrupt prefix cannot drive allocation.
    pub fn take_len(&mut self) -> CodecResult<usize> {
        let len = self.take_u64()?;
        if len > self.remaining() as u64 {
            return Err(CodecError::LengthOverflow(len));
        }
        Ok(len as usize)
    }
}

impl Encode for u64 {
    fn encode_into(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(&self.to_le_bytes());
    }
}

impl Decode for u64 {
    fn decode_from(r: &mut Reader<'_>) -> CodecResult<Self> {
        r.take_u64()
    }
}

impl Encode for bool {
    fn encode_into(&self, buf: &mut Vec<u8>) {
        buf.push(u8::from(*self));
    }
}

impl Decode for bool {
    fn decode_from(r: &mut Reader<'_>) -> CodecResult<Self> {
        match r.take(1)?[0] {
            0 => Ok(false),
            1 => Ok(true),
            byte => Err(CodecError::InvalidByte {
                byte,
                expected: "bool",
            }),
        }
    }
}

impl<T: Encode> Encode for Vec<T> {
    fn encode_into(&self, buf: &mut Vec<u8>) {
        (self.len() as u64).encode_into(buf);
        for item in self {
            item.encode_into(buf);
        }
    }
}

impl<T: Decode> Decode for Vec<T> {
    fn decode_from(r: &mut Reader<'_>) -> CodecResult<Self> {
        let len = r.take_len()?;
        let mut items = Vec::with_capacity(len);
        for _ in 0..len {
            items.push(T::decode_from(r)?);
        }
        Ok(items)
    }
}
