//! 32-byte SHA3-256 digests.

use crate::types::encoding::EncodeSink;
use ledger_derive::BinaryCodec;
use sha3::{Digest, Sha3_256};
use std::fmt;

/// Digest length in bytes.
pub const HASH_LEN: usize = 32;

/// Fixed-size 32-byte digest identifying blocks, transactions and state roots.
///
/// `Copy` on purpose: hashes are compared and passed around constantly during
/// sealing and verification and live comfortably on the stack.
#[derive(Clone, Copy, Debug, PartialEq, Eq, BinaryCodec, Default, Hash, Ord, PartialOrd)]
pub struct Hash(pub [u8; HASH_LEN]);

impl Hash {
    /// The all-zero hash, used before a block is sealed and as the genesis parent.
    pub const fn zero() -> Hash {
        Hash([0u8; HASH_LEN])
    }

    /// Builds a hash from a 32-byte slice.
    pub fn from_slice(bytes: &[u8]) -> Option<Hash> {
        let arr: [u8; HASH_LEN] = bytes.try_into().ok()?;
        Some(Hash(arr))
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; HASH_LEN]
    }

    /// Number of leading zero bits, the proof-of-work measure.
    pub fn leading_zero_bits(&self) -> u32 {
        let mut bits = 0;
        for byte in &self.0 {
            if *byte == 0 {
                bits += 8;
                continue;
            }
            bits += byte.leading_zeros();
            break;
        }
        bits
    }

    /// Starts an incremental SHA3-256 computation.
    pub fn sha3() -> HashBuilder {
        HashBuilder::new()
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{:02x}", byte)?;
        }
        Ok(())
    }
}

/// Incremental SHA3-256 builder.
///
/// Doubles as an [`EncodeSink`], so encodable values stream straight into the
/// digest.
pub struct HashBuilder {
    hasher: Sha3_256,
}

impl HashBuilder {
    pub fn new() -> Self {
        Self {
            hasher: Sha3_256::new(),
        }
    }

    pub fn update(&mut self, data: &[u8]) {
        self.hasher.update(data);
    }

    /// Chained form of [`update`](Self::update).
    pub fn chain(mut self, data: impl AsRef<[u8]>) -> Self {
        self.hasher.update(data.as_ref());
        self
    }

    pub fn finalize(self) -> Hash {
        Hash(self.hasher.finalize().into())
    }
}

impl Default for HashBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl EncodeSink for HashBuilder {
    fn write(&mut self, bytes: &[u8]) {
        self.hasher.update(bytes);
    }
}
