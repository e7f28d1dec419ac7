//! 20-byte account addresses.

use crate::types::hash::Hash;
use ledger_derive::BinaryCodec;
use std::fmt;

/// Address length in bytes.
pub const ADDRESS_LEN: usize = 20;

/// Account identifier, the trailing 20 bytes of the SHA3-256 of a public key.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Ord, PartialOrd, BinaryCodec)]
pub struct Address(pub [u8; ADDRESS_LEN]);

impl Address {
    pub const fn zero() -> Self {
        Address([0u8; ADDRESS_LEN])
    }

    /// Derives an address from the raw bytes of a public key.
    pub fn from_public_key_bytes(key: &[u8]) -> Self {
        let digest = Hash::sha3().chain(key).finalize();
        let mut addr = [0u8; ADDRESS_LEN];
        addr.copy_from_slice(&digest.0[HASH_LEN_OFFSET..]);
        Address(addr)
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.0
    }

    /// Key of this address's account record in the state trie.
    pub fn state_key(&self) -> Hash {
        Hash::sha3().chain(b"ACCOUNT").chain(self.0).finalize()
    }
}

const HASH_LEN_OFFSET: usize = crate::types::hash::HASH_LEN - ADDRESS_LEN;

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{:02x}", byte)?;
        }
        Ok(())
    }
}
