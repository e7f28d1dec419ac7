//! Schnorr signature key pairs on secp256k1.

use crate::types::address::Address;
use crate::types::encoding::{Decode, DecodeError, Encode, EncodeSink};
use crate::types::serializable_signature::SerializableSignature;
use k256::schnorr::signature::{Signer, Verifier};
use k256::schnorr::{SigningKey, VerifyingKey};
use rand_core::OsRng;
use std::fmt;
use zeroize::Zeroizing;

/// Private key used to sign transactions.
///
/// Never encoded or transmitted.
#[derive(Clone)]
pub struct PrivateKey {
    key: SigningKey,
}

/// Public key with its derived address.
///
/// The address is cached next to the key since every execution and pool
/// lookup needs it.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct PublicKey {
    key: VerifyingKey,
    address: Address,
}

impl PrivateKey {
    /// Generates a new key from OS entropy.
    pub fn new() -> Self {
        Self {
            key: SigningKey::random(&mut OsRng),
        }
    }

    /// Rebuilds a key from its 32-byte scalar.
    ///
    /// Returns `None` if the bytes are not a valid secp256k1 scalar.
    pub fn from_bytes(bytes: &[u8; 32]) -> Option<Self> {
        SigningKey::from_bytes(bytes).ok().map(|key| Self { key })
    }

    /// Raw scalar bytes, wiped from memory on drop.
    pub fn secret_bytes(&self) -> Zeroizing<[u8; 32]> {
        Zeroizing::new(self.key.to_bytes().into())
    }

    pub fn public_key(&self) -> PublicKey {
        PublicKey::from_verifying_key(*self.key.verifying_key())
    }

    pub fn sign(&self, data: &[u8]) -> SerializableSignature {
        SerializableSignature(self.key.sign(data))
    }
}

impl Default for PrivateKey {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PrivateKey({})", self.public_key().address())
    }
}

impl PublicKey {
    fn from_verifying_key(key: VerifyingKey) -> Self {
        Self {
            key,
            address: Address::from_public_key_bytes(&key.to_bytes()),
        }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    /// Returns `true` if `signature` is a valid Schnorr signature of `data`.
    pub fn verify(&self, data: &[u8], signature: &SerializableSignature) -> bool {
        self.key.verify(data, &signature.0).is_ok()
    }
}

impl Encode for PublicKey {
    fn encode<S: EncodeSink>(&self, out: &mut S) {
        out.write(&self.key.to_bytes());
    }
}

impl Decode for PublicKey {
    fn decode(input: &mut &[u8]) -> Result<Self, DecodeError> {
        let bytes = <[u8; 32]>::decode(input)?;
        let key = VerifyingKey::from_bytes(&bytes).map_err(|_| DecodeError::InvalidValue)?;
        Ok(Self::from_verifying_key(key))
    }
}
