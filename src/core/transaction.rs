//! Signed value transfers and their execution against a state trie.

use crate::core::account::AccountError;
use crate::crypto::key_pair::{PrivateKey, PublicKey};
use crate::storage::state::{AccountState, StateError};
use crate::storage::trie::{Trie, TrieError};
use crate::types::address::Address;
use crate::types::encoding::Encode;
use crate::types::hash::Hash;
use crate::types::serializable_signature::SerializableSignature;
use ledger_derive::{BinaryCodec, Error};

/// Reasons a transaction fails verification or execution.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransactionError {
    #[error("invalid transaction signature")]
    InvalidSignature,
    #[error("transaction for chain {actual}, expected {expected}")]
    ChainIdMismatch { expected: u32, actual: u32 },
    #[error("transaction {0} already executed")]
    Duplicate(Hash),
    #[error("invalid nonce: expected {expected}, got {actual}")]
    InvalidNonce { expected: u64, actual: u64 },
    #[error("insufficient balance: have {balance}, need {required}")]
    InsufficientBalance { balance: u128, required: u128 },
    #[error("{0}")]
    Account(AccountError),
    #[error("{0}")]
    State(StateError),
}

impl From<AccountError> for TransactionError {
    fn from(err: AccountError) -> Self {
        TransactionError::Account(err)
    }
}

impl From<StateError> for TransactionError {
    fn from(err: StateError) -> Self {
        TransactionError::State(err)
    }
}

impl From<TrieError> for TransactionError {
    fn from(err: TrieError) -> Self {
        TransactionError::State(StateError::Trie(err))
    }
}

/// A signed native-currency transfer.
#[derive(Debug, Clone, PartialEq, Eq, BinaryCodec)]
pub struct Transaction {
    /// Chain the transaction is bound to.
    pub chain_id: u32,
    /// Sender's public key, also used for signature verification.
    pub from: PublicKey,
    /// Recipient account.
    pub to: Address,
    /// Amount moved from sender to recipient.
    pub value: u128,
    /// Must be exactly one above the sender's current account nonce.
    pub nonce: u64,
    pub timestamp: i64,
    /// Arbitrary payload, committed to by the hash.
    pub data: Vec<u8>,
    /// Schnorr signature over [`Transaction::hash`].
    pub signature: SerializableSignature,
}

impl Transaction {
    /// Creates a transaction signed by `key`.
    pub fn new(
        chain_id: u32,
        key: &PrivateKey,
        to: Address,
        value: u128,
        nonce: u64,
        timestamp: i64,
        data: Vec<u8>,
    ) -> Self {
        let from = key.public_key();
        let hash = Self::hash_from_parts(chain_id, &from, &to, value, nonce, timestamp, &data);

        Self {
            chain_id,
            from,
            to,
            value,
            nonce,
            timestamp,
            data,
            signature: key.sign(hash.as_slice()),
        }
    }

    /// Transaction identifier, the digest of every field but the signature.
    pub fn hash(&self) -> Hash {
        Self::hash_from_parts(
            self.chain_id,
            &self.from,
            &self.to,
            self.value,
            self.nonce,
            self.timestamp,
            &self.data,
        )
    }

    #[allow(clippy::ptr_arg)]
    fn hash_from_parts(
        chain_id: u32,
        from: &PublicKey,
        to: &Address,
        value: u128,
        nonce: u64,
        timestamp: i64,
        data: &Vec<u8>,
    ) -> Hash {
        let mut h = Hash::sha3();
        h.update(b"TX");
        chain_id.encode(&mut h);
        from.encode(&mut h);
        to.encode(&mut h);
        value.encode(&mut h);
        nonce.encode(&mut h);
        timestamp.encode(&mut h);
        data.encode(&mut h);
        h.finalize()
    }

    /// Checks the signature against the sender's key.
    pub fn verify(&self) -> Result<(), TransactionError> {
        if self.from.verify(self.hash().as_slice(), &self.signature) {
            Ok(())
        } else {
            Err(TransactionError::InvalidSignature)
        }
    }

    /// Applies the transfer to `state` and records it in `txs`.
    ///
    /// Every check runs before the first write, so on error both tries are
    /// left exactly as they were.
    pub fn execute(&self, state: &mut Trie, txs: &mut Trie) -> Result<(), TransactionError> {
        let hash = self.hash();
        if txs.get(&hash)?.is_some() {
            return Err(TransactionError::Duplicate(hash));
        }

        let sender_address = self.from.address();
        let mut sender = state.account_or_default(&sender_address)?;

        let expected = sender.nonce().checked_add(1).unwrap_or(u64::MAX);
        if self.nonce != expected {
            return Err(TransactionError::InvalidNonce {
                expected,
                actual: self.nonce,
            });
        }
        if sender.balance() < self.value {
            return Err(TransactionError::InsufficientBalance {
                balance: sender.balance(),
                required: self.value,
            });
        }

        sender.bump_nonce()?;
        if self.to == sender_address {
            state.set_account(&sender_address, &sender)?;
        } else {
            let mut recipient = state.account_or_default(&self.to)?;
            sender.debit(self.value)?;
            recipient.credit(self.value)?;

            state.set_account(&sender_address, &sender)?;
            state.set_account(&self.to, &recipient)?;
        }

        txs.put(hash, self.to_vec())?;
        Ok(())
    }
}
