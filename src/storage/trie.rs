//! Authenticated key/value store backed by a sparse Merkle tree.
//!
//! Every block owns its own [`Trie`]. Forking a parent's state for a child is a
//! plain [`Clone`]: the fork gets its own copy of the node store, so writes on
//! one side never show up on the other.

use crate::types::encoding::Encode;
use crate::types::hash::Hash;
use ledger_derive::Error;
use sparse_merkle_tree::blake2b::Blake2bHasher;
use sparse_merkle_tree::default_store::DefaultStore;
use sparse_merkle_tree::traits::Value;
use sparse_merkle_tree::{H256, SparseMerkleTree};

/// Errors raised by the underlying sparse Merkle tree.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TrieError {
    #[error("reading key {key} failed: {reason}")]
    Read { key: Hash, reason: String },
    #[error("writing key {key} failed: {reason}")]
    Write { key: Hash, reason: String },
}

/// Leaf value stored in the tree. The empty value is the tree's "absent".
#[derive(Default, Clone, Debug, PartialEq, Eq)]
pub struct TrieValue(pub Vec<u8>);

impl Value for TrieValue {
    fn to_h256(&self) -> H256 {
        if self.0.is_empty() {
            return H256::zero();
        }

        let mut h = Hash::sha3();
        h.update(b"TRIE_LEAF");
        self.0.encode(&mut h);
        H256::from(h.finalize().0)
    }

    fn zero() -> Self {
        Self(Vec::new())
    }
}

type Smt = SparseMerkleTree<Blake2bHasher, TrieValue, DefaultStore<TrieValue>>;

fn to_h256(hash: &Hash) -> H256 {
    H256::from(hash.0)
}

/// Sparse-Merkle-tree backed state store with a 32-byte root commitment.
pub struct Trie {
    tree: Smt,
}

impl Trie {
    /// Creates an empty trie, whose root is the zero hash.
    pub fn new() -> Self {
        Self {
            tree: Smt::new(H256::zero(), DefaultStore::default()),
        }
    }

    /// Returns the value stored under `key`, or `None` if absent.
    pub fn get(&self, key: &Hash) -> Result<Option<Vec<u8>>, TrieError> {
        let value = self.tree.get(&to_h256(key)).map_err(|e| TrieError::Read {
            key: *key,
            reason: e.to_string(),
        })?;
        Ok((!value.0.is_empty()).then_some(value.0))
    }

    /// Stores `value` under `key`. An empty value removes the key.
    pub fn put(&mut self, key: Hash, value: Vec<u8>) -> Result<(), TrieError> {
        self.tree
            .update(to_h256(&key), TrieValue(value))
            .map_err(|e| TrieError::Write {
                key,
                reason: e.to_string(),
            })?;
        Ok(())
    }

    pub fn delete(&mut self, key: Hash) -> Result<(), TrieError> {
        self.put(key, Vec::new())
    }

    /// Root commitment over every key/value pair in the trie.
    pub fn root_hash(&self) -> Hash {
        Hash((*self.tree.root()).into())
    }

    pub fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }
}

impl Default for Trie {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for Trie {
    fn clone(&self) -> Self {
        Self {
            tree: Smt::new(*self.tree.root(), self.tree.store().clone()),
        }
    }
}

impl std::fmt::Debug for Trie {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Trie({})", self.root_hash())
    }
}
