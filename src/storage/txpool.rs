//! Transaction pool for pending transactions awaiting block inclusion.
//!
//! Thread-safe FIFO: transactions come back out in the order they were put in.
//! Blocks take their candidates from the front and hand rejected ones back.

use crate::core::transaction::Transaction;
use crate::types::hash::Hash;
use dashmap::DashMap;
use std::sync::{PoisonError, RwLock};

/// Default transaction pool capacity.
pub const TXPOOL_CAPACITY: usize = 100_000;

/// Thread-safe pool of pending transactions.
///
/// Maintains insertion order for deterministic block construction while
/// providing O(1) duplicate detection via hash lookup.
pub struct TxPool {
    /// Transactions indexed by hash for fast lookup and deduplication.
    transactions: DashMap<Hash, Transaction>,
    /// Insertion order.
    order: RwLock<Vec<Hash>>,
    capacity: usize,
}

impl TxPool {
    /// Creates a new transaction pool with the given capacity.
    ///
    /// Uses `TXPOOL_CAPACITY` if `None` is provided.
    pub fn new(capacity: Option<usize>) -> Self {
        let cap = capacity.unwrap_or(TXPOOL_CAPACITY);

        Self {
            transactions: DashMap::with_capacity(cap.min(1024)),
            order: RwLock::new(Vec::with_capacity(cap.min(1024))),
            capacity: cap,
        }
    }

    pub fn contains(&self, hash: &Hash) -> bool {
        self.transactions.contains_key(hash)
    }

    /// Appends a transaction to the back of the pool.
    ///
    /// Returns `false` if it is already pooled or the pool is full.
    pub fn put(&self, transaction: Transaction) -> bool {
        let hash = transaction.hash();
        let mut order = self.order.write().unwrap_or_else(PoisonError::into_inner);

        if self.transactions.len() >= self.capacity || self.transactions.contains_key(&hash) {
            return false;
        }

        self.transactions.insert(hash, transaction);
        order.push(hash);
        true
    }

    pub fn len(&self) -> usize {
        self.transactions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }

    /// Removes and returns up to `max` transactions from the front of the pool.
    pub fn take(&self, max: usize) -> Vec<Transaction> {
        let mut order = self.order.write().unwrap_or_else(PoisonError::into_inner);
        let n = max.min(order.len());

        order
            .drain(..n)
            .filter_map(|h| self.transactions.remove(&h).map(|(_, tx)| tx))
            .collect()
    }

    /// Removes all transactions from the pool.
    pub fn flush(&self) {
        let mut order = self.order.write().unwrap_or_else(PoisonError::into_inner);
        self.transactions.clear();
        order.clear();
    }

    /// Removes transactions with the given hashes from the pool.
    pub fn remove_batch(&self, hashes: &[Hash]) {
        let mut order = self.order.write().unwrap_or_else(PoisonError::into_inner);
        for hash in hashes {
            self.transactions.remove(hash);
        }
        order.retain(|h| self.transactions.contains_key(h));
    }

    /// Returns all transactions in insertion order.
    pub fn transactions(&self) -> Vec<Transaction> {
        let order = self.order.read().unwrap_or_else(PoisonError::into_inner);

        order
            .iter()
            .filter_map(|h| self.transactions.get(h).map(|e| e.clone()))
            .collect()
    }
}

impl Default for TxPool {
    fn default() -> Self {
        Self::new(None)
    }
}
