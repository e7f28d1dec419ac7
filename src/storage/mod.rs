//! State storage for blocks.
//!
//! - [`trie`]: sparse-Merkle-tree key/value store with a root commitment
//! - [`state`]: typed account records on top of a trie
//! - [`txpool`]: pending transactions awaiting inclusion

pub mod state;
pub mod trie;
pub mod txpool;
