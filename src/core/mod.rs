//! Core blockchain data structures.
//!
//! - [`block`]: headers, blocks and their unsealed/sealed lifecycle
//! - [`blockchain`]: block arena and the chain façade
//! - [`state_transition`]: coinbase reward and transaction replay
//! - [`transaction`]: signed transfers and their execution
//! - [`account`]: account records kept in the state trie
//! - [`consensus`]: chain parameters and the consensus backend

pub mod account;
pub mod block;
pub mod blockchain;
pub mod consensus;
pub mod state_transition;
pub mod transaction;
