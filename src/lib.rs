//! Block core of a blockchain ledger.
//!
//! Blocks bundle ordered transactions, commit to the account state they
//! produce, link to their ancestors and move through a typed lifecycle:
//! unsealed, sealed, verified.

pub mod core;
pub mod crypto;
pub mod network;
pub mod storage;
pub mod types;
pub mod utils;
