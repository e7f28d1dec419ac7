//! Network-facing message types.
//!
//! - [`message`]: typed envelope used to ship headers, blocks and transactions

pub mod message;
