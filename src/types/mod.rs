//! Value types and the deterministic binary codec.
//!
//! - `Hash`: 32-byte SHA3-256 digests
//! - `Address`: 20-byte account identifiers
//! - `encoding`: `Encode`/`Decode` used for hashing and the wire format

pub mod address;
pub mod encoding;
pub mod hash;
pub mod serializable_signature;
