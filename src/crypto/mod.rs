//! Key management and signatures.

pub mod key_pair;
