//! Test utilities for blockchain testing.
