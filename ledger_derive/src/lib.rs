//! Derive macros for the ledger crate.
//!
//! - `#[derive(BinaryCodec)]` implements the crate's `Encode` and `Decode` traits.
//! - `#[derive(Error)]` implements `Display` and `std::error::Error` from
//!   `#[error("...")]` attributes.

mod codec;
mod error;

use proc_macro::TokenStream;

/// Implements `Encode` and `Decode` for structs and enums.
#[proc_macro_derive(BinaryCodec)]
pub fn derive_binary_codec(input: TokenStream) -> TokenStream {
    codec::derive(input)
}

/// Implements `Display` and `Error` for error enums and structs.
#[proc_macro_derive(Error, attributes(error))]
pub fn derive_error(input: TokenStream) -> TokenStream {
    error::derive(input)
}
