//! Wire envelope for headers, blocks and transactions.
//!
//! A [`Message`] carries a type tag and an encoded payload. Decoding checks the
//! tag first, so feeding a header message to a block decoder fails with
//! [`DecodeError::UnexpectedMessage`] instead of garbage.

use crate::core::block::Header;
use crate::core::transaction::Transaction;
use crate::types::encoding::{Decode, DecodeError, Encode};
use ledger_derive::BinaryCodec;

/// Discriminant for message payload types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, BinaryCodec)]
pub enum MessageType {
    /// Payload contains a serialized block header.
    Header,
    /// Payload contains a serialized [`BlockData`].
    Block,
    /// Payload contains a serialized transaction.
    Transaction,
}

impl MessageType {
    pub fn name(&self) -> &'static str {
        match self {
            MessageType::Header => "Header",
            MessageType::Block => "Block",
            MessageType::Transaction => "Transaction",
        }
    }
}

/// Framed message with type header and serialized payload.
#[derive(Debug, Clone, PartialEq, Eq, BinaryCodec)]
pub struct Message {
    /// Type discriminant for payload deserialization.
    pub(crate) header: MessageType,
    /// Serialized payload data.
    pub(crate) data: Vec<u8>,
}

impl Message {
    /// Creates a new message with the given type and payload.
    pub fn new(header: MessageType, data: Vec<u8>) -> Self {
        Self { header, data }
    }

    /// Encodes `payload` into a message of the given type.
    pub fn from_payload<T: Encode>(header: MessageType, payload: &T) -> Self {
        Self::new(header, payload.to_vec())
    }

    pub fn kind(&self) -> MessageType {
        self.header
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Decodes the payload, which must be of type `expected`.
    pub fn decode_payload<T: Decode>(&self, expected: MessageType) -> Result<T, DecodeError> {
        if self.header != expected {
            return Err(DecodeError::UnexpectedMessage {
                expected: expected.name(),
                actual: self.header.name(),
            });
        }
        T::from_bytes(&self.data)
    }
}

/// Wire form of a block: its header and ordered transaction list.
///
/// Height, parent link and tries are local bookkeeping and never travel.
#[derive(Debug, Clone, PartialEq, Eq, BinaryCodec)]
pub struct BlockData {
    pub header: Header,
    pub transactions: Vec<Transaction>,
}
