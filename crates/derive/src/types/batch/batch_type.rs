//! Contains the [BatchType] and its encodings.

use alloy_rlp::{Decodable, Encodable};

/// The single batch type identifier.
pub const SINGLE_BATCH_TYPE: u8 = 0x00;

/// The span batch type identifier.
pub const SPAN_BATCH_TYPE: u8 = 0x01;

/// The first byte of every batch, identifying the encoding that follows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchType {
    /// A single batch.
    Single = SINGLE_BATCH_TYPE as isize,
    /// A span batch.
    Span = SPAN_BATCH_TYPE as isize,
}

impl From<u8> for BatchType {
    fn from(val: u8) -> Self {
        match val {
            SPAN_BATCH_TYPE => Self::Span,
            _ => Self::Single,
        }
    }
}

impl Encodable for BatchType {
    fn encode(&self, out: &mut dyn alloy_rlp::BufMut) {
        (*self as u8).encode(out);
    }
}

impl Decodable for BatchType {
    fn decode(buf: &mut &[u8]) -> alloy_rlp::Result<Self> {
        let val = u8::decode(buf)?;
        Ok(Self::from(val))
    }
}
