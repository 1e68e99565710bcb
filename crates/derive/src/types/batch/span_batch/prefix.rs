//! Contains the [SpanBatchPrefix] type.

use crate::errors::{SpanBatchError, SpanDecodingError};
use alloc::vec::Vec;
use alloy_primitives::FixedBytes;
use alloy_rlp::Buf;

/// The span batch prefix.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SpanBatchPrefix {
    /// The span start timestamp, relative to the L2 genesis timestamp
    pub rel_timestamp: u64,
    /// The L1 origin number of the last block in the span
    pub l1_origin_num: u64,
    /// The first 20 bytes of the first block's parent hash
    pub parent_check: FixedBytes<20>,
    /// The first 20 bytes of the last block's L1 origin hash
    pub l1_origin_check: FixedBytes<20>,
}

impl SpanBatchPrefix {
    /// Decodes a [SpanBatchPrefix] from a reader.
    pub fn decode_prefix(r: &mut &[u8]) -> Result<Self, SpanBatchError> {
        let (rel_timestamp, rest) = unsigned_varint::decode::u64(*r)
            .map_err(|_| SpanBatchError::Decoding(SpanDecodingError::RelativeTimestamp))?;
        *r = rest;
        let (l1_origin_num, rest) = unsigned_varint::decode::u64(*r)
            .map_err(|_| SpanBatchError::Decoding(SpanDecodingError::L1OriginNumber))?;
        *r = rest;

        if r.len() < 40 {
            return Err(SpanBatchError::Decoding(SpanDecodingError::ParentCheck));
        }
        let parent_check = FixedBytes::from_slice(&r[..20]);
        r.advance(20);
        let l1_origin_check = FixedBytes::from_slice(&r[..20]);
        r.advance(20);

        Ok(Self { rel_timestamp, l1_origin_num, parent_check, l1_origin_check })
    }

    /// Encodes the [SpanBatchPrefix] into a writer.
    pub fn encode_prefix(&self, w: &mut Vec<u8>) {
        let mut u64_buf = unsigned_varint::encode::u64_buffer();
        w.extend_from_slice(unsigned_varint::encode::u64(self.rel_timestamp, &mut u64_buf));
        w.extend_from_slice(unsigned_varint::encode::u64(self.l1_origin_num, &mut u64_buf));
        w.extend_from_slice(self.parent_check.as_slice());
        w.extend_from_slice(self.l1_origin_check.as_slice());
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use alloy_primitives::address;

    #[test]
    fn test_prefix_roundtrip() {
        let prefix = SpanBatchPrefix {
            rel_timestamp: 0xFF00,
            l1_origin_num: 0xDDEE,
            parent_check: address!("1111111111111111111111111111111111111111").into(),
            l1_origin_check: address!("2222222222222222222222222222222222222222").into(),
        };

        let mut buf = Vec::new();
        prefix.encode_prefix(&mut buf);
        assert_eq!(SpanBatchPrefix::decode_prefix(&mut buf.as_slice()).unwrap(), prefix);
    }
}
