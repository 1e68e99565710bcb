//! Contains the [RawSpanBatch] type.

use super::{SpanBatch, SpanBatchElement, SpanBatchPayload, SpanBatchPrefix};
use crate::errors::SpanBatchError;
use alloc::vec::Vec;

/// A span batch in its wire representation: a prefix and a payload.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RawSpanBatch {
    /// The span batch prefix
    pub prefix: SpanBatchPrefix,
    /// The span batch payload
    pub payload: SpanBatchPayload,
}

impl RawSpanBatch {
    /// Encodes the [RawSpanBatch] into a writer.
    pub fn encode(&self, w: &mut Vec<u8>) -> Result<(), SpanBatchError> {
        self.prefix.encode_prefix(w);
        self.payload.encode_payload(w)
    }

    /// Decodes a [RawSpanBatch] from a reader.
    pub fn decode(r: &mut &[u8]) -> Result<Self, SpanBatchError> {
        let prefix = SpanBatchPrefix::decode_prefix(r)?;
        let payload = SpanBatchPayload::decode_payload(r)?;
        Ok(Self { prefix, payload })
    }

    /// Converts the [RawSpanBatch] into a [SpanBatch], expanding the origin
    /// bits and per-block transaction counts into per-block
    /// [SpanBatchElement]s.
    pub fn derive(mut self, block_time: u64, genesis_time: u64) -> Result<SpanBatch, SpanBatchError> {
        if self.payload.block_count == 0 {
            return Err(SpanBatchError::EmptySpanBatch);
        }

        // Reconstruct the L1 origin number of every block in the span by
        // walking the origin-change bits backwards from the last block's
        // origin.
        let mut block_origin_nums = Vec::with_capacity(self.payload.block_count as usize);
        let mut l1_origin_number = self.prefix.l1_origin_num;
        for i in (0..self.payload.block_count).rev() {
            block_origin_nums.push(l1_origin_number);
            if self
                .payload
                .origin_bits
                .get_bit(i as usize)
                .ok_or(SpanBatchError::Decoding(crate::errors::SpanDecodingError::L1OriginCheck))? ==
                1 &&
                i > 0
            {
                l1_origin_number -= 1;
            }
        }
        block_origin_nums.reverse();

        let mut batches = Vec::with_capacity(self.payload.block_count as usize);
        let mut tx_idx = 0usize;
        for i in 0..self.payload.block_count as usize {
            let tx_count = self.payload.block_tx_counts[i] as usize;
            let transactions = self.payload.txs[tx_idx..tx_idx + tx_count].to_vec();
            tx_idx += tx_count;
            batches.push(SpanBatchElement {
                epoch_num: block_origin_nums[i],
                timestamp: genesis_time + self.prefix.rel_timestamp + block_time * i as u64,
                transactions,
            });
        }
        self.payload.txs.clear();

        Ok(SpanBatch {
            parent_check: self.prefix.parent_check,
            l1_origin_check: self.prefix.l1_origin_check,
            batches,
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::types::{RawTransaction, SpanBatchBits};
    use alloc::vec;
    use alloy_primitives::hex;

    fn raw_span() -> RawSpanBatch {
        RawSpanBatch {
            prefix: SpanBatchPrefix {
                rel_timestamp: 20,
                l1_origin_num: 11,
                ..Default::default()
            },
            payload: SpanBatchPayload {
                block_count: 3,
                // Origin advances at the second block.
                origin_bits: SpanBatchBits(vec![0b010]),
                block_tx_counts: vec![1, 0, 1],
                txs: vec![
                    RawTransaction(hex!("02aa").into()),
                    RawTransaction(hex!("02bb").into()),
                ],
            },
        }
    }

    #[test]
    fn test_raw_span_batch_roundtrip() {
        let raw = raw_span();
        let mut buf = Vec::new();
        raw.encode(&mut buf).unwrap();
        assert_eq!(RawSpanBatch::decode(&mut buf.as_slice()).unwrap(), raw);
    }

    #[test]
    fn test_derive_expands_origins_and_timestamps() {
        let span = raw_span().derive(2, 100).unwrap();
        assert_eq!(span.batches.len(), 3);
        assert_eq!(span.batches[0].epoch_num, 10);
        assert_eq!(span.batches[1].epoch_num, 11);
        assert_eq!(span.batches[2].epoch_num, 11);
        assert_eq!(span.batches[0].timestamp, 120);
        assert_eq!(span.batches[1].timestamp, 122);
        assert_eq!(span.batches[2].timestamp, 124);
        assert_eq!(span.batches[0].transactions.len(), 1);
        assert_eq!(span.batches[1].transactions.len(), 0);
        assert_eq!(span.batches[2].transactions.len(), 1);
    }
}
