//! Contains the [SpanBatchPayload] type.

use super::SpanBatchBits;
use crate::{
    errors::{SpanBatchError, SpanDecodingError},
    params::MAX_SPAN_BATCH_ELEMENTS,
    types::RawTransaction,
};
use alloc::vec::Vec;
use alloy_rlp::{Decodable, Encodable};

/// The payload of a span batch.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SpanBatchPayload {
    /// Number of L2 blocks in the span
    pub block_count: u64,
    /// Standard span-batch bitlist of `block_count` bits. Each bit indicates
    /// if the L1 origin is changed at the L2 block.
    pub origin_bits: SpanBatchBits,
    /// The number of transactions in each L2 block in the span
    pub block_tx_counts: Vec<u64>,
    /// The opaque transaction envelopes of all blocks in the span, flattened
    /// in block order
    pub txs: Vec<RawTransaction>,
}

impl SpanBatchPayload {
    /// Decodes a [SpanBatchPayload] from a reader.
    pub fn decode_payload(r: &mut &[u8]) -> Result<Self, SpanBatchError> {
        let (block_count, rest) = unsigned_varint::decode::u64(*r)
            .map_err(|_| SpanBatchError::Decoding(SpanDecodingError::BlockCount))?;
        *r = rest;

        if block_count == 0 {
            return Err(SpanBatchError::EmptySpanBatch);
        }
        if block_count > MAX_SPAN_BATCH_ELEMENTS {
            return Err(SpanBatchError::TooBigSpanBatchSize);
        }

        let origin_bits = SpanBatchBits::decode(r, block_count as usize)?;

        let mut block_tx_counts = Vec::with_capacity(block_count as usize);
        let mut total_txs: u64 = 0;
        for _ in 0..block_count {
            let (count, rest) = unsigned_varint::decode::u64(*r)
                .map_err(|_| SpanBatchError::Decoding(SpanDecodingError::BlockTxCounts))?;
            *r = rest;
            total_txs = total_txs
                .checked_add(count)
                .ok_or(SpanBatchError::TooBigSpanBatchSize)?;
            if total_txs > MAX_SPAN_BATCH_ELEMENTS {
                return Err(SpanBatchError::TooBigSpanBatchSize);
            }
            block_tx_counts.push(count);
        }

        let mut txs = Vec::with_capacity(total_txs as usize);
        for _ in 0..total_txs {
            let tx = RawTransaction::decode(r)
                .map_err(|_| SpanBatchError::Decoding(SpanDecodingError::InvalidTransactionData))?;
            txs.push(tx);
        }

        Ok(Self { block_count, origin_bits, block_tx_counts, txs })
    }

    /// Encodes the [SpanBatchPayload] into a writer.
    pub fn encode_payload(&self, w: &mut Vec<u8>) -> Result<(), SpanBatchError> {
        let mut u64_buf = unsigned_varint::encode::u64_buffer();
        w.extend_from_slice(unsigned_varint::encode::u64(self.block_count, &mut u64_buf));
        SpanBatchBits::encode(w, self.block_count as usize, &self.origin_bits)?;
        for count in &self.block_tx_counts {
            w.extend_from_slice(unsigned_varint::encode::u64(*count, &mut u64_buf));
        }
        for tx in &self.txs {
            tx.encode(w);
        }
        Ok(())
    }
}
