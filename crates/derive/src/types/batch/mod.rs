//! This module contains the batch types for the derivation pipeline:
//! [SpanBatch] & [SingleBatch].

use crate::{
    errors::PipelineEncodingError,
    traits::L2ChainProvider,
    types::{BlockInfo, L2BlockInfo, RollupConfig},
};
use alloy_rlp::{Buf, Decodable};

mod batch_type;
pub use batch_type::BatchType;

mod validity;
pub use validity::BatchValidity;

mod single_batch;
pub use single_batch::SingleBatch;

mod span_batch;
pub use span_batch::{
    RawSpanBatch, SpanBatch, SpanBatchBits, SpanBatchElement, SpanBatchPayload, SpanBatchPrefix,
};

/// A batch with its L1 inclusion block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchWithInclusionBlock {
    /// The inclusion block
    pub inclusion_block: BlockInfo,
    /// The batch
    pub batch: Batch,
}

impl BatchWithInclusionBlock {
    /// Validates the batch can be applied on top of the specified L2 safe head.
    /// The first entry of the l1_blocks should match the origin of the
    /// l2_safe_head. One or more consecutive l1_blocks should be provided.
    /// In case of only a single L1 block, the decision whether a batch is
    /// valid may have to stay undecided.
    pub async fn check_batch<BF: L2ChainProvider>(
        &self,
        cfg: &RollupConfig,
        l1_blocks: &[BlockInfo],
        l2_safe_head: L2BlockInfo,
        fetcher: &mut BF,
    ) -> BatchValidity {
        match &self.batch {
            Batch::Single(single_batch) => {
                single_batch.check_batch(cfg, l1_blocks, l2_safe_head, &self.inclusion_block)
            }
            Batch::Span(span_batch) => {
                span_batch
                    .check_batch(cfg, l1_blocks, l2_safe_head, &self.inclusion_block, fetcher)
                    .await
            }
        }
    }
}

/// A batch, decoded from a channel.
#[derive(Debug, Clone, PartialEq, Eq)]
#[allow(clippy::large_enum_variant)]
pub enum Batch {
    /// A single batch
    Single(SingleBatch),
    /// A span batch
    Span(SpanBatch),
}

impl Batch {
    /// Returns the timestamp for the batch.
    pub fn timestamp(&self) -> u64 {
        match self {
            Self::Single(sb) => sb.timestamp,
            Self::Span(sb) => sb.starting_timestamp(),
        }
    }

    /// Attempts to decode a batch from a reader.
    pub fn decode(r: &mut &[u8], cfg: &RollupConfig) -> Result<Self, PipelineEncodingError> {
        if r.is_empty() {
            return Err(PipelineEncodingError::EmptyBuffer);
        }

        // Read the batch type
        let batch_type = BatchType::from(r[0]);
        r.advance(1);

        match batch_type {
            BatchType::Single => {
                let single_batch =
                    SingleBatch::decode(r).map_err(PipelineEncodingError::AlloyRlpError)?;
                Ok(Self::Single(single_batch))
            }
            BatchType::Span => {
                let raw_span_batch = RawSpanBatch::decode(r)?;
                let span_batch = raw_span_batch
                    .derive(cfg.block_time, cfg.genesis.l2_time)
                    .map_err(PipelineEncodingError::SpanBatchError)?;
                Ok(Self::Span(span_batch))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;

    #[test]
    fn test_timestamp() {
        let single_batch = SingleBatch { timestamp: 123, ..Default::default() };
        let span_batch = SpanBatch {
            batches: vec![SpanBatchElement { timestamp: 456, ..Default::default() }],
            ..Default::default()
        };

        assert_eq!(Batch::Single(single_batch).timestamp(), 123);
        assert_eq!(Batch::Span(span_batch).timestamp(), 456);
    }

    #[test]
    fn test_decode_empty_buffer() {
        let cfg = RollupConfig::default();
        assert!(matches!(
            Batch::decode(&mut [].as_slice(), &cfg),
            Err(PipelineEncodingError::EmptyBuffer)
        ));
    }
}
