//! Common traits for stages within the derivation pipeline.

use crate::types::{
    Batch, BlockInfo, L2BlockInfo, PipelineResult, Signal, SingleBatch,
};
use alloc::boxed::Box;
use alloy_primitives::Bytes;
use async_trait::async_trait;

/// Provides a method for accessing the pipeline's current L1 origin.
pub trait OriginProvider {
    /// Returns the optional L1 [BlockInfo] origin.
    fn origin(&self) -> Option<BlockInfo>;
}

/// Defines a trait for advancing the L1 origin of the pipeline.
#[async_trait]
pub trait OriginAdvancer {
    /// Advances the internal state of the lowest stage to the next L1 origin.
    async fn advance_origin(&mut self) -> PipelineResult<()>;
}

/// Receives [Signal]s travelling down the pipeline, resetting or adjusting
/// stage state. Every stage forwards the signal to its previous stage before
/// applying it locally, so a reset applies bottom-up in one atomic pass.
#[async_trait]
pub trait SignalReceiver {
    /// Receives a [Signal].
    async fn signal(&mut self, signal: Signal) -> PipelineResult<()>;
}

/// Provides L1 blocks to the retrieval stage, one at a time.
#[async_trait]
pub trait L1RetrievalProvider {
    /// Returns the next L1 block, exactly once per block. `Ok(None)` means
    /// the traversal stage holds no block yet.
    async fn next_l1_block(&mut self) -> PipelineResult<Option<BlockInfo>>;

    /// Returns the batcher address authorized by the system config as of the
    /// current block.
    fn batcher_address(&self) -> alloy_primitives::Address;
}

/// Provides raw data payloads to the frame queue.
#[async_trait]
pub trait FrameQueueProvider {
    /// Returns the next raw payload from the data source.
    async fn next_data(&mut self) -> PipelineResult<Bytes>;
}

/// Provides frames to the channel stage.
#[async_trait]
pub trait NextFrameProvider {
    /// Returns the next [Frame](crate::types::Frame), if the stage has one.
    async fn next_frame(&mut self) -> PipelineResult<crate::types::Frame>;
}

/// Provides raw channel payloads to the channel reader.
#[async_trait]
pub trait ChannelReaderProvider {
    /// Pulls the next piece of data from the channel stage. Note that the
    /// stage attempts to pull data out prior to loading data in (unlike most
    /// other stages). This is to maintain consistency around channel bank
    /// pruning, which depends upon the order of operations.
    async fn next_data(&mut self) -> PipelineResult<Option<Bytes>>;
}

/// Provides [Batch]es to the batch queue / validator stage.
#[async_trait]
pub trait NextBatchProvider {
    /// Returns the next [Batch] in the stage, if one is available.
    async fn next_batch(
        &mut self,
        parent: L2BlockInfo,
        l1_origins: &[BlockInfo],
    ) -> PipelineResult<Batch>;

    /// Drops any buffered span batch data, used when an invalid batch is
    /// found post-Holocene. Pre-Holocene this is a no-op.
    fn flush(&mut self);

    /// Returns the number of singular batches buffered from a span batch.
    fn span_buffer_size(&self) -> usize;
}

/// Provides validated [SingleBatch]es to the attributes queue.
#[async_trait]
pub trait AttributesProvider {
    /// Returns the next valid batch upon the given safe head.
    async fn next_batch(&mut self, parent: L2BlockInfo) -> PipelineResult<SingleBatch>;

    /// Returns whether the current batch is the last in its span.
    fn is_last_in_span(&self) -> bool;
}
