//! Mock implementations of the per-stage provider traits.

use crate::{
    errors::{BuilderError, PipelineError},
    traits::{
        AttributesBuilder, AttributesProvider, ChannelReaderProvider, FrameQueueProvider,
        NextAttributes, NextBatchProvider, NextFrameProvider, OriginAdvancer, OriginProvider,
        SignalReceiver,
    },
    types::{
        AttributesWithParent, Batch, BlockID, BlockInfo, Frame, L2BlockInfo, PayloadAttributes,
        PipelineResult, Signal, SingleBatch,
    },
};
use alloc::{boxed::Box, vec::Vec};
use alloy_primitives::Bytes;
use async_trait::async_trait;

macro_rules! impl_test_stage_plumbing {
    ($name:ident) => {
        #[async_trait]
        impl OriginAdvancer for $name {
            async fn advance_origin(&mut self) -> PipelineResult<()> {
                if let Some(block) = self.origin.as_mut() {
                    block.number += 1;
                }
                Ok(())
            }
        }

        impl OriginProvider for $name {
            fn origin(&self) -> Option<BlockInfo> {
                self.origin
            }
        }

        #[async_trait]
        impl SignalReceiver for $name {
            async fn signal(&mut self, signal: Signal) -> PipelineResult<()> {
                if let Signal::Reset(s) = signal {
                    self.origin = Some(s.l1_origin);
                    self.reset = true;
                }
                Ok(())
            }
        }
    };
}

/// A mock provider for the [FrameQueue](crate::stages::FrameQueue) stage.
#[derive(Debug, Default)]
pub struct TestFrameQueueProvider {
    /// The data to serve, in order.
    pub data: Vec<PipelineResult<Bytes>>,
    /// The origin of the provider.
    pub origin: Option<BlockInfo>,
    /// Whether the provider was reset.
    pub reset: bool,
}

impl TestFrameQueueProvider {
    /// Creates a new [TestFrameQueueProvider] with the given data.
    pub fn new(data: Vec<PipelineResult<Bytes>>) -> Self {
        Self { data, origin: None, reset: false }
    }

    /// Sets the origin of the provider.
    pub fn set_origin(&mut self, origin: BlockInfo) {
        self.origin = Some(origin);
    }
}

impl_test_stage_plumbing!(TestFrameQueueProvider);

#[async_trait]
impl FrameQueueProvider for TestFrameQueueProvider {
    async fn next_data(&mut self) -> PipelineResult<Bytes> {
        if self.data.is_empty() {
            return Err(PipelineError::Eof.temp());
        }
        self.data.remove(0)
    }
}

/// A mock provider for the channel stages.
#[derive(Debug, Default)]
pub struct TestNextFrameProvider {
    /// The frames to serve, popped from the back.
    pub data: Vec<PipelineResult<Frame>>,
    /// The origin of the provider.
    pub block_info: Option<BlockInfo>,
    /// Whether the provider was reset.
    pub reset: bool,
}

impl TestNextFrameProvider {
    /// Creates a new [TestNextFrameProvider] with the given frames.
    pub fn new(data: Vec<PipelineResult<Frame>>) -> Self {
        Self { data, block_info: Some(BlockInfo::default()), reset: false }
    }
}

#[async_trait]
impl NextFrameProvider for TestNextFrameProvider {
    async fn next_frame(&mut self) -> PipelineResult<Frame> {
        self.data.pop().unwrap_or(Err(PipelineError::Eof.temp()))
    }
}

#[async_trait]
impl OriginAdvancer for TestNextFrameProvider {
    async fn advance_origin(&mut self) -> PipelineResult<()> {
        if let Some(block) = self.block_info.as_mut() {
            block.number += 1;
        }
        Ok(())
    }
}

impl OriginProvider for TestNextFrameProvider {
    fn origin(&self) -> Option<BlockInfo> {
        self.block_info
    }
}

#[async_trait]
impl SignalReceiver for TestNextFrameProvider {
    async fn signal(&mut self, signal: Signal) -> PipelineResult<()> {
        if let Signal::Reset(s) = signal {
            self.block_info = Some(s.l1_origin);
            self.reset = true;
        }
        Ok(())
    }
}

/// A mock provider for the [ChannelReader](crate::stages::ChannelReader)
/// stage.
#[derive(Debug, Default)]
pub struct TestChannelReaderProvider {
    /// The channel payloads to serve, in order.
    pub data: Vec<PipelineResult<Option<Bytes>>>,
    /// The origin of the provider.
    pub origin: Option<BlockInfo>,
    /// Whether the provider was reset.
    pub reset: bool,
}

impl TestChannelReaderProvider {
    /// Creates a new [TestChannelReaderProvider] with the given data.
    pub fn new(data: Vec<PipelineResult<Option<Bytes>>>) -> Self {
        Self { data, origin: Some(BlockInfo::default()), reset: false }
    }
}

impl_test_stage_plumbing!(TestChannelReaderProvider);

#[async_trait]
impl ChannelReaderProvider for TestChannelReaderProvider {
    async fn next_data(&mut self) -> PipelineResult<Option<Bytes>> {
        if self.data.is_empty() {
            return Err(PipelineError::Eof.temp());
        }
        self.data.remove(0)
    }
}

/// A mock provider for the [BatchStream](crate::stages::BatchStream) stage.
#[derive(Debug, Default)]
pub struct TestBatchStreamProvider {
    /// The batches to serve, in order.
    pub data: Vec<PipelineResult<Batch>>,
    /// The origin of the provider.
    pub origin: Option<BlockInfo>,
    /// Whether the provider was flushed.
    pub flushed: bool,
    /// Whether the provider was reset.
    pub reset: bool,
}

impl TestBatchStreamProvider {
    /// Creates a new [TestBatchStreamProvider] with the given batches.
    pub fn new(data: Vec<PipelineResult<Batch>>) -> Self {
        Self { data, origin: None, flushed: false, reset: false }
    }
}

impl_test_stage_plumbing!(TestBatchStreamProvider);

#[async_trait]
impl crate::stages::BatchStreamProvider for TestBatchStreamProvider {
    fn flush(&mut self) {
        self.flushed = true;
    }

    async fn next_batch(&mut self) -> PipelineResult<Batch> {
        if self.data.is_empty() {
            return Err(PipelineError::Eof.temp());
        }
        self.data.remove(0)
    }
}

/// A mock provider for the batch queue / validator stages.
#[derive(Debug, Default)]
pub struct TestNextBatchProvider {
    /// The batches to serve, in order.
    pub data: Vec<PipelineResult<Batch>>,
    /// The origin of the provider.
    pub origin: Option<BlockInfo>,
    /// Whether the provider was flushed.
    pub flushed: bool,
    /// Whether the provider was reset.
    pub reset: bool,
}

impl TestNextBatchProvider {
    /// Creates a new [TestNextBatchProvider] with the given batches.
    pub fn new(data: Vec<PipelineResult<Batch>>) -> Self {
        Self { data, origin: None, flushed: false, reset: false }
    }
}

impl_test_stage_plumbing!(TestNextBatchProvider);

#[async_trait]
impl NextBatchProvider for TestNextBatchProvider {
    async fn next_batch(
        &mut self,
        _parent: L2BlockInfo,
        _l1_origins: &[BlockInfo],
    ) -> PipelineResult<Batch> {
        if self.data.is_empty() {
            return Err(PipelineError::Eof.temp());
        }
        self.data.remove(0)
    }

    fn flush(&mut self) {
        self.flushed = true;
    }

    fn span_buffer_size(&self) -> usize {
        self.data.len()
    }
}

/// A mock provider for the
/// [AttributesQueue](crate::stages::AttributesQueue) stage.
#[derive(Debug, Default)]
pub struct TestAttributesProvider {
    /// The batches to serve, in order.
    pub data: Vec<PipelineResult<SingleBatch>>,
    /// The origin of the provider.
    pub origin: Option<BlockInfo>,
    /// Whether the last batch is the last in its span.
    pub last_in_span: bool,
    /// Whether the provider was reset.
    pub reset: bool,
}

impl TestAttributesProvider {
    /// Creates a new [TestAttributesProvider] with the given batches.
    pub fn new(data: Vec<PipelineResult<SingleBatch>>) -> Self {
        Self { data, origin: None, last_in_span: false, reset: false }
    }
}

impl_test_stage_plumbing!(TestAttributesProvider);

#[async_trait]
impl AttributesProvider for TestAttributesProvider {
    async fn next_batch(&mut self, _parent: L2BlockInfo) -> PipelineResult<SingleBatch> {
        if self.data.is_empty() {
            return Err(PipelineError::Eof.temp());
        }
        self.data.remove(0)
    }

    fn is_last_in_span(&self) -> bool {
        self.last_in_span
    }
}

/// A mock [AttributesBuilder].
#[derive(Debug, Default)]
pub struct TestAttributesBuilder {
    /// The attributes to return.
    pub attributes: Option<Result<PayloadAttributes, BuilderError>>,
}

#[async_trait]
impl AttributesBuilder for TestAttributesBuilder {
    async fn prepare_payload_attributes(
        &mut self,
        _l2_parent: L2BlockInfo,
        _epoch: BlockID,
    ) -> Result<PayloadAttributes, BuilderError> {
        match self.attributes.take() {
            Some(attrs) => attrs,
            None => Err(BuilderError::AttributesUnavailable),
        }
    }
}

/// A mock [NextAttributes] stage for driving the pipeline.
#[derive(Debug, Default)]
pub struct TestNextAttributes {
    /// The attributes to serve.
    pub next_attributes: Option<AttributesWithParent>,
    /// The origin of the stage.
    pub origin: Option<BlockInfo>,
    /// Whether the stage was reset.
    pub reset: bool,
}

impl_test_stage_plumbing!(TestNextAttributes);

#[async_trait]
impl NextAttributes for TestNextAttributes {
    async fn next_attributes(
        &mut self,
        _parent: L2BlockInfo,
    ) -> PipelineResult<AttributesWithParent> {
        self.next_attributes.take().ok_or(PipelineError::Eof.temp())
    }
}
