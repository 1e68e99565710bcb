//! This module contains the [BatchStream] stage.

use super::BatchStreamProvider;
use crate::{
    errors::PipelineError,
    traits::{NextBatchProvider, OriginAdvancer, OriginProvider, SignalReceiver},
    types::{Batch, BlockInfo, L2BlockInfo, PipelineResult, RollupConfig, Signal, SingleBatch},
};
use alloc::{boxed::Box, collections::VecDeque, sync::Arc};
use async_trait::async_trait;
use core::fmt::Debug;
use tracing::{trace, warn};

/// [BatchStream] stage in the derivation pipeline.
///
/// This stage is introduced in the Holocene hardfork. It slots in between
/// the [ChannelReader] and [BatchQueue] stages, buffering span batches and
/// serving their singular batches one at a time. Before the hardfork
/// activates, batches are passed through unaltered.
///
/// [ChannelReader]: crate::stages::ChannelReader
/// [BatchQueue]: crate::stages::BatchQueue
#[derive(Debug)]
pub struct BatchStream<P>
where
    P: BatchStreamProvider + OriginAdvancer + OriginProvider + SignalReceiver,
{
    /// The previous stage in the derivation pipeline.
    prev: P,
    /// A buffer of singular batches derived from the last-holding span batch.
    buffer: VecDeque<SingleBatch>,
    /// The rollup config.
    cfg: Arc<RollupConfig>,
}

impl<P> BatchStream<P>
where
    P: BatchStreamProvider + OriginAdvancer + OriginProvider + SignalReceiver,
{
    /// Create a new [BatchStream] stage.
    pub const fn new(prev: P, cfg: Arc<RollupConfig>) -> Self {
        Self { prev, buffer: VecDeque::new(), cfg }
    }

    /// Returns whether the stage is active, based on the Holocene activation
    /// and the origin timestamp.
    pub fn is_active(&self) -> PipelineResult<bool> {
        let origin = self.prev.origin().ok_or(PipelineError::MissingOrigin.crit())?;
        Ok(self.cfg.is_holocene_active(origin.timestamp))
    }

    /// Gets a [SingleBatch] from the in-memory buffer. The buffered batches
    /// already carry their epoch hash; only the parent hash needs to be
    /// stamped with the block the batch will build on.
    pub fn get_single_batch(&mut self, parent: L2BlockInfo) -> Option<SingleBatch> {
        trace!(target: "batch-stream", "Attempting to get a batch from the buffer of length {}", self.buffer.len());
        let mut batch = self.buffer.pop_front()?;
        batch.parent_hash = parent.block_info.hash;
        Some(batch)
    }
}

#[async_trait]
impl<P> NextBatchProvider for BatchStream<P>
where
    P: BatchStreamProvider + OriginAdvancer + OriginProvider + SignalReceiver + Send,
{
    fn flush(&mut self) {
        if self.is_active().unwrap_or(false) {
            self.buffer.clear();
            self.prev.flush();
        }
    }

    fn span_buffer_size(&self) -> usize {
        self.buffer.len()
    }

    async fn next_batch(
        &mut self,
        parent: L2BlockInfo,
        l1_origins: &[BlockInfo],
    ) -> PipelineResult<Batch> {
        // If the stage is not active, "pass" the batch through.
        if !self.is_active()? {
            trace!(target: "batch-stream", "BatchStream stage is inactive, pass-through.");
            return self.prev.next_batch().await;
        }

        // Serve the remaining singular batches of the last span first.
        if let Some(batch) = self.get_single_batch(parent) {
            return Ok(Batch::Single(batch));
        }

        // Safety: bubble up any errors from the batch reader.
        let batch = self.prev.next_batch().await?;

        match batch {
            Batch::Single(b) => Ok(Batch::Single(b)),
            Batch::Span(b) => {
                // Validate the span batch eagerly: an invalid span batch
                // forwards-invalidates the channel it came from.
                if b.batches.is_empty() {
                    warn!(target: "batch-stream", "Invalid empty span batch, flushing channel");
                    self.prev.flush();
                    return Err(PipelineError::NotEnoughData.temp());
                }

                self.buffer =
                    b.get_singular_batches(l1_origins, parent)
                        .map_err(|e| {
                            PipelineError::BadEncoding(
                                crate::errors::PipelineEncodingError::SpanBatchError(e),
                            )
                            .crit()
                        })?
                        .into();

                let batch =
                    self.get_single_batch(parent).ok_or(PipelineError::NotEnoughData.temp())?;
                Ok(Batch::Single(batch))
            }
        }
    }
}

#[async_trait]
impl<P> OriginAdvancer for BatchStream<P>
where
    P: BatchStreamProvider + OriginAdvancer + OriginProvider + SignalReceiver + Send,
{
    async fn advance_origin(&mut self) -> PipelineResult<()> {
        self.prev.advance_origin().await
    }
}

impl<P> OriginProvider for BatchStream<P>
where
    P: BatchStreamProvider + OriginAdvancer + OriginProvider + SignalReceiver,
{
    fn origin(&self) -> Option<BlockInfo> {
        self.prev.origin()
    }
}

#[async_trait]
impl<P> SignalReceiver for BatchStream<P>
where
    P: BatchStreamProvider + OriginAdvancer + OriginProvider + SignalReceiver + Send,
{
    async fn signal(&mut self, signal: Signal) -> PipelineResult<()> {
        self.prev.signal(signal).await?;
        self.buffer.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        test_utils::TestBatchStreamProvider,
        types::{SpanBatch, SpanBatchElement},
    };
    use alloc::vec;

    #[tokio::test]
    async fn test_batch_stream_inactive_passthrough() {
        let cfg = Arc::new(RollupConfig::default());
        let single = SingleBatch { timestamp: 100, ..Default::default() };
        let mut provider =
            TestBatchStreamProvider::new(vec![Ok(Batch::Single(single.clone()))]);
        provider.origin = Some(BlockInfo::default());
        let mut stream = BatchStream::new(provider, cfg);

        let batch = stream.next_batch(Default::default(), &[]).await.unwrap();
        assert_eq!(batch, Batch::Single(single));
    }

    #[tokio::test]
    async fn test_batch_stream_buffers_span_batch() {
        let cfg = Arc::new(RollupConfig {
            holocene_time: Some(0),
            block_time: 2,
            ..Default::default()
        });
        let origins = [BlockInfo { number: 10, ..Default::default() }];
        let span = SpanBatch {
            batches: vec![
                SpanBatchElement { epoch_num: 10, timestamp: 2, ..Default::default() },
                SpanBatchElement { epoch_num: 10, timestamp: 4, ..Default::default() },
            ],
            ..Default::default()
        };
        let mut provider = TestBatchStreamProvider::new(vec![Ok(Batch::Span(span))]);
        provider.origin = Some(BlockInfo::default());
        let mut stream = BatchStream::new(provider, cfg);

        let Batch::Single(first) =
            stream.next_batch(Default::default(), &origins).await.unwrap()
        else {
            panic!("expected single batch");
        };
        assert_eq!(first.timestamp, 2);
        assert_eq!(stream.span_buffer_size(), 1);

        let Batch::Single(second) =
            stream.next_batch(Default::default(), &origins).await.unwrap()
        else {
            panic!("expected single batch");
        };
        assert_eq!(second.timestamp, 4);
        assert_eq!(stream.span_buffer_size(), 0);
    }

    #[tokio::test]
    async fn test_batch_stream_flush_clears_buffer() {
        let cfg = Arc::new(RollupConfig { holocene_time: Some(0), ..Default::default() });
        let mut provider = TestBatchStreamProvider::new(vec![]);
        provider.origin = Some(BlockInfo::default());
        let mut stream = BatchStream::new(provider, cfg);
        stream.buffer.push_back(SingleBatch::default());

        stream.flush();
        assert_eq!(stream.span_buffer_size(), 0);
        assert!(stream.prev.flushed);
    }
}
