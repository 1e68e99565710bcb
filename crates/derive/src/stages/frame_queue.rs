//! Contains the [FrameQueue] stage of the derivation pipeline.

use crate::{
    errors::PipelineError,
    traits::{
        FrameQueueProvider, NextFrameProvider, OriginAdvancer, OriginProvider, SignalReceiver,
    },
    types::{BlockInfo, Frame, PipelineResult, Signal},
};
use alloc::{boxed::Box, collections::VecDeque};
use async_trait::async_trait;
use core::fmt::Debug;
use tracing::trace;

/// The [FrameQueue] stage of the derivation pipeline.
///
/// Parses the raw payloads pulled from the retrieval stage into [Frame]s and
/// serves them one at a time. Payloads that do not parse into any frame are
/// dropped silently; the authorization filtering happened a stage below.
#[derive(Debug)]
pub struct FrameQueue<P>
where
    P: FrameQueueProvider + OriginAdvancer + OriginProvider + SignalReceiver,
{
    /// The previous stage in the pipeline.
    pub prev: P,
    /// The current frame queue.
    queue: VecDeque<Frame>,
}

impl<P> FrameQueue<P>
where
    P: FrameQueueProvider + OriginAdvancer + OriginProvider + SignalReceiver,
{
    /// Creates a new [FrameQueue] stage.
    pub const fn new(prev: P) -> Self {
        Self { prev, queue: VecDeque::new() }
    }
}

#[async_trait]
impl<P> NextFrameProvider for FrameQueue<P>
where
    P: FrameQueueProvider + OriginAdvancer + OriginProvider + SignalReceiver + Send,
{
    async fn next_frame(&mut self) -> PipelineResult<Frame> {
        if self.queue.is_empty() {
            let data = self.prev.next_data().await?;
            if let Ok(frames) = Frame::parse_frames(data.as_ref()) {
                self.queue.extend(frames);
            } else {
                trace!(target: "frame-queue", "Failed to parse frames from data of len {}", data.len());
            }
        }

        // If we did not add more frames but still have more data, retry.
        self.queue.pop_front().ok_or(PipelineError::NotEnoughData.temp())
    }
}

#[async_trait]
impl<P> OriginAdvancer for FrameQueue<P>
where
    P: FrameQueueProvider + OriginAdvancer + OriginProvider + SignalReceiver + Send,
{
    async fn advance_origin(&mut self) -> PipelineResult<()> {
        self.prev.advance_origin().await
    }
}

impl<P> OriginProvider for FrameQueue<P>
where
    P: FrameQueueProvider + OriginAdvancer + OriginProvider + SignalReceiver,
{
    fn origin(&self) -> Option<BlockInfo> {
        self.prev.origin()
    }
}

#[async_trait]
impl<P> SignalReceiver for FrameQueue<P>
where
    P: FrameQueueProvider + OriginAdvancer + OriginProvider + SignalReceiver + Send,
{
    async fn signal(&mut self, signal: Signal) -> PipelineResult<()> {
        self.prev.signal(signal).await?;
        if !matches!(signal, Signal::FlushChannel) {
            self.queue = VecDeque::default();
        }
        Ok(())
    }
}
