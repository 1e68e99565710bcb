//! This module contains the [ChannelAssembler] stage.

use crate::{
    errors::PipelineError,
    traits::{
        ChannelReaderProvider, NextFrameProvider, OriginAdvancer, OriginProvider, SignalReceiver,
    },
    types::{BlockInfo, Channel, PipelineResult, RollupConfig, Signal},
};
use alloc::{boxed::Box, sync::Arc};
use alloy_primitives::Bytes;
use async_trait::async_trait;
use core::fmt::Debug;
use tracing::{debug, warn};

/// The post-Holocene channel stage. At most one channel may be assembled at a
/// time, and frames must arrive strictly ordered: frame 0 opens a channel,
/// and frames for any other channel id are rejected until the current channel
/// completes or times out. This removes all ambiguity about concurrent
/// channels.
#[derive(Debug)]
pub struct ChannelAssembler<P>
where
    P: NextFrameProvider + OriginAdvancer + OriginProvider + SignalReceiver,
{
    /// The rollup configuration.
    cfg: Arc<RollupConfig>,
    /// The previous stage of the derivation pipeline.
    pub(crate) prev: P,
    /// The current [Channel] being assembled.
    pub(crate) channel: Option<Channel>,
}

impl<P> ChannelAssembler<P>
where
    P: NextFrameProvider + OriginAdvancer + OriginProvider + SignalReceiver,
{
    /// Creates a new [ChannelAssembler] stage with the given configuration
    /// and previous stage.
    pub const fn new(cfg: Arc<RollupConfig>, prev: P) -> Self {
        Self { cfg, prev, channel: None }
    }

    /// Consumes [self] and returns the previous stage.
    pub fn into_prev(self) -> P {
        self.prev
    }

    /// Returns whether the channel currently being assembled has timed out.
    pub fn is_timed_out(&self) -> PipelineResult<bool> {
        let origin = self.origin().ok_or(PipelineError::MissingOrigin.crit())?;
        let is_timed_out = self
            .channel
            .as_ref()
            .map(|c| {
                c.open_block_number() + self.cfg.channel_timeout(origin.timestamp) < origin.number
            })
            .unwrap_or_default();

        Ok(is_timed_out)
    }
}

#[async_trait]
impl<P> ChannelReaderProvider for ChannelAssembler<P>
where
    P: NextFrameProvider + OriginAdvancer + OriginProvider + SignalReceiver + Send,
{
    async fn next_data(&mut self) -> PipelineResult<Option<Bytes>> {
        // Time out the current channel if it has been open for too long.
        if self.channel.is_some() && self.is_timed_out()? {
            warn!(target: "channel-assembler", "Channel timed out");
            self.channel = None;
        }

        // If the channel is already completed and has not been forwarded,
        // something went wrong upstream.
        if self.channel.as_ref().map(|c| c.is_ready()).unwrap_or_default() {
            return Err(PipelineError::ChannelAlreadyBuilt.crit());
        }

        let origin = self.origin().ok_or(PipelineError::MissingOrigin.crit())?;

        // Grab the next frame from the previous stage.
        let next_frame = self.prev.next_frame().await?;

        // A frame with number 0 always starts a new channel, replacing any
        // partial one.
        if next_frame.number == 0 {
            self.channel = Some(Channel::new(next_frame.id, origin));
        }

        // A non-first frame without an open channel is dropped.
        if next_frame.number > 0 && self.channel.is_none() {
            debug!(
                target: "channel-assembler",
                "Dropping frame {} for unknown channel {:?}",
                next_frame.number, next_frame.id
            );
            return Ok(None);
        }

        let Some(channel) = self.channel.as_mut() else {
            return Err(PipelineError::ChannelNotFound.crit());
        };

        // Add the frame to the channel. A frame for a foreign channel id or
        // out of order is discarded.
        if channel.add_frame(next_frame, origin).is_err() {
            return Ok(None);
        }

        // If the channel is complete, forward its data to the next stage.
        if channel.is_ready() {
            let channel_bytes =
                channel.frame_data().ok_or(PipelineError::ChannelNotFound.crit())?;
            self.channel = None;
            return Ok(Some(channel_bytes));
        }

        Ok(None)
    }
}

#[async_trait]
impl<P> OriginAdvancer for ChannelAssembler<P>
where
    P: NextFrameProvider + OriginAdvancer + OriginProvider + SignalReceiver + Send,
{
    async fn advance_origin(&mut self) -> PipelineResult<()> {
        self.prev.advance_origin().await
    }
}

impl<P> OriginProvider for ChannelAssembler<P>
where
    P: NextFrameProvider + OriginAdvancer + OriginProvider + SignalReceiver,
{
    fn origin(&self) -> Option<BlockInfo> {
        self.prev.origin()
    }
}

#[async_trait]
impl<P> SignalReceiver for ChannelAssembler<P>
where
    P: NextFrameProvider + OriginAdvancer + OriginProvider + SignalReceiver + Send,
{
    async fn signal(&mut self, signal: Signal) -> PipelineResult<()> {
        self.prev.signal(signal).await?;
        self.channel = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{test_utils::TestNextFrameProvider, types::Frame};
    use alloc::vec;

    fn frame(id: u8, number: u16, is_last: bool) -> Frame {
        Frame { id: [id; 16], number, data: vec![0xFF; 10], is_last }
    }

    fn new_assembler(frames: alloc::vec::Vec<Frame>) -> ChannelAssembler<TestNextFrameProvider> {
        let mut provider =
            TestNextFrameProvider::new(frames.into_iter().rev().map(Ok).collect());
        provider.block_info = Some(BlockInfo::default());
        let cfg = Arc::new(RollupConfig {
            channel_timeout: 10,
            holocene_time: Some(0),
            ..Default::default()
        });
        ChannelAssembler::new(cfg, provider)
    }

    #[tokio::test]
    async fn test_assembler_completes_ordered_channel() {
        let mut assembler =
            new_assembler(vec![frame(0xAA, 0, false), frame(0xAA, 1, true)]);
        assert_eq!(assembler.next_data().await.unwrap(), None);
        let data = assembler.next_data().await.unwrap().unwrap();
        assert_eq!(data.len(), 20);
        assert!(assembler.channel.is_none());
    }

    #[tokio::test]
    async fn test_assembler_drops_foreign_frame() {
        let mut assembler =
            new_assembler(vec![frame(0xAA, 0, false), frame(0xBB, 1, true)]);
        assert_eq!(assembler.next_data().await.unwrap(), None);
        // The foreign frame is rejected; the original channel stays open.
        assert_eq!(assembler.next_data().await.unwrap(), None);
        assert!(assembler.channel.is_some());
    }

    #[tokio::test]
    async fn test_assembler_restarts_on_new_first_frame() {
        let mut assembler =
            new_assembler(vec![frame(0xAA, 0, false), frame(0xBB, 0, true)]);
        assert_eq!(assembler.next_data().await.unwrap(), None);
        // A frame with number 0 replaces the in-progress channel.
        let data = assembler.next_data().await.unwrap().unwrap();
        assert_eq!(data.len(), 10);
    }

    #[tokio::test]
    async fn test_assembler_drops_unopened_channel_frame() {
        let mut assembler = new_assembler(vec![frame(0xAA, 1, true)]);
        assert_eq!(assembler.next_data().await.unwrap(), None);
        assert!(assembler.channel.is_none());
    }

    #[tokio::test]
    async fn test_assembler_times_out_channel() {
        let mut assembler =
            new_assembler(vec![frame(0xAA, 0, false), frame(0xAA, 1, false)]);
        assert_eq!(assembler.next_data().await.unwrap(), None);

        // Advance the origin beyond the channel timeout. The next poll drops
        // the partial channel before reading more frames; the remaining
        // frame has a non-zero number and cannot open a new channel.
        assembler.prev.block_info = Some(BlockInfo { number: 11, ..Default::default() });
        assert!(assembler.is_timed_out().unwrap());
        assert_eq!(assembler.next_data().await.unwrap(), None);
        assert!(assembler.channel.is_none());
    }
}
