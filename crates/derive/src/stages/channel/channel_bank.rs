//! This module contains the [ChannelBank] stage.

use crate::{
    errors::PipelineError,
    params::{ChannelID, MAX_CHANNEL_BANK_SIZE},
    traits::{
        ChannelReaderProvider, NextFrameProvider, OriginAdvancer, OriginProvider, SignalReceiver,
    },
    types::{BlockInfo, Channel, Frame, PipelineResult, RollupConfig, Signal},
};
use alloc::{boxed::Box, collections::VecDeque, sync::Arc};
use alloy_primitives::Bytes;
use async_trait::async_trait;
use core::fmt::Debug;
use hashbrown::HashMap;
use tracing::{trace, warn};

/// [ChannelBank] is the pre-Holocene channel stage. It does the following:
/// 1. Buffers frames for multiple concurrent channel ids.
/// 2. Evicts channels whose age in L1 blocks exceeds the channel timeout.
/// 3. Reads the oldest completed channel's data, in FIFO order.
/// 4. Prunes channels (not frames) when the bank grows too large.
///
/// Note: the bank prunes before it ingests; it is allowed to become too large
/// between successive calls to `ingest_frame`.
#[derive(Debug)]
pub struct ChannelBank<P>
where
    P: NextFrameProvider + OriginAdvancer + OriginProvider + SignalReceiver,
{
    /// The rollup configuration.
    cfg: Arc<RollupConfig>,
    /// Map of channels by ID.
    channels: HashMap<ChannelID, Channel>,
    /// Channels in FIFO order.
    channel_queue: VecDeque<ChannelID>,
    /// The previous stage of the derivation pipeline.
    pub(crate) prev: P,
}

impl<P> ChannelBank<P>
where
    P: NextFrameProvider + OriginAdvancer + OriginProvider + SignalReceiver,
{
    /// Create a new [ChannelBank] stage.
    pub fn new(cfg: Arc<RollupConfig>, prev: P) -> Self {
        Self { cfg, channels: HashMap::new(), channel_queue: VecDeque::new(), prev }
    }

    /// Consumes [self] and returns the previous stage.
    pub fn into_prev(self) -> P {
        self.prev
    }

    /// Prunes the bank until it is below [MAX_CHANNEL_BANK_SIZE], dropping
    /// the oldest channels first.
    fn prune(&mut self) -> PipelineResult<()> {
        let mut total_size = self.channels.iter().fold(0, |acc, (_, c)| acc + c.size());
        while total_size > MAX_CHANNEL_BANK_SIZE {
            let id =
                self.channel_queue.pop_front().ok_or(PipelineError::ChannelProviderEmpty.crit())?;
            let channel =
                self.channels.remove(&id).ok_or(PipelineError::ChannelNotFound.crit())?;
            warn!(target: "channel-bank", "Pruning channel {:?} of size {}", id, channel.size());
            total_size -= channel.size();
        }
        Ok(())
    }

    /// Adds new L1 data to the channel bank. Should only be called after all
    /// data has been read.
    fn ingest_frame(&mut self, frame: Frame) -> PipelineResult<()> {
        let origin = self.origin().ok_or(PipelineError::MissingOrigin.crit())?;

        // Create a new channel if the frame opens one.
        let current_channel = self.channels.entry(frame.id).or_insert_with(|| {
            self.channel_queue.push_back(frame.id);
            Channel::new(frame.id, origin)
        });

        // If the channel has timed out, ignore the frame.
        if current_channel.open_block_number() + self.cfg.channel_timeout(origin.timestamp) <
            origin.number
        {
            return Ok(());
        }

        // Ingest the frame. If it fails, ignore the frame.
        let frame_id = frame.id;
        if current_channel.add_frame(frame, origin).is_err() {
            trace!(target: "channel-bank", "Dropped invalid frame for channel {frame_id:?}");
            return Ok(());
        }

        self.prune()
    }

    /// Reads the raw data of the first channel if it is ready, removing timed
    /// out channels from the head of the queue along the way.
    fn read(&mut self) -> PipelineResult<Option<Bytes>> {
        if self.channel_queue.is_empty() {
            return Err(PipelineError::Eof.temp());
        }

        // Return `Ok(None)` if the first channel is timed out. There may be
        // more timed out channels at the head of the queue and we want to
        // remove them all.
        let first = self.channel_queue[0];
        let channel = self.channels.get(&first).ok_or(PipelineError::ChannelNotFound.crit())?;
        let origin = self.origin().ok_or(PipelineError::MissingOrigin.crit())?;
        if channel.open_block_number() + self.cfg.channel_timeout(origin.timestamp) <
            origin.number
        {
            warn!(target: "channel-bank", "Channel {:?} timed out", first);
            self.channels.remove(&first);
            self.channel_queue.pop_front();
            return Ok(None);
        }

        // At this point all timed out channels have been removed from the
        // front of the queue. Pre-Canyon, only the first channel is
        // considered. Post-Canyon, the entire queue is scanned for the first
        // ready channel. Canyon activates with the L1 inclusion block time.
        if !self.cfg.is_canyon_active(origin.timestamp) {
            return self.try_read_channel_at_index(0).map(Some);
        }

        let channel_data =
            (0..self.channel_queue.len()).find_map(|i| self.try_read_channel_at_index(i).ok());
        channel_data.map(Some).ok_or(PipelineError::Eof.temp())
    }

    /// Attempts to read the channel at the specified index. If the channel is
    /// not ready or timed out, it will return an error. A successful read
    /// removes the channel from the bank.
    fn try_read_channel_at_index(&mut self, index: usize) -> PipelineResult<Bytes> {
        let channel_id = self.channel_queue[index];
        let channel =
            self.channels.get(&channel_id).ok_or(PipelineError::ChannelNotFound.crit())?;
        let origin = self.origin().ok_or(PipelineError::MissingOrigin.crit())?;

        let timed_out = channel.open_block_number() +
            self.cfg.channel_timeout(origin.timestamp) <
            origin.number;
        if timed_out || !channel.is_ready() {
            return Err(PipelineError::Eof.temp());
        }

        let frame_data = channel.frame_data();
        self.channels.remove(&channel_id);
        self.channel_queue.remove(index);

        frame_data.ok_or(PipelineError::ChannelNotFound.crit())
    }
}

#[async_trait]
impl<P> ChannelReaderProvider for ChannelBank<P>
where
    P: NextFrameProvider + OriginAdvancer + OriginProvider + SignalReceiver + Send,
{
    async fn next_data(&mut self) -> PipelineResult<Option<Bytes>> {
        match self.read() {
            Err(e) => {
                if !matches!(e, crate::errors::PipelineErrorKind::Temporary(PipelineError::Eof)) {
                    return Err(e);
                }
                // The bank is empty or has no ready channel; load more frames.
            }
            data => return data,
        }

        // Load the data into the channel bank.
        let frame = self.prev.next_frame().await?;
        self.ingest_frame(frame)?;
        Err(PipelineError::NotEnoughData.temp())
    }
}

#[async_trait]
impl<P> OriginAdvancer for ChannelBank<P>
where
    P: NextFrameProvider + OriginAdvancer + OriginProvider + SignalReceiver + Send,
{
    async fn advance_origin(&mut self) -> PipelineResult<()> {
        self.prev.advance_origin().await
    }
}

impl<P> OriginProvider for ChannelBank<P>
where
    P: NextFrameProvider + OriginAdvancer + OriginProvider + SignalReceiver,
{
    fn origin(&self) -> Option<BlockInfo> {
        self.prev.origin()
    }
}

#[async_trait]
impl<P> SignalReceiver for ChannelBank<P>
where
    P: NextFrameProvider + OriginAdvancer + OriginProvider + SignalReceiver + Send,
{
    async fn signal(&mut self, signal: Signal) -> PipelineResult<()> {
        self.prev.signal(signal).await?;
        if !matches!(signal, Signal::FlushChannel) {
            self.channels.clear();
            self.channel_queue = VecDeque::with_capacity(10);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{errors::PipelineErrorKind, test_utils::TestNextFrameProvider};
    use alloc::vec;

    fn frame(id: u8, number: u16, is_last: bool) -> Frame {
        Frame { id: [id; 16], number, data: vec![0xFF; 10], is_last }
    }

    fn new_bank(frames: Vec<Frame>) -> ChannelBank<TestNextFrameProvider> {
        let mut provider = TestNextFrameProvider::new(frames.into_iter().rev().map(Ok).collect());
        provider.block_info = Some(BlockInfo::default());
        let cfg = Arc::new(RollupConfig { channel_timeout: 10, ..Default::default() });
        ChannelBank::new(cfg, provider)
    }

    #[tokio::test]
    async fn test_channel_bank_completes_single_frame_channel() {
        let mut bank = new_bank(vec![frame(0xAA, 0, true)]);

        // First call ingests the frame and asks for another step.
        assert_eq!(bank.next_data().await.unwrap_err(), PipelineError::NotEnoughData.temp());
        // Second call reads the completed channel.
        let data = bank.next_data().await.unwrap().unwrap();
        assert_eq!(data.len(), 10);
    }

    #[tokio::test]
    async fn test_channel_bank_multi_frame_out_of_order() {
        let mut bank = new_bank(vec![frame(0xAA, 1, true), frame(0xAA, 0, false)]);

        assert_eq!(bank.next_data().await.unwrap_err(), PipelineError::NotEnoughData.temp());
        assert_eq!(bank.next_data().await.unwrap_err(), PipelineError::NotEnoughData.temp());
        let data = bank.next_data().await.unwrap().unwrap();
        assert_eq!(data.len(), 20);
    }

    #[tokio::test]
    async fn test_channel_bank_timed_out_channel_is_dropped() {
        let mut bank = new_bank(vec![frame(0xAA, 0, false)]);
        assert_eq!(bank.next_data().await.unwrap_err(), PipelineError::NotEnoughData.temp());

        // Advance the origin beyond the channel timeout.
        bank.prev.block_info = Some(BlockInfo { number: 11, ..Default::default() });
        assert_eq!(bank.next_data().await.unwrap(), None);
        assert!(bank.channels.is_empty());
    }

    #[tokio::test]
    async fn test_channel_bank_missing_origin_is_critical() {
        let mut bank = new_bank(vec![frame(0xAA, 0, true)]);
        bank.prev.block_info = None;
        assert!(matches!(
            bank.next_data().await.unwrap_err(),
            PipelineErrorKind::Critical(PipelineError::MissingOrigin)
        ));
    }

    #[tokio::test]
    async fn test_channel_bank_reset_clears_state() {
        let mut bank = new_bank(vec![frame(0xAA, 0, false)]);
        assert_eq!(bank.next_data().await.unwrap_err(), PipelineError::NotEnoughData.temp());
        assert_eq!(bank.channels.len(), 1);

        bank.signal(crate::types::ResetSignal::default().signal()).await.unwrap();
        assert!(bank.channels.is_empty());
        assert!(bank.channel_queue.is_empty());
    }
}
