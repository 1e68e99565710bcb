//! This module contains the [Channel] struct.

use crate::{
    params::ChannelID,
    types::{BlockInfo, Frame},
};
use alloc::vec::Vec;
use alloy_primitives::Bytes;
use hashbrown::HashMap;

/// An error occurring while adding a frame to a channel.
#[derive(derive_more::Display, Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ChannelError {
    /// The frame id does not match the channel id.
    #[display("Frame id does not match channel id")]
    FrameIdMismatch,
    /// The channel is closed and cannot accept the frame.
    #[display("Channel is closed")]
    ChannelClosed,
    /// The frame number is already buffered.
    #[display("Duplicate frame")]
    DuplicateFrame,
}

/// A Channel is a set of batches that are split into at least one, but
/// possibly multiple frames. Frames are allowed to be ingested out of order.
/// Each frame is ingested one by one. Once a frame with `is_last` is added to
/// the channel, the channel may mark itself as ready for reading once all
/// intervening frames have been added.
#[derive(Debug, Clone, Default)]
pub struct Channel {
    /// The unique identifier for this channel
    id: ChannelID,
    /// The block that the channel is currently open at
    open_block: BlockInfo,
    /// Estimated memory size, used to drop the channel if we have too much data
    estimated_size: usize,
    /// True if the last frame has been buffered
    closed: bool,
    /// The highest frame number that has been ingested
    highest_frame_number: u16,
    /// The frame number of the frame where `is_last` is true
    /// No other frame number may be higher than this
    last_frame_number: u16,
    /// Store a map of frame number to frame for constant time ordering
    inputs: HashMap<u16, Frame>,
    /// The highest L1 inclusion block that a frame was included in
    highest_l1_inclusion_block: BlockInfo,
}

impl Channel {
    /// Create a new [Channel] with the given [ChannelID] and opening [BlockInfo].
    pub fn new(id: ChannelID, open_block: BlockInfo) -> Self {
        Self { id, open_block, inputs: HashMap::new(), ..Default::default() }
    }

    /// Returns the channel id.
    pub const fn id(&self) -> ChannelID {
        self.id
    }

    /// Add a frame to the channel.
    ///
    /// The frame is rejected if its id does not match the channel's, if it
    /// duplicates a buffered frame number, or if it re-closes an already
    /// closed channel.
    pub(crate) fn add_frame(
        &mut self,
        frame: Frame,
        l1_inclusion_block: BlockInfo,
    ) -> Result<(), ChannelError> {
        if frame.id != self.id {
            return Err(ChannelError::FrameIdMismatch);
        }
        if frame.is_last && self.closed {
            return Err(ChannelError::ChannelClosed);
        }
        if self.inputs.contains_key(&frame.number) {
            return Err(ChannelError::DuplicateFrame);
        }
        if self.closed && frame.number >= self.last_frame_number {
            return Err(ChannelError::ChannelClosed);
        }

        // Guaranteed to succeed at this point. Update the channel state.
        if frame.is_last {
            self.last_frame_number = frame.number;
            self.closed = true;

            // Prune frames with a higher number than the closing frame.
            if self.last_frame_number < self.highest_frame_number {
                let last = self.last_frame_number;
                let mut pruned = 0;
                self.inputs.retain(|number, frame| {
                    let keep = *number < last;
                    if !keep {
                        pruned += frame.size();
                    }
                    keep
                });
                self.estimated_size -= pruned;
                self.highest_frame_number = self.last_frame_number;
            }
        }

        if frame.number > self.highest_frame_number {
            self.highest_frame_number = frame.number;
        }

        if self.highest_l1_inclusion_block.number < l1_inclusion_block.number {
            self.highest_l1_inclusion_block = l1_inclusion_block;
        }

        self.estimated_size += frame.size();
        self.inputs.insert(frame.number, frame);
        Ok(())
    }

    /// Returns the block number of the L1 block that contained the first
    /// [Frame] in this channel.
    pub const fn open_block_number(&self) -> u64 {
        self.open_block.number
    }

    /// Returns the estimated size of the channel including [Frame] overhead.
    pub const fn size(&self) -> usize {
        self.estimated_size
    }

    /// Returns `true` if the channel is closed and all frames are contiguous.
    pub fn is_ready(&self) -> bool {
        if !self.closed {
            return false;
        }
        if self.inputs.len() != (self.last_frame_number + 1) as usize {
            return false;
        }
        (0..=self.last_frame_number).all(|i| self.inputs.contains_key(&i))
    }

    /// Returns the concatenated frame data of the channel, in frame order,
    /// once the channel [is_ready](Self::is_ready).
    pub fn frame_data(&self) -> Option<Bytes> {
        let mut data =
            Vec::with_capacity(self.estimated_size.saturating_sub(self.inputs.len() * 200));
        for number in 0..=self.last_frame_number {
            data.extend_from_slice(&self.inputs.get(&number)?.data);
        }
        Some(data.into())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use alloc::vec;

    fn frame(number: u16, is_last: bool) -> Frame {
        Frame { id: [0xBE; 16], number, data: vec![number as u8; 8], is_last }
    }

    #[test]
    fn test_channel_ready_in_order() {
        let mut channel = Channel::new([0xBE; 16], BlockInfo::default());
        channel.add_frame(frame(0, false), BlockInfo::default()).unwrap();
        assert!(!channel.is_ready());
        channel.add_frame(frame(1, true), BlockInfo::default()).unwrap();
        assert!(channel.is_ready());
        let data = channel.frame_data().unwrap();
        assert_eq!(data.len(), 16);
    }

    #[test]
    fn test_channel_out_of_order_frames() {
        let mut channel = Channel::new([0xBE; 16], BlockInfo::default());
        channel.add_frame(frame(1, true), BlockInfo::default()).unwrap();
        assert!(!channel.is_ready());
        channel.add_frame(frame(0, false), BlockInfo::default()).unwrap();
        assert!(channel.is_ready());
    }

    #[test]
    fn test_channel_rejects_foreign_frame() {
        let mut channel = Channel::new([0x00; 16], BlockInfo::default());
        let err = channel.add_frame(frame(0, false), BlockInfo::default()).unwrap_err();
        assert_eq!(err, ChannelError::FrameIdMismatch);
    }

    #[test]
    fn test_channel_rejects_duplicate_frame() {
        let mut channel = Channel::new([0xBE; 16], BlockInfo::default());
        channel.add_frame(frame(0, false), BlockInfo::default()).unwrap();
        let err = channel.add_frame(frame(0, false), BlockInfo::default()).unwrap_err();
        assert_eq!(err, ChannelError::DuplicateFrame);
    }

    #[test]
    fn test_channel_prunes_frames_past_close() {
        let mut channel = Channel::new([0xBE; 16], BlockInfo::default());
        channel.add_frame(frame(0, false), BlockInfo::default()).unwrap();
        channel.add_frame(frame(3, false), BlockInfo::default()).unwrap();
        channel.add_frame(frame(1, true), BlockInfo::default()).unwrap();
        assert!(channel.is_ready());
        // Frame 3 was pruned when the closing frame arrived.
        assert_eq!(channel.frame_data().unwrap().len(), 16);
    }
}
