//! This module contains the [Frame] type used within the derivation pipeline.

use crate::{
    errors::PipelineEncodingError,
    params::{ChannelID, DERIVATION_VERSION_0, FRAME_OVERHEAD, MAX_FRAME_LEN},
};
use alloc::vec::Vec;

/// A channel frame is a segment of a channel's data.
///
/// *Encoding*
/// frame = `channel_id ++ frame_number ++ frame_data_length ++ frame_data ++ is_last`
/// * channel_id        = bytes16
/// * frame_number      = uint16
/// * frame_data_length = uint32
/// * frame_data        = bytes
/// * is_last           = bool
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Frame {
    /// The unique identifier for the frame.
    pub id: ChannelID,
    /// The number of the frame.
    pub number: u16,
    /// The data within the frame.
    pub data: Vec<u8>,
    /// Whether or not the frame is the last in the sequence.
    pub is_last: bool,
}

impl Frame {
    /// Encode the frame into a byte vector.
    pub fn encode(&self) -> Vec<u8> {
        let mut encoded = Vec::with_capacity(16 + 2 + 4 + self.data.len() + 1);
        encoded.extend_from_slice(&self.id);
        encoded.extend_from_slice(&self.number.to_be_bytes());
        encoded.extend_from_slice(&(self.data.len() as u32).to_be_bytes());
        encoded.extend_from_slice(&self.data);
        encoded.push(self.is_last as u8);
        encoded
    }

    /// Decode a frame from a byte slice, returning the number of bytes
    /// consumed and the decoded frame.
    pub fn decode(encoded: &[u8]) -> Result<(usize, Self), PipelineEncodingError> {
        const BASE_FRAME_LEN: usize = 16 + 2 + 4 + 1;

        if encoded.len() < BASE_FRAME_LEN {
            return Err(PipelineEncodingError::EmptyBuffer);
        }

        let id = encoded[..16].try_into().expect("16 byte slice");
        let number = u16::from_be_bytes(encoded[16..18].try_into().expect("2 byte slice"));
        let data_len =
            u32::from_be_bytes(encoded[18..22].try_into().expect("4 byte slice")) as usize;

        if data_len > MAX_FRAME_LEN || encoded.len() < BASE_FRAME_LEN + data_len {
            return Err(PipelineEncodingError::EmptyBuffer);
        }

        let data = encoded[22..22 + data_len].to_vec();
        let is_last = encoded[22 + data_len] == 1;
        Ok((BASE_FRAME_LEN + data_len, Self { id, number, data, is_last }))
    }

    /// Parse the on-chain serialization of frame(s) in a batcher transaction.
    /// Only version 0 of the serialization format is supported. All frames
    /// must be parsed without error, there must not be any left over data,
    /// and there must be at least one frame.
    ///
    /// Frames are stored in batcher transactions with the following format:
    /// * `data = DerivationVersion0 ++ Frame(s)` where one or more frames are
    ///   concatenated together.
    pub fn parse_frames(encoded: &[u8]) -> Result<Vec<Self>, PipelineEncodingError> {
        if encoded.is_empty() || encoded[0] != DERIVATION_VERSION_0 {
            return Err(PipelineEncodingError::EmptyBuffer);
        }

        let data = &encoded[1..];
        let mut frames = Vec::new();
        let mut offset = 0;
        while offset < data.len() {
            let (frame_length, frame) = Self::decode(&data[offset..])?;
            frames.push(frame);
            offset += frame_length;
        }

        if offset != data.len() || frames.is_empty() {
            return Err(PipelineEncodingError::EmptyBuffer);
        }

        Ok(frames)
    }

    /// Calculates the size of the frame + overhead for storing the frame. The
    /// sum of the frame size of each frame in a channel determines the
    /// channel's size, which is compared against the max channel bank size
    /// when pruning.
    pub fn size(&self) -> usize {
        self.data.len() + FRAME_OVERHEAD
    }
}
