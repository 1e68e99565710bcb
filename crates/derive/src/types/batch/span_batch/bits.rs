//! Module for working with span batch bits.

use crate::{errors::SpanBatchError, params::MAX_SPAN_BATCH_ELEMENTS};
use alloc::{vec, vec::Vec};
use alloy_rlp::Buf;
use core::cmp::Ordering;

/// Type for span batch bits.
///
/// The bitlist is encoded as a big-endian integer, left-padded with zeroes to
/// a multiple of 8 bits.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SpanBatchBits(pub Vec<u8>);

impl AsRef<[u8]> for SpanBatchBits {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl SpanBatchBits {
    /// Decodes a standard span-batch bitlist from a reader.
    pub fn decode(b: &mut &[u8], bit_length: usize) -> Result<Self, SpanBatchError> {
        let buffer_len = bit_length / 8 + if bit_length % 8 != 0 { 1 } else { 0 };
        if buffer_len as u64 > MAX_SPAN_BATCH_ELEMENTS {
            return Err(SpanBatchError::TooBigSpanBatchSize);
        }
        if b.len() < buffer_len {
            return Err(SpanBatchError::Decoding(
                crate::errors::SpanDecodingError::BlockCount,
            ));
        }

        let bits = b[..buffer_len].to_vec();
        b.advance(buffer_len);
        let sb_bits = Self(bits);

        if sb_bits.bit_len() > bit_length {
            return Err(SpanBatchError::BitfieldTooLong);
        }

        Ok(sb_bits)
    }

    /// Encodes a standard span-batch bitlist into a writer.
    pub fn encode(
        w: &mut Vec<u8>,
        bit_length: usize,
        bits: &Self,
    ) -> Result<(), SpanBatchError> {
        if bits.bit_len() > bit_length {
            return Err(SpanBatchError::BitfieldTooLong);
        }

        let buf_len = bit_length / 8 + if bit_length % 8 != 0 { 1 } else { 0 };
        if buf_len as u64 > MAX_SPAN_BATCH_ELEMENTS {
            return Err(SpanBatchError::TooBigSpanBatchSize);
        }
        let mut buf = vec![0; buf_len];
        buf[buf_len - bits.0.len()..].copy_from_slice(bits.as_ref());
        w.extend_from_slice(&buf);
        Ok(())
    }

    /// Get a bit from the bitlist, counted from the least significant end.
    pub fn get_bit(&self, index: usize) -> Option<u8> {
        let byte_index = index / 8;
        let bit_index = index % 8;

        if byte_index < self.0.len() {
            let byte = self.0[self.0.len() - byte_index - 1];
            Some(if byte & (1 << bit_index) != 0 { 1 } else { 0 })
        } else {
            None
        }
    }

    /// Sets a bit in the bitlist, zero-extending the backing buffer from the
    /// left if necessary.
    pub fn set_bit(&mut self, index: usize, value: bool) {
        let byte_index = index / 8;
        let bit_index = index % 8;

        if byte_index >= self.0.len() {
            Self::resize_from_right(&mut self.0, byte_index + 1);
        }

        let len = self.0.len();
        let byte = &mut self.0[len - byte_index - 1];

        if value {
            *byte |= 1 << bit_index;
        } else {
            *byte &= !(1 << bit_index);
        }
    }

    /// Calculates the bit length of the bitfield: the position of the most
    /// significant set bit, or 0 if none is set.
    pub fn bit_len(&self) -> usize {
        for (i, &byte) in self.0.iter().enumerate() {
            if byte != 0 {
                let msb_index = 7 - byte.leading_zeros() as usize;
                return msb_index + 1 + ((self.0.len() - i - 1) * 8);
            }
        }
        0
    }

    /// Resizes an array from the right. Useful for big-endian zero extension.
    fn resize_from_right<T: Default + Clone>(vec: &mut Vec<T>, new_size: usize) {
        let current_size = vec.len();
        match new_size.cmp(&current_size) {
            Ordering::Less => {
                let remove_count = current_size - new_size;
                vec.drain(0..remove_count);
            }
            Ordering::Greater => {
                let additional = new_size - current_size;
                let mut prepend_elements = vec![T::default(); additional];
                prepend_elements.append(vec);
                *vec = prepend_elements;
            }
            Ordering::Equal => {}
        }
    }
}
