//! Contains the [SpanBatchElement] type.

use crate::types::{RawTransaction, SingleBatch};
use alloc::vec::Vec;

/// A single block's worth of data within a span batch, in derived form.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SpanBatchElement {
    /// The epoch number of the L1 origin
    pub epoch_num: u64,
    /// The timestamp of the L2 block
    pub timestamp: u64,
    /// The L2 block transactions
    pub transactions: Vec<RawTransaction>,
}

impl From<SingleBatch> for SpanBatchElement {
    fn from(batch: SingleBatch) -> Self {
        Self {
            epoch_num: batch.epoch_num,
            timestamp: batch.timestamp,
            transactions: batch.transactions,
        }
    }
}
