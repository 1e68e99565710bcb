//! This module contains the [SingleBatch] type.

use crate::types::{BatchValidity, BlockInfo, L2BlockInfo, RawTransaction, RollupConfig};
use alloc::vec::Vec;
use alloy_primitives::BlockHash;
use alloy_rlp::{RlpDecodable, RlpEncodable};
use tracing::{info, warn};

/// Represents a single batch: a single encoded L2 block.
#[derive(Debug, Default, Clone, PartialEq, Eq, RlpEncodable, RlpDecodable)]
pub struct SingleBatch {
    /// Block hash of the previous L2 block. `B256::ZERO` if it has not been
    /// set by the Batch Queue.
    pub parent_hash: BlockHash,
    /// The batch epoch number. Same as the first L1 block number in the epoch.
    pub epoch_num: u64,
    /// The block hash of the first L1 block in the epoch
    pub epoch_hash: BlockHash,
    /// The L2 block timestamp of this batch
    pub timestamp: u64,
    /// The L2 block transactions in this batch
    pub transactions: Vec<RawTransaction>,
}

impl SingleBatch {
    /// If any transactions are empty or deposited transaction types.
    pub fn has_invalid_transactions(&self) -> bool {
        self.transactions.iter().any(|tx| tx.is_empty() || tx.is_deposit())
    }

    /// Returns the [BlockInfo]-style epoch id of the batch.
    pub const fn epoch(&self) -> crate::types::BlockID {
        crate::types::BlockID { hash: self.epoch_hash, number: self.epoch_num }
    }

    /// Checks the batch against the validity rules, given the tracked
    /// consecutive `l1_blocks` window (whose first entry is the current
    /// epoch), the L2 safe head the batch would build on, and the L1 block
    /// the batch was included in.
    pub fn check_batch(
        &self,
        cfg: &RollupConfig,
        l1_blocks: &[BlockInfo],
        l2_safe_head: L2BlockInfo,
        inclusion_block: &BlockInfo,
    ) -> BatchValidity {
        if l1_blocks.is_empty() {
            warn!(target: "single-batch", "Missing L1 block input, cannot proceed with batch checking");
            return BatchValidity::Undecided;
        }

        let epoch = l1_blocks[0];
        let next_timestamp = l2_safe_head.block_info.timestamp + cfg.block_time;
        if self.timestamp > next_timestamp {
            return BatchValidity::Future;
        }
        if self.timestamp < next_timestamp {
            warn!(
                target: "single-batch",
                "Dropping batch with old timestamp {}, current next timestamp is {}",
                self.timestamp, next_timestamp
            );
            return BatchValidity::Drop;
        }

        // Dependent on the above timestamp check.
        // If the timestamp is correct, then it must build on top of the safe head.
        if self.parent_hash != l2_safe_head.block_info.hash {
            warn!(
                target: "single-batch",
                "Ignoring batch with mismatching parent hash {}, current safe head is {}",
                self.parent_hash, l2_safe_head.block_info.hash
            );
            return BatchValidity::Drop;
        }

        // Filter out batches that were included too late.
        if self.epoch_num + cfg.seq_window_size < inclusion_block.number {
            warn!(target: "single-batch", "Batch was included too late, sequence window expired");
            return BatchValidity::Drop;
        }

        // Check the L1 origin of the batch.
        let mut batch_origin = epoch;
        if self.epoch_num < epoch.number {
            warn!(target: "single-batch", "Dropped batch, epoch is too old. Minimum epoch is {}", epoch.number);
            return BatchValidity::Drop;
        } else if self.epoch_num == epoch.number {
            // Batch is sticking to the current epoch, continue.
        } else if self.epoch_num == epoch.number + 1 {
            // With only 1 l1 block we cannot look at the next L1 origin.
            // Note: This means that we are unable to determine validity of a
            // batch with the next L1 origin until the next L1 block has been
            // fetched.
            if l1_blocks.len() < 2 {
                info!(target: "single-batch", "Eager batch wants to advance epoch, but could not without more L1 blocks");
                return BatchValidity::Undecided;
            }
            batch_origin = l1_blocks[1];
        } else {
            warn!(target: "single-batch", "Batch is for a future epoch too far ahead, while it has the next timestamp, so it must be invalid");
            return BatchValidity::Drop;
        }

        if self.epoch_hash != batch_origin.hash {
            warn!(
                target: "single-batch",
                "Batch is for different L1 chain, epoch hash does not match, expected: {}",
                batch_origin.hash
            );
            return BatchValidity::Drop;
        }

        if self.timestamp < batch_origin.timestamp {
            warn!(
                target: "single-batch",
                "Batch timestamp {} is less than L1 origin timestamp {}",
                self.timestamp, batch_origin.timestamp
            );
            return BatchValidity::Drop;
        }

        // Check if we ran out of sequencer time drift.
        let max = batch_origin.timestamp + cfg.max_sequencer_drift;
        if self.timestamp > max {
            if self.transactions.is_empty() {
                // If the sequencer is co-operating by producing an empty batch with
                // an old origin, then the batch is only valid if the origin could
                // not have been adopted.
                if self.epoch_num == epoch.number {
                    if l1_blocks.len() < 2 {
                        info!(target: "single-batch", "Without the next L1 origin we cannot determine yet if this empty batch that exceeds the time drift is still valid");
                        return BatchValidity::Undecided;
                    }
                    if self.timestamp >= l1_blocks[1].timestamp {
                        // The batch could have adopted the next L1 origin.
                        warn!(target: "single-batch", "Batch exceeded sequencer time drift without adopting next origin, and next L1 origin would have been valid");
                        return BatchValidity::Drop;
                    }
                }
            } else {
                // In all other cases, a batch that exceeds the drift is invalid.
                warn!(
                    target: "single-batch",
                    "Batch exceeded sequencer time drift, sequencer must adopt new L1 origin to include transactions again. Max time: {}",
                    max
                );
                return BatchValidity::Drop;
            }
        }

        // We can do this check earlier, but it is a more intensive one, so we
        // do it last.
        if self.has_invalid_transactions() {
            warn!(target: "single-batch", "Batch contains an empty or deposit transaction");
            return BatchValidity::Drop;
        }

        BatchValidity::Accept
    }
}
