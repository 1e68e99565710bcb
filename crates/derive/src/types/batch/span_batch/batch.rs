//! The [SpanBatch] type, the derived form of a [RawSpanBatch].

use super::SpanBatchElement;
use crate::{
    errors::SpanBatchError,
    traits::L2ChainProvider,
    types::{BatchValidity, BlockInfo, L2BlockInfo, RollupConfig, SingleBatch},
};
use alloc::vec::Vec;
use alloy_primitives::FixedBytes;
use tracing::{info, warn};

/// The span batch contains the input to build a span of L2 blocks in derived
/// form.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SpanBatch {
    /// First 20 bytes of the first block's parent hash
    pub parent_check: FixedBytes<20>,
    /// First 20 bytes of the last block's L1 origin hash
    pub l1_origin_check: FixedBytes<20>,
    /// List of block input in derived form
    pub batches: Vec<SpanBatchElement>,
}

impl SpanBatch {
    /// Returns the starting timestamp for the first batch in the span.
    ///
    /// ## Safety
    /// Panics if [Self::batches] is empty.
    pub fn starting_timestamp(&self) -> u64 {
        self.batches[0].timestamp
    }

    /// Returns the final timestamp for the last batch in the span.
    ///
    /// ## Safety
    /// Panics if [Self::batches] is empty.
    pub fn ending_timestamp(&self) -> u64 {
        self.batches[self.batches.len() - 1].timestamp
    }

    /// Returns the epoch number for the first batch in the span.
    ///
    /// ## Safety
    /// Panics if [Self::batches] is empty.
    pub fn starting_epoch_num(&self) -> u64 {
        self.batches[0].epoch_num
    }

    /// Returns the epoch number for the last batch in the span.
    ///
    /// ## Safety
    /// Panics if [Self::batches] is empty.
    pub fn ending_epoch_num(&self) -> u64 {
        self.batches[self.batches.len() - 1].epoch_num
    }

    /// Checks if the first 20 bytes of the given hash match the parent check.
    pub fn check_parent_hash(&self, hash: alloy_primitives::B256) -> bool {
        self.parent_check.as_slice() == &hash[..20]
    }

    /// Checks if the first 20 bytes of the given hash match the L1 origin
    /// check.
    pub fn check_origin_hash(&self, hash: alloy_primitives::B256) -> bool {
        self.l1_origin_check.as_slice() == &hash[..20]
    }

    /// Converts all [SpanBatchElement]s after the L2 safe head to
    /// [SingleBatch]es. The resulting [SingleBatch]es do not contain a parent
    /// hash, as it is populated by the batch stage consuming them.
    pub fn get_singular_batches(
        &self,
        l1_origins: &[BlockInfo],
        l2_safe_head: L2BlockInfo,
    ) -> Result<Vec<SingleBatch>, SpanBatchError> {
        let mut single_batches = Vec::new();
        let mut origin_index = 0;
        for batch in &self.batches {
            if batch.timestamp <= l2_safe_head.block_info.timestamp {
                continue;
            }
            let origin_epoch_hash = l1_origins[origin_index..]
                .iter()
                .enumerate()
                .find(|(_, origin)| origin.number == batch.epoch_num)
                .map(|(i, origin)| {
                    origin_index += i;
                    origin.hash
                })
                .ok_or(SpanBatchError::MissingL1Origin)?;
            single_batches.push(SingleBatch {
                epoch_num: batch.epoch_num,
                epoch_hash: origin_epoch_hash,
                timestamp: batch.timestamp,
                transactions: batch.transactions.clone(),
                ..Default::default()
            });
        }
        Ok(single_batches)
    }

    /// Checks the span batch against the validity rules, given the tracked
    /// consecutive `l1_blocks` window, the L2 safe head, and the L1 block the
    /// batch was included in. Overlapped blocks are verified against the
    /// already-safe L2 chain through the `fetcher`.
    pub async fn check_batch<BF: L2ChainProvider>(
        &self,
        cfg: &RollupConfig,
        l1_blocks: &[BlockInfo],
        l2_safe_head: L2BlockInfo,
        inclusion_block: &BlockInfo,
        fetcher: &mut BF,
    ) -> BatchValidity {
        if l1_blocks.is_empty() {
            warn!(target: "span-batch", "Missing L1 block input, cannot proceed with batch checking");
            return BatchValidity::Undecided;
        }
        if self.batches.is_empty() {
            warn!(target: "span-batch", "Empty span batch");
            return BatchValidity::Drop;
        }

        let epoch = l1_blocks[0];
        let starting_epoch_num = self.starting_epoch_num();

        let mut batch_origin = epoch;
        if starting_epoch_num == batch_origin.number + 1 {
            if l1_blocks.len() < 2 {
                info!(target: "span-batch", "Eager batch wants to advance epoch, but could not without more L1 blocks");
                return BatchValidity::Undecided;
            }
            batch_origin = l1_blocks[1];
        }

        // Span batches are only valid after the Delta hardfork.
        if !cfg.is_delta_active(batch_origin.timestamp) {
            warn!(
                target: "span-batch",
                "Received SpanBatch (id {}) with L1 origin (timestamp {}) before Delta hard fork",
                batch_origin.id(), batch_origin.timestamp
            );
            return BatchValidity::Drop;
        }

        let next_timestamp = l2_safe_head.block_info.timestamp + cfg.block_time;
        if self.starting_timestamp() > next_timestamp {
            return BatchValidity::Future;
        }
        if self.ending_timestamp() < next_timestamp {
            warn!(target: "span-batch", "Span batch has no new blocks after safe head");
            return BatchValidity::Drop;
        }

        // The batch must be aligned to the block time grid.
        if (self.starting_timestamp().saturating_sub(cfg.genesis.l2_time)) % cfg.block_time != 0 {
            warn!(target: "span-batch", "Span batch has misaligned timestamp, block time is {}", cfg.block_time);
            return BatchValidity::Drop;
        }

        // Find the parent block of the span batch. If the span batch does not
        // overlap the current safe chain, the parent is the L2 safe head.
        let mut parent_num = l2_safe_head.block_info.number;
        let parent_block = if self.starting_timestamp() < next_timestamp {
            if self.starting_timestamp() < cfg.genesis.l2_time ||
                (self.starting_timestamp() - cfg.genesis.l2_time) % cfg.block_time != 0
            {
                warn!(target: "span-batch", "Span batch has misaligned timestamp, block time is {}", cfg.block_time);
                return BatchValidity::Drop;
            }
            parent_num = l2_safe_head.block_info.number -
                (l2_safe_head.block_info.timestamp - self.starting_timestamp()) / cfg.block_time -
                1;
            if parent_num < cfg.genesis.l2.number {
                warn!(target: "span-batch", "Span batch rewinds past the genesis block");
                return BatchValidity::Drop;
            }
            match fetcher.l2_block_info_by_number(parent_num).await {
                Ok(block) => block,
                Err(e) => {
                    warn!(target: "span-batch", "Failed to fetch L2 block number {parent_num}: {e}");
                    // Cannot validate the batch yet.
                    return BatchValidity::Undecided;
                }
            }
        } else {
            l2_safe_head
        };
        if !self.check_parent_hash(parent_block.block_info.hash) {
            warn!(
                target: "span-batch",
                "Parent check failed, expected {}, found {}",
                parent_block.block_info.hash, self.parent_check
            );
            return BatchValidity::Drop;
        }

        // Filter out batches that were included too late.
        if starting_epoch_num + cfg.seq_window_size < inclusion_block.number {
            warn!(target: "span-batch", "Batch was included too late, sequence window expired");
            return BatchValidity::Drop;
        }

        // Check the L1 origin of the batch.
        if starting_epoch_num > parent_block.l1_origin.number + 1 {
            warn!(
                target: "span-batch",
                "Batch is for future epoch too far ahead, while it has the next timestamp, so it must be invalid"
            );
            return BatchValidity::Drop;
        }

        // Verify the l1 origin hash for each l1 block.
        let end_epoch_num = self.ending_epoch_num();
        let mut origin_checked = false;
        for l1_block in l1_blocks {
            if l1_block.number == end_epoch_num {
                if !self.check_origin_hash(l1_block.hash) {
                    warn!(
                        target: "span-batch",
                        "Batch is for different L1 chain, epoch hash does not match, expected: {}",
                        l1_block.hash
                    );
                    return BatchValidity::Drop;
                }
                origin_checked = true;
                break;
            }
        }
        if !origin_checked {
            info!(target: "span-batch", "Need more l1 blocks to check entire origins of span batch");
            return BatchValidity::Undecided;
        }

        if starting_epoch_num < parent_block.l1_origin.number {
            warn!(target: "span-batch", "Dropped batch, epoch is too old, minimum: {}", parent_block.block_info.id());
            return BatchValidity::Drop;
        }

        // Per-block checks: origin progression, drift, and transaction
        // validity.
        let mut origin_index = 0;
        let mut origin_advanced = starting_epoch_num == parent_block.l1_origin.number + 1;
        for (i, batch) in self.batches.iter().enumerate() {
            if batch.timestamp <= l2_safe_head.block_info.timestamp {
                continue;
            }

            let mut found = false;
            for (j, l1_block) in l1_blocks[origin_index..].iter().enumerate() {
                if batch.epoch_num == l1_block.number {
                    origin_index += j;
                    found = true;
                    break;
                }
            }
            if !found {
                warn!(target: "span-batch", "Need more l1 blocks to check the epoch of the batch");
                return BatchValidity::Undecided;
            }
            let l1_origin = l1_blocks[origin_index];

            if i > 0 {
                origin_advanced = false;
                if batch.epoch_num > self.batches[i - 1].epoch_num {
                    origin_advanced = true;
                }
            }

            let block_timestamp = batch.timestamp;
            if block_timestamp < l1_origin.timestamp {
                warn!(
                    target: "span-batch",
                    "Block timestamp is less than L1 origin timestamp, l2_timestamp: {}, l1_timestamp: {}",
                    block_timestamp, l1_origin.timestamp
                );
                return BatchValidity::Drop;
            }

            // Check if we ran out of sequencer time drift.
            let max = l1_origin.timestamp + cfg.max_sequencer_drift;
            if block_timestamp > max {
                if batch.transactions.is_empty() {
                    // If the sequencer is co-operating by producing an empty
                    // batch with an old origin, then the batch is only valid
                    // if the origin could not have been adopted.
                    if !origin_advanced {
                        if origin_index + 1 >= l1_blocks.len() {
                            info!(target: "span-batch", "Without the next L1 origin we cannot determine yet if this empty batch that exceeds the time drift is still valid");
                            return BatchValidity::Undecided;
                        }
                        if block_timestamp >= l1_blocks[origin_index + 1].timestamp {
                            warn!(target: "span-batch", "Batch exceeded sequencer time drift without adopting next origin, and next L1 origin would have been valid");
                            return BatchValidity::Drop;
                        }
                    }
                } else {
                    warn!(target: "span-batch", "Batch exceeded sequencer time drift, sequencer must adopt new L1 origin to include transactions again, max time: {max}");
                    return BatchValidity::Drop;
                }
            }

            for tx in &batch.transactions {
                if tx.is_empty() {
                    warn!(target: "span-batch", "Transaction data must not be empty, but found empty tx at index {i}");
                    return BatchValidity::Drop;
                }
                if tx.is_deposit() {
                    warn!(target: "span-batch", "Sequencers may not embed any deposits into batch data, but found tx that has one at index: {i}");
                    return BatchValidity::Drop;
                }
            }
        }

        // Check overlapped blocks against the existing safe chain.
        if self.starting_timestamp() < next_timestamp {
            for i in 0..(l2_safe_head.block_info.number - parent_num) {
                let safe_block_num = parent_num + i + 1;
                let safe_block = match fetcher.l2_block_info_by_number(safe_block_num).await {
                    Ok(block) => block,
                    Err(e) => {
                        warn!(target: "span-batch", "Failed to fetch L2 block number {safe_block_num}: {e}");
                        return BatchValidity::Undecided;
                    }
                };
                let batch = &self.batches[i as usize];
                if batch.timestamp != safe_block.block_info.timestamp {
                    warn!(
                        target: "span-batch",
                        "Overlapped block's timestamp does not match, safe: {}, batch: {}",
                        safe_block.block_info.timestamp, batch.timestamp
                    );
                    return BatchValidity::Drop;
                }
                let safe_block_txs = match fetcher.payload_by_number(safe_block_num).await {
                    Ok(txs) => txs,
                    Err(e) => {
                        warn!(target: "span-batch", "Failed to fetch payload for L2 block number {safe_block_num}: {e}");
                        return BatchValidity::Undecided;
                    }
                };
                let batch_txs = &batch.transactions;
                // Execution payloads can contain deposit transactions that
                // are not part of the batch.
                let deposit_count = safe_block_txs.iter().filter(|tx| tx.is_deposit()).count();
                if safe_block_txs.len() - deposit_count != batch_txs.len() {
                    warn!(
                        target: "span-batch",
                        "Overlapped block's tx count does not match, safe: {}, batch: {}",
                        safe_block_txs.len(), batch_txs.len()
                    );
                    return BatchValidity::Drop;
                }
                for (j, tx) in safe_block_txs.iter().skip(deposit_count).enumerate() {
                    if tx != &batch_txs[j] {
                        warn!(target: "span-batch", "Overlapped block's transaction does not match");
                        return BatchValidity::Drop;
                    }
                }
                if safe_block.l1_origin.number != batch.epoch_num {
                    warn!(target: "span-batch", "Overlapped block's L1 origin number does not match");
                    return BatchValidity::Drop;
                }
            }
        }

        BatchValidity::Accept
    }
}
