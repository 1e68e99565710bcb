//! This module contains the [BatchQueue] stage implementation.

use crate::{
    errors::{PipelineEncodingError, PipelineError, PipelineErrorKind, ResetError},
    traits::{
        AttributesProvider, L2ChainProvider, NextBatchProvider, OriginAdvancer, OriginProvider,
        SignalReceiver,
    },
    types::{
        ActivationSignal, Batch, BatchValidity, BatchWithInclusionBlock, BlockInfo, L2BlockInfo,
        PipelineResult, ResetSignal, RollupConfig, Signal, SingleBatch,
    },
};
use alloc::{boxed::Box, sync::Arc, vec::Vec};
use async_trait::async_trait;
use core::fmt::Debug;
use tracing::{error, info, warn};

/// [BatchQueue] is the pre-Holocene batch stage, responsible for ordering
/// unordered batches and generating empty batches when the sequence window
/// has passed.
///
/// It receives batches that are tagged with the L1 inclusion block of the
/// batch. It only considers batches that are inside the sequencing window of
/// a specific L1 origin. It tries to eagerly pull batches based on the
/// current L2 safe head. Otherwise it filters/creates an entire epoch's worth
/// of batches at once.
///
/// This stage tracks a range of L1 blocks with the assumption that all
/// batches with an L1 inclusion block inside that range have been added to
/// the stage by the time that it attempts to advance a full epoch.
///
/// It is internally responsible for making sure that batches with L1
/// inclusion blocks outside its working range are not considered or pruned.
#[derive(Debug)]
pub struct BatchQueue<P, BF>
where
    P: NextBatchProvider + OriginAdvancer + OriginProvider + SignalReceiver,
    BF: L2ChainProvider,
{
    /// The rollup config.
    pub(crate) cfg: Arc<RollupConfig>,
    /// The previous stage of the derivation pipeline.
    pub(crate) prev: P,
    /// The L1 origin of the batch sequencer.
    pub(crate) origin: Option<BlockInfo>,
    /// A consecutive, time-centric window of L1 blocks.
    /// Every L1 origin of unsafe L2 blocks must be included in this list.
    /// If every L2 block corresponding to a single L1 block becomes safe,
    /// the block is popped from this list.
    /// If a new L2 block's L1 origin is not included in this list, fetch and
    /// push it to the list.
    pub(crate) l1_blocks: Vec<BlockInfo>,
    /// A set of batches in order from when we've seen them.
    batches: Vec<BatchWithInclusionBlock>,
    /// A set of cached [SingleBatch]es derived from [SpanBatch]es.
    ///
    /// [SpanBatch]: crate::types::SpanBatch
    next_spans: Vec<SingleBatch>,
    /// Used to validate the batches.
    fetcher: BF,
}

impl<P, BF> BatchQueue<P, BF>
where
    P: NextBatchProvider + OriginAdvancer + OriginProvider + SignalReceiver,
    BF: L2ChainProvider,
{
    /// Creates a new [BatchQueue] stage.
    pub const fn new(cfg: Arc<RollupConfig>, prev: P, fetcher: BF) -> Self {
        Self {
            cfg,
            prev,
            origin: None,
            l1_blocks: Vec::new(),
            batches: Vec::new(),
            next_spans: Vec::new(),
            fetcher,
        }
    }

    /// Consumes [self] and returns the previous stage, the tracked window,
    /// the stage origin, and the L2 fetcher.
    pub fn into_parts(self) -> (P, Vec<BlockInfo>, Option<BlockInfo>, BF) {
        (self.prev, self.l1_blocks, self.origin, self.fetcher)
    }

    /// Pops the next batch from the current queued up span-batch cache.
    /// The parent is used to set the parent hash of the batch.
    /// The parent is verified when the batch is later validated.
    pub fn pop_next_batch(&mut self, parent: L2BlockInfo) -> Option<SingleBatch> {
        if self.next_spans.is_empty() {
            panic!("Invalid state: must have next spans to pop");
        }
        let mut next = self.next_spans.remove(0);
        next.parent_hash = parent.block_info.hash;
        Some(next)
    }

    /// Derives the next batch to apply on top of the current L2 safe head.
    /// Follows the validity rules imposed on consecutive batches, based on
    /// the currently available buffered batch and L1 origin information.
    /// A [PipelineError::Eof] is returned if no batch can be derived yet.
    pub async fn derive_next_batch(
        &mut self,
        empty: bool,
        parent: L2BlockInfo,
    ) -> PipelineResult<Batch> {
        // Cannot derive a batch if no origin was prepared.
        if self.l1_blocks.is_empty() {
            return Err(PipelineError::MissingOrigin.crit());
        }

        // Get the epoch
        let epoch = self.l1_blocks[0];
        info!(target: "batch-queue", "Deriving next batch for epoch: {}", epoch.number);

        // Note: epoch origin can now be one block ahead of the L2 Safe Head
        // This is in the case where we auto generate all batches in an epoch
        // and advance the epoch but don't advance the L2 Safe Head's epoch
        if parent.l1_origin != epoch.id() && parent.l1_origin.number != epoch.number - 1 {
            return Err(PipelineErrorKind::Reset(ResetError::L1OriginMismatch(
                parent.l1_origin.number,
                epoch.number - 1,
            )));
        }

        // Find the first-seen batch that matches all validity conditions.
        // We may not have sufficient information to proceed filtering, and
        // then we stop. There may be none: in that case we force-create an
        // empty batch.
        let mut next_batch = None;
        let next_timestamp = parent.block_info.timestamp + self.cfg.block_time;

        // Go over all batches, in order of inclusion, and find the first
        // batch we can accept. Filter in-place by only remembering the
        // batches that may be processed in the future, or any undecided ones.
        let mut remaining = Vec::new();
        for i in 0..self.batches.len() {
            let batch = &self.batches[i];
            let validity =
                batch.check_batch(&self.cfg, &self.l1_blocks, parent, &mut self.fetcher).await;
            match validity {
                BatchValidity::Future => {
                    remaining.push(batch.clone());
                }
                BatchValidity::Drop => {
                    warn!(target: "batch-queue", "Dropping batch with parent: {}", parent.block_info);
                    continue;
                }
                BatchValidity::Accept => {
                    next_batch = Some(batch.clone());
                    // Don't keep the current batch in the remaining items
                    // since we are processing it now, but retain every batch
                    // we didn't get to yet.
                    remaining.extend_from_slice(&self.batches[i + 1..]);
                    break;
                }
                BatchValidity::Undecided => {
                    remaining.extend_from_slice(&self.batches[i..]);
                    self.batches = remaining;
                    return Err(PipelineError::Eof.temp());
                }
            }
        }
        self.batches = remaining;

        if let Some(nb) = next_batch {
            info!(target: "batch-queue", "Next batch found for timestamp {}", nb.batch.timestamp());
            return Ok(nb.batch);
        }

        // If the current epoch is too old compared to the L1 block we are at,
        // i.e. if the sequence window expired, we create empty batches for
        // the current epoch.
        let expiry_epoch = epoch.number + self.cfg.seq_window_size;
        let bq_origin = self.origin.ok_or(PipelineError::MissingOrigin.crit())?;
        let force_empty_batches =
            (expiry_epoch == bq_origin.number && empty) || expiry_epoch < bq_origin.number;
        let first_of_epoch = epoch.number == parent.l1_origin.number + 1;

        // If the sequencer window did not expire, there is still room to
        // receive batches for the current epoch. No need to force-create
        // empty batch(es) towards the next epoch yet.
        if !force_empty_batches {
            return Err(PipelineError::Eof.temp());
        }

        info!(
            target: "batch-queue",
            "Generating empty batches for epoch: {} | parent: {}",
            epoch.number, parent.l1_origin.number
        );

        // The next L1 block is needed to proceed towards the next epoch.
        if self.l1_blocks.len() < 2 {
            return Err(PipelineError::Eof.temp());
        }

        let next_epoch = self.l1_blocks[1];

        // Fill with empty L2 blocks of the same epoch until we meet the time
        // of the next L1 origin, to preserve that L2 time >= L1 time. If this
        // is the first block of the epoch, always generate a batch to ensure
        // that we at least have one batch per epoch.
        if next_timestamp < next_epoch.timestamp || first_of_epoch {
            info!(target: "batch-queue", "Generating empty batch for epoch: {}", epoch.number);
            return Ok(Batch::Single(SingleBatch {
                parent_hash: parent.block_info.hash,
                epoch_num: epoch.number,
                epoch_hash: epoch.hash,
                timestamp: next_timestamp,
                transactions: Vec::new(),
            }));
        }

        // At this point we have auto generated every batch for the current
        // epoch that we can, so we can advance to the next epoch.
        info!(
            target: "batch-queue",
            "Advancing to next epoch: {}, timestamp: {}, epoch timestamp: {}",
            next_epoch.number, next_timestamp, next_epoch.timestamp
        );
        self.l1_blocks.remove(0);
        Err(PipelineError::Eof.temp())
    }

    /// Adds a batch to the queue.
    pub async fn add_batch(&mut self, batch: Batch, parent: L2BlockInfo) -> PipelineResult<()> {
        if self.l1_blocks.is_empty() {
            error!(target: "batch-queue", "Cannot add batch without an origin");
            panic!("Cannot add batch without an origin");
        }
        let origin = self.origin.ok_or(PipelineError::MissingOrigin.crit())?;
        let data = BatchWithInclusionBlock { inclusion_block: origin, batch };
        // If we drop the batch, validation logs the drop reason with WARN
        // level.
        if data.check_batch(&self.cfg, &self.l1_blocks, parent, &mut self.fetcher).await.is_drop()
        {
            return Ok(());
        }
        self.batches.push(data);
        Ok(())
    }
}

#[async_trait]
impl<P, BF> AttributesProvider for BatchQueue<P, BF>
where
    P: NextBatchProvider + OriginAdvancer + OriginProvider + SignalReceiver + Send,
    BF: L2ChainProvider + Send,
{
    /// Returns the next valid batch upon the given safe head.
    async fn next_batch(&mut self, parent: L2BlockInfo) -> PipelineResult<SingleBatch> {
        if !self.next_spans.is_empty() {
            // There are cached singular batches derived from a span batch.
            // Check if the next cached batch matches the given parent block.
            if self.next_spans[0].timestamp == parent.block_info.timestamp + self.cfg.block_time {
                return self.pop_next_batch(parent).ok_or(PipelineError::BatchQueueEmpty.crit());
            }
            // Parent block does not match the next batch, means the
            // previously returned batch is invalid. Drop cached batches and
            // find another batch.
            warn!(
                target: "batch-queue",
                "Parent block does not match the next batch. Dropping {} cached batches.",
                self.next_spans.len()
            );
            self.next_spans.clear();
        }

        // If the epoch is advanced, update the l1 blocks.
        // Advancing epoch must be done after the pipeline successfully
        // applied the entire span batch to the chain.
        // Because the span batch can be reverted during processing the batch,
        // then we must preserve existing l1 blocks to verify the epochs of
        // the next candidate batch.
        if !self.l1_blocks.is_empty() && parent.l1_origin.number > self.l1_blocks[0].number {
            for (i, block) in self.l1_blocks.iter().enumerate() {
                if parent.l1_origin.number == block.number {
                    self.l1_blocks.drain(0..i);
                    info!(target: "batch-queue", "Advancing epoch");
                    break;
                }
            }
            // If the origin of the parent block is not included, we must
            // advance the origin.
        }

        // The origin is used to determine if it's behind.
        // It is the future origin that gets saved into the l1 blocks array.
        // We always update the origin of this stage if it's not the same so
        // after the update code runs, this is consistent.
        let origin_behind =
            self.prev.origin().map_or(true, |origin| origin.number < parent.l1_origin.number);

        // Advance the origin if needed.
        // The entire pipeline has the same origin.
        // Batches prior to the l1 origin of the l2 safe head are not accepted.
        if self.origin != self.prev.origin() {
            self.origin = self.prev.origin();
            if !origin_behind {
                let origin = self.origin.as_ref().ok_or(PipelineError::MissingOrigin.crit())?;
                self.l1_blocks.push(*origin);
            } else {
                // This is to handle the special case of startup.
                // At startup, the batch queue is reset and includes the
                // l1 origin. That is the only time where immediately after
                // reset is called, the origin behind is false.
                self.l1_blocks.clear();
            }
            info!(target: "batch-queue", "Advancing batch queue origin: {:?}", self.origin);
        }

        // Load more data into the batch queue.
        let mut out_of_data = false;
        match self.prev.next_batch(parent, &self.l1_blocks).await {
            Ok(b) => {
                if !origin_behind {
                    self.add_batch(b, parent).await.ok();
                } else {
                    warn!(target: "batch-queue", "Dropping batch: Origin is behind");
                }
            }
            Err(e) => {
                if let PipelineErrorKind::Temporary(PipelineError::Eof) = e {
                    out_of_data = true;
                } else {
                    return Err(e);
                }
            }
        }

        // Skip adding the data unless up to date with the origin, but still
        // fully empty the previous stages.
        if origin_behind {
            if out_of_data {
                return Err(PipelineError::Eof.temp());
            }
            return Err(PipelineError::NotEnoughData.temp());
        }

        // Attempt to derive more batches.
        let batch = match self.derive_next_batch(out_of_data, parent).await {
            Ok(b) => b,
            Err(e) => match e {
                PipelineErrorKind::Temporary(PipelineError::Eof) => {
                    if out_of_data {
                        return Err(PipelineError::Eof.temp());
                    }
                    return Err(PipelineError::NotEnoughData.temp());
                }
                _ => return Err(e),
            },
        };

        // If the next batch is derived from a span batch, it's the last batch
        // of the span. For singular batches, the span batch cache should be
        // empty.
        match batch {
            Batch::Single(sb) => Ok(sb),
            Batch::Span(sb) => {
                let batches = sb.get_singular_batches(&self.l1_blocks, parent).map_err(|e| {
                    PipelineError::BadEncoding(PipelineEncodingError::SpanBatchError(e)).crit()
                })?;
                self.next_spans = batches;
                self.pop_next_batch(parent).ok_or(PipelineError::BatchQueueEmpty.crit())
            }
        }
    }

    /// Returns if the previous batch was the last in the span.
    fn is_last_in_span(&self) -> bool {
        self.next_spans.is_empty()
    }
}

#[async_trait]
impl<P, BF> OriginAdvancer for BatchQueue<P, BF>
where
    P: NextBatchProvider + OriginAdvancer + OriginProvider + SignalReceiver + Send,
    BF: L2ChainProvider + Send,
{
    async fn advance_origin(&mut self) -> PipelineResult<()> {
        self.prev.advance_origin().await
    }
}

impl<P, BF> OriginProvider for BatchQueue<P, BF>
where
    P: NextBatchProvider + OriginAdvancer + OriginProvider + SignalReceiver,
    BF: L2ChainProvider,
{
    fn origin(&self) -> Option<BlockInfo> {
        self.prev.origin()
    }
}

#[async_trait]
impl<P, BF> SignalReceiver for BatchQueue<P, BF>
where
    P: NextBatchProvider + OriginAdvancer + OriginProvider + SignalReceiver + Send,
    BF: L2ChainProvider + Send,
{
    async fn signal(&mut self, signal: Signal) -> PipelineResult<()> {
        match signal {
            s @ Signal::Reset(ResetSignal { l1_origin, .. }) |
            s @ Signal::Activation(ActivationSignal { l1_origin, .. }) => {
                self.prev.signal(s).await?;
                self.origin = Some(l1_origin);
                self.batches.clear();
                // Include the new origin as an origin to build on.
                // This is only for the initialization case.
                // During normal resets we will later throw out this block.
                self.l1_blocks.clear();
                self.l1_blocks.push(l1_origin);
                self.next_spans.clear();
            }
            s @ Signal::FlushChannel => {
                self.prev.signal(s).await?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{TestL2ChainProvider, TestNextBatchProvider};
    use alloc::vec;
    use alloy_primitives::b256;

    #[tokio::test]
    async fn test_derive_next_batch_missing_origin() {
        let data = vec![Ok(Batch::Single(SingleBatch::default()))];
        let cfg = Arc::new(RollupConfig::default());
        let mock = TestNextBatchProvider::new(data);
        let fetcher = TestL2ChainProvider::default();
        let mut bq = BatchQueue::new(cfg, mock, fetcher);
        let parent = L2BlockInfo::default();
        let result = bq.derive_next_batch(false, parent).await.unwrap_err();
        assert_eq!(result, PipelineError::MissingOrigin.crit());
    }

    #[tokio::test]
    async fn test_next_batch_not_enough_data() {
        // A batch from the future is buffered, not served: the stage asks
        // for another step.
        let batch = Batch::Single(SingleBatch { timestamp: 100, ..Default::default() });
        let cfg = Arc::new(RollupConfig { block_time: 2, ..Default::default() });
        let mut mock = TestNextBatchProvider::new(vec![Ok(batch)]);
        mock.origin = Some(BlockInfo::default());
        let fetcher = TestL2ChainProvider::default();
        let mut bq = BatchQueue::new(cfg, mock, fetcher);
        let res = bq.next_batch(L2BlockInfo::default()).await.unwrap_err();
        assert_eq!(res, PipelineError::NotEnoughData.temp());
        assert!(bq.is_last_in_span());
    }

    #[tokio::test]
    async fn test_next_batch_origin_behind() {
        let cfg = Arc::new(RollupConfig::default());
        let mut mock = TestNextBatchProvider::new(vec![]);
        mock.origin = Some(BlockInfo::default());
        let fetcher = TestL2ChainProvider::default();
        let mut bq = BatchQueue::new(cfg, mock, fetcher);
        let parent = L2BlockInfo {
            l1_origin: crate::types::BlockID { number: 10, ..Default::default() },
            ..Default::default()
        };
        let res = bq.next_batch(parent).await.unwrap_err();
        assert_eq!(res, PipelineError::Eof.temp());
    }

    #[tokio::test]
    async fn test_next_batch_sequence_window_expired_generates_empty_batch() {
        let cfg = Arc::new(RollupConfig {
            block_time: 2,
            seq_window_size: 5,
            ..Default::default()
        });
        let mut mock = TestNextBatchProvider::new(vec![]);
        let epoch_hash =
            b256!("aaaa000000000000000000000000000000000000000000000000000000000000");
        mock.origin = Some(BlockInfo { number: 10, ..Default::default() });
        let fetcher = TestL2ChainProvider::default();
        let mut bq = BatchQueue::new(cfg, mock, fetcher);

        // Window: epoch 2 expired at origin 10 (2 + 5 < 10).
        bq.origin = Some(BlockInfo { number: 10, ..Default::default() });
        bq.l1_blocks.push(BlockInfo { number: 2, hash: epoch_hash, timestamp: 4, ..Default::default() });
        bq.l1_blocks.push(BlockInfo { number: 3, timestamp: 100, ..Default::default() });

        let parent = L2BlockInfo {
            block_info: BlockInfo { timestamp: 4, ..Default::default() },
            l1_origin: crate::types::BlockID { number: 2, hash: epoch_hash },
            ..Default::default()
        };
        let batch = bq.next_batch(parent).await.unwrap();
        assert!(batch.transactions.is_empty());
        assert_eq!(batch.epoch_num, 2);
        assert_eq!(batch.timestamp, 6);
    }

    #[tokio::test]
    async fn test_reset_seeds_l1_window() {
        let cfg = Arc::new(RollupConfig::default());
        let mut mock = TestNextBatchProvider::new(vec![]);
        mock.origin = Some(BlockInfo::default());
        let fetcher = TestL2ChainProvider::default();
        let mut bq = BatchQueue::new(cfg, mock, fetcher);

        let base = BlockInfo { number: 5, ..Default::default() };
        bq.signal(ResetSignal { l1_origin: base, ..Default::default() }.signal()).await.unwrap();
        assert_eq!(bq.l1_blocks, vec![base]);
        assert_eq!(bq.origin, Some(base));
        assert!(bq.batches.is_empty());
    }
}
