//! Contains the [BatchValidator] stage.

use crate::{
    errors::{PipelineError, PipelineErrorKind, ResetError},
    traits::{
        AttributesProvider, NextBatchProvider, OriginAdvancer, OriginProvider, SignalReceiver,
    },
    types::{
        ActivationSignal, Batch, BatchValidity, BlockInfo, L2BlockInfo, PipelineResult,
        ResetSignal, RollupConfig, Signal, SingleBatch,
    },
};
use alloc::{boxed::Box, sync::Arc, vec::Vec};
use async_trait::async_trait;
use core::fmt::Debug;
use tracing::{debug, error, info, warn};

/// The post-Holocene batch stage. Batches must already arrive in strict
/// order: there is no buffering or re-scanning, and an out-of-order or
/// invalid batch is a hard drop with no recovery search.
#[derive(Debug)]
pub struct BatchValidator<P>
where
    P: NextBatchProvider + OriginAdvancer + OriginProvider + SignalReceiver,
{
    /// The rollup configuration.
    pub(crate) cfg: Arc<RollupConfig>,
    /// The previous stage of the derivation pipeline.
    pub(crate) prev: P,
    /// The L1 origin of the batch sequencer.
    pub(crate) origin: Option<BlockInfo>,
    /// A consecutive, time-centric window of L1 blocks.
    /// Every L1 origin of unsafe L2 blocks must be included in this list.
    pub(crate) l1_blocks: Vec<BlockInfo>,
}

impl<P> BatchValidator<P>
where
    P: NextBatchProvider + OriginAdvancer + OriginProvider + SignalReceiver,
{
    /// Create a new [BatchValidator] stage.
    pub const fn new(cfg: Arc<RollupConfig>, prev: P) -> Self {
        Self { cfg, prev, origin: None, l1_blocks: Vec::new() }
    }

    /// Creates a [BatchValidator] from the parts of a live
    /// [BatchQueue](crate::stages::BatchQueue), preserving the tracked L1
    /// window and origin across the fork boundary.
    pub const fn from_parts(
        cfg: Arc<RollupConfig>,
        prev: P,
        origin: Option<BlockInfo>,
        l1_blocks: Vec<BlockInfo>,
    ) -> Self {
        Self { cfg, prev, origin, l1_blocks }
    }

    /// Returns `true` if the pipeline origin is behind the parent origin.
    fn origin_behind(&self, parent: &L2BlockInfo) -> bool {
        self.prev.origin().map_or(true, |origin| origin.number < parent.l1_origin.number)
    }

    /// Updates the [BatchValidator]'s view of the L1 origin blocks.
    pub(crate) fn update_origins(&mut self, parent: &L2BlockInfo) -> PipelineResult<()> {
        // The origin is used to determine if it's behind.
        // It is the future origin that gets saved into the l1 blocks array.
        // We always update the origin of this stage if it's not the same so
        // after the update code runs, this is consistent.
        let origin_behind = self.origin_behind(parent);

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
                // At startup, the batch validator is reset and includes the
                // l1 origin. That is the only time when immediately after
                // reset is called, the origin behind is false.
                self.l1_blocks.clear();
            }
            debug!(
                target: "batch-validator",
                "Advancing batch validator origin to L1 block #{}",
                self.origin.map(|b| b.number).unwrap_or_default(),
            );
        }

        // If the epoch is advanced, update the l1 blocks.
        if !self.l1_blocks.is_empty() && parent.l1_origin.number > self.l1_blocks[0].number {
            for (i, block) in self.l1_blocks.iter().enumerate() {
                if parent.l1_origin.number == block.number {
                    self.l1_blocks.drain(0..i);
                    debug!(target: "batch-validator", "Advancing internal L1 epoch");
                    break;
                }
            }
        }

        Ok(())
    }

    /// Attempts to derive an empty batch, if the sequencing window is
    /// expired.
    pub(crate) fn try_derive_empty_batch(
        &mut self,
        parent: &L2BlockInfo,
    ) -> PipelineResult<SingleBatch> {
        let epoch = self.l1_blocks[0];

        // If the current epoch is too old compared to the L1 block we are at,
        // i.e. if the sequence window expired, we create empty batches for
        // the current epoch.
        let stage_origin = self.origin.ok_or(PipelineError::MissingOrigin.crit())?;
        let expiry_epoch = epoch.number + self.cfg.seq_window_size;
        let force_empty_batches = expiry_epoch <= stage_origin.number;
        let first_of_epoch = epoch.number == parent.l1_origin.number + 1;
        let next_timestamp = parent.block_info.timestamp + self.cfg.block_time;

        // If the sequencer window did not expire, there is still room to
        // receive batches for the current epoch.
        if !force_empty_batches {
            return Err(PipelineError::Eof.temp());
        }

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
            info!(target: "batch-validator", "Generating empty batch for epoch #{}", epoch.number);
            return Ok(SingleBatch {
                parent_hash: parent.block_info.hash,
                epoch_num: epoch.number,
                epoch_hash: epoch.hash,
                timestamp: next_timestamp,
                transactions: Vec::new(),
            });
        }

        // At this point we have auto generated every batch for the current
        // epoch that we can, so we can advance to the next epoch.
        debug!(
            target: "batch-validator",
            "Advancing batch validator epoch: {}, timestamp: {}, epoch timestamp: {}",
            next_epoch.number, next_timestamp, next_epoch.timestamp
        );
        self.l1_blocks.remove(0);
        Err(PipelineError::Eof.temp())
    }
}

#[async_trait]
impl<P> AttributesProvider for BatchValidator<P>
where
    P: NextBatchProvider + OriginAdvancer + OriginProvider + SignalReceiver + Send,
{
    async fn next_batch(&mut self, parent: L2BlockInfo) -> PipelineResult<SingleBatch> {
        // Update the L1 origin blocks within the stage.
        self.update_origins(&parent)?;

        // If the origin is behind, drain previous stages to catch up.
        let stage_origin = self.origin.ok_or(PipelineError::MissingOrigin.crit())?;
        if self.origin_behind(&parent) || parent.l1_origin.number == stage_origin.number {
            self.prev.next_batch(parent, self.l1_blocks.as_ref()).await?;
            return Err(PipelineError::NotEnoughData.temp());
        }

        // At least the L1 origin of the safe block and the L1 origin of the
        // following block must be included in the l1 blocks.
        if self.l1_blocks.len() < 2 {
            return Err(PipelineError::MissingOrigin.crit());
        }

        // Note: epoch origin can now be one block ahead of the L2 Safe Head
        // This is in the case where we auto generate all batches in an epoch
        // and advance the epoch but don't advance the L2 Safe Head's epoch
        let epoch = self.l1_blocks[0];
        if parent.l1_origin != epoch.id() && parent.l1_origin.number != epoch.number - 1 {
            return Err(PipelineErrorKind::Reset(ResetError::L1OriginMismatch(
                parent.l1_origin.number,
                epoch.number - 1,
            )));
        }

        // Pull the next batch from the previous stage.
        let next_batch = match self.prev.next_batch(parent, self.l1_blocks.as_ref()).await {
            Ok(batch) => batch,
            Err(PipelineErrorKind::Temporary(PipelineError::Eof)) => {
                return self.try_derive_empty_batch(&parent);
            }
            Err(e) => {
                return Err(e);
            }
        };

        // The batch must be a single batch: the batch stream stage always
        // expands span batches before this stage.
        let Batch::Single(mut next_batch) = next_batch else {
            error!(
                target: "batch-validator",
                "Received a batch that is not a singular batch"
            );
            return Err(PipelineError::InvalidBatchType.crit());
        };
        next_batch.parent_hash = parent.block_info.hash;

        // Check the validity of the single batch before forwarding it.
        match next_batch.check_batch(
            self.cfg.as_ref(),
            self.l1_blocks.as_ref(),
            parent,
            &stage_origin,
        ) {
            BatchValidity::Accept => {
                info!(target: "batch-validator", "Found next batch (epoch #{})", next_batch.epoch_num);
                Ok(next_batch)
            }
            BatchValidity::Drop => {
                warn!(target: "batch-validator", "Invalid singular batch, flushing current channel.");
                self.prev.flush();
                Err(PipelineError::NotEnoughData.temp())
            }
            BatchValidity::Undecided => Err(PipelineError::NotEnoughData.temp()),
            BatchValidity::Future => {
                error!(target: "batch-validator", "Future batch detected in strict batch stage.");
                Err(PipelineError::InvalidBatchValidity.crit())
            }
        }
    }

    fn is_last_in_span(&self) -> bool {
        self.prev.span_buffer_size() == 0
    }
}

impl<P> OriginProvider for BatchValidator<P>
where
    P: NextBatchProvider + OriginAdvancer + OriginProvider + SignalReceiver,
{
    fn origin(&self) -> Option<BlockInfo> {
        self.prev.origin()
    }
}

#[async_trait]
impl<P> OriginAdvancer for BatchValidator<P>
where
    P: NextBatchProvider + OriginAdvancer + OriginProvider + SignalReceiver + Send,
{
    async fn advance_origin(&mut self) -> PipelineResult<()> {
        self.prev.advance_origin().await
    }
}

#[async_trait]
impl<P> SignalReceiver for BatchValidator<P>
where
    P: NextBatchProvider + OriginAdvancer + OriginProvider + SignalReceiver + Send,
{
    async fn signal(&mut self, signal: Signal) -> PipelineResult<()> {
        match signal {
            s @ Signal::Reset(ResetSignal { l1_origin, .. }) |
            s @ Signal::Activation(ActivationSignal { l1_origin, .. }) => {
                self.prev.signal(s).await?;
                self.origin = Some(l1_origin);
                // Include the new origin as an origin to build on.
                // This is only for the initialization case.
                // During normal resets we will later throw out this block.
                self.l1_blocks.clear();
                self.l1_blocks.push(l1_origin);
            }
            s @ Signal::FlushChannel => {
                self.prev.signal(s).await?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::test_utils::TestNextBatchProvider;
    use alloc::vec;
    use alloy_primitives::B256;

    #[tokio::test]
    async fn test_batch_validator_origin_behind_drains_prev() {
        let cfg = Arc::new(RollupConfig::default());
        let mut mock = TestNextBatchProvider::new(
            (0..5).map(|_| Ok(Batch::Single(SingleBatch::default()))).collect(),
        );
        mock.origin = Some(BlockInfo::default());
        let mut bv = BatchValidator::new(cfg, mock);
        bv.origin = Some(BlockInfo::default());

        let mock_parent = L2BlockInfo {
            l1_origin: crate::types::BlockID { number: 5, ..Default::default() },
            ..Default::default()
        };
        for _ in 0..5 {
            assert_eq!(
                bv.next_batch(mock_parent).await.unwrap_err(),
                PipelineError::NotEnoughData.temp()
            );
        }
        assert_eq!(bv.next_batch(mock_parent).await.unwrap_err(), PipelineError::Eof.temp());
    }

    #[tokio::test]
    async fn test_batch_validator_origin_behind_startup() {
        let cfg = Arc::new(RollupConfig::default());
        let mut mock = TestNextBatchProvider::new(vec![]);
        mock.origin = Some(BlockInfo::default());
        let mut bv = BatchValidator::new(cfg, mock);

        bv.signal(
            ResetSignal {
                l1_origin: BlockInfo { number: 1, ..Default::default() },
                ..Default::default()
            }
            .signal(),
        )
        .await
        .unwrap();

        let mock_parent = L2BlockInfo {
            l1_origin: crate::types::BlockID { number: 2, ..Default::default() },
            ..Default::default()
        };
        assert_eq!(bv.l1_blocks.len(), 1);
        bv.update_origins(&mock_parent).unwrap();
        assert_eq!(bv.l1_blocks.len(), 0);
    }

    #[tokio::test]
    async fn test_batch_validator_l1_origin_mismatch() {
        let cfg = Arc::new(RollupConfig::default());
        let mut mock = TestNextBatchProvider::new(vec![Ok(Batch::Single(SingleBatch::default()))]);
        mock.origin = Some(BlockInfo { number: 1, ..Default::default() });
        let mut bv = BatchValidator::new(cfg, mock);
        bv.origin = Some(BlockInfo::default());
        bv.l1_blocks.push(BlockInfo::default());

        let mock_parent = L2BlockInfo {
            l1_origin: crate::types::BlockID { number: 0, hash: B256::from([0xFF; 32]) },
            ..Default::default()
        };

        assert!(matches!(
            bv.next_batch(mock_parent).await.unwrap_err(),
            PipelineErrorKind::Reset(ResetError::L1OriginMismatch(_, _))
        ));
    }

    #[tokio::test]
    async fn test_batch_validator_received_span_batch() {
        let cfg = Arc::new(RollupConfig::default());
        let mut mock =
            TestNextBatchProvider::new(vec![Ok(Batch::Span(crate::types::SpanBatch::default()))]);
        mock.origin = Some(BlockInfo { number: 1, ..Default::default() });
        let mut bv = BatchValidator::new(cfg, mock);
        bv.origin = Some(BlockInfo::default());
        bv.l1_blocks.push(BlockInfo::default());

        let mock_parent = L2BlockInfo {
            l1_origin: crate::types::BlockID { number: 0, ..Default::default() },
            ..Default::default()
        };

        assert_eq!(
            bv.next_batch(mock_parent).await.unwrap_err(),
            PipelineError::InvalidBatchType.crit()
        );
    }

    #[tokio::test]
    async fn test_batch_validator_next_batch_valid() {
        let cfg = Arc::new(RollupConfig {
            holocene_time: Some(0),
            block_time: 2,
            max_sequencer_drift: 700,
            seq_window_size: 3600,
            ..Default::default()
        });
        let batch = SingleBatch {
            parent_hash: B256::default(),
            epoch_num: 2,
            epoch_hash: B256::default(),
            timestamp: 4,
            transactions: Vec::new(),
        };
        let parent = L2BlockInfo {
            l1_origin: crate::types::BlockID { number: 0, ..Default::default() },
            block_info: BlockInfo { timestamp: 2, ..Default::default() },
            ..Default::default()
        };

        let batch_vec = vec![PipelineResult::Ok(Batch::Single(batch.clone()))];
        let mut mock = TestNextBatchProvider::new(batch_vec);
        mock.origin = Some(BlockInfo { number: 1, ..Default::default() });
        let mut bv = BatchValidator::new(cfg, mock);

        bv.signal(
            ResetSignal {
                l1_origin: BlockInfo { number: 1, ..Default::default() },
                ..Default::default()
            }
            .signal(),
        )
        .await
        .unwrap();
        bv.l1_blocks.push(BlockInfo { number: 2, ..Default::default() });

        let produced_batch = bv.next_batch(parent).await.unwrap();
        assert_eq!(batch, produced_batch);
    }

    #[tokio::test]
    async fn test_batch_validator_sequence_window_expired() {
        let cfg = Arc::new(RollupConfig { seq_window_size: 5, ..Default::default() });
        let mut mock = TestNextBatchProvider::new(vec![]);
        mock.origin = Some(BlockInfo { number: 10, ..Default::default() });
        let mut bv = BatchValidator::new(cfg, mock);

        bv.signal(
            ResetSignal {
                l1_origin: BlockInfo { number: 1, ..Default::default() },
                ..Default::default()
            }
            .signal(),
        )
        .await
        .unwrap();
        bv.origin = Some(BlockInfo { number: 10, ..Default::default() });
        bv.l1_blocks.push(BlockInfo { number: 2, timestamp: 100, ..Default::default() });

        // The sequence window is expired, so an empty batch is generated.
        let mock_parent = L2BlockInfo {
            l1_origin: crate::types::BlockID { number: 0, ..Default::default() },
            ..Default::default()
        };
        assert!(bv.next_batch(mock_parent).await.unwrap().transactions.is_empty());
    }
}
