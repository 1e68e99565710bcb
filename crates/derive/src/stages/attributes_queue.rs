//! Contains the logic for the [AttributesQueue] stage.

use crate::{
    errors::{PipelineError, ResetError},
    traits::{
        AttributesBuilder, AttributesProvider, NextAttributes, OriginAdvancer, OriginProvider,
        SignalReceiver,
    },
    types::{
        AttributesWithParent, BlockInfo, L2BlockInfo, PipelineResult, Signal, SingleBatch,
    },
};
use alloc::{boxed::Box, sync::Arc};
use async_trait::async_trait;
use core::fmt::Debug;
use tracing::info;

use crate::types::RollupConfig;

/// [AttributesQueue] accepts batches from the batch stage and transforms them
/// into [PayloadAttributes](crate::types::PayloadAttributes). The outputted
/// payload attributes cannot be buffered because each batch->attributes
/// transformation pulls in data about the current L2 safe head.
///
/// [AttributesQueue] also buffers batches that have been output because
/// multiple batches can be created at once.
///
/// This stage can be reset by clearing its batch buffer.
/// This stage does not need to retain any references to L1 blocks.
#[derive(Debug)]
pub struct AttributesQueue<P, AB>
where
    P: AttributesProvider + OriginAdvancer + OriginProvider + SignalReceiver,
    AB: AttributesBuilder,
{
    /// The rollup config.
    cfg: Arc<RollupConfig>,
    /// The previous stage of the derivation pipeline.
    prev: P,
    /// Whether the current batch is the last in its span.
    is_last_in_span: bool,
    /// The current batch being processed.
    batch: Option<SingleBatch>,
    /// The attributes builder.
    builder: AB,
    /// The last attributes handed out, kept to serve a deposits-only replay.
    last: Option<AttributesWithParent>,
}

impl<P, AB> AttributesQueue<P, AB>
where
    P: AttributesProvider + OriginAdvancer + OriginProvider + SignalReceiver,
    AB: AttributesBuilder,
{
    /// Create a new [AttributesQueue] stage.
    pub const fn new(cfg: Arc<RollupConfig>, prev: P, builder: AB) -> Self {
        Self { cfg, prev, is_last_in_span: false, batch: None, builder, last: None }
    }

    /// Loads a [SingleBatch] from the previous stage if needed.
    pub async fn load_batch(&mut self, parent: L2BlockInfo) -> PipelineResult<SingleBatch> {
        if self.batch.is_none() {
            let batch = self.prev.next_batch(parent).await?;
            self.batch = Some(batch);
            self.is_last_in_span = self.prev.is_last_in_span();
        }
        self.batch.clone().ok_or(PipelineError::Eof.temp())
    }

    /// Creates the next attributes, transforming a [SingleBatch] into
    /// [PayloadAttributes](crate::types::PayloadAttributes). This sets
    /// `no_tx_pool` and appends the batched transactions to the attributes
    /// transaction list.
    pub async fn create_next_attributes(
        &mut self,
        batch: SingleBatch,
        parent: L2BlockInfo,
    ) -> PipelineResult<crate::types::PayloadAttributes> {
        // Sanity check parent hash
        if batch.parent_hash != parent.block_info.hash {
            return Err(ResetError::BadParentHash(batch.parent_hash, parent.block_info.hash)
                .reset());
        }

        // Sanity check timestamp
        let actual = parent.block_info.timestamp + self.cfg.block_time;
        if actual != batch.timestamp {
            return Err(ResetError::BadTimestamp(batch.timestamp, actual).reset());
        }

        // Prepare the payload attributes
        let tx_count = batch.transactions.len();
        let mut attributes =
            self.builder.prepare_payload_attributes(parent, batch.epoch()).await?;
        attributes.no_tx_pool = true;
        attributes.transactions.extend(batch.transactions);

        info!(
            target: "attributes-queue",
            "Generated attributes: txs={}, timestamp={}",
            tx_count, batch.timestamp
        );

        Ok(attributes)
    }
}

#[async_trait]
impl<P, AB> NextAttributes for AttributesQueue<P, AB>
where
    P: AttributesProvider + OriginAdvancer + OriginProvider + SignalReceiver + Send,
    AB: AttributesBuilder + Send,
{
    /// Returns the next [AttributesWithParent] from the current batch.
    async fn next_attributes(
        &mut self,
        parent: L2BlockInfo,
    ) -> PipelineResult<AttributesWithParent> {
        // Load the batch.
        let batch = self.load_batch(parent).await?;

        // Construct the payload attributes from the loaded batch.
        let attributes = self.create_next_attributes(batch, parent).await?;
        let derived_from = self.origin().ok_or(PipelineError::MissingOrigin.crit())?;
        let populated_attributes = AttributesWithParent {
            attributes,
            parent,
            is_last_in_span: self.is_last_in_span,
            derived_from,
        };

        // Clear out the local state once producing the attributes succeeds.
        self.batch = None;
        self.is_last_in_span = false;
        self.last = Some(populated_attributes.clone());
        Ok(populated_attributes)
    }

    /// Returns a deposits-only copy of the last-produced attributes, used to
    /// replace a previously-published block that must be re-submitted with
    /// only deposit transactions (e.g. to invalidate a disputed block).
    ///
    /// The caller must reference the exact same parent and L1 derivation
    /// origin as the attributes last produced; anything else is a correctness
    /// bug in the caller, not a retryable condition.
    fn deposits_only_attributes(
        &mut self,
        parent: L2BlockInfo,
        derived_from: BlockInfo,
    ) -> PipelineResult<AttributesWithParent> {
        let last = self.last.as_ref().ok_or(PipelineError::DepositsOnlyMismatch.crit())?;
        if last.parent.block_info.hash != parent.block_info.hash ||
            last.derived_from.hash != derived_from.hash
        {
            return Err(PipelineError::DepositsOnlyMismatch.crit());
        }

        let mut replaced = last.clone();
        replaced.attributes.transactions.retain(|tx| tx.is_deposit());
        replaced.is_last_in_span = true;
        self.last = None;
        Ok(replaced)
    }
}

#[async_trait]
impl<P, AB> OriginAdvancer for AttributesQueue<P, AB>
where
    P: AttributesProvider + OriginAdvancer + OriginProvider + SignalReceiver + Send,
    AB: AttributesBuilder + Send,
{
    async fn advance_origin(&mut self) -> PipelineResult<()> {
        self.prev.advance_origin().await
    }
}

impl<P, AB> OriginProvider for AttributesQueue<P, AB>
where
    P: AttributesProvider + OriginAdvancer + OriginProvider + SignalReceiver,
    AB: AttributesBuilder,
{
    fn origin(&self) -> Option<BlockInfo> {
        self.prev.origin()
    }
}

#[async_trait]
impl<P, AB> SignalReceiver for AttributesQueue<P, AB>
where
    P: AttributesProvider + OriginAdvancer + OriginProvider + SignalReceiver + Send,
    AB: AttributesBuilder + Send,
{
    async fn signal(&mut self, signal: Signal) -> PipelineResult<()> {
        self.prev.signal(signal).await?;
        self.batch = None;
        self.is_last_in_span = false;
        self.last = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        errors::PipelineErrorKind,
        test_utils::{TestAttributesBuilder, TestAttributesProvider},
        types::{PayloadAttributes, RawTransaction},
    };
    use alloc::vec;
    use alloy_primitives::{b256, hex};

    fn new_queue(
        cfg: RollupConfig,
        batches: vec::Vec<PipelineResult<SingleBatch>>,
        attributes: Option<PayloadAttributes>,
    ) -> AttributesQueue<TestAttributesProvider, TestAttributesBuilder> {
        let mut provider = TestAttributesProvider::new(batches);
        provider.origin = Some(BlockInfo::default());
        let builder = TestAttributesBuilder { attributes: attributes.map(Ok) };
        AttributesQueue::new(Arc::new(cfg), provider, builder)
    }

    #[tokio::test]
    async fn test_load_batch_eof() {
        let mut aq = new_queue(RollupConfig::default(), vec![], None);
        let result = aq.load_batch(L2BlockInfo::default()).await.unwrap_err();
        assert_eq!(result, PipelineError::Eof.temp());
    }

    #[tokio::test]
    async fn test_create_next_attributes_bad_parent_hash() {
        let mut aq = new_queue(RollupConfig::default(), vec![], Some(Default::default()));
        let bad = SingleBatch {
            parent_hash: b256!("1111111111111111111111111111111111111111111111111111111111111111"),
            ..Default::default()
        };
        let result =
            aq.create_next_attributes(bad, L2BlockInfo::default()).await.unwrap_err();
        assert!(matches!(result, PipelineErrorKind::Reset(ResetError::BadParentHash(_, _))));
    }

    #[tokio::test]
    async fn test_create_next_attributes_bad_timestamp() {
        let cfg = RollupConfig { block_time: 2, ..Default::default() };
        let mut aq = new_queue(cfg, vec![], Some(Default::default()));
        let bad = SingleBatch { timestamp: 5, ..Default::default() };
        let result =
            aq.create_next_attributes(bad, L2BlockInfo::default()).await.unwrap_err();
        assert!(matches!(result, PipelineErrorKind::Reset(ResetError::BadTimestamp(5, 2))));
    }

    #[tokio::test]
    async fn test_next_attributes_appends_batch_transactions() {
        let cfg = RollupConfig { block_time: 2, ..Default::default() };
        let deposit = RawTransaction(hex!("7e00").into());
        let batch_tx = RawTransaction(hex!("02aa").into());
        let batch = SingleBatch {
            timestamp: 2,
            transactions: vec![batch_tx.clone()],
            ..Default::default()
        };
        let template = PayloadAttributes {
            transactions: vec![deposit.clone()],
            ..Default::default()
        };
        let mut aq = new_queue(cfg, vec![Ok(batch)], Some(template));

        let attributes = aq.next_attributes(L2BlockInfo::default()).await.unwrap();
        assert!(attributes.attributes.no_tx_pool);
        assert_eq!(attributes.attributes.transactions, vec![deposit, batch_tx]);
        assert_eq!(attributes.derived_from, BlockInfo::default());
    }

    #[tokio::test]
    async fn test_deposits_only_replay() {
        let cfg = RollupConfig { block_time: 2, ..Default::default() };
        let deposit = RawTransaction(hex!("7e00").into());
        let batch = SingleBatch {
            timestamp: 2,
            transactions: vec![RawTransaction(hex!("02aa").into())],
            ..Default::default()
        };
        let template = PayloadAttributes {
            transactions: vec![deposit.clone()],
            ..Default::default()
        };
        let mut aq = new_queue(cfg, vec![Ok(batch)], Some(template));

        let parent = L2BlockInfo::default();
        let attributes = aq.next_attributes(parent).await.unwrap();
        assert_eq!(attributes.attributes.transactions.len(), 2);

        let replaced =
            aq.deposits_only_attributes(parent, attributes.derived_from).unwrap();
        assert_eq!(replaced.attributes.transactions, vec![deposit]);
    }

    #[tokio::test]
    async fn test_deposits_only_replay_wrong_parent_is_critical() {
        let cfg = RollupConfig { block_time: 2, ..Default::default() };
        let batch = SingleBatch { timestamp: 2, ..Default::default() };
        let mut aq = new_queue(cfg, vec![Ok(batch)], Some(Default::default()));

        let parent = L2BlockInfo::default();
        let attributes = aq.next_attributes(parent).await.unwrap();

        let wrong_parent = L2BlockInfo {
            block_info: BlockInfo {
                hash: b256!("1111111111111111111111111111111111111111111111111111111111111111"),
                ..Default::default()
            },
            ..Default::default()
        };
        let err = aq
            .deposits_only_attributes(wrong_parent, attributes.derived_from)
            .unwrap_err();
        assert_eq!(err, PipelineError::DepositsOnlyMismatch.crit());
    }
}
