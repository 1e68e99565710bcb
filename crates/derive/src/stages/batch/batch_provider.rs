//! This module contains the [BatchProvider] stage: the fork multiplexer of
//! the batch stage.

use super::{BatchQueue, BatchValidator};
use crate::{
    traits::{
        AttributesProvider, L2ChainProvider, NextBatchProvider, OriginAdvancer, OriginProvider,
        SignalReceiver,
    },
    types::{
        ActivationSignal, BlockInfo, L2BlockInfo, PipelineResult, ResetSignal, RollupConfig,
        Signal, SingleBatch,
    },
};
use alloc::{boxed::Box, sync::Arc};
use async_trait::async_trait;
use core::fmt::Debug;
use tracing::info;

/// The active strategy of the [BatchProvider].
#[derive(Debug)]
pub enum ActiveBatchStage<P, BF>
where
    P: NextBatchProvider + OriginAdvancer + OriginProvider + SignalReceiver,
    BF: L2ChainProvider,
{
    /// The pre-Holocene reordering queue.
    Queue(BatchQueue<P, BF>),
    /// The post-Holocene strict validator.
    Validator(BatchValidator<P>),
}

/// The [BatchProvider] multiplexes between the two batch-stage strategies by
/// the Holocene activation time: the [BatchQueue] before the fork, the
/// [BatchValidator] after.
///
/// Crossing the activation boundary mid-stream migrates the tracked
/// `l1_blocks` window and stage origin from the live queue into the
/// validator, so a channel that straddles the fork boundary is correctly
/// attributed.
#[derive(Debug)]
pub struct BatchProvider<P, BF>
where
    P: NextBatchProvider + OriginAdvancer + OriginProvider + SignalReceiver,
    BF: L2ChainProvider + Clone,
{
    /// The rollup configuration.
    cfg: Arc<RollupConfig>,
    /// The L2 chain fetcher, retained to rebuild the queue on reset.
    fetcher: BF,
    /// The active stage. Only `None` transiently, while transforming.
    state: Option<ActiveBatchStage<P, BF>>,
}

impl<P, BF> BatchProvider<P, BF>
where
    P: NextBatchProvider + OriginAdvancer + OriginProvider + SignalReceiver,
    BF: L2ChainProvider + Clone,
{
    /// Creates a new [BatchProvider] with the given configuration, previous
    /// stage and L2 fetcher.
    pub fn new(cfg: Arc<RollupConfig>, prev: P, fetcher: BF) -> Self {
        let state = if prev
            .origin()
            .map(|o| cfg.is_holocene_active(o.timestamp))
            .unwrap_or_else(|| cfg.is_holocene_active(0))
        {
            ActiveBatchStage::Validator(BatchValidator::new(Arc::clone(&cfg), prev))
        } else {
            ActiveBatchStage::Queue(BatchQueue::new(Arc::clone(&cfg), prev, fetcher.clone()))
        };
        Self { cfg, fetcher, state: Some(state) }
    }

    /// Returns a reference to the active stage.
    pub fn active_stage(&self) -> &ActiveBatchStage<P, BF> {
        self.state.as_ref().expect("active batch stage must be set")
    }

    /// Migrates a live [BatchQueue] into a [BatchValidator], carrying over
    /// the tracked `l1_blocks` window and stage origin.
    ///
    /// ## Panics
    /// Panics if the validator is already active: transforming twice is an
    /// unrecoverable misuse.
    pub fn transform_holocene(&mut self) {
        match self.state.take().expect("active batch stage must be set") {
            ActiveBatchStage::Queue(queue) => {
                info!(target: "batch-provider", "Transforming BatchQueue to BatchValidator");
                let (prev, l1_blocks, origin, _) = queue.into_parts();
                self.state = Some(ActiveBatchStage::Validator(BatchValidator::from_parts(
                    Arc::clone(&self.cfg),
                    prev,
                    origin,
                    l1_blocks,
                )));
            }
            ActiveBatchStage::Validator(_) => {
                panic!("attempted to transform an already-transformed batch stage");
            }
        }
    }

    /// Transforms the active stage if the current origin crossed the
    /// Holocene activation boundary.
    fn attempt_transform(&mut self) {
        let Some(origin) = self.origin() else {
            return;
        };
        if matches!(self.state, Some(ActiveBatchStage::Queue(_))) &&
            self.cfg.is_holocene_active(origin.timestamp)
        {
            self.transform_holocene();
        }
    }
}

#[async_trait]
impl<P, BF> AttributesProvider for BatchProvider<P, BF>
where
    P: NextBatchProvider + OriginAdvancer + OriginProvider + SignalReceiver + Send + Debug,
    BF: L2ChainProvider + Clone + Send + Debug,
{
    async fn next_batch(&mut self, parent: L2BlockInfo) -> PipelineResult<SingleBatch> {
        self.attempt_transform();
        match self.state.as_mut().expect("active batch stage must be set") {
            ActiveBatchStage::Queue(stage) => stage.next_batch(parent).await,
            ActiveBatchStage::Validator(stage) => stage.next_batch(parent).await,
        }
    }

    fn is_last_in_span(&self) -> bool {
        match self.active_stage() {
            ActiveBatchStage::Queue(stage) => stage.is_last_in_span(),
            ActiveBatchStage::Validator(stage) => stage.is_last_in_span(),
        }
    }
}

#[async_trait]
impl<P, BF> OriginAdvancer for BatchProvider<P, BF>
where
    P: NextBatchProvider + OriginAdvancer + OriginProvider + SignalReceiver + Send + Debug,
    BF: L2ChainProvider + Clone + Send + Debug,
{
    async fn advance_origin(&mut self) -> PipelineResult<()> {
        match self.state.as_mut().expect("active batch stage must be set") {
            ActiveBatchStage::Queue(stage) => stage.advance_origin().await,
            ActiveBatchStage::Validator(stage) => stage.advance_origin().await,
        }
    }
}

impl<P, BF> OriginProvider for BatchProvider<P, BF>
where
    P: NextBatchProvider + OriginAdvancer + OriginProvider + SignalReceiver,
    BF: L2ChainProvider + Clone,
{
    fn origin(&self) -> Option<BlockInfo> {
        match self.active_stage() {
            ActiveBatchStage::Queue(stage) => stage.origin(),
            ActiveBatchStage::Validator(stage) => stage.origin(),
        }
    }
}

#[async_trait]
impl<P, BF> SignalReceiver for BatchProvider<P, BF>
where
    P: NextBatchProvider + OriginAdvancer + OriginProvider + SignalReceiver + Send + Debug,
    BF: L2ChainProvider + Clone + Send + Debug,
{
    async fn signal(&mut self, signal: Signal) -> PipelineResult<()> {
        match signal {
            Signal::Reset(ResetSignal { l1_origin, .. }) |
            Signal::Activation(ActivationSignal { l1_origin, .. }) => {
                // Rebuild the strategy for the reset target, seeding the
                // inner stage through its own reset handling.
                let prev = match self.state.take().expect("active batch stage must be set") {
                    ActiveBatchStage::Queue(stage) => stage.into_parts().0,
                    ActiveBatchStage::Validator(stage) => stage.prev,
                };
                let mut state = if self.cfg.is_holocene_active(l1_origin.timestamp) {
                    ActiveBatchStage::Validator(BatchValidator::new(Arc::clone(&self.cfg), prev))
                } else {
                    ActiveBatchStage::Queue(BatchQueue::new(
                        Arc::clone(&self.cfg),
                        prev,
                        self.fetcher.clone(),
                    ))
                };
                match &mut state {
                    ActiveBatchStage::Queue(stage) => stage.signal(signal).await?,
                    ActiveBatchStage::Validator(stage) => stage.signal(signal).await?,
                }
                self.state = Some(state);
            }
            Signal::FlushChannel => {
                match self.state.as_mut().expect("active batch stage must be set") {
                    ActiveBatchStage::Queue(stage) => stage.signal(signal).await?,
                    ActiveBatchStage::Validator(stage) => stage.signal(signal).await?,
                }
            }
        }
        Ok(())
    }
}
