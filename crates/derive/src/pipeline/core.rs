//! Contains the core derivation pipeline.

use crate::{
    errors::{PipelineError, PipelineErrorKind},
    traits::{
        L2ChainProvider, NextAttributes, OriginAdvancer, OriginProvider, Pipeline, SignalReceiver,
    },
    types::{
        ActivationSignal, AttributesWithParent, BlockInfo, L2BlockInfo, PipelineResult,
        ResetSignal, RollupConfig, Signal, StepResult, SystemConfig,
    },
};
use alloc::{boxed::Box, collections::VecDeque, string::ToString, sync::Arc};
use async_trait::async_trait;
use tracing::{error, trace, warn};

/// The derivation pipeline is responsible for deriving L2 inputs from L1
/// data.
#[derive(Debug)]
pub struct DerivationPipeline<S, P>
where
    S: NextAttributes + SignalReceiver + OriginProvider + OriginAdvancer + Send,
    P: L2ChainProvider + Send,
{
    /// The top-level attributes stage.
    pub attributes: S,
    /// A list of prepared [AttributesWithParent], ready for the consumer.
    pub prepared: VecDeque<AttributesWithParent>,
    /// The rollup config.
    pub rollup_config: Arc<RollupConfig>,
    /// The L2 chain provider used to fetch the system config on reset.
    pub l2_chain_provider: P,
}

impl<S, P> DerivationPipeline<S, P>
where
    S: NextAttributes + SignalReceiver + OriginProvider + OriginAdvancer + Send,
    P: L2ChainProvider + Send,
{
    /// Creates a new instance of the [DerivationPipeline].
    pub const fn new(
        attributes: S,
        rollup_config: Arc<RollupConfig>,
        l2_chain_provider: P,
    ) -> Self {
        Self { attributes, prepared: VecDeque::new(), rollup_config, l2_chain_provider }
    }
}

impl<S, P> OriginProvider for DerivationPipeline<S, P>
where
    S: NextAttributes + SignalReceiver + OriginProvider + OriginAdvancer + Send,
    P: L2ChainProvider + Send,
{
    fn origin(&self) -> Option<BlockInfo> {
        self.attributes.origin()
    }
}

impl<S, P> Iterator for DerivationPipeline<S, P>
where
    S: NextAttributes + SignalReceiver + OriginProvider + OriginAdvancer + Send,
    P: L2ChainProvider + Send,
{
    type Item = AttributesWithParent;

    fn next(&mut self) -> Option<Self::Item> {
        self.prepared.pop_front()
    }
}

#[async_trait]
impl<S, P> SignalReceiver for DerivationPipeline<S, P>
where
    S: NextAttributes + SignalReceiver + OriginProvider + OriginAdvancer + Send,
    P: L2ChainProvider + Send,
{
    /// Signals the pipeline.
    ///
    /// During a [`Signal::Reset`], the signal travels recursively from the
    /// top-level attributes stage down to the L1 traversal stage: every stage
    /// forwards the signal to its previous stage before clearing its own
    /// buffers, so the reset applies bottom-up in one pass. The resolved
    /// [SystemConfig] of the reset target is attached before routing.
    async fn signal(&mut self, signal: Signal) -> PipelineResult<()> {
        match signal {
            mut s @ Signal::Reset(ResetSignal { l2_safe_head, .. }) |
            mut s @ Signal::Activation(ActivationSignal { l2_safe_head, .. }) => {
                let system_config = self
                    .l2_chain_provider
                    .system_config_by_number(
                        l2_safe_head.block_info.number,
                        Arc::clone(&self.rollup_config),
                    )
                    .await
                    .map_err(|e| PipelineError::Provider(e.to_string()).temp())?;
                s = s.with_system_config(system_config);
                match self.attributes.signal(s).await {
                    Ok(()) => trace!(target: "pipeline", "Stages reset"),
                    Err(err) => {
                        if let PipelineErrorKind::Temporary(PipelineError::Eof) = err {
                            trace!(target: "pipeline", "Stages reset with EOF");
                        } else {
                            error!(target: "pipeline", "Stage reset errored: {:?}", err);
                            return Err(err);
                        }
                    }
                }
                self.prepared.clear();
            }
            Signal::FlushChannel => {
                self.attributes.signal(signal).await?;
            }
        }
        Ok(())
    }
}

#[async_trait]
impl<S, P> Pipeline for DerivationPipeline<S, P>
where
    S: NextAttributes + SignalReceiver + OriginProvider + OriginAdvancer + Send,
    P: L2ChainProvider + Send,
{
    /// Peeks at the next prepared [AttributesWithParent] from the pipeline.
    fn peek(&self) -> Option<&AttributesWithParent> {
        self.prepared.front()
    }

    /// Returns the rollup config.
    fn rollup_config(&self) -> &RollupConfig {
        &self.rollup_config
    }

    /// Returns the [SystemConfig] by L2 number.
    async fn system_config_by_number(
        &mut self,
        number: u64,
    ) -> Result<SystemConfig, PipelineErrorKind> {
        self.l2_chain_provider
            .system_config_by_number(number, Arc::clone(&self.rollup_config))
            .await
            .map_err(|e| PipelineError::Provider(e.to_string()).temp())
    }

    /// Returns a deposits-only copy of the attributes last produced for the
    /// given parent and derivation origin.
    fn deposits_only_attributes(
        &mut self,
        parent: L2BlockInfo,
        derived_from: BlockInfo,
    ) -> Result<AttributesWithParent, PipelineErrorKind> {
        self.attributes.deposits_only_attributes(parent, derived_from)
    }

    /// Attempts to progress the pipeline by exactly one unit of work.
    ///
    /// An [Eof](PipelineError::Eof) from the attributes stage means the
    /// pipeline is out of L1 data for the current origin: the origin is
    /// advanced instead of producing attributes.
    async fn step(&mut self, cursor: L2BlockInfo) -> StepResult {
        match self.attributes.next_attributes(cursor).await {
            Ok(a) => {
                trace!(target: "pipeline", "Prepared L2 attributes: {:?}", a);
                self.prepared.push_back(a);
                StepResult::PreparedAttributes
            }
            Err(err) => match err {
                PipelineErrorKind::Temporary(PipelineError::Eof) => {
                    trace!(target: "pipeline", "Pipeline advancing origin");
                    if let Err(e) = self.attributes.advance_origin().await {
                        return StepResult::OriginAdvanceErr(e);
                    }
                    StepResult::AdvancedOrigin
                }
                PipelineErrorKind::Temporary(_) => {
                    trace!(target: "pipeline", "Attributes queue step failed due to temporary error: {:?}", err);
                    StepResult::StepFailed(err)
                }
                _ => {
                    warn!(target: "pipeline", "Attributes queue step failed: {:?}", err);
                    StepResult::StepFailed(err)
                }
            },
        }
    }
}
