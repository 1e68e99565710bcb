//! This module contains the [ChannelProvider] stage: the fork multiplexer of
//! the channel stage.

use super::{ChannelAssembler, ChannelBank};
use crate::{
    traits::{
        ChannelReaderProvider, NextFrameProvider, OriginAdvancer, OriginProvider, SignalReceiver,
    },
    types::{ActivationSignal, BlockInfo, PipelineResult, ResetSignal, RollupConfig, Signal},
};
use alloc::{boxed::Box, sync::Arc};
use alloy_primitives::Bytes;
use async_trait::async_trait;
use core::fmt::Debug;
use tracing::info;

/// The active strategy of the [ChannelProvider].
#[derive(Debug)]
pub enum ActiveChannelStage<P>
where
    P: NextFrameProvider + OriginAdvancer + OriginProvider + SignalReceiver,
{
    /// The pre-Holocene buffering bank.
    Bank(ChannelBank<P>),
    /// The post-Holocene strict assembler.
    Assembler(ChannelAssembler<P>),
}

/// The [ChannelProvider] multiplexes between the two channel-stage
/// strategies by the Holocene activation time: the [ChannelBank] before the
/// fork, the [ChannelAssembler] after.
///
/// The strategies share their previous stage. Crossing the activation
/// boundary mid-stream swaps the strategy without touching the previous
/// stage, so the tracked L1 window survives the transition; a reset
/// re-selects the strategy for the reset target.
#[derive(Debug)]
pub struct ChannelProvider<P>
where
    P: NextFrameProvider + OriginAdvancer + OriginProvider + SignalReceiver,
{
    /// The rollup configuration.
    cfg: Arc<RollupConfig>,
    /// The active stage. Only `None` transiently, while transforming.
    state: Option<ActiveChannelStage<P>>,
}

impl<P> ChannelProvider<P>
where
    P: NextFrameProvider + OriginAdvancer + OriginProvider + SignalReceiver,
{
    /// Creates a new [ChannelProvider] with the given configuration and
    /// previous stage, starting in the pre-fork strategy.
    pub fn new(cfg: Arc<RollupConfig>, prev: P) -> Self {
        let state = if prev
            .origin()
            .map(|o| cfg.is_holocene_active(o.timestamp))
            .unwrap_or_else(|| cfg.is_holocene_active(0))
        {
            ActiveChannelStage::Assembler(ChannelAssembler::new(Arc::clone(&cfg), prev))
        } else {
            ActiveChannelStage::Bank(ChannelBank::new(Arc::clone(&cfg), prev))
        };
        Self { cfg, state: Some(state) }
    }

    /// Returns a reference to the active stage.
    pub fn active_stage(&self) -> &ActiveChannelStage<P> {
        self.state.as_ref().expect("active channel stage must be set")
    }

    /// Swaps the live [ChannelBank] for a [ChannelAssembler], preserving the
    /// previous stage and thereby the tracked L1 window.
    ///
    /// ## Panics
    /// Panics if the assembler is already active: transforming twice is an
    /// unrecoverable misuse.
    pub fn transform_holocene(&mut self) {
        match self.state.take().expect("active channel stage must be set") {
            ActiveChannelStage::Bank(bank) => {
                info!(target: "channel-provider", "Transforming ChannelBank to ChannelAssembler");
                let prev = bank.into_prev();
                self.state = Some(ActiveChannelStage::Assembler(ChannelAssembler::new(
                    Arc::clone(&self.cfg),
                    prev,
                )));
            }
            ActiveChannelStage::Assembler(_) => {
                panic!("attempted to transform an already-transformed channel stage");
            }
        }
    }

    /// Transforms the active stage if the current origin crossed the
    /// Holocene activation boundary.
    fn attempt_transform(&mut self) {
        let Some(origin) = self.origin() else {
            return;
        };
        if matches!(self.state, Some(ActiveChannelStage::Bank(_))) &&
            self.cfg.is_holocene_active(origin.timestamp)
        {
            self.transform_holocene();
        }
    }
}

#[async_trait]
impl<P> ChannelReaderProvider for ChannelProvider<P>
where
    P: NextFrameProvider + OriginAdvancer + OriginProvider + SignalReceiver + Send + Debug,
{
    async fn next_data(&mut self) -> PipelineResult<Option<Bytes>> {
        self.attempt_transform();
        match self.state.as_mut().expect("active channel stage must be set") {
            ActiveChannelStage::Bank(stage) => stage.next_data().await,
            ActiveChannelStage::Assembler(stage) => stage.next_data().await,
        }
    }
}

#[async_trait]
impl<P> OriginAdvancer for ChannelProvider<P>
where
    P: NextFrameProvider + OriginAdvancer + OriginProvider + SignalReceiver + Send + Debug,
{
    async fn advance_origin(&mut self) -> PipelineResult<()> {
        match self.state.as_mut().expect("active channel stage must be set") {
            ActiveChannelStage::Bank(stage) => stage.advance_origin().await,
            ActiveChannelStage::Assembler(stage) => stage.advance_origin().await,
        }
    }
}

impl<P> OriginProvider for ChannelProvider<P>
where
    P: NextFrameProvider + OriginAdvancer + OriginProvider + SignalReceiver,
{
    fn origin(&self) -> Option<BlockInfo> {
        match self.active_stage() {
            ActiveChannelStage::Bank(stage) => stage.origin(),
            ActiveChannelStage::Assembler(stage) => stage.origin(),
        }
    }
}

#[async_trait]
impl<P> SignalReceiver for ChannelProvider<P>
where
    P: NextFrameProvider + OriginAdvancer + OriginProvider + SignalReceiver + Send + Debug,
{
    async fn signal(&mut self, signal: Signal) -> PipelineResult<()> {
        match signal {
            Signal::Reset(ResetSignal { l1_origin, .. }) |
            Signal::Activation(ActivationSignal { l1_origin, .. }) => {
                // Route the signal through the previous stage, then
                // re-select the strategy for the reset target.
                let mut prev = match self.state.take().expect("active channel stage must be set")
                {
                    ActiveChannelStage::Bank(stage) => stage.into_prev(),
                    ActiveChannelStage::Assembler(stage) => stage.into_prev(),
                };
                prev.signal(signal).await?;
                self.state = Some(if self.cfg.is_holocene_active(l1_origin.timestamp) {
                    ActiveChannelStage::Assembler(ChannelAssembler::new(
                        Arc::clone(&self.cfg),
                        prev,
                    ))
                } else {
                    ActiveChannelStage::Bank(ChannelBank::new(Arc::clone(&self.cfg), prev))
                });
            }
            Signal::FlushChannel => {
                match self.state.as_mut().expect("active channel stage must be set") {
                    ActiveChannelStage::Bank(stage) => stage.signal(signal).await?,
                    ActiveChannelStage::Assembler(stage) => stage.signal(signal).await?,
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::TestNextFrameProvider;
    use alloc::vec;

    #[test]
    fn test_channel_provider_bank_active() {
        let provider = TestNextFrameProvider::new(vec![]);
        let cfg = Arc::new(RollupConfig::default());
        let channel_provider = ChannelProvider::new(cfg, provider);
        assert!(matches!(channel_provider.active_stage(), ActiveChannelStage::Bank(_)));
    }

    #[test]
    fn test_channel_provider_assembler_active() {
        let provider = TestNextFrameProvider::new(vec![]);
        let cfg = Arc::new(RollupConfig { holocene_time: Some(0), ..Default::default() });
        let channel_provider = ChannelProvider::new(cfg, provider);
        assert!(matches!(channel_provider.active_stage(), ActiveChannelStage::Assembler(_)));
    }

    #[tokio::test]
    async fn test_channel_provider_transforms_at_activation() {
        let mut provider = TestNextFrameProvider::new(vec![]);
        provider.block_info = Some(BlockInfo { number: 1, timestamp: 1, ..Default::default() });
        let cfg = Arc::new(RollupConfig { holocene_time: Some(2), ..Default::default() });
        let mut channel_provider = ChannelProvider::new(cfg, provider);
        assert!(matches!(channel_provider.active_stage(), ActiveChannelStage::Bank(_)));

        // Move the origin to the activation boundary: the next poll swaps
        // the strategy while the previous stage is untouched.
        match channel_provider.state.as_mut().unwrap() {
            ActiveChannelStage::Bank(bank) => {
                bank.prev.block_info =
                    Some(BlockInfo { number: 2, timestamp: 2, ..Default::default() })
            }
            _ => unreachable!(),
        }
        let _ = channel_provider.next_data().await;
        assert!(matches!(channel_provider.active_stage(), ActiveChannelStage::Assembler(_)));
        assert_eq!(channel_provider.origin().unwrap().number, 2);
    }

    #[test]
    #[should_panic(expected = "already-transformed")]
    fn test_channel_provider_double_transform_panics() {
        let provider = TestNextFrameProvider::new(vec![]);
        let cfg = Arc::new(RollupConfig::default());
        let mut channel_provider = ChannelProvider::new(cfg, provider);
        channel_provider.transform_holocene();
        channel_provider.transform_holocene();
    }

    #[tokio::test]
    async fn test_channel_provider_reset_selects_strategy() {
        let provider = TestNextFrameProvider::new(vec![]);
        let cfg = Arc::new(RollupConfig { holocene_time: Some(100), ..Default::default() });
        let mut channel_provider = ChannelProvider::new(cfg, provider);
        assert!(matches!(channel_provider.active_stage(), ActiveChannelStage::Bank(_)));

        // Reset to a post-activation block selects the assembler.
        let signal = ResetSignal {
            l1_origin: BlockInfo { timestamp: 100, ..Default::default() },
            ..Default::default()
        };
        channel_provider.signal(signal.signal()).await.unwrap();
        assert!(matches!(channel_provider.active_stage(), ActiveChannelStage::Assembler(_)));
    }
}
