//! The driver loop: a cooperative, single-task state machine stepping the
//! derivation pipeline.

use crate::{DriverError, DriverEvent, EventQueue, ShutdownToken, StepBackoff};
use rift_derive::{
    errors::{PipelineError, PipelineErrorKind},
    traits::Pipeline,
    types::{L2BlockInfo, ResetSignal, Signal, StepResult},
};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// How long the idle loop sleeps between shutdown checks when no events are
/// queued.
const IDLE_TICK: Duration = Duration::from_millis(50);

/// The channel handles paired with a [Driver]: external producers push
/// notifications into `events_in`, the consumer drains derived attributes
/// and status events from `events_out`.
#[derive(Debug)]
pub struct DriverChannels {
    /// The inbound handle: new L1 heads, forkchoice updates, finality
    /// signals, attribute acknowledgements.
    pub events_in: mpsc::UnboundedSender<DriverEvent>,
    /// The outbound stream of driver events.
    pub events_out: mpsc::UnboundedReceiver<DriverEvent>,
}

/// The driver owns the pipeline and the single logical thread of control
/// that mutates it. All pipeline stages execute synchronously within one
/// [step](Pipeline::step); external producers only enqueue events.
///
/// Invariant: after emitting [DriverEvent::DerivedAttributes], the driver
/// will not step the pipeline again until
/// [DriverEvent::ConfirmReceivedAttributes] is processed, so the engine is
/// never handed conflicting block-building instructions.
#[derive(Debug)]
pub struct Driver<P>
where
    P: Pipeline + Send,
{
    /// The derivation pipeline.
    pipeline: P,
    /// The L2 safe head derivation builds on.
    cursor: L2BlockInfo,
    /// The priority event queue.
    queue: EventQueue,
    /// The step retry backoff.
    backoff: StepBackoff,
    /// Whether derived attributes are awaiting confirmation.
    attributes_in_flight: bool,
    /// The inbound event channel.
    inbound: mpsc::UnboundedReceiver<DriverEvent>,
    /// The outbound event channel.
    outbound: mpsc::UnboundedSender<DriverEvent>,
    /// The cancellation token.
    shutdown: ShutdownToken,
}

impl<P> Driver<P>
where
    P: Pipeline + Send,
{
    /// Creates a new [Driver] over the given pipeline, returning the channel
    /// handles for its collaborators.
    pub fn new(pipeline: P, cursor: L2BlockInfo, shutdown: ShutdownToken) -> (Self, DriverChannels) {
        let (in_tx, in_rx) = mpsc::unbounded_channel();
        let (out_tx, out_rx) = mpsc::unbounded_channel();
        let driver = Self {
            pipeline,
            cursor,
            queue: EventQueue::new(),
            backoff: StepBackoff::default(),
            attributes_in_flight: false,
            inbound: in_rx,
            outbound: out_tx,
            shutdown,
        };
        (driver, DriverChannels { events_in: in_tx, events_out: out_rx })
    }

    /// Runs the driver loop until cancelled, the inbound channel closes, or
    /// a critical error halts derivation.
    pub async fn run(&mut self) -> Result<(), DriverError> {
        self.queue.push(DriverEvent::Step);
        loop {
            if self.shutdown.is_cancelled() {
                info!(target: "driver", "Driver shut down");
                return Ok(());
            }

            // Merge externally-produced events into the queue; they never
            // mutate pipeline state directly.
            while let Ok(event) = self.inbound.try_recv() {
                self.queue.push(event);
            }

            match self.queue.pop() {
                Some(event) => self.process(event).await?,
                None => {
                    // Idle until new external input arrives.
                    tokio::select! {
                        event = self.inbound.recv() => match event {
                            Some(event) => self.queue.push(event),
                            None => return Ok(()),
                        },
                        _ = tokio::time::sleep(IDLE_TICK) => {}
                    }
                }
            }
        }
    }

    /// Processes a single event. Events are handled strictly one at a time;
    /// a step never begins until the previous one fully returned.
    pub(crate) async fn process(&mut self, event: DriverEvent) -> Result<(), DriverError> {
        match event {
            DriverEvent::Step => self.step_pipeline().await?,
            DriverEvent::ConfirmReceivedAttributes => {
                self.attributes_in_flight = false;
                self.backoff.reset();
                self.queue.push(DriverEvent::Step);
            }
            DriverEvent::ForkchoiceUpdated(l2) => {
                debug!(target: "driver", "Forkchoice updated to L2 block #{}", l2.block_info.number);
                self.cursor = l2;
                self.queue.push(DriverEvent::Step);
            }
            DriverEvent::NewL1Head(block) => {
                debug!(target: "driver", "New L1 head #{}", block.number);
                self.queue.push(DriverEvent::Step);
            }
            DriverEvent::FinalizedL1(block) => {
                debug!(target: "driver", "L1 block #{} finalized", block.number);
            }
            DriverEvent::DepositsOnlyAttributesRequest { parent, derived_from } => {
                match self.pipeline.deposits_only_attributes(parent, derived_from) {
                    Ok(attributes) => {
                        // The channel the replaced block came from is
                        // forwards-invalidated.
                        self.pipeline.signal(Signal::FlushChannel).await.ok();
                        self.attributes_in_flight = true;
                        self.emit(DriverEvent::DerivedAttributes(Box::new(attributes)))?;
                    }
                    Err(e) => {
                        error!(target: "driver", "Deposits-only replay failed: {e}");
                        self.emit(DriverEvent::CriticalError(e.clone()))?;
                        return Err(DriverError::Critical(e));
                    }
                }
            }
            DriverEvent::Reset(err) => {
                info!(target: "driver", "Resetting derivation pipeline: {err}");
                self.reset_pipeline().await;
                self.queue.push(DriverEvent::Step);
            }
            DriverEvent::CriticalError(e) => {
                error!(target: "driver", "Critical derivation error: {e}");
                return Err(DriverError::Critical(e));
            }
            // Outbound-only events are ignored if they find their way back
            // into the queue.
            DriverEvent::DeriverIdle { .. } |
            DriverEvent::ExhaustedL1 { .. } |
            DriverEvent::DerivedAttributes(_) |
            DriverEvent::TemporaryError(_) => {}
        }
        Ok(())
    }

    /// Advances the pipeline by one unit of work and classifies the outcome.
    async fn step_pipeline(&mut self) -> Result<(), DriverError> {
        // At most one set of unconfirmed attributes may be in flight.
        if self.attributes_in_flight {
            debug!(target: "driver", "Attributes in flight, holding derivation");
            return Ok(());
        }

        match self.pipeline.step(self.cursor).await {
            StepResult::PreparedAttributes => {
                self.backoff.reset();
                if let Some(attributes) = self.pipeline.next() {
                    self.attributes_in_flight = true;
                    self.emit(DriverEvent::DerivedAttributes(Box::new(attributes)))?;
                }
            }
            StepResult::AdvancedOrigin => {
                self.backoff.reset();
                self.emit(DriverEvent::DeriverIdle { origin: self.pipeline.origin() })?;
                self.queue.push(DriverEvent::Step);
            }
            StepResult::OriginAdvanceErr(e) | StepResult::StepFailed(e) => match e {
                PipelineErrorKind::Temporary(PipelineError::Eof) => {
                    // Out of L1 data: idle until a new L1 head arrives. Not
                    // a failure, never logged as an error.
                    self.backoff.reset();
                    self.emit(DriverEvent::ExhaustedL1 {
                        l1_ref: self.pipeline.origin(),
                        last_l2: self.cursor,
                    })?;
                }
                PipelineErrorKind::Temporary(_) => {
                    let delay = self.backoff.next_delay();
                    warn!(target: "driver", "Temporary derivation error (retrying in {delay:?}): {e}");
                    self.emit(DriverEvent::TemporaryError(e))?;
                    tokio::time::sleep(delay).await;
                    self.queue.push(DriverEvent::Step);
                }
                PipelineErrorKind::Reset(_) => {
                    self.emit(DriverEvent::Reset(e.clone()))?;
                    self.queue.push(DriverEvent::Reset(e));
                }
                PipelineErrorKind::Critical(_) => {
                    error!(target: "driver", "Critical derivation error: {e}");
                    self.emit(DriverEvent::CriticalError(e.clone()))?;
                    return Err(DriverError::Critical(e));
                }
            },
        }
        Ok(())
    }

    /// Resets every pipeline stage to the current cursor in one atomic
    /// signal pass. Re-entrant: re-running the reset with the same cursor
    /// yields the same state.
    async fn reset_pipeline(&mut self) {
        let l1_origin = self.pipeline.origin().unwrap_or_default();
        let signal =
            ResetSignal { l2_safe_head: self.cursor, l1_origin, system_config: None }.signal();
        if let Err(e) = self.pipeline.signal(signal).await {
            warn!(target: "driver", "Pipeline reset failed, retrying on next step: {e}");
        }
        self.attributes_in_flight = false;
    }

    /// Sends an event to the consumer.
    fn emit(&self, event: DriverEvent) -> Result<(), DriverError> {
        self.outbound.send(event).map_err(|_| DriverError::ChannelClosed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use rift_derive::{
        errors::ResetError,
        traits::{OriginProvider, SignalReceiver},
        types::{
            AttributesWithParent, BlockInfo, PipelineResult, RollupConfig, SystemConfig,
        },
    };
    use std::collections::VecDeque;

    /// A scripted pipeline: serves canned step results and records signals.
    #[derive(Debug, Default)]
    struct TestPipeline {
        steps: VecDeque<StepResult>,
        prepared: VecDeque<AttributesWithParent>,
        rollup_config: RollupConfig,
        signals: Vec<Signal>,
        replay: Option<AttributesWithParent>,
    }

    impl TestPipeline {
        fn with_attributes(count: usize) -> Self {
            let mut pipeline = Self::default();
            for _ in 0..count {
                pipeline.steps.push_back(StepResult::PreparedAttributes);
                pipeline.prepared.push_back(AttributesWithParent {
                    attributes: Default::default(),
                    parent: Default::default(),
                    is_last_in_span: true,
                    derived_from: Default::default(),
                });
            }
            pipeline
        }
    }

    impl Iterator for TestPipeline {
        type Item = AttributesWithParent;
        fn next(&mut self) -> Option<Self::Item> {
            self.prepared.pop_front()
        }
    }

    impl OriginProvider for TestPipeline {
        fn origin(&self) -> Option<BlockInfo> {
            Some(BlockInfo::default())
        }
    }

    #[async_trait]
    impl SignalReceiver for TestPipeline {
        async fn signal(&mut self, signal: Signal) -> PipelineResult<()> {
            self.signals.push(signal);
            Ok(())
        }
    }

    #[async_trait]
    impl Pipeline for TestPipeline {
        fn peek(&self) -> Option<&AttributesWithParent> {
            self.prepared.front()
        }

        fn rollup_config(&self) -> &RollupConfig {
            &self.rollup_config
        }

        async fn system_config_by_number(
            &mut self,
            _: u64,
        ) -> Result<SystemConfig, PipelineErrorKind> {
            Ok(SystemConfig::default())
        }

        async fn step(&mut self, _: L2BlockInfo) -> StepResult {
            self.steps.pop_front().unwrap_or(StepResult::OriginAdvanceErr(
                PipelineError::Eof.temp(),
            ))
        }

        fn deposits_only_attributes(
            &mut self,
            _: L2BlockInfo,
            _: BlockInfo,
        ) -> Result<AttributesWithParent, PipelineErrorKind> {
            self.replay.take().ok_or(PipelineError::DepositsOnlyMismatch.crit())
        }
    }

    fn new_driver(pipeline: TestPipeline) -> (Driver<TestPipeline>, DriverChannels) {
        Driver::new(pipeline, L2BlockInfo::default(), ShutdownToken::new())
    }

    #[tokio::test]
    async fn test_at_most_one_attributes_in_flight() {
        let (mut driver, mut channels) = new_driver(TestPipeline::with_attributes(2));

        // The first step emits attributes and suspends derivation.
        driver.process(DriverEvent::Step).await.unwrap();
        assert!(matches!(
            channels.events_out.try_recv().unwrap(),
            DriverEvent::DerivedAttributes(_)
        ));

        // Further steps are held until the consumer confirms receipt.
        driver.process(DriverEvent::Step).await.unwrap();
        driver.process(DriverEvent::Step).await.unwrap();
        assert!(channels.events_out.try_recv().is_err());

        // The acknowledgement releases the second set of attributes.
        driver.process(DriverEvent::ConfirmReceivedAttributes).await.unwrap();
        driver.process(DriverEvent::Step).await.unwrap();
        assert!(matches!(
            channels.events_out.try_recv().unwrap(),
            DriverEvent::DerivedAttributes(_)
        ));
    }

    #[tokio::test]
    async fn test_exhausted_l1_is_idle_not_error() {
        let (mut driver, mut channels) = new_driver(TestPipeline::default());
        driver.backoff.next_delay();

        driver.process(DriverEvent::Step).await.unwrap();
        assert!(matches!(
            channels.events_out.try_recv().unwrap(),
            DriverEvent::ExhaustedL1 { .. }
        ));
        // Exhaustion resets the backoff counter.
        assert_eq!(driver.backoff.attempts(), 0);
    }

    #[tokio::test]
    async fn test_temporary_error_backs_off_and_requeues() {
        let mut pipeline = TestPipeline::default();
        pipeline
            .steps
            .push_back(StepResult::StepFailed(PipelineError::NotEnoughData.temp()));
        let (mut driver, mut channels) = new_driver(pipeline);

        driver.process(DriverEvent::Step).await.unwrap();
        assert!(matches!(
            channels.events_out.try_recv().unwrap(),
            DriverEvent::TemporaryError(_)
        ));
        assert_eq!(driver.backoff.attempts(), 1);
        // The retry was queued.
        assert!(matches!(driver.queue.pop(), Some(DriverEvent::Step)));
    }

    #[tokio::test]
    async fn test_reset_error_signals_pipeline() {
        let mut pipeline = TestPipeline::default();
        pipeline.steps.push_back(StepResult::StepFailed(
            ResetError::BadParentHash(Default::default(), Default::default()).reset(),
        ));
        let (mut driver, mut channels) = new_driver(pipeline);

        driver.process(DriverEvent::Step).await.unwrap();
        assert!(matches!(channels.events_out.try_recv().unwrap(), DriverEvent::Reset(_)));

        // The queued reset event performs the reset signal.
        let reset = driver.queue.pop().unwrap();
        driver.process(reset).await.unwrap();
        assert!(matches!(driver.pipeline.signals[0], Signal::Reset(_)));
    }

    #[tokio::test]
    async fn test_critical_error_halts() {
        let mut pipeline = TestPipeline::default();
        pipeline
            .steps
            .push_back(StepResult::StepFailed(PipelineError::MissingOrigin.crit()));
        let (mut driver, mut channels) = new_driver(pipeline);

        assert!(driver.process(DriverEvent::Step).await.is_err());
        assert!(matches!(
            channels.events_out.try_recv().unwrap(),
            DriverEvent::CriticalError(_)
        ));
    }

    #[tokio::test]
    async fn test_deposits_only_replay_flushes_channel() {
        let mut pipeline = TestPipeline::default();
        let replay = AttributesWithParent {
            attributes: Default::default(),
            parent: Default::default(),
            is_last_in_span: true,
            derived_from: Default::default(),
        };
        pipeline.replay = Some(replay);
        let (mut driver, mut channels) = new_driver(pipeline);

        driver
            .process(DriverEvent::DepositsOnlyAttributesRequest {
                parent: Default::default(),
                derived_from: Default::default(),
            })
            .await
            .unwrap();
        assert!(matches!(driver.pipeline.signals[0], Signal::FlushChannel));
        assert!(matches!(
            channels.events_out.try_recv().unwrap(),
            DriverEvent::DerivedAttributes(_)
        ));
        assert!(driver.attributes_in_flight);
    }

    #[tokio::test]
    async fn test_deposits_only_replay_mismatch_is_critical() {
        let (mut driver, _channels) = new_driver(TestPipeline::default());
        let result = driver
            .process(DriverEvent::DepositsOnlyAttributesRequest {
                parent: Default::default(),
                derived_from: Default::default(),
            })
            .await;
        assert!(matches!(result, Err(DriverError::Critical(_))));
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown() {
        let shutdown = ShutdownToken::new();
        let (mut driver, channels) =
            Driver::new(TestPipeline::default(), L2BlockInfo::default(), shutdown.clone());
        shutdown.cancel();
        driver.run().await.unwrap();
        drop(channels);
    }
}
