//! Contains the [L1Retrieval] stage of the derivation pipeline.

use crate::{
    errors::{PipelineError, PipelineErrorKind},
    traits::{
        AsyncIterator, DataAvailabilityProvider, FrameQueueProvider, L1RetrievalProvider,
        OriginAdvancer, OriginProvider, SignalReceiver,
    },
    types::{PipelineResult, Signal},
};
use alloc::boxed::Box;
use alloy_primitives::Bytes;
use async_trait::async_trait;
use core::fmt::Debug;
use tracing::debug;

/// The [L1Retrieval] stage of the derivation pipeline.
///
/// For each L1 block pulled from the previous stage, [L1Retrieval] lazily
/// opens the associated data-availability iterator and drains it one payload
/// at a time. When the iterator is exhausted, the stage closes it and
/// surfaces the exhaustion so the pipeline advances the traversal stage.
#[derive(Debug)]
pub struct L1Retrieval<DAP, P>
where
    DAP: DataAvailabilityProvider,
    P: L1RetrievalProvider + OriginAdvancer + OriginProvider + SignalReceiver,
{
    /// The previous stage in the pipeline.
    pub prev: P,
    /// The data availability provider to use for the L1 retrieval stage.
    pub provider: DAP,
    /// The current data iterator.
    pub(crate) data: Option<DAP::DataIter>,
}

impl<DAP, P> L1Retrieval<DAP, P>
where
    DAP: DataAvailabilityProvider,
    P: L1RetrievalProvider + OriginAdvancer + OriginProvider + SignalReceiver,
{
    /// Creates a new [L1Retrieval] stage with the given previous stage and
    /// [DataAvailabilityProvider].
    pub const fn new(prev: P, provider: DAP) -> Self {
        Self { prev, provider, data: None }
    }
}

#[async_trait]
impl<DAP, P> FrameQueueProvider for L1Retrieval<DAP, P>
where
    DAP: DataAvailabilityProvider + Send,
    P: L1RetrievalProvider + OriginAdvancer + OriginProvider + SignalReceiver + Send,
{
    async fn next_data(&mut self) -> PipelineResult<Bytes> {
        if self.data.is_none() {
            let next = self
                .prev
                .next_l1_block()
                .await?
                .ok_or(PipelineError::MissingL1Data.temp())?;
            debug!(target: "l1-retrieval", "Opening data source for block #{}", next.number);
            self.data =
                Some(self.provider.open_data(&next, self.prev.batcher_address()).await?);
        }

        match self.data.as_mut().expect("Cannot be None").next().await {
            Ok(data) => Ok(data),
            Err(e) => {
                if let PipelineErrorKind::Temporary(PipelineError::Eof) = e {
                    self.data = None;
                }
                Err(e)
            }
        }
    }
}

#[async_trait]
impl<DAP, P> OriginAdvancer for L1Retrieval<DAP, P>
where
    DAP: DataAvailabilityProvider + Send,
    P: L1RetrievalProvider + OriginAdvancer + OriginProvider + SignalReceiver + Send,
{
    async fn advance_origin(&mut self) -> PipelineResult<()> {
        self.prev.advance_origin().await
    }
}

impl<DAP, P> OriginProvider for L1Retrieval<DAP, P>
where
    DAP: DataAvailabilityProvider,
    P: L1RetrievalProvider + OriginAdvancer + OriginProvider + SignalReceiver,
{
    fn origin(&self) -> Option<crate::types::BlockInfo> {
        self.prev.origin()
    }
}

#[async_trait]
impl<DAP, P> SignalReceiver for L1Retrieval<DAP, P>
where
    DAP: DataAvailabilityProvider + Send,
    P: L1RetrievalProvider + OriginAdvancer + OriginProvider + SignalReceiver + Send,
{
    async fn signal(&mut self, signal: Signal) -> PipelineResult<()> {
        self.prev.signal(signal).await?;
        if !matches!(signal, Signal::FlushChannel) {
            self.data = None;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        stages::l1_traversal::tests::new_test_traversal,
        test_utils::{TestDap, TestIter},
        types::{BlockInfo, ResetSignal},
    };
    use alloc::vec;

    #[tokio::test]
    async fn test_l1_retrieval_origin() {
        let traversal = new_test_traversal(vec![]);
        let dap = TestDap::default();
        let retrieval = L1Retrieval::new(traversal, dap);
        assert_eq!(retrieval.origin(), Some(BlockInfo::default()));
    }

    #[tokio::test]
    async fn test_l1_retrieval_next_data() {
        let traversal = new_test_traversal(vec![]);
        let dap = TestDap::new(vec![Ok(Bytes::default()), Err(PipelineError::Eof.temp())]);
        let mut retrieval = L1Retrieval::new(traversal, dap);
        assert!(retrieval.data.is_none());

        let data = retrieval.next_data().await.unwrap();
        assert_eq!(data, Bytes::default());
        assert!(retrieval.data.is_some());

        // The iterator is exhausted: the stage closes it and bubbles Eof.
        let err = retrieval.next_data().await.unwrap_err();
        assert_eq!(err, PipelineError::Eof.temp());
        assert!(retrieval.data.is_none());
    }

    #[tokio::test]
    async fn test_l1_retrieval_existing_data_is_respected() {
        // A traversal with its block drained would error if the retrieval
        // stage consulted it instead of the open iterator.
        let mut traversal = new_test_traversal(vec![]);
        traversal.next_l1_block().await.unwrap();

        let data = TestIter { results: vec![Ok(Bytes::default())].into() };
        let mut retrieval =
            L1Retrieval { prev: traversal, provider: TestDap::default(), data: Some(data) };
        let data = retrieval.next_data().await.unwrap();
        assert_eq!(data, Bytes::default());
    }

    #[tokio::test]
    async fn test_l1_retrieval_reset_clears_iterator() {
        let traversal = new_test_traversal(vec![]);
        let data = TestIter { results: vec![Ok(Bytes::default())].into() };
        let mut retrieval =
            L1Retrieval { prev: traversal, provider: TestDap::default(), data: Some(data) };
        retrieval.signal(ResetSignal::default().signal()).await.unwrap();
        assert!(retrieval.data.is_none());
    }
}
