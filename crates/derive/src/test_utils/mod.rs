//! Test utilities for the derivation pipeline: mock providers and stage
//! mocks used by the unit tests and downstream consumers.

mod providers;
pub use providers::{
    TestBlobProvider, TestChainProvider, TestDap, TestIter, TestL2ChainProvider,
    TestProviderError,
};

mod stages;
pub use stages::{
    TestAttributesBuilder, TestAttributesProvider, TestBatchStreamProvider,
    TestChannelReaderProvider, TestFrameQueueProvider, TestNextAttributes,
    TestNextBatchProvider, TestNextFrameProvider,
};

mod tx;
pub use tx::TestTxBuilder;

mod tracing;
pub use tracing::{CollectingLayer, TraceStorage};
