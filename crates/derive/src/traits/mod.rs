//! Traits describing the stage contracts and external collaborators of the
//! derivation pipeline.

mod providers;
pub use providers::{ChainProvider, L2ChainProvider};

mod data_sources;
pub use data_sources::{AsyncIterator, BlobProvider, DataAvailabilityProvider};

mod stages;
pub use stages::{
    AttributesProvider, ChannelReaderProvider, FrameQueueProvider, L1RetrievalProvider,
    NextBatchProvider, NextFrameProvider, OriginAdvancer, OriginProvider, SignalReceiver,
};

mod attributes;
pub use attributes::{AttributesBuilder, NextAttributes};

mod pipeline;
pub use pipeline::Pipeline;
