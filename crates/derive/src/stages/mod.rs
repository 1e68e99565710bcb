//! The stages of the derivation pipeline, composed bottom-up:
//!
//! 1. [L1Traversal] exposes one L1 block at a time.
//! 2. [L1Retrieval] extracts the batcher payloads of each block.
//! 3. [FrameQueue] parses the payloads into frames.
//! 4. [ChannelProvider] reassembles frames into channels ([ChannelBank] /
//!    [ChannelAssembler]) and [ChannelReader] decodes batches out of them.
//! 5. [BatchStream] expands span batches, and [BatchProvider] ([BatchQueue] /
//!    [BatchValidator]) orders and validates them.
//! 6. [AttributesQueue] turns validated batches into payload attributes.

mod l1_traversal;
pub use l1_traversal::L1Traversal;

mod l1_retrieval;
pub use l1_retrieval::L1Retrieval;

mod frame_queue;
pub use frame_queue::FrameQueue;

mod channel;
pub use channel::{
    ActiveChannelStage, BatchReader, ChannelAssembler, ChannelBank, ChannelProvider,
    ChannelReader,
};

mod batch;
pub use batch::{
    ActiveBatchStage, BatchProvider, BatchQueue, BatchStream, BatchStreamProvider,
    BatchValidator,
};

mod attributes;
pub use attributes::{EcotoneTransactionBuilder, StatefulAttributesBuilder};

mod attributes_queue;
pub use attributes_queue::AttributesQueue;
