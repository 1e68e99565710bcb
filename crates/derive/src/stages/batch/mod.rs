//! The batch stage: orders decoded batches against the tracked L1 window and
//! serves validated singular batches, one at a time.

use crate::types::{Batch, PipelineResult};
use alloc::boxed::Box;
use async_trait::async_trait;

/// Provides [Batch]es to the [BatchStream] stage.
#[async_trait]
pub trait BatchStreamProvider {
    /// Returns the next [Batch] decoded from the current channel.
    async fn next_batch(&mut self) -> PipelineResult<Batch>;

    /// Drops the rest of the current channel, used when an invalid batch
    /// forwards-invalidates it. Only meaningful post-Holocene.
    fn flush(&mut self);
}

mod batch_stream;
pub use batch_stream::BatchStream;

mod batch_queue;
pub use batch_queue::BatchQueue;

mod batch_validator;
pub use batch_validator::BatchValidator;

mod batch_provider;
pub use batch_provider::{ActiveBatchStage, BatchProvider};
