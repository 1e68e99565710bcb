//! Error types for the derivation pipeline.

mod pipeline;
pub use pipeline::{PipelineEncodingError, PipelineError, PipelineErrorKind, ResetError};

mod attributes;
pub use attributes::BuilderError;

mod sources;
pub use sources::{BlobDecodingError, BlobProviderError};

mod span;
pub use span::{SpanBatchError, SpanDecodingError};
