//! Span batch types: a compressed run of consecutive L2 blocks.

mod bits;
pub use bits::SpanBatchBits;

mod element;
pub use element::SpanBatchElement;

mod prefix;
pub use prefix::SpanBatchPrefix;

mod payload;
pub use payload::SpanBatchPayload;

mod raw;
pub use raw::RawSpanBatch;

mod batch;
pub use batch::SpanBatch;
