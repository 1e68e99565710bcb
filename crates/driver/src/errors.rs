//! Driver error types.

use rift_derive::errors::PipelineErrorKind;

/// An error halting the driver loop.
#[derive(derive_more::Display, Debug)]
pub enum DriverError {
    /// The pipeline hit a critical error; correctness cannot be guaranteed
    /// past this point and the supervisor must halt the node.
    #[display("Critical pipeline error: {_0}")]
    Critical(PipelineErrorKind),
    /// The outbound event channel was closed by the consumer.
    #[display("Driver event channel closed")]
    ChannelClosed,
}

impl std::error::Error for DriverError {}
