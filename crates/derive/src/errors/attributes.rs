//! Error types for the attributes builder.

use crate::types::BlockID;
use alloc::string::String;
use alloy_primitives::B256;

/// An error thrown while preparing payload attributes.
#[derive(derive_more::Display, Clone, Debug, PartialEq, Eq)]
pub enum BuilderError {
    /// Mismatched blocks.
    #[display("Block mismatch. Expected {_0}, got {_1}")]
    BlockMismatch(BlockID, BlockID),
    /// Mismatched blocks for the start of an epoch.
    #[display("Block mismatch on epoch reset. Expected {_0}, got {_1} (parent {_2})")]
    BlockMismatchEpochReset(BlockID, BlockID, B256),
    /// The system config update from the epoch receipts failed.
    #[display("System config update failed: {_0}")]
    SystemConfigUpdate(String),
    /// Broken time invariant between L2 and L1.
    #[display(
        "Time invariant broken. L1 origin: {_0} | Next L2 time: {_1} | L1 block: {_2} | L1 timestamp {_3}"
    )]
    BrokenTimeInvariant(BlockID, u64, BlockID, u64),
    /// Attributes unavailable.
    #[display("Attributes unavailable")]
    AttributesUnavailable,
    /// A custom error.
    #[display("Error in attributes builder: {_0}")]
    Custom(String),
}

impl core::error::Error for BuilderError {}

impl From<BuilderError> for crate::errors::PipelineErrorKind {
    /// Classifies a builder error: mismatched blocks and a broken L1/L2 time
    /// invariant mean the pipeline view of the chain diverged and must be
    /// reset; everything else is retried.
    fn from(err: BuilderError) -> Self {
        match err {
            BuilderError::BlockMismatch(_, _) |
            BuilderError::BlockMismatchEpochReset(_, _, _) |
            BuilderError::BrokenTimeInvariant(_, _, _, _) => {
                crate::errors::ResetError::AttributesBuilder(err).reset()
            }
            _ => crate::errors::PipelineError::AttributesBuilder(err).temp(),
        }
    }
}
