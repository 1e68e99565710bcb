//! Result types for the derivation pipeline.

use crate::errors::PipelineErrorKind;

/// A result type for derivation pipeline stages.
pub type PipelineResult<T> = Result<T, PipelineErrorKind>;

/// The outcome of a single pipeline step.
#[derive(Debug, PartialEq, Eq)]
pub enum StepResult {
    /// Attributes were successfully prepared.
    PreparedAttributes,
    /// The origin was advanced.
    AdvancedOrigin,
    /// Origin advancement failed.
    OriginAdvanceErr(PipelineErrorKind),
    /// The step failed.
    StepFailed(PipelineErrorKind),
}
