//! Contains the core derivation pipeline and its builder.

mod core;
pub use core::DerivationPipeline;

mod builder;
pub use builder::PipelineBuilder;
