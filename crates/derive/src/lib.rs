#![doc = include_str!("../README.md")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![cfg_attr(not(any(test, feature = "test-utils")), no_std)]

extern crate alloc;

/// Re-export commonly used types and traits.
pub mod prelude {
    pub use crate::{
        errors::{PipelineError, PipelineErrorKind, ResetError},
        pipeline::{DerivationPipeline, PipelineBuilder},
        sources::EthereumDataSource,
        stages::AttributesQueue,
        traits::{ChainProvider, L2ChainProvider, OriginProvider, Pipeline, SignalReceiver},
        types::{PipelineResult, ResetSignal, Signal, StepResult},
    };
}

pub mod errors;
pub mod params;
pub mod pipeline;
pub mod sources;
pub mod stages;
pub mod traits;
pub mod types;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
