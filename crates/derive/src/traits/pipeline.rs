//! Defines the interface for the core derivation pipeline.

use super::{OriginProvider, SignalReceiver};
use crate::{
    errors::PipelineErrorKind,
    types::{AttributesWithParent, L2BlockInfo, RollupConfig, StepResult, SystemConfig},
};
use alloc::boxed::Box;
use async_trait::async_trait;
use core::iter::Iterator;

/// This trait defines the interface for interacting with the derivation
/// pipeline.
#[async_trait]
pub trait Pipeline:
    OriginProvider + SignalReceiver + Iterator<Item = AttributesWithParent>
{
    /// Peeks at the next [AttributesWithParent] from the pipeline.
    fn peek(&self) -> Option<&AttributesWithParent>;

    /// Returns the rollup config.
    fn rollup_config(&self) -> &RollupConfig;

    /// Returns the [SystemConfig] by L2 number.
    async fn system_config_by_number(
        &mut self,
        number: u64,
    ) -> Result<SystemConfig, PipelineErrorKind>;

    /// Attempts to progress the pipeline by exactly one unit of work.
    async fn step(&mut self, cursor: L2BlockInfo) -> StepResult;

    /// Returns a deposits-only copy of the attributes last produced for the
    /// given parent and derivation origin. See
    /// [NextAttributes::deposits_only_attributes](crate::traits::NextAttributes::deposits_only_attributes).
    fn deposits_only_attributes(
        &mut self,
        parent: L2BlockInfo,
        derived_from: crate::types::BlockInfo,
    ) -> Result<AttributesWithParent, PipelineErrorKind>;
}
