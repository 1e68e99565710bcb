//! Traits for producing payload attributes.

use crate::{
    errors::BuilderError,
    types::{AttributesWithParent, BlockID, L2BlockInfo, PayloadAttributes, PipelineResult},
};
use alloc::boxed::Box;
use async_trait::async_trait;

/// The [AttributesBuilder] is responsible for preparing [PayloadAttributes]
/// that can be used to construct an L2 block containing only deposits.
#[async_trait]
pub trait AttributesBuilder {
    /// Prepares a template [PayloadAttributes] that is ready to be used to
    /// build an L2 block. The block will contain deposits only, on top of the
    /// given L2 parent, with the L1 origin set to the given epoch. The caller
    /// appends batch transactions as the verifier, or unsets `no_tx_pool` as
    /// the sequencer.
    async fn prepare_payload_attributes(
        &mut self,
        l2_parent: L2BlockInfo,
        epoch: BlockID,
    ) -> Result<PayloadAttributes, BuilderError>;
}

/// Produces the pipeline's terminal output: payload attributes tagged with
/// their parent.
#[async_trait]
pub trait NextAttributes {
    /// Returns the next [AttributesWithParent] upon the given L2 safe head.
    async fn next_attributes(
        &mut self,
        parent: L2BlockInfo,
    ) -> PipelineResult<AttributesWithParent>;

    /// Returns a deposits-only copy of the last-produced attributes, used to
    /// re-submit a previously-published block with only its deposit
    /// transactions. The referenced parent and derivation origin must match
    /// the attributes last produced exactly; a mismatch is a correctness bug
    /// in the caller.
    fn deposits_only_attributes(
        &mut self,
        _parent: L2BlockInfo,
        _derived_from: crate::types::BlockInfo,
    ) -> PipelineResult<AttributesWithParent> {
        Err(crate::errors::PipelineError::DepositsOnlyMismatch.crit())
    }
}
