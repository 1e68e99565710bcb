//! Chain providers for the derivation pipeline.

use crate::types::{BlockInfo, L2BlockInfo, RawTransaction, RollupConfig, SystemConfig};
use alloc::{boxed::Box, string::ToString, sync::Arc, vec::Vec};
use alloy_consensus::{Header, Receipt, TxEnvelope};
use alloy_primitives::B256;
use async_trait::async_trait;
use core::fmt::Display;

/// Describes the functionality of a data source that can provide information
/// from the L1 chain.
///
/// Implementations must return a typed "not found" error distinguishable from
/// transport failures, so that callers can map missing blocks to pipeline
/// resets rather than retries.
#[async_trait]
pub trait ChainProvider {
    /// The error type for the [ChainProvider].
    type Error: Display + ToString;

    /// Returns whether the given error is a typed "block not found" signal.
    fn is_not_found(err: &Self::Error) -> bool;

    /// Fetch the L1 [Header] for the given [B256] hash.
    async fn header_by_hash(&mut self, hash: B256) -> Result<Header, Self::Error>;

    /// Returns the block at the given number, or an error if the block does
    /// not exist in the data source.
    async fn block_info_by_number(&mut self, number: u64) -> Result<BlockInfo, Self::Error>;

    /// Returns all receipts in the block with the given hash, or an error if
    /// the block does not exist in the data source.
    async fn receipts_by_hash(&mut self, hash: B256) -> Result<Vec<Receipt>, Self::Error>;

    /// Returns the [BlockInfo] and list of [TxEnvelope]s from the given block
    /// hash.
    async fn block_info_and_transactions_by_hash(
        &mut self,
        hash: B256,
    ) -> Result<(BlockInfo, Vec<TxEnvelope>), Self::Error>;
}

/// Describes the functionality of a data source that fetches already-safe L2
/// blocks, used to validate batch continuity against L2 history.
#[async_trait]
pub trait L2ChainProvider {
    /// The error type for the [L2ChainProvider].
    type Error: Display + ToString;

    /// Returns the [L2BlockInfo] for the given L2 block number.
    async fn l2_block_info_by_number(&mut self, number: u64) -> Result<L2BlockInfo, Self::Error>;

    /// Returns the transactions of the safe L2 block with the given number.
    async fn payload_by_number(&mut self, number: u64)
        -> Result<Vec<RawTransaction>, Self::Error>;

    /// Returns the [SystemConfig] as of the given L2 block number.
    async fn system_config_by_number(
        &mut self,
        number: u64,
        rollup_config: Arc<RollupConfig>,
    ) -> Result<SystemConfig, Self::Error>;
}
