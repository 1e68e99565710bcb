//! Contains the [EthereumDataSource], which is a concrete implementation of
//! the [DataAvailabilityProvider] trait for an Ethereum L1.

use crate::{
    sources::{BlobSource, CalldataSource, EthereumDataSourceVariant},
    traits::{BlobProvider, ChainProvider, DataAvailabilityProvider},
    types::{BlockInfo, PipelineResult, RollupConfig},
};
use alloc::{boxed::Box, fmt::Debug};
use alloy_primitives::Address;
use async_trait::async_trait;

/// A factory for creating calldata and blob data source iterators. The
/// Ecotone activation time decides which source serves a given L1 block.
#[derive(Debug, Clone)]
pub struct EthereumDataSource<C, B>
where
    C: ChainProvider + Send + Clone,
    B: BlobProvider + Send + Clone,
{
    /// The chain provider to fetch L1 transactions with.
    pub chain_provider: C,
    /// The blob provider.
    pub blob_provider: B,
    /// The Ecotone activation timestamp.
    pub ecotone_timestamp: Option<u64>,
    /// The batch inbox address.
    pub batch_inbox_address: Address,
}

impl<C, B> EthereumDataSource<C, B>
where
    C: ChainProvider + Send + Clone + Debug,
    B: BlobProvider + Send + Clone + Debug,
{
    /// Creates a new factory from the rollup config.
    pub fn new(provider: C, blobs: B, cfg: &RollupConfig) -> Self {
        Self {
            chain_provider: provider,
            blob_provider: blobs,
            ecotone_timestamp: cfg.ecotone_time,
            batch_inbox_address: cfg.batch_inbox_address,
        }
    }
}

#[async_trait]
impl<C, B> DataAvailabilityProvider for EthereumDataSource<C, B>
where
    C: ChainProvider + Send + Sync + Clone + Debug,
    B: BlobProvider + Send + Sync + Clone + Debug,
{
    type DataIter = EthereumDataSourceVariant<C, B>;

    async fn open_data(
        &self,
        block_ref: &BlockInfo,
        batcher_address: Address,
    ) -> PipelineResult<Self::DataIter> {
        let ecotone_enabled =
            self.ecotone_timestamp.map(|e| block_ref.timestamp >= e).unwrap_or(false);
        if ecotone_enabled {
            Ok(EthereumDataSourceVariant::Blob(BlobSource::new(
                self.chain_provider.clone(),
                self.blob_provider.clone(),
                self.batch_inbox_address,
                *block_ref,
                batcher_address,
            )))
        } else {
            Ok(EthereumDataSourceVariant::Calldata(CalldataSource::new(
                self.chain_provider.clone(),
                self.batch_inbox_address,
                *block_ref,
                batcher_address,
            )))
        }
    }
}
