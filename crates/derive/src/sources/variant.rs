//! Contains the [EthereumDataSourceVariant].

use crate::{
    sources::{BlobSource, CalldataSource},
    traits::{AsyncIterator, BlobProvider, ChainProvider},
    types::PipelineResult,
};
use alloc::boxed::Box;
use alloy_primitives::Bytes;
use async_trait::async_trait;

/// An iterator over either calldata or blob payloads, depending on which
/// source the factory opened for the block.
#[derive(Debug, Clone)]
pub enum EthereumDataSourceVariant<CP, B>
where
    CP: ChainProvider + Send,
    B: BlobProvider + Send,
{
    /// A calldata source.
    Calldata(CalldataSource<CP>),
    /// A blob source.
    Blob(BlobSource<CP, B>),
}

#[async_trait]
impl<CP, B> AsyncIterator for EthereumDataSourceVariant<CP, B>
where
    CP: ChainProvider + Send,
    B: BlobProvider + Send,
{
    async fn next(&mut self) -> PipelineResult<Bytes> {
        match self {
            Self::Calldata(c) => c.next().await,
            Self::Blob(b) => b.next().await,
        }
    }
}
