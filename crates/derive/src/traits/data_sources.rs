//! Contains traits that describe the functionality of the data availability
//! sources used by the derivation pipeline.

use crate::{
    errors::BlobProviderError,
    types::{BlockInfo, IndexedBlobHash, PipelineResult},
};
use alloc::{boxed::Box, fmt::Debug, vec::Vec};
use alloy_eips::eip4844::Blob;
use alloy_primitives::Bytes;
use async_trait::async_trait;

/// The [BlobProvider] trait specifies the functionality of a data source that
/// can provide blobs. Returned entries match the requested indexed hashes
/// 1:1; a `None` entry marks a blob that could not be retrieved and is
/// tolerated (and skipped) by the data source.
#[async_trait]
pub trait BlobProvider {
    /// Fetches blobs for a given block ref and the blob hashes.
    async fn get_blobs(
        &mut self,
        block_ref: &BlockInfo,
        blob_hashes: &[IndexedBlobHash],
    ) -> Result<Vec<Option<Box<Blob>>>, BlobProviderError>;
}

/// Describes the functionality of a data source that can provide
/// data-availability information: one opaque byte payload per batcher
/// transaction, in transaction order.
///
/// Alternate DA backends plug in here; the pipeline is generic over the
/// provider and never inspects which implementation it is given.
#[async_trait]
pub trait DataAvailabilityProvider {
    /// An iterator over returned byte payloads.
    type DataIter: AsyncIterator + Send + Debug;

    /// Returns the data availability iterator for the block with the given
    /// reference, lazily opened. `batcher_address` is the batch submitter
    /// authorized by the system config as of that block.
    async fn open_data(
        &self,
        block_ref: &BlockInfo,
        batcher_address: alloy_primitives::Address,
    ) -> PipelineResult<Self::DataIter>;
}

/// A simple asynchronous iterator over byte payloads.
#[async_trait]
pub trait AsyncIterator {
    /// Returns the next item in the iterator, or
    /// [PipelineError::Eof](crate::errors::PipelineError::Eof) if the iterator
    /// is exhausted.
    async fn next(&mut self) -> PipelineResult<Bytes>;
}
