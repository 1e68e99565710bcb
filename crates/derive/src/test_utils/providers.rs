//! Mock implementations of the external collaborator traits.

use crate::{
    errors::BlobProviderError,
    traits::{
        AsyncIterator, BlobProvider, ChainProvider, DataAvailabilityProvider, L2ChainProvider,
    },
    types::{
        BlockInfo, IndexedBlobHash, L2BlockInfo, PipelineResult, RawTransaction, RollupConfig,
        SystemConfig,
    },
};
use alloc::{boxed::Box, collections::VecDeque, string::String, sync::Arc, vec::Vec};
use alloy_consensus::{Header, Receipt, TxEnvelope};
use alloy_eips::eip4844::Blob;
use alloy_primitives::{Address, Bytes, B256};
use async_trait::async_trait;
use std::sync::Mutex;

/// The error returned by the test providers.
#[derive(derive_more::Display, Debug, Clone, PartialEq, Eq)]
pub enum TestProviderError {
    /// The requested block was not found.
    #[display("Block not found")]
    BlockNotFound,
    /// Any other failure.
    #[display("{_0}")]
    Custom(String),
}

impl core::error::Error for TestProviderError {}

/// A mock [ChainProvider] backed by in-memory maps.
#[derive(Debug, Clone, Default)]
pub struct TestChainProvider {
    /// Blocks by number.
    pub blocks: Vec<(u64, BlockInfo)>,
    /// Headers by hash.
    pub headers: Vec<(B256, Header)>,
    /// Receipts by block hash.
    pub receipts: Vec<(B256, Vec<Receipt>)>,
    /// Transactions by block hash.
    pub transactions: Vec<(B256, BlockInfo, Vec<TxEnvelope>)>,
}

impl TestChainProvider {
    /// Insert a block into the provider.
    pub fn insert_block(&mut self, number: u64, block: BlockInfo) {
        self.blocks.push((number, block));
    }

    /// Insert a block with transactions into the provider.
    pub fn insert_block_with_transactions(
        &mut self,
        number: u64,
        block: BlockInfo,
        txs: Vec<TxEnvelope>,
    ) {
        self.blocks.push((number, block));
        self.transactions.push((block.hash, block, txs));
    }

    /// Insert a header into the provider.
    pub fn insert_header(&mut self, hash: B256, header: Header) {
        self.headers.push((hash, header));
    }

    /// Insert receipts into the provider.
    pub fn insert_receipts(&mut self, hash: B256, receipts: Vec<Receipt>) {
        self.receipts.push((hash, receipts));
    }
}

#[async_trait]
impl ChainProvider for TestChainProvider {
    type Error = TestProviderError;

    fn is_not_found(err: &Self::Error) -> bool {
        matches!(err, TestProviderError::BlockNotFound)
    }

    async fn header_by_hash(&mut self, hash: B256) -> Result<Header, Self::Error> {
        self.headers
            .iter()
            .find(|(h, _)| *h == hash)
            .map(|(_, header)| header.clone())
            .ok_or(TestProviderError::BlockNotFound)
    }

    async fn block_info_by_number(&mut self, number: u64) -> Result<BlockInfo, Self::Error> {
        self.blocks
            .iter()
            .find(|(n, _)| *n == number)
            .map(|(_, block)| *block)
            .ok_or(TestProviderError::BlockNotFound)
    }

    async fn receipts_by_hash(&mut self, hash: B256) -> Result<Vec<Receipt>, Self::Error> {
        Ok(self
            .receipts
            .iter()
            .find(|(h, _)| *h == hash)
            .map(|(_, receipts)| receipts.clone())
            .unwrap_or_default())
    }

    async fn block_info_and_transactions_by_hash(
        &mut self,
        hash: B256,
    ) -> Result<(BlockInfo, Vec<TxEnvelope>), Self::Error> {
        self.transactions
            .iter()
            .find(|(h, _, _)| *h == hash)
            .map(|(_, block, txs)| (*block, txs.clone()))
            .ok_or(TestProviderError::BlockNotFound)
    }
}

/// A mock [L2ChainProvider] backed by in-memory maps.
#[derive(Debug, Clone, Default)]
pub struct TestL2ChainProvider {
    /// Safe L2 blocks.
    pub blocks: Vec<L2BlockInfo>,
    /// Payload transactions by L2 block number.
    pub payloads: Vec<(u64, Vec<RawTransaction>)>,
    /// System configs by L2 block number.
    pub system_configs: Vec<(u64, SystemConfig)>,
}

#[async_trait]
impl L2ChainProvider for TestL2ChainProvider {
    type Error = TestProviderError;

    async fn l2_block_info_by_number(&mut self, number: u64) -> Result<L2BlockInfo, Self::Error> {
        self.blocks
            .iter()
            .find(|b| b.block_info.number == number)
            .copied()
            .ok_or(TestProviderError::BlockNotFound)
    }

    async fn payload_by_number(
        &mut self,
        number: u64,
    ) -> Result<Vec<RawTransaction>, Self::Error> {
        self.payloads
            .iter()
            .find(|(n, _)| *n == number)
            .map(|(_, txs)| txs.clone())
            .ok_or(TestProviderError::BlockNotFound)
    }

    async fn system_config_by_number(
        &mut self,
        number: u64,
        _: Arc<RollupConfig>,
    ) -> Result<SystemConfig, Self::Error> {
        Ok(self
            .system_configs
            .iter()
            .find(|(n, _)| *n == number)
            .map(|(_, cfg)| *cfg)
            .unwrap_or_default())
    }
}

/// A mock [BlobProvider] keyed by versioned hash. Requested indexed hashes
/// are recorded for assertion.
#[derive(Debug, Clone, Default)]
pub struct TestBlobProvider {
    /// Blobs by versioned hash.
    pub blobs: alloc::vec::Vec<(B256, Box<Blob>)>,
    /// The indexed hashes requested from the provider.
    pub requests: Arc<Mutex<Vec<IndexedBlobHash>>>,
    /// Whether the provider should error.
    pub should_error: bool,
}

impl TestBlobProvider {
    /// Inserts a blob that decodes to the given raw bytes. Only payloads up
    /// to 27 bytes are supported, which fit entirely in the first field
    /// element.
    pub fn insert_encoded(&mut self, hash: B256, payload: &[u8]) {
        assert!(payload.len() <= 27, "encoded test payloads must fit the first field element");
        let mut blob = Box::new(Blob::ZERO);
        let len = payload.len() as u32;
        blob[2..5].copy_from_slice(&len.to_be_bytes()[1..]);
        blob[5..5 + payload.len()].copy_from_slice(payload);
        self.blobs.push((hash, blob));
    }
}

#[async_trait]
impl BlobProvider for TestBlobProvider {
    async fn get_blobs(
        &mut self,
        _block_ref: &BlockInfo,
        blob_hashes: &[IndexedBlobHash],
    ) -> Result<Vec<Option<Box<Blob>>>, BlobProviderError> {
        if self.should_error {
            return Err(BlobProviderError::Backend("test error".into()));
        }
        self.requests.lock().unwrap().extend_from_slice(blob_hashes);
        Ok(blob_hashes
            .iter()
            .map(|ih| {
                self.blobs.iter().find(|(h, _)| *h == ih.hash).map(|(_, b)| b.clone())
            })
            .collect())
    }
}

/// A mock data iterator serving canned results.
#[derive(Debug, Default)]
pub struct TestIter {
    /// The results to serve, in order.
    pub results: VecDeque<PipelineResult<Bytes>>,
}

#[async_trait]
impl AsyncIterator for TestIter {
    async fn next(&mut self) -> PipelineResult<Bytes> {
        self.results
            .pop_front()
            .unwrap_or(Err(crate::errors::PipelineError::Eof.temp()))
    }
}

/// A mock [DataAvailabilityProvider]. The canned results are handed to the
/// first opened iterator.
#[derive(Debug, Default)]
pub struct TestDap {
    /// The results the opened iterator serves.
    pub results: Mutex<Vec<PipelineResult<Bytes>>>,
    /// The batcher addresses `open_data` was called with.
    pub open_data_calls: Mutex<Vec<(BlockInfo, Address)>>,
}

impl TestDap {
    /// Creates a new [TestDap] with the given results.
    pub fn new(results: Vec<PipelineResult<Bytes>>) -> Self {
        Self { results: Mutex::new(results), open_data_calls: Default::default() }
    }
}

#[async_trait]
impl DataAvailabilityProvider for TestDap {
    type DataIter = TestIter;

    async fn open_data(
        &self,
        block_ref: &BlockInfo,
        batcher_address: Address,
    ) -> PipelineResult<Self::DataIter> {
        self.open_data_calls.lock().unwrap().push((*block_ref, batcher_address));
        Ok(TestIter { results: core::mem::take(&mut *self.results.lock().unwrap()).into() })
    }
}
