//! Blob data source.

use crate::{
    errors::{PipelineError, PipelineErrorKind, ResetError},
    traits::{AsyncIterator, BlobProvider, ChainProvider},
    types::{BlobData, BlockInfo, IndexedBlobHash, PipelineResult},
};
use alloc::{boxed::Box, collections::VecDeque, string::ToString, vec::Vec};
use alloy_consensus::{TxEip4844Variant, TxEnvelope};
use alloy_primitives::{Address, Bytes, TxKind};
use async_trait::async_trait;
use tracing::warn;

/// A data iterator that reads batcher payloads from the blob-carrying (and
/// calldata) transactions of one L1 block.
#[derive(Debug, Clone)]
pub struct BlobSource<CP, B>
where
    CP: ChainProvider + Send,
    B: BlobProvider + Send,
{
    /// The chain provider.
    chain_provider: CP,
    /// The blob fetcher.
    blob_fetcher: B,
    /// The batch inbox address.
    batch_inbox_address: Address,
    /// The L1 block to read from.
    block_ref: BlockInfo,
    /// The authorized batcher address.
    batcher_address: Address,
    /// The batcher payloads of the block, in transaction order.
    data: VecDeque<BlobData>,
    /// Whether the source is open.
    open: bool,
}

impl<CP, B> BlobSource<CP, B>
where
    CP: ChainProvider + Send,
    B: BlobProvider + Send,
{
    /// Creates a new blob source.
    pub const fn new(
        chain_provider: CP,
        blob_fetcher: B,
        batch_inbox_address: Address,
        block_ref: BlockInfo,
        batcher_address: Address,
    ) -> Self {
        Self {
            chain_provider,
            blob_fetcher,
            batch_inbox_address,
            block_ref,
            batcher_address,
            data: VecDeque::new(),
            open: false,
        }
    }

    /// Extracts the batcher payload placeholders and the indexed blob hashes
    /// to fetch from the given transactions.
    ///
    /// The blob index is global across all transactions of the block,
    /// including transactions that are filtered out, to keep the index
    /// aligned with the beacon-chain sidecars.
    fn extract_blob_data(&self, txs: &[TxEnvelope]) -> (Vec<BlobData>, Vec<IndexedBlobHash>) {
        let mut index = 0u64;
        let mut data = Vec::new();
        let mut hashes = Vec::new();

        for tx in txs {
            let (tx_kind, calldata, blob_hashes) = match tx {
                TxEnvelope::Legacy(signed) => (signed.tx().to, signed.tx().input.clone(), None),
                TxEnvelope::Eip2930(signed) => (signed.tx().to, signed.tx().input.clone(), None),
                TxEnvelope::Eip1559(signed) => (signed.tx().to, signed.tx().input.clone(), None),
                TxEnvelope::Eip4844(signed) => {
                    let blob_tx = match signed.tx() {
                        TxEip4844Variant::TxEip4844(tx) => tx,
                        TxEip4844Variant::TxEip4844WithSidecar(tx) => tx.tx(),
                    };
                    (
                        TxKind::Call(blob_tx.to),
                        blob_tx.input.clone(),
                        Some(blob_tx.blob_versioned_hashes.clone()),
                    )
                }
                _ => continue,
            };
            let blob_count = blob_hashes.as_ref().map_or(0, Vec::len) as u64;

            let TxKind::Call(to) = tx_kind else {
                index += blob_count;
                continue;
            };
            if to != self.batch_inbox_address {
                index += blob_count;
                continue;
            }
            let authorized = crate::sources::recover_tx_signer(tx)
                .map_or(false, |signer| signer == self.batcher_address);
            if !authorized {
                // Unauthorized submissions still occupy blob indices.
                index += blob_count;
                continue;
            }

            match blob_hashes {
                None => {
                    data.push(BlobData { calldata: Some(calldata), data: None });
                }
                Some(blob_hashes) => {
                    if !calldata.is_empty() {
                        warn!(target: "blob-source", "Blob tx has calldata, which will be ignored");
                    }
                    for hash in blob_hashes {
                        hashes.push(IndexedBlobHash { index, hash });
                        data.push(BlobData::default());
                        index += 1;
                    }
                }
            }
        }

        (data, hashes)
    }

    /// Loads the blob data into the source if it is not open.
    async fn load_blobs(&mut self) -> PipelineResult<()> {
        if self.open {
            return Ok(());
        }

        let (_, txs) = self
            .chain_provider
            .block_info_and_transactions_by_hash(self.block_ref.hash)
            .await
            .map_err(|e| {
                if CP::is_not_found(&e) {
                    ResetError::BlockNotFound(self.block_ref.hash).reset()
                } else {
                    PipelineError::Provider(e.to_string()).temp()
                }
            })?;

        let (mut data, hashes) = self.extract_blob_data(&txs);

        if !hashes.is_empty() {
            let blobs =
                self.blob_fetcher.get_blobs(&self.block_ref, &hashes).await.map_err(PipelineErrorKind::from)?;
            if blobs.len() != hashes.len() {
                return Err(PipelineError::Provider("blob length mismatch".to_string()).crit());
            }

            let mut blob_index = 0usize;
            for entry in data.iter_mut() {
                if entry.calldata.is_some() {
                    continue;
                }
                entry
                    .fill(&blobs, blob_index)
                    .map_err(|e| PipelineError::Provider(e.to_string()).crit())?;
                if entry.is_empty() {
                    // An unretrievable blob: the placeholder stays empty and
                    // is skipped when read.
                    warn!(target: "blob-source", "Missing blob at index {blob_index}, skipping");
                }
                blob_index += 1;
            }
        }

        self.data = data.into();
        self.open = true;
        Ok(())
    }

    /// Pops the next batcher payload placeholder.
    fn next_data(&mut self) -> Option<BlobData> {
        self.data.pop_front()
    }
}

#[async_trait]
impl<CP, B> AsyncIterator for BlobSource<CP, B>
where
    CP: ChainProvider + Send,
    B: BlobProvider + Send,
{
    async fn next(&mut self) -> PipelineResult<Bytes> {
        self.load_blobs().await?;

        loop {
            let Some(next_data) = self.next_data() else {
                return Err(PipelineError::Eof.temp());
            };
            if let Some(calldata) = next_data.calldata {
                return Ok(calldata);
            }
            if next_data.is_empty() {
                continue;
            }

            // Decode the blob body into its raw payload. Invalid blobs are
            // ignored and the iterator advances.
            match next_data.decode() {
                Ok(payload) => return Ok(payload),
                Err(_) => {
                    warn!(target: "blob-source", "Failed to decode blob data, skipping");
                }
            }
        }
    }
}
