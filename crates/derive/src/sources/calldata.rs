//! Calldata data source.

use crate::{
    errors::{PipelineError, ResetError},
    traits::{AsyncIterator, ChainProvider},
    types::{BlockInfo, PipelineResult},
};
use alloc::{boxed::Box, collections::VecDeque, string::ToString};
use alloy_consensus::TxEnvelope;
use alloy_primitives::{Address, Bytes, TxKind};
use async_trait::async_trait;
use tracing::warn;

/// A data iterator that reads batcher calldata from the transactions of one
/// L1 block.
#[derive(Debug, Clone)]
pub struct CalldataSource<CP>
where
    CP: ChainProvider + Send,
{
    /// The chain provider to use for the calldata source.
    chain_provider: CP,
    /// The batch inbox address.
    batch_inbox_address: Address,
    /// The L1 block to read from.
    block_ref: BlockInfo,
    /// The authorized batcher address.
    batcher_address: Address,
    /// Calldata of the authorized batcher transactions, in transaction order.
    calldata: VecDeque<Bytes>,
    /// Whether the source is open.
    open: bool,
}

impl<CP: ChainProvider + Send> CalldataSource<CP> {
    /// Creates a new calldata source.
    pub const fn new(
        chain_provider: CP,
        batch_inbox_address: Address,
        block_ref: BlockInfo,
        batcher_address: Address,
    ) -> Self {
        Self {
            chain_provider,
            batch_inbox_address,
            block_ref,
            batcher_address,
            calldata: VecDeque::new(),
            open: false,
        }
    }

    /// Loads the calldata into the source if it is not open.
    async fn load_calldata(&mut self) -> PipelineResult<()> {
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

        self.calldata = txs.iter().filter_map(|tx| self.extract_calldata(tx)).collect();
        self.open = true;

        Ok(())
    }

    /// Returns the calldata of the transaction if it is an authorized batcher
    /// transaction.
    fn extract_calldata(&self, tx: &TxEnvelope) -> Option<Bytes> {
        let (tx_kind, calldata) = match tx {
            TxEnvelope::Legacy(signed) => (signed.tx().to, signed.tx().input.clone()),
            TxEnvelope::Eip2930(signed) => (signed.tx().to, signed.tx().input.clone()),
            TxEnvelope::Eip1559(signed) => (signed.tx().to, signed.tx().input.clone()),
            // Blob transaction payloads are served by the blob source.
            _ => return None,
        };

        // Contract creations can never target the inbox.
        let TxKind::Call(to) = tx_kind else {
            return None;
        };
        if to != self.batch_inbox_address {
            return None;
        }
        let Some(signer) = crate::sources::recover_tx_signer(tx) else {
            warn!(target: "calldata-source", "Failed to recover signer of inbox transaction");
            return None;
        };
        // Wrong signer: silently skip, the data is unauthorized.
        (signer == self.batcher_address).then_some(calldata)
    }
}

#[async_trait]
impl<CP: ChainProvider + Send> AsyncIterator for CalldataSource<CP> {
    async fn next(&mut self) -> PipelineResult<Bytes> {
        // A failed load leaves the source closed, so the next call re-opens it.
        self.load_calldata().await?;
        self.calldata.pop_front().ok_or(PipelineError::Eof.temp())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{TestChainProvider, TestTxBuilder};

    fn source_with(txs: alloc::vec::Vec<TxEnvelope>) -> CalldataSource<TestChainProvider> {
        let inbox = Address::left_padding_from(&[0xFF]);
        let block_ref = BlockInfo { number: 10, ..Default::default() };
        let builder = TestTxBuilder::default();
        let mut provider = TestChainProvider::default();
        provider.insert_block_with_transactions(10, block_ref, txs);
        CalldataSource::new(provider, inbox, block_ref, builder.batcher_address())
    }

    #[tokio::test]
    async fn test_calldata_source_yields_authorized_data() {
        let builder = TestTxBuilder::default();
        let inbox = Address::left_padding_from(&[0xFF]);
        let tx = builder.signed_calldata_tx(inbox, &[0xde, 0xad]);
        let mut source = source_with(alloc::vec![tx]);

        let data = source.next().await.unwrap();
        assert_eq!(data.as_ref(), &[0xde, 0xad]);
        assert_eq!(source.next().await.unwrap_err(), PipelineError::Eof.temp());
    }

    #[tokio::test]
    async fn test_calldata_source_skips_wrong_signer() {
        let builder = TestTxBuilder::random_key();
        let inbox = Address::left_padding_from(&[0xFF]);
        let tx = builder.signed_calldata_tx(inbox, &[0xde, 0xad]);
        let mut source = source_with(alloc::vec![tx]);

        assert_eq!(source.next().await.unwrap_err(), PipelineError::Eof.temp());
    }

    #[tokio::test]
    async fn test_calldata_source_skips_wrong_target() {
        let builder = TestTxBuilder::default();
        let other = Address::left_padding_from(&[0xEE]);
        let tx = builder.signed_calldata_tx(other, &[0xde, 0xad]);
        let mut source = source_with(alloc::vec![tx]);

        assert_eq!(source.next().await.unwrap_err(), PipelineError::Eof.temp());
    }

    proptest::proptest! {
        /// A batcher transaction signed by any key other than the configured
        /// batcher never contributes data.
        #[test]
        fn proptest_unauthorized_signers_never_contribute(
            key_bytes in proptest::prelude::any::<[u8; 32]>(),
            payload in proptest::collection::vec(proptest::prelude::any::<u8>(), 0..64),
        ) {
            let Some(signer) = TestTxBuilder::from_key_bytes(key_bytes) else {
                // Not a valid secret key; nothing to check.
                return Ok(());
            };
            let authorized = TestTxBuilder::default();
            let inbox = Address::left_padding_from(&[0xFF]);
            let tx = signer.signed_calldata_tx(inbox, &payload);
            let source = CalldataSource::new(
                TestChainProvider::default(),
                inbox,
                BlockInfo::default(),
                authorized.batcher_address(),
            );

            let contributed = source.extract_calldata(&tx);
            if signer.batcher_address() == authorized.batcher_address() {
                proptest::prop_assert!(contributed.is_some());
            } else {
                proptest::prop_assert!(contributed.is_none());
            }
        }
    }

    #[tokio::test]
    async fn test_calldata_source_missing_block_resets() {
        let inbox = Address::left_padding_from(&[0xFF]);
        let block_ref = BlockInfo { number: 10, ..Default::default() };
        let provider = TestChainProvider::default();
        let mut source =
            CalldataSource::new(provider, inbox, block_ref, Address::ZERO);
        assert!(matches!(
            source.next().await.unwrap_err(),
            crate::errors::PipelineErrorKind::Reset(ResetError::BlockNotFound(_))
        ));
    }
}
