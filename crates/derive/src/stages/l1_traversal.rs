//! Contains the L1 traversal stage of the derivation pipeline.

use crate::{
    errors::{PipelineError, ResetError},
    traits::{ChainProvider, L1RetrievalProvider, OriginAdvancer, OriginProvider, SignalReceiver},
    types::{BlockInfo, PipelineResult, ResetSignal, RollupConfig, Signal, SystemConfig},
};
use alloc::{boxed::Box, string::ToString, sync::Arc};
use alloy_primitives::Address;
use async_trait::async_trait;
use tracing::{debug, info, warn};

/// The L1 traversal stage sits at the bottom of the pipeline and exposes one
/// L1 block at a time to the retrieval stage.
///
/// The stage advances either by polling the chain provider
/// ([advance_origin](OriginAdvancer::advance_origin)) or, in supervised
/// deployments, by being handed the next block externally
/// ([provide_next_l1](Self::provide_next_l1)). Accepting a block triggers a
/// receipt scan to fold system-config updates into the stage's
/// [SystemConfig].
#[derive(Debug, Clone)]
pub struct L1Traversal<F: ChainProvider> {
    /// The current block in the traversal stage.
    pub(crate) block: Option<BlockInfo>,
    /// The chain provider used to fetch blocks and receipts.
    chain_provider: F,
    /// Signals that the current block has already been handed out.
    done: bool,
    /// The system config as of the current block.
    pub system_config: SystemConfig,
    /// The rollup config.
    rollup_config: Arc<RollupConfig>,
}

impl<F: ChainProvider> L1Traversal<F> {
    /// Creates a new [L1Traversal] instance.
    pub fn new(chain_provider: F, cfg: Arc<RollupConfig>) -> Self {
        Self {
            block: Some(BlockInfo::default()),
            chain_provider,
            done: false,
            system_config: cfg.genesis.system_config.unwrap_or_default(),
            rollup_config: cfg,
        }
    }

    /// Offers the next L1 block to the stage, for externally-driven
    /// deployments. Returns `Ok(true)` if the block was accepted.
    ///
    /// A block at the wrong height is ignored so the caller can retry once
    /// its view catches up; a block at the right height with the wrong parent
    /// means the stage's chain view has been reorged out and derivation must
    /// reset.
    pub async fn provide_next_l1(&mut self, next: BlockInfo) -> PipelineResult<bool> {
        let block = self.block.ok_or(PipelineError::MissingOrigin.crit())?;
        if next.number != block.number + 1 {
            debug!(
                target: "l1-traversal",
                "Ignoring L1 block #{} at wrong height, expected #{}",
                next.number,
                block.number + 1
            );
            return Ok(false);
        }
        if next.parent_hash != block.hash {
            warn!(target: "l1-traversal", "Detected L1 reorg from {} to {}", block.hash, next.hash);
            return Err(ResetError::ReorgDetected(block.hash, next.parent_hash).reset());
        }

        self.update_system_config(&next).await?;
        self.block = Some(next);
        self.done = false;
        Ok(true)
    }

    /// Scans the receipts of the given block for system config updates.
    async fn update_system_config(&mut self, next: &BlockInfo) -> PipelineResult<()> {
        let receipts = self
            .chain_provider
            .receipts_by_hash(next.hash)
            .await
            .map_err(|e| PipelineError::Provider(e.to_string()).temp())?;
        self.system_config
            .update_with_receipts(&receipts, &self.rollup_config, next.timestamp)
            .map_err(|e| PipelineError::SystemConfigUpdate(e).crit())
    }
}

#[async_trait]
impl<F: ChainProvider + Send> L1RetrievalProvider for L1Traversal<F> {
    /// Returns the next L1 block in the traversal stage, if it has not been
    /// handed out yet. Subsequent calls return an
    /// [Eof](PipelineError::Eof) until the stage is advanced.
    async fn next_l1_block(&mut self) -> PipelineResult<Option<BlockInfo>> {
        if !self.done {
            self.done = true;
            Ok(self.block)
        } else {
            Err(PipelineError::Eof.temp())
        }
    }

    fn batcher_address(&self) -> Address {
        self.system_config.batcher_address
    }
}

#[async_trait]
impl<F: ChainProvider + Send> OriginAdvancer for L1Traversal<F> {
    /// Advances the stage to the next L1 block by number, checking for
    /// reorgs against the current block's hash.
    async fn advance_origin(&mut self) -> PipelineResult<()> {
        let block = self.block.ok_or(PipelineError::Eof.temp())?;
        let next_l1_origin = self
            .chain_provider
            .block_info_by_number(block.number + 1)
            .await
            .map_err(|e| {
                if F::is_not_found(&e) {
                    // The L1 tip has been reached; idle until it advances.
                    PipelineError::Eof.temp()
                } else {
                    PipelineError::Provider(e.to_string()).temp()
                }
            })?;

        if block.hash != next_l1_origin.parent_hash {
            warn!(
                target: "l1-traversal",
                "Detected L1 reorg from {} to {} with conflicting parent",
                block.hash, next_l1_origin.hash
            );
            return Err(
                ResetError::ReorgDetected(block.hash, next_l1_origin.parent_hash).reset()
            );
        }

        self.update_system_config(&next_l1_origin).await?;
        self.block = Some(next_l1_origin);
        self.done = false;
        Ok(())
    }
}

impl<F: ChainProvider> OriginProvider for L1Traversal<F> {
    fn origin(&self) -> Option<BlockInfo> {
        self.block
    }
}

#[async_trait]
impl<F: ChainProvider + Send> SignalReceiver for L1Traversal<F> {
    async fn signal(&mut self, signal: Signal) -> PipelineResult<()> {
        match signal {
            Signal::Reset(ResetSignal { l1_origin, system_config, .. }) |
            Signal::Activation(crate::types::ActivationSignal {
                l1_origin, system_config, ..
            }) => {
                info!(target: "l1-traversal", "Resetting L1 traversal to block #{}", l1_origin.number);
                self.block = Some(l1_origin);
                self.done = false;
                self.system_config = system_config.unwrap_or(self.system_config);
            }
            Signal::FlushChannel => {}
        }
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::test_utils::TestChainProvider;
    use alloy_primitives::b256;

    pub(crate) fn new_test_traversal(
        blocks: alloc::vec::Vec<BlockInfo>,
    ) -> L1Traversal<TestChainProvider> {
        let mut provider = TestChainProvider::default();
        for block in &blocks {
            provider.insert_block(block.number, *block);
        }
        let cfg = Arc::new(RollupConfig::default());
        L1Traversal::new(provider, cfg)
    }

    #[tokio::test]
    async fn test_next_l1_block_exactly_once() {
        let mut traversal = new_test_traversal(alloc::vec![]);
        assert_eq!(traversal.next_l1_block().await.unwrap(), Some(BlockInfo::default()));
        assert_eq!(traversal.next_l1_block().await.unwrap_err(), PipelineError::Eof.temp());
    }

    #[tokio::test]
    async fn test_advance_origin_checks_parent() {
        let block = BlockInfo { number: 1, hash: b256!("1111111111111111111111111111111111111111111111111111111111111111"), ..Default::default() };
        // The next block does not reference the current block's hash.
        let bad_next = BlockInfo { number: 1, ..Default::default() };
        let mut traversal = new_test_traversal(alloc::vec![bad_next]);
        traversal.block = Some(BlockInfo { number: 0, hash: block.hash, ..Default::default() });
        assert!(matches!(
            traversal.advance_origin().await.unwrap_err(),
            crate::errors::PipelineErrorKind::Reset(ResetError::ReorgDetected(_, _))
        ));
    }

    #[tokio::test]
    async fn test_advance_origin_at_tip_is_eof() {
        let mut traversal = new_test_traversal(alloc::vec![]);
        assert_eq!(traversal.advance_origin().await.unwrap_err(), PipelineError::Eof.temp());
    }

    #[tokio::test]
    async fn test_provide_next_l1_wrong_height_ignored() {
        let mut traversal = new_test_traversal(alloc::vec![]);
        let next = BlockInfo { number: 5, ..Default::default() };
        assert!(!traversal.provide_next_l1(next).await.unwrap());
        // The stage state did not move.
        assert_eq!(traversal.origin(), Some(BlockInfo::default()));
    }

    #[tokio::test]
    async fn test_provide_next_l1_wrong_parent_resets() {
        let mut traversal = new_test_traversal(alloc::vec![]);
        traversal.block = Some(BlockInfo {
            number: 0,
            hash: b256!("1111111111111111111111111111111111111111111111111111111111111111"),
            ..Default::default()
        });
        let next = BlockInfo { number: 1, ..Default::default() };
        assert!(matches!(
            traversal.provide_next_l1(next).await.unwrap_err(),
            crate::errors::PipelineErrorKind::Reset(ResetError::ReorgDetected(_, _))
        ));
    }

    #[tokio::test]
    async fn test_provide_next_l1_accepts_and_rearms() {
        let current = BlockInfo {
            number: 0,
            hash: b256!("1111111111111111111111111111111111111111111111111111111111111111"),
            ..Default::default()
        };
        let next = BlockInfo { number: 1, parent_hash: current.hash, ..Default::default() };
        let mut traversal = new_test_traversal(alloc::vec![]);
        traversal.block = Some(current);
        // Drain the current block first.
        traversal.next_l1_block().await.unwrap();

        assert!(traversal.provide_next_l1(next).await.unwrap());
        assert_eq!(traversal.next_l1_block().await.unwrap(), Some(next));
    }

    #[tokio::test]
    async fn test_reset_signal_seeds_block() {
        let mut traversal = new_test_traversal(alloc::vec![]);
        let base = BlockInfo { number: 42, ..Default::default() };
        traversal
            .signal(ResetSignal { l1_origin: base, ..Default::default() }.signal())
            .await
            .unwrap();
        assert_eq!(traversal.origin(), Some(base));
        assert_eq!(traversal.next_l1_block().await.unwrap(), Some(base));
    }
}
