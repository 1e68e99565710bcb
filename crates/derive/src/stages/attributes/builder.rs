//! The stateful [AttributesBuilder] implementation.

use super::{derive_deposits, EcotoneTransactionBuilder};
use crate::{
    errors::BuilderError,
    params::SEQUENCER_FEE_VAULT_ADDRESS,
    traits::{AttributesBuilder, ChainProvider, L2ChainProvider},
    types::{
        BlockID, L1BlockInfoTx, L2BlockInfo, PayloadAttributes, RawTransaction, RollupConfig,
    },
};
use alloc::{boxed::Box, string::ToString, sync::Arc, vec, vec::Vec};
use alloy_primitives::B64;
use async_trait::async_trait;

/// A stateful implementation of the [AttributesBuilder].
///
/// For the first L2 block of a new epoch, the builder fetches the full
/// receipts of the epoch's L1 block to derive user deposits and apply system
/// config updates; within an epoch, only the L1 header is consulted.
#[derive(Debug)]
pub struct StatefulAttributesBuilder<L1, L2>
where
    L1: ChainProvider,
    L2: L2ChainProvider,
{
    /// The rollup config.
    rollup_cfg: Arc<RollupConfig>,
    /// The L1 header and receipts fetcher.
    receipts_fetcher: L1,
    /// The system config fetcher, keyed by L2 block.
    config_fetcher: L2,
}

impl<L1, L2> StatefulAttributesBuilder<L1, L2>
where
    L1: ChainProvider,
    L2: L2ChainProvider,
{
    /// Create a new [StatefulAttributesBuilder] with the given fetchers.
    pub const fn new(rcfg: Arc<RollupConfig>, receipts: L1, config: L2) -> Self {
        Self { rollup_cfg: rcfg, receipts_fetcher: receipts, config_fetcher: config }
    }
}

#[async_trait]
impl<L1, L2> AttributesBuilder for StatefulAttributesBuilder<L1, L2>
where
    L1: ChainProvider + Send,
    L2: L2ChainProvider + Send,
{
    async fn prepare_payload_attributes(
        &mut self,
        l2_parent: L2BlockInfo,
        epoch: BlockID,
    ) -> Result<PayloadAttributes, BuilderError> {
        let l1_header;
        let deposit_transactions: Vec<RawTransaction>;
        let sequence_number;

        let mut sys_config = self
            .config_fetcher
            .system_config_by_number(l2_parent.block_info.number, Arc::clone(&self.rollup_cfg))
            .await
            .map_err(|e| BuilderError::Custom(e.to_string()))?;

        // If the L1 origin changed in this block, then we are in the first
        // block of the epoch. In this case we need to fetch all transaction
        // receipts from the L1 origin block so we can scan for user deposits
        // and config updates.
        if l2_parent.l1_origin.number != epoch.number {
            let header = self
                .receipts_fetcher
                .header_by_hash(epoch.hash)
                .await
                .map_err(|e| BuilderError::Custom(e.to_string()))?;
            if l2_parent.l1_origin.hash != header.parent_hash {
                return Err(BuilderError::BlockMismatchEpochReset(
                    epoch,
                    l2_parent.l1_origin,
                    header.parent_hash,
                ));
            }
            let receipts = self
                .receipts_fetcher
                .receipts_by_hash(epoch.hash)
                .await
                .map_err(|e| BuilderError::Custom(e.to_string()))?;
            sys_config
                .update_with_receipts(&receipts, &self.rollup_cfg, header.timestamp)
                .map_err(BuilderError::SystemConfigUpdate)?;
            deposit_transactions =
                derive_deposits(epoch.hash, &receipts, self.rollup_cfg.deposit_contract_address)
                    .map_err(|e| BuilderError::Custom(e.to_string()))?;
            l1_header = header;
            sequence_number = 0;
        } else {
            #[allow(clippy::collapsible_else_if)]
            if l2_parent.l1_origin.hash != epoch.hash {
                return Err(BuilderError::BlockMismatch(epoch, l2_parent.l1_origin));
            }

            l1_header = self
                .receipts_fetcher
                .header_by_hash(epoch.hash)
                .await
                .map_err(|e| BuilderError::Custom(e.to_string()))?;
            deposit_transactions = vec![];
            sequence_number = l2_parent.seq_num + 1;
        }

        // Sanity check the L1 origin was correctly selected to maintain the
        // time invariant between L1 and L2.
        let next_l2_time = l2_parent.block_info.timestamp + self.rollup_cfg.block_time;
        if next_l2_time < l1_header.timestamp {
            return Err(BuilderError::BrokenTimeInvariant(
                l2_parent.l1_origin,
                next_l2_time,
                BlockID { hash: epoch.hash, number: l1_header.number },
                l1_header.timestamp,
            ));
        }

        let l1_info = L1BlockInfoTx::try_new(
            &self.rollup_cfg,
            &sys_config,
            sequence_number,
            &l1_header,
            epoch.hash,
            next_l2_time,
        )?;

        let mut upgrade_transactions: Vec<RawTransaction> = vec![];
        if self.rollup_cfg.is_ecotone_activation_block(next_l2_time) {
            upgrade_transactions = EcotoneTransactionBuilder::build_txs()?;
        }

        let mut txs =
            Vec::with_capacity(1 + deposit_transactions.len() + upgrade_transactions.len());
        txs.push(l1_info.to_deposit_tx(&self.rollup_cfg, next_l2_time));
        txs.extend(deposit_transactions);
        txs.extend(upgrade_transactions);

        let withdrawals =
            self.rollup_cfg.is_canyon_active(next_l2_time).then(Vec::new);

        let parent_beacon_block_root = self
            .rollup_cfg
            .is_ecotone_active(next_l2_time)
            .then(|| l1_header.parent_beacon_block_root.unwrap_or_default());

        let eip_1559_params = self
            .rollup_cfg
            .is_holocene_active(next_l2_time)
            .then(|| B64::from(sys_config.eip_1559_params()));

        Ok(PayloadAttributes {
            timestamp: next_l2_time,
            prev_randao: l1_header.mix_hash,
            fee_recipient: SEQUENCER_FEE_VAULT_ADDRESS,
            transactions: txs,
            no_tx_pool: true,
            gas_limit: Some(sys_config.gas_limit),
            withdrawals,
            parent_beacon_block_root,
            eip_1559_params,
        })
    }
}
