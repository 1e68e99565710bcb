//! Contains payload attribute types.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use super::{BlockInfo, L2BlockInfo, RawTransaction};
use alloc::vec::Vec;
use alloy_eips::eip4895::Withdrawal;
use alloy_primitives::{Address, B256, B64};

/// The complete instruction set handed to the execution engine to build one
/// L2 block.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PayloadAttributes {
    /// Value for the timestamp field of the new payload.
    #[cfg_attr(feature = "serde", serde(rename = "timestamp"))]
    pub timestamp: u64,
    /// Value for the random field of the new payload.
    #[cfg_attr(feature = "serde", serde(rename = "prevRandao"))]
    pub prev_randao: B256,
    /// Suggested value for the coinbase field of the new payload.
    #[cfg_attr(feature = "serde", serde(rename = "suggestedFeeRecipient"))]
    pub fee_recipient: Address,
    /// Withdrawals to include in the block; `Some(vec![])` post-Canyon, `None`
    /// before.
    #[cfg_attr(feature = "serde", serde(rename = "withdrawals"))]
    pub withdrawals: Option<Vec<Withdrawal>>,
    /// Parent beacon block root, non-nil post-Ecotone.
    #[cfg_attr(feature = "serde", serde(rename = "parentBeaconBlockRoot"))]
    pub parent_beacon_block_root: Option<B256>,
    /// Transactions to force into the block, always at the start of the
    /// transactions list.
    #[cfg_attr(feature = "serde", serde(rename = "transactions"))]
    pub transactions: Vec<RawTransaction>,
    /// NoTxPool to disable adding any transactions from the transaction-pool.
    #[cfg_attr(feature = "serde", serde(rename = "noTxPool"))]
    pub no_tx_pool: bool,
    /// GasLimit override.
    #[cfg_attr(feature = "serde", serde(rename = "gasLimit"))]
    pub gas_limit: Option<u64>,
    /// The EIP-1559 parameters of the block, non-nil post-Holocene.
    #[cfg_attr(feature = "serde", serde(rename = "eip1559Params"))]
    pub eip_1559_params: Option<B64>,
}

/// Payload attributes tagged with the parent block they build on and the L1
/// block they were derived from. The pipeline's terminal output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributesWithParent {
    /// The payload attributes.
    pub attributes: PayloadAttributes,
    /// The parent block reference.
    pub parent: L2BlockInfo,
    /// Whether the current batch is the last in its span.
    pub is_last_in_span: bool,
    /// The L1 block the attributes were derived from.
    pub derived_from: BlockInfo,
}

impl AttributesWithParent {
    /// Create a new [AttributesWithParent] instance.
    pub const fn new(
        attributes: PayloadAttributes,
        parent: L2BlockInfo,
        is_last_in_span: bool,
        derived_from: BlockInfo,
    ) -> Self {
        Self { attributes, parent, is_last_in_span, derived_from }
    }

    /// Returns the payload attributes.
    pub const fn attributes(&self) -> &PayloadAttributes {
        &self.attributes
    }

    /// Returns the parent block reference.
    pub const fn parent(&self) -> &L2BlockInfo {
        &self.parent
    }

    /// Returns whether the current batch is the last in its span.
    pub const fn is_last_in_span(&self) -> bool {
        self.is_last_in_span
    }
}
