//! The L1 info deposit transaction: the first transaction of every L2 block,
//! carrying the L1 attributes the block was derived from.

use crate::{
    errors::BuilderError,
    params::{L1_BLOCK_ADDRESS, L1_INFO_DEPOSITOR_ADDRESS, L1_INFO_TX_GAS, REGOLITH_L1_INFO_TX_GAS},
    types::{L1InfoDepositSource, RawTransaction, RollupConfig, SystemConfig},
};
use alloc::{string::ToString, vec::Vec};
use alloy_consensus::Header;
use alloy_primitives::{Bytes, TxKind, B256, U256};
use alloy_rlp::Encodable;
use op_alloy_consensus::{OpTxType, TxDeposit};

/// `keccak256("setL1BlockValues(uint64,uint64,uint256,bytes32,uint64,bytes32,uint256,uint256)")[..4]`
const L1_INFO_TX_SELECTOR_BEDROCK: [u8; 4] = [0x01, 0x5d, 0x8e, 0xb9];

/// `keccak256("setL1BlockValuesEcotone()")[..4]`
const L1_INFO_TX_SELECTOR_ECOTONE: [u8; 4] = [0x44, 0x0a, 0x5e, 0x20];

/// The length of a Bedrock L1 info calldata payload.
const L1_INFO_TX_LEN_BEDROCK: usize = 4 + 32 * 8;

/// The length of an Ecotone L1 info calldata payload.
const L1_INFO_TX_LEN_ECOTONE: usize = 164;

/// The L1 attributes deposited into every L2 block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct L1BlockInfoTx {
    /// The L1 block number
    pub number: u64,
    /// The L1 block timestamp
    pub time: u64,
    /// The L1 block base fee
    pub base_fee: u64,
    /// The L1 block hash
    pub block_hash: B256,
    /// The L2 block's position within its epoch
    pub sequence_number: u64,
    /// The versioned batcher address hash
    pub batcher_address_hash: B256,
    /// Pre-Ecotone: the L1 fee overhead; post-Ecotone: unused
    pub l1_fee_overhead: U256,
    /// Pre-Ecotone: the L1 fee scalar; post-Ecotone: the packed fee scalars
    pub l1_fee_scalar: U256,
    /// The L1 blob base fee, post-Ecotone
    pub blob_base_fee: u128,
    /// Whether to use the Ecotone packed encoding
    ecotone: bool,
}

impl L1BlockInfoTx {
    /// Creates a new [L1BlockInfoTx] for the L2 block at `l2_timestamp`,
    /// derived from the given L1 header.
    pub fn try_new(
        cfg: &RollupConfig,
        system_config: &SystemConfig,
        sequence_number: u64,
        l1_header: &Header,
        l1_block_hash: B256,
        l2_timestamp: u64,
    ) -> Result<Self, BuilderError> {
        // The L1 info transaction of the Ecotone activation block retains the
        // Bedrock format, since the L1Block predeploy is upgraded within the
        // activation block itself.
        let ecotone = cfg.is_ecotone_active(l2_timestamp) &&
            !cfg.is_ecotone_activation_block(l2_timestamp);
        Ok(Self {
            number: l1_header.number,
            time: l1_header.timestamp,
            base_fee: l1_header
                .base_fee_per_gas
                .unwrap_or_default()
                .try_into()
                .map_err(|_| BuilderError::Custom("base fee exceeds u64".to_string()))?,
            block_hash: l1_block_hash,
            sequence_number,
            batcher_address_hash: B256::left_padding_from(
                system_config.batcher_address.as_slice(),
            ),
            l1_fee_overhead: system_config.overhead,
            l1_fee_scalar: system_config.scalar,
            blob_base_fee: l1_header.blob_fee().unwrap_or(1),
            ecotone,
        })
    }

    /// Encodes the L1 info as calldata for the L1 block predeploy.
    pub fn encode_calldata(&self) -> Bytes {
        if self.ecotone {
            self.encode_calldata_ecotone()
        } else {
            self.encode_calldata_bedrock()
        }
    }

    fn encode_calldata_bedrock(&self) -> Bytes {
        let mut buf = Vec::with_capacity(L1_INFO_TX_LEN_BEDROCK);
        buf.extend_from_slice(&L1_INFO_TX_SELECTOR_BEDROCK);
        buf.extend_from_slice(&U256::from(self.number).to_be_bytes::<32>());
        buf.extend_from_slice(&U256::from(self.time).to_be_bytes::<32>());
        buf.extend_from_slice(&U256::from(self.base_fee).to_be_bytes::<32>());
        buf.extend_from_slice(self.block_hash.as_slice());
        buf.extend_from_slice(&U256::from(self.sequence_number).to_be_bytes::<32>());
        buf.extend_from_slice(self.batcher_address_hash.as_slice());
        buf.extend_from_slice(&self.l1_fee_overhead.to_be_bytes::<32>());
        buf.extend_from_slice(&self.l1_fee_scalar.to_be_bytes::<32>());
        buf.into()
    }

    fn encode_calldata_ecotone(&self) -> Bytes {
        // The Ecotone encoding is tightly packed:
        // selector ++ baseFeeScalar ++ blobBaseFeeScalar ++ sequenceNumber ++
        // timestamp ++ number ++ baseFee ++ blobBaseFee ++ blockHash ++ batcherHash
        let scalar = self.l1_fee_scalar.to_be_bytes::<32>();
        let blob_base_fee_scalar = (scalar[0] == 1)
            .then(|| u32::from_be_bytes(scalar[24..28].try_into().expect("4 byte slice")))
            .unwrap_or_default();
        let base_fee_scalar = u32::from_be_bytes(scalar[28..].try_into().expect("4 byte slice"));

        let mut buf = Vec::with_capacity(L1_INFO_TX_LEN_ECOTONE);
        buf.extend_from_slice(&L1_INFO_TX_SELECTOR_ECOTONE);
        buf.extend_from_slice(&base_fee_scalar.to_be_bytes());
        buf.extend_from_slice(&blob_base_fee_scalar.to_be_bytes());
        buf.extend_from_slice(&self.sequence_number.to_be_bytes());
        buf.extend_from_slice(&self.time.to_be_bytes());
        buf.extend_from_slice(&self.number.to_be_bytes());
        buf.extend_from_slice(&U256::from(self.base_fee).to_be_bytes::<32>());
        buf.extend_from_slice(&U256::from(self.blob_base_fee).to_be_bytes::<32>());
        buf.extend_from_slice(self.block_hash.as_slice());
        buf.extend_from_slice(self.batcher_address_hash.as_slice());
        buf.into()
    }

    /// Builds the L1 info deposit transaction as an EIP-2718 envelope.
    pub fn to_deposit_tx(&self, cfg: &RollupConfig, l2_timestamp: u64) -> RawTransaction {
        let source =
            L1InfoDepositSource { l1_block_hash: self.block_hash, seq_number: self.sequence_number };

        // Regolith lowered the gas allotted to the L1 info transaction and
        // stopped metering its execution.
        let gas_limit = if cfg.is_regolith_active(l2_timestamp) {
            REGOLITH_L1_INFO_TX_GAS
        } else {
            L1_INFO_TX_GAS
        };

        let deposit = TxDeposit {
            source_hash: source.source_hash(),
            from: L1_INFO_DEPOSITOR_ADDRESS,
            to: TxKind::Call(L1_BLOCK_ADDRESS),
            mint: None,
            value: U256::ZERO,
            gas_limit,
            is_system_transaction: !cfg.is_regolith_active(l2_timestamp),
            input: self.encode_calldata(),
        };

        let mut buffer = Vec::with_capacity(deposit.length() + 1);
        buffer.push(OpTxType::Deposit as u8);
        deposit.encode(&mut buffer);
        RawTransaction::from(buffer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::RollupConfig;
    use alloy_primitives::address;

    fn test_info(ecotone: bool) -> L1BlockInfoTx {
        L1BlockInfoTx {
            number: 100,
            time: 12345,
            base_fee: 1000,
            block_hash: B256::left_padding_from(&[0xAB]),
            sequence_number: 3,
            batcher_address_hash: B256::left_padding_from(
                address!("6887246668a3b87f54deb3b94ba47a6f63f32985").as_slice(),
            ),
            l1_fee_overhead: U256::from(0xbc),
            l1_fee_scalar: U256::from(0xa6fe0),
            blob_base_fee: 1,
            ecotone,
        }
    }

    #[test]
    fn test_bedrock_calldata_layout() {
        let calldata = test_info(false).encode_calldata();
        assert_eq!(calldata.len(), L1_INFO_TX_LEN_BEDROCK);
        assert_eq!(&calldata[..4], &L1_INFO_TX_SELECTOR_BEDROCK);
        assert_eq!(U256::from_be_slice(&calldata[4..36]), U256::from(100));
    }

    #[test]
    fn test_ecotone_calldata_layout() {
        let calldata = test_info(true).encode_calldata();
        assert_eq!(calldata.len(), L1_INFO_TX_LEN_ECOTONE);
        assert_eq!(&calldata[..4], &L1_INFO_TX_SELECTOR_ECOTONE);
        // sequence number sits after the two fee scalars.
        assert_eq!(u64::from_be_bytes(calldata[12..20].try_into().unwrap()), 3);
    }

    #[test]
    fn test_deposit_tx_is_deposit_type() {
        let cfg = RollupConfig { regolith_time: Some(0), ..Default::default() };
        let raw = test_info(false).to_deposit_tx(&cfg, 12347);
        assert!(raw.is_deposit());
    }
}
