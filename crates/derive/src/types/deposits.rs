//! Deposit transaction sources and log decoding.

use crate::{errors::PipelineEncodingError, params::DEPOSIT_EVENT_ABI_HASH, types::RawTransaction};
use alloc::{format, string::ToString, vec::Vec};
use alloy_primitives::{keccak256, Address, Log, TxKind, B256, U256, U64};
use alloy_rlp::Encodable;
use op_alloy_consensus::{OpTxType, TxDeposit};

/// The domains of deposit source hashes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u64)]
pub enum DepositSourceDomain {
    /// A user deposit, sourced from an L1 deposit-contract log.
    User = 0,
    /// An L1 info deposit, identifying the L1 attributes of an L2 block.
    L1Info = 1,
    /// A network upgrade deposit.
    Upgrade = 2,
}

/// A deposit source identifying a user deposit by the L1 block it was
/// emitted in and the index of the log within that block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UserDepositSource {
    /// The L1 block hash containing the deposit log
    pub l1_block_hash: B256,
    /// The index of the deposit log in the block
    pub log_index: u64,
}

impl UserDepositSource {
    /// Creates a new [UserDepositSource].
    pub const fn new(l1_block_hash: B256, log_index: u64) -> Self {
        Self { l1_block_hash, log_index }
    }

    /// Computes the source hash of the deposit.
    pub fn source_hash(&self) -> B256 {
        let mut input = [0u8; 64];
        input[..32].copy_from_slice(self.l1_block_hash.as_slice());
        input[56..].copy_from_slice(&self.log_index.to_be_bytes());
        let deposit_id_hash = keccak256(input);
        let mut domain_input = [0u8; 64];
        domain_input[24..32].copy_from_slice(&(DepositSourceDomain::User as u64).to_be_bytes());
        domain_input[32..].copy_from_slice(deposit_id_hash.as_slice());
        keccak256(domain_input)
    }
}

/// A deposit source identifying the L1 info deposit of an L2 block by its
/// sequencing epoch and position therein.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct L1InfoDepositSource {
    /// The hash of the epoch's L1 block
    pub l1_block_hash: B256,
    /// The sequence number of the L2 block within the epoch
    pub seq_number: u64,
}

impl L1InfoDepositSource {
    pub(crate) fn source_hash(&self) -> B256 {
        let mut input = [0u8; 64];
        input[..32].copy_from_slice(self.l1_block_hash.as_slice());
        input[56..].copy_from_slice(&self.seq_number.to_be_bytes());
        let deposit_id_hash = keccak256(input);
        let mut domain_input = [0u8; 64];
        domain_input[24..32].copy_from_slice(&(DepositSourceDomain::L1Info as u64).to_be_bytes());
        domain_input[32..].copy_from_slice(deposit_id_hash.as_slice());
        keccak256(domain_input)
    }
}

/// A deposit source identifying a network-upgrade transaction by its intent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct UpgradeDepositSource {
    /// A human-readable intent, e.g. the name of the deployment.
    pub intent: alloc::string::String,
}

impl UpgradeDepositSource {
    pub(crate) fn source_hash(&self) -> B256 {
        let intent_hash = keccak256(self.intent.as_bytes());
        let mut domain_input = [0u8; 64];
        domain_input[24..32].copy_from_slice(&(DepositSourceDomain::Upgrade as u64).to_be_bytes());
        domain_input[32..].copy_from_slice(intent_hash.as_slice());
        keccak256(domain_input)
    }
}

/// Derives a deposit transaction from an EVM log event emitted by the deposit
/// contract.
///
/// The emitted log must be in format:
/// ```solidity
/// event TransactionDeposited(
///    address indexed from,
///    address indexed to,
///    uint256 indexed version,
///    bytes opaqueData
/// );
/// ```
pub fn decode_deposit(
    block_hash: B256,
    index: usize,
    log: &Log,
) -> Result<RawTransaction, PipelineEncodingError> {
    let topics = log.data.topics();
    if topics.len() != 4 {
        return Err(PipelineEncodingError::DepositError(format!(
            "expected 4 event topics, got {}",
            topics.len()
        )));
    }
    if topics[0] != DEPOSIT_EVENT_ABI_HASH {
        return Err(PipelineEncodingError::DepositError(format!(
            "invalid deposit event selector: {}",
            topics[0]
        )));
    }
    if log.data.data.len() < 64 {
        return Err(PipelineEncodingError::DepositError(format!(
            "incomplete opaqueData slice header: {}",
            log.data.data.len()
        )));
    }
    if log.data.data.len() % 32 != 0 {
        return Err(PipelineEncodingError::DepositError(format!(
            "expected log data to be multiple of 32 bytes: got {}",
            log.data.data.len()
        )));
    }

    let from = Address::from_slice(&topics[1].as_slice()[12..]);
    let to = Address::from_slice(&topics[2].as_slice()[12..]);
    let version = topics[3];
    if !version.is_zero() {
        return Err(PipelineEncodingError::DepositError(format!(
            "invalid deposit version, got {version}"
        )));
    }

    // The log data is an ABI encoded `bytes` value: a 32 byte offset, a 32
    // byte length, and the tightly packed opaque data padded to 32 bytes.
    let opaque_content_offset = U64::try_from_be_slice(&log.data.data[24..32])
        .ok_or_else(|| PipelineEncodingError::DepositError("invalid offset word".to_string()))?;
    if opaque_content_offset != U64::from(32) {
        return Err(PipelineEncodingError::DepositError(format!(
            "invalid opaqueData slice header offset: {opaque_content_offset}"
        )));
    }

    let opaque_content_len =
        u64::from_be_bytes(log.data.data[56..64].try_into().expect("8 byte slice"));
    if opaque_content_len as usize > log.data.data.len() - 64 {
        return Err(PipelineEncodingError::DepositError(format!(
            "opaqueData content length {} exceeds log data length {}",
            opaque_content_len,
            log.data.data.len() - 64
        )));
    }

    let opaque_data = &log.data.data[64..64 + opaque_content_len as usize];
    let source = UserDepositSource::new(block_hash, index as u64);

    let mut deposit_tx = TxDeposit {
        from,
        is_system_transaction: false,
        source_hash: source.source_hash(),
        ..Default::default()
    };
    unmarshal_deposit_version0(&mut deposit_tx, to, opaque_data)?;

    // Re-encode the deposit transaction as an EIP-2718 envelope.
    let mut buffer = Vec::with_capacity(deposit_tx.length() + 1);
    buffer.push(OpTxType::Deposit as u8);
    deposit_tx.encode(&mut buffer);
    Ok(RawTransaction::from(buffer))
}

/// Unmarshals a deposit transaction from the tightly packed opaque data:
/// `uint256 mint ++ uint256 value ++ uint64 gasLimit ++ uint8 isCreation ++ bytes data`.
fn unmarshal_deposit_version0(
    tx: &mut TxDeposit,
    to: Address,
    data: &[u8],
) -> Result<(), PipelineEncodingError> {
    if data.len() < 32 + 32 + 8 + 1 {
        return Err(PipelineEncodingError::DepositError(format!(
            "unexpected opaqueData length: {}",
            data.len()
        )));
    }

    let mut offset = 0;

    // uint256 mint; a 0 mint is represented as None to skip minting code.
    let mint = U256::from_be_slice(&data[offset..offset + 32]);
    if mint.is_zero() {
        tx.mint = None;
    } else {
        tx.mint = Some(
            mint.try_into().map_err(|_| {
                PipelineEncodingError::DepositError("mint exceeds u128".to_string())
            })?,
        );
    }
    offset += 32;

    // uint256 value
    tx.value = U256::from_be_slice(&data[offset..offset + 32]);
    offset += 32;

    // uint64 gas
    tx.gas_limit = u64::from_be_bytes(data[offset..offset + 8].try_into().expect("8 byte slice"));
    offset += 8;

    // uint8 isCreation: if the boolean byte is 1, `to` stays unset and the
    // deposit creates a contract.
    if data[offset] == 0 {
        tx.to = TxKind::Call(to);
    } else {
        tx.to = TxKind::Create;
    }
    offset += 1;

    // The remainder of the opaqueData is the transaction data.
    tx.input = data[offset..].to_vec().into();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::DEPOSIT_EVENT_ABI_HASH;
    use alloc::vec;
    use alloy_primitives::{b256, LogData};

    fn deposit_log(mint: U256, value: U256, gas: u64, is_creation: bool, data: &[u8]) -> Log {
        let mut packed = Vec::new();
        packed.extend_from_slice(&mint.to_be_bytes::<32>());
        packed.extend_from_slice(&value.to_be_bytes::<32>());
        packed.extend_from_slice(&gas.to_be_bytes());
        packed.push(is_creation as u8);
        packed.extend_from_slice(data);

        let mut log_data = Vec::new();
        log_data.extend_from_slice(&U256::from(32).to_be_bytes::<32>());
        log_data.extend_from_slice(&U256::from(packed.len()).to_be_bytes::<32>());
        log_data.extend_from_slice(&packed);
        // Pad to a multiple of 32 bytes.
        while log_data.len() % 32 != 0 {
            log_data.push(0);
        }

        Log {
            address: Address::ZERO,
            data: LogData::new_unchecked(
                vec![
                    DEPOSIT_EVENT_ABI_HASH,
                    B256::left_padding_from(&[0xbe, 0xef]),
                    B256::left_padding_from(&[0xca, 0xfe]),
                    B256::ZERO,
                ],
                log_data.into(),
            ),
        }
    }

    #[test]
    fn test_decode_deposit_roundtrip() {
        let block_hash =
            b256!("0101010101010101010101010101010101010101010101010101010101010101");
        let log = deposit_log(U256::from(1), U256::from(4), 21_000, false, &[0xAB, 0xCD]);
        let raw = decode_deposit(block_hash, 0, &log).unwrap();
        assert!(raw.is_deposit());
    }

    #[test]
    fn test_decode_deposit_rejects_bad_version() {
        let block_hash = B256::ZERO;
        let mut log = deposit_log(U256::ZERO, U256::ZERO, 21_000, false, &[]);
        let mut topics = log.data.topics().to_vec();
        topics[3] = B256::left_padding_from(&[0x01]);
        log.data = LogData::new_unchecked(topics, log.data.data.clone());
        assert!(decode_deposit(block_hash, 0, &log).is_err());
    }

    #[test]
    fn test_user_deposit_source_hash_domain() {
        let a = UserDepositSource::new(B256::ZERO, 0).source_hash();
        let b = UserDepositSource::new(B256::ZERO, 1).source_hash();
        assert_ne!(a, b);
    }
}
