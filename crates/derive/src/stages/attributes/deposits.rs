//! Contains a helper method to derive deposit transactions from L1 receipts.

use crate::{
    errors::PipelineEncodingError,
    params::DEPOSIT_EVENT_ABI_HASH,
    types::{decode_deposit, RawTransaction},
};
use alloc::vec::Vec;
use alloy_consensus::Receipt;
use alloy_primitives::{Address, B256};

/// Derive deposit transactions from the receipts of an epoch's L1 block.
///
/// Successful deposits must be emitted by the deposit contract and have the
/// correct event signature, so the log address must equal the specified
/// deposit contract and the first topic must be the
/// [DEPOSIT_EVENT_ABI_HASH]. The log's position among all logs of the block
/// seeds the deposit's source hash.
pub(crate) fn derive_deposits(
    block_hash: B256,
    receipts: &[Receipt],
    deposit_contract: Address,
) -> Result<Vec<RawTransaction>, PipelineEncodingError> {
    let mut deposits = Vec::new();
    let mut log_index = 0u64;
    for receipt in receipts {
        if !receipt.status.coerce_status() {
            // Logs of reverted transactions still occupy log indices.
            log_index += receipt.logs.len() as u64;
            continue;
        }
        for log in &receipt.logs {
            if log.address == deposit_contract &&
                log.topics().first().map_or(false, |t| *t == DEPOSIT_EVENT_ABI_HASH)
            {
                deposits.push(decode_deposit(block_hash, log_index as usize, log)?);
            }
            log_index += 1;
        }
    }
    Ok(deposits)
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;
    use alloy_primitives::{Log, LogData, U256};

    fn deposit_log(address: Address) -> Log {
        let mut packed = Vec::new();
        packed.extend_from_slice(&U256::ZERO.to_be_bytes::<32>());
        packed.extend_from_slice(&U256::ZERO.to_be_bytes::<32>());
        packed.extend_from_slice(&21_000u64.to_be_bytes());
        packed.push(0);

        let mut data = Vec::new();
        data.extend_from_slice(&U256::from(32).to_be_bytes::<32>());
        data.extend_from_slice(&U256::from(packed.len()).to_be_bytes::<32>());
        data.extend_from_slice(&packed);
        while data.len() % 32 != 0 {
            data.push(0);
        }

        Log {
            address,
            data: LogData::new_unchecked(
                vec![
                    DEPOSIT_EVENT_ABI_HASH,
                    B256::left_padding_from(&[0xbe]),
                    B256::left_padding_from(&[0xef]),
                    B256::ZERO,
                ],
                data.into(),
            ),
        }
    }

    #[test]
    fn test_derive_deposits_filters_address() {
        let deposit_contract = Address::left_padding_from(&[0x42]);
        let receipts = vec![Receipt {
            status: true.into(),
            cumulative_gas_used: 0,
            logs: vec![deposit_log(deposit_contract), deposit_log(Address::ZERO)],
        }];
        let deposits = derive_deposits(B256::ZERO, &receipts, deposit_contract).unwrap();
        assert_eq!(deposits.len(), 1);
    }

    #[test]
    fn test_derive_deposits_skips_failed_receipts() {
        let deposit_contract = Address::left_padding_from(&[0x42]);
        let receipts = vec![
            Receipt {
                status: false.into(),
                cumulative_gas_used: 0,
                logs: vec![deposit_log(deposit_contract)],
            },
            Receipt {
                status: true.into(),
                cumulative_gas_used: 0,
                logs: vec![deposit_log(deposit_contract)],
            },
        ];
        let deposits = derive_deposits(B256::ZERO, &receipts, deposit_contract).unwrap();
        assert_eq!(deposits.len(), 1);
    }
}
