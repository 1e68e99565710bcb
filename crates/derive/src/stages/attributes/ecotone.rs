//! Network-upgrade transactions injected at the Ecotone activation block.

use crate::{
    errors::BuilderError,
    types::{RawTransaction, UpgradeDepositSource},
};
use alloc::{string::String, vec, vec::Vec};
use alloy_primitives::{address, hex, Address, TxKind, U256};
use alloy_rlp::Encodable;
use op_alloy_consensus::{OpTxType, TxDeposit};

/// The depositor account of the EIP-4788 beacon block roots contract.
const BEACON_ROOTS_DEPLOYER: Address = address!("0B799C86a49DEeb90402691F1041aa3AF2d3C875");

/// The creation code of the EIP-4788 beacon block roots contract.
const BEACON_ROOTS_CREATION_CODE: [u8; 106] = hex!(
    "60618060095f395ff33373fffffffffffffffffffffffffffffffffffffffe14604d57602036146024575f5ffd5b5f35801560495762001fff810690815414603c575f5ffd5b62001fff01545f5260205ff35b5f5ffd5b62001fff42064281555f359062001fff015500"
);

/// Builds the deposit transactions that perform the Ecotone network upgrade.
#[derive(Debug, Default, Clone, Copy)]
pub struct EcotoneTransactionBuilder;

impl EcotoneTransactionBuilder {
    /// Constructs the Ecotone network upgrade transactions, to be injected at
    /// the top of the activation block after the L1 info transaction.
    pub fn build_txs() -> Result<Vec<RawTransaction>, BuilderError> {
        let source = UpgradeDepositSource {
            intent: String::from("Ecotone: beacon block roots contract deployment"),
        };

        let beacon_roots_deployment = TxDeposit {
            source_hash: source.source_hash(),
            from: BEACON_ROOTS_DEPLOYER,
            to: TxKind::Create,
            mint: None,
            value: U256::ZERO,
            gas_limit: 0x3d090,
            is_system_transaction: false,
            input: BEACON_ROOTS_CREATION_CODE.to_vec().into(),
        };

        let mut buffer = Vec::with_capacity(beacon_roots_deployment.length() + 1);
        buffer.push(OpTxType::Deposit as u8);
        beacon_roots_deployment.encode(&mut buffer);

        Ok(vec![RawTransaction::from(buffer)])
    }
}
