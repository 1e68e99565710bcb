//! A builder for signed test transactions.

use alloc::vec::Vec;
use alloy_consensus::{SignableTransaction, TxEip1559, TxEip4844, TxEip4844Variant, TxEnvelope};
use alloy_consensus::Signed;
use alloy_primitives::{Address, Bytes, Signature, TxKind, B256, U256};
use k256::ecdsa::SigningKey;

/// Builds test transactions signed with a fixed or caller-provided key.
#[derive(Debug, Clone)]
pub struct TestTxBuilder {
    key: SigningKey,
}

impl Default for TestTxBuilder {
    fn default() -> Self {
        Self::from_key_bytes([0x01; 32]).expect("valid default key")
    }
}

impl TestTxBuilder {
    /// Creates a builder from the given secret key bytes, if they form a
    /// valid key.
    pub fn from_key_bytes(bytes: [u8; 32]) -> Option<Self> {
        SigningKey::from_bytes(&bytes.into()).ok().map(|key| Self { key })
    }

    /// Creates a builder with a key unrelated to the default one.
    pub fn random_key() -> Self {
        Self::from_key_bytes([0x02; 32]).expect("valid key")
    }

    /// The address transactions built by this builder are signed with.
    pub fn batcher_address(&self) -> Address {
        Address::from_private_key(&self.key)
    }

    fn sign(&self, sig_hash: B256) -> Signature {
        let (sig, recid) =
            self.key.sign_prehash_recoverable(sig_hash.as_slice()).expect("signing cannot fail");
        Signature::from_signature_and_parity(sig, recid.is_y_odd()).expect("valid signature")
    }

    /// Builds a signed EIP-1559 transaction carrying the given calldata.
    pub fn signed_calldata_tx(&self, to: Address, calldata: &[u8]) -> TxEnvelope {
        let tx = TxEip1559 {
            chain_id: 1,
            nonce: 0,
            gas_limit: 21_000,
            max_fee_per_gas: 1,
            max_priority_fee_per_gas: 1,
            to: TxKind::Call(to),
            value: U256::ZERO,
            input: Bytes::copy_from_slice(calldata),
            ..Default::default()
        };
        let signature = self.sign(tx.signature_hash());
        TxEnvelope::Eip1559(tx.into_signed(signature))
    }

    /// Builds a signed EIP-4844 transaction referencing the given blob
    /// hashes.
    pub fn signed_blob_tx(&self, to: Address, blob_hashes: Vec<B256>) -> TxEnvelope {
        let tx = TxEip4844 {
            chain_id: 1,
            nonce: 0,
            gas_limit: 21_000,
            max_fee_per_gas: 1,
            max_priority_fee_per_gas: 1,
            max_fee_per_blob_gas: 1,
            to,
            value: U256::ZERO,
            blob_versioned_hashes: blob_hashes,
            ..Default::default()
        };
        let signature = self.sign(tx.signature_hash());
        let hash = *tx.clone().into_signed(signature).hash();
        TxEnvelope::Eip4844(Signed::new_unchecked(
            TxEip4844Variant::TxEip4844(tx),
            signature,
            hash,
        ))
    }
}
