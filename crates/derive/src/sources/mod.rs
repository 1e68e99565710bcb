//! Data availability sources: per L1 block, the raw batcher payloads posted
//! as calldata or blobs.

use alloy_consensus::TxEnvelope;
use alloy_primitives::Address;

/// Recovers the signer of a transaction envelope, if its signature is valid.
pub(crate) fn recover_tx_signer(tx: &TxEnvelope) -> Option<Address> {
    match tx {
        TxEnvelope::Legacy(signed) => signed.recover_signer().ok(),
        TxEnvelope::Eip2930(signed) => signed.recover_signer().ok(),
        TxEnvelope::Eip1559(signed) => signed.recover_signer().ok(),
        TxEnvelope::Eip4844(signed) => signed.recover_signer().ok(),
        _ => None,
    }
}

mod ethereum;
pub use ethereum::EthereumDataSource;

mod calldata;
pub use calldata::CalldataSource;

mod blobs;
pub use blobs::BlobSource;

mod variant;
pub use variant::EthereumDataSourceVariant;
