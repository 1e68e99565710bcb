//! Contains the [RawTransaction] type.

use alloc::vec::Vec;
use alloy_primitives::Bytes;
use alloy_rlp::{Decodable, Encodable};
use op_alloy_consensus::OpTxType;

/// An opaque, EIP-2718 encoded transaction envelope.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RawTransaction(pub Bytes);

impl RawTransaction {
    /// Returns if the transaction is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns if the transaction is a deposit.
    pub fn is_deposit(&self) -> bool {
        !self.0.is_empty() && self.0[0] == OpTxType::Deposit as u8
    }
}

impl Encodable for RawTransaction {
    fn encode(&self, out: &mut dyn alloy_rlp::BufMut) {
        self.0.encode(out)
    }
}

impl Decodable for RawTransaction {
    /// Decodes RLP encoded bytes into [RawTransaction] bytes.
    fn decode(buf: &mut &[u8]) -> alloy_rlp::Result<Self> {
        let tx_bytes = Bytes::decode(buf)?;
        Ok(Self(tx_bytes))
    }
}

impl From<Vec<u8>> for RawTransaction {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes.into())
    }
}

impl From<Bytes> for RawTransaction {
    fn from(bytes: Bytes) -> Self {
        Self(bytes)
    }
}

impl AsRef<[u8]> for RawTransaction {
    fn as_ref(&self) -> &[u8] {
        self.0.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;

    #[test]
    fn test_raw_transaction_rlp_roundtrip() {
        let tx = RawTransaction(Bytes::from(vec![0x02, 0xAA, 0xBB]));
        let mut buf = Vec::new();
        tx.encode(&mut buf);
        let decoded = RawTransaction::decode(&mut buf.as_slice()).unwrap();
        assert_eq!(decoded, tx);
    }

    #[test]
    fn test_deposit_detection() {
        assert!(RawTransaction(Bytes::from(vec![0x7E, 0x01])).is_deposit());
        assert!(!RawTransaction(Bytes::from(vec![0x02, 0x01])).is_deposit());
        assert!(!RawTransaction(Bytes::default()).is_deposit());
    }
}
