//! Span batch error types.

/// An error encountered while encoding or decoding a span batch.
#[derive(derive_more::Display, Debug, Clone, PartialEq, Eq)]
pub enum SpanBatchError {
    /// The span batch is too big.
    #[display("The span batch is too big")]
    TooBigSpanBatchSize,
    /// The bit field is too long.
    #[display("The bit field is too long")]
    BitfieldTooLong,
    /// Empty span batch.
    #[display("Empty span batch")]
    EmptySpanBatch,
    /// Missing L1 origin.
    #[display("Missing L1 origin")]
    MissingL1Origin,
    /// Decoding errors.
    #[display("Span batch decoding error: {_0}")]
    Decoding(SpanDecodingError),
}

impl From<SpanDecodingError> for SpanBatchError {
    fn from(err: SpanDecodingError) -> Self {
        Self::Decoding(err)
    }
}

impl core::error::Error for SpanBatchError {
    fn source(&self) -> Option<&(dyn core::error::Error + 'static)> {
        match self {
            Self::Decoding(err) => Some(err),
            _ => None,
        }
    }
}

/// An error decoding a specific span batch field.
#[derive(derive_more::Display, Debug, Clone, PartialEq, Eq)]
pub enum SpanDecodingError {
    /// Failed to decode relative timestamp.
    #[display("Failed to decode relative timestamp")]
    RelativeTimestamp,
    /// Failed to decode L1 origin number.
    #[display("Failed to decode L1 origin number")]
    L1OriginNumber,
    /// Failed to decode parent check.
    #[display("Failed to decode parent check")]
    ParentCheck,
    /// Failed to decode L1 origin check.
    #[display("Failed to decode L1 origin check")]
    L1OriginCheck,
    /// Failed to decode block count.
    #[display("Failed to decode block count")]
    BlockCount,
    /// Failed to decode block tx counts.
    #[display("Failed to decode block tx counts")]
    BlockTxCounts,
    /// Failed to decode transaction data.
    #[display("Invalid transaction data")]
    InvalidTransactionData,
}

impl core::error::Error for SpanDecodingError {}
