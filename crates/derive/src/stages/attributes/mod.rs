//! Payload attribute construction: deposits, fork-upgrade transactions, and
//! the stateful builder that assembles them.

mod deposits;
pub(crate) use deposits::derive_deposits;

mod ecotone;
pub use ecotone::EcotoneTransactionBuilder;

mod builder;
pub use builder::StatefulAttributesBuilder;
