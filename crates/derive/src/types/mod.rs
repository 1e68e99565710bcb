//! Value types used throughout the derivation pipeline.

mod block;
pub use block::{BlockID, BlockInfo, L2BlockInfo};

mod transactions;
pub use transactions::RawTransaction;

mod frame;
pub use frame::Frame;

mod channel;
pub use channel::Channel;

mod batch;
pub use batch::{
    Batch, BatchType, BatchValidity, BatchWithInclusionBlock, RawSpanBatch, SingleBatch,
    SpanBatch, SpanBatchBits, SpanBatchElement, SpanBatchPayload, SpanBatchPrefix,
};

mod blob;
pub use blob::{BlobData, IndexedBlobHash};

mod deposits;
pub use deposits::{decode_deposit, DepositSourceDomain, UserDepositSource};
pub(crate) use deposits::{L1InfoDepositSource, UpgradeDepositSource};

mod l1_block_info;
pub use l1_block_info::L1BlockInfoTx;

mod system_config;
pub use system_config::{SystemConfig, SystemConfigUpdateType};

mod rollup_config;
pub use rollup_config::{ChainGenesis, RollupConfig};

mod attributes;
pub use attributes::{AttributesWithParent, PayloadAttributes};

mod signals;
pub use signals::{ActivationSignal, ResetSignal, Signal};

mod results;
pub use results::{PipelineResult, StepResult};
