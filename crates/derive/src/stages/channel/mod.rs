//! The channel stage: reassembles ordered frames into complete channels and
//! decodes batches out of them.

mod channel_bank;
pub use channel_bank::ChannelBank;

mod channel_assembler;
pub use channel_assembler::ChannelAssembler;

mod channel_provider;
pub use channel_provider::{ActiveChannelStage, ChannelProvider};

mod channel_reader;
pub use channel_reader::{BatchReader, ChannelReader};
