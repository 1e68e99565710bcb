//! Protocol parameters and identifying constants for the derivation pipeline.

use alloy_primitives::{address, b256, Address, B256};

/// Count the frame tagging info as 200 bytes when estimating buffer sizes.
pub const FRAME_OVERHEAD: usize = 200;

/// The supported version byte of batcher transaction data.
pub const DERIVATION_VERSION_0: u8 = 0;

/// The maximum length of a single frame's data.
pub const MAX_FRAME_LEN: usize = 1_000_000;

/// The maximum amount of bytes that will be read out of a single channel.
/// This limit is enforced while decompressing.
pub const MAX_RLP_BYTES_PER_CHANNEL: u64 = 10_000_000;

/// The post-Fjord maximum amount of bytes read out of a single channel.
pub const MAX_RLP_BYTES_PER_CHANNEL_FJORD: u64 = 100_000_000;

/// The maximum size of the channel bank before pruning, in bytes.
pub const MAX_CHANNEL_BANK_SIZE: usize = 100_000_000;

/// The length of a [ChannelID].
pub const CHANNEL_ID_LENGTH: usize = 16;

/// An opaque identifier for a channel, carried by every frame.
pub type ChannelID = [u8; CHANNEL_ID_LENGTH];

/// The maximum number of blocks a span batch may contain.
pub const MAX_SPAN_BATCH_ELEMENTS: u64 = 10_000_000;

/// `keccak256("ConfigUpdate(uint256,uint8,bytes)")` - the topic of system
/// config update events emitted by the L1 system config contract.
pub const CONFIG_UPDATE_TOPIC: B256 =
    b256!("1d2b0bda21d56b8bd12d4f94ebacffdfb35f5e226f84b461103bb8beab6353be");

/// The only supported version of config update events.
pub const CONFIG_UPDATE_EVENT_VERSION_0: B256 = B256::ZERO;

/// `keccak256("TransactionDeposited(address,address,uint256,bytes)")` - the
/// topic of deposit events emitted by the L1 deposit contract.
pub const DEPOSIT_EVENT_ABI_HASH: B256 =
    b256!("b3813568d9991fc951961fcb4c784893574240a28925604d09fc577c55bb7c32");

/// The address of the L1 info depositor account.
pub const L1_INFO_DEPOSITOR_ADDRESS: Address =
    address!("deaddeaddeaddeaddeaddeaddeaddeaddead0001");

/// The address of the L1 block info predeploy on L2.
pub const L1_BLOCK_ADDRESS: Address = address!("4200000000000000000000000000000000000015");

/// The address of the sequencer fee vault predeploy on L2.
pub const SEQUENCER_FEE_VAULT_ADDRESS: Address =
    address!("4200000000000000000000000000000000000011");

/// The gas limit of the L1 info deposit transaction, pre-Regolith.
pub const L1_INFO_TX_GAS: u64 = 150_000_000;

/// The gas limit of the L1 info deposit transaction, post-Regolith.
pub const REGOLITH_L1_INFO_TX_GAS: u64 = 1_000_000;
