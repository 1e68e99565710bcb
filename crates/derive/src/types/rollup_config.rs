//! This module contains the [RollupConfig] type.

use super::{BlockID, SystemConfig};
use alloy_primitives::Address;

/// The genesis anchor of the rollup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ChainGenesis {
    /// The L1 block the rollup starts after
    pub l1: BlockID,
    /// The L2 genesis block
    pub l2: BlockID,
    /// The L2 genesis timestamp
    pub l2_time: u64,
    /// The initial system config, active at genesis
    pub system_config: Option<SystemConfig>,
}

/// The rollup configuration: an immutable table of chain parameters and
/// fork-activation timestamps consulted by every stage. Constructed once and
/// shared by reference; never mutated at runtime.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RollupConfig {
    /// The genesis anchor of the rollup
    pub genesis: ChainGenesis,
    /// The block time of the L2, in seconds
    pub block_time: u64,
    /// Sequencer batches may not be more than `max_sequencer_drift` seconds
    /// after the L1 timestamp of their L1 origin.
    ///
    /// Note: when L1 has many 1 second consecutive blocks, and L2 grows at
    /// fixed 2 seconds, the L2 time may still grow beyond this difference.
    pub max_sequencer_drift: u64,
    /// Number of L1 blocks between when a batch's epoch starts and when the
    /// batch must have been included, before empty batches are forced.
    pub seq_window_size: u64,
    /// Number of L1 blocks between when a channel can be opened and when it
    /// must be closed by.
    pub channel_timeout: u64,
    /// The channel timeout applied once Granite activates.
    pub granite_channel_timeout: u64,
    /// The L1 chain ID
    pub l1_chain_id: u64,
    /// The L2 chain ID
    pub l2_chain_id: u64,
    /// `regolith_time` sets the activation time of the Regolith upgrade.
    /// Active if `regolith_time` != None && L2 block timestamp >= activation
    /// time, inactive otherwise.
    pub regolith_time: Option<u64>,
    /// `canyon_time` sets the activation time of the Canyon upgrade.
    pub canyon_time: Option<u64>,
    /// `delta_time` sets the activation time of the Delta upgrade.
    pub delta_time: Option<u64>,
    /// `ecotone_time` sets the activation time of the Ecotone upgrade.
    pub ecotone_time: Option<u64>,
    /// `fjord_time` sets the activation time of the Fjord upgrade.
    pub fjord_time: Option<u64>,
    /// `granite_time` sets the activation time of the Granite upgrade.
    pub granite_time: Option<u64>,
    /// `holocene_time` sets the activation time of the Holocene upgrade.
    pub holocene_time: Option<u64>,
    /// The L1 address that batches are sent to
    pub batch_inbox_address: Address,
    /// The L1 address that deposits are sent to
    pub deposit_contract_address: Address,
    /// The L1 address that the system config is stored at
    pub l1_system_config_address: Address,
}

impl RollupConfig {
    /// Returns true if Regolith is active at the given timestamp.
    pub fn is_regolith_active(&self, timestamp: u64) -> bool {
        self.regolith_time.map_or(false, |t| timestamp >= t)
    }

    /// Returns true if Canyon is active at the given timestamp.
    pub fn is_canyon_active(&self, timestamp: u64) -> bool {
        self.canyon_time.map_or(false, |t| timestamp >= t)
    }

    /// Returns true if Delta is active at the given timestamp.
    pub fn is_delta_active(&self, timestamp: u64) -> bool {
        self.delta_time.map_or(false, |t| timestamp >= t)
    }

    /// Returns true if Ecotone is active at the given timestamp.
    pub fn is_ecotone_active(&self, timestamp: u64) -> bool {
        self.ecotone_time.map_or(false, |t| timestamp >= t)
    }

    /// Returns true if Fjord is active at the given timestamp.
    pub fn is_fjord_active(&self, timestamp: u64) -> bool {
        self.fjord_time.map_or(false, |t| timestamp >= t)
    }

    /// Returns true if Granite is active at the given timestamp.
    pub fn is_granite_active(&self, timestamp: u64) -> bool {
        self.granite_time.map_or(false, |t| timestamp >= t)
    }

    /// Returns true if Holocene is active at the given timestamp.
    pub fn is_holocene_active(&self, timestamp: u64) -> bool {
        self.holocene_time.map_or(false, |t| timestamp >= t)
    }

    /// Returns true if the given timestamp is the first L2 block of the
    /// Ecotone upgrade.
    pub fn is_ecotone_activation_block(&self, timestamp: u64) -> bool {
        self.is_ecotone_active(timestamp) &&
            timestamp >= self.block_time &&
            !self.is_ecotone_active(timestamp - self.block_time)
    }

    /// Returns true if the given timestamp is the first L2 block of the
    /// Canyon upgrade.
    pub fn is_canyon_activation_block(&self, timestamp: u64) -> bool {
        self.is_canyon_active(timestamp) &&
            timestamp >= self.block_time &&
            !self.is_canyon_active(timestamp - self.block_time)
    }

    /// Returns the channel timeout, in L1 blocks, at the given timestamp.
    /// Granite shortened the channel timeout.
    pub fn channel_timeout(&self, timestamp: u64) -> u64 {
        if self.is_granite_active(timestamp) {
            self.granite_channel_timeout
        } else {
            self.channel_timeout
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_fork_activation_gating() {
        let cfg = RollupConfig { holocene_time: Some(10), ..Default::default() };
        assert!(!cfg.is_holocene_active(9));
        assert!(cfg.is_holocene_active(10));
        assert!(cfg.is_holocene_active(11));

        let cfg = RollupConfig::default();
        assert!(!cfg.is_holocene_active(u64::MAX));
    }

    #[test]
    fn test_activation_block_detection() {
        let cfg =
            RollupConfig { block_time: 2, ecotone_time: Some(10), ..Default::default() };
        assert!(!cfg.is_ecotone_activation_block(8));
        assert!(cfg.is_ecotone_activation_block(10));
        assert!(cfg.is_ecotone_activation_block(11));
        assert!(!cfg.is_ecotone_activation_block(12));
    }

    #[test]
    fn test_channel_timeout_granite() {
        let cfg = RollupConfig {
            channel_timeout: 300,
            granite_channel_timeout: 50,
            granite_time: Some(100),
            ..Default::default()
        };
        assert_eq!(cfg.channel_timeout(99), 300);
        assert_eq!(cfg.channel_timeout(100), 50);
    }
}
