//! This module contains the [SystemConfig] type.

use super::RollupConfig;
use crate::params::{CONFIG_UPDATE_EVENT_VERSION_0, CONFIG_UPDATE_TOPIC};
use alloc::{format, string::String};
use alloy_consensus::Receipt;
use alloy_primitives::{Address, Log, U256};
use alloy_sol_types::{sol, SolType};

/// System configuration values, mutated only by config-update events scanned
/// from L1 receipts during epoch transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct SystemConfig {
    /// The authorized batch submitter address
    pub batcher_address: Address,
    /// The L2 gas limit
    pub gas_limit: u64,
    /// The L1 fee overhead; zeroed out post-Ecotone
    #[cfg_attr(feature = "serde", serde(rename = "overhead"))]
    pub overhead: U256,
    /// The L1 fee scalar; carries the packed fee scalars post-Ecotone
    #[cfg_attr(feature = "serde", serde(rename = "scalar"))]
    pub scalar: U256,
    /// The EIP-1559 base fee change denominator, post-Holocene
    pub eip1559_denominator: u32,
    /// The EIP-1559 elasticity multiplier, post-Holocene
    pub eip1559_elasticity: u32,
}

/// The type of a system config update log event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u64)]
pub enum SystemConfigUpdateType {
    /// Batcher update type
    Batcher = 0,
    /// Gas config update type
    GasConfig = 1,
    /// Gas limit update type
    GasLimit = 2,
    /// Unsafe block signer update type
    UnsafeBlockSigner = 3,
    /// EIP-1559 parameters update type
    Eip1559Params = 4,
}

impl TryFrom<u64> for SystemConfigUpdateType {
    type Error = String;

    fn try_from(value: u64) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Batcher),
            1 => Ok(Self::GasConfig),
            2 => Ok(Self::GasLimit),
            3 => Ok(Self::UnsafeBlockSigner),
            4 => Ok(Self::Eip1559Params),
            _ => Err(format!("invalid system config update type: {value}")),
        }
    }
}

impl SystemConfig {
    /// Filters all L1 receipts for config update events and applies them.
    pub fn update_with_receipts(
        &mut self,
        receipts: &[Receipt],
        rollup_config: &RollupConfig,
        l1_time: u64,
    ) -> Result<(), String> {
        for receipt in receipts {
            if !receipt.status.coerce_status() {
                continue;
            }

            for log in &receipt.logs {
                let topics = log.topics();
                if log.address == rollup_config.l1_system_config_address &&
                    !topics.is_empty() &&
                    topics[0] == CONFIG_UPDATE_TOPIC
                {
                    self.process_config_update_log(log, rollup_config, l1_time)?;
                }
            }
        }
        Ok(())
    }

    /// Checks that an Ecotone-encoded scalar is valid. Post-Ecotone, the
    /// scalar is versioned by its first byte.
    pub fn check_ecotone_scalar(scalar: [u8; 32]) -> Result<(), String> {
        match scalar[0] {
            0 => {
                if scalar[1..28].iter().any(|b| *b != 0) {
                    return Err("invalid version 0 scalar padding".into());
                }
                Ok(())
            }
            1 => {
                if scalar[1..24].iter().any(|b| *b != 0) {
                    return Err("invalid version 1 scalar padding".into());
                }
                Ok(())
            }
            _ => Err(format!("unrecognized scalar version: {}", scalar[0])),
        }
    }

    /// Decodes an EVM log entry emitted by the system config contract and
    /// applies it as a [SystemConfig] change.
    ///
    /// Parse log data for:
    ///
    /// ```text
    /// event ConfigUpdate(
    ///    uint256 indexed version,
    ///    UpdateType indexed updateType,
    ///    bytes data
    /// );
    /// ```
    fn process_config_update_log(
        &mut self,
        log: &Log,
        rollup_config: &RollupConfig,
        l1_time: u64,
    ) -> Result<(), String> {
        if log.topics().len() < 3 {
            return Err("invalid config update log: not enough topics".into());
        }
        if log.topics()[0] != CONFIG_UPDATE_TOPIC {
            return Err("invalid config update log: invalid topic".into());
        }

        let version = log.topics()[1];
        if version != CONFIG_UPDATE_EVENT_VERSION_0 {
            return Err("invalid config update log: unsupported version".into());
        }
        let update_type = u64::from_be_bytes(
            log.topics()[2].as_slice()[24..].try_into().expect("8 byte slice"),
        );
        let log_data = log.data.data.as_ref();

        match update_type.try_into()? {
            SystemConfigUpdateType::Batcher => {
                if log_data.len() != 96 {
                    return Err("invalid config update log: invalid data length".into());
                }

                let pointer = <sol!(uint64)>::abi_decode(&log_data[0..32], true)
                    .map_err(|_| "failed to decode batcher update log")?;
                if pointer != 32 {
                    return Err("invalid config update log: invalid data pointer".into());
                }
                let length = <sol!(uint64)>::abi_decode(&log_data[32..64], true)
                    .map_err(|_| "failed to decode batcher update log")?;
                if length != 32 {
                    return Err("invalid config update log: invalid data length".into());
                }

                let batcher_address = <sol!(address)>::abi_decode(&log_data[64..], true)
                    .map_err(|_| "failed to decode batcher update log")?;
                self.batcher_address = batcher_address;
            }
            SystemConfigUpdateType::GasConfig => {
                if log_data.len() != 128 {
                    return Err("invalid config update log: invalid data length".into());
                }

                let pointer = <sol!(uint64)>::abi_decode(&log_data[0..32], true)
                    .map_err(|_| "invalid config update log: invalid data pointer")?;
                if pointer != 32 {
                    return Err("invalid config update log: invalid data pointer".into());
                }
                let length = <sol!(uint64)>::abi_decode(&log_data[32..64], true)
                    .map_err(|_| "invalid config update log: invalid data length")?;
                if length != 64 {
                    return Err("invalid config update log: invalid data length".into());
                }

                let overhead = <sol!(uint256)>::abi_decode(&log_data[64..96], true)
                    .map_err(|_| "invalid config update log: invalid overhead")?;
                let scalar = <sol!(uint256)>::abi_decode(&log_data[96..], true)
                    .map_err(|_| "invalid config update log: invalid scalar")?;

                if rollup_config.is_ecotone_active(l1_time) {
                    if Self::check_ecotone_scalar(scalar.to_be_bytes()).is_err() {
                        // Ignore invalid scalars, retain the old system-config scalar.
                        return Ok(());
                    }

                    // Retain the scalar data in encoded form. The overhead is
                    // unused after Ecotone and zeroed out.
                    self.scalar = scalar;
                    self.overhead = U256::ZERO;
                } else {
                    self.scalar = scalar;
                    self.overhead = overhead;
                }
            }
            SystemConfigUpdateType::GasLimit => {
                if log_data.len() != 96 {
                    return Err("invalid config update log: invalid data length".into());
                }

                let pointer = <sol!(uint64)>::abi_decode(&log_data[0..32], true)
                    .map_err(|_| "invalid config update log: invalid data pointer")?;
                if pointer != 32 {
                    return Err("invalid config update log: invalid data pointer".into());
                }
                let length = <sol!(uint64)>::abi_decode(&log_data[32..64], true)
                    .map_err(|_| "invalid config update log: invalid data length")?;
                if length != 32 {
                    return Err("invalid config update log: invalid data length".into());
                }

                let gas_limit = <sol!(uint256)>::abi_decode(&log_data[64..], true)
                    .map_err(|_| "invalid config update log: invalid gas limit")?;
                self.gas_limit = gas_limit.saturating_to::<u64>();
            }
            SystemConfigUpdateType::UnsafeBlockSigner => {
                // Ignored in derivation.
            }
            SystemConfigUpdateType::Eip1559Params => {
                if log_data.len() != 96 {
                    return Err("invalid config update log: invalid data length".into());
                }

                let pointer = <sol!(uint64)>::abi_decode(&log_data[0..32], true)
                    .map_err(|_| "invalid config update log: invalid data pointer")?;
                if pointer != 32 {
                    return Err("invalid config update log: invalid data pointer".into());
                }
                let length = <sol!(uint64)>::abi_decode(&log_data[32..64], true)
                    .map_err(|_| "invalid config update log: invalid data length")?;
                if length != 32 {
                    return Err("invalid config update log: invalid data length".into());
                }

                // The parameters are packed into the last 8 bytes of the word:
                // a u32 denominator followed by a u32 elasticity.
                let word = &log_data[64..96];
                self.eip1559_denominator =
                    u32::from_be_bytes(word[24..28].try_into().expect("4 byte slice"));
                self.eip1559_elasticity =
                    u32::from_be_bytes(word[28..32].try_into().expect("4 byte slice"));
            }
        }

        Ok(())
    }

    /// Returns the packed EIP-1559 parameter bytes for payload attributes:
    /// `version(0) ++ denominator(u32) ++ elasticity(u32)`.
    pub fn eip_1559_params(&self) -> [u8; 8] {
        let mut params = [0u8; 8];
        params[..4].copy_from_slice(&self.eip1559_denominator.to_be_bytes());
        params[4..].copy_from_slice(&self.eip1559_elasticity.to_be_bytes());
        params
    }
}
