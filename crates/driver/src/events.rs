//! The tagged events flowing through the driver's queue.

use rift_derive::{
    errors::PipelineErrorKind,
    types::{AttributesWithParent, BlockInfo, L2BlockInfo},
};

/// The priority class of a [DriverEvent]. Events are processed strictly in
/// priority order, FIFO within a class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(usize)]
pub enum EventPriority {
    /// Unrecoverable failures: processed before anything else so the driver
    /// halts promptly.
    Critical = 0,
    /// Reset requests: clear all buffered stage state before stepping
    /// resumes.
    Reset = 1,
    /// Control flow: attribute acknowledgements and replay requests.
    Control = 2,
    /// External data signals: new L1 head, forkchoice and finality updates.
    Data = 3,
    /// Internal stepping and idle notifications.
    Idle = 4,
}

/// The number of priority classes.
pub(crate) const NUM_PRIORITIES: usize = 5;

/// An event processed (or emitted) by the driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DriverEvent {
    /// A new L1 head was observed. Re-arms stepping after exhaustion.
    NewL1Head(BlockInfo),
    /// An L1 block was finalized.
    FinalizedL1(BlockInfo),
    /// The consumer moved the L2 safe head.
    ForkchoiceUpdated(L2BlockInfo),
    /// Request one unit of derivation work.
    Step,
    /// The pipeline is idle at the given origin.
    DeriverIdle {
        /// The pipeline's current L1 origin.
        origin: Option<BlockInfo>,
    },
    /// The pipeline has consumed all available L1 data.
    ExhaustedL1 {
        /// The L1 origin derivation stopped at.
        l1_ref: Option<BlockInfo>,
        /// The last L2 safe head derivation reached.
        last_l2: L2BlockInfo,
    },
    /// New payload attributes were derived.
    DerivedAttributes(Box<AttributesWithParent>),
    /// The consumer acknowledges receipt of the last derived attributes.
    ConfirmReceivedAttributes,
    /// The consumer requests a deposits-only replay of previously published
    /// attributes.
    DepositsOnlyAttributesRequest {
        /// The parent of the attributes to replay.
        parent: L2BlockInfo,
        /// The L1 block the attributes were derived from.
        derived_from: BlockInfo,
    },
    /// The pipeline requested a reset.
    Reset(PipelineErrorKind),
    /// A step failed with a temporary error and will be retried.
    TemporaryError(PipelineErrorKind),
    /// A step failed with a critical error; derivation cannot continue.
    CriticalError(PipelineErrorKind),
}

impl DriverEvent {
    /// Returns the priority class of the event.
    pub const fn priority(&self) -> EventPriority {
        match self {
            Self::CriticalError(_) => EventPriority::Critical,
            Self::Reset(_) => EventPriority::Reset,
            Self::ConfirmReceivedAttributes | Self::DepositsOnlyAttributesRequest { .. } => {
                EventPriority::Control
            }
            Self::NewL1Head(_) | Self::FinalizedL1(_) | Self::ForkchoiceUpdated(_) => {
                EventPriority::Data
            }
            Self::Step |
            Self::DeriverIdle { .. } |
            Self::ExhaustedL1 { .. } |
            Self::DerivedAttributes(_) |
            Self::TemporaryError(_) => EventPriority::Idle,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rift_derive::errors::PipelineError;

    #[test]
    fn test_event_priorities_ordered() {
        assert!(EventPriority::Critical < EventPriority::Reset);
        assert!(EventPriority::Reset < EventPriority::Control);
        assert!(EventPriority::Control < EventPriority::Data);
        assert!(EventPriority::Data < EventPriority::Idle);
    }

    #[test]
    fn test_event_classification() {
        assert_eq!(
            DriverEvent::CriticalError(PipelineError::Eof.crit()).priority(),
            EventPriority::Critical
        );
        assert_eq!(
            DriverEvent::Reset(PipelineError::Eof.temp()).priority(),
            EventPriority::Reset
        );
        assert_eq!(
            DriverEvent::ConfirmReceivedAttributes.priority(),
            EventPriority::Control
        );
        assert_eq!(
            DriverEvent::NewL1Head(Default::default()).priority(),
            EventPriority::Data
        );
        assert_eq!(DriverEvent::Step.priority(), EventPriority::Idle);
    }
}
