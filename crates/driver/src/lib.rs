#![doc = include_str!("../README.md")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]

mod events;
pub use events::{DriverEvent, EventPriority};

mod queue;
pub use queue::EventQueue;

mod backoff;
pub use backoff::StepBackoff;

mod shutdown;
pub use shutdown::ShutdownToken;

mod errors;
pub use errors::DriverError;

mod core;
pub use core::{Driver, DriverChannels};
