//! Keeps Falcon BMS's RTTClient.INI in step with a host's viewports.
//!
//! [`RttSynchronizer`] is the host-facing entry point. It regenerates the
//! configuration whenever viewports change, writes it at profile start only
//! when the file on disk is ours to overwrite, and starts and stops the RTT
//! client with the profile when allowed to.

#![forbid(unsafe_code)]

pub mod config;
pub mod consent;
pub mod constants;
pub mod display;
pub mod events;
pub mod file_sync;
pub mod ownership;
pub mod paths;
pub mod process;
pub mod serializer;
pub mod status;
pub mod synchronizer;
pub mod types;

pub use consent::{ConsentAnswer, ConsentPrompter, ConsentRequest};
pub use ownership::OwnershipState;
pub use status::{Severity, StatusReportItem};
pub use synchronizer::{ProfileStart, RttSynchronizer};
pub use types::{Rect, ViewportRegion};
