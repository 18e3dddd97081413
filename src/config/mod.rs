//! Configuration for rtt-sync
//!
//! - **settings**: RTT option groups and enable flags persisted with a profile
//! - **profile**: the JSON host profile the binary loads and saves

pub mod profile;
pub mod settings;

// Re-export commonly used types
pub use profile::HostConfig;
pub use settings::{LocalOptions, NetworkOptions, ProcessControlOptions, RttSettings};
