//! RTT settings persisted as part of the host profile
//!
//! Option groups are read by the serializer and the process controller but are
//! otherwise not validated; out-of-range values are written through as-is.

use serde::{Deserialize, Serialize};

use crate::constants::{defaults, rtt};

/// Everything the synchronizer persists with the profile
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RttSettings {
    /// True while the synchronizer governs RTTClient.INI
    #[serde(default)]
    pub enabled: bool,
    /// Suspended because a foreign file occupies the target path
    #[serde(default)]
    pub awaiting_consent: bool,
    /// RTT renderer index (0-6)
    #[serde(default)]
    pub renderer: i32,
    #[serde(default)]
    pub networked: bool,
    #[serde(default)]
    pub local: LocalOptions,
    #[serde(default)]
    pub network: NetworkOptions,
    #[serde(default)]
    pub process_control: ProcessControlOptions,
}

/// Options for the local renderer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocalOptions {
    #[serde(default = "default_fps")]
    pub fps: u32,
    /// Draw the alignment grid over local displays
    #[serde(default)]
    pub local_grid: bool,
}

/// Options for networked mode and the exported data streams
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkOptions {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_true")]
    pub data_f4: bool,
    #[serde(default = "default_true")]
    pub data_bms: bool,
    #[serde(default = "default_true")]
    pub data_osb: bool,
    #[serde(default = "default_true")]
    pub data_ivibe: bool,
    #[serde(default)]
    pub data_strings: bool,
    #[serde(default)]
    pub data_drawing: bool,
}

/// Whether a running profile may start and stop the RTT client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessControlOptions {
    #[serde(default)]
    pub run_with_profile: bool,
    /// Client executable, relative to the RTT tool directory
    #[serde(default = "default_executable")]
    pub executable: String,
}

fn default_fps() -> u32 {
    defaults::FPS
}

fn default_host() -> String {
    defaults::HOST.to_string()
}

fn default_port() -> u16 {
    defaults::PORT
}

fn default_true() -> bool {
    true
}

fn default_executable() -> String {
    rtt::DEFAULT_EXECUTABLE.to_string()
}

impl Default for RttSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            awaiting_consent: false,
            renderer: 0,
            networked: false,
            local: LocalOptions::default(),
            network: NetworkOptions::default(),
            process_control: ProcessControlOptions::default(),
        }
    }
}

impl Default for LocalOptions {
    fn default() -> Self {
        Self {
            fps: default_fps(),
            local_grid: false,
        }
    }
}

impl Default for NetworkOptions {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            data_f4: true,
            data_bms: true,
            data_osb: true,
            data_ivibe: true,
            data_strings: false,
            data_drawing: false,
        }
    }
}

impl Default for ProcessControlOptions {
    fn default() -> Self {
        Self {
            run_with_profile: false,
            executable: default_executable(),
        }
    }
}
