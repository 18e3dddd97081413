//! Application-wide constants
//!
//! This module contains all magic numbers and string literals used throughout
//! the application, providing a single source of truth for constant values.

/// RTT client file layout and ownership marker
pub mod rtt {
    /// Version-independent ownership marker; every file we write starts with it
    pub const MARKER: &str = "### RTT Client Config, generated by rtt-sync";

    /// Version tag appended to the marker in the header line
    pub const GENERATOR_VERSION: &str = env!("CARGO_PKG_VERSION");

    /// RTT client directory, relative to the Falcon installation directory
    pub const TOOL_DIR: [&str; 2] = ["Tools", "RTTRemote"];

    /// RTT client configuration file name
    pub const CONFIG_FILENAME: &str = "RTTClient.INI";

    /// Extension given to the backup of a foreign configuration file
    pub const BACKUP_EXTENSION: &str = "original";

    /// Default RTT client executable name
    pub const DEFAULT_EXECUTABLE: &str = "RTTClient64.exe";
}

/// Defaults for the RTT option groups
pub mod defaults {
    /// Local renderer frame rate
    pub const FPS: u32 = 60;

    /// Network host used when none is configured
    pub const HOST: &str = "127.0.0.1";

    /// RTT server port
    pub const PORT: u16 = 44000;
}

/// Line terminator of the generated file (host platform convention)
pub mod text {
    #[cfg(windows)]
    pub const NEWLINE: &str = "\r\n";

    #[cfg(not(windows))]
    pub const NEWLINE: &str = "\n";
}

/// Geometry rounding
pub mod geometry {
    /// Bias added before truncating a coordinate to an integer
    pub const ROUNDING_BIAS: f64 = 0.5;
}

/// Process lifecycle timing
pub mod process {
    /// Grace period between SIGTERM and a hard kill
    pub const TERMINATE_GRACE_MS: u64 = 3000;

    /// Poll interval while waiting for the client to exit
    pub const EXIT_POLL_MS: u64 = 50;
}

/// Host harness configuration
pub mod config {
    /// Directory under the user's config dir
    pub const APP_DIR: &str = "rtt-sync";

    /// Persisted host profile file name
    pub const FILENAME: &str = "config.json";

    /// Environment override for the Falcon installation directory
    pub const INSTALL_DIR_ENV: &str = "RTT_SYNC_INSTALL_DIR";

    /// Profile tick interval of the `run` command
    pub const TICK_INTERVAL_MS: u64 = 500;
}
