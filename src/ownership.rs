//! Ownership of RTTClient.INI and the enable/consent state machine
//!
//! A file is ours if it contains the marker anywhere. This is a substring test,
//! not a parse: a foreign file that happens to contain the marker text is
//! treated as owned.

use std::fmt;
use std::fs;
use std::io;
use std::path::Path;

use crate::consent::ConsentAnswer;
use crate::constants::rtt;

/// Whether the synchronizer governs the target file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OwnershipState {
    /// Feature turned off
    Disabled,
    /// Enabled; the synchronizer owns the file
    Active,
    /// Enabled by request but suspended until the user approves a takeover
    AwaitingConsent,
}

impl OwnershipState {
    /// Rebuild from the persisted flags; the consent flag wins if both are set
    pub fn from_flags(enabled: bool, awaiting_consent: bool) -> Self {
        match (enabled, awaiting_consent) {
            (_, true) => OwnershipState::AwaitingConsent,
            (true, false) => OwnershipState::Active,
            (false, false) => OwnershipState::Disabled,
        }
    }

    /// Persisted `(enabled, awaiting_consent)` flags
    pub fn flags(self) -> (bool, bool) {
        match self {
            OwnershipState::Disabled => (false, false),
            OwnershipState::Active => (true, false),
            OwnershipState::AwaitingConsent => (false, true),
        }
    }

    pub fn is_active(self) -> bool {
        self == OwnershipState::Active
    }

    /// Non-interactive enable; a pending consent is only resolved by [`Self::consent`]
    pub fn enable(self) -> Self {
        match self {
            OwnershipState::Disabled => OwnershipState::Active,
            other => other,
        }
    }

    pub fn disable(self) -> Self {
        OwnershipState::Disabled
    }

    /// Suspend an active synchronizer that found a foreign file in its place
    pub fn after_inspection(self, ownership: FileOwnership) -> Self {
        match (self, ownership) {
            (OwnershipState::Active, FileOwnership::Foreign) => OwnershipState::AwaitingConsent,
            (state, _) => state,
        }
    }

    /// Declining is a one-way downgrade to Disabled, never back to AwaitingConsent
    pub fn consent(self, answer: ConsentAnswer) -> Self {
        match answer {
            ConsentAnswer::Yes => OwnershipState::Active,
            ConsentAnswer::No | ConsentAnswer::Cancel => OwnershipState::Disabled,
        }
    }
}

impl fmt::Display for OwnershipState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OwnershipState::Disabled => "disabled",
            OwnershipState::Active => "active",
            OwnershipState::AwaitingConsent => "awaiting consent",
        };
        f.write_str(name)
    }
}

/// Result of inspecting the target file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileOwnership {
    Missing,
    /// Present but zero-length; safe to claim
    Empty,
    Owned,
    Foreign,
}

pub fn is_owned(contents: &str) -> bool {
    contents.contains(rtt::MARKER)
}

/// Classify already-read file contents
pub fn classify(contents: &[u8]) -> FileOwnership {
    if contents.is_empty() {
        FileOwnership::Empty
    } else if is_owned(&String::from_utf8_lossy(contents)) {
        FileOwnership::Owned
    } else {
        FileOwnership::Foreign
    }
}

/// Read and classify the file at `path` without modifying anything
pub fn inspect(path: &Path) -> io::Result<FileOwnership> {
    match fs::read(path) {
        Ok(contents) => Ok(classify(&contents)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(FileOwnership::Missing),
        Err(e) => Err(e),
    }
}
