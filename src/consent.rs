//! Consent prompt used before taking over a foreign RTTClient.INI

use std::fmt;
use std::path::PathBuf;

/// Answer to the takeover question
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsentAnswer {
    Yes,
    No,
    Cancel,
}

impl ConsentAnswer {
    /// Choices in the order they are offered
    pub const ALL: [ConsentAnswer; 3] = [ConsentAnswer::Yes, ConsentAnswer::No, ConsentAnswer::Cancel];
}

impl fmt::Display for ConsentAnswer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ConsentAnswer::Yes => "Yes, take ownership and keep the existing file as a backup",
            ConsentAnswer::No => "No, disable RTT configuration generation",
            ConsentAnswer::Cancel => "Cancel",
        };
        f.write_str(label)
    }
}

/// What the user is asked to approve
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsentRequest {
    pub target: PathBuf,
    pub backup: PathBuf,
}

impl ConsentRequest {
    pub fn message(&self) -> String {
        format!(
            "The RTT configuration file '{}' was not generated by this application.\n\
             Take ownership of it? The existing file will be renamed to '{}'.",
            self.target.display(),
            self.backup.display()
        )
    }
}

/// Caller-supplied yes/no/cancel prompt
pub trait ConsentPrompter {
    fn confirm_takeover(&mut self, request: &ConsentRequest) -> ConsentAnswer;
}

impl<F> ConsentPrompter for F
where
    F: FnMut(&ConsentRequest) -> ConsentAnswer,
{
    fn confirm_takeover(&mut self, request: &ConsentRequest) -> ConsentAnswer {
        self(request)
    }
}
