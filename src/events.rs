//! Change notifications from the synchronizer to its owner

use crate::ownership::OwnershipState;

/// Option group that was replaced
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptionGroup {
    Renderer,
    Networked,
    Local,
    Network,
    ProcessControl,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncEvent {
    /// Ownership state moved; persisted flags changed with it
    StateChanged {
        from: OwnershipState,
        to: OwnershipState,
    },
    /// An option group changed; the in-memory configuration was regenerated
    OptionsChanged(OptionGroup),
    /// Viewports produced different configuration text
    ConfigRegenerated,
}

/// Registered listeners, called in registration order
#[derive(Default)]
pub struct Listeners {
    listeners: Vec<Box<dyn FnMut(&SyncEvent)>>,
}

impl Listeners {
    pub fn push(&mut self, listener: impl FnMut(&SyncEvent) + 'static) {
        self.listeners.push(Box::new(listener));
    }

    pub fn emit(&mut self, event: SyncEvent) {
        for listener in &mut self.listeners {
            listener(&event);
        }
    }
}

impl std::fmt::Debug for Listeners {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Listeners")
            .field("count", &self.listeners.len())
            .finish()
    }
}
