//! Listener state of the level controller.
//!
//! # States
//! - Uninitialized: waiting for the flag client's first sync; `Changed` is not listened to
//! - Armed: first sync handled, every `Changed` triggers a resolution
//!
//! # State Transitions
//! ```text
//! Uninitialized --Synchronized--> resolve, then Armed
//! Uninitialized --Changed-------> ignored
//! Armed         --Changed-------> resolve (self-loop)
//! Armed         --Synchronized--> ignored
//! ```
//!
//! A `Changed` that arrives before the first sync would resolve against
//! flag state that has not finished loading.

use crate::flag::FlagEvent;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Subscription {
    #[default]
    Uninitialized,
    Armed,
}

/// What the controller should do with an incoming event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Resolve, then arm the `Changed` listener.
    ResolveAndArm,
    /// Resolve.
    Resolve,
    Ignore,
}

impl Subscription {
    pub fn is_armed(&self) -> bool {
        matches!(self, Subscription::Armed)
    }

    pub fn action(&self, event: FlagEvent) -> Action {
        match (self, event) {
            (Subscription::Uninitialized, FlagEvent::Synchronized) => Action::ResolveAndArm,
            (Subscription::Armed, FlagEvent::Changed) => Action::Resolve,
            _ => Action::Ignore,
        }
    }
}
