//! Lifecycle events broadcast by the session manager.

use std::time::Duration;

use relay_models::{DisconnectCause, Identity};

/// Events emitted as sessions move through their lifecycle.
#[derive(Debug, Clone, PartialEq)]
pub enum LifecycleEvent {
    /// A connection from stored credentials was opened and registered.
    SessionStarting {
        /// Identity.
        identity: Identity,
    },
    /// A session reached the open state.
    SessionOpened {
        /// Identity.
        identity: Identity,
        /// True when this completed a pairing attempt.
        via_pairing: bool,
    },
    /// A session's connection closed.
    SessionClosed {
        /// Identity.
        identity: Identity,
        /// Classified cause.
        cause: DisconnectCause,
    },
    /// A session was stopped on request.
    SessionStopped {
        /// Identity.
        identity: Identity,
    },
    /// A linking code was issued.
    PairingCodeIssued {
        /// Identity.
        identity: Identity,
    },
    /// A pairing attempt was discarded.
    PairingAbandoned {
        /// Identity.
        identity: Identity,
        /// Why.
        reason: String,
    },
    /// A restart was scheduled after a transient closure.
    RestartScheduled {
        /// Identity.
        identity: Identity,
        /// 1-based attempt number.
        attempt: u32,
        /// Delay before the attempt.
        delay: Duration,
    },
    /// A scheduled restart fired and is reconnecting.
    RestartAttempted {
        /// Identity.
        identity: Identity,
        /// 1-based attempt number.
        attempt: u32,
    },
    /// A scheduled restart fired but had nothing to do.
    RestartAbandoned {
        /// Identity.
        identity: Identity,
        /// Why.
        reason: String,
    },
    /// The retry policy gave up on this identity.
    RestartsExhausted {
        /// Identity.
        identity: Identity,
        /// Attempts made.
        attempts: u32,
    },
}

impl LifecycleEvent {
    /// Returns the identity associated with this event.
    pub fn identity(&self) -> &Identity {
        match self {
            LifecycleEvent::SessionStarting { identity } => identity,
            LifecycleEvent::SessionOpened { identity, .. } => identity,
            LifecycleEvent::SessionClosed { identity, .. } => identity,
            LifecycleEvent::SessionStopped { identity } => identity,
            LifecycleEvent::PairingCodeIssued { identity } => identity,
            LifecycleEvent::PairingAbandoned { identity, .. } => identity,
            LifecycleEvent::RestartScheduled { identity, .. } => identity,
            LifecycleEvent::RestartAttempted { identity, .. } => identity,
            LifecycleEvent::RestartAbandoned { identity, .. } => identity,
            LifecycleEvent::RestartsExhausted { identity, .. } => identity,
        }
    }

    /// Returns true for events that involve a restart.
    pub fn is_restart(&self) -> bool {
        matches!(
            self,
            LifecycleEvent::RestartScheduled { .. }
                | LifecycleEvent::RestartAttempted { .. }
                | LifecycleEvent::RestartAbandoned { .. }
                | LifecycleEvent::RestartsExhausted { .. }
        )
    }
}
