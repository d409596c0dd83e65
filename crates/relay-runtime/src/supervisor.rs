//! Reconnect bookkeeping and cancellable restart tasks.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use relay_models::Identity;
use tokio::sync::Mutex;
use tokio::task::AbortHandle;
use tracing::debug;

use crate::retry::RetryPolicy;

/// What to do after a transient closure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconnectDecision {
    /// Schedule attempt number `attempt` after `delay`.
    Retry { attempt: u32, delay: Duration },
    /// The policy gave up after `attempts` consecutive failures.
    Exhausted { attempts: u32 },
    /// The identity was stopped; do nothing.
    Stopped,
}

#[derive(Debug)]
struct PendingRestart {
    token: u64,
    handle: AbortHandle,
}

#[derive(Debug, Default)]
struct RetryState {
    attempts: u32,
    pending: Option<PendingRestart>,
    stopped: bool,
}

/// Tracks retry counters, stop flags and at most one pending restart per identity.
#[derive(Debug)]
pub struct ReconnectSupervisor {
    policy: RetryPolicy,
    state: Arc<Mutex<HashMap<Identity, RetryState>>>,
    next_token: AtomicU64,
    shut_down: AtomicBool,
}

impl ReconnectSupervisor {
    /// Creates a supervisor using `policy`.
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            state: Arc::new(Mutex::new(HashMap::new())),
            next_token: AtomicU64::new(1),
            shut_down: AtomicBool::new(false),
        }
    }

    /// A connection opened: reset the retry counter.
    pub async fn on_open(&self, identity: &Identity) {
        let mut state = self.state.lock().await;
        state.entry(identity.clone()).or_default().attempts = 0;
    }

    /// Counts one more transient failure and decides whether to retry.
    pub async fn next_retry(&self, identity: &Identity) -> ReconnectDecision {
        if self.shut_down.load(Ordering::SeqCst) {
            return ReconnectDecision::Stopped;
        }
        let mut state = self.state.lock().await;
        let entry = state.entry(identity.clone()).or_default();
        if entry.stopped {
            return ReconnectDecision::Stopped;
        }
        let attempt = entry.attempts.saturating_add(1);
        match self.policy.delay_for(attempt) {
            Some(delay) => {
                entry.attempts = attempt;
                ReconnectDecision::Retry { attempt, delay }
            }
            None => ReconnectDecision::Exhausted {
                attempts: entry.attempts,
            },
        }
    }

    /// Runs `restart` after `delay` unless cancelled first.
    ///
    /// Replaces any restart already pending for `identity`. Returns false when
    /// the identity is stopped or the supervisor is shut down.
    pub async fn schedule<F>(&self, identity: &Identity, delay: Duration, restart: F) -> bool
    where
        F: Future<Output = ()> + Send + 'static,
    {
        if self.shut_down.load(Ordering::SeqCst) {
            return false;
        }
        let mut state = self.state.lock().await;
        let entry = state.entry(identity.clone()).or_default();
        if entry.stopped {
            return false;
        }
        if let Some(previous) = entry.pending.take() {
            previous.handle.abort();
        }

        let token = self.next_token.fetch_add(1, Ordering::Relaxed);
        let shared = Arc::clone(&self.state);
        let id = identity.clone();
        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            {
                let mut state = shared.lock().await;
                match state.get_mut(&id) {
                    Some(entry) if entry.pending.as_ref().is_some_and(|p| p.token == token) => {
                        entry.pending = None;
                    }
                    _ => return,
                }
            }
            restart.await;
        });
        entry.pending = Some(PendingRestart {
            token,
            handle: task.abort_handle(),
        });
        true
    }

    /// Sets the stop flag and aborts the pending restart. Returns true if one was pending.
    pub async fn stop(&self, identity: &Identity) -> bool {
        let mut state = self.state.lock().await;
        let entry = state.entry(identity.clone()).or_default();
        entry.stopped = true;
        match entry.pending.take() {
            Some(pending) => {
                pending.handle.abort();
                debug!(identity = %identity, "Cancelled pending restart");
                true
            }
            None => false,
        }
    }

    /// Aborts the pending restart without setting the stop flag.
    pub async fn cancel_pending(&self, identity: &Identity) -> bool {
        let mut state = self.state.lock().await;
        match state.get_mut(identity).and_then(|e| e.pending.take()) {
            Some(pending) => {
                pending.handle.abort();
                true
            }
            None => false,
        }
    }

    /// Clears the stop flag ahead of an explicit start.
    pub async fn clear_stop(&self, identity: &Identity) {
        if let Some(entry) = self.state.lock().await.get_mut(identity) {
            entry.stopped = false;
        }
    }

    /// Whether `identity` was explicitly stopped.
    pub async fn is_stopped(&self, identity: &Identity) -> bool {
        self.shut_down.load(Ordering::SeqCst)
            || self
                .state
                .lock()
                .await
                .get(identity)
                .is_some_and(|e| e.stopped)
    }

    /// Whether a restart is pending for `identity`.
    pub async fn has_pending(&self, identity: &Identity) -> bool {
        self.state
            .lock()
            .await
            .get(identity)
            .is_some_and(|e| e.pending.is_some())
    }

    /// Drops all bookkeeping for `identity`, aborting any pending restart.
    pub async fn forget(&self, identity: &Identity) {
        if let Some(entry) = self.state.lock().await.remove(identity) {
            if let Some(pending) = entry.pending {
                pending.handle.abort();
            }
        }
    }

    /// Aborts every pending restart and refuses new ones.
    pub async fn shutdown(&self) {
        self.shut_down.store(true, Ordering::SeqCst);
        let mut state = self.state.lock().await;
        for entry in state.values_mut() {
            if let Some(pending) = entry.pending.take() {
                pending.handle.abort();
            }
        }
    }
}
