//! Session manager: pairing, start/stop, reconnection and message delivery.

use std::collections::HashSet;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::Utc;
use futures::future::BoxFuture;
use futures::FutureExt;
use relay_models::{
    ConnectionState, CredentialBlob, DisconnectCause, Identity, InboundMessage, OutboundContent,
    SessionEvent,
};
use relay_persistence::CredentialStore;
use serde::Serialize;
use tokio::sync::{broadcast, mpsc, Mutex};
use tracing::{debug, error, info, warn};

use crate::config::RuntimeConfig;
use crate::error::{RelayError, Result};
use crate::event::LifecycleEvent;
use crate::handler::MessageHandler;
use crate::pairing::{confirmation_text, LinkingCode, PairingAttempts, PairingOutcome, Reservation};
use crate::registry::{SessionRecord, SessionRegistry};
use crate::supervisor::{ReconnectDecision, ReconnectSupervisor};
use crate::transport::{Connection, ProtocolClient, ProtocolSession};

/// Result of a start request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    /// A new connection was opened from stored credentials.
    Started,
    /// A session was already registered or starting.
    AlreadyRunning,
    /// The identity was stopped while the connection was opening.
    Cancelled,
}

/// Result of a stop request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    /// A live session was closed.
    Stopped,
    /// No live session, but a pending restart was cancelled.
    RestartCancelled,
}

/// Externally visible state of one identity's session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// Registered and open.
    Active,
    /// Registered, transport still negotiating.
    Connecting,
    /// Not registered; a restart is pending.
    Reconnecting,
    /// Not registered and nothing pending.
    Stopped,
}

impl SessionStatus {
    /// Lowercase name.
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Active => "active",
            SessionStatus::Connecting => "connecting",
            SessionStatus::Reconnecting => "reconnecting",
            SessionStatus::Stopped => "stopped",
        }
    }

    /// Whether the identity holds a registry entry.
    pub fn is_running(&self) -> bool {
        matches!(self, SessionStatus::Active | SessionStatus::Connecting)
    }

    fn from_state(state: ConnectionState) -> Self {
        match state {
            ConnectionState::Open => SessionStatus::Active,
            _ => SessionStatus::Connecting,
        }
    }
}

/// Pairing-oriented view of one identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PairingStatus {
    /// Identity.
    pub identity: Identity,
    /// Registered and open.
    pub active: bool,
    /// A credential location exists on disk.
    pub credentials_exist: bool,
    /// A pairing attempt is outstanding.
    pub pairing: bool,
}

impl PairingStatus {
    /// `connected`, `disconnected` or `not_initialized`.
    pub fn status(&self) -> &'static str {
        if self.active {
            "connected"
        } else if self.credentials_exist {
            "disconnected"
        } else {
            "not_initialized"
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StartOrigin {
    Request,
    Restart,
}

/// Owns the session registry, pairing attempts and reconnect supervisor.
///
/// Cheap to clone; clones share state.
#[derive(Clone)]
pub struct SessionManager {
    inner: Arc<Inner>,
}

struct Inner {
    config: RuntimeConfig,
    client: Arc<dyn ProtocolClient>,
    store: Arc<dyn CredentialStore>,
    handler: Arc<dyn MessageHandler>,
    registry: SessionRegistry,
    pairing: PairingAttempts,
    supervisor: ReconnectSupervisor,
    /// Identities with a stored-credential connect in flight. Also serializes
    /// every check-and-insert across the registry and the pairing table.
    starting: Mutex<HashSet<Identity>>,
    next_connection: AtomicU64,
    event_tx: broadcast::Sender<LifecycleEvent>,
}

impl SessionManager {
    /// Creates a manager.
    pub fn new(
        config: RuntimeConfig,
        client: Arc<dyn ProtocolClient>,
        store: Arc<dyn CredentialStore>,
        handler: Arc<dyn MessageHandler>,
    ) -> Self {
        let (event_tx, _) = broadcast::channel(config.event_capacity.max(1));
        let supervisor = ReconnectSupervisor::new(config.retry_policy.clone());

        Self {
            inner: Arc::new(Inner {
                config,
                client,
                store,
                handler,
                registry: SessionRegistry::new(),
                pairing: PairingAttempts::new(),
                supervisor,
                starting: Mutex::new(HashSet::new()),
                next_connection: AtomicU64::new(1),
                event_tx,
            }),
        }
    }

    /// Subscribe to lifecycle events.
    pub fn subscribe(&self) -> broadcast::Receiver<LifecycleEvent> {
        self.inner.event_tx.subscribe()
    }

    /// The live session registry.
    pub fn registry(&self) -> &SessionRegistry {
        &self.inner.registry
    }

    /// The runtime configuration.
    pub fn config(&self) -> &RuntimeConfig {
        &self.inner.config
    }

    /// The credential store.
    pub fn store(&self) -> Arc<dyn CredentialStore> {
        Arc::clone(&self.inner.store)
    }

    /// Whether a pairing attempt is outstanding for `identity`.
    pub async fn is_pairing(&self, identity: &Identity) -> bool {
        self.inner.pairing.contains(identity).await
    }

    /// Starts pairing `phone`, returning a linking code to enter on the device.
    pub async fn begin_pairing(&self, phone: &str) -> Result<PairingOutcome> {
        let identity = Identity::parse(phone)?;
        self.inner.begin_pairing(identity).await
    }

    /// Brings up a session from stored credentials.
    pub async fn start_session(&self, identity: &Identity) -> Result<StartOutcome> {
        self.inner.start(identity, StartOrigin::Request).await
    }

    /// Stops a session and cancels any pending restart.
    pub async fn stop_session(&self, identity: &Identity) -> Result<StopOutcome> {
        self.inner.stop(identity).await
    }

    /// Sends `text` through `identity`'s session. Returns the resolved recipient address.
    ///
    /// `to` is used as-is when it is already an address, otherwise it is
    /// normalized to a user address.
    pub async fn send_message(&self, identity: &Identity, to: &str, text: &str) -> Result<String> {
        let handle = self
            .inner
            .registry
            .get(identity)
            .await
            .ok_or_else(|| RelayError::SessionNotFound(identity.clone()))?;

        let recipient = if to.contains('@') {
            to.trim().to_string()
        } else {
            Identity::parse(to)?.address()
        };

        handle
            .send(&recipient, OutboundContent::text(text))
            .await?;
        debug!(identity = %identity, to = %recipient, "Sent message");
        Ok(recipient)
    }

    /// Current status of `identity`'s session.
    pub async fn session_status(&self, identity: &Identity) -> SessionStatus {
        if let Some(record) = self.inner.registry.record(identity).await {
            return SessionStatus::from_state(record.state);
        }
        if self.inner.supervisor.has_pending(identity).await {
            return SessionStatus::Reconnecting;
        }
        if self.inner.starting.lock().await.contains(identity) {
            return SessionStatus::Connecting;
        }
        SessionStatus::Stopped
    }

    /// Every registered session with its status, sorted by identity.
    pub async fn list_sessions(&self) -> Vec<(Identity, SessionStatus)> {
        self.inner
            .registry
            .snapshot()
            .await
            .into_iter()
            .map(|r| (r.identity, SessionStatus::from_state(r.state)))
            .collect()
    }

    /// Identities with a pairing attempt outstanding, sorted.
    pub async fn pairing_attempts(&self) -> Vec<Identity> {
        self.inner.pairing.list().await
    }

    /// Pairing view of `identity`.
    pub async fn pairing_status(&self, identity: &Identity) -> PairingStatus {
        let active = self
            .inner
            .registry
            .record(identity)
            .await
            .is_some_and(|r| r.state == ConnectionState::Open);

        PairingStatus {
            identity: identity.clone(),
            active,
            credentials_exist: self.inner.store.exists(identity),
            pairing: self.inner.pairing.contains(identity).await,
        }
    }

    /// Logs the device out, cancels restarts and deletes stored credentials.
    pub async fn unpair(&self, identity: &Identity) -> Result<()> {
        self.inner.unpair(identity).await
    }

    /// Starts every stored identity whose credentials are registered.
    ///
    /// Failures are logged per identity. Returns how many sessions started.
    pub async fn restore_sessions(&self) -> Result<usize> {
        let identities = self.inner.store.list()?;
        let mut started = 0;

        for identity in identities {
            match self.inner.store.load(&identity) {
                Ok(Some(blob)) if blob.is_registered() => {}
                Ok(_) => {
                    debug!(identity = %identity, "Skipping unregistered identity");
                    continue;
                }
                Err(e) => {
                    warn!(identity = %identity, error = %e, "Could not read credentials");
                    continue;
                }
            }

            match self.inner.start(&identity, StartOrigin::Request).await {
                Ok(StartOutcome::Started) => started += 1,
                Ok(_) => {}
                Err(e) => warn!(identity = %identity, error = %e, "Failed to restore session"),
            }
        }

        info!(started, "Restored sessions");
        Ok(started)
    }

    /// Cancels every pending restart and closes every live connection.
    pub async fn shutdown(&self) {
        self.inner.shutdown().await;
    }
}

impl Inner {
    fn emit_event(&self, event: LifecycleEvent) {
        // Ignore send errors (no receivers)
        let _ = self.event_tx.send(event);
    }

    fn next_connection_id(&self) -> u64 {
        self.next_connection.fetch_add(1, Ordering::Relaxed)
    }

    async fn begin_pairing(self: &Arc<Self>, identity: Identity) -> Result<PairingOutcome> {
        let expired = {
            let starting = self.starting.lock().await;
            if self.registry.has(&identity).await {
                return Ok(PairingOutcome::AlreadyRegistered { identity });
            }
            if starting.contains(&identity) {
                return Err(RelayError::SessionStarting(identity));
            }
            let expired = match self.pairing.reserve(&identity).await {
                Reservation::Reserved => None,
                Reservation::Superseded(attempt) => Some(attempt),
                Reservation::Issued(code) => {
                    debug!(identity = %identity, "Returning outstanding linking code");
                    return Ok(PairingOutcome::Code(code));
                }
                Reservation::InProgress => return Err(RelayError::PairingInProgress(identity)),
            };
            // A fresh pairing supersedes any earlier stop or unpair
            self.supervisor.clear_stop(&identity).await;
            expired
        };

        if let Some(attempt) = expired {
            info!(identity = %identity, "Linking code expired, replacing pairing connection");
            self.emit_event(LifecycleEvent::PairingAbandoned {
                identity: identity.clone(),
                reason: "linking code expired".to_string(),
            });
            if let Some(session) = attempt.session {
                if let Err(e) = session.close().await {
                    debug!(identity = %identity, error = %e, "Close of expired pairing connection");
                }
            }
        }

        info!(identity = %identity, "Beginning pairing");
        self.pair_reserved(&identity).await
    }

    /// Drives a reserved attempt until a code is issued. Every error path
    /// leaves no attempt behind.
    async fn pair_reserved(self: &Arc<Self>, identity: &Identity) -> Result<PairingOutcome> {
        let loaded = self
            .store
            .ensure_location(identity)
            .and_then(|()| self.store.load(identity));
        let credentials = match loaded {
            Ok(credentials) => credentials,
            Err(e) => {
                self.pairing.take(identity).await;
                return Err(e.into());
            }
        };

        if credentials.as_ref().is_some_and(CredentialBlob::is_registered) {
            self.pairing.take(identity).await;
            info!(identity = %identity, "Already registered, starting from stored credentials");
            self.start(identity, StartOrigin::Request).await?;
            return Ok(PairingOutcome::AlreadyRegistered {
                identity: identity.clone(),
            });
        }

        let connection = match self.client.connect(identity, credentials).await {
            Ok(connection) => connection,
            Err(e) => {
                self.pairing.take(identity).await;
                return Err(e.into());
            }
        };
        let session = Arc::clone(&connection.session);
        let connection_id = self.next_connection_id();

        if !self
            .pairing
            .attach(identity, Arc::clone(&session), connection_id)
            .await
        {
            let _ = session.close().await;
            return Err(RelayError::PairingCancelled(identity.clone()));
        }
        self.spawn_consumer(identity.clone(), connection_id, connection);

        tokio::time::sleep(self.config.settle_delay).await;

        if !self.pairing.is_current(identity, connection_id).await {
            let promoted = self
                .registry
                .record(identity)
                .await
                .is_some_and(|r| r.connection_id == connection_id);
            if promoted {
                return Ok(PairingOutcome::AlreadyRegistered {
                    identity: identity.clone(),
                });
            }
            return Err(RelayError::PairingCancelled(identity.clone()));
        }

        match session.request_pairing_code(identity).await {
            Ok(code) => {
                let linking = LinkingCode {
                    identity: identity.clone(),
                    code,
                    issued_at: Utc::now(),
                    valid_for: self.config.code_validity,
                };
                if !self
                    .pairing
                    .record_code(identity, connection_id, linking.clone())
                    .await
                {
                    return Err(RelayError::PairingCancelled(identity.clone()));
                }

                info!(identity = %identity, "Issued linking code");
                self.emit_event(LifecycleEvent::PairingCodeIssued {
                    identity: identity.clone(),
                });
                Ok(PairingOutcome::Code(linking))
            }
            Err(source) => {
                warn!(identity = %identity, error = %source, "Linking code request failed");
                if self.pairing.take_if(identity, connection_id).await.is_some() {
                    if let Err(e) = session.close().await {
                        debug!(identity = %identity, error = %e, "Close after failed pairing");
                    }
                }
                self.emit_event(LifecycleEvent::PairingAbandoned {
                    identity: identity.clone(),
                    reason: source.to_string(),
                });
                Err(RelayError::PairingRequestFailed {
                    identity: identity.clone(),
                    source,
                })
            }
        }
    }

    async fn start(self: &Arc<Self>, identity: &Identity, origin: StartOrigin) -> Result<StartOutcome> {
        {
            let mut starting = self.starting.lock().await;
            if self.registry.has(identity).await || starting.contains(identity) {
                return Ok(StartOutcome::AlreadyRunning);
            }
            if self.pairing.contains(identity).await {
                return Err(RelayError::PairingInProgress(identity.clone()));
            }
            match origin {
                StartOrigin::Request => {
                    self.supervisor.clear_stop(identity).await;
                    self.supervisor.cancel_pending(identity).await;
                }
                StartOrigin::Restart => {
                    if self.supervisor.is_stopped(identity).await {
                        return Ok(StartOutcome::Cancelled);
                    }
                }
            }
            starting.insert(identity.clone());
        }

        let opened = self.open_from_store(identity).await;

        let mut starting = self.starting.lock().await;
        starting.remove(identity);
        let connection = opened?;

        if self.supervisor.is_stopped(identity).await {
            drop(starting);
            info!(identity = %identity, "Stopped while connecting, closing");
            let _ = connection.session.close().await;
            return Ok(StartOutcome::Cancelled);
        }

        let connection_id = self.next_connection_id();
        self.registry
            .put(SessionRecord::new(
                identity.clone(),
                Arc::clone(&connection.session),
                ConnectionState::Connecting,
                connection_id,
            ))
            .await;
        self.spawn_consumer(identity.clone(), connection_id, connection);
        drop(starting);

        info!(identity = %identity, "Session starting");
        self.emit_event(LifecycleEvent::SessionStarting {
            identity: identity.clone(),
        });
        Ok(StartOutcome::Started)
    }

    async fn open_from_store(&self, identity: &Identity) -> Result<Connection> {
        let credentials = match self.store.load(identity)? {
            Some(blob) if blob.is_registered() => blob,
            _ => return Err(RelayError::CredentialsNotFound(identity.clone())),
        };
        Ok(self.client.connect(identity, Some(credentials)).await?)
    }

    async fn stop(self: &Arc<Self>, identity: &Identity) -> Result<StopOutcome> {
        let cancelled = self.supervisor.stop(identity).await;

        let (record, connecting) = {
            let starting = self.starting.lock().await;
            (
                self.registry.remove(identity).await,
                starting.contains(identity),
            )
        };

        let outcome = match record {
            Some(record) => {
                if let Err(e) = record.handle.close().await {
                    warn!(identity = %identity, error = %e, "Error closing session");
                }
                StopOutcome::Stopped
            }
            // The in-flight start sees the stop flag and closes its own connection
            None if connecting => StopOutcome::Stopped,
            None if cancelled => StopOutcome::RestartCancelled,
            None => {
                // Nothing was stopped, so nothing should stay suppressed
                self.supervisor.clear_stop(identity).await;
                return Err(RelayError::SessionNotFound(identity.clone()));
            }
        };

        info!(identity = %identity, ?outcome, "Session stopped");
        self.emit_event(LifecycleEvent::SessionStopped {
            identity: identity.clone(),
        });
        Ok(outcome)
    }

    async fn unpair(self: &Arc<Self>, identity: &Identity) -> Result<()> {
        self.supervisor.stop(identity).await;

        let (record, attempt) = {
            let _starting = self.starting.lock().await;
            (
                self.registry.remove(identity).await,
                self.pairing.take(identity).await,
            )
        };

        let handle = record
            .map(|r| r.handle)
            .or_else(|| attempt.and_then(|a| a.session));
        if let Some(handle) = handle {
            if let Err(e) = handle.logout().await {
                warn!(identity = %identity, error = %e, "Logout failed, closing instead");
                let _ = handle.close().await;
            }
        }

        {
            // An in-flight start still needs the stop flag to discard its connection
            let starting = self.starting.lock().await;
            if !starting.contains(identity) {
                self.supervisor.forget(identity).await;
            }
        }

        self.store.remove(identity)?;
        info!(identity = %identity, "Unpaired");
        self.emit_event(LifecycleEvent::SessionStopped {
            identity: identity.clone(),
        });
        Ok(())
    }

    async fn shutdown(&self) {
        self.supervisor.shutdown().await;

        let (attempts, records) = {
            let _starting = self.starting.lock().await;
            (self.pairing.drain().await, self.registry.drain().await)
        };

        for session in attempts.into_iter().filter_map(|a| a.session) {
            let _ = session.close().await;
        }
        let count = records.len();
        for record in records {
            if let Err(e) = record.handle.close().await {
                debug!(identity = %record.identity, error = %e, "Close during shutdown");
            }
        }
        info!(sessions = count, "Session manager shut down");
    }

    fn spawn_consumer(self: &Arc<Self>, identity: Identity, connection_id: u64, connection: Connection) {
        let inner = Arc::clone(self);
        let Connection { session, events } = connection;
        tokio::spawn(async move {
            inner
                .consume(identity, connection_id, session, events)
                .await;
        });
    }

    /// Handles one connection's events in transport order until it closes.
    async fn consume(
        self: Arc<Self>,
        identity: Identity,
        connection_id: u64,
        session: Arc<dyn ProtocolSession>,
        mut events: mpsc::Receiver<SessionEvent>,
    ) {
        debug!(identity = %identity, connection_id, "Consuming session events");

        while let Some(event) = events.recv().await {
            match event {
                SessionEvent::CredentialsUpdated { blob } => {
                    self.persist_credentials(&identity, &blob);
                }
                SessionEvent::ConnectionOpened => {
                    self.on_open(&identity, connection_id, &session).await;
                }
                SessionEvent::ConnectionClosed { cause } => {
                    self.on_closed(&identity, connection_id, cause).await;
                    return;
                }
                SessionEvent::MessageReceived { message } => {
                    self.deliver(&identity, &session, message).await;
                }
            }
        }

        self.on_closed(&identity, connection_id, DisconnectCause::Unknown)
            .await;
    }

    fn persist_credentials(&self, identity: &Identity, blob: &CredentialBlob) {
        match self.store.persist(identity, blob) {
            Ok(()) => debug!(identity = %identity, "Persisted credentials"),
            Err(e) => error!(identity = %identity, error = %e, "Failed to persist credentials"),
        }
    }

    async fn on_open(
        &self,
        identity: &Identity,
        connection_id: u64,
        session: &Arc<dyn ProtocolSession>,
    ) {
        let via_pairing = {
            let _starting = self.starting.lock().await;
            if self.pairing.take_if(identity, connection_id).await.is_some() {
                self.registry
                    .put(SessionRecord::new(
                        identity.clone(),
                        Arc::clone(session),
                        ConnectionState::Open,
                        connection_id,
                    ))
                    .await;
                true
            } else if self
                .registry
                .set_state(identity, connection_id, ConnectionState::Open)
                .await
            {
                false
            } else {
                debug!(identity = %identity, connection_id, "Ignoring open from stale connection");
                return;
            }
        };

        self.supervisor.on_open(identity).await;
        info!(identity = %identity, via_pairing, "Session open");
        self.emit_event(LifecycleEvent::SessionOpened {
            identity: identity.clone(),
            via_pairing,
        });

        if via_pairing && self.config.confirm_pairing {
            let to = session
                .own_address()
                .unwrap_or_else(|| identity.address());
            let text = confirmation_text(identity, &self.config.display_name);
            if let Err(e) = session.send(&to, OutboundContent::text(text)).await {
                warn!(identity = %identity, error = %e, "Could not send pairing confirmation");
            }
        }
    }

    async fn on_closed(self: &Arc<Self>, identity: &Identity, connection_id: u64, cause: DisconnectCause) {
        let was_session = self
            .registry
            .remove_if(identity, connection_id)
            .await
            .is_some();
        let was_pairing = !was_session
            && self
                .pairing
                .take_if(identity, connection_id)
                .await
                .is_some();

        if !was_session && !was_pairing {
            debug!(identity = %identity, connection_id, %cause, "Ignoring close of stale connection");
            return;
        }

        info!(identity = %identity, %cause, "Connection closed");
        self.emit_event(LifecycleEvent::SessionClosed {
            identity: identity.clone(),
            cause,
        });

        if cause.is_logged_out() {
            warn!(identity = %identity, "Logged out remotely, not reconnecting");
            self.supervisor.forget(identity).await;
            return;
        }

        if was_pairing {
            // Only a completed registration is worth reconnecting
            let registered = matches!(self.store.load(identity), Ok(Some(blob)) if blob.is_registered());
            if !registered {
                info!(identity = %identity, "Pairing connection closed before registration");
                self.emit_event(LifecycleEvent::PairingAbandoned {
                    identity: identity.clone(),
                    reason: format!("connection closed: {}", cause),
                });
                return;
            }
        }

        self.schedule_restart(identity).await;
    }

    async fn schedule_restart(self: &Arc<Self>, identity: &Identity) {
        match self.supervisor.next_retry(identity).await {
            ReconnectDecision::Retry { attempt, delay } => {
                let task = Arc::clone(self).restart(identity.clone(), attempt);
                if self.supervisor.schedule(identity, delay, task).await {
                    info!(identity = %identity, attempt, ?delay, "Scheduled restart");
                    self.emit_event(LifecycleEvent::RestartScheduled {
                        identity: identity.clone(),
                        attempt,
                        delay,
                    });
                }
            }
            ReconnectDecision::Exhausted { attempts } => {
                warn!(identity = %identity, attempts, "Giving up reconnecting");
                self.emit_event(LifecycleEvent::RestartsExhausted {
                    identity: identity.clone(),
                    attempts,
                });
            }
            ReconnectDecision::Stopped => {
                debug!(identity = %identity, "Stopped, not scheduling restart");
            }
        }
    }

    fn restart(self: Arc<Self>, identity: Identity, attempt: u32) -> BoxFuture<'static, ()> {
        async move {
            if self.supervisor.is_stopped(&identity).await {
                self.restart_abandoned(&identity, "stopped");
                return;
            }
            if self.registry.has(&identity).await {
                self.restart_abandoned(&identity, "already running");
                return;
            }

            info!(identity = %identity, attempt, "Restarting session");
            self.emit_event(LifecycleEvent::RestartAttempted {
                identity: identity.clone(),
                attempt,
            });

            match self.start(&identity, StartOrigin::Restart).await {
                Ok(StartOutcome::Started) => {}
                Ok(StartOutcome::AlreadyRunning) => self.restart_abandoned(&identity, "already running"),
                Ok(StartOutcome::Cancelled) => self.restart_abandoned(&identity, "stopped"),
                Err(RelayError::Transport(e)) => {
                    warn!(identity = %identity, attempt, error = %e, "Restart failed");
                    self.schedule_restart(&identity).await;
                }
                Err(e) => {
                    warn!(identity = %identity, error = %e, "Restart failed permanently");
                    self.restart_abandoned(&identity, &e.to_string());
                }
            }
        }
        .boxed()
    }

    fn restart_abandoned(&self, identity: &Identity, reason: &str) {
        debug!(identity = %identity, reason, "Restart abandoned");
        self.emit_event(LifecycleEvent::RestartAbandoned {
            identity: identity.clone(),
            reason: reason.to_string(),
        });
    }

    async fn deliver(
        &self,
        identity: &Identity,
        session: &Arc<dyn ProtocolSession>,
        message: InboundMessage,
    ) {
        let message_id = message.id.clone();
        let handled = AssertUnwindSafe(self.handler.on_inbound_message(
            identity,
            Arc::clone(session),
            message,
        ))
        .catch_unwind()
        .await;

        match handled {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                warn!(identity = %identity, message_id = %message_id, error = %e, "Message handler failed");
            }
            Err(_) => {
                error!(identity = %identity, message_id = %message_id, "Message handler panicked");
            }
        }
    }
}
