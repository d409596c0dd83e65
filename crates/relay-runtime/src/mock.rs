//! In-memory transport and handler for tests.
//!
//! `MockClient` hands out `MockSession`s and keeps the sending half of every
//! connection's event channel so tests can inject `SessionEvent`s.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use relay_models::{
    CredentialBlob, DisconnectCause, Identity, InboundMessage, OutboundContent, SessionEvent,
};
use tokio::sync::mpsc;

use crate::handler::{HandlerError, MessageHandler};
use crate::transport::{Connection, ProtocolClient, ProtocolSession, TransportError};

/// Default code returned by [`MockSession::request_pairing_code`].
pub const MOCK_PAIRING_CODE: &str = "MOCK-1234";

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A recorded connection.
#[derive(Clone)]
pub struct MockHandle {
    /// Identity that connected.
    pub identity: Identity,
    /// Session handed to the runtime.
    pub session: Arc<MockSession>,
    /// Credentials passed to `connect`.
    pub credentials: Option<CredentialBlob>,
    events: mpsc::Sender<SessionEvent>,
}

/// Protocol client that records every connect.
#[derive(Default)]
pub struct MockClient {
    handles: Mutex<Vec<MockHandle>>,
    pairing: Mutex<Option<Result<String, String>>>,
    fail_connects: AtomicBool,
}

impl MockClient {
    /// Creates a client whose sessions issue [`MOCK_PAIRING_CODE`].
    pub fn new() -> Self {
        Self::default()
    }

    /// Sessions issue `code` when asked for a linking code.
    pub fn with_pairing_code(self, code: impl Into<String>) -> Self {
        *lock(&self.pairing) = Some(Ok(code.into()));
        self
    }

    /// Sessions reject linking code requests with `reason`.
    pub fn fail_pairing(self, reason: impl Into<String>) -> Self {
        *lock(&self.pairing) = Some(Err(reason.into()));
        self
    }

    /// Makes subsequent connects fail (or succeed again).
    pub fn set_fail_connects(&self, fail: bool) {
        self.fail_connects.store(fail, Ordering::SeqCst);
    }

    /// Total connects that succeeded.
    pub fn connect_count(&self) -> usize {
        lock(&self.handles).len()
    }

    /// Successful connects for `identity`.
    pub fn connect_count_for(&self, identity: &Identity) -> usize {
        lock(&self.handles)
            .iter()
            .filter(|h| &h.identity == identity)
            .count()
    }

    /// The most recent connection for `identity`.
    pub fn latest(&self, identity: &Identity) -> Option<MockHandle> {
        lock(&self.handles)
            .iter()
            .rev()
            .find(|h| &h.identity == identity)
            .cloned()
    }

    /// Injects `event` into the latest connection for `identity`.
    pub async fn emit(&self, identity: &Identity, event: SessionEvent) -> bool {
        let Some(handle) = self.latest(identity) else {
            return false;
        };
        handle.events.send(event).await.is_ok()
    }
}

#[async_trait]
impl ProtocolClient for MockClient {
    async fn connect(
        &self,
        identity: &Identity,
        credentials: Option<CredentialBlob>,
    ) -> Result<Connection, TransportError> {
        if self.fail_connects.load(Ordering::SeqCst) {
            return Err(TransportError::Connect("mock connect refused".to_string()));
        }

        let (tx, rx) = mpsc::channel(64);
        let pairing = lock(&self.pairing)
            .clone()
            .unwrap_or_else(|| Ok(MOCK_PAIRING_CODE.to_string()));
        let session = Arc::new(MockSession {
            identity: identity.clone(),
            events: Some(tx.clone()),
            pairing,
            ..MockSession::new(identity.clone())
        });

        lock(&self.handles).push(MockHandle {
            identity: identity.clone(),
            session: Arc::clone(&session),
            credentials,
            events: tx,
        });

        Ok(Connection {
            session,
            events: rx,
        })
    }
}

/// Session that records outbound activity.
pub struct MockSession {
    identity: Identity,
    events: Option<mpsc::Sender<SessionEvent>>,
    pairing: Result<String, String>,
    sent: Mutex<Vec<(String, OutboundContent)>>,
    pairing_requests: AtomicUsize,
    closed: AtomicBool,
    logged_out: AtomicBool,
    fail_sends: AtomicBool,
}

impl MockSession {
    /// A detached session with no event channel.
    pub fn new(identity: Identity) -> Self {
        Self {
            identity,
            events: None,
            pairing: Ok(MOCK_PAIRING_CODE.to_string()),
            sent: Mutex::new(Vec::new()),
            pairing_requests: AtomicUsize::new(0),
            closed: AtomicBool::new(false),
            logged_out: AtomicBool::new(false),
            fail_sends: AtomicBool::new(false),
        }
    }

    /// Everything sent so far as `(recipient, content)`.
    pub fn sent(&self) -> Vec<(String, OutboundContent)> {
        lock(&self.sent).clone()
    }

    /// Number of linking code requests.
    pub fn pairing_requests(&self) -> usize {
        self.pairing_requests.load(Ordering::SeqCst)
    }

    /// Whether `close` or `logout` was called.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Whether `logout` was called.
    pub fn is_logged_out(&self) -> bool {
        self.logged_out.load(Ordering::SeqCst)
    }

    /// Makes subsequent sends fail.
    pub fn set_fail_sends(&self, fail: bool) {
        self.fail_sends.store(fail, Ordering::SeqCst);
    }

    fn report_closed(&self, cause: DisconnectCause) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Some(events) = &self.events {
            let _ = events.try_send(SessionEvent::ConnectionClosed { cause });
        }
    }
}

#[async_trait]
impl ProtocolSession for MockSession {
    fn own_address(&self) -> Option<String> {
        Some(self.identity.address())
    }

    async fn send(&self, recipient: &str, content: OutboundContent) -> Result<(), TransportError> {
        if self.fail_sends.load(Ordering::SeqCst) {
            return Err(TransportError::Send("mock send refused".to_string()));
        }
        if self.is_closed() {
            return Err(TransportError::Closed);
        }
        lock(&self.sent).push((recipient.to_string(), content));
        Ok(())
    }

    async fn request_pairing_code(&self, _phone: &Identity) -> Result<String, TransportError> {
        self.pairing_requests.fetch_add(1, Ordering::SeqCst);
        self.pairing
            .clone()
            .map_err(TransportError::PairingRejected)
    }

    async fn logout(&self) -> Result<(), TransportError> {
        self.logged_out.store(true, Ordering::SeqCst);
        self.report_closed(DisconnectCause::LoggedOut);
        Ok(())
    }

    async fn close(&self) -> Result<(), TransportError> {
        self.report_closed(DisconnectCause::Unknown);
        Ok(())
    }
}

/// Handler that records every message it receives.
#[derive(Default)]
pub struct RecordingHandler {
    received: Mutex<Vec<(Identity, InboundMessage)>>,
    panic_on: Option<String>,
}

impl RecordingHandler {
    /// Creates a recording handler.
    pub fn new() -> Self {
        Self::default()
    }

    /// Panics whenever a message body equals `text`.
    pub fn panicking_on(text: impl Into<String>) -> Self {
        Self {
            panic_on: Some(text.into()),
            ..Self::default()
        }
    }

    /// Messages received so far.
    pub fn received(&self) -> Vec<(Identity, InboundMessage)> {
        lock(&self.received).clone()
    }
}

#[async_trait]
impl MessageHandler for RecordingHandler {
    async fn on_inbound_message(
        &self,
        identity: &Identity,
        _session: Arc<dyn ProtocolSession>,
        message: InboundMessage,
    ) -> Result<(), HandlerError> {
        if self.panic_on.is_some() && message.body() == self.panic_on.as_deref() {
            panic!("handler blew up on {:?}", message.body());
        }
        lock(&self.received).push((identity.clone(), message));
        Ok(())
    }
}
