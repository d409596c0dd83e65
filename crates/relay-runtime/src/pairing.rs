//! In-flight pairing attempts.
//!
//! An attempt exists from the moment a linking code is requested until the
//! account either completes registration (the attempt is promoted to the
//! session registry) or the attempt is abandoned. A second request for the
//! same identity never opens a second connection.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use relay_models::Identity;
use serde::Serialize;
use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::transport::ProtocolSession;

/// A linking code handed to the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LinkingCode {
    /// Identity the code was issued for.
    pub identity: Identity,
    /// The code, exactly as the service returned it.
    pub code: String,
    /// When this copy was handed out.
    pub issued_at: DateTime<Utc>,
    /// Validity left as of `issued_at`.
    #[serde(skip)]
    pub valid_for: Duration,
}

impl LinkingCode {
    /// Advertised validity in whole seconds.
    pub fn valid_for_secs(&self) -> u64 {
        self.valid_for.as_secs()
    }

    /// The same code handed out again with `remaining` validity.
    pub fn reissued(&self, remaining: Duration) -> Self {
        Self {
            issued_at: Utc::now(),
            valid_for: remaining,
            ..self.clone()
        }
    }

    /// Advertised expiry.
    pub fn expires_at(&self) -> DateTime<Utc> {
        let validity = chrono::Duration::from_std(self.valid_for).unwrap_or_default();
        self.issued_at + validity
    }
}

/// Result of a pairing request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PairingOutcome {
    /// A code was issued and should be shown to the user.
    Code(LinkingCode),
    /// The identity is already registered; no code was requested.
    AlreadyRegistered {
        /// Identity.
        identity: Identity,
    },
}

/// One identity mid-registration.
#[derive(Clone)]
pub struct PairingAttempt {
    /// Identity being paired.
    pub identity: Identity,
    /// Unregistered session, once connected.
    pub session: Option<Arc<dyn ProtocolSession>>,
    /// Connection generation of `session`.
    pub connection_id: Option<u64>,
    /// Code issued to the user, once requested.
    pub issued: Option<LinkingCode>,
    /// When the issued code stops being handed out.
    pub code_deadline: Option<Instant>,
    /// When the attempt began.
    pub started_at: DateTime<Utc>,
}

impl fmt::Debug for PairingAttempt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PairingAttempt")
            .field("identity", &self.identity)
            .field("connected", &self.session.is_some())
            .field("connection_id", &self.connection_id)
            .field("issued", &self.issued.is_some())
            .field("code_deadline", &self.code_deadline)
            .field("started_at", &self.started_at)
            .finish()
    }
}

impl PairingAttempt {
    fn new(identity: Identity) -> Self {
        Self {
            identity,
            session: None,
            connection_id: None,
            issued: None,
            code_deadline: None,
            started_at: Utc::now(),
        }
    }
}

/// What [`PairingAttempts::reserve`] found.
#[derive(Debug, Clone)]
pub enum Reservation {
    /// A new attempt was created for the caller.
    Reserved,
    /// The previous attempt's code lapsed. A new attempt was created in its
    /// place; the caller must close the old connection.
    Superseded(PairingAttempt),
    /// An attempt already issued this code and it is still valid; hand it out again.
    Issued(LinkingCode),
    /// An attempt is still connecting or settling.
    InProgress,
}

/// Set of identities currently pairing. Cheap to clone.
#[derive(Debug, Clone, Default)]
pub struct PairingAttempts {
    attempts: Arc<Mutex<HashMap<Identity, PairingAttempt>>>,
}

impl PairingAttempts {
    /// Creates an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserves `identity` for a new attempt unless a live one already exists.
    ///
    /// An attempt whose code has expired is replaced.
    pub async fn reserve(&self, identity: &Identity) -> Reservation {
        let mut attempts = self.attempts.lock().await;
        let now = Instant::now();
        if let Some(attempt) = attempts.get(identity) {
            match (&attempt.issued, attempt.code_deadline) {
                (None, _) => return Reservation::InProgress,
                (Some(code), Some(deadline)) if now < deadline => {
                    return Reservation::Issued(code.reissued(deadline - now));
                }
                _ => {}
            }
        }

        match attempts.insert(identity.clone(), PairingAttempt::new(identity.clone())) {
            Some(expired) => Reservation::Superseded(expired),
            None => Reservation::Reserved,
        }
    }

    /// Attaches the unregistered session. Returns false if the attempt is gone.
    pub async fn attach(
        &self,
        identity: &Identity,
        session: Arc<dyn ProtocolSession>,
        connection_id: u64,
    ) -> bool {
        let mut attempts = self.attempts.lock().await;
        match attempts.get_mut(identity) {
            Some(attempt) => {
                attempt.session = Some(session);
                attempt.connection_id = Some(connection_id);
                true
            }
            None => false,
        }
    }

    /// Records the issued code on the attempt from `connection_id`.
    pub async fn record_code(
        &self,
        identity: &Identity,
        connection_id: u64,
        code: LinkingCode,
    ) -> bool {
        let mut attempts = self.attempts.lock().await;
        match attempts.get_mut(identity) {
            Some(attempt) if attempt.connection_id == Some(connection_id) => {
                attempt.code_deadline = Some(Instant::now() + code.valid_for);
                attempt.issued = Some(code);
                true
            }
            _ => false,
        }
    }

    /// Whether the attempt from `connection_id` is still current.
    pub async fn is_current(&self, identity: &Identity, connection_id: u64) -> bool {
        self.attempts
            .lock()
            .await
            .get(identity)
            .is_some_and(|a| a.connection_id == Some(connection_id))
    }

    /// Removes the attempt regardless of its connection.
    pub async fn take(&self, identity: &Identity) -> Option<PairingAttempt> {
        self.attempts.lock().await.remove(identity)
    }

    /// Removes the attempt only if it belongs to `connection_id`.
    pub async fn take_if(&self, identity: &Identity, connection_id: u64) -> Option<PairingAttempt> {
        let mut attempts = self.attempts.lock().await;
        match attempts.get(identity) {
            Some(a) if a.connection_id == Some(connection_id) => attempts.remove(identity),
            _ => None,
        }
    }

    /// Whether `identity` is mid-pairing.
    pub async fn contains(&self, identity: &Identity) -> bool {
        self.attempts.lock().await.contains_key(identity)
    }

    /// Identities currently pairing, sorted.
    pub async fn list(&self) -> Vec<Identity> {
        let mut ids: Vec<Identity> = self.attempts.lock().await.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Removes every attempt.
    pub async fn drain(&self) -> Vec<PairingAttempt> {
        self.attempts
            .lock()
            .await
            .drain()
            .map(|(_, a)| a)
            .collect()
    }
}

/// Message sent to the account's own address once pairing completes.
pub fn confirmation_text(identity: &Identity, display_name: &str) -> String {
    format!(
        "Device paired successfully!\n\n\
         Number: {}\n\
         Bot: {}\n\
         Status: active",
        identity, display_name
    )
}
