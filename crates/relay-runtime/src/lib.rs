//! Session lifecycle runtime for the messaging relay.
//!
//! This crate owns every piece of live state in the relay:
//! - `SessionRegistry` - identity to live protocol session
//! - `PairingAttempts` - identities mid-registration
//! - `ReconnectSupervisor` - retry bookkeeping and cancellable restarts
//! - `SessionManager` - the entry point combining all of the above
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use relay_persistence::FileCredentialStore;
//! use relay_runtime::{GatewayClient, PairingOutcome, RuntimeConfig, SessionManager};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = Arc::new(GatewayClient::new("http://127.0.0.1:3000")?);
//!     let store = Arc::new(FileCredentialStore::new("./sessions"));
//!     let manager = SessionManager::new(RuntimeConfig::default(), client, store, handler);
//!
//!     // Subscribe to lifecycle events
//!     let mut events = manager.subscribe();
//!
//!     match manager.begin_pairing("+94 741 856 766").await? {
//!         PairingOutcome::Code(code) => println!("enter {} on your phone", code.code),
//!         PairingOutcome::AlreadyRegistered { .. } => println!("already paired"),
//!     }
//!
//!     tokio::signal::ctrl_c().await?;
//!     manager.shutdown().await;
//!     Ok(())
//! }
//! ```
//!
//! # Key Concepts
//!
//! ## Session events
//!
//! Every connection gets exactly one consumer task that handles its
//! `SessionEvent`s strictly in the order the transport produced them:
//! credential updates are persisted, connection changes drive the registry
//! and the supervisor, inbound messages go to the `MessageHandler`.
//!
//! ## Reconnection
//!
//! A non-logout closure removes the session from the registry immediately and
//! schedules a restart according to the `RetryPolicy`. An explicit stop
//! cancels the pending restart; a restart that fires anyway re-checks the
//! registry and the stop flag before reconnecting.

pub mod config;
pub mod error;
pub mod event;
pub mod gateway;
pub mod handler;
pub mod manager;
pub mod pairing;
pub mod registry;
pub mod retry;
pub mod supervisor;
pub mod transport;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

pub use config::RuntimeConfig;
pub use error::{RelayError, Result};
pub use event::LifecycleEvent;
pub use gateway::GatewayClient;
pub use handler::{HandlerError, MessageHandler};
pub use manager::{PairingStatus, SessionManager, SessionStatus, StartOutcome, StopOutcome};
pub use pairing::{LinkingCode, PairingAttempt, PairingAttempts, PairingOutcome};
pub use registry::{SessionRecord, SessionRegistry};
pub use retry::RetryPolicy;
pub use supervisor::{ReconnectDecision, ReconnectSupervisor};
pub use transport::{Connection, ProtocolClient, ProtocolSession, TransportError};
