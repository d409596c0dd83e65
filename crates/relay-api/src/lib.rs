//! HTTP API for the messaging relay.
//!
//! Exposes the [`SessionManager`](relay_runtime::SessionManager) over JSON:
//! - Sessions: start, stop, send, status, list
//! - Pairing: request a linking code, pairing status, unpair
//! - Health and an endpoint index
//!
//! # Example
//!
//! ```ignore
//! use relay_api::{serve, ApiConfig, AppState};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let state = AppState::new(ApiConfig::default(), manager);
//!     serve(state, async { let _ = tokio::signal::ctrl_c().await; }).await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod handlers;
pub mod router;
pub mod state;
pub mod types;

pub use config::ApiConfig;
pub use error::{ApiError, Result};
pub use router::{create_router, serve};
pub use state::AppState;
