//! Core data models for the messaging relay.
//!
//! This crate provides the fundamental data types shared by every relay
//! component: normalized identities, opaque credential blobs, inbound and
//! outbound message shapes, and the closed set of session events that
//! protocol transports translate their raw notifications into.

pub mod credentials;
pub mod event;
pub mod identity;
pub mod message;

// Re-export main types
pub use credentials::CredentialBlob;
pub use event::{ConnectionState, DisconnectCause, SessionEvent};
pub use identity::{
    address_number, is_group_address, normalize, user_address, Identity, IdentityError,
    GROUP_ADDRESS_SUFFIX, MIN_IDENTITY_DIGITS, USER_ADDRESS_SUFFIX,
};
pub use message::{InboundMessage, MessageContent, OutboundContent};
