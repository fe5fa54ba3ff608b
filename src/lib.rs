//! Multi-channel identity and session-authentication core.
//!
//! Identities authenticate over three channels (phone passwordless, email
//! passwordless, username/password device accounts) and receive sessions
//! materialized as bearer tokens or cookies. Email verification runs through
//! single-use flows; TOTP, when enabled on an identity, gates session
//! issuance. Everything here is in-process: the store, flow registry, and
//! session registry are dashmap-backed, and transport concerns stay behind
//! the `CodeDelivery` seam.

pub mod config;
pub mod delivery;
pub mod error;
pub mod flows;
pub mod models;
pub mod policy;
pub mod security;
pub mod services;
pub mod sessions;
pub mod store;
pub mod validators;

pub use config::Settings;
pub use error::{AuthError, Result};
pub use flows::VerificationFlowManager;
pub use policy::ChannelPolicy;
pub use sessions::SessionIssuer;
pub use store::{IdentityStore, MemoryIdentityStore};
