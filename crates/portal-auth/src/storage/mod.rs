//! Storage traits for authorization server data.
//!
//! This module defines storage interfaces for:
//!
//! - Issued tokens (sessions, codes, access and refresh tokens, account links)
//! - Used assertion ids (replay guard)
//! - Consent records
//! - Client registrations and scopes
//!
//! # Implementations
//!
//! - `portal-auth-memory` - in-process backend

pub mod authorization;
pub mod client;
pub mod jti;
pub mod scope;
pub mod token;

pub use authorization::AuthorizationStorage;
pub use client::ClientStorage;
pub use jti::JtiStorage;
pub use scope::ScopeStorage;
pub use token::TokenStorage;
