//! In-memory storage backend for the Portal authorization server.
//!
//! Implements every storage trait of `portal-auth` on process-local maps.
//! Nothing survives a restart; the backend serves development setups and
//! tests.
//!
//! # Example
//!
//! ```ignore
//! use portal_auth::Repositories;
//! use portal_auth_memory::MemoryBackend;
//!
//! let backend = MemoryBackend::new();
//! let repos: Repositories = backend.repositories();
//! ```

pub mod authorization;
pub mod client;
pub mod jti;
pub mod scope;
pub mod token;

use std::sync::Arc;

use portal_auth::Repositories;

pub use authorization::InMemoryAuthorizationStorage;
pub use client::InMemoryClientStorage;
pub use jti::InMemoryJtiStorage;
pub use scope::InMemoryScopeStorage;
pub use token::InMemoryTokenStorage;

/// Every in-memory store, shared behind `Arc`s.
#[derive(Clone, Default)]
pub struct MemoryBackend {
    /// Issued tokens.
    pub tokens: Arc<InMemoryTokenStorage>,
    /// Replay guard entries.
    pub jti: Arc<InMemoryJtiStorage>,
    /// Consent records.
    pub authorizations: Arc<InMemoryAuthorizationStorage>,
    /// Client registrations.
    pub clients: Arc<InMemoryClientStorage>,
    /// Scope definitions.
    pub scopes: Arc<InMemoryScopeStorage>,
}

impl MemoryBackend {
    /// Creates an empty backend.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the repositories the OAuth endpoints run on.
    pub fn repositories(&self) -> Repositories {
        Repositories {
            tokens: self.tokens.clone(),
            clients: self.clients.clone(),
            scopes: self.scopes.clone(),
            authorizations: self.authorizations.clone(),
        }
    }
}
