//! # portal-auth
//!
//! OAuth 2.0 / OpenID Connect authorization server core for the Portal.
//!
//! This crate provides:
//! - The token model and its opaque wire format
//! - The token lifecycle (issue, check, renew, cascade revocation)
//! - A replay guard for signed assertions
//! - ID token signing and the published key set
//! - The authorization, token, introspection and revocation endpoints
//!
//! ## Overview
//!
//! Every token is stored server side and handed out as an opaque string. A
//! token is only as good as the repository says: the string carries a lookup
//! key derived from the token id and a secret that is never stored, so a
//! leaked repository cannot be turned back into bearer strings.
//!
//! ## Modules
//!
//! - [`config`] - Token lifetimes, signing key and session settings
//! - [`token`] - Token model, codec, handler, replay guard and ID tokens
//! - [`oauth`] - Protocol logic of each endpoint
//! - [`http`] - Axum handlers and router for the endpoints
//! - [`storage`] - Storage traits the core runs on
//! - [`types`] - Clients and scopes
//! - [`clock`] - Injected time source

pub mod client_secret;
pub mod clock;
pub mod config;
pub mod error;
pub mod http;
pub mod oauth;
pub mod storage;
pub mod token;
pub mod types;

#[cfg(test)]
mod testing;

pub use clock::{Clock, FixedClock, SystemClock};
pub use config::{AuthConfig, ConfigError, SessionConfig, SigningConfig, TokenLifetimes};
pub use error::{AuthError, ErrorCategory};
pub use http::{OAuthState, Repositories, oauth_routes};
pub use storage::{AuthorizationStorage, ClientStorage, JtiStorage, ScopeStorage, TokenStorage};
pub use token::{JwtService, ReplayGuard, SigningKeyPair, TokenHandler};
pub use types::{Client, GrantType, Scope};

/// Type alias for authentication/authorization results.
pub type AuthResult<T> = Result<T, AuthError>;

/// Prelude module for convenient imports.
///
/// ```ignore
/// use portal_auth::prelude::*;
/// ```
pub mod prelude {
    pub use crate::AuthResult;
    pub use crate::clock::{Clock, FixedClock, SystemClock};
    pub use crate::config::{AuthConfig, ConfigError, SessionConfig, TokenLifetimes};
    pub use crate::error::{AuthError, ErrorCategory};
    pub use crate::http::{OAuthState, Repositories, oauth_routes};
    pub use crate::oauth::{
        AuthorizationService, AuthorizeOutcome, IntrospectionResponse, IntrospectionService,
        RequestParams, TokenResponse, TokenService,
    };
    pub use crate::storage::{
        AuthorizationStorage, ClientStorage, JtiStorage, ScopeStorage, TokenStorage,
    };
    pub use crate::token::{
        AccessToken, AuthorizationCode, CheckedToken, JwtService, RefreshToken, ReplayGuard,
        SidToken, SigningKeyPair, Token, TokenHandler, TokenMeta,
    };
    pub use crate::types::{Client, GrantType, Scope};
}
