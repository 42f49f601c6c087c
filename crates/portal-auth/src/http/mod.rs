//! HTTP handlers for the OAuth 2.0 / OpenID Connect endpoints.
//!
//! # Available Handlers
//!
//! - [`authorize`] - Authorization endpoint and consent approval (`/a/auth`)
//! - [`token`] - Token endpoint (`/a/token`)
//! - [`introspect`] - Token introspection for data providers (`/a/tokeninfo`)
//! - [`revoke`] - Token revocation, RFC 7009 (`/a/revoke`)
//! - [`jwks`] - ID token verification keys (`/a/keys`)

pub mod authorize;
pub mod authorize_templates;
pub mod introspect;
pub mod jwks;
pub mod origin;
pub mod revoke;
pub mod token;

use std::sync::Arc;

use axum::http::{HeaderMap, HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};

use crate::clock::Clock;
use crate::config::AuthConfig;
use crate::error::AuthError;
use crate::oauth::{
    APPROVE_PATH, AUTHORIZE_PATH, AuthorizationService, IntrospectionService, TokenError,
    TokenService, parse_basic_auth,
};
use crate::storage::{AuthorizationStorage, ClientStorage, ScopeStorage, TokenStorage};
use crate::token::{JwtService, TokenHandler};

pub use authorize::{AuthorizeState, approve_handler, authorize_get, authorize_post};
pub use introspect::{IntrospectState, introspect_handler};
pub use jwks::{JwksState, jwks_handler};
pub use revoke::{RevokeState, revoke_handler};
pub use token::{TokenState, token_handler};

/// Token endpoint path.
pub const TOKEN_PATH: &str = "/a/token";

/// Introspection endpoint path.
pub const INTROSPECT_PATH: &str = "/a/tokeninfo";

/// Revocation endpoint path.
pub const REVOKE_PATH: &str = "/a/revoke";

/// Key set endpoint path.
pub const KEYS_PATH: &str = "/a/keys";

/// Storage backends the endpoints run on.
#[derive(Clone)]
pub struct Repositories {
    /// Issued tokens.
    pub tokens: Arc<dyn TokenStorage>,
    /// Client registrations.
    pub clients: Arc<dyn ClientStorage>,
    /// Scope definitions.
    pub scopes: Arc<dyn ScopeStorage>,
    /// Consent records.
    pub authorizations: Arc<dyn AuthorizationStorage>,
}

/// State of every OAuth endpoint.
#[derive(Clone)]
pub struct OAuthState {
    /// Authorization endpoint and consent approval.
    pub authorize: AuthorizeState,
    /// Token endpoint.
    pub token: TokenState,
    /// Introspection endpoint.
    pub introspect: IntrospectState,
    /// Revocation endpoint.
    pub revoke: RevokeState,
    /// Key set endpoint.
    pub jwks: JwksState,
}

impl OAuthState {
    /// Wires the protocol services onto one token handler.
    #[must_use]
    pub fn new(
        config: &AuthConfig,
        clock: Arc<dyn Clock>,
        jwt: Arc<JwtService>,
        repos: Repositories,
    ) -> Self {
        let handler = TokenHandler::new(repos.tokens.clone(), clock, config.tokens.clone());

        let authorization_service = AuthorizationService::new(
            handler.clone(),
            repos.clients.clone(),
            repos.scopes.clone(),
            repos.authorizations.clone(),
            jwt.clone(),
            config.session.login_url.clone(),
        );

        Self {
            authorize: AuthorizeState::new(
                handler.clone(),
                authorization_service,
                config.session.clone(),
                &config.issuer,
            ),
            token: TokenState::new(
                TokenService::new(handler.clone(), jwt.clone()),
                repos.clients.clone(),
            ),
            introspect: IntrospectState::new(
                IntrospectionService::new(handler.clone(), repos.scopes.clone()),
                repos.clients.clone(),
            ),
            revoke: RevokeState::new(handler, repos.clients),
            jwks: JwksState::new(jwt),
        }
    }
}

/// Creates the router for every OAuth endpoint.
pub fn oauth_routes(state: OAuthState) -> Router {
    Router::new()
        .route(AUTHORIZE_PATH, get(authorize_get).post(authorize_post))
        .route(APPROVE_PATH, post(approve_handler))
        .with_state(state.authorize)
        .merge(
            Router::new()
                .route(TOKEN_PATH, post(token_handler))
                .with_state(state.token),
        )
        .merge(
            Router::new()
                .route(INTROSPECT_PATH, post(introspect_handler))
                .with_state(state.introspect),
        )
        .merge(
            Router::new()
                .route(REVOKE_PATH, post(revoke_handler))
                .with_state(state.revoke),
        )
        .merge(
            Router::new()
                .route(KEYS_PATH, get(jwks_handler))
                .with_state(state.jwks),
        )
}

/// Extracts HTTP Basic credentials from the `Authorization` header.
fn basic_credentials(headers: &HeaderMap) -> Option<(String, String)> {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(parse_basic_auth)
}

/// JSON `{error, error_description}` body with the status of its error code.
///
/// `invalid_client` carries a `WWW-Authenticate: Basic` challenge.
fn oauth_error_response(error: &AuthError) -> Response {
    let body = TokenError::from(error);
    let status =
        StatusCode::from_u16(body.error.http_status()).unwrap_or(StatusCode::BAD_REQUEST);
    let mut response = (status, Json(body)).into_response();
    if status == StatusCode::UNAUTHORIZED {
        response
            .headers_mut()
            .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Basic"));
    }
    response
}

/// Marks a response as not cacheable.
fn no_store(mut response: Response) -> Response {
    response
        .headers_mut()
        .insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
    response
}
