//! Key set endpoint handler (`/a/keys`).
//!
//! Publishes the public half of the ID token signing key so relying parties
//! can verify ID tokens.
//!
//! # References
//!
//! - [RFC 7517 - JSON Web Key](https://tools.ietf.org/html/rfc7517)

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::http::header;
use axum::response::IntoResponse;

use crate::token::JwtService;

/// Media type of a JWK Set document.
pub const JWK_SET_CONTENT_TYPE: &str = "application/jwk-set+json";

/// State for the key set endpoint.
#[derive(Clone)]
pub struct JwksState {
    /// The JWT service holding the signing key.
    pub jwt_service: Arc<JwtService>,
}

impl JwksState {
    /// Creates a new JWKS state.
    pub fn new(jwt_service: Arc<JwtService>) -> Self {
        Self { jwt_service }
    }
}

/// Handler for `GET /a/keys`.
///
/// # Example Response
///
/// ```json
/// {
///   "keys": [
///     {
///       "kty": "RSA",
///       "use": "sig",
///       "alg": "RS256",
///       "kid": "key-1",
///       "n": "base64url-encoded-modulus",
///       "e": "AQAB"
///     }
///   ]
/// }
/// ```
pub async fn jwks_handler(State(state): State<JwksState>) -> impl IntoResponse {
    let jwks = state.jwt_service.jwks();
    (
        [
            (header::CONTENT_TYPE, JWK_SET_CONTENT_TYPE),
            (header::CACHE_CONTROL, "public, max-age=3600"),
        ],
        Json(jwks),
    )
}
