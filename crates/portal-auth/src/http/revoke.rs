//! Token revocation endpoint handler (RFC 7009).
//!
//! # Request Format
//!
//! ```text
//! POST /a/revoke
//! Content-Type: application/x-www-form-urlencoded
//! Authorization: Basic <client_credentials>
//!
//! token=<token_to_revoke>
//! ```
//!
//! # Response
//!
//! 200 OK whether or not the token was live. 400 `unauthorized_client` when
//! the token belongs to another client.

use std::sync::Arc;

use axum::{
    Form,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};

use super::{basic_credentials, oauth_error_response};
use crate::oauth::{RequestParams, authenticate_client, revoke};
use crate::storage::ClientStorage;
use crate::token::TokenHandler;

// =============================================================================
// State Types
// =============================================================================

/// State required for the revocation endpoint.
#[derive(Clone)]
pub struct RevokeState {
    /// Token lifecycle.
    pub handler: TokenHandler,
    /// Client storage for authentication.
    pub client_storage: Arc<dyn ClientStorage>,
}

impl RevokeState {
    /// Creates a new revocation state.
    pub fn new(handler: TokenHandler, client_storage: Arc<dyn ClientStorage>) -> Self {
        Self {
            handler,
            client_storage,
        }
    }
}

// =============================================================================
// Handler
// =============================================================================

/// Token revocation endpoint handler.
///
/// # Response
///
/// - 200 OK: Token revoked (or was already invalid/revoked)
/// - 400 Bad Request: Missing token parameter, or token owned by another client
/// - 401 Unauthorized: Invalid client credentials
pub async fn revoke_handler(
    State(state): State<RevokeState>,
    headers: HeaderMap,
    Form(pairs): Form<Vec<(String, String)>>,
) -> Response {
    let params = RequestParams::new(pairs);

    let client = match authenticate_client(
        basic_credentials(&headers),
        &params,
        state.client_storage.as_ref(),
    )
    .await
    {
        Ok(authenticated) => authenticated.client,
        Err(e) => {
            tracing::debug!(error = %e, "Revocation: client authentication failed");
            return oauth_error_response(&e);
        }
    };

    let token = match params.required("token") {
        Ok(token) => token,
        Err(e) => return oauth_error_response(&e),
    };

    match revoke(&state.handler, &client.client_id, token).await {
        Ok(()) => StatusCode::OK.into_response(),
        Err(e) => {
            if e.is_server_error() {
                tracing::error!(client_id = %client.client_id, error = %e, "Revocation failed");
            }
            oauth_error_response(&e)
        }
    }
}
