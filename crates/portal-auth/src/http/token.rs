//! OAuth 2.0 token endpoint handler (`/a/token`).
//!
//! Supports the `authorization_code` and `refresh_token` grants.
//!
//! # Example
//!
//! ```text
//! POST /a/token
//! Content-Type: application/x-www-form-urlencoded
//! Authorization: Basic <base64(client_id:client_secret)>
//!
//! grant_type=authorization_code
//! &code=eyJpZCI6Ii4uLiJ9
//! &redirect_uri=https://app.example.com/callback
//! ```

use std::sync::Arc;

use axum::{
    Form, Json,
    extract::State,
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use tracing::{debug, error};

use super::{basic_credentials, no_store, oauth_error_response};
use crate::error::AuthError;
use crate::oauth::{RequestParams, TokenResponse, TokenService, authenticate_client};
use crate::storage::ClientStorage;

/// State required for the token endpoint.
#[derive(Clone)]
pub struct TokenState {
    /// Grant exchange.
    token_service: TokenService,
    /// Client storage for authenticating clients.
    client_storage: Arc<dyn ClientStorage>,
}

impl TokenState {
    /// Creates a new token state.
    pub fn new(token_service: TokenService, client_storage: Arc<dyn ClientStorage>) -> Self {
        Self {
            token_service,
            client_storage,
        }
    }
}

/// OAuth 2.0 token endpoint handler.
///
/// Clients authenticate with HTTP Basic or with `client_id` and
/// `client_secret` form fields. Failures are JSON `{error, error_description}`:
/// 401 with `WWW-Authenticate: Basic` for `invalid_client`, 500 for server
/// errors, 400 otherwise.
pub async fn token_handler(
    State(state): State<TokenState>,
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
            debug!(error = %e, "Token request: client authentication failed");
            return token_error_response(&e);
        }
    };

    match state.token_service.exchange(&client, &params).await {
        Ok(response) => token_success_response(response),
        Err(e) => {
            if e.is_server_error() {
                error!(client_id = %client.client_id, error = %e, "Token request failed");
            } else {
                debug!(client_id = %client.client_id, error = %e, "Token request rejected");
            }
            token_error_response(&e)
        }
    }
}

/// Build a successful token response.
fn token_success_response(response: TokenResponse) -> Response {
    (
        StatusCode::OK,
        [
            ("Content-Type", "application/json"),
            ("Cache-Control", "no-store"),
            ("Pragma", "no-cache"),
        ],
        Json(response),
    )
        .into_response()
}

/// Build an error response for token endpoint.
fn token_error_response(error: &AuthError) -> Response {
    let mut response = oauth_error_response(error);
    response
        .headers_mut()
        .insert(header::PRAGMA, HeaderValue::from_static("no-cache"));
    no_store(response)
}
