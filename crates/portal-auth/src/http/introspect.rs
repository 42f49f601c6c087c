//! Token introspection endpoint handler (`/a/tokeninfo`).
//!
//! Only registered clients may introspect, and each sees nothing but its own
//! scopes. Every token the caller may not learn about is answered with
//! `{"active": false}` and status 200.

use std::sync::Arc;

use axum::{
    Form, Json,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};

use super::{basic_credentials, no_store, oauth_error_response};
use crate::oauth::{IntrospectionService, RequestParams, authenticate_client};
use crate::storage::ClientStorage;

/// State required for the introspection endpoint.
#[derive(Clone)]
pub struct IntrospectState {
    introspection: IntrospectionService,
    client_storage: Arc<dyn ClientStorage>,
}

impl IntrospectState {
    /// Creates a new introspection state.
    pub fn new(introspection: IntrospectionService, client_storage: Arc<dyn ClientStorage>) -> Self {
        Self {
            introspection,
            client_storage,
        }
    }
}

/// Handler for `POST /a/tokeninfo`.
pub async fn introspect_handler(
    State(state): State<IntrospectState>,
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
            tracing::debug!(error = %e, "Introspection: client authentication failed");
            return no_store(oauth_error_response(&e));
        }
    };

    let token = match params.optional("token") {
        Ok(token) => token,
        Err(e) => return no_store(oauth_error_response(&e)),
    };

    match state.introspection.introspect(&client.client_id, token).await {
        Ok(response) => no_store((StatusCode::OK, Json(response)).into_response()),
        Err(e) => {
            tracing::error!(client_id = %client.client_id, error = %e, "Introspection failed");
            no_store(oauth_error_response(&e))
        }
    }
}
