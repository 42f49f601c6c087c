//! Authorization endpoint handlers (`/a/auth`, `/a/auth/approve`).
//!
//! # Flow
//!
//! ```text
//! GET|POST /a/auth?client_id=...&redirect_uri=...&response_type=code&scope=openid...
//!     │
//!     ├─► untrusted client or redirect_uri → 400 text/plain
//!     ├─► no session → 303 to the login page (continue/cancel URLs)
//!     ├─► consent needed → consent page
//!     │       └─► POST /a/auth/approve (same origin only) → record consent → 303 with code
//!     └─► already authorized → 303 to redirect_uri with code and state
//! ```
//!
//! The browser session is the serialized session token in a cookie. Every
//! request that carries a live session renews it and re-sets the cookie.

use axum::Form;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{Html, IntoResponse, Redirect, Response};
use axum_extra::extract::CookieJar;
use cookie::{Cookie, SameSite};
use time::Duration;

use super::authorize_templates::{render_consent_form, render_error_page};
use super::origin::{is_same_origin, origin_of};
use crate::AuthResult;
use crate::config::SessionConfig;
use crate::oauth::{AuthorizationService, AuthorizeOutcome, RequestParams};
use crate::token::{SidToken, TokenHandler};

/// State for the authorization endpoint.
#[derive(Clone)]
pub struct AuthorizeState {
    handler: TokenHandler,
    service: AuthorizationService,
    session_config: SessionConfig,
    origin: url::Origin,
}

impl AuthorizeState {
    /// Creates a new authorization endpoint state.
    ///
    /// Consent approvals are accepted only from the origin of `issuer`.
    pub fn new(
        handler: TokenHandler,
        service: AuthorizationService,
        session_config: SessionConfig,
        issuer: &str,
    ) -> Self {
        Self {
            handler,
            service,
            session_config,
            origin: origin_of(issuer),
        }
    }
}

#[derive(Clone, Copy)]
enum Step {
    Authorize,
    Approve,
}

/// GET /a/auth handler.
pub async fn authorize_get(
    State(state): State<AuthorizeState>,
    jar: CookieJar,
    Query(pairs): Query<Vec<(String, String)>>,
) -> Response {
    handle(&state, jar, RequestParams::new(pairs), Step::Authorize).await
}

/// POST /a/auth handler (form-encoded authorization request).
pub async fn authorize_post(
    State(state): State<AuthorizeState>,
    jar: CookieJar,
    Form(pairs): Form<Vec<(String, String)>>,
) -> Response {
    handle(&state, jar, RequestParams::new(pairs), Step::Authorize).await
}

/// POST /a/auth/approve handler (consent form submission).
pub async fn approve_handler(
    State(state): State<AuthorizeState>,
    jar: CookieJar,
    headers: HeaderMap,
    Form(pairs): Form<Vec<(String, String)>>,
) -> Response {
    if !is_same_origin(&headers, &state.origin) {
        tracing::warn!("Rejected consent approval from a foreign origin");
        return (
            StatusCode::BAD_REQUEST,
            [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            "invalid_origin",
        )
            .into_response();
    }
    handle(&state, jar, RequestParams::new(pairs), Step::Approve).await
}

async fn handle(
    state: &AuthorizeState,
    jar: CookieJar,
    params: RequestParams,
    step: Step,
) -> Response {
    let (jar, session) = match resume_session(state, jar).await {
        Ok(resumed) => resumed,
        Err(e) => {
            tracing::error!(error = %e, "Failed to load browser session");
            return server_error();
        }
    };

    let outcome = match step {
        Step::Authorize => state.service.authorize(&params, session.as_ref()).await,
        Step::Approve => state.service.approve(&params, session.as_ref()).await,
    };

    let response = match outcome {
        Ok(AuthorizeOutcome::Redirect(url)) => Redirect::to(&url).into_response(),
        Ok(AuthorizeOutcome::Reject(e)) => (
            StatusCode::BAD_REQUEST,
            [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            e.oauth_error_code(),
        )
            .into_response(),
        Ok(AuthorizeOutcome::Consent(prompt)) => (
            [
                (header::CACHE_CONTROL, "no-store"),
                (header::X_FRAME_OPTIONS, "DENY"),
            ],
            Html(render_consent_form(&prompt)),
        )
            .into_response(),
        Err(e) => {
            tracing::error!(error = %e, "Authorization request failed");
            return server_error();
        }
    };

    (jar, response).into_response()
}

/// Resolves the session cookie and renews the session it names.
///
/// A cookie naming no live session is cleared.
async fn resume_session(
    state: &AuthorizeState,
    jar: CookieJar,
) -> AuthResult<(CookieJar, Option<SidToken>)> {
    let cookie_name = state.session_config.cookie_name.clone();
    let Some(serial) = jar.get(&cookie_name).map(|c| c.value().to_string()) else {
        return Ok((jar, None));
    };

    let renewed = match state.handler.get_checked_token::<SidToken>(&serial).await? {
        Some(sid) => state.handler.renew_sid_token(&sid).await?,
        None => None,
    };
    let Some(sid) = renewed else {
        tracing::debug!("Session cookie names no live session");
        return Ok((jar.remove(Cookie::build((cookie_name, "")).path("/")), None));
    };

    let serial = state.handler.serialize(&sid.meta)?;
    let max_age = Duration::seconds(state.handler.lifetimes().sid_token.as_secs() as i64);
    let cookie = session_cookie(&state.session_config, serial, max_age);
    Ok((jar.add(cookie), Some(sid)))
}

/// Create the browser session cookie.
fn session_cookie(config: &SessionConfig, serial: String, max_age: Duration) -> Cookie<'static> {
    Cookie::build((config.cookie_name.clone(), serial))
        .http_only(true)
        .secure(config.secure_cookie)
        .same_site(SameSite::Lax)
        .path("/")
        .max_age(max_age)
        .build()
}

fn server_error() -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Html(render_error_page(
            "server_error",
            "The authorization server encountered an unexpected condition",
        )),
    )
        .into_response()
}
