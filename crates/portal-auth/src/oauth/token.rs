//! Token endpoint types and grant exchange.
//!
//! # Supported Grant Types
//!
//! - `authorization_code` - Exchange an authorization code for an access
//!   token and an ID token, plus a refresh token when `offline_access` was
//!   granted
//! - `refresh_token` - Mint a new access token, optionally with narrower
//!   scopes; the refresh token stays valid
//!
//! Absent, expired, consumed and foreign codes or refresh tokens all fail
//! with the same `invalid_token` outcome.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::AuthResult;
use crate::error::AuthError;
use crate::oauth::params::RequestParams;
use crate::oauth::pkce::verify_code_verifier;
use crate::token::{
    AccessToken, AuthorizationCode, GrantSource, IdTokenClaims, JwtService, RefreshToken,
    TokenHandler,
};
use crate::types::{Client, GrantType, OFFLINE_ACCESS, join_scopes, parse_scope_param};

/// Token request parameters.
///
/// Which fields are required depends on the `grant_type`:
///
/// - `authorization_code`: code, redirect_uri, code_verifier (with PKCE)
/// - `refresh_token`: refresh_token, (optional) scope
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TokenRequest {
    /// OAuth 2.0 grant type.
    pub grant_type: String,

    /// Authorization code (for authorization_code grant).
    #[serde(default)]
    pub code: Option<String>,

    /// Redirect URI (must match authorization request).
    #[serde(default)]
    pub redirect_uri: Option<String>,

    /// PKCE code verifier (for authorization_code grant).
    #[serde(default)]
    pub code_verifier: Option<String>,

    /// Refresh token (for refresh_token grant).
    #[serde(default)]
    pub refresh_token: Option<String>,

    /// Requested scope (for refresh_token grant, must be subset of original).
    #[serde(default)]
    pub scope: Option<String>,
}

impl TokenRequest {
    /// Reads a token request from form parameters.
    ///
    /// # Errors
    ///
    /// Returns `InvalidRequest` if `grant_type` is missing or any parameter
    /// is repeated.
    pub fn from_params(params: &RequestParams) -> AuthResult<Self> {
        Ok(Self {
            grant_type: params.required("grant_type")?.to_string(),
            code: params.optional_owned("code")?,
            redirect_uri: params.optional_owned("redirect_uri")?,
            code_verifier: params.optional_owned("code_verifier")?,
            refresh_token: params.optional_owned("refresh_token")?,
            scope: params.optional_owned("scope")?,
        })
    }
}

/// Successful token response.
///
/// # Example Response
///
/// ```json
/// {
///   "access_token": "eyJpZCI6...",
///   "token_type": "Bearer",
///   "expires_in": 3600,
///   "scope": "openid profile",
///   "id_token": "eyJhbGciOiJSUzI1NiIs..."
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenResponse {
    /// The opaque access token.
    pub access_token: String,

    /// Token type, always "Bearer".
    pub token_type: String,

    /// Access token lifetime in seconds.
    pub expires_in: u64,

    /// Granted scopes (space-separated).
    pub scope: String,

    /// Refresh token, when `offline_access` was granted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,

    /// Signed OpenID Connect ID token.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id_token: Option<String>,
}

impl TokenResponse {
    /// Creates a new token response with required fields.
    #[must_use]
    pub fn new(access_token: String, expires_in: u64, scope: String) -> Self {
        Self {
            access_token,
            token_type: "Bearer".to_string(),
            expires_in,
            scope,
            refresh_token: None,
            id_token: None,
        }
    }

    /// Sets the refresh token.
    #[must_use]
    pub fn with_refresh_token(mut self, token: String) -> Self {
        self.refresh_token = Some(token);
        self
    }

    /// Sets the ID token.
    #[must_use]
    pub fn with_id_token(mut self, token: String) -> Self {
        self.id_token = Some(token);
        self
    }
}

/// Token endpoint error response.
///
/// ```json
/// {
///   "error": "invalid_token",
///   "error_description": "Invalid authorization code"
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenError {
    /// OAuth 2.0 error code.
    pub error: TokenErrorCode,

    /// Human-readable error description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_description: Option<String>,
}

impl TokenError {
    /// Creates a new token error.
    #[must_use]
    pub fn new(error: TokenErrorCode) -> Self {
        Self {
            error,
            error_description: None,
        }
    }

    /// Creates a new token error with description.
    #[must_use]
    pub fn with_description(error: TokenErrorCode, description: impl Into<String>) -> Self {
        Self {
            error,
            error_description: Some(description.into()),
        }
    }

    /// Creates an invalid_request error.
    #[must_use]
    pub fn invalid_request(description: impl Into<String>) -> Self {
        Self::with_description(TokenErrorCode::InvalidRequest, description)
    }

    /// Creates an invalid_client error.
    #[must_use]
    pub fn invalid_client(description: impl Into<String>) -> Self {
        Self::with_description(TokenErrorCode::InvalidClient, description)
    }
}

impl From<&AuthError> for TokenError {
    fn from(err: &AuthError) -> Self {
        let code = match err {
            AuthError::InvalidClient { .. } => TokenErrorCode::InvalidClient,
            AuthError::InvalidGrant { .. } => TokenErrorCode::InvalidGrant,
            AuthError::InvalidToken { .. } => TokenErrorCode::InvalidToken,
            AuthError::InvalidScope { .. } => TokenErrorCode::InvalidScope,
            AuthError::UnauthorizedClient { .. } => TokenErrorCode::UnauthorizedClient,
            AuthError::UnsupportedGrantType { .. } => TokenErrorCode::UnsupportedGrantType,
            e if e.is_server_error() => TokenErrorCode::ServerError,
            _ => TokenErrorCode::InvalidRequest,
        };
        Self {
            error: code,
            error_description: err.public_description(),
        }
    }
}

/// OAuth 2.0 token error codes.
///
/// Defined in RFC 6749 Section 5.2, plus `invalid_token` for codes and
/// refresh tokens that cannot be used by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenErrorCode {
    /// Missing, repeated or malformed parameter.
    InvalidRequest,

    /// Client authentication failed.
    InvalidClient,

    /// PKCE verification failed.
    InvalidGrant,

    /// The code or refresh token is absent, expired, consumed, or bound to
    /// another client.
    InvalidToken,

    /// The caller may not act on this token.
    UnauthorizedClient,

    /// The grant type is not supported.
    UnsupportedGrantType,

    /// The requested scope exceeds the original grant.
    InvalidScope,

    /// Unexpected failure on the server.
    ServerError,
}

impl TokenErrorCode {
    /// Returns the string representation of the error code.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidRequest => "invalid_request",
            Self::InvalidClient => "invalid_client",
            Self::InvalidGrant => "invalid_grant",
            Self::InvalidToken => "invalid_token",
            Self::UnauthorizedClient => "unauthorized_client",
            Self::UnsupportedGrantType => "unsupported_grant_type",
            Self::InvalidScope => "invalid_scope",
            Self::ServerError => "server_error",
        }
    }

    /// Returns the HTTP status code for this error.
    #[must_use]
    pub fn http_status(&self) -> u16 {
        match self {
            Self::InvalidClient => 401,
            Self::ServerError => 500,
            Self::InvalidRequest
            | Self::InvalidGrant
            | Self::InvalidToken
            | Self::UnauthorizedClient
            | Self::UnsupportedGrantType
            | Self::InvalidScope => 400,
        }
    }
}

impl fmt::Display for TokenErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// =============================================================================
// Grant exchange
// =============================================================================

/// Redeems authorization codes and refresh tokens.
#[derive(Clone)]
pub struct TokenService {
    handler: TokenHandler,
    jwt: Arc<JwtService>,
}

impl TokenService {
    /// Creates a token service.
    #[must_use]
    pub fn new(handler: TokenHandler, jwt: Arc<JwtService>) -> Self {
        Self { handler, jwt }
    }

    /// Performs the grant named by `grant_type` for an authenticated client.
    ///
    /// # Errors
    ///
    /// - `InvalidRequest` for missing, repeated or mismatching parameters
    /// - `UnsupportedGrantType` for anything but the two supported grants
    /// - `InvalidToken` if the code or refresh token cannot be used
    /// - `InvalidScope` if a refresh asks for more than was granted
    /// - `InvalidGrant` if PKCE verification fails
    pub async fn exchange(
        &self,
        client: &Client,
        params: &RequestParams,
    ) -> AuthResult<TokenResponse> {
        let request = TokenRequest::from_params(params)?;
        match GrantType::parse(&request.grant_type) {
            Some(GrantType::AuthorizationCode) => self.redeem_code(client, &request).await,
            Some(GrantType::RefreshToken) => self.refresh(client, &request).await,
            None => Err(AuthError::unsupported_grant_type(request.grant_type)),
        }
    }

    async fn redeem_code(
        &self,
        client: &Client,
        request: &TokenRequest,
    ) -> AuthResult<TokenResponse> {
        let serial = required(request.code.as_deref(), "code")?;
        let redirect_uri = required(request.redirect_uri.as_deref(), "redirect_uri")?;

        let Some(code) = self
            .handler
            .get_checked_token::<AuthorizationCode>(serial)
            .await?
        else {
            return Err(AuthError::invalid_token("Invalid authorization code"));
        };

        if code.grant.service_provider_id != client.client_id {
            tracing::warn!(
                client_id = %client.client_id,
                owner = %code.grant.service_provider_id,
                "Authorization code presented by another client"
            );
            return Err(AuthError::invalid_token("Invalid authorization code"));
        }

        if code.redirect_uri != redirect_uri {
            return Err(AuthError::invalid_request(
                "redirect_uri does not match the authorization request",
            ));
        }

        verify_code_verifier(
            code.code_challenge.as_deref(),
            request.code_verifier.as_deref(),
        )?;

        let (access_token, refresh_token) = if code.grant.scope_ids.contains(OFFLINE_ACCESS) {
            let refresh = self
                .handler
                .create_refresh_token(&code, &self.handler.generate_pass())
                .await?;
            let access = self
                .handler
                .create_access_token(
                    GrantSource::RefreshToken(&refresh),
                    None,
                    &self.handler.generate_pass(),
                )
                .await?;
            (access, Some(refresh))
        } else {
            let access = self
                .handler
                .create_access_token(
                    GrantSource::AuthorizationCode(&code),
                    None,
                    &self.handler.generate_pass(),
                )
                .await?;
            (access, None)
        };

        let id_token = self.id_token(&code).await?;

        let mut response = self.access_response(&access_token)?.with_id_token(id_token);
        if let Some(refresh) = refresh_token {
            response = response.with_refresh_token(self.handler.serialize(&refresh.meta)?);
        }
        Ok(response)
    }

    async fn refresh(&self, client: &Client, request: &TokenRequest) -> AuthResult<TokenResponse> {
        let serial = required(request.refresh_token.as_deref(), "refresh_token")?;

        let Some(refresh) = self
            .handler
            .get_checked_token::<RefreshToken>(serial)
            .await?
        else {
            return Err(AuthError::invalid_token("Invalid refresh token"));
        };

        if refresh.grant.service_provider_id != client.client_id {
            tracing::warn!(
                client_id = %client.client_id,
                owner = %refresh.grant.service_provider_id,
                "Refresh token presented by another client"
            );
            return Err(AuthError::invalid_token("Invalid refresh token"));
        }

        let scope_ids: Option<BTreeSet<String>> = request.scope.as_deref().map(parse_scope_param);
        let access_token = self
            .handler
            .create_access_token(
                GrantSource::RefreshToken(&refresh),
                scope_ids,
                &self.handler.generate_pass(),
            )
            .await?;

        self.access_response(&access_token)
    }

    fn access_response(&self, token: &AccessToken) -> AuthResult<TokenResponse> {
        let now = self.handler.clock().now();
        let expires_in = u64::try_from(token.meta.expires_in(now)).unwrap_or_default();
        Ok(TokenResponse::new(
            self.handler.serialize(&token.meta)?,
            expires_in,
            join_scopes(&token.grant.scope_ids),
        ))
    }

    async fn id_token(&self, code: &AuthorizationCode) -> AuthResult<String> {
        let auth_time = self
            .handler
            .find_session(&code.meta)
            .await?
            .map(|sid| sid.authentication_time);

        let claims = IdTokenClaims::new(
            self.jwt.issuer(),
            &code.grant.account_id,
            &code.grant.service_provider_id,
            self.handler.clock().now(),
            self.handler.lifetimes().id_token,
        )
        .with_nonce(code.nonce.clone())
        .with_auth_time(auth_time);

        Ok(self.jwt.encode(&claims)?)
    }
}

fn required<'a>(value: Option<&'a str>, name: &str) -> AuthResult<&'a str> {
    value.ok_or_else(|| AuthError::invalid_request(format!("Missing required parameter: {name}")))
}
