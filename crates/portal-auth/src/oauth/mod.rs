//! OAuth 2.0 / OpenID Connect protocol logic.
//!
//! This module holds the endpoint semantics, independent of HTTP:
//!
//! - [`authorize`] - Authorization endpoint and consent approval
//! - [`token`] - Code and refresh token exchange
//! - [`introspection`] - Token introspection for data providers
//! - [`revocation`] - Token revocation
//! - [`client_auth`] - Client authentication for the back-channel endpoints
//! - [`pkce`] - PKCE challenge/verifier implementation
//!
//! # Example
//!
//! ```ignore
//! use portal_auth::oauth::{RequestParams, TokenService, authenticate_client};
//!
//! let params = RequestParams::new(form_pairs);
//! let client = authenticate_client(basic, &params, clients.as_ref()).await?;
//! let response = token_service.exchange(&client.client, &params).await?;
//! ```

pub mod authorize;
pub mod client_auth;
pub mod introspection;
pub mod params;
pub mod pkce;
pub mod prompt;
pub mod redirect_uri;
pub mod revocation;
pub mod token;

// Authorization endpoint
pub use authorize::{
    APPROVE_PATH, AUTHORIZE_PATH, AuthorizationService, AuthorizeOutcome, ConsentPrompt,
};

// Client authentication
pub use client_auth::{
    AuthenticatedClient, TokenEndpointAuthMethod, authenticate_client, parse_basic_auth,
};

// Introspection and revocation
pub use introspection::{IntrospectionResponse, IntrospectionService};
pub use revocation::revoke;

// Request parsing
pub use params::RequestParams;
pub use prompt::Prompt;

// PKCE
pub use pkce::{PkceChallenge, PkceChallengeMethod, PkceError, PkceVerifier};

// Token endpoint
pub use token::{TokenError, TokenErrorCode, TokenRequest, TokenResponse, TokenService};
