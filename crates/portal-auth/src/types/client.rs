//! Registered client (app instance) types.

use serde::{Deserialize, Serialize};

use crate::oauth::redirect_uri;

// =============================================================================
// Grant Type
// =============================================================================

/// Grant types accepted by the token endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrantType {
    /// Authorization Code redemption.
    AuthorizationCode,
    /// Refresh Token rotation.
    RefreshToken,
}

impl GrantType {
    /// Returns the OAuth 2.0 grant_type parameter value.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AuthorizationCode => "authorization_code",
            Self::RefreshToken => "refresh_token",
        }
    }

    /// Parses a grant_type parameter value.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "authorization_code" => Some(Self::AuthorizationCode),
            "refresh_token" => Some(Self::RefreshToken),
            _ => None,
        }
    }
}

impl std::fmt::Display for GrantType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// =============================================================================
// Client
// =============================================================================

/// A registered client application.
///
/// Every client is confidential: it authenticates to the back-channel
/// endpoints with its secret. A client may also act as a data provider and
/// own scopes, which is what entitles it to introspect tokens.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Client {
    /// Unique client identifier used in OAuth flows.
    pub client_id: String,

    /// Argon2-hashed client secret.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<String>,

    /// Human-readable display name.
    pub name: String,

    /// Detailed description of the client application.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Home page shown on the consent screen.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_uri: Option<String>,

    /// Redirect URIs registered for the authorization code flow.
    #[serde(default)]
    pub redirect_uris: Vec<String>,

    /// Whether this client is currently active and can be used.
    pub active: bool,
}

impl Client {
    /// Validates the client registration.
    ///
    /// # Errors
    ///
    /// Returns an error if the registration is unusable.
    pub fn validate(&self) -> Result<(), ClientValidationError> {
        if self.client_id.is_empty() {
            return Err(ClientValidationError::EmptyClientId);
        }

        if self.name.is_empty() {
            return Err(ClientValidationError::EmptyName);
        }

        if self.client_secret.is_none() {
            return Err(ClientValidationError::MissingSecret);
        }

        if let Some(uri) = self
            .redirect_uris
            .iter()
            .find(|uri| !redirect_uri::is_valid(uri))
        {
            return Err(ClientValidationError::InvalidRedirectUri(uri.clone()));
        }

        Ok(())
    }

    /// Checks if the given redirect URI is registered for this client.
    ///
    /// The comparison is exact.
    #[must_use]
    pub fn is_redirect_uri_allowed(&self, uri: &str) -> bool {
        self.redirect_uris.iter().any(|allowed| allowed == uri)
    }
}

// =============================================================================
// Validation Error
// =============================================================================

/// Errors that can occur during client validation.
#[derive(Debug, thiserror::Error)]
pub enum ClientValidationError {
    /// Client ID cannot be empty.
    #[error("Client ID cannot be empty")]
    EmptyClientId,

    /// Client name cannot be empty.
    #[error("Client name cannot be empty")]
    EmptyName,

    /// Clients authenticate with a secret.
    #[error("Client secret is required")]
    MissingSecret,

    /// A registered redirect URI is not an absolute http(s) URI without fragment.
    #[error("Invalid redirect URI: {0}")]
    InvalidRedirectUri(String),
}

// =============================================================================
// Tests
// =============================================================================
