//! Authorization server error types.
//!
//! Every protocol failure maps onto one OAuth 2.0 / OpenID Connect error
//! code. Infrastructure failures (storage, signing, configuration) all map
//! onto `server_error` and never carry their detail to the caller.

use std::fmt;

/// Errors that can occur while running the authorization protocol.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// The request is missing a parameter, repeats one, or is otherwise malformed.
    #[error("Invalid request: {message}")]
    InvalidRequest {
        /// Description of why the request is invalid.
        message: String,
    },

    /// Client authentication failed.
    #[error("Invalid client: {message}")]
    InvalidClient {
        /// Description of why the client is invalid.
        message: String,
    },

    /// The grant (code, verifier) is invalid.
    #[error("Invalid grant: {message}")]
    InvalidGrant {
        /// Description of why the grant is invalid.
        message: String,
    },

    /// The presented token is absent, expired, revoked, or belongs to another client.
    #[error("Invalid token: {message}")]
    InvalidToken {
        /// Description of why the token is invalid.
        message: String,
    },

    /// The requested scope is unknown or wider than what was granted.
    #[error("Invalid scope: {message}")]
    InvalidScope {
        /// Description of why the scope is invalid.
        message: String,
    },

    /// The authenticated client does not own the presented token.
    #[error("Unauthorized client: {message}")]
    UnauthorizedClient {
        /// Description of the ownership mismatch.
        message: String,
    },

    /// The resource owner or server denied the request.
    #[error("Access denied: {message}")]
    AccessDenied {
        /// Description of why access was denied.
        message: String,
    },

    /// Only the `code` response type is supported.
    #[error("Unsupported response type: {response_type}")]
    UnsupportedResponseType {
        /// The rejected response type.
        response_type: String,
    },

    /// Only `authorization_code` and `refresh_token` grants are supported.
    #[error("Unsupported grant type: {grant_type}")]
    UnsupportedGrantType {
        /// The rejected grant type.
        grant_type: String,
    },

    /// Authentication is needed but the request asked for no interaction.
    #[error("Login required: {message}")]
    LoginRequired {
        /// Description of why login is required.
        message: String,
    },

    /// Consent is needed but the request asked for no interaction.
    #[error("Consent required: {message}")]
    ConsentRequired {
        /// Description of why consent is required.
        message: String,
    },

    /// The `request` parameter (request objects) is not supported.
    #[error("Request objects are not supported")]
    RequestNotSupported,

    /// The `request_uri` parameter is not supported.
    #[error("Request URIs are not supported")]
    RequestUriNotSupported,

    /// An error occurred while storing or retrieving tokens.
    #[error("Storage error: {message}")]
    Storage {
        /// Description of the storage error.
        message: String,
    },

    /// The configuration is invalid.
    #[error("Configuration error: {message}")]
    Configuration {
        /// Description of the configuration error.
        message: String,
    },

    /// An unexpected internal error occurred (e.g. signing failed).
    #[error("Internal error: {message}")]
    Internal {
        /// Description of the internal error.
        message: String,
    },
}

impl AuthError {
    /// Creates a new `InvalidRequest` error.
    #[must_use]
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest {
            message: message.into(),
        }
    }

    /// Creates a new `InvalidClient` error.
    #[must_use]
    pub fn invalid_client(message: impl Into<String>) -> Self {
        Self::InvalidClient {
            message: message.into(),
        }
    }

    /// Creates a new `InvalidGrant` error.
    #[must_use]
    pub fn invalid_grant(message: impl Into<String>) -> Self {
        Self::InvalidGrant {
            message: message.into(),
        }
    }

    /// Creates a new `InvalidToken` error.
    #[must_use]
    pub fn invalid_token(message: impl Into<String>) -> Self {
        Self::InvalidToken {
            message: message.into(),
        }
    }

    /// Creates a new `InvalidScope` error.
    #[must_use]
    pub fn invalid_scope(message: impl Into<String>) -> Self {
        Self::InvalidScope {
            message: message.into(),
        }
    }

    /// Creates a new `UnauthorizedClient` error.
    #[must_use]
    pub fn unauthorized_client(message: impl Into<String>) -> Self {
        Self::UnauthorizedClient {
            message: message.into(),
        }
    }

    /// Creates a new `AccessDenied` error.
    #[must_use]
    pub fn access_denied(message: impl Into<String>) -> Self {
        Self::AccessDenied {
            message: message.into(),
        }
    }

    /// Creates a new `UnsupportedResponseType` error.
    #[must_use]
    pub fn unsupported_response_type(response_type: impl Into<String>) -> Self {
        Self::UnsupportedResponseType {
            response_type: response_type.into(),
        }
    }

    /// Creates a new `UnsupportedGrantType` error.
    #[must_use]
    pub fn unsupported_grant_type(grant_type: impl Into<String>) -> Self {
        Self::UnsupportedGrantType {
            grant_type: grant_type.into(),
        }
    }

    /// Creates a new `LoginRequired` error.
    #[must_use]
    pub fn login_required(message: impl Into<String>) -> Self {
        Self::LoginRequired {
            message: message.into(),
        }
    }

    /// Creates a new `ConsentRequired` error.
    #[must_use]
    pub fn consent_required(message: impl Into<String>) -> Self {
        Self::ConsentRequired {
            message: message.into(),
        }
    }

    /// Creates a new `Storage` error.
    #[must_use]
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }

    /// Creates a new `Configuration` error.
    #[must_use]
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Creates a new `Internal` error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Returns `true` if this is a client error (4xx category).
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        !self.is_server_error()
    }

    /// Returns `true` if this is a server error (5xx category).
    #[must_use]
    pub fn is_server_error(&self) -> bool {
        matches!(
            self,
            Self::Storage { .. } | Self::Configuration { .. } | Self::Internal { .. }
        )
    }

    /// Returns `true` if the error asks the end user to interact.
    #[must_use]
    pub fn is_interaction_error(&self) -> bool {
        matches!(
            self,
            Self::LoginRequired { .. } | Self::ConsentRequired { .. }
        )
    }

    /// Returns the error category for logging purposes.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::InvalidClient { .. } | Self::InvalidGrant { .. } => {
                ErrorCategory::Authentication
            }
            Self::InvalidScope { .. }
            | Self::UnauthorizedClient { .. }
            | Self::AccessDenied { .. } => ErrorCategory::Authorization,
            Self::InvalidToken { .. } => ErrorCategory::Token,
            Self::InvalidRequest { .. }
            | Self::UnsupportedResponseType { .. }
            | Self::UnsupportedGrantType { .. }
            | Self::RequestNotSupported
            | Self::RequestUriNotSupported => ErrorCategory::Validation,
            Self::LoginRequired { .. } | Self::ConsentRequired { .. } => {
                ErrorCategory::Interaction
            }
            Self::Storage { .. } => ErrorCategory::Infrastructure,
            Self::Configuration { .. } => ErrorCategory::Configuration,
            Self::Internal { .. } => ErrorCategory::Internal,
        }
    }

    /// Returns the OAuth 2.0 error code for this error.
    #[must_use]
    pub fn oauth_error_code(&self) -> &'static str {
        match self {
            Self::InvalidRequest { .. } => "invalid_request",
            Self::InvalidClient { .. } => "invalid_client",
            Self::InvalidGrant { .. } => "invalid_grant",
            Self::InvalidToken { .. } => "invalid_token",
            Self::InvalidScope { .. } => "invalid_scope",
            Self::UnauthorizedClient { .. } => "unauthorized_client",
            Self::AccessDenied { .. } => "access_denied",
            Self::UnsupportedResponseType { .. } => "unsupported_response_type",
            Self::UnsupportedGrantType { .. } => "unsupported_grant_type",
            Self::LoginRequired { .. } => "login_required",
            Self::ConsentRequired { .. } => "consent_required",
            Self::RequestNotSupported => "request_not_supported",
            Self::RequestUriNotSupported => "request_uri_not_supported",
            Self::Storage { .. } | Self::Configuration { .. } | Self::Internal { .. } => {
                "server_error"
            }
        }
    }

    /// Returns the description that may be shown to the caller.
    ///
    /// Server errors never expose their message.
    #[must_use]
    pub fn public_description(&self) -> Option<String> {
        match self {
            Self::InvalidRequest { message }
            | Self::InvalidClient { message }
            | Self::InvalidGrant { message }
            | Self::InvalidToken { message }
            | Self::InvalidScope { message }
            | Self::UnauthorizedClient { message }
            | Self::AccessDenied { message }
            | Self::LoginRequired { message }
            | Self::ConsentRequired { message } => Some(message.clone()),
            Self::UnsupportedResponseType { .. }
            | Self::UnsupportedGrantType { .. }
            | Self::RequestNotSupported
            | Self::RequestUriNotSupported => Some(self.to_string()),
            Self::Storage { .. } | Self::Configuration { .. } | Self::Internal { .. } => None,
        }
    }
}

/// Categories of errors for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Client or grant authentication failures.
    Authentication,
    /// Permission and ownership failures.
    Authorization,
    /// Token validation failures.
    Token,
    /// Request validation errors.
    Validation,
    /// End-user interaction needed.
    Interaction,
    /// Infrastructure/storage errors.
    Infrastructure,
    /// Configuration errors.
    Configuration,
    /// Internal server errors.
    Internal,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Authentication => write!(f, "authentication"),
            Self::Authorization => write!(f, "authorization"),
            Self::Token => write!(f, "token"),
            Self::Validation => write!(f, "validation"),
            Self::Interaction => write!(f, "interaction"),
            Self::Infrastructure => write!(f, "infrastructure"),
            Self::Configuration => write!(f, "configuration"),
            Self::Internal => write!(f, "internal"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = AuthError::invalid_client("client not found");
        assert_eq!(err.to_string(), "Invalid client: client not found");

        let err = AuthError::unsupported_grant_type("password");
        assert_eq!(err.to_string(), "Unsupported grant type: password");

        let err = AuthError::RequestNotSupported;
        assert_eq!(err.to_string(), "Request objects are not supported");
    }

    #[test]
    fn test_error_predicates() {
        let err = AuthError::invalid_token("unknown code");
        assert!(err.is_client_error());
        assert!(!err.is_server_error());
        assert!(!err.is_interaction_error());

        let err = AuthError::consent_required("scopes not yet authorized");
        assert!(err.is_client_error());
        assert!(err.is_interaction_error());

        let err = AuthError::storage("database down");
        assert!(!err.is_client_error());
        assert!(err.is_server_error());
    }

    #[test]
    fn test_error_category() {
        assert_eq!(
            AuthError::invalid_client("test").category(),
            ErrorCategory::Authentication
        );
        assert_eq!(
            AuthError::unauthorized_client("test").category(),
            ErrorCategory::Authorization
        );
        assert_eq!(
            AuthError::login_required("test").category(),
            ErrorCategory::Interaction
        );
        assert_eq!(
            AuthError::storage("test").category(),
            ErrorCategory::Infrastructure
        );
    }

    #[test]
    fn test_oauth_error_code() {
        assert_eq!(
            AuthError::invalid_token("test").oauth_error_code(),
            "invalid_token"
        );
        assert_eq!(
            AuthError::RequestUriNotSupported.oauth_error_code(),
            "request_uri_not_supported"
        );
        assert_eq!(
            AuthError::consent_required("test").oauth_error_code(),
            "consent_required"
        );
        assert_eq!(AuthError::internal("boom").oauth_error_code(), "server_error");
    }

    #[test]
    fn test_server_errors_hide_detail() {
        assert_eq!(
            AuthError::storage("connection refused on 10.0.0.3").public_description(),
            None
        );
        assert_eq!(
            AuthError::invalid_request("Missing required parameter: code").public_description(),
            Some("Missing required parameter: code".to_string())
        );
    }

    #[test]
    fn test_error_category_display() {
        assert_eq!(ErrorCategory::Interaction.to_string(), "interaction");
        assert_eq!(ErrorCategory::Token.to_string(), "token");
    }
}
