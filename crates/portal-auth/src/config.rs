//! Authorization server configuration.
//!
//! Token lifetimes, the ID-token signing key, and the browser-facing settings
//! of the authorization endpoint.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Root authorization server configuration.
///
/// # Example (TOML)
///
/// ```toml
/// [auth]
/// issuer = "https://portal.example.com"
///
/// [auth.tokens]
/// authorization_code = "1m"
/// access_token = "1h"
/// refresh_token = "365d"
/// ```
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Issuer URL (the `iss` claim of ID tokens).
    pub issuer: String,

    /// Lifetimes of every token kind.
    pub tokens: TokenLifetimes,

    /// ID-token signing key.
    pub signing: SigningConfig,

    /// Browser session settings.
    pub session: SessionConfig,

    /// How often expired replay-guard entries are purged.
    #[serde(with = "humantime_serde")]
    pub jti_cleanup_interval: Duration,

    /// How often expired tokens are deleted.
    #[serde(with = "humantime_serde")]
    pub token_cleanup_interval: Duration,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            issuer: "http://localhost:8080".to_string(),
            tokens: TokenLifetimes::default(),
            signing: SigningConfig::default(),
            session: SessionConfig::default(),
            jti_cleanup_interval: Duration::from_secs(300),
            token_cleanup_interval: Duration::from_secs(900),
        }
    }
}

/// Token lifetimes.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TokenLifetimes {
    /// Authorization code lifetime. Too short to be useful once intercepted.
    #[serde(with = "humantime_serde")]
    pub authorization_code: Duration,

    /// Access token lifetime.
    #[serde(with = "humantime_serde")]
    pub access_token: Duration,

    /// Refresh token lifetime.
    #[serde(with = "humantime_serde")]
    pub refresh_token: Duration,

    /// ID token lifetime (`exp - iat`).
    #[serde(with = "humantime_serde")]
    pub id_token: Duration,

    /// Browser session lifetime, renewed on activity.
    #[serde(with = "humantime_serde")]
    pub sid_token: Duration,

    /// Account activation link lifetime.
    #[serde(with = "humantime_serde")]
    pub account_activation: Duration,

    /// Change-password link lifetime.
    #[serde(with = "humantime_serde")]
    pub change_password: Duration,

    /// Set-password link lifetime.
    #[serde(with = "humantime_serde")]
    pub set_password: Duration,

    /// Membership invitation lifetime.
    #[serde(with = "humantime_serde")]
    pub membership_invitation: Duration,
}

impl Default for TokenLifetimes {
    fn default() -> Self {
        Self {
            authorization_code: Duration::from_secs(60),
            access_token: Duration::from_secs(3600),
            refresh_token: Duration::from_secs(365 * 24 * 3600),
            id_token: Duration::from_secs(3600),
            sid_token: Duration::from_secs(24 * 3600),
            account_activation: Duration::from_secs(2 * 24 * 3600),
            change_password: Duration::from_secs(3600),
            set_password: Duration::from_secs(3600),
            membership_invitation: Duration::from_secs(7 * 24 * 3600),
        }
    }
}

/// ID-token signing key configuration.
///
/// When both PEM paths are set the key pair is loaded from disk, otherwise a
/// fresh RSA key is generated at startup.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct SigningConfig {
    /// Key id published in the JWKS and the JWT header. Generated when absent.
    pub key_id: Option<String>,

    /// PKCS#8 PEM private key.
    pub private_key_path: Option<PathBuf>,

    /// SPKI PEM public key.
    pub public_key_path: Option<PathBuf>,
}

/// Browser-facing settings of the authorization endpoint.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Cookie holding the serialized session token.
    pub cookie_name: String,

    /// Mark the session cookie `Secure`.
    pub secure_cookie: bool,

    /// Login page users are sent to when no session is active.
    pub login_url: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            cookie_name: "SID".to_string(),
            secure_cookie: false,
            login_url: "/a/login".to_string(),
        }
    }
}

/// Configuration validation errors.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfigError {
    /// An invalid configuration value was provided.
    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),

    /// A required configuration value is missing.
    #[error("Missing required configuration: {0}")]
    Missing(String),
}

impl AuthConfig {
    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if:
    /// - The issuer is not an absolute URL
    /// - A token lifetime or cleanup interval is zero
    /// - Only one of the two signing key paths is set
    ///
    /// Returns `ConfigError::Missing` if the session cookie name or login URL
    /// is empty.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.issuer.is_empty() {
            return Err(ConfigError::InvalidValue(
                "issuer cannot be empty".to_string(),
            ));
        }
        if url::Url::parse(&self.issuer).is_err() {
            return Err(ConfigError::InvalidValue(format!(
                "issuer must be an absolute URL: '{}'",
                self.issuer
            )));
        }

        let lifetimes = [
            ("authorization_code", self.tokens.authorization_code),
            ("access_token", self.tokens.access_token),
            ("refresh_token", self.tokens.refresh_token),
            ("id_token", self.tokens.id_token),
            ("sid_token", self.tokens.sid_token),
            ("account_activation", self.tokens.account_activation),
            ("change_password", self.tokens.change_password),
            ("set_password", self.tokens.set_password),
            ("membership_invitation", self.tokens.membership_invitation),
        ];
        for (name, lifetime) in lifetimes {
            if lifetime.is_zero() {
                return Err(ConfigError::InvalidValue(format!(
                    "tokens.{name} lifetime must be > 0"
                )));
            }
        }

        let intervals = [
            ("jti_cleanup_interval", self.jti_cleanup_interval),
            ("token_cleanup_interval", self.token_cleanup_interval),
        ];
        for (name, interval) in intervals {
            if interval.is_zero() {
                return Err(ConfigError::InvalidValue(format!("{name} must be > 0")));
            }
        }

        if self.signing.private_key_path.is_some() != self.signing.public_key_path.is_some() {
            return Err(ConfigError::InvalidValue(
                "signing.private_key_path and signing.public_key_path must be set together"
                    .to_string(),
            ));
        }

        if self.session.cookie_name.is_empty() {
            return Err(ConfigError::Missing("session.cookie_name".to_string()));
        }
        if self.session.login_url.is_empty() {
            return Err(ConfigError::Missing("session.login_url".to_string()));
        }

        Ok(())
    }
}
