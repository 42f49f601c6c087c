//! PKCE (Proof Key for Code Exchange), S256 only.
//!
//! The authorization endpoint stores the client's `code_challenge` on the
//! authorization code; the token endpoint checks the `code_verifier` against
//! it before the code is redeemed.
//!
//! # Example
//!
//! ```
//! use portal_auth::oauth::pkce::{PkceChallenge, PkceVerifier};
//!
//! let verifier = PkceVerifier::generate();
//! let challenge = PkceChallenge::from_verifier(&verifier);
//!
//! let stored = PkceChallenge::new(challenge.as_str().to_string()).unwrap();
//! assert!(stored.verify(&verifier).is_ok());
//! ```

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use sha2::{Digest, Sha256};

use crate::error::AuthError;

const MIN_LEN: usize = 43;
const MAX_LEN: usize = 128;

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur during PKCE operations.
#[derive(Debug, thiserror::Error)]
pub enum PkceError {
    /// Verifier or challenge length is outside 43-128 characters.
    #[error("Invalid {what} length: must be 43-128 characters, got {len}")]
    InvalidLength {
        /// `code_verifier` or `code_challenge`.
        what: &'static str,
        /// Observed length.
        len: usize,
    },

    /// Verifier or challenge contains characters outside `[A-Za-z0-9-._~]`.
    #[error("Invalid {what} characters: must be [A-Za-z0-9-._~]")]
    InvalidCharacters {
        /// `code_verifier` or `code_challenge`.
        what: &'static str,
    },

    /// Unsupported challenge method (only S256 is supported).
    #[error("Unsupported code_challenge_method: {0}. Only S256 is supported.")]
    UnsupportedMethod(String),

    /// The verifier does not hash to the stored challenge.
    #[error("PKCE verification failed: verifier does not match challenge")]
    VerificationFailed,
}

impl PkceError {
    /// Returns `true` if this is a verification failure.
    #[must_use]
    pub fn is_verification_error(&self) -> bool {
        matches!(self, Self::VerificationFailed)
    }

    /// Get the OAuth 2.0 error code for this error.
    #[must_use]
    pub fn oauth_error_code(&self) -> &'static str {
        match self {
            Self::InvalidLength { .. }
            | Self::InvalidCharacters { .. }
            | Self::UnsupportedMethod(_) => "invalid_request",
            Self::VerificationFailed => "invalid_grant",
        }
    }
}

impl From<PkceError> for AuthError {
    fn from(err: PkceError) -> Self {
        if err.is_verification_error() {
            Self::invalid_grant(err.to_string())
        } else {
            Self::invalid_request(err.to_string())
        }
    }
}

fn check_format(what: &'static str, value: &str) -> Result<(), PkceError> {
    let len = value.len();
    if !(MIN_LEN..=MAX_LEN).contains(&len) {
        return Err(PkceError::InvalidLength { what, len });
    }
    if !value
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '.' | '_' | '~'))
    {
        return Err(PkceError::InvalidCharacters { what });
    }
    Ok(())
}

// =============================================================================
// PKCE Challenge Method
// =============================================================================

/// PKCE challenge method. `plain` is refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PkceChallengeMethod {
    /// SHA-256 hash.
    #[default]
    S256,
}

impl PkceChallengeMethod {
    /// Parse challenge method from string.
    ///
    /// # Errors
    ///
    /// Returns `PkceError::UnsupportedMethod` if the method is not "S256".
    pub fn parse(method: &str) -> Result<Self, PkceError> {
        match method {
            "S256" => Ok(Self::S256),
            other => Err(PkceError::UnsupportedMethod(other.to_string())),
        }
    }

    /// Get the method as a string.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::S256 => "S256",
        }
    }
}

impl std::fmt::Display for PkceChallengeMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// =============================================================================
// PKCE Verifier
// =============================================================================

/// PKCE code verifier: 43-128 characters of `[A-Za-z0-9-._~]`.
#[derive(Debug, Clone)]
pub struct PkceVerifier(String);

impl PkceVerifier {
    /// Create a new verifier from a string.
    ///
    /// # Errors
    ///
    /// Returns an error if the length or alphabet is wrong.
    pub fn new(verifier: String) -> Result<Self, PkceError> {
        check_format("code_verifier", &verifier)?;
        Ok(Self(verifier))
    }

    /// Generate a random verifier (32 bytes, base64url, 43 characters).
    #[must_use]
    pub fn generate() -> Self {
        use rand::Rng;
        let bytes: [u8; 32] = rand::thread_rng().r#gen();
        Self(URL_SAFE_NO_PAD.encode(bytes))
    }

    /// Get the verifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

// =============================================================================
// PKCE Challenge
// =============================================================================

/// PKCE code challenge, `BASE64URL(SHA256(ASCII(code_verifier)))`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PkceChallenge(String);

impl PkceChallenge {
    /// Create a challenge from a verifier using the S256 method.
    #[must_use]
    pub fn from_verifier(verifier: &PkceVerifier) -> Self {
        let hash = Sha256::digest(verifier.0.as_bytes());
        Self(URL_SAFE_NO_PAD.encode(hash))
    }

    /// Create a challenge from a raw string received from a client.
    ///
    /// # Errors
    ///
    /// Returns an error if the length or alphabet is wrong.
    pub fn new(challenge: String) -> Result<Self, PkceError> {
        check_format("code_challenge", &challenge)?;
        Ok(Self(challenge))
    }

    /// Verify that a verifier matches this challenge.
    ///
    /// # Errors
    ///
    /// Returns `PkceError::VerificationFailed` if the verifier doesn't match.
    pub fn verify(&self, verifier: &PkceVerifier) -> Result<(), PkceError> {
        if Self::from_verifier(verifier).0 == self.0 {
            Ok(())
        } else {
            Err(PkceError::VerificationFailed)
        }
    }

    /// Get the challenge as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consume the challenge and return the inner string.
    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

/// Checks a `code_verifier` from a token request against the challenge bound
/// to the authorization code.
///
/// # Errors
///
/// - `invalid_request` if a challenge is bound and the verifier is missing or
///   malformed
/// - `invalid_grant` if the verifier does not match, or a verifier is sent for
///   a code issued without a challenge
pub fn verify_code_verifier(
    code_challenge: Option<&str>,
    code_verifier: Option<&str>,
) -> Result<(), AuthError> {
    match (code_challenge, code_verifier) {
        (None, None) => Ok(()),
        (None, Some(_)) => Err(AuthError::invalid_grant(
            "code_verifier sent for a code issued without code_challenge",
        )),
        (Some(_), None) => Err(AuthError::invalid_request(
            "Missing required parameter: code_verifier",
        )),
        (Some(challenge), Some(verifier)) => {
            let verifier = PkceVerifier::new(verifier.to_string())?;
            PkceChallenge(challenge.to_string()).verify(&verifier)?;
            Ok(())
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
