//! ID token signing and verification.
//!
//! ID tokens are RS256 JWTs signed with the server's key pair. The public half
//! is published as a JWKS document so relying parties can verify them. The
//! same key verifies `id_token_hint` values sent back to the authorization
//! endpoint.
//!
//! ## Example
//!
//! ```ignore
//! use portal_auth::token::jwt::{IdTokenClaims, JwtService, SigningKeyPair};
//!
//! let key_pair = SigningKeyPair::generate()?;
//! let jwt_service = JwtService::new(key_pair, "https://portal.example.com");
//!
//! let claims = IdTokenClaims::new(jwt_service.issuer(), "account-1", "client-1", now, lifetime)
//!     .with_nonce(Some("n-0S6_WzA2Mj".to_string()));
//! let id_token = jwt_service.encode(&claims)?;
//! ```

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use jsonwebtoken::{
    Algorithm, DecodingKey, EncodingKey, Header, TokenData, Validation, decode, encode,
};
use rand::rngs::OsRng;
use rsa::pkcs8::{DecodePublicKey, EncodePrivateKey, EncodePublicKey, LineEnding};
use rsa::traits::PublicKeyParts;
use rsa::{RsaPrivateKey, RsaPublicKey};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// The only signing algorithm the server issues or accepts.
pub const ALGORITHM: Algorithm = Algorithm::RS256;

const ALGORITHM_NAME: &str = "RS256";
const RSA_BITS: usize = 2048;

// ============================================================================
// Error Types
// ============================================================================

/// Errors that can occur during JWT operations.
#[derive(Debug, thiserror::Error)]
pub enum JwtError {
    /// Failed to encode a token.
    #[error("Failed to encode token: {message}")]
    EncodingError {
        /// Description of the encoding error.
        message: String,
    },

    /// Failed to decode a token.
    #[error("Failed to decode token: {message}")]
    DecodingError {
        /// Description of the decoding error.
        message: String,
    },

    /// The token has expired.
    #[error("Token expired")]
    Expired,

    /// The token signature is invalid.
    #[error("Invalid signature")]
    InvalidSignature,

    /// The token claims are invalid.
    #[error("Invalid claims: {message}")]
    InvalidClaims {
        /// Description of why claims are invalid.
        message: String,
    },

    /// Failed to generate a cryptographic key.
    #[error("Key generation error: {message}")]
    KeyGenerationError {
        /// Description of the key generation error.
        message: String,
    },

    /// Invalid key format or data.
    #[error("Invalid key: {message}")]
    InvalidKey {
        /// Description of why the key is invalid.
        message: String,
    },
}

impl JwtError {
    /// Creates a new `EncodingError`.
    #[must_use]
    pub fn encoding_error(message: impl Into<String>) -> Self {
        Self::EncodingError {
            message: message.into(),
        }
    }

    /// Creates a new `DecodingError`.
    #[must_use]
    pub fn decoding_error(message: impl Into<String>) -> Self {
        Self::DecodingError {
            message: message.into(),
        }
    }

    /// Creates a new `InvalidClaims` error.
    #[must_use]
    pub fn invalid_claims(message: impl Into<String>) -> Self {
        Self::InvalidClaims {
            message: message.into(),
        }
    }

    /// Creates a new `KeyGenerationError`.
    #[must_use]
    pub fn key_generation_error(message: impl Into<String>) -> Self {
        Self::KeyGenerationError {
            message: message.into(),
        }
    }

    /// Creates a new `InvalidKey` error.
    #[must_use]
    pub fn invalid_key(message: impl Into<String>) -> Self {
        Self::InvalidKey {
            message: message.into(),
        }
    }

    /// Returns `true` if the token itself was rejected, as opposed to a
    /// key or encoding failure on our side.
    #[must_use]
    pub fn is_validation_error(&self) -> bool {
        matches!(
            self,
            Self::Expired
                | Self::InvalidSignature
                | Self::InvalidClaims { .. }
                | Self::DecodingError { .. }
        )
    }
}

impl From<jsonwebtoken::errors::Error> for JwtError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        use jsonwebtoken::errors::ErrorKind;

        match err.kind() {
            ErrorKind::ExpiredSignature => Self::Expired,
            ErrorKind::InvalidSignature => Self::InvalidSignature,
            ErrorKind::InvalidAudience
            | ErrorKind::InvalidIssuer
            | ErrorKind::InvalidSubject
            | ErrorKind::MissingRequiredClaim(_) => Self::invalid_claims(err.to_string()),
            ErrorKind::InvalidRsaKey(_) | ErrorKind::InvalidKeyFormat => {
                Self::invalid_key(err.to_string())
            }
            _ => Self::decoding_error(err.to_string()),
        }
    }
}

impl From<JwtError> for crate::error::AuthError {
    fn from(err: JwtError) -> Self {
        if err.is_validation_error() {
            Self::invalid_request(err.to_string())
        } else {
            Self::internal(err.to_string())
        }
    }
}

// ============================================================================
// Claims
// ============================================================================

/// ID token claims for OpenID Connect.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IdTokenClaims {
    /// Issuer (this server's base URL).
    pub iss: String,

    /// Subject (account id).
    pub sub: String,

    /// Audience (client id).
    pub aud: String,

    /// Expiration time (Unix timestamp).
    pub exp: i64,

    /// Issued at (Unix timestamp).
    pub iat: i64,

    /// Nonce from the authorization request.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nonce: Option<String>,

    /// When the account last authenticated (Unix timestamp).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auth_time: Option<i64>,
}

impl IdTokenClaims {
    /// Creates claims issued at `issued_at` and valid for `lifetime`.
    #[must_use]
    pub fn new(
        issuer: impl Into<String>,
        subject: impl Into<String>,
        audience: impl Into<String>,
        issued_at: OffsetDateTime,
        lifetime: std::time::Duration,
    ) -> Self {
        let iat = issued_at.unix_timestamp();
        let lifetime = i64::try_from(lifetime.as_secs()).unwrap_or(i64::MAX);
        Self {
            iss: issuer.into(),
            sub: subject.into(),
            aud: audience.into(),
            iat,
            exp: iat.saturating_add(lifetime),
            nonce: None,
            auth_time: None,
        }
    }

    /// Echoes the authorization request's nonce.
    #[must_use]
    pub fn with_nonce(mut self, nonce: Option<String>) -> Self {
        self.nonce = nonce;
        self
    }

    /// Sets the session's authentication time.
    #[must_use]
    pub fn with_auth_time(mut self, auth_time: Option<OffsetDateTime>) -> Self {
        self.auth_time = auth_time.map(OffsetDateTime::unix_timestamp);
        self
    }
}

/// The part of an `id_token_hint` the authorization endpoint relies on.
#[derive(Debug, Clone, Deserialize)]
pub struct IdTokenHint {
    /// Account the hinted token was issued to.
    pub sub: String,
}

// ============================================================================
// JWKS Types
// ============================================================================

/// JSON Web Key Set.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Jwks {
    /// The keys in this set.
    pub keys: Vec<Jwk>,
}

/// JSON Web Key for an RSA signing key.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Jwk {
    /// Key type, always `RSA`.
    pub kty: String,

    /// Key ID.
    pub kid: String,

    /// Key use, always `sig`.
    #[serde(rename = "use")]
    pub use_: String,

    /// Algorithm.
    pub alg: String,

    /// RSA modulus (base64url, no padding).
    pub n: String,

    /// RSA exponent (base64url, no padding).
    pub e: String,
}

// ============================================================================
// Signing Key Pair
// ============================================================================

/// An RSA key pair used to sign ID tokens.
#[derive(Clone)]
pub struct SigningKeyPair {
    /// Key ID, sent in the JWT header and the JWKS.
    pub kid: String,

    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    n: Vec<u8>,
    e: Vec<u8>,
}

impl std::fmt::Debug for SigningKeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SigningKeyPair")
            .field("kid", &self.kid)
            .finish_non_exhaustive()
    }
}

impl SigningKeyPair {
    /// Generates a new 2048-bit RSA key pair with a random key id.
    ///
    /// # Errors
    /// Returns an error if key generation fails.
    pub fn generate() -> Result<Self, JwtError> {
        let private_key = RsaPrivateKey::new(&mut OsRng, RSA_BITS)
            .map_err(|e| JwtError::key_generation_error(e.to_string()))?;
        let public_key = private_key.to_public_key();

        let private_pem = private_key
            .to_pkcs8_pem(LineEnding::LF)
            .map_err(|e| JwtError::key_generation_error(e.to_string()))?;
        let encoding_key = EncodingKey::from_rsa_pem(private_pem.as_bytes())
            .map_err(|e| JwtError::key_generation_error(e.to_string()))?;

        let public_pem = public_key
            .to_public_key_pem(LineEnding::LF)
            .map_err(|e| JwtError::key_generation_error(e.to_string()))?;
        let decoding_key = DecodingKey::from_rsa_pem(public_pem.as_bytes())
            .map_err(|e| JwtError::key_generation_error(e.to_string()))?;

        Ok(Self {
            kid: uuid::Uuid::new_v4().to_string(),
            encoding_key,
            decoding_key,
            n: public_key.n().to_bytes_be(),
            e: public_key.e().to_bytes_be(),
        })
    }

    /// Loads a key pair from PEM strings.
    ///
    /// # Arguments
    /// * `kid` - Key ID
    /// * `private_pem` - PEM-encoded RSA private key (PKCS#1 or PKCS#8)
    /// * `public_pem` - PEM-encoded RSA public key (SPKI)
    ///
    /// # Errors
    /// Returns an error if the PEM data is invalid.
    pub fn from_pem(
        kid: impl Into<String>,
        private_pem: &str,
        public_pem: &str,
    ) -> Result<Self, JwtError> {
        let encoding_key = EncodingKey::from_rsa_pem(private_pem.as_bytes())
            .map_err(|e| JwtError::invalid_key(e.to_string()))?;
        let decoding_key = DecodingKey::from_rsa_pem(public_pem.as_bytes())
            .map_err(|e| JwtError::invalid_key(e.to_string()))?;
        let public_key = RsaPublicKey::from_public_key_pem(public_pem)
            .map_err(|e| JwtError::invalid_key(e.to_string()))?;

        Ok(Self {
            kid: kid.into(),
            encoding_key,
            decoding_key,
            n: public_key.n().to_bytes_be(),
            e: public_key.e().to_bytes_be(),
        })
    }

    /// Exports the public key as a JWK.
    #[must_use]
    pub fn to_jwk(&self) -> Jwk {
        Jwk {
            kty: "RSA".to_string(),
            kid: self.kid.clone(),
            use_: "sig".to_string(),
            alg: ALGORITHM_NAME.to_string(),
            n: URL_SAFE_NO_PAD.encode(&self.n),
            e: URL_SAFE_NO_PAD.encode(&self.e),
        }
    }
}

// ============================================================================
// JWT Service
// ============================================================================

/// Signs ID tokens and verifies tokens this server issued.
///
/// This service is `Send + Sync` and is shared behind an `Arc`.
pub struct JwtService {
    signing_key: SigningKeyPair,
    issuer: String,
}

impl JwtService {
    /// Creates a new JWT service.
    ///
    /// # Arguments
    /// * `signing_key` - The key pair to use for signing/verification
    /// * `issuer` - The issuer claim value (the server's base URL)
    #[must_use]
    pub fn new(signing_key: SigningKeyPair, issuer: impl Into<String>) -> Self {
        Self {
            signing_key,
            issuer: issuer.into(),
        }
    }

    /// Encodes claims into a JWT string with the key id in the header.
    ///
    /// # Errors
    /// Returns an error if encoding fails.
    pub fn encode<T: Serialize>(&self, claims: &T) -> Result<String, JwtError> {
        let mut header = Header::new(ALGORITHM);
        header.kid = Some(self.signing_key.kid.clone());

        encode(&header, claims, &self.signing_key.encoding_key)
            .map_err(|e| JwtError::encoding_error(e.to_string()))
    }

    /// Decodes and validates a JWT string, including its expiry.
    ///
    /// # Errors
    /// Returns an error if decoding or validation fails.
    pub fn decode<T: DeserializeOwned>(&self, token: &str) -> Result<TokenData<T>, JwtError> {
        self.decode_with(token, true)
    }

    /// Decodes a JWT checking signature and issuer but not `exp`.
    ///
    /// For callers that judge expiry against their own clock.
    ///
    /// # Errors
    /// Returns an error if decoding or validation fails.
    pub fn decode_ignoring_expiry<T: DeserializeOwned>(
        &self,
        token: &str,
    ) -> Result<TokenData<T>, JwtError> {
        self.decode_with(token, false)
    }

    fn decode_with<T: DeserializeOwned>(
        &self,
        token: &str,
        validate_exp: bool,
    ) -> Result<TokenData<T>, JwtError> {
        let mut validation = Validation::new(ALGORITHM);
        validation.set_issuer(&[&self.issuer]);
        validation.validate_aud = false;
        validation.validate_exp = validate_exp;

        decode(token, &self.signing_key.decoding_key, &validation).map_err(JwtError::from)
    }

    /// Verifies an `id_token_hint`.
    ///
    /// The hint must carry our signature, our issuer and a subject. Expiry
    /// and audience are not checked: a hint names who the client believes is
    /// logged in, it does not authenticate anyone.
    ///
    /// # Errors
    /// Returns an error if the hint is malformed, signed by another key, or
    /// issued by someone else.
    pub fn verify_id_token_hint(&self, hint: &str) -> Result<IdTokenHint, JwtError> {
        let mut validation = Validation::new(ALGORITHM);
        validation.set_issuer(&[&self.issuer]);
        validation.set_required_spec_claims(&["iss", "sub"]);
        validation.validate_exp = false;
        validation.validate_aud = false;

        let data = decode::<IdTokenHint>(hint, &self.signing_key.decoding_key, &validation)?;
        if data.claims.sub.is_empty() {
            return Err(JwtError::invalid_claims("Empty subject"));
        }
        Ok(data.claims)
    }

    /// Returns the current signing key ID.
    #[must_use]
    pub fn current_kid(&self) -> &str {
        &self.signing_key.kid
    }

    /// Returns the issuer URL.
    #[must_use]
    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    /// Returns the JWKS containing the public key.
    #[must_use]
    pub fn jwks(&self) -> Jwks {
        Jwks {
            keys: vec![self.signing_key.to_jwk()],
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
