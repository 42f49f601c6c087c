//! Opaque bearer-string codec.
//!
//! A bearer string is the base64url (unpadded) JSON encoding of
//! [`TokenInfo`]: the token's lookup key plus its issue and expiry instants.
//! The lookup key is `make_id(id, pass)`, an HMAC-SHA256 of the storage id
//! keyed by a random per-issuance pass. Without the pass the storage id is
//! useless to a caller, and the bearer string never reveals it.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use hmac::{Hmac, Mac};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use time::OffsetDateTime;

use crate::error::AuthError;
use crate::token::model::TokenMeta;
use crate::AuthResult;

/// Number of random bytes in an issuance pass.
const PASS_BYTES: usize = 16;

/// Wire record carried inside a bearer string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenInfo {
    /// Lookup key of the token (never the storage id).
    pub id: String,

    /// Issue instant, seconds since the epoch.
    pub iat: i64,

    /// Expiry instant, seconds since the epoch.
    pub exp: i64,
}

impl TokenInfo {
    /// Builds the wire record of a token.
    #[must_use]
    pub fn for_token(meta: &TokenMeta) -> Self {
        Self {
            id: meta.lookup_key.clone(),
            iat: meta.creation_time.unix_timestamp(),
            exp: meta.expiration_time().unix_timestamp(),
        }
    }

    /// Returns `true` if the embedded expiry has passed at `now`.
    #[must_use]
    pub fn is_expired_at(&self, now: OffsetDateTime) -> bool {
        self.exp <= now.unix_timestamp()
    }
}

/// Generates a random issuance pass.
#[must_use]
pub fn generate_pass() -> String {
    let mut bytes = [0u8; PASS_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Derives the lookup key of a token from its storage id and issuance pass.
///
/// # Errors
///
/// Returns `AuthError::Internal` if the MAC cannot be keyed.
pub fn make_id(id: &str, pass: &str) -> AuthResult<String> {
    let mut mac = Hmac::<Sha256>::new_from_slice(pass.as_bytes())
        .map_err(|e| AuthError::internal(format!("Failed to key token id derivation: {e}")))?;
    mac.update(id.as_bytes());
    Ok(URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes()))
}

/// Encodes a wire record into a bearer string.
///
/// # Errors
///
/// Returns `AuthError::Internal` if the record cannot be serialized.
pub fn encode(info: &TokenInfo) -> AuthResult<String> {
    let json = serde_json::to_vec(info)
        .map_err(|e| AuthError::internal(format!("Failed to serialize token info: {e}")))?;
    Ok(URL_SAFE_NO_PAD.encode(json))
}

/// Decodes a bearer string.
///
/// Returns `None` for anything that is not a well-formed record.
#[must_use]
pub fn decode(serial: &str) -> Option<TokenInfo> {
    let bytes = URL_SAFE_NO_PAD.decode(serial.trim()).ok()?;
    let info: TokenInfo = serde_json::from_slice(&bytes).ok()?;
    if info.id.is_empty() {
        return None;
    }
    Some(info)
}
