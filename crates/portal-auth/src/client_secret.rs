//! Client secret generation and verification.
//!
//! Secrets are 256-bit random values shown to the client owner once. Only an
//! Argon2id PHC hash is stored.
//!
//! # Example
//!
//! ```
//! use portal_auth::client_secret::{generate_client_secret, hash_client_secret, verify_client_secret};
//!
//! let secret = generate_client_secret();
//! let hash = hash_client_secret(&secret).unwrap();
//! assert!(verify_client_secret(&secret, &hash).unwrap());
//! ```

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use rand::Rng;

/// Generate a new client secret.
///
/// # Format
///
/// `cs_{64 hex characters}`
pub fn generate_client_secret() -> String {
    let bytes: [u8; 32] = rand::thread_rng().r#gen();
    format!("cs_{}", hex::encode(bytes))
}

/// Hash a client secret for storage using Argon2id with a random salt.
///
/// # Errors
///
/// Returns `argon2::password_hash::Error` if hashing fails.
pub fn hash_client_secret(secret: &str) -> Result<String, argon2::password_hash::Error> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default().hash_password(secret.as_bytes(), &salt)?;
    Ok(hash.to_string())
}

/// Verify a client secret against a stored Argon2 hash.
///
/// # Returns
///
/// `Ok(true)` if the secret matches, `Ok(false)` if it doesn't.
///
/// # Errors
///
/// Returns `Err` only if the stored hash is not a PHC string.
pub fn verify_client_secret(secret: &str, hash: &str) -> Result<bool, argon2::password_hash::Error> {
    let parsed_hash = PasswordHash::new(hash)?;
    let result = Argon2::default().verify_password(secret.as_bytes(), &parsed_hash);
    Ok(result.is_ok())
}
