//! JWT ID (JTI) storage trait for replay prevention.
//!
//! Externally signed one-time assertions carry a `jti`. Recording it with
//! the assertion's expiry lets the server refuse a second presentation.
//!
//! # Implementation Notes
//!
//! `mark_used` must check and mark in one atomic step: two concurrent
//! callers with the same JTI must not both observe `true`. Entries may be
//! dropped once their expiry has passed.

use async_trait::async_trait;
use time::OffsetDateTime;

use crate::AuthResult;

/// Storage trait for JWT ID (JTI) tracking.
#[async_trait]
pub trait JtiStorage: Send + Sync {
    /// Atomically marks a JTI as used if not already used.
    ///
    /// # Arguments
    ///
    /// * `jti` - The JWT ID to mark as used
    /// * `expires_at` - When this entry can be forgotten (the assertion's `exp`)
    ///
    /// # Returns
    ///
    /// Returns `true` on first use, `false` if the JTI was already marked.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn mark_used(&self, jti: &str, expires_at: OffsetDateTime) -> AuthResult<bool>;

    /// Checks if a JTI has already been used, without marking it.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn is_used(&self, jti: &str) -> AuthResult<bool>;

    /// Deletes entries whose expiry is at or before `now`.
    ///
    /// # Returns
    ///
    /// Returns the number of entries deleted.
    ///
    /// # Errors
    ///
    /// Returns an error if the cleanup operation fails.
    async fn cleanup_expired(&self, now: OffsetDateTime) -> AuthResult<u64>;
}
