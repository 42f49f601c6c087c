//! Token repository trait.
//!
//! The repository owns persistence and uniqueness of token ids. Tokens are
//! fetched by their lookup key (the keyed derivation carried in bearer
//! strings); the storage id is only used for ancestry walks, revocation, and
//! the narrow in-place updates the handler performs.
//!
//! # Atomicity
//!
//! `revoke_token` doubles as the single-use gate for authorization codes:
//! when two callers revoke the same id concurrently exactly one must observe
//! `true`.

use std::collections::BTreeSet;

use async_trait::async_trait;
use time::{Duration, OffsetDateTime};

use crate::AuthResult;
use crate::token::{Token, TokenKind};

// =============================================================================
// Token Storage Trait
// =============================================================================

/// Storage operations for issued tokens.
#[async_trait]
pub trait TokenStorage: Send + Sync {
    /// Finds a token by its lookup key.
    ///
    /// Returns `None` if no token (or a revoked one) has this key. Expiry is
    /// not checked here.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn get_token(&self, lookup_key: &str) -> AuthResult<Option<Token>>;

    /// Finds a token by its storage id.
    ///
    /// Only used to walk ancestry (e.g. to recover the session behind an
    /// authorization code).
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn get_token_by_id(&self, id: &str) -> AuthResult<Option<Token>>;

    /// Registers a newly issued token.
    ///
    /// # Arguments
    ///
    /// * `account_id` - Account the token belongs to
    /// * `token` - The token to store
    ///
    /// # Returns
    ///
    /// Returns `false` if a token with the same id or lookup key already exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn register_token(&self, account_id: &str, token: &Token) -> AuthResult<bool>;

    /// Revokes a token and every token whose ancestry contains it.
    ///
    /// # Returns
    ///
    /// Returns `true` if this call removed the token, `false` if it was
    /// already gone. Concurrent callers for the same id see at most one `true`.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn revoke_token(&self, id: &str) -> AuthResult<bool>;

    /// Moves the validity window of a token.
    ///
    /// Only `creation_time` and `time_to_live` change.
    ///
    /// # Returns
    ///
    /// Returns `false` if the token does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn renew_token(
        &self,
        id: &str,
        creation_time: OffsetDateTime,
        time_to_live: Duration,
    ) -> AuthResult<bool>;

    /// Records a fresh authentication on a session token.
    ///
    /// # Returns
    ///
    /// Returns `false` if the token does not exist or is not a session.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn reauthenticate_sid_token(
        &self,
        id: &str,
        authentication_time: OffsetDateTime,
    ) -> AuthResult<bool>;

    /// Revokes every token of an account.
    ///
    /// # Returns
    ///
    /// Returns the number of tokens removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn revoke_tokens_for_account(&self, account_id: &str) -> AuthResult<u64>;

    /// Revokes every token of one kind for an account.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn revoke_tokens_for_account_and_kind(
        &self,
        account_id: &str,
        kind: TokenKind,
    ) -> AuthResult<u64>;

    /// Revokes every OAuth token bound to a client.
    ///
    /// Used when a client registration is deleted.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn revoke_tokens_for_client(&self, client_id: &str) -> AuthResult<u64>;

    /// Revokes every OAuth token holding any of the given scopes.
    ///
    /// Used when a scope is deleted.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn revoke_tokens_for_scopes(&self, scope_ids: &BTreeSet<String>) -> AuthResult<u64>;

    /// Revokes outstanding invitations into a membership.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn revoke_invitation_tokens_for_membership(&self, membership_id: &str)
    -> AuthResult<u64>;

    /// Lists the clients holding tokens derived from a session.
    ///
    /// # Arguments
    ///
    /// * `sid_id` - Storage id of the session token
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn get_all_clients_for_session(&self, sid_id: &str) -> AuthResult<BTreeSet<String>>;

    /// Deletes tokens no longer valid at `now`.
    ///
    /// Only the expired tokens go; tokens derived from them keep their own
    /// lifetime.
    ///
    /// Returns the number of tokens deleted.
    ///
    /// # Errors
    ///
    /// Returns an error if the cleanup operation fails.
    async fn cleanup_expired(&self, now: OffsetDateTime) -> AuthResult<u64>;
}
