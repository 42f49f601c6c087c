//! Consent record storage trait.
//!
//! A consent record maps `(account, client)` to the scopes the account has
//! authorized for that client. Approving more scopes only ever adds to it.

use std::collections::BTreeSet;

use async_trait::async_trait;

use crate::AuthResult;

/// Storage trait for consent records.
#[async_trait]
pub trait AuthorizationStorage: Send + Sync {
    /// Adds scopes to the consent record of an account for a client.
    ///
    /// # Arguments
    ///
    /// * `account_id` - The consenting account
    /// * `client_id` - The client being authorized
    /// * `scope_ids` - Newly authorized scopes, merged into the record
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn authorize(
        &self,
        account_id: &str,
        client_id: &str,
        scope_ids: &BTreeSet<String>,
    ) -> AuthResult<()>;

    /// Returns the scopes an account has authorized for a client.
    ///
    /// Returns an empty set when no record exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn get_authorized_scopes(
        &self,
        account_id: &str,
        client_id: &str,
    ) -> AuthResult<BTreeSet<String>>;

    /// Deletes the consent record of an account for a client.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn revoke(&self, account_id: &str, client_id: &str) -> AuthResult<()>;
}
