//! Scope storage trait.

use std::collections::BTreeSet;

use async_trait::async_trait;

use crate::AuthResult;
use crate::types::Scope;

/// Read access to scope definitions.
#[async_trait]
pub trait ScopeStorage: Send + Sync {
    /// Returns the scopes among `ids` that exist, in id order.
    ///
    /// Unknown ids are skipped; callers compare lengths to detect them.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn find_by_ids(&self, ids: &BTreeSet<String>) -> AuthResult<Vec<Scope>>;

    /// Returns the scopes owned by a data provider (a client acting as a
    /// resource server).
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn find_by_data_provider(&self, data_provider_id: &str) -> AuthResult<Vec<Scope>>;

    /// Registers a scope.
    ///
    /// # Errors
    ///
    /// Returns an error if a scope with the same id exists or the storage
    /// operation fails.
    async fn create(&self, scope: &Scope) -> AuthResult<Scope>;
}
