//! In-memory scope definitions.

use std::collections::BTreeSet;

use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use portal_auth::storage::ScopeStorage;
use portal_auth::{AuthError, AuthResult, Scope};

/// Scopes keyed by id.
#[derive(Debug, Default)]
pub struct InMemoryScopeStorage {
    scopes: DashMap<String, Scope>,
}

impl InMemoryScopeStorage {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ScopeStorage for InMemoryScopeStorage {
    async fn find_by_ids(&self, ids: &BTreeSet<String>) -> AuthResult<Vec<Scope>> {
        Ok(ids
            .iter()
            .filter_map(|id| self.scopes.get(id).map(|s| s.value().clone()))
            .collect())
    }

    async fn find_by_data_provider(&self, data_provider_id: &str) -> AuthResult<Vec<Scope>> {
        let mut found: Vec<Scope> = self
            .scopes
            .iter()
            .filter(|s| s.data_provider_id.as_deref() == Some(data_provider_id))
            .map(|s| s.value().clone())
            .collect();
        found.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(found)
    }

    async fn create(&self, scope: &Scope) -> AuthResult<Scope> {
        match self.scopes.entry(scope.id.clone()) {
            Entry::Occupied(_) => Err(AuthError::storage(format!(
                "Scope '{}' already exists",
                scope.id
            ))),
            Entry::Vacant(slot) => {
                slot.insert(scope.clone());
                Ok(scope.clone())
            }
        }
    }
}
