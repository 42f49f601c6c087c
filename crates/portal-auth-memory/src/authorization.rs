//! In-memory consent records.

use std::collections::BTreeSet;

use async_trait::async_trait;
use dashmap::DashMap;
use portal_auth::AuthResult;
use portal_auth::storage::AuthorizationStorage;

/// Consent records keyed by `(account, client)`.
#[derive(Debug, Default)]
pub struct InMemoryAuthorizationStorage {
    records: DashMap<(String, String), BTreeSet<String>>,
}

impl InMemoryAuthorizationStorage {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

fn key(account_id: &str, client_id: &str) -> (String, String) {
    (account_id.to_string(), client_id.to_string())
}

#[async_trait]
impl AuthorizationStorage for InMemoryAuthorizationStorage {
    async fn authorize(
        &self,
        account_id: &str,
        client_id: &str,
        scope_ids: &BTreeSet<String>,
    ) -> AuthResult<()> {
        self.records
            .entry(key(account_id, client_id))
            .or_default()
            .extend(scope_ids.iter().cloned());
        tracing::debug!(account_id = %account_id, client_id = %client_id, "Recorded consent");
        Ok(())
    }

    async fn get_authorized_scopes(
        &self,
        account_id: &str,
        client_id: &str,
    ) -> AuthResult<BTreeSet<String>> {
        Ok(self
            .records
            .get(&key(account_id, client_id))
            .map(|record| record.value().clone())
            .unwrap_or_default())
    }

    async fn revoke(&self, account_id: &str, client_id: &str) -> AuthResult<()> {
        self.records.remove(&key(account_id, client_id));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scopes(value: &str) -> BTreeSet<String> {
        value.split_whitespace().map(str::to_string).collect()
    }

    #[tokio::test]
    async fn test_consent_accumulates() {
        let storage = InMemoryAuthorizationStorage::new();
        storage
            .authorize("alice", "app-a", &scopes("openid profile"))
            .await
            .unwrap();
        storage
            .authorize("alice", "app-a", &scopes("email"))
            .await
            .unwrap();

        assert_eq!(
            storage.get_authorized_scopes("alice", "app-a").await.unwrap(),
            scopes("email openid profile")
        );
        assert!(
            storage
                .get_authorized_scopes("alice", "app-b")
                .await
                .unwrap()
                .is_empty()
        );
    }

    #[tokio::test]
    async fn test_revoke_consent() {
        let storage = InMemoryAuthorizationStorage::new();
        storage
            .authorize("alice", "app-a", &scopes("openid"))
            .await
            .unwrap();
        storage.revoke("alice", "app-a").await.unwrap();
        storage.revoke("alice", "app-a").await.unwrap();

        assert!(
            storage
                .get_authorized_scopes("alice", "app-a")
                .await
                .unwrap()
                .is_empty()
        );
    }
}
