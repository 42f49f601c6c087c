//! In-memory client registrations.

use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use portal_auth::client_secret::verify_client_secret;
use portal_auth::storage::ClientStorage;
use portal_auth::{AuthError, AuthResult, Client};

/// Registered clients keyed by `client_id`.
#[derive(Debug, Default)]
pub struct InMemoryClientStorage {
    clients: DashMap<String, Client>,
}

impl InMemoryClientStorage {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ClientStorage for InMemoryClientStorage {
    async fn find_by_client_id(&self, client_id: &str) -> AuthResult<Option<Client>> {
        Ok(self.clients.get(client_id).map(|c| c.value().clone()))
    }

    async fn create(&self, client: &Client) -> AuthResult<Client> {
        match self.clients.entry(client.client_id.clone()) {
            Entry::Occupied(_) => Err(AuthError::storage(format!(
                "Client '{}' already exists",
                client.client_id
            ))),
            Entry::Vacant(slot) => {
                slot.insert(client.clone());
                Ok(client.clone())
            }
        }
    }

    async fn verify_secret(&self, client_id: &str, secret: &str) -> AuthResult<bool> {
        let Some(hash) = self
            .clients
            .get(client_id)
            .and_then(|c| c.client_secret.clone())
        else {
            return Ok(false);
        };
        verify_client_secret(secret, &hash).map_err(|e| AuthError::storage(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use portal_auth::client_secret::hash_client_secret;

    fn client(client_id: &str, secret: Option<&str>) -> Client {
        Client {
            client_id: client_id.to_string(),
            client_secret: secret.map(|s| hash_client_secret(s).unwrap()),
            name: "App".to_string(),
            description: None,
            client_uri: None,
            redirect_uris: vec!["https://a.example.com/cb".to_string()],
            active: true,
        }
    }

    #[tokio::test]
    async fn test_create_and_find() {
        let storage = InMemoryClientStorage::new();
        storage.create(&client("app-a", Some("s3cret"))).await.unwrap();

        let found = storage.find_by_client_id("app-a").await.unwrap().unwrap();
        assert_eq!(found.client_id, "app-a");
        assert!(storage.find_by_client_id("app-b").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_client_is_rejected() {
        let storage = InMemoryClientStorage::new();
        storage.create(&client("app-a", None)).await.unwrap();
        assert!(storage.create(&client("app-a", None)).await.is_err());
    }

    #[tokio::test]
    async fn test_verify_secret() {
        let storage = InMemoryClientStorage::new();
        storage.create(&client("app-a", Some("s3cret"))).await.unwrap();
        storage.create(&client("app-b", None)).await.unwrap();

        assert!(storage.verify_secret("app-a", "s3cret").await.unwrap());
        assert!(!storage.verify_secret("app-a", "wrong").await.unwrap());
        assert!(!storage.verify_secret("app-b", "anything").await.unwrap());
        assert!(!storage.verify_secret("app-c", "s3cret").await.unwrap());
    }
}
