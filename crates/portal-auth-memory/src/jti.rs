//! In-memory replay guard entries.

use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use portal_auth::AuthResult;
use portal_auth::storage::JtiStorage;
use time::OffsetDateTime;

/// Used JTIs and the instant each may be forgotten.
#[derive(Debug, Default)]
pub struct InMemoryJtiStorage {
    used: DashMap<String, OffsetDateTime>,
}

impl InMemoryJtiStorage {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl JtiStorage for InMemoryJtiStorage {
    async fn mark_used(&self, jti: &str, expires_at: OffsetDateTime) -> AuthResult<bool> {
        match self.used.entry(jti.to_string()) {
            Entry::Occupied(_) => Ok(false),
            Entry::Vacant(slot) => {
                slot.insert(expires_at);
                Ok(true)
            }
        }
    }

    async fn is_used(&self, jti: &str) -> AuthResult<bool> {
        Ok(self.used.contains_key(jti))
    }

    async fn cleanup_expired(&self, now: OffsetDateTime) -> AuthResult<u64> {
        let before = self.used.len();
        self.used.retain(|_, expires_at| *expires_at > now);
        Ok(before.saturating_sub(self.used.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use time::macros::datetime;

    #[tokio::test]
    async fn test_mark_used_once() {
        let storage = InMemoryJtiStorage::new();
        let exp = datetime!(2024-03-01 13:00 UTC);

        assert!(!storage.is_used("jti-1").await.unwrap());
        assert!(storage.mark_used("jti-1", exp).await.unwrap());
        assert!(!storage.mark_used("jti-1", exp).await.unwrap());
        assert!(storage.is_used("jti-1").await.unwrap());
    }

    #[tokio::test]
    async fn test_concurrent_marking_has_one_winner() {
        let storage = Arc::new(InMemoryJtiStorage::new());
        let exp = datetime!(2024-03-01 13:00 UTC);

        let mut tasks = Vec::new();
        for _ in 0..8 {
            let storage = storage.clone();
            tasks.push(tokio::spawn(async move {
                storage.mark_used("jti-1", exp).await.unwrap()
            }));
        }
        let mut winners = 0;
        for task in tasks {
            if task.await.unwrap() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
    }

    #[tokio::test]
    async fn test_cleanup_expired() {
        let storage = InMemoryJtiStorage::new();
        storage
            .mark_used("old", datetime!(2024-03-01 11:00 UTC))
            .await
            .unwrap();
        storage
            .mark_used("edge", datetime!(2024-03-01 12:00 UTC))
            .await
            .unwrap();
        storage
            .mark_used("fresh", datetime!(2024-03-01 13:00 UTC))
            .await
            .unwrap();

        let removed = storage
            .cleanup_expired(datetime!(2024-03-01 12:00 UTC))
            .await
            .unwrap();
        assert_eq!(removed, 2);
        assert!(storage.is_used("fresh").await.unwrap());
        assert!(!storage.is_used("edge").await.unwrap());
    }
}
