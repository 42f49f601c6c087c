//! Replay guard for externally signed one-time assertions.
//!
//! The guard is the hook for grants that accept client-signed assertions
//! (JWT client authentication, the JWT-bearer grant). None of the endpoints
//! served here accepts one. `id_token_hint` is not routed through it: the
//! same hint is legitimately sent with many authorization requests.
//!
//! The server runs [`ReplayGuard::start_cleanup_task`] so entries recorded
//! by an embedding application are purged once their assertion expires.

use std::sync::Arc;
use std::time::Duration;

use time::OffsetDateTime;

use crate::AuthResult;
use crate::clock::Clock;
use crate::storage::JtiStorage;

/// Marks assertion ids (`jti`) as consumed.
#[derive(Clone)]
pub struct ReplayGuard {
    storage: Arc<dyn JtiStorage>,
    clock: Arc<dyn Clock>,
}

impl ReplayGuard {
    /// Creates a guard over a JTI store.
    pub fn new(storage: Arc<dyn JtiStorage>, clock: Arc<dyn Clock>) -> Self {
        Self { storage, clock }
    }

    /// Records the first use of `jti`.
    ///
    /// Returns `false` if the id was seen before, or if the assertion has
    /// already expired (an expired entry could be forgotten at any time, so
    /// accepting it would reopen the replay window).
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    pub async fn mark_as_used(&self, jti: &str, expiration_time: OffsetDateTime) -> AuthResult<bool> {
        if jti.is_empty() || expiration_time <= self.clock.now() {
            return Ok(false);
        }

        let first_use = self.storage.mark_used(jti, expiration_time).await?;
        if !first_use {
            tracing::warn!(jti = %jti, "Replayed assertion id rejected");
        }
        Ok(first_use)
    }

    /// Forgets entries whose assertion has expired.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    pub async fn cleanup_expired(&self) -> AuthResult<u64> {
        let deleted = self.storage.cleanup_expired(self.clock.now()).await?;
        if deleted > 0 {
            tracing::info!(deleted = deleted, "Cleaned up expired assertion ids");
        }
        Ok(deleted)
    }

    /// Starts a background task purging expired entries every `every`.
    pub fn start_cleanup_task(self, every: Duration) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);

            loop {
                interval.tick().await;

                if let Err(e) = self.cleanup_expired().await {
                    tracing::warn!(error = %e, "Assertion id cleanup failed");
                }
            }
        })
    }
}
