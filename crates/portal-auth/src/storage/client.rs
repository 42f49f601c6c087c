//! Client storage trait.
//!
//! Defines the lookups the protocol endpoints need on registered clients
//! (app instances). Registration management lives outside this crate.

use async_trait::async_trait;

use crate::AuthResult;
use crate::types::Client;

// =============================================================================
// Client Storage Trait
// =============================================================================

/// Storage operations for registered clients.
///
/// # Example
///
/// ```ignore
/// use portal_auth::storage::ClientStorage;
///
/// async fn example(storage: &impl ClientStorage) -> portal_auth::AuthResult<()> {
///     if let Some(client) = storage.find_by_client_id("app-a").await? {
///         println!("Found client: {}", client.name);
///     }
///     Ok(())
/// }
/// ```
#[async_trait]
pub trait ClientStorage: Send + Sync {
    /// Find a client by its client_id.
    ///
    /// Inactive clients are returned too; callers check `Client::active`.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn find_by_client_id(&self, client_id: &str) -> AuthResult<Option<Client>>;

    /// Register a client.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - A client with the same client_id already exists
    /// - The storage operation fails
    async fn create(&self, client: &Client) -> AuthResult<Client>;

    /// Verify a client secret against the stored Argon2 hash.
    ///
    /// # Returns
    ///
    /// - `Ok(true)` if the secret matches
    /// - `Ok(false)` if it doesn't, the client has no secret, or is unknown
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn verify_secret(&self, client_id: &str, secret: &str) -> AuthResult<bool>;
}
