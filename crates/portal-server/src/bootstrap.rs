//! Seeds client and scope registrations from configuration.
//!
//! Registrations that already exist are left untouched, so restarting with
//! the same configuration is a no-op.

use anyhow::Context;
use portal_auth::client_secret::hash_client_secret;
use portal_auth::{Client, ClientStorage, Scope, ScopeStorage};
use std::collections::BTreeSet;
use tracing::{debug, info};

use crate::config::{BootstrapClient, BootstrapConfig, BootstrapScope};

/// Registers every configured client and scope that is not stored yet.
///
/// # Errors
///
/// Returns an error if a client registration is invalid, a secret cannot be
/// hashed, or a storage operation fails.
pub async fn seed_registrations(
    config: &BootstrapConfig,
    clients: &dyn ClientStorage,
    scopes: &dyn ScopeStorage,
) -> anyhow::Result<BootstrapStats> {
    let mut stats = BootstrapStats::default();

    for entry in &config.clients {
        if clients.find_by_client_id(&entry.client_id).await?.is_some() {
            debug!(client_id = %entry.client_id, "Client already registered, skipping");
            stats.skipped += 1;
            continue;
        }
        let client = to_client(entry)?;
        clients.create(&client).await?;
        info!(client_id = %client.client_id, "Registered client");
        stats.clients += 1;
    }

    for entry in &config.scopes {
        let ids = BTreeSet::from([entry.id.clone()]);
        if !scopes.find_by_ids(&ids).await?.is_empty() {
            debug!(scope_id = %entry.id, "Scope already registered, skipping");
            stats.skipped += 1;
            continue;
        }
        scopes.create(&to_scope(entry)).await?;
        info!(scope_id = %entry.id, "Registered scope");
        stats.scopes += 1;
    }

    Ok(stats)
}

fn to_client(entry: &BootstrapClient) -> anyhow::Result<Client> {
    let hash = hash_client_secret(&entry.secret)
        .map_err(|e| anyhow::anyhow!("failed to hash secret of '{}': {e}", entry.client_id))?;
    let client = Client {
        client_id: entry.client_id.clone(),
        client_secret: Some(hash),
        name: entry.name.clone(),
        description: entry.description.clone(),
        client_uri: entry.client_uri.clone(),
        redirect_uris: entry.redirect_uris.clone(),
        active: entry.active,
    };
    client
        .validate()
        .with_context(|| format!("invalid client registration '{}'", entry.client_id))?;
    Ok(client)
}

fn to_scope(entry: &BootstrapScope) -> Scope {
    Scope {
        id: entry.id.clone(),
        name: entry.name.clone(),
        description: entry.description.clone(),
        data_provider_id: entry.data_provider_id.clone(),
    }
}

/// Counts of what a bootstrap run registered.
#[derive(Debug, Default)]
pub struct BootstrapStats {
    pub clients: usize,
    pub scopes: usize,
    pub skipped: usize,
}

impl BootstrapStats {
    /// Returns the number of registrations created.
    pub fn total(&self) -> usize {
        self.clients + self.scopes
    }
}
