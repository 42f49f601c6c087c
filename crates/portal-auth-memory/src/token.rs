//! In-memory token repository.

use std::collections::{BTreeSet, HashMap};

use async_trait::async_trait;
use portal_auth::AuthResult;
use portal_auth::storage::TokenStorage;
use portal_auth::token::{Token, TokenKind};
use time::{Duration, OffsetDateTime};
use tokio::sync::RwLock;

/// Tokens keyed by id, plus the lookup-key index.
///
/// Both maps sit behind one lock so registration, lookups and cascading
/// revocation see a consistent view.
#[derive(Debug, Default)]
struct TokenIndex {
    by_id: HashMap<String, Token>,
    by_lookup_key: HashMap<String, String>,
}

impl TokenIndex {
    /// Removes `id` and every token descending from it.
    fn remove_with_descendants(&mut self, id: &str) -> u64 {
        let Some(token) = self.by_id.remove(id) else {
            return 0;
        };
        self.by_lookup_key.remove(&token.meta().lookup_key);

        let descendants: Vec<String> = self
            .by_id
            .values()
            .filter(|t| t.meta().ancestor_ids.iter().any(|a| a == id))
            .map(|t| t.id().to_string())
            .collect();
        let mut removed = 1;
        for descendant in descendants {
            if let Some(token) = self.by_id.remove(&descendant) {
                self.by_lookup_key.remove(&token.meta().lookup_key);
                removed += 1;
            }
        }
        removed
    }

    fn remove_where(&mut self, pred: impl Fn(&Token) -> bool) -> u64 {
        let doomed: Vec<String> = self
            .by_id
            .values()
            .filter(|t| pred(t))
            .map(|t| t.id().to_string())
            .collect();
        doomed
            .iter()
            .map(|id| self.remove_with_descendants(id))
            .sum()
    }
}

/// Token repository on a process-local map.
#[derive(Debug, Default)]
pub struct InMemoryTokenStorage {
    index: RwLock<TokenIndex>,
}

impl InMemoryTokenStorage {
    /// Creates an empty repository.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live tokens, expired ones included.
    pub async fn len(&self) -> usize {
        self.index.read().await.by_id.len()
    }

    /// Whether the repository holds no token.
    pub async fn is_empty(&self) -> bool {
        self.index.read().await.by_id.is_empty()
    }
}

#[async_trait]
impl TokenStorage for InMemoryTokenStorage {
    async fn get_token(&self, lookup_key: &str) -> AuthResult<Option<Token>> {
        let index = self.index.read().await;
        Ok(index
            .by_lookup_key
            .get(lookup_key)
            .and_then(|id| index.by_id.get(id))
            .cloned())
    }

    async fn get_token_by_id(&self, id: &str) -> AuthResult<Option<Token>> {
        Ok(self.index.read().await.by_id.get(id).cloned())
    }

    async fn register_token(&self, account_id: &str, token: &Token) -> AuthResult<bool> {
        let mut index = self.index.write().await;
        let lookup_key = &token.meta().lookup_key;
        if index.by_id.contains_key(token.id()) || index.by_lookup_key.contains_key(lookup_key) {
            tracing::warn!(account_id = %account_id, kind = %token.kind(), "Token id collision");
            return Ok(false);
        }
        index
            .by_lookup_key
            .insert(lookup_key.clone(), token.id().to_string());
        index.by_id.insert(token.id().to_string(), token.clone());
        Ok(true)
    }

    async fn revoke_token(&self, id: &str) -> AuthResult<bool> {
        Ok(self.index.write().await.remove_with_descendants(id) > 0)
    }

    async fn renew_token(
        &self,
        id: &str,
        creation_time: OffsetDateTime,
        time_to_live: Duration,
    ) -> AuthResult<bool> {
        let mut index = self.index.write().await;
        let Some(token) = index.by_id.get_mut(id) else {
            return Ok(false);
        };
        let meta = token.meta_mut();
        meta.creation_time = creation_time;
        meta.time_to_live = time_to_live;
        Ok(true)
    }

    async fn reauthenticate_sid_token(
        &self,
        id: &str,
        authentication_time: OffsetDateTime,
    ) -> AuthResult<bool> {
        let mut index = self.index.write().await;
        match index.by_id.get_mut(id) {
            Some(Token::Sid(sid)) => {
                sid.authentication_time = authentication_time;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn revoke_tokens_for_account(&self, account_id: &str) -> AuthResult<u64> {
        Ok(self
            .index
            .write()
            .await
            .remove_where(|t| t.account_id() == account_id))
    }

    async fn revoke_tokens_for_account_and_kind(
        &self,
        account_id: &str,
        kind: TokenKind,
    ) -> AuthResult<u64> {
        Ok(self
            .index
            .write()
            .await
            .remove_where(|t| t.account_id() == account_id && t.kind() == kind))
    }

    async fn revoke_tokens_for_client(&self, client_id: &str) -> AuthResult<u64> {
        Ok(self.index.write().await.remove_where(|t| {
            t.oauth_grant()
                .is_some_and(|g| g.service_provider_id == client_id)
        }))
    }

    async fn revoke_tokens_for_scopes(&self, scope_ids: &BTreeSet<String>) -> AuthResult<u64> {
        Ok(self.index.write().await.remove_where(|t| {
            t.oauth_grant()
                .is_some_and(|g| !g.scope_ids.is_disjoint(scope_ids))
        }))
    }

    async fn revoke_invitation_tokens_for_membership(
        &self,
        membership_id: &str,
    ) -> AuthResult<u64> {
        Ok(self.index.write().await.remove_where(
            |t| matches!(t, Token::MembershipInvitation(i) if i.membership_id == membership_id),
        ))
    }

    async fn cleanup_expired(&self, now: OffsetDateTime) -> AuthResult<u64> {
        let mut index = self.index.write().await;
        let expired: Vec<String> = index
            .by_id
            .values()
            .filter(|t| !t.meta().is_valid_at(now))
            .map(|t| t.id().to_string())
            .collect();
        for id in &expired {
            if let Some(token) = index.by_id.remove(id) {
                index.by_lookup_key.remove(&token.meta().lookup_key);
            }
        }
        Ok(expired.len() as u64)
    }

    async fn get_all_clients_for_session(&self, sid_id: &str) -> AuthResult<BTreeSet<String>> {
        Ok(self
            .index
            .read()
            .await
            .by_id
            .values()
            .filter(|t| t.meta().ancestor_ids.iter().any(|a| a == sid_id))
            .filter_map(|t| t.oauth_grant().map(|g| g.service_provider_id.clone()))
            .collect())
    }
}
