//! Mock storages shared by unit tests.

use std::collections::{BTreeSet, HashMap};
use std::sync::{OnceLock, RwLock};
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use time::{Duration, OffsetDateTime};

use crate::AuthResult;
use crate::client_secret::verify_client_secret;
use crate::error::AuthError;
use crate::storage::{
    AuthorizationStorage, ClientStorage, JtiStorage, ScopeStorage, TokenStorage,
};
use crate::token::{SigningKeyPair, Token, TokenKind};
use crate::types::{Client, Scope};

pub(crate) const ISSUER: &str = "https://portal.example.com";

pub(crate) fn scopes(value: &str) -> BTreeSet<String> {
    crate::types::parse_scope_param(value)
}

/// One RSA key for the whole test binary; generation is slow.
pub(crate) fn signing_key() -> SigningKeyPair {
    static KEY: OnceLock<SigningKeyPair> = OnceLock::new();
    KEY.get_or_init(|| SigningKeyPair::generate().unwrap()).clone()
}

pub(crate) fn client(client_id: &str, secret: &str, redirect_uri: &str) -> Client {
    Client {
        client_id: client_id.to_string(),
        client_secret: Some(crate::client_secret::hash_client_secret(secret).unwrap()),
        name: format!("App {client_id}"),
        description: None,
        client_uri: None,
        redirect_uris: vec![redirect_uri.to_string()],
        active: true,
    }
}

pub(crate) fn scope(id: &str, data_provider_id: Option<&str>) -> Scope {
    Scope {
        id: id.to_string(),
        name: format!("Scope {id}"),
        description: None,
        data_provider_id: data_provider_id.map(str::to_string),
    }
}

// =============================================================================
// Tokens
// =============================================================================

#[derive(Default)]
pub(crate) struct MockTokenStorage {
    tokens: RwLock<HashMap<String, Token>>,
    lookups: AtomicUsize,
}

impl MockTokenStorage {
    pub(crate) fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }

    pub(crate) fn get(&self, id: &str) -> Option<Token> {
        self.tokens.read().unwrap().get(id).cloned()
    }

    fn revoke_where(&self, pred: impl Fn(&Token) -> bool) -> u64 {
        let mut tokens = self.tokens.write().unwrap();
        let doomed: Vec<String> = tokens
            .values()
            .filter(|t| pred(t))
            .map(|t| t.id().to_string())
            .collect();
        let mut removed = 0;
        for id in doomed {
            removed += remove_with_descendants(&mut tokens, &id);
        }
        removed
    }
}

fn remove_with_descendants(tokens: &mut HashMap<String, Token>, id: &str) -> u64 {
    if tokens.remove(id).is_none() {
        return 0;
    }
    let before = tokens.len();
    tokens.retain(|_, t| !t.meta().ancestor_ids.iter().any(|a| a == id));
    1 + (before - tokens.len()) as u64
}

#[async_trait]
impl TokenStorage for MockTokenStorage {
    async fn get_token(&self, lookup_key: &str) -> AuthResult<Option<Token>> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .tokens
            .read()
            .unwrap()
            .values()
            .find(|t| t.meta().lookup_key == lookup_key)
            .cloned())
    }

    async fn get_token_by_id(&self, id: &str) -> AuthResult<Option<Token>> {
        Ok(self.get(id))
    }

    async fn register_token(&self, _account_id: &str, token: &Token) -> AuthResult<bool> {
        let mut tokens = self.tokens.write().unwrap();
        if tokens.contains_key(token.id()) {
            return Ok(false);
        }
        tokens.insert(token.id().to_string(), token.clone());
        Ok(true)
    }

    async fn revoke_token(&self, id: &str) -> AuthResult<bool> {
        let mut tokens = self.tokens.write().unwrap();
        Ok(remove_with_descendants(&mut tokens, id) > 0)
    }

    async fn renew_token(
        &self,
        id: &str,
        creation_time: OffsetDateTime,
        time_to_live: Duration,
    ) -> AuthResult<bool> {
        let mut tokens = self.tokens.write().unwrap();
        Ok(match tokens.get_mut(id) {
            Some(token) => {
                let meta = token.meta_mut();
                meta.creation_time = creation_time;
                meta.time_to_live = time_to_live;
                true
            }
            None => false,
        })
    }

    async fn reauthenticate_sid_token(
        &self,
        id: &str,
        authentication_time: OffsetDateTime,
    ) -> AuthResult<bool> {
        let mut tokens = self.tokens.write().unwrap();
        Ok(match tokens.get_mut(id) {
            Some(Token::Sid(sid)) => {
                sid.authentication_time = authentication_time;
                true
            }
            _ => false,
        })
    }

    async fn revoke_tokens_for_account(&self, account_id: &str) -> AuthResult<u64> {
        Ok(self.revoke_where(|t| t.account_id() == account_id))
    }

    async fn revoke_tokens_for_account_and_kind(
        &self,
        account_id: &str,
        kind: TokenKind,
    ) -> AuthResult<u64> {
        Ok(self.revoke_where(|t| t.account_id() == account_id && t.kind() == kind))
    }

    async fn revoke_tokens_for_client(&self, client_id: &str) -> AuthResult<u64> {
        Ok(self.revoke_where(|t| {
            t.oauth_grant()
                .is_some_and(|g| g.service_provider_id == client_id)
        }))
    }

    async fn revoke_tokens_for_scopes(&self, scope_ids: &BTreeSet<String>) -> AuthResult<u64> {
        Ok(self.revoke_where(|t| {
            t.oauth_grant()
                .is_some_and(|g| !g.scope_ids.is_disjoint(scope_ids))
        }))
    }

    async fn revoke_invitation_tokens_for_membership(
        &self,
        membership_id: &str,
    ) -> AuthResult<u64> {
        Ok(self.revoke_where(
            |t| matches!(t, Token::MembershipInvitation(i) if i.membership_id == membership_id),
        ))
    }

    async fn cleanup_expired(&self, now: OffsetDateTime) -> AuthResult<u64> {
        let mut tokens = self.tokens.write().unwrap();
        let before = tokens.len();
        tokens.retain(|_, t| t.meta().is_valid_at(now));
        Ok((before - tokens.len()) as u64)
    }

    async fn get_all_clients_for_session(&self, sid_id: &str) -> AuthResult<BTreeSet<String>> {
        Ok(self
            .tokens
            .read()
            .unwrap()
            .values()
            .filter(|t| t.meta().ancestor_ids.iter().any(|a| a == sid_id))
            .filter_map(|t| t.oauth_grant().map(|g| g.service_provider_id.clone()))
            .collect())
    }
}

// =============================================================================
// Replay guard
// =============================================================================

#[derive(Default)]
pub(crate) struct MockJtiStorage {
    used: RwLock<HashMap<String, OffsetDateTime>>,
}

#[async_trait]
impl JtiStorage for MockJtiStorage {
    async fn mark_used(&self, jti: &str, expires_at: OffsetDateTime) -> AuthResult<bool> {
        let mut used = self.used.write().unwrap();
        if used.contains_key(jti) {
            return Ok(false);
        }
        used.insert(jti.to_string(), expires_at);
        Ok(true)
    }

    async fn is_used(&self, jti: &str) -> AuthResult<bool> {
        Ok(self.used.read().unwrap().contains_key(jti))
    }

    async fn cleanup_expired(&self, now: OffsetDateTime) -> AuthResult<u64> {
        let mut used = self.used.write().unwrap();
        let before = used.len();
        used.retain(|_, exp| *exp > now);
        Ok((before - used.len()) as u64)
    }
}

// =============================================================================
// Consent, clients, scopes
// =============================================================================

#[derive(Default)]
pub(crate) struct MockAuthorizationStorage {
    records: RwLock<HashMap<(String, String), BTreeSet<String>>>,
}

#[async_trait]
impl AuthorizationStorage for MockAuthorizationStorage {
    async fn authorize(
        &self,
        account_id: &str,
        client_id: &str,
        scope_ids: &BTreeSet<String>,
    ) -> AuthResult<()> {
        self.records
            .write()
            .unwrap()
            .entry((account_id.to_string(), client_id.to_string()))
            .or_default()
            .extend(scope_ids.iter().cloned());
        Ok(())
    }

    async fn get_authorized_scopes(
        &self,
        account_id: &str,
        client_id: &str,
    ) -> AuthResult<BTreeSet<String>> {
        Ok(self
            .records
            .read()
            .unwrap()
            .get(&(account_id.to_string(), client_id.to_string()))
            .cloned()
            .unwrap_or_default())
    }

    async fn revoke(&self, account_id: &str, client_id: &str) -> AuthResult<()> {
        self.records
            .write()
            .unwrap()
            .remove(&(account_id.to_string(), client_id.to_string()));
        Ok(())
    }
}

#[derive(Default)]
pub(crate) struct MockClientStorage {
    clients: RwLock<HashMap<String, Client>>,
}

#[async_trait]
impl ClientStorage for MockClientStorage {
    async fn find_by_client_id(&self, client_id: &str) -> AuthResult<Option<Client>> {
        Ok(self.clients.read().unwrap().get(client_id).cloned())
    }

    async fn create(&self, client: &Client) -> AuthResult<Client> {
        self.clients
            .write()
            .unwrap()
            .insert(client.client_id.clone(), client.clone());
        Ok(client.clone())
    }

    async fn verify_secret(&self, client_id: &str, secret: &str) -> AuthResult<bool> {
        let Some(hash) = self
            .clients
            .read()
            .unwrap()
            .get(client_id)
            .and_then(|c| c.client_secret.clone())
        else {
            return Ok(false);
        };
        verify_client_secret(secret, &hash).map_err(|e| AuthError::storage(e.to_string()))
    }
}

#[derive(Default)]
pub(crate) struct MockScopeStorage {
    scopes: RwLock<HashMap<String, Scope>>,
}

#[async_trait]
impl ScopeStorage for MockScopeStorage {
    async fn find_by_ids(&self, ids: &BTreeSet<String>) -> AuthResult<Vec<Scope>> {
        let scopes = self.scopes.read().unwrap();
        Ok(ids.iter().filter_map(|id| scopes.get(id).cloned()).collect())
    }

    async fn find_by_data_provider(&self, data_provider_id: &str) -> AuthResult<Vec<Scope>> {
        let mut found: Vec<Scope> = self
            .scopes
            .read()
            .unwrap()
            .values()
            .filter(|s| s.data_provider_id.as_deref() == Some(data_provider_id))
            .cloned()
            .collect();
        found.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(found)
    }

    async fn create(&self, scope: &Scope) -> AuthResult<Scope> {
        self.scopes
            .write()
            .unwrap()
            .insert(scope.id.clone(), scope.clone());
        Ok(scope.clone())
    }
}
