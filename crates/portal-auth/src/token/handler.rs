//! Token handler.
//!
//! The only writer of tokens. Creates, chains, validates and revokes tokens,
//! enforcing lifetimes from [`TokenLifetimes`] against the injected clock.
//!
//! Ancestry rules:
//!
//! | token | ancestors |
//! |---|---|
//! | authorization code | `sid.ancestors + [sid]` |
//! | access token from code | `code.ancestors + [code]` |
//! | access token from refresh token | `refresh.ancestors + [refresh]` |
//! | refresh token | `[code]` (outlives the browser session) |
//! | account tokens | `[]` |

use std::collections::BTreeSet;
use std::sync::Arc;

use time::OffsetDateTime;
use uuid::Uuid;

use crate::AuthResult;
use crate::clock::Clock;
use crate::config::TokenLifetimes;
use crate::error::AuthError;
use crate::storage::TokenStorage;
use crate::token::codec::{self, TokenInfo};
use crate::token::model::{
    AccessToken, AccountActivationToken, AuthorizationCode, ChangePasswordToken, CheckedToken,
    FederatedSession, MembershipInvitationToken, OAuthGrant, RefreshToken, SetPasswordToken,
    SidToken, Token, TokenKind, TokenMeta,
};

/// Token an access token is minted from.
#[derive(Debug, Clone, Copy)]
pub enum GrantSource<'a> {
    /// Redeemed (and revoked) authorization code.
    AuthorizationCode(&'a AuthorizationCode),
    /// Refresh token, left valid.
    RefreshToken(&'a RefreshToken),
}

impl GrantSource<'_> {
    fn meta(&self) -> &TokenMeta {
        match self {
            Self::AuthorizationCode(code) => &code.meta,
            Self::RefreshToken(refresh) => &refresh.meta,
        }
    }

    fn grant(&self) -> &OAuthGrant {
        match self {
            Self::AuthorizationCode(code) => &code.grant,
            Self::RefreshToken(refresh) => &refresh.grant,
        }
    }
}

/// Creates, validates and revokes tokens.
#[derive(Clone)]
pub struct TokenHandler {
    storage: Arc<dyn TokenStorage>,
    clock: Arc<dyn Clock>,
    lifetimes: TokenLifetimes,
}

impl TokenHandler {
    /// Creates a handler over a token repository.
    pub fn new(
        storage: Arc<dyn TokenStorage>,
        clock: Arc<dyn Clock>,
        lifetimes: TokenLifetimes,
    ) -> Self {
        Self {
            storage,
            clock,
            lifetimes,
        }
    }

    /// Returns the clock expiry is computed against.
    #[must_use]
    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Returns the configured lifetimes.
    #[must_use]
    pub fn lifetimes(&self) -> &TokenLifetimes {
        &self.lifetimes
    }

    /// Generates a fresh issuance pass.
    #[must_use]
    pub fn generate_pass(&self) -> String {
        codec::generate_pass()
    }

    /// Encodes the bearer string of a token.
    ///
    /// # Errors
    ///
    /// Returns an error if the wire record cannot be serialized.
    pub fn serialize(&self, meta: &TokenMeta) -> AuthResult<String> {
        codec::encode(&TokenInfo::for_token(meta))
    }

    // =========================================================================
    // Session tokens
    // =========================================================================

    /// Opens a browser session for an authenticated account.
    ///
    /// # Errors
    ///
    /// Returns an error if the token cannot be registered.
    pub async fn create_sid_token(
        &self,
        account_id: &str,
        federated_session: Option<FederatedSession>,
        pass: &str,
    ) -> AuthResult<SidToken> {
        require_account(account_id)?;
        let meta = self.new_meta(pass, self.lifetimes.sid_token, Vec::new())?;
        let token = SidToken {
            authentication_time: meta.creation_time,
            meta,
            account_id: account_id.to_string(),
            federated_session,
        };
        self.register(account_id, token.clone().into()).await?;
        tracing::debug!(account_id = %account_id, "Opened session");
        Ok(token)
    }

    /// Slides the validity window of a session forward.
    ///
    /// Returns the renewed session, whose serialization replaces the old
    /// cookie, or `None` if the session no longer exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    pub async fn renew_sid_token(&self, sid: &SidToken) -> AuthResult<Option<SidToken>> {
        let creation_time = truncate_to_seconds(self.clock.now());
        let ttl = to_time(self.lifetimes.sid_token)?;
        if !self
            .storage
            .renew_token(&sid.meta.id, creation_time, ttl)
            .await?
        {
            return Ok(None);
        }

        let mut renewed = sid.clone();
        renewed.meta.creation_time = creation_time;
        renewed.meta.time_to_live = ttl;
        Ok(Some(renewed))
    }

    /// Records that the session's user just authenticated again.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    pub async fn reauthenticate(&self, sid: &SidToken) -> AuthResult<bool> {
        self.storage
            .reauthenticate_sid_token(&sid.meta.id, self.clock.now())
            .await
    }

    /// Finds the session a token descends from.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    pub async fn find_session(&self, meta: &TokenMeta) -> AuthResult<Option<SidToken>> {
        for ancestor_id in meta.ancestor_ids.iter().rev() {
            if let Some(Token::Sid(sid)) = self.storage.get_token_by_id(ancestor_id).await? {
                return Ok(Some(sid));
            }
        }
        Ok(None)
    }

    // =========================================================================
    // OAuth tokens
    // =========================================================================

    /// Issues an authorization code within a session.
    ///
    /// # Errors
    ///
    /// Returns `InvalidRequest` if the session has no account, or an error if
    /// the code cannot be registered.
    #[allow(clippy::too_many_arguments)]
    pub async fn create_authorization_code(
        &self,
        sid: &SidToken,
        scope_ids: BTreeSet<String>,
        client_id: &str,
        nonce: Option<String>,
        redirect_uri: &str,
        code_challenge: Option<String>,
        pass: &str,
    ) -> AuthResult<AuthorizationCode> {
        require_account(&sid.account_id)?;
        let meta = self.new_meta(
            pass,
            self.lifetimes.authorization_code,
            sid.meta.child_ancestry(),
        )?;
        let code = AuthorizationCode {
            meta,
            grant: OAuthGrant {
                account_id: sid.account_id.clone(),
                service_provider_id: client_id.to_string(),
                scope_ids,
            },
            nonce,
            redirect_uri: redirect_uri.to_string(),
            code_challenge,
        };
        self.register(&sid.account_id, code.clone().into()).await?;
        tracing::info!(client_id = %client_id, account_id = %sid.account_id, "Issued authorization code");
        Ok(code)
    }

    /// Mints an access token from a code or a refresh token.
    ///
    /// A code source is revoked first; losing that race means the code was
    /// already redeemed and the call fails. `scope_ids` defaults to the
    /// source's scopes and may only narrow them.
    ///
    /// # Errors
    ///
    /// - `InvalidScope` if `scope_ids` is not a subset of the source's scopes
    /// - `InvalidToken` if the code was already redeemed
    /// - storage errors
    pub async fn create_access_token(
        &self,
        source: GrantSource<'_>,
        scope_ids: Option<BTreeSet<String>>,
        pass: &str,
    ) -> AuthResult<AccessToken> {
        let granted = &source.grant().scope_ids;
        let scope_ids = match scope_ids {
            Some(requested) if !requested.is_subset(granted) => {
                return Err(AuthError::invalid_scope(
                    "Requested scope exceeds the original grant",
                ));
            }
            Some(requested) => requested,
            None => granted.clone(),
        };

        let refresh_token_id = match source {
            GrantSource::AuthorizationCode(code) => {
                self.consume_code(code).await?;
                None
            }
            GrantSource::RefreshToken(refresh) => Some(refresh.meta.id.clone()),
        };

        let grant = source.grant();
        let meta = self.new_meta(
            pass,
            self.lifetimes.access_token,
            source.meta().child_ancestry(),
        )?;
        let token = AccessToken {
            meta,
            grant: OAuthGrant {
                account_id: grant.account_id.clone(),
                service_provider_id: grant.service_provider_id.clone(),
                scope_ids,
            },
            refresh_token_id,
        };
        self.register(&grant.account_id, token.clone().into()).await?;
        tracing::info!(client_id = %grant.service_provider_id, "Issued access token");
        Ok(token)
    }

    /// Mints a refresh token from an authorization code, revoking the code.
    ///
    /// # Errors
    ///
    /// Returns `InvalidToken` if the code was already redeemed, or a storage
    /// error.
    pub async fn create_refresh_token(
        &self,
        code: &AuthorizationCode,
        pass: &str,
    ) -> AuthResult<RefreshToken> {
        self.consume_code(code).await?;

        let meta = self.new_meta(
            pass,
            self.lifetimes.refresh_token,
            vec![code.meta.id.clone()],
        )?;
        let token = RefreshToken {
            meta,
            grant: code.grant.clone(),
        };
        self.register(&code.grant.account_id, token.clone().into())
            .await?;
        tracing::info!(client_id = %code.grant.service_provider_id, "Issued refresh token");
        Ok(token)
    }

    // =========================================================================
    // Account tokens
    // =========================================================================

    /// Issues an account activation link, replacing any outstanding one.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    pub async fn create_account_activation_token(
        &self,
        account_id: &str,
        continue_url: Option<String>,
        pass: &str,
    ) -> AuthResult<AccountActivationToken> {
        require_account(account_id)?;
        self.storage
            .revoke_tokens_for_account_and_kind(account_id, TokenKind::AccountActivation)
            .await?;
        let token = AccountActivationToken {
            meta: self.new_meta(pass, self.lifetimes.account_activation, Vec::new())?,
            account_id: account_id.to_string(),
            continue_url,
        };
        self.register(account_id, token.clone().into()).await?;
        Ok(token)
    }

    /// Issues a change-password link, replacing any outstanding one.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    pub async fn create_change_password_token(
        &self,
        account_id: &str,
        pass: &str,
    ) -> AuthResult<ChangePasswordToken> {
        require_account(account_id)?;
        self.storage
            .revoke_tokens_for_account_and_kind(account_id, TokenKind::ChangePassword)
            .await?;
        let token = ChangePasswordToken {
            meta: self.new_meta(pass, self.lifetimes.change_password, Vec::new())?,
            account_id: account_id.to_string(),
        };
        self.register(account_id, token.clone().into()).await?;
        Ok(token)
    }

    /// Issues a set-password link, replacing any outstanding one.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    pub async fn create_set_password_token(
        &self,
        account_id: &str,
        pass: &str,
    ) -> AuthResult<SetPasswordToken> {
        require_account(account_id)?;
        self.storage
            .revoke_tokens_for_account_and_kind(account_id, TokenKind::SetPassword)
            .await?;
        let token = SetPasswordToken {
            meta: self.new_meta(pass, self.lifetimes.set_password, Vec::new())?,
            account_id: account_id.to_string(),
        };
        self.register(account_id, token.clone().into()).await?;
        Ok(token)
    }

    /// Issues an invitation into a membership, replacing earlier invitations
    /// into the same membership.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    pub async fn create_membership_invitation_token(
        &self,
        account_id: &str,
        membership_id: &str,
        pass: &str,
    ) -> AuthResult<MembershipInvitationToken> {
        require_account(account_id)?;
        self.storage
            .revoke_invitation_tokens_for_membership(membership_id)
            .await?;
        let token = MembershipInvitationToken {
            meta: self.new_meta(pass, self.lifetimes.membership_invitation, Vec::new())?,
            account_id: account_id.to_string(),
            membership_id: membership_id.to_string(),
        };
        self.register(account_id, token.clone().into()).await?;
        Ok(token)
    }

    // =========================================================================
    // Validation and revocation
    // =========================================================================

    /// Registers a token with the repository.
    ///
    /// Returns `false` if the id or lookup key is already taken.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    pub async fn register_token(&self, account_id: &str, token: &Token) -> AuthResult<bool> {
        self.storage.register_token(account_id, token).await
    }

    /// Resolves a bearer string into a live token of kind `T`.
    ///
    /// Malformed strings and strings whose embedded expiry has passed are
    /// rejected without touching the repository. The stored token is then
    /// re-checked, so a fabricated wire record never validates on its own.
    /// Every rejection is `Ok(None)`.
    ///
    /// # Errors
    ///
    /// Returns an error only if the storage operation fails.
    pub async fn get_checked_token<T: CheckedToken>(&self, serial: &str) -> AuthResult<Option<T>> {
        let Some(info) = codec::decode(serial) else {
            tracing::debug!(expected = T::EXPECTED, "Rejected malformed token");
            return Ok(None);
        };

        let now = self.clock.now();
        if info.is_expired_at(now) {
            tracing::debug!(expected = T::EXPECTED, "Rejected expired token");
            return Ok(None);
        }

        let Some(token) = self.storage.get_token(&info.id).await? else {
            tracing::debug!(expected = T::EXPECTED, "Rejected unknown token");
            return Ok(None);
        };

        let meta = token.meta();
        if meta.lookup_key != info.id || !meta.is_valid_at(now) {
            tracing::debug!(expected = T::EXPECTED, "Rejected stale token");
            return Ok(None);
        }

        let kind = token.kind();
        let checked = T::from_token(token);
        if checked.is_none() {
            tracing::debug!(expected = T::EXPECTED, actual = %kind, "Rejected token of another kind");
        }
        Ok(checked)
    }

    /// Revokes a token and its descendants.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    pub async fn revoke_token(&self, id: &str) -> AuthResult<bool> {
        self.storage.revoke_token(id).await
    }

    /// Deletes tokens that have expired by the handler's clock.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    pub async fn cleanup_expired(&self) -> AuthResult<u64> {
        let deleted = self.storage.cleanup_expired(self.clock.now()).await?;
        if deleted > 0 {
            tracing::info!(deleted = deleted, "Cleaned up expired tokens");
        }
        Ok(deleted)
    }

    /// Starts a background task deleting expired tokens every `every`.
    pub fn start_cleanup_task(self, every: std::time::Duration) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);

            loop {
                interval.tick().await;

                if let Err(e) = self.cleanup_expired().await {
                    tracing::warn!(error = %e, "Expired token cleanup failed");
                }
            }
        })
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    async fn consume_code(&self, code: &AuthorizationCode) -> AuthResult<()> {
        if self.storage.revoke_token(&code.meta.id).await? {
            return Ok(());
        }
        tracing::warn!(
            client_id = %code.grant.service_provider_id,
            "Authorization code redeemed twice"
        );
        Err(AuthError::invalid_token("Authorization code already redeemed"))
    }

    fn new_meta(
        &self,
        pass: &str,
        ttl: std::time::Duration,
        ancestor_ids: Vec<String>,
    ) -> AuthResult<TokenMeta> {
        let id = Uuid::new_v4().to_string();
        let lookup_key = codec::make_id(&id, pass)?;
        Ok(TokenMeta::new(
            id,
            lookup_key,
            truncate_to_seconds(self.clock.now()),
            to_time(ttl)?,
            ancestor_ids,
        ))
    }

    async fn register(&self, account_id: &str, token: Token) -> AuthResult<()> {
        if self.storage.register_token(account_id, &token).await? {
            Ok(())
        } else {
            Err(AuthError::storage(format!(
                "Token id collision registering {}",
                token.kind()
            )))
        }
    }
}

fn require_account(account_id: &str) -> AuthResult<()> {
    if account_id.is_empty() {
        return Err(AuthError::invalid_request("Account id is required"));
    }
    Ok(())
}

fn to_time(duration: std::time::Duration) -> AuthResult<time::Duration> {
    time::Duration::try_from(duration)
        .map_err(|e| AuthError::configuration(format!("Token lifetime out of range: {e}")))
}

// Wire records carry whole seconds.
fn truncate_to_seconds(instant: OffsetDateTime) -> OffsetDateTime {
    instant.replace_nanosecond(0).unwrap_or(instant)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::testing::{MockTokenStorage, scopes};
    use crate::token::model::OAuthToken;
    use time::macros::datetime;

    struct Fixture {
        handler: TokenHandler,
        storage: Arc<MockTokenStorage>,
        clock: FixedClock,
    }

    fn fixture() -> Fixture {
        let storage = Arc::new(MockTokenStorage::default());
        let clock = FixedClock::new(datetime!(2024-03-01 12:00 UTC));
        let handler = TokenHandler::new(
            storage.clone(),
            Arc::new(clock.clone()),
            TokenLifetimes::default(),
        );
        Fixture {
            handler,
            storage,
            clock,
        }
    }

    async fn code_with(f: &Fixture, scope: &str) -> (SidToken, AuthorizationCode, String) {
        let sid = f
            .handler
            .create_sid_token("alice", None, &f.handler.generate_pass())
            .await
            .unwrap();
        let pass = f.handler.generate_pass();
        let code = f
            .handler
            .create_authorization_code(
                &sid,
                scopes(scope),
                "app-a",
                Some("nonce-1".to_string()),
                "https://app.example.com/cb",
                None,
                &pass,
            )
            .await
            .unwrap();
        let serial = f.handler.serialize(&code.meta).unwrap();
        (sid, code, serial)
    }

    #[tokio::test]
    async fn test_code_redeems_once() {
        let f = fixture();
        let (_, code, serial) = code_with(&f, "openid profile").await;

        let pass = f.handler.generate_pass();
        let access = f
            .handler
            .create_access_token(GrantSource::AuthorizationCode(&code), None, &pass)
            .await
            .unwrap();
        assert_eq!(access.grant.scope_ids, scopes("openid profile"));

        let err = f
            .handler
            .create_access_token(GrantSource::AuthorizationCode(&code), None, &pass)
            .await
            .unwrap_err();
        assert_eq!(err.oauth_error_code(), "invalid_token");

        let err = f.handler.create_refresh_token(&code, &pass).await.unwrap_err();
        assert_eq!(err.oauth_error_code(), "invalid_token");

        assert!(
            f.handler
                .get_checked_token::<AuthorizationCode>(&serial)
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn test_concurrent_redemption_single_winner() {
        let f = fixture();
        let (_, code, _) = code_with(&f, "openid").await;

        let mut handles = Vec::new();
        for i in 0..16 {
            let handler = f.handler.clone();
            let code = code.clone();
            handles.push(tokio::spawn(async move {
                let pass = handler.generate_pass();
                if i % 2 == 0 {
                    handler
                        .create_access_token(GrantSource::AuthorizationCode(&code), None, &pass)
                        .await
                        .is_ok()
                } else {
                    handler.create_refresh_token(&code, &pass).await.is_ok()
                }
            }));
        }

        let mut successes = 0;
        for handle in handles {
            if handle.await.unwrap() {
                successes += 1;
            }
        }
        assert_eq!(successes, 1);
    }

    #[tokio::test]
    async fn test_refresh_narrows_never_widens() {
        let f = fixture();
        let (_, code, _) = code_with(&f, "a b c").await;
        let refresh = f
            .handler
            .create_refresh_token(&code, &f.handler.generate_pass())
            .await
            .unwrap();

        let narrowed = f
            .handler
            .create_access_token(
                GrantSource::RefreshToken(&refresh),
                Some(scopes("a c")),
                &f.handler.generate_pass(),
            )
            .await
            .unwrap();
        assert_eq!(narrowed.grant.scope_ids, scopes("a c"));
        assert_eq!(narrowed.refresh_token_id.as_deref(), Some(refresh.meta.id.as_str()));

        let err = f
            .handler
            .create_access_token(
                GrantSource::RefreshToken(&refresh),
                Some(scopes("a d")),
                &f.handler.generate_pass(),
            )
            .await
            .unwrap_err();
        assert_eq!(err.oauth_error_code(), "invalid_scope");

        // the refresh token stays usable
        let serial = f.handler.serialize(&refresh.meta).unwrap();
        assert!(
            f.handler
                .get_checked_token::<RefreshToken>(&serial)
                .await
                .unwrap()
                .is_some()
        );
    }

    #[tokio::test]
    async fn test_widening_scope_keeps_code_alive() {
        let f = fixture();
        let (_, code, serial) = code_with(&f, "openid").await;
        let err = f
            .handler
            .create_access_token(
                GrantSource::AuthorizationCode(&code),
                Some(scopes("openid admin")),
                &f.handler.generate_pass(),
            )
            .await
            .unwrap_err();
        assert_eq!(err.oauth_error_code(), "invalid_scope");
        assert!(
            f.handler
                .get_checked_token::<AuthorizationCode>(&serial)
                .await
                .unwrap()
                .is_some()
        );
    }

    #[tokio::test]
    async fn test_lifetime_boundary() {
        let f = fixture();
        let (_, _, serial) = code_with(&f, "openid").await;

        f.clock.advance(time::Duration::seconds(59));
        assert!(
            f.handler
                .get_checked_token::<AuthorizationCode>(&serial)
                .await
                .unwrap()
                .is_some()
        );

        f.clock.advance(time::Duration::seconds(2));
        assert!(
            f.handler
                .get_checked_token::<AuthorizationCode>(&serial)
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn test_cleanup_drops_only_expired_tokens() {
        let f = fixture();
        let (sid, code, _) = code_with(&f, "openid").await;

        assert_eq!(f.handler.cleanup_expired().await.unwrap(), 0);

        f.clock.advance(time::Duration::minutes(2));
        assert_eq!(f.handler.cleanup_expired().await.unwrap(), 1);
        assert!(f.storage.get(&code.meta.id).is_none());
        assert!(f.storage.get(&sid.meta.id).is_some());

        f.clock.advance(time::Duration::days(1));
        assert_eq!(f.handler.cleanup_expired().await.unwrap(), 1);
        assert!(f.storage.get(&sid.meta.id).is_none());
    }

    #[tokio::test]
    async fn test_garbage_rejected_without_lookup() {
        let f = fixture();
        for serial in ["", "!!!", "eyJpZCI6", "bm90IGpzb24"] {
            assert!(
                f.handler
                    .get_checked_token::<AccessToken>(serial)
                    .await
                    .unwrap()
                    .is_none()
            );
        }
        assert_eq!(f.storage.lookups(), 0);
    }

    #[tokio::test]
    async fn test_expired_wire_record_rejected_without_lookup() {
        let f = fixture();
        let (_, _, serial) = code_with(&f, "openid").await;
        f.clock.advance(time::Duration::hours(1));
        assert!(
            f.handler
                .get_checked_token::<AuthorizationCode>(&serial)
                .await
                .unwrap()
                .is_none()
        );
        assert_eq!(f.storage.lookups(), 0);
    }

    #[tokio::test]
    async fn test_fabricated_wire_record_rejected() {
        let f = fixture();
        let forged = codec::encode(&TokenInfo {
            id: codec::make_id("some-id", "guess").unwrap(),
            iat: 1_709_294_400,
            exp: 1_909_294_400,
        })
        .unwrap();
        assert!(
            f.handler
                .get_checked_token::<AccessToken>(&forged)
                .await
                .unwrap()
                .is_none()
        );
        assert_eq!(f.storage.lookups(), 1);
    }

    #[tokio::test]
    async fn test_extended_wire_expiry_does_not_extend_token() {
        let f = fixture();
        let (_, code, _) = code_with(&f, "openid").await;
        let forged = codec::encode(&TokenInfo {
            id: code.meta.lookup_key.clone(),
            iat: code.meta.creation_time.unix_timestamp(),
            exp: code.meta.creation_time.unix_timestamp() + 86_400,
        })
        .unwrap();
        f.clock.advance(time::Duration::minutes(5));
        assert!(
            f.handler
                .get_checked_token::<AuthorizationCode>(&forged)
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn test_wrong_kind_rejected() {
        let f = fixture();
        let (_, _, serial) = code_with(&f, "openid").await;
        assert!(
            f.handler
                .get_checked_token::<AccessToken>(&serial)
                .await
                .unwrap()
                .is_none()
        );
        assert!(
            f.handler
                .get_checked_token::<RefreshToken>(&serial)
                .await
                .unwrap()
                .is_none()
        );
        assert!(
            f.handler
                .get_checked_token::<OAuthToken>(&serial)
                .await
                .unwrap()
                .is_some()
        );
    }

    #[tokio::test]
    async fn test_ancestry_chain() {
        let f = fixture();
        let (sid, code, _) = code_with(&f, "openid offline_access").await;
        assert_eq!(code.meta.ancestor_ids, vec![sid.meta.id.clone()]);

        let refresh = f
            .handler
            .create_refresh_token(&code, &f.handler.generate_pass())
            .await
            .unwrap();
        assert_eq!(refresh.meta.ancestor_ids, vec![code.meta.id.clone()]);

        let access = f
            .handler
            .create_access_token(
                GrantSource::RefreshToken(&refresh),
                None,
                &f.handler.generate_pass(),
            )
            .await
            .unwrap();
        assert_eq!(
            access.meta.ancestor_ids,
            vec![code.meta.id.clone(), refresh.meta.id.clone()]
        );
    }

    #[tokio::test]
    async fn test_session_end_spares_refresh_tokens() {
        let f = fixture();
        let (sid, code, _) = code_with(&f, "openid offline_access").await;
        let refresh = f
            .handler
            .create_refresh_token(&code, &f.handler.generate_pass())
            .await
            .unwrap();

        assert!(f.handler.revoke_token(&sid.meta.id).await.unwrap());
        let serial = f.handler.serialize(&refresh.meta).unwrap();
        assert!(
            f.handler
                .get_checked_token::<RefreshToken>(&serial)
                .await
                .unwrap()
                .is_some()
        );
    }

    #[tokio::test]
    async fn test_revoking_refresh_kills_derived_access_tokens() {
        let f = fixture();
        let (_, code, _) = code_with(&f, "openid offline_access").await;
        let refresh = f
            .handler
            .create_refresh_token(&code, &f.handler.generate_pass())
            .await
            .unwrap();
        let access = f
            .handler
            .create_access_token(
                GrantSource::RefreshToken(&refresh),
                None,
                &f.handler.generate_pass(),
            )
            .await
            .unwrap();

        assert!(f.handler.revoke_token(&refresh.meta.id).await.unwrap());
        let serial = f.handler.serialize(&access.meta).unwrap();
        assert!(
            f.handler
                .get_checked_token::<AccessToken>(&serial)
                .await
                .unwrap()
                .is_none()
        );
        assert!(!f.handler.revoke_token(&refresh.meta.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_find_session_of_code() {
        let f = fixture();
        let (sid, code, _) = code_with(&f, "openid").await;
        let found = f.handler.find_session(&code.meta).await.unwrap().unwrap();
        assert_eq!(found.meta.id, sid.meta.id);
        assert_eq!(found.authentication_time, datetime!(2024-03-01 12:00 UTC));
    }

    #[tokio::test]
    async fn test_reauthenticate_and_renew_session() {
        let f = fixture();
        let pass = f.handler.generate_pass();
        let sid = f.handler.create_sid_token("alice", None, &pass).await.unwrap();
        let serial = f.handler.serialize(&sid.meta).unwrap();

        f.clock.advance(time::Duration::hours(20));
        assert!(f.handler.reauthenticate(&sid).await.unwrap());
        let renewed_sid = f.handler.renew_sid_token(&sid).await.unwrap().unwrap();
        assert_eq!(renewed_sid.meta.creation_time, datetime!(2024-03-02 08:00 UTC));

        // renewed past the original expiry; the old wire record has expired but
        // a fresh serialization of the renewed token validates
        f.clock.advance(time::Duration::hours(10));
        assert!(
            f.handler
                .get_checked_token::<SidToken>(&serial)
                .await
                .unwrap()
                .is_none()
        );
        let stored = f.storage.get(&sid.meta.id).unwrap();
        assert_eq!(stored.meta(), &renewed_sid.meta);
        let renewed_serial = f.handler.serialize(&renewed_sid.meta).unwrap();
        let renewed = f
            .handler
            .get_checked_token::<SidToken>(&renewed_serial)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(renewed.authentication_time, datetime!(2024-03-02 08:00 UTC));
        assert_eq!(renewed.meta.ancestor_ids, sid.meta.ancestor_ids);
    }

    #[tokio::test]
    async fn test_account_token_replaces_previous() {
        let f = fixture();
        let first = f
            .handler
            .create_change_password_token("alice", &f.handler.generate_pass())
            .await
            .unwrap();
        let second = f
            .handler
            .create_change_password_token("alice", &f.handler.generate_pass())
            .await
            .unwrap();
        let other = f
            .handler
            .create_set_password_token("alice", &f.handler.generate_pass())
            .await
            .unwrap();

        let first_serial = f.handler.serialize(&first.meta).unwrap();
        let second_serial = f.handler.serialize(&second.meta).unwrap();
        let other_serial = f.handler.serialize(&other.meta).unwrap();
        assert!(
            f.handler
                .get_checked_token::<ChangePasswordToken>(&first_serial)
                .await
                .unwrap()
                .is_none()
        );
        assert!(
            f.handler
                .get_checked_token::<ChangePasswordToken>(&second_serial)
                .await
                .unwrap()
                .is_some()
        );
        assert!(
            f.handler
                .get_checked_token::<SetPasswordToken>(&other_serial)
                .await
                .unwrap()
                .is_some()
        );
    }

    #[tokio::test]
    async fn test_invitation_replaces_previous_for_membership() {
        let f = fixture();
        let first = f
            .handler
            .create_membership_invitation_token("owner", "membership-1", &f.handler.generate_pass())
            .await
            .unwrap();
        let activation = f
            .handler
            .create_account_activation_token(
                "bob",
                Some("https://portal.example.com/welcome".to_string()),
                &f.handler.generate_pass(),
            )
            .await
            .unwrap();
        f.handler
            .create_membership_invitation_token("owner", "membership-1", &f.handler.generate_pass())
            .await
            .unwrap();

        let serial = f.handler.serialize(&first.meta).unwrap();
        assert!(
            f.handler
                .get_checked_token::<MembershipInvitationToken>(&serial)
                .await
                .unwrap()
                .is_none()
        );
        let serial = f.handler.serialize(&activation.meta).unwrap();
        let activation = f
            .handler
            .get_checked_token::<AccountActivationToken>(&serial)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(
            activation.continue_url.as_deref(),
            Some("https://portal.example.com/welcome")
        );
    }

    #[tokio::test]
    async fn test_empty_account_rejected() {
        let f = fixture();
        let err = f
            .handler
            .create_sid_token("", None, &f.handler.generate_pass())
            .await
            .unwrap_err();
        assert_eq!(err.oauth_error_code(), "invalid_request");
    }
}
