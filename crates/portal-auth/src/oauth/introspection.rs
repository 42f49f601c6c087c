//! Token introspection for data providers.
//!
//! A data provider (a client that owns scopes) learns whether an access token
//! is live and which of *its own* scopes the token carries. Anything else,
//! from a malformed string to a token with none of the caller's scopes,
//! yields `{"active": false}`.

use std::collections::BTreeSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::AuthResult;
use crate::storage::ScopeStorage;
use crate::token::{AccessToken, TokenHandler};
use crate::types::join_scopes;

/// Introspection response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntrospectionResponse {
    /// Whether the token is live and relevant to the caller.
    pub active: bool,

    /// Expiry, seconds since the epoch.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exp: Option<i64>,

    /// Issue time, seconds since the epoch.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,

    /// The caller's scopes carried by the token.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,

    /// Client the token was issued to.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,

    /// Account the token acts for.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,

    /// Always `Bearer` for active tokens.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,
}

impl IntrospectionResponse {
    /// The response for every token the caller may not learn about.
    #[must_use]
    pub fn inactive() -> Self {
        Self {
            active: false,
            exp: None,
            iat: None,
            scope: None,
            client_id: None,
            sub: None,
            token_type: None,
        }
    }
}

/// Answers introspection requests.
#[derive(Clone)]
pub struct IntrospectionService {
    handler: TokenHandler,
    scopes: Arc<dyn ScopeStorage>,
}

impl IntrospectionService {
    /// Creates an introspection service.
    #[must_use]
    pub fn new(handler: TokenHandler, scopes: Arc<dyn ScopeStorage>) -> Self {
        Self { handler, scopes }
    }

    /// Introspects `token` on behalf of the data provider `caller_id`.
    ///
    /// # Errors
    ///
    /// Returns an error only if storage fails.
    pub async fn introspect(
        &self,
        caller_id: &str,
        token: Option<&str>,
    ) -> AuthResult<IntrospectionResponse> {
        let Some(token) = token else {
            return Ok(IntrospectionResponse::inactive());
        };
        let Some(access_token) = self.handler.get_checked_token::<AccessToken>(token).await? else {
            return Ok(IntrospectionResponse::inactive());
        };

        let entitled: BTreeSet<String> = self
            .scopes
            .find_by_data_provider(caller_id)
            .await?
            .into_iter()
            .map(|scope| scope.id)
            .collect();
        let visible: BTreeSet<String> = access_token
            .grant
            .scope_ids
            .intersection(&entitled)
            .cloned()
            .collect();
        if visible.is_empty() {
            tracing::debug!(client_id = %caller_id, "Token carries none of the caller's scopes");
            return Ok(IntrospectionResponse::inactive());
        }

        let meta = &access_token.meta;
        Ok(IntrospectionResponse {
            active: true,
            exp: Some(meta.expiration_time().unix_timestamp()),
            iat: Some(meta.creation_time.unix_timestamp()),
            scope: Some(join_scopes(&visible)),
            client_id: Some(access_token.grant.service_provider_id.clone()),
            sub: Some(access_token.grant.account_id.clone()),
            token_type: Some("Bearer".to_string()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::config::TokenLifetimes;
    use crate::testing::{MockScopeStorage, MockTokenStorage, scope, scopes};
    use crate::token::GrantSource;
    use time::Duration;
    use time::macros::datetime;

    async fn setup() -> (IntrospectionService, TokenHandler, FixedClock, String) {
        let clock = FixedClock::new(datetime!(2024-03-01 12:00 UTC));
        let handler = TokenHandler::new(
            Arc::new(MockTokenStorage::default()),
            Arc::new(clock.clone()),
            TokenLifetimes::default(),
        );
        let scope_storage = MockScopeStorage::default();
        for s in [
            scope("dp1.read", Some("dp-1")),
            scope("dp1.write", Some("dp-1")),
            scope("dp2.read", Some("dp-2")),
        ] {
            scope_storage.create(&s).await.unwrap();
        }

        let sid = handler
            .create_sid_token("alice", None, &handler.generate_pass())
            .await
            .unwrap();
        let code = handler
            .create_authorization_code(
                &sid,
                scopes("openid dp1.read dp2.read"),
                "app-a",
                None,
                "https://a.example.com/cb",
                None,
                &handler.generate_pass(),
            )
            .await
            .unwrap();
        let access = handler
            .create_access_token(
                GrantSource::AuthorizationCode(&code),
                None,
                &handler.generate_pass(),
            )
            .await
            .unwrap();
        let serial = handler.serialize(&access.meta).unwrap();

        (
            IntrospectionService::new(handler.clone(), Arc::new(scope_storage)),
            handler,
            clock,
            serial,
        )
    }

    #[tokio::test]
    async fn test_active_token_shows_only_callers_scopes() {
        let (service, _, _, token) = setup().await;
        let response = service.introspect("dp-1", Some(&token)).await.unwrap();
        assert!(response.active);
        assert_eq!(response.scope.as_deref(), Some("dp1.read"));
        assert_eq!(response.client_id.as_deref(), Some("app-a"));
        assert_eq!(response.sub.as_deref(), Some("alice"));
        assert_eq!(response.token_type.as_deref(), Some("Bearer"));
        assert_eq!(response.exp.unwrap() - response.iat.unwrap(), 3600);
    }

    #[tokio::test]
    async fn test_disjoint_scopes_are_inactive() {
        let (service, _, _, token) = setup().await;
        let response = service.introspect("dp-3", Some(&token)).await.unwrap();
        assert_eq!(response, IntrospectionResponse::inactive());
    }

    #[tokio::test]
    async fn test_expired_and_garbage_tokens_are_inactive() {
        let (service, _, clock, token) = setup().await;
        assert!(!service.introspect("dp-1", Some("garbage")).await.unwrap().active);
        assert!(!service.introspect("dp-1", None).await.unwrap().active);

        clock.advance(Duration::hours(2));
        assert!(!service.introspect("dp-1", Some(&token)).await.unwrap().active);
    }

    #[test]
    fn test_inactive_serializes_to_single_field() {
        let json = serde_json::to_value(IntrospectionResponse::inactive()).unwrap();
        assert_eq!(json, serde_json::json!({ "active": false }));
    }
}
