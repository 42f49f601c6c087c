//! Token revocation (RFC 7009).

use crate::AuthResult;
use crate::error::AuthError;
use crate::token::{CheckedToken, OAuthToken, TokenHandler};

/// Revokes a code, access token or refresh token held by `client_id`.
///
/// A token that cannot be resolved counts as revoked. Revoking cascades to
/// every token derived from it.
///
/// # Errors
///
/// Returns `UnauthorizedClient` if the token belongs to another client, or a
/// storage error.
pub async fn revoke(handler: &TokenHandler, client_id: &str, token: &str) -> AuthResult<()> {
    let Some(token) = handler.get_checked_token::<OAuthToken>(token).await? else {
        return Ok(());
    };

    if token.grant().service_provider_id != client_id {
        tracing::warn!(
            client_id = %client_id,
            owner = %token.grant().service_provider_id,
            "Revocation of a token issued to another client"
        );
        return Err(AuthError::unauthorized_client(
            "Token was issued to another client",
        ));
    }

    handler.revoke_token(&token.meta().id).await?;
    tracing::info!(client_id = %client_id, "Revoked token");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::config::TokenLifetimes;
    use crate::testing::{MockTokenStorage, scopes};
    use crate::token::{AccessToken, GrantSource, RefreshToken};
    use std::sync::Arc;
    use time::macros::datetime;

    fn handler() -> TokenHandler {
        TokenHandler::new(
            Arc::new(MockTokenStorage::default()),
            Arc::new(FixedClock::new(datetime!(2024-03-01 12:00 UTC))),
            TokenLifetimes::default(),
        )
    }

    async fn refresh_and_access(handler: &TokenHandler) -> (String, String) {
        let sid = handler
            .create_sid_token("alice", None, &handler.generate_pass())
            .await
            .unwrap();
        let code = handler
            .create_authorization_code(
                &sid,
                scopes("openid offline_access"),
                "app-a",
                None,
                "https://a.example.com/cb",
                None,
                &handler.generate_pass(),
            )
            .await
            .unwrap();
        let refresh = handler
            .create_refresh_token(&code, &handler.generate_pass())
            .await
            .unwrap();
        let access = handler
            .create_access_token(
                GrantSource::RefreshToken(&refresh),
                None,
                &handler.generate_pass(),
            )
            .await
            .unwrap();
        (
            handler.serialize(&refresh.meta).unwrap(),
            handler.serialize(&access.meta).unwrap(),
        )
    }

    #[tokio::test]
    async fn test_revoking_refresh_token_cascades() {
        let handler = handler();
        let (refresh, access) = refresh_and_access(&handler).await;

        revoke(&handler, "app-a", &refresh).await.unwrap();

        assert!(
            handler
                .get_checked_token::<RefreshToken>(&refresh)
                .await
                .unwrap()
                .is_none()
        );
        assert!(
            handler
                .get_checked_token::<AccessToken>(&access)
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn test_revocation_is_idempotent() {
        let handler = handler();
        let (_, access) = refresh_and_access(&handler).await;

        revoke(&handler, "app-a", &access).await.unwrap();
        revoke(&handler, "app-a", &access).await.unwrap();
        revoke(&handler, "app-a", "never-issued").await.unwrap();
    }

    #[tokio::test]
    async fn test_foreign_token_is_unauthorized_client() {
        let handler = handler();
        let (_, access) = refresh_and_access(&handler).await;

        let err = revoke(&handler, "app-b", &access).await.unwrap_err();
        assert_eq!(err.oauth_error_code(), "unauthorized_client");
        assert!(
            handler
                .get_checked_token::<AccessToken>(&access)
                .await
                .unwrap()
                .is_some()
        );
    }
}
