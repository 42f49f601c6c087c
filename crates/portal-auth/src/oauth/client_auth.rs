//! Client authentication for the back-channel endpoints.
//!
//! The token, introspection and revocation endpoints all require a
//! registered, active client with a secret.
//!
//! # Authentication Methods
//!
//! - `client_secret_basic` - HTTP Basic Auth with client_id:client_secret
//! - `client_secret_post` - client_id and client_secret in the form body
//!
//! When an `Authorization: Basic` header is present it wins and the form
//! fields are ignored.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::AuthResult;
use crate::error::AuthError;
use crate::oauth::params::RequestParams;
use crate::storage::ClientStorage;
use crate::types::Client;

/// Result of successful client authentication.
#[derive(Debug, Clone)]
pub struct AuthenticatedClient {
    /// The authenticated client.
    pub client: Client,

    /// The authentication method used.
    pub auth_method: TokenEndpointAuthMethod,
}

/// Token endpoint authentication methods.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenEndpointAuthMethod {
    /// Client secret via HTTP Basic Auth.
    ClientSecretBasic,

    /// Client secret in request body.
    ClientSecretPost,
}

impl TokenEndpointAuthMethod {
    /// Returns the string representation of the auth method.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ClientSecretBasic => "client_secret_basic",
            Self::ClientSecretPost => "client_secret_post",
        }
    }
}

impl fmt::Display for TokenEndpointAuthMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Authenticates the calling client.
///
/// # Arguments
///
/// * `basic_auth` - Credentials from the `Authorization` header, if any
/// * `params` - The form body, consulted for `client_secret_post`
/// * `client_storage` - Storage for looking up client registrations
///
/// # Errors
///
/// Returns `InvalidClient` if no credentials were sent, the client is
/// unknown or inactive, or the secret is wrong. Returns `InvalidRequest` if
/// the form repeats a credential parameter.
pub async fn authenticate_client(
    basic_auth: Option<(String, String)>,
    params: &RequestParams,
    client_storage: &dyn ClientStorage,
) -> AuthResult<AuthenticatedClient> {
    if let Some((client_id, client_secret)) = basic_auth {
        return verify(
            &client_id,
            &client_secret,
            TokenEndpointAuthMethod::ClientSecretBasic,
            client_storage,
        )
        .await;
    }

    match (
        params.optional("client_id")?,
        params.optional("client_secret")?,
    ) {
        (Some(client_id), Some(client_secret)) => {
            verify(
                client_id,
                client_secret,
                TokenEndpointAuthMethod::ClientSecretPost,
                client_storage,
            )
            .await
        }
        _ => Err(AuthError::invalid_client("No client credentials provided")),
    }
}

async fn verify(
    client_id: &str,
    client_secret: &str,
    auth_method: TokenEndpointAuthMethod,
    client_storage: &dyn ClientStorage,
) -> AuthResult<AuthenticatedClient> {
    let client = client_storage
        .find_by_client_id(client_id)
        .await?
        .ok_or_else(|| AuthError::invalid_client("Unknown client"))?;

    if !client.active {
        return Err(AuthError::invalid_client("Client is inactive"));
    }

    if !client_storage
        .verify_secret(client_id, client_secret)
        .await?
    {
        tracing::warn!(client_id = %client_id, method = %auth_method, "Client secret rejected");
        return Err(AuthError::invalid_client("Invalid client secret"));
    }

    Ok(AuthenticatedClient {
        client,
        auth_method,
    })
}

/// Parses HTTP Basic Auth header value.
///
/// # Returns
///
/// Returns `Some((client_id, client_secret))` if valid, `None` otherwise.
#[must_use]
pub fn parse_basic_auth(header_value: &str) -> Option<(String, String)> {
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD;

    let encoded = header_value.trim().strip_prefix("Basic ")?;
    let decoded = STANDARD.decode(encoded.trim()).ok()?;
    let credentials = String::from_utf8(decoded).ok()?;

    // Split on first colon (secret may contain colons)
    let (client_id, client_secret) = credentials.split_once(':')?;
    if client_id.is_empty() {
        return None;
    }

    Some((client_id.to_string(), client_secret.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client_secret::hash_client_secret;
    use crate::testing::MockClientStorage;
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD;

    const SECRET: &str = "cs_test_secret";

    async fn storage(active: bool) -> MockClientStorage {
        let storage = MockClientStorage::default();
        storage
            .create(&Client {
                client_id: "app-a".to_string(),
                client_secret: Some(hash_client_secret(SECRET).unwrap()),
                name: "App A".to_string(),
                description: None,
                client_uri: None,
                redirect_uris: vec!["https://a.example.com/cb".to_string()],
                active,
            })
            .await
            .unwrap();
        storage
    }

    fn form(pairs: &[(&str, &str)]) -> RequestParams {
        RequestParams::new(
            pairs
                .iter()
                .map(|(n, v)| (n.to_string(), v.to_string()))
                .collect(),
        )
    }

    #[tokio::test]
    async fn test_authenticate_basic_auth() {
        let storage = storage(true).await;
        let result = authenticate_client(
            Some(("app-a".to_string(), SECRET.to_string())),
            &form(&[]),
            &storage,
        )
        .await
        .unwrap();
        assert_eq!(result.client.client_id, "app-a");
        assert_eq!(result.auth_method, TokenEndpointAuthMethod::ClientSecretBasic);
    }

    #[tokio::test]
    async fn test_authenticate_secret_post() {
        let storage = storage(true).await;
        let result = authenticate_client(
            None,
            &form(&[("client_id", "app-a"), ("client_secret", SECRET)]),
            &storage,
        )
        .await
        .unwrap();
        assert_eq!(result.auth_method, TokenEndpointAuthMethod::ClientSecretPost);
    }

    #[tokio::test]
    async fn test_wrong_secret_and_unknown_client() {
        let storage = storage(true).await;
        let wrong = authenticate_client(
            Some(("app-a".to_string(), "nope".to_string())),
            &form(&[]),
            &storage,
        )
        .await
        .unwrap_err();
        assert_eq!(wrong.oauth_error_code(), "invalid_client");

        let unknown = authenticate_client(
            None,
            &form(&[("client_id", "ghost"), ("client_secret", SECRET)]),
            &storage,
        )
        .await
        .unwrap_err();
        assert_eq!(unknown.oauth_error_code(), "invalid_client");
    }

    #[tokio::test]
    async fn test_inactive_client_rejected() {
        let storage = storage(false).await;
        let err = authenticate_client(
            Some(("app-a".to_string(), SECRET.to_string())),
            &form(&[]),
            &storage,
        )
        .await
        .unwrap_err();
        assert_eq!(err.oauth_error_code(), "invalid_client");
    }

    #[tokio::test]
    async fn test_no_credentials_provided() {
        let storage = storage(true).await;
        let err = authenticate_client(None, &form(&[("client_id", "app-a")]), &storage)
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::InvalidClient { .. }));
    }

    #[test]
    fn test_parse_basic_auth_valid() {
        let header = format!("Basic {}", STANDARD.encode("app-a:s3cr3t"));
        assert_eq!(
            parse_basic_auth(&header),
            Some(("app-a".to_string(), "s3cr3t".to_string()))
        );
    }

    #[test]
    fn test_parse_basic_auth_with_colon_in_secret() {
        let header = format!("Basic {}", STANDARD.encode("app-a:pa:ss"));
        assert_eq!(
            parse_basic_auth(&header),
            Some(("app-a".to_string(), "pa:ss".to_string()))
        );
    }

    #[test]
    fn test_parse_basic_auth_invalid() {
        assert!(parse_basic_auth("Bearer abc").is_none());
        assert!(parse_basic_auth("Basic !!!").is_none());
        assert!(parse_basic_auth(&format!("Basic {}", STANDARD.encode("nocolon"))).is_none());
        assert!(parse_basic_auth(&format!("Basic {}", STANDARD.encode(":secret"))).is_none());
    }
}
