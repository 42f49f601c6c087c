//! Token model.
//!
//! Every token the server issues is one variant of [`Token`]. The variants
//! share [`TokenMeta`] (identity, lifetime, ancestry). OAuth tokens also share
//! an [`OAuthGrant`]. Tokens are immutable once registered, with three
//! exceptions owned by the repository: revocation, sliding renewal of
//! `creation_time`/`time_to_live`, and the session `authentication_time`.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};

/// Fields common to every token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenMeta {
    /// Storage id. Never leaves the server.
    pub id: String,

    /// Keyed derivation of `id` and the issuance pass, used as the lookup key.
    pub lookup_key: String,

    /// Issuance (or last renewal) instant.
    #[serde(with = "time::serde::rfc3339")]
    pub creation_time: OffsetDateTime,

    /// Lifetime counted from `creation_time`.
    #[serde(with = "seconds")]
    pub time_to_live: Duration,

    /// Ids of the tokens this one was derived from, oldest first.
    pub ancestor_ids: Vec<String>,
}

impl TokenMeta {
    /// Creates token metadata.
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        lookup_key: impl Into<String>,
        creation_time: OffsetDateTime,
        time_to_live: Duration,
        ancestor_ids: Vec<String>,
    ) -> Self {
        Self {
            id: id.into(),
            lookup_key: lookup_key.into(),
            creation_time,
            time_to_live,
            ancestor_ids,
        }
    }

    /// Returns the instant the token stops being valid.
    #[must_use]
    pub fn expiration_time(&self) -> OffsetDateTime {
        self.creation_time + self.time_to_live
    }

    /// Returns `true` if the token is valid at `now`.
    #[must_use]
    pub fn is_valid_at(&self, now: OffsetDateTime) -> bool {
        now < self.expiration_time()
    }

    /// Returns the whole seconds left before expiry, never negative.
    #[must_use]
    pub fn expires_in(&self, now: OffsetDateTime) -> i64 {
        (self.expiration_time() - now).whole_seconds().max(0)
    }

    /// Returns the ancestry of a token derived from this one.
    #[must_use]
    pub fn child_ancestry(&self) -> Vec<String> {
        let mut ancestors = self.ancestor_ids.clone();
        ancestors.push(self.id.clone());
        ancestors
    }
}

mod seconds {
    use serde::{Deserialize, Deserializer, Serializer};
    use time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i64(value.whole_seconds())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        i64::deserialize(deserializer).map(Duration::seconds)
    }
}

/// Account, client and scopes shared by codes, access and refresh tokens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OAuthGrant {
    /// Resource owner.
    pub account_id: String,

    /// Client the token is bound to.
    pub service_provider_id: String,

    /// Granted scope ids.
    pub scope_ids: BTreeSet<String>,
}

impl OAuthGrant {
    /// Returns the scopes as a space-separated string.
    #[must_use]
    pub fn scope_string(&self) -> String {
        self.scope_ids
            .iter()
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Browser session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SidToken {
    /// Common token fields.
    #[serde(flatten)]
    pub meta: TokenMeta,

    /// Logged-in account.
    pub account_id: String,

    /// Last time the user actually authenticated.
    #[serde(with = "time::serde::rfc3339")]
    pub authentication_time: OffsetDateTime,

    /// Session at an external identity provider, if login was federated.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub federated_session: Option<FederatedSession>,
}

/// Tokens obtained from an external identity provider at login.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FederatedSession {
    /// Identity provider's ID token.
    pub id_token: String,

    /// Identity provider's access token.
    pub access_token: String,
}

/// Single-use authorization code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorizationCode {
    /// Common token fields.
    #[serde(flatten)]
    pub meta: TokenMeta,

    /// Account, client and scopes.
    #[serde(flatten)]
    pub grant: OAuthGrant,

    /// OpenID Connect nonce, echoed into the ID token.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nonce: Option<String>,

    /// Redirect URI the code was issued to.
    pub redirect_uri: String,

    /// PKCE S256 challenge.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code_challenge: Option<String>,
}

/// Bearer access token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessToken {
    /// Common token fields.
    #[serde(flatten)]
    pub meta: TokenMeta,

    /// Account, client and scopes.
    #[serde(flatten)]
    pub grant: OAuthGrant,

    /// Refresh token this access token was minted from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token_id: Option<String>,
}

/// Long-lived refresh token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshToken {
    /// Common token fields.
    #[serde(flatten)]
    pub meta: TokenMeta,

    /// Account, client and scopes.
    #[serde(flatten)]
    pub grant: OAuthGrant,
}

/// E-mail verification link for a new account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountActivationToken {
    /// Common token fields.
    #[serde(flatten)]
    pub meta: TokenMeta,

    /// Account being activated.
    pub account_id: String,

    /// Where to send the user once activated.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub continue_url: Option<String>,
}

/// Link letting a user change a forgotten password.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordToken {
    /// Common token fields.
    #[serde(flatten)]
    pub meta: TokenMeta,

    /// Account whose password changes.
    pub account_id: String,
}

/// Link letting an account without password set one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetPasswordToken {
    /// Common token fields.
    #[serde(flatten)]
    pub meta: TokenMeta,

    /// Account whose password is set.
    pub account_id: String,
}

/// Invitation into an organization membership.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MembershipInvitationToken {
    /// Common token fields.
    #[serde(flatten)]
    pub meta: TokenMeta,

    /// Account that issued the invitation.
    pub account_id: String,

    /// Pending membership the invitation accepts.
    pub membership_id: String,
}

/// Every token kind the server issues.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Token {
    /// Browser session.
    Sid(SidToken),
    /// Authorization code.
    AuthorizationCode(AuthorizationCode),
    /// Access token.
    AccessToken(AccessToken),
    /// Refresh token.
    RefreshToken(RefreshToken),
    /// Account activation link.
    AccountActivation(AccountActivationToken),
    /// Change-password link.
    ChangePassword(ChangePasswordToken),
    /// Set-password link.
    SetPassword(SetPasswordToken),
    /// Membership invitation.
    MembershipInvitation(MembershipInvitationToken),
}

/// Discriminant of [`Token`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenKind {
    /// Browser session.
    Sid,
    /// Authorization code.
    AuthorizationCode,
    /// Access token.
    AccessToken,
    /// Refresh token.
    RefreshToken,
    /// Account activation link.
    AccountActivation,
    /// Change-password link.
    ChangePassword,
    /// Set-password link.
    SetPassword,
    /// Membership invitation.
    MembershipInvitation,
}

impl TokenKind {
    /// Returns the snake_case name of the kind.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sid => "sid",
            Self::AuthorizationCode => "authorization_code",
            Self::AccessToken => "access_token",
            Self::RefreshToken => "refresh_token",
            Self::AccountActivation => "account_activation",
            Self::ChangePassword => "change_password",
            Self::SetPassword => "set_password",
            Self::MembershipInvitation => "membership_invitation",
        }
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Token {
    /// Returns the common token fields.
    #[must_use]
    pub fn meta(&self) -> &TokenMeta {
        match self {
            Self::Sid(t) => &t.meta,
            Self::AuthorizationCode(t) => &t.meta,
            Self::AccessToken(t) => &t.meta,
            Self::RefreshToken(t) => &t.meta,
            Self::AccountActivation(t) => &t.meta,
            Self::ChangePassword(t) => &t.meta,
            Self::SetPassword(t) => &t.meta,
            Self::MembershipInvitation(t) => &t.meta,
        }
    }

    /// Returns the common token fields for in-place renewal.
    pub fn meta_mut(&mut self) -> &mut TokenMeta {
        match self {
            Self::Sid(t) => &mut t.meta,
            Self::AuthorizationCode(t) => &mut t.meta,
            Self::AccessToken(t) => &mut t.meta,
            Self::RefreshToken(t) => &mut t.meta,
            Self::AccountActivation(t) => &mut t.meta,
            Self::ChangePassword(t) => &mut t.meta,
            Self::SetPassword(t) => &mut t.meta,
            Self::MembershipInvitation(t) => &mut t.meta,
        }
    }

    /// Returns the kind of the token.
    #[must_use]
    pub fn kind(&self) -> TokenKind {
        match self {
            Self::Sid(_) => TokenKind::Sid,
            Self::AuthorizationCode(_) => TokenKind::AuthorizationCode,
            Self::AccessToken(_) => TokenKind::AccessToken,
            Self::RefreshToken(_) => TokenKind::RefreshToken,
            Self::AccountActivation(_) => TokenKind::AccountActivation,
            Self::ChangePassword(_) => TokenKind::ChangePassword,
            Self::SetPassword(_) => TokenKind::SetPassword,
            Self::MembershipInvitation(_) => TokenKind::MembershipInvitation,
        }
    }

    /// Returns the storage id.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.meta().id
    }

    /// Returns the account the token belongs to.
    #[must_use]
    pub fn account_id(&self) -> &str {
        match self {
            Self::Sid(t) => &t.account_id,
            Self::AuthorizationCode(t) => &t.grant.account_id,
            Self::AccessToken(t) => &t.grant.account_id,
            Self::RefreshToken(t) => &t.grant.account_id,
            Self::AccountActivation(t) => &t.account_id,
            Self::ChangePassword(t) => &t.account_id,
            Self::SetPassword(t) => &t.account_id,
            Self::MembershipInvitation(t) => &t.account_id,
        }
    }

    /// Returns the OAuth grant of codes, access and refresh tokens.
    #[must_use]
    pub fn oauth_grant(&self) -> Option<&OAuthGrant> {
        match self {
            Self::AuthorizationCode(t) => Some(&t.grant),
            Self::AccessToken(t) => Some(&t.grant),
            Self::RefreshToken(t) => Some(&t.grant),
            _ => None,
        }
    }
}

/// A token kind [`crate::token::TokenHandler::get_checked_token`] can return.
pub trait CheckedToken: Sized {
    /// Name of the expected kind, for logging.
    const EXPECTED: &'static str;

    /// Returns the typed token if `token` is of the expected kind.
    fn from_token(token: Token) -> Option<Self>;

    /// Returns the common token fields.
    fn meta(&self) -> &TokenMeta;
}

macro_rules! token_variant {
    ($variant:ident, $ty:ty, $expected:literal) => {
        impl From<$ty> for Token {
            fn from(token: $ty) -> Self {
                Token::$variant(token)
            }
        }

        impl CheckedToken for $ty {
            const EXPECTED: &'static str = $expected;

            fn from_token(token: Token) -> Option<Self> {
                match token {
                    Token::$variant(t) => Some(t),
                    _ => None,
                }
            }

            fn meta(&self) -> &TokenMeta {
                &self.meta
            }
        }
    };
}

token_variant!(Sid, SidToken, "sid");
token_variant!(AuthorizationCode, AuthorizationCode, "authorization_code");
token_variant!(AccessToken, AccessToken, "access_token");
token_variant!(RefreshToken, RefreshToken, "refresh_token");
token_variant!(AccountActivation, AccountActivationToken, "account_activation");
token_variant!(ChangePassword, ChangePasswordToken, "change_password");
token_variant!(SetPassword, SetPasswordToken, "set_password");
token_variant!(MembershipInvitation, MembershipInvitationToken, "membership_invitation");

/// Any token of the OAuth family, as accepted by revocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OAuthToken {
    /// Authorization code.
    AuthorizationCode(AuthorizationCode),
    /// Access token.
    AccessToken(AccessToken),
    /// Refresh token.
    RefreshToken(RefreshToken),
}

impl OAuthToken {
    /// Returns the account, client and scopes of the token.
    #[must_use]
    pub fn grant(&self) -> &OAuthGrant {
        match self {
            Self::AuthorizationCode(t) => &t.grant,
            Self::AccessToken(t) => &t.grant,
            Self::RefreshToken(t) => &t.grant,
        }
    }
}

impl CheckedToken for OAuthToken {
    const EXPECTED: &'static str = "oauth";

    fn from_token(token: Token) -> Option<Self> {
        match token {
            Token::AuthorizationCode(t) => Some(Self::AuthorizationCode(t)),
            Token::AccessToken(t) => Some(Self::AccessToken(t)),
            Token::RefreshToken(t) => Some(Self::RefreshToken(t)),
            _ => None,
        }
    }

    fn meta(&self) -> &TokenMeta {
        match self {
            Self::AuthorizationCode(t) => &t.meta,
            Self::AccessToken(t) => &t.meta,
            Self::RefreshToken(t) => &t.meta,
        }
    }
}
