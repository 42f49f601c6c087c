//! Tokens: model, wire codec, lifecycle handler, replay guard and ID token
//! signing.

pub mod codec;
pub mod handler;
pub mod jwt;
pub mod model;
pub mod replay;

pub use codec::{TokenInfo, generate_pass, make_id};
pub use handler::{GrantSource, TokenHandler};
pub use jwt::{IdTokenClaims, IdTokenHint, JwtError, JwtService, Jwk, Jwks, SigningKeyPair};
pub use model::{
    AccessToken, AccountActivationToken, AuthorizationCode, ChangePasswordToken, CheckedToken,
    FederatedSession, MembershipInvitationToken, OAuthGrant, OAuthToken, RefreshToken,
    SetPasswordToken, SidToken, Token, TokenKind, TokenMeta,
};
pub use replay::ReplayGuard;
