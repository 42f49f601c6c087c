//! Domain types for clients and scopes.

pub mod client;
pub mod scope;

pub use client::{Client, ClientValidationError, GrantType};
pub use scope::{OFFLINE_ACCESS, OPENID, Scope, join_scopes, parse_scope_param};
