//! Scope definitions.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Scope every OpenID Connect authorization request must carry.
pub const OPENID: &str = "openid";

/// Scope that grants a refresh token.
pub const OFFLINE_ACCESS: &str = "offline_access";

/// A named permission a client can request and a user can grant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Scope {
    /// Identifier used in `scope` parameters.
    pub id: String,

    /// Display name on the consent screen.
    pub name: String,

    /// Longer explanation on the consent screen.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Client acting as resource server for this scope, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_provider_id: Option<String>,
}

/// Splits a space-delimited `scope` parameter into a set.
#[must_use]
pub fn parse_scope_param(value: &str) -> BTreeSet<String> {
    value
        .split(' ')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Joins a scope set into a `scope` parameter.
#[must_use]
pub fn join_scopes<'a>(scopes: impl IntoIterator<Item = &'a String>) -> String {
    scopes
        .into_iter()
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join(" ")
}
