//! Raw protocol parameters.
//!
//! Endpoints receive parameters as ordered `(name, value)` pairs so that
//! repeated parameters can be detected. An empty value counts as absent;
//! other values are kept byte for byte.

use crate::AuthResult;
use crate::error::AuthError;

/// Parameters of one protocol request, from the query string or form body.
#[derive(Debug, Clone, Default)]
pub struct RequestParams {
    pairs: Vec<(String, String)>,
}

impl RequestParams {
    /// Wraps decoded `(name, value)` pairs.
    #[must_use]
    pub fn new(pairs: Vec<(String, String)>) -> Self {
        Self { pairs }
    }

    /// Returns every non-empty value of `name`, in order.
    pub fn all<'a, 'n>(&'a self, name: &'n str) -> impl Iterator<Item = &'a str> {
        self.pairs
            .iter()
            .filter(move |(n, _)| n == name)
            .map(|(_, v)| v.as_str())
            .filter(|v| !v.trim().is_empty())
    }

    /// Returns the single value of `name`, if present.
    ///
    /// # Errors
    ///
    /// Returns `InvalidRequest` if the parameter appears more than once.
    pub fn optional(&self, name: &str) -> AuthResult<Option<&str>> {
        let mut values = self.all(name);
        let first = values.next();
        if values.next().is_some() {
            return Err(AuthError::invalid_request(format!(
                "{name} included more than once"
            )));
        }
        Ok(first)
    }

    /// Like [`optional`](Self::optional), returning an owned value.
    ///
    /// # Errors
    ///
    /// Returns `InvalidRequest` if the parameter appears more than once.
    pub fn optional_owned(&self, name: &str) -> AuthResult<Option<String>> {
        Ok(self.optional(name)?.map(str::to_string))
    }

    /// Returns the single value of `name`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidRequest` if the parameter is missing or repeated.
    pub fn required(&self, name: &str) -> AuthResult<&str> {
        self.optional(name)?.ok_or_else(|| {
            AuthError::invalid_request(format!("Missing required parameter: {name}"))
        })
    }

    /// Returns `true` if `name` was sent with a non-empty value.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.all(name).next().is_some()
    }

    /// Returns the raw pairs without `excluded` names.
    #[must_use]
    pub fn pairs_without(&self, excluded: &[&str]) -> Vec<(String, String)> {
        self.pairs
            .iter()
            .filter(|(n, _)| !excluded.contains(&n.as_str()))
            .cloned()
            .collect()
    }
}

impl From<Vec<(String, String)>> for RequestParams {
    fn from(pairs: Vec<(String, String)>) -> Self {
        Self::new(pairs)
    }
}
