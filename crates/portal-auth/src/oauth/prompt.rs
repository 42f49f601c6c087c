//! OpenID Connect `prompt` parameter.

use std::fmt;

use crate::AuthResult;
use crate::error::AuthError;

/// Parsed `prompt` parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Prompt {
    /// `login`: the user must authenticate again.
    pub login: bool,
    /// `consent`: the consent page must be shown even if already granted.
    pub consent: bool,
    /// `select_account`: the user should pick an account.
    pub select_account: bool,
    /// `false` for `none`: no page may be shown.
    pub interactive: bool,
}

impl Default for Prompt {
    fn default() -> Self {
        Self {
            login: false,
            consent: false,
            select_account: false,
            interactive: true,
        }
    }
}

impl Prompt {
    /// Parses a space-delimited `prompt` value.
    ///
    /// # Errors
    ///
    /// Returns `InvalidRequest` for unknown values, or `none` combined with
    /// anything else.
    pub fn parse(value: Option<&str>) -> AuthResult<Self> {
        let mut prompt = Self::default();
        let Some(value) = value else {
            return Ok(prompt);
        };

        let mut saw_none = false;
        let mut saw_other = false;
        for item in value.split(' ').filter(|s| !s.is_empty()) {
            match item {
                "none" => {
                    saw_none = true;
                    prompt.interactive = false;
                }
                "login" => {
                    saw_other = true;
                    prompt.login = true;
                }
                "consent" => {
                    saw_other = true;
                    prompt.consent = true;
                }
                "select_account" => {
                    saw_other = true;
                    prompt.select_account = true;
                }
                other => {
                    return Err(AuthError::invalid_request(format!(
                        "Unsupported prompt value: {other}"
                    )));
                }
            }
        }

        if saw_none && saw_other {
            return Err(AuthError::invalid_request(
                "prompt=none cannot be combined with other values",
            ));
        }
        Ok(prompt)
    }

    /// Returns the same prompt with `login` cleared.
    ///
    /// Used to build the URL the login page continues to, so the user is not
    /// sent back to it in a loop.
    #[must_use]
    pub fn without_login(self) -> Self {
        Self {
            login: false,
            ..self
        }
    }
}

impl fmt::Display for Prompt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.interactive {
            return f.write_str("none");
        }
        let values: Vec<&str> = [
            (self.login, "login"),
            (self.consent, "consent"),
            (self.select_account, "select_account"),
        ]
        .into_iter()
        .filter_map(|(set, value)| set.then_some(value))
        .collect();
        f.write_str(&values.join(" "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_absent_prompt_is_interactive() {
        let prompt = Prompt::parse(None).unwrap();
        assert_eq!(prompt, Prompt::default());
        assert_eq!(prompt.to_string(), "");
    }

    #[test]
    fn test_combined_values() {
        let prompt = Prompt::parse(Some("login consent")).unwrap();
        assert!(prompt.login && prompt.consent && prompt.interactive);
        assert!(!prompt.select_account);
        assert_eq!(prompt.to_string(), "login consent");
        assert_eq!(prompt.without_login().to_string(), "consent");
    }

    #[test]
    fn test_none_is_non_interactive() {
        let prompt = Prompt::parse(Some("none")).unwrap();
        assert!(!prompt.interactive);
        assert!(!prompt.consent);
        assert_eq!(prompt.to_string(), "none");
    }

    #[test]
    fn test_none_is_exclusive() {
        let err = Prompt::parse(Some("none login")).unwrap_err();
        assert_eq!(err.oauth_error_code(), "invalid_request");
    }

    #[test]
    fn test_unknown_value_rejected() {
        assert!(Prompt::parse(Some("create")).is_err());
    }
}
