//! Redirect URI validation and construction.

use url::Url;

/// Returns `true` if `uri` is usable as a registered redirect target.
///
/// The URI must be absolute, hierarchical with a host, free of a fragment,
/// and use `http` or `https`.
#[must_use]
pub fn is_valid(uri: &str) -> bool {
    let Ok(url) = Url::parse(uri) else {
        return false;
    };
    matches!(url.scheme(), "http" | "https")
        && !url.cannot_be_a_base()
        && url.host_str().is_some_and(|h| !h.is_empty())
        && url.fragment().is_none()
}

/// Appends query parameters to a redirect URI, keeping any it already has.
///
/// Parameters whose value is `None` are skipped.
///
/// # Errors
///
/// Returns an error if `redirect_uri` is not an absolute URL.
pub fn with_params<'a>(
    redirect_uri: &str,
    params: impl IntoIterator<Item = (&'a str, Option<&'a str>)>,
) -> Result<String, url::ParseError> {
    let mut url = Url::parse(redirect_uri)?;
    {
        let mut query = url.query_pairs_mut();
        for (name, value) in params {
            if let Some(value) = value {
                query.append_pair(name, value);
            }
        }
    }
    Ok(url.into())
}
