//! Same-origin check for state-changing browser posts.
//!
//! The `Origin` header decides when present. Otherwise the origin of the
//! `Referer` is used. A request carrying neither is refused.

use axum::http::{HeaderMap, header};
use url::{Origin, Url};

/// Origin of the server's public base URL.
///
/// An unparsable URL yields an opaque origin, which matches no request.
#[must_use]
pub fn origin_of(base_url: &str) -> Origin {
    Url::parse(base_url)
        .map(|url| url.origin())
        .unwrap_or_else(|_| Origin::new_opaque())
}

/// Returns `true` if the request comes from `expected`.
#[must_use]
pub fn is_same_origin(headers: &HeaderMap, expected: &Origin) -> bool {
    let source = headers
        .get(header::ORIGIN)
        .or_else(|| headers.get(header::REFERER));
    let Some(value) = source.and_then(|v| v.to_str().ok()) else {
        return false;
    };
    match Url::parse(value) {
        Ok(url) => {
            let origin = url.origin();
            origin.is_tuple() && &origin == expected
        }
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    const SELF: &str = "https://portal.example.com";

    fn headers(pairs: &[(header::HeaderName, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(name.clone(), HeaderValue::from_static(*value));
        }
        map
    }

    #[test]
    fn test_origin_header_decides() {
        let expected = origin_of(SELF);
        assert!(is_same_origin(
            &headers(&[(header::ORIGIN, "https://portal.example.com")]),
            &expected
        ));
        assert!(!is_same_origin(
            &headers(&[(header::ORIGIN, "https://evil.example.com")]),
            &expected
        ));
        assert!(!is_same_origin(
            &headers(&[
                (header::ORIGIN, "https://evil.example.com"),
                (header::REFERER, "https://portal.example.com/a/auth"),
            ]),
            &expected
        ));
    }

    #[test]
    fn test_referer_used_without_origin() {
        let expected = origin_of(SELF);
        assert!(is_same_origin(
            &headers(&[(header::REFERER, "https://portal.example.com/a/auth?x=1")]),
            &expected
        ));
        assert!(!is_same_origin(
            &headers(&[(header::REFERER, "https://portal.example.com.evil.net/a/auth")]),
            &expected
        ));
        assert!(!is_same_origin(
            &headers(&[(header::REFERER, "http://portal.example.com/a/auth")]),
            &expected
        ));
    }

    #[test]
    fn test_missing_or_opaque_source_refused() {
        let expected = origin_of(SELF);
        assert!(!is_same_origin(&HeaderMap::new(), &expected));
        assert!(!is_same_origin(&headers(&[(header::ORIGIN, "null")]), &expected));
    }

    #[test]
    fn test_default_port_is_normalized() {
        let expected = origin_of("https://portal.example.com:443/base/");
        assert!(is_same_origin(
            &headers(&[(header::ORIGIN, "https://portal.example.com")]),
            &expected
        ));
    }
}
