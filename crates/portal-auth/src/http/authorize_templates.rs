//! HTML templates for the authorization flow.
//!
//! Server-rendered consent and error pages. Every interpolated value is
//! escaped.

use crate::oauth::authorize::{APPROVE_PATH, ConsentPrompt};
use crate::types::{Scope, join_scopes};

/// Shared CSS styles for all pages.
const SHARED_STYLES: &str = r#"
:root {
    --brand-primary: #3b3fe3;
    --surface-1: #f6f7fb;
    --surface-2: #ffffff;
    --text-primary: #1c1f40;
    --text-secondary: #5c6077;
    --border-subtle: #e1e3ee;
    --danger: #c92a2a;
    --radius-lg: 8px;
}

* { margin: 0; padding: 0; box-sizing: border-box; }

body {
    font-family: -apple-system, BlinkMacSystemFont, "Segoe UI", Roboto, sans-serif;
    background: var(--surface-1);
    min-height: 100vh;
    display: flex;
    justify-content: center;
    align-items: center;
    color: var(--text-primary);
    line-height: 1.5;
}

.container { width: 100%; max-width: 440px; padding: 1rem; }

.card {
    background: var(--surface-2);
    border: 1px solid var(--border-subtle);
    border-radius: var(--radius-lg);
    padding: 2rem;
}

.card-title { font-size: 1.25rem; font-weight: 600; margin-bottom: 1rem; }
.client-name { font-weight: 600; }
.section-title { font-size: 0.875rem; color: var(--text-secondary); margin: 1rem 0 0.5rem; }
.scope-list { list-style: none; }
.scope-item { display: flex; gap: 0.5rem; padding: 0.5rem 0; border-bottom: 1px solid var(--border-subtle); }
.scope-description { font-size: 0.8125rem; color: var(--text-secondary); }
.btn-group { display: flex; gap: 0.75rem; margin-top: 1.5rem; }
.btn { flex: 1; padding: 0.625rem; border-radius: var(--radius-lg); font-weight: 500; text-align: center; text-decoration: none; border: 1px solid var(--border-subtle); cursor: pointer; }
.btn-primary { background: var(--brand-primary); color: #fff; border-color: var(--brand-primary); }
.btn-secondary { background: var(--surface-2); color: var(--text-primary); }
.error-title { font-size: 1.125rem; font-weight: 600; color: var(--danger); margin-bottom: 0.5rem; }
.error-code { font-family: monospace; color: var(--text-secondary); margin-top: 1rem; }
"#;

/// Base HTML template wrapper.
fn html_page(title: &str, content: &str) -> String {
    let mut html = String::with_capacity(content.len() + 2000);
    html.push_str("<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n");
    html.push_str("    <meta charset=\"UTF-8\">\n");
    html.push_str(
        "    <meta name=\"viewport\" content=\"width=device-width, initial-scale=1.0\">\n",
    );
    html.push_str("    <title>");
    html.push_str(&html_escape(title));
    html.push_str(" - Portal</title>\n");
    html.push_str("    <style>");
    html.push_str(SHARED_STYLES);
    html.push_str("</style>\n</head>\n<body>\n    <div class=\"container\">\n");
    html.push_str(content);
    html.push_str("\n    </div>\n</body>\n</html>");
    html
}

fn push_hidden(content: &mut String, name: &str, value: Option<&str>) {
    let Some(value) = value else {
        return;
    };
    content.push_str("<input type=\"hidden\" name=\"");
    content.push_str(name);
    content.push_str("\" value=\"");
    content.push_str(&html_escape(value));
    content.push_str("\">\n");
}

fn push_scope_section(content: &mut String, title: &str, scopes: &[Scope], checked: bool) {
    if scopes.is_empty() {
        return;
    }
    content.push_str("<div class=\"section-title\">");
    content.push_str(&html_escape(title));
    content.push_str("</div>\n<ul class=\"scope-list\">\n");
    for scope in scopes {
        content.push_str("<li class=\"scope-item\">\n<input type=\"checkbox\" name=\"selected_scope\" value=\"");
        content.push_str(&html_escape(&scope.id));
        content.push_str("\" id=\"scope-");
        content.push_str(&html_escape(&scope.id));
        content.push('"');
        if checked {
            content.push_str(" checked");
        }
        content.push_str(">\n<label for=\"scope-");
        content.push_str(&html_escape(&scope.id));
        content.push_str("\">\n<div class=\"scope-name\">");
        content.push_str(&html_escape(&scope.name));
        content.push_str("</div>\n");
        if let Some(description) = &scope.description {
            content.push_str("<div class=\"scope-description\">");
            content.push_str(&html_escape(description));
            content.push_str("</div>\n");
        }
        content.push_str("</label>\n</li>\n");
    }
    content.push_str("</ul>\n");
}

/// Renders the consent form.
///
/// Missing and already authorized scopes are pre-checked; optional ones
/// (`offline_access`) are not. The form posts to the approval endpoint.
pub fn render_consent_form(consent: &ConsentPrompt) -> String {
    let mut content = String::with_capacity(4096);

    content.push_str("<div class=\"card\">\n");
    content.push_str("<div class=\"card-title\">Authorize Access</div>\n\n");

    content.push_str("<p><span class=\"client-name\">");
    content.push_str(&html_escape(&consent.client_name));
    content.push_str("</span> is requesting permission to:</p>\n\n");

    content.push_str("<form method=\"POST\" action=\"");
    content.push_str(APPROVE_PATH);
    content.push_str("\">\n");
    push_hidden(&mut content, "client_id", Some(&consent.client_id));
    push_hidden(&mut content, "redirect_uri", Some(&consent.redirect_uri));
    push_hidden(&mut content, "scope", Some(&join_scopes(&consent.scope_ids)));
    push_hidden(&mut content, "state", consent.state.as_deref());
    push_hidden(&mut content, "nonce", consent.nonce.as_deref());
    push_hidden(&mut content, "code_challenge", consent.code_challenge.as_deref());
    if consent.code_challenge.is_some() {
        push_hidden(&mut content, "code_challenge_method", Some("S256"));
    }

    push_scope_section(&mut content, "New permissions", &consent.missing_scopes, true);
    push_scope_section(&mut content, "Optional", &consent.optional_scopes, false);
    push_scope_section(
        &mut content,
        "Already granted",
        &consent.authorized_scopes,
        true,
    );

    content.push_str("<div class=\"btn-group\">\n");
    content.push_str("<a class=\"btn btn-secondary\" href=\"");
    content.push_str(&html_escape(&consent.cancel_url));
    content.push_str("\">Deny</a>\n");
    content.push_str(
        "<button type=\"submit\" class=\"btn btn-primary\">Authorize</button>\n",
    );
    content.push_str("</div>\n</form>\n</div>");

    html_page("Authorize", &content)
}

/// Renders an error page (used when the client or redirect_uri is not
/// trusted).
pub fn render_error_page(error_code: &str, error_description: &str) -> String {
    let mut content = String::with_capacity(1024);

    content.push_str("<div class=\"card\" style=\"text-align: center;\">\n");
    content.push_str("<div class=\"error-title\">Authorization Error</div>\n");
    content.push_str("<div class=\"error-description\">");
    content.push_str(&html_escape(error_description));
    content.push_str("</div>\n\n");
    content.push_str("<div class=\"error-code\">");
    content.push_str(&html_escape(error_code));
    content.push_str("</div>\n</div>");

    html_page("Error", &content)
}

/// Simple HTML escaping to prevent XSS.
fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{scope, scopes};

    fn consent() -> ConsentPrompt {
        ConsentPrompt {
            client_id: "app-a".to_string(),
            client_name: "<b>App</b>".to_string(),
            redirect_uri: "https://a.example.com/cb".to_string(),
            state: Some("x\"y".to_string()),
            nonce: None,
            code_challenge: None,
            scope_ids: scopes("openid profile offline_access"),
            missing_scopes: vec![scope("profile", None)],
            optional_scopes: vec![scope("offline_access", None)],
            authorized_scopes: vec![scope("openid", None)],
            cancel_url: "https://a.example.com/cb?error=access_denied&state=x".to_string(),
        }
    }

    #[test]
    fn test_consent_form_escapes_values() {
        let html = render_consent_form(&consent());
        assert!(html.contains("&lt;b&gt;App&lt;/b&gt;"));
        assert!(!html.contains("<b>App</b>"));
        assert!(html.contains("name=\"state\" value=\"x&quot;y\""));
        assert!(html.contains("error=access_denied&amp;state=x"));
    }

    #[test]
    fn test_consent_form_fields() {
        let html = render_consent_form(&consent());
        assert!(html.contains("action=\"/a/auth/approve\""));
        assert!(html.contains("name=\"scope\" value=\"offline_access openid profile\""));
        assert!(html.contains("value=\"profile\" id=\"scope-profile\" checked"));
        assert!(html.contains("value=\"offline_access\" id=\"scope-offline_access\">"));
        assert!(!html.contains("name=\"nonce\""));
        assert!(!html.contains("code_challenge_method"));
    }

    #[test]
    fn test_render_error_page() {
        let html = render_error_page("access_denied", "Unknown client");
        assert!(html.contains("Unknown client"));
        assert!(html.contains("access_denied"));
        assert!(html.contains("<!DOCTYPE html>"));
    }

    #[test]
    fn test_html_escape() {
        assert_eq!(html_escape("<script>"), "&lt;script&gt;");
        assert_eq!(html_escape("a & b"), "a &amp; b");
        assert_eq!(html_escape("'\""), "&#39;&quot;");
    }
}
