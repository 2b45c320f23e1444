//! Security headers middleware for XSS, clickjacking, and isolation protection.
//!
//! Adds restrictive security headers to all responses. Start locked down and
//! loosen only when specific functionality requires it.

use axum::{
    extract::{Request, State},
    http::{
        HeaderName, HeaderValue,
        header::{
            CONTENT_SECURITY_POLICY, REFERRER_POLICY, X_CONTENT_TYPE_OPTIONS, X_FRAME_OPTIONS,
        },
    },
    middleware::Next,
    response::Response,
};
use url::Url;

use super::csp::CspNonce;
use crate::state::AppState;

/// Build the Content-Security-Policy value.
///
/// ```text
/// default-src 'none';
/// script-src 'self' 'nonce-<nonce>';
/// style-src 'self';
/// img-src 'self' <backend origin>;
/// connect-src 'self';
/// object-src 'none';
/// base-uri 'self';
/// form-action 'self';
/// frame-ancestors 'none'
/// ```
///
/// Product images may be served by the backend, so its origin is allowed
/// for images only.
#[must_use]
pub fn content_security_policy(nonce: Option<&CspNonce>, backend_url: &Url) -> String {
    let script_src = match nonce {
        Some(nonce) if !nonce.value().is_empty() => format!("'self' 'nonce-{}'", nonce.value()),
        _ => "'self'".to_string(),
    };

    let backend_origin = backend_url.origin();
    let img_src = if backend_origin.is_tuple() {
        format!("'self' {}", backend_origin.ascii_serialization())
    } else {
        "'self'".to_string()
    };

    format!(
        "default-src 'none'; \
         script-src {script_src}; \
         style-src 'self'; \
         font-src 'self'; \
         img-src {img_src}; \
         connect-src 'self'; \
         frame-src 'none'; \
         object-src 'none'; \
         base-uri 'self'; \
         form-action 'self'; \
         frame-ancestors 'none'"
    )
}

/// Add security headers to all responses.
///
/// Headers applied:
/// - `X-Frame-Options: DENY` - Prevent clickjacking
/// - `X-Content-Type-Options: nosniff` - Prevent MIME sniffing
/// - `Referrer-Policy: no-referrer` - Zero referrer leakage
/// - `Content-Security-Policy` - Strict CSP with the request's nonce
/// - `Permissions-Policy` - Deny sensitive features
/// - `Cache-Control: no-store, max-age=0` - Pages depend on the visitor's session
/// - `Cross-Origin-Opener-Policy: same-origin` - Process isolation
pub async fn security_headers_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let mut response = next.run(request).await;

    let csp = content_security_policy(
        response.extensions().get::<CspNonce>(),
        &state.config().backend_url,
    );

    let headers = response.headers_mut();

    headers.insert(X_FRAME_OPTIONS, HeaderValue::from_static("DENY"));
    headers.insert(X_CONTENT_TYPE_OPTIONS, HeaderValue::from_static("nosniff"));
    headers.insert(REFERRER_POLICY, HeaderValue::from_static("no-referrer"));

    match HeaderValue::from_str(&csp) {
        Ok(value) => {
            headers.insert(CONTENT_SECURITY_POLICY, value);
        }
        Err(e) => tracing::error!(error = %e, "Invalid Content-Security-Policy value"),
    }

    headers.insert(
        HeaderName::from_static("permissions-policy"),
        HeaderValue::from_static(
            "camera=(), \
             geolocation=(), \
             microphone=(), \
             payment=(), \
             usb=()",
        ),
    );

    // Only set when the handler did not choose its own caching
    if !headers.contains_key("cache-control") {
        headers.insert(
            HeaderName::from_static("cache-control"),
            HeaderValue::from_static("no-store, max-age=0"),
        );
    }

    headers.insert(
        HeaderName::from_static("cross-origin-opener-policy"),
        HeaderValue::from_static("same-origin"),
    );

    response
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_csp_includes_nonce_and_backend_origin() {
        let nonce = CspNonce("abc123==".to_string());
        let backend = Url::parse("http://localhost:8000/api/v1/").unwrap();

        let csp = content_security_policy(Some(&nonce), &backend);
        assert!(csp.contains("script-src 'self' 'nonce-abc123=='"));
        assert!(csp.contains("img-src 'self' http://localhost:8000;"));
        assert!(csp.contains("frame-ancestors 'none'"));
    }

    #[test]
    fn test_csp_without_nonce_allows_only_self_scripts() {
        let backend = Url::parse("https://api.example.test/api/v1/").unwrap();
        let csp = content_security_policy(None, &backend);
        assert!(csp.contains("script-src 'self';"));
        assert!(!csp.contains("nonce-"));
    }
}
