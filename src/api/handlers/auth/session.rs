//! Session cookie plumbing.
//!
//! The session travels in one `HttpOnly` cookie. Helpers here build the
//! `Set-Cookie` values and pull the token back out of request headers.

use anyhow::{Context, Result};
use axum::http::{header, HeaderMap, HeaderValue};

pub const SESSION_COOKIE_NAME: &str = "jwt";

/// `Set-Cookie` value establishing a session.
///
/// # Errors
/// Returns an error when the token contains bytes not valid in a header.
pub fn session_cookie(token: &str, max_age_seconds: i64, secure: bool) -> Result<HeaderValue> {
    let secure_attr = if secure { "; Secure" } else { "" };
    let value = format!(
        "{SESSION_COOKIE_NAME}={token}; Path=/; HttpOnly; SameSite=Lax; Max-Age={max_age_seconds}{secure_attr}"
    );
    HeaderValue::from_str(&value).context("invalid session cookie value")
}

/// `Set-Cookie` value that removes the session cookie.
#[must_use]
pub fn clear_session_cookie(secure: bool) -> HeaderValue {
    let value = if secure {
        format!("{SESSION_COOKIE_NAME}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0; Secure")
    } else {
        format!("{SESSION_COOKIE_NAME}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0")
    };
    HeaderValue::from_str(&value).unwrap_or_else(|_| HeaderValue::from_static(""))
}

/// Pull the session token out of the `Cookie` header, if present.
#[must_use]
pub fn extract_session_token(headers: &HeaderMap) -> Option<&str> {
    let cookies = headers.get(header::COOKIE)?.to_str().ok()?;
    for pair in cookies.split(';') {
        let mut parts = pair.trim().splitn(2, '=');
        if parts.next() == Some(SESSION_COOKIE_NAME) {
            let value = parts.next().unwrap_or_default();
            if !value.is_empty() {
                return Some(value);
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_cookie_attributes() -> Result<()> {
        let value = session_cookie("abc.def.ghi", 3600, false)?;
        let value = value.to_str().map_err(anyhow::Error::new)?;
        assert!(value.starts_with("jwt=abc.def.ghi;"));
        assert!(value.contains("HttpOnly"));
        assert!(value.contains("SameSite=Lax"));
        assert!(value.contains("Max-Age=3600"));
        assert!(!value.contains("Secure"));

        let value = session_cookie("abc", 60, true)?;
        assert!(value.to_str().map_err(anyhow::Error::new)?.contains("; Secure"));
        Ok(())
    }

    #[test]
    fn clear_cookie_expires_immediately() {
        let value = clear_session_cookie(false);
        let value = value.to_str().unwrap_or_default();
        assert!(value.starts_with("jwt=;"));
        assert!(value.contains("Max-Age=0"));
    }

    #[test]
    fn extracts_token_among_other_cookies() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("theme=dark; jwt=tok-123; lang=en"),
        );
        assert_eq!(extract_session_token(&headers), Some("tok-123"));
    }

    #[test]
    fn missing_or_empty_cookie_yields_none() {
        let headers = HeaderMap::new();
        assert_eq!(extract_session_token(&headers), None);

        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_static("jwt="));
        assert_eq!(extract_session_token(&headers), None);

        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_static("theme=dark"));
        assert_eq!(extract_session_token(&headers), None);
    }
}
