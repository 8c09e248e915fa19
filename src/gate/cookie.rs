//! Reading and writing the `session` cookie.

use axum::http::{header, HeaderMap};

pub const SESSION_COOKIE: &str = "session";

/// Value of the first cookie called `name` across all `Cookie` headers.
pub fn read_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| key.trim() == name)
        .map(|(_, value)| value.trim().to_string())
}

/// `Set-Cookie` value carrying a session token.
///
/// HttpOnly, SameSite=Strict and Path=/ are always set; `Secure` depends on
/// whether the deployment terminates TLS in front of the service.
pub fn session_cookie(token: &str, max_age_seconds: u64, secure: bool) -> String {
    let mut cookie =
        format!("{SESSION_COOKIE}={token}; Path=/; Max-Age={max_age_seconds}; HttpOnly; SameSite=Strict");
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}

/// `Set-Cookie` value that makes the browser drop the session cookie.
pub fn clear_session_cookie(secure: bool) -> String {
    session_cookie("", 0, secure)
}
