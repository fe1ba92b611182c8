use crate::error::{Error, Result};
use hyper::{header::COOKIE, HeaderMap};

/// Cookie names under which the auth framework stores its session token.
const SESSION_COOKIES: [&str; 2] = ["better-auth.session_token", "__Secure-better-auth.session_token"];

/// Extracts the session token from the request cookies.
///
/// The cookie holds `token.signature`; only the token is looked up.
pub fn extract_session(headers: &HeaderMap) -> Result<&str> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|section| section.trim().split_once('='))
        .find_map(|(key, value)| SESSION_COOKIES.contains(&key).then_some(value))
        .map(|value| value.split_once('.').map_or(value, |(token, _)| token))
        .filter(|token| !token.is_empty())
        .ok_or(Error::Unauthorized)
}
