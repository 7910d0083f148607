//! Session cookie format.
//!
//! The cookie value is percent-encoded JSON `{name, email, id}`. Issuing and
//! validating sessions happens elsewhere; this module only knows how to
//! write the cookie and read it back. A payload that fails to decode is
//! treated as no session at all.

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};

/// Name of the session cookie.
pub const SESSION_COOKIE: &str = "session";

/// Session lifetime in seconds (7 days).
pub const SESSION_MAX_AGE_SECS: u64 = 60 * 60 * 24 * 7;

/// Identity carried by the session cookie.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionUser {
    pub name: String,
    pub email: String,
    pub id: String,
}

impl SessionUser {
    /// Encoded cookie value (no attributes).
    pub fn cookie_value(&self) -> CoreResult<String> {
        let json = serde_json::to_string(self).map_err(|e| CoreError::MalformedSession {
            reason: e.to_string(),
        })?;
        Ok(urlencoding::encode(&json).into_owned())
    }

    /// `session=<value>`, suitable for a request `Cookie` header.
    pub fn cookie_pair(&self) -> CoreResult<String> {
        Ok(format!("{}={}", SESSION_COOKIE, self.cookie_value()?))
    }

    /// Decode a cookie value produced by [`SessionUser::cookie_value`].
    pub fn from_cookie_value(raw: &str) -> CoreResult<Self> {
        let json = urlencoding::decode(raw).map_err(|e| CoreError::MalformedSession {
            reason: e.to_string(),
        })?;
        serde_json::from_str(&json).map_err(|e| CoreError::MalformedSession {
            reason: e.to_string(),
        })
    }
}

/// `Set-Cookie` value that stores the session for 7 days.
pub fn set_cookie_header(user: &SessionUser, secure: bool) -> CoreResult<String> {
    let mut header = format!(
        "{}={}; Path=/; Max-Age={}; HttpOnly; SameSite=Lax",
        SESSION_COOKIE,
        user.cookie_value()?,
        SESSION_MAX_AGE_SECS
    );
    if secure {
        header.push_str("; Secure");
    }
    Ok(header)
}

/// `Set-Cookie` value that deletes the session.
pub fn clear_cookie_header() -> String {
    format!("{}=; Path=/; Max-Age=0", SESSION_COOKIE)
}

/// Extract the session from a request `Cookie` header.
///
/// Missing and malformed sessions both yield `None`.
pub fn parse_cookie_header(header: &str) -> Option<SessionUser> {
    let raw = header
        .split(';')
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .map(|(_, value)| value)?;
    match SessionUser::from_cookie_value(raw) {
        Ok(user) => Some(user),
        Err(err) => {
            tracing::warn!(error = %err, "Failed to parse session cookie");
            None
        }
    }
}
