//! Session id cookie: parsing, validation, and `Set-Cookie` rendering.
//!
//! The cookie value is the bare session id. It carries no data and no
//! signature; the server-side record is the source of truth.

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Seconds the cookie outlives the server-side record.
pub const COOKIE_GRACE_SECS: i64 = 10;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionCookie {
    pub name: String,
    pub value: String,
    pub expires: DateTime<Utc>,
}

impl SessionCookie {
    /// Cookie for a record expiring at `record_expires`.
    pub fn for_record(name: &str, session_id: &str, record_expires: DateTime<Utc>) -> Self {
        Self {
            name: name.into(),
            value: session_id.into(),
            expires: record_expires + chrono::Duration::seconds(COOKIE_GRACE_SECS),
        }
    }

    pub fn to_header_value(&self, https_only: bool) -> String {
        let mut parts = vec![
            format!("{}={}", self.name, self.value),
            format!(
                "Expires={}",
                self.expires.format("%a, %d %b %Y %H:%M:%S GMT")
            ),
            "Path=/".into(),
            "HttpOnly".into(),
            "SameSite=Lax".into(),
        ];
        if https_only {
            parts.push("Secure".into());
        }
        parts.join("; ")
    }
}

/// `Set-Cookie` value that clears the session cookie.
pub fn removal_header_value(name: &str, https_only: bool) -> String {
    let mut parts = vec![
        format!("{}=", name),
        "Max-Age=0".into(),
        "Path=/".into(),
        "HttpOnly".into(),
        "SameSite=Lax".into(),
    ];
    if https_only {
        parts.push("Secure".into());
    }
    parts.join("; ")
}

/// Mint a fresh session id.
pub fn generate_session_id() -> String {
    Uuid::new_v4().to_string()
}

/// Accept a cookie value only if it is a UUID; returns its canonical form.
pub fn parse_session_id(raw: &str) -> Option<String> {
    Uuid::try_parse(raw.trim()).ok().map(|id| id.to_string())
}

/// Parse a specific cookie from a Cookie header value.
pub fn parse_cookie<'a>(header: &'a str, name: &str) -> Option<&'a str> {
    for part in header.split(';') {
        let trimmed = part.trim();
        if let Some(value) = trimmed.strip_prefix(name)
            && let Some(value) = value.strip_prefix('=')
        {
            return Some(value);
        }
    }
    None
}
