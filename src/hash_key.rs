//! Composite storage key: `<application name>_<session id>`.
//!
//! The table only knows a single string hash key, so the application
//! namespace and the session id are folded into one value. Changing
//! [`SEPARATOR`] invalidates every stored key.
//!
//! Neither half may contain the separator. Encoding does not check this;
//! configuration validation rejects such application names, minted
//! session ids are hyphenated UUIDs, and the repository refuses to save
//! either half containing it.

use std::fmt;
use std::str::FromStr;

use crate::error::SessionError;

pub const SEPARATOR: char = '_';

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HashKey {
    pub application_name: String,
    pub session_id: String,
}

impl HashKey {
    pub fn new(application_name: impl Into<String>, session_id: impl Into<String>) -> Self {
        Self {
            application_name: application_name.into(),
            session_id: session_id.into(),
        }
    }

    /// Join the two halves into the stored key.
    pub fn encode(application_name: &str, session_id: &str) -> String {
        format!("{application_name}{SEPARATOR}{session_id}")
    }

    /// Split a stored key back into `(application_name, session_id)`.
    pub fn decode(hash_key: &str) -> Result<Self, SessionError> {
        let mut parts = hash_key.split(SEPARATOR);
        match (parts.next(), parts.next(), parts.next()) {
            (Some(app), Some(id), None) if !app.is_empty() && !id.is_empty() => {
                Ok(Self::new(app, id))
            }
            _ => Err(SessionError::InvalidFormat(hash_key.to_string())),
        }
    }
}

impl fmt::Display for HashKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&Self::encode(&self.application_name, &self.session_id))
    }
}

impl FromStr for HashKey {
    type Err = SessionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::decode(s)
    }
}
