//! Immutable snapshot of a persisted session.

use chrono::{DateTime, Utc};

use crate::error::SessionError;

/// Format tag written with every record.
pub const RECORD_FORMAT_VERSION: &str = "1.0";

#[derive(Debug, Clone, PartialEq)]
pub struct SessionRecord {
    session_id: String,
    application_name: String,
    data: String,
    create_date: DateTime<Utc>,
    expires: DateTime<Utc>,
    record_format_version: String,
}

impl SessionRecord {
    /// Build a record. Fails if either half of the identity is empty.
    pub fn new(
        session_id: impl Into<String>,
        application_name: impl Into<String>,
        expires: DateTime<Utc>,
        data: impl Into<String>,
        create_date: DateTime<Utc>,
    ) -> Result<Self, SessionError> {
        let session_id = session_id.into();
        let application_name = application_name.into();

        if session_id.is_empty() {
            return Err(SessionError::InvalidArgument(
                "session id must not be empty".into(),
            ));
        }
        if application_name.is_empty() {
            return Err(SessionError::InvalidArgument(
                "application name must not be empty".into(),
            ));
        }

        Ok(Self {
            session_id,
            application_name,
            data: data.into(),
            create_date,
            expires,
            record_format_version: RECORD_FORMAT_VERSION.into(),
        })
    }

    pub fn with_format_version(mut self, version: impl Into<String>) -> Self {
        self.record_format_version = version.into();
        self
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn application_name(&self) -> &str {
        &self.application_name
    }

    /// Opaque serializer output.
    pub fn data(&self) -> &str {
        &self.data
    }

    pub fn create_date(&self) -> DateTime<Utc> {
        self.create_date
    }

    pub fn expires(&self) -> DateTime<Utc> {
        self.expires
    }

    pub fn record_format_version(&self) -> &str {
        &self.record_format_version
    }

    /// Whether `expires` lies strictly before the current UTC time.
    pub fn has_expired(&self) -> bool {
        self.has_expired_at(Utc::now())
    }

    pub fn has_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires < now
    }
}
