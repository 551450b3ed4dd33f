//! Session repository: records ⇄ table items.
//!
//! The repository stores and returns opaque `Data` strings; serialization
//! happens in the store above it. Timestamps are written as RFC 3339 UTC
//! and always read back as UTC.

use std::future::Future;
use std::sync::Arc;

use aws_sdk_dynamodb::types::AttributeValue;
use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};

use crate::error::SessionError;
use crate::hash_key::{HashKey, SEPARATOR};
use crate::record::{RECORD_FORMAT_VERSION, SessionRecord};
use crate::table::{Item, SessionTable};

const CREATE_DATE_KEY: &str = "CreateDate";
const EXPIRES_KEY: &str = "Expires";
const SESSION_DATA_KEY: &str = "Data";
const RECORD_FORMAT_KEY: &str = "Ver";

/// Persistence contract for session records.
pub trait SessionRepository: Send + Sync {
    /// `Ok(None)` when no record exists for the key.
    fn load_session(
        &self,
        session_id: &str,
        application_name: &str,
    ) -> impl Future<Output = Result<Option<SessionRecord>, SessionError>> + Send;

    /// Create (`is_new`) or update a record; returns what was stored.
    fn save_session(
        &self,
        session_id: &str,
        application_name: &str,
        data: &str,
        expires: DateTime<Utc>,
        is_new: bool,
    ) -> impl Future<Output = Result<SessionRecord, SessionError>> + Send;

    fn delete_session(
        &self,
        session_id: &str,
        application_name: &str,
    ) -> impl Future<Output = Result<(), SessionError>> + Send;

    fn get_hash_key(&self, session_id: &str, application_name: &str) -> String;
}

/// Repository over any [`SessionTable`].
pub struct DynamoDbSessionRepository<T> {
    table: Arc<T>,
}

impl<T: SessionTable> DynamoDbSessionRepository<T> {
    pub fn new(table: Arc<T>) -> Self {
        Self { table }
    }

    pub fn table(&self) -> &Arc<T> {
        &self.table
    }

    fn map_item_to_record(&self, item: &Item) -> Result<SessionRecord, SessionError> {
        let key: HashKey = string_attribute(item, self.table.key_attribute())?.parse()?;
        let expires = parse_timestamp(string_attribute(item, EXPIRES_KEY)?, EXPIRES_KEY)?;
        let created = parse_timestamp(string_attribute(item, CREATE_DATE_KEY)?, CREATE_DATE_KEY)?;
        let data = string_attribute(item, SESSION_DATA_KEY)?;
        let version = match item.get(RECORD_FORMAT_KEY) {
            Some(_) => string_attribute(item, RECORD_FORMAT_KEY)?,
            None => RECORD_FORMAT_VERSION,
        };

        Ok(
            SessionRecord::new(key.session_id, key.application_name, expires, data, created)?
                .with_format_version(version),
        )
    }
}

impl<T: SessionTable> SessionRepository for DynamoDbSessionRepository<T> {
    async fn load_session(
        &self,
        session_id: &str,
        application_name: &str,
    ) -> Result<Option<SessionRecord>, SessionError> {
        let hash_key = self.get_hash_key(session_id, application_name);
        match self.table.get_item(&hash_key).await? {
            Some(item) => self.map_item_to_record(&item).map(Some),
            None => {
                tracing::debug!("No session stored under {}", hash_key);
                Ok(None)
            }
        }
    }

    async fn save_session(
        &self,
        session_id: &str,
        application_name: &str,
        data: &str,
        expires: DateTime<Utc>,
        is_new: bool,
    ) -> Result<SessionRecord, SessionError> {
        if session_id.is_empty() || application_name.is_empty() {
            return Err(SessionError::InvalidArgument(
                "session id and application name must not be empty".into(),
            ));
        }
        if session_id.contains(SEPARATOR) || application_name.contains(SEPARATOR) {
            return Err(SessionError::InvalidArgument(format!(
                "session id and application name must not contain '{SEPARATOR}'"
            )));
        }

        let hash_key = self.get_hash_key(session_id, application_name);
        let now = format_timestamp(Utc::now());

        let mut attributes = Item::new();
        attributes.insert(EXPIRES_KEY.into(), s(format_timestamp(expires)));
        attributes.insert(SESSION_DATA_KEY.into(), s(data.to_string()));
        attributes.insert(RECORD_FORMAT_KEY.into(), s(RECORD_FORMAT_VERSION.to_string()));

        let stored = if is_new {
            attributes.insert(CREATE_DATE_KEY.into(), s(now));
            attributes.insert(self.table.key_attribute().into(), s(hash_key.clone()));
            self.table.put_new_item(attributes.clone()).await?;
            tracing::debug!("Created session {}", hash_key);
            attributes
        } else {
            let mut if_absent = Item::new();
            if_absent.insert(CREATE_DATE_KEY.into(), s(now));
            let stored = self
                .table
                .update_item(&hash_key, attributes, if_absent)
                .await?;
            tracing::debug!("Updated session {}", hash_key);
            stored
        };

        self.map_item_to_record(&stored)
    }

    async fn delete_session(
        &self,
        session_id: &str,
        application_name: &str,
    ) -> Result<(), SessionError> {
        let hash_key = self.get_hash_key(session_id, application_name);
        self.table.delete_item(&hash_key).await
    }

    fn get_hash_key(&self, session_id: &str, application_name: &str) -> String {
        HashKey::new(application_name, session_id).to_string()
    }
}

fn s(value: String) -> AttributeValue {
    AttributeValue::S(value)
}

fn string_attribute<'a>(item: &'a Item, name: &str) -> Result<&'a str, SessionError> {
    item.get(name)
        .ok_or_else(|| SessionError::CorruptRecord(format!("missing attribute {name}")))?
        .as_s()
        .map(String::as_str)
        .map_err(|_| SessionError::CorruptRecord(format!("attribute {name} is not a string")))
}

/// Round-trippable UTC timestamp, e.g. `2026-10-14T09:30:00.123456Z`.
pub fn format_timestamp(value: DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Parse a stored timestamp as UTC.
///
/// Offsets are converted to UTC. Timestamps without an offset are taken
/// as UTC, never as local time.
pub fn parse_timestamp(raw: &str, attribute: &str) -> Result<DateTime<Utc>, SessionError> {
    if let Ok(value) = DateTime::parse_from_rfc3339(raw) {
        return Ok(value.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .map(|naive| naive.and_utc())
        .map_err(|e| {
            SessionError::CorruptRecord(format!("attribute {attribute} is not a timestamp: {e}"))
        })
}
