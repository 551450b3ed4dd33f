//! Pipeline-facing session store.
//!
//! Turns a cookie value into a [`Session`] and back. The cookie only ever
//! carries the session id; a record that can't be found, has expired, or
//! can't be read yields a fresh session without an id, so the next save
//! mints a new one. Expired and unreadable records are deleted.

use chrono::Utc;
use std::sync::Arc;

use super::Session;
use super::cookie::{SessionCookie, generate_session_id, parse_session_id};
use crate::config::Config;
use crate::error::{ErrorKind, SessionError};
use crate::record::SessionRecord;
use crate::repository::SessionRepository;
use crate::serializer::SessionSerializer;

/// Result of [`SessionStore::load`].
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedSession {
    /// Id of the stored record, `None` for a fresh session.
    pub session_id: Option<String>,
    pub session: Session,
}

impl LoadedSession {
    fn fresh() -> Self {
        Self {
            session_id: None,
            session: Session::new(),
        }
    }
}

/// Result of a save that actually wrote.
#[derive(Debug, Clone)]
pub struct SavedSession {
    pub record: SessionRecord,
    pub cookie: SessionCookie,
}

pub struct SessionStore<R> {
    config: Config,
    repository: R,
    serializer: Arc<dyn SessionSerializer>,
}

impl<R: SessionRepository> SessionStore<R> {
    pub fn new(
        config: Config,
        repository: R,
        serializer: Arc<dyn SessionSerializer>,
    ) -> Result<Self, SessionError> {
        config.validate()?;
        Ok(Self {
            config,
            repository,
            serializer,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn repository(&self) -> &R {
        &self.repository
    }

    pub fn cookie_name(&self) -> &str {
        &self.config.session_id_cookie_name
    }

    /// Load the session named by a raw cookie value.
    ///
    /// Storage failures propagate. Everything else degrades to a fresh
    /// session.
    pub async fn load(&self, cookie_value: Option<&str>) -> Result<LoadedSession, SessionError> {
        let Some(session_id) = cookie_value.and_then(parse_session_id) else {
            return Ok(LoadedSession::fresh());
        };
        let application = &self.config.application_name;

        let record = match self.repository.load_session(&session_id, application).await {
            Ok(Some(record)) => record,
            Ok(None) => return Ok(LoadedSession::fresh()),
            Err(e) if matches!(e.kind(), ErrorKind::CorruptRecord | ErrorKind::InvalidFormat) => {
                tracing::warn!("Removing unreadable session {}: {}", session_id, e);
                self.repository
                    .delete_session(&session_id, application)
                    .await?;
                return Ok(LoadedSession::fresh());
            }
            Err(e) => return Err(e),
        };

        if record.has_expired() {
            tracing::warn!(
                "Session {} expired at {}, removing",
                session_id,
                record.expires()
            );
            self.repository
                .delete_session(&session_id, application)
                .await?;
            return Ok(LoadedSession::fresh());
        }

        Ok(LoadedSession {
            session_id: Some(session_id),
            session: self.serializer.deserialize(record.data()),
        })
    }

    /// Persist `session`, sliding its expiration forward.
    ///
    /// Returns `Ok(None)` when nothing needed writing.
    pub async fn save(
        &self,
        session_id: Option<&str>,
        session: &Session,
    ) -> Result<Option<SavedSession>, SessionError> {
        if !session.is_modified() && !self.config.always_save {
            return Ok(None);
        }
        // nothing to keep for a session that never existed
        if session_id.is_none() && session.is_empty() {
            return Ok(None);
        }

        let data = self.serializer.serialize(session)?;
        let expires = Utc::now() + self.config.session_timeout();

        let record = match session_id {
            Some(id) => {
                self.repository
                    .save_session(id, &self.config.application_name, &data, expires, false)
                    .await?
            }
            None => {
                let id = generate_session_id();
                self.repository
                    .save_session(&id, &self.config.application_name, &data, expires, true)
                    .await?
            }
        };

        let cookie =
            SessionCookie::for_record(self.cookie_name(), record.session_id(), record.expires());
        Ok(Some(SavedSession { record, cookie }))
    }

    /// Delete the stored record, if any.
    pub async fn abandon(&self, session_id: &str) -> Result<(), SessionError> {
        self.repository
            .delete_session(session_id, &self.config.application_name)
            .await?;
        tracing::debug!("Abandoned session {}", session_id);
        Ok(())
    }
}
