//! Axum session middleware layer.
//!
//! Reads the session id cookie, loads the session through the
//! [`SessionStore`], makes it available via request extensions, and
//! saves or abandons it on response.
//!
//! The session is passed through request extensions:
//! - `SessionHandle`: shared mutable access to the session bag
//! - Route handlers modify the bag via the handle
//! - The middleware persists it after the handler returns

use axum::extract::{FromRequestParts, Request};
use axum::http::request::Parts;
use axum::http::{HeaderValue, header};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use std::sync::Arc;
use tokio::sync::Mutex;

use super::Session;
use super::cookie::{parse_cookie, removal_header_value};
use super::store::{LoadedSession, SessionStore};
use crate::error::SessionError;
use crate::repository::SessionRepository;

/// Shared handle to session state, inserted into request extensions.
#[derive(Clone)]
pub struct SessionHandle {
    /// `None` until the session has been stored once.
    pub id: Option<String>,
    pub data: Arc<Mutex<Session>>,
    pub abandoned: Arc<Mutex<bool>>,
}

/// Extract SessionHandle from request extensions (put there by session middleware).
impl<S> FromRequestParts<S> for SessionHandle
where
    S: Send + Sync,
{
    type Rejection = SessionError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<SessionHandle>()
            .cloned()
            .ok_or(SessionError::InvalidArgument(
                "Session middleware not configured".into(),
            ))
    }
}

impl SessionHandle {
    fn new(loaded: LoadedSession) -> Self {
        Self {
            id: loaded.session_id,
            data: Arc::new(Mutex::new(loaded.session)),
            abandoned: Arc::new(Mutex::new(false)),
        }
    }

    /// Drop the session once the handler returns.
    pub async fn abandon(&self) {
        *self.abandoned.lock().await = true;
    }
}

/// Axum middleware function for session handling.
pub async fn session_middleware<R: SessionRepository + 'static>(
    store: Arc<SessionStore<R>>,
    mut req: Request,
    next: Next,
) -> Response {
    let cookie_header = req
        .headers()
        .get(header::COOKIE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    let cookie_value = parse_cookie(cookie_header, store.cookie_name()).map(str::to_owned);

    let loaded = match store.load(cookie_value.as_deref()).await {
        Ok(loaded) => loaded,
        Err(e) => {
            tracing::error!("Failed to load session: {}", e);
            return e.into_response();
        }
    };

    let handle = SessionHandle::new(loaded);
    req.extensions_mut().insert(handle.clone());

    // Run the route handler
    let mut response = next.run(req).await;

    let abandoned = *handle.abandoned.lock().await;
    let session = handle.data.lock().await.clone();
    let https_only = store.config().https_only;

    let set_cookie = if abandoned {
        if let Some(id) = handle.id.as_deref()
            && let Err(e) = store.abandon(id).await
        {
            tracing::error!("Failed to abandon session {}: {}", id, e);
            return e.into_response();
        }
        Some(removal_header_value(store.cookie_name(), https_only))
    } else {
        match store.save(handle.id.as_deref(), &session).await {
            Ok(saved) => saved.map(|saved| saved.cookie.to_header_value(https_only)),
            Err(e) => {
                tracing::error!("Failed to save session: {}", e);
                return e.into_response();
            }
        }
    };

    if let Some(cookie) = set_cookie {
        match HeaderValue::from_str(&cookie) {
            Ok(value) => {
                response.headers_mut().append(header::SET_COOKIE, value);
            }
            Err(e) => tracing::error!("Invalid Set-Cookie value: {}", e),
        }
    }

    response
}
