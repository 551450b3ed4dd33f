//! Encrypted server-side sessions stored in DynamoDB.
//!
//! Session data lives in a table keyed by `<application>_<session id>`;
//! only the id travels in the cookie. The same Axum router runs in both
//! Lambda and local dev contexts.

pub mod config;
pub mod crypto;
pub mod error;
pub mod hash_key;
pub mod initializer;
pub mod record;
pub mod repository;
pub mod routes;
pub mod serializer;
pub mod session;
pub mod table;
pub mod types;

use axum::Router;
use axum::middleware::from_fn;
use axum::routing::{get, post, put};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::repository::SessionRepository;
use crate::session::middleware::session_middleware;
use crate::session::store::SessionStore;

/// Shared application state available to all route handlers.
pub struct AppState {
    pub config: Config,
}

/// Build the Axum router with the session middleware and demo routes.
pub fn create_app<R: SessionRepository + 'static>(store: Arc<SessionStore<R>>) -> Router {
    let state = Arc::new(AppState {
        config: store.config().clone(),
    });

    let session_routes = Router::new()
        .route("/session", get(routes::session::get_session))
        .route(
            "/session/{key}",
            put(routes::session::put_value).delete(routes::session::delete_value),
        )
        .route("/abandon", post(routes::session::abandon))
        .layer(from_fn(move |req, next| {
            let store = store.clone();
            session_middleware(store, req, next)
        }));

    Router::new()
        .route("/health", get(routes::health::health))
        .merge(session_routes)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
