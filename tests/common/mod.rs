//! Test utilities: in-memory test app builders, a switchable failing
//! table, and cookie helpers.

#![allow(dead_code)]

use axum::body::Body;
use axum::http::Request;
use dynamo_sessions::config::Config;
use dynamo_sessions::create_app;
use dynamo_sessions::error::SessionError;
use dynamo_sessions::repository::DynamoDbSessionRepository;
use dynamo_sessions::serializer;
use dynamo_sessions::session::store::SessionStore;
use dynamo_sessions::table::memory::MemoryTable;
use dynamo_sessions::table::{Item, SessionTable};
use serde_json::Value;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

pub type TestStore = SessionStore<DynamoDbSessionRepository<MemoryTable>>;

/// Build a test app over a `MemoryTable`.
pub fn build_test_app() -> (axum::Router, Arc<TestStore>) {
    build_test_app_with_config(Config::test_default())
}

/// Build a test app with a custom Config.
pub fn build_test_app_with_config(config: Config) -> (axum::Router, Arc<TestStore>) {
    let table = Arc::new(MemoryTable::new(&config.session_id_attribute_name));
    let serializer = serializer::from_config(&config);
    let repository = DynamoDbSessionRepository::new(table);
    let store = Arc::new(SessionStore::new(config, repository, serializer).unwrap());

    let app = create_app(store.clone());
    (app, store)
}

/// `MemoryTable` that can be told to fail reads or writes.
pub struct FlakyTable {
    inner: MemoryTable,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
}

impl FlakyTable {
    pub fn new(key_attribute: &str) -> Self {
        Self {
            inner: MemoryTable::new(key_attribute),
            fail_reads: AtomicBool::new(false),
            fail_writes: AtomicBool::new(false),
        }
    }

    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    fn check(&self, flag: &AtomicBool, operation: &str) -> Result<(), SessionError> {
        if flag.load(Ordering::SeqCst) {
            return Err(SessionError::StorageUnavailable(format!(
                "{operation} failed: connection refused"
            )));
        }
        Ok(())
    }
}

impl SessionTable for FlakyTable {
    fn key_attribute(&self) -> &str {
        self.inner.key_attribute()
    }

    async fn get_item(&self, key: &str) -> Result<Option<Item>, SessionError> {
        self.check(&self.fail_reads, "GetItem")?;
        self.inner.get_item(key).await
    }

    async fn put_new_item(&self, item: Item) -> Result<(), SessionError> {
        self.check(&self.fail_writes, "PutItem")?;
        self.inner.put_new_item(item).await
    }

    async fn update_item(
        &self,
        key: &str,
        set: Item,
        set_if_absent: Item,
    ) -> Result<Item, SessionError> {
        self.check(&self.fail_writes, "UpdateItem")?;
        self.inner.update_item(key, set, set_if_absent).await
    }

    async fn delete_item(&self, key: &str) -> Result<(), SessionError> {
        self.check(&self.fail_writes, "DeleteItem")?;
        self.inner.delete_item(key).await
    }
}

/// Build a test app over a [`FlakyTable`].
pub fn build_flaky_test_app() -> (axum::Router, Arc<FlakyTable>) {
    let config = Config::test_default();
    let table = Arc::new(FlakyTable::new(&config.session_id_attribute_name));
    let serializer = serializer::from_config(&config);
    let repository = DynamoDbSessionRepository::new(table.clone());
    let store = Arc::new(SessionStore::new(config, repository, serializer).unwrap());

    (create_app(store), table)
}

/// Helper to read response body as JSON.
pub async fn body_json(response: axum::response::Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

/// Session cookie value from the response's `Set-Cookie`, if any.
pub fn session_cookie(response: &axum::response::Response, name: &str) -> Option<String> {
    response
        .headers()
        .get("set-cookie")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| {
            s.split(';')
                .next()
                .and_then(|c| c.strip_prefix(&format!("{name}=")))
                .map(String::from)
        })
}

/// Build a request, optionally carrying the session cookie.
pub fn request(method: &str, uri: &str, cookie: Option<&str>, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(cookie) = cookie {
        builder = builder.header("Cookie", format!("__sid__={cookie}"));
    }
    match body {
        Some(body) => builder
            .header("Content-Type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}
