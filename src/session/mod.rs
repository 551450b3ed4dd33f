//! Per-request session bag and the pipeline-facing store.
//!
//! [`Session`] is what handlers read and mutate. [`store::SessionStore`]
//! loads it from the cookie-carried id and persists it afterwards;
//! [`middleware`] wires that into Axum.

pub mod cookie;
pub mod middleware;
pub mod store;

use std::collections::HashMap;

/// Key/value session data with a dirty flag.
#[derive(Debug, Clone, Default)]
pub struct Session {
    data: HashMap<String, serde_json::Value>,
    modified: bool,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap loaded data. The result is not marked modified.
    pub fn from_map(data: HashMap<String, serde_json::Value>) -> Self {
        Self {
            data,
            modified: false,
        }
    }

    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.data.get(key)
    }

    pub fn set(&mut self, key: &str, value: serde_json::Value) {
        self.data.insert(key.into(), value);
        self.modified = true;
    }

    pub fn remove(&mut self, key: &str) -> Option<serde_json::Value> {
        let removed = self.data.remove(key);
        if removed.is_some() {
            self.modified = true;
        }
        removed
    }

    pub fn clear(&mut self) {
        if !self.data.is_empty() {
            self.modified = true;
        }
        self.data.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &serde_json::Value)> {
        self.data.iter()
    }

    /// Whether anything changed since the session was loaded or created.
    pub fn is_modified(&self) -> bool {
        self.modified
    }
}

impl PartialEq for Session {
    fn eq(&self, other: &Self) -> bool {
        self.data == other.data
    }
}
