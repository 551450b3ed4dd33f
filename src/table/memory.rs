//! In-memory session table for development and testing.
//!
//! Uses `DashMap` for concurrent access without external locks. Also
//! simulates table provisioning so the initializer can be exercised
//! without DynamoDB.

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::Mutex;

use aws_sdk_dynamodb::types::AttributeValue;

use super::{CreateTableRequest, Item, SessionTable, TableAdmin, TableSchema, TableState};
use crate::error::SessionError;

/// In-memory session table.
///
/// Not suitable for production: items are lost on restart and not
/// shared across processes. Use the DynamoDB table for production.
pub struct MemoryTable {
    key_attribute: String,
    items: DashMap<String, Item>,
    schema: Mutex<Option<TableSchema>>,
    /// Describe calls that still report `Creating` after a create.
    creating_polls: usize,
    polls_left: AtomicUsize,
    create_calls: AtomicUsize,
}

impl MemoryTable {
    /// An existing, active table with the expected key schema.
    pub fn new(key_attribute: &str) -> Self {
        let schema = TableSchema::single_hash_key("memory", key_attribute, TableState::Active);
        Self::with_schema(key_attribute, Some(schema))
    }

    /// A table that doesn't exist until `create_table` is called.
    pub fn missing(key_attribute: &str) -> Self {
        Self::with_schema(key_attribute, None)
    }

    /// A table reporting an arbitrary schema (or none).
    pub fn with_schema(key_attribute: &str, schema: Option<TableSchema>) -> Self {
        Self {
            key_attribute: key_attribute.into(),
            items: DashMap::new(),
            schema: Mutex::new(schema),
            creating_polls: 0,
            polls_left: AtomicUsize::new(0),
            create_calls: AtomicUsize::new(0),
        }
    }

    /// Report `Creating` for this many describes after a create.
    pub fn with_creating_polls(mut self, polls: usize) -> Self {
        self.creating_polls = polls;
        self.polls_left = AtomicUsize::new(polls);
        self
    }

    /// Number of items currently stored (including expired).
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// How many times `create_table` ran.
    pub fn create_calls(&self) -> usize {
        self.create_calls.load(Ordering::SeqCst)
    }

    /// Store an item verbatim, bypassing create semantics.
    pub fn insert_raw(&self, key: &str, item: Item) {
        self.items.insert(key.into(), item);
    }

    pub fn get_raw(&self, key: &str) -> Option<Item> {
        self.items.get(key).map(|e| e.value().clone())
    }
}

impl SessionTable for MemoryTable {
    fn key_attribute(&self) -> &str {
        &self.key_attribute
    }

    async fn get_item(&self, key: &str) -> Result<Option<Item>, SessionError> {
        Ok(self.items.get(key).map(|e| e.value().clone()))
    }

    async fn put_new_item(&self, item: Item) -> Result<(), SessionError> {
        let key = item
            .get(&self.key_attribute)
            .and_then(|v| v.as_s().ok())
            .cloned()
            .ok_or_else(|| {
                SessionError::InvalidArgument(format!(
                    "item is missing key attribute {}",
                    self.key_attribute
                ))
            })?;

        match self.items.entry(key) {
            Entry::Occupied(entry) => Err(SessionError::SessionExists(entry.key().clone())),
            Entry::Vacant(entry) => {
                entry.insert(item);
                Ok(())
            }
        }
    }

    async fn update_item(
        &self,
        key: &str,
        set: Item,
        set_if_absent: Item,
    ) -> Result<Item, SessionError> {
        let mut entry = self.items.entry(key.to_string()).or_insert_with(|| {
            let mut item = Item::new();
            item.insert(self.key_attribute.clone(), AttributeValue::S(key.to_string()));
            item
        });

        let stored = entry.value_mut();
        stored.extend(set);
        for (name, value) in set_if_absent {
            stored.entry(name).or_insert(value);
        }
        Ok(stored.clone())
    }

    async fn delete_item(&self, key: &str) -> Result<(), SessionError> {
        self.items.remove(key);
        Ok(())
    }
}

impl TableAdmin for MemoryTable {
    async fn describe_table(&self) -> Result<Option<TableSchema>, SessionError> {
        let mut guard = self.schema.lock().await;
        let Some(schema) = guard.as_mut() else {
            return Ok(None);
        };

        if schema.state == TableState::Creating {
            let left = self.polls_left.load(Ordering::SeqCst);
            if left == 0 {
                schema.state = TableState::Active;
            } else {
                self.polls_left.store(left - 1, Ordering::SeqCst);
            }
        }
        Ok(Some(schema.clone()))
    }

    async fn create_table(&self, request: &CreateTableRequest) -> Result<(), SessionError> {
        let mut guard = self.schema.lock().await;
        if guard.is_some() {
            return Err(SessionError::StorageUnavailable(format!(
                "table {} already exists",
                request.table_name
            )));
        }

        self.create_calls.fetch_add(1, Ordering::SeqCst);
        self.polls_left.store(self.creating_polls, Ordering::SeqCst);
        *guard = Some(TableSchema::single_hash_key(
            &request.table_name,
            &request.hash_key_attribute,
            TableState::Creating,
        ));
        Ok(())
    }
}
