//! Storage capability: a table keyed by a single string hash key.
//!
//! [`SessionTable`] covers item get/put/update/delete, [`TableAdmin`]
//! covers describe/create for the initializer. Items use the DynamoDB
//! attribute model directly.

pub mod dynamodb;
pub mod memory;

use std::collections::HashMap;
use std::future::Future;

use aws_sdk_dynamodb::types::AttributeValue;

use crate::config::Config;
use crate::error::SessionError;

/// Attribute name → value for one stored item.
pub type Item = HashMap<String, AttributeValue>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyRole {
    Hash,
    Range,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttributeKind {
    String,
    Number,
    Binary,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TableState {
    Creating,
    Active,
    Updating,
    Deleting,
    Other(String),
}

/// One element of a table's key schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyElement {
    pub attribute_name: String,
    pub role: KeyRole,
    /// `None` when the attribute has no definition.
    pub kind: Option<AttributeKind>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSchema {
    pub table_name: String,
    pub keys: Vec<KeyElement>,
    pub state: TableState,
}

impl TableSchema {
    /// The schema the session store creates and expects.
    pub fn single_hash_key(table_name: &str, attribute_name: &str, state: TableState) -> Self {
        Self {
            table_name: table_name.into(),
            keys: vec![KeyElement {
                attribute_name: attribute_name.into(),
                role: KeyRole::Hash,
                kind: Some(AttributeKind::String),
            }],
            state,
        }
    }

    pub fn hash_keys(&self) -> impl Iterator<Item = &KeyElement> {
        self.keys.iter().filter(|k| k.role == KeyRole::Hash)
    }

    pub fn range_keys(&self) -> impl Iterator<Item = &KeyElement> {
        self.keys.iter().filter(|k| k.role == KeyRole::Range)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateTableRequest {
    pub table_name: String,
    pub hash_key_attribute: String,
    pub read_capacity_units: i64,
    pub write_capacity_units: i64,
}

impl CreateTableRequest {
    pub fn from_config(config: &Config) -> Self {
        Self {
            table_name: config.table_name.clone(),
            hash_key_attribute: config.session_id_attribute_name.clone(),
            read_capacity_units: config.read_capacity_units,
            write_capacity_units: config.write_capacity_units,
        }
    }
}

/// Item operations against the session table.
///
/// Implementations must be `Send + Sync`; one handle is shared by every request.
pub trait SessionTable: Send + Sync {
    /// Name of the hash key attribute.
    fn key_attribute(&self) -> &str;

    fn get_item(&self, key: &str)
    -> impl Future<Output = Result<Option<Item>, SessionError>> + Send;

    /// Insert an item that must not exist yet. Fails with
    /// [`SessionError::SessionExists`] if the key is taken.
    fn put_new_item(&self, item: Item) -> impl Future<Output = Result<(), SessionError>> + Send;

    /// Upsert: overwrite `set`, write `set_if_absent` only where the
    /// attribute is missing. Returns the full item as stored.
    fn update_item(
        &self,
        key: &str,
        set: Item,
        set_if_absent: Item,
    ) -> impl Future<Output = Result<Item, SessionError>> + Send;

    /// Deleting a missing key is not an error.
    fn delete_item(&self, key: &str) -> impl Future<Output = Result<(), SessionError>> + Send;
}

/// Table-level operations used at startup.
pub trait TableAdmin: Send + Sync {
    /// `None` when the table doesn't exist.
    fn describe_table(
        &self,
    ) -> impl Future<Output = Result<Option<TableSchema>, SessionError>> + Send;

    fn create_table(
        &self,
        request: &CreateTableRequest,
    ) -> impl Future<Output = Result<(), SessionError>> + Send;
}

/// Type-erased table supporting both InMemory and DynamoDB.
///
/// The capability traits use RPITIT and aren't object-safe, so this enum
/// dispatches manually.
pub enum AnyTable {
    Memory(memory::MemoryTable),
    DynamoDb(dynamodb::DynamoDbTable),
}

impl SessionTable for AnyTable {
    fn key_attribute(&self) -> &str {
        match self {
            AnyTable::Memory(t) => t.key_attribute(),
            AnyTable::DynamoDb(t) => t.key_attribute(),
        }
    }

    async fn get_item(&self, key: &str) -> Result<Option<Item>, SessionError> {
        match self {
            AnyTable::Memory(t) => t.get_item(key).await,
            AnyTable::DynamoDb(t) => t.get_item(key).await,
        }
    }

    async fn put_new_item(&self, item: Item) -> Result<(), SessionError> {
        match self {
            AnyTable::Memory(t) => t.put_new_item(item).await,
            AnyTable::DynamoDb(t) => t.put_new_item(item).await,
        }
    }

    async fn update_item(
        &self,
        key: &str,
        set: Item,
        set_if_absent: Item,
    ) -> Result<Item, SessionError> {
        match self {
            AnyTable::Memory(t) => t.update_item(key, set, set_if_absent).await,
            AnyTable::DynamoDb(t) => t.update_item(key, set, set_if_absent).await,
        }
    }

    async fn delete_item(&self, key: &str) -> Result<(), SessionError> {
        match self {
            AnyTable::Memory(t) => t.delete_item(key).await,
            AnyTable::DynamoDb(t) => t.delete_item(key).await,
        }
    }
}

impl TableAdmin for AnyTable {
    async fn describe_table(&self) -> Result<Option<TableSchema>, SessionError> {
        match self {
            AnyTable::Memory(t) => t.describe_table().await,
            AnyTable::DynamoDb(t) => t.describe_table().await,
        }
    }

    async fn create_table(&self, request: &CreateTableRequest) -> Result<(), SessionError> {
        match self {
            AnyTable::Memory(t) => t.create_table(request).await,
            AnyTable::DynamoDb(t) => t.create_table(request).await,
        }
    }
}
