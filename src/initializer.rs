//! Startup check that the session table exists with a usable key schema.
//!
//! Runs once before the first load/save. Creating a table blocks until
//! DynamoDB reports it `ACTIVE`, which can take tens of seconds.

use std::sync::Arc;
use std::time::Duration;

use crate::config::Config;
use crate::error::SessionError;
use crate::table::{AttributeKind, CreateTableRequest, TableAdmin, TableSchema, TableState};

pub struct TableInitializer<A> {
    admin: Arc<A>,
    request: CreateTableRequest,
    poll_interval: Duration,
}

impl<A: TableAdmin> TableInitializer<A> {
    pub fn new(admin: Arc<A>, config: &Config) -> Self {
        Self {
            admin,
            request: CreateTableRequest::from_config(config),
            poll_interval: config.table_poll_interval,
        }
    }

    /// Ensure the table exists and can hold sessions. Idempotent.
    pub async fn initialize(&self) -> Result<(), SessionError> {
        let table = &self.request.table_name;

        let schema = match self.admin.describe_table().await? {
            Some(schema) if schema.state == TableState::Active => schema,
            Some(schema) => {
                tracing::info!("Table {} is {:?}, waiting", table, schema.state);
                self.wait_until_active().await?
            }
            None => {
                tracing::info!(
                    "Creating session table {} ({} RCU / {} WCU)",
                    table,
                    self.request.read_capacity_units,
                    self.request.write_capacity_units
                );
                self.admin.create_table(&self.request).await?;
                self.wait_until_active().await?
            }
        };

        validate_schema(table, &self.request.hash_key_attribute, &schema)?;
        tracing::info!("Session table {} is ready", table);
        Ok(())
    }

    async fn wait_until_active(&self) -> Result<TableSchema, SessionError> {
        loop {
            tokio::time::sleep(self.poll_interval).await;
            match self.admin.describe_table().await? {
                Some(schema) if schema.state == TableState::Active => return Ok(schema),
                Some(schema) => {
                    tracing::debug!("Table {} still {:?}", self.request.table_name, schema.state)
                }
                None => tracing::debug!("Table {} not visible yet", self.request.table_name),
            }
        }
    }
}

/// Exactly one string hash key named `key_attribute`, and no range key.
pub fn validate_schema(
    table: &str,
    key_attribute: &str,
    schema: &TableSchema,
) -> Result<(), SessionError> {
    let incompatible = |reason: &str| SessionError::IncompatibleSchema {
        table: table.to_string(),
        reason: reason.to_string(),
    };

    let hash_keys: Vec<_> = schema.hash_keys().collect();
    if hash_keys.len() != 1 {
        return Err(incompatible("it does not have a single hash key"));
    }
    if hash_keys[0].attribute_name != key_attribute {
        return Err(incompatible(&format!(
            "its hash key is {}, expected {}",
            hash_keys[0].attribute_name, key_attribute
        )));
    }
    if hash_keys[0].kind != Some(AttributeKind::String) {
        return Err(incompatible("its hash key is not a string"));
    }
    if schema.range_keys().next().is_some() {
        return Err(incompatible("it contains a range key"));
    }
    Ok(())
}
