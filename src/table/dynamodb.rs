//! DynamoDB session table for production/Lambda deployments.
//!
//! Table schema:
//! - `<key attribute>` (S): partition key, `<application>_<session id>`
//! - `Expires` (S): RFC 3339 UTC sliding expiration
//! - `CreateDate` (S): RFC 3339 UTC, written once
//! - `Data` (S): serializer output
//! - `Ver` (S): record format tag

use std::collections::{BTreeMap, HashMap};

use aws_sdk_dynamodb::Client;
use aws_sdk_dynamodb::error::{DisplayErrorContext, SdkError};
use aws_sdk_dynamodb::types::{
    AttributeDefinition, AttributeValue, KeySchemaElement, KeyType, ProvisionedThroughput,
    ReturnValue, ScalarAttributeType, TableDescription, TableStatus,
};

use super::{
    AttributeKind, CreateTableRequest, Item, KeyElement, KeyRole, SessionTable, TableAdmin,
    TableSchema, TableState,
};
use crate::error::SessionError;

/// DynamoDB-backed session table.
pub struct DynamoDbTable {
    client: Client,
    table_name: String,
    key_attribute: String,
}

impl DynamoDbTable {
    pub fn new(client: Client, table_name: String, key_attribute: String) -> Self {
        Self {
            client,
            table_name,
            key_attribute,
        }
    }

    fn key(&self, key: &str) -> AttributeValue {
        AttributeValue::S(key.to_string())
    }
}

fn storage_error<E>(operation: &str, table: &str, err: SdkError<E>) -> SessionError
where
    E: std::error::Error + Send + Sync + 'static,
{
    SessionError::StorageUnavailable(format!(
        "{operation} on {table} failed: {}",
        DisplayErrorContext(err)
    ))
}

impl SessionTable for DynamoDbTable {
    fn key_attribute(&self) -> &str {
        &self.key_attribute
    }

    async fn get_item(&self, key: &str) -> Result<Option<Item>, SessionError> {
        let output = self
            .client
            .get_item()
            .table_name(&self.table_name)
            .key(&self.key_attribute, self.key(key))
            .consistent_read(true)
            .send()
            .await
            .map_err(|e| storage_error("GetItem", &self.table_name, e))?;

        Ok(output.item().cloned())
    }

    async fn put_new_item(&self, item: Item) -> Result<(), SessionError> {
        let key = item
            .get(&self.key_attribute)
            .and_then(|v| v.as_s().ok())
            .cloned()
            .unwrap_or_default();

        let result = self
            .client
            .put_item()
            .table_name(&self.table_name)
            .set_item(Some(item))
            .condition_expression("attribute_not_exists(#key)")
            .expression_attribute_names("#key", &self.key_attribute)
            .send()
            .await;

        match result {
            Ok(_) => Ok(()),
            Err(err)
                if err
                    .as_service_error()
                    .is_some_and(|e| e.is_conditional_check_failed_exception()) =>
            {
                Err(SessionError::SessionExists(key))
            }
            Err(err) => Err(storage_error("PutItem", &self.table_name, err)),
        }
    }

    async fn update_item(
        &self,
        key: &str,
        set: Item,
        set_if_absent: Item,
    ) -> Result<Item, SessionError> {
        let update = UpdateExpression::build(set, set_if_absent);

        let output = self
            .client
            .update_item()
            .table_name(&self.table_name)
            .key(&self.key_attribute, self.key(key))
            .update_expression(update.expression)
            .set_expression_attribute_names(Some(update.names))
            .set_expression_attribute_values(Some(update.values))
            .return_values(ReturnValue::AllNew)
            .send()
            .await
            .map_err(|e| storage_error("UpdateItem", &self.table_name, e))?;

        output.attributes().cloned().ok_or_else(|| {
            SessionError::CorruptRecord(format!("UpdateItem on {key} returned no attributes"))
        })
    }

    async fn delete_item(&self, key: &str) -> Result<(), SessionError> {
        self.client
            .delete_item()
            .table_name(&self.table_name)
            .key(&self.key_attribute, self.key(key))
            .send()
            .await
            .map_err(|e| storage_error("DeleteItem", &self.table_name, e))?;
        Ok(())
    }
}

impl TableAdmin for DynamoDbTable {
    async fn describe_table(&self) -> Result<Option<TableSchema>, SessionError> {
        let result = self
            .client
            .describe_table()
            .table_name(&self.table_name)
            .send()
            .await;

        match result {
            Ok(output) => Ok(output
                .table()
                .map(|description| schema_from_description(&self.table_name, description))),
            Err(err)
                if err
                    .as_service_error()
                    .is_some_and(|e| e.is_resource_not_found_exception()) =>
            {
                Ok(None)
            }
            Err(err) => Err(storage_error("DescribeTable", &self.table_name, err)),
        }
    }

    async fn create_table(&self, request: &CreateTableRequest) -> Result<(), SessionError> {
        let invalid = |e: aws_sdk_dynamodb::error::BuildError| {
            SessionError::InvalidArgument(format!("invalid CreateTable request: {e}"))
        };

        let key_schema = KeySchemaElement::builder()
            .attribute_name(&request.hash_key_attribute)
            .key_type(KeyType::Hash)
            .build()
            .map_err(invalid)?;
        let attribute = AttributeDefinition::builder()
            .attribute_name(&request.hash_key_attribute)
            .attribute_type(ScalarAttributeType::S)
            .build()
            .map_err(invalid)?;
        let throughput = ProvisionedThroughput::builder()
            .read_capacity_units(request.read_capacity_units)
            .write_capacity_units(request.write_capacity_units)
            .build()
            .map_err(invalid)?;

        let result = self
            .client
            .create_table()
            .table_name(&request.table_name)
            .key_schema(key_schema)
            .attribute_definitions(attribute)
            .provisioned_throughput(throughput)
            .send()
            .await;

        match result {
            Ok(_) => Ok(()),
            Err(err)
                if err
                    .as_service_error()
                    .is_some_and(|e| e.is_resource_in_use_exception()) =>
            {
                tracing::info!(
                    "Table {} is already being created elsewhere",
                    request.table_name
                );
                Ok(())
            }
            Err(err) => Err(storage_error("CreateTable", &request.table_name, err)),
        }
    }
}

fn schema_from_description(table_name: &str, description: &TableDescription) -> TableSchema {
    let definitions: HashMap<&str, &ScalarAttributeType> = description
        .attribute_definitions()
        .iter()
        .map(|d| (d.attribute_name(), d.attribute_type()))
        .collect();

    let keys = description
        .key_schema()
        .iter()
        .map(|element| KeyElement {
            attribute_name: element.attribute_name().to_string(),
            role: match element.key_type() {
                KeyType::Range => KeyRole::Range,
                _ => KeyRole::Hash,
            },
            kind: definitions
                .get(element.attribute_name())
                .and_then(|t| match t {
                    ScalarAttributeType::S => Some(AttributeKind::String),
                    ScalarAttributeType::N => Some(AttributeKind::Number),
                    ScalarAttributeType::B => Some(AttributeKind::Binary),
                    _ => None,
                }),
        })
        .collect();

    let state = match description.table_status() {
        Some(TableStatus::Active) => TableState::Active,
        Some(TableStatus::Creating) => TableState::Creating,
        Some(TableStatus::Updating) => TableState::Updating,
        Some(TableStatus::Deleting) => TableState::Deleting,
        Some(other) => TableState::Other(other.as_str().to_string()),
        None => TableState::Other("UNKNOWN".into()),
    };

    TableSchema {
        table_name: table_name.to_string(),
        keys,
        state,
    }
}

/// `SET` expression with placeholder names and values.
struct UpdateExpression {
    expression: String,
    names: HashMap<String, String>,
    values: HashMap<String, AttributeValue>,
}

impl UpdateExpression {
    fn build(set: Item, set_if_absent: Item) -> Self {
        let mut clauses = Vec::new();
        let mut names = HashMap::new();
        let mut values = HashMap::new();

        // sorted so the expression is stable across calls
        let set: BTreeMap<_, _> = set.into_iter().collect();
        let set_if_absent: BTreeMap<_, _> = set_if_absent.into_iter().collect();

        for (i, (name, value)) in set.into_iter().enumerate() {
            clauses.push(format!("#s{i} = :s{i}"));
            names.insert(format!("#s{i}"), name);
            values.insert(format!(":s{i}"), value);
        }
        for (i, (name, value)) in set_if_absent.into_iter().enumerate() {
            clauses.push(format!("#a{i} = if_not_exists(#a{i}, :a{i})"));
            names.insert(format!("#a{i}"), name);
            values.insert(format!(":a{i}"), value);
        }

        Self {
            expression: format!("SET {}", clauses.join(", ")),
            names,
            values,
        }
    }
}
