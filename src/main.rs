//! Dual-mode entrypoint: Lambda or local dev server.
//!
//! Detects Lambda runtime via `AWS_LAMBDA_RUNTIME_API` env var.
//! - Lambda: `lambda_http::run(app)`, API Gateway v2 → HTTP
//! - Local: `axum::serve(listener, app)`, standard TCP server

use std::env;
use std::sync::Arc;
use tracing_subscriber::{EnvFilter, fmt};

use dynamo_sessions::config::Config;
use dynamo_sessions::create_app;
use dynamo_sessions::initializer::TableInitializer;
use dynamo_sessions::repository::DynamoDbSessionRepository;
use dynamo_sessions::serializer;
use dynamo_sessions::session::store::SessionStore;
use dynamo_sessions::table::AnyTable;
use dynamo_sessions::table::dynamodb::DynamoDbTable;
use dynamo_sessions::table::memory::MemoryTable;

#[tokio::main]
async fn main() {
    let is_lambda = env::var("AWS_LAMBDA_RUNTIME_API").is_ok();

    // Init tracing: JSON for Lambda, pretty for local
    if is_lambda {
        fmt()
            .json()
            .with_env_filter(EnvFilter::from_default_env())
            .init();
    } else {
        // Load .env for local dev
        let _ = dotenvy::dotenv();
        fmt()
            .with_env_filter(
                EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
            )
            .init();
    }

    let config = Config::from_env().expect("Failed to load configuration");

    // Session table: DynamoDB for production, in-memory for dev
    let table: AnyTable = if config.session_backend == "dynamodb" {
        let sdk_config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
        let dynamo_client = if config.dynamodb_endpoint.is_empty() {
            aws_sdk_dynamodb::Client::new(&sdk_config)
        } else {
            let dynamo_config = aws_sdk_dynamodb::config::Builder::from(&sdk_config)
                .endpoint_url(&config.dynamodb_endpoint)
                .build();
            aws_sdk_dynamodb::Client::from_conf(dynamo_config)
        };
        tracing::info!("Using DynamoDB session table {}", config.table_name);
        AnyTable::DynamoDb(DynamoDbTable::new(
            dynamo_client,
            config.table_name.clone(),
            config.session_id_attribute_name.clone(),
        ))
    } else {
        tracing::info!("Using in-memory session table");
        AnyTable::Memory(MemoryTable::new(&config.session_id_attribute_name))
    };
    let table = Arc::new(table);

    TableInitializer::new(table.clone(), &config)
        .initialize()
        .await
        .expect("Session table is not usable");

    let serializer = serializer::from_config(&config);
    let repository = DynamoDbSessionRepository::new(table);
    let store = Arc::new(
        SessionStore::new(config.clone(), repository, serializer)
            .expect("Invalid session configuration"),
    );

    let app = create_app(store);

    if is_lambda {
        tracing::info!("Starting in Lambda mode");
        lambda_http::run(app).await.expect("Lambda runtime error");
    } else {
        let addr = format!("0.0.0.0:{}", config.port);
        tracing::info!("Starting local server on {}", addr);
        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .expect("Failed to bind");
        axum::serve(listener, app).await.expect("Server error");
    }
}
