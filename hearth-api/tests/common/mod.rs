//! Common test utilities for integration tests
//!
//! This module provides shared infrastructure for integration tests:
//! - Test database setup (skipped when `DATABASE_URL` is unset)
//! - A router built exactly as the server builds it
//! - Request helpers that attach the API key and a bearer token
//! - A parent with a house, ready to use

#![allow(dead_code)]

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use hearth_api::app::{build_router, AppState};
use hearth_api::config::Config;
use hearth_shared::db::migrations::run_migrations;
use hearth_shared::models::house::House;
use serde_json::{json, Value};
use sqlx::PgPool;
use tower::Service as _;
use uuid::Uuid;

pub const TEST_API_KEY: &str = "test-api-key";
pub const TEST_PASSWORD: &str = "Feed-the-c4t!";

/// Test context containing all necessary resources
pub struct TestContext {
    pub db: PgPool,
    pub app: axum::Router,
    pub config: Config,
}

/// A registered parent who owns a house
pub struct Household {
    pub house_id: Uuid,
    pub parent_id: Uuid,
    pub token: String,
}

impl TestContext {
    /// Creates a test context, or `None` when no database is configured
    pub async fn new() -> anyhow::Result<Option<Self>> {
        dotenvy::dotenv().ok();
        let Ok(database_url) = std::env::var("DATABASE_URL") else {
            eprintln!("DATABASE_URL not set, skipping");
            return Ok(None);
        };

        let files_path = std::env::temp_dir().join("hearth-test-files");
        let files_path = files_path.to_string_lossy().to_string();

        let config = Config::from_lookup(|key| match key {
            "DATABASE_URL" => Some(database_url.clone()),
            "API_KEY" => Some(TEST_API_KEY.to_string()),
            "JWT_SECRET" => Some("test-jwt-secret-that-is-long-enough-0001".to_string()),
            "CRYPTO_SECRET" => Some("test-crypto-secret-that-is-long-enough-01".to_string()),
            "FILES_PATH" => Some(files_path.clone()),
            _ => None,
        })?;

        let db = PgPool::connect(&config.database.url).await?;
        run_migrations(&db).await?;
        tokio::fs::create_dir_all(&config.storage.files_path).await?;

        let state = AppState::new(db.clone(), config.clone())?;
        let app = build_router(state);

        Ok(Some(TestContext { db, app, config }))
    }

    /// Sends a request with the API key and an optional bearer token
    pub async fn send(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header("x-api-key", TEST_API_KEY);

        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {}", token));
        }

        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.app.clone().call(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };

        (status, json)
    }

    /// Registers a parent and creates their house
    pub async fn household(&self, house_name: &str) -> Household {
        let email = format!("parent-{}@example.com", Uuid::new_v4());
        let (status, body) = self
            .send(
                Method::POST,
                "/auth/register",
                None,
                Some(json!({
                    "email": email,
                    "password": TEST_PASSWORD,
                    "first_name": "Alex",
                    "last_name": "Martin"
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "register failed: {}", body);

        let token = body["access_token"].as_str().unwrap().to_string();
        let parent_id: Uuid = body["user"]["id"].as_str().unwrap().parse().unwrap();

        let (status, body) = self
            .send(
                Method::POST,
                "/house",
                Some(&token),
                Some(json!({ "name": house_name })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "house creation failed: {}", body);

        Household {
            house_id: body["id"].as_str().unwrap().parse().unwrap(),
            parent_id,
            token,
        }
    }

    /// Deletes a house; members, animals and tasks go with it
    pub async fn cleanup(&self, house_id: Uuid) {
        House::delete(&self.db, house_id).await.unwrap();
    }
}
