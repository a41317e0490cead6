//! Common test utilities and fixtures for integration tests.
//!
//! This module provides shared test infrastructure including:
//! - TestContext wiring the router to an in-memory store and a fixed clock
//! - Request helpers that attach the bearer token and user id
//!
//! # Requirements
//! Tests built with `TestContext::with_database` need a PostgreSQL database
//! (set DATABASE_URL env var) and are marked ignored.

#![allow(dead_code)]

pub mod fixtures;

use std::sync::Arc;

use axum::http::{header::AUTHORIZATION, HeaderName, HeaderValue};
use axum::Router;
use axum_test::{TestRequest, TestServer};
use chrono::{TimeZone, Utc};
use reader_core::{Catalog, FixedClock};

use pet_reader_backend::config::Config;
use pet_reader_backend::db::{Database, MemoryStore, Store};
use pet_reader_backend::routes::auth::USER_ID_HEADER;
use pet_reader_backend::services::shared_rng;
use pet_reader_backend::services::speech::{
    NoAudioBackend, PlainTextTranscriber, TranscriptEvaluator,
};
use pet_reader_backend::{build_router, AppState};

pub const TEST_TOKEN: &str = "test-token";

/// Test context containing the store, the clock and the router.
pub struct TestContext {
    pub store: Arc<MemoryStore>,
    pub clock: FixedClock,
    app: Router,
}

impl TestContext {
    /// Context over the sample catalog.
    pub fn new() -> Self {
        Self::with_catalog(fixtures::sample_catalog())
    }

    pub fn with_catalog(catalog: Catalog) -> Self {
        let store = Arc::new(MemoryStore::new());
        let clock = FixedClock::new(Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap());
        let app = build_app(store.clone(), catalog, clock.clone());
        Self { store, clock, app }
    }

    /// Router over PostgreSQL.
    ///
    /// # Panics
    /// Panics if DATABASE_URL is not set or database connection fails.
    pub async fn with_database() -> Router {
        dotenvy::dotenv().ok();

        let database_url =
            std::env::var("DATABASE_URL").expect("DATABASE_URL must be set for integration tests");

        let db = Database::connect(&database_url)
            .await
            .expect("Failed to connect to test database");

        db.run_migrations()
            .await
            .expect("Failed to run migrations");

        build_app(
            Arc::new(db),
            fixtures::sample_catalog(),
            FixedClock::new(Utc::now()),
        )
    }

    /// Get the router for use with axum-test.
    pub fn router(&self) -> Router {
        self.app.clone()
    }

    pub fn server(&self) -> TestServer {
        TestServer::new(self.router()).unwrap()
    }

    /// Format authorization header value.
    pub fn auth_header_value(token: &str) -> String {
        format!("Bearer {}", token)
    }
}

fn build_app(store: Arc<dyn Store>, catalog: Catalog, clock: FixedClock) -> Router {
    let config = Config {
        api_token: TEST_TOKEN.to_string(),
        tts_cache_dir: std::env::temp_dir().join(format!("tts-{}", uuid::Uuid::new_v4())),
        ..Config::default()
    };
    let speech = Arc::new(TranscriptEvaluator::new(
        PlainTextTranscriber,
        config.practice.match_threshold,
    ));
    let state = AppState::new(
        config,
        store,
        catalog,
        Arc::new(clock),
        shared_rng(Some(42)),
        speech,
        Arc::new(NoAudioBackend),
    );
    build_router(state)
}

/// Attach the test token and the user id to a request.
pub fn as_user(request: TestRequest, user_id: i64) -> TestRequest {
    request
        .add_header(
            AUTHORIZATION,
            HeaderValue::from_str(&TestContext::auth_header_value(TEST_TOKEN)).unwrap(),
        )
        .add_header(
            HeaderName::from_static(USER_ID_HEADER),
            HeaderValue::from_str(&user_id.to_string()).unwrap(),
        )
}
