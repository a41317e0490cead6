pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod routes;
pub mod services;

use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use reader_core::{Catalog, Clock, SystemClock};
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;
use crate::db::{Database, MemoryStore, Store};
use crate::services::content::load_catalog;
use crate::services::pet::PetService;
use crate::services::practice::PracticeService;
use crate::services::progress::ProgressTracker;
use crate::services::speech::{
    AudioBackend, AudioCache, NoAudioBackend, PlainTextTranscriber, SpeechEvaluator,
    TranscriptEvaluator,
};
use crate::services::{shared_rng, SharedRng};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub catalog: Arc<Catalog>,
    pub clock: Arc<dyn Clock>,
    pub practice: Arc<PracticeService>,
    pub pets: PetService,
    pub progress: ProgressTracker,
}

impl AppState {
    /// Wire the services around one store, catalog, clock and random source.
    pub fn new(
        config: Config,
        store: Arc<dyn Store>,
        catalog: Catalog,
        clock: Arc<dyn Clock>,
        rng: SharedRng,
        speech: Arc<dyn SpeechEvaluator>,
        audio_backend: Arc<dyn AudioBackend>,
    ) -> Self {
        let catalog = Arc::new(catalog);
        let settings = config.practice.clone();
        let progress = ProgressTracker::new(store.clone(), settings.intervals);
        let pets = PetService::new(
            store.clone(),
            clock.clone(),
            &settings,
            config.pet_types.clone(),
        );
        let audio = Arc::new(AudioCache::new(config.tts_cache_dir.clone(), audio_backend));
        let practice = PracticeService::new(
            store,
            catalog.clone(),
            clock.clone(),
            rng,
            settings,
            progress.clone(),
            pets.clone(),
            speech,
            audio,
        );

        Self {
            config: Arc::new(config),
            catalog,
            clock,
            practice: Arc::new(practice),
            pets,
            progress,
        }
    }
}

/// Build the router with all routes.
pub fn build_router(state: AppState) -> Router {
    let protected_routes = Router::new()
        .route("/api/levels", get(routes::progress::levels))
        .route("/api/progress", get(routes::progress::overview))
        // Practice routes
        .route("/api/practice/start", post(routes::practice::start))
        .route("/api/practice/freecare", post(routes::practice::freecare))
        .route("/api/practice/current", get(routes::practice::current))
        .route("/api/practice/attempt", post(routes::practice::attempt))
        .route("/api/practice/care", post(routes::practice::care))
        .route("/api/practice/stop", post(routes::practice::stop))
        .route("/api/practice/block", post(routes::practice::block))
        .route("/api/practice/unblock", post(routes::practice::unblock))
        // Pet routes
        .route("/api/pet", get(routes::pet::get).put(routes::pet::update))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            routes::auth::auth_middleware,
        ));

    Router::new()
        .route("/health", get(health_check))
        .merge(protected_routes)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}

pub async fn run() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;

    tracing::info!("Loading content from {}...", config.content_dir.display());
    let catalog = load_catalog(&config.content_dir)?;

    let store: Arc<dyn Store> = match &config.database_url {
        Some(database_url) => {
            tracing::info!("Connecting to database...");
            let db = Database::connect(database_url).await?;

            tracing::info!("Running migrations...");
            db.run_migrations().await?;
            Arc::new(db)
        }
        None => {
            tracing::warn!("DATABASE_URL not set, progress is kept in memory only");
            Arc::new(MemoryStore::new())
        }
    };

    let speech = Arc::new(TranscriptEvaluator::new(
        PlainTextTranscriber,
        config.practice.match_threshold,
    ));
    let rng = shared_rng(config.rng_seed);
    let addr = config.bind_addr();

    let state = AppState::new(
        config,
        store,
        catalog,
        Arc::new(SystemClock),
        rng,
        speech,
        Arc::new(NoAudioBackend),
    );
    let app = build_router(state);

    tracing::info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn health_check() -> &'static str {
    "OK"
}
