mod config;
mod db;
mod errors;
mod llm_client;
mod models;
mod routes;
mod screening;
mod state;
mod store;

use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::{Config, StoreConfig};
use crate::db::create_pool;
use crate::llm_client::LlmClient;
use crate::routes::build_router;
use crate::screening::{BatchRunner, CandidateProcessor};
use crate::state::AppState;
use crate::store::{MemoryStore, PgStore, Store, SupabaseStore};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Screener API v{}", env!("CARGO_PKG_VERSION"));

    let store = build_store(&config.store).await?;
    info!("Store initialized (backend: {})", store.backend());

    // Initialize LLM client
    let llm = LlmClient::new(config.deepseek_api_key.clone())
        .context("LLM client could not be created")?
        .with_timeouts(
            Duration::from_secs(config.llm_connect_timeout_secs),
            Duration::from_secs(config.llm_request_timeout_secs),
        )
        .context("LLM HTTP client could not be built")?
        .with_backoff(Duration::from_millis(config.llm_retry_backoff_ms))
        .with_base_url(config.llm_base_url.clone())
        .with_model(config.llm_model.clone());
    info!("LLM client initialized (model: {})", llm.model());

    let processor = CandidateProcessor::new(store.clone(), Arc::new(llm));
    let batches = BatchRunner::new(processor, config.batch_workers);
    info!("Batch runner ready with {} worker(s)", batches.workers());

    // Build app state
    let state = AppState {
        store,
        batches,
        config: config.clone(),
    };

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Constructs the configured `Store` backend.
async fn build_store(config: &StoreConfig) -> Result<Arc<dyn Store>> {
    info!("Using {} store", config.label());
    let store: Arc<dyn Store> = match config {
        StoreConfig::Supabase { url, key } => Arc::new(
            SupabaseStore::new(url, key).context("Supabase client could not be created")?,
        ),
        StoreConfig::Postgres { database_url } => {
            Arc::new(PgStore::new(create_pool(database_url).await?))
        }
        StoreConfig::Memory => Arc::new(MemoryStore::new()),
    };
    Ok(store)
}
