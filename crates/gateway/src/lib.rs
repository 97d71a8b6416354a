//! HTTP API gateway for SecondBrain.
//!
//! Exposes the streaming chat endpoint, the knowledge endpoints and a health
//! check. Built on Axum.

pub mod api_v1;

use axum::{Router, response::Json, routing::get};
use secondbrain_chat::{ChatPipeline, ContextRetriever};
use secondbrain_config::{AppConfig, IngestConfig};
use secondbrain_core::knowledge::KnowledgeStore;
use secondbrain_knowledge::{
    ContentProcessor, InMemoryKnowledgeStore, IngestLimits, Ingestor, SqliteKnowledgeStore,
};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::CorsLayer;
use tracing::info;

/// Shared application state.
pub struct AppState {
    pub pipeline: ChatPipeline,
    pub store: Arc<dyn KnowledgeStore>,
    pub ingestor: Ingestor,
}

pub type SharedState = Arc<AppState>;

/// Build the full router: `/health` plus the v1 API nested under `/v1`.
pub fn build_router(state: SharedState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .nest("/v1", api_v1::v1_router(state))
        .layer(CorsLayer::permissive())
        .layer(tower_http::trace::TraceLayer::new_for_http())
}

/// Wire store, provider, pipeline and ingestor from configuration.
pub async fn build_state(config: &AppConfig) -> Result<SharedState, Box<dyn std::error::Error>> {
    let store = open_store(config).await?;
    let provider = secondbrain_providers::build_from_config(config)?;

    let retriever = ContextRetriever::new(store.clone(), &config.retrieval);
    let pipeline = ChatPipeline::new(
        retriever,
        provider.clone(),
        &config.default_model,
        config.default_temperature,
    );

    let processor = ContentProcessor::new(
        store.clone(),
        provider,
        &config.default_model,
        ingest_limits(&config.ingest),
    )?;
    let ingestor = Ingestor::new(store.clone(), Arc::new(processor));

    Ok(Arc::new(AppState {
        pipeline,
        store,
        ingestor,
    }))
}

async fn open_store(config: &AppConfig) -> Result<Arc<dyn KnowledgeStore>, Box<dyn std::error::Error>> {
    if config.store.backend == "memory" {
        info!("Using in-memory knowledge store; items are lost on exit");
        return Ok(Arc::new(InMemoryKnowledgeStore::new()));
    }

    let path = config.store.resolved_path();
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let store = SqliteKnowledgeStore::new(&path.to_string_lossy()).await?;
    Ok(Arc::new(store))
}

fn ingest_limits(config: &IngestConfig) -> IngestLimits {
    IngestLimits {
        max_input_chars: config.max_input_chars,
        document_fallback_chars: config.document_fallback_chars,
        web_fallback_chars: config.web_fallback_chars,
        fetch_timeout: Duration::from_secs(config.fetch_timeout_secs),
    }
}

/// Start the gateway HTTP server.
pub async fn start(config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let addr = format!("{}:{}", config.gateway.host, config.gateway.port);
    let state = build_state(&config).await?;
    let app = build_router(state);

    info!(addr = %addr, model = %config.default_model, "Gateway starting");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}
