mod config;
mod db;
mod engine;
mod errors;
mod extract;
mod llm_client;
mod routes;
mod sessions;
mod state;
mod structured;
mod workflows;

use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::{CheckpointBackend, Config};
use crate::db::create_pool;
use crate::engine::{
    CheckpointStore, ExecutorConfig, MemoryCheckpointStore, PostgresCheckpointStore,
    RedisCheckpointStore,
};
use crate::extract::PdfTextExtractor;
use crate::llm_client::LlmClient;
use crate::routes::build_router;
use crate::sessions::{SessionManager, SessionSettings};
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_CRATE_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting resume assistant v{}", env!("CARGO_PKG_VERSION"));

    let store = build_checkpoint_store(&config).await?;

    // Initialize LLM client
    let llm = LlmClient::new(config.anthropic_api_key.clone());
    info!("LLM client initialized (model: {})", llm_client::MODEL);

    let settings = SessionSettings {
        parse_retries: config.parse_retries,
        executor: ExecutorConfig {
            node_timeout: config.node_timeout,
            max_steps: config.max_steps_per_run,
        },
    };
    let sessions = SessionManager::new(Arc::new(llm), Arc::new(PdfTextExtractor), store, settings)
        .context("Workflow graphs failed validation")?;
    info!(
        "Workflows compiled (node timeout {:?}, uploads in {})",
        config.node_timeout,
        config.upload_dir.display()
    );

    let state = AppState {
        sessions: Arc::new(sessions),
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

async fn build_checkpoint_store(config: &Config) -> Result<Arc<dyn CheckpointStore>> {
    let store: Arc<dyn CheckpointStore> = match &config.checkpoint_backend {
        CheckpointBackend::Memory => {
            info!("Checkpoints kept in memory; threads are lost on restart");
            Arc::new(MemoryCheckpointStore::new())
        }
        CheckpointBackend::Redis { url, ttl_secs } => {
            let store = RedisCheckpointStore::connect(url, *ttl_secs)
                .await
                .context("Failed to connect to Redis")?;
            info!("Checkpoints stored in Redis (ttl: {:?}s)", ttl_secs);
            Arc::new(store)
        }
        CheckpointBackend::Postgres { database_url } => {
            let pool = create_pool(database_url).await?;
            let store = PostgresCheckpointStore::new(pool)
                .await
                .context("Failed to prepare checkpoint table")?;
            info!("Checkpoints stored in PostgreSQL");
            Arc::new(store)
        }
    };
    Ok(store)
}
