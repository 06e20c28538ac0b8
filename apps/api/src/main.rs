mod config;
mod errors;
mod extract;
mod llm_client;
mod pipeline;
mod reflow;
mod render;
mod routes;
mod state;
mod style;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;
use crate::llm_client::LlmClient;
use crate::pipeline::Pipeline;
use crate::reflow::{LineNormalizer, LlmCleanup, TextCleanup};
use crate::render::{ArtifactStore, ChromiumBackend, RenderPool};
use crate::routes::build_router;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_CRATE_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting InkNotes API v{}", env!("CARGO_PKG_VERSION"));

    // Text cleanup is optional: without a key every request formats locally.
    let normalizer = match &config.anthropic_api_key {
        Some(key) => {
            let llm = LlmClient::new(key.clone()).context("Failed to build LLM HTTP client")?;
            info!("LLM cleanup enabled (model: {})", llm_client::MODEL);
            let cleanup: Arc<dyn TextCleanup> = Arc::new(LlmCleanup(llm));
            LineNormalizer::new(Some(cleanup))
        }
        None => {
            warn!("ANTHROPIC_API_KEY not set, text will be formatted locally");
            LineNormalizer::local_only()
        }
    };

    let render_timeout = Duration::from_secs(config.render_timeout_secs);
    let backend = ChromiumBackend::new(config.chrome_bin.clone(), render_timeout);
    let render_pool = Arc::new(RenderPool::new(
        backend,
        config.render_pool_size,
        render_timeout,
    ));
    info!(
        "Render pool: {} worker(s) using {}",
        render_pool.size(),
        config.chrome_bin.display()
    );

    let store = ArtifactStore::new(config.output_dir.clone());
    store
        .ensure_dir()
        .await
        .with_context(|| format!("Cannot create output dir {}", store.dir().display()))?;
    info!("Artifacts stored in {}", store.dir().display());

    let state = AppState {
        config: config.clone(),
        pipeline: Pipeline::new(normalizer, render_pool.clone(), store),
    };

    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    render_pool.close().await;
    info!("Shut down");
    Ok(())
}

/// Resolves on Ctrl-C.
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received, draining connections");
}
