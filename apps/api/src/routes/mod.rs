pub mod health;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};

use crate::pipeline::handlers;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    let upload_limit = state.config.max_upload_bytes;

    Router::new()
        .route("/", get(root_handler))
        .route("/health", get(health::health_handler))
        .route("/upload", post(handlers::handle_upload))
        .route("/download/:filename", get(handlers::handle_download))
        .route("/api/v1/render", post(handlers::handle_render_text))
        .layer(DefaultBodyLimit::max(upload_limit))
        .with_state(state)
}

async fn root_handler() -> &'static str {
    "InkNotes API is running"
}
