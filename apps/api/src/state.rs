use crate::config::Config;
use crate::pipeline::Pipeline;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    /// Normalizer, render pool and artifact store, wired once at startup.
    pub pipeline: Pipeline,
}
