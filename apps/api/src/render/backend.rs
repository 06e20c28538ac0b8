//! Rendering backend seam and the worker pool in front of it.
//!
//! A `RenderBackend` knows how to start a worker, render one document on it,
//! and shut it down. `RenderPool` bounds how many workers exist at once and
//! reuses idle ones, so backend startup cost is paid once per worker rather
//! than once per request. Every launch and render is bounded by the pool's
//! timeout; a worker that fails or times out is retired, never reused.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;
use tokio::sync::{Mutex, Semaphore};
use tracing::{debug, info, warn};

use crate::render::composer::RenderableDocument;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("failed to launch rendering backend: {0}")]
    Launch(String),

    #[error("rendering backend failed: {0}")]
    Backend(String),

    #[error("rendering timed out after {secs}s")]
    Timeout { secs: u64 },

    #[error("rendering backend produced an empty document")]
    EmptyOutput,

    #[error("render pool is shut down")]
    PoolClosed,

    #[error("render I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A backend able to paint a `RenderableDocument` into a fixed-format binary.
#[async_trait]
pub trait RenderBackend: Send + Sync + 'static {
    type Worker: Send + 'static;

    /// Starts a fresh worker.
    async fn launch(&self) -> Result<Self::Worker, RenderError>;

    /// Renders one document on an already-running worker.
    async fn render(
        &self,
        worker: &mut Self::Worker,
        document: &RenderableDocument,
    ) -> Result<Bytes, RenderError>;

    /// Shuts a worker down. The default just drops it.
    async fn retire(&self, _worker: Self::Worker) {}
}

/// What the pipeline depends on: something that turns a document into bytes.
#[async_trait]
pub trait DocumentRenderer: Send + Sync {
    async fn render(&self, document: &RenderableDocument) -> Result<Bytes, RenderError>;
}

/// Bounded pool of reusable backend workers.
///
/// At most `size` workers exist at any time.
pub struct RenderPool<B: RenderBackend> {
    backend: B,
    idle: Mutex<Vec<B::Worker>>,
    permits: Semaphore,
    size: usize,
    timeout: Duration,
}

impl<B: RenderBackend> RenderPool<B> {
    pub fn new(backend: B, size: usize, timeout: Duration) -> Self {
        let size = size.max(1);
        Self {
            backend,
            idle: Mutex::new(Vec::with_capacity(size)),
            permits: Semaphore::new(size),
            size,
            timeout,
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    #[cfg(test)]
    pub async fn idle_workers(&self) -> usize {
        self.idle.lock().await.len()
    }

    /// Stops handing out workers and shuts down the idle ones. Renders already
    /// in flight finish normally; their workers are dropped afterwards.
    pub async fn close(&self) {
        self.permits.close();
        let workers = std::mem::take(&mut *self.idle.lock().await);
        let count = workers.len();
        for worker in workers {
            self.retire(worker).await;
        }
        info!(workers = count, "Render pool closed");
    }

    fn timeout_error(&self) -> RenderError {
        RenderError::Timeout {
            secs: self.timeout.as_secs(),
        }
    }

    async fn retire(&self, worker: B::Worker) {
        if tokio::time::timeout(self.timeout, self.backend.retire(worker))
            .await
            .is_err()
        {
            warn!("Render worker did not shut down in time, dropped");
        }
    }
}

#[async_trait]
impl<B: RenderBackend> DocumentRenderer for RenderPool<B> {
    async fn render(&self, document: &RenderableDocument) -> Result<Bytes, RenderError> {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| RenderError::PoolClosed)?;

        let reused = self.idle.lock().await.pop();
        let mut worker = match reused {
            Some(worker) => {
                debug!("Reusing idle render worker");
                worker
            }
            None => {
                info!("Launching render worker");
                tokio::time::timeout(self.timeout, self.backend.launch())
                    .await
                    .map_err(|_| self.timeout_error())??
            }
        };

        let outcome = tokio::time::timeout(self.timeout, self.backend.render(&mut worker, document))
            .await
            .unwrap_or_else(|_| Err(self.timeout_error()));

        match outcome {
            Ok(bytes) if bytes.is_empty() => {
                warn!(page = document.page_number, "Render produced no bytes, retiring worker");
                self.retire(worker).await;
                Err(RenderError::EmptyOutput)
            }
            Ok(bytes) => {
                self.idle.lock().await.push(worker);
                Ok(bytes)
            }
            Err(e) => {
                warn!(page = document.page_number, "Render failed, retiring worker: {e}");
                self.retire(worker).await;
                Err(e)
            }
        }
    }
}
