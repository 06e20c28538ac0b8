// Page composition and rendering.
// composer builds HTML for one page; backend turns it into PDF bytes through a
// bounded worker pool; storage persists the bytes under a unique name.

pub mod backend;
pub mod chromium;
pub mod composer;
pub mod storage;

pub use backend::{DocumentRenderer, RenderError, RenderPool};
pub use chromium::ChromiumBackend;
pub use storage::{ArtifactStore, StorageError};
