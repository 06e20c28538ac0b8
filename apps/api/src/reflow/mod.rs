// Text reflow: raw extracted text → display lines → fixed-size pages.
// Cleanup calls go through llm_client; everything else here is pure and synchronous.

pub mod normalizer;
pub mod paginator;

// Re-export the public API consumed by the pipeline.
pub use normalizer::{FormattingMode, LineNormalizer, LlmCleanup, TextCleanup};
pub use paginator::{paginate, Page, LINES_PER_PAGE};
