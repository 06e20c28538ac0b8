//! Pipeline Orchestrator: extracted text in, one stored PDF out.
//!
//! Stages run strictly in order:
//! `Extracted → Normalized → Paginated → StyleResolved → Composed`.
//! Normalization never fails. Extraction, rendering and storage failures
//! abort the run and reach the caller as distinct `PipelineError` variants.
//!
//! Only the first page is composed. Later pages are paginated and then
//! dropped; the response reports how many there were.

pub mod handlers;

use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use serde::Serialize;
use thiserror::Error;
use tracing::info;

use crate::extract::{extract_text, ExtractionError};
use crate::reflow::{paginate, FormattingMode, LineNormalizer, Page, LINES_PER_PAGE};
use crate::render::composer::{compose, RandomJitter};
use crate::render::{ArtifactStore, DocumentRenderer, RenderError, StorageError};
use crate::style::{resolve, StyleConfig};

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("extraction failed: {0}")]
    Extraction(#[from] ExtractionError),

    #[error("rendering failed: {0}")]
    Render(#[from] RenderError),

    #[error("storing artifact failed: {0}")]
    Storage(#[from] StorageError),
}

/// Pipeline stage names, used for logging transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStage {
    Extracted,
    Normalized,
    Paginated,
    StyleResolved,
    Composed,
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PipelineStage::Extracted => "extracted",
            PipelineStage::Normalized => "normalized",
            PipelineStage::Paginated => "paginated",
            PipelineStage::StyleResolved => "style_resolved",
            PipelineStage::Composed => "composed",
        };
        f.write_str(name)
    }
}

/// The stored result of one pipeline run.
#[derive(Debug, Clone, Serialize)]
pub struct RenderedArtifact {
    pub filename: String,
    pub size_bytes: usize,
    /// Pages the text was split into.
    pub total_pages: usize,
    /// Pages actually rendered into the artifact. Currently always 1.
    pub rendered_pages: usize,
    /// Lines drawn on the rendered page.
    pub rendered_lines: usize,
}

#[derive(Clone)]
pub struct Pipeline {
    normalizer: LineNormalizer,
    renderer: Arc<dyn DocumentRenderer>,
    store: ArtifactStore,
}

impl Pipeline {
    pub fn new(
        normalizer: LineNormalizer,
        renderer: Arc<dyn DocumentRenderer>,
        store: ArtifactStore,
    ) -> Self {
        Self {
            normalizer,
            renderer,
            store,
        }
    }

    pub fn store(&self) -> &ArtifactStore {
        &self.store
    }

    /// Runs extraction, then the text pipeline.
    pub async fn process_document(
        &self,
        bytes: Bytes,
        config: &StyleConfig,
        mode: FormattingMode,
    ) -> Result<RenderedArtifact, PipelineError> {
        let text = extract_text(bytes).await?;
        self.process(&text, config, mode).await
    }

    /// Runs the text pipeline on already-extracted text.
    pub async fn process(
        &self,
        raw_text: &str,
        config: &StyleConfig,
        mode: FormattingMode,
    ) -> Result<RenderedArtifact, PipelineError> {
        log_stage(PipelineStage::Extracted, raw_text.chars().count());

        let lines = self.normalizer.normalize(raw_text, mode).await;
        log_stage(PipelineStage::Normalized, lines.len());

        let pages = paginate(lines, LINES_PER_PAGE);
        log_stage(PipelineStage::Paginated, pages.len());
        let total_pages = pages.len();

        let visual = resolve(config);
        info!(
            stage = %PipelineStage::StyleResolved,
            font = visual.font_family,
            ink = visual.ink_color,
            size = visual.font_size_px,
            "Pipeline stage"
        );

        let first = pages.into_iter().next().unwrap_or_else(Page::placeholder);
        if total_pages > 1 {
            info!(
                discarded = total_pages - 1,
                "Only the first page is rendered; remaining pages discarded"
            );
        }

        // The jitter source is dropped before the next await so the future stays Send.
        let document = {
            let mut jitter = RandomJitter::from_entropy();
            compose(&first, &visual, &mut jitter)
        };
        let bytes = self.renderer.render(&document).await?;
        let stored = self.store.save(&bytes).await?;
        log_stage(PipelineStage::Composed, stored.size_bytes);

        Ok(RenderedArtifact {
            filename: stored.filename,
            size_bytes: stored.size_bytes,
            total_pages,
            rendered_pages: 1,
            rendered_lines: first.lines.len(),
        })
    }
}

fn log_stage(stage: PipelineStage, count: usize) {
    info!(stage = %stage, count, "Pipeline stage");
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::Mutex;

    use async_trait::async_trait;

    use crate::render::composer::RenderableDocument;

    /// Renderer that records every document it is given and returns fake PDF bytes.
    #[derive(Default)]
    pub(crate) struct RecordingRenderer {
        pub documents: Mutex<Vec<RenderableDocument>>,
        pub fail: bool,
    }

    #[async_trait]
    impl DocumentRenderer for RecordingRenderer {
        async fn render(&self, document: &RenderableDocument) -> Result<Bytes, RenderError> {
            if self.fail {
                return Err(RenderError::Backend("printer on fire".into()));
            }
            self.documents.lock().unwrap().push(document.clone());
            Ok(Bytes::from(format!("%PDF-fake page {}", document.page_number)))
        }
    }

    pub(crate) fn pipeline_with(
        renderer: Arc<RecordingRenderer>,
        dir: &std::path::Path,
    ) -> Pipeline {
        Pipeline::new(LineNormalizer::local_only(), renderer, ArtifactStore::new(dir))
    }

    #[tokio::test]
    async fn test_empty_text_renders_single_blank_line() {
        let dir = tempfile::tempdir().unwrap();
        let renderer = Arc::new(RecordingRenderer::default());
        let pipeline = pipeline_with(renderer.clone(), dir.path());

        let artifact = pipeline
            .process("", &StyleConfig::default(), FormattingMode::Assisted)
            .await
            .unwrap();

        assert_eq!(artifact.total_pages, 1);
        assert_eq!(artifact.rendered_pages, 1);
        assert_eq!(artifact.rendered_lines, 1);

        let documents = renderer.documents.lock().unwrap();
        assert_eq!(documents.len(), 1);
        assert_eq!(documents[0].jitter.len(), 1);
        assert_eq!(documents[0].markup.matches(">&nbsp;</div>").count(), 1);
        assert!(dir.path().join(&artifact.filename).exists());
    }

    #[tokio::test]
    async fn test_only_first_of_six_pages_is_composed() {
        let dir = tempfile::tempdir().unwrap();
        let renderer = Arc::new(RecordingRenderer::default());
        let pipeline = pipeline_with(renderer.clone(), dir.path());

        // 130 paragraphs of exactly 40 characters → 130 lines.
        let text: String = (0..130)
            .map(|i| format!("{:0>3} {}\n", i, "x".repeat(36)))
            .collect();
        let artifact = pipeline
            .process(&text, &StyleConfig::default(), FormattingMode::LocalOnly)
            .await
            .unwrap();

        assert_eq!(artifact.total_pages, 6);
        assert_eq!(artifact.rendered_pages, 1);
        assert_eq!(artifact.rendered_lines, 25);

        let documents = renderer.documents.lock().unwrap();
        assert_eq!(documents.len(), 1);
        assert_eq!(documents[0].page_number, 1);
        assert!(documents[0].markup.contains("000 xxxx"));
        assert!(documents[0].markup.contains("024 xxxx"));
        assert!(!documents[0].markup.contains("025 xxxx"));
    }

    #[tokio::test]
    async fn test_render_failure_is_surfaced() {
        let dir = tempfile::tempdir().unwrap();
        let renderer = Arc::new(RecordingRenderer {
            fail: true,
            ..Default::default()
        });
        let pipeline = pipeline_with(renderer, dir.path());

        let err = pipeline
            .process("hello", &StyleConfig::default(), FormattingMode::Assisted)
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Render(_)));
    }

    #[tokio::test]
    async fn test_extraction_failure_is_surfaced() {
        let dir = tempfile::tempdir().unwrap();
        let renderer = Arc::new(RecordingRenderer::default());
        let pipeline = pipeline_with(renderer.clone(), dir.path());

        let err = pipeline
            .process_document(
                Bytes::from_static(&[0xff, 0xfe, 0x00]),
                &StyleConfig::default(),
                FormattingMode::Assisted,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Extraction(_)));
        assert!(renderer.documents.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_plain_text_document_flows_through() {
        let dir = tempfile::tempdir().unwrap();
        let renderer = Arc::new(RecordingRenderer::default());
        let pipeline = pipeline_with(renderer.clone(), dir.path());

        let artifact = pipeline
            .process_document(
                Bytes::from_static(b"Mitochondria\nThe powerhouse of the cell."),
                &StyleConfig::default(),
                FormattingMode::Assisted,
            )
            .await
            .unwrap();
        assert_eq!(artifact.rendered_lines, 2);
        let loaded = pipeline.store().load(&artifact.filename).await.unwrap();
        assert_eq!(&loaded[..], b"%PDF-fake page 1");
    }

    #[test]
    fn test_stage_names() {
        assert_eq!(PipelineStage::StyleResolved.to_string(), "style_resolved");
        assert_eq!(PipelineStage::Composed.to_string(), "composed");
    }
}
