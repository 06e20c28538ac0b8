//! Line Normalizer: turns raw extracted text into display lines.
//!
//! Two interchangeable strategies sit behind one `normalize` call:
//! - assisted: a `TextCleanup` service (the LLM) reflows the text,
//! - local: a deterministic greedy wrap at `FALLBACK_WIDTH` characters.
//!
//! The local strategy runs whenever the assisted one is unavailable, disabled,
//! or errors. A well-formed reply is taken as is, even when it holds no lines.
//! Callers never see a cleanup error.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::llm_client::{LlmClient, LlmError};

/// At most this many characters of input are sent to the cleanup service.
pub const MAX_CLEANUP_CHARS: usize = 15_000;
/// Wrap width of the local strategy, in characters.
pub const FALLBACK_WIDTH: usize = 50;

// ────────────────────────────────────────────────────────────────────────────
// Types
// ────────────────────────────────────────────────────────────────────────────

/// One line of text, ready to be drawn.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DisplayLine(String);

impl DisplayLine {
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    /// An empty line that still occupies vertical space when rendered.
    pub fn blank() -> Self {
        Self(String::new())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }

    /// Length in characters, not bytes.
    #[cfg(test)]
    pub fn char_len(&self) -> usize {
        self.0.chars().count()
    }
}

impl From<&str> for DisplayLine {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for DisplayLine {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Whether the caller allows the cleanup service to be used.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FormattingMode {
    #[default]
    Assisted,
    /// Caller explicitly disabled AI formatting.
    LocalOnly,
}

impl FormattingMode {
    pub fn from_flag(ai_format: Option<bool>) -> Self {
        match ai_format {
            Some(false) => FormattingMode::LocalOnly,
            _ => FormattingMode::Assisted,
        }
    }
}

#[derive(Debug, Error)]
pub enum CleanupError {
    #[error("cleanup service call failed: {0}")]
    Service(#[from] LlmError),
}

// ────────────────────────────────────────────────────────────────────────────
// Cleanup service seam
// ────────────────────────────────────────────────────────────────────────────

/// A remote service that reflows text into lines. Best-effort by contract.
#[async_trait]
pub trait TextCleanup: Send + Sync {
    async fn cleanup(&self, text: &str) -> Result<Vec<String>, CleanupError>;
}

/// `TextCleanup` backed by the shared LLM client.
pub struct LlmCleanup(pub LlmClient);

#[async_trait]
impl TextCleanup for LlmCleanup {
    async fn cleanup(&self, text: &str) -> Result<Vec<String>, CleanupError> {
        Ok(self.0.reflow_lines(text).await?)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Normalizer
// ────────────────────────────────────────────────────────────────────────────

/// Unified entry point over the assisted and local strategies.
#[derive(Clone, Default)]
pub struct LineNormalizer {
    cleanup: Option<Arc<dyn TextCleanup>>,
}

impl LineNormalizer {
    pub fn new(cleanup: Option<Arc<dyn TextCleanup>>) -> Self {
        Self { cleanup }
    }

    /// A normalizer that only ever formats locally.
    pub fn local_only() -> Self {
        Self { cleanup: None }
    }

    /// Converts raw text into display lines. Never fails.
    pub async fn normalize(&self, text: &str, mode: FormattingMode) -> Vec<DisplayLine> {
        if text.trim().is_empty() {
            return Vec::new();
        }

        let cleanup = match (&self.cleanup, mode) {
            (Some(cleanup), FormattingMode::Assisted) => cleanup,
            (None, FormattingMode::Assisted) => {
                debug!("No cleanup service configured, formatting locally");
                return wrap_paragraphs(text, FALLBACK_WIDTH);
            }
            (_, FormattingMode::LocalOnly) => {
                debug!("Assisted formatting disabled by caller");
                return wrap_paragraphs(text, FALLBACK_WIDTH);
            }
        };

        let input = truncate_chars(text, MAX_CLEANUP_CHARS);
        match cleanup.cleanup(input).await {
            Ok(lines) => {
                info!(lines = lines.len(), "Text reflowed by cleanup service");
                lines.into_iter().map(DisplayLine::from).collect()
            }
            Err(e) => {
                warn!("Cleanup service failed, formatting locally: {e}");
                wrap_paragraphs(text, FALLBACK_WIDTH)
            }
        }
    }
}

/// Returns the prefix of `text` holding at most `max_chars` characters.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => &text[..byte_idx],
        None => text,
    }
}

/// Deterministic local formatting.
///
/// Paragraphs are the trimmed, non-empty input lines. Each is wrapped greedily:
/// take the first `width` characters, break at the last whitespace inside them,
/// or exactly at `width` if there is none. No emitted line exceeds `width`.
pub fn wrap_paragraphs(text: &str, width: usize) -> Vec<DisplayLine> {
    let width = width.max(1);
    let mut lines = Vec::new();

    for paragraph in text.lines().map(str::trim).filter(|p| !p.is_empty()) {
        let mut rest = paragraph;

        while rest.chars().count() > width {
            let prefix = truncate_chars(rest, width);
            let split_at = prefix
                .char_indices()
                .filter(|(_, c)| c.is_whitespace())
                .map(|(i, _)| i)
                .last()
                .filter(|&i| i > 0)
                .unwrap_or(prefix.len());

            let head = rest[..split_at].trim_end();
            if !head.is_empty() {
                lines.push(DisplayLine::new(head));
            }
            rest = rest[split_at..].trim();
        }

        if !rest.is_empty() {
            lines.push(DisplayLine::new(rest));
        }
    }

    lines
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Scripted cleanup service that counts calls and records what it was sent.
    struct FakeCleanup {
        reply: fn() -> Result<Vec<String>, CleanupError>,
        calls: AtomicUsize,
        last_len: AtomicUsize,
    }

    impl FakeCleanup {
        fn new(reply: fn() -> Result<Vec<String>, CleanupError>) -> Arc<Self> {
            Arc::new(Self {
                reply,
                calls: AtomicUsize::new(0),
                last_len: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl TextCleanup for FakeCleanup {
        async fn cleanup(&self, text: &str) -> Result<Vec<String>, CleanupError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.last_len.store(text.chars().count(), Ordering::SeqCst);
            (self.reply)()
        }
    }

    fn non_ws(s: &str) -> String {
        s.chars().filter(|c| !c.is_whitespace()).collect()
    }

    const LOREM: &str = "Photosynthesis converts light energy into chemical energy \
        stored in glucose. It takes place in the chloroplasts of plant cells, \
        mostly in the leaves.\n\n  Definition: ATP is the energy currency of the cell.  \n\
        E = mc^2";

    // ── local wrapping ──────────────────────────────────────────────────────

    #[test]
    fn test_wrap_is_lossless() {
        let lines = wrap_paragraphs(LOREM, FALLBACK_WIDTH);
        assert!(!lines.is_empty());
        let joined: String = lines.iter().map(|l| l.as_str()).collect();
        assert_eq!(non_ws(&joined), non_ws(LOREM));
    }

    #[test]
    fn test_wrap_respects_width() {
        let lines = wrap_paragraphs(LOREM, FALLBACK_WIDTH);
        for line in &lines {
            assert!(line.char_len() <= 50, "line too long: {:?}", line.as_str());
        }
    }

    #[test]
    fn test_wrap_breaks_on_last_space() {
        let text = format!("{} {}", "a".repeat(30), "b".repeat(30));
        let lines = wrap_paragraphs(&text, 50);
        assert_eq!(lines, vec![DisplayLine::new("a".repeat(30)), DisplayLine::new("b".repeat(30))]);
    }

    #[test]
    fn test_wrap_unbreakable_token_cut_at_width() {
        let token = "x".repeat(120);
        let lines = wrap_paragraphs(&token, 50);
        let lens: Vec<usize> = lines.iter().map(DisplayLine::char_len).collect();
        assert_eq!(lens, vec![50, 50, 20]);
    }

    #[test]
    fn test_wrap_discards_blank_paragraphs() {
        let lines = wrap_paragraphs("first\r\n\r\n   \nsecond\n", 50);
        assert_eq!(lines, vec![DisplayLine::new("first"), DisplayLine::new("second")]);
    }

    #[test]
    fn test_wrap_counts_characters_not_bytes() {
        // 49 multi-byte characters fit on one line.
        let text = "é".repeat(49);
        let lines = wrap_paragraphs(&text, 50);
        assert_eq!(lines.len(), 1);
    }

    #[test]
    fn test_wrap_collapses_runs_of_spaces_at_break() {
        let text = format!("{}     {}", "a".repeat(44), "b".repeat(20));
        let lines = wrap_paragraphs(&text, 50);
        assert_eq!(lines[0].as_str(), "a".repeat(44));
        assert_eq!(lines[1].as_str(), "b".repeat(20));
    }

    #[test]
    fn test_wrap_lossless_over_many_widths() {
        for width in [1, 5, 13, 50, 200] {
            let lines = wrap_paragraphs(LOREM, width);
            let joined: String = lines.iter().map(|l| l.as_str()).collect();
            assert_eq!(non_ws(&joined), non_ws(LOREM), "width {width}");
            assert!(lines.iter().all(|l| l.char_len() <= width));
        }
    }

    #[test]
    fn test_truncate_chars_on_boundary() {
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("abc", 10), "abc");
    }

    // ── normalize strategy selection ────────────────────────────────────────

    #[tokio::test]
    async fn test_empty_input_yields_no_lines_without_calling_service() {
        let fake = FakeCleanup::new(|| Ok(vec!["unused".into()]));
        let normalizer = LineNormalizer::new(Some(fake.clone() as Arc<dyn TextCleanup>));
        assert!(normalizer.normalize("   \n\t ", FormattingMode::Assisted).await.is_empty());
        assert!(normalizer.normalize("", FormattingMode::Assisted).await.is_empty());
        assert_eq!(fake.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_assisted_lines_are_used() {
        let fake = FakeCleanup::new(|| {
            Ok(vec![
                "Photosynthesis".into(),
                "converts light energy into chemical energy".into(),
            ])
        });
        let normalizer = LineNormalizer::new(Some(fake.clone() as Arc<dyn TextCleanup>));
        let lines = normalizer.normalize(LOREM, FormattingMode::Assisted).await;
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].as_str(), "Photosynthesis");
        assert_eq!(fake.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_service_error_falls_back() {
        let fake = FakeCleanup::new(|| {
            Err(CleanupError::Service(LlmError::Api {
                status: 429,
                message: "quota".into(),
            }))
        });
        let normalizer = LineNormalizer::new(Some(fake as Arc<dyn TextCleanup>));
        let lines = normalizer.normalize(LOREM, FormattingMode::Assisted).await;
        assert_eq!(lines, wrap_paragraphs(LOREM, FALLBACK_WIDTH));
    }

    #[tokio::test]
    async fn test_malformed_response_falls_back() {
        let fake = FakeCleanup::new(|| {
            let err = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
            Err(CleanupError::Service(LlmError::Parse(err)))
        });
        let normalizer = LineNormalizer::new(Some(fake as Arc<dyn TextCleanup>));
        let lines = normalizer.normalize(LOREM, FormattingMode::Assisted).await;
        assert_eq!(lines, wrap_paragraphs(LOREM, FALLBACK_WIDTH));
    }

    #[tokio::test]
    async fn test_reply_without_lines_yields_no_lines() {
        // What `reflow_lines` returns for a reply like {"text": "..."}.
        let fake = FakeCleanup::new(|| {
            crate::llm_client::parse_reflow_reply(r#"{"text": "Photosynthesis"}"#)
                .map_err(CleanupError::from)
        });
        let normalizer = LineNormalizer::new(Some(fake.clone() as Arc<dyn TextCleanup>));
        let lines = normalizer.normalize(LOREM, FormattingMode::Assisted).await;
        assert!(lines.is_empty());
        assert_eq!(fake.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_local_only_never_calls_service() {
        let fake = FakeCleanup::new(|| Ok(vec!["unused".into()]));
        let normalizer = LineNormalizer::new(Some(fake.clone() as Arc<dyn TextCleanup>));
        let lines = normalizer.normalize(LOREM, FormattingMode::LocalOnly).await;
        assert_eq!(fake.calls.load(Ordering::SeqCst), 0);
        assert_eq!(lines, wrap_paragraphs(LOREM, FALLBACK_WIDTH));
    }

    #[tokio::test]
    async fn test_no_service_configured_formats_locally() {
        let normalizer = LineNormalizer::local_only();
        let lines = normalizer.normalize(LOREM, FormattingMode::Assisted).await;
        assert_eq!(lines, wrap_paragraphs(LOREM, FALLBACK_WIDTH));
    }

    #[tokio::test]
    async fn test_service_input_is_truncated() {
        let fake = FakeCleanup::new(|| Ok(vec!["ok".into()]));
        let normalizer = LineNormalizer::new(Some(fake.clone() as Arc<dyn TextCleanup>));
        let long = "word ".repeat(5_000);
        normalizer.normalize(&long, FormattingMode::Assisted).await;
        assert_eq!(fake.last_len.load(Ordering::SeqCst), MAX_CLEANUP_CHARS);
    }

    #[test]
    fn test_formatting_mode_from_flag() {
        assert_eq!(FormattingMode::from_flag(None), FormattingMode::Assisted);
        assert_eq!(FormattingMode::from_flag(Some(true)), FormattingMode::Assisted);
        assert_eq!(FormattingMode::from_flag(Some(false)), FormattingMode::LocalOnly);
    }
}
