//! Raw-text extraction from uploaded documents.
//!
//! PDFs go through `pdf-extract` on a blocking thread; plain UTF-8 text is
//! passed through. Anything else is rejected.

use bytes::Bytes;
use thiserror::Error;
use tracing::info;

const PDF_MAGIC: &[u8] = b"%PDF";

#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("uploaded file is empty")]
    Empty,

    #[error("unsupported document format (expected PDF or UTF-8 text)")]
    Unsupported,

    #[error("could not read PDF: {0}")]
    Corrupt(String),
}

/// Extracts plain text from an uploaded document.
pub async fn extract_text(bytes: Bytes) -> Result<String, ExtractionError> {
    if bytes.is_empty() {
        return Err(ExtractionError::Empty);
    }

    if !bytes.starts_with(PDF_MAGIC) {
        let text = std::str::from_utf8(&bytes).map_err(|_| ExtractionError::Unsupported)?;
        if text.contains('\0') {
            return Err(ExtractionError::Unsupported);
        }
        return Ok(text.to_string());
    }

    let size = bytes.len();
    // pdf-extract can panic on malformed input; a panic surfaces as a JoinError.
    let text = tokio::task::spawn_blocking(move || pdf_extract::extract_text_from_mem(&bytes))
        .await
        .map_err(|e| ExtractionError::Corrupt(format!("PDF parser aborted: {e}")))?
        .map_err(|e| ExtractionError::Corrupt(e.to_string()))?;

    info!(bytes = size, chars = text.chars().count(), "Extracted text from PDF");
    Ok(text)
}
