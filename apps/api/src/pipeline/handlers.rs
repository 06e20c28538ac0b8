//! Axum route handlers for the rendering pipeline.

use axum::{
    extract::{Multipart, Path, Query, State},
    http::header,
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::errors::AppError;
use crate::pipeline::RenderedArtifact;
use crate::reflow::FormattingMode;
use crate::state::AppState;
use crate::style::{StyleConfig, StyleRequest};

// ────────────────────────────────────────────────────────────────────────────
// Request / Response types
// ────────────────────────────────────────────────────────────────────────────

/// Query string of `POST /upload`. Everything is free-form; bad values default.
#[derive(Debug, Default, Deserialize)]
pub struct UploadQuery {
    pub style: Option<String>,
    pub color: Option<String>,
    pub paper: Option<String>,
    pub size: Option<String>,
    /// `ai=false` (or `0`, `off`, `no`) disables assisted formatting.
    pub ai: Option<String>,
}

impl UploadQuery {
    fn style_config(&self) -> StyleConfig {
        StyleConfig::from_request(&StyleRequest {
            style: self.style.clone(),
            color: self.color.clone(),
            paper: self.paper.clone(),
            size: self.size.clone(),
        })
    }

    fn formatting_mode(&self) -> FormattingMode {
        let flag = self
            .ai
            .as_deref()
            .map(|v| !matches!(v.trim().to_ascii_lowercase().as_str(), "false" | "0" | "off" | "no"));
        FormattingMode::from_flag(flag)
    }
}

#[derive(Debug, Deserialize)]
pub struct RenderTextRequest {
    pub text: String,
    #[serde(flatten)]
    pub style: StyleRequest,
    pub ai_format: Option<bool>,
}

#[derive(Debug, Serialize)]
pub struct RenderResponse {
    pub status: &'static str,
    pub result_url: String,
    #[serde(flatten)]
    pub artifact: RenderedArtifact,
}

impl From<RenderedArtifact> for RenderResponse {
    fn from(artifact: RenderedArtifact) -> Self {
        Self {
            status: "completed",
            result_url: format!("/download/{}", artifact.filename),
            artifact,
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// POST /upload
///
/// Multipart upload with a `file` field (PDF or plain text). Style options
/// come from the query string.
pub async fn handle_upload(
    State(state): State<AppState>,
    Query(query): Query<UploadQuery>,
    mut multipart: Multipart,
) -> Result<Json<RenderResponse>, AppError> {
    let mut upload = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("Malformed multipart body: {e}")))?
    {
        if field.name() == Some("file") {
            let name = field.file_name().unwrap_or("upload").to_string();
            let bytes = field
                .bytes()
                .await
                .map_err(|e| AppError::Validation(format!("Could not read upload: {e}")))?;
            upload = Some((name, bytes));
            break;
        }
    }

    let (name, bytes) = upload.ok_or_else(|| AppError::Validation("No file uploaded".to_string()))?;
    info!(file = %name, bytes = bytes.len(), "Upload received");

    let artifact = state
        .pipeline
        .process_document(bytes, &query.style_config(), query.formatting_mode())
        .await?;

    Ok(Json(artifact.into()))
}

/// POST /api/v1/render
///
/// Renders already-extracted text. Empty text is valid and yields a blank page.
pub async fn handle_render_text(
    State(state): State<AppState>,
    Json(request): Json<RenderTextRequest>,
) -> Result<Json<RenderResponse>, AppError> {
    let config = StyleConfig::from_request(&request.style);
    let mode = FormattingMode::from_flag(request.ai_format);

    let artifact = state.pipeline.process(&request.text, &config, mode).await?;

    Ok(Json(artifact.into()))
}

/// GET /download/:filename
pub async fn handle_download(
    State(state): State<AppState>,
    Path(filename): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let bytes = state.pipeline.store().load(&filename).await?;
    Ok((
        [
            (header::CONTENT_TYPE, "application/pdf".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{filename}\""),
            ),
        ],
        bytes,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::style::{ColorKey, FontKey, PaperKey};

    #[test]
    fn test_upload_query_defaults() {
        let query = UploadQuery::default();
        assert_eq!(query.style_config(), StyleConfig::default());
        assert_eq!(query.formatting_mode(), FormattingMode::Assisted);
    }

    #[test]
    fn test_upload_query_parses_options() {
        let query = UploadQuery {
            style: Some("heading".into()),
            color: Some("black".into()),
            paper: Some("grid".into()),
            size: Some("nope".into()),
            ai: Some("OFF".into()),
        };
        let config = query.style_config();
        assert_eq!(config.style, FontKey::Heading);
        assert_eq!(config.color, ColorKey::Black);
        assert_eq!(config.paper, PaperKey::Grid);
        assert_eq!(config.size, 28);
        assert_eq!(query.formatting_mode(), FormattingMode::LocalOnly);
    }

    #[test]
    fn test_render_request_flattens_style() {
        let request: RenderTextRequest = serde_json::from_str(
            r#"{"text": "hi", "paper": "dark", "size": 32, "ai_format": false}"#,
        )
        .unwrap();
        assert_eq!(request.text, "hi");
        assert_eq!(StyleConfig::from_request(&request.style).paper, PaperKey::Dark);
        assert_eq!(StyleConfig::from_request(&request.style).size, 32);
        assert_eq!(request.ai_format, Some(false));
    }

    #[test]
    fn test_render_response_shape() {
        let response = RenderResponse::from(RenderedArtifact {
            filename: "rendered-1.pdf".into(),
            size_bytes: 10,
            total_pages: 3,
            rendered_pages: 1,
            rendered_lines: 25,
        });
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["status"], "completed");
        assert_eq!(json["result_url"], "/download/rendered-1.pdf");
        assert_eq!(json["total_pages"], 3);
        assert_eq!(json["rendered_pages"], 1);
    }
}
