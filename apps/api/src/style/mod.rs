//! Style resolution: maps user-facing style keys to concrete visual parameters.
//!
//! Every lookup is total. Unknown keys fall back to the default entry of their
//! table and are logged, never rejected.

pub mod tables;

use serde::{Deserialize, Serialize};
use tracing::debug;

pub use tables::{ColorKey, FontKey, PaperKey};

/// Font size used when the caller gives none, or gives something unusable.
pub const DEFAULT_FONT_SIZE_PX: u32 = 28;
/// Line height is always derived from font size at this fixed ratio.
pub const LINE_HEIGHT_RATIO: f32 = 1.6;

// ────────────────────────────────────────────────────────────────────────────
// Input
// ────────────────────────────────────────────────────────────────────────────

/// Raw style options as they arrive from a caller (query string or JSON body).
///
/// All fields are free-form strings; `StyleConfig::from_request` turns them
/// into closed keys.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StyleRequest {
    pub style: Option<String>,
    pub color: Option<String>,
    pub paper: Option<String>,
    /// Kept as a string so that `size=abc` defaults instead of failing extraction.
    #[serde(default, deserialize_with = "size_as_string")]
    pub size: Option<String>,
}

/// Accepts either a JSON number or a string for `size`.
fn size_as_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(value.map(|v| match v {
        serde_json::Value::String(s) => s,
        other => other.to_string(),
    }))
}

/// Validated style configuration for one render.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StyleConfig {
    pub style: FontKey,
    pub color: ColorKey,
    pub paper: PaperKey,
    pub size: u32,
}

impl Default for StyleConfig {
    fn default() -> Self {
        Self {
            style: FontKey::Default,
            color: ColorKey::Blue,
            paper: PaperKey::Blank,
            size: DEFAULT_FONT_SIZE_PX,
        }
    }
}

impl StyleConfig {
    pub fn from_request(request: &StyleRequest) -> Self {
        Self {
            style: FontKey::from_key(request.style.as_deref()),
            color: ColorKey::from_key(request.color.as_deref()),
            paper: PaperKey::from_key(request.paper.as_deref()),
            size: parse_size(request.size.as_deref()),
        }
    }
}

/// Parses a pixel size from its leading integer, so `"30px"` is 30 and `"28.5"`
/// is 28. Absent, non-numeric, zero or negative input gives the default.
pub fn parse_size(raw: Option<&str>) -> u32 {
    let Some(s) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
        return DEFAULT_FONT_SIZE_PX;
    };
    let digits = s.strip_prefix('+').unwrap_or(s);
    let end = digits
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(digits.len());
    match digits[..end].parse::<u32>() {
        Ok(size) if size > 0 => size,
        _ => {
            debug!(size = s, "Unusable font size, using default");
            DEFAULT_FONT_SIZE_PX
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Output
// ────────────────────────────────────────────────────────────────────────────

/// Concrete visual parameters for one render. Computed once, never mutated.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedVisual {
    pub font_family: &'static str,
    pub font_weight: u16,
    pub ink_color: &'static str,
    pub font_size_px: u32,
    pub line_height_px: f32,
    /// CSS declarations for the page body (background, rules, padding).
    pub paper_css: String,
    /// Foreground color forced by the paper (dark paper), overriding the ink.
    pub foreground_override: Option<&'static str>,
}

impl ResolvedVisual {
    /// The color text is actually painted in.
    pub fn text_color(&self) -> &'static str {
        self.foreground_override.unwrap_or(self.ink_color)
    }
}

/// Resolves a style configuration into concrete visual parameters. Never fails.
pub fn resolve(config: &StyleConfig) -> ResolvedVisual {
    let font = config.style.face();
    let size = if config.size == 0 {
        DEFAULT_FONT_SIZE_PX
    } else {
        config.size
    };
    let line_height_px = size as f32 * LINE_HEIGHT_RATIO;

    ResolvedVisual {
        font_family: font.family,
        font_weight: font.weight,
        ink_color: config.color.hex(),
        font_size_px: size,
        line_height_px,
        paper_css: config.paper.css(line_height_px),
        foreground_override: config.paper.foreground_override(),
    }
}
