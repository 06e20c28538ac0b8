//! Closed lookup tables for fonts, inks and paper.
//!
//! Each key enum has an explicit default variant; `from_key` maps anything
//! unrecognised onto it.

use serde::{Deserialize, Serialize};
use tracing::debug;

/// A handwriting font and the weight it is drawn at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FontFace {
    pub family: &'static str,
    pub weight: u16,
}

/// Web-font stylesheet covering every family in `FontKey`.
pub const FONT_IMPORT_URL: &str = "https://fonts.googleapis.com/css2?\
family=Handlee&family=Homemade+Apple&family=Indie+Flower\
&family=Kalam:wght@300;400;700&family=Patrick+Hand&display=swap";

// ────────────────────────────────────────────────────────────────────────────
// Fonts
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FontKey {
    #[default]
    Default,
    Handlee,
    Messy,
    Cursive,
    Heading,
}

impl FontKey {
    pub fn from_key(raw: Option<&str>) -> Self {
        match normalize_key(raw).as_deref() {
            None | Some("default") => FontKey::Default,
            Some("handlee") => FontKey::Handlee,
            Some("messy") => FontKey::Messy,
            Some("cursive") => FontKey::Cursive,
            Some("heading") => FontKey::Heading,
            Some(other) => {
                debug!(style = other, "Unknown style key, using default font");
                FontKey::Default
            }
        }
    }

    pub fn face(self) -> FontFace {
        match self {
            FontKey::Default => FontFace {
                family: "Patrick Hand",
                weight: 400,
            },
            FontKey::Handlee => FontFace {
                family: "Handlee",
                weight: 400,
            },
            FontKey::Messy => FontFace {
                family: "Indie Flower",
                weight: 400,
            },
            FontKey::Cursive => FontFace {
                family: "Homemade Apple",
                weight: 400,
            },
            FontKey::Heading => FontFace {
                family: "Kalam",
                weight: 700,
            },
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Inks
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorKey {
    #[default]
    Blue,
    Black,
    Red,
}

impl ColorKey {
    pub fn from_key(raw: Option<&str>) -> Self {
        match normalize_key(raw).as_deref() {
            None | Some("blue") => ColorKey::Blue,
            Some("black") => ColorKey::Black,
            Some("red") => ColorKey::Red,
            Some(other) => {
                debug!(color = other, "Unknown color key, using blue ink");
                ColorKey::Blue
            }
        }
    }

    pub fn hex(self) -> &'static str {
        match self {
            ColorKey::Blue => "#0032B4",
            ColorKey::Black => "#141414",
            ColorKey::Red => "#C80000",
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Paper
// ────────────────────────────────────────────────────────────────────────────

const RULE_COLOR: &str = "#e5e5f7";
const MARGIN_RULE_COLOR: &str = "#ff9999";
/// Vertical offset of the first ruled line on `line` paper.
const RULE_OFFSET_PX: u32 = 30;
const MARGIN_PADDING_PX: u32 = 60;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaperKey {
    #[default]
    Blank,
    Line,
    Grid,
    Dark,
}

impl PaperKey {
    pub fn from_key(raw: Option<&str>) -> Self {
        match normalize_key(raw).as_deref() {
            None | Some("blank") => PaperKey::Blank,
            Some("line") => PaperKey::Line,
            Some("grid") => PaperKey::Grid,
            Some("dark") => PaperKey::Dark,
            Some(other) => {
                debug!(paper = other, "Unknown paper key, using blank paper");
                PaperKey::Blank
            }
        }
    }

    /// CSS declarations for the page body. Rules are spaced at `line_height_px`.
    pub fn css(self, line_height_px: f32) -> String {
        let lh = format_px(line_height_px);
        match self {
            PaperKey::Blank => "background-color: white;".to_string(),
            PaperKey::Line => format!(
                "background-color: white; \
                 background-image: linear-gradient({RULE_COLOR} 1px, transparent 1px); \
                 background-size: 100% {lh}px; \
                 background-position: 0 {RULE_OFFSET_PX}px; \
                 border-left: 1px solid {MARGIN_RULE_COLOR}; \
                 padding-left: {MARGIN_PADDING_PX}px;"
            ),
            PaperKey::Grid => format!(
                "background-color: white; \
                 background-image: linear-gradient({RULE_COLOR} 1px, transparent 1px), \
                 linear-gradient(90deg, {RULE_COLOR} 1px, transparent 1px); \
                 background-size: {lh}px {lh}px;"
            ),
            PaperKey::Dark => "background-color: #1a1a1a;".to_string(),
        }
    }

    pub fn foreground_override(self) -> Option<&'static str> {
        match self {
            PaperKey::Dark => Some("#ddd"),
            _ => None,
        }
    }
}

fn normalize_key(raw: Option<&str>) -> Option<String> {
    raw.map(|s| s.trim().to_ascii_lowercase())
        .filter(|s| !s.is_empty())
}

/// Formats a pixel value without trailing zeros: 44.8 → "44.8", 48.0 → "48".
pub(crate) fn format_px(value: f32) -> String {
    let rounded = (value * 100.0).round() / 100.0;
    if rounded.fract() == 0.0 {
        format!("{}", rounded as i64)
    } else {
        format!("{rounded}")
    }
}
