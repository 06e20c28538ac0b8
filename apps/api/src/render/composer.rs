//! Page Composer: turns one page of lines plus a resolved style into HTML.
//!
//! Every line gets its own small rotation and horizontal drift so the page
//! reads as handwritten. The randomness comes from a `JitterSource` so tests
//! can pin it; production draws from an entropy-seeded `StdRng`.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;

use crate::reflow::Page;
use crate::style::tables::{format_px, FONT_IMPORT_URL};
use crate::style::ResolvedVisual;

/// Rotation bound in degrees; samples lie in `[-MAX_ROTATION_DEG, MAX_ROTATION_DEG]`.
pub const MAX_ROTATION_DEG: f64 = 0.4;
/// Horizontal drift bound in pixels; samples lie in `[0, MAX_OFFSET_PX]`.
pub const MAX_OFFSET_PX: f64 = 4.0;
/// Padding around the writing area, inside the zero-margin page.
const BODY_PADDING_PX: u32 = 40;

// ────────────────────────────────────────────────────────────────────────────
// Jitter
// ────────────────────────────────────────────────────────────────────────────

/// Per-line transform applied to simulate handwriting irregularity.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LineJitter {
    pub rotation_deg: f64,
    pub offset_px: f64,
}

/// Source of per-line jitter. Implementations must stay within the bounds above.
pub trait JitterSource {
    fn next_jitter(&mut self) -> LineJitter;
}

/// Uniform jitter drawn from any `rand` generator.
pub struct RandomJitter<R: Rng> {
    rng: R,
}

impl<R: Rng> RandomJitter<R> {
    pub fn new(rng: R) -> Self {
        Self { rng }
    }
}

impl RandomJitter<StdRng> {
    /// Unseeded source used in production; reproducibility is not required.
    pub fn from_entropy() -> Self {
        Self::new(StdRng::from_entropy())
    }
}

impl<R: Rng> JitterSource for RandomJitter<R> {
    fn next_jitter(&mut self) -> LineJitter {
        LineJitter {
            rotation_deg: self.rng.gen_range(-MAX_ROTATION_DEG..=MAX_ROTATION_DEG),
            offset_px: self.rng.gen_range(0.0..=MAX_OFFSET_PX),
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Document
// ────────────────────────────────────────────────────────────────────────────

/// Physical page format handed to the rendering backend.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub enum PageFormat {
    #[default]
    A4,
}

impl PageFormat {
    pub fn css_size(self) -> &'static str {
        match self {
            PageFormat::A4 => "A4",
        }
    }

    /// Paper width and height in inches.
    pub fn size_inches(self) -> (f64, f64) {
        match self {
            PageFormat::A4 => (8.27, 11.69),
        }
    }
}

/// How the backend must print the document.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RenderOptions {
    pub format: PageFormat,
    pub margin_px: u32,
    pub print_background: bool,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            format: PageFormat::A4,
            margin_px: 0,
            print_background: true,
        }
    }
}

/// A composed page, ready for the rendering backend.
#[derive(Debug, Clone, Serialize)]
pub struct RenderableDocument {
    pub page_number: usize,
    pub markup: String,
    pub options: RenderOptions,
    /// The transform applied to each line, in line order.
    pub jitter: Vec<LineJitter>,
}

// ────────────────────────────────────────────────────────────────────────────
// Composition
// ────────────────────────────────────────────────────────────────────────────

/// Composes one page into a standalone HTML document.
pub fn compose(
    page: &Page,
    visual: &ResolvedVisual,
    jitter: &mut dyn JitterSource,
) -> RenderableDocument {
    let options = RenderOptions::default();
    let mut samples = Vec::with_capacity(page.lines.len());
    let mut body = String::new();

    for line in &page.lines {
        let j = clamp_jitter(jitter.next_jitter());
        samples.push(j);

        let content = if line.is_blank() {
            "&nbsp;".to_string()
        } else {
            escape_html(line.as_str())
        };
        body.push_str(&format!(
            "<div class=\"line\" style=\"transform: rotate({:.3}deg) translateX({:.2}px);\">{content}</div>\n",
            j.rotation_deg, j.offset_px
        ));
    }

    let markup = format!(
        r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<style>
@import url('{font_url}');
@page {{ size: {page_size}; margin: {margin}px; }}
html, body {{ height: 100%; }}
body {{
    margin: 0;
    padding: {padding}px;
    box-sizing: border-box;
    font-family: '{family}', cursive;
    font-weight: {weight};
    font-size: {size}px;
    line-height: {line_height}px;
    color: {ink};
    {paper}
    {print_adjust}
    -webkit-font-smoothing: antialiased;
}}
.line {{ display: block; transform-origin: center; white-space: pre-wrap; }}
.paper-container {{ width: 100%; height: 100%; }}
</style>
</head>
<body>
<div class="paper-container">
{body}</div>
</body>
</html>
"#,
        font_url = FONT_IMPORT_URL,
        page_size = options.format.css_size(),
        margin = options.margin_px,
        padding = BODY_PADDING_PX,
        family = visual.font_family,
        weight = visual.font_weight,
        size = visual.font_size_px,
        line_height = format_px(visual.line_height_px),
        ink = visual.text_color(),
        paper = visual.paper_css,
        print_adjust = if options.print_background {
            "-webkit-print-color-adjust: exact; print-color-adjust: exact;"
        } else {
            ""
        },
    );

    RenderableDocument {
        page_number: page.number,
        markup,
        options,
        jitter: samples,
    }
}

/// Keeps a misbehaving source inside the contract bounds.
fn clamp_jitter(j: LineJitter) -> LineJitter {
    LineJitter {
        rotation_deg: j.rotation_deg.clamp(-MAX_ROTATION_DEG, MAX_ROTATION_DEG),
        offset_px: j.offset_px.clamp(0.0, MAX_OFFSET_PX),
    }
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
