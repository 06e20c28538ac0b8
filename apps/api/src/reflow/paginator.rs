//! Paginator: slices display lines into fixed-capacity pages.

use serde::Serialize;

use crate::reflow::normalizer::DisplayLine;

/// Page capacity used by the pipeline.
pub const LINES_PER_PAGE: usize = 25;

/// An ordered group of at most `LINES_PER_PAGE` lines. `number` starts at 1.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Page {
    pub number: usize,
    pub lines: Vec<DisplayLine>,
}

impl Page {
    /// Page 1 with a single blank line, used when there is no text at all.
    pub fn placeholder() -> Self {
        Self {
            number: 1,
            lines: vec![DisplayLine::blank()],
        }
    }
}

/// Partitions `lines` into consecutive pages of `page_size`, preserving order.
///
/// Always returns at least one page: empty input yields a single page holding
/// one blank placeholder line. A `page_size` of zero is treated as one.
pub fn paginate(lines: Vec<DisplayLine>, page_size: usize) -> Vec<Page> {
    if lines.is_empty() {
        return vec![Page::placeholder()];
    }

    let page_size = page_size.max(1);
    let mut pages = Vec::with_capacity(lines.len().div_ceil(page_size));
    let mut lines = lines.into_iter().peekable();

    while lines.peek().is_some() {
        pages.push(Page {
            number: pages.len() + 1,
            lines: lines.by_ref().take(page_size).collect(),
        });
    }

    pages
}
