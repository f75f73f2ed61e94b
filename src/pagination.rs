//! Pagination – the closed-form height model and page counting.
//!
//! Handles:
//! - Per-format block spacing tables ([`BlockMetrics`])
//! - The additive per-block height model ([`estimate`])
//! - Greedy page filling with forced breaks and blank-page suppression
//!   ([`PageCursor`])
//! - The chapter → first page map consumed by tables of contents
//!   ([`build_chapter_page_index`])
//!
//! The estimator and the word-processor/OWPML engines drive the same
//! [`Renderer`] walk over the same blocks with the same [`BlockMetrics`], so
//! their page numbers agree by construction.

use serde::{Deserialize, Serialize};

use crate::config::LayoutConstants;
use crate::error::{MetricsError, Result};
use crate::layout::{compose, ComposeOptions, Renderer, TocEntry};
use crate::markup::ContentBlock;
use crate::model::EbookDocument;
use crate::package::Format;
use crate::units::LineEstimator;

/// A forced break on a page without content is only taken once the cursor
/// has moved further than this.
pub const BLANK_PAGE_EPSILON_PT: f32 = 8.0;

/// Font sizes, column geometry and fixed spacing constants for one format.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BlockMetrics {
    pub body_size: f32,
    pub heading_size: f32,
    pub subheading_size: f32,
    pub line_spacing: f32,
    pub column_width: f32,
    pub content_height: f32,
    /// Space before / after a `== sub-heading ==`.
    pub heading_space_before: f32,
    pub heading_space_after: f32,
    /// Space after every body-sized block.
    pub block_space_after: f32,
    /// Space around section titles and chapter titles.
    pub title_space_before: f32,
    pub title_space_after: f32,
}

impl BlockMetrics {
    /// The spacing table of `format`. Slide decks are indexed by slide, not
    /// by height, and get the fixed-page table.
    pub fn for_format(format: Format, constants: &LayoutConstants) -> Self {
        let base = Self {
            body_size: constants.body_size,
            heading_size: constants.heading_size,
            subheading_size: constants.subheading_size,
            line_spacing: constants.line_spacing,
            column_width: constants.content_width(),
            content_height: constants.content_height(),
            heading_space_before: 12.0,
            heading_space_after: 4.0,
            block_space_after: 0.15 * constants.body_size * constants.line_spacing,
            title_space_before: 0.0,
            title_space_after: 10.0,
        };
        match format {
            Format::Pdf | Format::Pptx => base,
            Format::Docx => Self {
                heading_space_before: 12.0,
                heading_space_after: 6.0,
                block_space_after: 4.0,
                title_space_before: 12.0,
                title_space_after: 6.0,
                ..base
            },
            Format::Hwpx => Self {
                heading_space_before: 6.0,
                heading_space_after: 3.0,
                block_space_after: 2.0,
                title_space_before: 10.0,
                title_space_after: 6.0,
                ..base
            },
        }
    }

    pub fn body_line(&self) -> f32 {
        self.body_size * self.line_spacing
    }

    fn lines(&self, text: &str, font_size: f32) -> std::result::Result<usize, MetricsError> {
        Ok(LineEstimator::new(font_size, self.column_width)?.line_count(text))
    }

    /// Body-sized text: paragraphs, list items, TOC rows.
    pub fn paragraph_height(&self, text: &str) -> std::result::Result<f32, MetricsError> {
        let lines = self.lines(text, self.body_size)?;
        Ok(lines as f32 * self.body_line() + self.block_space_after)
    }

    /// A `== sub-heading ==`.
    pub fn heading_height(&self, text: &str) -> std::result::Result<f32, MetricsError> {
        let lines = self.lines(text, self.subheading_size)?;
        Ok(lines as f32 * self.subheading_size * self.line_spacing
            + self.heading_space_before
            + self.heading_space_after)
    }

    /// Section titles and chapter titles, at heading size.
    pub fn title_height(&self, text: &str) -> std::result::Result<f32, MetricsError> {
        let lines = self.lines(text, self.heading_size)?;
        Ok(lines as f32 * self.heading_size * self.line_spacing
            + self.title_space_before
            + self.title_space_after)
    }

    /// The bold one-line label of a highlight box.
    pub fn label_height(&self) -> std::result::Result<f32, MetricsError> {
        LineEstimator::new(self.body_size, self.column_width)?;
        Ok(self.body_line() + self.block_space_after)
    }

    /// A blank line is a fixed spacer of one body line.
    pub fn blank_height(&self) -> std::result::Result<f32, MetricsError> {
        self.label_height()
    }

    pub fn block_height(&self, block: &ContentBlock) -> std::result::Result<f32, MetricsError> {
        match block {
            ContentBlock::Heading(text) => self.heading_height(text),
            ContentBlock::HighlightLabel { rest, .. } => {
                let mut h = self.label_height()?;
                if let Some(rest) = rest {
                    h += self.paragraph_height(rest)?;
                }
                Ok(h)
            }
            ContentBlock::Bullet(text) | ContentBlock::Paragraph(text) => {
                self.paragraph_height(text)
            }
            ContentBlock::Blank => self.blank_height(),
        }
    }
}

/// Height consumed by `blocks`, summed independently per block.
pub fn estimate(blocks: &[ContentBlock], metrics: &BlockMetrics) -> std::result::Result<f32, MetricsError> {
    blocks.iter().map(|b| metrics.block_height(b)).sum()
}

/// Vertical position on the current page.
#[derive(Debug, Clone, PartialEq)]
pub struct PageCursor {
    page: usize,
    used: f32,
    content_height: f32,
    has_content: bool,
}

impl PageCursor {
    /// Cursor at the top of page 1.
    pub fn new(content_height: f32) -> Self {
        Self {
            page: 1,
            used: 0.0,
            content_height,
            has_content: false,
        }
    }

    /// 1-based page number.
    pub fn page(&self) -> usize {
        self.page
    }

    /// Height consumed on the current page.
    pub fn used(&self) -> f32 {
        self.used
    }

    pub fn remaining(&self) -> f32 {
        self.content_height - self.used
    }

    pub fn has_content(&self) -> bool {
        self.has_content
    }

    /// Whether the current page would count as a page if closed now.
    pub fn page_is_dirty(&self) -> bool {
        self.has_content || self.used > BLANK_PAGE_EPSILON_PT
    }

    pub fn mark_content(&mut self) {
        self.has_content = true;
    }

    /// Move down without marking content.
    pub fn skip(&mut self, height: f32) {
        self.used += height;
    }

    /// Move down over drawn content.
    pub fn advance(&mut self, height: f32) {
        self.used += height;
        self.has_content = true;
    }

    /// Start a new page unconditionally.
    pub fn new_page(&mut self) {
        self.page += 1;
        self.used = 0.0;
        self.has_content = false;
    }

    /// Break before drawing `needed` if it would overflow. Returns whether a
    /// new page was started. A page that has not moved is never abandoned.
    pub fn check_page_break(&mut self, needed: f32) -> bool {
        if self.used + needed > self.content_height && self.used > 0.0 {
            self.new_page();
            true
        } else {
            false
        }
    }

    /// Forced break with blank-page suppression. Returns whether a page was
    /// actually closed.
    pub fn force_break(&mut self) -> bool {
        let dirty = self.page_is_dirty();
        if dirty {
            self.page += 1;
        }
        self.used = 0.0;
        self.has_content = false;
        dirty
    }

    /// Greedy fill: add `height` and carry any overflow onto following pages.
    pub fn flow(&mut self, height: f32) {
        if height <= 0.0 {
            return;
        }
        self.used += height;
        self.has_content = true;
        while self.used > self.content_height {
            self.page += 1;
            self.used -= self.content_height;
        }
    }

    /// Number of pages produced so far, ignoring a trailing untouched page.
    pub fn pages_used(&self) -> usize {
        if self.page_is_dirty() || self.page == 1 {
            self.page
        } else {
            self.page - 1
        }
    }
}

/// Chapter number → first page (or slide), in chapter order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChapterPageIndex {
    entries: Vec<ChapterPage>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChapterPage {
    pub chapter: u32,
    pub page: usize,
}

impl ChapterPageIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a chapter start. A repeated chapter number keeps its original
    /// slot but takes the later page.
    pub fn record(&mut self, chapter: u32, page: usize) {
        match self.entries.iter_mut().find(|e| e.chapter == chapter) {
            Some(entry) => entry.page = page,
            None => self.entries.push(ChapterPage { chapter, page }),
        }
    }

    pub fn get(&self, chapter: u32) -> Option<usize> {
        self.entries
            .iter()
            .find(|e| e.chapter == chapter)
            .map(|e| e.page)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ChapterPage> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Start pages never decrease in chapter order.
    pub fn is_monotonic(&self) -> bool {
        self.entries.windows(2).all(|w| w[0].page <= w[1].page)
    }
}

/// Dry-run [`Renderer`]: every primitive just flows its modelled height.
#[derive(Debug, Clone)]
pub struct PageEstimator {
    metrics: BlockMetrics,
    cursor: PageCursor,
    index: ChapterPageIndex,
}

impl PageEstimator {
    pub fn new(metrics: BlockMetrics) -> Self {
        Self {
            cursor: PageCursor::new(metrics.content_height),
            metrics,
            index: ChapterPageIndex::new(),
        }
    }

    pub fn metrics(&self) -> &BlockMetrics {
        &self.metrics
    }

    pub fn cursor(&self) -> &PageCursor {
        &self.cursor
    }

    pub fn index(&self) -> &ChapterPageIndex {
        &self.index
    }

    pub fn into_index(self) -> ChapterPageIndex {
        self.index
    }

    fn flow(&mut self, height: std::result::Result<f32, MetricsError>) -> Result<()> {
        self.cursor.flow(height?);
        Ok(())
    }
}

impl Renderer for PageEstimator {
    fn section_break(&mut self) -> Result<()> {
        self.cursor.force_break();
        Ok(())
    }

    fn record_chapter(&mut self, number: u32) {
        self.index.record(number, self.cursor.page());
    }

    fn emit_title(&mut self, text: &str) -> Result<()> {
        let h = self.metrics.title_height(text);
        self.flow(h)
    }

    fn emit_heading(&mut self, text: &str) -> Result<()> {
        let h = self.metrics.title_height(text);
        self.flow(h)
    }

    fn emit_subheading(&mut self, text: &str) -> Result<()> {
        let h = self.metrics.heading_height(text);
        self.flow(h)
    }

    fn emit_label(&mut self, _label: &str) -> Result<()> {
        let h = self.metrics.label_height();
        self.flow(h)
    }

    fn emit_paragraph(&mut self, text: &str) -> Result<()> {
        let h = self.metrics.paragraph_height(text);
        self.flow(h)
    }

    fn emit_bullet(&mut self, text: &str) -> Result<()> {
        let h = self.metrics.paragraph_height(text);
        self.flow(h)
    }

    fn emit_blank(&mut self) -> Result<()> {
        let h = self.metrics.blank_height();
        self.flow(h)
    }

    fn emit_toc_entry(&mut self, entry: &TocEntry) -> Result<()> {
        let h = self.metrics.paragraph_height(&entry.title);
        self.flow(h)
    }
}

/// Estimated page layout of a whole document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentEstimate {
    pub chapter_pages: ChapterPageIndex,
    pub total_pages: usize,
}

/// Run the estimator over `document` with `format`'s spacing table.
pub fn estimate_document(
    document: &EbookDocument,
    format: Format,
    constants: &LayoutConstants,
) -> Result<DocumentEstimate> {
    constants.validate()?;
    let mut estimator = PageEstimator::new(BlockMetrics::for_format(format, constants));
    compose(
        &mut estimator,
        document,
        None,
        ComposeOptions::estimate(format),
    )?;
    let total_pages = estimator.cursor().pages_used();
    Ok(DocumentEstimate {
        chapter_pages: estimator.into_index(),
        total_pages,
    })
}

/// Chapter → first page map for `format`, computed before the real render.
pub fn build_chapter_page_index(
    document: &EbookDocument,
    format: Format,
    constants: &LayoutConstants,
) -> Result<ChapterPageIndex> {
    Ok(estimate_document(document, format, constants)?.chapter_pages)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::markup::tokenize;

    fn pdf_metrics() -> BlockMetrics {
        BlockMetrics::for_format(Format::Pdf, &LayoutConstants::default())
    }

    #[test]
    fn block_heights_follow_the_model() {
        let m = pdf_metrics();
        let line = 11.0 * 1.6;
        let after = 0.15 * line;

        let p = m.block_height(&ContentBlock::Paragraph("가".repeat(44))).unwrap();
        assert!((p - (2.0 * line + after)).abs() < 1e-3);

        let blank = m.block_height(&ContentBlock::Blank).unwrap();
        assert!((blank - (line + after)).abs() < 1e-3);

        let h = m.block_height(&ContentBlock::Heading("A".into())).unwrap();
        assert!((h - (13.0 * 1.6 + 12.0 + 4.0)).abs() < 1e-3);

        let label_only = m
            .block_height(&ContentBlock::HighlightLabel {
                label: "팁".repeat(2),
                rest: None,
            })
            .unwrap();
        let label_rest = m
            .block_height(&ContentBlock::HighlightLabel {
                label: "팁".repeat(2),
                rest: Some("본문".into()),
            })
            .unwrap();
        assert!((label_rest - 2.0 * label_only).abs() < 1e-3);
    }

    #[test]
    fn heading_outweighs_paragraph_in_every_format() {
        let c = LayoutConstants::default();
        for format in [Format::Pdf, Format::Docx, Format::Hwpx] {
            let m = BlockMetrics::for_format(format, &c);
            let h = m.heading_height("제목").unwrap();
            let p = m.paragraph_height("제목").unwrap();
            assert!(h > p, "{format:?}");
        }
    }

    #[test]
    fn estimate_sums_blocks() {
        let m = pdf_metrics();
        let blocks = tokenize("== A ==\n본문\n\n- 항목");
        let total = estimate(&blocks, &m).unwrap();
        let by_hand: f32 = blocks.iter().map(|b| m.block_height(b).unwrap()).sum();
        assert!((total - by_hand).abs() < 1e-3);
    }

    #[test]
    fn invalid_metrics_surface_as_errors() {
        let mut m = pdf_metrics();
        m.body_size = 0.0;
        assert!(matches!(
            estimate(&[ContentBlock::Blank], &m),
            Err(MetricsError::InvalidFontSize(_))
        ));
    }

    #[test]
    fn flow_carries_overflow_to_next_page() {
        let mut cursor = PageCursor::new(100.0);
        cursor.flow(60.0);
        cursor.flow(60.0);
        assert_eq!(cursor.page(), 2);
        assert!((cursor.used() - 20.0).abs() < 1e-3);
        cursor.flow(250.0);
        assert_eq!(cursor.page(), 4);
        assert!((cursor.used() - 70.0).abs() < 1e-3);
    }

    #[test]
    fn forced_break_is_suppressed_on_untouched_page() {
        let mut cursor = PageCursor::new(100.0);
        assert!(!cursor.force_break());
        assert_eq!(cursor.page(), 1);

        cursor.skip(BLANK_PAGE_EPSILON_PT / 2.0);
        assert!(!cursor.force_break());
        assert_eq!(cursor.page(), 1);

        cursor.skip(BLANK_PAGE_EPSILON_PT * 2.0);
        assert!(cursor.force_break());
        assert_eq!(cursor.page(), 2);

        cursor.mark_content();
        assert!(cursor.force_break());
        assert_eq!(cursor.page(), 3);
        assert_eq!(cursor.pages_used(), 2);
    }

    #[test]
    fn check_page_break_only_when_needed() {
        let mut cursor = PageCursor::new(100.0);
        assert!(!cursor.check_page_break(500.0));
        cursor.advance(90.0);
        assert!(!cursor.check_page_break(10.0));
        assert!(cursor.check_page_break(10.5));
        assert_eq!(cursor.page(), 2);
        assert_eq!(cursor.used(), 0.0);
    }

    #[test]
    fn index_keeps_order_and_last_page() {
        let mut index = ChapterPageIndex::new();
        index.record(1, 3);
        index.record(2, 5);
        assert!(index.is_monotonic());
        index.record(3, 4);
        assert!(!index.is_monotonic());

        index.record(1, 9);
        assert_eq!(index.get(1), Some(9));
        assert_eq!(index.len(), 3);
        let order: Vec<u32> = index.iter().map(|e| e.chapter).collect();
        assert_eq!(order, vec![1, 2, 3]);
    }
}
