//! Shared layout core – the [`Renderer`] capability trait and the document
//! walk every page-based engine runs.
//!
//! A format implements the primitive `emit_*` operations and the section
//! break; the section builders (`cover`, `table_of_contents`, ...) have
//! default compositions over those primitives that a format may override
//! with its own visual design. [`compose`] fixes the section order, so the
//! estimator and every engine walk the same sequence of primitives.

use crate::error::{ContentMismatchError, Result};
use crate::markup::{tokenize, ContentBlock};
use crate::model::{non_blank, Analysis, ChapterMeta, EbookDocument, Marketing, Phase};
use crate::package::Format;
use crate::pagination::ChapterPageIndex;

pub const TOC_TITLE: &str = "목  차";
pub const PROLOGUE_TITLE: &str = "프롤로그";
pub const EPILOGUE_TITLE: &str = "에필로그";
pub const VALUE_SUMMARY_TITLE: &str = "이 책이 주는 가치";
pub const WHY_PAY_TITLE: &str = "왜 이 책에 투자해야 하는가";
pub const APPENDIX_TITLE: &str = "부록 : 이 책에 대하여";
pub const SALES_COPY_TITLE: &str = "판매 소개문";
pub const READER_VALUE_TITLE: &str = "독자에게 주는 가치";
pub const BEFORE_LABEL: &str = "읽기 전";
pub const AFTER_LABEL: &str = "읽고 난 후";

/// Accent used when a chapter has no known phase.
pub const DEFAULT_ACCENT: &str = "#6c5ce7";
pub const DEFAULT_BACKGROUND: &str = "#f8f7ff";

/// Accent color of a phase.
pub fn phase_color(phase: Option<&Phase>) -> &'static str {
    match phase {
        Some(Phase::ProblemAwareness) => "#e74c3c",
        Some(Phase::MethodDiscovery) => "#f39c12",
        Some(Phase::Execution) => "#03c75a",
        Some(Phase::Confidence) => "#3498db",
        _ => DEFAULT_ACCENT,
    }
}

/// Tinted page/slide background of a phase.
pub fn phase_background(phase: Option<&Phase>) -> &'static str {
    match phase {
        Some(Phase::ProblemAwareness) => "#fff5f5",
        Some(Phase::MethodDiscovery) => "#fffbf0",
        Some(Phase::Execution) => "#f0fff8",
        Some(Phase::Confidence) => "#f0f8ff",
        _ => DEFAULT_BACKGROUND,
    }
}

/// `#rrggbb` → RGBA in `0.0..=1.0`. Malformed input yields black.
pub fn hex_color(hex: &str) -> [f32; 4] {
    let h = hex.trim_start_matches('#');
    if h.len() != 6 || !h.is_ascii() {
        return [0.0, 0.0, 0.0, 1.0];
    }
    let channel = |i: usize| {
        u8::from_str_radix(&h[i..i + 2], 16)
            .map(|v| v as f32 / 255.0)
            .unwrap_or(0.0)
    };
    [channel(0), channel(2), channel(4), 1.0]
}

/// `#rrggbb` → `RRGGBB`, the form the XML formats store.
pub fn hex_rgb(hex: &str) -> String {
    hex.trim_start_matches('#').to_ascii_uppercase()
}

/// One table-of-contents row.
#[derive(Debug, Clone, PartialEq)]
pub struct TocEntry {
    /// Position in `chapters_content`.
    pub index: usize,
    pub number: u32,
    pub title: String,
    pub phase: Option<Phase>,
    /// First page of the chapter; absent until an index is known.
    pub page: Option<usize>,
}

/// What a chapter-start builder needs.
#[derive(Debug, Clone, Copy)]
pub struct ChapterStart<'a> {
    pub index: usize,
    pub number: u32,
    pub meta: &'a ChapterMeta,
    pub image: Option<&'a str>,
}

/// Knobs that differ between engines walking the same document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ComposeOptions {
    /// Forced break between the chapter-start block and the chapter body.
    pub chapter_body_new_page: bool,
    pub include_images: bool,
}

impl ComposeOptions {
    /// Options under which `format`'s engine runs, imagery excluded.
    pub fn estimate(format: Format) -> Self {
        Self {
            chapter_body_new_page: matches!(format, Format::Pdf),
            include_images: false,
        }
    }
}

/// Capability set of a page-based layout engine.
///
/// Primitives are required; section builders have default compositions.
pub trait Renderer {
    /// Forced break, subject to blank-page suppression.
    fn section_break(&mut self) -> Result<()>;

    /// Called when chapter `number` is about to start, right after its break.
    fn record_chapter(&mut self, number: u32);

    /// Section title (table of contents, prologue, ...).
    fn emit_title(&mut self, text: &str) -> Result<()>;
    /// Chapter title.
    fn emit_heading(&mut self, text: &str) -> Result<()>;
    /// `== sub-heading ==`
    fn emit_subheading(&mut self, text: &str) -> Result<()>;
    /// Bold one-line label.
    fn emit_label(&mut self, label: &str) -> Result<()>;
    fn emit_paragraph(&mut self, text: &str) -> Result<()>;
    fn emit_bullet(&mut self, text: &str) -> Result<()>;
    fn emit_blank(&mut self) -> Result<()>;
    fn emit_toc_entry(&mut self, entry: &TocEntry) -> Result<()>;

    /// Accented body line. Plain paragraph unless the format styles it.
    fn emit_emphasis(&mut self, text: &str) -> Result<()> {
        self.emit_paragraph(text)
    }

    /// `[label] rest` box: label block, then the rest as a paragraph.
    fn emit_highlight_box(&mut self, label: &str, rest: Option<&str>) -> Result<()> {
        self.emit_label(label)?;
        if let Some(rest) = rest {
            self.emit_paragraph(rest)?;
        }
        Ok(())
    }

    /// Optional imagery. Ignored unless the format places images.
    fn emit_image(&mut self, _src: &str) -> Result<()> {
        Ok(())
    }

    fn emit_block(&mut self, block: &ContentBlock) -> Result<()> {
        match block {
            ContentBlock::Heading(text) => self.emit_subheading(text),
            ContentBlock::HighlightLabel { label, rest } => {
                self.emit_highlight_box(label, rest.as_deref())
            }
            ContentBlock::Bullet(text) => self.emit_bullet(text),
            ContentBlock::Paragraph(text) => self.emit_paragraph(text),
            ContentBlock::Blank => self.emit_blank(),
        }
    }

    fn cover(&mut self, doc: &EbookDocument) -> Result<()> {
        self.emit_title(doc.title())?;
        if let Some(subtitle) = non_blank(Some(doc.book_info.subtitle.as_str())) {
            self.emit_paragraph(subtitle)?;
        }
        if let Some(author) = non_blank(doc.book_info.author.as_deref()) {
            self.emit_paragraph(author)?;
        }
        Ok(())
    }

    fn table_of_contents(&mut self, entries: &[TocEntry]) -> Result<()> {
        self.emit_title(TOC_TITLE)?;
        for entry in entries {
            self.emit_toc_entry(entry)?;
        }
        Ok(())
    }

    fn prologue(&mut self, text: &str) -> Result<()> {
        self.emit_title(PROLOGUE_TITLE)?;
        self.chapter_body(&tokenize(text))
    }

    fn value_summary(&mut self, analysis: &Analysis) -> Result<()> {
        self.emit_title(VALUE_SUMMARY_TITLE)?;
        for (label, text) in analysis.problem_rows() {
            self.emit_label(label)?;
            self.emit_paragraph(text)?;
        }
        if let Some(why) = non_blank(analysis.why_pay.as_deref()) {
            self.emit_subheading(WHY_PAY_TITLE)?;
            self.emit_paragraph(why)?;
        }
        Ok(())
    }

    fn chapter_start(&mut self, chapter: &ChapterStart<'_>) -> Result<()> {
        if let Some(phase) = &chapter.meta.phase {
            self.emit_label(phase.label())?;
        }
        self.emit_emphasis(&format!("CHAPTER  {}", chapter.number))?;
        self.emit_heading(&chapter.meta.title)?;
        if let Some(src) = chapter.image {
            self.emit_image(src)?;
        }
        if let Some(before) = non_blank(chapter.meta.before_state.as_deref()) {
            self.emit_emphasis(&format!("{BEFORE_LABEL}: {before}"))?;
        }
        if let Some(after) = non_blank(chapter.meta.after_state.as_deref()) {
            self.emit_emphasis(&format!("{AFTER_LABEL}: {after}"))?;
        }
        Ok(())
    }

    fn chapter_body(&mut self, blocks: &[ContentBlock]) -> Result<()> {
        for block in blocks {
            self.emit_block(block)?;
        }
        Ok(())
    }

    fn epilogue(&mut self, text: &str) -> Result<()> {
        self.emit_title(EPILOGUE_TITLE)?;
        self.chapter_body(&tokenize(text))
    }

    fn marketing_appendix(&mut self, marketing: &Marketing) -> Result<()> {
        self.emit_title(APPENDIX_TITLE)?;
        if let Some(copy) = non_blank(marketing.sales_copy.as_deref()) {
            self.emit_subheading(SALES_COPY_TITLE)?;
            for line in copy.lines().filter(|l| !l.trim().is_empty()) {
                self.emit_paragraph(line.trim())?;
            }
        }
        let rows = marketing.value_rows();
        if !rows.is_empty() {
            self.emit_subheading(READER_VALUE_TITLE)?;
            for (label, value) in rows {
                self.emit_bullet(&format!("{label}: {value}"))?;
            }
        }
        Ok(())
    }

    /// End of document; engines flush their last page here.
    fn finish(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Table-of-contents rows, one per chapter body.
///
/// Titles come from `book_info.chapters` when present. Entries in
/// `book_info.chapters` without a body are dropped.
pub fn toc_entries(doc: &EbookDocument, pages: Option<&ChapterPageIndex>) -> Vec<TocEntry> {
    (0..doc.chapters_content.len())
        .filter_map(|index| {
            let meta = doc
                .book_info
                .chapters
                .get(index)
                .or_else(|| doc.chapter_meta(index))?;
            let number = doc.chapter_number(index);
            Some(TocEntry {
                index,
                number,
                title: meta.title.clone(),
                phase: meta.phase.clone(),
                page: pages.and_then(|p| p.get(number)),
            })
        })
        .collect()
}

fn has_value_summary(analysis: &Analysis) -> bool {
    !analysis.problem_rows().is_empty() || non_blank(analysis.why_pay.as_deref()).is_some()
}

fn has_appendix(marketing: &Marketing) -> bool {
    non_blank(marketing.sales_copy.as_deref()).is_some() || !marketing.value_rows().is_empty()
}

/// Walk `doc` through `renderer` in section order.
pub fn compose<R: Renderer + ?Sized>(
    renderer: &mut R,
    doc: &EbookDocument,
    pages: Option<&ChapterPageIndex>,
    options: ComposeOptions,
) -> Result<()> {
    if let Err(mismatch) = doc.check_consistency() {
        warn_mismatch(&mismatch);
    }

    renderer.cover(doc)?;
    renderer.section_break()?;

    renderer.table_of_contents(&toc_entries(doc, pages))?;
    renderer.section_break()?;

    if let Some(text) = doc.prologue_text() {
        renderer.prologue(text)?;
        renderer.section_break()?;
    }

    if let Some(analysis) = doc.analysis.as_ref().filter(|a| has_value_summary(a)) {
        renderer.value_summary(analysis)?;
        renderer.section_break()?;
    }

    for (index, content) in doc.chapters_content.iter().enumerate() {
        let Some(meta) = doc.chapter_meta(index) else {
            continue;
        };
        let number = doc.chapter_number(index);
        renderer.record_chapter(number);
        let image = if options.include_images {
            doc.image_for(index)
        } else {
            None
        };
        renderer.chapter_start(&ChapterStart {
            index,
            number,
            meta,
            image,
        })?;
        if options.chapter_body_new_page {
            renderer.section_break()?;
        }
        renderer.chapter_body(&tokenize(&content.content))?;
        renderer.section_break()?;
    }

    if let Some(text) = doc.epilogue_text() {
        renderer.epilogue(text)?;
        renderer.section_break()?;
    }

    if let Some(marketing) = doc.marketing.as_ref().filter(|m| has_appendix(m)) {
        renderer.marketing_appendix(marketing)?;
        renderer.section_break()?;
    }

    renderer.finish()
}

fn warn_mismatch(mismatch: &ContentMismatchError) {
    log::warn!("{mismatch}; table of contents will be partial");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{BookInfo, ChapterContent};

    /// Records the primitive stream.
    #[derive(Default)]
    struct Trace(Vec<String>);

    impl Renderer for Trace {
        fn section_break(&mut self) -> Result<()> {
            self.0.push("break".into());
            Ok(())
        }
        fn record_chapter(&mut self, number: u32) {
            self.0.push(format!("chapter {number}"));
        }
        fn emit_title(&mut self, text: &str) -> Result<()> {
            self.0.push(format!("title {text}"));
            Ok(())
        }
        fn emit_heading(&mut self, text: &str) -> Result<()> {
            self.0.push(format!("heading {text}"));
            Ok(())
        }
        fn emit_subheading(&mut self, text: &str) -> Result<()> {
            self.0.push(format!("sub {text}"));
            Ok(())
        }
        fn emit_label(&mut self, label: &str) -> Result<()> {
            self.0.push(format!("label {label}"));
            Ok(())
        }
        fn emit_paragraph(&mut self, text: &str) -> Result<()> {
            self.0.push(format!("p {text}"));
            Ok(())
        }
        fn emit_bullet(&mut self, text: &str) -> Result<()> {
            self.0.push(format!("bullet {text}"));
            Ok(())
        }
        fn emit_blank(&mut self) -> Result<()> {
            self.0.push("blank".into());
            Ok(())
        }
        fn emit_toc_entry(&mut self, entry: &TocEntry) -> Result<()> {
            self.0.push(format!("toc {} {:?}", entry.number, entry.page));
            Ok(())
        }
    }

    fn doc(chapters: usize, bodies: usize) -> EbookDocument {
        let meta = |i: usize| ChapterMeta {
            chapter_num: Some(i as u32 + 1),
            title: format!("장 {}", i + 1),
            ..Default::default()
        };
        EbookDocument {
            book_info: BookInfo {
                title: "책".into(),
                chapters: (0..chapters).map(meta).collect(),
                ..Default::default()
            },
            chapters_content: (0..bodies)
                .map(|i| ChapterContent {
                    chapter: meta(i),
                    content: "== A ==\n본문".into(),
                })
                .collect(),
            ..Default::default()
        }
    }

    #[test]
    fn hex_colors() {
        assert_eq!(hex_color("#ffffff"), [1.0, 1.0, 1.0, 1.0]);
        assert_eq!(hex_color("#000000"), [0.0, 0.0, 0.0, 1.0]);
        assert_eq!(hex_color("nope"), [0.0, 0.0, 0.0, 1.0]);
        assert_eq!(hex_rgb("#6c5ce7"), "6C5CE7");
    }

    #[test]
    fn phase_palette() {
        assert_eq!(phase_color(Some(&Phase::Execution)), "#03c75a");
        assert_eq!(phase_color(Some(&Phase::Other("기타".into()))), DEFAULT_ACCENT);
        assert_eq!(phase_background(None), DEFAULT_BACKGROUND);
    }

    #[test]
    fn compose_walks_sections_in_order() {
        let mut trace = Trace::default();
        compose(
            &mut trace,
            &doc(1, 1),
            None,
            ComposeOptions {
                chapter_body_new_page: true,
                include_images: false,
            },
        )
        .unwrap();
        assert_eq!(
            trace.0,
            vec![
                "title 책",
                "break",
                "title 목  차",
                "toc 1 None",
                "break",
                "chapter 1",
                "p CHAPTER  1",
                "heading 장 1",
                "break",
                "sub A",
                "p 본문",
                "break",
            ]
        );
    }

    #[test]
    fn toc_is_partial_on_mismatch() {
        let entries = toc_entries(&doc(3, 2), None);
        assert_eq!(entries.len(), 2);
        let entries = toc_entries(&doc(1, 2), None);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].title, "장 2");
    }

    #[test]
    fn toc_pages_come_from_index() {
        let mut index = ChapterPageIndex::new();
        index.record(1, 4);
        let entries = toc_entries(&doc(2, 2), Some(&index));
        assert_eq!(entries[0].page, Some(4));
        assert_eq!(entries[1].page, None);
    }
}
