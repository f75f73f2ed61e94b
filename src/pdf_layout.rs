//! Fixed-page layout engine – places every block at absolute coordinates
//! with real glyph-width wrapping and produces [`EmittedPages`].
//!
//! The table of contents needs the page on which each chapter starts, which
//! is only known after layout. [`layout_pdf`] therefore lays the document out
//! once without imagery to learn those pages, then again with imagery using
//! the harvested index, and repeats until the index it prints matches the
//! pages the chapters actually land on.

use crate::assets::{load_image, AssetFetcher};
use crate::config::LayoutConstants;
use crate::error::Result;
use crate::fonts::{strip_unsupported, wrap_text, FontRegistry};
use crate::layout::{
    compose, hex_color, phase_background, phase_color, ChapterStart, ComposeOptions, Renderer,
    TocEntry, AFTER_LABEL, APPENDIX_TITLE, BEFORE_LABEL, DEFAULT_ACCENT, EPILOGUE_TITLE,
    PROLOGUE_TITLE, READER_VALUE_TITLE, SALES_COPY_TITLE, TOC_TITLE, VALUE_SUMMARY_TITLE,
    WHY_PAY_TITLE,
};
use crate::layout_config::{DrawOp, EmittedPages, PageLayout, Stroke};
use crate::markup::tokenize;
use crate::model::{non_blank, Analysis, EbookDocument, Marketing, Phase};
use crate::package::Format;
use crate::pagination::{build_chapter_page_index, BlockMetrics, ChapterPageIndex, PageCursor};

/// Upper bound on layout passes before the last index is accepted.
pub const MAX_PASSES: usize = 4;

const TEXT: &str = "#333333";
const INK: &str = "#1a1a2e";
const WHITE: &str = "#ffffff";
const TIP_LABELS: [&str; 6] = ["핵심 포인트", "실전 팁", "TIP", "핵심", "포인트", "POINT"];

/// One layout pass over a document.
pub struct PdfLayoutEngine<'a> {
    constants: &'a LayoutConstants,
    fonts: &'a FontRegistry,
    assets: &'a dyn AssetFetcher,
    metrics: BlockMetrics,
    cursor: PageCursor,
    output: EmittedPages,
    current: PageLayout,
    accent: &'static str,
}

impl<'a> PdfLayoutEngine<'a> {
    pub fn new(
        title: &str,
        constants: &'a LayoutConstants,
        fonts: &'a FontRegistry,
        assets: &'a dyn AssetFetcher,
    ) -> Self {
        let metrics = BlockMetrics::for_format(Format::Pdf, constants);
        Self {
            constants,
            fonts,
            assets,
            cursor: PageCursor::new(metrics.content_height),
            metrics,
            output: EmittedPages::new(title, constants.page_width, constants.page_height),
            current: PageLayout::new(1),
            accent: DEFAULT_ACCENT,
        }
    }

    pub fn into_pages(self) -> EmittedPages {
        self.output
    }

    // ── geometry ──────────────────────────────────────────────────────────

    fn ml(&self) -> f32 {
        self.constants.margin_left
    }

    fn cw(&self) -> f32 {
        self.constants.content_width()
    }

    fn page_w(&self) -> f32 {
        self.constants.page_width
    }

    fn page_h(&self) -> f32 {
        self.constants.page_height
    }

    /// Top of the next line box.
    fn top(&self) -> f32 {
        self.constants.margin_top + self.cursor.used()
    }

    fn baseline(&self, top: f32, size: f32) -> f32 {
        top + self.fonts.ascender(size)
    }

    // ── page management ──────────────────────────────────────────────────

    fn flush_page(&mut self) {
        let next = PageLayout::new(self.cursor.page());
        let finished = std::mem::replace(&mut self.current, next);
        self.output.pages.push(finished);
    }

    fn check_break(&mut self, needed: f32) {
        if self.cursor.check_page_break(needed) {
            self.flush_page();
        }
    }

    // ── drawing ──────────────────────────────────────────────────────────

    fn text(&mut self, x: f32, y: f32, size: f32, color: &str, text: &str) {
        self.styled_text(x, y, size, color, false, text);
    }

    fn bold_text(&mut self, x: f32, y: f32, size: f32, color: &str, text: &str) {
        self.styled_text(x, y, size, color, true, text);
    }

    fn styled_text(&mut self, x: f32, y: f32, size: f32, color: &str, bold: bool, text: &str) {
        let text = strip_unsupported(text);
        if text.trim().is_empty() {
            return;
        }
        self.current.ops.push(DrawOp::Text {
            x,
            y,
            size,
            color: hex_color(color),
            bold,
            text,
        });
    }

    fn rect(&mut self, x: f32, y: f32, width: f32, height: f32, fill: &str) {
        self.current.ops.push(DrawOp::Rect {
            x,
            y,
            width,
            height,
            fill: Some(hex_color(fill)),
            stroke: None,
        });
    }

    fn framed_rect(&mut self, x: f32, y: f32, width: f32, height: f32, fill: &str, border: &str) {
        self.current.ops.push(DrawOp::Rect {
            x,
            y,
            width,
            height,
            fill: Some(hex_color(fill)),
            stroke: Some(Stroke {
                width: 1.0,
                color: hex_color(border),
            }),
        });
    }

    fn line(&mut self, x1: f32, x2: f32, y: f32, width: f32, color: &str) {
        self.current.ops.push(DrawOp::Line {
            x1,
            y1: y,
            x2,
            y2: y,
            stroke: Stroke {
                width,
                color: hex_color(color),
            },
        });
    }

    fn circle(&mut self, cx: f32, cy: f32, r: f32, fill: Option<&str>, stroke: Option<(f32, &str)>) {
        self.current.ops.push(DrawOp::Ellipse {
            cx,
            cy,
            rx: r,
            ry: r,
            fill: fill.map(hex_color),
            stroke: stroke.map(|(width, color)| Stroke {
                width,
                color: hex_color(color),
            }),
        });
    }

    fn centered_text(&mut self, y: f32, size: f32, color: &str, text: &str) {
        let w = self.fonts.measure(text, size);
        let x = (self.page_w() - w) / 2.0;
        self.text(x, y, size, color, text);
    }

    /// First wrapped line of `text`, with an ellipsis when more would follow.
    fn fit_line(&self, text: &str, size: f32, width: f32) -> String {
        let lines = wrap_text(text, size, width, self.fonts);
        match lines.as_slice() {
            [] => String::new(),
            [only] => only.clone(),
            [first, ..] => format!("{first}…"),
        }
    }

    /// Wrapped, page-breaking paragraph. Embedded newlines split it; blank
    /// inner lines leave half a line of space.
    fn paragraph(&mut self, text: &str, size: f32, color: &str, indent: f32) {
        let text = strip_unsupported(text);
        if text.trim().is_empty() {
            return;
        }
        let lh = size * self.constants.line_spacing;
        let width = self.cw() - indent;
        for input in text.split('\n') {
            let input = input.trim();
            if input.is_empty() {
                self.cursor.skip(lh * 0.5);
                continue;
            }
            for line in wrap_text(input, size, width, self.fonts) {
                self.check_break(lh + 4.0);
                let y = self.baseline(self.top(), size);
                self.text(self.ml() + indent, y, size, color, &line);
                self.cursor.advance(lh);
            }
        }
        self.cursor.skip(lh * 0.15);
    }

    /// Full-width banded header used by every front and back section.
    fn section_header(&mut self, title: &str, background: &str, color: &str, size: f32) {
        self.check_break(52.0);
        let top = self.top();
        let (ml, cw) = (self.ml(), self.cw());
        self.rect(ml - 10.0, top, cw + 20.0, 38.0, background);
        if background != INK && background != "#0a0a1a" {
            self.rect(ml - 10.0, top, 3.0, 38.0, DEFAULT_ACCENT);
        }
        let line = self.fit_line(title, size, cw - 6.0);
        self.text(ml + 6.0, top + 25.0, size, color, &line);
        self.cursor.advance(38.0);
    }

    fn badge(&mut self, label: &str, color: &str, size: f32, height: f32) {
        let top = self.top();
        let w = self.fonts.measure(label, size) + 14.0;
        self.rect(self.ml(), top, w, height, color);
        let y = top + height / 2.0 + size * 0.35;
        self.bold_text(self.ml() + 7.0, y, size, WHITE, label);
    }

    fn place_image(&mut self, src: &str, max_height: f32) {
        let Some(img) = load_image(self.assets, src) else {
            return;
        };
        let (ml, cw) = (self.ml(), self.cw());
        let top = self.top();
        let (w, h) = img.fit(cw, max_height);
        self.current.ops.push(DrawOp::Image {
            x: ml + (cw - w) / 2.0,
            y: top + (max_height - h) / 2.0,
            width: w,
            height: h,
            src: src.to_string(),
        });
        self.cursor.advance(max_height + 15.0);
    }

    fn phase_header(&mut self, phase: Option<&Phase>, first: bool) {
        if !first {
            self.cursor.skip(8.0);
        }
        self.check_break(40.0);
        let color = phase_color(phase);
        let label = phase.map(Phase::label).unwrap_or_default();
        let top = self.top();
        self.text(self.ml(), top + 8.0, 8.0, color, &format!("▶  {label}"));
        let (ml, cw) = (self.ml(), self.cw());
        self.line(ml, ml + cw, top + 14.0, 0.5, "#eeeeee");
        self.cursor.advance(22.0);
    }

    fn finish_pages(&mut self) {
        if !self.current.is_blank() || self.output.pages.is_empty() {
            self.flush_page();
        }
        let h = self.page_h();
        for i in 0..self.output.pages.len() {
            let number = self.output.pages[i].number;
            if number <= 1 {
                continue;
            }
            let label = number.to_string();
            let w = self.fonts.measure(&label, 8.0);
            let x = (self.page_w() - w) / 2.0;
            self.output.pages[i].ops.push(DrawOp::Text {
                x,
                y: h - 22.0,
                size: 8.0,
                color: hex_color("#aaaaaa"),
                bold: false,
                text: label,
            });
        }
    }
}

fn label_color(label: &str) -> &'static str {
    match label {
        "시간 절약" => "#03c75a",
        "비용 절감" => "#f39c12",
        "감정적 해방" => "#3498db",
        _ => DEFAULT_ACCENT,
    }
}

fn title_size(title: &str) -> f32 {
    match title.chars().count() {
        0..=14 => 28.0,
        15..=22 => 22.0,
        _ => 18.0,
    }
}

impl Renderer for PdfLayoutEngine<'_> {
    fn section_break(&mut self) -> Result<()> {
        if self.cursor.force_break() {
            self.flush_page();
        }
        Ok(())
    }

    fn record_chapter(&mut self, number: u32) {
        self.current.anchors.push(number);
    }

    fn emit_title(&mut self, text: &str) -> Result<()> {
        self.section_header(text, "#f8f7ff", INK, 18.0);
        self.cursor.advance(14.0);
        Ok(())
    }

    fn emit_heading(&mut self, text: &str) -> Result<()> {
        let hs = self.metrics.heading_size;
        let lines = wrap_text(&strip_unsupported(text), hs, self.cw(), self.fonts);
        for line in lines {
            self.check_break(hs * 1.5);
            let y = self.baseline(self.top(), hs);
            self.text(self.ml(), y, hs, "#1a1a1a", &line);
            self.cursor.advance(hs * 1.4);
        }
        self.cursor.skip(8.0);
        let (ml, cw, y) = (self.ml(), self.cw(), self.top());
        let accent = self.accent;
        self.line(ml, ml + 55.0, y, 2.5, accent);
        self.line(ml + 65.0, ml + cw, y, 0.8, "#eeeeee");
        self.cursor.advance(20.0);
        Ok(())
    }

    fn emit_subheading(&mut self, text: &str) -> Result<()> {
        let ss = self.metrics.subheading_size;
        self.check_break(55.0);
        self.cursor.skip(self.metrics.heading_space_before);
        let top = self.top();
        let band = ss * 1.6;
        let (ml, cw) = (self.ml(), self.cw());
        self.rect(ml - 6.0, top, cw + 12.0, band, "#f4f4f8");
        self.rect(ml - 6.0, top, 3.0, band, DEFAULT_ACCENT);
        let line = self.fit_line(&strip_unsupported(text), ss, cw - 4.0);
        self.text(ml + 4.0, top + ss * 1.1, ss, INK, &line);
        self.cursor.advance(ss * 1.7);
        self.cursor.skip(self.metrics.heading_space_after);
        Ok(())
    }

    fn emit_label(&mut self, label: &str) -> Result<()> {
        self.check_break(36.0);
        self.badge(label, label_color(label), 9.0, 16.0);
        self.cursor.advance(20.0);
        Ok(())
    }

    fn emit_paragraph(&mut self, text: &str) -> Result<()> {
        self.paragraph(text, self.metrics.body_size, TEXT, 0.0);
        Ok(())
    }

    fn emit_bullet(&mut self, text: &str) -> Result<()> {
        let size = self.metrics.body_size;
        let lh = size * self.constants.line_spacing;
        let lines = wrap_text(&strip_unsupported(text), size, self.cw() - 14.0, self.fonts);
        for (i, line) in lines.iter().enumerate() {
            self.check_break(lh + 4.0);
            let y = self.baseline(self.top(), size);
            if i == 0 {
                let accent = self.accent;
                self.text(self.ml() + 2.0, y, size, accent, "•");
            }
            self.text(self.ml() + 14.0, y, size, TEXT, line);
            self.cursor.advance(lh);
        }
        self.cursor.skip(self.metrics.block_space_after);
        Ok(())
    }

    fn emit_blank(&mut self) -> Result<()> {
        self.cursor.skip(self.metrics.body_line() * 0.4);
        Ok(())
    }

    fn emit_emphasis(&mut self, text: &str) -> Result<()> {
        let accent = self.accent;
        self.paragraph(text, self.metrics.body_size, accent, 0.0);
        Ok(())
    }

    fn emit_highlight_box(&mut self, label: &str, rest: Option<&str>) -> Result<()> {
        let tip = TIP_LABELS.contains(&label);
        let (fill, border, color) = if tip {
            ("#f0fff4", "#03c75a", "#1a6b35")
        } else {
            ("#f8f7ff", DEFAULT_ACCENT, INK)
        };
        let text = match rest {
            Some(rest) => format!("[{label}] {rest}"),
            None => format!("[{label}]"),
        };
        let size = self.metrics.body_size;
        let lh = self.metrics.body_line();
        let lines = wrap_text(&strip_unsupported(&text), size, self.cw() - 16.0, self.fonts);
        let box_h = lh * lines.len() as f32 + 16.0;

        if box_h > self.metrics.content_height {
            self.paragraph(&text, size, color, 8.0);
            return Ok(());
        }
        self.check_break(box_h + 10.0);
        self.cursor.skip(4.0);
        let top = self.top();
        let (ml, cw) = (self.ml(), self.cw());
        self.framed_rect(ml, top, cw, box_h, fill, border);
        let mut y = top + 8.0;
        for line in &lines {
            let baseline = self.baseline(y, size);
            self.text(ml + 8.0, baseline, size, color, line);
            y += lh;
        }
        self.cursor.advance(box_h + 6.0);
        Ok(())
    }

    fn emit_image(&mut self, src: &str) -> Result<()> {
        let available = self.cursor.remaining() - 80.0;
        let height = available.min(160.0);
        if height > 60.0 {
            self.place_image(src, height);
        }
        Ok(())
    }

    fn emit_toc_entry(&mut self, entry: &TocEntry) -> Result<()> {
        self.check_break(28.0);
        let top = self.top();
        let base = top + 10.0;
        let (ml, cw) = (self.ml(), self.cw());
        let color = phase_color(entry.phase.as_ref());

        let badge_x = ml + 10.0;
        self.circle(badge_x, base - 5.0, 8.0, Some(color), None);
        let num = entry.number.to_string();
        let nw = self.fonts.measure(&num, 7.0);
        self.text(badge_x - nw / 2.0, base - 2.5, 7.0, WHITE, &num);

        let page = entry.page.map(|p| p.to_string()).unwrap_or_default();
        let page_w = if page.is_empty() {
            0.0
        } else {
            self.fonts.measure(&page, 10.0) + 4.0
        };
        let title_x = ml + 24.0;
        let display = self.fit_line(&strip_unsupported(&entry.title), 10.0, cw - 26.0 - page_w);
        self.text(title_x, base, 10.0, TEXT, &display);

        if !page.is_empty() {
            let page_x = ml + cw - page_w;
            let mut dot_x = title_x + self.fonts.measure(&display, 10.0) + 4.0;
            while dot_x + 6.0 < page_x - 4.0 {
                self.circle(dot_x + 1.0, base - 1.0, 0.6, Some("#cccccc"), None);
                dot_x += 5.0;
            }
            self.text(page_x, base, 10.0, "#555555", &page);
        }
        self.cursor.advance(22.0);
        Ok(())
    }

    fn cover(&mut self, doc: &EbookDocument) -> Result<()> {
        let (w, h) = (self.page_w(), self.page_h());
        for (from, to, color) in [
            (0.00, 0.40, "#0a0a1a"),
            (0.40, 0.65, "#0e0e22"),
            (0.65, 0.85, "#12122e"),
            (0.85, 1.00, "#16163a"),
        ] {
            self.rect(0.0, h * from, w, h * (to - from), color);
        }
        self.circle(w + 20.0, 30.0, 180.0, Some("#1a1a40"), None);
        self.circle(w - 20.0, 60.0, 120.0, Some("#20205a"), None);
        self.circle(w - 10.0, 50.0, 140.0, None, Some((1.2, DEFAULT_ACCENT)));
        self.circle(-30.0, h - 80.0, 100.0, Some("#141430"), None);
        self.circle(-20.0, h - 70.0, 120.0, None, Some((0.8, "#4a4a8a")));
        self.rect(0.0, 0.0, 6.0, h, DEFAULT_ACCENT);
        self.rect(0.0, 0.0, w, 6.0, DEFAULT_ACCENT);

        let rule_y = h * 0.48;
        self.line(40.0, 100.0, rule_y, 1.5, DEFAULT_ACCENT);
        self.line(110.0, w - 40.0, rule_y, 0.5, "#4a4a6a");
        self.text(42.0, rule_y - 14.0, 8.0, "#9b8fff", "전자책  /  E-BOOK");

        let title = strip_unsupported(doc.title());
        let size = title_size(&title);
        let mut y = rule_y + 20.0 + size * 0.75;
        for line in wrap_text(&title, size, w - 90.0, self.fonts) {
            self.text(42.0, y, size, WHITE, &line);
            y += size * 1.45;
        }
        if let Some(subtitle) = non_blank(Some(doc.book_info.subtitle.as_str())) {
            y += 12.0;
            for line in wrap_text(&strip_unsupported(subtitle), 13.0, w - 90.0, self.fonts) {
                self.text(42.0, y, 13.0, "#aaaacc", &line);
                y += 13.0 * 1.5;
            }
        }
        if let Some(author) = non_blank(doc.book_info.author.as_deref()) {
            y += 8.0;
            self.text(42.0, y, 11.0, "#8888aa", author);
            y += 11.0 * 1.5;
        }
        if let Some(src) = non_blank(doc.cover_url.as_deref()) {
            let space = h - 80.0 - y;
            if space > 60.0 {
                if let Some(img) = load_image(self.assets, src) {
                    let (iw, ih) = img.fit(w - 120.0, space.min(220.0));
                    self.current.ops.push(DrawOp::Image {
                        x: (w - iw) / 2.0,
                        y: y + 10.0,
                        width: iw,
                        height: ih,
                        src: src.to_string(),
                    });
                }
            }
        }

        self.line(42.0, 122.0, h - 55.0, 1.5, DEFAULT_ACCENT);
        self.text(42.0, h - 38.0, 8.0, "#555577", "AI 전자책 자동 생성기 제작");
        self.rect(0.0, h - 5.0, w, 5.0, DEFAULT_ACCENT);
        self.cursor.mark_content();
        Ok(())
    }

    fn table_of_contents(&mut self, entries: &[TocEntry]) -> Result<()> {
        self.section_header(TOC_TITLE, INK, WHITE, 18.0);
        self.cursor.advance(8.0);
        let (ml, cw, y) = (self.ml(), self.cw(), self.top());
        self.line(ml, ml + cw, y, 2.0, DEFAULT_ACCENT);
        self.cursor.advance(16.0);

        let mut current: Option<Option<&Phase>> = None;
        for (i, entry) in entries.iter().enumerate() {
            let phase = entry.phase.as_ref();
            if current != Some(phase) {
                current = Some(phase);
                self.phase_header(phase, i == 0);
            }
            self.emit_toc_entry(entry)?;
        }
        self.cursor.skip(10.0);
        Ok(())
    }

    fn prologue(&mut self, text: &str) -> Result<()> {
        self.dark_section(PROLOGUE_TITLE, INK);
        self.chapter_body(&tokenize(text))
    }

    fn epilogue(&mut self, text: &str) -> Result<()> {
        self.dark_section(EPILOGUE_TITLE, "#0a0a1a");
        self.chapter_body(&tokenize(text))
    }

    fn value_summary(&mut self, analysis: &Analysis) -> Result<()> {
        self.emit_title(VALUE_SUMMARY_TITLE)?;
        let body = self.metrics.body_size;
        for (label, text) in analysis.problem_rows() {
            self.check_break(60.0);
            self.badge(label, label_color(label), 9.0, 16.0);
            self.cursor.advance(20.0);
            self.paragraph(text, body, TEXT, 10.0);
            self.cursor.skip(8.0);
        }
        if let Some(why) = non_blank(analysis.why_pay.as_deref()) {
            self.check_break(60.0);
            self.cursor.skip(10.0);
            let (ml, y) = (self.ml(), self.top());
            self.line(ml, ml + 40.0, y, 2.0, DEFAULT_ACCENT);
            self.cursor.advance(6.0);
            let y = self.baseline(self.top(), 13.0);
            self.text(ml, y, 13.0, INK, WHY_PAY_TITLE);
            self.cursor.advance(24.0);
            self.paragraph(why, body, TEXT, 10.0);
        }
        Ok(())
    }

    fn chapter_start(&mut self, chapter: &ChapterStart<'_>) -> Result<()> {
        let phase = chapter.meta.phase.as_ref();
        let color = phase_color(phase);
        self.accent = color;

        let bar_y = self.constants.margin_top + 9.0 - self.metrics.heading_size * 1.4;
        let w = self.page_w();
        self.rect(0.0, bar_y.max(0.0), w, 6.0, color);

        if let Some(phase) = phase {
            self.badge(&format!("  {}", phase.label()), color, 9.0, 18.0);
        }
        self.cursor.advance(26.0);

        let y = self.baseline(self.top(), 11.0);
        self.text(self.ml(), y, 11.0, "#aaaaaa", &format!("CHAPTER  {}", chapter.number));
        self.cursor.advance(22.0);

        self.emit_heading(&chapter.meta.title)?;

        if let Some(src) = chapter.image {
            self.emit_image(src)?;
        }

        let before = non_blank(chapter.meta.before_state.as_deref());
        let after = non_blank(chapter.meta.after_state.as_deref());
        if before.is_none() && after.is_none() {
            return Ok(());
        }
        let box_h = 14.0 + 14.0 * 2.2 * 2.0;
        self.check_break(box_h + 20.0);
        let start = self.cursor.used();
        let top = self.top();
        let (ml, cw) = (self.ml(), self.cw());
        self.framed_rect(ml, top, cw, box_h, phase_background(phase), color);
        self.cursor.advance(10.0);
        for (label, text, label_color, text_color) in [
            (BEFORE_LABEL, before, "#e74c3c", "#cc3333"),
            (AFTER_LABEL, after, "#03c75a", "#017a38"),
        ] {
            let Some(text) = text else { continue };
            let y = self.top() + 6.0;
            self.text(ml + 10.0, y, 8.0, label_color, label);
            self.cursor.advance(12.0);
            for line in wrap_text(&strip_unsupported(text), 10.0, cw - 20.0, self.fonts)
                .into_iter()
                .take(2)
            {
                let y = self.baseline(self.top(), 10.0);
                self.text(ml + 14.0, y, 10.0, text_color, &line);
                self.cursor.advance(14.0);
            }
            self.cursor.skip(4.0);
        }
        let consumed = self.cursor.used() - start;
        if consumed < box_h + 10.0 {
            self.cursor.skip(box_h + 10.0 - consumed);
        }
        Ok(())
    }

    fn marketing_appendix(&mut self, marketing: &Marketing) -> Result<()> {
        self.section_header(APPENDIX_TITLE, INK, WHITE, 16.0);
        self.cursor.advance(12.0);
        let body = self.metrics.body_size;
        let ml = self.ml();
        if let Some(copy) = non_blank(marketing.sales_copy.as_deref()) {
            self.check_break(40.0);
            let y = self.baseline(self.top(), 12.0);
            self.text(ml, y, 12.0, "#03c75a", SALES_COPY_TITLE);
            self.cursor.advance(18.0);
            let start = self.top();
            self.paragraph(copy, body, TEXT, 12.0);
            let end = self.top();
            if end > start {
                self.current.ops.push(DrawOp::Line {
                    x1: ml,
                    y1: start,
                    x2: ml,
                    y2: end,
                    stroke: Stroke {
                        width: 2.0,
                        color: hex_color(DEFAULT_ACCENT),
                    },
                });
            }
            self.cursor.skip(20.0);
        }
        let rows = marketing.value_rows();
        if !rows.is_empty() {
            self.check_break(40.0);
            let y = self.baseline(self.top(), 12.0);
            self.text(ml, y, 12.0, "#03c75a", READER_VALUE_TITLE);
            self.cursor.advance(20.0);
            for (label, value) in rows {
                self.check_break(30.0);
                self.paragraph(&format!("• {label}: {value}"), 10.0, TEXT, 0.0);
            }
        }
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.finish_pages();
        Ok(())
    }
}

impl PdfLayoutEngine<'_> {
    fn dark_section(&mut self, title: &str, background: &str) {
        self.section_header(title, background, WHITE, 18.0);
        self.cursor.advance(14.0);
        let (ml, cw, y) = (self.ml(), self.cw(), self.top());
        self.line(ml, ml + cw, y, 2.0, DEFAULT_ACCENT);
        self.cursor.advance(20.0);
    }
}

/// Run a single layout pass.
pub fn layout_pass(
    doc: &EbookDocument,
    constants: &LayoutConstants,
    fonts: &FontRegistry,
    assets: &dyn AssetFetcher,
    pages: Option<&ChapterPageIndex>,
    include_images: bool,
) -> Result<EmittedPages> {
    constants.validate()?;
    let mut engine = PdfLayoutEngine::new(doc.title(), constants, fonts, assets);
    compose(
        &mut engine,
        doc,
        pages,
        ComposeOptions {
            chapter_body_new_page: true,
            include_images,
        },
    )?;
    Ok(engine.into_pages())
}

/// Lay out `doc` with a table of contents that matches the body.
pub fn layout_pdf(
    doc: &EbookDocument,
    constants: &LayoutConstants,
    fonts: &FontRegistry,
    assets: &dyn AssetFetcher,
) -> Result<EmittedPages> {
    let draft = layout_pass(doc, constants, fonts, assets, None, false)?;
    let mut index = draft.chapter_pages();
    log_drift(doc, constants, &index);

    let mut pages = layout_pass(doc, constants, fonts, assets, Some(&index), true)?;
    for pass in 3..=MAX_PASSES {
        let actual = pages.chapter_pages();
        if actual == index {
            break;
        }
        log::debug!("chapter pages moved after placing images; layout pass {pass}");
        index = actual;
        pages = layout_pass(doc, constants, fonts, assets, Some(&index), true)?;
    }
    Ok(pages)
}

fn log_drift(doc: &EbookDocument, constants: &LayoutConstants, actual: &ChapterPageIndex) {
    if !log::log_enabled!(log::Level::Debug) {
        return;
    }
    match build_chapter_page_index(doc, Format::Pdf, constants) {
        Ok(estimate) => {
            for entry in actual.iter() {
                let predicted = estimate.get(entry.chapter);
                if predicted != Some(entry.page) {
                    log::debug!(
                        "chapter {}: estimated page {:?}, laid out on page {}",
                        entry.chapter,
                        predicted,
                        entry.page
                    );
                }
            }
        }
        Err(e) => log::debug!("page estimate unavailable: {e}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::LocalAssets;
    use crate::fixtures::sample_document;

    fn layout(doc: &EbookDocument) -> EmittedPages {
        layout_pdf(
            doc,
            &LayoutConstants::default(),
            &FontRegistry::builtin(),
            &LocalAssets::new(),
        )
        .unwrap()
    }

    #[test]
    fn cover_and_toc_come_first() {
        let pages = layout(&sample_document());
        assert!(pages.pages.len() > 6);
        assert!(pages.page_text(1).contains(&"전자책  /  E-BOOK"));
        assert!(pages.page_text(2).contains(&TOC_TITLE));
        assert!(pages.pages.iter().all(|p| !p.is_blank()));
    }

    #[test]
    fn pages_are_numbered_consecutively() {
        let pages = layout(&sample_document());
        for (i, page) in pages.pages.iter().enumerate() {
            assert_eq!(page.number, i + 1);
        }
        // Footer number on every page but the cover.
        assert!(!pages.page_text(1).contains(&"1"));
        assert!(pages.page_text(2).contains(&"2"));
    }

    #[test]
    fn toc_prints_the_pages_chapters_start_on() {
        let doc = sample_document();
        let pages = layout(&doc);
        let index = pages.chapter_pages();
        assert_eq!(index.len(), doc.chapters_content.len());
        assert!(index.is_monotonic());
        let toc = pages.page_text(2);
        for entry in index.iter() {
            assert!(toc.contains(&entry.page.to_string().as_str()));
            let heading = format!("CHAPTER  {}", entry.chapter);
            assert!(pages.page_text(entry.page).contains(&heading.as_str()));
        }
    }

    #[test]
    fn draft_and_final_passes_agree_without_images() {
        let doc = sample_document();
        let draft = layout_pass(
            &doc,
            &LayoutConstants::default(),
            &FontRegistry::builtin(),
            &LocalAssets::new(),
            None,
            false,
        )
        .unwrap();
        let final_pages = layout(&doc);
        assert_eq!(draft.pages.len(), final_pages.pages.len());
        assert_eq!(draft.chapter_pages(), final_pages.chapter_pages());
    }

    #[test]
    fn label_badges_are_bold_and_body_text_is_not() {
        let doc = sample_document();
        let pages = layout(&doc);
        let phase = doc.chapters_content[0].chapter.phase.as_ref().unwrap();
        let texts: Vec<(&str, bool)> = pages
            .pages
            .iter()
            .flat_map(|p| &p.ops)
            .filter_map(|op| match op {
                DrawOp::Text { text, bold, .. } => Some((text.as_str(), *bold)),
                _ => None,
            })
            .collect();

        let badges: Vec<_> = texts.iter().filter(|(t, _)| t.trim() == phase.label()).collect();
        assert!(!badges.is_empty());
        assert!(badges.iter().all(|(_, bold)| *bold));

        assert!(texts.iter().any(|(t, bold)| *t == "CHAPTER  1" && !bold));
    }

    #[test]
    fn invalid_constants_fail() {
        let constants = LayoutConstants {
            body_size: 0.0,
            ..LayoutConstants::default()
        };
        let err = layout_pass(
            &sample_document(),
            &constants,
            &FontRegistry::builtin(),
            &LocalAssets::new(),
            None,
            false,
        );
        assert!(err.is_err());
    }
}
