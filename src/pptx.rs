//! Slide-deck engine – PresentationML (`.pptx`).
//!
//! Slides are not height-paginated: the deck structure is fixed (cover,
//! contents, prologue, one intro slide plus one slide per body section for
//! each chapter, epilogue), so the chapter → slide map is exact arithmetic
//! over the same section grouping the deck is built from.
//!
//! Geometry is in inches on a 13.33 × 7.5 in (16:9) slide and converted to
//! EMU when the XML is written.

use crate::config::LayoutConstants;
use crate::error::Result;
use crate::layout::{
    hex_rgb, phase_background, phase_color, toc_entries, TocEntry, AFTER_LABEL, BEFORE_LABEL,
    DEFAULT_ACCENT, EPILOGUE_TITLE, PROLOGUE_TITLE, TOC_TITLE,
};
use crate::markup::{tokenize_line, ContentBlock};
use crate::model::{non_blank, ChapterMeta, EbookDocument};
use crate::package::{escape_xml, timestamp, write_zip, Part};
use crate::pagination::ChapterPageIndex;
use crate::units::inch_to_emu;

pub const SLIDE_W: f64 = 13.33;
pub const SLIDE_H: f64 = 7.5;
const HEADER_H: f64 = 1.15;
/// Horizontal margin.
const MX: f64 = 0.55;
const CONTENT_TOP: f64 = 1.3;

/// Shown when a section yields no usable point.
pub const PLACEHOLDER_POINT: &str = "핵심 내용을 확인하세요.";

/// Korean sentence endings `natural_trim` prefers to cut after.
const ENDINGS: [&str; 13] = [
    "합니다", "됩니다", "습니다", "입니다", "하세요", "이다", "한다", "된다", "있다", "없다", "이며",
    "하며", "하고",
];

const P_NS: &str = "http://schemas.openxmlformats.org/presentationml/2006/main";
const A_NS: &str = "http://schemas.openxmlformats.org/drawingml/2006/main";
const R_NS: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";

// ============================================================================
// Section grouping
// ============================================================================

/// How a group of body blocks is presented.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SectionKind {
    /// Blocks before the first sub-heading.
    Intro,
    Plain,
    Highlight,
    Summary,
    Checklist,
}

impl SectionKind {
    /// Kind of the section opened by a `== title ==` heading.
    pub fn for_heading(title: &str) -> Self {
        if title.contains("핵심 요약") || title.trim() == "요약" {
            SectionKind::Summary
        } else if title.contains("체크리스트") || (title.contains("실행") && title.contains("리스트"))
        {
            SectionKind::Checklist
        } else if title.contains("핵심 포인트") || title.contains("실전 팁") {
            SectionKind::Highlight
        } else {
            SectionKind::Plain
        }
    }

    /// `(max points, max chars per point)`.
    pub fn caps(self) -> (usize, usize) {
        match self {
            SectionKind::Intro | SectionKind::Plain => (5, 95),
            SectionKind::Highlight => (4, 90),
            SectionKind::Summary => (6, 90),
            SectionKind::Checklist => (7, 90),
        }
    }
}

/// Raw material of a point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceLine {
    /// A list item without its marker, kept whole.
    Item(String),
    /// Prose; only its first complete sentence is kept.
    Text(String),
    /// A line under [`MIN_LINE_CHARS`] as written. Yields no point but keeps
    /// its section.
    Fragment,
}

/// Shortest line, marker included, that can become a point.
pub const MIN_LINE_CHARS: usize = 4;

/// List markers recognised on slides on top of the body bullet glyphs.
const SLIDE_BULLET_GLYPHS: [char; 4] = ['☑', '✔', '▷', '※'];

impl SourceLine {
    fn written(line: &str, point: SourceLine) -> SourceLine {
        if line.chars().count() < MIN_LINE_CHARS {
            SourceLine::Fragment
        } else {
            point
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    pub title: Option<String>,
    pub kind: SectionKind,
    pub lines: Vec<SourceLine>,
}

impl Section {
    fn new(title: Option<String>, kind: SectionKind) -> Self {
        Self {
            title,
            kind,
            lines: Vec::new(),
        }
    }

    /// The trimmed, capped bullet points of this section.
    pub fn points(&self) -> Vec<String> {
        let (max_points, max_chars) = self.kind.caps();
        extract_points(&self.lines, max_points, max_chars)
    }
}

fn is_tip_label(label: &str) -> bool {
    label.contains("핵심") || label.contains("팁") || label.contains("포인트")
}

/// `"N. text"` → `"text"`.
fn strip_ordinal(text: &str) -> &str {
    let digits = text.len() - text.trim_start_matches(|c: char| c.is_ascii_digit()).len();
    if digits > 0 {
        if let Some(rest) = text[digits..].strip_prefix(". ") {
            return rest.trim_start();
        }
    }
    text
}

/// `☑ text` and the like: slide-only markers the body tokenizer leaves as prose.
fn slide_glyph_item(text: &str) -> Option<&str> {
    let mut chars = text.chars();
    if !SLIDE_BULLET_GLYPHS.contains(&chars.next()?) {
        return None;
    }
    let rest = chars.as_str();
    if !rest.starts_with(char::is_whitespace) {
        return None;
    }
    Some(rest.trim_start()).filter(|t| !t.is_empty())
}

/// Group a chapter body into slide sections. Sections without any source
/// line are dropped.
pub fn group_sections(content: &str) -> Vec<Section> {
    let mut sections = Vec::new();
    let mut current = Section::new(None, SectionKind::Intro);

    for raw in content.lines() {
        let line = raw.trim();
        match tokenize_line(line) {
            ContentBlock::Heading(title) => {
                let kind = SectionKind::for_heading(&title);
                let done = std::mem::replace(&mut current, Section::new(Some(title), kind));
                if !done.lines.is_empty() {
                    sections.push(done);
                }
            }
            ContentBlock::HighlightLabel { label, rest } if is_tip_label(&label) => {
                let mut next = Section::new(Some(label), SectionKind::Highlight);
                if let Some(rest) = rest {
                    let point = SourceLine::written(&rest, SourceLine::Text(rest.clone()));
                    next.lines.push(point);
                }
                let done = std::mem::replace(&mut current, next);
                if !done.lines.is_empty() {
                    sections.push(done);
                }
            }
            ContentBlock::HighlightLabel { .. } => {
                let point = SourceLine::Text(line.to_string());
                current.lines.push(SourceLine::written(line, point));
            }
            ContentBlock::Bullet(text) => {
                let point = SourceLine::Item(strip_ordinal(&text).to_string());
                current.lines.push(SourceLine::written(line, point));
            }
            ContentBlock::Paragraph(text) => {
                let point = match slide_glyph_item(&text) {
                    Some(item) => SourceLine::Item(item.to_string()),
                    None => SourceLine::Text(text),
                };
                current.lines.push(SourceLine::written(line, point));
            }
            ContentBlock::Blank => {}
        }
    }
    if !current.lines.is_empty() {
        sections.push(current);
    }
    sections
}

// ============================================================================
// Point extraction
// ============================================================================

fn rfind_chars(hay: &[char], needle: &[char]) -> Option<usize> {
    if needle.len() > hay.len() {
        return None;
    }
    (0..=hay.len() - needle.len())
        .rev()
        .find(|&i| hay[i..i + needle.len()] == *needle)
}

/// Cut `text` to about `max_chars` characters at a natural boundary.
///
/// Prefers the end of a Korean sentence ending within `max_chars + 10`,
/// then the last space in the second half, then a hard cut.
pub fn natural_trim(text: &str, max_chars: usize) -> String {
    let chars: Vec<char> = text.chars().collect();
    if chars.len() <= max_chars {
        return text.to_string();
    }
    let chunk = &chars[..chars.len().min(max_chars + 10)];
    let mut best = 0;
    for ending in ENDINGS {
        let ending: Vec<char> = ending.chars().collect();
        if let Some(p) = rfind_chars(chunk, &ending) {
            let end = p + ending.len();
            if p > max_chars / 3 && end <= max_chars + 10 && end > best {
                best = end;
            }
        }
    }
    if best > max_chars / 3 {
        return chars[..best].iter().collect();
    }
    if let Some(p) = chars[..max_chars].iter().rposition(|c| *c == ' ') {
        if p > max_chars / 2 {
            return chars[..p].iter().collect();
        }
    }
    chars[..max_chars].iter().collect()
}

/// First piece of `line` of at least six characters, splitting after
/// `. ! ? 。` followed by whitespace.
fn first_sentence(line: &str) -> Option<&str> {
    let long_enough = |s: &str| s.chars().count() >= 6;
    let mut start = 0;
    let mut after_terminal = false;
    for (i, c) in line.char_indices() {
        if c.is_whitespace() && after_terminal {
            let piece = line[start..i].trim();
            if long_enough(piece) {
                return Some(piece);
            }
            start = i;
        }
        after_terminal = matches!(c, '.' | '!' | '?' | '。');
    }
    Some(line[start..].trim()).filter(|p| long_enough(p))
}

/// Bullet points from a section's source lines, capped in count and length.
/// Never empty.
pub fn extract_points(lines: &[SourceLine], max_points: usize, max_chars: usize) -> Vec<String> {
    let mut points = Vec::new();
    for line in lines {
        if points.len() >= max_points {
            break;
        }
        match line {
            SourceLine::Item(text) => {
                let text = text.trim();
                if !text.is_empty() {
                    points.push(natural_trim(text, max_chars));
                }
            }
            SourceLine::Text(text) => {
                let text = text.trim();
                if text.chars().count() < 8 {
                    continue;
                }
                if let Some(sentence) = first_sentence(text) {
                    points.push(natural_trim(sentence, max_chars));
                }
            }
            SourceLine::Fragment => {}
        }
    }
    if points.is_empty() {
        points.push(PLACEHOLDER_POINT.to_string());
    }
    points
}

fn truncate_chars(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}

// ============================================================================
// Slide model
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Align {
    Left,
    Center,
    Right,
}

impl Align {
    fn attr(self) -> &'static str {
        match self {
            Align::Left => "l",
            Align::Center => "ctr",
            Align::Right => "r",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TextBox {
    pub x: f64,
    pub y: f64,
    pub w: f64,
    pub h: f64,
    pub text: String,
    pub size: f32,
    pub bold: bool,
    pub italic: bool,
    pub color: String,
    pub align: Align,
}

/// One drawable, inches from the slide's top-left corner.
#[derive(Debug, Clone, PartialEq)]
pub enum Shape {
    Rect {
        x: f64,
        y: f64,
        w: f64,
        h: f64,
        fill: String,
    },
    Text(TextBox),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Slide {
    pub background: String,
    pub shapes: Vec<Shape>,
}

impl Slide {
    fn new(background: &str) -> Self {
        Self {
            background: background.to_string(),
            shapes: Vec::new(),
        }
    }

    fn rect(&mut self, x: f64, y: f64, w: f64, h: f64, fill: &str) {
        self.shapes.push(Shape::Rect {
            x,
            y,
            w,
            h,
            fill: fill.to_string(),
        });
    }

    fn add(&mut self, text: TextBox) {
        self.shapes.push(Shape::Text(text));
    }

    /// Every text run, in paint order.
    pub fn texts(&self) -> impl Iterator<Item = &str> {
        self.shapes.iter().filter_map(|s| match s {
            Shape::Text(tb) => Some(tb.text.as_str()),
            Shape::Rect { .. } => None,
        })
    }
}

impl TextBox {
    /// Left-aligned regular text.
    fn new(text: &str, x: f64, y: f64, w: f64, h: f64, size: f32, color: &str) -> Self {
        Self {
            x,
            y,
            w,
            h,
            text: text.to_string(),
            size,
            bold: false,
            italic: false,
            color: color.to_string(),
            align: Align::Left,
        }
    }

    fn bold(mut self) -> Self {
        self.bold = true;
        self
    }

    fn italic(mut self) -> Self {
        self.italic = true;
        self
    }

    fn align(mut self, align: Align) -> Self {
        self.align = align;
        self
    }
}

/// A built deck, slide 1 first.
#[derive(Debug, Clone, PartialEq)]
pub struct SlideDeck {
    pub title: String,
    pub slides: Vec<Slide>,
}

// ============================================================================
// Slide index
// ============================================================================

/// Contents rows split over one or two slides, first half first.
fn toc_chunks(entries: &[TocEntry]) -> Vec<&[TocEntry]> {
    let half = entries.len().div_ceil(2);
    let (first, second) = entries.split_at(half);
    [first, second].into_iter().filter(|c| !c.is_empty()).collect()
}

/// Chapter → first slide (its intro slide), 1-based.
pub fn chapter_slide_index(doc: &EbookDocument) -> ChapterPageIndex {
    let entries = toc_entries(doc, None);
    let mut slide = 1 + toc_chunks(&entries).len();
    if doc.prologue_text().is_some() {
        slide += 1;
    }
    let mut index = ChapterPageIndex::new();
    for (i, content) in doc.chapters_content.iter().enumerate() {
        index.record(doc.chapter_number(i), slide + 1);
        slide += 1 + group_sections(&content.content).len();
    }
    index
}

// ============================================================================
// Slide builders
// ============================================================================

fn cover_slide(title: &str, subtitle: Option<&str>, chapters: usize) -> Slide {
    let (w, h) = (SLIDE_W, SLIDE_H);
    let mut s = Slide::new("#0d1b2a");
    s.rect(0.0, 0.0, 0.28, h, "#4361ee");
    s.rect(0.28, 0.55, w - 0.28, 0.04, "#4361ee");
    s.rect(0.28, h - 0.6, w - 0.28, 0.04, "#4361ee");
    s.add(TextBox::new(title, 0.65, 1.45, w - 1.05, 2.9, 38.0, "#ffffff").bold());
    if let Some(subtitle) = subtitle {
        s.add(TextBox::new(subtitle, 0.65, 4.55, w - 1.05, 1.0, 18.0, "#7a9cc0"));
    }
    s.rect(0.65, 5.85, 3.8, 0.58, "#1e3356");
    s.rect(0.65, 5.85, 0.08, 0.58, "#4361ee");
    s.add(TextBox::new(
        &format!("  총 {chapters}개 챕터  ·  실전 완전 가이드"),
        0.67,
        5.9,
        3.75,
        0.48,
        13.0,
        "#90b8d8",
    ));
    s
}

fn toc_slide(rows: &[TocEntry], continued: bool) -> Slide {
    let (w, h) = (SLIDE_W, SLIDE_H);
    let mut s = Slide::new("#f4f6fb");
    s.rect(0.0, 0.0, w, 1.05, "#0d1b2a");
    let heading = if continued {
        format!("{TOC_TITLE} (계속)")
    } else {
        TOC_TITLE.to_string()
    };
    s.add(TextBox::new(&heading, MX, 0.18, 5.0, 0.7, 26.0, "#ffffff").bold());
    s.add(TextBox::new("Contents", w - 2.6, 0.28, 2.3, 0.55, 13.0, "#667799")
        .align(Align::Right));

    let row_h = ((h - 1.3) / rows.len().max(1) as f64).min(0.73);
    let mut y = 1.15;
    for (j, entry) in rows.iter().enumerate() {
        let color = phase_color(entry.phase.as_ref());
        let stripe = if j % 2 == 0 { "#eaeef5" } else { "#f4f6fb" };
        s.rect(MX - 0.05, y - 0.03, w - MX * 2.0 + 0.1, row_h, stripe);
        s.rect(MX - 0.05, y - 0.03, 0.55, row_h, color);
        s.add(TextBox::new(&entry.number.to_string(), MX - 0.05, y + 0.06, 0.55, row_h - 0.12, 13.0, "#ffffff")
            .bold()
            .align(Align::Center));
        s.add(TextBox::new(
            &truncate_chars(&entry.title, 60),
            MX + 0.6,
            y,
            w - MX * 2.0 - 2.4,
            row_h,
            15.0,
            "#1a1a2e",
        ));
        let tag_y = y + (row_h - 0.38) / 2.0;
        if let Some(phase) = &entry.phase {
            s.rect(w - MX - 1.8, tag_y, 1.05, 0.38, "#dde3ef");
            s.add(TextBox::new(phase.label(), w - MX - 1.8, tag_y, 1.05, 0.38, 10.0, color)
                .bold()
                .align(Align::Center));
        }
        if let Some(page) = entry.page {
            s.add(TextBox::new(&page.to_string(), w - MX - 0.6, tag_y, 0.55, 0.38, 12.0, "#667799")
                .bold()
                .align(Align::Center));
        }
        y += row_h + 0.03;
    }
    s
}

fn text_slide(heading: &str, body: &str, background: &str) -> Slide {
    const MAX_CHARS: usize = 400;
    let (w, h) = (SLIDE_W, SLIDE_H);
    let mut s = Slide::new(background);
    s.rect(0.0, 0.0, w, HEADER_H, DEFAULT_ACCENT);
    s.add(TextBox::new(heading, MX, 0.24, w - MX * 2.0, 0.72, 26.0, "#ffffff").bold());
    let joined = body
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join(" ");
    let mut preview = truncate_chars(&joined, MAX_CHARS);
    if joined.chars().count() > MAX_CHARS {
        preview.push('…');
    }
    s.add(TextBox::new(&preview, MX, CONTENT_TOP, w - MX * 2.0, h - CONTENT_TOP - 0.3, 15.0, "#cccccc"));
    s
}

fn chapter_intro_slide(meta: &ChapterMeta, number: u32) -> Slide {
    let (w, h) = (SLIDE_W, SLIDE_H);
    let color = phase_color(meta.phase.as_ref());
    let mut s = Slide::new(phase_background(meta.phase.as_ref()));
    s.rect(0.0, 0.0, 0.22, h, color);

    let phase = meta.phase.as_ref().map(|p| p.label()).unwrap_or_default();
    let badge = format!("  {phase}  ·  Chapter {number:02}");
    let badge_w = (badge.chars().count() as f64 * 0.18).max(3.0);
    s.rect(0.45, 0.42, badge_w, 0.6, color);
    s.add(TextBox::new(&badge, 0.47, 0.44, badge_w - 0.04, 0.56, 14.0, "#ffffff").bold());

    s.add(TextBox::new(&meta.title, 0.45, 1.3, w - 0.85, 2.6, 32.0, "#1a1a2e").bold());
    s.rect(0.45, 4.1, w - 0.7, 0.04, color);

    let before = non_blank(meta.before_state.as_deref());
    let after = non_blank(meta.after_state.as_deref());
    match (before, after) {
        (Some(before), Some(after)) => {
            s.rect(0.45, 4.28, 6.0, 0.72, "#eeeeee");
            s.rect(0.45, 4.28, 0.08, 0.72, "#e74c3c");
            s.add(TextBox::new(BEFORE_LABEL, 0.65, 4.3, 1.5, 0.32, 10.0, "#e74c3c").bold());
            s.add(TextBox::new(&truncate_chars(before, 60), 0.65, 4.56, 5.65, 0.4, 12.0, "#555555"));
            s.rect(0.45, 5.12, 6.0, 0.72, "#eaf7ef");
            s.rect(0.45, 5.12, 0.08, 0.72, color);
            s.add(TextBox::new(AFTER_LABEL, 0.65, 5.14, 1.8, 0.32, 10.0, color).bold());
            s.add(TextBox::new(&truncate_chars(after, 60), 0.65, 5.4, 5.65, 0.4, 12.0, "#1a1a2e")
                .bold());
        }
        (Some(before), None) => {
            s.rect(0.45, 4.28, 8.0, 0.68, "#eeeeee");
            s.add(TextBox::new(
                &format!("Before → {}", truncate_chars(before, 70)),
                0.65,
                4.32,
                7.8,
                0.6,
                12.0,
                "#555555",
            ));
        }
        (None, Some(after)) => {
            s.rect(0.45, 4.28, 8.0, 0.68, "#eaf7ef");
            s.add(TextBox::new(
                &format!("After → {}", truncate_chars(after, 70)),
                0.65,
                4.32,
                7.8,
                0.6,
                12.0,
                "#1a1a2e",
            )
            .bold());
        }
        (None, None) => {}
    }

    if let Some(purpose) = non_blank(meta.purpose.as_deref()) {
        s.add(TextBox::new(
            &format!("✦  {}", truncate_chars(purpose, 85)),
            0.45,
            6.1,
            w - 0.7,
            0.85,
            13.0,
            "#666666",
        )
        .italic());
    }
    s
}

/// Font size of a plain section slide, from its point count and length.
fn section_font_size(points: &[String]) -> f32 {
    let total: usize = points.iter().map(|p| p.chars().count()).sum();
    match points.len() {
        0..=2 => 22.0,
        3 if total < 180 => 20.0,
        3 => 18.0,
        4 if total < 240 => 18.0,
        4 => 16.0,
        _ => 15.0,
    }
}

fn plain_slide(title: &str, points: &[String], chapter_label: &str, color: &str) -> Slide {
    let (w, h) = (SLIDE_W, SLIDE_H);
    let mut s = Slide::new("#ffffff");
    s.rect(0.0, 0.0, w, HEADER_H, color);
    s.add(TextBox::new(chapter_label, MX, 0.1, w - MX - 0.5, 0.36, 10.0, "#eeeeee"));
    s.add(TextBox::new(title, MX, 0.42, w - MX - 0.4, 0.7, 22.0, "#ffffff").bold());

    let size = section_font_size(points);
    let item_h = (h - HEADER_H - 0.25) / points.len().max(1) as f64;
    let mut y = CONTENT_TOP;
    for point in points {
        let mid = y + item_h * 0.5 - 0.06;
        let accent_h = (item_h * 0.6).min(0.55);
        s.rect(MX, mid - accent_h / 2.0, 0.07, accent_h, color);
        s.add(TextBox::new(point, MX + 0.22, y, w - MX - 0.55, item_h, size, "#1a1a2e"));
        y += item_h;
    }
    s
}

fn highlight_slide(label: &str, points: &[String], color: &str) -> Slide {
    let (w, h) = (SLIDE_W, SLIDE_H);
    let mut s = Slide::new("#f8f9ff");
    s.rect(0.0, 0.0, w, HEADER_H, color);
    s.add(TextBox::new(&format!("★  {label}"), MX, 0.26, w - MX * 2.0, 0.75, 24.0, "#ffffff")
        .bold());
    s.rect(MX, HEADER_H + 0.15, w - MX * 2.0, 0.04, color);

    let n = points.len();
    let item_h = (h - HEADER_H - 0.45) / n.max(1) as f64;
    let size = match n {
        0..=2 => 20.0,
        3 => 18.0,
        _ => 16.0,
    };
    let badge = 0.44;
    let mut y = HEADER_H + 0.3;
    for (i, point) in points.iter().enumerate() {
        let badge_y = y + (item_h - badge) / 2.0;
        s.rect(MX, badge_y, badge, badge, color);
        s.add(TextBox::new(&(i + 1).to_string(), MX, badge_y, badge, badge, 14.0, "#ffffff")
            .bold()
            .align(Align::Center));
        s.add(TextBox::new(point, MX + 0.58, y, w - MX * 2.0 - 0.58, item_h, size, "#1a1a2e"));
        y += item_h;
    }
    s
}

fn summary_slide(title: &str, points: &[String], color: &str) -> Slide {
    let (w, h) = (SLIDE_W, SLIDE_H);
    let mut s = Slide::new("#0d1b2a");
    s.rect(0.0, 0.0, w, HEADER_H, color);
    s.add(TextBox::new(&format!("핵심 정리  ·  {title}"), MX, 0.24, w - MX * 2.0, 0.72, 22.0, "#ffffff")
        .bold());

    let points = &points[..points.len().min(6)];
    let n = points.len().max(1);
    let cols = if n >= 4 { 3 } else { n };
    let rows = n.div_ceil(cols);
    let pad = 0.12;
    let card_w = (w - MX * 2.0 - pad * (cols - 1) as f64) / cols as f64;
    let card_h = (h - HEADER_H - 0.3 - pad * (rows - 1) as f64) / rows as f64;
    for (idx, point) in points.iter().enumerate() {
        let (row, col) = (idx / cols, idx % cols);
        let cx = MX + col as f64 * (card_w + pad);
        let cy = HEADER_H + 0.18 + row as f64 * (card_h + pad);
        s.rect(cx, cy, card_w, card_h, "#1a2d40");
        s.rect(cx, cy, 0.08, card_h, color);
        s.add(TextBox::new(&(idx + 1).to_string(), cx + 0.14, cy + 0.06, 0.38, 0.38, 13.0, color)
            .bold());
        s.add(TextBox::new(
            &natural_trim(point, 85),
            cx + 0.14,
            cy + 0.44,
            card_w - 0.22,
            card_h - 0.52,
            12.0,
            "#b8d0e8",
        ));
    }
    s
}

fn checklist_slide(title: &str, items: &[String], color: &str) -> Slide {
    let (w, h) = (SLIDE_W, SLIDE_H);
    let mut s = Slide::new("#f0fff8");
    s.rect(0.0, 0.0, w, HEADER_H, color);
    s.add(TextBox::new(
        &format!("실행 체크리스트  ·  {title}"),
        MX,
        0.24,
        w - MX * 2.0,
        0.72,
        21.0,
        "#ffffff",
    )
    .bold());

    let items = &items[..items.len().min(7)];
    let n = items.len();
    let item_h = (h - HEADER_H - 0.25) / n.max(1) as f64;
    let size = match n {
        0..=4 => 18.0,
        5 | 6 => 15.0,
        _ => 13.0,
    };
    let mut y = CONTENT_TOP;
    for (idx, item) in items.iter().enumerate() {
        let stripe = if idx % 2 == 0 { "#e3f5ec" } else { "#f0fff8" };
        s.rect(MX - 0.05, y + 0.03, w - MX * 2.0 + 0.1, item_h - 0.06, stripe);
        let badge_h = (item_h - 0.12).min(0.55);
        let badge_y = y + (item_h - badge_h) / 2.0;
        s.rect(MX - 0.05, badge_y, 0.52, badge_h, color);
        s.add(TextBox::new(&(idx + 1).to_string(), MX - 0.05, badge_y, 0.52, badge_h, 14.0, "#ffffff")
            .bold()
            .align(Align::Center));
        s.add(TextBox::new(
            &truncate_chars(item, 90),
            MX + 0.58,
            y,
            w - MX * 2.0 - 0.58,
            item_h,
            size,
            "#0a3a1a",
        ));
        y += item_h;
    }
    s
}

fn number_slide(slide: &mut Slide, number: usize) {
    let label = number.to_string();
    slide.add(
        TextBox::new(
            &label,
            SLIDE_W - 0.7,
            SLIDE_H - 0.35,
            0.55,
            0.28,
            10.0,
            "#aaaaaa",
        )
        .align(Align::Center),
    );
}

/// Build every slide of `doc`. Slides after the cover carry their number.
pub fn build_deck(doc: &EbookDocument) -> SlideDeck {
    let index = chapter_slide_index(doc);
    let entries = toc_entries(doc, Some(&index));
    let mut slides = Vec::new();

    slides.push(cover_slide(
        doc.title(),
        non_blank(Some(doc.book_info.subtitle.as_str())),
        entries.len(),
    ));
    for (i, chunk) in toc_chunks(&entries).into_iter().enumerate() {
        slides.push(toc_slide(chunk, i > 0));
    }
    if let Some(prologue) = doc.prologue_text() {
        slides.push(text_slide(PROLOGUE_TITLE, prologue, "#1a1a2e"));
    }

    for (i, content) in doc.chapters_content.iter().enumerate() {
        let Some(meta) = doc.chapter_meta(i) else {
            continue;
        };
        let number = doc.chapter_number(i);
        let color = phase_color(meta.phase.as_ref());
        let chapter_label = format!("CH.{number:02}  {}", truncate_chars(&meta.title, 45));
        slides.push(chapter_intro_slide(meta, number));

        for section in group_sections(&content.content) {
            let title = section.title.as_deref().unwrap_or(&meta.title);
            let points = section.points();
            slides.push(match section.kind {
                SectionKind::Highlight => highlight_slide(title, &points, color),
                SectionKind::Summary => summary_slide(title, &points, color),
                SectionKind::Checklist => checklist_slide(title, &points, color),
                SectionKind::Intro | SectionKind::Plain => {
                    plain_slide(title, &points, &chapter_label, color)
                }
            });
        }
    }

    if let Some(epilogue) = doc.epilogue_text() {
        slides.push(text_slide(EPILOGUE_TITLE, epilogue, "#0a0a1a"));
    }

    for (i, slide) in slides.iter_mut().enumerate().skip(1) {
        number_slide(slide, i + 1);
    }
    SlideDeck {
        title: doc.title().to_string(),
        slides,
    }
}

// ============================================================================
// PresentationML
// ============================================================================

fn emu(inches: f64) -> i64 {
    inch_to_emu(inches)
}

fn xfrm(x: f64, y: f64, w: f64, h: f64) -> String {
    format!(
        "<a:xfrm><a:off x=\"{}\" y=\"{}\"/><a:ext cx=\"{}\" cy=\"{}\"/></a:xfrm>",
        emu(x),
        emu(y),
        emu(w.max(0.0)),
        emu(h.max(0.0))
    )
}

fn solid_fill(hex: &str) -> String {
    let rgb: String = hex_rgb(hex).chars().take(6).collect();
    format!("<a:solidFill><a:srgbClr val=\"{rgb}\"/></a:solidFill>")
}

fn shape_xml(id: usize, shape: &Shape, font: &str) -> String {
    match shape {
        Shape::Rect { x, y, w, h, fill } => format!(
            "<p:sp><p:nvSpPr><p:cNvPr id=\"{id}\" name=\"Rectangle {id}\"/><p:cNvSpPr/><p:nvPr/></p:nvSpPr>\
             <p:spPr>{}<a:prstGeom prst=\"rect\"><a:avLst/></a:prstGeom>{}<a:ln><a:noFill/></a:ln></p:spPr></p:sp>",
            xfrm(*x, *y, *w, *h),
            solid_fill(fill)
        ),
        Shape::Text(tb) => {
            let font = escape_xml(font);
            let rpr = format!(
                "<a:rPr lang=\"ko-KR\" sz=\"{}\" b=\"{}\" i=\"{}\" dirty=\"0\">{}\
                 <a:latin typeface=\"{font}\"/><a:ea typeface=\"{font}\"/></a:rPr>",
                (tb.size * 100.0).round() as i64,
                u8::from(tb.bold),
                u8::from(tb.italic),
                solid_fill(&tb.color)
            );
            let paragraphs: String = tb
                .text
                .split('\n')
                .map(|line| {
                    format!(
                        "<a:p><a:pPr algn=\"{}\"/><a:r>{rpr}<a:t>{}</a:t></a:r></a:p>",
                        tb.align.attr(),
                        escape_xml(line)
                    )
                })
                .collect();
            format!(
                "<p:sp><p:nvSpPr><p:cNvPr id=\"{id}\" name=\"TextBox {id}\"/><p:cNvSpPr txBox=\"1\"/><p:nvPr/></p:nvSpPr>\
                 <p:spPr>{}<a:prstGeom prst=\"rect\"><a:avLst/></a:prstGeom><a:noFill/></p:spPr>\
                 <p:txBody><a:bodyPr wrap=\"square\" rtlCol=\"0\"/><a:lstStyle/>{paragraphs}</p:txBody></p:sp>",
                xfrm(tb.x, tb.y, tb.w, tb.h)
            )
        }
    }
}

fn slide_xml(slide: &Slide, font: &str) -> String {
    let shapes: String = slide
        .shapes
        .iter()
        .enumerate()
        .map(|(i, shape)| shape_xml(i + 2, shape, font))
        .collect();
    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\n\
         <p:sld xmlns:a=\"{A_NS}\" xmlns:r=\"{R_NS}\" xmlns:p=\"{P_NS}\"><p:cSld>\
         <p:bg><p:bgPr>{}<a:effectLst/></p:bgPr></p:bg>\
         <p:spTree><p:nvGrpSpPr><p:cNvPr id=\"1\" name=\"\"/><p:cNvGrpSpPr/><p:nvPr/></p:nvGrpSpPr>\
         <p:grpSpPr/>{shapes}</p:spTree></p:cSld><p:clrMapOvr><a:masterClrMapping/></p:clrMapOvr></p:sld>",
        solid_fill(&slide.background)
    )
}

fn presentation_xml(count: usize) -> String {
    let ids: String = (0..count)
        .map(|i| format!("<p:sldId id=\"{}\" r:id=\"rId{}\"/>", 256 + i, i + 3))
        .collect();
    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\n\
         <p:presentation xmlns:a=\"{A_NS}\" xmlns:r=\"{R_NS}\" xmlns:p=\"{P_NS}\" saveSubsetFonts=\"1\">\
         <p:sldMasterIdLst><p:sldMasterId id=\"2147483648\" r:id=\"rId1\"/></p:sldMasterIdLst>\
         <p:sldIdLst>{ids}</p:sldIdLst>\
         <p:sldSz cx=\"{}\" cy=\"{}\"/><p:notesSz cx=\"6858000\" cy=\"9144000\"/></p:presentation>",
        emu(SLIDE_W),
        emu(SLIDE_H)
    )
}

fn presentation_rels(count: usize) -> String {
    let slides: String = (0..count)
        .map(|i| {
            format!(
                "<Relationship Id=\"rId{}\" Type=\"{R_NS}/slide\" Target=\"slides/slide{}.xml\"/>",
                i + 3,
                i + 1
            )
        })
        .collect();
    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\n\
         <Relationships xmlns=\"{PKG_REL_NS}\">\
         <Relationship Id=\"rId1\" Type=\"{R_NS}/slideMaster\" Target=\"slideMasters/slideMaster1.xml\"/>\
         <Relationship Id=\"rId2\" Type=\"{R_NS}/theme\" Target=\"theme/theme1.xml\"/>\
         {slides}</Relationships>"
    )
}

fn content_types(count: usize) -> String {
    let slides: String = (1..=count)
        .map(|n| {
            format!(
                "<Override PartName=\"/ppt/slides/slide{n}.xml\" \
                 ContentType=\"application/vnd.openxmlformats-officedocument.presentationml.slide+xml\"/>"
            )
        })
        .collect();
    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\n\
<Types xmlns=\"http://schemas.openxmlformats.org/package/2006/content-types\">\
<Default Extension=\"rels\" ContentType=\"application/vnd.openxmlformats-package.relationships+xml\"/>\
<Default Extension=\"xml\" ContentType=\"application/xml\"/>\
<Override PartName=\"/ppt/presentation.xml\" ContentType=\"application/vnd.openxmlformats-officedocument.presentationml.presentation.main+xml\"/>\
<Override PartName=\"/ppt/slideMasters/slideMaster1.xml\" ContentType=\"application/vnd.openxmlformats-officedocument.presentationml.slideMaster+xml\"/>\
<Override PartName=\"/ppt/slideLayouts/slideLayout1.xml\" ContentType=\"application/vnd.openxmlformats-officedocument.presentationml.slideLayout+xml\"/>\
<Override PartName=\"/ppt/theme/theme1.xml\" ContentType=\"application/vnd.openxmlformats-officedocument.theme+xml\"/>\
<Override PartName=\"/docProps/core.xml\" ContentType=\"application/vnd.openxmlformats-package.core-properties+xml\"/>\
{slides}</Types>"
    )
}

const PKG_REL_NS: &str = "http://schemas.openxmlformats.org/package/2006/relationships";

const ROOT_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
  <Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="ppt/presentation.xml"/>
  <Relationship Id="rId2" Type="http://schemas.openxmlformats.org/package/2006/relationships/metadata/core-properties" Target="docProps/core.xml"/>
</Relationships>"#;

const SLIDE_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
  <Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/slideLayout" Target="../slideLayouts/slideLayout1.xml"/>
</Relationships>"#;

const LAYOUT_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
  <Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/slideMaster" Target="../slideMasters/slideMaster1.xml"/>
</Relationships>"#;

const MASTER_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
  <Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/slideLayout" Target="../slideLayouts/slideLayout1.xml"/>
  <Relationship Id="rId2" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/theme" Target="../theme/theme1.xml"/>
</Relationships>"#;

const EMPTY_TREE: &str = "<p:spTree><p:nvGrpSpPr><p:cNvPr id=\"1\" name=\"\"/><p:cNvGrpSpPr/><p:nvPr/></p:nvGrpSpPr><p:grpSpPr/></p:spTree>";

fn slide_master_xml() -> String {
    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\n\
         <p:sldMaster xmlns:a=\"{A_NS}\" xmlns:r=\"{R_NS}\" xmlns:p=\"{P_NS}\">\
         <p:cSld>{EMPTY_TREE}</p:cSld>\
         <p:clrMap bg1=\"lt1\" tx1=\"dk1\" bg2=\"lt2\" tx2=\"dk2\" accent1=\"accent1\" accent2=\"accent2\" \
         accent3=\"accent3\" accent4=\"accent4\" accent5=\"accent5\" accent6=\"accent6\" hlink=\"hlink\" folHlink=\"folHlink\"/>\
         <p:sldLayoutIdLst><p:sldLayoutId id=\"2147483649\" r:id=\"rId1\"/></p:sldLayoutIdLst></p:sldMaster>"
    )
}

fn slide_layout_xml() -> String {
    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\n\
         <p:sldLayout xmlns:a=\"{A_NS}\" xmlns:r=\"{R_NS}\" xmlns:p=\"{P_NS}\" type=\"blank\" preserve=\"1\">\
         <p:cSld name=\"Blank\">{EMPTY_TREE}</p:cSld><p:clrMapOvr><a:masterClrMapping/></p:clrMapOvr></p:sldLayout>"
    )
}

fn theme_xml(font: &str) -> String {
    let font = escape_xml(font);
    let color = |name: &str, rgb: &str| format!("<a:{name}><a:srgbClr val=\"{rgb}\"/></a:{name}>");
    let scheme: String = [
        ("dk1", "000000"),
        ("lt1", "FFFFFF"),
        ("dk2", "1A1A2E"),
        ("lt2", "F4F6FB"),
        ("accent1", "6C5CE7"),
        ("accent2", "E74C3C"),
        ("accent3", "F39C12"),
        ("accent4", "03C75A"),
        ("accent5", "3498DB"),
        ("accent6", "4361EE"),
        ("hlink", "4361EE"),
        ("folHlink", "6C5CE7"),
    ]
    .iter()
    .map(|(n, c)| color(n, c))
    .collect();
    let fill = "<a:solidFill><a:schemeClr val=\"phClr\"/></a:solidFill>";
    let line = "<a:ln w=\"9525\"><a:solidFill><a:schemeClr val=\"phClr\"/></a:solidFill></a:ln>";
    let effect = "<a:effectStyle><a:effectLst/></a:effectStyle>";
    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\n\
         <a:theme xmlns:a=\"{A_NS}\" name=\"Ebook\"><a:themeElements>\
         <a:clrScheme name=\"Ebook\">{scheme}</a:clrScheme>\
         <a:fontScheme name=\"Ebook\">\
         <a:majorFont><a:latin typeface=\"{font}\"/><a:ea typeface=\"{font}\"/><a:cs typeface=\"\"/></a:majorFont>\
         <a:minorFont><a:latin typeface=\"{font}\"/><a:ea typeface=\"{font}\"/><a:cs typeface=\"\"/></a:minorFont>\
         </a:fontScheme>\
         <a:fmtScheme name=\"Ebook\">\
         <a:fillStyleLst>{fill}{fill}{fill}</a:fillStyleLst>\
         <a:lnStyleLst>{line}{line}{line}</a:lnStyleLst>\
         <a:effectStyleLst>{effect}{effect}{effect}</a:effectStyleLst>\
         <a:bgFillStyleLst>{fill}{fill}{fill}</a:bgFillStyleLst>\
         </a:fmtScheme></a:themeElements></a:theme>"
    )
}

fn core_xml(doc: &EbookDocument) -> String {
    let ts = timestamp();
    let creator = non_blank(doc.book_info.author.as_deref()).unwrap_or("ebook-forge");
    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\n\
         <cp:coreProperties xmlns:cp=\"http://schemas.openxmlformats.org/package/2006/metadata/core-properties\" \
         xmlns:dc=\"http://purl.org/dc/elements/1.1/\" xmlns:dcterms=\"http://purl.org/dc/terms/\" \
         xmlns:xsi=\"http://www.w3.org/2001/XMLSchema-instance\">\
         <dc:title>{}</dc:title><dc:creator>{}</dc:creator>\
         <dcterms:created xsi:type=\"dcterms:W3CDTF\">{ts}</dcterms:created>\
         <dcterms:modified xsi:type=\"dcterms:W3CDTF\">{ts}</dcterms:modified>\
         </cp:coreProperties>",
        escape_xml(doc.title()),
        escape_xml(creator),
    )
}

impl SlideDeck {
    /// Package parts of the deck.
    pub fn to_parts(&self, doc: &EbookDocument, font: &str) -> Vec<Part> {
        let count = self.slides.len();
        let mut parts = vec![
            Part::xml("[Content_Types].xml", content_types(count)),
            Part::xml("_rels/.rels", ROOT_RELS.to_string()),
            Part::xml("ppt/presentation.xml", presentation_xml(count)),
            Part::xml("ppt/_rels/presentation.xml.rels", presentation_rels(count)),
            Part::xml("ppt/slideMasters/slideMaster1.xml", slide_master_xml()),
            Part::xml(
                "ppt/slideMasters/_rels/slideMaster1.xml.rels",
                MASTER_RELS.to_string(),
            ),
            Part::xml("ppt/slideLayouts/slideLayout1.xml", slide_layout_xml()),
            Part::xml(
                "ppt/slideLayouts/_rels/slideLayout1.xml.rels",
                LAYOUT_RELS.to_string(),
            ),
            Part::xml("ppt/theme/theme1.xml", theme_xml(font)),
            Part::xml("docProps/core.xml", core_xml(doc)),
        ];
        for (i, slide) in self.slides.iter().enumerate() {
            let n = i + 1;
            parts.push(Part::xml(format!("ppt/slides/slide{n}.xml"), slide_xml(slide, font)));
            parts.push(Part::xml(
                format!("ppt/slides/_rels/slide{n}.xml.rels"),
                SLIDE_RELS.to_string(),
            ));
        }
        parts
    }
}

/// Build and package `doc` as PPTX bytes.
pub fn render_pptx(doc: &EbookDocument, constants: &LayoutConstants) -> Result<Vec<u8>> {
    constants.validate()?;
    let deck = build_deck(doc);
    log::debug!("{} slides for {:?}", deck.slides.len(), deck.title);
    let parts = deck.to_parts(doc, &constants.font_family);
    Ok(write_zip(None, &parts)?)
}
