//! Word-processor engine – WordprocessingML (`.docx`).
//!
//! Word paginates the document itself, so this engine does not place
//! anything. It drives an embedded [`PageEstimator`] through the same walk as
//! [`build_chapter_page_index`] to know where forced breaks close a page, and
//! writes one `<w:p>` per primitive. The table of contents uses live
//! `PAGEREF` fields pointing at bookmarks on the chapter titles; the cached
//! field values are the estimator's numbers, which Word replaces on open
//! because `settings.xml` asks it to update fields.

use crate::config::LayoutConstants;
use crate::error::Result;
use crate::layout::{
    compose, hex_rgb, phase_color, ChapterStart, ComposeOptions, Renderer, TocEntry, AFTER_LABEL,
    BEFORE_LABEL, DEFAULT_ACCENT,
};
use crate::model::{non_blank, EbookDocument};
use crate::package::{escape_xml, timestamp, write_zip, Format, Part};
use crate::pagination::{
    build_chapter_page_index, BlockMetrics, ChapterPageIndex, PageEstimator,
};
use crate::units::pt_to_twip;

const W_NS: &str = "http://schemas.openxmlformats.org/wordprocessingml/2006/main";
const R_NS: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";

/// Bookmark ids start here so they never collide with ids Word assigns.
const BOOKMARK_ID_BASE: usize = 100;

/// Bookmark name of the chapter at `index` in `chapters_content`.
///
/// Keyed by position: display numbers may repeat or be arbitrarily large.
pub fn bookmark_name(index: usize) -> String {
    format!("_Toc_ch{index}")
}

fn bookmark_id(index: usize) -> usize {
    BOOKMARK_ID_BASE.saturating_add(index)
}

#[derive(Debug, Clone, Copy, Default)]
struct RunProps<'a> {
    size: Option<f32>,
    color: Option<&'a str>,
    bold: bool,
}

impl<'a> RunProps<'a> {
    fn sized(size: f32) -> Self {
        Self {
            size: Some(size),
            ..Self::default()
        }
    }

    fn color(mut self, color: &'a str) -> Self {
        self.color = Some(color);
        self
    }

    fn bold(mut self) -> Self {
        self.bold = true;
        self
    }
}

fn half_points(size: f32) -> i64 {
    (size * 2.0).round() as i64
}

/// One `<w:r>`; embedded newlines become `<w:br/>`.
fn run(text: &str, props: RunProps<'_>) -> String {
    let mut rpr = String::new();
    if props.bold {
        rpr.push_str("<w:b/>");
    }
    if let Some(color) = props.color {
        rpr.push_str(&format!("<w:color w:val=\"{}\"/>", hex_rgb(color)));
    }
    if let Some(size) = props.size {
        let hp = half_points(size);
        rpr.push_str(&format!("<w:sz w:val=\"{hp}\"/><w:szCs w:val=\"{hp}\"/>"));
    }

    let mut out = String::from("<w:r>");
    if !rpr.is_empty() {
        out.push_str("<w:rPr>");
        out.push_str(&rpr);
        out.push_str("</w:rPr>");
    }
    for (i, line) in text.split('\n').enumerate() {
        if i > 0 {
            out.push_str("<w:br/>");
        }
        out.push_str(&format!(
            "<w:t xml:space=\"preserve\">{}</w:t>",
            escape_xml(line)
        ));
    }
    out.push_str("</w:r>");
    out
}

/// `begin … separate cached end` field runs.
fn field(instruction: &str, cached: &str, props: RunProps<'_>) -> String {
    format!(
        "<w:r><w:fldChar w:fldCharType=\"begin\"/></w:r>\
         <w:r><w:instrText xml:space=\"preserve\"> {} </w:instrText></w:r>\
         <w:r><w:fldChar w:fldCharType=\"separate\"/></w:r>\
         {}\
         <w:r><w:fldChar w:fldCharType=\"end\"/></w:r>",
        escape_xml(instruction),
        run(cached, props)
    )
}

/// Builds `word/document.xml` from the shared walk.
pub struct DocxEngine<'a> {
    constants: &'a LayoutConstants,
    estimator: PageEstimator,
    body: String,
    break_pending: bool,
    bookmark: Option<usize>,
}

impl<'a> DocxEngine<'a> {
    pub fn new(constants: &'a LayoutConstants) -> Self {
        Self {
            constants,
            estimator: PageEstimator::new(BlockMetrics::for_format(Format::Docx, constants)),
            body: String::new(),
            break_pending: false,
            bookmark: None,
        }
    }

    /// Chapter pages seen by the embedded estimator.
    pub fn chapter_pages(&self) -> &ChapterPageIndex {
        self.estimator.index()
    }

    fn metrics(&self) -> &BlockMetrics {
        self.estimator.metrics()
    }

    fn paragraph(&mut self, style: Option<&str>, jc: Option<&str>, runs: &str) {
        let mut ppr = String::new();
        if let Some(style) = style {
            ppr.push_str(&format!("<w:pStyle w:val=\"{style}\"/>"));
        }
        if std::mem::take(&mut self.break_pending) {
            ppr.push_str("<w:pageBreakBefore/>");
        }
        if let Some(jc) = jc {
            ppr.push_str(&format!("<w:jc w:val=\"{jc}\"/>"));
        }

        self.body.push_str("<w:p>");
        if !ppr.is_empty() {
            self.body.push_str("<w:pPr>");
            self.body.push_str(&ppr);
            self.body.push_str("</w:pPr>");
        }
        self.body.push_str(runs);
        self.body.push_str("</w:p>");
    }

    fn write_heading(&mut self, text: &str) {
        let mut runs = String::new();
        let bookmark = self.bookmark.take();
        if let Some(index) = bookmark {
            runs.push_str(&format!(
                "<w:bookmarkStart w:id=\"{}\" w:name=\"{}\"/>",
                bookmark_id(index),
                bookmark_name(index)
            ));
        }
        runs.push_str(&run(text, RunProps::default()));
        if let Some(index) = bookmark {
            runs.push_str(&format!("<w:bookmarkEnd w:id=\"{}\"/>", bookmark_id(index)));
        }
        self.paragraph(Some("Heading1"), None, &runs);
    }

    fn write_colored(&mut self, text: &str, color: &str) {
        let size = self.metrics().body_size;
        let runs = run(text, RunProps::sized(size).color(color));
        self.paragraph(None, None, &runs);
    }

    /// Finish into the package parts.
    pub fn into_parts(self, doc: &EbookDocument) -> Vec<Part> {
        let document = self.document_xml();
        let styles = self.styles_xml();
        vec![
            Part::xml("[Content_Types].xml", CONTENT_TYPES.to_string()),
            Part::xml("_rels/.rels", ROOT_RELS.to_string()),
            Part::xml("word/document.xml", document),
            Part::xml("word/styles.xml", styles),
            Part::xml("word/settings.xml", settings_xml()),
            Part::xml("word/footer1.xml", footer_xml()),
            Part::xml("word/_rels/document.xml.rels", DOCUMENT_RELS.to_string()),
            Part::xml("docProps/core.xml", core_xml(doc)),
        ]
    }

    fn document_xml(&self) -> String {
        let c = self.constants;
        format!(
            "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\n\
             <w:document xmlns:w=\"{W_NS}\" xmlns:r=\"{R_NS}\"><w:body>{body}\
             <w:sectPr><w:footerReference w:type=\"default\" r:id=\"rIdFooter1\"/>\
             <w:pgSz w:w=\"{w}\" w:h=\"{h}\"/>\
             <w:pgMar w:top=\"{top}\" w:right=\"{right}\" w:bottom=\"{bottom}\" w:left=\"{left}\" \
             w:header=\"708\" w:footer=\"708\" w:gutter=\"0\"/></w:sectPr>\
             </w:body></w:document>",
            body = self.body,
            w = pt_to_twip(c.page_width),
            h = pt_to_twip(c.page_height),
            top = pt_to_twip(c.margin_top),
            right = pt_to_twip(c.margin_right),
            bottom = pt_to_twip(c.margin_bottom),
            left = pt_to_twip(c.margin_left),
        )
    }

    /// The spacing table the estimator used, in twips.
    fn styles_xml(&self) -> String {
        let m = self.metrics();
        let font = escape_xml(&self.constants.font_family);
        let line = (m.line_spacing * 240.0).round() as i64;
        let tab = pt_to_twip(m.column_width);
        format!(
            "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\n\
<w:styles xmlns:w=\"{W_NS}\">\
<w:docDefaults><w:rPrDefault><w:rPr>\
<w:rFonts w:ascii=\"{font}\" w:hAnsi=\"{font}\" w:eastAsia=\"{font}\" w:cs=\"{font}\"/>\
<w:color w:val=\"333333\"/><w:sz w:val=\"{body}\"/><w:szCs w:val=\"{body}\"/>\
<w:lang w:val=\"ko-KR\" w:eastAsia=\"ko-KR\"/></w:rPr></w:rPrDefault>\
<w:pPrDefault><w:pPr><w:spacing w:before=\"0\" w:after=\"{after}\" w:line=\"{line}\" w:lineRule=\"auto\"/></w:pPr></w:pPrDefault>\
</w:docDefaults>\
<w:style w:type=\"paragraph\" w:default=\"1\" w:styleId=\"Normal\"><w:name w:val=\"Normal\"/><w:qFormat/></w:style>\
<w:style w:type=\"paragraph\" w:styleId=\"Heading1\"><w:name w:val=\"heading 1\"/><w:basedOn w:val=\"Normal\"/>\
<w:next w:val=\"Normal\"/><w:qFormat/><w:pPr><w:keepNext/>\
<w:spacing w:before=\"{title_before}\" w:after=\"{title_after}\"/><w:outlineLvl w:val=\"0\"/></w:pPr>\
<w:rPr><w:b/><w:color w:val=\"1A1A2E\"/><w:sz w:val=\"{heading}\"/><w:szCs w:val=\"{heading}\"/></w:rPr></w:style>\
<w:style w:type=\"paragraph\" w:styleId=\"Heading2\"><w:name w:val=\"heading 2\"/><w:basedOn w:val=\"Normal\"/>\
<w:next w:val=\"Normal\"/><w:qFormat/><w:pPr><w:keepNext/>\
<w:spacing w:before=\"{sub_before}\" w:after=\"{sub_after}\"/><w:outlineLvl w:val=\"1\"/></w:pPr>\
<w:rPr><w:b/><w:color w:val=\"1A1A2E\"/><w:sz w:val=\"{sub}\"/><w:szCs w:val=\"{sub}\"/></w:rPr></w:style>\
<w:style w:type=\"paragraph\" w:styleId=\"Label\"><w:name w:val=\"Label\"/><w:basedOn w:val=\"Normal\"/>\
<w:next w:val=\"Normal\"/><w:pPr><w:keepNext/></w:pPr><w:rPr><w:b/><w:color w:val=\"{accent}\"/></w:rPr></w:style>\
<w:style w:type=\"paragraph\" w:styleId=\"Bullet\"><w:name w:val=\"Bullet\"/><w:basedOn w:val=\"Normal\"/>\
<w:pPr><w:ind w:left=\"360\" w:hanging=\"240\"/></w:pPr></w:style>\
<w:style w:type=\"paragraph\" w:styleId=\"TOCEntry\"><w:name w:val=\"TOC Entry\"/><w:basedOn w:val=\"Normal\"/>\
<w:pPr><w:tabs><w:tab w:val=\"right\" w:leader=\"dot\" w:pos=\"{tab}\"/></w:tabs></w:pPr></w:style>\
</w:styles>",
            body = half_points(m.body_size),
            heading = half_points(m.heading_size),
            sub = half_points(m.subheading_size),
            after = pt_to_twip(m.block_space_after),
            title_before = pt_to_twip(m.title_space_before),
            title_after = pt_to_twip(m.title_space_after),
            sub_before = pt_to_twip(m.heading_space_before),
            sub_after = pt_to_twip(m.heading_space_after),
            accent = hex_rgb(DEFAULT_ACCENT),
        )
    }
}

impl Renderer for DocxEngine<'_> {
    fn section_break(&mut self) -> Result<()> {
        if self.estimator.cursor().page_is_dirty() {
            self.break_pending = true;
        }
        self.estimator.section_break()
    }

    fn record_chapter(&mut self, number: u32) {
        self.estimator.record_chapter(number);
    }

    fn emit_title(&mut self, text: &str) -> Result<()> {
        self.estimator.emit_title(text)?;
        self.paragraph(Some("Heading1"), None, &run(text, RunProps::default()));
        Ok(())
    }

    fn emit_heading(&mut self, text: &str) -> Result<()> {
        self.estimator.emit_heading(text)?;
        self.write_heading(text);
        Ok(())
    }

    fn emit_subheading(&mut self, text: &str) -> Result<()> {
        self.estimator.emit_subheading(text)?;
        self.paragraph(Some("Heading2"), None, &run(text, RunProps::default()));
        Ok(())
    }

    fn emit_label(&mut self, label: &str) -> Result<()> {
        self.estimator.emit_label(label)?;
        self.paragraph(Some("Label"), None, &run(&format!("[{label}]"), RunProps::default()));
        Ok(())
    }

    fn emit_paragraph(&mut self, text: &str) -> Result<()> {
        self.estimator.emit_paragraph(text)?;
        self.paragraph(None, None, &run(text, RunProps::default()));
        Ok(())
    }

    fn emit_bullet(&mut self, text: &str) -> Result<()> {
        self.estimator.emit_bullet(text)?;
        self.paragraph(Some("Bullet"), None, &run(&format!("•\u{a0}{text}"), RunProps::default()));
        Ok(())
    }

    fn emit_blank(&mut self) -> Result<()> {
        self.estimator.emit_blank()?;
        self.paragraph(None, None, "");
        Ok(())
    }

    fn emit_emphasis(&mut self, text: &str) -> Result<()> {
        self.estimator.emit_emphasis(text)?;
        self.write_colored(text, DEFAULT_ACCENT);
        Ok(())
    }

    fn emit_toc_entry(&mut self, entry: &TocEntry) -> Result<()> {
        self.estimator.emit_toc_entry(entry)?;
        let size = self.metrics().body_size;
        let mut runs = String::new();
        if let Some(phase) = &entry.phase {
            runs.push_str(&run(
                &format!("[{}]  ", phase.label()),
                RunProps::sized(9.0).color("#888888"),
            ));
        }
        runs.push_str(&run(
            &format!("CH.{}  {}", entry.number, entry.title),
            RunProps::sized(size),
        ));
        runs.push_str("<w:r><w:tab/></w:r>");
        let cached = entry.page.map(|p| p.to_string()).unwrap_or_default();
        runs.push_str(&field(
            &format!("PAGEREF {} \\h", bookmark_name(entry.index)),
            &cached,
            RunProps::sized(size).color("#555555"),
        ));
        self.paragraph(Some("TOCEntry"), None, &runs);
        Ok(())
    }

    fn cover(&mut self, doc: &EbookDocument) -> Result<()> {
        self.estimator.cover(doc)?;
        let title = run(
            doc.title(),
            RunProps::sized(28.0).color("#1a1a2e").bold(),
        );
        self.paragraph(None, Some("center"), &format!("<w:r><w:br/><w:br/><w:br/><w:br/></w:r>{title}"));
        if let Some(subtitle) = non_blank(Some(doc.book_info.subtitle.as_str())) {
            let runs = run(subtitle, RunProps::sized(14.0).color("#999999"));
            self.paragraph(None, Some("center"), &runs);
        }
        if let Some(author) = non_blank(doc.book_info.author.as_deref()) {
            let runs = run(author, RunProps::sized(11.0).color("#888888"));
            self.paragraph(None, Some("center"), &runs);
        }
        Ok(())
    }

    fn chapter_start(&mut self, chapter: &ChapterStart<'_>) -> Result<()> {
        self.estimator.chapter_start(chapter)?;
        let meta = chapter.meta;
        if let Some(phase) = &meta.phase {
            let runs = run(
                &format!("[{}]", phase.label()),
                RunProps::default().color(phase_color(Some(phase))).bold(),
            );
            self.paragraph(Some("Label"), None, &runs);
        }
        let runs = run(
            &format!("CHAPTER  {}", chapter.number),
            RunProps::sized(12.0).color("#aaaaaa"),
        );
        self.paragraph(None, None, &runs);
        self.bookmark = Some(chapter.index);
        self.write_heading(&meta.title);
        if let Some(before) = non_blank(meta.before_state.as_deref()) {
            self.write_colored(&format!("{BEFORE_LABEL}: {before}"), "#e74c3c");
        }
        if let Some(after) = non_blank(meta.after_state.as_deref()) {
            self.write_colored(&format!("{AFTER_LABEL}: {after}"), "#03c75a");
        }
        Ok(())
    }
}

const CONTENT_TYPES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">
  <Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/>
  <Default Extension="xml" ContentType="application/xml"/>
  <Override PartName="/word/document.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml"/>
  <Override PartName="/word/styles.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.styles+xml"/>
  <Override PartName="/word/settings.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.settings+xml"/>
  <Override PartName="/word/footer1.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.footer+xml"/>
  <Override PartName="/docProps/core.xml" ContentType="application/vnd.openxmlformats-package.core-properties+xml"/>
</Types>"#;

const ROOT_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
  <Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="word/document.xml"/>
  <Relationship Id="rId2" Type="http://schemas.openxmlformats.org/package/2006/relationships/metadata/core-properties" Target="docProps/core.xml"/>
</Relationships>"#;

const DOCUMENT_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
  <Relationship Id="rIdStyles" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles" Target="styles.xml"/>
  <Relationship Id="rIdSettings" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/settings" Target="settings.xml"/>
  <Relationship Id="rIdFooter1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/footer" Target="footer1.xml"/>
</Relationships>"#;

fn settings_xml() -> String {
    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\n\
         <w:settings xmlns:w=\"{W_NS}\"><w:updateFields w:val=\"true\"/>\
         <w:defaultTabStop w:val=\"720\"/></w:settings>"
    )
}

/// Centered footer with the live page number between dashes.
fn footer_xml() -> String {
    let grey = RunProps::sized(9.0).color("#aaaaaa");
    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\n\
         <w:ftr xmlns:w=\"{W_NS}\" xmlns:r=\"{R_NS}\"><w:p><w:pPr><w:jc w:val=\"center\"/></w:pPr>\
         {}{}{}</w:p></w:ftr>",
        run("— ", grey),
        field("PAGE", "1", grey),
        run(" —", grey),
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

/// Lay out and package `doc` as DOCX bytes.
pub fn render_docx(doc: &EbookDocument, constants: &LayoutConstants) -> Result<Vec<u8>> {
    constants.validate()?;
    let pages = build_chapter_page_index(doc, Format::Docx, constants)?;
    let mut engine = DocxEngine::new(constants);
    compose(&mut engine, doc, Some(&pages), ComposeOptions::estimate(Format::Docx))?;
    let parts = engine.into_parts(doc);
    Ok(write_zip(None, &parts)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{assert_well_formed, read_part, sample_document};
    use crate::layout::toc_entries;

    fn document_xml(doc: &EbookDocument) -> String {
        let bytes = render_docx(doc, &LayoutConstants::default()).unwrap();
        read_part(&bytes, "word/document.xml")
    }

    #[test]
    fn package_has_every_part_and_well_formed_xml() {
        let bytes = render_docx(&sample_document(), &LayoutConstants::default()).unwrap();
        for name in [
            "[Content_Types].xml",
            "_rels/.rels",
            "word/document.xml",
            "word/styles.xml",
            "word/settings.xml",
            "word/footer1.xml",
            "word/_rels/document.xml.rels",
            "docProps/core.xml",
        ] {
            assert_well_formed(&read_part(&bytes, name));
        }
        assert!(read_part(&bytes, "word/settings.xml").contains("updateFields"));
        assert!(read_part(&bytes, "word/footer1.xml").contains(" PAGE "));
    }

    #[test]
    fn toc_fields_carry_estimated_pages_and_bookmarks_exist() {
        let doc = sample_document();
        let constants = LayoutConstants::default();
        let index = build_chapter_page_index(&doc, Format::Docx, &constants).unwrap();
        let xml = document_xml(&doc);
        let entries = toc_entries(&doc, Some(&index));
        assert_eq!(entries.len(), 4);
        for entry in &entries {
            let name = bookmark_name(entry.index);
            assert!(xml.contains(&format!("PAGEREF {name} \\h")));
            assert!(xml.contains(&format!("w:name=\"{name}\"")));
        }
    }

    #[test]
    fn bookmarks_stay_unique_when_chapter_numbers_repeat() {
        let mut doc = sample_document();
        for chapter in &mut doc.book_info.chapters {
            chapter.chapter_num = Some(1);
        }
        let xml = document_xml(&doc);
        let ids: std::collections::BTreeSet<&str> = xml
            .match_indices("<w:bookmarkStart w:id=\"")
            .map(|(at, tag)| {
                let rest = &xml[at + tag.len()..];
                &rest[..rest.find('"').unwrap()]
            })
            .collect();
        assert_eq!(ids.len(), 4);
        for index in 0..4 {
            let name = bookmark_name(index);
            assert_eq!(xml.matches(&format!("w:name=\"{name}\"")).count(), 1);
            assert!(xml.contains(&format!("PAGEREF {name} \\h")));
        }
    }

    #[test]
    fn huge_chapter_numbers_do_not_overflow() {
        let mut doc = sample_document();
        doc.book_info.chapters[0].chapter_num = Some(u32::MAX);
        let xml = document_xml(&doc);
        assert!(xml.contains(&format!("w:name=\"{}\"", bookmark_name(0))));
        assert!(xml.contains(&format!("CH.{}", u32::MAX)));
    }

    #[test]
    fn engine_and_estimator_agree() {
        let doc = sample_document();
        let constants = LayoutConstants::default();
        let index = build_chapter_page_index(&doc, Format::Docx, &constants).unwrap();
        let mut engine = DocxEngine::new(&constants);
        compose(&mut engine, &doc, Some(&index), ComposeOptions::estimate(Format::Docx)).unwrap();
        assert_eq!(engine.chapter_pages(), &index);
    }

    #[test]
    fn forced_breaks_become_page_break_before() {
        let xml = document_xml(&sample_document());
        let breaks = xml.matches("<w:pageBreakBefore/>").count();
        // TOC, prologue, value summary, four chapters, epilogue, appendix.
        assert_eq!(breaks, 9);
        let first_para = xml.find("<w:p>").unwrap();
        let first_break = xml.find("<w:pageBreakBefore/>").unwrap();
        assert!(xml[first_para..first_break].contains("</w:p>"));
    }

    #[test]
    fn empty_prologue_matches_missing_prologue() {
        let mut with_empty = sample_document();
        with_empty.prologue = Some("   ".into());
        let mut without = sample_document();
        without.prologue = None;
        assert_eq!(document_xml(&with_empty), document_xml(&without));
    }

    #[test]
    fn runs_escape_text_and_break_lines() {
        let r = run("a<b\nc", RunProps::sized(10.0).color("#ff0000").bold());
        assert!(r.contains("a&lt;b"));
        assert!(r.contains("<w:br/>"));
        assert!(r.contains("<w:sz w:val=\"20\"/>"));
        assert!(r.contains("FF0000"));
    }
}
