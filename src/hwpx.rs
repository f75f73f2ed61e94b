//! Korean OWPML engine (`.hwpx`).
//!
//! Like the word-processor engine, Hangul paginates on open. The engine
//! drives an embedded [`PageEstimator`] through the shared walk so forced
//! breaks turn into `pageBreak="1"` paragraphs exactly where the estimator
//! opened a new page, and the table of contents prints the estimator's page
//! numbers after a right tab. The spacing table the estimator used is
//! written into `header.xml` paragraph margins.

use crate::config::LayoutConstants;
use crate::error::Result;
use crate::layout::{
    compose, hex_rgb, ChapterStart, ComposeOptions, Renderer, TocEntry, AFTER_LABEL, BEFORE_LABEL,
    DEFAULT_ACCENT,
};
use crate::model::{non_blank, EbookDocument};
use crate::package::{escape_xml, timestamp, write_zip, Format, Part};
use crate::pagination::{
    build_chapter_page_index, BlockMetrics, ChapterPageIndex, PageEstimator,
};
use crate::units::{mm_to_hwp, pt_to_hwp};

pub const MIMETYPE: &str = "application/hwp+zip";

/// Characters of plain text kept in `Preview/PrvText.txt`.
pub const PREVIEW_CHARS: usize = 500;

const HP_NS: &str = "http://www.hancom.co.kr/hwpml/2011/paragraph";
const HS_NS: &str = "http://www.hancom.co.kr/hwpml/2011/section";
const HH_NS: &str = "http://www.hancom.co.kr/hwpml/2011/head";
const HC_NS: &str = "http://www.hancom.co.kr/hwpml/2011/core";

/// `charPr` ids in `header.xml`.
mod char_pr {
    pub const BODY: u8 = 0;
    pub const TITLE: u8 = 1;
    pub const SUBHEADING: u8 = 2;
    pub const LABEL: u8 = 3;
    pub const BOLD: u8 = 4;
    pub const TOC: u8 = 5;
    pub const ACCENT: u8 = 6;
}

/// `paraPr` ids in `header.xml`.
mod para_pr {
    pub const BODY: u8 = 0;
    pub const TITLE: u8 = 1;
    pub const SUBHEADING: u8 = 2;
    pub const TOC: u8 = 3;
    pub const BULLET: u8 = 4;
    pub const CENTER: u8 = 5;
}

/// `style` ids in `header.xml`.
mod style {
    pub const NORMAL: u8 = 0;
    pub const BODY: u8 = 1;
    pub const OUTLINE_1: u8 = 2;
    pub const OUTLINE_2: u8 = 3;
    pub const TOC: u8 = 4;
    pub const LIST: u8 = 5;
}

#[derive(Debug, Clone, Copy)]
struct ParaKind {
    para: u8,
    chars: u8,
    style: u8,
}

const BODY: ParaKind = ParaKind {
    para: para_pr::BODY,
    chars: char_pr::BODY,
    style: style::BODY,
};
const TITLE: ParaKind = ParaKind {
    para: para_pr::TITLE,
    chars: char_pr::TITLE,
    style: style::OUTLINE_1,
};
const SUBHEADING: ParaKind = ParaKind {
    para: para_pr::SUBHEADING,
    chars: char_pr::SUBHEADING,
    style: style::OUTLINE_2,
};
const LABEL: ParaKind = ParaKind {
    para: para_pr::BODY,
    chars: char_pr::LABEL,
    style: style::NORMAL,
};
const BOLD: ParaKind = ParaKind {
    para: para_pr::BODY,
    chars: char_pr::BOLD,
    style: style::BODY,
};
const ACCENT: ParaKind = ParaKind {
    para: para_pr::BODY,
    chars: char_pr::ACCENT,
    style: style::BODY,
};
const TOC: ParaKind = ParaKind {
    para: para_pr::TOC,
    chars: char_pr::TOC,
    style: style::TOC,
};
const BULLET: ParaKind = ParaKind {
    para: para_pr::BULLET,
    chars: char_pr::BODY,
    style: style::LIST,
};

/// `<hp:t>` content: tabs and line breaks become inline controls.
fn text_content(text: &str) -> String {
    let mut out = String::new();
    for (i, line) in text.split('\n').enumerate() {
        if i > 0 {
            out.push_str("<hp:lineBreak/>");
        }
        for (j, piece) in line.split('\t').enumerate() {
            if j > 0 {
                out.push_str("<hp:tab/>");
            }
            out.push_str(&escape_xml(piece));
        }
    }
    out
}

/// Builds `Contents/section0.xml` from the shared walk.
pub struct HwpxEngine<'a> {
    constants: &'a LayoutConstants,
    estimator: PageEstimator,
    paras: String,
    preview: String,
    next_id: u32,
    break_pending: bool,
}

impl<'a> HwpxEngine<'a> {
    pub fn new(constants: &'a LayoutConstants) -> Self {
        Self {
            constants,
            estimator: PageEstimator::new(BlockMetrics::for_format(Format::Hwpx, constants)),
            paras: String::new(),
            preview: String::new(),
            // id 0 is the section-setup paragraph.
            next_id: 1,
            break_pending: false,
        }
    }

    /// Chapter pages seen by the embedded estimator.
    pub fn chapter_pages(&self) -> &ChapterPageIndex {
        self.estimator.index()
    }

    fn paragraph(&mut self, kind: ParaKind, text: &str) {
        let id = self.next_id;
        self.next_id += 1;
        let page_break = u8::from(std::mem::take(&mut self.break_pending));
        self.paras.push_str(&format!(
            "<hp:p id=\"{id}\" paraPrIDRef=\"{}\" styleIDRef=\"{}\" pageBreak=\"{page_break}\" \
             columnBreak=\"0\" merged=\"0\">",
            kind.para, kind.style
        ));
        if text.is_empty() {
            self.paras
                .push_str(&format!("<hp:run charPrIDRef=\"{}\"/>", kind.chars));
        } else {
            self.paras.push_str(&format!(
                "<hp:run charPrIDRef=\"{}\"><hp:t>{}</hp:t></hp:run>",
                kind.chars,
                text_content(text)
            ));
            if self.preview.chars().count() < PREVIEW_CHARS {
                self.preview.push_str(&text.replace('\t', " "));
                self.preview.push('\n');
            }
        }
        self.paras.push_str("</hp:p>\n");
    }

    /// Finish into the package parts, `mimetype` excluded.
    pub fn into_parts(self, doc: &EbookDocument) -> Vec<Part> {
        let section = self.section_xml();
        let header = self.header_xml();
        let preview: String = self.preview.chars().take(PREVIEW_CHARS).collect();
        vec![
            Part::xml("META-INF/container.xml", CONTAINER.to_string()),
            Part::xml("version.xml", VERSION.to_string()),
            Part::xml("settings.xml", SETTINGS.to_string()),
            Part::xml("Contents/content.hpf", content_hpf(doc)),
            Part::xml("Contents/header.xml", header),
            Part::xml("Contents/section0.xml", section),
            Part::new("Preview/PrvText.txt", preview.into_bytes()),
        ]
    }

    fn section_xml(&self) -> String {
        let c = self.constants;
        let header_footer = mm_to_hwp(15.0);
        format!(
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
<hs:sec xmlns:hs=\"{HS_NS}\" xmlns:hp=\"{HP_NS}\" xmlns:hc=\"{HC_NS}\" xmlns:hh=\"{HH_NS}\">\n\
<hp:p id=\"0\" paraPrIDRef=\"0\" styleIDRef=\"0\" pageBreak=\"0\" columnBreak=\"0\" merged=\"0\">\
<hp:run charPrIDRef=\"0\">\
<hp:secPr id=\"0\" textDirection=\"HORIZONTAL\" spaceColumns=\"1134\" tabStop=\"8000\" \
tabStopVal=\"4000\" tabStopUnit=\"HWPUNIT\" outlineShapeIDRef=\"0\" memoShapeIDRef=\"0\" \
textVerticalWidthHead=\"0\" masterPageCnt=\"0\">\
<hp:grid lineGrid=\"0\" charGrid=\"0\" wonggojiFormat=\"0\"/>\
<hp:startNum pageStartsOn=\"BOTH\" page=\"0\" pic=\"0\" tbl=\"0\" equation=\"0\"/>\
<hp:visibility hideFirstHeader=\"0\" hideFirstFooter=\"0\" hideFirstMasterPage=\"0\" \
border=\"SHOW_ALL\" fill=\"SHOW_ALL\" hideFirstPageNum=\"0\" hideFirstEmptyLine=\"0\" showLineNumber=\"0\"/>\
<hp:pagePr landscape=\"WIDELY\" width=\"{w}\" height=\"{h}\" gutterType=\"LEFT_ONLY\">\
<hp:margin header=\"{hf}\" footer=\"{hf}\" gutter=\"0\" left=\"{left}\" right=\"{right}\" top=\"{top}\" bottom=\"{bottom}\"/>\
</hp:pagePr>\
</hp:secPr>\
<hp:ctrl><hp:colPr id=\"0\" type=\"NEWSPAPER\" layout=\"LEFT\" colCount=\"1\" sameSz=\"1\" sameGap=\"0\"/></hp:ctrl>\
</hp:run><hp:run charPrIDRef=\"0\"><hp:t/></hp:run></hp:p>\n\
{paras}</hs:sec>",
            w = pt_to_hwp(c.page_width),
            h = pt_to_hwp(c.page_height),
            hf = header_footer,
            left = pt_to_hwp(c.margin_left),
            right = pt_to_hwp(c.margin_right),
            top = pt_to_hwp(c.margin_top),
            bottom = pt_to_hwp(c.margin_bottom),
            paras = self.paras,
        )
    }

    fn header_xml(&self) -> String {
        let m = self.estimator.metrics();
        let body = pt_to_hwp(m.body_size);
        let small = pt_to_hwp((m.body_size - 1.5).max(8.0));
        let line_pct = (m.line_spacing * 100.0).round() as i64;
        let after = pt_to_hwp(m.block_space_after);

        let chars = [
            char_props(char_pr::BODY, body, "#000000", false, 0),
            char_props(char_pr::TITLE, pt_to_hwp(m.heading_size), "#1A1A2E", true, 1),
            char_props(char_pr::SUBHEADING, pt_to_hwp(m.subheading_size), "#1A1A2E", true, 1),
            char_props(char_pr::LABEL, small, "#646464", false, 0),
            char_props(char_pr::BOLD, body, "#000000", true, 0),
            char_props(char_pr::TOC, body, "#000000", false, 0),
            char_props(
                char_pr::ACCENT,
                body,
                &format!("#{}", hex_rgb(DEFAULT_ACCENT)),
                false,
                0,
            ),
        ];
        let paras = [
            ParaProps::new(para_pr::BODY, line_pct).next(after),
            ParaProps::new(para_pr::TITLE, line_pct)
                .prev(pt_to_hwp(m.title_space_before))
                .next(pt_to_hwp(m.title_space_after)),
            ParaProps::new(para_pr::SUBHEADING, line_pct)
                .prev(pt_to_hwp(m.heading_space_before))
                .next(pt_to_hwp(m.heading_space_after)),
            ParaProps::new(para_pr::TOC, line_pct).next(after).tab(1),
            ParaProps::new(para_pr::BULLET, line_pct).next(after).hanging(400),
            ParaProps::new(para_pr::CENTER, line_pct).next(after).align("CENTER"),
        ];

        let mut out = format!(
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
<hh:head xmlns:hh=\"{HH_NS}\" xmlns:hc=\"{HC_NS}\" version=\"1.5\" secCnt=\"1\">\n\
<hh:beginNum page=\"1\" footnote=\"1\" endnote=\"1\" pic=\"1\" tbl=\"1\" equation=\"1\"/>\n\
<hh:refList>\n"
        );
        out.push_str(&font_faces(&self.constants.font_family));
        out.push_str(BORDER_FILLS);
        out.push_str(&format!("<hh:charProperties itemCnt=\"{}\">\n", chars.len()));
        for c in &chars {
            out.push_str(c);
        }
        out.push_str("</hh:charProperties>\n");
        out.push_str(
            "<hh:tabProperties itemCnt=\"2\">\
<hh:tabPr id=\"0\" autoTabLeft=\"false\" autoTabRight=\"false\"/>\
<hh:tabPr id=\"1\" autoTabLeft=\"false\" autoTabRight=\"true\"/>\
</hh:tabProperties>\n",
        );
        out.push_str(&format!("<hh:paraProperties itemCnt=\"{}\">\n", paras.len()));
        for p in &paras {
            out.push_str(&p.to_xml());
        }
        out.push_str("</hh:paraProperties>\n");
        out.push_str(STYLES);
        out.push_str("</hh:refList>\n</hh:head>");
        out
    }
}

fn char_props(id: u8, height: i64, color: &str, bold: bool, hangul_font: u8) -> String {
    const LANGS: [&str; 7] = ["hangul", "latin", "hanja", "japanese", "other", "symbol", "user"];
    let attrs = |value: &str| {
        LANGS
            .iter()
            .map(|l| format!("{l}=\"{value}\""))
            .collect::<Vec<_>>()
            .join(" ")
    };
    let font_ref = LANGS
        .iter()
        .map(|l| {
            let font = if *l == "hangul" { hangul_font } else { 0 };
            format!("{l}=\"{font}\"")
        })
        .collect::<Vec<_>>()
        .join(" ");
    format!(
        "<hh:charPr id=\"{id}\" height=\"{height}\" textColor=\"{color}\" shadeColor=\"#FFFFFF\" \
useFontSpace=\"false\" useKerning=\"false\" symMark=\"NONE\" borderFillIDRef=\"0\">\
<hh:fontRef {font_ref}/><hh:ratio {r}/><hh:spacing {z}/><hh:relSz {r}/><hh:offset {z}/>{bold}\
</hh:charPr>\n",
        r = attrs("100"),
        z = attrs("0"),
        bold = if bold { "<hh:bold/>" } else { "" },
    )
}

/// One `paraPr`, margins in HWPUNIT.
#[derive(Debug, Clone, Copy)]
struct ParaProps {
    id: u8,
    line_pct: i64,
    tab: u8,
    align: &'static str,
    left: i64,
    indent: i64,
    prev: i64,
    next: i64,
}

impl ParaProps {
    fn new(id: u8, line_pct: i64) -> Self {
        Self {
            id,
            line_pct,
            tab: 0,
            align: "LEFT",
            left: 0,
            indent: 0,
            prev: 0,
            next: 0,
        }
    }

    fn prev(mut self, v: i64) -> Self {
        self.prev = v;
        self
    }

    fn next(mut self, v: i64) -> Self {
        self.next = v;
        self
    }

    fn tab(mut self, id: u8) -> Self {
        self.tab = id;
        self
    }

    fn align(mut self, align: &'static str) -> Self {
        self.align = align;
        self
    }

    fn hanging(mut self, width: i64) -> Self {
        self.left = width;
        self.indent = -width;
        self
    }

    fn to_xml(&self) -> String {
        format!(
            "<hh:paraPr id=\"{id}\" tabPrIDRef=\"{tab}\" condense=\"0\" fontLineHeight=\"false\" \
snapToGrid=\"true\" suppressLineNumbers=\"false\" checked=\"false\">\
<hh:align horizontal=\"{align}\" vertical=\"BASELINE\"/>\
<hh:lineSpacing type=\"PERCENT\" value=\"{line}\"/>\
<hh:margin><hc:left value=\"{left}\" unit=\"HWPUNIT\"/><hc:right value=\"0\" unit=\"HWPUNIT\"/>\
<hc:prev value=\"{prev}\" unit=\"HWPUNIT\"/><hc:next value=\"{next}\" unit=\"HWPUNIT\"/>\
<hc:indent value=\"{indent}\" unit=\"HWPUNIT\"/></hh:margin>\
<hh:border borderFillIDRef=\"0\" offsetLeft=\"0\" offsetRight=\"0\" offsetTop=\"0\" offsetBottom=\"0\"/>\
</hh:paraPr>\n",
            id = self.id,
            tab = self.tab,
            align = self.align,
            line = self.line_pct,
            left = self.left,
            prev = self.prev,
            next = self.next,
            indent = self.indent,
        )
    }
}

/// Hangul faces: a body face and the configured family for headings.
fn font_faces(family: &str) -> String {
    let type_info = "<hh:typeInfo familyType=\"2\" weight=\"8\" proportion=\"4\" contrast=\"0\" \
strokeVariation=\"1\" armStyle=\"1\" letterform=\"1\" midline=\"1\" xHeight=\"1\"/>";
    let font = |id: u8, face: &str| {
        format!(
            "<hh:font id=\"{id}\" face=\"{}\" type=\"TTF\" isEmbedded=\"false\">{type_info}</hh:font>",
            escape_xml(face)
        )
    };
    let mut out = String::from("<hh:fontfaces itemCnt=\"7\">\n");
    out.push_str(&format!(
        "<hh:fontface lang=\"HANGUL\" fontCnt=\"2\">{}{}</hh:fontface>\n",
        font(0, "함초롬돋움"),
        font(1, family)
    ));
    for lang in ["LATIN", "HANJA", "JAPANESE", "OTHER", "SYMBOL", "USER"] {
        let face = match lang {
            "HANJA" | "JAPANESE" => "함초롬돋움",
            "SYMBOL" => "Symbol",
            _ => "Arial",
        };
        out.push_str(&format!(
            "<hh:fontface lang=\"{lang}\" fontCnt=\"1\">{}</hh:fontface>\n",
            font(0, face)
        ));
    }
    out.push_str("</hh:fontfaces>\n");
    out
}

impl Renderer for HwpxEngine<'_> {
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
        self.paragraph(TITLE, text);
        Ok(())
    }

    fn emit_heading(&mut self, text: &str) -> Result<()> {
        self.estimator.emit_heading(text)?;
        self.paragraph(TITLE, text);
        Ok(())
    }

    fn emit_subheading(&mut self, text: &str) -> Result<()> {
        self.estimator.emit_subheading(text)?;
        self.paragraph(SUBHEADING, text);
        Ok(())
    }

    fn emit_label(&mut self, label: &str) -> Result<()> {
        self.estimator.emit_label(label)?;
        self.paragraph(BOLD, &format!("[ {label} ]"));
        Ok(())
    }

    fn emit_paragraph(&mut self, text: &str) -> Result<()> {
        self.estimator.emit_paragraph(text)?;
        self.paragraph(BODY, text);
        Ok(())
    }

    fn emit_bullet(&mut self, text: &str) -> Result<()> {
        self.estimator.emit_bullet(text)?;
        self.paragraph(BULLET, &format!("• {text}"));
        Ok(())
    }

    fn emit_blank(&mut self) -> Result<()> {
        self.estimator.emit_blank()?;
        self.paragraph(BODY, "");
        Ok(())
    }

    fn emit_emphasis(&mut self, text: &str) -> Result<()> {
        self.estimator.emit_emphasis(text)?;
        self.paragraph(ACCENT, text);
        Ok(())
    }

    fn emit_toc_entry(&mut self, entry: &TocEntry) -> Result<()> {
        self.estimator.emit_toc_entry(entry)?;
        let phase = entry
            .phase
            .as_ref()
            .map(|p| format!("[{}]  ", p.label()))
            .unwrap_or_default();
        let page = entry.page.map(|p| p.to_string()).unwrap_or_default();
        self.paragraph(
            TOC,
            &format!("{phase}CHAPTER {}  {}\t{page}", entry.number, entry.title),
        );
        Ok(())
    }

    fn cover(&mut self, doc: &EbookDocument) -> Result<()> {
        self.estimator.cover(doc)?;
        let center = ParaKind {
            para: para_pr::CENTER,
            ..TITLE
        };
        self.paragraph(center, doc.title());
        if let Some(subtitle) = non_blank(Some(doc.book_info.subtitle.as_str())) {
            self.paragraph(
                ParaKind {
                    para: para_pr::CENTER,
                    ..SUBHEADING
                },
                subtitle,
            );
        }
        if let Some(author) = non_blank(doc.book_info.author.as_deref()) {
            self.paragraph(
                ParaKind {
                    para: para_pr::CENTER,
                    ..LABEL
                },
                author,
            );
        }
        let reader = doc
            .analysis
            .as_ref()
            .and_then(|a| non_blank(a.target_reader.as_deref()));
        if let Some(reader) = reader {
            self.paragraph(BODY, "");
            self.paragraph(BODY, &format!("대상 독자: {reader}"));
        }
        Ok(())
    }

    fn chapter_start(&mut self, chapter: &ChapterStart<'_>) -> Result<()> {
        self.estimator.chapter_start(chapter)?;
        let meta = chapter.meta;
        let phase = meta.phase.as_ref().map(|p| p.label()).unwrap_or_default();
        self.paragraph(LABEL, &format!("CHAPTER {}  ·  {phase}", chapter.number));
        self.paragraph(TITLE, &meta.title);
        if let Some(before) = non_blank(meta.before_state.as_deref()) {
            self.paragraph(BODY, &format!("{BEFORE_LABEL}: {before}"));
        }
        if let Some(after) = non_blank(meta.after_state.as_deref()) {
            self.paragraph(BOLD, &format!("{AFTER_LABEL}: {after}"));
        }
        self.paragraph(BODY, "");
        Ok(())
    }
}

const CONTAINER: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<ocf:container xmlns:ocf="urn:oasis:names:tc:opendocument:xmlns:container" xmlns:hpf="http://www.hancom.co.kr/schema/2011/hpf">
  <ocf:rootfiles>
    <ocf:rootfile full-path="Contents/content.hpf" media-type="application/hwpml-package+xml"/>
    <ocf:rootfile full-path="Preview/PrvText.txt" media-type="text/plain"/>
  </ocf:rootfiles>
</ocf:container>"#;

const VERSION: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<hv:HCFVersion xmlns:hv="http://www.hancom.co.kr/hwpml/2011/version" tagetApplication="WORDPROCESSOR" major="5" minor="1" micro="1" buildNumber="0" os="1" xmlVersion="1.5" application="Hancom Office Hangul" appVersion="13, 0, 0, 1408"/>"#;

const SETTINGS: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<ha:HWPApplicationSetting xmlns:ha="http://www.hancom.co.kr/hwpml/2011/app" xmlns:config="urn:oasis:names:tc:opendocument:xmlns:config:1.0">
  <ha:CaretPosition listIDRef="0" paraIDRef="0" pos="0"/>
</ha:HWPApplicationSetting>"#;

const BORDER_FILLS: &str = "<hh:borderFills itemCnt=\"1\">\
<hh:borderFill id=\"0\" threeD=\"0\" shadow=\"0\" centerLine=\"NONE\" breakCellSeparateLine=\"0\">\
<hh:slash type=\"NONE\" Crooked=\"0\" isCounter=\"0\"/><hh:backSlash type=\"NONE\" Crooked=\"0\" isCounter=\"0\"/>\
<hh:leftBorder type=\"NONE\" width=\"0.1 mm\" color=\"#000000\"/>\
<hh:rightBorder type=\"NONE\" width=\"0.1 mm\" color=\"#000000\"/>\
<hh:topBorder type=\"NONE\" width=\"0.1 mm\" color=\"#000000\"/>\
<hh:bottomBorder type=\"NONE\" width=\"0.1 mm\" color=\"#000000\"/>\
</hh:borderFill></hh:borderFills>\n";

const STYLES: &str = "<hh:styles itemCnt=\"6\">\
<hh:style id=\"0\" type=\"PARA\" name=\"바탕글\" engName=\"Normal\" paraPrIDRef=\"0\" charPrIDRef=\"0\" nextStyleIDRef=\"0\" langID=\"1042\" lockForm=\"false\"/>\
<hh:style id=\"1\" type=\"PARA\" name=\"본문\" engName=\"Body\" paraPrIDRef=\"0\" charPrIDRef=\"0\" nextStyleIDRef=\"1\" langID=\"1042\" lockForm=\"false\"/>\
<hh:style id=\"2\" type=\"PARA\" name=\"개요 1\" engName=\"Outline 1\" paraPrIDRef=\"1\" charPrIDRef=\"1\" nextStyleIDRef=\"0\" langID=\"1042\" lockForm=\"false\"/>\
<hh:style id=\"3\" type=\"PARA\" name=\"개요 2\" engName=\"Outline 2\" paraPrIDRef=\"2\" charPrIDRef=\"2\" nextStyleIDRef=\"1\" langID=\"1042\" lockForm=\"false\"/>\
<hh:style id=\"4\" type=\"PARA\" name=\"목차\" engName=\"TOC\" paraPrIDRef=\"3\" charPrIDRef=\"5\" nextStyleIDRef=\"4\" langID=\"1042\" lockForm=\"false\"/>\
<hh:style id=\"5\" type=\"PARA\" name=\"목록 들여쓰기\" engName=\"List Indent\" paraPrIDRef=\"4\" charPrIDRef=\"0\" nextStyleIDRef=\"5\" langID=\"1042\" lockForm=\"false\"/>\
</hh:styles>\n";

fn content_hpf(doc: &EbookDocument) -> String {
    let now = timestamp();
    let creator = non_blank(doc.book_info.author.as_deref()).unwrap_or_default();
    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
<opf:package xmlns:opf=\"http://www.idpf.org/2007/opf/\" xmlns:dc=\"http://purl.org/dc/elements/1.1/\" \
version=\"\" unique-identifier=\"\" id=\"\">\n\
  <opf:metadata>\n\
    <dc:title>{title}</dc:title>\n\
    <dc:language>ko</dc:language>\n\
    <opf:meta name=\"CreatedDate\" content=\"text\">{now}</opf:meta>\n\
    <opf:meta name=\"ModifiedDate\" content=\"text\">{now}</opf:meta>\n\
    <opf:meta name=\"creator\" content=\"text\">{creator}</opf:meta>\n\
  </opf:metadata>\n\
  <opf:manifest>\n\
    <opf:item id=\"header\" href=\"Contents/header.xml\" media-type=\"application/xml\"/>\n\
    <opf:item id=\"section0\" href=\"Contents/section0.xml\" media-type=\"application/xml\"/>\n\
    <opf:item id=\"settings\" href=\"settings.xml\" media-type=\"application/xml\"/>\n\
  </opf:manifest>\n\
  <opf:spine>\n\
    <opf:itemref idref=\"header\"/>\n\
    <opf:itemref idref=\"section0\"/>\n\
  </opf:spine>\n\
</opf:package>",
        title = escape_xml(doc.title()),
        creator = escape_xml(creator),
    )
}

/// Lay out and package `doc` as HWPX bytes.
pub fn render_hwpx(doc: &EbookDocument, constants: &LayoutConstants) -> Result<Vec<u8>> {
    constants.validate()?;
    let pages = build_chapter_page_index(doc, Format::Hwpx, constants)?;
    let mut engine = HwpxEngine::new(constants);
    compose(&mut engine, doc, Some(&pages), ComposeOptions::estimate(Format::Hwpx))?;
    let parts = engine.into_parts(doc);
    Ok(write_zip(Some(MIMETYPE), &parts)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{assert_well_formed, read_part, sample_document};

    fn section(doc: &EbookDocument) -> String {
        let bytes = render_hwpx(doc, &LayoutConstants::default()).unwrap();
        read_part(&bytes, "Contents/section0.xml")
    }

    #[test]
    fn mimetype_is_first_and_stored() {
        let bytes = render_hwpx(&sample_document(), &LayoutConstants::default()).unwrap();
        let mut archive = zip::ZipArchive::new(std::io::Cursor::new(bytes.as_slice())).unwrap();
        let first = archive.by_index(0).unwrap();
        assert_eq!(first.name(), "mimetype");
        assert_eq!(first.compression(), zip::CompressionMethod::Stored);
        drop(first);
        assert_eq!(read_part(&bytes, "mimetype"), MIMETYPE);
    }

    #[test]
    fn xml_parts_are_well_formed() {
        let bytes = render_hwpx(&sample_document(), &LayoutConstants::default()).unwrap();
        for name in [
            "META-INF/container.xml",
            "version.xml",
            "settings.xml",
            "Contents/content.hpf",
            "Contents/header.xml",
            "Contents/section0.xml",
        ] {
            assert_well_formed(&read_part(&bytes, name));
        }
        let preview = read_part(&bytes, "Preview/PrvText.txt");
        assert!(preview.starts_with("퇴근 후 100만원 만들기"));
        assert!(preview.chars().count() <= PREVIEW_CHARS);
    }

    #[test]
    fn page_geometry_is_in_hwpunit() {
        let xml = section(&sample_document());
        assert!(xml.contains("width=\"59528\""));
        assert!(xml.contains("height=\"84189\""));
        assert!(xml.contains("left=\"6000\""));
        assert!(xml.contains("top=\"7200\""));
    }

    #[test]
    fn header_carries_the_estimator_spacing() {
        let bytes = render_hwpx(&sample_document(), &LayoutConstants::default()).unwrap();
        let header = read_part(&bytes, "Contents/header.xml");
        assert!(header.contains("height=\"1100\""));
        assert!(header.contains("<hh:lineSpacing type=\"PERCENT\" value=\"160\"/>"));
        // Sub-heading margins: 6pt before, 3pt after.
        assert!(header.contains("<hc:prev value=\"600\" unit=\"HWPUNIT\"/><hc:next value=\"300\""));
    }

    #[test]
    fn toc_rows_print_estimated_pages() {
        let doc = sample_document();
        let constants = LayoutConstants::default();
        let index = build_chapter_page_index(&doc, Format::Hwpx, &constants).unwrap();
        let xml = section(&doc);
        let first = index.get(1).unwrap();
        assert!(xml.contains(&format!("CHAPTER 1  왜 지금 부수입이 필요한가<hp:tab/>{first}")));
    }

    #[test]
    fn engine_and_estimator_agree() {
        let doc = sample_document();
        let constants = LayoutConstants::default();
        let index = build_chapter_page_index(&doc, Format::Hwpx, &constants).unwrap();
        let mut engine = HwpxEngine::new(&constants);
        compose(&mut engine, &doc, Some(&index), ComposeOptions::estimate(Format::Hwpx)).unwrap();
        assert_eq!(engine.chapter_pages(), &index);
    }

    #[test]
    fn forced_breaks_mark_the_next_paragraph() {
        let xml = section(&sample_document());
        // TOC, prologue, value summary, four chapters, epilogue, appendix.
        assert_eq!(xml.matches("pageBreak=\"1\"").count(), 9);
    }

    #[test]
    fn empty_prologue_matches_missing_prologue() {
        let mut with_empty = sample_document();
        with_empty.prologue = Some(String::new());
        let mut without = sample_document();
        without.prologue = None;
        assert_eq!(section(&with_empty), section(&without));
    }

    #[test]
    fn text_content_escapes_and_inlines_controls() {
        assert_eq!(text_content("a&b\tc\nd"), "a&amp;b<hp:tab/>c<hp:lineBreak/>d");
    }
}
