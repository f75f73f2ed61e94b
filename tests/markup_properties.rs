//! Property tests for the markup tokenizer, the page index and unit
//! conversion.

use ebook_forge::config::LayoutConstants;
use ebook_forge::markup::{tokenize, ContentBlock};
use ebook_forge::model::{BookInfo, ChapterContent, ChapterMeta, EbookDocument};
use ebook_forge::package::Format;
use ebook_forge::pagination::build_chapter_page_index;
use ebook_forge::units::{convert, Unit};
use proptest::prelude::*;

fn markup_line() -> impl Strategy<Value = String> {
    prop_oneof![
        Just(String::new()),
        Just("   ".to_string()),
        "[가-힣a-z ]{1,30}".prop_map(|t| format!("== {t} ==")),
        ("[가-힣a-z]{2,10}", "[가-힣a-z ]{0,30}").prop_map(|(l, r)| format!("[{l}] {r}")),
        "[가-힣a-z ]{1,30}".prop_map(|t| format!("- {t}")),
        (1u32..20, "[가-힣a-z ]{1,30}").prop_map(|(n, t)| format!("{n}) {t}")),
        "[가-힣a-zA-Z0-9 .,!?]{1,120}",
    ]
}

fn markup() -> impl Strategy<Value = String> {
    prop::collection::vec(markup_line(), 0..40).prop_map(|lines| lines.join("\n"))
}

fn document(bodies: Vec<String>) -> EbookDocument {
    let chapters: Vec<ChapterMeta> = (0..bodies.len())
        .map(|i| ChapterMeta {
            chapter_num: Some(i as u32 + 1),
            title: format!("챕터 {}", i + 1),
            ..ChapterMeta::default()
        })
        .collect();
    EbookDocument {
        book_info: BookInfo {
            title: "속성 테스트".to_string(),
            chapters: chapters.clone(),
            ..BookInfo::default()
        },
        chapters_content: chapters
            .into_iter()
            .zip(bodies)
            .map(|(chapter, content)| ChapterContent { chapter, content })
            .collect(),
        ..EbookDocument::default()
    }
}

proptest! {
    #[test]
    fn tokenize_is_total_and_line_preserving(content in any::<String>()) {
        let blocks = tokenize(&content);
        prop_assert_eq!(blocks.len(), content.lines().count());
    }

    #[test]
    fn every_blank_line_is_one_blank_block(content in markup()) {
        let blocks = tokenize(&content);
        for (line, block) in content.lines().zip(&blocks) {
            prop_assert_eq!(line.trim().is_empty(), *block == ContentBlock::Blank);
        }
    }

    #[test]
    fn tokenize_is_idempotent(content in any::<String>()) {
        prop_assert_eq!(tokenize(&content), tokenize(&content));
    }

    #[test]
    fn fenced_text_is_a_heading(text in "[가-힣a-zA-Z0-9]([가-힣a-zA-Z0-9 ]{0,20}[가-힣a-zA-Z0-9])?") {
        let blocks = tokenize(&format!("== {text} =="));
        prop_assert_eq!(blocks, vec![ContentBlock::Heading(text)]);
    }

    #[test]
    fn chapter_pages_never_decrease(bodies in prop::collection::vec(markup(), 1..6)) {
        let doc = document(bodies);
        for format in [Format::Pdf, Format::Docx, Format::Hwpx] {
            let index = build_chapter_page_index(&doc, format, &LayoutConstants::default()).unwrap();
            prop_assert_eq!(index.len(), doc.chapters_content.len());
            prop_assert!(index.is_monotonic());
        }
    }

    #[test]
    fn unit_round_trip(value in -10_000.0f64..10_000.0) {
        for unit in [Unit::Millimeter, Unit::Inch, Unit::HwpUnit, Unit::Emu, Unit::Twip] {
            let back = convert(convert(value, Unit::Point, unit), unit, Unit::Point);
            prop_assert!((back - value).abs() < 1e-6, "{unit:?}: {value} -> {back}");
        }
    }
}
