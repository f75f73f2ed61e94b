//! Content model – the normalized ebook handed to every layout engine.
//!
//! Field names follow the JSON produced by the content generator
//! (`book_info`, `chapters_content`, `book_title`, ...), so a generator dump
//! deserializes directly. Everything the generator may omit is an `Option`.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{ContentMismatchError, Result};

/// Title used when the book has none.
pub const DEFAULT_TITLE: &str = "전자책";

/// Root aggregate of one generated ebook.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EbookDocument {
    pub topic: String,
    pub book_info: BookInfo,
    pub chapters_content: Vec<ChapterContent>,
    pub analysis: Option<Analysis>,
    pub marketing: Option<Marketing>,
    pub prologue: Option<String>,
    pub epilogue: Option<String>,
    /// Optional illustration per chapter, by position in `chapters_content`.
    pub chapter_images: Vec<Option<String>>,
    pub cover_url: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BookInfo {
    #[serde(rename = "book_title", alias = "title")]
    pub title: String,
    pub subtitle: String,
    pub author: Option<String>,
    pub chapters: Vec<ChapterMeta>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChapterMeta {
    /// Display ordinal; not necessarily the array index + 1.
    pub chapter_num: Option<u32>,
    pub title: String,
    pub phase: Option<Phase>,
    pub purpose: Option<String>,
    pub before_state: Option<String>,
    pub after_state: Option<String>,
    /// Advisory subtitle list; real structure comes from the body markup.
    pub sections: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChapterContent {
    pub chapter: ChapterMeta,
    pub content: String,
}

/// Narrative stage of a chapter.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Phase {
    /// 문제인식
    ProblemAwareness,
    /// 방법발견
    MethodDiscovery,
    /// 실행
    Execution,
    /// 확신
    Confidence,
    Other(String),
}

impl Phase {
    pub fn label(&self) -> &str {
        match self {
            Phase::ProblemAwareness => "문제인식",
            Phase::MethodDiscovery => "방법발견",
            Phase::Execution => "실행",
            Phase::Confidence => "확신",
            Phase::Other(s) => s,
        }
    }
}

impl From<String> for Phase {
    fn from(s: String) -> Self {
        match s.trim() {
            "문제인식" => Phase::ProblemAwareness,
            "방법발견" => Phase::MethodDiscovery,
            "실행" => Phase::Execution,
            "확신" => Phase::Confidence,
            _ => Phase::Other(s),
        }
    }
}

impl From<Phase> for String {
    fn from(p: Phase) -> Self {
        p.label().to_string()
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Value analysis shown on the "value summary" page.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Analysis {
    pub problem_solved: Option<ProblemSolved>,
    pub why_pay: Option<String>,
    pub target_reader: Option<String>,
    /// Keys the layout does not place.
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProblemSolved {
    pub time: Option<String>,
    pub money: Option<String>,
    pub emotion: Option<String>,
}

/// Marketing copy placed in the appendix.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Marketing {
    pub sales_copy: Option<String>,
    pub value_summary: Option<ValueSummary>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValueSummary {
    pub time_saved: Option<String>,
    pub money_saved: Option<String>,
    pub mistakes_prevented: Option<String>,
}

impl Analysis {
    /// `(label, text)` rows of the problem-solved block, skipping empty ones.
    pub fn problem_rows(&self) -> Vec<(&'static str, &str)> {
        let Some(p) = &self.problem_solved else {
            return Vec::new();
        };
        [
            ("시간 절약", p.time.as_deref()),
            ("비용 절감", p.money.as_deref()),
            ("감정적 해방", p.emotion.as_deref()),
        ]
        .into_iter()
        .filter_map(|(label, v)| non_blank(v).map(|v| (label, v)))
        .collect()
    }
}

impl Marketing {
    pub fn value_rows(&self) -> Vec<(&'static str, &str)> {
        let Some(v) = &self.value_summary else {
            return Vec::new();
        };
        [
            ("시간 절약", v.time_saved.as_deref()),
            ("비용 절감", v.money_saved.as_deref()),
            ("실수 방지", v.mistakes_prevented.as_deref()),
        ]
        .into_iter()
        .filter_map(|(label, v)| non_blank(v).map(|v| (label, v)))
        .collect()
    }
}

/// `Some(text)` only when the text has a non-whitespace character.
pub fn non_blank(text: Option<&str>) -> Option<&str> {
    text.filter(|t| !t.trim().is_empty())
}

impl EbookDocument {
    /// Parse a generator dump.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_default()
    }

    /// Book title, or the default title when blank.
    pub fn title(&self) -> &str {
        let t = self.book_info.title.trim();
        if t.is_empty() {
            DEFAULT_TITLE
        } else {
            t
        }
    }

    pub fn prologue_text(&self) -> Option<&str> {
        non_blank(self.prologue.as_deref())
    }

    pub fn epilogue_text(&self) -> Option<&str> {
        non_blank(self.epilogue.as_deref())
    }

    /// Display number of the chapter body at `index`.
    ///
    /// `book_info.chapters[index].chapter_num` wins, then the number carried
    /// by the body itself, then `index + 1`.
    pub fn chapter_number(&self, index: usize) -> u32 {
        self.book_info
            .chapters
            .get(index)
            .and_then(|c| c.chapter_num)
            .or_else(|| {
                self.chapters_content
                    .get(index)
                    .and_then(|c| c.chapter.chapter_num)
            })
            .unwrap_or(index as u32 + 1)
    }

    /// Metadata for the body at `index`: the body's own copy when it has a
    /// title, otherwise the table-of-contents entry.
    pub fn chapter_meta(&self, index: usize) -> Option<&ChapterMeta> {
        let own = self.chapters_content.get(index).map(|c| &c.chapter);
        match own {
            Some(meta) if !meta.title.trim().is_empty() => Some(meta),
            _ => self.book_info.chapters.get(index).or(own),
        }
    }

    pub fn image_for(&self, index: usize) -> Option<&str> {
        self.chapter_images
            .get(index)
            .and_then(|s| non_blank(s.as_deref()))
    }

    /// Check that every chapter entry has exactly one body.
    pub fn check_consistency(&self) -> std::result::Result<(), ContentMismatchError> {
        let meta = self.book_info.chapters.len();
        let content = self.chapters_content.len();
        if meta == content {
            Ok(())
        } else {
            Err(ContentMismatchError::LengthMismatch { meta, content })
        }
    }

    /// Apply an edit before re-rendering. Chapter patches whose index has no
    /// body are skipped and reported back.
    pub fn apply_patch(&mut self, patch: EditPatch) -> Vec<ContentMismatchError> {
        if let Some(info) = patch.book_info {
            if let Some(title) = info.title {
                self.book_info.title = title;
            }
            if let Some(subtitle) = info.subtitle {
                self.book_info.subtitle = subtitle;
            }
            if info.author.is_some() {
                self.book_info.author = info.author;
            }
        }

        let len = self.chapters_content.len();
        let mut skipped = Vec::new();
        for (index, ch) in patch.chapters_content.into_iter().enumerate() {
            let Some(target) = self.chapters_content.get_mut(index) else {
                let err = ContentMismatchError::IndexOutOfRange { index, len };
                log::warn!("ignoring chapter edit: {err}");
                skipped.push(err);
                continue;
            };
            if let Some(content) = ch.content {
                target.content = content;
            }
            if let Some(meta) = ch.chapter {
                // The table of contents reads `book_info.chapters`.
                if let Some(listed) = self.book_info.chapters.get_mut(index) {
                    meta.clone().apply(listed);
                }
                meta.apply(&mut target.chapter);
            }
        }
        skipped
    }
}

/// Edits submitted from the review screen.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EditPatch {
    pub book_info: Option<BookInfoPatch>,
    /// Positional: entry `i` patches `chapters_content[i]`.
    pub chapters_content: Vec<ChapterPatch>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BookInfoPatch {
    #[serde(alias = "book_title")]
    pub title: Option<String>,
    pub subtitle: Option<String>,
    pub author: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ChapterPatch {
    pub content: Option<String>,
    pub chapter: Option<ChapterMetaPatch>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ChapterMetaPatch {
    pub title: Option<String>,
    pub phase: Option<Phase>,
    pub purpose: Option<String>,
    pub before_state: Option<String>,
    pub after_state: Option<String>,
}

impl ChapterMetaPatch {
    fn apply(self, meta: &mut ChapterMeta) {
        if let Some(title) = self.title {
            meta.title = title;
        }
        if self.phase.is_some() {
            meta.phase = self.phase;
        }
        if self.purpose.is_some() {
            meta.purpose = self.purpose;
        }
        if self.before_state.is_some() {
            meta.before_state = self.before_state;
        }
        if self.after_state.is_some() {
            meta.after_state = self.after_state;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_chapters() -> EbookDocument {
        EbookDocument::from_json(
            r#"{
                "topic": "t",
                "book_info": {
                    "book_title": "책",
                    "chapters": [
                        {"chapter_num": 3, "title": "셋", "phase": "실행"},
                        {"title": "넷"}
                    ]
                },
                "chapters_content": [
                    {"chapter": {"chapter_num": 3, "title": "셋"}, "content": "a"},
                    {"chapter": {"title": "넷"}, "content": "b"}
                ]
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn phase_parses_known_and_unknown_labels() {
        assert_eq!(Phase::from("확신".to_string()), Phase::Confidence);
        assert_eq!(
            Phase::from("기타".to_string()),
            Phase::Other("기타".to_string())
        );
        let json = serde_json::to_string(&Phase::MethodDiscovery).unwrap();
        assert_eq!(json, "\"방법발견\"");
    }

    #[test]
    fn chapter_number_prefers_book_info_then_index() {
        let doc = two_chapters();
        assert_eq!(doc.chapter_number(0), 3);
        assert_eq!(doc.chapter_number(1), 2);
    }

    #[test]
    fn blank_title_falls_back() {
        let doc = EbookDocument::default();
        assert_eq!(doc.title(), DEFAULT_TITLE);
    }

    #[test]
    fn consistency_reports_length_mismatch() {
        let mut doc = two_chapters();
        assert!(doc.check_consistency().is_ok());
        doc.chapters_content.pop();
        assert_eq!(
            doc.check_consistency(),
            Err(ContentMismatchError::LengthMismatch { meta: 2, content: 1 })
        );
    }

    #[test]
    fn patch_updates_in_range_and_skips_the_rest() {
        let mut doc = two_chapters();
        let patch: EditPatch = serde_json::from_str(
            r#"{
                "book_info": {"book_title": "새 책"},
                "chapters_content": [
                    {"content": "바뀐 본문"},
                    {"chapter": {"title": "바뀐 제목", "phase": "확신"}},
                    {"content": "버려짐"}
                ]
            }"#,
        )
        .unwrap();
        let skipped = doc.apply_patch(patch);
        assert_eq!(doc.title(), "새 책");
        assert_eq!(doc.chapters_content[0].content, "바뀐 본문");
        assert_eq!(doc.chapters_content[1].chapter.title, "바뀐 제목");
        assert_eq!(doc.chapters_content[1].chapter.phase, Some(Phase::Confidence));
        assert_eq!(doc.book_info.chapters[1].title, "바뀐 제목");
        assert_eq!(doc.book_info.chapters[1].phase, Some(Phase::Confidence));
        let toc = crate::layout::toc_entries(&doc, None);
        assert_eq!(toc[1].title, "바뀐 제목");
        assert_eq!(
            skipped,
            vec![ContentMismatchError::IndexOutOfRange { index: 2, len: 2 }]
        );
    }

    #[test]
    fn analysis_rows_skip_blank_values() {
        let a = Analysis {
            problem_solved: Some(ProblemSolved {
                time: Some("빨라짐".into()),
                money: Some("  ".into()),
                emotion: None,
            }),
            ..Analysis::default()
        };
        assert_eq!(a.problem_rows(), vec![("시간 절약", "빨라짐")]);
    }
}
