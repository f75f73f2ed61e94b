//! Markup tokenizer for chapter bodies.
//!
//! The content generator is instructed to write chapter text with four line
//! conventions, and this is the only structure the engines rely on:
//!
//! | line                    | block                               |
//! |-------------------------|-------------------------------------|
//! | `== Heading ==`         | [`ContentBlock::Heading`]           |
//! | `[Label] rest`          | [`ContentBlock::HighlightLabel`]    |
//! | `- item`, `• item`, ... | [`ContentBlock::Bullet`]            |
//! | `1. item`, `2) item`    | [`ContentBlock::Bullet`] (`"N. item"`) |
//! | blank                   | [`ContentBlock::Blank`]             |
//!
//! Anything else is a [`ContentBlock::Paragraph`]. Every physical line is one
//! block; lines are never joined.

use serde::{Deserialize, Serialize};

/// Leading glyphs that mark an unordered list item.
pub const BULLET_GLYPHS: [char; 6] = ['-', '•', '●', '▶', '►', '✓'];

/// One tokenized line of chapter text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContentBlock {
    Heading(String),
    HighlightLabel { label: String, rest: Option<String> },
    Bullet(String),
    Paragraph(String),
    Blank,
}

/// Split `content` into blocks. Total: never fails, unknown lines become
/// paragraphs.
pub fn tokenize(content: &str) -> Vec<ContentBlock> {
    content.lines().map(tokenize_line).collect()
}

/// Classify a single line.
pub fn tokenize_line(line: &str) -> ContentBlock {
    let line = line.trim();
    if line.is_empty() {
        return ContentBlock::Blank;
    }
    if let Some(text) = heading(line) {
        return ContentBlock::Heading(text.to_string());
    }
    if let Some((label, rest)) = highlight_label(line) {
        return ContentBlock::HighlightLabel {
            label: label.to_string(),
            rest: (!rest.is_empty()).then(|| rest.to_string()),
        };
    }
    if let Some(text) = glyph_bullet(line) {
        return ContentBlock::Bullet(text.to_string());
    }
    if let Some((n, text)) = numbered_item(line) {
        return ContentBlock::Bullet(format!("{n}. {text}"));
    }
    ContentBlock::Paragraph(line.to_string())
}

/// `={2,} text ={2,}` with a non-empty inner text.
fn heading(line: &str) -> Option<&str> {
    let lead = line.len() - line.trim_start_matches('=').len();
    if lead < 2 {
        return None;
    }
    let body = &line[lead..];
    let inner = body.trim_end_matches('=');
    let trail = body.len() - inner.len();
    if trail >= 2 {
        let text = inner.trim();
        if !text.is_empty() {
            return Some(text);
        }
    }
    // A run of '=' only. The two fences may share one '=' run, leaving a
    // single '=' as the text once at least five are present.
    if inner.is_empty() && lead >= 5 {
        return Some("=");
    }
    None
}

/// `[label] rest` with a 2–20 character label that contains no `]`.
fn highlight_label(line: &str) -> Option<(&str, &str)> {
    let after = line.strip_prefix('[')?;
    let close = after.find(']')?;
    let label = &after[..close];
    let n = label.chars().count();
    if !(2..=20).contains(&n) {
        return None;
    }
    Some((label, after[close + 1..].trim()))
}

fn glyph_bullet(line: &str) -> Option<&str> {
    let mut chars = line.chars();
    let first = chars.next()?;
    if !BULLET_GLYPHS.contains(&first) {
        return None;
    }
    let rest = chars.as_str();
    if !rest.starts_with(char::is_whitespace) {
        return None;
    }
    let text = rest.trim_start();
    (!text.is_empty()).then_some(text)
}

/// `digits` + `.` or `)` + whitespace + text.
fn numbered_item(line: &str) -> Option<(&str, &str)> {
    let digits = line.len() - line.trim_start_matches(|c: char| c.is_ascii_digit()).len();
    if digits == 0 {
        return None;
    }
    let rest = &line[digits..];
    let rest = rest.strip_prefix('.').or_else(|| rest.strip_prefix(')'))?;
    if !rest.starts_with(char::is_whitespace) {
        return None;
    }
    let text = rest.trim_start();
    (!text.is_empty()).then_some((&line[..digits], text))
}

impl ContentBlock {
    /// Plain text carried by the block, without markup.
    pub fn text(&self) -> &str {
        match self {
            ContentBlock::Heading(t) | ContentBlock::Bullet(t) | ContentBlock::Paragraph(t) => t,
            ContentBlock::HighlightLabel { label, .. } => label,
            ContentBlock::Blank => "",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ContentBlock::*;

    fn p(s: &str) -> ContentBlock {
        Paragraph(s.to_string())
    }

    #[test]
    fn headings() {
        assert_eq!(tokenize_line("== A =="), Heading("A".into()));
        assert_eq!(tokenize_line("=== 월급의 한계 ==="), Heading("월급의 한계".into()));
        assert_eq!(tokenize_line("==A=="), Heading("A".into()));
        assert_eq!(tokenize_line("== a == b =="), Heading("a == b".into()));
        assert_eq!(tokenize_line("= A ="), p("= A ="));
        assert_eq!(tokenize_line("== A"), p("== A"));
        assert_eq!(tokenize_line("===="), p("===="));
        assert_eq!(tokenize_line("====="), Heading("=".into()));
    }

    #[test]
    fn highlight_labels() {
        assert_eq!(
            tokenize_line("[핵심 포인트] 포인트 본문"),
            HighlightLabel {
                label: "핵심 포인트".into(),
                rest: Some("포인트 본문".into())
            }
        );
        assert_eq!(
            tokenize_line("[1주차] 기반 다지기"),
            HighlightLabel {
                label: "1주차".into(),
                rest: Some("기반 다지기".into())
            }
        );
        assert_eq!(
            tokenize_line("[실전 팁]"),
            HighlightLabel {
                label: "실전 팁".into(),
                rest: None
            }
        );
        // Label too short / too long / unclosed.
        assert_eq!(tokenize_line("[a] x"), p("[a] x"));
        let long = format!("[{}] x", "가".repeat(21));
        assert_eq!(tokenize_line(&long), p(&long));
        assert_eq!(tokenize_line("[열림 x"), p("[열림 x"));
    }

    #[test]
    fn bullets_and_numbers() {
        assert_eq!(tokenize_line("- 항목1"), Bullet("항목1".into()));
        assert_eq!(tokenize_line("•  항목"), Bullet("항목".into()));
        assert_eq!(tokenize_line("✓ 확인"), Bullet("확인".into()));
        assert_eq!(tokenize_line("-항목"), p("-항목"));
        assert_eq!(tokenize_line("- "), p("-"));
        assert_eq!(tokenize_line("1. 현재 보유 스킬"), Bullet("1. 현재 보유 스킬".into()));
        assert_eq!(tokenize_line("12) 열두째"), Bullet("12. 열두째".into()));
        assert_eq!(tokenize_line("1단계: 활성 수입"), p("1단계: 활성 수입"));
        assert_eq!(tokenize_line("3.14 파이"), p("3.14 파이"));
    }

    #[test]
    fn blank_lines_and_trimming() {
        assert_eq!(
            tokenize("  a  \n\n \t\nb"),
            vec![p("a"), Blank, Blank, p("b")]
        );
        assert!(tokenize("").is_empty());
        assert_eq!(tokenize("a\n"), vec![p("a")]);
    }

    #[test]
    fn chapter_scenario() {
        let blocks = tokenize("== A ==\n짧은 문장\n[핵심 포인트] 포인트 본문\n- 항목1\n");
        assert_eq!(
            blocks,
            vec![
                Heading("A".into()),
                p("짧은 문장"),
                HighlightLabel {
                    label: "핵심 포인트".into(),
                    rest: Some("포인트 본문".into())
                },
                Bullet("항목1".into()),
            ]
        );
    }
}
