//! Font discovery and text measurement using `ttf-parser`.
//!
//! A [`FontRegistry`] is built once per request from [`LayoutConstants`] and
//! passed by reference to the engines that wrap text for real. When no font
//! file can be found it falls back to builtin Helvetica metrics with a
//! Hangul-aware width heuristic.

use std::fs;
use std::path::{Path, PathBuf};

use crate::config::LayoutConstants;
use crate::error::{Error, Result};

/// Family name used when no font file is available.
pub const BUILTIN_FAMILY: &str = "Helvetica";

/// Known locations for the Korean families the configuration offers.
const KNOWN_FONT_PATHS: &[(&str, &str)] = &[
    ("AppleGothic", "/System/Library/Fonts/Supplemental/AppleGothic.ttf"),
    ("AppleMyungjo", "/System/Library/Fonts/Supplemental/AppleMyungjo.ttf"),
    ("NotoSansGothic", "/System/Library/Fonts/Supplemental/NotoSansGothic-Regular.ttf"),
    ("MalgunGothic", "C:/Windows/Fonts/malgun.ttf"),
    ("Batang", "C:/Windows/Fonts/batang.ttc"),
    ("Gulim", "C:/Windows/Fonts/gulim.ttc"),
];

#[cfg(target_os = "windows")]
const FALLBACK_FONTS: &[(&str, &str)] = &[
    ("MalgunGothic", "C:/Windows/Fonts/malgun.ttf"),
    ("Batang", "C:/Windows/Fonts/batang.ttc"),
    ("Gulim", "C:/Windows/Fonts/gulim.ttc"),
    ("Dotum", "C:/Windows/Fonts/dotum.ttc"),
];

#[cfg(target_os = "macos")]
const FALLBACK_FONTS: &[(&str, &str)] = &[
    ("AppleGothic", "/System/Library/Fonts/Supplemental/AppleGothic.ttf"),
    ("AppleMyungjo", "/System/Library/Fonts/Supplemental/AppleMyungjo.ttf"),
];

#[cfg(not(any(target_os = "windows", target_os = "macos")))]
const FALLBACK_FONTS: &[(&str, &str)] = &[
    ("NanumGothic", "/usr/share/fonts/truetype/nanum/NanumGothic.ttf"),
    ("NotoSansCJK", "/usr/share/fonts/opentype/noto/NotoSansCJK-Regular.ttc"),
    ("NotoSansCJK", "/usr/share/fonts/noto-cjk/NotoSansCJK-Regular.ttc"),
];

const FONT_EXTENSIONS: [&str; 3] = ["ttf", "ttc", "otf"];

/// A loaded font face with metrics.
#[derive(Clone)]
pub struct FontData {
    /// Raw font bytes (kept alive for ttf-parser's zero-copy API).
    pub bytes: Vec<u8>,
    pub units_per_em: f32,
    pub ascender: f32,
    pub descender: f32,
}

/// The single text face used by a request.
#[derive(Clone)]
pub struct FontRegistry {
    family: String,
    path: Option<PathBuf>,
    data: Option<FontData>,
}

impl std::fmt::Debug for FontRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FontRegistry")
            .field("family", &self.family)
            .field("path", &self.path)
            .field("embedded", &self.data.is_some())
            .finish()
    }
}

impl Default for FontRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

impl FontRegistry {
    /// Helvetica metrics, nothing to embed.
    pub fn builtin() -> Self {
        Self {
            family: BUILTIN_FAMILY.to_string(),
            path: None,
            data: None,
        }
    }

    /// Load a TTF/OTF/TTC face from bytes.
    pub fn from_bytes(family: &str, bytes: Vec<u8>) -> Result<Self> {
        let face = ttf_parser::Face::parse(&bytes, 0)
            .map_err(|e| Error::Font(format!("failed to parse {family}: {e}")))?;
        let data = FontData {
            units_per_em: face.units_per_em() as f32,
            ascender: face.ascender() as f32,
            descender: face.descender() as f32,
            bytes,
        };
        Ok(Self {
            family: family.to_string(),
            path: None,
            data: Some(data),
        })
    }

    pub fn from_path(family: &str, path: &Path) -> Result<Self> {
        let bytes = fs::read(path)?;
        let mut registry = Self::from_bytes(family, bytes)?;
        registry.path = Some(path.to_path_buf());
        Ok(registry)
    }

    /// Resolve the configured family: explicit `font_paths`, the built-in
    /// table, a scan of the system font directories, then the per-platform
    /// fallback list. Ends at builtin metrics.
    pub fn discover(constants: &LayoutConstants) -> Self {
        let family = constants.font_family.as_str();
        if let Some(path) = find_font_path(family, constants) {
            match Self::from_path(family, &path) {
                Ok(registry) => {
                    log::debug!("using font {family} from {}", path.display());
                    return registry;
                }
                Err(e) => log::warn!("font {family} at {} unusable: {e}", path.display()),
            }
        }
        for (name, path) in FALLBACK_FONTS {
            let path = Path::new(path);
            if !path.exists() {
                continue;
            }
            if let Ok(registry) = Self::from_path(name, path) {
                log::warn!("font {family} not found, falling back to {name}");
                return registry;
            }
        }
        log::warn!("font {family} not found, using builtin {BUILTIN_FAMILY} metrics");
        Self::builtin()
    }

    pub fn family(&self) -> &str {
        &self.family
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Whether real font bytes are loaded.
    pub fn has_real_font(&self) -> bool {
        self.data.is_some()
    }

    /// Font bytes for embedding in the PDF.
    pub fn font_bytes(&self) -> Option<&[u8]> {
        self.data.as_ref().map(|d| d.bytes.as_slice())
    }

    /// Width of `text` at `font_size` points.
    pub fn measure(&self, text: &str, font_size: f32) -> f32 {
        let face = self.face();
        text.chars()
            .map(|ch| self.advance(face.as_ref(), ch, font_size))
            .sum()
    }

    /// Distance from the top of a line box to the baseline.
    pub fn ascender(&self, font_size: f32) -> f32 {
        match &self.data {
            Some(d) if d.units_per_em > 0.0 => d.ascender * font_size / d.units_per_em,
            _ => font_size * 0.75,
        }
    }

    fn face(&self) -> Option<ttf_parser::Face<'_>> {
        self.data
            .as_ref()
            .and_then(|d| ttf_parser::Face::parse(&d.bytes, 0).ok())
    }

    fn advance(&self, face: Option<&ttf_parser::Face<'_>>, ch: char, font_size: f32) -> f32 {
        if let (Some(face), Some(data)) = (face, &self.data) {
            if let Some(gid) = face.glyph_index(ch) {
                let advance = face.glyph_hor_advance(gid).unwrap_or(0);
                return advance as f32 * font_size / data.units_per_em;
            }
        }
        heuristic_advance(ch, font_size)
    }
}

/// Full-width glyphs are one em, everything else half an em.
fn heuristic_advance(ch: char, font_size: f32) -> f32 {
    if is_wide(ch) {
        font_size
    } else {
        font_size * 0.5
    }
}

/// Hangul, CJK ideographs, kana and full-width forms.
pub fn is_wide(ch: char) -> bool {
    matches!(ch as u32,
        0x1100..=0x11FF
        | 0x2E80..=0x303E
        | 0x3041..=0x33FF
        | 0x3400..=0x4DBF
        | 0x4E00..=0x9FFF
        | 0xA960..=0xA97F
        | 0xAC00..=0xD7FF
        | 0xF900..=0xFAFF
        | 0xFF00..=0xFF60
        | 0xFFE0..=0xFFE6)
}

/// Replace glyphs the embedded text fonts cannot draw (emoji, dingbats,
/// variation selectors, zero-width joiners, astral plane) with a space.
/// Character count is preserved.
pub fn strip_unsupported(text: &str) -> String {
    text.chars()
        .map(|ch| {
            let cp = ch as u32;
            let unsupported = cp >= 0x10000
                || (0x2600..=0x27BF).contains(&cp)
                || (0xFE00..=0xFE0F).contains(&cp)
                || (0x200B..=0x200D).contains(&cp);
            if unsupported {
                ' '
            } else {
                ch
            }
        })
        .collect()
}

/// Character-level wrap to `max_width` points.
///
/// On overflow the line breaks at the last space if it lies within the last
/// 12 characters, otherwise right before the overflowing character.
pub fn wrap_text(text: &str, font_size: f32, max_width: f32, fonts: &FontRegistry) -> Vec<String> {
    if text.is_empty() {
        return Vec::new();
    }
    if max_width <= 0.0 {
        return vec![text.to_string()];
    }

    let face = fonts.face();
    let width_of = |ch: char| fonts.advance(face.as_ref(), ch, font_size);

    let mut lines = Vec::new();
    for paragraph in text.split('\n') {
        let mut current: Vec<char> = Vec::new();
        let mut width = 0.0f32;
        for ch in paragraph.chars() {
            let w = width_of(ch);
            if width + w > max_width && !current.is_empty() {
                let last_space = current.iter().rposition(|c| *c == ' ');
                let floor = current.len().saturating_sub(12);
                match last_space {
                    Some(at) if at > floor => {
                        lines.push(current[..at].iter().collect());
                        current.drain(..=at);
                        current.push(ch);
                    }
                    _ => {
                        lines.push(current.iter().collect());
                        current.clear();
                        current.push(ch);
                    }
                }
                width = current.iter().map(|c| width_of(*c)).sum();
            } else {
                current.push(ch);
                width += w;
            }
        }
        if !current.is_empty() {
            lines.push(current.into_iter().collect());
        }
    }
    lines
}

/// Locate a font file for `family`.
fn find_font_path(family: &str, constants: &LayoutConstants) -> Option<PathBuf> {
    if let Some(path) = constants.font_paths.get(family) {
        if path.exists() {
            return Some(path.clone());
        }
    }
    if let Some((_, path)) = KNOWN_FONT_PATHS.iter().find(|(name, _)| *name == family) {
        let path = Path::new(path);
        if path.exists() {
            return Some(path.to_path_buf());
        }
    }
    let needle = family.to_lowercase();
    search_dirs()
        .iter()
        .find_map(|dir| scan_dir(dir, &needle, 2))
}

fn search_dirs() -> Vec<PathBuf> {
    let mut dirs: Vec<PathBuf> = [
        "/System/Library/Fonts/Supplemental",
        "/System/Library/Fonts",
        "/Library/Fonts",
        "C:/Windows/Fonts",
        "/usr/share/fonts",
        "/usr/local/share/fonts",
    ]
    .iter()
    .map(PathBuf::from)
    .collect();
    if let Some(home) = std::env::var_os("HOME").or_else(|| std::env::var_os("USERPROFILE")) {
        let home = PathBuf::from(home);
        dirs.push(home.join("Library").join("Fonts"));
        dirs.push(home.join(".fonts"));
        dirs.push(home.join(".local").join("share").join("fonts"));
        dirs.push(
            home.join("AppData")
                .join("Local")
                .join("Microsoft")
                .join("Windows")
                .join("Fonts"),
        );
    }
    dirs
}

/// Case-insensitive substring match on font file names, `depth` levels deep.
fn scan_dir(dir: &Path, needle: &str, depth: usize) -> Option<PathBuf> {
    let mut entries: Vec<PathBuf> = fs::read_dir(dir)
        .ok()?
        .filter_map(|e| e.ok().map(|e| e.path()))
        .collect();
    entries.sort();
    for path in &entries {
        let is_font = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| FONT_EXTENSIONS.contains(&e.to_lowercase().as_str()));
        let name_matches = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.to_lowercase().contains(needle));
        if is_font && name_matches {
            return Some(path.clone());
        }
    }
    if depth == 0 {
        return None;
    }
    entries
        .iter()
        .filter(|p| p.is_dir())
        .find_map(|p| scan_dir(p, needle, depth - 1))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn heuristic_text_width() {
        let fonts = FontRegistry::builtin();
        // 5 chars × 16 × 0.5 = 40
        assert!((fonts.measure("Hello", 16.0) - 40.0).abs() < 0.1);
        // Hangul is one em per syllable.
        assert!((fonts.measure("한글", 10.0) - 20.0).abs() < 0.1);
    }

    #[test]
    fn wrap_breaks_at_recent_space() {
        let fonts = FontRegistry::builtin();
        // 10pt Latin = 5pt per char; 60pt holds 12 chars.
        let lines = wrap_text("Hello world foo bar", 10.0, 60.0, &fonts);
        assert_eq!(lines, vec!["Hello world", "foo bar"]);
    }

    #[test]
    fn wrap_hard_breaks_without_space() {
        let fonts = FontRegistry::builtin();
        let lines = wrap_text(&"가".repeat(25), 10.0, 100.0, &fonts);
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0].chars().count(), 10);
        assert_eq!(lines[2].chars().count(), 5);
    }

    #[test]
    fn wrap_ignores_distant_space() {
        let fonts = FontRegistry::builtin();
        // Space at index 1; by the time the line overflows it is more than
        // 12 characters back.
        let text = format!("a {}", "b".repeat(30));
        let lines = wrap_text(&text, 10.0, 80.0, &fonts);
        assert_eq!(lines[0].chars().count(), 16);
    }

    #[test]
    fn empty_text_wraps_to_nothing() {
        assert!(wrap_text("", 10.0, 100.0, &FontRegistry::builtin()).is_empty());
    }

    #[test]
    fn unsupported_glyphs_become_spaces() {
        assert_eq!(strip_unsupported("좋아요 😀✓"), "좋아요   ");
        assert_eq!(strip_unsupported("a\u{200B}b"), "a b");
        assert_eq!(strip_unsupported("▶ 단계"), "▶ 단계");
    }

    #[test]
    fn missing_family_falls_back_without_panicking() {
        let constants = LayoutConstants {
            font_family: "DefinitelyNotInstalled-Font".to_string(),
            ..LayoutConstants::default()
        };
        let fonts = FontRegistry::discover(&constants);
        assert!(fonts.measure("abc", 10.0) > 0.0);
    }

    #[test]
    fn garbage_bytes_are_a_font_error() {
        let err = FontRegistry::from_bytes("Broken", vec![0, 1, 2, 3]).unwrap_err();
        assert!(matches!(err, Error::Font(_)));
    }
}
