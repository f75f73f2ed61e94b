//! User configuration – the `LayoutConstants` snapshot every engine reads.
//!
//! The on-disk file keeps the historical `pdf_*` key names. Keys that belong
//! to the content-generation side (model names, prompt texts) are accepted and
//! ignored, so one `user_config.json` can serve both programs.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, MetricsError, Result};

/// A4 portrait in points.
pub const A4_WIDTH_PT: f32 = 595.28;
pub const A4_HEIGHT_PT: f32 = 841.89;

/// Read-only layout configuration for one generation request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConstants {
    #[serde(rename = "pdf_font")]
    pub font_family: String,
    #[serde(rename = "pdf_font_size")]
    pub body_size: f32,
    #[serde(rename = "pdf_heading_size")]
    pub heading_size: f32,
    #[serde(rename = "pdf_subheading_size")]
    pub subheading_size: f32,
    #[serde(rename = "pdf_line_spacing")]
    pub line_spacing: f32,
    #[serde(rename = "pdf_margin_top")]
    pub margin_top: f32,
    #[serde(rename = "pdf_margin_bottom")]
    pub margin_bottom: f32,
    #[serde(rename = "pdf_margin_left")]
    pub margin_left: f32,
    #[serde(rename = "pdf_margin_right")]
    pub margin_right: f32,
    pub page_width: f32,
    pub page_height: f32,
    pub output_dir: PathBuf,
    /// Only used upstream to size generated content.
    pub target_pages_min: u32,
    pub target_pages_max: u32,
    /// Extra family → font file mappings, consulted before the built-in table.
    pub font_paths: BTreeMap<String, PathBuf>,
}

impl Default for LayoutConstants {
    fn default() -> Self {
        Self {
            font_family: default_font_family().to_string(),
            body_size: 11.0,
            heading_size: 16.0,
            subheading_size: 13.0,
            line_spacing: 1.6,
            margin_top: 72.0,
            margin_bottom: 72.0,
            margin_left: 60.0,
            margin_right: 60.0,
            page_width: A4_WIDTH_PT,
            page_height: A4_HEIGHT_PT,
            output_dir: PathBuf::from("static").join("output"),
            target_pages_min: 100,
            target_pages_max: 150,
            font_paths: BTreeMap::new(),
        }
    }
}

fn default_font_family() -> &'static str {
    if cfg!(target_os = "windows") {
        "MalgunGothic"
    } else {
        "AppleGothic"
    }
}

impl LayoutConstants {
    /// Load from a JSON file. A missing file yields the defaults; a file that
    /// exists but cannot be parsed is an error.
    pub fn load(path: &Path) -> Result<Self> {
        match fs::read_to_string(path) {
            Ok(raw) => Self::from_json(&raw),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::debug!("no config at {}, using defaults", path.display());
                Ok(Self::default())
            }
            Err(e) => Err(Error::Io(e)),
        }
    }

    /// Parse a JSON object, filling absent keys with defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        let constants: Self = serde_json::from_str(json)
            .map_err(|e| Error::Config(format!("malformed configuration: {e}")))?;
        constants.validate()?;
        Ok(constants)
    }

    /// Write as pretty JSON, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    /// Width of the text column between the left and right margins.
    pub fn content_width(&self) -> f32 {
        self.page_width - self.margin_left - self.margin_right
    }

    /// Height available between the top and bottom margins.
    pub fn content_height(&self) -> f32 {
        self.page_height - self.margin_top - self.margin_bottom
    }

    /// Reject sizes the line model cannot work with.
    pub fn validate(&self) -> std::result::Result<(), MetricsError> {
        for (value, name) in [
            (self.body_size, "pdf_font_size"),
            (self.heading_size, "pdf_heading_size"),
            (self.subheading_size, "pdf_subheading_size"),
            (self.line_spacing, "pdf_line_spacing"),
        ] {
            if !(value > 0.0) {
                return Err(MetricsError::InvalidConstant { name, value });
            }
        }
        if !(self.content_width() > 0.0) {
            return Err(MetricsError::InvalidColumnWidth(self.content_width()));
        }
        if !(self.content_height() > 0.0) {
            return Err(MetricsError::InvalidConstant {
                name: "content height",
                value: self.content_height(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_a4_with_book_margins() {
        let c = LayoutConstants::default();
        assert_eq!(c.body_size, 11.0);
        assert_eq!(c.line_spacing, 1.6);
        assert!((c.content_width() - 475.28).abs() < 0.01);
        assert!((c.content_height() - 697.89).abs() < 0.01);
    }

    #[test]
    fn partial_json_keeps_defaults_and_ignores_unknown_keys() {
        let c = LayoutConstants::from_json(
            r#"{"pdf_font_size": 12, "model": "whatever", "prompt_toc_rules": "..."}"#,
        )
        .unwrap();
        assert_eq!(c.body_size, 12.0);
        assert_eq!(c.heading_size, 16.0);
        assert_eq!(c.margin_left, 60.0);
    }

    #[test]
    fn malformed_json_is_a_config_error() {
        let err = LayoutConstants::from_json("{not json").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn zero_font_size_is_rejected() {
        let err = LayoutConstants::from_json(r#"{"pdf_font_size": 0}"#).unwrap_err();
        assert!(matches!(
            err,
            Error::Metrics(MetricsError::InvalidConstant { name: "pdf_font_size", .. })
        ));
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let c = LayoutConstants::load(&dir.path().join("user_config.json")).unwrap();
        assert_eq!(c, LayoutConstants::default());
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("user_config.json");
        let c = LayoutConstants {
            line_spacing: 1.8,
            ..LayoutConstants::default()
        };
        c.save(&path).unwrap();
        assert_eq!(LayoutConstants::load(&path).unwrap(), c);
    }
}
