//! Packaging – output formats, file naming and container assembly.
//!
//! Packaging never changes layout: every engine hands over finished bytes or
//! named XML parts, and this module only names, zips and writes them.

use std::fmt;
use std::fs;
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::error::{Error, PackagingError};
use crate::model::DEFAULT_TITLE;

/// Longest file stem kept from a title, in characters.
pub const MAX_STEM_CHARS: usize = 50;

/// Target formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    Pdf,
    Docx,
    Pptx,
    Hwpx,
}

impl Format {
    pub const ALL: [Format; 4] = [Format::Pdf, Format::Docx, Format::Pptx, Format::Hwpx];

    pub fn extension(self) -> &'static str {
        match self {
            Format::Pdf => "pdf",
            Format::Docx => "docx",
            Format::Pptx => "pptx",
            Format::Hwpx => "hwpx",
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for Format {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pdf" => Ok(Format::Pdf),
            "docx" => Ok(Format::Docx),
            "pptx" => Ok(Format::Pptx),
            "hwpx" => Ok(Format::Hwpx),
            other => Err(Error::Config(format!("unknown format '{other}'"))),
        }
    }
}

/// File stem for `title`: keeps letters, digits, `_`, whitespace and `-`,
/// truncates to [`MAX_STEM_CHARS`] characters, trims.
pub fn sanitize_filename(title: &str) -> String {
    let kept: String = title
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == '_' || *c == '-' || c.is_whitespace())
        .take(MAX_STEM_CHARS)
        .collect();
    let stem = kept.trim();
    if stem.is_empty() {
        DEFAULT_TITLE.to_string()
    } else {
        stem.to_string()
    }
}

/// `"{sanitized title}.{ext}"`.
pub fn file_name(title: &str, format: Format) -> String {
    format!("{}.{}", sanitize_filename(title), format.extension())
}

/// A finished output file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
    pub path: PathBuf,
    pub file_name: String,
}

/// Write `bytes` as `file_name` under `dir`, creating the directory.
pub fn write_artifact(dir: &Path, file_name: &str, bytes: &[u8]) -> Result<Artifact, PackagingError> {
    fs::create_dir_all(dir).map_err(|source| PackagingError::Io {
        path: dir.display().to_string(),
        source,
    })?;
    let path = dir.join(file_name);
    fs::write(&path, bytes).map_err(|source| PackagingError::Io {
        path: path.display().to_string(),
        source,
    })?;
    log::debug!("wrote {} ({} bytes)", path.display(), bytes.len());
    Ok(Artifact {
        path,
        file_name: file_name.to_string(),
    })
}

/// One named entry of a container.
#[derive(Debug, Clone)]
pub struct Part {
    pub name: String,
    pub bytes: Vec<u8>,
}

impl Part {
    pub fn new(name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            bytes: bytes.into(),
        }
    }

    pub fn xml(name: impl Into<String>, xml: String) -> Self {
        Self::new(name, xml.into_bytes())
    }
}

/// Assemble a ZIP container. When `mimetype` is given it is written first
/// and stored uncompressed; every other part is deflated in order.
pub fn write_zip(mimetype: Option<&str>, parts: &[Part]) -> Result<Vec<u8>, PackagingError> {
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let stored = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
    let deflated = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    if let Some(mime) = mimetype {
        zip.start_file("mimetype", stored)?;
        zip.write_all(mime.as_bytes())?;
    }
    for part in parts {
        zip.start_file(part.name.as_str(), deflated)?;
        zip.write_all(&part.bytes)?;
    }
    let cursor = zip.finish()?;
    Ok(cursor.into_inner())
}

/// Current UTC time as `YYYY-MM-DDTHH:MM:SSZ`, for package metadata.
pub fn timestamp() -> String {
    let now = OffsetDateTime::now_utc();
    now.replace_nanosecond(0)
        .unwrap_or(now)
        .format(&Rfc3339)
        .unwrap_or_else(|_| "1970-01-01T00:00:00Z".to_string())
}

/// Escape text for XML element content and attribute values.
pub fn escape_xml(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            // Control characters other than tab/newline are not valid XML 1.0.
            c if (c as u32) < 0x20 && c != '\t' && c != '\n' && c != '\r' => {}
            c => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    #[test]
    fn sanitizes_titles() {
        assert_eq!(sanitize_filename("퇴근 후 100만원 만들기!!"), "퇴근 후 100만원 만들기");
        assert_eq!(file_name("a/b:c", Format::Docx), "abc.docx");
        assert_eq!(sanitize_filename("!!!"), DEFAULT_TITLE);
        let long = "가".repeat(80);
        assert_eq!(sanitize_filename(&long).chars().count(), MAX_STEM_CHARS);
        assert_eq!(sanitize_filename("  x-y_z  "), "x-y_z");
    }

    #[test]
    fn formats_parse_and_display() {
        assert_eq!("PDF".parse::<Format>().unwrap(), Format::Pdf);
        assert_eq!(Format::Hwpx.to_string(), "hwpx");
        assert!("odt".parse::<Format>().is_err());
        assert_eq!(serde_json::to_string(&Format::Pptx).unwrap(), "\"pptx\"");
    }

    #[test]
    fn mimetype_is_first_and_stored() {
        let bytes = write_zip(
            Some("application/hwp+zip"),
            &[Part::new("a.xml", "<a/>"), Part::new("b.txt", "b")],
        )
        .unwrap();
        let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
        let mut first = archive.by_index(0).unwrap();
        assert_eq!(first.name(), "mimetype");
        assert_eq!(first.compression(), CompressionMethod::Stored);
        let mut mime = String::new();
        first.read_to_string(&mut mime).unwrap();
        assert_eq!(mime, "application/hwp+zip");
        drop(first);
        assert_eq!(archive.len(), 3);
        assert_eq!(archive.by_index(2).unwrap().name(), "b.txt");
    }

    #[test]
    fn escapes_markup() {
        assert_eq!(escape_xml("a<b & \"c\"'"), "a&lt;b &amp; &quot;c&quot;&apos;");
        assert_eq!(escape_xml("x\u{1}y"), "xy");
    }

    #[test]
    fn timestamp_has_whole_seconds() {
        let ts = timestamp();
        assert_eq!(ts.len(), 20, "{ts}");
        assert!(ts.ends_with('Z'));
    }

    #[test]
    fn writes_into_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("nested");
        let artifact = write_artifact(&out, "x.pdf", b"%PDF-").unwrap();
        assert_eq!(artifact.file_name, "x.pdf");
        assert_eq!(fs::read(artifact.path).unwrap(), b"%PDF-");
    }
}
