//! Error types for layout, pagination and packaging.

use thiserror::Error;

/// Crate-wide error.
#[derive(Error, Debug)]
pub enum Error {
    #[error("metrics error: {0}")]
    Metrics(#[from] MetricsError),

    #[error("asset error: {0}")]
    Asset(#[from] AssetFetchError),

    #[error("packaging error: {0}")]
    Packaging(#[from] PackagingError),

    #[error("content mismatch: {0}")]
    ContentMismatch(#[from] ContentMismatchError),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("invalid document JSON: {0}")]
    Document(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("font error: {0}")]
    Font(String),

    #[error("PDF rendering failed: {0}")]
    Render(String),

    #[error("every requested format failed: {0}")]
    AllFormatsFailed(String),
}

/// Invalid inputs to the line/height model. Fatal for the format being rendered.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MetricsError {
    #[error("font size must be positive, got {0}")]
    InvalidFontSize(f32),

    #[error("column width must be positive, got {0}")]
    InvalidColumnWidth(f32),

    #[error("column of {column}pt cannot hold a single {font}pt glyph")]
    ColumnTooNarrow { column: f32, font: f32 },

    #[error("{name} must be positive, got {value}")]
    InvalidConstant { name: &'static str, value: f32 },
}

/// An optional image could not be obtained. Always recovered by the caller.
#[derive(Error, Debug)]
pub enum AssetFetchError {
    #[error("unsupported image source: {0}")]
    Unsupported(String),

    #[error("failed to read image {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to decode image: {0}")]
    Decode(String),

    #[error("gave up after {attempts} attempts: {last}")]
    Exhausted { attempts: usize, last: String },
}

/// Writing a container or output file failed.
#[derive(Error, Debug)]
pub enum PackagingError {
    #[error("I/O error writing {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("ZIP error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("I/O error inside container: {0}")]
    Stream(#[from] std::io::Error),
}

/// `book_info.chapters` and `chapters_content` disagree.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ContentMismatchError {
    #[error("{meta} chapter entries but {content} chapter bodies")]
    LengthMismatch { meta: usize, content: usize },

    #[error("chapter index {index} is out of range (have {len})")]
    IndexOutOfRange { index: usize, len: usize },
}

pub type Result<T> = std::result::Result<T, Error>;
