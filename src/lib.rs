//! # ebook-forge – ebook layout, pagination and multi-format packaging
//!
//! Takes a structured ebook ([`model::EbookDocument`]) and lays it out for
//! four targets that share one content model. The stages are:
//!
//! 1. **Tokenize** – chapter markup → content blocks ([`markup`])
//! 2. **Estimate** – closed-form pagination and the chapter page index
//!    printed in the table of contents ([`pagination`], [`units`])
//! 3. **Lay out** – each format's engine walks the same section order
//!    ([`layout`]): fixed pages ([`pdf_layout`]), word-processor
//!    ([`docx`]), OWPML ([`hwpx`]) and slides ([`pptx`])
//! 4. **Package** – PDF bytes ([`render`]) or ZIP containers ([`package`])
//!
//! [`pipeline::generate_all`] renders every format concurrently and
//! isolates per-format failures. A C-compatible FFI surface is exposed via
//! the [`ffi`] module.

pub mod assets;
pub mod config;
pub mod docx;
pub mod error;
pub mod ffi;
pub mod fixtures;
pub mod fonts;
pub mod hwpx;
pub mod layout;
pub mod layout_config;
pub mod markup;
pub mod model;
pub mod package;
pub mod pagination;
pub mod pdf_layout;
pub mod pipeline;
pub mod pptx;
pub mod render;
pub mod units;

// Re-exports for convenience
pub use config::LayoutConstants;
pub use error::{Error, Result};
pub use model::EbookDocument;
pub use package::Format;
pub use pagination::{build_chapter_page_index, ChapterPageIndex};
pub use pipeline::{generate, generate_all, GenerationReport, RenderContext};
