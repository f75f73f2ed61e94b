//! Pipeline – renders one document into every requested format.
//!
//! Each format runs on its own scoped thread over the shared, immutable
//! document. A failing format is recorded in the report and never stops
//! its siblings; only a request where nothing succeeds is an error.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::thread;

use serde::{Deserialize, Serialize};

use crate::assets::AssetFetcher;
use crate::config::LayoutConstants;
use crate::docx::render_docx;
use crate::error::{Error, Result};
use crate::fonts::FontRegistry;
use crate::hwpx::render_hwpx;
use crate::model::EbookDocument;
use crate::package::{file_name, write_artifact, Artifact, Format};
use crate::pagination::{build_chapter_page_index, ChapterPageIndex};
use crate::pdf_layout::layout_pdf;
use crate::pptx::{chapter_slide_index, render_pptx};
use crate::render::render_pdf;

/// Everything a format renderer reads. Shared by reference across threads.
#[derive(Clone, Copy)]
pub struct RenderContext<'a> {
    pub doc: &'a EbookDocument,
    pub constants: &'a LayoutConstants,
    pub fonts: &'a FontRegistry,
    pub assets: &'a dyn AssetFetcher,
}

/// Outcome of a multi-format request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationReport {
    /// Every requested format; `None` where that format failed.
    pub generated_files: BTreeMap<Format, Option<String>>,
    pub errors: BTreeMap<Format, String>,
}

impl GenerationReport {
    pub fn succeeded(&self) -> impl Iterator<Item = (Format, &str)> {
        self.generated_files
            .iter()
            .filter_map(|(f, name)| name.as_deref().map(|n| (*f, n)))
    }

    pub fn is_complete(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|_| "{}".to_string())
    }
}

/// Render `format` to bytes without touching the filesystem.
pub fn render(format: Format, ctx: RenderContext<'_>) -> Result<Vec<u8>> {
    match format {
        Format::Pdf => {
            let pages = layout_pdf(ctx.doc, ctx.constants, ctx.fonts, ctx.assets)?;
            render_pdf(&pages, ctx.fonts, ctx.assets)
        }
        Format::Docx => render_docx(ctx.doc, ctx.constants),
        Format::Pptx => render_pptx(ctx.doc, ctx.constants),
        Format::Hwpx => render_hwpx(ctx.doc, ctx.constants),
    }
}

/// Render `format` and write it under `out_dir`.
pub fn generate(format: Format, ctx: RenderContext<'_>, out_dir: &Path) -> Result<Artifact> {
    let bytes = render(format, ctx)?;
    let name = file_name(ctx.doc.title(), format);
    Ok(write_artifact(out_dir, &name, &bytes)?)
}

/// Render every format in `formats` concurrently into `out_dir`.
///
/// Duplicate formats are rendered once. Returns
/// [`Error::AllFormatsFailed`] when no format succeeded.
pub fn generate_all(
    formats: &[Format],
    ctx: RenderContext<'_>,
    out_dir: &Path,
) -> Result<GenerationReport> {
    run_isolated(formats, |format| generate(format, ctx, out_dir))
}

/// Run `job` once per distinct format on scoped threads and collect the
/// outcomes. A job that panics counts as that format's failure.
pub fn run_isolated<F>(formats: &[Format], job: F) -> Result<GenerationReport>
where
    F: Fn(Format) -> Result<Artifact> + Sync,
{
    let requested: BTreeSet<Format> = formats.iter().copied().collect();
    if requested.is_empty() {
        return Err(Error::Config("no output formats requested".to_string()));
    }

    let job = &job;
    let outcomes: Vec<(Format, std::result::Result<Artifact, String>)> = thread::scope(|s| {
        let handles: Vec<_> = requested
            .iter()
            .map(|&format| (format, s.spawn(move || job(format))))
            .collect();
        handles
            .into_iter()
            .map(|(format, handle)| {
                let outcome = match handle.join() {
                    Ok(result) => result.map_err(|e| e.to_string()),
                    Err(_) => Err(format!("{format} renderer panicked")),
                };
                (format, outcome)
            })
            .collect()
    });

    let mut report = GenerationReport::default();
    for (format, outcome) in outcomes {
        match outcome {
            Ok(artifact) => {
                log::info!("{format}: wrote {}", artifact.path.display());
                report
                    .generated_files
                    .insert(format, Some(artifact.file_name));
            }
            Err(message) => {
                log::warn!("{format} generation failed: {message}");
                report.generated_files.insert(format, None);
                report.errors.insert(format, message);
            }
        }
    }

    if report.succeeded().next().is_none() {
        let summary = report
            .errors
            .iter()
            .map(|(f, e)| format!("{f}: {e}"))
            .collect::<Vec<_>>()
            .join("; ");
        return Err(Error::AllFormatsFailed(summary));
    }
    Ok(report)
}

/// The chapter → page (or slide) map `format` prints in its table of
/// contents.
///
/// PDF lays the document out for real; the word-processor formats use the
/// estimator; slides are counted exactly.
pub fn chapter_page_index(format: Format, ctx: RenderContext<'_>) -> Result<ChapterPageIndex> {
    match format {
        Format::Pdf => {
            Ok(layout_pdf(ctx.doc, ctx.constants, ctx.fonts, ctx.assets)?.chapter_pages())
        }
        Format::Docx | Format::Hwpx => build_chapter_page_index(ctx.doc, format, ctx.constants),
        Format::Pptx => {
            ctx.constants.validate()?;
            Ok(chapter_slide_index(ctx.doc))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::LocalAssets;
    use crate::error::PackagingError;
    use crate::fixtures::sample_document;
    use std::path::PathBuf;

    fn artifact(name: &str) -> Artifact {
        Artifact {
            path: PathBuf::from(name),
            file_name: name.to_string(),
        }
    }

    #[test]
    fn failures_are_isolated_per_format() {
        let report = run_isolated(&Format::ALL, |format| match format {
            Format::Docx => Err(PackagingError::Io {
                path: "out/book.docx".into(),
                source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
            }
            .into()),
            other => Ok(artifact(&format!("book.{other}"))),
        })
        .unwrap();

        assert_eq!(report.generated_files.len(), 4);
        assert_eq!(report.generated_files[&Format::Docx], None);
        assert_eq!(
            report.generated_files[&Format::Pdf].as_deref(),
            Some("book.pdf")
        );
        assert_eq!(report.errors.len(), 1);
        assert!(report.errors[&Format::Docx].contains("denied"));
        assert!(!report.is_complete());
    }

    #[test]
    fn panicking_renderer_is_contained() {
        let report = run_isolated(&[Format::Pptx, Format::Hwpx], |format| {
            if format == Format::Pptx {
                panic!("boom");
            }
            Ok(artifact("book.hwpx"))
        })
        .unwrap();
        assert!(report.errors[&Format::Pptx].contains("panicked"));
        assert_eq!(report.succeeded().count(), 1);
    }

    #[test]
    fn all_failed_is_a_single_error() {
        let err = run_isolated(&[Format::Pdf, Format::Hwpx], |_| {
            Err(Error::Render("no".into()))
        })
        .unwrap_err();
        match err {
            Error::AllFormatsFailed(msg) => {
                assert!(msg.contains("pdf: PDF rendering failed: no"));
                assert!(msg.contains("hwpx: "));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn duplicate_formats_render_once() {
        let calls = std::sync::atomic::AtomicUsize::new(0);
        let report = run_isolated(&[Format::Docx, Format::Docx], |_| {
            calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            Ok(artifact("book.docx"))
        })
        .unwrap();
        assert_eq!(calls.into_inner(), 1);
        assert_eq!(report.generated_files.len(), 1);
    }

    #[test]
    fn empty_request_is_rejected() {
        assert!(matches!(run_isolated(&[], |_| unreachable!()), Err(Error::Config(_))));
    }

    #[test]
    fn report_serializes_with_lowercase_keys() {
        let mut report = GenerationReport::default();
        report.generated_files.insert(Format::Pdf, Some("a.pdf".into()));
        report.generated_files.insert(Format::Hwpx, None);
        report.errors.insert(Format::Hwpx, "failed".into());
        let json: serde_json::Value = serde_json::from_str(&report.to_json()).unwrap();
        assert_eq!(json["generated_files"]["pdf"], "a.pdf");
        assert!(json["generated_files"]["hwpx"].is_null());
        assert_eq!(json["errors"]["hwpx"], "failed");
    }

    #[test]
    fn generate_writes_titled_file() {
        let dir = tempfile::tempdir().unwrap();
        let doc = sample_document();
        let constants = LayoutConstants::default();
        let fonts = FontRegistry::builtin();
        let assets = LocalAssets::new();
        let ctx = RenderContext {
            doc: &doc,
            constants: &constants,
            fonts: &fonts,
            assets: &assets,
        };
        let artifact = generate(Format::Hwpx, ctx, dir.path()).unwrap();
        assert_eq!(artifact.file_name, "퇴근 후 100만원 만들기.hwpx");
        assert!(artifact.path.exists());
    }

    #[test]
    fn slide_index_skips_the_estimator() {
        let doc = sample_document();
        let constants = LayoutConstants::default();
        let fonts = FontRegistry::builtin();
        let assets = LocalAssets::new();
        let ctx = RenderContext {
            doc: &doc,
            constants: &constants,
            fonts: &fonts,
            assets: &assets,
        };
        let index = chapter_page_index(Format::Pptx, ctx).unwrap();
        assert_eq!(index, chapter_slide_index(&doc));
        assert_eq!(index.len(), 4);
    }
}
