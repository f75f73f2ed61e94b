//! PDF renderer – takes [`EmittedPages`] and produces PDF bytes using
//! `printpdf` (v0.8 ops-based API).

use std::collections::{BTreeSet, HashMap};
use std::f32::consts::TAU;

use printpdf::*;

use crate::assets::{load_image, AssetFetcher};
use crate::error::{Error, Result};
use crate::fonts::FontRegistry;
use crate::layout_config::{DrawOp, EmittedPages, Rgba, Stroke};

/// Segments used to approximate an ellipse outline.
const ELLIPSE_SEGMENTS: usize = 32;

/// pt → mm
const MM_PER_PT: f32 = 0.352778;

/// A printpdf XObject together with the pixel dimensions of the source image.
struct ImageResource {
    xobj_id: XObjectId,
    px_width: u32,
    px_height: u32,
}

/// How text is written: the embedded face, or builtin Helvetica.
#[derive(Clone)]
enum TextFace {
    Embedded(FontId),
    Builtin,
}

/// Render emitted pages into PDF bytes.
///
/// The registry's font is embedded when one was found; otherwise text is
/// written with builtin Helvetica, which can only show Latin-1. Images that
/// cannot be fetched or decoded are skipped with a warning.
pub fn render_pdf(
    pages: &EmittedPages,
    fonts: &FontRegistry,
    assets: &dyn AssetFetcher,
) -> Result<Vec<u8>> {
    let page_w = Mm(pages.page_width_pt * MM_PER_PT);
    let page_h = Mm(pages.page_height_pt * MM_PER_PT);

    let mut doc = PdfDocument::new(&pages.title);
    let mut warnings: Vec<PdfWarnMsg> = Vec::new();

    let face = match fonts.font_bytes() {
        Some(bytes) => match ParsedFont::from_bytes(bytes, 0, &mut warnings) {
            Some(parsed) => TextFace::Embedded(doc.add_font(&parsed)),
            None => {
                log::warn!(
                    "could not embed font {}; falling back to builtin Helvetica",
                    fonts.family()
                );
                TextFace::Builtin
            }
        },
        None => TextFace::Builtin,
    };

    // ── Pre-register all images ────────────────────────────────────────────
    let srcs: BTreeSet<&str> = pages
        .pages
        .iter()
        .flat_map(|p| p.ops.iter())
        .filter_map(|op| match op {
            DrawOp::Image { src, .. } => Some(src.as_str()),
            _ => None,
        })
        .collect();

    let mut images: HashMap<&str, ImageResource> = HashMap::new();
    for src in srcs {
        let Some(loaded) = load_image(assets, src) else {
            continue;
        };
        let raw = match RawImage::decode_from_bytes(&loaded.bytes, &mut warnings) {
            Ok(raw) => raw,
            Err(e) => {
                log::warn!("skipping image, PDF encode error: {e}");
                continue;
            }
        };
        images.insert(
            src,
            ImageResource {
                xobj_id: doc.add_image(&raw),
                px_width: loaded.width,
                px_height: loaded.height,
            },
        );
    }

    // ── Render pages ──────────────────────────────────────────────────────
    let mut out = Vec::with_capacity(pages.pages.len());
    for page in &pages.pages {
        let mut ops = Vec::with_capacity(page.ops.len() * 4);
        for op in &page.ops {
            render_op(&mut ops, op, pages.page_height_pt, &face, &images);
        }
        out.push(PdfPage::new(page_w, page_h, ops));
    }

    // Ensure at least one page.
    if out.is_empty() {
        out.push(PdfPage::new(page_w, page_h, Vec::new()));
    }

    doc.with_pages(out);
    let bytes = doc.save(&PdfSaveOptions::default(), &mut warnings);
    if bytes.is_empty() {
        return Err(Error::Render("printpdf produced no output".into()));
    }
    Ok(bytes)
}

fn rgb(c: Rgba) -> Color {
    Color::Rgb(Rgb {
        r: c[0],
        g: c[1],
        b: c[2],
        icc_profile: None,
    })
}

fn point(x: f32, y: f32) -> LinePoint {
    LinePoint {
        p: Point { x: Pt(x), y: Pt(y) },
        bezier: false,
    }
}

/// Fill and/or outline a closed path given in PDF coordinates.
fn paint_path(ops: &mut Vec<Op>, points: Vec<LinePoint>, fill: Option<Rgba>, stroke: Option<&Stroke>) {
    if let Some(fill) = fill {
        ops.push(Op::SetFillColor { col: rgb(fill) });
        ops.push(Op::DrawPolygon {
            polygon: Polygon {
                rings: vec![PolygonRing {
                    points: points.clone(),
                }],
                mode: PaintMode::Fill,
                winding_order: WindingOrder::NonZero,
            },
        });
    }
    if let Some(stroke) = stroke {
        ops.push(Op::SetOutlineColor {
            col: rgb(stroke.color),
        });
        ops.push(Op::SetOutlineThickness {
            pt: Pt(stroke.width),
        });
        ops.push(Op::DrawLine {
            line: Line {
                points,
                is_closed: true,
            },
        });
    }
}

/// Translate one op. Layout coordinates have a top-left origin; PDF's is
/// bottom-left.
fn render_op(
    ops: &mut Vec<Op>,
    op: &DrawOp,
    page_height: f32,
    face: &TextFace,
    images: &HashMap<&str, ImageResource>,
) {
    match op {
        DrawOp::Rect {
            x,
            y,
            width,
            height,
            fill,
            stroke,
        } => {
            let top = page_height - y;
            let bottom = top - height;
            let points = vec![
                point(*x, bottom),
                point(x + width, bottom),
                point(x + width, top),
                point(*x, top),
            ];
            paint_path(ops, points, *fill, stroke.as_ref());
        }
        DrawOp::Ellipse {
            cx,
            cy,
            rx,
            ry,
            fill,
            stroke,
        } => {
            let center_y = page_height - cy;
            let points = (0..ELLIPSE_SEGMENTS)
                .map(|i| {
                    let t = TAU * i as f32 / ELLIPSE_SEGMENTS as f32;
                    point(cx + rx * t.cos(), center_y + ry * t.sin())
                })
                .collect();
            paint_path(ops, points, *fill, stroke.as_ref());
        }
        DrawOp::Line {
            x1,
            y1,
            x2,
            y2,
            stroke,
        } => {
            ops.push(Op::SetOutlineColor {
                col: rgb(stroke.color),
            });
            ops.push(Op::SetOutlineThickness {
                pt: Pt(stroke.width),
            });
            ops.push(Op::DrawLine {
                line: Line {
                    points: vec![
                        point(*x1, page_height - y1),
                        point(*x2, page_height - y2),
                    ],
                    is_closed: false,
                },
            });
        }
        DrawOp::Text {
            x,
            y,
            size,
            color,
            bold,
            text,
        } => {
            if text.is_empty() {
                return;
            }
            ops.push(Op::StartTextSection);
            ops.push(Op::SetTextCursor {
                pos: Point {
                    x: Pt(*x),
                    y: Pt(page_height - y),
                },
            });
            ops.push(Op::SetFillColor { col: rgb(*color) });
            match face {
                TextFace::Embedded(font) => {
                    // One face only: bold is a thin stroke over the fill.
                    if *bold {
                        ops.push(Op::SetOutlineColor { col: rgb(*color) });
                        ops.push(Op::SetOutlineThickness { pt: Pt(size * 0.03) });
                        ops.push(Op::SetTextRenderingMode {
                            mode: TextRenderingMode::FillStroke,
                        });
                    }
                    ops.push(Op::SetFontSize {
                        size: Pt(*size),
                        font: font.clone(),
                    });
                    ops.push(Op::WriteText {
                        items: vec![TextItem::Text(text.clone())],
                        font: font.clone(),
                    });
                    if *bold {
                        ops.push(Op::SetTextRenderingMode {
                            mode: TextRenderingMode::Fill,
                        });
                    }
                }
                TextFace::Builtin => {
                    let font = if *bold {
                        BuiltinFont::HelveticaBold
                    } else {
                        BuiltinFont::Helvetica
                    };
                    ops.push(Op::SetFontSizeBuiltinFont {
                        size: Pt(*size),
                        font,
                    });
                    ops.push(Op::WriteTextBuiltinFont {
                        items: vec![TextItem::Text(to_winlatin(text))],
                        font,
                    });
                }
            }
            ops.push(Op::EndTextSection);
        }
        DrawOp::Image {
            x,
            y,
            width,
            height,
            src,
        } => {
            let Some(res) = images.get(src.as_str()) else {
                return;
            };
            // At dpi=72 printpdf renders 1 px = 1 pt, so
            // scale = desired_pt / px_dim.
            let scale_x = if res.px_width > 0 {
                width / res.px_width as f32
            } else {
                1.0
            };
            let scale_y = if res.px_height > 0 {
                height / res.px_height as f32
            } else {
                1.0
            };
            ops.push(Op::UseXobject {
                id: res.xobj_id.clone(),
                transform: XObjectTransform {
                    translate_x: Some(Pt(*x)),
                    translate_y: Some(Pt(page_height - y - height)),
                    dpi: Some(72.0),
                    scale_x: Some(scale_x),
                    scale_y: Some(scale_y),
                    rotate: None,
                },
            });
        }
    }
}

/// Convert a UTF-8 string to raw Windows-1252 bytes then wrap in a String so
/// printpdf writes the bytes unchanged into the PDF stream (builtin fonts use
/// WinAnsiEncoding, so each glyph is one byte 0x00–0xFF).
fn to_winlatin(s: &str) -> String {
    let bytes: Vec<u8> = s
        .chars()
        .map(|c| match c {
            '\u{20AC}' => 0x80, // euro
            '\u{2026}' => 0x85, // ellipsis
            '\u{2018}' => 0x91,
            '\u{2019}' => 0x92,
            '\u{201C}' => 0x93,
            '\u{201D}' => 0x94,
            '\u{2022}' => 0x95, // bullet
            '\u{2013}' => 0x96,
            '\u{2014}' => 0x97,
            '\u{00A0}' => 0x20,
            c if (c as u32) < 256 => c as u8,
            _ => b'?',
        })
        .collect();
    // SAFETY: intentionally non-UTF-8 for 0x80-0x9F range; printpdf passes
    // these bytes straight to the PDF stream, decoded by WinAnsiEncoding.
    #[allow(unsafe_code)]
    unsafe {
        String::from_utf8_unchecked(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::LocalAssets;
    use crate::fixtures::PIXEL_PNG;
    use crate::layout_config::PageLayout;

    fn one_page(ops: Vec<DrawOp>) -> EmittedPages {
        let mut pages = EmittedPages::new("테스트", 595.28, 841.89);
        pages.pages.push(PageLayout {
            number: 1,
            ops,
            anchors: vec![],
        });
        pages
    }

    #[test]
    fn render_empty_document() {
        let pages = EmittedPages::new("empty", 595.28, 841.89);
        let bytes = render_pdf(&pages, &FontRegistry::builtin(), &LocalAssets::new()).unwrap();
        assert!(bytes.len() > 100, "PDF should have content");
        assert_eq!(&bytes[0..5], b"%PDF-");
    }

    #[test]
    fn renders_every_op_kind() {
        let stroke = Stroke {
            width: 1.0,
            color: [0.4, 0.4, 0.9, 1.0],
        };
        let pages = one_page(vec![
            DrawOp::Rect {
                x: 10.0,
                y: 10.0,
                width: 100.0,
                height: 20.0,
                fill: Some([0.9, 0.9, 1.0, 1.0]),
                stroke: Some(stroke),
            },
            DrawOp::Ellipse {
                cx: 50.0,
                cy: 50.0,
                rx: 8.0,
                ry: 8.0,
                fill: None,
                stroke: Some(stroke),
            },
            DrawOp::Line {
                x1: 0.0,
                y1: 100.0,
                x2: 200.0,
                y2: 100.0,
                stroke,
            },
            DrawOp::Text {
                x: 60.0,
                y: 140.0,
                size: 11.0,
                color: [0.2, 0.2, 0.2, 1.0],
                bold: true,
                text: "Chapter 1 • 시작".into(),
            },
            DrawOp::Image {
                x: 60.0,
                y: 200.0,
                width: 40.0,
                height: 40.0,
                src: PIXEL_PNG.into(),
            },
        ]);
        let bytes = render_pdf(&pages, &FontRegistry::builtin(), &LocalAssets::new()).unwrap();
        assert_eq!(&bytes[0..5], b"%PDF-");
    }

    #[test]
    fn missing_image_is_skipped() {
        let pages = one_page(vec![DrawOp::Image {
            x: 0.0,
            y: 0.0,
            width: 10.0,
            height: 10.0,
            src: "/no/such/image.png".into(),
        }]);
        assert!(render_pdf(&pages, &FontRegistry::builtin(), &LocalAssets::new()).is_ok());
    }

    #[test]
    fn winlatin_maps_bullets_and_replaces_hangul() {
        let s = to_winlatin("a•가");
        assert_eq!(s.as_bytes(), &[b'a', 0x95, b'?']);
    }
}
