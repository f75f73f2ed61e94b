//! Emitted pages – the frozen placement IR between the fixed-page layout
//! engine and the PDF renderer.
//!
//! Coordinates are in points with the origin at the page's top-left corner.
//! Text positions are baselines. Everything is already wrapped and measured;
//! the renderer only translates ops.

use serde::{Deserialize, Serialize};

use crate::pagination::ChapterPageIndex;

/// RGBA, channels in `0.0..=1.0`.
pub type Rgba = [f32; 4];

/// A complete fixed-page document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmittedPages {
    pub title: String,
    pub page_width_pt: f32,
    pub page_height_pt: f32,
    pub pages: Vec<PageLayout>,
}

/// One page: its ops in paint order and the chapters that start on it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PageLayout {
    /// 1-based.
    pub number: usize,
    pub ops: Vec<DrawOp>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub anchors: Vec<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Stroke {
    pub width: f32,
    pub color: Rgba,
}

/// One placement instruction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DrawOp {
    Rect {
        x: f32,
        y: f32,
        width: f32,
        height: f32,
        fill: Option<Rgba>,
        stroke: Option<Stroke>,
    },
    Ellipse {
        cx: f32,
        cy: f32,
        rx: f32,
        ry: f32,
        fill: Option<Rgba>,
        stroke: Option<Stroke>,
    },
    Line {
        x1: f32,
        y1: f32,
        x2: f32,
        y2: f32,
        stroke: Stroke,
    },
    Text {
        x: f32,
        /// Baseline.
        y: f32,
        size: f32,
        color: Rgba,
        #[serde(default)]
        bold: bool,
        text: String,
    },
    Image {
        x: f32,
        y: f32,
        width: f32,
        height: f32,
        src: String,
    },
}

impl EmittedPages {
    pub fn new(title: &str, page_width_pt: f32, page_height_pt: f32) -> Self {
        Self {
            title: title.to_string(),
            page_width_pt,
            page_height_pt,
            pages: Vec::new(),
        }
    }

    /// Chapter → page as physically laid out.
    pub fn chapter_pages(&self) -> ChapterPageIndex {
        let mut index = ChapterPageIndex::new();
        for page in &self.pages {
            for chapter in &page.anchors {
                index.record(*chapter, page.number);
            }
        }
        index
    }

    /// Every text run on page `number`, in paint order.
    pub fn page_text(&self, number: usize) -> Vec<&str> {
        self.pages
            .iter()
            .filter(|p| p.number == number)
            .flat_map(|p| p.ops.iter())
            .filter_map(|op| match op {
                DrawOp::Text { text, .. } => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Serialise to JSON.
    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_default()
    }

    /// Deserialise from JSON.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

impl PageLayout {
    pub fn new(number: usize) -> Self {
        Self {
            number,
            ..Self::default()
        }
    }

    pub fn is_blank(&self) -> bool {
        self.ops.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn anchors_build_chapter_index() {
        let mut doc = EmittedPages::new("t", 100.0, 100.0);
        let mut p3 = PageLayout::new(3);
        p3.anchors.push(1);
        let mut p7 = PageLayout::new(7);
        p7.anchors.push(2);
        doc.pages = vec![PageLayout::new(1), p3, p7];
        let index = doc.chapter_pages();
        assert_eq!(index.get(1), Some(3));
        assert_eq!(index.get(2), Some(7));
    }

    #[test]
    fn ops_are_tagged_in_json() {
        let op = DrawOp::Text {
            x: 1.0,
            y: 2.0,
            size: 10.0,
            color: [0.0, 0.0, 0.0, 1.0],
            bold: false,
            text: "가".into(),
        };
        let json = serde_json::to_string(&op).unwrap();
        assert!(json.contains("\"kind\":\"text\""));
        let mut doc = EmittedPages::new("t", 1.0, 1.0);
        doc.pages.push(PageLayout {
            number: 1,
            ops: vec![op],
            anchors: vec![],
        });
        assert_eq!(EmittedPages::from_json(&doc.to_json()).unwrap(), doc);
        assert_eq!(doc.page_text(1), vec!["가"]);
    }
}
