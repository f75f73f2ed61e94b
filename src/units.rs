//! Units and the closed-form line estimator.
//!
//! Points are the base unit. Every format-native measure converts through
//! them: HWPUNIT (1/100 pt) for OWPML, EMU for slide decks, twips for the
//! word-processor format.

use serde::{Deserialize, Serialize};

use crate::error::MetricsError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Unit {
    Point,
    Inch,
    Millimeter,
    Centimeter,
    /// OWPML native unit.
    HwpUnit,
    /// English Metric Unit, 914 400 per inch.
    Emu,
    /// 1/20 pt.
    Twip,
}

impl Unit {
    /// Size of one unit in points.
    pub fn points(self) -> f64 {
        match self {
            Unit::Point => 1.0,
            Unit::Inch => 72.0,
            Unit::Millimeter => 72.0 / 25.4,
            Unit::Centimeter => 72.0 / 2.54,
            Unit::HwpUnit => 0.01,
            Unit::Emu => 72.0 / 914_400.0,
            Unit::Twip => 1.0 / 20.0,
        }
    }
}

/// Convert `value` in `from` into points.
pub fn to_base_units(value: f64, from: Unit) -> f64 {
    value * from.points()
}

/// Convert a point value into `to`.
pub fn from_base_units(points: f64, to: Unit) -> f64 {
    points / to.points()
}

pub fn convert(value: f64, from: Unit, to: Unit) -> f64 {
    from_base_units(to_base_units(value, from), to)
}

/// Points → HWPUNIT, rounded to the nearest unit.
pub fn pt_to_hwp(pt: f32) -> i64 {
    from_base_units(pt as f64, Unit::HwpUnit).round() as i64
}

/// Millimeters → HWPUNIT, rounded to the nearest unit.
pub fn mm_to_hwp(mm: f64) -> i64 {
    convert(mm, Unit::Millimeter, Unit::HwpUnit).round() as i64
}

pub fn pt_to_emu(pt: f32) -> i64 {
    from_base_units(pt as f64, Unit::Emu).round() as i64
}

pub fn inch_to_emu(inches: f64) -> i64 {
    convert(inches, Unit::Inch, Unit::Emu).round() as i64
}

pub fn pt_to_twip(pt: f32) -> i64 {
    from_base_units(pt as f64, Unit::Twip).round() as i64
}

/// Average-glyph-width line model: every glyph is as wide as the font size.
///
/// This is the single shared formula behind all page estimates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LineEstimator {
    chars_per_line: usize,
}

impl LineEstimator {
    pub fn new(font_size_pt: f32, column_width_pt: f32) -> Result<Self, MetricsError> {
        if !(font_size_pt > 0.0) || !font_size_pt.is_finite() {
            return Err(MetricsError::InvalidFontSize(font_size_pt));
        }
        if !(column_width_pt > 0.0) || !column_width_pt.is_finite() {
            return Err(MetricsError::InvalidColumnWidth(column_width_pt));
        }
        let chars_per_line = (column_width_pt / font_size_pt).floor() as usize;
        if chars_per_line == 0 {
            return Err(MetricsError::ColumnTooNarrow {
                column: column_width_pt,
                font: font_size_pt,
            });
        }
        Ok(Self { chars_per_line })
    }

    pub fn chars_per_line(&self) -> usize {
        self.chars_per_line
    }

    /// `max(1, ceil(chars / chars_per_line))`.
    pub fn line_count(&self, text: &str) -> usize {
        let n = text.chars().count();
        n.div_ceil(self.chars_per_line).max(1)
    }
}

/// One-shot form of [`LineEstimator::line_count`].
pub fn estimate_line_count(
    text: &str,
    font_size_pt: f32,
    column_width_pt: f32,
) -> Result<usize, MetricsError> {
    Ok(LineEstimator::new(font_size_pt, column_width_pt)?.line_count(text))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn points_round_trip_through_every_unit() {
        for unit in [
            Unit::Point,
            Unit::Inch,
            Unit::Millimeter,
            Unit::Centimeter,
            Unit::HwpUnit,
            Unit::Emu,
            Unit::Twip,
        ] {
            let there = from_base_units(72.0, unit);
            let back = to_base_units(there, unit);
            assert!((back - 72.0).abs() < 1e-9, "{unit:?}: {back}");
        }
    }

    #[test]
    fn known_conversions() {
        assert!((convert(72.0, Unit::Point, Unit::Millimeter) - 25.4).abs() < 1e-9);
        assert_eq!(pt_to_hwp(11.0), 1100);
        assert_eq!(mm_to_hwp(210.0), 59528);
        assert_eq!(inch_to_emu(1.0), 914_400);
        assert_eq!(pt_to_twip(12.0), 240);
    }

    #[test]
    fn a4_page_in_hwpunit() {
        // 210 × 297 mm
        assert_eq!(pt_to_hwp(595.28), 59528);
        assert_eq!(pt_to_hwp(841.89), 84189);
    }

    #[test]
    fn hwpunit_rounds_instead_of_truncating() {
        // f32 stores 8.29 as 8.2899999...
        assert_eq!(pt_to_hwp(8.29), 829);
        assert_eq!(pt_to_hwp(10.006), 1001);
        assert_eq!(pt_to_hwp(10.004), 1000);
        assert_eq!(mm_to_hwp(15.0), 4252);
    }

    #[test]
    fn line_count_formula() {
        // floor(475.28 / 11) = 43 chars per line
        let est = LineEstimator::new(11.0, 475.28).unwrap();
        assert_eq!(est.chars_per_line(), 43);
        assert_eq!(est.line_count(""), 1);
        assert_eq!(est.line_count(&"가".repeat(43)), 1);
        assert_eq!(est.line_count(&"가".repeat(44)), 2);
        assert_eq!(est.line_count(&"a".repeat(87)), 3);
    }

    #[test]
    fn invalid_metrics_are_rejected() {
        assert_eq!(
            estimate_line_count("x", 0.0, 100.0),
            Err(MetricsError::InvalidFontSize(0.0))
        );
        assert_eq!(
            estimate_line_count("x", 10.0, -1.0),
            Err(MetricsError::InvalidColumnWidth(-1.0))
        );
        assert!(matches!(
            estimate_line_count("x", 20.0, 10.0),
            Err(MetricsError::ColumnTooNarrow { .. })
        ));
    }
}
