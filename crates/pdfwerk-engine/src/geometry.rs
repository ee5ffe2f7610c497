// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Placement geometry for stamped text.
//
// All coordinates are PDF user space: origin at the bottom-left of the page,
// y growing upward, units in points. Functions here are pure so the same
// inputs always give bit-identical results.

use pdfwerk_core::config::WatermarkStyle;
use pdfwerk_core::types::{Anchor, NumberPosition, Rect, WatermarkPosition};

/// Smallest margin kept between stamped text and the page edge.
pub const MIN_MARGIN: f32 = 20.0;

/// Sizing of a watermark band relative to its page.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoxRatios {
    /// Box width as a fraction of the page width.
    pub width: f32,
    /// Box height as a fraction of the page height.
    pub height: f32,
    /// Margin as a fraction of the smaller page dimension.
    pub margin: f32,
}

impl Default for BoxRatios {
    fn default() -> Self {
        Self {
            width: 0.60,
            height: 0.15,
            margin: 0.03,
        }
    }
}

/// Margin for a page: `margin_ratio` of the smaller dimension, at least
/// [`MIN_MARGIN`].
pub fn margin(page: &Rect, margin_ratio: f32) -> f32 {
    (page.width.min(page.height) * margin_ratio).max(MIN_MARGIN)
}

/// Rectangle of a box anchored at `anchor` on `page`.
pub fn resolve_rect(page: &Rect, anchor: Anchor, ratios: BoxRatios) -> Rect {
    let margin = margin(page, ratios.margin);
    let width = page.width * ratios.width;
    let height = page.height * ratios.height;

    let left = page.x + margin;
    let center_x = page.x + (page.width - width) / 2.0;
    let right = page.right() - margin - width;
    let top = page.top() - margin - height;
    let middle = page.y + (page.height - height) / 2.0;
    let bottom = page.y + margin;

    let (x, y) = match anchor {
        Anchor::TopLeft => (left, top),
        Anchor::TopCenter => (center_x, top),
        Anchor::TopRight => (right, top),
        Anchor::MiddleLeft => (left, middle),
        Anchor::Center => (center_x, middle),
        Anchor::MiddleRight => (right, middle),
        Anchor::BottomLeft => (left, bottom),
        Anchor::BottomCenter => (center_x, bottom),
        Anchor::BottomRight => (right, bottom),
    };
    Rect::new(x, y, width, height)
}

/// Baseline origin for a page number of `text_width` points.
pub fn resolve_anchor(
    page: &Rect,
    position: NumberPosition,
    text_width: f32,
    font_size: f32,
    margin_ratio: f32,
) -> (f32, f32) {
    let margin = margin(page, margin_ratio);
    let x = match position {
        NumberPosition::TopLeft | NumberPosition::BottomLeft => page.x + margin,
        NumberPosition::TopCenter | NumberPosition::BottomCenter => {
            page.x + (page.width - text_width) / 2.0
        }
        NumberPosition::TopRight | NumberPosition::BottomRight => {
            page.right() - margin - text_width
        }
    };
    let y = if position.is_top() {
        page.top() - margin - font_size
    } else {
        page.y + margin
    };
    (x, y)
}

/// Where and how one piece of text is drawn.
#[derive(Debug, Clone, PartialEq)]
pub struct TextPlacement {
    pub text: String,
    /// Baseline origin of the first glyph.
    pub x: f32,
    pub y: f32,
    pub font_size: f32,
    /// Counter-clockwise rotation in degrees.
    pub angle: f32,
}

impl TextPlacement {
    /// Text matrix `[a b c d e f]` for the `Tm` operator.
    pub fn text_matrix(&self) -> [f32; 6] {
        let (sin, cos) = self.angle.to_radians().sin_cos();
        [cos, sin, -sin, cos, self.x, self.y]
    }
}

/// Lay out watermark text inside its anchored box. Diagonal text runs at
/// +45° through the box centre and may extend past the box.
pub fn layout_watermark(
    page: &Rect,
    position: WatermarkPosition,
    text: &str,
    style: &WatermarkStyle,
) -> TextPlacement {
    let band = resolve_rect(page, position.anchor, BoxRatios::default());
    let unit_width = text_width(text, 1.0).max(f32::EPSILON);
    let (angle, available) = if position.diagonal {
        (45.0f32, 0.8 * band.width.hypot(band.height))
    } else {
        (0.0f32, band.width)
    };
    let (min_font_size, max_font_size) = style.font_size_bounds();
    let font_size = (available / unit_width)
        .min(if position.diagonal { f32::MAX } else { band.height * 0.6 })
        .clamp(min_font_size, max_font_size);

    let width = text_width(text, font_size);
    let (center_x, center_y) = band.center();
    let (sin, cos) = angle.to_radians().sin_cos();
    // Centre the run on the band: back off half the width along the baseline
    // and a third of the font size across it.
    let half = width / 2.0;
    let drop = font_size / 3.0;
    TextPlacement {
        text: text.to_string(),
        x: center_x - cos * half + sin * drop,
        y: center_y - sin * half - cos * drop,
        font_size,
        angle,
    }
}

/// Lay out a page-number label.
pub fn layout_page_number(
    page: &Rect,
    position: NumberPosition,
    label: &str,
    font_size: f32,
) -> TextPlacement {
    let width = text_width(label, font_size);
    let (x, y) = resolve_anchor(page, position, width, font_size, BoxRatios::default().margin);
    TextPlacement {
        text: label.to_string(),
        x,
        y,
        font_size,
        angle: 0.0,
    }
}

/// Advance widths of Helvetica for ASCII 32..=126, in 1/1000 em.
const HELVETICA_WIDTHS: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278, // ' '../
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 278, 278, 584, 584, 584, 556, // 0..?
    1015, 667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833, 722, 778, // @..O
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 278, 278, 278, 469, 556, // P.._
    333, 556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833, 556, 556, // `..o
    556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500, 334, 260, 334, 584, // p..~
];

/// Width of `text` set in Helvetica at `font_size` points.
pub fn text_width(text: &str, font_size: f32) -> f32 {
    let units: u32 = text
        .chars()
        .map(|ch| match ch as u32 {
            code @ 32..=126 => u32::from(HELVETICA_WIDTHS[(code - 32) as usize]),
            _ => 556,
        })
        .sum();
    units as f32 * font_size / 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    const A4: Rect = Rect {
        x: 0.0,
        y: 0.0,
        width: 595.0,
        height: 842.0,
    };

    #[test]
    fn margin_has_a_floor() {
        assert_eq!(margin(&Rect::from_size(100.0, 100.0), 0.03), MIN_MARGIN);
        assert!((margin(&Rect::from_size(2000.0, 3000.0), 0.03) - 60.0).abs() < 1e-3);
    }

    #[test]
    fn corners_sit_at_the_margin() {
        let m = margin(&A4, 0.03);
        let top_left = resolve_rect(&A4, Anchor::TopLeft, BoxRatios::default());
        assert_eq!(top_left.x, m);
        assert!((top_left.top() - (A4.height - m)).abs() < 1e-3);

        let bottom_right = resolve_rect(&A4, Anchor::BottomRight, BoxRatios::default());
        assert!((bottom_right.right() - (A4.width - m)).abs() < 1e-3);
        assert_eq!(bottom_right.y, m);
    }

    #[test]
    fn center_is_centered() {
        let center = resolve_rect(&A4, Anchor::Center, BoxRatios::default());
        let (cx, cy) = center.center();
        assert!((cx - A4.width / 2.0).abs() < 1e-3);
        assert!((cy - A4.height / 2.0).abs() < 1e-3);
    }

    #[test]
    fn resolution_is_deterministic() {
        for anchor in Anchor::ALL {
            let first = resolve_rect(&A4, anchor, BoxRatios::default());
            let second = resolve_rect(&A4, anchor, BoxRatios::default());
            assert_eq!(first.x.to_bits(), second.x.to_bits());
            assert_eq!(first.y.to_bits(), second.y.to_bits());
            assert_eq!(first.width.to_bits(), second.width.to_bits());
            assert_eq!(first.height.to_bits(), second.height.to_bits());
        }
    }

    #[test]
    fn top_and_bottom_bands_do_not_overlap() {
        let ratios = BoxRatios::default();
        for page in [A4, Rect::from_size(842.0, 595.0), Rect::from_size(200.0, 200.0)] {
            let tops = [Anchor::TopLeft, Anchor::TopCenter, Anchor::TopRight];
            let middles = [Anchor::MiddleLeft, Anchor::Center, Anchor::MiddleRight];
            let bottoms = [Anchor::BottomLeft, Anchor::BottomCenter, Anchor::BottomRight];
            for (top, (middle, bottom)) in tops.iter().zip(middles.iter().zip(bottoms.iter())) {
                let top = resolve_rect(&page, *top, ratios);
                let middle = resolve_rect(&page, *middle, ratios);
                let bottom = resolve_rect(&page, *bottom, ratios);
                assert!(bottom.top() < top.y, "bottom band reaches into top band");
                assert!(middle.top() <= top.y && middle.y >= bottom.top());
            }
        }
    }

    #[test]
    fn boxes_stay_on_the_page() {
        for anchor in Anchor::ALL {
            let rect = resolve_rect(&A4, anchor, BoxRatios::default());
            assert!(rect.x >= 0.0 && rect.right() <= A4.width);
            assert!(rect.y >= 0.0 && rect.top() <= A4.height);
        }
    }

    #[test]
    fn page_number_anchors() {
        let m = margin(&A4, 0.03);
        let (x, y) = resolve_anchor(&A4, NumberPosition::BottomCenter, 50.0, 12.0, 0.03);
        assert!((x - (A4.width - 50.0) / 2.0).abs() < 1e-3);
        assert_eq!(y, m);

        let (x, y) = resolve_anchor(&A4, NumberPosition::TopRight, 50.0, 12.0, 0.03);
        assert!((x + 50.0 - (A4.width - m)).abs() < 1e-3);
        assert!((y - (A4.height - m - 12.0)).abs() < 1e-3);
    }

    #[test]
    fn straight_watermark_fits_its_band() {
        let style = WatermarkStyle::default();
        let position = WatermarkPosition::parse("top-center");
        let placement = layout_watermark(&A4, position, "CONFIDENTIAL", &style);
        let band = resolve_rect(&A4, Anchor::TopCenter, BoxRatios::default());
        assert_eq!(placement.angle, 0.0);
        assert!(placement.x >= band.x - 1e-3);
        assert!(placement.x + text_width("CONFIDENTIAL", placement.font_size) <= band.right() + 1e-3);
        assert!(placement.y > band.y && placement.y < band.top());
    }

    #[test]
    fn diagonal_watermark_is_rotated_and_centered() {
        let style = WatermarkStyle::default();
        let placement = layout_watermark(&A4, WatermarkPosition::FALLBACK, "DRAFT", &style);
        assert_eq!(placement.angle, 45.0);
        assert!(placement.font_size <= style.max_font_size);
        let [a, b, c, d, _, _] = placement.text_matrix();
        assert!((a - d).abs() < 1e-6 && (b + c).abs() < 1e-6);
        assert!((a - std::f32::consts::FRAC_1_SQRT_2).abs() < 1e-6);
    }

    #[test]
    fn inverted_font_bounds_do_not_panic() {
        let style = WatermarkStyle {
            min_font_size: 80.0,
            max_font_size: 72.0,
            ..WatermarkStyle::default()
        };
        let placement = layout_watermark(&A4, WatermarkPosition::FALLBACK, "DRAFT", &style);
        assert!((72.0..=80.0).contains(&placement.font_size));
    }

    #[test]
    fn text_width_uses_helvetica_metrics() {
        assert!((text_width("0", 10.0) - 5.56).abs() < 1e-4);
        assert!(text_width("WWW", 12.0) > text_width("iii", 12.0));
    }
}
