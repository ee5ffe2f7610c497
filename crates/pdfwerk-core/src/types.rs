// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core domain types for the pdfwerk engine.

use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// An axis-aligned rectangle in PDF user space (origin bottom-left, points).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// A rectangle anchored at the origin.
    pub fn from_size(width: f32, height: f32) -> Self {
        Self::new(0.0, 0.0, width, height)
    }

    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    pub fn top(&self) -> f32 {
        self.y + self.height
    }

    pub fn center(&self) -> (f32, f32) {
        (self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    /// Overlapping area of two rectangles, if any.
    pub fn intersect(&self, other: &Rect) -> Option<Rect> {
        let x0 = self.x.max(other.x);
        let y0 = self.y.max(other.y);
        let x1 = self.right().min(other.right());
        let y1 = self.top().min(other.top());
        if x1 > x0 && y1 > y0 {
            Some(Rect::new(x0, y0, x1 - x0, y1 - y0))
        } else {
            None
        }
    }
}

/// Normalise a user-supplied position keyword: lowercase, trimmed, `_` → `-`.
fn normalise_keyword(raw: &str) -> String {
    raw.trim().to_ascii_lowercase().replace(['_', ' '], "-")
}

/// One of the nine named placement zones on a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Anchor {
    TopLeft,
    TopCenter,
    TopRight,
    MiddleLeft,
    Center,
    MiddleRight,
    BottomLeft,
    BottomCenter,
    BottomRight,
}

impl Anchor {
    pub const ALL: [Anchor; 9] = [
        Anchor::TopLeft,
        Anchor::TopCenter,
        Anchor::TopRight,
        Anchor::MiddleLeft,
        Anchor::Center,
        Anchor::MiddleRight,
        Anchor::BottomLeft,
        Anchor::BottomCenter,
        Anchor::BottomRight,
    ];

    pub fn keyword(&self) -> &'static str {
        match self {
            Self::TopLeft => "top-left",
            Self::TopCenter => "top-center",
            Self::TopRight => "top-right",
            Self::MiddleLeft => "middle-left",
            Self::Center => "center",
            Self::MiddleRight => "middle-right",
            Self::BottomLeft => "bottom-left",
            Self::BottomCenter => "bottom-center",
            Self::BottomRight => "bottom-right",
        }
    }

    fn from_keyword(keyword: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|anchor| anchor.keyword() == keyword)
    }
}

/// Where a watermark goes and whether its text runs diagonally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatermarkPosition {
    pub anchor: Anchor,
    pub diagonal: bool,
}

impl WatermarkPosition {
    /// The position used for anything that does not parse.
    pub const FALLBACK: WatermarkPosition = WatermarkPosition {
        anchor: Anchor::Center,
        diagonal: true,
    };

    /// Parse `"top-left"`, `"bottom-right-diagonal"`, ... Never fails: unknown
    /// keywords fall back to a diagonal watermark in the centre.
    pub fn parse(raw: &str) -> Self {
        let keyword = normalise_keyword(raw);
        let (base, diagonal) = match keyword.strip_suffix("-diagonal") {
            Some(base) => (base, true),
            None => (keyword.as_str(), false),
        };
        match Anchor::from_keyword(base) {
            Some(anchor) => Self { anchor, diagonal },
            None => Self::FALLBACK,
        }
    }
}

impl Default for WatermarkPosition {
    fn default() -> Self {
        Self::FALLBACK
    }
}

/// The six placement zones available to page numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NumberPosition {
    TopLeft,
    TopCenter,
    TopRight,
    BottomLeft,
    BottomCenter,
    BottomRight,
}

impl NumberPosition {
    pub const ALL: [NumberPosition; 6] = [
        NumberPosition::TopLeft,
        NumberPosition::TopCenter,
        NumberPosition::TopRight,
        NumberPosition::BottomLeft,
        NumberPosition::BottomCenter,
        NumberPosition::BottomRight,
    ];

    /// Parse a keyword, falling back to `bottom-center`.
    pub fn parse(raw: &str) -> Self {
        match normalise_keyword(raw).as_str() {
            "top-left" => Self::TopLeft,
            "top-center" | "top" => Self::TopCenter,
            "top-right" => Self::TopRight,
            "bottom-left" => Self::BottomLeft,
            "bottom-right" => Self::BottomRight,
            _ => Self::BottomCenter,
        }
    }

    pub fn is_top(&self) -> bool {
        matches!(self, Self::TopLeft | Self::TopCenter | Self::TopRight)
    }
}

impl Default for NumberPosition {
    fn default() -> Self {
        Self::BottomCenter
    }
}

/// A crop region in viewer coordinates: origin at the page's top-left corner,
/// y growing downward, units in points.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CropBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl CropBox {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.width > 0.0 && self.height > 0.0 {
            Ok(())
        } else {
            Err(ValidationError::EmptyCropBox {
                width: self.width.to_string(),
                height: self.height.to_string(),
            })
        }
    }
}

/// Requested compression strength.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompressionLevel {
    Low,
    #[default]
    Medium,
    High,
}

impl FromStr for CompressionLevel {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            other => Err(ValidationError::UnknownOption {
                field: "compression level",
                value: other.to_string(),
            }),
        }
    }
}

/// Parameters of a compress call.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct CompressionRequest {
    pub level: CompressionLevel,
    /// Desired size decrease in percent; clamped to 0-100 before use.
    pub target_reduction_pct: Option<f64>,
    pub max_image_dpi: Option<u32>,
}

impl CompressionRequest {
    pub fn new(level: CompressionLevel) -> Self {
        Self {
            level,
            ..Self::default()
        }
    }

    pub fn clamped_target(&self) -> Option<f64> {
        self.target_reduction_pct
            .filter(|pct| pct.is_finite())
            .map(|pct| pct.clamp(0.0, 100.0))
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        match self.max_image_dpi {
            Some(0) => Err(ValidationError::InvalidDpi(0)),
            _ => Ok(()),
        }
    }
}

/// How a split divides the document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SplitType {
    EveryPage,
    PageRanges,
}

impl FromStr for SplitType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "every_page" => Ok(Self::EveryPage),
            "page_ranges" | "ranges" => Ok(Self::PageRanges),
            other => Err(ValidationError::UnknownOption {
                field: "split type",
                value: other.to_string(),
            }),
        }
    }
}

/// Parameters of a split call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SplitRequest {
    pub split_type: SplitType,
    #[serde(default)]
    pub ranges: Vec<String>,
    #[serde(default)]
    pub output_prefix: Option<String>,
    #[serde(default)]
    pub zip_output: bool,
}

impl SplitRequest {
    pub fn every_page() -> Self {
        Self {
            split_type: SplitType::EveryPage,
            ranges: Vec::new(),
            output_prefix: None,
            zip_output: false,
        }
    }

    pub fn page_ranges<S: Into<String>>(ranges: impl IntoIterator<Item = S>) -> Self {
        Self {
            split_type: SplitType::PageRanges,
            ranges: ranges.into_iter().map(Into::into).collect(),
            output_prefix: None,
            zip_output: false,
        }
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.output_prefix = Some(prefix.into());
        self
    }

    pub fn zipped(mut self) -> Self {
        self.zip_output = true;
        self
    }
}

/// One file produced by a split.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SplitFile {
    pub path: PathBuf,
    pub filename: String,
    pub pages: Vec<u32>,
}

/// Everything a split produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SplitResult {
    pub files: Vec<SplitFile>,
    pub count: usize,
    pub folder_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub zip_filename: Option<String>,
}

/// Page-number stamping parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageNumbering {
    pub position: NumberPosition,
    pub start_page: u32,
    /// Must contain `{page}`; `{total}` is also substituted.
    pub format: String,
    pub font_size: f32,
}

impl Default for PageNumbering {
    fn default() -> Self {
        Self {
            position: NumberPosition::BottomCenter,
            start_page: 1,
            format: "{page}".to_string(),
            font_size: 12.0,
        }
    }
}

impl PageNumbering {
    pub const PAGE_PLACEHOLDER: &'static str = "{page}";
    pub const TOTAL_PLACEHOLDER: &'static str = "{total}";

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.start_page < 1 {
            return Err(ValidationError::InvalidStartPage(self.start_page));
        }
        if !(self.font_size > 0.0 && self.font_size.is_finite()) {
            return Err(ValidationError::InvalidFontSize(self.font_size.to_string()));
        }
        if !self.format.contains(Self::PAGE_PLACEHOLDER) {
            return Err(ValidationError::MissingPagePlaceholder(self.format.clone()));
        }
        Ok(())
    }

    /// Text stamped on `page` (1-based) of a `total`-page document.
    pub fn label(&self, page: u32, total: u32) -> String {
        self.format
            .replace(Self::PAGE_PLACEHOLDER, &page.to_string())
            .replace(Self::TOTAL_PLACEHOLDER, &total.to_string())
    }
}

/// Watermark stamping parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Watermark {
    pub text: String,
    pub position: WatermarkPosition,
}

impl Watermark {
    pub fn new(text: impl Into<String>, position: WatermarkPosition) -> Self {
        Self {
            text: text.into(),
            position,
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.text.trim().is_empty() {
            Err(ValidationError::EmptyWatermark)
        } else {
            Ok(())
        }
    }
}

/// One differing page in a comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageDifference {
    pub page: u32,
    pub difference: bool,
}

/// Outcome of comparing two documents page by page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompareResult {
    pub pages_doc1: u32,
    pub pages_doc2: u32,
    pub differences_count: usize,
    pub differences: Vec<PageDifference>,
    /// SHA-256 of each input file, hex encoded.
    pub doc1_sha256: String,
    pub doc2_sha256: String,
    /// Where the JSON side-car was written.
    #[serde(skip)]
    pub report_path: PathBuf,
}

/// Document information dictionary contents.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentInfo {
    pub title: Option<String>,
    pub author: Option<String>,
    pub subject: Option<String>,
    pub keywords: Option<String>,
    pub creator: Option<String>,
    pub producer: Option<String>,
    /// RFC 3339 when the PDF date parses, the raw string otherwise.
    pub creation_date: Option<String>,
    pub modification_date: Option<String>,
    pub pdf_version: String,
    pub encrypted: bool,
    pub file_size: u64,
}

/// Result of a metadata query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PdfMetadata {
    pub page_count: u32,
    pub metadata: DocumentInfo,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn watermark_position_parses_all_anchors() {
        for anchor in Anchor::ALL {
            let parsed = WatermarkPosition::parse(anchor.keyword());
            assert_eq!(parsed.anchor, anchor);
            assert!(!parsed.diagonal);

            let diagonal = WatermarkPosition::parse(&format!("{}-diagonal", anchor.keyword()));
            assert_eq!(diagonal.anchor, anchor);
            assert!(diagonal.diagonal);
        }
    }

    #[test]
    fn malformed_watermark_position_is_center_diagonal() {
        assert_eq!(WatermarkPosition::parse("sideways"), WatermarkPosition::FALLBACK);
        assert_eq!(WatermarkPosition::parse(""), WatermarkPosition::FALLBACK);
        assert_eq!(WatermarkPosition::parse("diagonal"), WatermarkPosition::FALLBACK);
    }

    #[test]
    fn watermark_position_accepts_underscores_and_case() {
        let parsed = WatermarkPosition::parse(" Top_Right ");
        assert_eq!(parsed.anchor, Anchor::TopRight);
        assert!(!parsed.diagonal);
    }

    #[test]
    fn number_position_falls_back_to_bottom_center() {
        assert_eq!(NumberPosition::parse("top-right"), NumberPosition::TopRight);
        assert_eq!(NumberPosition::parse("middle-left"), NumberPosition::BottomCenter);
    }

    #[test]
    fn crop_box_rejects_non_positive_dimensions() {
        let ok = CropBox { x: 0.0, y: 0.0, width: 10.0, height: 10.0 };
        assert!(ok.validate().is_ok());

        let flat = CropBox { height: 0.0, ..ok };
        assert!(matches!(flat.validate(), Err(ValidationError::EmptyCropBox { .. })));

        let negative = CropBox { width: -5.0, ..ok };
        assert!(negative.validate().is_err());
    }

    #[test]
    fn compression_target_is_clamped() {
        let mut request = CompressionRequest::new(CompressionLevel::High);
        request.target_reduction_pct = Some(140.0);
        assert_eq!(request.clamped_target(), Some(100.0));
        request.target_reduction_pct = Some(-3.0);
        assert_eq!(request.clamped_target(), Some(0.0));
        request.target_reduction_pct = Some(f64::NAN);
        assert_eq!(request.clamped_target(), None);
    }

    #[test]
    fn compression_level_and_split_type_parse() {
        assert_eq!("HIGH".parse::<CompressionLevel>(), Ok(CompressionLevel::High));
        assert!("extreme".parse::<CompressionLevel>().is_err());
        assert_eq!("every-page".parse::<SplitType>(), Ok(SplitType::EveryPage));
        assert_eq!("page_ranges".parse::<SplitType>(), Ok(SplitType::PageRanges));
    }

    #[test]
    fn page_numbering_label_and_validation() {
        let numbering = PageNumbering {
            format: "Page {page} of {total}".to_string(),
            ..PageNumbering::default()
        };
        assert!(numbering.validate().is_ok());
        assert_eq!(numbering.label(2, 3), "Page 2 of 3");

        let missing = PageNumbering {
            format: "Page".to_string(),
            ..PageNumbering::default()
        };
        assert!(matches!(
            missing.validate(),
            Err(ValidationError::MissingPagePlaceholder(_))
        ));

        let zero_start = PageNumbering { start_page: 0, ..PageNumbering::default() };
        assert_eq!(zero_start.validate(), Err(ValidationError::InvalidStartPage(0)));

        let tiny = PageNumbering { font_size: 0.0, ..PageNumbering::default() };
        assert!(matches!(tiny.validate(), Err(ValidationError::InvalidFontSize(_))));
    }

    #[test]
    fn rect_intersection() {
        let page = Rect::from_size(100.0, 100.0);
        let inside = Rect::new(10.0, 10.0, 20.0, 20.0);
        assert_eq!(page.intersect(&inside), Some(inside));
        let outside = Rect::new(200.0, 0.0, 10.0, 10.0);
        assert_eq!(page.intersect(&outside), None);
    }
}
