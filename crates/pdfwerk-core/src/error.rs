// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for pdfwerk.

use std::path::PathBuf;

use thiserror::Error;

/// Top-level error type for all pdfwerk operations.
#[derive(Debug, Error)]
pub enum PdfwerkError {
    // -- Request errors --
    #[error("invalid request: {0}")]
    Validation(#[from] ValidationError),

    #[error("input file not found: {}", .0.display())]
    NotFound(PathBuf),

    // -- Processing errors --
    #[error("{step} failed: {message}")]
    Processing { step: String, message: String },

    #[error("image processing failed: {0}")]
    Image(String),

    #[error("archive error: {0}")]
    Archive(String),

    // -- Configuration --
    #[error("invalid configuration: {0}")]
    Config(String),

    // -- Storage / persistence --
    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl PdfwerkError {
    /// Shorthand for a [`PdfwerkError::Processing`] error.
    pub fn processing(step: impl Into<String>, message: impl ToString) -> Self {
        Self::Processing {
            step: step.into(),
            message: message.to_string(),
        }
    }

    /// Whether the caller can fix this error by changing the request.
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }
}

/// Malformed request parameters, detected before any file is touched.
///
/// Variants carry the offending values so callers can report something more
/// useful than "invalid input".
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("at least {min} PDF files are required, got {got}")]
    TooFewInputs { min: usize, got: usize },

    #[error("invalid page numbers {invalid:?}; valid range is 1-{total}")]
    PagesOutOfRange { invalid: Vec<u32>, total: u32 },

    #[error("malformed page range token {token:?}")]
    MalformedRange { token: String },

    #[error("no pages were given")]
    NoPages,

    #[error("removing pages {pages:?} would leave the document empty")]
    WouldRemoveAllPages { pages: Vec<u32> },

    #[error("page_ranges split requires at least one range")]
    MissingRanges,

    #[error("crop box must have positive width and height, got {width}x{height}")]
    EmptyCropBox { width: String, height: String },

    #[error("watermark text must not be empty")]
    EmptyWatermark,

    #[error("password must not be empty")]
    EmptyPassword,

    #[error("start page must be at least 1, got {0}")]
    InvalidStartPage(u32),

    #[error("font size must be positive, got {0}")]
    InvalidFontSize(String),

    #[error("page number format {0:?} must contain a {{page}} placeholder")]
    MissingPagePlaceholder(String),

    #[error("maximum image DPI must be positive, got {0}")]
    InvalidDpi(u32),

    #[error("unknown {field} value {value:?}")]
    UnknownOption { field: &'static str, value: String },
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, PdfwerkError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn out_of_range_message_lists_values_and_bounds() {
        let err = ValidationError::PagesOutOfRange {
            invalid: vec![0, 7],
            total: 5,
        };
        assert_eq!(
            err.to_string(),
            "invalid page numbers [0, 7]; valid range is 1-5"
        );
    }

    #[test]
    fn validation_converts_into_top_level_error() {
        let err: PdfwerkError = ValidationError::EmptyPassword.into();
        assert!(err.is_validation());
        assert_eq!(err.to_string(), "invalid request: password must not be empty");
    }

    #[test]
    fn processing_names_the_step() {
        let err = PdfwerkError::processing("rotate", "page tree is broken");
        assert_eq!(err.to_string(), "rotate failed: page tree is broken");
    }
}
