// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Caller-facing error reports.
//
// Every engine error is mapped to a kind the web layer can switch on, a plain
// message, an actionable suggestion and, where available, the structured
// values that made the request invalid.

use serde::Serialize;
use serde_json::{Value, json};

use crate::error::{PdfwerkError, ValidationError};

/// Coarse error classification exposed to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// The request itself is wrong; resubmitting it unchanged will fail again.
    Validation,
    /// An input file disappeared before the operation started.
    NotFound,
    /// The document could not be transformed by either backend.
    Processing,
}

/// A serialisable error description for API responses.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorReport {
    pub kind: ErrorKind,
    /// Plain English summary.
    pub message: String,
    /// What the caller should try.
    pub suggestion: String,
    /// Structured detail (invalid values, valid bounds), when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

/// Convert a `PdfwerkError` into an `ErrorReport`.
pub fn describe_error(err: &PdfwerkError) -> ErrorReport {
    match err {
        PdfwerkError::Validation(validation) => describe_validation(validation),

        PdfwerkError::NotFound(path) => ErrorReport {
            kind: ErrorKind::NotFound,
            message: "The uploaded file could not be found.".into(),
            suggestion: "Upload the file again and resubmit the request.".into(),
            details: Some(json!({ "path": path.display().to_string() })),
        },

        PdfwerkError::Processing { step, message } => ErrorReport {
            kind: ErrorKind::Processing,
            message: format!("The PDF could not be processed ({step})."),
            suggestion: "The file may be damaged or use unsupported features. Try the repair operation first.".into(),
            details: Some(json!({ "step": step, "cause": message })),
        },

        PdfwerkError::Image(detail) => ErrorReport {
            kind: ErrorKind::Processing,
            message: "An embedded image could not be processed.".into(),
            suggestion: "Try a lower compression level.".into(),
            details: Some(json!({ "cause": detail })),
        },

        PdfwerkError::Archive(detail) => ErrorReport {
            kind: ErrorKind::Processing,
            message: "The zip archive could not be written.".into(),
            suggestion: "Retry without zip output.".into(),
            details: Some(json!({ "cause": detail })),
        },

        PdfwerkError::Io(io_err) => {
            if io_err.kind() == std::io::ErrorKind::NotFound {
                ErrorReport {
                    kind: ErrorKind::NotFound,
                    message: "A file needed by the operation could not be found.".into(),
                    suggestion: "Upload the file again and resubmit the request.".into(),
                    details: None,
                }
            } else {
                ErrorReport {
                    kind: ErrorKind::Processing,
                    message: "There was a problem reading or writing a file.".into(),
                    suggestion: "Try again. If this keeps happening, the output storage may be full.".into(),
                    details: Some(json!({ "cause": io_err.to_string() })),
                }
            }
        }

        PdfwerkError::Config(detail) => ErrorReport {
            kind: ErrorKind::Validation,
            message: "The engine configuration is invalid.".into(),
            suggestion: "Fix the configuration file and try again.".into(),
            details: Some(json!({ "cause": detail })),
        },

        PdfwerkError::Serialization(detail) => ErrorReport {
            kind: ErrorKind::Processing,
            message: "An internal result could not be serialised.".into(),
            suggestion: "Try again. If this keeps happening, please report it.".into(),
            details: Some(json!({ "cause": detail.to_string() })),
        },
    }
}

fn describe_validation(err: &ValidationError) -> ErrorReport {
    let details = match err {
        ValidationError::PagesOutOfRange { invalid, total } => Some(json!({
            "invalid_pages": invalid,
            "valid_range": { "min": 1, "max": total },
        })),
        ValidationError::TooFewInputs { min, got } => Some(json!({ "min": min, "got": got })),
        ValidationError::MalformedRange { token } => Some(json!({ "token": token })),
        ValidationError::WouldRemoveAllPages { pages } => Some(json!({ "pages": pages })),
        ValidationError::EmptyCropBox { width, height } => {
            Some(json!({ "width": width, "height": height }))
        }
        ValidationError::UnknownOption { field, value } => {
            Some(json!({ "field": field, "value": value }))
        }
        _ => None,
    };

    let suggestion = match err {
        ValidationError::PagesOutOfRange { total, .. } => {
            format!("Use page numbers between 1 and {total}.")
        }
        ValidationError::MalformedRange { .. } => {
            "Write pages as single numbers or ranges like 3 or 5-9, separated by commas.".into()
        }
        ValidationError::TooFewInputs { min, .. } => format!("Upload at least {min} PDF files."),
        ValidationError::WouldRemoveAllPages { .. } => {
            "Keep at least one page in the document.".into()
        }
        _ => "Correct the request parameters and try again.".into(),
    };

    ErrorReport {
        kind: ErrorKind::Validation,
        message: err.to_string(),
        suggestion,
        details,
    }
}
