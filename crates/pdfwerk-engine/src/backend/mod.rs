// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// PDF backends and the fallback executor that chains them.
//
// The high-fidelity backend edits page content directly; the structural
// backend only works with whole pages and generated overlays. Operations that
// need content editing run on the high-fidelity backend first and fall back
// to the structural one on any processing error.

pub mod high_fidelity;
pub mod structural;

use lopdf::Document;
use pdfwerk_core::config::WatermarkStyle;
use pdfwerk_core::error::{PdfwerkError, Result};
use pdfwerk_core::types::{CropBox, DocumentInfo, PageNumbering, Watermark};
use tracing::{debug, warn};

pub use high_fidelity::HighFidelityBackend;
pub use structural::StructuralBackend;

/// One way of carrying out the content-level operations.
///
/// Every method works on a document the caller loaded for this attempt
/// alone; a failed attempt may leave it half-modified.
pub trait PdfBackend: Send + Sync {
    /// Short name used in logs and error messages.
    fn name(&self) -> &'static str;

    /// Add `degrees` (a multiple of 90 in `0..360`) to every page's rotation.
    fn rotate(&self, document: &mut Document, degrees: i64) -> Result<()>;

    /// Restrict every page's visible area to `crop` (viewer coordinates).
    fn crop(&self, document: &mut Document, crop: &CropBox) -> Result<()>;

    /// Stamp `watermark` on every page.
    fn watermark(&self, document: &mut Document, watermark: &Watermark, style: &WatermarkStyle) -> Result<()>;

    /// Stamp page labels on pages `numbering.start_page..`.
    fn page_numbers(&self, document: &mut Document, numbering: &PageNumbering) -> Result<()>;

    /// Rebuild a damaged document so it serialises cleanly.
    fn repair(&self, document: &mut Document, version: &str) -> Result<()>;

    /// One comparable signature per page, in page order.
    fn page_signatures(&self, document: &Document) -> Result<Vec<String>>;

    /// Information dictionary contents. `file_size` is left for the caller.
    fn document_info(&self, document: &Document) -> Result<DocumentInfo>;
}

/// Runs an attempt on the primary backend and retries it once on the
/// fallback backend.
pub struct FallbackExecutor {
    primary: Box<dyn PdfBackend>,
    fallback: Box<dyn PdfBackend>,
}

impl FallbackExecutor {
    pub fn new(primary: Box<dyn PdfBackend>, fallback: Box<dyn PdfBackend>) -> Self {
        Self { primary, fallback }
    }

    /// High-fidelity first, structural second.
    pub fn standard() -> Self {
        Self::new(Box::new(HighFidelityBackend), Box::new(StructuralBackend))
    }

    /// Run `attempt` with the primary backend, then with the fallback if the
    /// primary failed. `attempt` must reload its input on every call.
    ///
    /// Validation errors are returned immediately: the request is wrong, not
    /// the backend. When both backends fail the error names `step` and both
    /// causes.
    pub fn run<T>(&self, step: &str, mut attempt: impl FnMut(&dyn PdfBackend) -> Result<T>) -> Result<T> {
        let primary_err = match attempt(self.primary.as_ref()) {
            Ok(value) => {
                debug!(step, backend = self.primary.name(), "primary backend succeeded");
                return Ok(value);
            }
            Err(err) if err.is_validation() => return Err(err),
            Err(err) => err,
        };

        warn!(
            step,
            backend = self.primary.name(),
            error = %primary_err,
            fallback = self.fallback.name(),
            "primary backend failed, falling back"
        );

        match attempt(self.fallback.as_ref()) {
            Ok(value) => Ok(value),
            Err(err) if err.is_validation() => Err(err),
            Err(fallback_err) => Err(PdfwerkError::processing(
                step,
                format!(
                    "{} backend: {primary_err}; {} backend: {fallback_err}",
                    self.primary.name(),
                    self.fallback.name()
                ),
            )),
        }
    }
}

impl Default for FallbackExecutor {
    fn default() -> Self {
        Self::standard()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use pdfwerk_core::error::ValidationError;

    /// Backend whose every operation fails (or succeeds) on demand and which
    /// records how often it was asked.
    struct StubBackend {
        name: &'static str,
        fail: bool,
        calls: Mutex<u32>,
    }

    impl StubBackend {
        fn new(name: &'static str, fail: bool) -> Self {
            Self {
                name,
                fail,
                calls: Mutex::new(0),
            }
        }

        fn outcome(&self) -> Result<()> {
            *self.calls.lock().unwrap() += 1;
            if self.fail {
                Err(PdfwerkError::processing(self.name, "stub failure"))
            } else {
                Ok(())
            }
        }
    }

    impl PdfBackend for StubBackend {
        fn name(&self) -> &'static str {
            self.name
        }
        fn rotate(&self, _document: &mut Document, _degrees: i64) -> Result<()> {
            self.outcome()
        }
        fn crop(&self, _document: &mut Document, _crop: &CropBox) -> Result<()> {
            self.outcome()
        }
        fn watermark(&self, _document: &mut Document, _watermark: &Watermark, _style: &WatermarkStyle) -> Result<()> {
            self.outcome()
        }
        fn page_numbers(&self, _document: &mut Document, _numbering: &PageNumbering) -> Result<()> {
            self.outcome()
        }
        fn repair(&self, _document: &mut Document, _version: &str) -> Result<()> {
            self.outcome()
        }
        fn page_signatures(&self, _document: &Document) -> Result<Vec<String>> {
            self.outcome().map(|()| vec![self.name.to_string()])
        }
        fn document_info(&self, _document: &Document) -> Result<DocumentInfo> {
            self.outcome().map(|()| DocumentInfo::default())
        }
    }

    fn executor(primary_fails: bool, fallback_fails: bool) -> FallbackExecutor {
        FallbackExecutor::new(
            Box::new(StubBackend::new("primary", primary_fails)),
            Box::new(StubBackend::new("fallback", fallback_fails)),
        )
    }

    #[test]
    fn primary_success_skips_fallback() {
        let executor = executor(false, true);
        let mut used = Vec::new();
        let signatures = executor
            .run("compare", |backend| {
                used.push(backend.name());
                backend.page_signatures(&Document::new())
            })
            .unwrap();
        assert_eq!(signatures, vec!["primary"]);
        assert_eq!(used, vec!["primary"]);
    }

    #[test]
    fn primary_failure_falls_back_once() {
        let executor = executor(true, false);
        let mut attempts = 0;
        let signatures = executor
            .run("compare", |backend| {
                attempts += 1;
                backend.page_signatures(&Document::new())
            })
            .unwrap();
        assert_eq!(signatures, vec!["fallback"]);
        assert_eq!(attempts, 2);
    }

    #[test]
    fn double_failure_names_step_and_both_causes() {
        let executor = executor(true, true);
        let err = executor
            .run("rotate", |backend| backend.rotate(&mut Document::new(), 90))
            .unwrap_err();
        let PdfwerkError::Processing { step, message } = err else {
            panic!("expected a processing error");
        };
        assert_eq!(step, "rotate");
        assert!(message.contains("primary backend"));
        assert!(message.contains("fallback backend"));
    }

    #[test]
    fn validation_errors_do_not_fall_back() {
        let executor = executor(false, false);
        let mut attempts = 0;
        let err = executor
            .run::<()>("watermark", |_| {
                attempts += 1;
                Err(ValidationError::EmptyWatermark.into())
            })
            .unwrap_err();
        assert!(err.is_validation());
        assert_eq!(attempts, 1);
    }
}
