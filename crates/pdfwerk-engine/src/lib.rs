// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// pdfwerk-engine — PDF page-manipulation engine.
//
// Provides the PdfEngine operations (merge, split, compress, rotate, crop,
// watermark, page numbers, page removal and extraction, protect, unlock,
// repair, compare, metadata), the two backends they run on, placement
// geometry and the compression size-search.

pub mod backend;
pub mod compress;
pub mod engine;
pub mod geometry;
pub mod image;
pub mod output;
pub mod pdf;
pub mod ranges;

#[cfg(test)]
mod testing;

// Re-export the primary types so callers can use `pdfwerk_engine::PdfEngine` etc.
pub use backend::{FallbackExecutor, HighFidelityBackend, PdfBackend, StructuralBackend};
pub use compress::PdfCompressor;
pub use engine::PdfEngine;
pub use output::{OutputDir, TempInput};
pub use ranges::{parse_ranges, validate_pages};
