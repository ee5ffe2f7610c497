// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Compression module — ladder of preset/resolution attempts searched until
// the output is small enough.

pub mod ghostscript;
pub mod structural;

use std::path::Path;

use pdfwerk_core::config::CompressorConfig;
use pdfwerk_core::error::{PdfwerkError, Result};
use pdfwerk_core::types::{CompressionLevel, CompressionRequest};
use tracing::{debug, info, instrument, warn};

use ghostscript::{Ghostscript, GhostscriptError};

/// Quality preset of one compression attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Preset {
    Printer,
    Ebook,
    Screen,
}

impl Preset {
    /// Ghostscript `-dPDFSETTINGS` value.
    pub fn setting(&self) -> &'static str {
        match self {
            Self::Printer => "/printer",
            Self::Ebook => "/ebook",
            Self::Screen => "/screen",
        }
    }

    /// JPEG quality the structural compressor uses for this preset.
    pub fn jpeg_quality(&self) -> u8 {
        match self {
            Self::Printer => 85,
            Self::Ebook => 70,
            Self::Screen => 50,
        }
    }
}

/// One rung of the compression ladder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Attempt {
    pub preset: Preset,
    pub dpi: u32,
}

/// Lowest resolution the ladder derives from a caller-supplied DPI.
const DPI_FLOOR: u32 = 50;

/// The corrective pass run when the ladder's best result is not smaller.
const AGGRESSIVE: Attempt = Attempt {
    preset: Preset::Screen,
    dpi: DPI_FLOOR,
};

pub fn presets(level: CompressionLevel) -> &'static [Preset] {
    match level {
        CompressionLevel::Low => &[Preset::Printer, Preset::Ebook],
        CompressionLevel::Medium => &[Preset::Ebook, Preset::Screen],
        CompressionLevel::High => &[Preset::Screen],
    }
}

pub fn dpi_ladder(level: CompressionLevel, max_image_dpi: Option<u32>) -> Vec<u32> {
    match max_image_dpi {
        Some(dpi) => vec![dpi, dpi.saturating_sub(50).max(DPI_FLOOR)],
        None => match level {
            CompressionLevel::Low => vec![300, 200, 150],
            CompressionLevel::Medium => vec![150, 96, 72],
            CompressionLevel::High => vec![96, 72, 50],
        },
    }
}

/// Every attempt for `request`, presets outermost.
pub fn ladder(request: &CompressionRequest) -> Vec<Attempt> {
    let dpis = dpi_ladder(request.level, request.max_image_dpi);
    presets(request.level)
        .iter()
        .flat_map(|&preset| dpis.iter().map(move |&dpi| Attempt { preset, dpi }))
        .collect()
}

/// Size the output must reach for the search to stop early.
pub fn desired_size(original_size: Option<u64>, target_reduction_pct: Option<f64>) -> Option<u64> {
    let original = original_size? as f64;
    let target = target_reduction_pct?;
    Some((original * (1.0 - target / 100.0)).floor() as u64)
}

/// Walk `ladder`, calling `run` for each attempt.
///
/// `run` returns `Ok(None)` for an attempt that failed in a recoverable way.
/// With a `desired` size the first result at or below it wins, otherwise the
/// smallest result; without one the first successful attempt wins. An `Err`
/// from `run` aborts the search.
pub fn search<F>(ladder: &[Attempt], desired: Option<u64>, mut run: F) -> Result<Option<(Attempt, Vec<u8>)>>
where
    F: FnMut(Attempt) -> Result<Option<Vec<u8>>>,
{
    let mut best: Option<(Attempt, Vec<u8>)> = None;
    for &attempt in ladder {
        let Some(bytes) = run(attempt)? else {
            continue;
        };
        debug!(?attempt, size = bytes.len(), "compression attempt finished");

        let Some(desired) = desired else {
            return Ok(Some((attempt, bytes)));
        };
        if bytes.len() as u64 <= desired {
            return Ok(Some((attempt, bytes)));
        }
        if best.as_ref().is_none_or(|(_, kept)| bytes.len() < kept.len()) {
            best = Some((attempt, bytes));
        }
    }
    Ok(best)
}

/// Runs the ladder with Ghostscript when available, otherwise with the
/// in-process structural compressor.
#[derive(Debug, Clone)]
pub struct PdfCompressor {
    ghostscript: Option<Ghostscript>,
}

impl PdfCompressor {
    pub fn from_config(config: &CompressorConfig) -> Self {
        Self {
            ghostscript: config.is_enabled().then(|| Ghostscript::from_config(config)),
        }
    }

    /// A compressor that never spawns an external program.
    pub fn structural_only() -> Self {
        Self { ghostscript: None }
    }

    /// Compress the PDF at `input`. The returned bytes are never larger than
    /// the input file.
    #[instrument(skip_all, fields(path = %input.display(), level = ?request.level))]
    pub fn compress(&self, input: &Path, request: &CompressionRequest) -> Result<Vec<u8>> {
        let original_size = std::fs::metadata(input).ok().map(|meta| meta.len());
        let desired = desired_size(original_size, request.clamped_target());
        let attempts = ladder(request);
        info!(?original_size, ?desired, attempts = attempts.len(), "compression search started");

        let mut outcome = match &self.ghostscript {
            Some(gs) => search_with_ghostscript(gs, input, &attempts, desired)?,
            None => None,
        };
        if outcome.is_none() {
            if self.ghostscript.is_some() {
                warn!("no ghostscript attempt succeeded, using structural compressor");
            }
            outcome = search(&attempts, desired, |attempt| match structural::compress_file(input, attempt) {
                Ok(bytes) => Ok(Some(bytes)),
                Err(err) => {
                    warn!(?attempt, %err, "structural compression attempt failed");
                    Ok(None)
                }
            })?;
        }

        let Some((attempt, bytes)) = outcome else {
            return Err(PdfwerkError::processing("compress", "no compression attempt succeeded"));
        };
        info!(?attempt, size = bytes.len(), "compression search finished");

        let Some(original) = original_size else {
            return Ok(bytes);
        };
        if (bytes.len() as u64) < original {
            return Ok(bytes);
        }

        warn!(size = bytes.len(), original, "result not smaller than input, running aggressive pass");
        match structural::compress_file(input, AGGRESSIVE) {
            Ok(aggressive) if (aggressive.len() as u64) < original => Ok(aggressive),
            Ok(_) => {
                info!("input kept as is");
                Ok(std::fs::read(input)?)
            }
            Err(err) => {
                warn!(%err, "aggressive pass failed, input kept as is");
                Ok(std::fs::read(input)?)
            }
        }
    }
}

/// Ladder search through Ghostscript. A missing program ends the search
/// with no result; a timeout aborts the whole compression.
fn search_with_ghostscript(
    gs: &Ghostscript,
    input: &Path,
    attempts: &[Attempt],
    desired: Option<u64>,
) -> Result<Option<(Attempt, Vec<u8>)>> {
    let mut missing = false;
    search(attempts, desired, |attempt| {
        if missing {
            return Ok(None);
        }
        match gs.compress(input, attempt) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(GhostscriptError::Missing(program)) => {
                warn!(%program, "ghostscript unavailable");
                missing = true;
                Ok(None)
            }
            Err(err @ GhostscriptError::TimedOut { .. }) => Err(PdfwerkError::processing("compress", err)),
            Err(err) => {
                warn!(?attempt, %err, "ghostscript attempt failed");
                Ok(None)
            }
        }
    })
}
