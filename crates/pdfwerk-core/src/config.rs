// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Engine configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{PdfwerkError, Result};

/// Environment variable overriding [`EngineConfig::output_dir`].
pub const ENV_OUTPUT_DIR: &str = "PDFWERK_OUTPUT_DIR";
/// Environment variable overriding [`CompressorConfig::program`].
pub const ENV_GS_PATH: &str = "PDFWERK_GS_PATH";
/// Environment variable overriding [`CompressorConfig::timeout_secs`].
pub const ENV_GS_TIMEOUT: &str = "PDFWERK_GS_TIMEOUT_SECS";

/// Settings handed to the engine at construction time.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Directory every output file and split folder is written under.
    pub output_dir: PathBuf,
    /// PDF version header for documents the engine builds from scratch.
    pub pdf_version: String,
    /// External compressor settings.
    pub compressor: CompressorConfig,
    /// Watermark styling.
    pub watermark: WatermarkStyle,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            output_dir: std::env::temp_dir().join("pdfwerk"),
            pdf_version: "1.7".to_string(),
            compressor: CompressorConfig::default(),
            watermark: WatermarkStyle::default(),
        }
    }
}

impl EngineConfig {
    /// Configuration writing into `output_dir`, defaults otherwise.
    pub fn with_output_dir(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            ..Self::default()
        }
    }

    /// Read a JSON configuration file. Missing fields take their defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        let config: Self = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the engine cannot work with.
    pub fn validate(&self) -> Result<()> {
        self.watermark.validate()
    }

    /// Apply `PDFWERK_*` environment overrides on top of `self`.
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(dir) = std::env::var(ENV_OUTPUT_DIR) {
            self.output_dir = PathBuf::from(dir);
        }
        if let Ok(program) = std::env::var(ENV_GS_PATH) {
            self.compressor.program = program;
        }
        if let Some(secs) = std::env::var(ENV_GS_TIMEOUT)
            .ok()
            .and_then(|raw| raw.parse::<u64>().ok())
        {
            self.compressor.timeout_secs = secs;
        }
        self
    }
}

/// How the external PDF optimiser (Ghostscript) is invoked.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CompressorConfig {
    /// Executable name or path. An empty string disables the external
    /// compressor entirely.
    pub program: String,
    /// Wall-clock limit per invocation.
    pub timeout_secs: u64,
    /// Invocations attempted per ladder step when the tool times out.
    pub max_attempts: u32,
}

impl Default for CompressorConfig {
    fn default() -> Self {
        Self {
            program: if cfg!(target_os = "windows") {
                "gswin64c".to_string()
            } else {
                "gs".to_string()
            },
            timeout_secs: 120,
            max_attempts: 2,
        }
    }
}

impl CompressorConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }

    pub fn is_enabled(&self) -> bool {
        !self.program.trim().is_empty()
    }
}

/// Visual parameters of stamped watermarks.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WatermarkStyle {
    pub min_font_size: f32,
    pub max_font_size: f32,
    /// Fill opacity, 0.0-1.0.
    pub opacity: f32,
    /// Gray level of the text, 0.0 (black) to 1.0 (white).
    pub gray: f32,
}

impl WatermarkStyle {
    pub fn validate(&self) -> Result<()> {
        let sizes = [("min_font_size", self.min_font_size), ("max_font_size", self.max_font_size)];
        for (field, size) in sizes {
            if !size.is_finite() || size <= 0.0 {
                return Err(PdfwerkError::Config(format!(
                    "watermark.{field} must be a positive number, got {size}"
                )));
            }
        }
        if self.min_font_size > self.max_font_size {
            return Err(PdfwerkError::Config(format!(
                "watermark.min_font_size ({}) exceeds max_font_size ({})",
                self.min_font_size, self.max_font_size
            )));
        }
        Ok(())
    }

    /// Font size bounds in ascending order. Non-finite bounds fall back to
    /// the defaults.
    pub fn font_size_bounds(&self) -> (f32, f32) {
        let defaults = Self::default();
        let finite = |size: f32, fallback: f32| if size.is_finite() && size > 0.0 { size } else { fallback };
        let low = finite(self.min_font_size, defaults.min_font_size);
        let high = finite(self.max_font_size, defaults.max_font_size);
        (low.min(high), low.max(high))
    }
}

impl Default for WatermarkStyle {
    fn default() -> Self {
        Self {
            min_font_size: 12.0,
            max_font_size: 72.0,
            opacity: 0.3,
            gray: 0.5,
        }
    }
}
