// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Ghostscript runner — one `pdfwrite` pass per ladder step, bounded by a
// wall-clock timeout and a fixed number of attempts.

use std::io::{Read, Seek, SeekFrom};
use std::path::Path;
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use pdfwerk_core::config::CompressorConfig;
use thiserror::Error;
use tracing::{debug, instrument, warn};

use super::Attempt;

const POLL_INTERVAL: Duration = Duration::from_millis(25);

/// Stderr is truncated to this many bytes in error messages.
const STDERR_LIMIT: usize = 2048;

#[derive(Debug, Error)]
pub enum GhostscriptError {
    #[error("ghostscript executable {0:?} is not available")]
    Missing(String),

    #[error("ghostscript timed out after {attempts} attempt(s) of {timeout:?} each")]
    TimedOut { attempts: u32, timeout: Duration },

    #[error("ghostscript exited with {status}: {stderr}")]
    Failed { status: String, stderr: String },

    #[error("ghostscript I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A configured Ghostscript executable.
#[derive(Debug, Clone)]
pub struct Ghostscript {
    program: String,
    timeout: Duration,
    max_attempts: u32,
}

impl Ghostscript {
    pub fn new(program: impl Into<String>, timeout: Duration, max_attempts: u32) -> Self {
        Self {
            program: program.into(),
            timeout,
            max_attempts: max_attempts.max(1),
        }
    }

    pub fn from_config(config: &CompressorConfig) -> Self {
        Self::new(config.program.clone(), config.timeout(), config.max_attempts)
    }

    /// Arguments for one `pdfwrite` pass.
    pub fn arguments(attempt: Attempt, input: &Path, output: &Path) -> Vec<String> {
        let dpi = attempt.dpi;
        vec![
            "-q".into(),
            "-dNOPAUSE".into(),
            "-dBATCH".into(),
            "-dSAFER".into(),
            "-sDEVICE=pdfwrite".into(),
            "-dCompatibilityLevel=1.5".into(),
            format!("-dPDFSETTINGS={}", attempt.preset.setting()),
            "-dDownsampleColorImages=true".into(),
            format!("-dColorImageResolution={dpi}"),
            "-dDownsampleGrayImages=true".into(),
            format!("-dGrayImageResolution={dpi}"),
            "-dDownsampleMonoImages=true".into(),
            format!("-dMonoImageResolution={dpi}"),
            format!("-sOutputFile={}", output.display()),
            input.display().to_string(),
        ]
    }

    /// Compress `input` with the settings of `attempt` and return the
    /// produced bytes. Only timeouts are retried.
    #[instrument(skip_all, fields(preset = attempt.preset.setting(), dpi = attempt.dpi))]
    pub fn compress(&self, input: &Path, attempt: Attempt) -> Result<Vec<u8>, GhostscriptError> {
        let output = tempfile::Builder::new().prefix("gs_").suffix(".pdf").tempfile()?;
        let args = Self::arguments(attempt, input, output.path());

        for attempt_number in 1..=self.max_attempts {
            match self.run_once(&args)? {
                RunStatus::Finished => {
                    let bytes = std::fs::read(output.path())?;
                    debug!(size = bytes.len(), "ghostscript pass finished");
                    return Ok(bytes);
                }
                RunStatus::TimedOut => {
                    warn!(attempt = attempt_number, max = self.max_attempts, timeout = ?self.timeout, "ghostscript timed out");
                }
            }
        }
        Err(GhostscriptError::TimedOut {
            attempts: self.max_attempts,
            timeout: self.timeout,
        })
    }

    fn run_once(&self, args: &[String]) -> Result<RunStatus, GhostscriptError> {
        // Stderr goes to a file so a chatty child can never block on a full pipe.
        let mut log = tempfile::tempfile()?;
        let mut child = Command::new(&self.program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(log.try_clone()?)
            .spawn()
            .map_err(|err| match err.kind() {
                std::io::ErrorKind::NotFound | std::io::ErrorKind::PermissionDenied => {
                    GhostscriptError::Missing(self.program.clone())
                }
                _ => GhostscriptError::Io(err),
            })?;

        let deadline = Instant::now() + self.timeout;
        let status = loop {
            if let Some(status) = child.try_wait()? {
                break status;
            }
            if Instant::now() >= deadline {
                if let Err(err) = child.kill() {
                    warn!(%err, "failed to kill ghostscript");
                }
                child.wait()?;
                return Ok(RunStatus::TimedOut);
            }
            thread::sleep(POLL_INTERVAL);
        };

        if status.success() {
            return Ok(RunStatus::Finished);
        }
        let mut stderr = String::new();
        log.seek(SeekFrom::Start(0))?;
        log.take(STDERR_LIMIT as u64).read_to_string(&mut stderr)?;
        Err(GhostscriptError::Failed {
            status: status.to_string(),
            stderr: stderr.trim().to_string(),
        })
    }
}

enum RunStatus {
    Finished,
    TimedOut,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compress::Preset;

    const ATTEMPT: Attempt = Attempt {
        preset: Preset::Ebook,
        dpi: 150,
    };

    #[test]
    fn arguments_carry_preset_and_resolution() {
        let args = Ghostscript::arguments(ATTEMPT, Path::new("in.pdf"), Path::new("out.pdf"));
        assert!(args.contains(&"-dPDFSETTINGS=/ebook".to_string()));
        assert!(args.contains(&"-dColorImageResolution=150".to_string()));
        assert!(args.contains(&"-sOutputFile=out.pdf".to_string()));
        assert_eq!(args.last().map(String::as_str), Some("in.pdf"));
    }

    #[test]
    fn missing_program_is_reported_as_missing() {
        let gs = Ghostscript::new("pdfwerk-no-such-ghostscript", Duration::from_secs(1), 2);
        let err = gs.compress(Path::new("in.pdf"), ATTEMPT).unwrap_err();
        assert!(matches!(err, GhostscriptError::Missing(_)));
    }

    #[cfg(unix)]
    fn script(dir: &Path, body: &str) -> String {
        use std::os::unix::fs::PermissionsExt;
        let path = dir.join("fake-gs");
        std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path.display().to_string()
    }

    #[cfg(unix)]
    #[test]
    fn hanging_program_times_out_after_bounded_attempts() {
        let dir = tempfile::tempdir().unwrap();
        let gs = Ghostscript::new(script(dir.path(), "exec sleep 5"), Duration::from_millis(150), 2);
        let started = Instant::now();
        let err = gs.compress(Path::new("in.pdf"), ATTEMPT).unwrap_err();
        assert!(matches!(err, GhostscriptError::TimedOut { attempts: 2, .. }));
        assert!(started.elapsed() < Duration::from_secs(4));
    }

    #[cfg(unix)]
    #[test]
    fn failing_program_reports_stderr() {
        let dir = tempfile::tempdir().unwrap();
        let gs = Ghostscript::new(script(dir.path(), "echo broken input >&2; exit 3"), Duration::from_secs(5), 2);
        let err = gs.compress(Path::new("in.pdf"), ATTEMPT).unwrap_err();
        let GhostscriptError::Failed { stderr, .. } = err else {
            panic!("expected an exit failure");
        };
        assert_eq!(stderr, "broken input");
    }
}
