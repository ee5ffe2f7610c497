// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// pdfwerk — command-line driver over PdfEngine.
//
// Each subcommand maps to one engine operation. Results go to stdout (a path
// or a JSON document); failures are printed as an ErrorReport JSON object on
// stderr with a non-zero exit status. An input given as `-` is read from
// stdin into a temporary upload that is removed once the command finishes.

use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use serde::Serialize;

use pdfwerk_core::config::EngineConfig;
use pdfwerk_core::error::{PdfwerkError, Result};
use pdfwerk_core::human_errors::describe_error;
use pdfwerk_core::types::{
    CompressionLevel, CompressionRequest, CropBox, NumberPosition, PageNumbering, SplitRequest, SplitType,
    Watermark, WatermarkPosition,
};
use pdfwerk_engine::{PdfEngine, TempInput, parse_ranges};

#[derive(Parser)]
#[command(name = "pdfwerk", version, about = "PDF page-manipulation engine")]
struct Cli {
    /// JSON configuration file.
    #[arg(long, global = true, env = "PDFWERK_CONFIG")]
    config: Option<PathBuf>,

    /// Directory outputs are written to (overrides the configuration).
    #[arg(long, global = true)]
    output_dir: Option<PathBuf>,

    /// Delete the input files once the command finishes, whether it
    /// succeeded or not.
    #[arg(long, global = true)]
    delete_inputs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Concatenate PDFs in the given order.
    Merge {
        #[arg(required = true, num_args = 1..)]
        inputs: Vec<PathBuf>,
    },
    /// Split a PDF per page or per range token.
    Split {
        input: PathBuf,
        /// `every_page` or `page_ranges`.
        #[arg(long, default_value = "every_page")]
        split_type: SplitType,
        /// Range tokens such as `1-3`, `7`.
        #[arg(long = "range")]
        ranges: Vec<String>,
        #[arg(long)]
        prefix: Option<String>,
        /// Also write a zip archive of the split folder.
        #[arg(long)]
        zip: bool,
    },
    /// Shrink a PDF.
    Compress {
        input: PathBuf,
        /// `low`, `medium` or `high`.
        #[arg(long, default_value = "medium")]
        level: CompressionLevel,
        /// Desired size decrease in percent.
        #[arg(long)]
        target_reduction: Option<f64>,
        #[arg(long)]
        max_image_dpi: Option<u32>,
    },
    /// Rotate every page.
    Rotate {
        input: PathBuf,
        #[arg(allow_negative_numbers = true)]
        degrees: i64,
    },
    /// Crop every page to a region measured from the top-left corner.
    Crop {
        input: PathBuf,
        #[arg(long)]
        x: f32,
        #[arg(long)]
        y: f32,
        #[arg(long)]
        width: f32,
        #[arg(long)]
        height: f32,
    },
    /// Delete pages, e.g. `--pages 2,4-6`.
    RemovePages {
        input: PathBuf,
        #[arg(long, required = true)]
        pages: Vec<String>,
    },
    /// Keep only the given pages, in the given order.
    ExtractPages {
        input: PathBuf,
        #[arg(long, required = true)]
        pages: Vec<String>,
    },
    /// Stamp text on every page.
    Watermark {
        input: PathBuf,
        text: String,
        /// An anchor such as `top-left`, optionally suffixed `-diagonal`.
        #[arg(long, default_value = "center-diagonal")]
        position: String,
    },
    /// Stamp page labels.
    PageNumbers {
        input: PathBuf,
        #[arg(long, default_value = "bottom-center")]
        position: String,
        #[arg(long, default_value_t = 1)]
        start_page: u32,
        /// Must contain `{page}`; `{total}` is also replaced.
        #[arg(long, default_value = "{page}")]
        format: String,
        #[arg(long, default_value_t = 12.0)]
        font_size: f32,
    },
    /// Encrypt with a password.
    Protect {
        input: PathBuf,
        #[arg(long, env = "PDFWERK_PASSWORD")]
        password: String,
    },
    /// Remove encryption.
    Unlock {
        input: PathBuf,
        #[arg(long, env = "PDFWERK_PASSWORD", default_value = "")]
        password: String,
    },
    /// Rewrite a damaged PDF.
    Repair { input: PathBuf },
    /// Compare two PDFs page by page.
    Compare { first: PathBuf, second: PathBuf },
    /// Print document information.
    Metadata { input: PathBuf },
}

impl Command {
    /// Every input path the command reads.
    fn inputs_mut(&mut self) -> Vec<&mut PathBuf> {
        match self {
            Self::Merge { inputs } => inputs.iter_mut().collect(),
            Self::Compare { first, second } => vec![first, second],
            Self::Split { input, .. }
            | Self::Compress { input, .. }
            | Self::Rotate { input, .. }
            | Self::Crop { input, .. }
            | Self::RemovePages { input, .. }
            | Self::ExtractPages { input, .. }
            | Self::Watermark { input, .. }
            | Self::PageNumbers { input, .. }
            | Self::Protect { input, .. }
            | Self::Unlock { input, .. }
            | Self::Repair { input }
            | Self::Metadata { input } => vec![input],
        }
    }
}

/// What a subcommand prints on success.
enum Output {
    Path(PathBuf),
    Json(serde_json::Value),
}

fn json<T: Serialize>(value: &T) -> Result<Output> {
    Ok(Output::Json(serde_json::to_value(value)?))
}

fn load_config(cli: &Cli) -> Result<EngineConfig> {
    let config = match &cli.config {
        Some(path) => EngineConfig::from_json_file(path)?,
        None => EngineConfig::default(),
    };
    let mut config = config.with_env_overrides();
    if let Some(dir) = &cli.output_dir {
        config.output_dir = dir.clone();
    }
    Ok(config)
}

/// Stage a `-` input from stdin under `upload_dir` and, with `delete_inputs`,
/// take ownership of every other input. Dropping the returned guards removes
/// their files.
fn stage_inputs(command: &mut Command, upload_dir: &Path, delete_inputs: bool) -> Result<Vec<TempInput>> {
    let mut guards = Vec::new();
    let mut stdin_read = false;
    for input in command.inputs_mut() {
        if input.as_os_str() == "-" {
            if stdin_read {
                return Err(PdfwerkError::Io(std::io::Error::new(
                    std::io::ErrorKind::InvalidInput,
                    "standard input can only be used for one input",
                )));
            }
            stdin_read = true;
            let mut bytes = Vec::new();
            std::io::stdin().read_to_end(&mut bytes)?;
            let upload = TempInput::from_bytes(upload_dir, &bytes)?;
            *input = upload.path().to_path_buf();
            guards.push(upload);
        } else if delete_inputs {
            guards.push(TempInput::adopt(input.clone()));
        }
    }
    Ok(guards)
}

fn pages(raw: &[String]) -> Result<Vec<u32>> {
    Ok(parse_ranges(raw)?)
}

fn run(engine: &PdfEngine, command: Command) -> Result<Output> {
    let path = |result: Result<PathBuf>| result.map(Output::Path);
    match command {
        Command::Merge { inputs } => path(engine.merge(&inputs)),
        Command::Split {
            input,
            split_type,
            ranges,
            prefix,
            zip,
        } => {
            let request = SplitRequest {
                split_type,
                ranges,
                output_prefix: prefix,
                zip_output: zip,
            };
            json(&engine.split(&input, &request)?)
        }
        Command::Compress {
            input,
            level,
            target_reduction,
            max_image_dpi,
        } => {
            let request = CompressionRequest {
                level,
                target_reduction_pct: target_reduction,
                max_image_dpi,
            };
            path(engine.compress(&input, &request))
        }
        Command::Rotate { input, degrees } => path(engine.rotate(&input, degrees)),
        Command::Crop {
            input,
            x,
            y,
            width,
            height,
        } => path(engine.crop(&input, &CropBox { x, y, width, height })),
        Command::RemovePages { input, pages: raw } => path(engine.remove_pages(&input, &pages(&raw)?)),
        Command::ExtractPages { input, pages: raw } => path(engine.extract_pages(&input, &pages(&raw)?)),
        Command::Watermark { input, text, position } => {
            let watermark = Watermark::new(text, WatermarkPosition::parse(&position));
            path(engine.add_watermark(&input, &watermark))
        }
        Command::PageNumbers {
            input,
            position,
            start_page,
            format,
            font_size,
        } => {
            let numbering = PageNumbering {
                position: NumberPosition::parse(&position),
                start_page,
                format,
                font_size,
            };
            path(engine.add_page_numbers(&input, &numbering))
        }
        Command::Protect { input, password } => path(engine.protect(&input, &password)),
        Command::Unlock { input, password } => path(engine.unlock(&input, &password)),
        Command::Repair { input } => path(engine.repair(&input)),
        Command::Compare { first, second } => {
            let result = engine.compare(&first, &second)?;
            let mut value = serde_json::to_value(&result)?;
            value["report_path"] = display(&result.report_path).into();
            Ok(Output::Json(value))
        }
        Command::Metadata { input } => json(&engine.get_metadata(&input)?),
    }
}

fn display(path: &Path) -> String {
    path.display().to_string()
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let mut cli = Cli::parse();
    let outcome = load_config(&cli).and_then(|config| {
        tracing::debug!(output_dir = %config.output_dir.display(), "configuration loaded");
        let _inputs = stage_inputs(&mut cli.command, &config.output_dir.join("uploads"), cli.delete_inputs)?;
        let engine = PdfEngine::new(config);
        run(&engine, cli.command)
    });

    match outcome {
        Ok(Output::Path(path)) => {
            println!("{}", display(&path));
            ExitCode::SUCCESS
        }
        Ok(Output::Json(value)) => {
            println!("{value:#}");
            ExitCode::SUCCESS
        }
        Err(err) => {
            tracing::error!(error = %err, "operation failed");
            let report = describe_error(&err);
            match serde_json::to_string_pretty(&report) {
                Ok(body) => eprintln!("{body}"),
                Err(_) => eprintln!("{err}"),
            }
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inputs_are_kept_by_default() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("doc.pdf");
        std::fs::write(&input, b"%PDF-1.7").unwrap();

        let mut command = Command::Repair { input: input.clone() };
        let guards = stage_inputs(&mut command, dir.path(), false).unwrap();
        assert!(guards.is_empty());
        drop(guards);
        assert!(input.exists());
    }

    #[test]
    fn delete_inputs_removes_every_input_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let first = dir.path().join("a.pdf");
        let second = dir.path().join("b.pdf");
        std::fs::write(&first, b"%PDF-1.7").unwrap();
        std::fs::write(&second, b"%PDF-1.7").unwrap();

        let mut command = Command::Compare {
            first: first.clone(),
            second: second.clone(),
        };
        let guards = stage_inputs(&mut command, dir.path(), true).unwrap();
        assert_eq!(guards.len(), 2);
        drop(guards);
        assert!(!first.exists());
        assert!(!second.exists());
    }

    #[test]
    fn cli_accepts_global_delete_flag() {
        let cli = Cli::try_parse_from(["pdfwerk", "repair", "in.pdf", "--delete-inputs"]).unwrap();
        assert!(cli.delete_inputs);
        assert!(matches!(cli.command, Command::Repair { .. }));
    }
}
