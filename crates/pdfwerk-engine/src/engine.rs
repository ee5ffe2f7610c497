// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// PdfEngine — one method per PDF transformation.
//
// Every operation validates its parameters before touching the filesystem,
// checks that its inputs exist, works on a freshly loaded document and writes
// its output atomically under the configured output directory.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use lopdf::{Document, EncryptionState, EncryptionVersion, Object, Permissions, StringFormat};
use pdfwerk_core::config::EngineConfig;
use pdfwerk_core::error::{PdfwerkError, Result, ValidationError};
use pdfwerk_core::types::{
    CompareResult, CompressionRequest, CropBox, PageDifference, PageNumbering, PdfMetadata, SplitFile,
    SplitRequest, SplitResult, SplitType, Watermark,
};
use sha2::{Digest, Sha256};
use tracing::{debug, info, instrument};
use uuid::Uuid;

use crate::backend::{FallbackExecutor, PdfBackend};
use crate::compress::PdfCompressor;
use crate::output::{OutputDir, input_stem};
use crate::pdf::copy::{PageCopier, carry_document_info, copy_pages, empty_document};
use crate::pdf::document::{declared_page_count, load, load_encrypted, page_count, page_ids, to_bytes};
use crate::ranges::{parse_spans, validate_pages};

/// Key length for `protect`, in bits.
const ENCRYPTION_KEY_BITS: usize = 128;

/// The PDF operations engine.
///
/// Holds no per-request state; one instance can serve concurrent requests.
pub struct PdfEngine {
    config: EngineConfig,
    output: OutputDir,
    backends: FallbackExecutor,
    compressor: PdfCompressor,
}

impl PdfEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self::with_backends(config, FallbackExecutor::standard())
    }

    /// Engine with a custom backend chain.
    pub fn with_backends(config: EngineConfig, backends: FallbackExecutor) -> Self {
        let output = OutputDir::new(config.output_dir.clone());
        let compressor = PdfCompressor::from_config(&config.compressor);
        Self {
            config,
            output,
            backends,
            compressor,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn output_dir(&self) -> &OutputDir {
        &self.output
    }

    // -- Page assembly ---------------------------------------------------------

    /// Concatenate every page of `inputs`, in order.
    #[instrument(skip_all, fields(inputs = inputs.len()))]
    pub fn merge<P: AsRef<Path>>(&self, inputs: &[P]) -> Result<PathBuf> {
        if inputs.len() < 2 {
            return Err(ValidationError::TooFewInputs {
                min: 2,
                got: inputs.len(),
            }
            .into());
        }
        for input in inputs {
            require_input(input.as_ref())?;
        }

        let mut merged = empty_document(&self.config.pdf_version);
        for (index, input) in inputs.iter().enumerate() {
            let source = load("merge", input.as_ref())?;
            let mut copier = PageCopier::new(&source);
            for page_id in page_ids(&source) {
                copier.append_page_id(&mut merged, page_id)?;
            }
            if index == 0 {
                carry_document_info(&source, &mut merged);
            }
            debug!(path = %input.as_ref().display(), pages = page_count(&source), "input appended");
        }

        let bytes = to_bytes("merge", &mut merged)?;
        let path = self.write_output(inputs[0].as_ref(), "merged", &bytes)?;
        info!(pages = page_count(&merged), path = %path.display(), "merge finished");
        Ok(path)
    }

    /// Split `input` into one file per page or per range token, inside a new
    /// folder, optionally zipped.
    #[instrument(skip_all, fields(path = %input.display(), split_type = ?request.split_type))]
    pub fn split(&self, input: &Path, request: &SplitRequest) -> Result<SplitResult> {
        let spans = match request.split_type {
            SplitType::EveryPage => None,
            SplitType::PageRanges if request.ranges.iter().all(|raw| raw.trim().is_empty()) => {
                return Err(ValidationError::MissingRanges.into());
            }
            SplitType::PageRanges => Some(parse_spans(&request.ranges)?),
        };
        require_input(input)?;

        let document = load("split", input)?;
        let total = page_count(&document);
        let prefix = request
            .output_prefix
            .clone()
            .filter(|prefix| !prefix.trim().is_empty())
            .unwrap_or_else(|| input_stem(input));

        let groups: Vec<(String, Vec<u32>)> = match spans {
            None => (1..=total)
                .map(|page| (format!("{prefix}_page_{page}"), vec![page]))
                .collect(),
            Some(spans) => {
                let requested: Vec<u32> = spans.iter().flat_map(|span| span.pages()).collect();
                validate_pages(&requested, total)?;
                spans
                    .iter()
                    .map(|span| {
                        let stem = if span.is_single() {
                            format!("{prefix}_page_{}", span.start)
                        } else {
                            format!("{prefix}_page_{}_{}", span.start, span.end)
                        };
                        (stem, span.pages().collect())
                    })
                    .collect()
            }
        };
        if groups.is_empty() {
            return Err(PdfwerkError::processing("split", "document has no pages"));
        }

        let folder = self.output.create_split_folder(&prefix)?;
        let mut files = Vec::with_capacity(groups.len());
        for (stem, pages) in groups {
            let mut part = copy_pages(&document, &pages, &document.version)?;
            let bytes = to_bytes("split", &mut part)?;
            let (path, filename) = folder.write_file(&stem, &bytes)?;
            debug!(%filename, pages = pages.len(), "split part written");
            files.push(SplitFile { path, filename, pages });
        }

        let zip_filename = if request.zip_output {
            let filenames: Vec<String> = files.iter().map(|file| file.filename.clone()).collect();
            Some(self.output.write_zip(&folder, &filenames)?)
        } else {
            None
        };
        let (_, folder_name) = folder.commit();

        info!(files = files.len(), folder = %folder_name, zipped = zip_filename.is_some(), "split finished");
        Ok(SplitResult {
            count: files.len(),
            files,
            folder_name,
            zip_filename,
        })
    }

    /// Drop `pages` (1-based) from `input`.
    #[instrument(skip_all, fields(path = %input.display(), pages = ?pages))]
    pub fn remove_pages(&self, input: &Path, pages: &[u32]) -> Result<PathBuf> {
        if pages.is_empty() {
            return Err(ValidationError::NoPages.into());
        }
        require_input(input)?;

        let document = load("remove pages", input)?;
        let total = page_count(&document);
        validate_pages(pages, total)?;

        let removed: BTreeSet<u32> = pages.iter().copied().collect();
        let kept: Vec<u32> = (1..=total).filter(|page| !removed.contains(page)).collect();
        if kept.is_empty() {
            return Err(ValidationError::WouldRemoveAllPages {
                pages: removed.into_iter().collect(),
            }
            .into());
        }

        let mut result = copy_pages(&document, &kept, &document.version)?;
        let bytes = to_bytes("remove pages", &mut result)?;
        let path = self.write_output(input, "removed", &bytes)?;
        info!(kept = kept.len(), path = %path.display(), "pages removed");
        Ok(path)
    }

    /// Keep only `pages` (1-based), in the given order. Later duplicates are
    /// ignored.
    #[instrument(skip_all, fields(path = %input.display(), pages = ?pages))]
    pub fn extract_pages(&self, input: &Path, pages: &[u32]) -> Result<PathBuf> {
        if pages.is_empty() {
            return Err(ValidationError::NoPages.into());
        }
        require_input(input)?;

        let document = load("extract pages", input)?;
        validate_pages(pages, page_count(&document))?;

        let mut seen = BTreeSet::new();
        let ordered: Vec<u32> = pages.iter().copied().filter(|page| seen.insert(*page)).collect();

        let mut result = copy_pages(&document, &ordered, &document.version)?;
        let bytes = to_bytes("extract pages", &mut result)?;
        let path = self.write_output(input, "extracted", &bytes)?;
        info!(pages = ordered.len(), path = %path.display(), "pages extracted");
        Ok(path)
    }

    // -- Size -----------------------------------------------------------------

    #[instrument(skip_all, fields(path = %input.display(), level = ?request.level))]
    pub fn compress(&self, input: &Path, request: &CompressionRequest) -> Result<PathBuf> {
        request.validate()?;
        require_input(input)?;

        let bytes = self.compressor.compress(input, request)?;
        let path = self.write_output(input, "compressed", &bytes)?;
        info!(size = bytes.len(), path = %path.display(), "compress finished");
        Ok(path)
    }

    // -- Content-level operations (fallback chain) ------------------------------

    /// Rotate every page by `degrees`, normalised to a multiple of 90 in
    /// `0..360` and added to the page's existing rotation.
    #[instrument(skip_all, fields(path = %input.display(), degrees))]
    pub fn rotate(&self, input: &Path, degrees: i64) -> Result<PathBuf> {
        require_input(input)?;
        let degrees = normalise_rotation(degrees);
        self.transform("rotate", "rotated", input, |backend, document| {
            backend.rotate(document, degrees)
        })
    }

    #[instrument(skip_all, fields(path = %input.display(), crop = ?crop))]
    pub fn crop(&self, input: &Path, crop: &CropBox) -> Result<PathBuf> {
        crop.validate()?;
        require_input(input)?;
        self.transform("crop", "cropped", input, |backend, document| backend.crop(document, crop))
    }

    #[instrument(skip_all, fields(path = %input.display(), text = %watermark.text))]
    pub fn add_watermark(&self, input: &Path, watermark: &Watermark) -> Result<PathBuf> {
        watermark.validate()?;
        require_input(input)?;
        let style = &self.config.watermark;
        self.transform("watermark", "watermarked", input, |backend, document| {
            backend.watermark(document, watermark, style)
        })
    }

    #[instrument(skip_all, fields(path = %input.display(), format = %numbering.format))]
    pub fn add_page_numbers(&self, input: &Path, numbering: &PageNumbering) -> Result<PathBuf> {
        numbering.validate()?;
        require_input(input)?;
        self.transform("page numbers", "numbered", input, |backend, document| {
            backend.page_numbers(document, numbering)
        })
    }

    #[instrument(skip_all, fields(path = %input.display()))]
    pub fn repair(&self, input: &Path) -> Result<PathBuf> {
        require_input(input)?;
        let version = self.config.pdf_version.as_str();
        self.transform("repair", "repaired", input, |backend, document| {
            backend.repair(document, version)
        })
    }

    // -- Encryption -------------------------------------------------------------

    /// Encrypt `input` with `password` as both the user and owner password.
    #[instrument(skip_all, fields(path = %input.display()))]
    pub fn protect(&self, input: &Path, password: &str) -> Result<PathBuf> {
        if password.is_empty() {
            return Err(ValidationError::EmptyPassword.into());
        }
        require_input(input)?;

        let mut document = load("protect", input)?;
        if document.is_encrypted() {
            return Err(PdfwerkError::processing("protect", "document is already encrypted"));
        }
        ensure_document_id(&mut document);

        let version = EncryptionVersion::V2 {
            document: &document,
            owner_password: password,
            user_password: password,
            key_length: ENCRYPTION_KEY_BITS,
            permissions: Permissions::all(),
        };
        let state = EncryptionState::try_from(version)
            .map_err(|err| PdfwerkError::processing("protect", format!("cannot derive encryption key: {err}")))?;
        document
            .encrypt(&state)
            .map_err(|err| PdfwerkError::processing("protect", format!("cannot encrypt: {err}")))?;

        let bytes = to_bytes("protect", &mut document)?;
        let path = self.write_output(input, "protected", &bytes)?;
        info!(path = %path.display(), "document encrypted");
        Ok(path)
    }

    /// Decrypt `input` with `password`. Unencrypted documents are rewritten
    /// unchanged.
    #[instrument(skip_all, fields(path = %input.display()))]
    pub fn unlock(&self, input: &Path, password: &str) -> Result<PathBuf> {
        require_input(input)?;

        let mut document = load("unlock", input)?;
        if document.is_encrypted() {
            document = load_encrypted("unlock", input, password)?;
            document.prune_objects();

            let pages = page_count(&document);
            if pages == 0 {
                return Err(PdfwerkError::processing("unlock", "decrypted document has no pages"));
            }
            if let Some(declared) = declared_page_count(&document)
                && declared != pages
            {
                return Err(PdfwerkError::processing(
                    "unlock",
                    format!("decrypted document has {pages} pages, page tree declares {declared}"),
                ));
            }
        } else {
            debug!("document is not encrypted");
        }

        let bytes = to_bytes("unlock", &mut document)?;
        let path = self.write_output(input, "unlocked", &bytes)?;
        info!(path = %path.display(), "document unlocked");
        Ok(path)
    }

    // -- Inspection -------------------------------------------------------------

    /// Compare two documents page by page and write a JSON report next to the
    /// other outputs.
    #[instrument(skip_all, fields(first = %first.display(), second = %second.display()))]
    pub fn compare(&self, first: &Path, second: &Path) -> Result<CompareResult> {
        require_input(first)?;
        require_input(second)?;

        let (left, right) = self.backends.run("compare", |backend| {
            let left = load("compare", first)?;
            let right = load("compare", second)?;
            Ok((backend.page_signatures(&left)?, backend.page_signatures(&right)?))
        })?;

        let differences: Vec<PageDifference> = (0..left.len().max(right.len()))
            .filter(|&index| left.get(index) != right.get(index))
            .map(|index| PageDifference {
                page: index as u32 + 1,
                difference: true,
            })
            .collect();

        let mut result = CompareResult {
            pages_doc1: left.len() as u32,
            pages_doc2: right.len() as u32,
            differences_count: differences.len(),
            differences,
            doc1_sha256: file_sha256(first)?,
            doc2_sha256: file_sha256(second)?,
            report_path: PathBuf::new(),
        };

        let report = serde_json::to_vec_pretty(&result)?;
        let stem = format!("{}_vs_{}_compare", input_stem(first), input_stem(second));
        result.report_path = self.output.write_unique(&stem, "json", &report)?;
        info!(
            differences = result.differences_count,
            report = %result.report_path.display(),
            "compare finished"
        );
        Ok(result)
    }

    #[instrument(skip_all, fields(path = %input.display()))]
    pub fn get_metadata(&self, input: &Path) -> Result<PdfMetadata> {
        require_input(input)?;

        let (page_count, mut metadata) = self.backends.run("metadata", |backend| {
            let document = load("metadata", input)?;
            Ok((page_count(&document), backend.document_info(&document)?))
        })?;
        metadata.file_size = std::fs::metadata(input)?.len();

        debug!(page_count, version = %metadata.pdf_version, "metadata read");
        Ok(PdfMetadata { page_count, metadata })
    }

    // -- Internals ----------------------------------------------------------------

    /// Run a content-level operation through the backend chain. Each attempt
    /// reloads `input`, so a failed primary never leaks into the fallback.
    fn transform<F>(&self, step: &str, suffix: &str, input: &Path, operation: F) -> Result<PathBuf>
    where
        F: Fn(&dyn PdfBackend, &mut Document) -> Result<()>,
    {
        let bytes = self.backends.run(step, |backend| {
            let mut document = load(step, input)?;
            operation(backend, &mut document)?;
            to_bytes(step, &mut document)
        })?;
        let path = self.write_output(input, suffix, &bytes)?;
        info!(step, size = bytes.len(), path = %path.display(), "operation finished");
        Ok(path)
    }

    fn write_output(&self, input: &Path, suffix: &str, bytes: &[u8]) -> Result<PathBuf> {
        let stem = format!("{}_{suffix}", input_stem(input));
        self.output.write_unique(&stem, "pdf", bytes)
    }
}

/// Map any angle onto 0, 90, 180 or 270.
pub fn normalise_rotation(degrees: i64) -> i64 {
    let degrees = degrees.rem_euclid(360);
    degrees - degrees % 90
}

fn require_input(path: &Path) -> Result<()> {
    if path.is_file() {
        Ok(())
    } else {
        Err(PdfwerkError::NotFound(path.to_path_buf()))
    }
}

fn file_sha256(path: &Path) -> Result<String> {
    let bytes = std::fs::read(path)?;
    Ok(hex::encode(Sha256::digest(&bytes)))
}

/// Standard encryption derives its key from the trailer `/ID`; give documents
/// that lack one a random identifier.
fn ensure_document_id(document: &mut Document) {
    if matches!(document.trailer.get(b"ID"), Ok(Object::Array(ids)) if ids.len() == 2) {
        return;
    }
    let id = Uuid::new_v4().as_bytes().to_vec();
    document.trailer.set(
        "ID",
        vec![
            Object::String(id.clone(), StringFormat::Hexadecimal),
            Object::String(id, StringFormat::Hexadecimal),
        ],
    );
}
