// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Structural backend — whole-page operations only. Documents are rebuilt by
// copying pages, stamps are merged as generated overlays, and page content
// is never parsed.

use lopdf::{Document, Object};
use pdfwerk_core::config::WatermarkStyle;
use pdfwerk_core::error::{PdfwerkError, Result};
use pdfwerk_core::types::{CropBox, DocumentInfo, PageNumbering, Watermark};
use sha2::{Digest, Sha256};
use tracing::{info, instrument, warn};

use super::PdfBackend;
use crate::geometry::{layout_page_number, layout_watermark};
use crate::pdf::copy::{PageCopier, carry_document_info, copy_pages, empty_document};
use crate::pdf::document::{page_content, page_count, page_ids, page_rotation, resolve, visible_box};
use crate::pdf::overlay::OverlayMerger;
use crate::pdf::stamp::InkStyle;

/// Page-level backend: copy, append, rotate, overlay.
pub struct StructuralBackend;

impl PdfBackend for StructuralBackend {
    fn name(&self) -> &'static str {
        "structural"
    }

    #[instrument(skip_all, fields(degrees))]
    fn rotate(&self, document: &mut Document, degrees: i64) -> Result<()> {
        let pages: Vec<u32> = (1..=page_count(document)).collect();
        let mut rebuilt = copy_pages(document, &pages, &document.version)?;
        for page_id in page_ids(&rebuilt) {
            let rotation = (page_rotation(&rebuilt, page_id) + degrees).rem_euclid(360);
            rebuilt
                .get_dictionary_mut(page_id)
                .map_err(|err| PdfwerkError::processing("rotate", err))?
                .set("Rotate", rotation);
        }
        *document = rebuilt;
        Ok(())
    }

    fn crop(&self, _document: &mut Document, crop: &CropBox) -> Result<()> {
        warn!(?crop, "structural backend cannot crop, document left unmodified");
        Ok(())
    }

    #[instrument(skip_all, fields(text = %watermark.text))]
    fn watermark(&self, document: &mut Document, watermark: &Watermark, style: &WatermarkStyle) -> Result<()> {
        let mut merger = OverlayMerger::new();
        let ink = InkStyle {
            gray: style.gray,
            opacity: Some(style.opacity),
        };
        for page_id in page_ids(document) {
            let page = visible_box(document, page_id);
            let placement = layout_watermark(&page, watermark.position, &watermark.text, style);
            merger.merge(document, page_id, &placement, ink)?;
        }
        Ok(())
    }

    #[instrument(skip_all, fields(start_page = numbering.start_page))]
    fn page_numbers(&self, document: &mut Document, numbering: &PageNumbering) -> Result<()> {
        let total = page_count(document);
        let mut merger = OverlayMerger::new();
        for (page_number, page_id) in (1u32..).zip(page_ids(document)) {
            if page_number < numbering.start_page {
                continue;
            }
            let page = visible_box(document, page_id);
            let label = numbering.label(page_number, total);
            let placement = layout_page_number(&page, numbering.position, &label, numbering.font_size);
            merger.merge(document, page_id, &placement, InkStyle::BLACK)?;
        }
        Ok(())
    }

    /// Copy every readable page into a fresh document, skipping pages that
    /// cannot be copied.
    #[instrument(skip_all)]
    fn repair(&self, document: &mut Document, version: &str) -> Result<()> {
        let mut rebuilt = empty_document(version);
        let mut copier = PageCopier::new(document);
        let mut skipped = 0usize;
        for page_id in page_ids(document) {
            if let Err(err) = copier.append_page_id(&mut rebuilt, page_id) {
                warn!(?page_id, %err, "page could not be recovered");
                skipped += 1;
            }
        }
        let recovered = page_count(&rebuilt);
        if recovered == 0 {
            return Err(PdfwerkError::processing("repair", "no page could be recovered"));
        }
        carry_document_info(document, &mut rebuilt);
        info!(recovered, skipped, "pages copied into rebuilt document");
        *document = rebuilt;
        Ok(())
    }

    /// SHA-256 of each page's decoded content streams.
    ///
    /// Pages are compared by their drawing operators, not by extracted text:
    /// two pages showing the same text through different content bytes are
    /// reported as different.
    fn page_signatures(&self, document: &Document) -> Result<Vec<String>> {
        Ok(page_ids(document)
            .into_iter()
            .map(|page_id| hex::encode(Sha256::digest(page_content(document, page_id))))
            .collect())
    }

    /// Information dictionary strings as stored, without date parsing.
    fn document_info(&self, document: &Document) -> Result<DocumentInfo> {
        let info = document
            .trailer
            .get(b"Info")
            .ok()
            .and_then(|object| resolve(document, object))
            .and_then(|object| object.as_dict().ok());
        let raw = |key: &[u8]| -> Option<String> {
            match info?.get(key).ok().and_then(|object| resolve(document, object))? {
                Object::String(bytes, _) => Some(String::from_utf8_lossy(bytes).into_owned()),
                _ => None,
            }
        };

        Ok(DocumentInfo {
            title: raw(b"Title"),
            author: raw(b"Author"),
            subject: raw(b"Subject"),
            keywords: raw(b"Keywords"),
            creator: raw(b"Creator"),
            producer: raw(b"Producer"),
            creation_date: raw(b"CreationDate"),
            modification_date: raw(b"ModDate"),
            pdf_version: document.version.clone(),
            encrypted: document.is_encrypted(),
            file_size: 0,
        })
    }
}
