// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// High-fidelity backend — edits page dictionaries and content streams in
// place: page boxes, direct text stamping, text extraction.

use chrono::{DateTime, FixedOffset, NaiveDate, TimeZone};
use lopdf::{Document, Object};
use pdfwerk_core::config::WatermarkStyle;
use pdfwerk_core::error::{PdfwerkError, Result};
use pdfwerk_core::types::{CropBox, DocumentInfo, PageNumbering, Rect, Watermark};
use tracing::{debug, info, instrument};

use super::PdfBackend;
use crate::geometry::{layout_page_number, layout_watermark};
use crate::pdf::document::{
    decode_text_string, page_count, page_ids, page_rotation, page_text, rect_to_object, resolve,
    visible_box,
};
use crate::pdf::stamp::{InkStyle, TextStamper};

/// Content-editing backend built directly on lopdf's object model.
pub struct HighFidelityBackend;

impl PdfBackend for HighFidelityBackend {
    fn name(&self) -> &'static str {
        "high-fidelity"
    }

    #[instrument(skip_all, fields(degrees))]
    fn rotate(&self, document: &mut Document, degrees: i64) -> Result<()> {
        for page_id in page_ids(document) {
            let rotation = (page_rotation(document, page_id) + degrees).rem_euclid(360);
            document
                .get_dictionary_mut(page_id)
                .map_err(|err| PdfwerkError::processing("rotate", err))?
                .set("Rotate", rotation);
        }
        Ok(())
    }

    #[instrument(skip_all, fields(x = crop.x, y = crop.y, width = crop.width, height = crop.height))]
    fn crop(&self, document: &mut Document, crop: &CropBox) -> Result<()> {
        for (index, page_id) in page_ids(document).into_iter().enumerate() {
            let visible = visible_box(document, page_id);
            let rotation = page_rotation(document, page_id);
            let region = viewer_region_to_user_space(&visible, rotation, crop).ok_or_else(|| {
                PdfwerkError::processing(
                    "crop",
                    format!("crop region lies outside page {}", index + 1),
                )
            })?;
            debug!(page = index + 1, ?region, "crop box set");
            document
                .get_dictionary_mut(page_id)
                .map_err(|err| PdfwerkError::processing("crop", err))?
                .set("CropBox", rect_to_object(&region));
        }
        Ok(())
    }

    #[instrument(skip_all, fields(text = %watermark.text))]
    fn watermark(&self, document: &mut Document, watermark: &Watermark, style: &WatermarkStyle) -> Result<()> {
        let mut stamper = TextStamper::new(document);
        let ink = InkStyle {
            gray: style.gray,
            opacity: Some(style.opacity),
        };
        for page_id in page_ids(document) {
            let page = visible_box(document, page_id);
            let placement = layout_watermark(&page, watermark.position, &watermark.text, style);
            stamper.stamp(document, page_id, &placement, ink)?;
        }
        Ok(())
    }

    #[instrument(skip_all, fields(start_page = numbering.start_page))]
    fn page_numbers(&self, document: &mut Document, numbering: &PageNumbering) -> Result<()> {
        let total = page_count(document);
        let mut stamper = TextStamper::new(document);
        for (page_number, page_id) in (1u32..).zip(page_ids(document)) {
            if page_number < numbering.start_page {
                continue;
            }
            let page = visible_box(document, page_id);
            let label = numbering.label(page_number, total);
            let placement = layout_page_number(&page, numbering.position, &label, numbering.font_size);
            stamper.stamp(document, page_id, &placement, InkStyle::BLACK)?;
        }
        Ok(())
    }

    #[instrument(skip_all)]
    fn repair(&self, document: &mut Document, _version: &str) -> Result<()> {
        if document.get_pages().is_empty() {
            return Err(PdfwerkError::processing("repair", "page tree is empty or unreadable"));
        }
        document.decompress();
        let empty = document.delete_zero_length_streams();
        let pruned = document.prune_objects();
        document.renumber_objects();
        document.compress();
        info!(empty_streams = empty.len(), pruned = pruned.len(), "document cleaned");
        Ok(())
    }

    fn page_signatures(&self, document: &Document) -> Result<Vec<String>> {
        (1..=page_count(document))
            .map(|page| page_text(document, page).map(|text| normalise_whitespace(&text)))
            .collect()
    }

    fn document_info(&self, document: &Document) -> Result<DocumentInfo> {
        let info = document
            .trailer
            .get(b"Info")
            .ok()
            .and_then(|object| resolve(document, object))
            .and_then(|object| object.as_dict().ok());

        let text = |key: &[u8]| -> Option<String> {
            match info?.get(key).ok().and_then(|object| resolve(document, object))? {
                Object::String(bytes, _) => Some(decode_text_string(bytes)),
                Object::Name(name) => Some(String::from_utf8_lossy(name).into_owned()),
                _ => None,
            }
        };
        let date = |key: &[u8]| -> Option<String> {
            let raw = text(key)?;
            Some(parse_pdf_date(&raw).map(|date| date.to_rfc3339()).unwrap_or(raw))
        };

        Ok(DocumentInfo {
            title: text(b"Title"),
            author: text(b"Author"),
            subject: text(b"Subject"),
            keywords: text(b"Keywords"),
            creator: text(b"Creator"),
            producer: text(b"Producer"),
            creation_date: date(b"CreationDate"),
            modification_date: date(b"ModDate"),
            pdf_version: document.version.clone(),
            encrypted: document.is_encrypted(),
            file_size: 0,
        })
    }
}

/// Convert a crop region measured from the top-left corner of the page as a
/// viewer shows it into PDF user space, clipped to `visible`.
///
/// `visible` is the page's current visible box and `rotation` its /Rotate
/// (clockwise, a multiple of 90).
pub fn viewer_region_to_user_space(visible: &Rect, rotation: i64, crop: &CropBox) -> Option<Rect> {
    let region = match rotation.rem_euclid(360) {
        90 => Rect::new(visible.x + crop.y, visible.y + crop.x, crop.height, crop.width),
        180 => Rect::new(
            visible.right() - crop.x - crop.width,
            visible.y + crop.y,
            crop.width,
            crop.height,
        ),
        270 => Rect::new(
            visible.right() - crop.y - crop.height,
            visible.top() - crop.x - crop.width,
            crop.height,
            crop.width,
        ),
        _ => Rect::new(
            visible.x + crop.x,
            visible.top() - crop.y - crop.height,
            crop.width,
            crop.height,
        ),
    };
    region.intersect(visible)
}

fn normalise_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Parse a PDF date string (`D:YYYYMMDDHHmmSSOHH'mm'`). Every field after the
/// year is optional; a missing offset means UTC.
pub fn parse_pdf_date(raw: &str) -> Option<DateTime<FixedOffset>> {
    let body = raw.trim().strip_prefix("D:").unwrap_or(raw.trim());
    let digits_end = body
        .find(|ch: char| !ch.is_ascii_digit())
        .unwrap_or(body.len());
    let (digits, zone) = body.split_at(digits_end);
    if digits.len() < 4 {
        return None;
    }

    let field = |start: usize, len: usize, default: u32| -> Option<u32> {
        match digits.get(start..start + len) {
            Some(part) => part.parse().ok(),
            None => Some(default),
        }
    };
    let year = digits.get(0..4)?.parse::<i32>().ok()?;
    let naive = NaiveDate::from_ymd_opt(year, field(4, 2, 1)?, field(6, 2, 1)?)?
        .and_hms_opt(field(8, 2, 0)?, field(10, 2, 0)?, field(12, 2, 0)?)?;

    let offset = parse_offset(zone)?;
    offset.from_local_datetime(&naive).single()
}

/// `Z`, empty, `+HH'mm'`, `-HH'mm`, `+HH`.
fn parse_offset(zone: &str) -> Option<FixedOffset> {
    let zone = zone.trim();
    let sign = match zone.chars().next() {
        None | Some('Z') => return FixedOffset::east_opt(0),
        Some('+') => 1,
        Some('-') => -1,
        Some(_) => return None,
    };
    let numbers: Vec<i32> = zone[1..]
        .split('\'')
        .filter(|part| !part.is_empty())
        .map(|part| part.parse().ok())
        .collect::<Option<_>>()?;
    let hours = numbers.first().copied().unwrap_or(0);
    let minutes = numbers.get(1).copied().unwrap_or(0);
    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
}
