// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Overlay merging — stamps are generated as standalone one-page PDFs with
// `printpdf` and merged onto target pages as Form XObjects.
//
// printpdf 0.8 builds pages from `Vec<Op>` lists; the stamp page is sized to
// the text run so the form's bounding box hugs the glyphs. Rotation, colour
// and transparency are applied by the placing content stream, not the stamp.

use std::collections::HashMap;

use lopdf::content::{Content, Operation};
use lopdf::{Document, Object, ObjectId, Stream, dictionary};
use pdfwerk_core::error::{PdfwerkError, Result};
use printpdf::{BuiltinFont, Mm, Op, PdfDocument, PdfPage, PdfSaveOptions, PdfWarnMsg, Point, Pt, TextItem};
use tracing::{debug, instrument};

use super::copy::PageCopier;
use super::document::{append_page_content, insert_resource, page_content, page_ids, page_resources_mut, unused_resource_name};
use super::stamp::InkStyle;
use crate::geometry::{TextPlacement, text_width};

/// Space below the baseline inside a stamp page, as a fraction of the font
/// size. Covers Helvetica descenders.
const DESCENT_RATIO: f32 = 0.25;

const PT_PER_MM: f32 = 72.0 / 25.4;

/// Render `text` as a one-page PDF exactly one text run in size, baseline at
/// `DESCENT_RATIO * font_size` above the bottom edge.
#[instrument(skip_all, fields(text = %text, font_size = font_size))]
pub fn render_stamp(text: &str, font_size: f32) -> Vec<u8> {
    let width = text_width(text, font_size).max(1.0);
    let height = font_size * (1.0 + DESCENT_RATIO);

    let ops = vec![
        Op::StartTextSection,
        Op::SetTextCursor {
            pos: Point {
                x: Pt(0.0),
                y: Pt(font_size * DESCENT_RATIO),
            },
        },
        Op::SetFontSizeBuiltinFont {
            size: Pt(font_size),
            font: BuiltinFont::Helvetica,
        },
        Op::WriteTextBuiltinFont {
            items: vec![TextItem::Text(text.to_string())],
            font: BuiltinFont::Helvetica,
        },
        Op::EndTextSection,
    ];

    let mut doc = PdfDocument::new("pdfwerk stamp");
    doc.with_pages(vec![PdfPage::new(Mm(width / PT_PER_MM), Mm(height / PT_PER_MM), ops)]);

    let mut warnings: Vec<PdfWarnMsg> = Vec::new();
    let bytes = doc.save(&PdfSaveOptions::default(), &mut warnings);
    debug!(width, height, warnings = warnings.len(), "stamp rendered");
    bytes
}

/// Merges rendered stamps onto pages of one target document.
///
/// Each distinct (text, size) pair is rendered and imported once, so a
/// watermark repeated on every page costs a single Form XObject.
pub struct OverlayMerger {
    forms: HashMap<(String, u32), ObjectId>,
    graphics_state: Option<ObjectId>,
}

impl OverlayMerger {
    pub fn new() -> Self {
        Self {
            forms: HashMap::new(),
            graphics_state: None,
        }
    }

    /// Import the stamp for `text` at `font_size` as a Form XObject.
    fn form_for(&mut self, target: &mut Document, text: &str, font_size: f32) -> Result<ObjectId> {
        let key = (text.to_string(), font_size.to_bits());
        if let Some(form) = self.forms.get(&key) {
            return Ok(*form);
        }

        let bytes = render_stamp(text, font_size);
        let stamp = Document::load_mem(&bytes)
            .map_err(|err| PdfwerkError::processing("overlay", format!("generated stamp is unreadable: {err}")))?;
        let stamp_page = *page_ids(&stamp)
            .first()
            .ok_or_else(|| PdfwerkError::processing("overlay", "generated stamp has no page"))?;

        let width = text_width(text, font_size).max(1.0);
        let height = font_size * (1.0 + DESCENT_RATIO);
        let resources = stamp
            .get_dictionary(stamp_page)
            .ok()
            .and_then(|page| page.get(b"Resources").ok())
            .cloned()
            .unwrap_or_else(|| Object::Dictionary(lopdf::Dictionary::new()));

        let mut copier = PageCopier::new(&stamp);
        let resources = copier.import_object(target, &resources)?;
        let form = Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Form",
                "BBox" => vec![0.into(), 0.into(), Object::Real(width.into()), Object::Real(height.into())],
                "Resources" => resources,
            },
            page_content(&stamp, stamp_page),
        );
        let form_id = target.add_object(form);
        self.forms.insert(key, form_id);
        Ok(form_id)
    }

    fn graphics_state(&mut self, target: &mut Document, opacity: f32) -> ObjectId {
        *self.graphics_state.get_or_insert_with(|| {
            let opacity = opacity.clamp(0.0, 1.0);
            target.add_object(dictionary! {
                "Type" => "ExtGState",
                "ca" => Object::Real(opacity.into()),
                "CA" => Object::Real(opacity.into()),
            })
        })
    }

    /// Place the stamp for `placement` on the page.
    pub fn merge(
        &mut self,
        target: &mut Document,
        page_id: ObjectId,
        placement: &TextPlacement,
        ink: InkStyle,
    ) -> Result<()> {
        let form_id = self.form_for(target, &placement.text, placement.font_size)?;
        let gs_id = ink.opacity.map(|opacity| self.graphics_state(target, opacity));

        let resources = page_resources_mut(target, page_id)?;
        let form_name = unused_resource_name(resources, b"XObject", "PwX");
        insert_resource(resources, b"XObject", &form_name, Object::Reference(form_id));
        let gs_name = gs_id.map(|id| {
            let name = unused_resource_name(resources, b"ExtGState", "PwGS");
            insert_resource(resources, b"ExtGState", &name, Object::Reference(id));
            name
        });

        let content = placement_operations(placement, &form_name, gs_name.as_deref(), ink.gray)
            .encode()
            .map_err(|err| PdfwerkError::processing("overlay", format!("cannot encode content: {err}")))?;
        append_page_content(target, page_id, content, true)?;
        debug!(?page_id, form = %form_name, "overlay merged");
        Ok(())
    }
}

impl Default for OverlayMerger {
    fn default() -> Self {
        Self::new()
    }
}

/// `q [gs] g cm Do Q`: maps the stamp's baseline origin onto the placement
/// origin, rotated by the placement angle.
fn placement_operations(placement: &TextPlacement, form: &str, graphics_state: Option<&str>, gray: f32) -> Content {
    let (sin, cos) = placement.angle.to_radians().sin_cos();
    let descent = placement.font_size * DESCENT_RATIO;
    let matrix = [
        cos,
        sin,
        -sin,
        cos,
        placement.x + sin * descent,
        placement.y - cos * descent,
    ];

    let mut operations = vec![Operation::new("q", vec![])];
    if let Some(name) = graphics_state {
        operations.push(Operation::new("gs", vec![Object::Name(name.as_bytes().to_vec())]));
    }
    operations.extend([
        Operation::new("g", vec![Object::Real(gray.clamp(0.0, 1.0).into())]),
        Operation::new("cm", matrix.iter().map(|value| Object::Real((*value).into())).collect()),
        Operation::new("Do", vec![Object::Name(form.as_bytes().to_vec())]),
        Operation::new("Q", vec![]),
    ]);
    Content { operations }
}
