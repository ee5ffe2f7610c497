// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Direct text stamping: writes text operators into a page's content stream
// with a standard Helvetica font resource.

use lopdf::content::{Content, Operation};
use lopdf::{Document, Object, ObjectId, dictionary};
use pdfwerk_core::error::{PdfwerkError, Result};
use tracing::debug;

use super::document::{append_page_content, encode_win_ansi, insert_resource, page_resources_mut, unused_resource_name};
use crate::geometry::TextPlacement;

/// Fill colour and transparency of stamped text.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InkStyle {
    /// 0.0 black to 1.0 white.
    pub gray: f32,
    /// Fill opacity; `None` leaves the page's opacity alone.
    pub opacity: Option<f32>,
}

impl InkStyle {
    pub const BLACK: InkStyle = InkStyle {
        gray: 0.0,
        opacity: None,
    };
}

/// Writes text stamps into one document, sharing a single font object (and
/// one graphics state per opacity) across all stamped pages.
pub struct TextStamper {
    font_id: ObjectId,
    graphics_state: Option<(f32, ObjectId)>,
}

impl TextStamper {
    pub fn new(document: &mut Document) -> Self {
        let font_id = document.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
            "Encoding" => "WinAnsiEncoding",
        });
        Self {
            font_id,
            graphics_state: None,
        }
    }

    fn graphics_state(&mut self, document: &mut Document, opacity: f32) -> ObjectId {
        match self.graphics_state {
            Some((cached, id)) if cached == opacity => id,
            _ => {
                let id = document.add_object(dictionary! {
                    "Type" => "ExtGState",
                    "ca" => Object::Real(opacity.clamp(0.0, 1.0).into()),
                    "CA" => Object::Real(opacity.clamp(0.0, 1.0).into()),
                });
                self.graphics_state = Some((opacity, id));
                id
            }
        }
    }

    /// Draw `placement` on the page, above its existing content.
    pub fn stamp(
        &mut self,
        document: &mut Document,
        page_id: ObjectId,
        placement: &TextPlacement,
        ink: InkStyle,
    ) -> Result<()> {
        let gs_id = ink.opacity.map(|opacity| self.graphics_state(document, opacity));
        let font_id = self.font_id;

        let resources = page_resources_mut(document, page_id)?;
        let font_name = unused_resource_name(resources, b"Font", "PwF");
        insert_resource(resources, b"Font", &font_name, Object::Reference(font_id));
        let gs_name = gs_id.map(|id| {
            let name = unused_resource_name(resources, b"ExtGState", "PwGS");
            insert_resource(resources, b"ExtGState", &name, Object::Reference(id));
            name
        });

        let content = text_operations(placement, &font_name, gs_name.as_deref(), ink.gray)
            .encode()
            .map_err(|err| PdfwerkError::processing("stamp", format!("cannot encode content: {err}")))?;
        append_page_content(document, page_id, content, true)?;

        debug!(?page_id, text = %placement.text, x = placement.x, y = placement.y, size = placement.font_size, "text stamped");
        Ok(())
    }
}

/// `q [gs] g BT Tf Tm Tj ET Q` for one placement.
pub fn text_operations(placement: &TextPlacement, font: &str, graphics_state: Option<&str>, gray: f32) -> Content {
    let mut operations = vec![Operation::new("q", vec![])];
    if let Some(name) = graphics_state {
        operations.push(Operation::new("gs", vec![Object::Name(name.as_bytes().to_vec())]));
    }
    let matrix: Vec<Object> = placement
        .text_matrix()
        .iter()
        .map(|value| Object::Real((*value).into()))
        .collect();
    operations.extend([
        Operation::new("g", vec![Object::Real(gray.clamp(0.0, 1.0).into())]),
        Operation::new("BT", vec![]),
        Operation::new(
            "Tf",
            vec![
                Object::Name(font.as_bytes().to_vec()),
                Object::Real(placement.font_size.into()),
            ],
        ),
        Operation::new("Tm", matrix),
        Operation::new(
            "Tj",
            vec![Object::String(encode_win_ansi(&placement.text), lopdf::StringFormat::Literal)],
        ),
        Operation::new("ET", vec![]),
        Operation::new("Q", vec![]),
    ]);
    Content { operations }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pdf::document::{page_ids, page_text, to_bytes};
    use crate::testing;

    fn placement(text: &str) -> TextPlacement {
        TextPlacement {
            text: text.to_string(),
            x: 50.0,
            y: 40.0,
            font_size: 12.0,
            angle: 0.0,
        }
    }

    #[test]
    fn stamped_text_is_extractable() {
        let mut document = testing::numbered_document(2);
        let mut stamper = TextStamper::new(&mut document);
        let page = page_ids(&document)[1];
        stamper
            .stamp(&mut document, page, &placement("STAMPED"), InkStyle::BLACK)
            .unwrap();

        let bytes = to_bytes("test", &mut document).unwrap();
        let reloaded = Document::load_mem(&bytes).unwrap();
        assert!(page_text(&reloaded, 2).unwrap().contains("STAMPED"));
        assert!(page_text(&reloaded, 2).unwrap().contains("Page 2 content"));
        assert!(!page_text(&reloaded, 1).unwrap().contains("STAMPED"));
    }

    #[test]
    fn shared_resources_are_not_mutated() {
        let mut document = testing::numbered_document(2);
        let mut stamper = TextStamper::new(&mut document);
        let first = page_ids(&document)[0];
        stamper
            .stamp(&mut document, first, &placement("X"), InkStyle::BLACK)
            .unwrap();

        // The untouched page still points at the shared dictionary, which
        // has no stamp font.
        let second = page_ids(&document)[1];
        let Ok(Object::Reference(shared)) = document.get_dictionary(second).unwrap().get(b"Resources") else {
            panic!("second page should keep its shared resources");
        };
        let fonts = document.get_dictionary(*shared).unwrap().get(b"Font").unwrap();
        let fonts = crate::pdf::document::resolve(&document, fonts).unwrap().as_dict().unwrap();
        assert!(!fonts.has(b"PwF0"));
    }

    #[test]
    fn opacity_adds_one_graphics_state() {
        let mut document = testing::numbered_document(3);
        let mut stamper = TextStamper::new(&mut document);
        let ink = InkStyle {
            gray: 0.5,
            opacity: Some(0.3),
        };
        for page in page_ids(&document) {
            stamper.stamp(&mut document, page, &placement("DRAFT"), ink).unwrap();
        }
        let states = document
            .objects
            .values()
            .filter(|object| object.type_name().ok() == Some(b"ExtGState".as_slice()))
            .count();
        assert_eq!(states, 1);
    }

    #[test]
    fn rotated_text_uses_text_matrix() {
        let mut rotated = placement("R");
        rotated.angle = 45.0;
        let content = text_operations(&rotated, "PwF0", None, 0.0);
        let tm = content
            .operations
            .iter()
            .find(|op| op.operator == "Tm")
            .unwrap();
        assert_eq!(tm.operands.len(), 6);
    }
}
