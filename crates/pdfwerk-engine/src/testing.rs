// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Fixture documents for unit tests.

use std::path::{Path, PathBuf};

use image::{ImageBuffer, Rgb};
use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Document, Object, ObjectId, Stream, dictionary};

/// Build a page tree with one page per entry, each page showing its text in
/// Helvetica. Pages carry their own MediaBox; resources are shared through a
/// reference.
pub fn document_with_pages(texts: &[&str]) -> Document {
    let mut document = Document::with_version("1.5");
    let pages_id = document.new_object_id();
    let resources_id = shared_font_resources(&mut document);

    let kids: Vec<Object> = texts
        .iter()
        .map(|text| {
            let content_id = text_content(&mut document, text);
            let page_id = document.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
                "Resources" => resources_id,
                "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
            });
            Object::Reference(page_id)
        })
        .collect();

    finish_tree(&mut document, pages_id, kids, Dictionary::new());
    document
}

/// Pages labelled "Page 1 content" .. "Page n content".
pub fn numbered_document(pages: u32) -> Document {
    let texts: Vec<String> = (1..=pages).map(|page| format!("Page {page} content")).collect();
    let refs: Vec<&str> = texts.iter().map(String::as_str).collect();
    document_with_pages(&refs)
}

/// Pages whose MediaBox and Resources live only on the page tree root.
pub fn document_with_inherited_box(pages: u32, size: (i64, i64)) -> Document {
    let mut document = Document::with_version("1.5");
    let pages_id = document.new_object_id();
    let resources_id = shared_font_resources(&mut document);

    let kids: Vec<Object> = (1..=pages)
        .map(|page| {
            let content_id = text_content(&mut document, &format!("Page {page} content"));
            let page_id = document.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
            });
            Object::Reference(page_id)
        })
        .collect();

    let inherited = dictionary! {
        "Resources" => resources_id,
        "MediaBox" => vec![0.into(), 0.into(), size.0.into(), size.1.into()],
    };
    finish_tree(&mut document, pages_id, kids, inherited);
    document
}

/// A single page drawing a `side`×`side` JPEG image across the page.
pub fn document_with_photo(side: u32) -> Document {
    let mut document = Document::with_version("1.5");
    let pages_id = document.new_object_id();

    let photo: ImageBuffer<Rgb<u8>, Vec<u8>> = ImageBuffer::from_fn(side, side, |x, y| {
        let noise = (x.wrapping_mul(7919) ^ y.wrapping_mul(104_729)) % 64;
        Rgb([
            ((x * 255 / side) as u8).wrapping_add(noise as u8),
            ((y * 255 / side) as u8).wrapping_sub(noise as u8),
            (((x + y) * 127 / side) as u8) ^ (noise as u8),
        ])
    });
    let mut jpeg = Vec::new();
    let encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(&mut jpeg, 95);
    photo.write_with_encoder(encoder).expect("encode fixture JPEG");

    let image_id = document.add_object(Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => side as i64,
            "Height" => side as i64,
            "ColorSpace" => "DeviceRGB",
            "BitsPerComponent" => 8,
            "Filter" => "DCTDecode",
        },
        jpeg,
    ));

    let content = Content {
        operations: vec![
            Operation::new("q", vec![]),
            Operation::new(
                "cm",
                vec![612.into(), 0.into(), 0.into(), 792.into(), 0.into(), 0.into()],
            ),
            Operation::new("Do", vec![Object::Name(b"Im0".to_vec())]),
            Operation::new("Q", vec![]),
        ],
    };
    let content_id = document.add_object(Stream::new(
        Dictionary::new(),
        content.encode().expect("encode fixture content"),
    ));
    let page_id = document.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "Contents" => content_id,
        "Resources" => dictionary! { "XObject" => dictionary! { "Im0" => image_id } },
        "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
    });

    finish_tree(&mut document, pages_id, vec![Object::Reference(page_id)], Dictionary::new());
    document
}

/// Save `document` as `dir/name` and return the path.
pub fn save(document: &mut Document, dir: &Path, name: &str) -> PathBuf {
    let path = dir.join(name);
    document.save(&path).expect("save fixture");
    path
}

/// Write a numbered fixture with `pages` pages.
pub fn write_numbered(dir: &Path, name: &str, pages: u32) -> PathBuf {
    save(&mut numbered_document(pages), dir, name)
}

/// Write a fixture with the given page texts.
pub fn write_pages(dir: &Path, name: &str, texts: &[&str]) -> PathBuf {
    save(&mut document_with_pages(texts), dir, name)
}

/// Extracted text of every page of the PDF at `path`.
pub fn page_texts(path: &Path) -> Vec<String> {
    let document = Document::load(path).expect("load output");
    let count = document.get_pages().len() as u32;
    (1..=count)
        .map(|page| document.extract_text(&[page]).expect("extract text"))
        .collect()
}

/// Page count of the PDF at `path`.
pub fn page_count(path: &Path) -> usize {
    Document::load(path).expect("load output").get_pages().len()
}

fn shared_font_resources(document: &mut Document) -> ObjectId {
    let font_id = document.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });
    document.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    })
}

fn text_content(document: &mut Document, text: &str) -> ObjectId {
    let content = Content {
        operations: vec![
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec!["F1".into(), 24.into()]),
            Operation::new("Td", vec![100.into(), 700.into()]),
            Operation::new("Tj", vec![Object::string_literal(text)]),
            Operation::new("ET", vec![]),
        ],
    };
    document.add_object(Stream::new(
        Dictionary::new(),
        content.encode().expect("encode fixture content"),
    ))
}

fn finish_tree(document: &mut Document, pages_id: ObjectId, kids: Vec<Object>, extra: Dictionary) {
    let count = kids.len() as i64;
    let mut pages = dictionary! {
        "Type" => "Pages",
        "Kids" => kids,
        "Count" => count,
    };
    for (key, value) in extra.iter() {
        pages.set(key.clone(), value.clone());
    }
    document.objects.insert(pages_id, Object::Dictionary(pages));

    let catalog_id = document.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    document.trailer.set("Root", catalog_id);
}
