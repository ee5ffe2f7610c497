// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// lopdf helpers shared by both backends: loading, page lookup, inherited page
// attributes, page boxes and text-string decoding.

use std::path::Path;

use lopdf::{Dictionary, Document, Object, ObjectId, Stream};
use pdfwerk_core::error::{PdfwerkError, Result};
use pdfwerk_core::types::Rect;
use tracing::{debug, instrument};

/// Page attributes a page may inherit from its ancestors in the page tree.
pub const INHERITABLE_KEYS: [&[u8]; 4] = [b"Resources", b"MediaBox", b"CropBox", b"Rotate"];

/// US Letter, used when a page declares no usable MediaBox.
const DEFAULT_MEDIA_BOX: Rect = Rect {
    x: 0.0,
    y: 0.0,
    width: 612.0,
    height: 792.0,
};

/// Open a PDF for the given processing step.
#[instrument(skip_all, fields(step, path = %path.display()))]
pub fn load(step: &str, path: &Path) -> Result<Document> {
    let document = Document::load(path)
        .map_err(|err| PdfwerkError::processing(step, format!("cannot open {}: {err}", path.display())))?;
    debug!(pages = document.get_pages().len(), "PDF loaded");
    Ok(document)
}

/// Stand-ins for `/Encrypt` and `/ObjStm` while an encrypted file is parsed.
/// Same length as the originals so xref offsets stay valid.
const MASKED_ENCRYPT: &[u8] = b"Encrypx";
const MASKED_OBJECT_STREAM: &[u8] = b"ObjStx";

/// Open an encrypted PDF and decrypt it with `password`.
///
/// `Document::load` leaves the object table empty unless the empty user
/// password opens the file, so the trailer's `/Encrypt` key is renamed before
/// parsing and restored before decrypting. Object streams are renamed too:
/// their content is still ciphertext at parse time.
#[instrument(skip_all, fields(step, path = %path.display()))]
pub fn load_encrypted(step: &str, path: &Path, password: &str) -> Result<Document> {
    let mut bytes = std::fs::read(path)?;
    if rename_name(&mut bytes, b"Encrypt", MASKED_ENCRYPT) == 0 {
        return Err(PdfwerkError::processing(step, "document is not encrypted"));
    }
    rename_name(&mut bytes, b"ObjStm", MASKED_OBJECT_STREAM);

    let mut document = Document::load_mem(&bytes)
        .map_err(|err| PdfwerkError::processing(step, format!("cannot open {}: {err}", path.display())))?;
    if let Some(encrypt) = document.trailer.remove(MASKED_ENCRYPT) {
        document.trailer.set("Encrypt", encrypt);
    }
    for object in document.objects.values_mut() {
        if let Object::Stream(stream) = object
            && stream.dict.has_type(MASKED_OBJECT_STREAM)
        {
            stream.dict.set("Type", Object::Name(b"ObjStm".to_vec()));
        }
    }

    document
        .decrypt(password)
        .map_err(|err| PdfwerkError::processing(step, format!("cannot decrypt: {err}")))?;
    debug!(pages = document.get_pages().len(), "encrypted PDF loaded");
    Ok(document)
}

/// Rename every `/from` name token in raw PDF bytes to `/to`. Both names must
/// have the same length. Returns how many tokens were renamed.
fn rename_name(bytes: &mut [u8], from: &[u8], to: &[u8]) -> usize {
    debug_assert_eq!(from.len(), to.len());
    let token_len = from.len() + 1;
    let mut renamed = 0;
    let mut index = 0;
    while index + token_len <= bytes.len() {
        let token = &bytes[index..index + token_len];
        let ends_token = bytes.get(index + token_len).is_none_or(|&next| !is_regular(next));
        if token[0] == b'/' && &token[1..] == from && ends_token {
            bytes[index + 1..index + token_len].copy_from_slice(to);
            renamed += 1;
            index += token_len;
        } else {
            index += 1;
        }
    }
    renamed
}

/// PDF regular character: neither whitespace nor a delimiter.
fn is_regular(byte: u8) -> bool {
    !(byte.is_ascii_whitespace() || byte == 0 || b"()<>[]{}/%".contains(&byte))
}

/// Number of pages the page tree root declares.
pub fn declared_page_count(document: &Document) -> Option<u32> {
    let root = document.catalog().ok()?.get(b"Pages").ok()?.as_reference().ok()?;
    let count = document.get_dictionary(root).ok()?.get(b"Count").ok()?.as_i64().ok()?;
    u32::try_from(count).ok()
}

/// Serialise a document to memory.
pub fn to_bytes(step: &str, document: &mut Document) -> Result<Vec<u8>> {
    let mut output = Vec::new();
    document
        .save_to(&mut output)
        .map_err(|err| PdfwerkError::processing(step, format!("cannot serialise PDF: {err}")))?;
    Ok(output)
}

/// Page object ids in page order.
pub fn page_ids(document: &Document) -> Vec<ObjectId> {
    document.get_pages().into_values().collect()
}

/// Number of pages as the public API counts them.
pub fn page_count(document: &Document) -> u32 {
    document.get_pages().len() as u32
}

/// Numeric value of an Integer or Real object.
pub fn number(object: &Object) -> Option<f32> {
    match object {
        Object::Integer(value) => Some(*value as f32),
        Object::Real(value) => Some(*value as f32),
        _ => None,
    }
}

/// Follow a reference, returning the object itself otherwise.
pub fn resolve<'a>(document: &'a Document, object: &'a Object) -> Option<&'a Object> {
    match object {
        Object::Reference(id) => document.get_object(*id).ok(),
        other => Some(other),
    }
}

/// Look up `key` on the page or, failing that, on its ancestors.
pub fn inherited_attribute(document: &Document, page_id: ObjectId, key: &[u8]) -> Option<Object> {
    let mut current = document.get_dictionary(page_id).ok()?;
    // Bounded walk: a malformed tree may contain a Parent cycle.
    for _ in 0..64 {
        if let Ok(value) = current.get(key) {
            return Some(value.clone());
        }
        current = match current.get(b"Parent") {
            Ok(Object::Reference(parent_id)) => document.get_dictionary(*parent_id).ok()?,
            _ => return None,
        };
    }
    None
}

/// Parse a `[llx lly urx ury]` array (possibly behind a reference).
pub fn rect_from_object(document: &Document, object: &Object) -> Option<Rect> {
    let array = match resolve(document, object)? {
        Object::Array(array) => array,
        _ => return None,
    };
    if array.len() != 4 {
        return None;
    }
    let values: Vec<f32> = array
        .iter()
        .filter_map(|item| resolve(document, item).and_then(number))
        .collect();
    if values.len() != 4 {
        return None;
    }
    let (x0, x1) = (values[0].min(values[2]), values[0].max(values[2]));
    let (y0, y1) = (values[1].min(values[3]), values[1].max(values[3]));
    Some(Rect::new(x0, y0, x1 - x0, y1 - y0))
}

/// Encode a rectangle as a PDF box array.
pub fn rect_to_object(rect: &Rect) -> Object {
    Object::Array(vec![
        Object::from(rect.x),
        Object::from(rect.y),
        Object::from(rect.right()),
        Object::from(rect.top()),
    ])
}

/// The page's MediaBox, inherited if necessary.
pub fn media_box(document: &Document, page_id: ObjectId) -> Rect {
    inherited_attribute(document, page_id, b"MediaBox")
        .and_then(|object| rect_from_object(document, &object))
        .filter(|rect| rect.width > 0.0 && rect.height > 0.0)
        .unwrap_or(DEFAULT_MEDIA_BOX)
}

/// The visible page area: CropBox clipped to the MediaBox, or the MediaBox.
pub fn visible_box(document: &Document, page_id: ObjectId) -> Rect {
    let media = media_box(document, page_id);
    inherited_attribute(document, page_id, b"CropBox")
        .and_then(|object| rect_from_object(document, &object))
        .and_then(|crop| crop.intersect(&media))
        .unwrap_or(media)
}

/// Effective /Rotate of a page, normalised to 0, 90, 180 or 270.
pub fn page_rotation(document: &Document, page_id: ObjectId) -> i64 {
    inherited_attribute(document, page_id, b"Rotate")
        .and_then(|object| match object {
            Object::Integer(value) => Some(value),
            Object::Real(value) => Some(value as i64),
            _ => None,
        })
        .map(|value| (value.rem_euclid(360) / 90) * 90)
        .unwrap_or(0)
}

/// Copy inherited attributes onto the page itself so it no longer depends on
/// its ancestors.
pub fn materialise_inherited(document: &mut Document, page_id: ObjectId) -> Result<()> {
    let inherited: Vec<(&[u8], Object)> = INHERITABLE_KEYS
        .iter()
        .filter_map(|key| inherited_attribute(document, page_id, key).map(|value| (*key, value)))
        .collect();
    let page = document
        .get_dictionary_mut(page_id)
        .map_err(|err| PdfwerkError::processing("page tree", err))?;
    for (key, value) in inherited {
        if !page.has(key) {
            page.set(key.to_vec(), value);
        }
    }
    Ok(())
}

/// Make sure the page owns a direct Resources dictionary and return it.
///
/// Referenced or inherited resources are copied onto the page so that adding
/// entries never leaks into other pages sharing the same dictionary.
pub fn page_resources_mut(document: &mut Document, page_id: ObjectId) -> Result<&mut Dictionary> {
    let resources = inherited_attribute(document, page_id, b"Resources")
        .and_then(|object| resolve(document, &object).cloned())
        .and_then(|object| match object {
            Object::Dictionary(dict) => Some(dict),
            _ => None,
        })
        .unwrap_or_default();
    let resources = inline_subdictionaries(document, resources, &[b"Font", b"ExtGState", b"XObject"]);

    let page = document
        .get_dictionary_mut(page_id)
        .map_err(|err| PdfwerkError::processing("page resources", err))?;
    page.set("Resources", Object::Dictionary(resources));
    match page.get_mut(b"Resources") {
        Ok(Object::Dictionary(dict)) => Ok(dict),
        _ => Err(PdfwerkError::processing("page resources", "resources are not a dictionary")),
    }
}

/// Replace referenced sub-dictionaries (e.g. `/Font 12 0 R`) with copies.
fn inline_subdictionaries(document: &Document, mut resources: Dictionary, keys: &[&[u8]]) -> Dictionary {
    for key in keys {
        let resolved = resources
            .get(key)
            .ok()
            .and_then(|object| resolve(document, object))
            .and_then(|object| object.as_dict().ok())
            .cloned();
        if let Some(dict) = resolved {
            resources.set(key.to_vec(), Object::Dictionary(dict));
        }
    }
    resources
}

/// Pick a resource name with the given prefix that is not yet used in
/// `category` (e.g. `Font`) of the resources dictionary.
pub fn unused_resource_name(resources: &Dictionary, category: &[u8], prefix: &str) -> String {
    let taken = |name: &str| {
        resources
            .get(category)
            .ok()
            .and_then(|object| object.as_dict().ok())
            .is_some_and(|dict| dict.has(name.as_bytes()))
    };
    let mut index = 0u32;
    loop {
        let candidate = format!("{prefix}{index}");
        if !taken(&candidate) {
            return candidate;
        }
        index += 1;
    }
}

/// Register `value` under `category/name` in a resources dictionary.
pub fn insert_resource(resources: &mut Dictionary, category: &[u8], name: &str, value: Object) {
    if !matches!(resources.get(category), Ok(Object::Dictionary(_))) {
        resources.set(category.to_vec(), Object::Dictionary(Dictionary::new()));
    }
    if let Ok(Object::Dictionary(dict)) = resources.get_mut(category) {
        dict.set(name.as_bytes().to_vec(), value);
    }
}

/// Append a content stream to the page. With `isolate` the existing content is
/// wrapped in `q`/`Q` first so its graphics state cannot leak into the new
/// stream.
pub fn append_page_content(
    document: &mut Document,
    page_id: ObjectId,
    content: Vec<u8>,
    isolate: bool,
) -> Result<()> {
    let existing: Vec<Object> = match document
        .get_dictionary(page_id)
        .map_err(|err| PdfwerkError::processing("page contents", err))?
        .get(b"Contents")
    {
        Ok(Object::Array(items)) => items.clone(),
        Ok(Object::Reference(id)) => vec![Object::Reference(*id)],
        _ => Vec::new(),
    };

    let mut contents = Vec::with_capacity(existing.len() + 3);
    if isolate && !existing.is_empty() {
        let open = document.add_object(Stream::new(Dictionary::new(), b"q\n".to_vec()));
        contents.push(Object::Reference(open));
        contents.extend(existing);
        let close = document.add_object(Stream::new(Dictionary::new(), b"\nQ\n".to_vec()));
        contents.push(Object::Reference(close));
    } else {
        contents.extend(existing);
    }
    let added = document.add_object(Stream::new(Dictionary::new(), content));
    contents.push(Object::Reference(added));

    let page = document
        .get_dictionary_mut(page_id)
        .map_err(|err| PdfwerkError::processing("page contents", err))?;
    page.set("Contents", Object::Array(contents));
    Ok(())
}

/// Concatenated, decoded content of every stream drawn by the page.
pub fn page_content(document: &Document, page_id: ObjectId) -> Vec<u8> {
    let mut content = Vec::new();
    for stream_id in document.get_page_contents(page_id) {
        if let Ok(Object::Stream(stream)) = document.get_object(stream_id) {
            match stream.decompressed_content() {
                Ok(decoded) => content.extend(decoded),
                Err(_) => content.extend(&stream.content),
            }
            content.push(b'\n');
        }
    }
    content
}

/// Decode a PDF text string: UTF-16BE with BOM, UTF-8 with BOM, or
/// PDFDocEncoding (treated as Latin-1).
pub fn decode_text_string(bytes: &[u8]) -> String {
    if let Some(body) = bytes.strip_prefix(&[0xFE, 0xFF]) {
        let units: Vec<u16> = body
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect();
        return String::from_utf16_lossy(&units);
    }
    if let Some(body) = bytes.strip_prefix(&[0xEF, 0xBB, 0xBF]) {
        return String::from_utf8_lossy(body).into_owned();
    }
    bytes.iter().map(|&byte| byte as char).collect()
}

/// Encode text for a content-stream string shown with a WinAnsi font.
/// Characters outside Latin-1 are replaced with `?`.
pub fn encode_win_ansi(text: &str) -> Vec<u8> {
    text.chars()
        .map(|ch| if (ch as u32) < 256 { ch as u8 } else { b'?' })
        .collect()
}

/// Text drawn on one page (1-based), as lopdf extracts it.
pub fn page_text(document: &Document, page_number: u32) -> Result<String> {
    document
        .extract_text(&[page_number])
        .map_err(|err| PdfwerkError::processing("text extraction", format!("page {page_number}: {err}")))
}
