// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Page copying between lopdf documents — the structural primitive behind
// merge, split, extract and the naive repair path.

use std::collections::BTreeMap;

use lopdf::{Dictionary, Document, Object, ObjectId, Stream, dictionary};
use pdfwerk_core::error::{PdfwerkError, Result};
use tracing::{debug, warn};

use super::document::{INHERITABLE_KEYS, inherited_attribute};

/// Create an empty document with a catalog and an empty page tree.
pub fn empty_document(version: &str) -> Document {
    let mut document = Document::with_version(version);
    let pages_id = document.new_object_id();
    document.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => Vec::<Object>::new(),
            "Count" => 0,
        }),
    );
    let catalog_id = document.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    document.trailer.set("Root", catalog_id);
    document
}

/// Copies pages from one source document into a target document.
///
/// Objects are cloned at most once per copier, so resources shared between
/// pages of the same source stay shared in the target. `/Parent` links are
/// never followed; inherited page attributes are copied onto each page
/// instead.
pub struct PageCopier<'a> {
    source: &'a Document,
    /// Source object id → target object id.
    mapped: BTreeMap<ObjectId, ObjectId>,
}

impl<'a> PageCopier<'a> {
    pub fn new(source: &'a Document) -> Self {
        Self {
            source,
            mapped: BTreeMap::new(),
        }
    }

    /// Append source page `page_number` (1-based) to `target`.
    pub fn append_page(&mut self, target: &mut Document, page_number: u32) -> Result<ObjectId> {
        let page_id = *self.source.get_pages().get(&page_number).ok_or_else(|| {
            PdfwerkError::processing("page copy", format!("page {page_number} not found in page tree"))
        })?;
        self.append_page_id(target, page_id)
    }

    /// Append the page with object id `page_id` to `target`.
    pub fn append_page_id(&mut self, target: &mut Document, page_id: ObjectId) -> Result<ObjectId> {
        let page = self
            .source
            .get_dictionary(page_id)
            .map_err(|err| PdfwerkError::processing("page copy", format!("cannot read page {page_id:?}: {err}")))?
            .clone();

        // Reserve the target id first so back-references (annotation /P)
        // resolve to the copy instead of recursing.
        let cloned_id = target.new_object_id();
        self.mapped.insert(page_id, cloned_id);

        let mut cloned = match self.clone_object(target, &Object::Dictionary(page))? {
            Object::Dictionary(dict) => dict,
            _ => Dictionary::new(),
        };
        for key in INHERITABLE_KEYS {
            if !cloned.has(key)
                && let Some(value) = inherited_attribute(self.source, page_id, key)
            {
                let value = self.clone_object(target, &value)?;
                cloned.set(key.to_vec(), value);
            }
        }

        let pages_id = page_tree_root(target)?;
        cloned.set("Parent", Object::Reference(pages_id));
        target.objects.insert(cloned_id, Object::Dictionary(cloned));

        let pages = target
            .get_dictionary_mut(pages_id)
            .map_err(|err| PdfwerkError::processing("page copy", err))?;
        if let Ok(Object::Array(kids)) = pages.get_mut(b"Kids") {
            kids.push(Object::Reference(cloned_id));
        } else {
            pages.set("Kids", vec![Object::Reference(cloned_id)]);
        }
        let count = match pages.get(b"Count") {
            Ok(Object::Integer(count)) => *count,
            _ => 0,
        };
        pages.set("Count", count + 1);

        debug!(?page_id, ?cloned_id, "page copied");
        Ok(cloned_id)
    }

    /// Deep-clone an arbitrary object of the source (e.g. a Resources
    /// dictionary) into `target`.
    pub fn import_object(&mut self, target: &mut Document, object: &Object) -> Result<Object> {
        self.clone_object(target, object)
    }

    /// Deep-clone `object`, copying every referenced object into `target`.
    fn clone_object(&mut self, target: &mut Document, object: &Object) -> Result<Object> {
        match object {
            Object::Dictionary(dict) => Ok(Object::Dictionary(self.clone_dictionary(target, dict)?)),
            Object::Array(items) => {
                let mut cloned = Vec::with_capacity(items.len());
                for item in items {
                    cloned.push(self.clone_object(target, item)?);
                }
                Ok(Object::Array(cloned))
            }
            Object::Stream(stream) => {
                let dict = self.clone_dictionary(target, &stream.dict)?;
                let mut cloned = Stream::new(dict, stream.content.clone());
                cloned.allows_compression = stream.allows_compression;
                Ok(Object::Stream(cloned))
            }
            Object::Reference(id) => Ok(Object::Reference(self.clone_reference(target, *id)?)),
            other => Ok(other.clone()),
        }
    }

    fn clone_dictionary(&mut self, target: &mut Document, dict: &Dictionary) -> Result<Dictionary> {
        let mut cloned = Dictionary::new();
        for (key, value) in dict.iter() {
            if key == b"Parent" {
                continue;
            }
            cloned.set(key.clone(), self.clone_object(target, value)?);
        }
        Ok(cloned)
    }

    fn clone_reference(&mut self, target: &mut Document, id: ObjectId) -> Result<ObjectId> {
        if let Some(mapped) = self.mapped.get(&id) {
            return Ok(*mapped);
        }
        let referenced = match self.source.get_object(id) {
            Ok(object) => object.clone(),
            Err(err) => {
                warn!(?id, %err, "cannot resolve reference, using null");
                Object::Null
            }
        };
        // Pages reached through a reference (e.g. link destinations) are not
        // copied wholesale; the link simply loses its target.
        if referenced.type_name().ok() == Some(b"Page".as_slice()) {
            return Ok(target.add_object(Object::Null));
        }
        let new_id = target.new_object_id();
        self.mapped.insert(id, new_id);
        let cloned = self.clone_object(target, &referenced)?;
        target.objects.insert(new_id, cloned);
        Ok(new_id)
    }
}

/// Object id of the target's root /Pages node.
fn page_tree_root(document: &Document) -> Result<ObjectId> {
    let catalog = document
        .catalog()
        .map_err(|err| PdfwerkError::processing("page copy", format!("no catalog: {err}")))?;
    match catalog.get(b"Pages") {
        Ok(Object::Reference(id)) => Ok(*id),
        _ => Err(PdfwerkError::processing("page copy", "/Pages is not a reference")),
    }
}

/// Build a new document from `pages` (1-based) of `source`, in the given order.
pub fn copy_pages(source: &Document, pages: &[u32], version: &str) -> Result<Document> {
    let mut target = empty_document(version);
    let mut copier = PageCopier::new(source);
    for &page in pages {
        copier.append_page(&mut target, page)?;
    }
    carry_document_info(source, &mut target);
    Ok(target)
}

/// Copy the /Info dictionary of `source` into `target`.
pub fn carry_document_info(source: &Document, target: &mut Document) {
    let info = source
        .trailer
        .get(b"Info")
        .ok()
        .and_then(|object| super::document::resolve(source, object))
        .and_then(|object| object.as_dict().ok())
        .cloned();
    if let Some(info) = info {
        let info_id = target.add_object(info);
        target.trailer.set("Info", info_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pdf::document::{media_box, page_ids};
    use crate::testing;
    use pdfwerk_core::types::Rect;

    #[test]
    fn copies_pages_in_requested_order() {
        let source = testing::numbered_document(4);
        let mut copy = copy_pages(&source, &[3, 1], "1.7").unwrap();
        let bytes = crate::pdf::document::to_bytes("test", &mut copy).unwrap();
        let reloaded = Document::load_mem(&bytes).unwrap();
        assert_eq!(reloaded.get_pages().len(), 2);
        assert!(reloaded.extract_text(&[1]).unwrap().contains("Page 3 content"));
        assert!(reloaded.extract_text(&[2]).unwrap().contains("Page 1 content"));
    }

    #[test]
    fn shared_resources_are_copied_once() {
        let source = testing::numbered_document(3);
        let copy = copy_pages(&source, &[1, 2, 3], "1.7").unwrap();
        let fonts = copy
            .objects
            .values()
            .filter(|object| object.type_name().ok() == Some(b"Font".as_slice()))
            .count();
        assert_eq!(fonts, 1);
    }

    #[test]
    fn inherited_media_box_survives_the_copy() {
        let source = testing::document_with_inherited_box(2, (300, 400));
        let copy = copy_pages(&source, &[2], "1.7").unwrap();
        let page = page_ids(&copy)[0];
        assert_eq!(media_box(&copy, page), Rect::from_size(300.0, 400.0));
        assert!(copy.get_dictionary(page).unwrap().has(b"Resources"));
    }

    #[test]
    fn missing_page_is_reported() {
        let source = testing::numbered_document(1);
        let err = copy_pages(&source, &[2], "1.7").unwrap_err();
        assert!(err.to_string().contains("page 2 not found"));
    }

    #[test]
    fn annotation_back_reference_does_not_recurse() {
        let mut source = testing::numbered_document(1);
        let page_id = page_ids(&source)[0];
        let annotation = source.add_object(dictionary! {
            "Type" => "Annot",
            "Subtype" => "Text",
            "P" => page_id,
        });
        source
            .get_dictionary_mut(page_id)
            .unwrap()
            .set("Annots", vec![Object::Reference(annotation)]);

        let copy = copy_pages(&source, &[1], "1.7").unwrap();
        let new_page = page_ids(&copy)[0];
        let annots = copy.get_dictionary(new_page).unwrap().get(b"Annots").unwrap();
        let Object::Array(items) = annots else {
            panic!("annots should stay an array");
        };
        let Object::Reference(annot_id) = items[0] else {
            panic!("annotation should be a reference");
        };
        let back = copy.get_dictionary(annot_id).unwrap().get(b"P").unwrap();
        assert!(matches!(back, Object::Reference(id) if *id == new_page));
    }
}
