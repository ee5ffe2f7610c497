// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// In-process compressor used when Ghostscript is unavailable: re-encodes
// embedded 8-bit images at the ladder's resolution, deflates every other
// stream and drops unreachable objects.

use std::path::Path;

use lopdf::{Document, Object, Stream};
use pdfwerk_core::error::{PdfwerkError, Result};
use tracing::{debug, info, instrument};

use super::Attempt;
use crate::image::ImageProcessor;
use crate::pdf::document::{load, media_box, number, page_ids, to_bytes};

/// Compress the file at `input` and return the new bytes.
#[instrument(skip_all, fields(path = %input.display(), preset = attempt.preset.setting(), dpi = attempt.dpi))]
pub fn compress_file(input: &Path, attempt: Attempt) -> Result<Vec<u8>> {
    let mut document = load("compress", input)?;
    compress_document(&mut document, attempt)?;
    to_bytes("compress", &mut document)
}

/// Compress `document` in place. Returns how many images were re-encoded.
pub fn compress_document(document: &mut Document, attempt: Attempt) -> Result<usize> {
    let max_pixels = pixel_budget(document, attempt.dpi);
    let quality = attempt.preset.jpeg_quality();

    let mut rewritten = 0usize;
    for (id, object) in document.objects.iter_mut() {
        let Object::Stream(stream) = object else {
            continue;
        };
        match recompress_image(stream, max_pixels, quality) {
            Ok(true) => rewritten += 1,
            Ok(false) => {}
            Err(err) => debug!(?id, %err, "image left as is"),
        }
    }

    let pruned = document.prune_objects();
    document.compress();
    info!(images = rewritten, pruned = pruned.len(), "structural compression pass");
    Ok(rewritten)
}

/// Largest useful image side in pixels: the biggest page dimension printed at
/// `dpi`.
fn pixel_budget(document: &Document, dpi: u32) -> u32 {
    let longest_side_pt = page_ids(document)
        .into_iter()
        .map(|page_id| {
            let page = media_box(document, page_id);
            page.width.max(page.height)
        })
        .fold(0.0f32, f32::max);
    ((longest_side_pt / 72.0) * dpi as f32).ceil().max(1.0) as u32
}

/// Re-encode one image XObject as JPEG when that makes it smaller.
/// Streams that are not plain 8-bit gray or RGB images are skipped.
fn recompress_image(stream: &mut Stream, max_pixels: u32, quality: u8) -> Result<bool> {
    let dict = &stream.dict;
    let is_image = matches!(dict.get(b"Subtype"), Ok(Object::Name(name)) if name == b"Image");
    if !is_image || dict.has(b"ImageMask") || dict.has(b"Decode") || dict.has(b"SMaskInData") {
        return Ok(false);
    }
    let bits = dict.get(b"BitsPerComponent").ok().and_then(number);
    let components = match dict.get(b"ColorSpace") {
        Ok(Object::Name(name)) if name == b"DeviceRGB" => 3u8,
        Ok(Object::Name(name)) if name == b"DeviceGray" => 1u8,
        _ => return Ok(false),
    };
    let (Some(width), Some(height)) = (
        dict.get(b"Width").ok().and_then(number),
        dict.get(b"Height").ok().and_then(number),
    ) else {
        return Ok(false);
    };
    if bits != Some(8.0) || width < 1.0 || height < 1.0 {
        return Ok(false);
    }

    let filter = match dict.get(b"Filter") {
        Ok(Object::Name(name)) => Some(name.clone()),
        Ok(Object::Array(filters)) if filters.len() == 1 => match &filters[0] {
            Object::Name(name) => Some(name.clone()),
            _ => return Ok(false),
        },
        Err(_) => None,
        _ => return Ok(false),
    };

    let processor = match filter.as_deref() {
        Some(b"DCTDecode") => ImageProcessor::from_jpeg(&stream.content)?,
        Some(b"FlateDecode") => {
            let samples = stream
                .decompressed_content()
                .map_err(|err| PdfwerkError::Image(format!("cannot inflate image: {err}")))?;
            ImageProcessor::from_samples(width as u32, height as u32, components, samples)?
        }
        None => ImageProcessor::from_samples(width as u32, height as u32, components, stream.content.clone())?,
        Some(_) => return Ok(false),
    };

    let processor = processor.downscale(max_pixels, max_pixels);
    let encoded = processor.to_jpeg_bytes(quality)?;
    if encoded.len() >= stream.content.len() {
        return Ok(false);
    }

    let color_space = if processor.is_gray() { "DeviceGray" } else { "DeviceRGB" };
    stream.dict.set("Width", processor.width() as i64);
    stream.dict.set("Height", processor.height() as i64);
    stream.dict.set("ColorSpace", Object::Name(color_space.as_bytes().to_vec()));
    stream.dict.set("BitsPerComponent", 8);
    stream.dict.set("Filter", Object::Name(b"DCTDecode".to_vec()));
    stream.dict.remove(b"DecodeParms");
    stream.set_content(encoded);
    stream.allows_compression = false;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compress::Preset;
    use crate::testing;

    fn attempt(preset: Preset, dpi: u32) -> Attempt {
        Attempt { preset, dpi }
    }

    fn image_stream(document: &Document) -> &Stream {
        document
            .objects
            .values()
            .find_map(|object| match object {
                Object::Stream(stream) if stream.dict.has(b"Width") => Some(stream),
                _ => None,
            })
            .unwrap()
    }

    #[test]
    fn pixel_budget_follows_page_size() {
        let document = testing::numbered_document(1);
        // 792pt = 11in on the long side.
        assert_eq!(pixel_budget(&document, 100), 1100);
    }

    #[test]
    fn large_photo_is_downsampled() {
        let mut document = testing::document_with_photo(1200);
        let before = image_stream(&document).content.len();
        let rewritten = compress_document(&mut document, attempt(Preset::Screen, 50)).unwrap();
        assert_eq!(rewritten, 1);

        let image = image_stream(&document);
        assert_eq!(number(image.dict.get(b"Width").unwrap()), Some(550.0));
        assert!(image.content.len() < before);
    }

    #[test]
    fn text_only_documents_survive() {
        let mut document = testing::numbered_document(2);
        assert_eq!(compress_document(&mut document, attempt(Preset::Ebook, 150)).unwrap(), 0);
        let bytes = to_bytes("test", &mut document).unwrap();
        let reloaded = Document::load_mem(&bytes).unwrap();
        assert!(reloaded.extract_text(&[2]).unwrap().contains("Page 2 content"));
    }

    #[test]
    fn stronger_settings_never_grow_the_image() {
        let mut gentle = testing::document_with_photo(800);
        let mut strong = testing::document_with_photo(800);
        compress_document(&mut gentle, attempt(Preset::Printer, 300)).unwrap();
        compress_document(&mut strong, attempt(Preset::Screen, 50)).unwrap();
        assert!(image_stream(&strong).content.len() <= image_stream(&gentle).content.len());
    }
}
