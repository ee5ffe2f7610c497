// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Image processor — decode an embedded image, downscale it and re-encode it
// as JPEG. Operates on in-memory images using the `image` crate.

use image::{DynamicImage, GrayImage, ImageFormat, RgbImage};
use pdfwerk_core::error::PdfwerkError;
use tracing::{debug, instrument};

/// Image pipeline operating on a single in-memory image.
///
/// Each transformation consumes `self` and returns a new processor, enabling
/// method chaining.
///
/// ```ignore
/// let jpeg = ImageProcessor::from_jpeg(&stream.content)?
///     .downscale(1200, 1600)
///     .to_jpeg_bytes(70)?;
/// ```
pub struct ImageProcessor {
    image: DynamicImage,
}

impl ImageProcessor {
    // -- Construction ---------------------------------------------------------

    /// Decode the payload of a `/DCTDecode` image stream.
    #[instrument(skip(data), fields(data_len = data.len()))]
    pub fn from_jpeg(data: &[u8]) -> Result<Self, PdfwerkError> {
        let img = image::load_from_memory_with_format(data, ImageFormat::Jpeg)
            .map_err(|err| PdfwerkError::Image(format!("failed to decode JPEG: {err}")))?;
        debug!(width = img.width(), height = img.height(), "JPEG decoded");
        Ok(Self { image: img })
    }

    /// Wrap raw 8-bit samples: one component per pixel is gray, three is RGB.
    pub fn from_samples(
        width: u32,
        height: u32,
        components: u8,
        samples: Vec<u8>,
    ) -> Result<Self, PdfwerkError> {
        let image = match components {
            1 => GrayImage::from_raw(width, height, samples).map(DynamicImage::ImageLuma8),
            3 => RgbImage::from_raw(width, height, samples).map(DynamicImage::ImageRgb8),
            other => {
                return Err(PdfwerkError::Image(format!(
                    "unsupported component count {other}"
                )));
            }
        };
        image.map(|image| Self { image }).ok_or_else(|| {
            PdfwerkError::Image(format!(
                "sample buffer does not match {width}x{height}x{components}"
            ))
        })
    }

    // -- Accessors ------------------------------------------------------------

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Whether the image has a single luma channel.
    pub fn is_gray(&self) -> bool {
        matches!(self.image, DynamicImage::ImageLuma8(_))
    }

    // -- Transformations ------------------------------------------------------

    /// Shrink the image to fit within `max_width` x `max_height`, preserving
    /// aspect ratio. Uses Lanczos3 filtering. Images already small enough are
    /// returned unchanged.
    #[instrument(skip(self), fields(max_width, max_height))]
    pub fn downscale(self, max_width: u32, max_height: u32) -> Self {
        if self.image.width() <= max_width && self.image.height() <= max_height {
            return self;
        }
        let resized = self.image.resize(
            max_width.max(1),
            max_height.max(1),
            image::imageops::FilterType::Lanczos3,
        );
        debug!(
            from_w = self.image.width(),
            from_h = self.image.height(),
            new_w = resized.width(),
            new_h = resized.height(),
            "Image downscaled"
        );
        Self { image: resized }
    }

    // -- Output ---------------------------------------------------------------

    /// Encode as baseline JPEG with the given quality (1-100). Gray images
    /// stay single-channel.
    pub fn to_jpeg_bytes(&self, quality: u8) -> Result<Vec<u8>, PdfwerkError> {
        let mut buffer = Vec::new();
        let encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(&mut buffer, quality.clamp(1, 100));
        let encoded = if self.is_gray() {
            self.image.to_luma8().write_with_encoder(encoder)
        } else {
            self.image.to_rgb8().write_with_encoder(encoder)
        };
        encoded.map_err(|err| PdfwerkError::Image(format!("JPEG encoding failed: {err}")))?;
        Ok(buffer)
    }
}
