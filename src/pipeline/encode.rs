//! Image encoding: `DynamicImage` → base64 payload wrapped in `ImageData`.
//!
//! VLM APIs (Gemini, OpenAI, Anthropic) accept images as base64 data embedded
//! in the JSON request body. Scans stay PNG so small print remains crisp;
//! photos stay JPEG because a re-encoded 12-megapixel PNG is many times larger
//! for no gain in legibility.

use crate::pipeline::input::{ImageKind, LoadedImage};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use edgequake_llm::ImageData;
use image::imageops::FilterType;
use image::DynamicImage;
use std::io::Cursor;
use tracing::debug;

/// Shrink `img` so neither side exceeds `max_pixels`, preserving aspect ratio.
pub fn fit_within(img: &DynamicImage, max_pixels: u32) -> Option<DynamicImage> {
    if img.width() <= max_pixels && img.height() <= max_pixels {
        return None;
    }
    Some(img.resize(max_pixels, max_pixels, FilterType::Triangle))
}

/// Encode a loaded image as a base64 payload ready for the model adapter.
pub fn encode_image(
    loaded: &LoadedImage,
    max_pixels: u32,
) -> Result<ImageData, image::ImageError> {
    let resized = fit_within(&loaded.image, max_pixels);
    let img = resized.as_ref().unwrap_or(&loaded.image);

    let mut buf = Vec::new();
    match loaded.kind {
        ImageKind::Png => img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)?,
        // The JPEG encoder has no alpha support.
        ImageKind::Jpeg => DynamicImage::ImageRgb8(img.to_rgb8())
            .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Jpeg)?,
    }

    let b64 = STANDARD.encode(&buf);
    debug!(
        "Encoded {} ({}x{}) → {} bytes base64",
        loaded.name,
        img.width(),
        img.height(),
        b64.len()
    );

    Ok(ImageData::new(b64, loaded.kind.mime_type()).with_detail("high"))
}
