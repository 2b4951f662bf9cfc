use std::fs;
use std::io::Cursor;
use std::path::Path;

use anyhow::{Context, Result};
use image::codecs::jpeg::JpegEncoder;
use image::{ColorType, GenericImageView};

/// Longest side of an uploaded photo, in pixels.
pub const MAX_DIMENSION: u32 = 1024;
pub const JPEG_QUALITY: u8 = 80;

/// Read a picked photo from disk and turn it into upload-ready JPEG bytes.
pub fn prepare_upload(path: &Path) -> Result<Vec<u8>> {
    let raw = fs::read(path).with_context(|| format!("failed to read photo {}", path.display()))?;
    prepare_bytes(&raw).with_context(|| format!("failed to prepare photo {}", path.display()))
}

/// Decode any supported image, shrink it to `MAX_DIMENSION` and re-encode as JPEG.
pub fn prepare_bytes(raw: &[u8]) -> Result<Vec<u8>> {
    let mut img = image::load_from_memory(raw).context("unsupported or corrupt image")?;
    let (width, height) = img.dimensions();
    if width > MAX_DIMENSION || height > MAX_DIMENSION {
        img = img.thumbnail(MAX_DIMENSION, MAX_DIMENSION);
    }

    let rgb = img.to_rgb8();
    let mut out = Cursor::new(Vec::new());
    JpegEncoder::new_with_quality(&mut out, JPEG_QUALITY)
        .encode(rgb.as_raw(), rgb.width(), rgb.height(), ColorType::Rgb8)
        .context("failed to encode JPEG")?;
    Ok(out.into_inner())
}
