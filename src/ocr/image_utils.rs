// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Image loading and format detection for the OCR pipeline

use image::{DynamicImage, ImageFormat};
use thiserror::Error;

/// Errors from interpreting uploaded image bytes
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("Image data is empty")]
    EmptyData,

    #[error("Unsupported image format")]
    UnsupportedFormat,

    #[error("Failed to decode image: {0}")]
    Malformed(String),
}

/// Image information extracted during loading
#[derive(Debug, Clone)]
pub struct ImageInfo {
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// Detected format
    pub format: ImageFormat,
    /// Size in bytes
    pub size_bytes: usize,
}

/// Decode raw image bytes from an upload
///
/// The format is detected from magic bytes rather than trusted from the
/// client filename.
///
/// # Returns
/// * `Ok((DynamicImage, ImageInfo))` - The decoded image and metadata
/// * `Err(DecodeError)` - If the bytes cannot be interpreted
pub fn decode_image_bytes(bytes: &[u8]) -> Result<(DynamicImage, ImageInfo), DecodeError> {
    if bytes.is_empty() {
        return Err(DecodeError::EmptyData);
    }

    let format = detect_format(bytes)?;

    let img = image::load_from_memory_with_format(bytes, format)
        .map_err(|e| DecodeError::Malformed(e.to_string()))?;

    let info = ImageInfo {
        width: img.width(),
        height: img.height(),
        format,
        size_bytes: bytes.len(),
    };

    Ok((img, info))
}

/// Detect image format from magic bytes
pub fn detect_format(bytes: &[u8]) -> Result<ImageFormat, DecodeError> {
    if bytes.len() < 4 {
        return Err(DecodeError::UnsupportedFormat);
    }

    match bytes {
        // PNG: 89 50 4E 47 (0x89 P N G)
        [0x89, 0x50, 0x4E, 0x47, ..] => Ok(ImageFormat::Png),

        // JPEG: FF D8 FF
        [0xFF, 0xD8, 0xFF, ..] => Ok(ImageFormat::Jpeg),

        // GIF: GIF87a or GIF89a
        [0x47, 0x49, 0x46, 0x38, x, ..] if *x == 0x37 || *x == 0x39 => Ok(ImageFormat::Gif),

        // BMP: BM
        [0x42, 0x4D, ..] => Ok(ImageFormat::Bmp),

        // TIFF: II (little-endian) or MM (big-endian)
        [0x49, 0x49, 0x2A, 0x00, ..] | [0x4D, 0x4D, 0x00, 0x2A, ..] => Ok(ImageFormat::Tiff),

        _ => Err(DecodeError::UnsupportedFormat),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Luma};
    use std::io::Cursor;

    fn tiny_png_bytes() -> Vec<u8> {
        let img: ImageBuffer<Luma<u8>, Vec<u8>> = ImageBuffer::from_pixel(3, 3, Luma([200u8]));
        let mut buffer = Cursor::new(Vec::new());
        img.write_to(&mut buffer, ImageFormat::Png).unwrap();
        buffer.into_inner()
    }

    #[test]
    fn test_decode_image_bytes_png() {
        let bytes = tiny_png_bytes();
        let (img, info) = decode_image_bytes(&bytes).unwrap();

        assert_eq!(info.width, 3);
        assert_eq!(info.height, 3);
        assert_eq!(info.format, ImageFormat::Png);
        assert_eq!(info.size_bytes, bytes.len());
        assert_eq!(img.width(), 3);
    }

    #[test]
    fn test_decode_image_bytes_empty() {
        let result = decode_image_bytes(&[]);
        assert!(matches!(result.unwrap_err(), DecodeError::EmptyData));
    }

    #[test]
    fn test_decode_image_bytes_unsupported() {
        let result = decode_image_bytes(&[0x00, 0x01, 0x02, 0x03, 0x04, 0x05]);
        assert!(matches!(result.unwrap_err(), DecodeError::UnsupportedFormat));
    }

    #[test]
    fn test_decode_image_bytes_corrupted() {
        // PNG header but truncated data
        let result = decode_image_bytes(&[0x89, 0x50, 0x4E, 0x47, 0x00, 0x00, 0x00, 0x00]);
        assert!(matches!(result.unwrap_err(), DecodeError::Malformed(_)));
    }

    #[test]
    fn test_detect_format_png() {
        let png_header = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];
        assert_eq!(detect_format(&png_header).unwrap(), ImageFormat::Png);
    }

    #[test]
    fn test_detect_format_jpeg() {
        let jpeg_header = [0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, 0x4A, 0x46];
        assert_eq!(detect_format(&jpeg_header).unwrap(), ImageFormat::Jpeg);
    }

    #[test]
    fn test_detect_format_gif87a() {
        let gif_header = [0x47, 0x49, 0x46, 0x38, 0x37, 0x61];
        assert_eq!(detect_format(&gif_header).unwrap(), ImageFormat::Gif);
    }

    #[test]
    fn test_detect_format_gif89a() {
        let gif_header = [0x47, 0x49, 0x46, 0x38, 0x39, 0x61];
        assert_eq!(detect_format(&gif_header).unwrap(), ImageFormat::Gif);
    }

    #[test]
    fn test_detect_format_bmp() {
        let bmp_header = [0x42, 0x4D, 0x36, 0x00, 0x00, 0x00];
        assert_eq!(detect_format(&bmp_header).unwrap(), ImageFormat::Bmp);
    }

    #[test]
    fn test_detect_format_tiff_both_endians() {
        let le = [0x49, 0x49, 0x2A, 0x00];
        let be = [0x4D, 0x4D, 0x00, 0x2A];
        assert_eq!(detect_format(&le).unwrap(), ImageFormat::Tiff);
        assert_eq!(detect_format(&be).unwrap(), ImageFormat::Tiff);
    }

    #[test]
    fn test_detect_format_too_short() {
        assert!(detect_format(&[0x89, 0x50]).is_err());
    }

    #[test]
    fn test_detect_format_unknown() {
        let unknown = [0x00, 0x00, 0x00, 0x00];
        assert!(detect_format(&unknown).is_err());
    }
}
