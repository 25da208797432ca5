// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Deterministic image preprocessing ahead of text extraction
//!
//! The pipeline is fixed: decode, grayscale, Gaussian smoothing, then one of
//! two finishing policies (mean-relative contrast enhancement or Otsu
//! binarization). Identical input bytes always produce identical output
//! bytes.

use std::fs;
use std::io::{self, Cursor};
use std::path::Path;

use image::{DynamicImage, GrayImage, ImageFormat, Luma};
use thiserror::Error;
use tracing::debug;

use crate::ocr::image_utils::{decode_image_bytes, DecodeError};
use crate::storage::{Stage, StorageError, TransientFile};

/// Default smoothing radius, matches a 1px Gaussian blur
pub const DEFAULT_BLUR_SIGMA: f32 = 1.0;

/// Default contrast multiplier for the `Contrast` policy
pub const DEFAULT_CONTRAST_FACTOR: f32 = 2.0;

/// Errors from the preprocessing stage.
///
/// The upload handler treats any of these as a signal to fall back to the
/// raw image rather than failing the request.
#[derive(Debug, Error)]
pub enum PreprocessError {
    #[error("Failed to read image file: {0}")]
    Read(#[from] io::Error),

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error("Failed to encode preprocessed image: {0}")]
    Encode(String),

    #[error(transparent)]
    Store(#[from] StorageError),
}

/// Finishing step applied after grayscale conversion and smoothing
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FinishPolicy {
    /// Multiply contrast around the mean intensity, keep 8-bit grayscale.
    /// Matches the behavior this service shipped with.
    Contrast { factor: f32 },
    /// Global binarization with an automatically chosen threshold.
    /// More robust to uneven lighting; output pixels are strictly 0 or 255.
    Otsu,
}

/// Tunables for the preprocessing pipeline
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PreprocessConfig {
    pub blur_sigma: f32,
    pub policy: FinishPolicy,
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        Self {
            blur_sigma: DEFAULT_BLUR_SIGMA,
            policy: FinishPolicy::Contrast {
                factor: DEFAULT_CONTRAST_FACTOR,
            },
        }
    }
}

/// Run the fixed pipeline on a decoded image
///
/// Steps:
/// 1. Convert to single-channel grayscale
/// 2. Gaussian blur (skipped when sigma is not positive)
/// 3. Finishing policy: contrast enhancement or Otsu binarization
pub fn run_pipeline(image: &DynamicImage, config: &PreprocessConfig) -> GrayImage {
    let gray = image.to_luma8();

    let smoothed = if config.blur_sigma > 0.0 {
        image::imageops::blur(&gray, config.blur_sigma)
    } else {
        gray
    };

    match config.policy {
        FinishPolicy::Contrast { factor } => enhance_contrast(&smoothed, factor),
        FinishPolicy::Otsu => {
            let threshold = otsu_threshold(&smoothed);
            debug!(threshold, "Otsu threshold computed");
            binarize(&smoothed, threshold)
        }
    }
}

/// Preprocess an uploaded image file and persist the result as a new PNG
/// spool file, distinct from the input so both can be released independently.
pub fn preprocess_file(
    input: &TransientFile,
    config: &PreprocessConfig,
    spool_dir: &Path,
) -> Result<TransientFile, PreprocessError> {
    let bytes = fs::read(input.path())?;
    let (image, info) = decode_image_bytes(&bytes)?;

    debug!(
        width = info.width,
        height = info.height,
        format = ?info.format,
        "Decoded upload for preprocessing"
    );

    let processed = run_pipeline(&image, config);

    let mut encoded = Cursor::new(Vec::new());
    DynamicImage::ImageLuma8(processed)
        .write_to(&mut encoded, ImageFormat::Png)
        .map_err(|e| PreprocessError::Encode(e.to_string()))?;

    let output = TransientFile::create(
        spool_dir,
        &encoded.into_inner(),
        Stage::Preprocessed,
        "png",
    )?;
    Ok(output)
}

/// Scale pixel intensities away from the image mean by `factor`.
///
/// A factor of 1.0 is the identity; 2.0 doubles the distance of every pixel
/// from the mean, clamped to the 8-bit range. The mean itself is a fixed
/// point, so flat images pass through unchanged.
fn enhance_contrast(gray: &GrayImage, factor: f32) -> GrayImage {
    let total_pixels = gray.width() as u64 * gray.height() as u64;
    if total_pixels == 0 {
        return gray.clone();
    }

    let sum: u64 = gray.pixels().map(|p| p.0[0] as u64).sum();
    let mean = sum as f32 / total_pixels as f32;

    let mut output = GrayImage::new(gray.width(), gray.height());
    for (x, y, pixel) in gray.enumerate_pixels() {
        let adjusted = mean + (pixel.0[0] as f32 - mean) * factor;
        output.put_pixel(x, y, Luma([adjusted.round().clamp(0.0, 255.0) as u8]));
    }
    output
}

/// Compute the global binarization threshold via Otsu's method.
///
/// Chooses the threshold that maximizes between-class variance of the
/// foreground/background histogram partitions, which is equivalent to
/// minimizing intra-class variance.
pub fn otsu_threshold(gray: &GrayImage) -> u8 {
    let mut histogram = [0u64; 256];
    for pixel in gray.pixels() {
        histogram[pixel.0[0] as usize] += 1;
    }

    let total_pixels = gray.width() as u64 * gray.height() as u64;
    if total_pixels == 0 {
        return 128;
    }

    let mut sum_total: f64 = 0.0;
    for (i, &count) in histogram.iter().enumerate() {
        sum_total += i as f64 * count as f64;
    }

    let mut sum_background: f64 = 0.0;
    let mut weight_background: u64 = 0;
    let mut max_variance: f64 = 0.0;
    let mut best_threshold: u8 = 0;

    for (t, &count) in histogram.iter().enumerate() {
        weight_background += count;
        if weight_background == 0 {
            continue;
        }

        let weight_foreground = total_pixels - weight_background;
        if weight_foreground == 0 {
            break;
        }

        sum_background += t as f64 * count as f64;

        let mean_background = sum_background / weight_background as f64;
        let mean_foreground = (sum_total - sum_background) / weight_foreground as f64;

        let variance = weight_background as f64
            * weight_foreground as f64
            * (mean_background - mean_foreground).powi(2);

        if variance > max_variance {
            max_variance = variance;
            best_threshold = t as u8;
        }
    }

    best_threshold
}

fn binarize(gray: &GrayImage, threshold: u8) -> GrayImage {
    let mut output = GrayImage::new(gray.width(), gray.height());
    for (x, y, pixel) in gray.enumerate_pixels() {
        let binary = if pixel.0[0] <= threshold { 0u8 } else { 255u8 };
        output.put_pixel(x, y, Luma([binary]));
    }
    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::ImageBuffer;

    fn bimodal_image() -> GrayImage {
        // Left half dark (~40), right half bright (~210)
        ImageBuffer::from_fn(40, 20, |x, _| {
            if x < 20 {
                Luma([40u8])
            } else {
                Luma([210u8])
            }
        })
    }

    fn encode_png(gray: GrayImage) -> Vec<u8> {
        let mut buffer = Cursor::new(Vec::new());
        DynamicImage::ImageLuma8(gray)
            .write_to(&mut buffer, ImageFormat::Png)
            .unwrap();
        buffer.into_inner()
    }

    #[test]
    fn test_pipeline_is_deterministic() {
        let source = DynamicImage::ImageLuma8(bimodal_image());
        let config = PreprocessConfig::default();

        let first = encode_png(run_pipeline(&source, &config));
        let second = encode_png(run_pipeline(&source, &config));

        assert_eq!(first, second);
    }

    #[test]
    fn test_pipeline_output_is_single_channel() {
        let source = DynamicImage::new_rgb8(16, 16);
        let out = run_pipeline(&source, &PreprocessConfig::default());
        assert_eq!(out.dimensions(), (16, 16));
    }

    #[test]
    fn test_otsu_threshold_separates_bimodal_modes() {
        let threshold = otsu_threshold(&bimodal_image());
        assert!(
            threshold >= 40 && threshold < 210,
            "threshold {} does not fall between the modes",
            threshold
        );
    }

    #[test]
    fn test_otsu_threshold_empty_image() {
        let empty = GrayImage::new(0, 0);
        assert_eq!(otsu_threshold(&empty), 128);
    }

    #[test]
    fn test_otsu_policy_output_is_strictly_binary() {
        let source = DynamicImage::ImageLuma8(bimodal_image());
        let config = PreprocessConfig {
            blur_sigma: 1.0,
            policy: FinishPolicy::Otsu,
        };

        let out = run_pipeline(&source, &config);
        for pixel in out.pixels() {
            let v = pixel.0[0];
            assert!(v == 0 || v == 255, "non-binary pixel value {}", v);
        }
    }

    #[test]
    fn test_contrast_identity_factor_preserves_pixels() {
        let gray = bimodal_image();
        let out = enhance_contrast(&gray, 1.0);
        assert_eq!(gray.as_raw(), out.as_raw());
    }

    #[test]
    fn test_contrast_flat_image_is_fixed_point() {
        let flat: GrayImage = ImageBuffer::from_pixel(8, 8, Luma([99u8]));
        let out = enhance_contrast(&flat, 2.0);
        assert_eq!(flat.as_raw(), out.as_raw());
    }

    #[test]
    fn test_contrast_widens_spread_and_clamps() {
        let gray = bimodal_image();
        let out = enhance_contrast(&gray, 2.0);

        let min = out.pixels().map(|p| p.0[0]).min().unwrap();
        let max = out.pixels().map(|p| p.0[0]).max().unwrap();

        // Mean is 125; 40 -> -45 clamps to 0, 210 -> 295 clamps to 255
        assert_eq!(min, 0);
        assert_eq!(max, 255);
    }

    #[test]
    fn test_zero_sigma_skips_smoothing() {
        let source = DynamicImage::ImageLuma8(bimodal_image());
        let config = PreprocessConfig {
            blur_sigma: 0.0,
            policy: FinishPolicy::Contrast { factor: 1.0 },
        };

        let out = run_pipeline(&source, &config);
        assert_eq!(out.as_raw(), bimodal_image().as_raw());
    }

    #[test]
    fn test_preprocess_file_writes_distinct_spool_file() {
        let dir = tempfile::tempdir().unwrap();
        let source = encode_png(bimodal_image());
        let raw = TransientFile::create(dir.path(), &source, Stage::Raw, "png").unwrap();

        let processed =
            preprocess_file(&raw, &PreprocessConfig::default(), dir.path()).unwrap();

        assert_ne!(raw.path(), processed.path());
        assert!(raw.path().exists());
        assert!(processed.path().exists());
        assert_eq!(processed.stage(), Stage::Preprocessed);

        // Output must itself decode as a PNG
        let bytes = fs::read(processed.path()).unwrap();
        let (_, info) = decode_image_bytes(&bytes).unwrap();
        assert_eq!(info.format, ImageFormat::Png);
    }

    #[test]
    fn test_preprocess_file_rejects_non_image_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let raw =
            TransientFile::create(dir.path(), b"definitely not an image", Stage::Raw, "png")
                .unwrap();

        let result = preprocess_file(&raw, &PreprocessConfig::default(), dir.path());
        assert!(matches!(result.unwrap_err(), PreprocessError::Decode(_)));
    }
}
