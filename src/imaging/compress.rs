//! # Image Compression
//!
//! Re-encodes an image until it fits a byte budget.
//!
//! ## Algorithm
//!
//! 1. Decode and shrink so the long side is at most `max_width_or_height`.
//! 2. Encode at `initial_quality`.
//! 3. While the output is over budget and iterations remain, lower the quality
//!    by 10% and (unless `always_keep_resolution`) shrink the dimensions by
//!    `sqrt(budget / size)`, clamped to 50-95% per step.
//!
//! Output is JPEG. A PNG input with `always_keep_resolution` stays PNG and is
//! re-encoded once at the strongest PNG setting. If the input already fits,
//! is within the size limit, and is smaller than the re-encoded result in the
//! same format, the input is returned untouched.

use bytes::Bytes;
use frame_scale::cpu::scale_rgba_to_vec;
use frame_scale::plan::{AspectMode, ScaleTarget, build_plan};
use futures_util::future::join_all;
use image::{ImageFormat, RgbaImage};
use tracing::debug;

use super::{encode_jpeg, encode_png_best, flatten_on_white, load_image, size_of, sniff_format};
use crate::camera::{Size, StillFormat};
use crate::error::{ToolkitError, ToolkitResult};

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;
const QUALITY_STEP: f32 = 0.9;
const MIN_QUALITY: f32 = 0.05;

#[derive(Debug, Clone, PartialEq)]
pub struct CompressionOptions {
    pub max_size_mb: f64,
    pub max_width_or_height: u32,
    /// JPEG quality in `0.0..=1.0`.
    pub initial_quality: f32,
    pub always_keep_resolution: bool,
    pub max_iterations: u32,
}

impl Default for CompressionOptions {
    fn default() -> Self {
        Self {
            max_size_mb: 1.0,
            max_width_or_height: 1920,
            initial_quality: 0.7,
            always_keep_resolution: false,
            max_iterations: 10,
        }
    }
}

impl CompressionOptions {
    pub fn validate(&self) -> Result<(), String> {
        if !(self.max_size_mb.is_finite() && self.max_size_mb >= 0.01) {
            return Err("Max size must be at least 0.01 MB".to_string());
        }
        if self.max_width_or_height == 0 {
            return Err("Max width or height must be greater than 0".to_string());
        }
        if !(self.initial_quality > 0.0 && self.initial_quality <= 1.0) {
            return Err("Initial quality must be between 0 and 1".to_string());
        }
        if self.max_iterations == 0 {
            return Err("Max iterations must be greater than 0".to_string());
        }
        Ok(())
    }

    pub fn budget_bytes(&self) -> usize {
        (self.max_size_mb * BYTES_PER_MB) as usize
    }
}

#[derive(Debug, Clone)]
pub struct CompressedImage {
    pub bytes: Bytes,
    pub format: StillFormat,
    pub size: Size,
    pub original_bytes: usize,
    /// Encode passes run. Zero when the input was returned untouched.
    pub iterations: u32,
}

impl CompressedImage {
    pub fn compressed_bytes(&self) -> usize {
        self.bytes.len()
    }

    /// Percentage saved relative to the input. Negative if the output grew.
    pub fn reduction_percent(&self) -> f64 {
        if self.original_bytes == 0 {
            return 0.0;
        }
        100.0 - (self.bytes.len() as f64 / self.original_bytes as f64) * 100.0
    }

    pub fn fits(&self, options: &CompressionOptions) -> bool {
        self.bytes.len() <= options.budget_bytes()
    }
}

/// Compress one encoded image. CPU-bound.
pub fn compress_image(input: &[u8], options: &CompressionOptions) -> ToolkitResult<CompressedImage> {
    options
        .validate()
        .map_err(|m| ToolkitError::invalid_options("compression", m))?;

    let source_format = sniff_format(input);
    let decoded = load_image(input)?.to_rgba8();
    let original_size = size_of(&decoded);
    let budget = options.budget_bytes();

    let keep_png = source_format == Some(ImageFormat::Png) && options.always_keep_resolution;
    let format = if keep_png { StillFormat::Png } else { StillFormat::Jpeg };

    let mut img = shrink_to(&decoded, options.max_width_or_height)?;
    let mut quality = options.initial_quality;
    let mut iterations = 0;
    let mut encoded;

    loop {
        encoded = encode(&img, format, quality)?;
        iterations += 1;
        debug!(
            iteration = iterations,
            quality,
            width = img.width(),
            height = img.height(),
            bytes = encoded.len(),
            "Compression pass"
        );

        if keep_png || encoded.len() <= budget || iterations >= options.max_iterations {
            break;
        }

        quality = (quality * QUALITY_STEP).max(MIN_QUALITY);
        if !options.always_keep_resolution {
            let factor = (budget as f64 / encoded.len() as f64).sqrt().clamp(0.5, 0.95);
            let long = img.width().max(img.height()) as f64;
            img = shrink_to(&img, ((long * factor).round() as u32).max(1))?;
        }
    }

    let input_is_output_format = matches!(
        (source_format, format),
        (Some(ImageFormat::Jpeg), StillFormat::Jpeg) | (Some(ImageFormat::Png), StillFormat::Png)
    );
    let within_limit = original_size.w.max(original_size.h) <= options.max_width_or_height;
    if input_is_output_format && within_limit && input.len() <= budget && input.len() <= encoded.len() {
        return Ok(CompressedImage {
            bytes: Bytes::copy_from_slice(input),
            format,
            size: original_size,
            original_bytes: input.len(),
            iterations: 0,
        });
    }

    Ok(CompressedImage {
        size: size_of(&img),
        bytes: Bytes::from(encoded),
        format,
        original_bytes: input.len(),
        iterations,
    })
}

/// Compress several images concurrently. Results keep input order and fail independently.
pub async fn compress_many(
    inputs: Vec<Bytes>,
    options: &CompressionOptions,
) -> Vec<ToolkitResult<CompressedImage>> {
    let tasks = inputs.into_iter().map(|input| {
        let options = options.clone();
        crate::run_blocking("compress", move || compress_image(&input, &options))
    });
    join_all(tasks).await
}

/// Human-readable byte count, e.g. `1.5 MB`.
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["Bytes", "KB", "MB", "GB", "TB"];
    if bytes == 0 {
        return "0 Bytes".to_string();
    }
    let i = ((bytes as f64).ln() / 1024f64.ln()).floor() as usize;
    let i = i.min(UNITS.len() - 1);
    let value = bytes as f64 / 1024f64.powi(i as i32);
    let rounded = (value * 100.0).round() / 100.0;
    format!("{} {}", rounded, UNITS[i])
}

fn shrink_to(img: &RgbaImage, max_long_side: u32) -> ToolkitResult<RgbaImage> {
    let size = size_of(img);
    let plan = build_plan(size, ScaleTarget::MaxLongSide(max_long_side), AspectMode::Preserve);
    if plan.is_identity() {
        return Ok(img.clone());
    }
    let data = scale_rgba_to_vec(img.as_raw(), size, &plan)?;
    RgbaImage::from_raw(plan.out.w, plan.out.h, data)
        .ok_or_else(|| ToolkitError::invalid_state("holding a truncated frame", "compress"))
}

fn encode(img: &RgbaImage, format: StillFormat, quality: f32) -> ToolkitResult<Vec<u8>> {
    match format {
        StillFormat::Png => encode_png_best(img),
        StillFormat::Jpeg => {
            let q = ((quality * 100.0).round() as u8).clamp(1, 100);
            encode_jpeg(&flatten_on_white(img), q)
        }
    }
}
