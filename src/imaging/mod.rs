//! # Imaging
//!
//! Image loading and encoding shared by the capture, compression, crop and
//! barcode tools. Scaling goes through the `frame-scale` crate; encoding uses
//! the `image` crate's PNG and JPEG encoders.

pub mod compress;
pub mod crop;

use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::{CompressionType, FilterType, PngEncoder};
use image::{DynamicImage, ExtendedColorType, ImageEncoder, ImageFormat, RgbImage, RgbaImage};

use crate::camera::Size;
use crate::error::{ToolkitError, ToolkitResult};

/// Decode any supported image. Unreadable input is a decode failure, not an I/O error.
pub fn load_image(bytes: &[u8]) -> ToolkitResult<DynamicImage> {
    image::load_from_memory(bytes).map_err(|e| {
        ToolkitError::decode_failed("Could not load the selected file as an image.")
            .with_context(e.to_string())
    })
}

/// Container format of `bytes`, if recognised.
pub fn sniff_format(bytes: &[u8]) -> Option<ImageFormat> {
    image::guess_format(bytes).ok()
}

pub fn size_of(img: &RgbaImage) -> Size {
    Size::new(img.width(), img.height())
}

pub fn encode_png(img: &RgbaImage) -> ToolkitResult<Vec<u8>> {
    let mut out = Vec::new();
    PngEncoder::new(&mut out)
        .write_image(img.as_raw(), img.width(), img.height(), ExtendedColorType::Rgba8)
        .map_err(|e| ToolkitError::image("encode png", e))?;
    Ok(out)
}

/// PNG at the encoder's strongest compression. Slower; used when size matters.
pub fn encode_png_best(img: &RgbaImage) -> ToolkitResult<Vec<u8>> {
    let mut out = Vec::new();
    PngEncoder::new_with_quality(&mut out, CompressionType::Best, FilterType::Adaptive)
        .write_image(img.as_raw(), img.width(), img.height(), ExtendedColorType::Rgba8)
        .map_err(|e| ToolkitError::image("encode png", e))?;
    Ok(out)
}

/// `quality` is 1-100.
pub fn encode_jpeg(img: &RgbImage, quality: u8) -> ToolkitResult<Vec<u8>> {
    let mut out = Vec::new();
    JpegEncoder::new_with_quality(&mut out, quality.clamp(1, 100))
        .write_image(img.as_raw(), img.width(), img.height(), ExtendedColorType::Rgb8)
        .map_err(|e| ToolkitError::image("encode jpeg", e))?;
    Ok(out)
}

/// Composite onto white. JPEG has no alpha channel and transparent pixels
/// would otherwise come out black.
pub fn flatten_on_white(img: &RgbaImage) -> RgbImage {
    let mut out = RgbImage::new(img.width(), img.height());
    for (dst, src) in out.pixels_mut().zip(img.pixels()) {
        let a = src[3] as u32;
        for c in 0..3 {
            dst[c] = ((src[c] as u32 * a + 255 * (255 - a) + 127) / 255) as u8;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flatten_on_white() {
        let mut img = RgbaImage::new(2, 1);
        img.put_pixel(0, 0, image::Rgba([0, 0, 0, 0]));
        img.put_pixel(1, 0, image::Rgba([10, 20, 30, 255]));
        let flat = flatten_on_white(&img);
        assert_eq!(flat.get_pixel(0, 0).0, [255, 255, 255]);
        assert_eq!(flat.get_pixel(1, 0).0, [10, 20, 30]);
    }

    #[test]
    fn test_load_rejects_non_images() {
        let err = load_image(b"definitely not an image").unwrap_err();
        assert_eq!(err.category(), "decode_failed");
        assert_eq!(err.user_message(), "Could not load the selected file as an image.");
    }

    #[test]
    fn test_encoders_produce_their_formats() {
        let img = RgbaImage::from_pixel(4, 4, image::Rgba([1, 2, 3, 255]));
        assert_eq!(sniff_format(&encode_png(&img).unwrap()), Some(ImageFormat::Png));
        assert_eq!(sniff_format(&encode_png_best(&img).unwrap()), Some(ImageFormat::Png));
        let jpeg = encode_jpeg(&flatten_on_white(&img), 80).unwrap();
        assert_eq!(sniff_format(&jpeg), Some(ImageFormat::Jpeg));
    }
}
