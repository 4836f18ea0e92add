//! Barcode and QR decoding from files, URLs and live camera frames.

use std::collections::HashMap;
use std::path::Path;

use image::{DynamicImage, GrayImage, Luma, imageops};
use rxing::{DecodeHintType, DecodeHintValue, DecodingHintDictionary};
use tracing::{debug, info};

use super::ScanResult;
use super::barcode::Symbology;
use crate::camera::{CameraLifecycle, RgbaFrame};
use crate::config::ScannerConfig;
use crate::error::{ToolkitError, ToolkitResult};
use crate::imaging::load_image;

pub const NO_SYMBOL_IN_FILE: &str =
    "No barcode was found in the image. Please try a clearer image or a different file.";
pub const URL_LOAD_FAILED: &str = "Failed to load the image from the provided URL. Please check the link and ensure it's a valid, public image.";
pub const NO_SYMBOL_AT_URL: &str = "Could not find a barcode in the image. The image might be unclear or the barcode format is not supported.";
pub const NO_SYMBOL_ON_CAMERA: &str =
    "No barcode was detected. Hold the code steady in front of the camera and try again.";

/// Look for one symbol in a grayscale image.
pub fn decode_luma(luma: &GrayImage) -> Option<ScanResult> {
    let padded = with_quiet_zone(luma);
    let (w, h) = padded.dimensions();
    let mut hints: DecodingHintDictionary = HashMap::new();
    hints.insert(DecodeHintType::TRY_HARDER, DecodeHintValue::TryHarder(true));
    match rxing::helpers::detect_in_luma_with_hints(padded.into_raw(), w, h, None, &mut hints) {
        Ok(result) => {
            let format = Symbology::from_decoded(result.getBarcodeFormat())
                .map(|s| s.name().to_string())
                .unwrap_or_else(|| format!("{:?}", result.getBarcodeFormat()).to_ascii_lowercase());
            Some(ScanResult {
                text: result.getText().to_string(),
                format,
            })
        }
        Err(e) => {
            debug!(error = %e, "No symbol found");
            None
        }
    }
}

pub fn decode_image(img: &DynamicImage) -> Option<ScanResult> {
    decode_luma(&img.to_luma8())
}

/// Decode encoded image bytes, as read from a file the user picked.
pub fn decode_bytes(bytes: &[u8]) -> ToolkitResult<ScanResult> {
    let img = load_image(bytes)?;
    decode_image(&img).ok_or_else(|| ToolkitError::decode_failed(NO_SYMBOL_IN_FILE))
}

pub async fn scan_file(path: &Path) -> ToolkitResult<ScanResult> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| ToolkitError::io("read image", e).with_context(path.display().to_string()))?;
    let result = crate::run_blocking("decode", move || decode_bytes(&bytes)).await?;
    info!(path = %path.display(), format = %result.format, "Decoded file");
    Ok(result)
}

/// Route `url` through the configured image proxy. An empty template fetches directly.
pub fn proxied_url(template: &str, url: &str) -> String {
    if template.is_empty() {
        url.to_string()
    } else {
        template.replace("{url}", &urlencoding::encode(url))
    }
}

/// Fetch a remote image through the proxy and decode it.
pub async fn scan_url(
    client: &reqwest::Client,
    config: &ScannerConfig,
    url: &str,
) -> ToolkitResult<ScanResult> {
    let url = url.trim();
    if url.is_empty() {
        return Err(ToolkitError::invalid_options("url", "Please enter an image URL."));
    }
    let target = proxied_url(&config.url_proxy_template, url);
    debug!(%target, "Fetching image");

    let load_failed = |detail: String| ToolkitError::decode_failed(URL_LOAD_FAILED).with_context(detail);
    let response = client
        .get(&target)
        .timeout(config.fetch_timeout())
        .send()
        .await
        .map_err(|e| load_failed(e.to_string()))?;
    if !response.status().is_success() {
        return Err(load_failed(format!("HTTP {}", response.status())));
    }
    let bytes = response.bytes().await.map_err(|e| load_failed(e.to_string()))?;

    let result = crate::run_blocking("decode", move || {
        let img = load_image(&bytes).map_err(|e| load_failed(e.to_string()))?;
        decode_image(&img).ok_or_else(|| ToolkitError::decode_failed(NO_SYMBOL_AT_URL))
    })
    .await?;
    info!(%url, format = %result.format, "Decoded remote image");
    Ok(result)
}

/// Start the camera, try live frames until a symbol is found or
/// `camera_attempts` frames have been tried, then stop the stream. The stream
/// is stopped on every path.
pub async fn scan_camera(
    camera: &mut CameraLifecycle,
    config: &ScannerConfig,
) -> ToolkitResult<ScanResult> {
    let outcome = scan_live(camera, config).await;
    camera.stop_stream();
    outcome
}

async fn scan_live(camera: &mut CameraLifecycle, config: &ScannerConfig) -> ToolkitResult<ScanResult> {
    camera.start().await?;
    for attempt in 1..=config.camera_attempts {
        let frame = camera.preview_frame().await?;
        if let Some(result) = crate::run_blocking("decode", move || Ok(decode_frame(&frame))).await? {
            info!(attempt, format = %result.format, "Decoded camera frame");
            return Ok(result);
        }
        if attempt < config.camera_attempts {
            tokio::time::sleep(config.attempt_interval()).await;
        }
    }
    Err(ToolkitError::decode_failed(NO_SYMBOL_ON_CAMERA))
}

fn decode_frame(frame: &RgbaFrame) -> Option<ScanResult> {
    let img = frame.clone().into_image()?;
    decode_image(&DynamicImage::ImageRgba8(img))
}

/// White border around the image so symbols touching the edge still have a quiet zone.
fn with_quiet_zone(luma: &GrayImage) -> GrayImage {
    let border = (luma.width().max(luma.height()) / 10).max(16);
    let mut out = GrayImage::from_pixel(
        luma.width() + 2 * border,
        luma.height() + 2 * border,
        Luma([255]),
    );
    imageops::replace(&mut out, luma, border as i64, border as i64);
    out
}
