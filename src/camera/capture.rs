//! Still capture: crop a native frame to the displayed aspect ratio and encode it.
//!
//! The preview shows the stream center-cropped to fill its box. The saved still
//! must match what was on screen, so the same crop is applied here and the
//! result is written at the displayed pixel size. Nothing is ever letterboxed.

use bytes::Bytes;
use fast_image_resize::Resizer;
use frame_scale::cpu::scale_rgba_cpu;
use frame_scale::plan::{AspectMode, ScaleTarget, build_plan};

use super::{CapturedFrame, RgbaFrame, Size, StillFormat};
use crate::error::{ToolkitError, ToolkitResult};
use crate::imaging;

/// Crop `frame` to the aspect of `display` and scale it to exactly `display`.
pub fn crop_to_display(
    resizer: &mut Resizer,
    frame: &RgbaFrame,
    display: Size,
) -> ToolkitResult<RgbaFrame> {
    if frame.size.is_empty() || display.is_empty() {
        return Err(ToolkitError::invalid_options(
            "display",
            "Frame and display sizes must be non-zero.",
        ));
    }

    let plan = build_plan(frame.size, ScaleTarget::Exact(display), AspectMode::Fill);
    if plan.is_identity() {
        return Ok(frame.clone());
    }

    let mut dst = vec![0u8; plan.out.rgba_len()];
    scale_rgba_cpu(resizer, &frame.data, frame.size, &plan, &mut dst)?;
    Ok(RgbaFrame::new(plan.out, dst))
}

/// Encode an RGBA frame as a still image.
pub fn encode_still(frame: &RgbaFrame, format: StillFormat, jpeg_quality: u8) -> ToolkitResult<Bytes> {
    let img = frame
        .clone()
        .into_image()
        .ok_or_else(|| ToolkitError::invalid_state("holding a truncated frame", "encode a still"))?;
    let encoded = match format {
        StillFormat::Png => imaging::encode_png(&img)?,
        StillFormat::Jpeg => imaging::encode_jpeg(&imaging::flatten_on_white(&img), jpeg_quality)?,
    };
    Ok(Bytes::from(encoded))
}

/// Crop, scale and encode in one step. CPU-bound; call from a blocking task.
pub fn still_from_frame(
    frame: &RgbaFrame,
    display: Size,
    format: StillFormat,
    jpeg_quality: u8,
    device_id: &str,
) -> ToolkitResult<CapturedFrame> {
    let mut resizer = Resizer::new();
    let cropped = crop_to_display(&mut resizer, frame, display)?;
    let bytes = encode_still(&cropped, format, jpeg_quality)?;
    Ok(CapturedFrame {
        bytes,
        format,
        size: cropped.size,
        device_id: device_id.to_string(),
    })
}
