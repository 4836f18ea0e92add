// SPDX-License-Identifier: MIT
// CPU scaler built on fast_image_resize (SIMD-accelerated).
// RGBA8 in, RGBA8 out, direct write into caller-provided dst buffer.

use fast_image_resize as fir;
use fir::images::{TypedImage, TypedImageRef};
use fir::pixels::U8x4;
use fir::{ResizeOptions, Resizer};

use crate::plan::{ScalePlan, Size};

#[derive(Debug, thiserror::Error)]
pub enum ScaleError {
    #[error("Output buffer too small")]
    BufferTooSmall,
    #[error("Source buffer shorter than its declared size")]
    SourceTooSmall,
    #[error("Fast image resize error: {0}")]
    Fir(#[from] fir::ResizeError),
    #[error("Image buffer error: {0}")]
    ImageBuf(#[from] fir::ImageBufferError),
}

/// Main scaling entry point.
///
/// `src_rgba` holds tightly packed rows. `dst` must hold at least
/// `plan.out.w * plan.out.h * 4` bytes. When the plan carries a source crop only
/// that region is sampled, so the output is never letterboxed.
pub fn scale_rgba_cpu(
    resizer: &mut Resizer,
    src_rgba: &[u8],
    src: Size,
    plan: &ScalePlan,
    dst: &mut [u8],
) -> Result<(), ScaleError> {
    let dst_len = plan.out.rgba_len();
    if dst.len() < dst_len {
        return Err(ScaleError::BufferTooSmall);
    }
    if src_rgba.len() < src.rgba_len() {
        return Err(ScaleError::SourceTooSmall);
    }

    let src_view = TypedImageRef::<U8x4>::from_buffer(src.w, src.h, &src_rgba[..src.rgba_len()])?;
    let mut dst_image = TypedImage::<U8x4>::from_buffer(plan.out.w, plan.out.h, &mut dst[..dst_len])?;

    let mut opts = ResizeOptions::new().use_alpha(false);
    if let Some(roi) = plan.src_roi {
        opts = opts.crop(roi.x as f64, roi.y as f64, roi.w as f64, roi.h as f64);
    }

    resizer.resize_typed::<U8x4>(&src_view, &mut dst_image, &opts)?;
    Ok(())
}

/// Allocating convenience over [`scale_rgba_cpu`] for tightly packed input.
pub fn scale_rgba_to_vec(src_rgba: &[u8], src: Size, plan: &ScalePlan) -> Result<Vec<u8>, ScaleError> {
    let mut dst = vec![0u8; plan.out.rgba_len()];
    if plan.is_identity() {
        if src_rgba.len() < dst.len() {
            return Err(ScaleError::SourceTooSmall);
        }
        dst.copy_from_slice(&src_rgba[..plan.out.rgba_len()]);
        return Ok(dst);
    }
    let mut resizer = Resizer::new();
    scale_rgba_cpu(&mut resizer, src_rgba, src, plan, &mut dst)?;
    Ok(dst)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::{build_plan, AspectMode, ScaleTarget};

    fn left_red_right_blue(w: u32, h: u32) -> Vec<u8> {
        let mut buf = Vec::with_capacity((w * h * 4) as usize);
        for _y in 0..h {
            for x in 0..w {
                if x < w / 2 {
                    buf.extend_from_slice(&[255, 0, 0, 255]);
                } else {
                    buf.extend_from_slice(&[0, 0, 255, 255]);
                }
            }
        }
        buf
    }

    #[test]
    fn fill_output_has_exact_target_size() {
        let src = Size::new(64, 36);
        let plan = build_plan(src, ScaleTarget::Exact(Size::new(20, 20)), AspectMode::Fill);
        let out = scale_rgba_to_vec(&left_red_right_blue(64, 36), src, &plan).unwrap();
        assert_eq!(out.len(), 20 * 20 * 4);
        // Left column red, right column blue: the crop stays centered.
        assert!(out[0] > 200 && out[2] < 50);
        let last = (20 * 4 - 4) as usize;
        assert!(out[last] < 50 && out[last + 2] > 200);
    }

    #[test]
    fn short_source_is_rejected() {
        let src = Size::new(4, 4);
        let plan = build_plan(src, ScaleTarget::Exact(Size::new(2, 2)), AspectMode::Fill);
        let mut dst = vec![0u8; plan.out.rgba_len()];
        let mut resizer = Resizer::new();
        let err = scale_rgba_cpu(&mut resizer, &[0u8; 20], src, &plan, &mut dst);
        assert!(matches!(err, Err(ScaleError::SourceTooSmall)));
    }

    #[test]
    fn short_destination_is_rejected() {
        let src = Size::new(8, 8);
        let plan = build_plan(src, ScaleTarget::Exact(Size::new(4, 4)), AspectMode::Fill);
        let mut dst = vec![0u8; 10];
        let mut resizer = Resizer::new();
        let err = scale_rgba_cpu(&mut resizer, &[0u8; 256], src, &plan, &mut dst);
        assert!(matches!(err, Err(ScaleError::BufferTooSmall)));
    }
}
