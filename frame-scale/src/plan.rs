// SPDX-License-Identifier: MIT
//! # Scaling Plan Computation
//!
//! Computes output dimensions and source regions of interest for scaling
//! operations. Plans are pure data: computing one never touches pixels.
//!
//! ## Design
//!
//! 1. **ScaleTarget**: what size constraint to apply (max side length vs exact dimensions)
//! 2. **AspectMode**: how aspect differences are resolved (fit or center-crop fill)
//! 3. **ScalePlan**: the computed output size plus the source crop, if any
//!
//! All computations round to whole pixels and clamp to a minimum of 1px.

/// Represents a 2D size with width and height in pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Size {
    pub w: u32,
    pub h: u32,
}

impl Size {
    pub fn new(w: u32, h: u32) -> Self {
        Self { w, h }
    }

    /// Number of bytes in a tightly packed 4-channel buffer of this size.
    pub fn rgba_len(&self) -> usize {
        (self.w as usize) * (self.h as usize) * 4
    }

    pub fn is_empty(&self) -> bool {
        self.w == 0 || self.h == 0
    }
}

/// Rectangle in source pixel coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Rect {
    pub x: u32,
    pub y: u32,
    pub w: u32,
    pub h: u32,
}

impl Rect {
    pub fn size(&self) -> Size {
        Size { w: self.w, h: self.h }
    }

    /// Whole-frame rectangle.
    pub fn full(size: Size) -> Self {
        Self {
            x: 0,
            y: 0,
            w: size.w,
            h: size.h,
        }
    }
}

/// Defines how aspect ratio differences are handled during scaling.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AspectMode {
    /// Keep the source aspect ratio; output fits entirely within the target bounds.
    Preserve,
    /// Center-crop the source to the target aspect ratio, then scale to exactly
    /// the target size. The output is always completely covered by source pixels.
    Fill,
}

/// Defines the target size constraint for scaling operations.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScaleTarget {
    /// Clamp the longest side to a maximum value, derive the other side proportionally.
    MaxLongSide(u32),
    /// Produce exactly these dimensions (Fill) or fit within them (Preserve).
    Exact(Size),
}

/// Complete scaling plan computed from input parameters.
#[derive(Clone, Copy, Debug)]
pub struct ScalePlan {
    /// Original input dimensions
    pub input: Size,
    /// Target size constraint used for planning
    pub target: ScaleTarget,
    /// Aspect ratio handling strategy
    pub aspect: AspectMode,
    /// Final computed output dimensions
    pub out: Size,
    /// Source sub-rectangle that maps onto the whole output, when the plan crops.
    pub src_roi: Option<Rect>,
}

impl ScalePlan {
    /// True when executing the plan would be a plain copy.
    pub fn is_identity(&self) -> bool {
        self.src_roi.is_none() && self.out == self.input
    }
}

/// Compute a complete scaling plan from input parameters.
///
/// `MaxLongSide` never upscales. `Exact` with `Fill` always produces the exact
/// target, upscaling if the source is smaller.
pub fn build_plan(input: Size, target: ScaleTarget, aspect: AspectMode) -> ScalePlan {
    match (target, aspect) {
        (ScaleTarget::MaxLongSide(max_side), _) => {
            let (w, h) = fit_preserve(input, max_side);
            ScalePlan {
                input,
                target,
                aspect,
                out: Size { w, h },
                src_roi: None,
            }
        }
        (ScaleTarget::Exact(out), AspectMode::Preserve) => {
            let (w, h) = fit_within(input, out);
            ScalePlan {
                input,
                target,
                aspect,
                out: Size { w, h },
                src_roi: None,
            }
        }
        (ScaleTarget::Exact(out), AspectMode::Fill) => {
            let out = Size {
                w: out.w.max(1),
                h: out.h.max(1),
            };
            let roi = center_crop(input, out);
            ScalePlan {
                input,
                target,
                aspect,
                out,
                src_roi: if roi == Rect::full(input) { None } else { Some(roi) },
            }
        }
    }
}

/// Largest rectangle with the aspect ratio of `aspect` that fits in `source`,
/// centered along the trimmed axis.
///
/// When the source is wider than the target aspect the width is trimmed,
/// otherwise the height is. The untrimmed axis is always kept whole.
pub fn center_crop(source: Size, aspect: Size) -> Rect {
    let (sw, sh) = (source.w as u64, source.h as u64);
    let (aw, ah) = (aspect.w.max(1) as u64, aspect.h.max(1) as u64);

    if sw * ah > aw * sh {
        let w = ((sh * aw + ah / 2) / ah).clamp(1, sw.max(1)) as u32;
        Rect {
            x: (source.w - w) / 2,
            y: 0,
            w,
            h: source.h,
        }
    } else {
        let h = ((sw * ah + aw / 2) / aw).clamp(1, sh.max(1)) as u32;
        Rect {
            x: 0,
            y: (source.h - h) / 2,
            w: source.w,
            h,
        }
    }
}

/// Fit image within max_long constraint while preserving aspect ratio.
/// Never upscales.
fn fit_preserve(input: Size, max_long: u32) -> (u32, u32) {
    let (w, h) = (input.w as f64, input.h as f64);
    let long = w.max(h).max(1.0);
    let s = (max_long as f64 / long).min(1.0);
    (
        ((w * s).round() as u32).max(1),
        ((h * s).round() as u32).max(1),
    )
}

/// Fit image within a bounding box while preserving aspect ratio.
fn fit_within(input: Size, box_: Size) -> (u32, u32) {
    let (w, h) = (input.w.max(1) as f64, input.h.max(1) as f64);
    let (bw, bh) = (box_.w as f64, box_.h as f64);
    let s = (bw / w).min(bh / h).min(1.0);
    (
        ((w * s).round() as u32).max(1),
        ((h * s).round() as u32).max(1),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fill_trims_width_of_wide_source() {
        let roi = center_crop(Size::new(1920, 1080), Size::new(1, 1));
        assert_eq!(roi, Rect { x: 420, y: 0, w: 1080, h: 1080 });
    }

    #[test]
    fn fill_trims_height_of_tall_target() {
        // Portrait preview over a landscape sensor keeps the full height.
        let roi = center_crop(Size::new(1920, 1080), Size::new(9, 16));
        assert_eq!(roi.h, 1080);
        assert_eq!(roi.w, 608);
        assert_eq!(roi.x, (1920 - 608) / 2);

        // Landscape preview over a portrait sensor keeps the full width.
        let roi = center_crop(Size::new(1080, 1920), Size::new(16, 9));
        assert_eq!((roi.w, roi.h), (1080, 608));
        assert_eq!(roi.y, (1920 - 608) / 2);
    }

    #[test]
    fn fill_plan_matches_target_exactly() {
        let plan = build_plan(
            Size::new(1280, 720),
            ScaleTarget::Exact(Size::new(300, 500)),
            AspectMode::Fill,
        );
        assert_eq!(plan.out, Size::new(300, 500));
        let roi = plan.src_roi.expect("aspect differs, so the plan crops");
        assert!(roi.size().w * 500 / roi.size().h <= 301);
        assert_eq!(roi.h, 720);
    }

    #[test]
    fn fill_plan_with_same_aspect_has_no_crop() {
        let plan = build_plan(
            Size::new(1920, 1080),
            ScaleTarget::Exact(Size::new(640, 360)),
            AspectMode::Fill,
        );
        assert!(plan.src_roi.is_none());
        assert_eq!(plan.out, Size::new(640, 360));
    }

    #[test]
    fn max_long_side_never_upscales() {
        let plan = build_plan(
            Size::new(800, 600),
            ScaleTarget::MaxLongSide(1920),
            AspectMode::Preserve,
        );
        assert!(plan.is_identity());

        let plan = build_plan(
            Size::new(4000, 3000),
            ScaleTarget::MaxLongSide(1920),
            AspectMode::Preserve,
        );
        assert_eq!(plan.out, Size::new(1920, 1440));
    }
}
