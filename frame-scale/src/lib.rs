// SPDX-License-Identifier: MIT
//! # frame-scale: Aspect Planning and RGBA Scaling for Still Frames
//!
//! This crate turns "source size + target size" into a concrete scaling plan and
//! executes it on tightly packed 4-channel 8-bit buffers.
//!
//! ## Key Components
//!
//! - [`plan`]: Scaling plan computation (fit-within and center-crop fill)
//! - [`cpu`]: CPU scaling built on `fast_image_resize`
//!
//! ## Aspect Strategies
//!
//! Two strategies exist and neither letterboxes:
//! - **Preserve**: shrink so the whole frame fits the target bounds (used when
//!   recompressing images to a maximum side length)
//! - **Fill**: trim the longer source axis so the source matches the target aspect
//!   ratio exactly, then scale to the exact target (used for camera capture, where
//!   the saved still must match what the preview displayed)
//!
//! ## Usage Example
//!
//! ```rust
//! use frame_scale::plan::{build_plan, AspectMode, ScaleTarget, Size};
//!
//! // A 16:9 sensor frame shown in a square preview
//! let plan = build_plan(
//!     Size { w: 1920, h: 1080 },
//!     ScaleTarget::Exact(Size { w: 400, h: 400 }),
//!     AspectMode::Fill,
//! );
//! assert_eq!((plan.out.w, plan.out.h), (400, 400));
//! let roi = plan.src_roi.unwrap();
//! assert_eq!((roi.x, roi.w, roi.h), (420, 1080, 1080));
//! ```

pub mod cpu;
pub mod plan;
