//! Crop, rotate and flip.
//!
//! Crops arrive in displayed coordinates (the size the image is shown at) and
//! are scaled to the image's natural pixels before cutting. Output is always PNG.

use std::fmt;
use std::str::FromStr;

use bytes::Bytes;
use frame_scale::plan::Rect;
use image::{RgbaImage, imageops};

use super::{encode_png, load_image, size_of};
use crate::camera::Size;
use crate::error::{ToolkitError, ToolkitResult};
use crate::export::asset::timestamped_name;

/// Crop rectangle in displayed pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PixelCrop {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// Rotation in quarter turns, clockwise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QuarterTurn {
    #[default]
    None,
    Cw90,
    Cw180,
    Cw270,
}

impl QuarterTurn {
    /// Nearest quarter turn to `degrees`, normalised into `0..360`.
    pub fn from_degrees(degrees: i32) -> Self {
        match ((degrees as f64 / 90.0).round() as i64).rem_euclid(4) {
            1 => Self::Cw90,
            2 => Self::Cw180,
            3 => Self::Cw270,
            _ => Self::None,
        }
    }

    pub fn degrees(self) -> i32 {
        match self {
            Self::None => 0,
            Self::Cw90 => 90,
            Self::Cw180 => 180,
            Self::Cw270 => 270,
        }
    }

    pub fn rotate_cw(self) -> Self {
        Self::from_degrees(self.degrees() + 90)
    }

    pub fn rotate_ccw(self) -> Self {
        Self::from_degrees(self.degrees() - 90)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Flip {
    pub horizontal: bool,
    pub vertical: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CropShape {
    #[default]
    Rect,
    /// Pixels outside the inscribed ellipse become transparent.
    Circle,
}

impl FromStr for CropShape {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "rect" | "rectangle" => Ok(Self::Rect),
            "circle" => Ok(Self::Circle),
            other => Err(format!("Invalid crop shape: {}. Use: rect, circle", other)),
        }
    }
}

/// Aspect ratios offered by the cropper.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AspectPreset {
    #[default]
    Wide,
    Standard,
    Square,
    Free,
}

impl AspectPreset {
    pub fn ratio(self) -> Option<f64> {
        match self {
            Self::Wide => Some(16.0 / 9.0),
            Self::Standard => Some(4.0 / 3.0),
            Self::Square => Some(1.0),
            Self::Free => None,
        }
    }
}

impl fmt::Display for AspectPreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Wide => write!(f, "16:9"),
            Self::Standard => write!(f, "4:3"),
            Self::Square => write!(f, "1:1"),
            Self::Free => write!(f, "free"),
        }
    }
}

impl FromStr for AspectPreset {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "16:9" => Ok(Self::Wide),
            "4:3" => Ok(Self::Standard),
            "1:1" | "square" => Ok(Self::Square),
            "free" => Ok(Self::Free),
            other => Err(format!("Invalid aspect: {}. Use: 16:9, 4:3, 1:1, free", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CropRequest {
    pub crop: PixelCrop,
    /// Size the image was displayed at when `crop` was drawn.
    pub displayed: Size,
    pub rotation: QuarterTurn,
    pub flip: Flip,
    pub shape: CropShape,
}

#[derive(Debug, Clone)]
pub struct CroppedImage {
    pub bytes: Bytes,
    pub size: Size,
    pub filename: String,
}

/// Default crop for a freshly loaded image: 90% of the width at `aspect`,
/// centered. Shrinks to fit when the image is too short for that width.
pub fn centered_aspect_crop(aspect: AspectPreset, width: f64, height: f64) -> PixelCrop {
    let (mut w, mut h) = match aspect.ratio() {
        Some(ratio) => (width * 0.9, width * 0.9 / ratio),
        None => (width * 0.9, height * 0.9),
    };
    if let Some(ratio) = aspect.ratio() {
        if h > height {
            h = height;
            w = h * ratio;
        }
    }
    PixelCrop {
        x: (width - w) / 2.0,
        y: (height - h) / 2.0,
        width: w,
        height: h,
    }
}

/// Scale a displayed crop into natural pixel coordinates, clamped to the image.
pub fn natural_rect(crop: &PixelCrop, displayed: Size, natural: Size) -> ToolkitResult<Rect> {
    if displayed.is_empty() || natural.is_empty() {
        return Err(ToolkitError::invalid_options("crop", "Image has no visible area."));
    }
    if crop.width <= 0.0 || crop.height <= 0.0 {
        return Err(ToolkitError::invalid_options("crop", "Please select a crop area first."));
    }

    let scale_x = natural.w as f64 / displayed.w as f64;
    let scale_y = natural.h as f64 / displayed.h as f64;

    let x0 = (crop.x * scale_x).round().clamp(0.0, natural.w as f64) as u32;
    let y0 = (crop.y * scale_y).round().clamp(0.0, natural.h as f64) as u32;
    let x1 = ((crop.x + crop.width) * scale_x).round().clamp(0.0, natural.w as f64) as u32;
    let y1 = ((crop.y + crop.height) * scale_y).round().clamp(0.0, natural.h as f64) as u32;

    if x1 <= x0 || y1 <= y0 {
        return Err(ToolkitError::invalid_options(
            "crop",
            "The crop area lies outside the image.",
        ));
    }
    Ok(Rect {
        x: x0,
        y: y0,
        w: x1 - x0,
        h: y1 - y0,
    })
}

/// Cut, transform and encode. Flips apply before the rotation.
pub fn transform(img: &RgbaImage, rect: Rect, rotation: QuarterTurn, flip: Flip, shape: CropShape) -> RgbaImage {
    let mut out = imageops::crop_imm(img, rect.x, rect.y, rect.w, rect.h).to_image();
    if flip.horizontal {
        imageops::flip_horizontal_in_place(&mut out);
    }
    if flip.vertical {
        imageops::flip_vertical_in_place(&mut out);
    }
    out = match rotation {
        QuarterTurn::None => out,
        QuarterTurn::Cw90 => imageops::rotate90(&out),
        QuarterTurn::Cw180 => imageops::rotate180(&out),
        QuarterTurn::Cw270 => imageops::rotate270(&out),
    };
    if shape == CropShape::Circle {
        mask_ellipse(&mut out);
    }
    out
}

/// Decode `input`, apply `request`, and encode the result as PNG. CPU-bound.
pub fn crop_image(input: &[u8], request: &CropRequest) -> ToolkitResult<CroppedImage> {
    let img = load_image(input)?.to_rgba8();
    let rect = natural_rect(&request.crop, request.displayed, size_of(&img))?;
    let out = transform(&img, rect, request.rotation, request.flip, request.shape);
    Ok(CroppedImage {
        size: size_of(&out),
        bytes: Bytes::from(encode_png(&out)?),
        filename: timestamped_name("cropped-image", "png"),
    })
}

fn mask_ellipse(img: &mut RgbaImage) {
    let (w, h) = (img.width() as f64, img.height() as f64);
    let (rx, ry) = (w / 2.0, h / 2.0);
    for (x, y, px) in img.enumerate_pixels_mut() {
        let dx = (x as f64 + 0.5 - rx) / rx;
        let dy = (y as f64 + 0.5 - ry) / ry;
        if dx * dx + dy * dy > 1.0 {
            px[3] = 0;
        }
    }
}
