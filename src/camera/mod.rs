//! # Camera Capture
//!
//! Device enumeration, stream lifecycle and still capture for video inputs.
//!
//! ## Architecture
//!
//! 1. **MediaHost / MediaStream traits**: the seam between this crate and whatever
//!    provides camera frames (a real webcam through nokhwa, or [`synthetic::SyntheticHost`])
//! 2. **[`state`]**: a pure state machine describing Idle, Starting, Live and Captured
//! 3. **[`lifecycle::CameraLifecycle`]**: owns at most one stream and interprets the
//!    state machine's effects against the host
//! 4. **[`capture`]**: aspect-correct center crop and still encoding
//!
//! Every stream is exclusively owned by one lifecycle instance. Switching device or
//! orientation tears the old stream down before a new one is requested.

pub mod capture;
pub mod lifecycle;
#[cfg(feature = "native-camera")]
pub mod native;
pub mod state;
pub mod synthetic;

use std::{fmt, str::FromStr};

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::error::ToolkitResult;

pub use frame_scale::plan::Size;
pub use lifecycle::{CameraLifecycle, TeardownHandle};
pub use state::{CameraPhase, CameraState};

/// Kind of media input. Only video inputs are ever surfaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeviceKind {
    VideoInput,
    AudioInput,
}

/// One enumerated media input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceDescriptor {
    pub id: String,
    pub label: String,
    pub kind: DeviceKind,
}

impl DeviceDescriptor {
    pub fn video(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            kind: DeviceKind::VideoInput,
        }
    }

    /// Label for display; hosts may hide labels until permission is granted.
    pub fn display_label(&self, index: usize) -> String {
        if self.label.trim().is_empty() {
            format!("Camera {}", index + 1)
        } else {
            self.label.clone()
        }
    }
}

/// Preview orientation. Decides the ideal stream resolution and the
/// displayed aspect ratio.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    #[default]
    Landscape,
    Portrait,
}

impl Orientation {
    /// Ideal resolution requested from the host.
    pub fn ideal_resolution(self) -> Size {
        match self {
            Orientation::Landscape => Size::new(1920, 1080),
            Orientation::Portrait => Size::new(1080, 1920),
        }
    }

    /// Default preview aspect for this orientation (16:9 or 9:16).
    pub fn default_aspect(self) -> AspectRatio {
        match self {
            Orientation::Landscape => AspectRatio::new(16, 9),
            Orientation::Portrait => AspectRatio::new(9, 16),
        }
    }
}

impl fmt::Display for Orientation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Orientation::Landscape => write!(f, "landscape"),
            Orientation::Portrait => write!(f, "portrait"),
        }
    }
}

impl FromStr for Orientation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "landscape" | "l" => Ok(Orientation::Landscape),
            "portrait" | "p" => Ok(Orientation::Portrait),
            other => Err(format!(
                "Invalid orientation: {}. Use: landscape, portrait",
                other
            )),
        }
    }
}

/// Width-to-height ratio of the displayed preview.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AspectRatio {
    pub w: u32,
    pub h: u32,
}

impl AspectRatio {
    pub fn new(w: u32, h: u32) -> Self {
        Self {
            w: w.max(1),
            h: h.max(1),
        }
    }

    /// Display size whose longer side is `long_side` pixels.
    pub fn display_size(&self, long_side: u32) -> Size {
        let long_side = long_side.max(1) as u64;
        let (aw, ah) = (self.w.max(1) as u64, self.h.max(1) as u64);
        if aw >= ah {
            let h = (long_side * ah + aw / 2) / aw;
            Size::new(long_side as u32, (h as u32).max(1))
        } else {
            let w = (long_side * aw + ah / 2) / ah;
            Size::new((w as u32).max(1), long_side as u32)
        }
    }

    pub fn as_f64(&self) -> f64 {
        self.w as f64 / self.h as f64
    }
}

impl FromStr for AspectRatio {
    type Err = String;

    /// Parses `16:9` or `4x3`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (w, h) = s
            .split_once([':', 'x'])
            .ok_or_else(|| format!("Invalid aspect ratio: {}. Use W:H, e.g. 16:9", s))?;
        let w: u32 = w
            .trim()
            .parse()
            .map_err(|_| format!("Invalid aspect width: {}", w))?;
        let h: u32 = h
            .trim()
            .parse()
            .map_err(|_| format!("Invalid aspect height: {}", h))?;
        if w == 0 || h == 0 {
            return Err("Aspect ratio sides must be greater than 0".to_string());
        }
        Ok(AspectRatio::new(w, h))
    }
}

/// Resolution constraint sent with a stream request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionHint {
    /// Best effort; the host may deliver any size.
    Ideal(Size),
    /// Hard constraint; the host fails with `UnsupportedConstraint` if it cannot comply.
    Exact(Size),
}

impl ResolutionHint {
    pub fn size(&self) -> Size {
        match self {
            ResolutionHint::Ideal(s) | ResolutionHint::Exact(s) => *s,
        }
    }
}

/// Everything a host needs to open a stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamRequest {
    pub device_id: String,
    pub resolution: ResolutionHint,
    pub orientation: Orientation,
}

/// Tightly packed RGBA8 frame.
#[derive(Debug, Clone)]
pub struct RgbaFrame {
    pub size: Size,
    pub data: Bytes,
}

impl RgbaFrame {
    pub fn new(size: Size, data: impl Into<Bytes>) -> Self {
        Self {
            size,
            data: data.into(),
        }
    }

    pub fn into_image(self) -> Option<image::RgbaImage> {
        image::RgbaImage::from_raw(self.size.w, self.size.h, self.data.to_vec())
    }

    pub fn from_image(img: image::RgbaImage) -> Self {
        let size = Size::new(img.width(), img.height());
        Self::new(size, img.into_raw())
    }
}

/// Encoding used for captured stills.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StillFormat {
    #[default]
    Png,
    Jpeg,
}

impl StillFormat {
    pub fn mime(&self) -> &'static str {
        match self {
            StillFormat::Png => "image/png",
            StillFormat::Jpeg => "image/jpeg",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            StillFormat::Png => "png",
            StillFormat::Jpeg => "jpg",
        }
    }
}

impl FromStr for StillFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "png" => Ok(StillFormat::Png),
            "jpg" | "jpeg" => Ok(StillFormat::Jpeg),
            other => Err(format!("Invalid still format: {}. Use: png, jpeg", other)),
        }
    }
}

/// An encoded still taken from a live stream. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedFrame {
    pub bytes: Bytes,
    pub format: StillFormat,
    pub size: Size,
    pub device_id: String,
}

/// Source of camera devices and streams.
///
/// Implementations map their native failures onto the device variants of
/// [`ToolkitError`](crate::error::ToolkitError) so callers see the same
/// messages regardless of backend.
#[async_trait]
pub trait MediaHost: Send + Sync {
    /// Ask for camera access. Hosts without a permission model return `Ok`.
    async fn request_permission(&self) -> ToolkitResult<()>;

    /// List all media inputs. Callers filter to video inputs.
    async fn enumerate_devices(&self) -> ToolkitResult<Vec<DeviceDescriptor>>;

    /// Open a stream for `request`. The returned stream is live.
    async fn open_stream(&self, request: &StreamRequest) -> ToolkitResult<Box<dyn MediaStream>>;
}

/// A live stream bound to one device.
#[async_trait]
pub trait MediaStream: Send {
    fn device_id(&self) -> &str;

    /// Resolution actually delivered by the device.
    fn native_size(&self) -> Size;

    /// Latest frame at native resolution.
    async fn grab_frame(&mut self) -> ToolkitResult<RgbaFrame>;

    /// Release the device. Calling it more than once is a no-op.
    fn stop(&mut self);

    fn is_active(&self) -> bool;
}
