//! # Toolkit Configuration
//!
//! One [`ToolkitConfig`] holds the settings of every tool. It is the common
//! interface between the CLI, the HTTP proxy and the library: the binary builds
//! it, validates it, and hands each section to the tool that needs it.
//!
//! ## Sources
//!
//! Later sources override earlier ones:
//!
//! 1. Built-in defaults ([`Default`] on each section)
//! 2. An optional JSON file (`--config toolkit.json`); missing keys keep their defaults
//! 3. Environment variables
//! 4. CLI flags
//!
//! ## Environment Variables
//!
//! | Variable | Field |
//! |----------|-------|
//! | `TOOLKIT_IMAGE_API_KEY` | `proxy.api_key` |
//! | `TOOLKIT_IMAGE_API_BASE` | `proxy.api_base` |
//! | `TOOLKIT_BIND` | `proxy.bind` |
//! | `TOOLKIT_CAMERA_DEVICE` | `camera.device_id` |
//!
//! The API key is never written back out when a config is serialized.
//!
//! ## Examples
//!
//! ```rust
//! use media_toolkit::config::ToolkitConfig;
//!
//! let mut config = ToolkitConfig::default();
//! config.apply_env(|key| (key == "TOOLKIT_BIND").then(|| "0.0.0.0:9000".to_string()));
//! assert_eq!(config.proxy.bind, "0.0.0.0:9000");
//! assert!(config.validate().is_ok());
//! ```

use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::camera::{AspectRatio, Orientation, Size, StillFormat};
use crate::codec::barcode::{BarcodeOptions, Rotation, Symbology};
use crate::codec::qr::{QrErrorCorrection, QrOptions};
use crate::error::{ToolkitError, ToolkitResult};
use crate::imaging::compress::CompressionOptions;

pub const ENV_API_KEY: &str = "TOOLKIT_IMAGE_API_KEY";
pub const ENV_API_BASE: &str = "TOOLKIT_IMAGE_API_BASE";
pub const ENV_BIND: &str = "TOOLKIT_BIND";
pub const ENV_CAMERA_DEVICE: &str = "TOOLKIT_CAMERA_DEVICE";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolkitConfig {
    pub camera: CameraConfig,
    pub qr: QrConfig,
    pub barcode: BarcodeConfig,
    pub compression: CompressionConfig,
    pub scanner: ScannerConfig,
    pub proxy: ProxyConfig,
}

impl ToolkitConfig {
    /// Defaults, overlaid with `path` when given. Environment is not applied.
    pub fn load(path: Option<&Path>) -> ToolkitResult<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let text = std::fs::read_to_string(path)
            .map_err(|e| ToolkitError::io("read config", e).with_context(path.display().to_string()))?;
        serde_json::from_str(&text).map_err(|e| {
            ToolkitError::config("file", e.to_string()).with_context(path.display().to_string())
        })
    }

    /// Apply overrides from the process environment.
    pub fn apply_process_env(&mut self) {
        self.apply_env(|key| std::env::var(key).ok());
    }

    /// Apply overrides from `lookup`. Blank values are ignored.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        if let Some(key) = get(ENV_API_KEY) {
            self.proxy.api_key = Some(key);
        }
        if let Some(base) = get(ENV_API_BASE) {
            self.proxy.api_base = base;
        }
        if let Some(bind) = get(ENV_BIND) {
            self.proxy.bind = bind;
        }
        if let Some(device) = get(ENV_CAMERA_DEVICE) {
            self.camera.device_id = Some(device);
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        self.camera.validate()?;
        self.qr.validate()?;
        self.barcode.validate()?;
        self.compression.validate()?;
        self.scanner.validate()?;
        self.proxy.validate()?;
        Ok(())
    }
}

/// Camera capture and preview settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    pub orientation: Orientation,
    /// Explicit preview aspect. Applied long side first in landscape, short side first in portrait.
    pub aspect: Option<AspectRatio>,
    /// Long side of the displayed preview in pixels. Captures are written at this size.
    pub preview_long_side: u32,
    pub still_format: StillFormat,
    pub jpeg_quality: u8,
    pub device_id: Option<String>,
    /// Request the orientation's resolution as a hard constraint instead of a hint.
    pub exact_resolution: bool,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            orientation: Orientation::Landscape,
            aspect: None,
            preview_long_side: 1280,
            still_format: StillFormat::Png,
            jpeg_quality: 92,
            device_id: None,
            exact_resolution: false,
        }
    }
}

impl CameraConfig {
    /// Aspect of the preview box for the current orientation.
    pub fn display_aspect(&self) -> AspectRatio {
        match self.aspect {
            Some(a) => {
                let (long, short) = (a.w.max(a.h), a.w.min(a.h));
                match self.orientation {
                    Orientation::Landscape => AspectRatio::new(long, short),
                    Orientation::Portrait => AspectRatio::new(short, long),
                }
            }
            None => self.orientation.default_aspect(),
        }
    }

    /// Pixel size of the preview box, which is also the size of captured stills.
    pub fn display_size(&self) -> Size {
        self.display_aspect().display_size(self.preview_long_side)
    }

    pub fn validate(&self) -> Result<(), String> {
        if !(64..=7680).contains(&self.preview_long_side) {
            return Err("Preview size must be between 64 and 7680 pixels".to_string());
        }
        if !(1..=100).contains(&self.jpeg_quality) {
            return Err("JPEG quality must be between 1 and 100".to_string());
        }
        if let Some(a) = self.aspect {
            if a.w == 0 || a.h == 0 {
                return Err("Aspect ratio terms must be greater than 0".to_string());
            }
        }
        Ok(())
    }
}

/// QR generator defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QrConfig {
    pub width: u32,
    pub bulk_width: u32,
    pub margin: u32,
    pub error_correction: QrErrorCorrection,
    pub dark_color: String,
    pub light_color: String,
}

impl Default for QrConfig {
    fn default() -> Self {
        Self {
            width: 512,
            bulk_width: 256,
            margin: 1,
            error_correction: QrErrorCorrection::H,
            dark_color: "#000000".to_string(),
            light_color: "#ffffff".to_string(),
        }
    }
}

impl QrConfig {
    pub fn validate(&self) -> Result<(), String> {
        if !(21..=4096).contains(&self.width) || !(21..=4096).contains(&self.bulk_width) {
            return Err("QR width must be between 21 and 4096 pixels".to_string());
        }
        if self.margin > 16 {
            return Err("QR margin must be at most 16 modules".to_string());
        }
        Ok(())
    }

    pub fn to_qr_options(&self, bulk: bool) -> QrOptions {
        QrOptions {
            width: if bulk { self.bulk_width } else { self.width },
            margin: self.margin,
            error_correction: self.error_correction,
            dark_color: self.dark_color.clone(),
            light_color: self.light_color.clone(),
        }
    }
}

/// Barcode generator defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BarcodeConfig {
    pub symbology: Symbology,
    pub scale: u32,
    pub bulk_scale: u32,
    /// Bar height in millimetres.
    pub height: f32,
    pub padding: u32,
    pub include_text: bool,
    pub text_size: u32,
    pub bar_color: String,
    pub background_color: String,
    pub rotate: Rotation,
}

impl Default for BarcodeConfig {
    fn default() -> Self {
        Self {
            symbology: Symbology::Code128,
            scale: 3,
            bulk_scale: 5,
            height: 10.0,
            padding: 10,
            include_text: true,
            text_size: 12,
            bar_color: "000000".to_string(),
            background_color: "FFFFFF".to_string(),
            rotate: Rotation::N,
        }
    }
}

impl BarcodeConfig {
    pub fn validate(&self) -> Result<(), String> {
        self.to_barcode_options(false).check().map_err(|e| e.user_message())
    }

    pub fn to_barcode_options(&self, bulk: bool) -> BarcodeOptions {
        BarcodeOptions {
            symbology: self.symbology,
            scale: if bulk { self.bulk_scale } else { self.scale },
            height: self.height,
            padding: self.padding,
            include_text: self.include_text,
            text_size: self.text_size,
            bar_color: self.bar_color.clone(),
            background_color: self.background_color.clone(),
            rotate: self.rotate,
        }
    }
}

/// Image compressor defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompressionConfig {
    pub max_size_mb: f64,
    pub max_width_or_height: u32,
    pub initial_quality: f32,
    pub always_keep_resolution: bool,
    pub max_iterations: u32,
}

impl Default for CompressionConfig {
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

impl CompressionConfig {
    pub fn validate(&self) -> Result<(), String> {
        self.to_compression_options().validate()
    }

    pub fn to_compression_options(&self) -> CompressionOptions {
        CompressionOptions {
            max_size_mb: self.max_size_mb,
            max_width_or_height: self.max_width_or_height,
            initial_quality: self.initial_quality,
            always_keep_resolution: self.always_keep_resolution,
            max_iterations: self.max_iterations,
        }
    }
}

/// Barcode scanner settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScannerConfig {
    /// Remote images are fetched through this URL. `{url}` is replaced by the
    /// percent-encoded image address.
    pub url_proxy_template: String,
    /// Frames tried before a camera scan gives up.
    pub camera_attempts: u32,
    pub attempt_interval_ms: u64,
    pub fetch_timeout_secs: u64,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            url_proxy_template: "https://images.weserv.nl/?url={url}".to_string(),
            camera_attempts: 50,
            attempt_interval_ms: 100,
            fetch_timeout_secs: 20,
        }
    }
}

impl ScannerConfig {
    pub fn validate(&self) -> Result<(), String> {
        if !self.url_proxy_template.is_empty() && !self.url_proxy_template.contains("{url}") {
            return Err("Scanner proxy template must contain {url}".to_string());
        }
        if self.camera_attempts == 0 {
            return Err("Camera scan attempts must be greater than 0".to_string());
        }
        if self.fetch_timeout_secs == 0 {
            return Err("Fetch timeout must be greater than 0 seconds".to_string());
        }
        Ok(())
    }

    pub fn attempt_interval(&self) -> Duration {
        Duration::from_millis(self.attempt_interval_ms)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }
}

/// Image generation proxy settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProxyConfig {
    pub bind: String,
    pub api_base: String,
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    pub timeout_secs: u64,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:8787".to_string(),
            api_base: "https://api.infip.pro".to_string(),
            api_key: None,
            timeout_secs: 120,
        }
    }
}

impl ProxyConfig {
    pub fn validate(&self) -> Result<(), String> {
        if !(self.api_base.starts_with("http://") || self.api_base.starts_with("https://")) {
            return Err("API base must be an http(s) URL".to_string());
        }
        if self.bind.parse::<std::net::SocketAddr>().is_err() {
            return Err(format!("Invalid bind address: {}", self.bind));
        }
        if self.timeout_secs == 0 {
            return Err("Proxy timeout must be greater than 0 seconds".to_string());
        }
        Ok(())
    }

    /// The key, or a config error naming the variable that supplies it.
    pub fn require_api_key(&self) -> ToolkitResult<&str> {
        self.api_key.as_deref().ok_or_else(|| {
            ToolkitError::config("proxy.api_key", format!("set {} or proxy.api_key", ENV_API_KEY))
        })
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Parse `WIDTHxHEIGHT`, e.g. `1280x720`.
pub fn parse_size(s: &str) -> Result<Size, String> {
    let (w, h) = s
        .trim()
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("Invalid size: {} (expected WIDTHxHEIGHT)", s))?;
    let w: u32 = w.trim().parse().map_err(|_| format!("Invalid width: {}", w))?;
    let h: u32 = h.trim().parse().map_err(|_| format!("Invalid height: {}", h))?;
    if w == 0 || h == 0 {
        return Err("Size must be greater than 0".to_string());
    }
    Ok(Size::new(w, h))
}

/// Named quality levels for JPEG output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QualityPreset {
    Low,
    Medium,
    High,
    Max,
}

impl QualityPreset {
    pub fn jpeg_quality(self) -> u8 {
        match self {
            Self::Low => 60,
            Self::Medium => 75,
            Self::High => 85,
            Self::Max => 95,
        }
    }

    /// Starting quality for the compressor, in `0.0..=1.0`.
    pub fn initial_quality(self) -> f32 {
        self.jpeg_quality() as f32 / 100.0
    }
}

impl FromStr for QualityPreset {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            "max" | "ultra" => Ok(Self::Max),
            other => Err(format!("Unknown quality preset: {} (low, medium, high, max)", other)),
        }
    }
}
