//! # Codecs
//!
//! QR and barcode generation, multi-format decoding, and bulk generation.
//!
//! Encoders produce a [`ModuleGrid`](render::ModuleGrid) (dark/light modules)
//! from `qrcode` or the `rxing` writers; [`render`] turns the grid into PNG or
//! SVG. The decoder runs `rxing` over a luma buffer built from any image the
//! `image` crate can read.

pub mod barcode;
pub mod bulk;
pub mod qr;
pub mod render;
pub mod scan;

use std::fmt;
use std::str::FromStr;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::camera::Size;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Png,
    Svg,
}

impl OutputFormat {
    pub fn mime(&self) -> &'static str {
        match self {
            OutputFormat::Png => "image/png",
            OutputFormat::Svg => "image/svg+xml",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Png => "png",
            OutputFormat::Svg => "svg",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "png" => Ok(OutputFormat::Png),
            "svg" => Ok(OutputFormat::Svg),
            other => Err(format!("Invalid output format: {}. Use: png, svg", other)),
        }
    }
}

/// An encoded QR code or barcode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedImage {
    pub format: OutputFormat,
    pub bytes: Bytes,
    /// Pixel size. For SVG, the size of the view box.
    pub size: Size,
}

impl EncodedImage {
    pub fn mime(&self) -> &'static str {
        self.format.mime()
    }

    pub fn extension(&self) -> &'static str {
        self.format.extension()
    }

    pub fn to_data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime(), STANDARD.encode(&self.bytes))
    }
}

/// A decoded symbol.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScanResult {
    pub text: String,
    /// Symbology name, e.g. `qrcode` or `code128`.
    pub format: String,
}
