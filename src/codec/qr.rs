//! QR code generation.

use std::str::FromStr;

use bytes::Bytes;
use qrcode::{EcLevel, QrCode};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::render::{Color, Layout, ModuleGrid, Rotation, rasterize_to_width, to_svg};
use super::{EncodedImage, OutputFormat};
use crate::camera::Size;
use crate::error::{ToolkitError, ToolkitResult};
use crate::imaging::encode_png;

/// Error correction level. Higher levels survive more damage and need more modules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum QrErrorCorrection {
    L,
    M,
    Q,
    #[default]
    H,
}

impl QrErrorCorrection {
    fn level(self) -> EcLevel {
        match self {
            QrErrorCorrection::L => EcLevel::L,
            QrErrorCorrection::M => EcLevel::M,
            QrErrorCorrection::Q => EcLevel::Q,
            QrErrorCorrection::H => EcLevel::H,
        }
    }
}

impl FromStr for QrErrorCorrection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "L" | "LOW" => Ok(Self::L),
            "M" | "MEDIUM" => Ok(Self::M),
            "Q" | "QUARTILE" => Ok(Self::Q),
            "H" | "HIGH" => Ok(Self::H),
            other => Err(format!("Invalid error correction level: {}. Use: L, M, Q, H", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QrOptions {
    /// Output width (and height) in pixels.
    pub width: u32,
    /// Light modules around the symbol.
    pub margin: u32,
    pub error_correction: QrErrorCorrection,
    pub dark_color: String,
    pub light_color: String,
}

impl Default for QrOptions {
    fn default() -> Self {
        Self {
            width: 512,
            margin: 1,
            error_correction: QrErrorCorrection::H,
            dark_color: "#000000".to_string(),
            light_color: "#ffffff".to_string(),
        }
    }
}

/// Module grid for `text`, without quiet zone.
pub fn qr_modules(text: &str, ec: QrErrorCorrection) -> ToolkitResult<ModuleGrid> {
    if text.trim().is_empty() {
        return Err(ToolkitError::invalid_options("text", "Please enter some text or a URL."));
    }
    let code = QrCode::with_error_correction_level(text.as_bytes(), ec.level()).map_err(|e| {
        ToolkitError::invalid_options("text", format!("Text cannot be encoded as a QR code: {}", e))
    })?;
    let width = code.width();
    let colors = code.to_colors();
    ModuleGrid::new(
        width,
        width,
        colors.into_iter().map(|c| c == qrcode::Color::Dark).collect(),
    )
    .ok_or_else(|| ToolkitError::invalid_state("holding a malformed symbol", "encode a QR code"))
}

/// Encode `text` as a QR code image. CPU-bound.
pub fn encode_qr(text: &str, options: &QrOptions, format: OutputFormat) -> ToolkitResult<EncodedImage> {
    let dark = Color::parse("dark_color", &options.dark_color)?;
    let light = Color::parse("light_color", &options.light_color)?;
    if options.width == 0 {
        return Err(ToolkitError::invalid_options("width", "Width must be greater than 0."));
    }

    let grid = qr_modules(text, options.error_correction)?;
    debug!(
        modules = grid.width(),
        ec = ?options.error_correction,
        format = %format,
        "Encoding QR code"
    );

    match format {
        OutputFormat::Png => {
            let img = rasterize_to_width(&grid, options.margin as usize, options.width, dark, light);
            let size = Size::new(img.width(), img.height());
            Ok(EncodedImage {
                format,
                bytes: Bytes::from(encode_png(&img)?),
                size,
            })
        }
        OutputFormat::Svg => {
            let symbol = grid.width() + 2 * options.margin as usize;
            let cell = options.width.max(symbol as u32) as f64 / symbol as f64;
            let layout = Layout {
                cell_w: cell,
                cell_h: cell,
                padding: options.margin as f64 * cell,
            };
            let (svg, size) = to_svg(&grid, layout, dark, light, None, Rotation::N);
            Ok(EncodedImage {
                format,
                bytes: Bytes::from(svg),
                size,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_text_rejected() {
        let err = encode_qr("  ", &QrOptions::default(), OutputFormat::Png).unwrap_err();
        assert_eq!(err.category(), "encode_invalid_options");
        assert_eq!(err.user_message(), "Please enter some text or a URL.");
    }

    #[test]
    fn test_png_has_requested_width() {
        let out = encode_qr("HELLO", &QrOptions::default(), OutputFormat::Png).unwrap();
        assert_eq!(out.size, Size::new(512, 512));
        assert_eq!(out.mime(), "image/png");
        let img = image::load_from_memory(&out.bytes).unwrap();
        assert_eq!(img.width(), 512);
    }

    #[test]
    fn test_higher_correction_never_shrinks_symbol() {
        let low = qr_modules("https://example.com/some/longer/path", QrErrorCorrection::L).unwrap();
        let high = qr_modules("https://example.com/some/longer/path", QrErrorCorrection::H).unwrap();
        assert!(high.width() >= low.width());
    }

    #[test]
    fn test_svg_output() {
        let options = QrOptions {
            dark_color: "#112233".to_string(),
            ..Default::default()
        };
        let out = encode_qr("svg please", &options, OutputFormat::Svg).unwrap();
        let svg = std::str::from_utf8(&out.bytes).unwrap();
        assert!(svg.contains("#112233"));
        assert!(out.to_data_url().starts_with("data:image/svg+xml;base64,"));
    }

    #[test]
    fn test_bad_color_rejected() {
        let options = QrOptions {
            light_color: "white".to_string(),
            ..Default::default()
        };
        assert!(encode_qr("x", &options, OutputFormat::Png).is_err());
    }
}
