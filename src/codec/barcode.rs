//! # Barcode Generation
//!
//! Linear and 2D barcodes through the `rxing` writers, rendered with
//! [`super::render`].
//!
//! ## Options
//!
//! | Option | Meaning | Range |
//! |--------|---------|-------|
//! | `scale` | Pixels per module | 1-20 |
//! | `height` | Bar height in millimetres (linear codes only) | 1-100 |
//! | `padding` | Quiet space around the symbol, in modules | 0-100 |
//! | `include_text` | Caption under linear codes (SVG output) | |
//! | `text_size` | Caption size in points | 5-30 |
//! | `bar_color`, `background_color` | 6-digit hex | |
//! | `rotate` | `N`, `R`, `I`, `L` | |
//!
//! 2D symbologies ignore `height` and always use a padding of one module.

use std::fmt;
use std::str::FromStr;

use bytes::Bytes;
use rxing::{BarcodeFormat, MultiFormatWriter, Writer};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use tracing::debug;

pub use super::render::Rotation;
use super::render::{
    Caption, Color, Layout, ModuleGrid, POINTS_PER_MM, rasterize, rotate_raster, to_svg,
};
use super::{EncodedImage, OutputFormat};
use crate::camera::Size;
use crate::error::{ToolkitError, ToolkitResult};
use crate::imaging::encode_png;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Symbology {
    Code128,
    Ean13,
    Ean8,
    UpcA,
    UpcE,
    /// ISBN-10 or ISBN-13, printed as EAN-13.
    Isbn,
    QrCode,
    Pdf417,
    DataMatrix,
    Aztec,
    /// Interleaved 2 of 5.
    Itf,
    /// 14-digit ITF with GS1 check digit.
    Itf14,
    Code39,
    Code93,
    Codabar,
    Telepen,
}

/// Names the generator lists that no writer in the stack can produce.
const UNSUPPORTED: &[&str] = &["gs1-128", "pharmacode", "postnet", "planet", "industrial2of5"];

impl Symbology {
    pub const ALL: [Symbology; 16] = [
        Symbology::Code128,
        Symbology::Ean13,
        Symbology::Ean8,
        Symbology::UpcA,
        Symbology::UpcE,
        Symbology::Isbn,
        Symbology::QrCode,
        Symbology::Pdf417,
        Symbology::DataMatrix,
        Symbology::Aztec,
        Symbology::Itf,
        Symbology::Itf14,
        Symbology::Code39,
        Symbology::Code93,
        Symbology::Codabar,
        Symbology::Telepen,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Symbology::Code128 => "code128",
            Symbology::Ean13 => "ean13",
            Symbology::Ean8 => "ean8",
            Symbology::UpcA => "upca",
            Symbology::UpcE => "upce",
            Symbology::Isbn => "isbn",
            Symbology::QrCode => "qrcode",
            Symbology::Pdf417 => "pdf417",
            Symbology::DataMatrix => "datamatrix",
            Symbology::Aztec => "azteccode",
            Symbology::Itf => "interleaved2of5",
            Symbology::Itf14 => "itf14",
            Symbology::Code39 => "code39",
            Symbology::Code93 => "code93",
            Symbology::Codabar => "codabar",
            Symbology::Telepen => "telepen",
        }
    }

    pub fn is_2d(self) -> bool {
        matches!(
            self,
            Symbology::QrCode | Symbology::Pdf417 | Symbology::DataMatrix | Symbology::Aztec
        )
    }

    fn writer_format(self) -> BarcodeFormat {
        match self {
            Symbology::Code128 => BarcodeFormat::CODE_128,
            Symbology::Ean13 | Symbology::Isbn => BarcodeFormat::EAN_13,
            Symbology::Ean8 => BarcodeFormat::EAN_8,
            Symbology::UpcA => BarcodeFormat::UPC_A,
            Symbology::UpcE => BarcodeFormat::UPC_E,
            Symbology::QrCode => BarcodeFormat::QR_CODE,
            Symbology::Pdf417 => BarcodeFormat::PDF_417,
            Symbology::DataMatrix => BarcodeFormat::DATA_MATRIX,
            Symbology::Aztec => BarcodeFormat::AZTEC,
            Symbology::Itf | Symbology::Itf14 => BarcodeFormat::ITF,
            Symbology::Code39 => BarcodeFormat::CODE_39,
            Symbology::Code93 => BarcodeFormat::CODE_93,
            Symbology::Codabar => BarcodeFormat::CODABAR,
            Symbology::Telepen => BarcodeFormat::TELEPEN,
        }
    }

    /// Symbology a decoder reported, if it is one this module generates.
    pub fn from_decoded(format: &BarcodeFormat) -> Option<Self> {
        Some(match format {
            BarcodeFormat::CODE_128 => Symbology::Code128,
            BarcodeFormat::EAN_13 => Symbology::Ean13,
            BarcodeFormat::EAN_8 => Symbology::Ean8,
            BarcodeFormat::UPC_A => Symbology::UpcA,
            BarcodeFormat::UPC_E => Symbology::UpcE,
            BarcodeFormat::QR_CODE => Symbology::QrCode,
            BarcodeFormat::PDF_417 => Symbology::Pdf417,
            BarcodeFormat::DATA_MATRIX => Symbology::DataMatrix,
            BarcodeFormat::AZTEC => Symbology::Aztec,
            BarcodeFormat::ITF => Symbology::Itf,
            BarcodeFormat::CODE_39 => Symbology::Code39,
            BarcodeFormat::CODE_93 => Symbology::Code93,
            BarcodeFormat::CODABAR => Symbology::Codabar,
            BarcodeFormat::TELEPEN => Symbology::Telepen,
            _ => return None,
        })
    }
}

impl fmt::Display for Symbology {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Symbology {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        if let Some(sym) = Symbology::ALL.iter().find(|sym| sym.name() == lower) {
            return Ok(*sym);
        }
        match lower.as_str() {
            "itf" => Ok(Symbology::Itf),
            "aztec" => Ok(Symbology::Aztec),
            "qr" => Ok(Symbology::QrCode),
            other if UNSUPPORTED.contains(&other) => {
                Err(format!("Barcode type {} is not supported.", other))
            }
            other => Err(format!("Unknown barcode type: {}", other)),
        }
    }
}

impl Serialize for Symbology {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

impl<'de> Deserialize<'de> for Symbology {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BarcodeOptions {
    pub symbology: Symbology,
    pub scale: u32,
    pub height: f32,
    pub padding: u32,
    pub include_text: bool,
    pub text_size: u32,
    pub bar_color: String,
    pub background_color: String,
    pub rotate: Rotation,
}

impl Default for BarcodeOptions {
    fn default() -> Self {
        Self {
            symbology: Symbology::Code128,
            scale: 3,
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

impl BarcodeOptions {
    /// Range-check every option except the text.
    pub fn check(&self) -> ToolkitResult<()> {
        if !(1..=20).contains(&self.scale) {
            return Err(ToolkitError::invalid_options("scale", "Scale must be between 1 and 20."));
        }
        if !self.symbology.is_2d() && !(1.0..=100.0).contains(&self.height) {
            return Err(ToolkitError::invalid_options(
                "height",
                "Height must be between 1 and 100 millimetres.",
            ));
        }
        if self.padding > 100 {
            return Err(ToolkitError::invalid_options("padding", "Padding must be at most 100."));
        }
        if !(5..=30).contains(&self.text_size) {
            return Err(ToolkitError::invalid_options(
                "text_size",
                "Text size must be between 5 and 30.",
            ));
        }
        Color::parse("bar_color", &self.bar_color)?;
        Color::parse("background_color", &self.background_color)?;
        Ok(())
    }

    fn padding_modules(&self) -> u32 {
        if self.symbology.is_2d() { 1 } else { self.padding }
    }

    fn bar_height_px(&self) -> u32 {
        ((self.height * POINTS_PER_MM * self.scale as f32).round() as u32).max(1)
    }
}

/// Validate and normalise `text` for `symbology`. Returns what the writer encodes.
pub fn prepare_text(symbology: Symbology, text: &str) -> ToolkitResult<String> {
    if text.trim().is_empty() {
        return Err(ToolkitError::invalid_options("text", "Text to encode cannot be empty."));
    }
    let digits = |lengths: &[usize], label: &str| -> ToolkitResult<String> {
        if text.bytes().all(|b| b.is_ascii_digit()) && lengths.contains(&text.len()) {
            Ok(text.to_string())
        } else {
            let lens: Vec<String> = lengths.iter().map(|l| l.to_string()).collect();
            Err(ToolkitError::invalid_options(
                "text",
                format!("{} requires {} digits.", label, lens.join(" or ")),
            ))
        }
    };

    match symbology {
        Symbology::Ean13 => digits(&[12, 13], "EAN-13"),
        Symbology::Ean8 => digits(&[7, 8], "EAN-8"),
        Symbology::UpcA => digits(&[11, 12], "UPC-A"),
        Symbology::UpcE => {
            let t = digits(&[7, 8], "UPC-E")?;
            if t.starts_with('0') || t.starts_with('1') {
                Ok(t)
            } else {
                Err(ToolkitError::invalid_options("text", "UPC-E must start with 0 or 1."))
            }
        }
        Symbology::Isbn => isbn_to_ean(text),
        Symbology::Itf => {
            if text.bytes().all(|b| b.is_ascii_digit()) && text.len() % 2 == 0 {
                Ok(text.to_string())
            } else {
                Err(ToolkitError::invalid_options(
                    "text",
                    "Interleaved 2 of 5 requires an even number of digits.",
                ))
            }
        }
        Symbology::Itf14 => {
            let t = digits(&[13, 14], "ITF-14")?;
            if t.len() == 13 {
                Ok(format!("{}{}", t, gs1_check_digit(&t)))
            } else if gs1_check_digit(&t[..13]) == t.as_bytes()[13] - b'0' {
                Ok(t)
            } else {
                Err(ToolkitError::invalid_options("text", "ITF-14 check digit is wrong."))
            }
        }
        _ => Ok(text.to_string()),
    }
}

/// Modulo-10 check digit with weights 3,1 from the right.
fn gs1_check_digit(digits: &str) -> u8 {
    let sum: u32 = digits
        .bytes()
        .rev()
        .enumerate()
        .map(|(i, b)| (b - b'0') as u32 * if i % 2 == 0 { 3 } else { 1 })
        .sum();
    ((10 - sum % 10) % 10) as u8
}

fn isbn_to_ean(text: &str) -> ToolkitResult<String> {
    let clean: String = text.chars().filter(|c| !matches!(c, '-' | ' ')).collect();
    let invalid = || ToolkitError::invalid_options("text", "ISBN must have 10 or 13 digits.");
    match clean.len() {
        13 if clean.starts_with("978") || clean.starts_with("979") => {
            if clean.bytes().all(|b| b.is_ascii_digit()) {
                Ok(clean)
            } else {
                Err(invalid())
            }
        }
        10 => {
            let (body, check) = clean.split_at(9);
            if body.bytes().all(|b| b.is_ascii_digit())
                && (check == "X" || check == "x" || check.bytes().all(|b| b.is_ascii_digit()))
            {
                // The EAN writer appends its own check digit.
                Ok(format!("978{}", body))
            } else {
                Err(invalid())
            }
        }
        _ => Err(invalid()),
    }
}

/// Module grid for `text` without quiet zone. `text` must already be prepared.
pub fn barcode_modules(symbology: Symbology, text: &str) -> ToolkitResult<ModuleGrid> {
    let matrix = MultiFormatWriter::default()
        .encode(text, &symbology.writer_format(), 0, 0)
        .map_err(|e| {
            ToolkitError::invalid_options(
                "text",
                format!("\"{}\" cannot be encoded as {}: {}", text, symbology, e),
            )
        })?;

    let (w, h) = (matrix.getWidth() as usize, matrix.getHeight() as usize);
    let rows = if symbology.is_2d() { h } else { h.min(1) };
    let grid = ModuleGrid::from_fn(w, rows, |x, y| matrix.get(x as u32, y as u32));
    if grid.is_blank() {
        return Err(ToolkitError::invalid_options(
            "text",
            format!("{} produced an empty symbol.", symbology),
        ));
    }
    Ok(grid.trimmed())
}

/// Encode `text` as a barcode image. CPU-bound.
pub fn encode_barcode(
    text: &str,
    options: &BarcodeOptions,
    format: OutputFormat,
) -> ToolkitResult<EncodedImage> {
    options.check()?;
    let dark = Color::parse("bar_color", &options.bar_color)?;
    let light = Color::parse("background_color", &options.background_color)?;
    let prepared = prepare_text(options.symbology, text)?;
    let grid = barcode_modules(options.symbology, &prepared)?;

    let scale = options.scale;
    let padding = options.padding_modules() * scale;
    let cell_h = if options.symbology.is_2d() {
        scale
    } else {
        options.bar_height_px()
    };
    debug!(
        symbology = %options.symbology,
        modules = grid.width(),
        rows = grid.height(),
        format = %format,
        "Encoding barcode"
    );

    match format {
        OutputFormat::Png => {
            let img = rasterize(&grid, scale, cell_h, padding, dark, light);
            let img = rotate_raster(img, options.rotate);
            let size = Size::new(img.width(), img.height());
            Ok(EncodedImage {
                format,
                bytes: Bytes::from(encode_png(&img)?),
                size,
            })
        }
        OutputFormat::Svg => {
            let layout = Layout {
                cell_w: scale as f64,
                cell_h: cell_h as f64,
                padding: padding as f64,
            };
            let caption = (options.include_text && !options.symbology.is_2d()).then(|| Caption {
                text: text.to_string(),
                size: (options.text_size * scale) as f64 * 0.5,
            });
            let (svg, size) = to_svg(&grid, layout, dark, light, caption.as_ref(), options.rotate);
            Ok(EncodedImage {
                format,
                bytes: Bytes::from(svg),
                size,
            })
        }
    }
}

/// Download name, `{symbology}-{text}.{ext}`.
pub fn barcode_filename(symbology: Symbology, text: &str, format: OutputFormat) -> String {
    let safe: String = text
        .chars()
        .map(|c| if c.is_alphanumeric() || matches!(c, '-' | '_' | '.') { c } else { '_' })
        .take(80)
        .collect();
    format!("{}-{}.{}", symbology, safe, format.extension())
}
