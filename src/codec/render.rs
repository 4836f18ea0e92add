//! Module grids and their PNG/SVG renderings.

use std::fmt::Write as _;
use std::str::FromStr;

use image::{Rgba, RgbaImage, imageops};
use serde::{Deserialize, Serialize};

use crate::camera::Size;
use crate::error::{ToolkitError, ToolkitResult};

/// Points per millimetre at the 72 dpi base resolution used for bar heights.
pub const POINTS_PER_MM: f32 = 72.0 / 25.4;

/// Row-major grid of symbol modules; `true` is dark.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleGrid {
    width: usize,
    height: usize,
    modules: Vec<bool>,
}

impl ModuleGrid {
    pub fn new(width: usize, height: usize, modules: Vec<bool>) -> Option<Self> {
        (width * height == modules.len()).then_some(Self {
            width,
            height,
            modules,
        })
    }

    pub fn from_fn(width: usize, height: usize, f: impl Fn(usize, usize) -> bool) -> Self {
        let mut modules = Vec::with_capacity(width * height);
        for y in 0..height {
            for x in 0..width {
                modules.push(f(x, y));
            }
        }
        Self {
            width,
            height,
            modules,
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn get(&self, x: usize, y: usize) -> bool {
        x < self.width && y < self.height && self.modules[y * self.width + x]
    }

    pub fn is_blank(&self) -> bool {
        !self.modules.iter().any(|m| *m)
    }

    /// Smallest sub-grid holding every dark module. Strips encoder quiet zones.
    pub fn trimmed(&self) -> Self {
        let (mut x0, mut y0, mut x1, mut y1) = (usize::MAX, usize::MAX, 0, 0);
        for y in 0..self.height {
            for x in 0..self.width {
                if self.get(x, y) {
                    x0 = x0.min(x);
                    y0 = y0.min(y);
                    x1 = x1.max(x);
                    y1 = y1.max(y);
                }
            }
        }
        if x0 == usize::MAX {
            return self.clone();
        }
        Self::from_fn(x1 - x0 + 1, y1 - y0 + 1, |x, y| self.get(x + x0, y + y0))
    }

    /// Runs of dark modules per row as `(y, x_start, length)`.
    fn dark_runs(&self) -> Vec<(usize, usize, usize)> {
        let mut runs = Vec::new();
        for y in 0..self.height {
            let mut x = 0;
            while x < self.width {
                if self.get(x, y) {
                    let start = x;
                    while x < self.width && self.get(x, y) {
                        x += 1;
                    }
                    runs.push((y, start, x - start));
                } else {
                    x += 1;
                }
            }
        }
        runs
    }
}

/// An opaque RGB color parsed from `RRGGBB` or `#RRGGBB`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const BLACK: Color = Color { r: 0, g: 0, b: 0 };
    pub const WHITE: Color = Color {
        r: 255,
        g: 255,
        b: 255,
    };

    pub fn parse(field: &str, value: &str) -> ToolkitResult<Self> {
        value.parse().map_err(|_| {
            ToolkitError::invalid_options(
                field,
                format!("Invalid color \"{}\". Use a 6-digit hex value like 000000.", value),
            )
        })
    }

    pub fn to_rgba(self) -> Rgba<u8> {
        Rgba([self.r, self.g, self.b, 255])
    }

    pub fn to_hex(self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

impl FromStr for Color {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let hex = s.trim().trim_start_matches('#');
        if hex.len() != 6 || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(());
        }
        let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).map_err(|_| ());
        Ok(Color {
            r: channel(0)?,
            g: channel(2)?,
            b: channel(4)?,
        })
    }
}

/// Symbol rotation: normal, right (90° clockwise), inverted, left.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Rotation {
    #[default]
    N,
    R,
    I,
    L,
}

impl FromStr for Rotation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "N" | "0" => Ok(Rotation::N),
            "R" | "90" => Ok(Rotation::R),
            "I" | "180" => Ok(Rotation::I),
            "L" | "270" | "-90" => Ok(Rotation::L),
            other => Err(format!("Invalid rotation: {}. Use: N, R, I, L", other)),
        }
    }
}

/// Pixel geometry of a rendered grid.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Layout {
    pub cell_w: f64,
    pub cell_h: f64,
    /// Space around the symbol on every side.
    pub padding: f64,
}

impl Layout {
    pub fn content_size(&self, grid: &ModuleGrid) -> (f64, f64) {
        (
            grid.width() as f64 * self.cell_w + 2.0 * self.padding,
            grid.height() as f64 * self.cell_h + 2.0 * self.padding,
        )
    }
}

/// Human-readable line under a barcode (SVG only).
#[derive(Debug, Clone, PartialEq)]
pub struct Caption {
    pub text: String,
    pub size: f64,
}

/// Draw whole-pixel cells with padding on every side.
pub fn rasterize(
    grid: &ModuleGrid,
    cell_w: u32,
    cell_h: u32,
    padding: u32,
    dark: Color,
    light: Color,
) -> RgbaImage {
    let w = grid.width() as u32 * cell_w + 2 * padding;
    let h = grid.height() as u32 * cell_h + 2 * padding;
    let mut img = RgbaImage::from_pixel(w.max(1), h.max(1), light.to_rgba());
    let dark = dark.to_rgba();
    for (y, x, len) in grid.dark_runs() {
        let px0 = padding + x as u32 * cell_w;
        let py0 = padding + y as u32 * cell_h;
        for py in py0..py0 + cell_h {
            for px in px0..px0 + len as u32 * cell_w {
                img.put_pixel(px, py, dark);
            }
        }
    }
    img
}

/// Draw a square grid at exactly `width` pixels, with `margin` light modules
/// around it. Modules are sampled nearest-neighbour, so cell edges may differ
/// by one pixel. Falls back to 4 px per module when `width` is too small to
/// hold the symbol.
pub fn rasterize_to_width(
    grid: &ModuleGrid,
    margin: usize,
    width: u32,
    dark: Color,
    light: Color,
) -> RgbaImage {
    let symbol = grid.width() + 2 * margin;
    let (scale, size) = if width as usize >= symbol {
        (width as f64 / symbol as f64, width)
    } else {
        (4.0, symbol as u32 * 4)
    };
    let scaled_margin = margin as f64 * scale;
    let (dark, light) = (dark.to_rgba(), light.to_rgba());

    RgbaImage::from_fn(size, size, |px, py| {
        let (fx, fy) = (px as f64, py as f64);
        let inside = fx >= scaled_margin
            && fy >= scaled_margin
            && fx < size as f64 - scaled_margin
            && fy < size as f64 - scaled_margin;
        if !inside {
            return light;
        }
        let mx = ((fx - scaled_margin) / scale).floor() as usize;
        let my = ((fy - scaled_margin) / scale).floor() as usize;
        if grid.get(mx, my) { dark } else { light }
    })
}

pub fn rotate_raster(img: RgbaImage, rotation: Rotation) -> RgbaImage {
    match rotation {
        Rotation::N => img,
        Rotation::R => imageops::rotate90(&img),
        Rotation::I => imageops::rotate180(&img),
        Rotation::L => imageops::rotate270(&img),
    }
}

/// SVG document for `grid`. Returns the markup and its pixel size.
pub fn to_svg(
    grid: &ModuleGrid,
    layout: Layout,
    dark: Color,
    light: Color,
    caption: Option<&Caption>,
    rotation: Rotation,
) -> (String, Size) {
    let (content_w, bars_h) = layout.content_size(grid);
    let caption_h = caption.map(|c| c.size * 1.4).unwrap_or(0.0);
    let content_h = bars_h + caption_h;

    let (out_w, out_h) = match rotation {
        Rotation::N | Rotation::I => (content_w, content_h),
        Rotation::R | Rotation::L => (content_h, content_w),
    };
    let transform = match rotation {
        Rotation::N => None,
        Rotation::R => Some(format!("translate({} 0) rotate(90)", fmt_num(content_h))),
        Rotation::I => Some(format!(
            "translate({} {}) rotate(180)",
            fmt_num(content_w),
            fmt_num(content_h)
        )),
        Rotation::L => Some(format!("translate(0 {}) rotate(270)", fmt_num(content_w))),
    };

    let mut path = String::new();
    for (y, x, len) in grid.dark_runs() {
        let _ = write!(
            path,
            "M{} {}h{}v{}h-{}z",
            fmt_num(layout.padding + x as f64 * layout.cell_w),
            fmt_num(layout.padding + y as f64 * layout.cell_h),
            fmt_num(len as f64 * layout.cell_w),
            fmt_num(layout.cell_h),
            fmt_num(len as f64 * layout.cell_w),
        );
    }

    let mut svg = String::new();
    let _ = write!(
        svg,
        "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"{w}\" height=\"{h}\" viewBox=\"0 0 {w} {h}\">",
        w = fmt_num(out_w),
        h = fmt_num(out_h)
    );
    let _ = write!(
        svg,
        "<rect width=\"100%\" height=\"100%\" fill=\"{}\"/>",
        light.to_hex()
    );
    if let Some(t) = &transform {
        let _ = write!(svg, "<g transform=\"{}\">", t);
    }
    let _ = write!(svg, "<path fill=\"{}\" d=\"{}\"/>", dark.to_hex(), path);
    if let Some(caption) = caption {
        let _ = write!(
            svg,
            "<text x=\"{}\" y=\"{}\" font-family=\"Helvetica, Arial, sans-serif\" font-size=\"{}\" text-anchor=\"middle\" fill=\"{}\">{}</text>",
            fmt_num(content_w / 2.0),
            fmt_num(bars_h + caption.size),
            fmt_num(caption.size),
            dark.to_hex(),
            xml_escape(&caption.text)
        );
    }
    if transform.is_some() {
        svg.push_str("</g>");
    }
    svg.push_str("</svg>");

    (
        svg,
        Size::new(out_w.round() as u32, out_h.round() as u32),
    )
}

fn fmt_num(v: f64) -> String {
    let rounded = (v * 1000.0).round() / 1000.0;
    if rounded.fract() == 0.0 {
        format!("{}", rounded as i64)
    } else {
        format!("{}", rounded)
    }
}

fn xml_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            c => out.push(c),
        }
    }
    out
}
