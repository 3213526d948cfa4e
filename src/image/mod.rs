//! Bitmap materialization.
//!
//! Turns equation SVG into raster images:
//! - Sizing from the SVG's `ex` geometry and the font metric
//! - Color-scheme-aware recoloring of `currentColor` glyphs
//! - Rasterization through resvg (see [`ResvgMaterializer`])

mod raster;

pub use raster::ResvgMaterializer;

use std::borrow::Cow;
use std::sync::Arc;

use image::RgbaImage;
use thiserror::Error;

/// Base glyph color on dark backgrounds.
const DARK_BASE_COLOR: &str = "#e5e7eb";
/// Base glyph color on light backgrounds.
const LIGHT_BASE_COLOR: &str = "#3d4d6a";

/// Background the bitmap will be shown on.
#[derive(clap::ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ColorScheme {
    #[default]
    Light,
    Dark,
}

impl ColorScheme {
    pub const fn base_color(self) -> &'static str {
        match self {
            Self::Light => LIGHT_BASE_COLOR,
            Self::Dark => DARK_BASE_COLOR,
        }
    }
}

#[derive(Debug, Error)]
pub enum MaterializeError {
    #[error("svg has no drawable area")]
    EmptyGeometry,
    #[error("invalid svg: {0}")]
    InvalidSvg(String),
    #[error("failed to create pixmap {width}x{height}")]
    Pixmap { width: u32, height: u32 },
}

/// An immutable, cheaply cloned raster image.
///
/// Two bitmaps compare equal when their pixels do.
#[derive(Debug, Clone)]
pub struct Bitmap {
    image: Arc<RgbaImage>,
}

impl Bitmap {
    pub fn new(image: RgbaImage) -> Self {
        Self {
            image: Arc::new(image),
        }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn as_image(&self) -> &RgbaImage {
        &self.image
    }

    /// Bytes of pixel data held.
    pub fn byte_len(&self) -> usize {
        self.image.as_raw().len()
    }

    /// True if both handles point at the same pixel buffer.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.image, &other.image)
    }
}

impl PartialEq for Bitmap {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other) || *self.image == *other.image
    }
}

/// Rasterizes SVG bytes at a target pixel size.
pub trait BitmapMaterializer: Send + Sync {
    /// # Errors
    ///
    /// Returns an error if the SVG cannot be parsed or rasterized.
    fn materialize(
        &self,
        svg: &[u8],
        width: u32,
        height: u32,
        scheme: ColorScheme,
    ) -> Result<Bitmap, MaterializeError>;
}

/// Make `currentColor` glyphs use the scheme's base color.
///
/// MathJax draws glyphs with `currentColor`, so a style rule on the root
/// element recolors the whole equation without touching path data.
pub fn inject_base_color(svg: &str, scheme: ColorScheme) -> Cow<'_, str> {
    let Some(pos) = svg.rfind("</svg>") else {
        return Cow::Borrowed(svg);
    };
    let style = format!(
        "<style>svg {{ color: {color}; }} text {{ fill: currentColor; }}</style>",
        color = scheme.base_color()
    );
    let mut out = String::with_capacity(svg.len() + style.len());
    out.push_str(&svg[..pos]);
    out.push_str(&style);
    out.push_str(&svg[pos..]);
    Cow::Owned(out)
}
