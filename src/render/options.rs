//! Per-call render configuration.

use crate::document::ParsingMode;
use crate::engine::TexInputOptions;
use crate::image::ColorScheme;

use super::RenderError;

/// What to show for an equation the engine could not convert.
#[derive(clap::ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ErrorDisplayMode {
    /// Show the engine's rendering, which usually draws the error.
    #[default]
    #[value(name = "rendered")]
    ShowRendered,
    /// Show the original TeX source.
    #[value(name = "original")]
    ShowOriginal,
    /// Show the engine's diagnostic text.
    #[value(name = "error")]
    ShowErrorText,
}

/// Everything that affects how input is parsed, converted and rasterized.
///
/// Passed explicitly to every pipeline call.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderOptions {
    pub parsing_mode: ParsingMode,
    /// Decode HTML entities before segmenting.
    pub unencode_html: bool,
    pub process_escapes: bool,
    pub error_mode: ErrorDisplayMode,
    /// Pixels per `ex` of the surrounding font (its x-height).
    pub font_metric: f32,
    /// User scaling applied on top of the font metric.
    pub scale_factor: f32,
    /// Device pixels per logical pixel.
    pub display_scale: f32,
    pub color_scheme: ColorScheme,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            parsing_mode: ParsingMode::default(),
            unencode_html: false,
            process_escapes: true,
            error_mode: ErrorDisplayMode::default(),
            font_metric: 8.0,
            scale_factor: 1.0,
            display_scale: 1.0,
            color_scheme: ColorScheme::default(),
        }
    }
}

impl RenderOptions {
    /// # Errors
    ///
    /// Returns [`RenderError::InvalidOptions`] if a metric or scale is not a
    /// finite positive number.
    pub fn validate(&self) -> Result<(), RenderError> {
        for (name, value) in [
            ("font_metric", self.font_metric),
            ("scale_factor", self.scale_factor),
            ("display_scale", self.display_scale),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(RenderError::InvalidOptions(format!(
                    "{name} must be finite and positive, got {value}"
                )));
            }
        }
        Ok(())
    }

    pub const fn tex_input_options(&self) -> TexInputOptions {
        TexInputOptions {
            process_escapes: self.process_escapes,
            error_mode: self.error_mode,
        }
    }

    /// Device pixels per `ex`.
    pub fn pixels_per_ex(&self) -> f32 {
        self.font_metric * self.scale_factor * self.display_scale
    }
}
