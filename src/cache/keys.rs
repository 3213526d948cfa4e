//! Cache keys for both tiers.

use crate::document::{Span, SpanKind};
use crate::engine::{ConversionOptions, TexInputOptions};
use crate::image::ColorScheme;
use crate::render::RenderOptions;
use crate::svg::ArtifactId;

/// Tier-1 key: everything that changes the engine's output bytes.
///
/// The TeX is trimmed, and the trimmed text is also what gets sent to the
/// engine, so equal signatures always describe identical conversions.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConversionSignature {
    tex: String,
    conversion: ConversionOptions,
    input: TexInputOptions,
}

impl ConversionSignature {
    pub fn new(tex: &str, kind: SpanKind, input: TexInputOptions) -> Self {
        Self {
            tex: tex.trim().to_string(),
            conversion: ConversionOptions {
                display: !kind.is_inline(),
            },
            input,
        }
    }

    pub fn for_span(span: &Span, options: &RenderOptions) -> Self {
        Self::new(span.text(), span.kind(), options.tex_input_options())
    }

    /// The TeX handed to the engine.
    pub fn tex(&self) -> &str {
        &self.tex
    }

    pub const fn conversion(&self) -> &ConversionOptions {
        &self.conversion
    }

    pub const fn input(&self) -> &TexInputOptions {
        &self.input
    }
}

/// Tier-2 key: artifact identity plus every parameter that changes pixels.
///
/// Floats are keyed by bit pattern; options are validated to be finite and
/// positive before keys are built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PresentationKey {
    artifact: ArtifactId,
    font_metric: u32,
    scale_factor: u32,
    display_scale: u32,
    color_scheme: ColorScheme,
}

impl PresentationKey {
    pub fn new(artifact: ArtifactId, options: &RenderOptions) -> Self {
        Self {
            artifact,
            font_metric: options.font_metric.to_bits(),
            scale_factor: options.scale_factor.to_bits(),
            display_scale: options.display_scale.to_bits(),
            color_scheme: options.color_scheme,
        }
    }

    pub const fn artifact(&self) -> ArtifactId {
        self.artifact
    }
}
