//! Vector artifacts produced by the TeX engine.
//!
//! An [`Artifact`] is the SVG for one equation plus any conversion
//! diagnostic. Artifacts are stored in the vector cache in their encoded
//! form and decoded on every hit.

use std::hash::{DefaultHasher, Hash, Hasher};
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

static SVG_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<svg\b[^>]*>").expect("svg tag pattern is valid"));
static WIDTH_EX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"\swidth\s*=\s*"(-?[0-9.]+)ex""#).expect("width pattern is valid")
});
static HEIGHT_EX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"\sheight\s*=\s*"(-?[0-9.]+)ex""#).expect("height pattern is valid")
});
static VERTICAL_ALIGN_EX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"vertical-align\s*:\s*(-?[0-9.]+)ex").expect("vertical-align pattern is valid")
});

#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("artifact encoding failed: {0}")]
    Encoding(#[from] serde_json::Error),
}

/// Size and baseline of an equation SVG, in `ex` units of the render font.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SvgGeometry {
    pub width_ex: f32,
    pub height_ex: f32,
    /// Negative values sit below the baseline.
    pub vertical_align_ex: f32,
}

impl SvgGeometry {
    /// Read geometry from the root `<svg>` element. Missing attributes are
    /// zero.
    pub fn parse(svg: &str) -> Self {
        let Some(tag) = SVG_TAG.find(svg) else {
            return Self::default();
        };
        let tag = tag.as_str();
        let capture = |re: &Regex| {
            re.captures(tag)
                .and_then(|c| c.get(1))
                .and_then(|m| m.as_str().parse::<f32>().ok())
                .filter(|v| v.is_finite())
                .unwrap_or(0.0)
        };
        Self {
            width_ex: capture(&WIDTH_EX),
            height_ex: capture(&HEIGHT_EX),
            vertical_align_ex: capture(&VERTICAL_ALIGN_EX),
        }
    }

    /// Pixel dimensions for one `ex` of `px_per_ex` pixels.
    ///
    /// Returns `None` when the geometry has no area.
    pub fn pixel_size(&self, px_per_ex: f32) -> Option<(u32, u32)> {
        if self.width_ex <= 0.0 || self.height_ex <= 0.0 || px_per_ex <= 0.0 {
            return None;
        }
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let width = (self.width_ex * px_per_ex).ceil().max(1.0) as u32;
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let height = (self.height_ex * px_per_ex).ceil().max(1.0) as u32;
        Some((width, height))
    }
}

/// Stable identity of an artifact's vector bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ArtifactId {
    digest: u64,
    len: usize,
}

impl ArtifactId {
    pub fn of(bytes: &[u8]) -> Self {
        let mut hasher = DefaultHasher::new();
        bytes.hash(&mut hasher);
        Self {
            digest: hasher.finish(),
            len: bytes.len(),
        }
    }
}

/// The vector result of converting one equation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Artifact {
    svg: String,
    geometry: SvgGeometry,
    error_text: Option<String>,
}

impl Artifact {
    pub fn new(svg: String, error_text: Option<String>) -> Self {
        let geometry = SvgGeometry::parse(&svg);
        Self {
            svg,
            geometry,
            error_text,
        }
    }

    pub fn svg(&self) -> &str {
        &self.svg
    }

    pub fn vector_bytes(&self) -> &[u8] {
        self.svg.as_bytes()
    }

    pub const fn geometry(&self) -> &SvgGeometry {
        &self.geometry
    }

    pub fn error_text(&self) -> Option<&str> {
        self.error_text.as_deref()
    }

    /// True when the engine produced no drawable SVG.
    pub fn is_empty(&self) -> bool {
        self.svg.trim().is_empty()
    }

    pub fn id(&self) -> ArtifactId {
        ArtifactId::of(self.vector_bytes())
    }

    /// Encode for the vector cache.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn encode(&self) -> Result<Vec<u8>, ArtifactError> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Decode bytes previously produced by [`Artifact::encode`].
    ///
    /// # Errors
    ///
    /// Returns an error if the bytes are not a valid encoded artifact.
    pub fn decode(bytes: &[u8]) -> Result<Self, ArtifactError> {
        Ok(serde_json::from_slice(bytes)?)
    }
}
