//! TeX-to-SVG conversion engines.
//!
//! The render pipeline only needs [`TexEngine::tex2svg`]. [`CommandEngine`]
//! drives an external MathJax command; tests supply their own engines.

mod command;

pub use command::CommandEngine;

use thiserror::Error;

use crate::render::ErrorDisplayMode;

/// Per-equation conversion options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ConversionOptions {
    /// Typeset in display style rather than inline.
    pub display: bool,
}

/// Options of the TeX input processor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TexInputOptions {
    /// Whether `\$` inside equations is treated as an escaped dollar.
    pub process_escapes: bool,
    /// Whether errors are drawn into the SVG or reported.
    pub error_mode: ErrorDisplayMode,
}

impl Default for TexInputOptions {
    fn default() -> Self {
        Self {
            process_escapes: true,
            error_mode: ErrorDisplayMode::default(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConversionError {
    /// The engine rejected the TeX. Not fatal: the diagnostic is kept with
    /// the artifact.
    #[error("conversion failed: {message}")]
    Conversion {
        message: String,
        partial_svg: Option<String>,
    },
    #[error("tex engine unavailable: {0}")]
    Unavailable(String),
    #[error("tex engine i/o error: {0}")]
    Io(#[from] std::io::Error),
}

/// A TeX-to-SVG converter.
///
/// Calls are synchronous and may block; the async pipeline runs them on a
/// blocking pool.
pub trait TexEngine: Send + Sync {
    /// Convert one equation body to SVG text.
    ///
    /// # Errors
    ///
    /// [`ConversionError::Conversion`] for TeX the engine rejects; other
    /// variants when the engine itself cannot run.
    fn tex2svg(
        &self,
        tex: &str,
        conversion: &ConversionOptions,
        input: &TexInputOptions,
    ) -> Result<String, ConversionError>;
}
