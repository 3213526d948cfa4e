// Only allow lints that are either transitive-dependency noise or
// genuinely opinionated style choices that don't indicate real issues.
#![allow(
    // Transitive dependency version mismatches we can't control
    clippy::multiple_crate_versions,
    // module_name_repetitions is pure style preference (e.g. cache::CacheLimits)
    clippy::module_name_repetitions
)]

//! # texsnap
//!
//! Segment mixed prose/LaTeX text and render its equations to bitmaps.
//!
//! - Delimiter-aware segmentation into literal and equation spans
//! - TeX to SVG through a pluggable engine (MathJax `tex2svg` by default)
//! - A bounded two-tier cache: engine output by TeX signature, bitmaps by
//!   presentation
//! - Blocking and async render entry points with per-block failure
//!   containment
//! - A per-consumer render session that never renders the same source twice
//!   at once
//!
//! ## Modules
//!
//! - [`document`]: Spans, blocks and segmentation
//! - [`engine`]: TeX to SVG conversion
//! - [`svg`]: Conversion artifacts and SVG geometry
//! - [`image`]: Bitmap materialization
//! - [`cache`]: The artifact cache
//! - [`render`]: Pipeline, options and sessions
//! - [`config`]: Command-line defaults and rc files

pub mod cache;
pub mod config;
pub mod document;
pub mod engine;
pub mod image;
pub mod perf;
pub mod render;
pub mod svg;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::document::{Block, ParsingMode, Span, SpanKind, segment};
    pub use crate::render::{RenderOptions, RenderSession, Renderer};
}
