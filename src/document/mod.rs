//! Segmentation of mixed text and TeX.
//!
//! This module handles:
//! - Finding inline and display equation delimiters
//! - Grouping spans into renderable blocks
//! - Optional HTML entity decoding of the raw input

mod parser;
mod types;

use std::borrow::Cow;

pub use parser::{ParsingMode, segment};
pub use types::{Block, Span, SpanDisplay, SpanKind, to_source};

/// Decode HTML entities (`&lt;`, `&amp;`, `&#36;`) when requested.
///
/// Input copied out of HTML often carries `&lt;` for `<` inside equations,
/// which the TeX engine would otherwise render literally.
pub fn prepare_input(input: &str, unencode_html: bool) -> Cow<'_, str> {
    if unencode_html {
        html_escape::decode_html_entities(input)
    } else {
        Cow::Borrowed(input)
    }
}
