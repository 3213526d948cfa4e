//! Core document types.

use std::sync::Arc;

use crate::image::Bitmap;
use crate::render::ErrorDisplayMode;
use crate::svg::Artifact;

/// How a span's text is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SpanKind {
    /// Plain text, passed through verbatim.
    Literal,
    /// An equation rendered within a line of text.
    InlineEquation,
    /// A display equation.
    BlockEquation,
}

impl SpanKind {
    /// Returns true for both equation kinds.
    pub const fn is_equation(self) -> bool {
        matches!(self, Self::InlineEquation | Self::BlockEquation)
    }

    /// Returns true if the equation is typeset in inline (text) style.
    pub const fn is_inline(self) -> bool {
        matches!(self, Self::InlineEquation)
    }
}

/// The smallest segmented unit of input: literal text or one equation.
#[derive(Debug, Clone, PartialEq)]
pub struct Span {
    /// Equation body, or display text for literals
    text: String,
    /// Exact input slice this span came from, delimiters included
    original: String,
    kind: SpanKind,
    artifact: Option<Arc<Artifact>>,
    bitmap: Option<Bitmap>,
}

/// What a span should show once rendering has been attempted.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SpanDisplay<'a> {
    Text(&'a str),
    Image(&'a Bitmap),
    Empty,
}

impl Span {
    pub fn new(kind: SpanKind, text: impl Into<String>, original: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            original: original.into(),
            kind,
            artifact: None,
            bitmap: None,
        }
    }

    /// A literal span whose display text equals its source.
    pub fn literal(text: impl Into<String>) -> Self {
        let text = text.into();
        Self::new(SpanKind::Literal, text.clone(), text)
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn original(&self) -> &str {
        &self.original
    }

    pub const fn kind(&self) -> SpanKind {
        self.kind
    }

    pub const fn is_equation(&self) -> bool {
        self.kind.is_equation()
    }

    pub fn artifact(&self) -> Option<&Arc<Artifact>> {
        self.artifact.as_ref()
    }

    pub const fn bitmap(&self) -> Option<&Bitmap> {
        self.bitmap.as_ref()
    }

    /// Build the rendered replacement for this span.
    ///
    /// The receiver is left untouched, so bitmaps already handed out from a
    /// previous render stay valid.
    pub fn with_render(&self, artifact: Arc<Artifact>, bitmap: Option<Bitmap>) -> Self {
        Self {
            text: self.text.clone(),
            original: self.original.clone(),
            kind: self.kind,
            artifact: Some(artifact),
            bitmap,
        }
    }

    pub(crate) fn push_literal(&mut self, text: &str, original: &str) {
        self.text.push_str(text);
        self.original.push_str(original);
    }

    /// Resolve what to show for this span under the given error mode.
    ///
    /// Unrendered equations show their source. Conversion failures show the
    /// rendered error image, the original source, or the diagnostic text.
    pub fn display(&self, mode: ErrorDisplayMode) -> SpanDisplay<'_> {
        let Some(artifact) = &self.artifact else {
            return if self.is_equation() {
                SpanDisplay::Text(&self.original)
            } else {
                SpanDisplay::Text(&self.text)
            };
        };
        match (artifact.error_text(), mode) {
            (Some(error), ErrorDisplayMode::ShowErrorText) => SpanDisplay::Text(error),
            (Some(_), ErrorDisplayMode::ShowOriginal) => SpanDisplay::Text(&self.original),
            _ => self.bitmap.as_ref().map_or(SpanDisplay::Empty, SpanDisplay::Image),
        }
    }

    /// Vertical offset (in the same unit as `font_metric`) that aligns the
    /// rendered equation with the surrounding text baseline.
    pub fn baseline_offset(&self, font_metric: f32) -> f32 {
        self.artifact
            .as_ref()
            .map_or(0.0, |artifact| artifact.geometry().vertical_align_ex * font_metric)
    }
}

/// A renderable grouping of spans: one line of text or one equation.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Block {
    spans: Vec<Span>,
}

impl Block {
    pub const fn new(spans: Vec<Span>) -> Self {
        Self { spans }
    }

    pub fn spans(&self) -> &[Span] {
        &self.spans
    }

    pub fn into_spans(self) -> Vec<Span> {
        self.spans
    }

    pub fn has_equations(&self) -> bool {
        self.spans.iter().any(Span::is_equation)
    }

    /// The single equation of an equation block.
    pub fn equation(&self) -> Option<&Span> {
        let mut equations = self.spans.iter().filter(|span| span.is_equation());
        let first = equations.next()?;
        if equations.next().is_some() {
            return None;
        }
        let rest_is_blank = self
            .spans
            .iter()
            .filter(|span| !span.is_equation())
            .all(|span| span.text.trim().is_empty());
        rest_is_blank.then_some(first)
    }

    /// True iff the block holds exactly one equation and nothing else
    /// meaningful.
    pub fn is_equation_block(&self) -> bool {
        self.equation().is_some()
    }
}

/// Rebuild source text from blocks by concatenating every span's original.
pub fn to_source(blocks: &[Block]) -> String {
    blocks
        .iter()
        .flat_map(Block::spans)
        .map(Span::original)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::svg::Artifact;

    #[test]
    fn test_equation_block_allows_blank_literals() {
        let block = Block::new(vec![
            Span::literal("  "),
            Span::new(SpanKind::BlockEquation, "x", "$$x$$"),
        ]);
        assert!(block.is_equation_block());
        assert_eq!(block.equation().map(Span::text), Some("x"));
    }

    #[test]
    fn test_equation_block_rejects_text() {
        let block = Block::new(vec![
            Span::literal("see "),
            Span::new(SpanKind::InlineEquation, "x", "$x$"),
        ]);
        assert!(!block.is_equation_block());
        assert!(block.has_equations());
    }

    #[test]
    fn test_display_unrendered_equation_shows_source() {
        let span = Span::new(SpanKind::InlineEquation, "x^2", r"\(x^2\)");
        assert_eq!(
            span.display(ErrorDisplayMode::ShowRendered),
            SpanDisplay::Text(r"\(x^2\)")
        );
    }

    #[test]
    fn test_display_error_modes() {
        let span = Span::new(SpanKind::InlineEquation, r"\bad", r"$\bad$");
        let artifact = Arc::new(Artifact::new(String::new(), Some("Undefined control sequence".into())));
        let rendered = span.with_render(artifact, None);

        assert_eq!(
            rendered.display(ErrorDisplayMode::ShowErrorText),
            SpanDisplay::Text("Undefined control sequence")
        );
        assert_eq!(
            rendered.display(ErrorDisplayMode::ShowOriginal),
            SpanDisplay::Text(r"$\bad$")
        );
        assert_eq!(rendered.display(ErrorDisplayMode::ShowRendered), SpanDisplay::Empty);
        assert!(span.artifact().is_none(), "source span must stay untouched");
    }

    #[test]
    fn test_to_source_concatenates_originals() {
        let blocks = vec![
            Block::new(vec![Span::literal("a ")]),
            Block::new(vec![Span::new(SpanKind::InlineEquation, "b", "$b$")]),
        ];
        assert_eq!(to_source(&blocks), "a $b$");
    }
}
