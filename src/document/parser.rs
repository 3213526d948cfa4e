//! Delimiter scanning for mixed text and TeX.
//!
//! A single left-to-right pass finds equation delimiters. The first opener
//! that matches wins and equations never nest: an inline delimiter inside a
//! display equation body is part of that body.

use std::borrow::Cow;
use std::ops::Range;

use super::types::{Block, Span, SpanKind};

/// How much of the input is subject to equation detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ParsingMode {
    /// Split on delimiters, keep literal runs exactly as written.
    All,
    /// Split on delimiters and line breaks, unescape escaped delimiters.
    #[default]
    OnlyEquations,
}

struct Delimiter {
    open: &'static str,
    close: &'static str,
    kind: SpanKind,
}

/// Openers are tried in order, so longer ones sharing a prefix come first.
const DELIMITERS: &[Delimiter] = &[
    Delimiter {
        open: r"\begin{equation*}",
        close: r"\end{equation*}",
        kind: SpanKind::BlockEquation,
    },
    Delimiter {
        open: r"\begin{equation}",
        close: r"\end{equation}",
        kind: SpanKind::BlockEquation,
    },
    Delimiter {
        open: "$$",
        close: "$$",
        kind: SpanKind::BlockEquation,
    },
    Delimiter {
        open: r"\[",
        close: r"\]",
        kind: SpanKind::BlockEquation,
    },
    Delimiter {
        open: r"\(",
        close: r"\)",
        kind: SpanKind::InlineEquation,
    },
    Delimiter {
        open: "$",
        close: "$",
        kind: SpanKind::InlineEquation,
    },
];

#[derive(Debug)]
enum Piece {
    Literal(Range<usize>),
    /// Text after an unterminated opener; never split or unescaped.
    Unterminated(Range<usize>),
    Equation {
        kind: SpanKind,
        body: Range<usize>,
        full: Range<usize>,
    },
}

/// Segment input into ordered blocks of literal and equation spans.
///
/// Never fails: an unterminated opener turns the rest of the input into
/// literal text.
///
/// # Example
///
/// ```
/// use texsnap::document::{segment, ParsingMode, SpanKind};
///
/// let blocks = segment(r"Energy: \(E=mc^2\) joules", ParsingMode::OnlyEquations);
/// let kinds: Vec<_> = blocks.iter().flat_map(|b| b.spans()).map(|s| s.kind()).collect();
/// assert_eq!(kinds, [SpanKind::Literal, SpanKind::InlineEquation, SpanKind::Literal]);
/// ```
pub fn segment(input: &str, mode: ParsingMode) -> Vec<Block> {
    let pieces = scan(input);
    assemble(input, &pieces, mode)
}

fn scan(input: &str) -> Vec<Piece> {
    let bytes = input.as_bytes();
    let mut pieces = Vec::new();
    let mut literal_start = 0;
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] == b'\\' && matches!(bytes.get(i + 1), Some(b'\\' | b'$')) {
            // `\\` and `\$` are escapes; `\\(` therefore never opens.
            i += 2;
            continue;
        }

        let Some(delimiter) = DELIMITERS
            .iter()
            .find(|d| bytes[i..].starts_with(d.open.as_bytes()))
        else {
            i += 1;
            continue;
        };

        let body_start = i + delimiter.open.len();
        let Some(body_end) = find_closer(input, body_start, delimiter.close) else {
            if literal_start < i {
                pieces.push(Piece::Literal(literal_start..i));
            }
            pieces.push(Piece::Unterminated(i..input.len()));
            return pieces;
        };

        if literal_start < i {
            pieces.push(Piece::Literal(literal_start..i));
        }
        let end = body_end + delimiter.close.len();
        pieces.push(Piece::Equation {
            kind: delimiter.kind,
            body: body_start..body_end,
            full: i..end,
        });
        i = end;
        literal_start = end;
    }

    if literal_start < input.len() {
        pieces.push(Piece::Literal(literal_start..input.len()));
    }
    pieces
}

/// Byte offset of the first unescaped `close` at or after `from`.
fn find_closer(input: &str, from: usize, close: &str) -> Option<usize> {
    let bytes = input.as_bytes();
    let mut j = from;
    while j < bytes.len() {
        if bytes[j..].starts_with(close.as_bytes()) {
            return Some(j);
        }
        j += if bytes[j] == b'\\' { 2 } else { 1 };
    }
    None
}

fn assemble(input: &str, pieces: &[Piece], mode: ParsingMode) -> Vec<Block> {
    let mut blocks = Vec::new();
    let mut line: Vec<Span> = Vec::new();

    for piece in pieces {
        match piece {
            Piece::Equation { kind, body, full } => {
                flush_line(&mut blocks, &mut line);
                blocks.push(Block::new(vec![Span::new(
                    *kind,
                    &input[body.clone()],
                    &input[full.clone()],
                )]));
            }
            Piece::Unterminated(range) => {
                let text = &input[range.clone()];
                push_literal(&mut line, text, text);
            }
            Piece::Literal(range) => {
                let text = &input[range.clone()];
                match mode {
                    ParsingMode::All => push_literal(&mut line, text, text),
                    ParsingMode::OnlyEquations => {
                        for chunk in text.split_inclusive('\n') {
                            push_literal(&mut line, &unescape_delimiters(chunk), chunk);
                            if chunk.ends_with('\n') {
                                flush_line(&mut blocks, &mut line);
                            }
                        }
                    }
                }
            }
        }
    }

    flush_line(&mut blocks, &mut line);
    blocks
}

fn push_literal(line: &mut Vec<Span>, text: &str, original: &str) {
    match line.last_mut() {
        Some(last) if last.kind() == SpanKind::Literal => last.push_literal(text, original),
        _ => line.push(Span::new(SpanKind::Literal, text, original)),
    }
}

fn flush_line(blocks: &mut Vec<Block>, line: &mut Vec<Span>) {
    if !line.is_empty() {
        blocks.push(Block::new(std::mem::take(line)));
    }
}

/// Drop the escaping backslash from `\$` and from `\\` before a bracket or
/// parenthesis.
fn unescape_delimiters(text: &str) -> Cow<'_, str> {
    if !text.contains('\\') {
        return Cow::Borrowed(text);
    }
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(pos) = rest.find('\\') {
        out.push_str(&rest[..pos]);
        let tail = &rest[pos..];
        if let Some(after) = tail.strip_prefix(r"\$") {
            out.push('$');
            rest = after;
        } else if tail.len() >= 3 && matches!(tail.as_bytes()[2], b'(' | b')' | b'[' | b']')
            && tail.starts_with(r"\\")
        {
            out.push_str(&tail[1..3]);
            rest = &tail[3..];
        } else if let Some(after) = tail.strip_prefix(r"\\") {
            out.push_str(r"\\");
            rest = after;
        } else {
            out.push('\\');
            rest = &tail[1..];
        }
    }
    out.push_str(rest);
    Cow::Owned(out)
}
