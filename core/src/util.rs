//! Source-span plumbing shared by every stage of the pipeline: the lexer
//! stamps spans on tokens, the builder stamps them on AST nodes, and
//! `error.rs` uses them to render excerpts of the offending source.

use nom_locate::LocatedSpan;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Formatter};

/// The span type handed around by `nom`/`nom_locate` while lexing. Carries
/// line/column bookkeeping automatically as the input is consumed.
pub type RawSpan<'a> = LocatedSpan<&'a str>;

/// A detached, `Copy`-able source span. Unlike [RawSpan] this doesn't borrow
/// the source, so it can be stashed on AST nodes and diagnostics without
/// fighting the borrow checker.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    pub offset: usize,
    pub length: usize,
    pub start_line: u32,
    pub start_col: usize,
    pub end_line: u32,
    pub end_col: usize,
}

impl Span {
    /// The zero-length span used for synthesized nodes that don't correspond
    /// to any real source text (e.g. desugared `print` loops).
    pub fn synthetic() -> Self {
        Self {
            offset: 0,
            length: 0,
            start_line: 0,
            start_col: 0,
            end_line: 0,
            end_col: 0,
        }
    }

    /// Build a [Span] from the piece of input a `nom` combinator consumed,
    /// given the position it started at and the position it ended at.
    pub fn from_raw_spans(start: &RawSpan, end: &RawSpan) -> Self {
        let start_pos = start.location_offset();
        let end_pos = end.location_offset();
        Self {
            offset: start_pos,
            length: end_pos.saturating_sub(start_pos),
            start_line: start.location_line(),
            start_col: start.get_utf8_column(),
            end_line: end.location_line(),
            end_col: end.get_utf8_column(),
        }
    }

    /// Build a [Span] that covers exactly one raw span (used for leaf
    /// tokens).
    pub fn from_raw_span(span: &RawSpan) -> Self {
        Self::from_raw_spans(span, span)
    }

    /// Merge two spans into one that covers both (and anything between
    /// them). Used when a constructor's resulting node spans from its first
    /// child to its last.
    pub fn merge(&self, other: &Span) -> Self {
        let (start, end) = if self.offset <= other.offset {
            (self, other)
        } else {
            (other, self)
        };
        Self {
            offset: start.offset,
            length: (end.offset + end.length).saturating_sub(start.offset),
            start_line: start.start_line,
            start_col: start.start_col,
            end_line: end.end_line,
            end_col: end.end_col,
        }
    }

    /// Slice the excerpt of `src` that this span covers.
    pub fn get_source_slice<'a>(&self, src: &'a str) -> &'a str {
        let end = (self.offset + self.length).min(src.len());
        let start = self.offset.min(end);
        &src[start..end]
    }
}

/// Write a `^^^^`-style underline beneath the source line(s) a span covers.
pub fn fmt_src_highlights(
    f: &mut Formatter<'_>,
    span: &Span,
    src: &str,
) -> fmt::Result {
    let lines: Vec<&str> = src.lines().collect();
    let line_idx = (span.start_line as usize).saturating_sub(1);
    if let Some(line) = lines.get(line_idx) {
        writeln!(f)?;
        writeln!(f, "{}", line)?;
        let col = span.start_col.saturating_sub(1);
        let underline_len = if span.start_line == span.end_line {
            (span.end_col.saturating_sub(span.start_col)).max(1)
        } else {
            line.len().saturating_sub(col).max(1)
        };
        writeln!(f, "{}{}", " ".repeat(col), "^".repeat(underline_len))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_slice() {
        let span = Span {
            offset: 4,
            length: 3,
            start_line: 1,
            start_col: 5,
            end_line: 1,
            end_col: 8,
        };
        assert_eq!(span.get_source_slice("int foo;"), "foo");
    }

    #[test]
    fn test_merge() {
        let a = Span { offset: 0, length: 3, start_line: 1, start_col: 1, end_line: 1, end_col: 4 };
        let b = Span { offset: 10, length: 2, start_line: 1, start_col: 11, end_line: 1, end_col: 13 };
        let merged = a.merge(&b);
        assert_eq!(merged.offset, 0);
        assert_eq!(merged.length, 12);
    }
}
