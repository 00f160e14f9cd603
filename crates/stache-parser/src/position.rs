//! On-demand line/column computation.
//!
//! Nodes store byte spans only; human-facing positions are derived from
//! the source when a diagnostic or tool needs them. Lines are 1-based,
//! columns are 0-based byte offsets within the line.

use stache_lexer::Span;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Position {
    pub line: usize,
    pub column: usize,
}

/// The position of a byte offset. Offsets past the end clamp to the end
/// of the source.
pub fn position_at(source: &str, offset: usize) -> Position {
    let offset = offset.min(source.len());
    let mut line = 1;
    let mut line_start = 0;
    for (i, b) in source.as_bytes().iter().enumerate() {
        if i >= offset {
            break;
        }
        if *b == b'\n' {
            line += 1;
            line_start = i + 1;
        }
    }
    Position {
        line,
        column: offset - line_start,
    }
}

/// Start and end positions of a span. `None` for missing spans.
pub fn span_positions(source: &str, span: Span) -> Option<(Position, Position)> {
    if span.is_missing() {
        return None;
    }
    Some((position_at(source, span.start), position_at(source, span.end)))
}
