/// A byte-offset range into the template source.
///
/// Half-open by convention: `[start, end)`. Positions (line/column) are
/// computed on demand from a span; they are never stored on tokens or nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    /// Sentinel for EOF/absent spans (the equivalent of `{-1, -1}`).
    pub const MISSING: Span = Span {
        start: usize::MAX,
        end: usize::MAX,
    };

    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// A zero-width span at `pos`.
    pub fn collapsed(pos: usize) -> Self {
        Self {
            start: pos,
            end: pos,
        }
    }

    /// The union of two spans. A `MISSING` operand yields the other span.
    pub fn to(self, other: Span) -> Span {
        if self.is_missing() {
            return other;
        }
        if other.is_missing() {
            return self;
        }
        Span {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }

    pub fn is_missing(&self) -> bool {
        self.start == usize::MAX && self.end == usize::MAX
    }

    /// Whether `other` nests inside this span. `MISSING` contains nothing
    /// and is contained by nothing.
    pub fn contains(&self, other: Span) -> bool {
        !self.is_missing()
            && !other.is_missing()
            && self.start <= other.start
            && other.end <= self.end
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.is_missing() || self.start == self.end
    }
}

/// Token classification for stache template source.
///
/// Tokens carry no owned text; the lexeme is recovered by slicing the
/// source string with the token's span.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    // Text context
    Content,
    /// `\{{` — renders as a literal `{{`.
    EscapedOpen,
    Newline,

    // Mustache delimiters
    Open,         // {{
    OpenTrusted,  // {{{
    OpenBlock,    // {{#
    OpenEndBlock, // {{/
    Close,        // }}
    CloseTrusted, // }}}

    // Comments (span covers the delimiters)
    Comment,      // {{! ... }}
    BlockComment, // {{!-- ... --}}

    // Mustache interior
    Identifier,
    AtName, // @index, @key
    Number,
    String,
    Dot,
    Equals,
    LParen,
    RParen,
    Pipe,

    // End of input
    Eof,
}

/// A token produced by the stache lexer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

impl Token {
    pub fn new(kind: TokenKind, span: Span) -> Self {
        Self { kind, span }
    }

    /// The raw lexeme, sliced from the source this token was produced from.
    pub fn text<'a>(&self, source: &'a str) -> &'a str {
        if self.span.is_missing() {
            ""
        } else {
            &source[self.span.start..self.span.end]
        }
    }
}

/// HTML5 void elements (self-closing, no children).
pub const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param",
    "source", "track", "wbr",
];

/// Check if a tag name is an HTML5 void element.
pub fn is_void_element(tag: &str) -> bool {
    VOID_ELEMENTS.iter().any(|v| v.eq_ignore_ascii_case(tag))
}
