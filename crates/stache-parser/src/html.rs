//! Chunk-driven HTML tokenizer.
//!
//! The grammar hands finished content chunks here one at a time; mustaches
//! never reach this tokenizer, so its state machine survives across chunks
//! and dynamic parts are spliced in between them. The tokenizer itself
//! builds nothing: it narrates what it sees to a [`TokenizerSink`], and the
//! element stack turns that narration into nodes.
//!
//! Offsets passed to the sink are absolute byte offsets derived from the
//! chunk's span, so node spans land on the original source even though the
//! tokenizer only ever sees a slice.

use stache_lexer::Span;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TokState {
    Data,
    TagOpen,
    TagName,
    EndTagOpen,
    EndTagName,
    BeforeAttrName,
    AttrName,
    AfterAttrName,
    BeforeAttrValue,
    AttrValueDouble,
    AttrValueSingle,
    AttrValueUnquoted,
    SelfClosing,
    MarkupDecl,
    CommentStartDash,
    Comment,
    CommentEndDash,
    CommentEnd,
    Bogus,
}

impl TokState {
    /// Human-readable location for diagnostics about misplaced mustaches.
    pub(crate) fn describe(self) -> &'static str {
        match self {
            TokState::Data => "content",
            TokState::TagOpen | TokState::TagName | TokState::EndTagOpen | TokState::EndTagName => {
                "a tag name"
            }
            TokState::BeforeAttrName
            | TokState::AttrName
            | TokState::AfterAttrName
            | TokState::SelfClosing => "a tag body",
            TokState::BeforeAttrValue
            | TokState::AttrValueDouble
            | TokState::AttrValueSingle
            | TokState::AttrValueUnquoted => "an attribute value",
            TokState::MarkupDecl
            | TokState::CommentStartDash
            | TokState::Comment
            | TokState::CommentEndDash
            | TokState::CommentEnd => "an HTML comment",
            TokState::Bogus => "a markup declaration",
        }
    }
}

/// Delegate for tokenizer events. Implemented by the element stack.
pub(crate) trait TokenizerSink {
    fn begin_start_tag(&mut self, offset: usize);
    fn begin_end_tag(&mut self, offset: usize);
    fn append_to_tag_name(&mut self, c: char);
    fn begin_attribute(&mut self, offset: usize);
    fn append_to_attribute_name(&mut self, c: char);
    fn begin_attribute_value(&mut self, quoted: bool, offset: usize);
    fn append_to_attribute_value(&mut self, c: char, span: Span);
    fn finish_attribute_value(&mut self, offset: usize);
    fn finish_tag(&mut self, offset: usize, self_closing: bool);
    fn begin_data(&mut self, offset: usize);
    fn append_to_data(&mut self, c: char, end: usize);
    fn finish_data(&mut self, offset: usize);
    fn begin_comment(&mut self, offset: usize);
    fn append_to_comment(&mut self, c: char, end: usize);
    fn finish_comment(&mut self, offset: usize);
}

pub(crate) struct Tokenizer {
    state: TokState,
    /// Whether a data run is open (begin_data fired, finish_data pending).
    data_open: bool,
    /// Offset of the `<` that opened the tag or comment being scanned.
    mark: usize,
}

impl Tokenizer {
    pub(crate) fn new() -> Self {
        Self {
            state: TokState::Data,
            data_open: false,
            mark: 0,
        }
    }

    pub(crate) fn state(&self) -> TokState {
        self.state
    }

    /// A mustache arrived where an unquoted attribute value would start.
    pub(crate) fn begin_unquoted_value(&mut self) {
        self.state = TokState::AttrValueUnquoted;
    }

    /// Close an open data run at `end` (a chunk boundary or a `<`).
    pub(crate) fn flush_data(&mut self, end: usize, sink: &mut impl TokenizerSink) {
        if self.data_open {
            sink.finish_data(end);
            self.data_open = false;
        }
    }

    /// Feed one source chunk. `span` locates `chunk` in the original
    /// source; when the chunk text was cooked (escaped opens) the span may
    /// be wider than the text, which only stretches the final data run.
    pub(crate) fn tokenize_part(&mut self, chunk: &str, span: Span, sink: &mut impl TokenizerSink) {
        for (i, c) in chunk.char_indices() {
            let off = span.start.saturating_add(i);
            let end = off + c.len_utf8();
            self.step(c, off, end, sink);
        }
    }

    fn step(&mut self, c: char, off: usize, end: usize, sink: &mut impl TokenizerSink) {
        match self.state {
            TokState::Data => {
                if c == '<' {
                    self.flush_data(off, sink);
                    self.mark = off;
                    self.state = TokState::TagOpen;
                } else {
                    self.push_data(c, off, end, sink);
                }
            }
            TokState::TagOpen => match c {
                '!' => self.state = TokState::MarkupDecl,
                '/' => self.state = TokState::EndTagOpen,
                _ if c.is_ascii_alphabetic() => {
                    sink.begin_start_tag(self.mark);
                    sink.append_to_tag_name(c);
                    self.state = TokState::TagName;
                }
                // Not a tag after all; the first `<` was data and this
                // one opens a fresh tag candidate.
                '<' => {
                    self.push_data('<', self.mark, self.mark + 1, sink);
                    self.flush_data(off, sink);
                    self.mark = off;
                    self.state = TokState::TagOpen;
                }
                _ => {
                    self.push_data('<', self.mark, self.mark + 1, sink);
                    self.push_data(c, off, end, sink);
                    self.state = TokState::Data;
                }
            },
            TokState::TagName => match c {
                c if c.is_ascii_whitespace() => self.state = TokState::BeforeAttrName,
                '/' => self.state = TokState::SelfClosing,
                '>' => {
                    sink.finish_tag(end, false);
                    self.state = TokState::Data;
                }
                _ => sink.append_to_tag_name(c),
            },
            TokState::EndTagOpen => match c {
                _ if c.is_ascii_alphabetic() => {
                    sink.begin_end_tag(self.mark);
                    sink.append_to_tag_name(c);
                    self.state = TokState::EndTagName;
                }
                // `</>` and other bogus end tags are dropped.
                '>' => self.state = TokState::Data,
                _ => self.state = TokState::Bogus,
            },
            TokState::EndTagName => match c {
                '>' => {
                    sink.finish_tag(end, false);
                    self.state = TokState::Data;
                }
                c if c.is_ascii_whitespace() => {}
                _ => sink.append_to_tag_name(c),
            },
            TokState::BeforeAttrName => match c {
                c if c.is_ascii_whitespace() => {}
                '/' => self.state = TokState::SelfClosing,
                '>' => {
                    sink.finish_tag(end, false);
                    self.state = TokState::Data;
                }
                _ => {
                    sink.begin_attribute(off);
                    sink.append_to_attribute_name(c);
                    self.state = TokState::AttrName;
                }
            },
            TokState::AttrName => match c {
                c if c.is_ascii_whitespace() => self.state = TokState::AfterAttrName,
                '=' => self.state = TokState::BeforeAttrValue,
                '/' => self.state = TokState::SelfClosing,
                '>' => {
                    sink.finish_tag(end, false);
                    self.state = TokState::Data;
                }
                _ => sink.append_to_attribute_name(c),
            },
            TokState::AfterAttrName => match c {
                c if c.is_ascii_whitespace() => {}
                '=' => self.state = TokState::BeforeAttrValue,
                '/' => self.state = TokState::SelfClosing,
                '>' => {
                    sink.finish_tag(end, false);
                    self.state = TokState::Data;
                }
                _ => {
                    sink.begin_attribute(off);
                    sink.append_to_attribute_name(c);
                    self.state = TokState::AttrName;
                }
            },
            TokState::BeforeAttrValue => match c {
                c if c.is_ascii_whitespace() => {}
                '"' => {
                    sink.begin_attribute_value(true, off);
                    self.state = TokState::AttrValueDouble;
                }
                '\'' => {
                    sink.begin_attribute_value(true, off);
                    self.state = TokState::AttrValueSingle;
                }
                '>' => {
                    sink.begin_attribute_value(false, off);
                    sink.finish_attribute_value(off);
                    sink.finish_tag(end, false);
                    self.state = TokState::Data;
                }
                _ => {
                    sink.begin_attribute_value(false, off);
                    sink.append_to_attribute_value(c, Span::new(off, end));
                    self.state = TokState::AttrValueUnquoted;
                }
            },
            TokState::AttrValueDouble => match c {
                '"' => {
                    sink.finish_attribute_value(end);
                    self.state = TokState::BeforeAttrName;
                }
                _ => sink.append_to_attribute_value(c, Span::new(off, end)),
            },
            TokState::AttrValueSingle => match c {
                '\'' => {
                    sink.finish_attribute_value(end);
                    self.state = TokState::BeforeAttrName;
                }
                _ => sink.append_to_attribute_value(c, Span::new(off, end)),
            },
            TokState::AttrValueUnquoted => match c {
                c if c.is_ascii_whitespace() => {
                    sink.finish_attribute_value(off);
                    self.state = TokState::BeforeAttrName;
                }
                '>' => {
                    sink.finish_attribute_value(off);
                    sink.finish_tag(end, false);
                    self.state = TokState::Data;
                }
                _ => sink.append_to_attribute_value(c, Span::new(off, end)),
            },
            TokState::SelfClosing => match c {
                '>' => {
                    sink.finish_tag(end, true);
                    self.state = TokState::Data;
                }
                c if c.is_ascii_whitespace() => {}
                '/' => {}
                _ => {
                    sink.begin_attribute(off);
                    sink.append_to_attribute_name(c);
                    self.state = TokState::AttrName;
                }
            },
            TokState::MarkupDecl => match c {
                '-' => self.state = TokState::CommentStartDash,
                '>' => self.state = TokState::Data,
                _ => self.state = TokState::Bogus,
            },
            TokState::CommentStartDash => match c {
                '-' => {
                    sink.begin_comment(self.mark);
                    self.state = TokState::Comment;
                }
                _ => self.state = TokState::Bogus,
            },
            TokState::Comment => match c {
                '-' => self.state = TokState::CommentEndDash,
                _ => sink.append_to_comment(c, end),
            },
            TokState::CommentEndDash => match c {
                '-' => self.state = TokState::CommentEnd,
                _ => {
                    sink.append_to_comment('-', off);
                    sink.append_to_comment(c, end);
                    self.state = TokState::Comment;
                }
            },
            TokState::CommentEnd => match c {
                '>' => {
                    sink.finish_comment(end);
                    self.state = TokState::Data;
                }
                '-' => sink.append_to_comment('-', end),
                _ => {
                    sink.append_to_comment('-', off);
                    sink.append_to_comment('-', off);
                    sink.append_to_comment(c, end);
                    self.state = TokState::Comment;
                }
            },
            // `<!DOCTYPE ...>` and other declarations are skipped whole.
            TokState::Bogus => {
                if c == '>' {
                    self.state = TokState::Data;
                }
            }
        }
    }

    fn push_data(&mut self, c: char, off: usize, end: usize, sink: &mut impl TokenizerSink) {
        if !self.data_open {
            sink.begin_data(off);
            self.data_open = true;
        }
        sink.append_to_data(c, end);
        self.state = TokState::Data;
    }
}
