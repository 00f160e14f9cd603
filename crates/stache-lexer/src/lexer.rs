use crate::token::{Span, Token, TokenKind};
use crate::LexerError;

/// Guard against a lexer bug looping without emitting a token. Tripping it
/// converts a hang into a reported failure.
const MAX_STEPS: usize = 1000;

/// Lexer state. `Top` dispatches on the next character; the other states
/// accumulate one token each.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Top,
    Content,
    Comment,
    Mustache,
    EscapeChar,
    /// Interior of a trusted (triple) mustache `{{{ ... }}}`.
    Raw,
}

/// stache source lexer.
///
/// Converts raw source characters into a flat token stream with explicit
/// states and byte-offset spans. Content, newlines, escaped opens, comments
/// and mustache delimiters are produced in text context; identifiers,
/// at-names, numbers, strings and punctuation inside mustaches.
pub struct Lexer<'a> {
    source: &'a str,
    pos: usize,
    state: State,
    token_start: usize,
    comment_block: bool,
}

impl<'a> Lexer<'a> {
    /// Create a new lexer for the given source.
    pub fn new(source: &'a str) -> Self {
        Self {
            source,
            pos: 0,
            state: State::Top,
            token_start: 0,
            comment_block: false,
        }
    }

    /// Tokenize the entire source into a vector of tokens, ending with `Eof`.
    pub fn tokenize(source: &str) -> Result<Vec<Token>, LexerError> {
        let mut lexer = Lexer::new(source);
        let mut tokens = Vec::new();
        loop {
            let tok = lexer.next()?;
            let done = tok.kind == TokenKind::Eof;
            tokens.push(tok);
            if done {
                return Ok(tokens);
            }
        }
    }

    /// Produce the next token. Call repeatedly until a token tagged `Eof`
    /// is returned.
    pub fn next(&mut self) -> Result<Token, LexerError> {
        let mut steps = 0usize;
        loop {
            steps += 1;
            if steps > MAX_STEPS {
                return Err(self.error_at(
                    self.pos,
                    "lexer made no progress; this is a bug in the lexer".into(),
                ));
            }

            match self.state {
                State::Top => {
                    if self.is_at_end() {
                        return Ok(self.emit(TokenKind::Eof, self.pos));
                    }
                    if let Some(tok) = self.step_top()? {
                        return Ok(tok);
                    }
                }
                State::Content => return Ok(self.scan_content()),
                State::EscapeChar => return Ok(self.scan_escaped_open()),
                State::Comment => return self.scan_comment(),
                State::Mustache | State::Raw => return self.scan_in_mustache(),
            }
        }
    }

    // --- Top dispatch ---

    /// Inspect the next character plus the unconsumed remainder and either
    /// emit a delimiter token or transition into an accumulating state.
    fn step_top(&mut self) -> Result<Option<Token>, LexerError> {
        let rest = self.rest();
        let start = self.pos;

        if rest.starts_with('\n') {
            self.pos += 1;
            return Ok(Some(self.emit(TokenKind::Newline, start)));
        }
        if rest.starts_with('\r') {
            self.pos += 1;
            // \r\n is a single newline token
            if self.rest().starts_with('\n') {
                self.pos += 1;
            }
            return Ok(Some(self.emit(TokenKind::Newline, start)));
        }
        if rest.starts_with("\\{{") {
            self.token_start = start;
            self.state = State::EscapeChar;
            return Ok(None);
        }
        if rest.starts_with("{{") {
            if rest.starts_with("{{!--") {
                self.token_start = start;
                self.comment_block = true;
                self.pos += 5;
                self.state = State::Comment;
                return Ok(None);
            }
            if rest.starts_with("{{!") {
                self.token_start = start;
                self.comment_block = false;
                self.pos += 3;
                self.state = State::Comment;
                return Ok(None);
            }
            if rest.starts_with("{{{") {
                self.pos += 3;
                self.state = State::Raw;
                return Ok(Some(self.emit(TokenKind::OpenTrusted, start)));
            }
            if rest.starts_with("{{#") {
                self.pos += 3;
                self.state = State::Mustache;
                return Ok(Some(self.emit(TokenKind::OpenBlock, start)));
            }
            if rest.starts_with("{{/") {
                self.pos += 3;
                self.state = State::Mustache;
                return Ok(Some(self.emit(TokenKind::OpenEndBlock, start)));
            }
            self.pos += 2;
            self.state = State::Mustache;
            return Ok(Some(self.emit(TokenKind::Open, start)));
        }

        self.token_start = start;
        self.state = State::Content;
        Ok(None)
    }

    // --- Accumulating states ---

    /// Scan a run of plain text up to the next newline, mustache open or
    /// escaped open. Top guarantees at least one content character.
    fn scan_content(&mut self) -> Token {
        self.advance_char();
        while !self.is_at_end() {
            let rest = self.rest();
            if rest.starts_with('\n')
                || rest.starts_with('\r')
                || rest.starts_with("{{")
                || rest.starts_with("\\{{")
            {
                break;
            }
            self.advance_char();
        }
        self.state = State::Top;
        self.emit(TokenKind::Content, self.token_start)
    }

    /// Consume `\{{`. The token's span covers all three bytes; consumers
    /// treat its value as a literal `{{`.
    fn scan_escaped_open(&mut self) -> Token {
        self.pos += 3;
        self.state = State::Top;
        self.emit(TokenKind::EscapedOpen, self.token_start)
    }

    /// Scan to the comment terminator. The token span covers the full
    /// `{{! ... }}` or `{{!-- ... --}}` text.
    fn scan_comment(&mut self) -> Result<Token, LexerError> {
        let terminator = if self.comment_block { "--}}" } else { "}}" };
        match self.rest().find(terminator) {
            Some(i) => {
                self.pos += i + terminator.len();
                self.state = State::Top;
                let kind = if self.comment_block {
                    TokenKind::BlockComment
                } else {
                    TokenKind::Comment
                };
                Ok(self.emit(kind, self.token_start))
            }
            None => Err(self.error_at(self.token_start, "unterminated comment".into())),
        }
    }

    /// Scan one token inside a mustache (`Mustache`) or trusted mustache
    /// (`Raw`) interior.
    fn scan_in_mustache(&mut self) -> Result<Token, LexerError> {
        while matches!(self.peek(), Some(' ' | '\t' | '\n' | '\r')) {
            self.pos += 1;
        }
        if self.is_at_end() {
            return Err(self.error_at(self.pos, "unexpected end of input inside mustache".into()));
        }

        let start = self.pos;
        let rest = self.rest();

        if self.state == State::Raw && rest.starts_with("}}}") {
            self.pos += 3;
            self.state = State::Top;
            return Ok(self.emit(TokenKind::CloseTrusted, start));
        }
        if rest.starts_with("}}") {
            self.pos += 2;
            self.state = State::Top;
            return Ok(self.emit(TokenKind::Close, start));
        }

        let c = rest.chars().next().unwrap_or('\0');
        match c {
            '.' => Ok(self.single(TokenKind::Dot)),
            '=' => Ok(self.single(TokenKind::Equals)),
            '(' => Ok(self.single(TokenKind::LParen)),
            ')' => Ok(self.single(TokenKind::RParen)),
            '|' => Ok(self.single(TokenKind::Pipe)),
            '@' => self.scan_at_name(),
            '"' | '\'' => self.scan_string(c),
            '-' if rest[1..].starts_with(|d: char| d.is_ascii_digit()) => Ok(self.scan_number()),
            '0'..='9' => Ok(self.scan_number()),
            c if c.is_alphabetic() || c == '_' => Ok(self.scan_identifier()),
            c => Err(self.error_at(start, format!("Unexpected character: '{c}'"))),
        }
    }

    // --- Scanners ---

    fn scan_at_name(&mut self) -> Result<Token, LexerError> {
        let start = self.pos;
        self.pos += 1; // consume '@'
        let name_start = self.pos;
        self.consume_ident_chars();
        if self.pos == name_start {
            return Err(self.error_at(start, "expected a name after '@'".into()));
        }
        Ok(self.emit(TokenKind::AtName, start))
    }

    /// Scan an identifier. Supports hyphens when followed by alphanumeric
    /// (for helper names like `nav-item`).
    fn scan_identifier(&mut self) -> Token {
        let start = self.pos;
        self.advance_char();
        self.consume_ident_chars();
        self.emit(TokenKind::Identifier, start)
    }

    fn consume_ident_chars(&mut self) {
        while let Some(c) = self.peek() {
            if c.is_alphanumeric() || c == '_' {
                self.advance_char();
            } else if c == '-' && self.peek_second().is_some_and(|d| d.is_alphanumeric()) {
                self.pos += 1;
            } else {
                break;
            }
        }
    }

    /// Scan a number literal: optional sign, digits, optional fraction.
    fn scan_number(&mut self) -> Token {
        let start = self.pos;
        if self.peek() == Some('-') {
            self.pos += 1;
        }
        while matches!(self.peek(), Some('0'..='9')) {
            self.pos += 1;
        }
        if self.peek() == Some('.') && matches!(self.peek_second(), Some('0'..='9')) {
            self.pos += 1;
            while matches!(self.peek(), Some('0'..='9')) {
                self.pos += 1;
            }
        }
        self.emit(TokenKind::Number, start)
    }

    /// Scan a quoted string literal. The span covers the quotes; escape
    /// sequences are resolved by the parser, not here.
    fn scan_string(&mut self, quote: char) -> Result<Token, LexerError> {
        let start = self.pos;
        self.pos += 1; // opening quote
        while let Some(c) = self.peek() {
            if c == '\\' {
                self.pos += 1;
                if self.is_at_end() {
                    break;
                }
                self.advance_char();
            } else if c == quote {
                self.pos += 1;
                return Ok(self.emit(TokenKind::String, start));
            } else {
                self.advance_char();
            }
        }
        Err(self.error_at(start, "unterminated string".into()))
    }

    // --- Helpers ---

    fn emit(&self, kind: TokenKind, start: usize) -> Token {
        Token::new(kind, Span::new(start, self.pos))
    }

    fn single(&mut self, kind: TokenKind) -> Token {
        let start = self.pos;
        self.pos += 1;
        self.emit(kind, start)
    }

    fn rest(&self) -> &'a str {
        &self.source[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn peek_second(&self) -> Option<char> {
        let mut chars = self.rest().chars();
        chars.next();
        chars.next()
    }

    fn advance_char(&mut self) {
        if let Some(c) = self.peek() {
            self.pos += c.len_utf8();
        }
    }

    fn is_at_end(&self) -> bool {
        self.pos >= self.source.len()
    }

    fn error_at(&self, pos: usize, message: String) -> LexerError {
        LexerError {
            message,
            span: Span::new(pos, pos.min(self.source.len())),
        }
    }
}
