//! Cursor over the lexed token array.
//!
//! `Tokens` is the sole backtracking mechanism in the parser: cloning is
//! O(1) (the underlying token slice is shared), and `commit` adopts a
//! fork's position. A loop-detect counter on `peek`/`peek2` converts an
//! accidental infinite lookahead loop into a hard failure instead of a
//! hang.

use stache_lexer::{Span, Token, TokenKind};

/// Lookahead calls allowed between consumes before the loop guard trips.
const PEEK_LIMIT: u32 = 100;

/// Raised when `peek`/`peek2` are called more than `PEEK_LIMIT` times
/// without a consume. Always fatal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LookaheadOverflow;

/// A cursor over an immutable token buffer.
#[derive(Clone)]
pub struct Tokens<'a> {
    tokens: &'a [Token],
    pos: usize,
    peeks: u32,
}

impl<'a> Tokens<'a> {
    pub fn new(tokens: &'a [Token]) -> Self {
        Self {
            tokens,
            pos: 0,
            peeks: 0,
        }
    }

    fn at(&self, idx: usize) -> Token {
        self.tokens
            .get(idx)
            .copied()
            .unwrap_or_else(|| Token::new(TokenKind::Eof, self.end_span()))
    }

    fn end_span(&self) -> Span {
        match self.tokens.last() {
            Some(t) => t.span,
            None => Span::MISSING,
        }
    }

    /// The current token, counted against the loop guard.
    pub fn peek(&mut self) -> Result<Token, LookaheadOverflow> {
        self.peeks += 1;
        if self.peeks > PEEK_LIMIT {
            return Err(LookaheadOverflow);
        }
        Ok(self.at(self.pos))
    }

    /// One token of lookahead beyond the current token.
    pub fn peek2(&mut self) -> Result<Token, LookaheadOverflow> {
        self.peeks += 1;
        if self.peeks > PEEK_LIMIT {
            return Err(LookaheadOverflow);
        }
        Ok(self.at(self.pos + 1))
    }

    /// The current token without touching the loop guard. For diagnostics
    /// and frame bookkeeping only.
    pub fn peek_raw(&self) -> Token {
        self.at(self.pos)
    }

    /// Lookahead without touching the loop guard.
    pub fn peek2_raw(&self) -> Token {
        self.at(self.pos + 1)
    }

    /// Consume and return the current token. Consuming at the end keeps
    /// returning `Eof`. Resets the lookahead guard.
    pub fn consume(&mut self) -> Token {
        let tok = self.at(self.pos);
        if tok.kind != TokenKind::Eof {
            self.pos += 1;
        }
        self.peeks = 0;
        tok
    }

    /// Adopt a fork's position. The fork must share this cursor's buffer.
    pub fn commit(&mut self, fork: Tokens<'a>) {
        self.pos = fork.pos;
        self.peeks = 0;
    }

    /// Index into the token buffer; used for progress checks.
    pub fn pos(&self) -> usize {
        self.pos
    }

    pub fn is_at_end(&self) -> bool {
        self.peek_raw().kind == TokenKind::Eof
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stache_lexer::Lexer;

    fn cursor(tokens: &[Token]) -> Tokens<'_> {
        Tokens::new(tokens)
    }

    #[test]
    fn test_peek_does_not_advance() {
        let toks = Lexer::tokenize("{{a}}").unwrap();
        let mut c = cursor(&toks);
        assert_eq!(c.peek().unwrap().kind, TokenKind::Open);
        assert_eq!(c.peek().unwrap().kind, TokenKind::Open);
        assert_eq!(c.pos(), 0);
    }

    #[test]
    fn test_peek2_is_one_beyond() {
        let toks = Lexer::tokenize("{{a}}").unwrap();
        let mut c = cursor(&toks);
        assert_eq!(c.peek2().unwrap().kind, TokenKind::Identifier);
    }

    #[test]
    fn test_consume_advances() {
        let toks = Lexer::tokenize("{{a}}").unwrap();
        let mut c = cursor(&toks);
        assert_eq!(c.consume().kind, TokenKind::Open);
        assert_eq!(c.peek().unwrap().kind, TokenKind::Identifier);
    }

    #[test]
    fn test_consume_past_end_yields_eof() {
        let toks = Lexer::tokenize("").unwrap();
        let mut c = cursor(&toks);
        assert_eq!(c.consume().kind, TokenKind::Eof);
        assert_eq!(c.consume().kind, TokenKind::Eof);
        assert!(c.is_at_end());
    }

    #[test]
    fn test_fork_is_independent() {
        let toks = Lexer::tokenize("{{a}}").unwrap();
        let mut c = cursor(&toks);
        let mut fork = c.clone();
        fork.consume();
        fork.consume();
        assert_eq!(c.pos(), 0);
        assert_eq!(c.peek().unwrap().kind, TokenKind::Open);
    }

    #[test]
    fn test_commit_adopts_fork_position() {
        let toks = Lexer::tokenize("{{a}}").unwrap();
        let mut c = cursor(&toks);
        let mut fork = c.clone();
        fork.consume();
        c.commit(fork);
        assert_eq!(c.peek().unwrap().kind, TokenKind::Identifier);
    }

    #[test]
    fn test_lookahead_guard_trips() {
        let toks = Lexer::tokenize("x").unwrap();
        let mut c = cursor(&toks);
        let mut tripped = false;
        for _ in 0..200 {
            if c.peek().is_err() {
                tripped = true;
                break;
            }
        }
        assert!(tripped);
    }

    #[test]
    fn test_consume_resets_guard() {
        let toks = Lexer::tokenize("a\nb\nc").unwrap();
        let mut c = cursor(&toks);
        for _ in 0..90 {
            c.peek().unwrap();
        }
        c.consume();
        for _ in 0..90 {
            assert!(c.peek().is_ok());
        }
    }
}
