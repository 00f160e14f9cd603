//! stache Lexer
//!
//! Tokenizes stache template source into a flat token stream with
//! byte-offset spans. Handles plain content, newlines, escaped opens,
//! mustache delimiters (`{{`, `{{{`, `{{#`, `{{/`), comments and the
//! expression tokens inside mustaches.
//!
//! # Example
//!
//! ```
//! use stache_lexer::Lexer;
//!
//! let tokens = Lexer::tokenize("").unwrap();
//! assert_eq!(tokens.len(), 1); // Just EOF
//! ```

pub mod lexer;
pub mod token;

pub use lexer::Lexer;
pub use token::{is_void_element, Span, Token, TokenKind, VOID_ELEMENTS};

/// Lexer error with the byte span where lexing failed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Lexer error at bytes {}..{}: {message}", .span.start, .span.end)]
pub struct LexerError {
    pub message: String,
    pub span: Span,
}
