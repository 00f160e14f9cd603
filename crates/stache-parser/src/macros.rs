//! Keyword macro table.
//!
//! A bare identifier in expression position is looked up here before it is
//! treated as a path head. Matches expand to literal nodes (or a `this`
//! path) carrying the identifier's span. An identifier followed by `.` is
//! never a macro, so `null.foo` still parses as a path.

use crate::ast::{
    BooleanLiteral, Expression, Head, NullLiteral, PathExpression, ThisHead, UndefinedLiteral,
};
use stache_lexer::Span;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MacroKind {
    True,
    False,
    Null,
    Undefined,
    This,
}

/// An immutable name-to-expansion table consulted by the expression rule.
pub struct MacroTable {
    entries: &'static [(&'static str, MacroKind)],
}

impl MacroTable {
    pub fn lookup(&self, name: &str) -> Option<MacroKind> {
        self.entries
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, k)| *k)
    }
}

/// The default macro set.
pub static MACROS_V1: MacroTable = MacroTable {
    entries: &[
        ("true", MacroKind::True),
        ("false", MacroKind::False),
        ("null", MacroKind::Null),
        ("undefined", MacroKind::Undefined),
        ("this", MacroKind::This),
    ],
};

/// Expand a macro into the expression it denotes, at `span`.
pub(crate) fn expand(kind: MacroKind, span: Span) -> Expression {
    match kind {
        MacroKind::True => Expression::Boolean(BooleanLiteral { value: true, span }),
        MacroKind::False => Expression::Boolean(BooleanLiteral { value: false, span }),
        MacroKind::Null => Expression::Null(NullLiteral { span }),
        MacroKind::Undefined => Expression::Undefined(UndefinedLiteral { span }),
        MacroKind::This => Expression::Path(PathExpression {
            head: Head::This(ThisHead { span }),
            tail: Vec::new(),
            span,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_known_names() {
        assert_eq!(MACROS_V1.lookup("true"), Some(MacroKind::True));
        assert_eq!(MACROS_V1.lookup("false"), Some(MacroKind::False));
        assert_eq!(MACROS_V1.lookup("null"), Some(MacroKind::Null));
        assert_eq!(MACROS_V1.lookup("undefined"), Some(MacroKind::Undefined));
        assert_eq!(MACROS_V1.lookup("this"), Some(MacroKind::This));
    }

    #[test]
    fn test_lookup_misses_ordinary_names() {
        assert_eq!(MACROS_V1.lookup("truthy"), None);
        assert_eq!(MACROS_V1.lookup("nullable"), None);
        assert_eq!(MACROS_V1.lookup(""), None);
    }

    #[test]
    fn test_expand_spans() {
        let span = Span::new(3, 7);
        match expand(MacroKind::Null, span) {
            Expression::Null(n) => assert_eq!(n.span, span),
            other => panic!("expected null literal, got {other:?}"),
        }
        match expand(MacroKind::This, span) {
            Expression::Path(p) => {
                assert_eq!(p.span, span);
                assert!(matches!(p.head, Head::This(_)));
                assert!(p.tail.is_empty());
            }
            other => panic!("expected path, got {other:?}"),
        }
    }
}
