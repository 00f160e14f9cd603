//! Shorthand constructors for expected-tree assertions.
//!
//! Every node is built with a `MISSING` span; compare against parsed
//! output with `debug::structural_hash` or `debug::to_sexp`, both of which
//! ignore spans.

use crate::ast::{
    ArgReference, AttrNode, AttrValue, BlockParams, BlockStatement, BooleanLiteral, Call,
    CommentStatement, ConcatStatement, ContentStatement, ElementNode, Expression, Hash, HashPair,
    Head, HtmlCommentNode, LocalReference, MustacheContent, MustacheStatement, NewlineNode,
    NullLiteral, NumberLiteral, PathExpression, PathSegment, Program, Root, Statement,
    StringLiteral, SubExpression, TextNode, ThisHead, UndefinedLiteral,
};
use stache_lexer::Span;

pub fn root(body: Vec<Statement>) -> Root {
    Root {
        body,
        span: Span::MISSING,
    }
}

pub fn program(body: Vec<Statement>) -> Program {
    Program {
        body,
        block_params: None,
        chained: false,
        span: Span::MISSING,
    }
}

pub fn program_with_params(body: Vec<Statement>, names: &[&str]) -> Program {
    Program {
        body,
        block_params: Some(BlockParams {
            names: names.iter().map(|n| segment(n)).collect(),
            span: Span::MISSING,
        }),
        chained: false,
        span: Span::MISSING,
    }
}

pub fn chained(block: Statement) -> Program {
    Program {
        body: vec![block],
        block_params: None,
        chained: true,
        span: Span::MISSING,
    }
}

pub fn content(value: &str) -> Statement {
    Statement::Content(ContentStatement {
        value: value.to_owned(),
        span: Span::MISSING,
    })
}

pub fn newline() -> Statement {
    Statement::Newline(NewlineNode { span: Span::MISSING })
}

pub fn text(chars: &str) -> Statement {
    Statement::Text(TextNode {
        chars: chars.to_owned(),
        span: Span::MISSING,
    })
}

pub fn comment(value: &str) -> Statement {
    Statement::Comment(CommentStatement {
        value: value.to_owned(),
        span: Span::MISSING,
    })
}

pub fn html_comment(value: &str) -> Statement {
    Statement::HtmlComment(HtmlCommentNode {
        value: value.to_owned(),
        span: Span::MISSING,
    })
}

/// `{{expr}}` — a bare mustache.
pub fn mustache(value: Expression) -> Statement {
    Statement::MustacheContent(MustacheContent {
        value,
        trusted: false,
        span: Span::MISSING,
    })
}

/// `{{{expr}}}`.
pub fn trusted_mustache(value: Expression) -> Statement {
    Statement::MustacheContent(MustacheContent {
        value,
        trusted: true,
        span: Span::MISSING,
    })
}

/// `{{callee params... hash}}`.
pub fn mustache_call(call: Call) -> Statement {
    Statement::Mustache(MustacheStatement {
        call,
        trusted: false,
        span: Span::MISSING,
    })
}

pub fn call(callee: Expression, params: Vec<Expression>, pairs: Vec<HashPair>) -> Call {
    Call {
        callee,
        params,
        hash: Hash {
            pairs,
            span: Span::MISSING,
        },
        span: Span::MISSING,
    }
}

pub fn pair(key: &str, value: Expression) -> HashPair {
    HashPair {
        key: key.to_owned(),
        key_span: Span::MISSING,
        value,
        span: Span::MISSING,
    }
}

pub fn block(c: Call, body: Program, inverse: Option<Program>) -> Statement {
    Statement::Block(BlockStatement {
        call: c,
        program: body,
        inverse,
        span: Span::MISSING,
    })
}

pub fn element(tag: &str, attributes: Vec<AttrNode>, children: Vec<Statement>) -> Statement {
    Statement::Element(ElementNode {
        tag: tag.to_owned(),
        attributes,
        children,
        self_closing: false,
        span: Span::MISSING,
    })
}

pub fn attr(name: &str, value: AttrValue) -> AttrNode {
    AttrNode {
        name: name.to_owned(),
        name_span: Span::MISSING,
        value,
        span: Span::MISSING,
    }
}

pub fn attr_text(chars: &str) -> AttrValue {
    AttrValue::Text(TextNode {
        chars: chars.to_owned(),
        span: Span::MISSING,
    })
}

pub fn attr_mustache(stmt: Statement) -> AttrValue {
    AttrValue::Mustache(Box::new(stmt))
}

pub fn attr_concat(parts: Vec<Statement>) -> AttrValue {
    AttrValue::Concat(ConcatStatement {
        parts,
        span: Span::MISSING,
    })
}

/// A path from a dotted string: `"user.name"`, `"@index"`, `"this.x"`.
pub fn path(dotted: &str) -> Expression {
    let mut parts = dotted.split('.');
    let head_name = parts.next().unwrap_or("");
    let head = if head_name == "this" {
        Head::This(ThisHead { span: Span::MISSING })
    } else if let Some(rest) = head_name.strip_prefix('@') {
        Head::Arg(ArgReference {
            name: format!("@{rest}"),
            span: Span::MISSING,
        })
    } else {
        Head::Local(LocalReference {
            name: head_name.to_owned(),
            span: Span::MISSING,
        })
    };
    Expression::Path(PathExpression {
        head,
        tail: parts.map(segment).collect(),
        span: Span::MISSING,
    })
}

pub fn segment(name: &str) -> PathSegment {
    PathSegment {
        name: name.to_owned(),
        span: Span::MISSING,
    }
}

pub fn string(value: &str) -> Expression {
    Expression::String(StringLiteral {
        value: value.to_owned(),
        span: Span::MISSING,
    })
}

pub fn number(value: f64) -> Expression {
    Expression::Number(NumberLiteral {
        value,
        span: Span::MISSING,
    })
}

pub fn boolean(value: bool) -> Expression {
    Expression::Boolean(BooleanLiteral {
        value,
        span: Span::MISSING,
    })
}

pub fn null() -> Expression {
    Expression::Null(NullLiteral { span: Span::MISSING })
}

pub fn undefined() -> Expression {
    Expression::Undefined(UndefinedLiteral { span: Span::MISSING })
}

pub fn sub_expression(c: Call) -> Expression {
    Expression::SubExpression(SubExpression {
        call: Box::new(c),
        span: Span::MISSING,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::debug::structural_hash;

    #[test]
    fn test_path_shorthand() {
        match path("user.name") {
            Expression::Path(p) => {
                assert!(matches!(p.head, Head::Local(ref l) if l.name == "user"));
                assert_eq!(p.tail.len(), 1);
                assert_eq!(p.tail[0].name, "name");
            }
            other => panic!("expected path, got {other:?}"),
        }
        match path("@index") {
            Expression::Path(p) => assert!(matches!(p.head, Head::Arg(ref a) if a.name == "@index")),
            other => panic!("expected path, got {other:?}"),
        }
        match path("this.x") {
            Expression::Path(p) => assert!(matches!(p.head, Head::This(_))),
            other => panic!("expected path, got {other:?}"),
        }
    }

    #[test]
    fn test_built_tree_matches_parsed_tree() {
        let parsed = crate::parse("{{name}}").root;
        let built = root(vec![mustache(path("name"))]);
        assert_eq!(structural_hash(&parsed), structural_hash(&built));
    }
}
