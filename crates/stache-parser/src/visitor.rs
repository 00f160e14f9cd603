//! Node-kind metadata and traversal.
//!
//! `VISITOR_KEYS` names, for every node kind, the fields holding child
//! nodes, in visit order. External tools (and the debug utilities) drive
//! their traversals from this table so new node kinds only need one edit.

use crate::ast::{AttrValue, Expression, Root, Statement};

/// Child-field names per node kind, in traversal order.
pub static VISITOR_KEYS: &[(&str, &[&str])] = &[
    ("Root", &["body"]),
    ("Program", &["body"]),
    ("MustacheStatement", &["call"]),
    ("MustacheContent", &["value"]),
    ("BlockStatement", &["call", "program", "inverse"]),
    ("ElementNode", &["attributes", "children"]),
    ("AttrNode", &["value"]),
    ("ConcatStatement", &["parts"]),
    ("ContentStatement", &[]),
    ("NewlineNode", &[]),
    ("TextNode", &[]),
    ("CommentStatement", &[]),
    ("HtmlCommentNode", &[]),
    ("Call", &["callee", "params", "hash"]),
    ("Hash", &["pairs"]),
    ("HashPair", &["value"]),
    ("PathExpression", &[]),
    ("SubExpression", &["call"]),
    ("StringLiteral", &[]),
    ("NumberLiteral", &[]),
    ("BooleanLiteral", &[]),
    ("NullLiteral", &[]),
    ("UndefinedLiteral", &[]),
];

pub fn visitor_keys(kind: &str) -> Option<&'static [&'static str]> {
    VISITOR_KEYS
        .iter()
        .find(|(name, _)| *name == kind)
        .map(|(_, keys)| *keys)
}

pub fn statement_kind(stmt: &Statement) -> &'static str {
    match stmt {
        Statement::Mustache(_) => "MustacheStatement",
        Statement::MustacheContent(_) => "MustacheContent",
        Statement::Block(_) => "BlockStatement",
        Statement::Element(_) => "ElementNode",
        Statement::Content(_) => "ContentStatement",
        Statement::Newline(_) => "NewlineNode",
        Statement::Text(_) => "TextNode",
        Statement::Concat(_) => "ConcatStatement",
        Statement::HtmlComment(_) => "HtmlCommentNode",
        Statement::Comment(_) => "CommentStatement",
    }
}

pub fn expression_kind(expr: &Expression) -> &'static str {
    match expr {
        Expression::Path(_) => "PathExpression",
        Expression::SubExpression(_) => "SubExpression",
        Expression::String(_) => "StringLiteral",
        Expression::Number(_) => "NumberLiteral",
        Expression::Boolean(_) => "BooleanLiteral",
        Expression::Null(_) => "NullLiteral",
        Expression::Undefined(_) => "UndefinedLiteral",
    }
}

/// Depth-first pre-order walk over every statement in the tree.
pub fn walk_statements<F: FnMut(&Statement)>(root: &Root, f: &mut F) {
    for stmt in &root.body {
        walk_statement(stmt, f);
    }
}

pub fn walk_statement<F: FnMut(&Statement)>(stmt: &Statement, f: &mut F) {
    f(stmt);
    match stmt {
        Statement::Block(block) => {
            for child in &block.program.body {
                walk_statement(child, f);
            }
            if let Some(inverse) = &block.inverse {
                for child in &inverse.body {
                    walk_statement(child, f);
                }
            }
        }
        Statement::Element(el) => {
            for attr in &el.attributes {
                match &attr.value {
                    AttrValue::Mustache(inner) => walk_statement(inner, f),
                    AttrValue::Concat(concat) => {
                        for part in &concat.parts {
                            walk_statement(part, f);
                        }
                    }
                    AttrValue::Text(_) => {}
                }
            }
            for child in &el.children {
                walk_statement(child, f);
            }
        }
        Statement::Concat(concat) => {
            for part in &concat.parts {
                walk_statement(part, f);
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keys_cover_container_kinds() {
        assert_eq!(visitor_keys("Root"), Some(&["body"][..]));
        assert_eq!(
            visitor_keys("BlockStatement"),
            Some(&["call", "program", "inverse"][..])
        );
        assert_eq!(visitor_keys("ContentStatement"), Some(&[][..]));
        assert_eq!(visitor_keys("NoSuchNode"), None);
    }

    #[test]
    fn test_every_statement_kind_has_keys() {
        let result = crate::parse("<p class=\"{{c}}\">{{#if a}}x{{else}}{{y}}{{/if}}</p>");
        walk_statements(&result.root, &mut |stmt| {
            assert!(
                visitor_keys(statement_kind(stmt)).is_some(),
                "missing keys for {}",
                statement_kind(stmt)
            );
        });
    }

    #[test]
    fn test_walk_reaches_attribute_parts() {
        let result = crate::parse("<a href=\"x{{y}}\"></a>");
        let mut kinds = Vec::new();
        walk_statements(&result.root, &mut |stmt| kinds.push(statement_kind(stmt)));
        assert!(kinds.contains(&"ElementNode"));
        assert!(kinds.contains(&"TextNode"));
        assert!(kinds.contains(&"MustacheContent"));
    }
}
