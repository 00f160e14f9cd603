//! Debug and tooling helpers.
//!
//! `to_sexp` renders a tree as a compact s-expression with spans omitted,
//! which makes expected-tree tests readable and diffs small.
//! `structural_hash` hashes that rendering, so two trees compare equal
//! exactly when their structure and values match, regardless of spans.
//! `annotate` lists every node with its resolved line/column range.
//! `to_source` renders a tree back to template source; it is a plain
//! printer for builder round-trips and tooling, not a formatter.

use crate::ast::{
    AttrValue, BlockStatement, Call, Expression, Hash, Head, Program, Root, Statement,
};
use crate::position::position_at;
use crate::visitor::statement_kind;
use stache_lexer::{is_void_element, Span};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash as _, Hasher};

pub fn to_sexp(root: &Root) -> String {
    let mut out = String::from("(root");
    for stmt in &root.body {
        out.push(' ');
        write_statement(&mut out, stmt);
    }
    out.push(')');
    out
}

/// A span-insensitive fingerprint of the tree.
pub fn structural_hash(root: &Root) -> u64 {
    let mut hasher = DefaultHasher::new();
    to_sexp(root).hash(&mut hasher);
    hasher.finish()
}

fn write_statement(out: &mut String, stmt: &Statement) {
    match stmt {
        Statement::Content(c) => {
            out.push_str(&format!("(content {:?})", c.value));
        }
        Statement::Newline(_) => out.push_str("(newline)"),
        Statement::Text(t) => {
            out.push_str(&format!("(text {:?})", t.chars));
        }
        Statement::Comment(c) => {
            out.push_str(&format!("(comment {:?})", c.value));
        }
        Statement::HtmlComment(c) => {
            out.push_str(&format!("(html-comment {:?})", c.value));
        }
        Statement::MustacheContent(m) => {
            out.push_str(if m.trusted {
                "(mustache! "
            } else {
                "(mustache "
            });
            write_expression(out, &m.value);
            out.push(')');
        }
        Statement::Mustache(m) => {
            out.push_str(if m.trusted {
                "(mustache! "
            } else {
                "(mustache "
            });
            write_call(out, &m.call);
            out.push(')');
        }
        Statement::Block(b) => {
            out.push_str("(block ");
            write_call(out, &b.call);
            out.push(' ');
            write_program(out, &b.program);
            if let Some(inverse) = &b.inverse {
                out.push(' ');
                write_program(out, inverse);
            }
            out.push(')');
        }
        Statement::Element(el) => {
            out.push_str(&format!("(element {:?}", el.tag));
            if el.self_closing {
                out.push_str(" self-closing");
            }
            for attr in &el.attributes {
                out.push_str(&format!(" (attr {:?} ", attr.name));
                write_attr_value(out, &attr.value);
                out.push(')');
            }
            for child in &el.children {
                out.push(' ');
                write_statement(out, child);
            }
            out.push(')');
        }
        Statement::Concat(c) => {
            out.push_str("(concat");
            for part in &c.parts {
                out.push(' ');
                write_statement(out, part);
            }
            out.push(')');
        }
    }
}

fn write_attr_value(out: &mut String, value: &AttrValue) {
    match value {
        AttrValue::Text(t) => out.push_str(&format!("(text {:?})", t.chars)),
        AttrValue::Mustache(stmt) => write_statement(out, stmt),
        AttrValue::Concat(c) => {
            out.push_str("(concat");
            for part in &c.parts {
                out.push(' ');
                write_statement(out, part);
            }
            out.push(')');
        }
    }
}

fn write_program(out: &mut String, program: &Program) {
    out.push_str("(program");
    if let Some(params) = &program.block_params {
        out.push_str(" (as");
        for name in &params.names {
            out.push_str(&format!(" {}", name.name));
        }
        out.push(')');
    }
    if program.chained {
        out.push_str(" chained");
    }
    for stmt in &program.body {
        out.push(' ');
        write_statement(out, stmt);
    }
    out.push(')');
}

fn write_call(out: &mut String, call: &Call) {
    out.push_str("(call ");
    write_expression(out, &call.callee);
    for param in &call.params {
        out.push(' ');
        write_expression(out, param);
    }
    write_hash(out, &call.hash);
    out.push(')');
}

fn write_hash(out: &mut String, hash: &Hash) {
    if hash.is_empty() {
        return;
    }
    out.push_str(" (hash");
    for pair in &hash.pairs {
        out.push_str(&format!(" ({}=", pair.key));
        write_expression(out, &pair.value);
        out.push(')');
    }
    out.push(')');
}

fn write_expression(out: &mut String, expr: &Expression) {
    match expr {
        Expression::Path(p) => {
            out.push_str("(path ");
            match &p.head {
                Head::Local(h) => out.push_str(&h.name),
                Head::Arg(h) => out.push_str(&h.name),
                Head::This(_) => out.push_str("this"),
            }
            for seg in &p.tail {
                out.push('.');
                out.push_str(&seg.name);
            }
            out.push(')');
        }
        Expression::SubExpression(s) => {
            out.push_str("(sub ");
            write_call(out, &s.call);
            out.push(')');
        }
        Expression::String(s) => out.push_str(&format!("(str {:?})", s.value)),
        Expression::Number(n) => out.push_str(&format!("(num {})", n.value)),
        Expression::Boolean(b) => out.push_str(&format!("(bool {})", b.value)),
        Expression::Null(_) => out.push_str("(null)"),
        Expression::Undefined(_) => out.push_str("(undefined)"),
    }
}

/// Render a tree back to template source.
pub fn to_source(root: &Root) -> String {
    let mut out = String::new();
    for stmt in &root.body {
        write_source_statement(&mut out, stmt);
    }
    out
}

fn write_source_statement(out: &mut String, stmt: &Statement) {
    match stmt {
        Statement::Content(c) => out.push_str(&c.value),
        Statement::Newline(_) => out.push('\n'),
        Statement::Text(t) => out.push_str(&t.chars),
        Statement::Comment(c) => {
            out.push_str("{{!--");
            out.push_str(&c.value);
            out.push_str("--}}");
        }
        Statement::HtmlComment(c) => {
            out.push_str("<!--");
            out.push_str(&c.value);
            out.push_str("-->");
        }
        Statement::MustacheContent(m) => {
            out.push_str(if m.trusted { "{{{" } else { "{{" });
            write_source_expression(out, &m.value);
            out.push_str(if m.trusted { "}}}" } else { "}}" });
        }
        Statement::Mustache(m) => {
            out.push_str(if m.trusted { "{{{" } else { "{{" });
            write_source_call(out, &m.call);
            out.push_str(if m.trusted { "}}}" } else { "}}" });
        }
        Statement::Block(b) => write_source_block(out, b),
        Statement::Element(el) => {
            out.push('<');
            out.push_str(&el.tag);
            for attr in &el.attributes {
                out.push(' ');
                out.push_str(&attr.name);
                write_source_attr_value(out, &attr.value);
            }
            if el.self_closing {
                out.push_str(" />");
                return;
            }
            out.push('>');
            for child in &el.children {
                write_source_statement(out, child);
            }
            if !is_void_element(&el.tag) {
                out.push_str("</");
                out.push_str(&el.tag);
                out.push('>');
            }
        }
        Statement::Concat(c) => {
            for part in &c.parts {
                write_source_statement(out, part);
            }
        }
    }
}

fn write_source_attr_value(out: &mut String, value: &AttrValue) {
    match value {
        AttrValue::Text(t) if t.chars.is_empty() => {}
        AttrValue::Text(t) => {
            out.push_str("=\"");
            out.push_str(&t.chars);
            out.push('"');
        }
        AttrValue::Mustache(stmt) => {
            out.push('=');
            write_source_statement(out, stmt);
        }
        AttrValue::Concat(c) => {
            out.push_str("=\"");
            for part in &c.parts {
                write_source_statement(out, part);
            }
            out.push('"');
        }
    }
}

fn write_source_block(out: &mut String, b: &BlockStatement) {
    out.push_str("{{#");
    write_source_call(out, &b.call);
    if let Some(params) = &b.program.block_params {
        out.push_str(" as |");
        for (i, name) in params.names.iter().enumerate() {
            if i > 0 {
                out.push(' ');
            }
            out.push_str(&name.name);
        }
        out.push('|');
    }
    out.push_str("}}");
    for stmt in &b.program.body {
        write_source_statement(out, stmt);
    }
    write_source_inverse(out, b.inverse.as_ref());
    out.push_str("{{/");
    out.push_str(block_close_name(&b.call));
    out.push_str("}}");
}

/// A chained inverse holds exactly one nested block that shares this
/// block's close tag; anything else prints as a plain `{{else}}`.
fn write_source_inverse(out: &mut String, inverse: Option<&Program>) {
    let Some(program) = inverse else {
        return;
    };
    if program.chained {
        if let [Statement::Block(nested)] = program.body.as_slice() {
            out.push_str("{{else ");
            write_source_call(out, &nested.call);
            out.push_str("}}");
            for stmt in &nested.program.body {
                write_source_statement(out, stmt);
            }
            write_source_inverse(out, nested.inverse.as_ref());
            return;
        }
    }
    out.push_str("{{else}}");
    for stmt in &program.body {
        write_source_statement(out, stmt);
    }
}

fn block_close_name(call: &Call) -> &str {
    match &call.callee {
        Expression::Path(p) => p.head.name(),
        _ => "block",
    }
}

fn write_source_call(out: &mut String, call: &Call) {
    write_source_expression(out, &call.callee);
    for param in &call.params {
        out.push(' ');
        write_source_expression(out, param);
    }
    for pair in &call.hash.pairs {
        out.push(' ');
        out.push_str(&pair.key);
        out.push('=');
        write_source_expression(out, &pair.value);
    }
}

fn write_source_expression(out: &mut String, expr: &Expression) {
    match expr {
        Expression::Path(p) => {
            match &p.head {
                Head::Local(h) => out.push_str(&h.name),
                Head::Arg(h) => out.push_str(&h.name),
                Head::This(_) => out.push_str("this"),
            }
            for seg in &p.tail {
                out.push('.');
                out.push_str(&seg.name);
            }
        }
        Expression::SubExpression(s) => {
            out.push('(');
            write_source_call(out, &s.call);
            out.push(')');
        }
        Expression::String(s) => out.push_str(&format!("{:?}", s.value)),
        Expression::Number(n) => {
            if n.value.fract() == 0.0 {
                out.push_str(&format!("{}", n.value as i64));
            } else {
                out.push_str(&format!("{}", n.value));
            }
        }
        Expression::Boolean(b) => out.push_str(if b.value { "true" } else { "false" }),
        Expression::Null(_) => out.push_str("null"),
        Expression::Undefined(_) => out.push_str("undefined"),
    }
}

/// One line per node: kind, line:column range and a short source excerpt.
pub fn annotate(source: &str, root: &Root) -> String {
    let mut out = String::new();
    annotate_line(&mut out, source, "Root", root.span, 0);
    for stmt in &root.body {
        annotate_statement(&mut out, source, stmt, 1);
    }
    out
}

fn annotate_statement(out: &mut String, source: &str, stmt: &Statement, depth: usize) {
    annotate_line(out, source, statement_kind(stmt), stmt.span(), depth);
    match stmt {
        Statement::Block(b) => {
            annotate_line(out, source, "Program", b.program.span, depth + 1);
            for child in &b.program.body {
                annotate_statement(out, source, child, depth + 2);
            }
            if let Some(inverse) = &b.inverse {
                annotate_line(out, source, "Program", inverse.span, depth + 1);
                for child in &inverse.body {
                    annotate_statement(out, source, child, depth + 2);
                }
            }
        }
        Statement::Element(el) => {
            for attr in &el.attributes {
                annotate_line(out, source, "AttrNode", attr.span, depth + 1);
                match &attr.value {
                    AttrValue::Mustache(inner) => {
                        annotate_statement(out, source, inner, depth + 2)
                    }
                    AttrValue::Concat(c) => {
                        for part in &c.parts {
                            annotate_statement(out, source, part, depth + 2);
                        }
                    }
                    AttrValue::Text(_) => {}
                }
            }
            for child in &el.children {
                annotate_statement(out, source, child, depth + 1);
            }
        }
        Statement::Concat(c) => {
            for part in &c.parts {
                annotate_statement(out, source, part, depth + 1);
            }
        }
        _ => {}
    }
}

fn annotate_line(out: &mut String, source: &str, kind: &str, span: Span, depth: usize) {
    for _ in 0..depth {
        out.push_str("  ");
    }
    if span.is_missing() {
        out.push_str(&format!("{kind} <missing>\n"));
        return;
    }
    let start = position_at(source, span.start);
    let end = position_at(source, span.end);
    let excerpt: String = source
        .get(span.start..span.end)
        .unwrap_or("")
        .chars()
        .take(32)
        .map(|c| if c == '\n' { '\u{23ce}' } else { c })
        .collect();
    out.push_str(&format!(
        "{kind} {}:{}-{}:{} [{}..{}] {:?}\n",
        start.line, start.column, end.line, end.column, span.start, span.end, excerpt
    ));
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_sexp_for_simple_template() {
        let result = crate::parse("hi {{name}}");
        assert_eq!(
            to_sexp(&result.root),
            "(root (content \"hi \") (mustache (path name)))"
        );
    }

    #[test]
    fn test_sexp_for_block_with_else() {
        let result = crate::parse("{{#if a}}x{{else}}y{{/if}}");
        assert_eq!(
            to_sexp(&result.root),
            "(root (block (call (path if) (path a)) (program (content \"x\")) (program (content \"y\"))))"
        );
    }

    #[test]
    fn test_sexp_for_call_with_hash() {
        let result = crate::parse("{{link url target=\"_blank\"}}");
        assert_eq!(
            to_sexp(&result.root),
            "(root (mustache (call (path link) (path url) (hash (target=(str \"_blank\"))))))"
        );
    }

    #[test]
    fn test_structural_hash_ignores_spans() {
        let a = crate::parse("{{name}}").root;
        let b = crate::builders::root(vec![crate::builders::mustache(
            crate::builders::path("name"),
        )]);
        assert_eq!(structural_hash(&a), structural_hash(&b));
        let c = crate::parse("{{other}}").root;
        assert_ne!(structural_hash(&a), structural_hash(&c));
    }

    #[test]
    fn test_reparse_is_structurally_identical() {
        let src = "<ul>{{#each items as |item|}}<li>{{item.name}}</li>{{/each}}</ul>";
        let first = crate::parse(src).root;
        let second = crate::parse(src).root;
        assert_eq!(structural_hash(&first), structural_hash(&second));
        assert_eq!(first, second);
    }

    #[test]
    fn test_source_printer_round_trips() {
        let src = "{{#if a}}x{{else}}y{{/if}}";
        let parsed = crate::parse(src).root;
        assert_eq!(to_source(&parsed), src);
    }

    #[test]
    fn test_printed_builder_output_reparses_equivalently() {
        use crate::builders as b;
        let built = b::root(vec![
            b::content("hello "),
            b::mustache(b::path("user.name")),
            b::newline(),
            b::block(
                b::call(b::path("each"), vec![b::path("items")], vec![]),
                b::program_with_params(vec![b::mustache(b::path("item"))], &["item"]),
                Some(b::program(vec![b::content("none")])),
            ),
            b::element(
                "li",
                vec![b::attr("class", b::attr_text("row"))],
                vec![b::mustache(b::path("x"))],
            ),
        ]);
        let printed = to_source(&built);
        let reparsed = crate::parse(&printed);
        assert!(reparsed.errors.is_empty(), "{:?}", reparsed.errors);
        assert_eq!(structural_hash(&built), structural_hash(&reparsed.root));
    }

    #[test]
    fn test_annotate_lists_positions() {
        let result = crate::parse("hi\n{{name}}");
        let listing = annotate("hi\n{{name}}", &result.root);
        assert!(listing.starts_with("Root 1:0-2:8 [0..11]"));
        assert!(listing.contains("MustacheContent 2:0-2:8 [3..11]"));
    }
}
