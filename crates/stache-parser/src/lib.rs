//! stache Parser
//!
//! Parses stache template source (mustache expressions embedded in HTML)
//! into a position-exact AST. The grammar side handles mustaches, blocks
//! and comments; content between them streams through an embedded HTML
//! tokenizer that assembles elements and attributes, so dynamic parts can
//! appear in text and attribute-value positions.
//!
//! # Example
//!
//! ```
//! let result = stache_parser::parse("<p>{{greeting}}</p>");
//! assert!(result.errors.is_empty());
//! assert_eq!(result.root.body.len(), 1);
//! ```

pub mod ast;
pub mod builders;
pub mod combine;
pub mod debug;
mod element;
mod grammar;
mod html;
pub mod macros;
mod parser;
pub mod position;
mod stream;
pub mod visitor;

pub use ast::Root;
pub use combine::combine_content;
pub use position::{position_at, span_positions, Position};
pub use stache_lexer::{Span, Token, TokenKind};

use crate::macros::MACROS_V1;
use crate::parser::TemplateParser;
use crate::stream::Tokens;
use stache_lexer::Lexer;

/// A parse problem, recoverable or fatal, located by byte span.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Parse error at bytes {}..{}: {message}", .span.start, .span.end)]
pub struct Diagnostic {
    pub message: String,
    pub span: Span,
}

/// How the parser reacts to recoverable problems.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ErrorMode {
    /// Record a diagnostic, synthesize a placeholder and keep going.
    #[default]
    Recover,
    /// Stop at the first diagnostic.
    FailFast,
}

/// Callback receiving one line per parser event (rule enter/exit, token
/// consumption, diagnostics).
pub type TraceFn = Box<dyn FnMut(&str)>;

pub struct ParseOptions {
    pub mode: ErrorMode,
    /// Carried through to [`ParseResult`] for error reporting by callers.
    pub module_name: Option<String>,
    pub trace: Option<TraceFn>,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            mode: ErrorMode::Recover,
            module_name: None,
            trace: None,
        }
    }
}

pub struct ParseResult {
    pub root: Root,
    pub errors: Vec<Diagnostic>,
    pub module_name: Option<String>,
}

/// Parse with default options (recovering mode).
pub fn parse(source: &str) -> ParseResult {
    parse_with(source, ParseOptions::default())
}

pub fn parse_with(source: &str, options: ParseOptions) -> ParseResult {
    let tokens = match Lexer::tokenize(source) {
        Ok(tokens) => tokens,
        Err(err) => {
            return ParseResult {
                root: Root {
                    body: Vec::new(),
                    span: Span::new(0, source.len()),
                },
                errors: vec![Diagnostic {
                    message: err.message,
                    span: err.span,
                }],
                module_name: options.module_name,
            }
        }
    };
    let cursor = Tokens::new(&tokens);
    let mut p = TemplateParser::new(source, cursor, &MACROS_V1, options.mode, options.trace);
    let mut root = grammar::parse_root(&mut p);
    combine::combine_content(&mut root);
    ParseResult {
        root,
        errors: p.diagnostics,
        module_name: options.module_name,
    }
}

/// Input for template-oriented callers: when `ast` is given the source is
/// not re-parsed and the tree passes through unchanged.
pub struct TemplateInput {
    pub source: String,
    pub ast: Option<Root>,
    pub module_name: Option<String>,
}

pub fn parse_template(input: TemplateInput) -> ParseResult {
    match input.ast {
        Some(root) => ParseResult {
            root,
            errors: Vec::new(),
            module_name: input.module_name,
        },
        None => parse_with(
            &input.source,
            ParseOptions {
                module_name: input.module_name,
                ..ParseOptions::default()
            },
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{AttrValue, Expression, Head, Statement};
    use crate::debug::to_sexp;
    use crate::visitor::walk_statements;
    use pretty_assertions::assert_eq;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn ok(source: &str) -> Root {
        let result = parse(source);
        assert_eq!(result.errors, Vec::new(), "unexpected errors for {source:?}");
        result.root
    }

    fn sexp(source: &str) -> String {
        to_sexp(&ok(source))
    }

    // ========================================================================
    // Content and mustaches
    // ========================================================================

    #[test]
    fn test_plain_content() {
        let root = ok("hello");
        assert_eq!(root.span, Span::new(0, 5));
        assert_eq!(root.body.len(), 1);
        match &root.body[0] {
            Statement::Content(c) => {
                assert_eq!(c.value, "hello");
                assert_eq!(c.span, Span::new(0, 5));
            }
            other => panic!("expected content, got {other:?}"),
        }
    }

    #[test]
    fn test_bare_mustache_spans() {
        let root = ok("{{name}}");
        match &root.body[0] {
            Statement::MustacheContent(m) => {
                assert_eq!(m.span, Span::new(0, 8));
                assert!(!m.trusted);
                match &m.value {
                    Expression::Path(p) => {
                        assert_eq!(p.span, Span::new(2, 6));
                        assert!(matches!(&p.head, Head::Local(l) if l.name == "name"));
                    }
                    other => panic!("expected path, got {other:?}"),
                }
            }
            other => panic!("expected bare mustache, got {other:?}"),
        }
    }

    #[test]
    fn test_trusted_mustache() {
        let root = ok("{{{html}}}");
        assert!(matches!(&root.body[0], Statement::MustacheContent(m) if m.trusted));
    }

    #[test]
    fn test_mustache_with_params_is_a_call() {
        assert_eq!(
            sexp("{{greet user \"hi\" 3}}"),
            "(root (mustache (call (path greet) (path user) (str \"hi\") (num 3))))"
        );
    }

    #[test]
    fn test_keyword_literals() {
        assert_eq!(
            sexp("{{pick true false null undefined}}"),
            "(root (mustache (call (path pick) (bool true) (bool false) (null) (undefined))))"
        );
    }

    #[test]
    fn test_this_and_arg_paths() {
        assert_eq!(
            sexp("{{this.title}} {{@index}}"),
            "(root (mustache (path this.title)) (content \" \") (mustache (path @index)))"
        );
    }

    #[test]
    fn test_keyword_followed_by_dot_is_a_path() {
        assert_eq!(sexp("{{null.x}}"), "(root (mustache (path null.x)))");
    }

    #[test]
    fn test_sub_expression() {
        assert_eq!(
            sexp("{{if (eq a b) yes}}"),
            "(root (mustache (call (path if) (sub (call (path eq) (path a) (path b))) (path yes))))"
        );
    }

    #[test]
    fn test_escaped_open_is_literal_braces() {
        let root = ok("\\{{name}}");
        assert_eq!(root.body.len(), 1);
        match &root.body[0] {
            Statement::Content(c) => {
                assert_eq!(c.value, "{{name}}");
                assert_eq!(c.span, Span::new(0, 9));
            }
            other => panic!("expected content, got {other:?}"),
        }
    }

    #[test]
    fn test_adjacent_content_and_newlines_merge() {
        let root = ok("a\nb");
        assert_eq!(root.body.len(), 1);
        match &root.body[0] {
            Statement::Content(c) => {
                assert_eq!(c.value, "a\nb");
                assert_eq!(c.span, Span::new(0, 3));
            }
            other => panic!("expected content, got {other:?}"),
        }
    }

    #[test]
    fn test_mustache_comment() {
        let root = ok("a{{! note }}b");
        assert_eq!(root.body.len(), 3);
        assert!(matches!(&root.body[1], Statement::Comment(c) if c.value == " note "));
    }

    #[test]
    fn test_block_comment_keeps_inner_braces() {
        let root = ok("{{!-- keep {{this}} --}}x");
        assert!(
            matches!(&root.body[0], Statement::Comment(c) if c.value == " keep {{this}} ")
        );
    }

    // ========================================================================
    // Blocks
    // ========================================================================

    #[test]
    fn test_block_with_else() {
        let root = ok("{{#if a}}x{{else}}y{{/if}}");
        match &root.body[0] {
            Statement::Block(b) => {
                assert_eq!(b.span, Span::new(0, 26));
                assert_eq!(b.program.body.len(), 1);
                assert!(
                    matches!(&b.program.body[0], Statement::Content(c) if c.span == Span::new(9, 10))
                );
                let inverse = b.inverse.as_ref().unwrap();
                assert!(!inverse.chained);
                assert!(
                    matches!(&inverse.body[0], Statement::Content(c) if c.value == "y")
                );
            }
            other => panic!("expected block, got {other:?}"),
        }
    }

    #[test]
    fn test_else_if_desugars_to_chained_block() {
        let root = ok("{{#if a}}1{{else if b}}2{{else}}3{{/if}}");
        match &root.body[0] {
            Statement::Block(outer) => {
                let inverse = outer.inverse.as_ref().unwrap();
                assert!(inverse.chained);
                assert_eq!(inverse.body.len(), 1);
                match &inverse.body[0] {
                    Statement::Block(nested) => {
                        assert_eq!(
                            to_sexp(&builders::root(vec![Statement::Block(nested.clone())])),
                            "(root (block (call (path if) (path b)) (program (content \"2\")) (program (content \"3\"))))"
                        );
                    }
                    other => panic!("expected nested block, got {other:?}"),
                }
            }
            other => panic!("expected block, got {other:?}"),
        }
    }

    #[test]
    fn test_block_params() {
        let root = ok("{{#each items as |item i|}}{{item}}{{/each}}");
        match &root.body[0] {
            Statement::Block(b) => {
                let params = b.program.block_params.as_ref().unwrap();
                let names: Vec<&str> = params.names.iter().map(|n| n.name.as_str()).collect();
                assert_eq!(names, vec!["item", "i"]);
            }
            other => panic!("expected block, got {other:?}"),
        }
    }

    #[test]
    fn test_standalone_control_lines_absorb_whitespace() {
        let src = "{{#if a}}\n  x\n  {{else}}\n  y\n{{/if}}";
        let root = ok(src);
        assert_eq!(root.body.len(), 1);
        match &root.body[0] {
            Statement::Block(b) => {
                // the whole template belongs to the block
                assert_eq!(b.span, Span::new(0, src.len()));
                assert_eq!(b.program.body.len(), 1);
                assert!(
                    matches!(&b.program.body[0], Statement::Content(c) if c.value == "  x\n")
                );
                let inverse = b.inverse.as_ref().unwrap();
                assert_eq!(inverse.body.len(), 1);
                assert!(
                    matches!(&inverse.body[0], Statement::Content(c) if c.value == "  y\n")
                );
            }
            other => panic!("expected block, got {other:?}"),
        }
    }

    #[test]
    fn test_indented_inline_block_keeps_leading_whitespace() {
        let root = ok("a\n  {{#if x}}b{{/if}}");
        assert_eq!(root.body.len(), 2);
        assert!(matches!(&root.body[0], Statement::Content(c) if c.value == "a\n  "));
        assert!(matches!(&root.body[1], Statement::Block(_)));
    }

    #[test]
    fn test_non_standalone_else_keeps_line_whitespace() {
        let root = ok("{{#if x}}\n  {{else}}tail\n{{/if}}");
        match &root.body[0] {
            Statement::Block(b) => {
                assert_eq!(b.program.body.len(), 1);
                assert!(matches!(&b.program.body[0], Statement::Content(c) if c.value == "  "));
                let inverse = b.inverse.as_ref().unwrap();
                assert_eq!(inverse.body.len(), 1);
                assert!(
                    matches!(&inverse.body[0], Statement::Content(c) if c.value == "tail\n")
                );
            }
            other => panic!("expected block, got {other:?}"),
        }
    }

    #[test]
    fn test_inline_block_keeps_surrounding_content() {
        let root = ok("a {{#if x}}b{{/if}} c");
        assert_eq!(root.body.len(), 3);
        assert!(matches!(&root.body[0], Statement::Content(c) if c.value == "a "));
        assert!(matches!(&root.body[1], Statement::Block(_)));
        assert!(matches!(&root.body[2], Statement::Content(c) if c.value == " c"));
    }

    #[test]
    fn test_empty_program_has_collapsed_span() {
        let root = ok("{{#if a}}{{/if}}");
        match &root.body[0] {
            Statement::Block(b) => {
                assert!(b.program.body.is_empty());
                assert_eq!(b.program.span, Span::collapsed(9));
            }
            other => panic!("expected block, got {other:?}"),
        }
    }

    // ========================================================================
    // HTML
    // ========================================================================

    #[test]
    fn test_element_with_dynamic_child() {
        assert_eq!(
            sexp("<p>{{x}}</p>"),
            "(root (element \"p\" (mustache (path x))))"
        );
    }

    #[test]
    fn test_double_open_angle_is_content() {
        assert_eq!(
            sexp("a<<div>x</div>"),
            "(root (content \"a<\") (element \"div\" (content \"x\")))"
        );
    }

    #[test]
    fn test_attribute_with_text_and_mustache_is_concat() {
        let root = ok("<a href=\"u{{x}}\">t</a>");
        match &root.body[0] {
            Statement::Element(el) => {
                assert_eq!(el.tag, "a");
                assert_eq!(el.attributes.len(), 1);
                match &el.attributes[0].value {
                    AttrValue::Concat(c) => {
                        assert_eq!(c.parts.len(), 2);
                        assert!(matches!(&c.parts[0], Statement::Text(t) if t.chars == "u"));
                        assert!(matches!(&c.parts[1], Statement::MustacheContent(_)));
                    }
                    other => panic!("expected concat, got {other:?}"),
                }
                assert!(matches!(&el.children[0], Statement::Content(c) if c.value == "t"));
            }
            other => panic!("expected element, got {other:?}"),
        }
    }

    #[test]
    fn test_quoted_single_dynamic_attr_stays_concat() {
        let root = ok("<a id=\"{{x}}\"></a>");
        match &root.body[0] {
            Statement::Element(el) => {
                assert!(matches!(&el.attributes[0].value, AttrValue::Concat(_)));
            }
            other => panic!("expected element, got {other:?}"),
        }
    }

    #[test]
    fn test_unquoted_single_dynamic_attr_is_bare() {
        let root = ok("<a id={{x}}></a>");
        match &root.body[0] {
            Statement::Element(el) => {
                assert!(matches!(&el.attributes[0].value, AttrValue::Mustache(_)));
            }
            other => panic!("expected element, got {other:?}"),
        }
    }

    #[test]
    fn test_block_inside_element() {
        assert_eq!(
            sexp("<ul>{{#each xs}}<li>i</li>{{/each}}</ul>"),
            "(root (element \"ul\" (block (call (path each) (path xs)) (program (element \"li\" (content \"i\"))))))"
        );
    }

    #[test]
    fn test_html_comment() {
        let root = ok("<!-- note -->");
        assert!(matches!(&root.body[0], Statement::HtmlComment(c) if c.value == " note "));
    }

    #[test]
    fn test_void_and_self_closing_elements() {
        let root = ok("<br><img src=\"x\"/>");
        assert_eq!(root.body.len(), 2);
        assert!(matches!(&root.body[0], Statement::Element(el) if el.tag == "br"));
        assert!(
            matches!(&root.body[1], Statement::Element(el) if el.tag == "img" && el.self_closing)
        );
    }

    // ========================================================================
    // Span discipline
    // ========================================================================

    #[test]
    fn test_child_spans_nest_in_parents() {
        let src = "<div class=\"a {{b}}\">{{#if c}}<p>{{d}}</p>{{/if}}</div>\n";
        let root = ok(src);
        let root_span = root.span;
        walk_statements(&root, &mut |stmt| {
            let span = stmt.span();
            assert!(
                root_span.contains(span),
                "span {span:?} escapes the root for {src:?}"
            );
        });
    }

    #[test]
    fn test_top_level_spans_tile_the_source() {
        let src = "a{{x}}<p>b</p>{{#if c}}d{{/if}}e\n";
        let root = ok(src);
        let mut cursor = 0;
        for stmt in &root.body {
            let span = stmt.span();
            assert_eq!(span.start, cursor, "gap before {stmt:?}");
            cursor = span.end;
        }
        assert_eq!(cursor, src.len());
    }

    // ========================================================================
    // Error handling
    // ========================================================================

    #[test]
    fn test_unclosed_block_recovers() {
        let result = parse("{{#if a}}x");
        assert_eq!(result.errors.len(), 1);
        assert!(result.errors[0].message.contains("unclosed block {{#if}}"));
        assert!(matches!(&result.root.body[0], Statement::Block(_)));
    }

    #[test]
    fn test_mismatched_block_close_name() {
        let result = parse("{{#if a}}x{{/each}}");
        assert_eq!(result.errors.len(), 1);
        assert!(result.errors[0]
            .message
            .contains("{{/each}} does not match {{#if}}"));
    }

    #[test]
    fn test_empty_mustache_synthesizes_undefined() {
        let result = parse("{{}}");
        assert_eq!(result.errors.len(), 1);
        assert!(result.errors[0].message.contains("expected an expression"));
        match &result.root.body[0] {
            Statement::MustacheContent(m) => {
                assert!(matches!(m.value, Expression::Undefined(_)));
            }
            other => panic!("expected mustache, got {other:?}"),
        }
    }

    #[test]
    fn test_stray_block_close_at_top_level() {
        let result = parse("a{{/if}}b");
        assert_eq!(result.errors.len(), 1);
        assert!(result.errors[0].message.contains("without an open block"));
        // surrounding content survives and merges across the dropped close
        assert!(matches!(&result.root.body[0], Statement::Content(c) if c.value == "ab"));
    }

    #[test]
    fn test_dangling_path_dot() {
        let result = parse("{{a.}}");
        assert_eq!(result.errors.len(), 1);
        assert!(result.errors[0].message.contains("path segment"));
        match &result.root.body[0] {
            Statement::MustacheContent(m) => match &m.value {
                Expression::Path(p) => assert_eq!(p.tail[0].name, "<error>"),
                other => panic!("expected path, got {other:?}"),
            },
            other => panic!("expected mustache, got {other:?}"),
        }
    }

    #[test]
    fn test_mustache_in_tag_body_is_an_error() {
        let result = parse("<div {{a}}>x</div>");
        assert_eq!(result.errors.len(), 1);
        assert!(result.errors[0].message.contains("tag body"));
    }

    #[test]
    fn test_unclosed_element_is_an_error() {
        let result = parse("<div>x");
        assert_eq!(result.errors.len(), 1);
        assert!(result.errors[0].message.contains("unclosed element <div>"));
    }

    #[test]
    fn test_lexer_error_surfaces_as_diagnostic() {
        let result = parse("{{name");
        assert_eq!(result.errors.len(), 1);
        assert!(result.root.body.is_empty());
    }

    #[test]
    fn test_fail_fast_stops_at_first_error() {
        let result = parse_with(
            "{{}} {{also bad}}",
            ParseOptions {
                mode: ErrorMode::FailFast,
                ..ParseOptions::default()
            },
        );
        assert_eq!(result.errors.len(), 1);
    }

    #[test]
    fn test_recover_mode_collects_multiple_errors() {
        let result = parse("{{}}{{a.}}");
        assert_eq!(result.errors.len(), 2);
    }

    // ========================================================================
    // Options
    // ========================================================================

    #[test]
    fn test_trace_reports_rule_activity() {
        let lines = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&lines);
        let result = parse_with(
            "{{x}}",
            ParseOptions {
                trace: Some(Box::new(move |line| sink.borrow_mut().push(line.to_owned()))),
                ..ParseOptions::default()
            },
        );
        assert!(result.errors.is_empty());
        let lines = lines.borrow();
        assert!(lines.iter().any(|l| l.starts_with("enter statement")));
        assert!(lines.iter().any(|l| l.starts_with("exit expression")));
        assert!(lines.iter().any(|l| l.starts_with("consume Identifier")));
    }

    #[test]
    fn test_parse_template_passes_ast_through() {
        let first = parse("{{x}}");
        let reused = parse_template(TemplateInput {
            source: String::new(),
            ast: Some(first.root.clone()),
            module_name: Some("app/demo".to_owned()),
        });
        assert!(reused.errors.is_empty());
        assert_eq!(reused.module_name.as_deref(), Some("app/demo"));
        assert_eq!(reused.root, first.root);
    }
}
