//! Element construction.
//!
//! `ElementStack` is the sink behind the HTML tokenizer: it assembles
//! elements, attributes, text runs and HTML comments from tokenizer
//! events, and it is where finished mustache statements get spliced in.
//!
//! Block programs push a fragment boundary; an element must be closed
//! inside the fragment it was opened in, so `</div>` never reaches across
//! `{{#if}}`/`{{/if}}`.

use crate::ast::{
    AttrNode, AttrValue, ConcatStatement, ContentStatement, ElementNode, HtmlCommentNode,
    NewlineNode, Statement, TextNode,
};
use crate::html::{TokState, TokenizerSink};
use crate::Diagnostic;
use stache_lexer::{is_void_element, Span};

enum Constructing {
    Fragment(Vec<Statement>),
    Element(ConstructingElement),
}

struct ConstructingElement {
    tag: String,
    start: usize,
    attributes: Vec<AttrNode>,
    current_attr: Option<PendingAttr>,
    children: Vec<Statement>,
    /// Set once the start tag's `>` has been seen.
    finished_open: bool,
}

impl ConstructingElement {
    fn new(start: usize) -> Self {
        Self {
            tag: String::new(),
            start,
            attributes: Vec::new(),
            current_attr: None,
            children: Vec::new(),
            finished_open: false,
        }
    }

    fn finalize(self, end: usize, self_closing: bool) -> ElementNode {
        ElementNode {
            tag: self.tag,
            attributes: self.attributes,
            children: self.children,
            self_closing,
            span: Span::new(self.start, end),
        }
    }
}

struct PendingAttr {
    name: String,
    name_start: usize,
    name_end: usize,
    value: Option<PendingValue>,
}

struct PendingValue {
    quoted: bool,
    /// Offset of the opening quote, or of the first value character.
    start: usize,
    end: usize,
    parts: Vec<Statement>,
    text: String,
    text_start: usize,
    text_end: usize,
}

impl PendingValue {
    fn new(quoted: bool, start: usize) -> Self {
        Self {
            quoted,
            start,
            end: start,
            parts: Vec::new(),
            text: String::new(),
            text_start: start,
            text_end: start,
        }
    }

    fn push_char(&mut self, c: char, span: Span) {
        if self.text.is_empty() {
            self.text_start = span.start;
        }
        self.text.push(c);
        self.text_end = span.end;
    }

    fn flush_text(&mut self) {
        if self.text.is_empty() {
            return;
        }
        let chars = std::mem::take(&mut self.text);
        self.parts.push(Statement::Text(TextNode {
            chars,
            span: Span::new(self.text_start, self.text_end),
        }));
    }

    fn push_part(&mut self, stmt: Statement) {
        self.flush_text();
        self.parts.push(stmt);
    }

    fn finalize(mut self) -> AttrValue {
        self.flush_text();
        let quoted = self.quoted;
        match self.parts.len() {
            0 => {
                let at = if quoted { self.start + 1 } else { self.start };
                AttrValue::Text(TextNode {
                    chars: String::new(),
                    span: Span::collapsed(at),
                })
            }
            1 => {
                let only = match self.parts.pop() {
                    Some(part) => part,
                    None => unreachable!(),
                };
                match only {
                    Statement::Text(t) => AttrValue::Text(t),
                    // A quoted single dynamic part stays a concat; only a
                    // bare unquoted mustache collapses.
                    dynamic if quoted => AttrValue::Concat(ConcatStatement {
                        span: dynamic.span(),
                        parts: vec![dynamic],
                    }),
                    dynamic => AttrValue::Mustache(Box::new(dynamic)),
                }
            }
            _ => {
                let first = self.parts[0].span();
                let last = self.parts[self.parts.len() - 1].span();
                AttrValue::Concat(ConcatStatement {
                    parts: self.parts,
                    span: first.to(last),
                })
            }
        }
    }
}

struct PendingText {
    chars: String,
    start: usize,
    end: usize,
}

struct PendingComment {
    value: String,
    start: usize,
    end: usize,
}

pub(crate) struct ElementStack {
    stack: Vec<Constructing>,
    text: Option<PendingText>,
    comment: Option<PendingComment>,
    end_tag: Option<(String, usize)>,
    errors: Vec<Diagnostic>,
}

impl ElementStack {
    pub(crate) fn new() -> Self {
        Self {
            stack: Vec::new(),
            text: None,
            comment: None,
            end_tag: None,
            errors: Vec::new(),
        }
    }

    pub(crate) fn take_errors(&mut self) -> Vec<Diagnostic> {
        std::mem::take(&mut self.errors)
    }

    /// Open a statement scope: the root body or a block program.
    pub(crate) fn push_fragment(&mut self) {
        self.stack.push(Constructing::Fragment(Vec::new()));
    }

    /// Close the innermost fragment and return its statements. Elements
    /// still open inside it are force-closed with a diagnostic.
    pub(crate) fn pop_fragment(&mut self, end: usize) -> Vec<Statement> {
        while matches!(self.stack.last(), Some(Constructing::Element(_))) {
            self.force_close_top(end);
        }
        match self.stack.pop() {
            Some(Constructing::Fragment(stmts)) => stmts,
            Some(other) => {
                self.stack.push(other);
                Vec::new()
            }
            None => Vec::new(),
        }
    }

    /// Splice a finished mustache/block/comment statement at the position
    /// the tokenizer state describes.
    pub(crate) fn append_statement(&mut self, stmt: Statement, state: TokState) {
        match state {
            TokState::Data => self.append_node(stmt),
            TokState::BeforeAttrValue
            | TokState::AttrValueDouble
            | TokState::AttrValueSingle
            | TokState::AttrValueUnquoted => {
                let span = stmt.span();
                match self.current_attr() {
                    Some(attr) => {
                        let value = attr
                            .value
                            .get_or_insert_with(|| PendingValue::new(false, span.start));
                        value.push_part(stmt);
                    }
                    None => self.errors.push(Diagnostic {
                        message: "dynamic content is not allowed here".to_owned(),
                        span,
                    }),
                }
            }
            other => self.errors.push(Diagnostic {
                message: format!(
                    "dynamic content is not allowed inside {}",
                    other.describe()
                ),
                span: stmt.span(),
            }),
        }
    }

    fn append_node(&mut self, stmt: Statement) {
        match self.stack.last_mut() {
            Some(Constructing::Element(el)) => el.children.push(stmt),
            Some(Constructing::Fragment(stmts)) => stmts.push(stmt),
            None => {}
        }
    }

    fn top_element(&mut self) -> Option<&mut ConstructingElement> {
        match self.stack.last_mut() {
            Some(Constructing::Element(el)) => Some(el),
            _ => None,
        }
    }

    fn current_attr(&mut self) -> Option<&mut PendingAttr> {
        self.top_element().and_then(|el| el.current_attr.as_mut())
    }

    fn finalize_pending_attr(&mut self) {
        if let Some(el) = self.top_element() {
            if let Some(attr) = el.current_attr.take() {
                let (value, end) = match attr.value {
                    Some(v) => {
                        let end = v.end;
                        (v.finalize(), end)
                    }
                    None => (
                        AttrValue::Text(TextNode {
                            chars: String::new(),
                            span: Span::collapsed(attr.name_end),
                        }),
                        attr.name_end,
                    ),
                };
                el.attributes.push(AttrNode {
                    name: attr.name,
                    name_span: Span::new(attr.name_start, attr.name_end),
                    value,
                    span: Span::new(attr.name_start, end),
                });
            }
        }
    }

    fn close_element(&mut self, name: &str, start: usize, end: usize) {
        // Find the matching element among the contiguous open elements
        // above the innermost fragment.
        let mut depth = 0;
        let mut found = None;
        for entry in self.stack.iter().rev() {
            match entry {
                Constructing::Element(el) => {
                    if el.tag.eq_ignore_ascii_case(name) {
                        found = Some(depth);
                        break;
                    }
                    depth += 1;
                }
                Constructing::Fragment(_) => break,
            }
        }
        match found {
            Some(depth) => {
                for _ in 0..depth {
                    self.force_close_top(start);
                }
                if let Some(Constructing::Element(el)) = self.stack.pop() {
                    let node = el.finalize(end, false);
                    self.append_node(Statement::Element(node));
                }
            }
            None => self.errors.push(Diagnostic {
                message: format!("unexpected closing tag </{name}>"),
                span: Span::new(start, end),
            }),
        }
    }

    fn force_close_top(&mut self, end: usize) {
        if let Some(Constructing::Element(el)) = self.stack.pop() {
            self.errors.push(Diagnostic {
                message: format!("unclosed element <{}>", el.tag),
                span: Span::new(el.start, end),
            });
            let node = el.finalize(end, false);
            self.append_node(Statement::Element(node));
        }
    }
}

impl TokenizerSink for ElementStack {
    fn begin_start_tag(&mut self, offset: usize) {
        self.stack
            .push(Constructing::Element(ConstructingElement::new(offset)));
    }

    fn begin_end_tag(&mut self, offset: usize) {
        self.end_tag = Some((String::new(), offset));
    }

    fn append_to_tag_name(&mut self, c: char) {
        if let Some((name, _)) = self.end_tag.as_mut() {
            name.push(c);
        } else if let Some(el) = self.top_element() {
            if !el.finished_open {
                el.tag.push(c);
            }
        }
    }

    fn begin_attribute(&mut self, offset: usize) {
        self.finalize_pending_attr();
        if let Some(el) = self.top_element() {
            el.current_attr = Some(PendingAttr {
                name: String::new(),
                name_start: offset,
                name_end: offset,
                value: None,
            });
        }
    }

    fn append_to_attribute_name(&mut self, c: char) {
        if let Some(attr) = self.current_attr() {
            attr.name.push(c);
            attr.name_end += c.len_utf8();
        }
    }

    fn begin_attribute_value(&mut self, quoted: bool, offset: usize) {
        if let Some(attr) = self.current_attr() {
            attr.value = Some(PendingValue::new(quoted, offset));
        }
    }

    fn append_to_attribute_value(&mut self, c: char, span: Span) {
        if let Some(value) = self.current_attr().and_then(|a| a.value.as_mut()) {
            value.push_char(c, span);
        }
    }

    fn finish_attribute_value(&mut self, offset: usize) {
        if let Some(value) = self.current_attr().and_then(|a| a.value.as_mut()) {
            value.end = offset;
        }
        self.finalize_pending_attr();
    }

    fn finish_tag(&mut self, offset: usize, self_closing: bool) {
        if let Some((name, start)) = self.end_tag.take() {
            self.close_element(&name, start, offset);
            return;
        }
        self.finalize_pending_attr();
        let close_now = match self.top_element() {
            Some(el) => {
                el.finished_open = true;
                self_closing || is_void_element(&el.tag)
            }
            None => false,
        };
        if close_now {
            if let Some(Constructing::Element(el)) = self.stack.pop() {
                let node = el.finalize(offset, self_closing);
                self.append_node(Statement::Element(node));
            }
        }
    }

    fn begin_data(&mut self, offset: usize) {
        self.text = Some(PendingText {
            chars: String::new(),
            start: offset,
            end: offset,
        });
    }

    fn append_to_data(&mut self, c: char, end: usize) {
        if let Some(text) = self.text.as_mut() {
            text.chars.push(c);
            text.end = end;
        }
    }

    fn finish_data(&mut self, offset: usize) {
        if let Some(text) = self.text.take() {
            let span = Span::new(text.start, text.end.max(offset));
            let stmt = if text.chars == "\n" {
                Statement::Newline(NewlineNode { span })
            } else {
                Statement::Content(ContentStatement {
                    value: text.chars,
                    span,
                })
            };
            self.append_node(stmt);
        }
    }

    fn begin_comment(&mut self, offset: usize) {
        self.comment = Some(PendingComment {
            value: String::new(),
            start: offset,
            end: offset,
        });
    }

    fn append_to_comment(&mut self, c: char, end: usize) {
        if let Some(comment) = self.comment.as_mut() {
            comment.value.push(c);
            comment.end = end;
        }
    }

    fn finish_comment(&mut self, offset: usize) {
        if let Some(comment) = self.comment.take() {
            self.append_node(Statement::HtmlComment(HtmlCommentNode {
                value: comment.value,
                span: Span::new(comment.start, comment.end.max(offset)),
            }));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{Expression, Head, MustacheContent, PathExpression};
    use crate::html::Tokenizer;
    use pretty_assertions::assert_eq;

    fn feed(stack: &mut ElementStack, tok: &mut Tokenizer, src: &str, base: usize) {
        tok.tokenize_part(src, Span::new(base, base + src.len()), stack);
        tok.flush_data(base + src.len(), stack);
    }

    fn mustache(span: Span) -> Statement {
        Statement::MustacheContent(MustacheContent {
            value: Expression::Path(PathExpression {
                head: Head::Local(crate::ast::LocalReference {
                    name: "x".to_owned(),
                    span,
                }),
                tail: Vec::new(),
                span,
            }),
            trusted: false,
            span,
        })
    }

    #[test]
    fn test_element_with_text_child() {
        let mut stack = ElementStack::new();
        let mut tok = Tokenizer::new();
        stack.push_fragment();
        feed(&mut stack, &mut tok, "<p>hi</p>", 0);
        let body = stack.pop_fragment(9);
        assert!(stack.take_errors().is_empty());
        assert_eq!(body.len(), 1);
        match &body[0] {
            Statement::Element(el) => {
                assert_eq!(el.tag, "p");
                assert_eq!(el.span, Span::new(0, 9));
                assert_eq!(el.children.len(), 1);
                match &el.children[0] {
                    Statement::Content(c) => {
                        assert_eq!(c.value, "hi");
                        assert_eq!(c.span, Span::new(3, 5));
                    }
                    other => panic!("expected content, got {other:?}"),
                }
            }
            other => panic!("expected element, got {other:?}"),
        }
    }

    #[test]
    fn test_void_element_closes_itself() {
        let mut stack = ElementStack::new();
        let mut tok = Tokenizer::new();
        stack.push_fragment();
        feed(&mut stack, &mut tok, "<br>after", 0);
        let body = stack.pop_fragment(9);
        assert!(stack.take_errors().is_empty());
        assert_eq!(body.len(), 2);
        assert!(matches!(&body[0], Statement::Element(el) if el.tag == "br"));
        assert!(matches!(&body[1], Statement::Content(_)));
    }

    #[test]
    fn test_static_attribute() {
        let mut stack = ElementStack::new();
        let mut tok = Tokenizer::new();
        stack.push_fragment();
        feed(&mut stack, &mut tok, "<a href=\"x\"></a>", 0);
        let body = stack.pop_fragment(16);
        match &body[0] {
            Statement::Element(el) => {
                assert_eq!(el.attributes.len(), 1);
                let attr = &el.attributes[0];
                assert_eq!(attr.name, "href");
                assert_eq!(attr.name_span, Span::new(3, 7));
                match &attr.value {
                    AttrValue::Text(t) => {
                        assert_eq!(t.chars, "x");
                        assert_eq!(t.span, Span::new(9, 10));
                    }
                    other => panic!("expected text value, got {other:?}"),
                }
            }
            other => panic!("expected element, got {other:?}"),
        }
    }

    #[test]
    fn test_quoted_single_dynamic_value_stays_concat() {
        let mut stack = ElementStack::new();
        let mut tok = Tokenizer::new();
        stack.push_fragment();
        // <a id="{{x}}"></a> with the mustache spliced between chunks
        feed(&mut stack, &mut tok, "<a id=\"", 0);
        stack.append_statement(mustache(Span::new(7, 12)), tok.state());
        feed(&mut stack, &mut tok, "\"></a>", 12);
        let body = stack.pop_fragment(18);
        match &body[0] {
            Statement::Element(el) => match &el.attributes[0].value {
                AttrValue::Concat(c) => assert_eq!(c.parts.len(), 1),
                other => panic!("expected concat, got {other:?}"),
            },
            other => panic!("expected element, got {other:?}"),
        }
    }

    #[test]
    fn test_unquoted_single_dynamic_value_is_bare_mustache() {
        let mut stack = ElementStack::new();
        let mut tok = Tokenizer::new();
        stack.push_fragment();
        feed(&mut stack, &mut tok, "<a id=", 0);
        tok.begin_unquoted_value();
        stack.append_statement(mustache(Span::new(6, 11)), tok.state());
        feed(&mut stack, &mut tok, "></a>", 11);
        let body = stack.pop_fragment(16);
        match &body[0] {
            Statement::Element(el) => {
                assert!(matches!(&el.attributes[0].value, AttrValue::Mustache(_)));
            }
            other => panic!("expected element, got {other:?}"),
        }
    }

    #[test]
    fn test_mixed_value_is_concat() {
        let mut stack = ElementStack::new();
        let mut tok = Tokenizer::new();
        stack.push_fragment();
        feed(&mut stack, &mut tok, "<a class=\"a ", 0);
        stack.append_statement(mustache(Span::new(12, 17)), tok.state());
        feed(&mut stack, &mut tok, "\"></a>", 17);
        let body = stack.pop_fragment(23);
        match &body[0] {
            Statement::Element(el) => match &el.attributes[0].value {
                AttrValue::Concat(c) => {
                    assert_eq!(c.parts.len(), 2);
                    assert!(matches!(&c.parts[0], Statement::Text(t) if t.chars == "a "));
                    assert!(matches!(&c.parts[1], Statement::MustacheContent(_)));
                }
                other => panic!("expected concat, got {other:?}"),
            },
            other => panic!("expected element, got {other:?}"),
        }
    }

    #[test]
    fn test_mustache_in_tag_body_is_rejected() {
        let mut stack = ElementStack::new();
        let mut tok = Tokenizer::new();
        stack.push_fragment();
        feed(&mut stack, &mut tok, "<div ", 0);
        stack.append_statement(mustache(Span::new(5, 10)), tok.state());
        let errors = stack.take_errors();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.contains("tag body"));
    }

    #[test]
    fn test_unclosed_element_is_reported() {
        let mut stack = ElementStack::new();
        let mut tok = Tokenizer::new();
        stack.push_fragment();
        feed(&mut stack, &mut tok, "<div><p>x", 0);
        let body = stack.pop_fragment(9);
        let errors = stack.take_errors();
        assert_eq!(errors.len(), 2);
        assert!(errors[0].message.contains("unclosed element <p>"));
        assert!(errors[1].message.contains("unclosed element <div>"));
        assert_eq!(body.len(), 1);
    }

    #[test]
    fn test_mismatched_close_skips_interleaved_element() {
        let mut stack = ElementStack::new();
        let mut tok = Tokenizer::new();
        stack.push_fragment();
        feed(&mut stack, &mut tok, "<div><p>x</div>", 0);
        let body = stack.pop_fragment(15);
        let errors = stack.take_errors();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.contains("unclosed element <p>"));
        assert_eq!(body.len(), 1);
        assert!(matches!(&body[0], Statement::Element(el) if el.tag == "div"));
    }

    #[test]
    fn test_close_does_not_cross_fragment_boundary() {
        let mut stack = ElementStack::new();
        let mut tok = Tokenizer::new();
        stack.push_fragment();
        feed(&mut stack, &mut tok, "<div>", 0);
        stack.push_fragment();
        feed(&mut stack, &mut tok, "</div>", 5);
        let errors = stack.take_errors();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.contains("unexpected closing tag </div>"));
    }

    #[test]
    fn test_html_comment_node() {
        let mut stack = ElementStack::new();
        let mut tok = Tokenizer::new();
        stack.push_fragment();
        feed(&mut stack, &mut tok, "<!-- hi -->", 0);
        let body = stack.pop_fragment(11);
        match &body[0] {
            Statement::HtmlComment(c) => {
                assert_eq!(c.value, " hi ");
                assert_eq!(c.span, Span::new(0, 11));
            }
            other => panic!("expected html comment, got {other:?}"),
        }
    }

    #[test]
    fn test_newline_data_run_becomes_newline_node() {
        let mut stack = ElementStack::new();
        let mut tok = Tokenizer::new();
        stack.push_fragment();
        feed(&mut stack, &mut tok, "\n", 0);
        let body = stack.pop_fragment(1);
        assert!(matches!(&body[0], Statement::Newline(n) if n.span == Span::new(0, 1)));
    }
}
