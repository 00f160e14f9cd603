//! Post-parse content merging.
//!
//! Parsing produces one node per content token and per newline. This pass
//! merges each run of two or more adjacent content/newline statements into
//! a single `ContentStatement` whose span is the union of the run. A lone
//! statement keeps its original node type.

use crate::ast::{ContentStatement, Root, Statement};
use stache_lexer::Span;

pub fn combine_content(root: &mut Root) {
    combine_body(&mut root.body);
}

fn combine_body(body: &mut Vec<Statement>) {
    for stmt in body.iter_mut() {
        combine_statement(stmt);
    }
    if body.len() < 2 {
        return;
    }
    let old = std::mem::take(body);
    let mut run: Vec<Statement> = Vec::new();
    for stmt in old {
        match stmt {
            Statement::Content(_) | Statement::Newline(_) => run.push(stmt),
            other => {
                flush_run(body, &mut run);
                body.push(other);
            }
        }
    }
    flush_run(body, &mut run);
}

fn flush_run(out: &mut Vec<Statement>, run: &mut Vec<Statement>) {
    match run.len() {
        0 => {}
        1 => {
            if let Some(stmt) = run.pop() {
                out.push(stmt);
            }
        }
        _ => {
            let mut value = String::new();
            let mut span = Span::MISSING;
            for stmt in run.drain(..) {
                match stmt {
                    Statement::Content(c) => {
                        value.push_str(&c.value);
                        span = span.to(c.span);
                    }
                    Statement::Newline(n) => {
                        value.push('\n');
                        span = span.to(n.span);
                    }
                    _ => {}
                }
            }
            out.push(Statement::Content(ContentStatement { value, span }));
        }
    }
}

fn combine_statement(stmt: &mut Statement) {
    match stmt {
        Statement::Block(block) => {
            combine_body(&mut block.program.body);
            if let Some(inverse) = block.inverse.as_mut() {
                combine_body(&mut inverse.body);
            }
        }
        Statement::Element(el) => combine_body(&mut el.children),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::NewlineNode;
    use pretty_assertions::assert_eq;

    fn content(value: &str, start: usize, end: usize) -> Statement {
        Statement::Content(ContentStatement {
            value: value.to_owned(),
            span: Span::new(start, end),
        })
    }

    fn newline(start: usize) -> Statement {
        Statement::Newline(NewlineNode {
            span: Span::new(start, start + 1),
        })
    }

    fn root_of(body: Vec<Statement>) -> Root {
        let span = Span::new(0, 100);
        Root { body, span }
    }

    #[test]
    fn test_merges_adjacent_content_and_newlines() {
        let mut root = root_of(vec![content("a", 0, 1), newline(1), content("b", 2, 3)]);
        combine_content(&mut root);
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
    fn test_lone_newline_is_kept() {
        let mut root = root_of(vec![newline(0)]);
        combine_content(&mut root);
        assert!(matches!(&root.body[0], Statement::Newline(_)));
    }

    #[test]
    fn test_runs_split_by_other_statements() {
        let mustache = crate::parse("{{x}}").root.body.remove(0);
        let mut root = root_of(vec![
            content("a", 0, 1),
            newline(1),
            mustache,
            content("b", 10, 11),
        ]);
        combine_content(&mut root);
        assert_eq!(root.body.len(), 3);
        assert!(matches!(&root.body[0], Statement::Content(c) if c.value == "a\n"));
        assert!(matches!(&root.body[2], Statement::Content(c) if c.value == "b"));
    }
}
