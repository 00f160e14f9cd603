//! Grammar rules.
//!
//! `parse_root` drives the statement loop; each construct is a `Syntax`
//! rule. Rules consume mustache-side tokens only; finished content and
//! newline statements are routed through the HTML bridge by
//! `TemplateParser::route`, which is where elements and attributes form.

use crate::ast::{
    ArgReference, BlockParams, BlockStatement, Call, CommentStatement, ContentStatement,
    Expression, Hash, HashPair, Head, LocalReference, MustacheContent, MustacheStatement,
    NewlineNode, NumberLiteral, PathExpression, PathSegment, Program, Root, Statement,
    StringLiteral, SubExpression, ThisHead, UndefinedLiteral,
};
use crate::macros::{self, MacroKind};
use crate::parser::{FallibleSyntax, PResult, Syntax, TemplateParser, Thunk};
use crate::stream::Tokens;
use stache_lexer::{Span, Token, TokenKind};

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

pub(crate) fn parse_root(p: &mut TemplateParser<'_>) -> Root {
    let end = p.source().len();
    p.stack.push_fragment();
    // A fatal error has already been recorded as a diagnostic; salvage
    // whatever structure was built before it.
    let _ = root_loop(p);
    p.finish_html();
    let body = p.stack.pop_fragment(end);
    let _ = p.drain_html_errors();
    Root {
        body,
        span: Span::new(0, end),
    }
}

fn root_loop(p: &mut TemplateParser<'_>) -> PResult<()> {
    loop {
        match classify_control(p) {
            Control::Eof => return Ok(()),
            Control::Else => stray_control(p, "{{else}} outside of a block")?,
            Control::CloseBlock => stray_control(p, "block close without an open block")?,
            Control::None => step_statement(p)?,
        }
    }
}

/// Parse statements until a control line (else / block close) or EOF.
fn parse_statements(p: &mut TemplateParser<'_>) -> PResult<()> {
    loop {
        match classify_control(p) {
            Control::Eof | Control::Else | Control::CloseBlock => return Ok(()),
            Control::None => step_statement(p)?,
        }
    }
}

fn step_statement(p: &mut TemplateParser<'_>) -> PResult<()> {
    let before = p.cursor_pos();
    let stmt = p.expect(&StatementRule)?;
    p.route(stmt)?;
    // recovery may synthesize a node without consuming; force progress
    if p.cursor_pos() == before {
        let _ = p.consume()?;
    }
    Ok(())
}

/// Report a misplaced control mustache and skip past its close delimiter.
fn stray_control(p: &mut TemplateParser<'_>, what: &str) -> PResult<()> {
    let tok = p.peek()?;
    p.report(tok.span, what.to_owned())?;
    loop {
        let tok = p.consume()?;
        if matches!(
            tok.kind,
            TokenKind::Close | TokenKind::CloseTrusted | TokenKind::Eof
        ) {
            return Ok(());
        }
    }
}

// ---------------------------------------------------------------------------
// Control-line classification
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Control {
    Else,
    CloseBlock,
    Eof,
    None,
}

/// Look through optional leading line whitespace for `{{else` / `{{/` / EOF.
/// Uses a raw fork, so it neither consumes nor counts against the
/// lookahead guard.
fn classify_control(p: &TemplateParser<'_>) -> Control {
    let mut fork = p.fork();
    let tok = fork.peek_raw();
    if !(p.at_line_start() && is_blank_tok(p.source(), tok)) {
        return classify_at(p.source(), &fork);
    }
    fork.consume();
    // A control mustache counts through leading blank only when nothing
    // but whitespace follows it on the line; otherwise the blank is
    // ordinary content of the current program.
    let control = classify_at(p.source(), &fork);
    if matches!(control, Control::Else | Control::CloseBlock)
        && !control_fills_line(p.source(), fork)
    {
        return Control::None;
    }
    control
}

fn classify_at(source: &str, fork: &Tokens<'_>) -> Control {
    let tok = fork.peek_raw();
    match tok.kind {
        TokenKind::Eof => Control::Eof,
        TokenKind::OpenEndBlock => Control::CloseBlock,
        TokenKind::Open => {
            let next = fork.peek2_raw();
            if next.kind == TokenKind::Identifier && next.text(source) == "else" {
                Control::Else
            } else {
                Control::None
            }
        }
        _ => Control::None,
    }
}

/// Whether the control mustache (or comment token) at the fork's position
/// fills the rest of its line: only line whitespace may follow before the
/// newline or EOF. Raw scan on a fork, so nothing is consumed and nothing
/// counts against the lookahead guard.
fn control_fills_line(source: &str, mut fork: Tokens<'_>) -> bool {
    let first = fork.consume();
    match first.kind {
        TokenKind::Comment | TokenKind::BlockComment | TokenKind::Eof => {}
        _ => loop {
            match fork.consume().kind {
                TokenKind::Close | TokenKind::CloseTrusted => break,
                TokenKind::Eof => return true,
                _ => {}
            }
        },
    }
    let tok = fork.peek_raw();
    match tok.kind {
        TokenKind::Newline | TokenKind::Eof => true,
        TokenKind::Content if is_blank_tok(source, tok) => {
            matches!(fork.peek2_raw().kind, TokenKind::Newline | TokenKind::Eof)
        }
        _ => false,
    }
}

/// A content token made of spaces and tabs only.
fn is_blank_tok(source: &str, tok: Token) -> bool {
    tok.kind == TokenKind::Content && tok.text(source).chars().all(|c| c == ' ' || c == '\t')
}

// ---------------------------------------------------------------------------
// Standalone whitespace control
// ---------------------------------------------------------------------------

/// Wraps a line-level rule (block open/close, else, comment). When the
/// rule is the only thing on its line, the leading whitespace and the
/// trailing newline are consumed inside the current frame, so they fold
/// into the node's span instead of surviving as content.
pub(crate) struct Standalone<S>(pub(crate) S);

impl<S: Syntax> Syntax for Standalone<S> {
    type Output = S::Output;
    type Match = (bool, S::Match);

    fn name(&self) -> &'static str {
        self.0.name()
    }

    fn test(&self, p: &mut TemplateParser<'_>) -> PResult<Option<Self::Match>> {
        let tok = p.peek()?;
        if p.at_line_start() && is_blank_tok(p.source(), tok) {
            let cp = p.checkpoint();
            let _ = p.consume()?;
            let inner = self.0.test(p)?;
            // The blank is absorbed only when the rule fills the rest of
            // the line; otherwise it stays ordinary content.
            let filled = inner.is_some() && control_fills_line(p.source(), p.fork());
            p.rollback(cp);
            if filled {
                return Ok(inner.map(|m| (true, m)));
            }
        }
        Ok(self.0.test(p)?.map(|m| (false, m)))
    }

    fn parse(&self, p: &mut TemplateParser<'_>, (blank, m): Self::Match) -> PResult<Thunk<S::Output>> {
        let standalone = blank || p.at_line_start();
        if blank {
            let _ = p.consume()?;
        }
        let thunk = self.0.parse(p, m)?;
        if standalone {
            p.skip(&LineTailRule)?;
        }
        Ok(thunk)
    }
}

/// The rest of a line when it holds nothing but whitespace. Skipped (not
/// kept as a node) after a standalone control line, so the whitespace
/// folds into the control node's span.
struct LineTailRule;

enum LineTail {
    Newline,
    BlankNewline,
    BlankEof,
}

impl Syntax for LineTailRule {
    type Output = ();
    type Match = LineTail;

    fn name(&self) -> &'static str {
        "line-tail"
    }

    fn test(&self, p: &mut TemplateParser<'_>) -> PResult<Option<LineTail>> {
        let tok = p.peek()?;
        Ok(match tok.kind {
            TokenKind::Newline => Some(LineTail::Newline),
            TokenKind::Content if is_blank_tok(p.source(), tok) => match p.peek2()?.kind {
                TokenKind::Newline => Some(LineTail::BlankNewline),
                TokenKind::Eof => Some(LineTail::BlankEof),
                _ => None,
            },
            _ => None,
        })
    }

    fn parse(&self, p: &mut TemplateParser<'_>, m: LineTail) -> PResult<Thunk<()>> {
        let _ = p.consume()?;
        if matches!(m, LineTail::BlankNewline) {
            let _ = p.consume()?;
        }
        Ok(Box::new(|_| ()))
    }
}

// ---------------------------------------------------------------------------
// Statement dispatch
// ---------------------------------------------------------------------------

pub(crate) struct StatementRule;

pub(crate) enum StatementMatch {
    Block,
    StrayClose,
    Comment,
    Mustache { trusted: bool },
    Newline,
    Content,
}

impl Syntax for StatementRule {
    type Output = Statement;
    type Match = StatementMatch;

    fn name(&self) -> &'static str {
        "statement"
    }

    fn test(&self, p: &mut TemplateParser<'_>) -> PResult<Option<StatementMatch>> {
        let tok = p.peek()?;
        let m = match tok.kind {
            TokenKind::OpenBlock => StatementMatch::Block,
            TokenKind::OpenEndBlock => StatementMatch::StrayClose,
            TokenKind::Comment | TokenKind::BlockComment => StatementMatch::Comment,
            TokenKind::Open => StatementMatch::Mustache { trusted: false },
            TokenKind::OpenTrusted => StatementMatch::Mustache { trusted: true },
            TokenKind::Newline => StatementMatch::Newline,
            TokenKind::EscapedOpen => StatementMatch::Content,
            TokenKind::Content => {
                // line whitespace may be the lead-in of a standalone line
                if p.at_line_start() && is_blank_tok(p.source(), tok) {
                    match p.peek2()?.kind {
                        TokenKind::OpenBlock => StatementMatch::Block,
                        TokenKind::Comment | TokenKind::BlockComment => StatementMatch::Comment,
                        _ => StatementMatch::Content,
                    }
                } else {
                    StatementMatch::Content
                }
            }
            _ => return Ok(None),
        };
        Ok(Some(m))
    }

    fn parse(&self, p: &mut TemplateParser<'_>, m: StatementMatch) -> PResult<Thunk<Statement>> {
        match m {
            StatementMatch::Block => {
                let rule = BlockRule;
                match rule.test(p)? {
                    Some(m) => {
                        let block = p.parse_rule(&rule, m)?;
                        Ok(Box::new(move |_| Statement::Block(block)))
                    }
                    // blank-led line that is not standalone after all;
                    // the blank is ordinary content
                    None => {
                        let node = p.parse_rule(&ContentRule, ())?;
                        Ok(Box::new(move |_| Statement::Content(node)))
                    }
                }
            }
            StatementMatch::Comment => {
                let rule = Standalone(CommentRule);
                match rule.test(p)? {
                    Some(m) => {
                        let comment = p.parse_rule(&rule, m)?;
                        Ok(Box::new(move |_| Statement::Comment(comment)))
                    }
                    None => {
                        let node = p.parse_rule(&ContentRule, ())?;
                        Ok(Box::new(move |_| Statement::Content(node)))
                    }
                }
            }
            StatementMatch::Mustache { trusted } => {
                let stmt = p.parse_rule(&MustacheRule, trusted)?;
                Ok(Box::new(move |_| stmt))
            }
            StatementMatch::Newline => {
                let node = p.parse_rule(&NewlineRule, ())?;
                Ok(Box::new(move |_| Statement::Newline(node)))
            }
            StatementMatch::Content => {
                let node = p.parse_rule(&ContentRule, ())?;
                Ok(Box::new(move |_| Statement::Content(node)))
            }
            StatementMatch::StrayClose => {
                let tok = p.peek()?;
                p.report(tok.span, "block close without an open block".to_owned())?;
                loop {
                    let tok = p.consume()?;
                    if matches!(
                        tok.kind,
                        TokenKind::Close | TokenKind::CloseTrusted | TokenKind::Eof
                    ) {
                        break;
                    }
                }
                Ok(empty_content())
            }
        }
    }
}

impl FallibleSyntax for StatementRule {
    fn expectation(&self) -> &'static str {
        "a statement"
    }

    fn or_else(&self, _p: &mut TemplateParser<'_>) -> Thunk<Statement> {
        empty_content()
    }
}

fn empty_content() -> Thunk<Statement> {
    Box::new(|span| {
        Statement::Content(ContentStatement {
            value: String::new(),
            span,
        })
    })
}

// ---------------------------------------------------------------------------
// Content / newline / comment
// ---------------------------------------------------------------------------

struct ContentRule;

impl Syntax for ContentRule {
    type Output = ContentStatement;
    type Match = ();

    fn name(&self) -> &'static str {
        "content"
    }

    fn test(&self, p: &mut TemplateParser<'_>) -> PResult<Option<()>> {
        let kind = p.peek()?.kind;
        Ok(matches!(kind, TokenKind::Content | TokenKind::EscapedOpen).then_some(()))
    }

    fn parse(&self, p: &mut TemplateParser<'_>, _m: ()) -> PResult<Thunk<ContentStatement>> {
        let tok = p.consume()?;
        // escaped opens cook to a literal `{{`
        let value = match tok.kind {
            TokenKind::EscapedOpen => "{{".to_owned(),
            _ => tok.text(p.source()).to_owned(),
        };
        Ok(Box::new(move |span| ContentStatement { value, span }))
    }
}

struct NewlineRule;

impl Syntax for NewlineRule {
    type Output = NewlineNode;
    type Match = ();

    fn name(&self) -> &'static str {
        "newline"
    }

    fn test(&self, p: &mut TemplateParser<'_>) -> PResult<Option<()>> {
        Ok((p.peek()?.kind == TokenKind::Newline).then_some(()))
    }

    fn parse(&self, p: &mut TemplateParser<'_>, _m: ()) -> PResult<Thunk<NewlineNode>> {
        let _ = p.consume()?;
        Ok(Box::new(|span| NewlineNode { span }))
    }
}

struct CommentRule;

impl Syntax for CommentRule {
    type Output = CommentStatement;
    type Match = ();

    fn name(&self) -> &'static str {
        "comment"
    }

    fn test(&self, p: &mut TemplateParser<'_>) -> PResult<Option<()>> {
        let kind = p.peek()?.kind;
        Ok(matches!(kind, TokenKind::Comment | TokenKind::BlockComment).then_some(()))
    }

    fn parse(&self, p: &mut TemplateParser<'_>, _m: ()) -> PResult<Thunk<CommentStatement>> {
        let tok = p.consume()?;
        let text = tok.text(p.source());
        let value = match tok.kind {
            TokenKind::BlockComment => strip_delimiters(text, "{{!--", "--}}"),
            _ => strip_delimiters(text, "{{!", "}}"),
        };
        Ok(Box::new(move |span| CommentStatement { value, span }))
    }
}

fn strip_delimiters(text: &str, prefix: &str, suffix: &str) -> String {
    text.strip_prefix(prefix)
        .and_then(|t| t.strip_suffix(suffix))
        .unwrap_or(text)
        .to_owned()
}

// ---------------------------------------------------------------------------
// Mustaches
// ---------------------------------------------------------------------------

struct MustacheRule;

impl Syntax for MustacheRule {
    type Output = Statement;
    /// `true` for `{{{ ... }}}`.
    type Match = bool;

    fn name(&self) -> &'static str {
        "mustache"
    }

    fn test(&self, p: &mut TemplateParser<'_>) -> PResult<Option<bool>> {
        Ok(match p.peek()?.kind {
            TokenKind::Open => Some(false),
            TokenKind::OpenTrusted => Some(true),
            _ => None,
        })
    }

    fn parse(&self, p: &mut TemplateParser<'_>, trusted: bool) -> PResult<Thunk<Statement>> {
        let _ = p.consume()?;
        let call = p.parse_rule(&CallBodyRule, ())?;
        let close = p.peek()?;
        match close.kind {
            TokenKind::Close | TokenKind::CloseTrusted => {
                let _ = p.consume()?;
                if (close.kind == TokenKind::CloseTrusted) != trusted {
                    p.report(close.span, "mismatched mustache close delimiter".to_owned())?;
                }
            }
            _ => {
                let at = Span::collapsed(p.offset());
                p.report(at, "expected '}}' to close mustache".to_owned())?;
            }
        }
        let bare = call.params.is_empty() && call.hash.is_empty();
        Ok(Box::new(move |span| {
            if bare {
                Statement::MustacheContent(MustacheContent {
                    value: call.callee,
                    trusted,
                    span,
                })
            } else {
                Statement::Mustache(MustacheStatement { call, trusted, span })
            }
        }))
    }
}

// ---------------------------------------------------------------------------
// Call bodies, hash pairs
// ---------------------------------------------------------------------------

struct CallBodyRule;

impl Syntax for CallBodyRule {
    type Output = Call;
    type Match = ();

    fn name(&self) -> &'static str {
        "call-body"
    }

    fn test(&self, _p: &mut TemplateParser<'_>) -> PResult<Option<()>> {
        Ok(Some(()))
    }

    fn parse(&self, p: &mut TemplateParser<'_>, _m: ()) -> PResult<Thunk<Call>> {
        let callee = p.expect(&ExpressionRule)?;
        let mut params = Vec::new();
        loop {
            let tok = p.peek()?;
            if tok.kind == TokenKind::Identifier {
                // hash key or the `as |...|` of block params
                let next = p.peek2()?.kind;
                if next == TokenKind::Equals {
                    break;
                }
                if next == TokenKind::Pipe && tok.text(p.source()) == "as" {
                    break;
                }
            }
            match ExpressionRule.test(p)? {
                Some(m) => params.push(p.parse_rule(&ExpressionRule, m)?),
                None => break,
            }
        }
        let hash_at = p.offset();
        let mut pairs: Vec<HashPair> = Vec::new();
        loop {
            match HashPairRule.test(p)? {
                Some(m) => pairs.push(p.parse_rule(&HashPairRule, m)?),
                None => break,
            }
        }
        let hash = if pairs.is_empty() {
            Hash::empty(Span::collapsed(hash_at))
        } else {
            let span = pairs[0].span.to(pairs[pairs.len() - 1].span);
            Hash { pairs, span }
        };
        Ok(Box::new(move |span| Call {
            callee,
            params,
            hash,
            span,
        }))
    }
}

struct HashPairRule;

impl Syntax for HashPairRule {
    type Output = HashPair;
    type Match = ();

    fn name(&self) -> &'static str {
        "hash-pair"
    }

    fn test(&self, p: &mut TemplateParser<'_>) -> PResult<Option<()>> {
        Ok((p.peek()?.kind == TokenKind::Identifier && p.peek2()?.kind == TokenKind::Equals)
            .then_some(()))
    }

    fn parse(&self, p: &mut TemplateParser<'_>, _m: ()) -> PResult<Thunk<HashPair>> {
        let key_tok = p.consume()?;
        let key = key_tok.text(p.source()).to_owned();
        let _ = p.consume()?; // '='
        let value = p.expect(&ExpressionRule)?;
        Ok(Box::new(move |span| HashPair {
            key,
            key_span: key_tok.span,
            value,
            span,
        }))
    }
}

// ---------------------------------------------------------------------------
// Expressions and paths
// ---------------------------------------------------------------------------

struct ExpressionRule;

enum ExprMatch {
    Str,
    Num,
    Macro(MacroKind),
    Path,
    SubExpr,
}

impl Syntax for ExpressionRule {
    type Output = Expression;
    type Match = ExprMatch;

    fn name(&self) -> &'static str {
        "expression"
    }

    fn test(&self, p: &mut TemplateParser<'_>) -> PResult<Option<ExprMatch>> {
        let tok = p.peek()?;
        let m = match tok.kind {
            TokenKind::String => ExprMatch::Str,
            TokenKind::Number => ExprMatch::Num,
            TokenKind::AtName => ExprMatch::Path,
            TokenKind::LParen => ExprMatch::SubExpr,
            TokenKind::Identifier => {
                let name = tok.text(p.source());
                match p.macros().lookup(name) {
                    // `null.foo` is a path, not the null literal
                    Some(kind) if p.peek2()?.kind != TokenKind::Dot => ExprMatch::Macro(kind),
                    _ => ExprMatch::Path,
                }
            }
            _ => return Ok(None),
        };
        Ok(Some(m))
    }

    fn parse(&self, p: &mut TemplateParser<'_>, m: ExprMatch) -> PResult<Thunk<Expression>> {
        match m {
            ExprMatch::Str => {
                let tok = p.consume()?;
                let value = unescape_string(tok.text(p.source()));
                Ok(Box::new(move |span| {
                    Expression::String(StringLiteral { value, span })
                }))
            }
            ExprMatch::Num => {
                let tok = p.consume()?;
                let value = match tok.text(p.source()).parse::<f64>() {
                    Ok(v) => v,
                    Err(_) => {
                        p.report(tok.span, "invalid number literal".to_owned())?;
                        0.0
                    }
                };
                Ok(Box::new(move |span| {
                    Expression::Number(NumberLiteral { value, span })
                }))
            }
            ExprMatch::Macro(kind) => {
                let _ = p.consume()?;
                Ok(Box::new(move |span| macros::expand(kind, span)))
            }
            ExprMatch::Path => {
                let path = p.parse_rule(&PathRule, ())?;
                Ok(Box::new(move |_| Expression::Path(path)))
            }
            ExprMatch::SubExpr => {
                let _ = p.consume()?; // '('
                let call = p.parse_rule(&CallBodyRule, ())?;
                if p.peek()?.kind == TokenKind::RParen {
                    let _ = p.consume()?;
                } else {
                    let at = Span::collapsed(p.offset());
                    p.report(at, "expected ')' to close sub-expression".to_owned())?;
                }
                Ok(Box::new(move |span| {
                    Expression::SubExpression(SubExpression {
                        call: Box::new(call),
                        span,
                    })
                }))
            }
        }
    }
}

impl FallibleSyntax for ExpressionRule {
    fn expectation(&self) -> &'static str {
        "an expression"
    }

    fn or_else(&self, _p: &mut TemplateParser<'_>) -> Thunk<Expression> {
        Box::new(|span| Expression::Undefined(UndefinedLiteral { span }))
    }
}

fn unescape_string(raw: &str) -> String {
    let inner = if raw.len() >= 2 {
        &raw[1..raw.len() - 1]
    } else {
        ""
    };
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('\\') => out.push('\\'),
            Some('"') => out.push('"'),
            Some('\'') => out.push('\''),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

struct PathRule;

impl Syntax for PathRule {
    type Output = PathExpression;
    type Match = ();

    fn name(&self) -> &'static str {
        "path"
    }

    fn test(&self, p: &mut TemplateParser<'_>) -> PResult<Option<()>> {
        let kind = p.peek()?.kind;
        Ok(matches!(kind, TokenKind::Identifier | TokenKind::AtName).then_some(()))
    }

    fn parse(&self, p: &mut TemplateParser<'_>, _m: ()) -> PResult<Thunk<PathExpression>> {
        let head_tok = p.consume()?;
        let text = head_tok.text(p.source()).to_owned();
        let head = match head_tok.kind {
            TokenKind::AtName => Head::Arg(ArgReference {
                name: text,
                span: head_tok.span,
            }),
            _ if text == "this" => Head::This(ThisHead {
                span: head_tok.span,
            }),
            _ => Head::Local(LocalReference {
                name: text,
                span: head_tok.span,
            }),
        };
        let mut tail = Vec::new();
        loop {
            if p.peek()?.kind != TokenKind::Dot {
                break;
            }
            let _ = p.consume()?;
            let seg = p.peek()?;
            if seg.kind == TokenKind::Identifier {
                let _ = p.consume()?;
                tail.push(PathSegment {
                    name: seg.text(p.source()).to_owned(),
                    span: seg.span,
                });
            } else {
                let at = Span::collapsed(p.offset());
                p.report(at, "expected a path segment after '.'".to_owned())?;
                tail.push(PathSegment {
                    name: "<error>".to_owned(),
                    span: at,
                });
                break;
            }
        }
        Ok(Box::new(move |span| PathExpression { head, tail, span }))
    }
}

// ---------------------------------------------------------------------------
// Blocks
// ---------------------------------------------------------------------------

struct BlockRule;

impl Syntax for BlockRule {
    type Output = BlockStatement;
    type Match = (bool, ());

    fn name(&self) -> &'static str {
        "block"
    }

    fn test(&self, p: &mut TemplateParser<'_>) -> PResult<Option<(bool, ())>> {
        Standalone(BlockOpenRule).test(p)
    }

    fn parse(&self, p: &mut TemplateParser<'_>, m: (bool, ())) -> PResult<Thunk<BlockStatement>> {
        let open_rule = Standalone(BlockOpenRule);
        let open = p.parse_rule(&open_rule, m)?;
        let BlockOpen { call, block_params } = open;
        let name = callee_name(&call);

        let program = p.parse_rule(&ProgramRule, block_params)?;

        let mut inverse = None;
        if classify_control(p) == Control::Else {
            inverse = Some(parse_else_chain(p)?);
        }

        match classify_control(p) {
            Control::CloseBlock => {
                let close_rule = Standalone(BlockCloseRule);
                if let Some(m) = close_rule.test(p)? {
                    let close = p.parse_rule(&close_rule, m)?;
                    if !name.is_empty() && close.name != name && close.name != "<error>" {
                        p.report(
                            close.name_span,
                            format!(
                                "closing tag {{{{/{}}}}} does not match {{{{#{}}}}}",
                                close.name, name
                            ),
                        )?;
                    }
                }
            }
            _ => {
                let at = Span::collapsed(p.offset());
                p.report(at, format!("unclosed block {{{{#{name}}}}}"))?;
            }
        }

        Ok(Box::new(move |span| BlockStatement {
            call,
            program,
            inverse,
            span,
        }))
    }
}

fn callee_name(call: &Call) -> String {
    match &call.callee {
        Expression::Path(path) => path.head.name().to_owned(),
        _ => String::new(),
    }
}

/// Parse `{{else}}` / `{{else expr ...}}` and everything up to the shared
/// block close. A conditional else desugars into a nested block statement
/// inside a `chained` program.
fn parse_else_chain(p: &mut TemplateParser<'_>) -> PResult<Program> {
    let rule = Standalone(ElseRule);
    let m = match rule.test(p)? {
        Some(m) => m,
        None => {
            return Ok(Program {
                body: Vec::new(),
                block_params: None,
                chained: false,
                span: Span::collapsed(p.offset()),
            })
        }
    };
    let else_line = p.parse_rule(&rule, m)?;
    match else_line.call {
        None => p.parse_rule(&ProgramRule, else_line.block_params),
        Some(call) => {
            let program = p.parse_rule(&ProgramRule, else_line.block_params)?;
            let mut inverse = None;
            if classify_control(p) == Control::Else {
                inverse = Some(parse_else_chain(p)?);
            }
            let mut span = call.span.to(program.span);
            if let Some(inv) = &inverse {
                span = span.to(inv.span);
            }
            let nested = BlockStatement {
                call,
                program,
                inverse,
                span,
            };
            Ok(Program {
                body: vec![Statement::Block(nested)],
                block_params: None,
                chained: true,
                span,
            })
        }
    }
}

struct ProgramRule;

impl Syntax for ProgramRule {
    type Output = Program;
    type Match = Option<BlockParams>;

    fn name(&self) -> &'static str {
        "program"
    }

    // Driven directly by the block rule; never dispatched by test.
    fn test(&self, _p: &mut TemplateParser<'_>) -> PResult<Option<Self::Match>> {
        Ok(None)
    }

    fn parse(
        &self,
        p: &mut TemplateParser<'_>,
        block_params: Option<BlockParams>,
    ) -> PResult<Thunk<Program>> {
        p.stack.push_fragment();
        let parsed = parse_statements(p);
        let body = p.stack.pop_fragment(p.offset());
        let drained = p.drain_html_errors();
        parsed?;
        drained?;
        Ok(Box::new(move |span| Program {
            body,
            block_params,
            chained: false,
            span,
        }))
    }
}

struct BlockOpen {
    call: Call,
    block_params: Option<BlockParams>,
}

struct BlockOpenRule;

impl Syntax for BlockOpenRule {
    type Output = BlockOpen;
    type Match = ();

    fn name(&self) -> &'static str {
        "block-open"
    }

    fn test(&self, p: &mut TemplateParser<'_>) -> PResult<Option<()>> {
        Ok((p.peek()?.kind == TokenKind::OpenBlock).then_some(()))
    }

    fn parse(&self, p: &mut TemplateParser<'_>, _m: ()) -> PResult<Thunk<BlockOpen>> {
        let _ = p.consume()?;
        let call = p.parse_rule(&CallBodyRule, ())?;
        let block_params = match BlockParamsRule.test(p)? {
            Some(m) => Some(p.parse_rule(&BlockParamsRule, m)?),
            None => None,
        };
        expect_mustache_close(p)?;
        Ok(Box::new(move |_| BlockOpen { call, block_params }))
    }
}

struct CloseTag {
    name: String,
    name_span: Span,
}

struct BlockCloseRule;

impl Syntax for BlockCloseRule {
    type Output = CloseTag;
    type Match = ();

    fn name(&self) -> &'static str {
        "block-close"
    }

    fn test(&self, p: &mut TemplateParser<'_>) -> PResult<Option<()>> {
        Ok((p.peek()?.kind == TokenKind::OpenEndBlock).then_some(()))
    }

    fn parse(&self, p: &mut TemplateParser<'_>, _m: ()) -> PResult<Thunk<CloseTag>> {
        let _ = p.consume()?;
        let (name, name_span) = if p.peek()?.kind == TokenKind::Identifier {
            let path = p.parse_rule(&PathRule, ())?;
            (path.head.name().to_owned(), path.span)
        } else {
            let at = Span::collapsed(p.offset());
            p.report(at, "expected a block name".to_owned())?;
            ("<error>".to_owned(), at)
        };
        expect_mustache_close(p)?;
        Ok(Box::new(move |_| CloseTag { name, name_span }))
    }
}

struct ElseLine {
    call: Option<Call>,
    block_params: Option<BlockParams>,
}

struct ElseRule;

impl Syntax for ElseRule {
    type Output = ElseLine;
    type Match = ();

    fn name(&self) -> &'static str {
        "else"
    }

    fn test(&self, p: &mut TemplateParser<'_>) -> PResult<Option<()>> {
        if p.peek()?.kind != TokenKind::Open {
            return Ok(None);
        }
        let next = p.peek2()?;
        Ok((next.kind == TokenKind::Identifier && next.text(p.source()) == "else")
            .then_some(()))
    }

    fn parse(&self, p: &mut TemplateParser<'_>, _m: ()) -> PResult<Thunk<ElseLine>> {
        let _ = p.consume()?; // {{
        let _ = p.consume()?; // else
        if matches!(
            p.peek()?.kind,
            TokenKind::Close | TokenKind::CloseTrusted
        ) {
            let _ = p.consume()?;
            return Ok(Box::new(|_| ElseLine {
                call: None,
                block_params: None,
            }));
        }
        let call = p.parse_rule(&CallBodyRule, ())?;
        let block_params = match BlockParamsRule.test(p)? {
            Some(m) => Some(p.parse_rule(&BlockParamsRule, m)?),
            None => None,
        };
        expect_mustache_close(p)?;
        Ok(Box::new(move |_| ElseLine {
            call: Some(call),
            block_params,
        }))
    }
}

struct BlockParamsRule;

impl Syntax for BlockParamsRule {
    type Output = BlockParams;
    type Match = ();

    fn name(&self) -> &'static str {
        "block-params"
    }

    fn test(&self, p: &mut TemplateParser<'_>) -> PResult<Option<()>> {
        let tok = p.peek()?;
        if tok.kind != TokenKind::Identifier || tok.text(p.source()) != "as" {
            return Ok(None);
        }
        Ok((p.peek2()?.kind == TokenKind::Pipe).then_some(()))
    }

    fn parse(&self, p: &mut TemplateParser<'_>, _m: ()) -> PResult<Thunk<BlockParams>> {
        let _ = p.consume()?; // as
        let _ = p.consume()?; // |
        let mut names = Vec::new();
        loop {
            let tok = p.peek()?;
            match tok.kind {
                TokenKind::Identifier => {
                    let _ = p.consume()?;
                    names.push(PathSegment {
                        name: tok.text(p.source()).to_owned(),
                        span: tok.span,
                    });
                }
                TokenKind::Pipe => {
                    let _ = p.consume()?;
                    break;
                }
                _ => {
                    let at = Span::collapsed(p.offset());
                    p.report(at, "expected '|' to close block params".to_owned())?;
                    break;
                }
            }
        }
        Ok(Box::new(move |span| BlockParams { names, span }))
    }
}

fn expect_mustache_close(p: &mut TemplateParser<'_>) -> PResult<()> {
    let tok = p.peek()?;
    match tok.kind {
        TokenKind::Close | TokenKind::CloseTrusted => {
            let _ = p.consume()?;
        }
        _ => {
            let at = Span::collapsed(p.offset());
            p.report(at, "expected '}}'".to_owned())?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::macros::MACROS_V1;
    use crate::ErrorMode;
    use stache_lexer::Lexer;

    fn parser<'a>(source: &'a str, tokens: &'a [Token]) -> TemplateParser<'a> {
        TemplateParser::new(
            source,
            Tokens::new(tokens),
            &MACROS_V1,
            ErrorMode::Recover,
            None,
        )
    }

    // ========================================================================
    // No-op lookahead
    // ========================================================================

    #[test]
    fn test_failed_else_test_is_a_noop() {
        let toks = Lexer::tokenize("{{x}}").unwrap();
        let mut p = parser("{{x}}", &toks);
        assert!(ElseRule.test(&mut p).unwrap().is_none());
        assert_eq!(p.cursor_pos(), 0);
        assert!(p.at_line_start());
        assert!(p.diagnostics.is_empty());
    }

    #[test]
    fn test_failed_standalone_test_is_a_noop() {
        // blank-led line that is not a block open
        let src = "  {{name}}\n";
        let toks = Lexer::tokenize(src).unwrap();
        let mut p = parser(src, &toks);
        assert!(Standalone(BlockOpenRule).test(&mut p).unwrap().is_none());
        assert_eq!(p.cursor_pos(), 0);
        assert!(p.at_line_start());
        assert!(p.diagnostics.is_empty());
    }

    // ========================================================================
    // Standalone line detection
    // ========================================================================

    #[test]
    fn test_standalone_rejects_trailing_content_on_line() {
        let src = "  {{#if x}}b";
        let toks = Lexer::tokenize(src).unwrap();
        let mut p = parser(src, &toks);
        assert!(Standalone(BlockOpenRule).test(&mut p).unwrap().is_none());
        assert_eq!(p.cursor_pos(), 0);
        assert!(p.diagnostics.is_empty());
    }

    #[test]
    fn test_standalone_accepts_whitespace_only_line() {
        let src = "  {{#if x}}  \nb{{/if}}";
        let toks = Lexer::tokenize(src).unwrap();
        let mut p = parser(src, &toks);
        let m = Standalone(BlockOpenRule).test(&mut p).unwrap();
        assert!(matches!(m, Some((true, _))));
        assert_eq!(p.cursor_pos(), 0);
    }
}
