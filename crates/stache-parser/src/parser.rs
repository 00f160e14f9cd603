//! Combinator core.
//!
//! Grammar rules implement [`Syntax`] (and usually [`FallibleSyntax`]) and
//! are driven through [`TemplateParser::parse_rule`] / [`expect`]. Each
//! `parse_rule` call pushes a span frame; every consumed token folds its
//! span into the innermost frame, and when the rule finishes the collapsed
//! frame span is handed to the rule's thunk to stamp the produced node.
//! Rules therefore never compute their own spans.
//!
//! `test` methods may look ahead but must leave the parser untouched;
//! backtracking inside `test` goes through [`TemplateParser::checkpoint`] /
//! [`rollback`].

use crate::element::ElementStack;
use crate::html::{TokState, Tokenizer};
use crate::macros::MacroTable;
use crate::stream::Tokens;
use crate::{Diagnostic, ErrorMode, TraceFn};
use stache_lexer::{Span, Token, TokenKind};

/// Marker for an unrecoverable parse failure. The diagnostic itself has
/// already been recorded; this only unwinds the rule stack.
#[derive(Debug)]
pub(crate) struct Fatal;

pub(crate) type PResult<T> = Result<T, Fatal>;

/// A deferred node constructor. The argument is the rule's collapsed
/// frame span.
pub(crate) type Thunk<T> = Box<dyn FnOnce(Span) -> T>;

/// A grammar rule.
///
/// `test` answers "does the upcoming input start this rule?" and returns
/// the evidence (`Match`) that `parse` then consumes. Splitting the two
/// keeps dispatch side-effect free.
pub(crate) trait Syntax {
    type Output;
    type Match;

    fn name(&self) -> &'static str;

    fn test(&self, p: &mut TemplateParser<'_>) -> PResult<Option<Self::Match>>;

    fn parse(&self, p: &mut TemplateParser<'_>, m: Self::Match) -> PResult<Thunk<Self::Output>>;
}

/// A rule that can recover when its `test` fails: `or_else` builds a
/// placeholder node so parsing can continue.
pub(crate) trait FallibleSyntax: Syntax {
    /// What the rule expected, for the diagnostic message.
    fn expectation(&self) -> &'static str;

    fn or_else(&self, p: &mut TemplateParser<'_>) -> Thunk<Self::Output>;
}

/// Span accumulator for one rule invocation.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Frame {
    first: Option<Span>,
    last: Option<Span>,
    default_pos: usize,
}

impl Frame {
    fn new(default_pos: usize) -> Self {
        Self {
            first: None,
            last: None,
            default_pos,
        }
    }

    fn note(&mut self, span: Span) {
        if span.is_missing() {
            return;
        }
        if self.first.is_none() {
            self.first = Some(span);
        }
        self.last = Some(span);
    }

    /// The frame's final span: first-to-last consumed span, or a collapsed
    /// span at the position the rule started when nothing was consumed.
    fn collapse(&self) -> Span {
        match (self.first, self.last) {
            (Some(first), Some(last)) => first.to(last),
            _ => Span::collapsed(self.default_pos),
        }
    }
}

/// A saved parser state for speculative lookahead. Restoring truncates any
/// diagnostics recorded since the save, so failed speculation is invisible.
pub(crate) struct Checkpoint<'src> {
    tokens: Tokens<'src>,
    at_line_start: bool,
    frame: Option<Frame>,
    diagnostics_len: usize,
}

pub struct TemplateParser<'src> {
    source: &'src str,
    tokens: Tokens<'src>,
    frames: Vec<Frame>,
    macros: &'static MacroTable,
    mode: ErrorMode,
    at_line_start: bool,
    trace: Option<TraceFn>,
    pub(crate) diagnostics: Vec<Diagnostic>,
    pub(crate) tokenizer: Tokenizer,
    pub(crate) stack: ElementStack,
}

impl<'src> TemplateParser<'src> {
    pub(crate) fn new(
        source: &'src str,
        tokens: Tokens<'src>,
        macros: &'static MacroTable,
        mode: ErrorMode,
        trace: Option<TraceFn>,
    ) -> Self {
        Self {
            source,
            tokens,
            frames: Vec::new(),
            macros,
            mode,
            at_line_start: true,
            trace,
            diagnostics: Vec::new(),
            tokenizer: Tokenizer::new(),
            stack: ElementStack::new(),
        }
    }

    pub(crate) fn source(&self) -> &'src str {
        self.source
    }

    pub(crate) fn macros(&self) -> &'static MacroTable {
        self.macros
    }

    /// Whether no token has been consumed since the last newline (or the
    /// start of input). Drives standalone whitespace control.
    pub(crate) fn at_line_start(&self) -> bool {
        self.at_line_start
    }

    /// Byte offset of the upcoming token; frames opened now default here.
    pub(crate) fn offset(&self) -> usize {
        let span = self.tokens.peek_raw().span;
        if span.is_missing() {
            self.source.len()
        } else {
            span.start
        }
    }

    /// Token-buffer index, for loop progress checks.
    pub(crate) fn cursor_pos(&self) -> usize {
        self.tokens.pos()
    }

    /// An independent cursor for raw lookahead past the peek2 horizon.
    pub(crate) fn fork(&self) -> Tokens<'src> {
        self.tokens.clone()
    }

    pub(crate) fn peek(&mut self) -> PResult<Token> {
        match self.tokens.peek() {
            Ok(tok) => Ok(tok),
            Err(_) => Err(self.lookahead_overflow()),
        }
    }

    pub(crate) fn peek2(&mut self) -> PResult<Token> {
        match self.tokens.peek2() {
            Ok(tok) => Ok(tok),
            Err(_) => Err(self.lookahead_overflow()),
        }
    }

    /// Consume the current token, folding its span into the innermost
    /// frame.
    pub(crate) fn consume(&mut self) -> PResult<Token> {
        let tok = self.tokens.consume();
        self.note(tok.span);
        self.at_line_start = tok.kind == TokenKind::Newline;
        if self.trace.is_some() {
            let text = tok.text(self.source).to_owned();
            self.emit_trace(format_args!("consume {:?} {:?}", tok.kind, text));
        }
        Ok(tok)
    }

    /// Fold a span into the innermost frame without consuming anything.
    pub(crate) fn note(&mut self, span: Span) {
        if let Some(frame) = self.frames.last_mut() {
            frame.note(span);
        }
    }

    /// Run a rule's `parse` inside a fresh frame and stamp its node with
    /// the collapsed span. The frame span is also folded into the parent.
    pub(crate) fn parse_rule<S: Syntax>(&mut self, rule: &S, m: S::Match) -> PResult<S::Output> {
        self.emit_trace(format_args!("enter {}", rule.name()));
        self.frames.push(Frame::new(self.offset()));
        let parsed = rule.parse(self, m);
        let frame = self.frames.pop().unwrap_or_else(|| Frame::new(0));
        let span = frame.collapse();
        match parsed {
            Ok(thunk) => {
                self.note(span);
                self.emit_trace(format_args!(
                    "exit {} [{}..{}]",
                    rule.name(),
                    span.start,
                    span.end
                ));
                Ok(thunk(span))
            }
            Err(fatal) => Err(fatal),
        }
    }

    /// `test` the rule; on a match, parse it. Otherwise record a
    /// diagnostic at the current position and synthesize the rule's
    /// placeholder (or fail, in fail-fast mode).
    pub(crate) fn expect<S: FallibleSyntax>(&mut self, rule: &S) -> PResult<S::Output> {
        if let Some(m) = rule.test(self)? {
            return self.parse_rule(rule, m);
        }
        let at = Span::collapsed(self.offset());
        self.report(at, format!("expected {}", rule.expectation()))?;
        Ok(rule.or_else(self)(at))
    }

    /// Run a rule purely for its consumption; the node is discarded but
    /// the consumed spans still fold into the current frame. Does nothing
    /// when the rule does not match.
    pub(crate) fn skip<S: Syntax>(&mut self, rule: &S) -> PResult<()> {
        if let Some(m) = rule.test(self)? {
            let _ = self.parse_rule(rule, m)?;
        }
        Ok(())
    }

    /// Record a recoverable diagnostic. In fail-fast mode every diagnostic
    /// is promoted to a fatal failure.
    pub(crate) fn report(&mut self, span: Span, message: String) -> PResult<()> {
        self.emit_trace(format_args!("error: {message}"));
        self.diagnostics.push(Diagnostic { message, span });
        match self.mode {
            ErrorMode::Recover => Ok(()),
            ErrorMode::FailFast => Err(Fatal),
        }
    }

    /// Record a diagnostic that aborts parsing in either mode.
    pub(crate) fn fatal(&mut self, span: Span, message: String) -> Fatal {
        self.emit_trace(format_args!("fatal: {message}"));
        self.diagnostics.push(Diagnostic { message, span });
        Fatal
    }

    fn lookahead_overflow(&mut self) -> Fatal {
        let at = Span::collapsed(self.offset());
        self.fatal(at, "lookahead made no progress (loop guard)".to_owned())
    }

    pub(crate) fn checkpoint(&self) -> Checkpoint<'src> {
        Checkpoint {
            tokens: self.tokens.clone(),
            at_line_start: self.at_line_start,
            frame: self.frames.last().copied(),
            diagnostics_len: self.diagnostics.len(),
        }
    }

    pub(crate) fn rollback(&mut self, cp: Checkpoint<'src>) {
        self.tokens = cp.tokens;
        self.at_line_start = cp.at_line_start;
        if let (Some(saved), Some(top)) = (cp.frame, self.frames.last_mut()) {
            *top = saved;
        }
        self.diagnostics.truncate(cp.diagnostics_len);
    }

    // -- HTML bridge ------------------------------------------------------

    /// Route a finished statement: content and newlines stream through the
    /// HTML tokenizer character by character; everything else is appended
    /// wherever the tokenizer state says it belongs.
    pub(crate) fn route(&mut self, stmt: crate::ast::Statement) -> PResult<()> {
        use crate::ast::Statement;
        match stmt {
            Statement::Content(c) => {
                let span = c.span;
                self.feed_html(&c.value, span)?;
            }
            Statement::Newline(n) => {
                self.feed_html("\n", n.span)?;
            }
            other => {
                let state = self.tokenizer.state();
                if state == TokState::BeforeAttrValue && splices_into_attr(&other) {
                    // a mustache standing as an entire unquoted value
                    self.tokenizer.begin_unquoted_value();
                }
                self.stack.append_statement(other, self.tokenizer.state());
                self.drain_html_errors()?;
            }
        }
        Ok(())
    }

    /// Push a text chunk through the HTML tokenizer, then flush any open
    /// data run so its node ends at the chunk boundary.
    fn feed_html(&mut self, text: &str, span: Span) -> PResult<()> {
        self.tokenizer.tokenize_part(text, span, &mut self.stack);
        self.tokenizer.flush_data(span.end, &mut self.stack);
        self.drain_html_errors()
    }

    pub(crate) fn drain_html_errors(&mut self) -> PResult<()> {
        let errors = self.stack.take_errors();
        if errors.is_empty() {
            return Ok(());
        }
        for diag in &errors {
            self.emit_trace(format_args!("error: {}", diag.message));
        }
        self.diagnostics.extend(errors);
        match self.mode {
            ErrorMode::Recover => Ok(()),
            ErrorMode::FailFast => Err(Fatal),
        }
    }

    /// Collect diagnostics for unfinished HTML structure at end of input.
    pub(crate) fn finish_html(&mut self) {
        let end = self.source.len();
        self.tokenizer.flush_data(end, &mut self.stack);
        if self.tokenizer.state() != TokState::Data {
            self.diagnostics.push(Diagnostic {
                message: "template ended inside an HTML tag".to_owned(),
                span: Span::collapsed(end),
            });
        }
    }

    fn emit_trace(&mut self, args: std::fmt::Arguments<'_>) {
        if let Some(trace) = self.trace.as_mut() {
            trace(&args.to_string());
        }
    }
}

fn splices_into_attr(stmt: &crate::ast::Statement) -> bool {
    use crate::ast::Statement;
    matches!(
        stmt,
        Statement::Mustache(_) | Statement::MustacheContent(_) | Statement::Block(_)
    )
}
