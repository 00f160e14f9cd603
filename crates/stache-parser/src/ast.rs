//! Abstract Syntax Tree for stache templates.
//!
//! Every node owns a byte-offset `Span`. Child spans nest inside their
//! parent's span except for synthesized error/placeholder nodes, which use
//! collapsed or `MISSING` spans. Line/column positions are computed on
//! demand (see `position`), never stored here.

use stache_lexer::Span;

// ---------------------------------------------------------------------------
// Top-level containers
// ---------------------------------------------------------------------------

/// A fully parsed template.
#[derive(Debug, Clone, PartialEq)]
pub struct Root {
    pub body: Vec<Statement>,
    pub span: Span,
}

/// A statement sequence: a block's default or inverse body.
///
/// `chained` marks an inverse program that was desugared from
/// `{{else expr ...}}` and contains a single nested `BlockStatement`.
#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    pub body: Vec<Statement>,
    pub block_params: Option<BlockParams>,
    pub chained: bool,
    pub span: Span,
}

/// Block parameters: `as |item index|`.
#[derive(Debug, Clone, PartialEq)]
pub struct BlockParams {
    pub names: Vec<PathSegment>,
    pub span: Span,
}

// ---------------------------------------------------------------------------
// Statements
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    /// `{{helper arg key=value}}` — a mustache with params and/or hash.
    Mustache(MustacheStatement),

    /// `{{expr}}` — a bare mustache with no params or hash.
    MustacheContent(MustacheContent),

    /// `{{#name ...}} ... {{else}} ... {{/name}}`.
    Block(BlockStatement),

    /// An HTML element with attributes and children.
    Element(ElementNode),

    /// A run of plain text.
    Content(ContentStatement),

    /// A single newline. Merged into content by `combine_content`.
    Newline(NewlineNode),

    /// A static text part inside an attribute value or concat.
    Text(TextNode),

    /// A multi-part attribute value.
    Concat(ConcatStatement),

    /// `<!-- ... -->`.
    HtmlComment(HtmlCommentNode),

    /// `{{! ... }}` or `{{!-- ... --}}`.
    Comment(CommentStatement),
}

impl Statement {
    pub fn span(&self) -> Span {
        match self {
            Statement::Mustache(s) => s.span,
            Statement::MustacheContent(s) => s.span,
            Statement::Block(s) => s.span,
            Statement::Element(s) => s.span,
            Statement::Content(s) => s.span,
            Statement::Newline(s) => s.span,
            Statement::Text(s) => s.span,
            Statement::Concat(s) => s.span,
            Statement::HtmlComment(s) => s.span,
            Statement::Comment(s) => s.span,
        }
    }
}

/// A mustache invocation with arguments: `{{helper a b key=c}}`.
#[derive(Debug, Clone, PartialEq)]
pub struct MustacheStatement {
    pub call: Call,
    /// `true` for triple mustaches `{{{ ... }}}`.
    pub trusted: bool,
    pub span: Span,
}

/// A bare mustache: `{{expr}}` with no params and no hash.
#[derive(Debug, Clone, PartialEq)]
pub struct MustacheContent {
    pub value: Expression,
    pub trusted: bool,
    pub span: Span,
}

/// The callee/params/hash triple shared by mustaches, blocks and
/// sub-expressions.
#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    pub callee: Expression,
    pub params: Vec<Expression>,
    pub hash: Hash,
    pub span: Span,
}

/// A block statement with a default program and optional inverse.
#[derive(Debug, Clone, PartialEq)]
pub struct BlockStatement {
    pub call: Call,
    pub program: Program,
    pub inverse: Option<Program>,
    pub span: Span,
}

/// An HTML element.
#[derive(Debug, Clone, PartialEq)]
pub struct ElementNode {
    pub tag: String,
    pub attributes: Vec<AttrNode>,
    pub children: Vec<Statement>,
    pub self_closing: bool,
    pub span: Span,
}

/// An attribute on an element.
#[derive(Debug, Clone, PartialEq)]
pub struct AttrNode {
    pub name: String,
    pub name_span: Span,
    pub value: AttrValue,
    pub span: Span,
}

/// How an attribute value was assembled.
///
/// A quoted value with a single dynamic part stays a `Concat`; only a bare
/// unquoted mustache collapses to `Mustache`.
#[derive(Debug, Clone, PartialEq)]
pub enum AttrValue {
    Text(TextNode),
    Mustache(Box<Statement>),
    Concat(ConcatStatement),
}

impl AttrValue {
    pub fn span(&self) -> Span {
        match self {
            AttrValue::Text(t) => t.span,
            AttrValue::Mustache(s) => s.span(),
            AttrValue::Concat(c) => c.span,
        }
    }
}

/// A static text run inside an attribute value or concat part.
#[derive(Debug, Clone, PartialEq)]
pub struct TextNode {
    pub chars: String,
    pub span: Span,
}

/// A run of plain text in a statement body.
#[derive(Debug, Clone, PartialEq)]
pub struct ContentStatement {
    pub value: String,
    pub span: Span,
}

/// A single newline in a statement body.
#[derive(Debug, Clone, PartialEq)]
pub struct NewlineNode {
    pub span: Span,
}

/// An attribute value with multiple parts (text and mustaches).
#[derive(Debug, Clone, PartialEq)]
pub struct ConcatStatement {
    pub parts: Vec<Statement>,
    pub span: Span,
}

/// A mustache comment. `value` is the interior text without delimiters.
#[derive(Debug, Clone, PartialEq)]
pub struct CommentStatement {
    pub value: String,
    pub span: Span,
}

/// An HTML comment. `value` is the interior text without `<!--`/`-->`.
#[derive(Debug, Clone, PartialEq)]
pub struct HtmlCommentNode {
    pub value: String,
    pub span: Span,
}

// ---------------------------------------------------------------------------
// Hash
// ---------------------------------------------------------------------------

/// The named-argument list of a call: `key=value ...`.
#[derive(Debug, Clone, PartialEq)]
pub struct Hash {
    pub pairs: Vec<HashPair>,
    pub span: Span,
}

impl Hash {
    pub fn empty(span: Span) -> Self {
        Self {
            pairs: Vec::new(),
            span,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct HashPair {
    pub key: String,
    pub key_span: Span,
    pub value: Expression,
    pub span: Span,
}

// ---------------------------------------------------------------------------
// Expressions
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    Path(PathExpression),
    SubExpression(SubExpression),
    String(StringLiteral),
    Number(NumberLiteral),
    Boolean(BooleanLiteral),
    Null(NullLiteral),
    Undefined(UndefinedLiteral),
}

impl Expression {
    pub fn span(&self) -> Span {
        match self {
            Expression::Path(e) => e.span,
            Expression::SubExpression(e) => e.span,
            Expression::String(e) => e.span,
            Expression::Number(e) => e.span,
            Expression::Boolean(e) => e.span,
            Expression::Null(e) => e.span,
            Expression::Undefined(e) => e.span,
        }
    }
}

/// A parenthesized call: `(helper a b)`.
#[derive(Debug, Clone, PartialEq)]
pub struct SubExpression {
    pub call: Box<Call>,
    pub span: Span,
}

/// A dotted path: `user.name`, `@index`, `this.title`.
#[derive(Debug, Clone, PartialEq)]
pub struct PathExpression {
    pub head: Head,
    pub tail: Vec<PathSegment>,
    pub span: Span,
}

/// The distinguished first segment of a path.
#[derive(Debug, Clone, PartialEq)]
pub enum Head {
    /// An ordinary name: `user`.
    Local(LocalReference),
    /// `@name` — an argument reference like `@index`.
    Arg(ArgReference),
    /// The `this` keyword.
    This(ThisHead),
}

impl Head {
    pub fn span(&self) -> Span {
        match self {
            Head::Local(h) => h.span,
            Head::Arg(h) => h.span,
            Head::This(h) => h.span,
        }
    }

    /// The head's source name (`@` included for arg references).
    pub fn name(&self) -> &str {
        match self {
            Head::Local(h) => &h.name,
            Head::Arg(h) => &h.name,
            Head::This(_) => "this",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LocalReference {
    pub name: String,
    pub span: Span,
}

/// `name` keeps the leading `@`.
#[derive(Debug, Clone, PartialEq)]
pub struct ArgReference {
    pub name: String,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ThisHead {
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PathSegment {
    pub name: String,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StringLiteral {
    pub value: String,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NumberLiteral {
    pub value: f64,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BooleanLiteral {
    pub value: bool,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NullLiteral {
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UndefinedLiteral {
    pub span: Span,
}
