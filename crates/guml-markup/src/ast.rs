use std::fmt;

// ── Span ──────────────────────────────────────────────────────────────────

/// Source range of a node: char offsets plus the 1-based line/column of `start`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Span {
    pub start: usize,
    pub end: usize,
    pub line: usize,
    pub col: usize,
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.col)
    }
}

// ── Operators ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrefixOperator {
    Not,
    Plus,
    Minus,
}

impl PrefixOperator {
    pub const PRECEDENCE: u8 = 70;

    pub fn from_symbol(s: &str) -> Option<Self> {
        Some(match s {
            "!" => Self::Not,
            "+" => Self::Plus,
            "-" => Self::Minus,
            _ => return None,
        })
    }

    pub fn symbol(self) -> &'static str {
        match self {
            Self::Not => "!",
            Self::Plus => "+",
            Self::Minus => "-",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InfixOperator {
    Or,
    And,
    Eq,
    NotEq,
    Ge,
    Le,
    Gt,
    Lt,
    Add,
    Sub,
    Mul,
    Div,
    Rem,
}

impl InfixOperator {
    pub fn from_symbol(s: &str) -> Option<Self> {
        Some(match s {
            "||" => Self::Or,
            "&&" => Self::And,
            "==" => Self::Eq,
            "!=" => Self::NotEq,
            ">=" => Self::Ge,
            "<=" => Self::Le,
            ">" => Self::Gt,
            "<" => Self::Lt,
            "+" => Self::Add,
            "-" => Self::Sub,
            "*" => Self::Mul,
            "/" => Self::Div,
            "%" => Self::Rem,
            _ => return None,
        })
    }

    /// Binding strength; higher binds tighter. All infix operators are left-associative.
    pub fn precedence(self) -> u8 {
        match self {
            Self::Or | Self::And => 10,
            Self::Eq | Self::NotEq => 20,
            Self::Ge | Self::Le | Self::Gt | Self::Lt => 30,
            Self::Add | Self::Sub => 40,
            Self::Mul | Self::Div | Self::Rem => 50,
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            Self::Or => "||",
            Self::And => "&&",
            Self::Eq => "==",
            Self::NotEq => "!=",
            Self::Ge => ">=",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Lt => "<",
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mul => "*",
            Self::Div => "/",
            Self::Rem => "%",
        }
    }
}

// ── Expressions ───────────────────────────────────────────────────────────

/// An expression tree. Every child is owned by exactly one parent; there are
/// no back-links.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Value(ValueNode),
    Prefix(PrefixNode),
    Infix(InfixNode),
}

impl Expr {
    pub fn span(&self) -> Span {
        match self {
            Expr::Value(v) => v.span,
            Expr::Prefix(p) => p.span,
            Expr::Infix(i) => i.span,
        }
    }

    /// `true` for an operator node that was written inside parentheses.
    pub fn is_grouped(&self) -> bool {
        match self {
            Expr::Value(_) => false,
            Expr::Prefix(p) => p.grouped,
            Expr::Infix(i) => i.grouped,
        }
    }

    pub(crate) fn set_grouped(&mut self) {
        match self {
            Expr::Value(_) => {}
            Expr::Prefix(p) => p.grouped = true,
            Expr::Infix(i) => i.grouped = true,
        }
    }

    pub fn as_value(&self) -> Option<&ValueNode> {
        match self {
            Expr::Value(v) => Some(v),
            _ => None,
        }
    }

    /// The literal text if this expression is a plain string literal.
    pub fn as_str(&self) -> Option<&str> {
        match self.as_value().map(|v| &v.value) {
            Some(Value::Str(s)) => Some(s),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PrefixNode {
    pub op: PrefixOperator,
    pub right: Box<Expr>,
    /// Parenthesised in source; an enclosing operator treats it as atomic.
    pub grouped: bool,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InfixNode {
    pub op: InfixOperator,
    pub left: Box<Expr>,
    pub right: Box<Expr>,
    pub grouped: bool,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ValueNode {
    pub value: Value,
    pub span: Span,
}

impl ValueNode {
    pub fn new(value: Value, span: Span) -> Self {
        Self { value, span }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StyleBoxKind {
    Empty,
    Flat,
    Line,
    Texture,
}

impl StyleBoxKind {
    /// Constructor name as written in source (`style_flat(...)`).
    pub fn from_constructor(name: &str) -> Option<Self> {
        Some(match name {
            "style_empty" => Self::Empty,
            "style_flat" => Self::Flat,
            "style_line" => Self::Line,
            "style_texture" => Self::Texture,
            _ => return None,
        })
    }

    pub fn constructor(self) -> &'static str {
        match self {
            Self::Empty => "style_empty",
            Self::Flat => "style_flat",
            Self::Line => "style_line",
            Self::Texture => "style_texture",
        }
    }
}

/// A literal, composite literal, or reference.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Int(i64),
    Float(f64),
    Bool(bool),
    Str(String),
    Null,
    Vec2(Box<Expr>, Box<Expr>),
    /// `color(r, g, b, a)`; `a` defaults to a literal `1.0` when omitted.
    Color([Box<Expr>; 4]),
    /// `{ key: expr, ... }` in declaration order.
    Object(Vec<(String, Expr)>),
    /// `resource(path_expr)`
    Resource(Box<Expr>),
    StyleBox {
        kind: StyleBoxKind,
        props: Option<Box<Expr>>,
    },
    Ref(Reference),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RefKind {
    Global,
    LocalAlias,
    LocalVar,
    PropertyChain,
}

impl fmt::Display for RefKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RefKind::Global => "global",
            RefKind::LocalAlias => "alias",
            RefKind::LocalVar => "local",
            RefKind::PropertyChain => "property",
        })
    }
}

/// A name lookup. `a.b.c` is `Property(Property(Local(a), b), c)`: the
/// outermost node is the last property accessed.
#[derive(Debug, Clone, PartialEq)]
pub enum Reference {
    /// `$name`, stored with the sigil.
    Global(String),
    /// `@name`, stored without the sigil.
    Alias(String),
    /// A loop variable.
    Local(String),
    Property { base: Box<ValueNode>, name: String },
}

impl Reference {
    pub fn kind(&self) -> RefKind {
        match self {
            Reference::Global(_) => RefKind::Global,
            Reference::Alias(_) => RefKind::LocalAlias,
            Reference::Local(_) => RefKind::LocalVar,
            Reference::Property { .. } => RefKind::PropertyChain,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Reference::Global(n) | Reference::Alias(n) | Reference::Local(n) => n,
            Reference::Property { name, .. } => name,
        }
    }
}

// ── Components ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Binding {
    /// `key: value`, evaluated once.
    Static,
    /// `key := value`, re-evaluated when a referenced object changes.
    Reactive,
}

/// One `key: value` / `key := value` entry.
#[derive(Debug, Clone, PartialEq)]
pub struct Property {
    pub key: String,
    pub binding: Binding,
    pub value: Expr,
    pub span: Span,
}

/// `#event: "handler"`; `event` has the `#` stripped.
#[derive(Debug, Clone, PartialEq)]
pub struct Signal {
    pub event: String,
    pub handler: String,
    pub span: Span,
}

/// One markup element, instantiated as one widget.
///
/// ```guml
/// @title: Label {
///     text := $controller.title
///     #ready: "on_title_ready"
/// }
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct ComponentNode {
    /// Widget type name: `"Label"`, `"VBox"`.
    pub name: String,
    /// `@alias:` prefix, stored without the sigil.
    pub alias: Option<String>,
    pub properties: Vec<Property>,
    pub signals: Vec<Signal>,
    pub children: Vec<ComponentNode>,
    pub each_blocks: Vec<EachNode>,
    pub span: Span,
}

impl ComponentNode {
    pub fn new(name: impl Into<String>, span: Span) -> Self {
        Self {
            name: name.into(),
            alias: None,
            properties: Vec::new(),
            signals: Vec::new(),
            children: Vec::new(),
            each_blocks: Vec::new(),
            span,
        }
    }

    /// Look up a property by key.
    pub fn property(&self, key: &str) -> Option<&Property> {
        self.properties.iter().find(|p| p.key == key)
    }

    pub fn signal(&self, event: &str) -> Option<&Signal> {
        self.signals.iter().find(|s| s.event == event)
    }

    /// Depth-first walk over this node and every descendant, including
    /// `each` templates.
    pub fn walk<'a>(&'a self, f: &mut dyn FnMut(&'a ComponentNode)) {
        f(self);
        for child in &self.children {
            child.walk(f);
        }
        for each in &self.each_blocks {
            each.walk(f);
        }
    }
}

/// `each source using Type { |index, value| template }`
#[derive(Debug, Clone, PartialEq)]
pub struct EachNode {
    pub data_source: Expr,
    /// Per-item controller / widget type named after `using`.
    pub item_type: String,
    pub index_var: String,
    pub value_var: String,
    /// Template instantiated once per collection element.
    pub children: Vec<ComponentNode>,
    /// Nested loops, instantiated per element after `children`.
    pub each_blocks: Vec<EachNode>,
    pub span: Span,
}

impl EachNode {
    pub fn walk<'a>(&'a self, f: &mut dyn FnMut(&'a ComponentNode)) {
        for child in &self.children {
            child.walk(f);
        }
        for each in &self.each_blocks {
            each.walk(f);
        }
    }
}

// ── Document ──────────────────────────────────────────────────────────────

/// `import "name"` or `import_top "name"`.
#[derive(Debug, Clone, PartialEq)]
pub struct Import {
    pub module: String,
    /// `import_top`: render under the host root instead of this document's root.
    pub top_level: bool,
    pub span: Span,
}

/// The top-level parse result for a `.guml` source file.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    /// Imports in source order; module names are unique.
    pub imports: Vec<Import>,
    /// Declared `@alias` names in source order. The aliased nodes themselves
    /// live in the tree (see [`ComponentNode::alias`]).
    pub local_aliases: Vec<String>,
    /// `using "Controller"` directive.
    pub redirect_controller: Option<String>,
    pub root: ComponentNode,
}

impl Document {
    pub fn import(&self, module: &str) -> Option<&Import> {
        self.imports.iter().find(|i| i.module == module)
    }

    /// Find the node declared with `@alias`.
    pub fn alias_target(&self, alias: &str) -> Option<&ComponentNode> {
        let mut found = None;
        self.root.walk(&mut |node| {
            if found.is_none() && node.alias.as_deref() == Some(alias) {
                found = Some(node);
            }
        });
        found
    }
}

// ── Printing ──────────────────────────────────────────────────────────────

/// Prints source-like text. Only parenthesised groups get parentheses back,
/// so `print(parse(s))` keeps the tree shape of `s`.
impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (open, close) = if self.is_grouped() { ("(", ")") } else { ("", "") };
        match self {
            Expr::Value(v) => write!(f, "{}", v.value),
            Expr::Prefix(p) => write!(f, "{open}{}{}{close}", p.op.symbol(), p.right),
            Expr::Infix(i) => write!(f, "{open}{} {} {}{close}", i.left, i.op.symbol(), i.right),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(n) => write!(f, "{n}"),
            Value::Float(x) if x.fract() == 0.0 && x.is_finite() => write!(f, "{x:.1}"),
            Value::Float(x) => write!(f, "{x}"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Str(s) => write!(f, "{s:?}"),
            Value::Null => f.write_str("null"),
            Value::Vec2(x, y) => write!(f, "vec2({x}, {y})"),
            Value::Color([r, g, b, a]) => write!(f, "color({r}, {g}, {b}, {a})"),
            Value::Object(entries) => {
                f.write_str("{ ")?;
                for (i, (k, v)) in entries.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{k}: {v}")?;
                }
                f.write_str(" }")
            }
            Value::Resource(path) => write!(f, "resource({path})"),
            Value::StyleBox { kind, props: Some(props) } => write!(f, "{}({props})", kind.constructor()),
            Value::StyleBox { kind, props: None } => write!(f, "{}()", kind.constructor()),
            Value::Ref(r) => write!(f, "{r}"),
        }
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reference::Global(n) | Reference::Local(n) => f.write_str(n),
            Reference::Alias(n) => write!(f, "@{n}"),
            Reference::Property { base, name } => write!(f, "{}.{name}", base.value),
        }
    }
}
