//! Expression parsing.
//!
//! Operands and operators are folded with a stack of slots. Each slot is one
//! parenthesis level and holds its pending operators (the right spine of the
//! tree under construction) plus at most one finished operand. A `-` or `+`
//! is prefix when the slot has no operand yet, infix otherwise.

use crate::ast::{Expr, InfixNode, InfixOperator, PrefixNode, PrefixOperator, Reference, Span, StyleBoxKind, Value, ValueNode};
use crate::error::{ParseError, ParseErrorKind};
use crate::lexer::{Token, TokenKind};
use crate::parser::{span_of, Parser};

enum Pending {
    Prefix(PrefixOperator, Span),
    Infix(InfixOperator, Expr, Span),
}

impl Pending {
    fn precedence(&self) -> u8 {
        match self {
            Pending::Prefix(..) => PrefixOperator::PRECEDENCE,
            Pending::Infix(op, ..) => op.precedence(),
        }
    }

    fn fold(self, right: Expr) -> Expr {
        match self {
            Pending::Prefix(op, span) => {
                let span = Span { end: right.span().end, ..span };
                Expr::Prefix(PrefixNode { op, right: Box::new(right), grouped: false, span })
            }
            Pending::Infix(op, left, _) => {
                let span = Span { end: right.span().end, ..left.span() };
                Expr::Infix(InfixNode { op, left: Box::new(left), right: Box::new(right), grouped: false, span })
            }
        }
    }
}

struct Slot {
    spine: Vec<Pending>,
    operand: Option<Expr>,
    /// The `(` that opened this slot; `None` for the outermost level.
    open: Option<Span>,
}

impl Slot {
    fn new(open: Option<Span>) -> Self {
        Self { spine: Vec::new(), operand: None, open }
    }

    fn push_infix(&mut self, op: InfixOperator, span: Span, mut left: Expr) {
        while self.spine.last().is_some_and(|p| p.precedence() >= op.precedence()) {
            if let Some(p) = self.spine.pop() {
                left = p.fold(left);
            }
        }
        self.spine.push(Pending::Infix(op, left, span));
    }

    fn finish(mut self, parser: &Parser<'_>) -> Result<Expr, ParseError> {
        let mut expr = match self.operand.take() {
            Some(e) => e,
            None => return Err(parser.unexpected("a value")),
        };
        while let Some(p) = self.spine.pop() {
            expr = p.fold(expr);
        }
        Ok(expr)
    }
}

fn starts_operand(kind: TokenKind) -> bool {
    matches!(
        kind,
        TokenKind::Str
            | TokenKind::Integer
            | TokenKind::Float
            | TokenKind::Boolean
            | TokenKind::Null
            | TokenKind::Resource
            | TokenKind::Vec2
            | TokenKind::LBrace
            | TokenKind::GlobalRef
            | TokenKind::AliasRef
            | TokenKind::Name
    )
}

impl Parser<'_> {
    /// A property or object value: an expression passed through the value converters.
    pub(crate) fn parse_value(&mut self) -> Result<Expr, ParseError> {
        let expr = self.parse_expr()?;
        Ok(self.converters.value(expr))
    }

    /// Parse one expression, stopping at the first token that cannot extend
    /// it (`,`, `|`, `}`, an unmatched `)`, or the start of the next item).
    pub(crate) fn parse_expr(&mut self) -> Result<Expr, ParseError> {
        let mut slots = vec![Slot::new(None)];

        loop {
            let kind = self.peek_kind();
            let has_operand = slots.last().is_some_and(|s| s.operand.is_some());
            match kind {
                TokenKind::Operator => {
                    let tok = self.advance();
                    let span = span_of(&tok);
                    let Some(slot) = slots.last_mut() else { break };
                    match slot.operand.take() {
                        None => {
                            let Some(op) = PrefixOperator::from_symbol(&tok.value) else {
                                return Err(Self::err_at(
                                    span,
                                    ParseErrorKind::Syntax,
                                    format!("expected a value before '{}'", tok.value),
                                ));
                            };
                            slot.spine.push(Pending::Prefix(op, span));
                        }
                        Some(left) => {
                            let Some(op) = InfixOperator::from_symbol(&tok.value) else {
                                return Err(Self::err_at(
                                    span,
                                    ParseErrorKind::Syntax,
                                    format!("unsupported operator '{}'", tok.value),
                                ));
                            };
                            slot.push_infix(op, span, left);
                        }
                    }
                }
                TokenKind::LParen => {
                    if has_operand {
                        return Err(self.unexpected("an operator"));
                    }
                    let tok = self.advance();
                    slots.push(Slot::new(Some(span_of(&tok))));
                }
                TokenKind::RParen if slots.len() > 1 => {
                    let Some(inner) = slots.pop() else { break };
                    let mut expr = inner.finish(self)?;
                    self.advance();
                    expr.set_grouped();
                    if let Some(outer) = slots.last_mut() {
                        outer.operand = Some(expr);
                    }
                }
                _ if !has_operand && starts_operand(kind) => {
                    let operand = self.parse_operand()?;
                    if let Some(slot) = slots.last_mut() {
                        slot.operand = Some(operand);
                    }
                }
                _ => break,
            }
        }

        if slots.len() > 1 {
            let open = slots.last().and_then(|s| s.open).unwrap_or_default();
            return Err(ParseError::syntax(
                format!("unclosed '(' opened at {open}; found '{}'", self.peek().value),
                self.peek().line,
                self.peek().col,
            ));
        }
        match slots.pop() {
            Some(slot) => slot.finish(self),
            None => Err(self.unexpected("a value")),
        }
    }

    // ── Operands ──────────────────────────────────────────────────────────

    fn parse_operand(&mut self) -> Result<Expr, ParseError> {
        let tok = self.advance();
        let span = span_of(&tok);
        let value = match tok.kind {
            TokenKind::Str => Value::Str(unescape(&tok.value)),
            TokenKind::Integer => match tok.value.parse::<i64>() {
                Ok(n) => Value::Int(n),
                Err(_) => {
                    return Err(Self::err_at(span, ParseErrorKind::Syntax, format!("integer literal {} is out of range", tok.value)));
                }
            },
            TokenKind::Float => match tok.value.parse::<f64>() {
                Ok(x) => Value::Float(x),
                Err(_) => {
                    return Err(Self::err_at(span, ParseErrorKind::Syntax, format!("invalid float literal {}", tok.value)));
                }
            },
            TokenKind::Boolean => Value::Bool(tok.value == "true"),
            TokenKind::Null => Value::Null,
            TokenKind::Resource => {
                self.expect(TokenKind::LParen)?;
                let path = self.parse_expr()?;
                self.expect(TokenKind::RParen)?;
                Value::Resource(Box::new(path))
            }
            TokenKind::Vec2 => {
                self.expect(TokenKind::LParen)?;
                let x = self.parse_expr()?;
                self.expect(TokenKind::Comma)?;
                let y = self.parse_expr()?;
                self.expect(TokenKind::RParen)?;
                Value::Vec2(Box::new(x), Box::new(y))
            }
            TokenKind::LBrace => Value::Object(self.parse_object_entries()?),
            TokenKind::Name if self.peek_kind() == TokenKind::LParen && is_constructor(&tok.value) => {
                self.parse_constructor(&tok)?
            }
            TokenKind::GlobalRef | TokenKind::AliasRef | TokenKind::Name => {
                return Ok(Expr::Value(self.parse_reference(&tok)?));
            }
            _ => {
                return Err(Self::err_at(span, ParseErrorKind::Syntax, format!("expected a value, found '{}'", tok.value)));
            }
        };
        let end = self.previous_end().unwrap_or(span.end);
        Ok(Expr::Value(ValueNode::new(value, Span { end, ..span })))
    }

    /// `{ key: value, ... }` after the opening brace; consumes the closing brace.
    fn parse_object_entries(&mut self) -> Result<Vec<(String, Expr)>, ParseError> {
        let mut entries: Vec<(String, Expr)> = Vec::new();
        loop {
            if self.peek_kind() == TokenKind::RBrace {
                break;
            }
            let key_tok = match self.peek_kind() {
                TokenKind::Name | TokenKind::Component | TokenKind::Str => self.advance(),
                _ => return Err(self.unexpected("an object key")),
            };
            self.expect(TokenKind::Colon)?;
            let key = self.converters.key(key_tok.value.clone());
            let value = self.parse_value()?;
            if entries.iter().any(|(k, _)| *k == key) {
                return Err(Self::err_at(
                    span_of(&key_tok),
                    ParseErrorKind::DuplicateKey(key.clone()),
                    format!("object key '{key}' is already set"),
                ));
            }
            entries.push((key, value));
            if self.peek_kind() == TokenKind::Comma {
                self.advance();
            } else {
                break;
            }
        }
        self.expect(TokenKind::RBrace)?;
        Ok(entries)
    }

    /// `color(r, g, b[, a])` and `style_*([props])`.
    fn parse_constructor(&mut self, name: &Token) -> Result<Value, ParseError> {
        self.expect(TokenKind::LParen)?;
        let value = if name.value == "color" {
            let r = self.parse_expr()?;
            self.expect(TokenKind::Comma)?;
            let g = self.parse_expr()?;
            self.expect(TokenKind::Comma)?;
            let b = self.parse_expr()?;
            let a = if self.peek_kind() == TokenKind::Comma {
                self.advance();
                self.parse_expr()?
            } else {
                Expr::Value(ValueNode::new(Value::Float(1.0), span_of(name)))
            };
            Value::Color([Box::new(r), Box::new(g), Box::new(b), Box::new(a)])
        } else {
            let Some(kind) = StyleBoxKind::from_constructor(&name.value) else {
                return Err(Self::err_at(span_of(name), ParseErrorKind::Syntax, format!("unknown constructor '{}'", name.value)));
            };
            let props = if self.peek_kind() == TokenKind::RParen {
                None
            } else {
                Some(Box::new(self.parse_expr()?))
            };
            Value::StyleBox { kind, props }
        };
        self.expect(TokenKind::RParen)?;
        Ok(value)
    }

    /// `$g.a.b`, `@alias.text`, `item.name`: each `.name` wraps the chain so far.
    fn parse_reference(&mut self, head: &Token) -> Result<ValueNode, ParseError> {
        let reference = match head.kind {
            TokenKind::GlobalRef => Reference::Global(head.value.clone()),
            TokenKind::AliasRef => Reference::Alias(head.value[1..].to_string()),
            _ => Reference::Local(head.value.clone()),
        };
        let start = span_of(head);
        let mut node = ValueNode::new(Value::Ref(reference), start);
        while self.peek_kind() == TokenKind::Dot {
            self.advance();
            let name = self.expect(TokenKind::Name)?;
            let span = Span { end: name.end, ..start };
            node = ValueNode::new(Value::Ref(Reference::Property { base: Box::new(node), name: name.value }), span);
        }
        Ok(node)
    }
}

fn is_constructor(name: &str) -> bool {
    name == "color" || StyleBoxKind::from_constructor(name).is_some()
}

/// Decode `\n \t \r \0 \\ \" \'`; any other escaped character stands for itself.
pub(crate) fn unescape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            out.push(ch);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('0') => out.push('\0'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_str;

    /// Parse `src` as the value of a single property and print it back with
    /// explicit parentheses around every operator node.
    fn tree(src: &str) -> String {
        let doc = parse_str(&format!("Label {{ v: {src} }}")).unwrap();
        shape(&doc.root.properties[0].value)
    }

    fn shape(e: &Expr) -> String {
        match e {
            Expr::Value(v) => v.value.to_string(),
            Expr::Prefix(p) => format!("({}{})", p.op.symbol(), shape(&p.right)),
            Expr::Infix(i) => format!("({} {} {})", shape(&i.left), i.op.symbol(), shape(&i.right)),
        }
    }

    fn value_err(src: &str) -> ParseError {
        parse_str(&format!("Label {{ v: {src} }}")).unwrap_err()
    }

    #[test]
    fn multiplication_binds_tighter() {
        assert_eq!(tree("1 + 2 * 3"), "(1 + (2 * 3))");
        assert_eq!(tree("1 * 2 + 3"), "((1 * 2) + 3)");
    }

    #[test]
    fn parentheses_group() {
        assert_eq!(tree("(1 + 2) * 3"), "((1 + 2) * 3)");
        assert_eq!(tree("2 * (3 - (4 + 5))"), "(2 * (3 - (4 + 5)))");
    }

    #[test]
    fn grouped_flag_is_set() {
        let doc = parse_str("Label { v: (1 + 2) * 3 }").unwrap();
        match &doc.root.properties[0].value {
            Expr::Infix(i) => {
                assert!(!i.grouped);
                assert!(i.left.is_grouped());
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(doc.root.properties[0].value.to_string(), "(1 + 2) * 3");
    }

    #[test]
    fn left_associative() {
        assert_eq!(tree("10 - 3 - 2"), "((10 - 3) - 2)");
        assert_eq!(tree("8 / 4 / 2"), "((8 / 4) / 2)");
    }

    #[test]
    fn prefix_operators() {
        assert_eq!(tree("-2 + 3"), "((-2) + 3)");
        assert_eq!(tree("1 - -2"), "(1 - (-2))");
        assert_eq!(tree("!a && b"), "((!a) && b)");
        assert_eq!(tree("-(1 + 2)"), "(-(1 + 2))");
        assert_eq!(tree("!!x"), "(!(!x))");
    }

    #[test]
    fn full_precedence_ladder() {
        assert_eq!(
            tree("a || b == c < d + e * f"),
            "(a || (b == (c < (d + (e * f)))))"
        );
        assert_eq!(tree("a >= 1 && b <= 2"), "((a >= 1) && (b <= 2))");
    }

    #[test]
    fn reference_chain_grows_right() {
        let doc = parse_str("Label { v: $controller.actors.first }").unwrap();
        let Expr::Value(v) = &doc.root.properties[0].value else { panic!() };
        let Value::Ref(Reference::Property { base, name }) = &v.value else { panic!() };
        assert_eq!(name, "first");
        let Value::Ref(Reference::Property { base, name }) = &base.value else { panic!() };
        assert_eq!(name, "actors");
        assert_eq!(base.value, Value::Ref(Reference::Global("$controller".into())));
    }

    #[test]
    fn composite_literals() {
        assert_eq!(tree("vec2(1 + 1, -3)"), "vec2(1 + 1, -3)");
        assert_eq!(tree("resource(\"icons/\" + name)"), "resource(\"icons/\" + name)");
        assert_eq!(tree("{ a: 1, b: { c: true } }"), "{ a: 1, b: { c: true } }");
        assert_eq!(tree("color(1, 0.5, 0)"), "color(1, 0.5, 0, 1.0)");
        assert_eq!(tree("style_flat({ bg_color: color(0, 0, 0, 1) })"), "style_flat({ bg_color: color(0, 0, 0, 1) })");
        assert_eq!(tree("style_empty()"), "style_empty()");
    }

    #[test]
    fn string_escapes_are_decoded() {
        let doc = parse_str(r#"Label { v: "say \"hi\"\n" }"#).unwrap();
        assert_eq!(doc.root.properties[0].value.as_str(), Some("say \"hi\"\n"));
    }

    #[test]
    fn errors() {
        assert_eq!(value_err("1 +").kind, ParseErrorKind::Syntax);
        assert_eq!(value_err("(1 + 2").kind, ParseErrorKind::Syntax);
        assert_eq!(value_err("* 2").kind, ParseErrorKind::Syntax);
        assert_eq!(value_err("1 ^ 2").kind, ParseErrorKind::Syntax);
        assert_eq!(value_err("a (1)").kind, ParseErrorKind::Syntax);
        assert_eq!(value_err("()").kind, ParseErrorKind::Syntax);
        assert_eq!(value_err("{ a: 1, a: 2 }").kind, ParseErrorKind::DuplicateKey("a".into()));
    }

    #[test]
    fn empty_value_is_an_error() {
        let e = parse_str("Label { v: }").unwrap_err();
        assert!(e.message.contains("expected a value"), "{}", e.message);
    }

    #[test]
    fn operand_spans() {
        let doc = parse_str("Label { v: 1 + 22 }").unwrap();
        let e = &doc.root.properties[0].value;
        assert_eq!((e.span().start, e.span().end), (11, 17));
    }
}
