use crate::ast::{Binding, ComponentNode, Document, EachNode, Expr, Import, Property, Signal, Span};
use crate::convert::Converters;
use crate::error::{ParseError, ParseErrorKind};
use crate::lexer::{Token, TokenKind, Tokenizer};

// ── GumlParser ────────────────────────────────────────────────────────────

/// A reusable parser: the GUML tokenizer plus a set of converters.
///
/// ```rust
/// use guml_markup::{GumlParser, KeyCasing};
///
/// let mut parser = GumlParser::new();
/// parser.converters_mut().add_key(KeyCasing::Pascal);
/// let doc = parser.parse("Label { font_size: 12 }").unwrap();
/// assert_eq!(doc.root.properties[0].key, "FontSize");
/// ```
#[derive(Default)]
pub struct GumlParser {
    tokenizer: Tokenizer,
    converters: Converters,
}

impl GumlParser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_converters(converters: Converters) -> Self {
        Self { tokenizer: Tokenizer::guml(), converters }
    }

    pub fn converters(&self) -> &Converters {
        &self.converters
    }

    pub fn converters_mut(&mut self) -> &mut Converters {
        &mut self.converters
    }

    fn tokens(&self, src: &str) -> Result<Vec<Token>, ParseError> {
        Ok(self.tokenizer.tokenize(src)?.into_iter().map(|t| self.converters.token(t)).collect())
    }

    /// Parse a `.guml` source string into a [`Document`].
    pub fn parse(&self, src: &str) -> Result<Document, ParseError> {
        let doc = Parser::new(self.tokens(src)?, &self.converters).parse_document()?;
        log::trace!(
            "parsed document: root {} with {} import(s), {} alias(es)",
            doc.root.name,
            doc.imports.len(),
            doc.local_aliases.len()
        );
        Ok(doc)
    }

    /// Parse a single expression, e.g. `1 + $controller.count`.
    pub fn parse_expr(&self, src: &str) -> Result<Expr, ParseError> {
        let mut parser = Parser::new(self.tokens(src)?, &self.converters);
        let expr = parser.parse_value()?;
        if parser.peek_kind() != TokenKind::Eof {
            return Err(parser.unexpected("end of expression"));
        }
        Ok(expr)
    }
}

/// Parse with the default tokenizer and no converters.
pub fn parse_str(src: &str) -> Result<Document, ParseError> {
    GumlParser::new().parse(src)
}

// ── Parser ────────────────────────────────────────────────────────────────

/// Everything a component or `each` body may contain.
#[derive(Default)]
struct Body {
    properties: Vec<Property>,
    signals: Vec<Signal>,
    children: Vec<ComponentNode>,
    each_blocks: Vec<EachNode>,
}

pub(crate) struct Parser<'c> {
    tokens: Vec<Token>,
    pos: usize,
    pub(crate) converters: &'c Converters,
    imports: Vec<Import>,
    aliases: Vec<String>,
}

impl<'c> Parser<'c> {
    pub(crate) fn new(tokens: Vec<Token>, converters: &'c Converters) -> Self {
        Self { tokens, pos: 0, converters, imports: Vec::new(), aliases: Vec::new() }
    }

    pub(crate) fn peek(&self) -> &Token {
        // The tokenizer always terminates the stream with `Eof`.
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    pub(crate) fn peek_kind(&self) -> TokenKind {
        self.peek().kind
    }

    pub(crate) fn advance(&mut self) -> Token {
        let tok = self.peek().clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        tok
    }

    /// End offset of the most recently consumed token.
    pub(crate) fn previous_end(&self) -> Option<usize> {
        self.pos.checked_sub(1).map(|i| self.tokens[i].end)
    }

    pub(crate) fn err(&self, msg: impl Into<String>) -> ParseError {
        let tok = self.peek();
        ParseError::syntax(msg, tok.line, tok.col)
    }

    pub(crate) fn err_at(span: Span, kind: ParseErrorKind, msg: impl Into<String>) -> ParseError {
        ParseError::new(kind, msg, span.line, span.col)
    }

    pub(crate) fn unexpected(&self, expected: &str) -> ParseError {
        let tok = self.peek();
        let found = match tok.kind {
            TokenKind::Eof => "end of input".to_string(),
            _ => format!("'{}'", tok.value),
        };
        self.err(format!("expected {expected}, found {found}"))
    }

    pub(crate) fn expect(&mut self, kind: TokenKind) -> Result<Token, ParseError> {
        if self.peek_kind() == kind {
            Ok(self.advance())
        } else {
            Err(self.unexpected(&kind.to_string()))
        }
    }

    // ── Document ──────────────────────────────────────────────────────────

    pub(crate) fn parse_document(mut self) -> Result<Document, ParseError> {
        while matches!(self.peek_kind(), TokenKind::Import | TokenKind::ImportTop) {
            self.parse_import()?;
        }

        let redirect_controller = if self.peek_kind() == TokenKind::Using {
            self.advance();
            Some(self.expect(TokenKind::Str)?.value)
        } else {
            None
        };

        if self.peek_kind() == TokenKind::Eof {
            let tok = self.peek();
            return Err(ParseError::new(
                ParseErrorKind::MissingRoot,
                "document must have a root component",
                tok.line,
                tok.col,
            ));
        }

        let root = self.parse_component()?;

        if self.peek_kind() != TokenKind::Eof {
            return Err(self.unexpected("end of input after the root component"));
        }

        Ok(Document { imports: self.imports, local_aliases: self.aliases, redirect_controller, root })
    }

    // ── Import ────────────────────────────────────────────────────────────

    fn parse_import(&mut self) -> Result<(), ParseError> {
        let kw = self.advance();
        let top_level = kw.kind == TokenKind::ImportTop;
        let module = self.expect(TokenKind::Str)?;
        if self.imports.iter().any(|i| i.module == module.value) {
            return Err(ParseError::new(
                ParseErrorKind::DuplicateImport(module.value.clone()),
                format!("module '{}' is already imported", module.value),
                module.line,
                module.col,
            ));
        }
        self.imports.push(Import { module: module.value, top_level, span: span_of(&kw) });
        Ok(())
    }

    // ── Component ─────────────────────────────────────────────────────────

    fn parse_component(&mut self) -> Result<ComponentNode, ParseError> {
        let alias = if self.peek_kind() == TokenKind::AliasRef {
            let tok = self.advance();
            self.expect(TokenKind::Colon)?;
            let name = tok.value[1..].to_string();
            if self.aliases.contains(&name) {
                return Err(Self::err_at(
                    span_of(&tok),
                    ParseErrorKind::DuplicateAlias(name.clone()),
                    format!("alias '@{name}' is already declared"),
                ));
            }
            self.aliases.push(name.clone());
            Some(name)
        } else {
            None
        };

        let head = self.expect(TokenKind::Component)?;
        self.expect(TokenKind::LBrace)?;
        let body = self.parse_body()?;
        let close = self.expect(TokenKind::RBrace)?;

        let span = Span { end: close.end, ..span_of(&head) };
        let mut node = ComponentNode::new(head.value, span);
        node.alias = alias;
        node.properties = body.properties;
        node.signals = body.signals;
        node.children = body.children;
        node.each_blocks = body.each_blocks;
        log::trace!("parsed component {} at {}", node.name, node.span);
        Ok(self.converters.component(node))
    }

    /// Parse items up to (not including) the closing `}`.
    fn parse_body(&mut self) -> Result<Body, ParseError> {
        let mut body = Body::default();
        loop {
            match self.peek_kind() {
                TokenKind::RBrace => break,
                TokenKind::Eof => return Err(self.err("unclosed '{' block")),
                TokenKind::Component | TokenKind::AliasRef => {
                    body.children.push(self.parse_component()?);
                }
                TokenKind::Name | TokenKind::SignalName => self.parse_key_values(&mut body)?,
                TokenKind::Each => body.each_blocks.push(self.parse_each()?),
                _ => {
                    return Err(self.unexpected("a property, signal, component or 'each' block"));
                }
            }
        }
        Ok(body)
    }

    // ── Key / value ───────────────────────────────────────────────────────

    /// `key: value (, key: value)*`
    fn parse_key_values(&mut self, body: &mut Body) -> Result<(), ParseError> {
        loop {
            let key_tok = self.advance();
            let binding = match self.peek_kind() {
                TokenKind::Colon => Binding::Static,
                TokenKind::BindAssign => Binding::Reactive,
                _ => return Err(self.unexpected("':' or ':='")),
            };
            self.advance();
            let value = self.parse_value()?;
            let span = Span { end: value.span().end, ..span_of(&key_tok) };

            if key_tok.kind == TokenKind::SignalName {
                let event = self.converters.key(key_tok.value[1..].to_string());
                let Some(handler) = value.as_str().map(str::to_string) else {
                    return Err(Self::err_at(
                        value.span(),
                        ParseErrorKind::Syntax,
                        format!("handler for signal '{event}' must be a string literal"),
                    ));
                };
                if binding == Binding::Reactive {
                    return Err(Self::err_at(span, ParseErrorKind::Syntax, format!("signal '{event}' cannot use ':='")));
                }
                if body.signals.iter().any(|s| s.event == event) {
                    return Err(Self::err_at(
                        span,
                        ParseErrorKind::DuplicateKey(event.clone()),
                        format!("signal '{event}' is already bound"),
                    ));
                }
                body.signals.push(Signal { event, handler, span });
            } else {
                let key = self.converters.key(key_tok.value);
                if body.properties.iter().any(|p| p.key == key) {
                    return Err(Self::err_at(
                        span,
                        ParseErrorKind::DuplicateKey(key.clone()),
                        format!("property '{key}' is already set"),
                    ));
                }
                body.properties.push(Property { key, binding, value, span });
            }

            if self.peek_kind() != TokenKind::Comma {
                return Ok(());
            }
            self.advance();
            if !matches!(self.peek_kind(), TokenKind::Name | TokenKind::SignalName) {
                return Ok(());
            }
        }
    }

    // ── Each ──────────────────────────────────────────────────────────────

    /// `each source using Type { |index, value| body }`
    fn parse_each(&mut self) -> Result<EachNode, ParseError> {
        let kw = self.advance();
        let data_source = self.parse_expr()?;
        self.expect(TokenKind::Using)?;
        let item_type = self.expect(TokenKind::Component)?.value;
        self.expect(TokenKind::LBrace)?;
        self.expect(TokenKind::Pipe)?;
        let index_var = self.expect(TokenKind::Name)?.value;
        self.expect(TokenKind::Comma)?;
        let value_var = self.expect(TokenKind::Name)?.value;
        self.expect(TokenKind::Pipe)?;
        let body = self.parse_body()?;
        let close = self.expect(TokenKind::RBrace)?;

        if let Some(p) = body.properties.first() {
            return Err(Self::err_at(
                p.span,
                ParseErrorKind::Syntax,
                format!("'each' body cannot set property '{}'", p.key),
            ));
        }
        if let Some(s) = body.signals.first() {
            return Err(Self::err_at(
                s.span,
                ParseErrorKind::Syntax,
                format!("'each' body cannot bind signal '{}'", s.event),
            ));
        }

        Ok(EachNode {
            data_source,
            item_type,
            index_var,
            value_var,
            children: body.children,
            each_blocks: body.each_blocks,
            span: Span { end: close.end, ..span_of(&kw) },
        })
    }
}

pub(crate) fn span_of(tok: &Token) -> Span {
    Span { start: tok.start, end: tok.end, line: tok.line, col: tok.col }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{Expr, Reference, Value};

    fn ok(src: &str) -> Document {
        parse_str(src).unwrap()
    }

    fn err(src: &str) -> ParseError {
        parse_str(src).unwrap_err()
    }

    #[test]
    fn empty_component() {
        let doc = ok("Panel { }");
        assert_eq!(doc.root.name, "Panel");
        assert!(doc.root.children.is_empty());
    }

    #[test]
    fn children_keep_source_order() {
        let doc = ok("VBox { Label { } Button { } HBox { Label { } } Panel { } }");
        let names: Vec<_> = doc.root.children.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, ["Label", "Button", "HBox", "Panel"]);
        assert_eq!(doc.root.children[2].children[0].name, "Label");
    }

    #[test]
    fn properties_comma_and_newline_separated() {
        let doc = ok("Label {\n  text: \"hi\", visible: true\n  size: vec2(10, 20)\n}");
        let keys: Vec<_> = doc.root.properties.iter().map(|p| p.key.as_str()).collect();
        assert_eq!(keys, ["text", "visible", "size"]);
    }

    #[test]
    fn reactive_binding() {
        let doc = ok("Label { text := $controller.title }");
        let p = doc.root.property("text").unwrap();
        assert_eq!(p.binding, Binding::Reactive);
        assert_eq!(p.value.to_string(), "$controller.title");
    }

    #[test]
    fn signal_binding() {
        let doc = ok(r#"Button { text: "Quit", #pressed: "on_quit" }"#);
        let s = doc.root.signal("pressed").unwrap();
        assert_eq!(s.handler, "on_quit");
        assert!(doc.root.property("#pressed").is_none());
    }

    #[test]
    fn signal_handler_must_be_string() {
        let e = err("Button { #pressed: on_quit }");
        assert_eq!(e.kind, ParseErrorKind::Syntax);
    }

    #[test]
    fn imports_and_redirect() {
        let doc = ok(r#"import "setting" import_top "overlay" using "MainController" Panel { }"#);
        assert_eq!(doc.imports.len(), 2);
        assert!(!doc.imports[0].top_level);
        assert!(doc.import("overlay").unwrap().top_level);
        assert_eq!(doc.redirect_controller.as_deref(), Some("MainController"));
    }

    #[test]
    fn duplicate_import() {
        let e = err(r#"import "a" import "a" Panel { }"#);
        assert_eq!(e.kind, ParseErrorKind::DuplicateImport("a".into()));
        assert_eq!((e.line, e.col), (1, 19));
    }

    #[test]
    fn missing_root() {
        assert_eq!(err("").kind, ParseErrorKind::MissingRoot);
        assert_eq!(err("// nothing\nimport \"a\"").kind, ParseErrorKind::MissingRoot);
    }

    #[test]
    fn trailing_tokens_after_root() {
        assert_eq!(err("Panel { } Panel { }").kind, ParseErrorKind::Syntax);
    }

    #[test]
    fn duplicate_key() {
        let e = err("Label { text: \"a\", text: \"b\" }");
        assert_eq!(e.kind, ParseErrorKind::DuplicateKey("text".into()));
    }

    #[test]
    fn aliases() {
        let doc = ok("@root: VBox { @title: Label { } Label { text := @title.text } }");
        assert_eq!(doc.local_aliases, ["root", "title"]);
        assert_eq!(doc.root.alias.as_deref(), Some("root"));
        assert_eq!(doc.alias_target("title").unwrap().name, "Label");
        assert!(doc.alias_target("nope").is_none());
    }

    #[test]
    fn duplicate_alias() {
        let e = err("VBox { @a: Label { } @a: Label { } }");
        assert_eq!(e.kind, ParseErrorKind::DuplicateAlias("a".into()));
    }

    #[test]
    fn each_block() {
        let doc = ok("VBox { each $controller.names using Label { |i, name| Label { text: name } Button { } } }");
        let each = &doc.root.each_blocks[0];
        assert_eq!(each.item_type, "Label");
        assert_eq!((each.index_var.as_str(), each.value_var.as_str()), ("i", "name"));
        assert_eq!(each.children.len(), 2);
        match &each.data_source {
            Expr::Value(v) => match &v.value {
                Value::Ref(Reference::Property { name, .. }) => assert_eq!(name, "names"),
                other => panic!("unexpected {other:?}"),
            },
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn each_requires_two_names() {
        assert_eq!(err("VBox { each xs using Label { |i| } }").kind, ParseErrorKind::Syntax);
    }

    #[test]
    fn each_body_rejects_properties() {
        assert_eq!(err("VBox { each xs using Label { |i, v| text: v } }").kind, ParseErrorKind::Syntax);
    }

    #[test]
    fn unclosed_block() {
        let e = err("VBox { Label { }");
        assert!(e.message.contains("unclosed"));
    }

    #[test]
    fn tokenize_error_surfaces_as_parse_error() {
        let e = err("Label { text: ~ }");
        assert_eq!(e.kind, ParseErrorKind::Tokenize);
        assert_eq!((e.line, e.col), (1, 15));
    }

    #[test]
    fn component_spans() {
        let doc = ok("VBox {\n  Label { }\n}");
        let label = &doc.root.children[0];
        assert_eq!((label.span.line, label.span.col), (2, 3));
        assert_eq!(doc.root.span.end, 20);
    }

    #[test]
    fn key_converter_applies_to_keys_and_signals() {
        let mut parser = GumlParser::new();
        parser.converters_mut().add_key(crate::KeyCasing::Pascal);
        let doc = parser.parse(r#"Button { font_size: 3, #pressed: "go", theme: { font_color: 1 } }"#).unwrap();
        assert_eq!(doc.root.properties[0].key, "FontSize");
        assert_eq!(doc.root.signals[0].event, "Pressed");
        match &doc.root.properties[1].value.as_value().unwrap().value {
            Value::Object(entries) => assert_eq!(entries[0].0, "FontColor"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn component_converter_runs_before_attach() {
        let mut parser = GumlParser::new();
        parser.converters_mut().add_component(|mut n: ComponentNode| {
            n.name = format!("Ui{}", n.name);
            n
        });
        let doc = parser.parse("VBox { Label { } }").unwrap();
        assert_eq!(doc.root.name, "UiVBox");
        assert_eq!(doc.root.children[0].name, "UiLabel");
    }

    #[test]
    fn token_converter_can_retag() {
        let mut parser = GumlParser::new();
        parser.converters_mut().add_token(|mut t: Token| {
            if t.kind == TokenKind::Name && t.value == "yes" {
                t.kind = TokenKind::Boolean;
                t.value = "true".into();
            }
            t
        });
        let doc = parser.parse("Label { visible: yes }").unwrap();
        assert_eq!(doc.root.properties[0].value.to_string(), "true");
    }

    #[test]
    fn standalone_expression() {
        let parser = GumlParser::new();
        assert_eq!(parser.parse_expr("(1 + 2) * $x.y").unwrap().to_string(), "(1 + 2) * $x.y");
        assert_eq!(parser.parse_expr("1 2").unwrap_err().kind, ParseErrorKind::Syntax);
        assert_eq!(parser.parse_expr("").unwrap_err().kind, ParseErrorKind::Syntax);
    }

    #[test]
    fn value_converter_sees_every_value() {
        let mut parser = GumlParser::new();
        parser.converters_mut().add_value(|e: Expr| match e {
            Expr::Value(mut v) => {
                if let Value::Int(n) = v.value {
                    v.value = Value::Int(n * 10);
                }
                Expr::Value(v)
            }
            other => other,
        });
        let doc = parser.parse("Label { a: 1, b: 2 }").unwrap();
        assert_eq!(doc.root.properties[1].value.to_string(), "20");
    }
}
