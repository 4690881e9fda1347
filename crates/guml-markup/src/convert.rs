//! Parse-time transforms.
//!
//! Four hook points fire while a document is parsed:
//!
//! | Hook | Input | Fires on |
//! |------|-------|----------|
//! | token | [`Token`] | every raw token, before the grammar sees it |
//! | component | [`ComponentNode`] | every finished node, before it joins its parent |
//! | key | property / signal / object key | every key name |
//! | value | [`Expr`] | every finished property or object value |
//!
//! Each hook holds any number of converters, applied in registration order.

use crate::ast::{ComponentNode, Expr};
use crate::lexer::Token;

pub trait TokenConverter {
    fn convert(&self, token: Token) -> Token;
}

pub trait ComponentConverter {
    fn convert(&self, node: ComponentNode) -> ComponentNode;
}

pub trait KeyConverter {
    fn convert(&self, key: String) -> String;
}

pub trait ValueConverter {
    fn convert(&self, value: Expr) -> Expr;
}

impl<F: Fn(Token) -> Token> TokenConverter for F {
    fn convert(&self, token: Token) -> Token {
        self(token)
    }
}

impl<F: Fn(ComponentNode) -> ComponentNode> ComponentConverter for F {
    fn convert(&self, node: ComponentNode) -> ComponentNode {
        self(node)
    }
}

impl<F: Fn(String) -> String> KeyConverter for F {
    fn convert(&self, key: String) -> String {
        self(key)
    }
}

impl<F: Fn(Expr) -> Expr> ValueConverter for F {
    fn convert(&self, value: Expr) -> Expr {
        self(value)
    }
}

/// The registered converters for one parser.
#[derive(Default)]
pub struct Converters {
    tokens: Vec<Box<dyn TokenConverter>>,
    components: Vec<Box<dyn ComponentConverter>>,
    keys: Vec<Box<dyn KeyConverter>>,
    values: Vec<Box<dyn ValueConverter>>,
}

impl Converters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_token(&mut self, c: impl TokenConverter + 'static) {
        self.tokens.push(Box::new(c));
    }

    pub fn add_component(&mut self, c: impl ComponentConverter + 'static) {
        self.components.push(Box::new(c));
    }

    pub fn add_key(&mut self, c: impl KeyConverter + 'static) {
        self.keys.push(Box::new(c));
    }

    pub fn add_value(&mut self, c: impl ValueConverter + 'static) {
        self.values.push(Box::new(c));
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty() && self.components.is_empty() && self.keys.is_empty() && self.values.is_empty()
    }

    pub(crate) fn token(&self, token: Token) -> Token {
        self.tokens.iter().fold(token, |t, c| c.convert(t))
    }

    pub(crate) fn component(&self, node: ComponentNode) -> ComponentNode {
        self.components.iter().fold(node, |n, c| c.convert(n))
    }

    pub(crate) fn key(&self, key: String) -> String {
        self.keys.iter().fold(key, |k, c| c.convert(k))
    }

    pub(crate) fn value(&self, value: Expr) -> Expr {
        self.values.iter().fold(value, |v, c| c.convert(v))
    }
}

// ── Built-in key converters ───────────────────────────────────────────────

/// Key casing applied by [`KeyCasing::convert`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyCasing {
    /// `font_size` / `font-size` → `FontSize`
    Pascal,
    /// `FontSize` / `font-size` → `font_size`
    Snake,
}

impl KeyConverter for KeyCasing {
    fn convert(&self, key: String) -> String {
        match self {
            KeyCasing::Pascal => to_pascal_case(&key),
            KeyCasing::Snake => to_snake_case(&key),
        }
    }
}

/// Uppercases the first letter and every letter after `_` or `-`, dropping
/// the separators.
pub fn to_pascal_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut upper = true;
    for ch in s.chars() {
        if ch == '_' || ch == '-' {
            upper = true;
            continue;
        }
        if upper {
            out.extend(ch.to_uppercase());
            upper = false;
        } else {
            out.push(ch);
        }
    }
    out
}

/// Lowercases, inserting `_` before interior capitals and replacing `-`.
pub fn to_snake_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 4);
    for (i, ch) in s.chars().enumerate() {
        if ch == '-' {
            out.push('_');
        } else if ch.is_uppercase() {
            if i > 0 && !out.ends_with('_') {
                out.push('_');
            }
            out.extend(ch.to_lowercase());
        } else {
            out.push(ch);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pascal_case() {
        assert_eq!(to_pascal_case("font_size"), "FontSize");
        assert_eq!(to_pascal_case("theme-overrides"), "ThemeOverrides");
        assert_eq!(to_pascal_case("text"), "Text");
        assert_eq!(to_pascal_case("Text"), "Text");
    }

    #[test]
    fn snake_case() {
        assert_eq!(to_snake_case("FontSize"), "font_size");
        assert_eq!(to_snake_case("font-size"), "font_size");
        assert_eq!(to_snake_case("text"), "text");
    }

    #[test]
    fn key_converters_apply_in_order() {
        let mut cs = Converters::new();
        cs.add_key(|k: String| format!("{k}_a"));
        cs.add_key(|k: String| format!("{k}_b"));
        assert_eq!(cs.key("x".into()), "x_a_b");
    }
}
