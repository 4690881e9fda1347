//! Tokenizer, parser, and AST for **GUML** (`.guml`), a declarative markup
//! for UI component trees.
//!
//! This crate only depends on the `log` facade, so editors and linters can
//! use it without pulling in the runtime.
//!
//! # Structure
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`ast`] | `Document`, `ComponentNode`, `EachNode`, `Expr`, `Value`, `Reference` |
//! | [`convert`] | token / component / key / value converter hooks |
//! | [`error`] | `TokenizeError`, `ParseError` |
//! | [`lexer`] | `Tokenizer`, rule combinators, `Token` |
//! | [`parser`] | `GumlParser`, `parse_str` |
//!
//! # Quick start
//!
//! ```rust
//! use guml_markup::parse_str;
//!
//! let src = r#"
//!     import "setting"
//!     VBox {
//!         @title: Label { text: "Hello" }
//!         Button { text := @title.text + "!", #pressed: "on_go" }
//!     }
//! "#;
//!
//! let doc = parse_str(src).unwrap();
//! assert_eq!(doc.root.name, "VBox");
//! assert_eq!(doc.local_aliases, ["title"]);
//! ```

pub mod ast;
pub mod convert;
pub mod error;
mod expr;
pub mod lexer;
pub mod parser;

pub use ast::{
    Binding, ComponentNode, Document, EachNode, Expr, Import, InfixOperator, PrefixOperator, Property, RefKind,
    Reference, Signal, Span, StyleBoxKind, Value, ValueNode,
};
pub use convert::{ComponentConverter, Converters, KeyCasing, KeyConverter, TokenConverter, ValueConverter};
pub use error::{ParseError, ParseErrorKind, TokenizeError};
pub use lexer::{Token, TokenKind, Tokenizer};
pub use parser::{parse_str, GumlParser};
