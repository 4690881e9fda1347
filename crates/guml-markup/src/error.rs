use std::fmt;

/// The tokenizer found a character no rule accepts.
#[derive(Debug, Clone, PartialEq)]
pub struct TokenizeError {
    pub ch: char,
    /// 1-based source line number.
    pub line: usize,
    /// 1-based source column number.
    pub col: usize,
}

impl fmt::Display for TokenizeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "guml tokenize error at {}:{}: unexpected character {:?}", self.line, self.col, self.ch)
    }
}

impl std::error::Error for TokenizeError {}

/// Classifies a [`ParseError`] so callers can react without string matching.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseErrorKind {
    /// Lexical failure, see [`TokenizeError`].
    Tokenize,
    /// A token appeared where the grammar does not allow it.
    Syntax,
    /// The document has no root component.
    MissingRoot,
    /// The same module was imported twice.
    DuplicateImport(String),
    /// The same property key was bound twice on one component.
    DuplicateKey(String),
    /// The same `@alias` was declared twice in one document.
    DuplicateAlias(String),
}

/// A parse error from a `.guml` document.
#[derive(Debug, Clone, PartialEq)]
pub struct ParseError {
    pub kind: ParseErrorKind,
    pub message: String,
    /// 1-based source line number where the error occurred.
    pub line: usize,
    /// 1-based source column number where the error occurred.
    pub col: usize,
}

impl ParseError {
    pub(crate) fn new(kind: ParseErrorKind, msg: impl Into<String>, line: usize, col: usize) -> Self {
        Self { kind, message: msg.into(), line, col }
    }

    pub(crate) fn syntax(msg: impl Into<String>, line: usize, col: usize) -> Self {
        Self::new(ParseErrorKind::Syntax, msg, line, col)
    }
}

impl From<TokenizeError> for ParseError {
    fn from(e: TokenizeError) -> Self {
        Self::new(
            ParseErrorKind::Tokenize,
            format!("unexpected character {:?}", e.ch),
            e.line,
            e.col,
        )
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "guml parse error at {}:{}: {}", self.line, self.col, self.message)
    }
}

impl std::error::Error for ParseError {}
