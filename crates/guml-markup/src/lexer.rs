use std::fmt;

use crate::error::TokenizeError;

// ── Token ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    // Literals
    Str,
    Float,
    Integer,
    Boolean,
    Null,
    // Names
    Name,
    Component,
    GlobalRef,
    AliasRef,
    SignalName,
    // Keywords
    Each,
    Using,
    Import,
    ImportTop,
    Resource,
    Vec2,
    /// Any of `!= <= >= == < > ! || && + - * / % ^`; the symbol is the token value.
    Operator,
    // Punctuation
    Comma,
    Dot,
    Pipe,
    BindAssign,
    Colon,
    LParen,
    LBracket,
    LBrace,
    RBrace,
    RBracket,
    RParen,
    // Sentinel
    Eof,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TokenKind::Str => "string",
            TokenKind::Float => "float",
            TokenKind::Integer => "integer",
            TokenKind::Boolean => "boolean",
            TokenKind::Null => "null",
            TokenKind::Name => "name",
            TokenKind::Component => "component",
            TokenKind::GlobalRef => "global_ref",
            TokenKind::AliasRef => "alias_ref",
            TokenKind::SignalName => "signal_name",
            TokenKind::Each => "each",
            TokenKind::Using => "using",
            TokenKind::Import => "import",
            TokenKind::ImportTop => "import_top",
            TokenKind::Resource => "resource",
            TokenKind::Vec2 => "vec2",
            TokenKind::Operator => "operator",
            TokenKind::Comma => "','",
            TokenKind::Dot => "'.'",
            TokenKind::Pipe => "'|'",
            TokenKind::BindAssign => "':='",
            TokenKind::Colon => "':'",
            TokenKind::LParen => "'('",
            TokenKind::LBracket => "'['",
            TokenKind::LBrace => "'{'",
            TokenKind::RBrace => "'}'",
            TokenKind::RBracket => "']'",
            TokenKind::RParen => "')'",
            TokenKind::Eof => "end of input",
        };
        f.write_str(s)
    }
}

/// One lexeme with its source position.
///
/// `start`/`end` are char offsets into the source; `line`/`col` are 1-based
/// and refer to `start`.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub value: String,
    pub start: usize,
    pub end: usize,
    pub line: usize,
    pub col: usize,
}

impl Token {
    #[inline]
    pub fn is(&self, kind: TokenKind) -> bool {
        self.kind == kind
    }

    #[inline]
    pub fn is_op(&self, symbol: &str) -> bool {
        self.kind == TokenKind::Operator && self.value == symbol
    }
}

// ── Cursor ────────────────────────────────────────────────────────────────

/// Scanning state handed to every matcher.
///
/// Line starts are recorded as the cursor walks past newlines, so the
/// line/column of an offset is only known once the cursor has reached it.
pub struct Cursor {
    chars: Vec<char>,
    index: usize,
    line_starts: Vec<usize>,
}

impl Cursor {
    pub fn new(src: &str) -> Self {
        Self { chars: src.chars().collect(), index: 0, line_starts: vec![0] }
    }

    #[inline]
    pub fn index(&self) -> usize {
        self.index
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.chars.len()
    }

    #[inline]
    pub fn at_end(&self) -> bool {
        self.index >= self.chars.len()
    }

    #[inline]
    pub fn peek(&self) -> Option<char> {
        self.chars.get(self.index).copied()
    }

    /// The character immediately before char offset `at`, if any.
    #[inline]
    pub fn char_before(&self, at: usize) -> Option<char> {
        at.checked_sub(1).and_then(|i| self.chars.get(i).copied())
    }

    pub fn next(&mut self) -> Option<char> {
        let ch = *self.chars.get(self.index)?;
        self.index += 1;
        if ch == '\n' && self.line_starts.last().is_some_and(|&last| last < self.index) {
            self.line_starts.push(self.index);
        }
        Some(ch)
    }

    /// Step back one character.
    pub fn back(&mut self) {
        self.index = self.index.saturating_sub(1);
    }

    fn reset(&mut self, index: usize) {
        self.index = index;
    }

    /// 1-based `(line, col)` of char offset `at`.
    pub fn position(&self, at: usize) -> (usize, usize) {
        let line = self.line_starts.partition_point(|&s| s <= at).max(1);
        (line, at - self.line_starts[line - 1] + 1)
    }

    fn text(&self, start: usize, end: usize) -> String {
        self.chars[start..end].iter().collect()
    }
}

// ── Rules ─────────────────────────────────────────────────────────────────

/// Consumes input from the cursor and returns the token text, or `None` when
/// the pattern does not match (the cursor is then rewound by the tokenizer).
pub type Matcher = Box<dyn Fn(&mut Cursor) -> Option<String>>;

/// Names a matched text. `None` means "skip" (whitespace, comments).
/// Receives the matched text, the cursor and the match start offset.
pub type Classifier = Box<dyn Fn(&str, &Cursor, usize) -> Option<TokenKind>>;

pub struct Rule {
    classify: Classifier,
    matcher: Matcher,
}

impl Rule {
    pub fn new(classify: Classifier, matcher: Matcher) -> Self {
        Self { classify, matcher }
    }

    /// A rule whose matches are dropped from the token stream.
    pub fn skip(matcher: Matcher) -> Self {
        Self::new(Box::new(|_, _, _| None), matcher)
    }

    /// A rule that always yields `kind`.
    pub fn fixed(kind: TokenKind, matcher: Matcher) -> Self {
        Self::new(Box::new(move |_, _, _| Some(kind)), matcher)
    }
}

/// Any single character from `set`.
pub fn chars(set: &'static [char]) -> Matcher {
    Box::new(move |c| c.next().filter(|ch| set.contains(ch)).map(String::from))
}

/// Exactly `pattern`.
pub fn literal(pattern: &'static str) -> Matcher {
    Box::new(move |c| {
        for expected in pattern.chars() {
            if c.next() != Some(expected) {
                return None;
            }
        }
        Some(pattern.to_string())
    })
}

/// Exactly `word`, not followed by an identifier character.
pub fn keyword(word: &'static str) -> Matcher {
    let inner = literal(word);
    Box::new(move |c| {
        let text = inner(c)?;
        match c.peek() {
            Some(ch) if is_ident_char(ch) => None,
            _ => Some(text),
        }
    })
}

/// `prefix` followed by the rest of the line (the newline is left in place).
pub fn comment(prefix: &'static str) -> Matcher {
    assert!(!prefix.is_empty(), "comment prefix must not be empty");
    let open = literal(prefix);
    Box::new(move |c| {
        let mut text = open(c)?;
        while let Some(ch) = c.peek() {
            if ch == '\n' {
                break;
            }
            text.push(ch);
            c.next();
        }
        Some(text)
    })
}

/// A single- or double-quoted string on one line.
///
/// Returns the raw text between the quotes; escapes are kept verbatim and
/// only shield the next character from terminating the string. A newline or
/// end of input inside the string is not a match.
pub fn string() -> Matcher {
    Box::new(|c| {
        let quote = c.next().filter(|&q| q == '"' || q == '\'')?;
        let mut text = String::new();
        let mut escaped = false;
        loop {
            let ch = c.next()?;
            match ch {
                '\n' => return None,
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                _ if ch == quote => return Some(text),
                _ => {}
            }
            text.push(ch);
        }
    })
}

/// Decimal literal. With `fraction`, requires `digits '.' digits`; without,
/// takes the leading digits only, so a trailing `.` lexes separately.
pub fn number(fraction: bool) -> Matcher {
    Box::new(move |c| {
        let start = c.index();
        let digits = |c: &mut Cursor| {
            let mut n = 0;
            while c.peek().is_some_and(|ch| ch.is_ascii_digit()) {
                c.next();
                n += 1;
            }
            n
        };
        if digits(c) == 0 {
            return None;
        }
        if fraction {
            if c.next() != Some('.') {
                return None;
            }
            if digits(c) == 0 {
                return None;
            }
        }
        Some(c.text(start, c.index()))
    })
}

/// Identifier: a letter or one of `$ @ _ #`, then letters, digits and `_`.
pub fn identifier() -> Matcher {
    Box::new(|c| {
        let start = c.index();
        let first = c.next()?;
        if !(first.is_alphabetic() || matches!(first, '$' | '@' | '_' | '#')) {
            return None;
        }
        while c.peek().is_some_and(is_ident_char) {
            c.next();
        }
        Some(c.text(start, c.index()))
    })
}

#[inline]
fn is_ident_char(ch: char) -> bool {
    ch.is_alphanumeric() || ch == '_'
}

pub const KEYWORDS: [&str; 6] = ["each", "using", "import", "import_top", "resource", "vec2"];

/// Longest symbols first so `!=` wins over `!` and `||` over `|`.
pub const OPERATORS: [&str; 15] =
    ["!=", "<=", ">=", "==", "||", "&&", "!", "<", ">", "+", "-", "*", "/", "%", "^"];

const SPECIALS: [(&str, TokenKind); 11] = [
    (",", TokenKind::Comma),
    (".", TokenKind::Dot),
    ("|", TokenKind::Pipe),
    (":=", TokenKind::BindAssign),
    (":", TokenKind::Colon),
    ("(", TokenKind::LParen),
    ("[", TokenKind::LBracket),
    ("{", TokenKind::LBrace),
    ("}", TokenKind::RBrace),
    ("]", TokenKind::RBracket),
    (")", TokenKind::RParen),
];

/// Classifier for the identifier rule.
pub fn classify_name(text: &str, cursor: &Cursor, start: usize) -> Option<TokenKind> {
    let kind = match text {
        "each" => TokenKind::Each,
        "using" => TokenKind::Using,
        "import" => TokenKind::Import,
        "import_top" => TokenKind::ImportTop,
        "resource" => TokenKind::Resource,
        "vec2" => TokenKind::Vec2,
        _ if text.chars().count() > 1 => match text.chars().next() {
            Some('$') => TokenKind::GlobalRef,
            Some('@') => TokenKind::AliasRef,
            Some('#') => TokenKind::SignalName,
            Some(c) if c.is_uppercase() => {
                if cursor.char_before(start) == Some('.') {
                    TokenKind::Name
                } else {
                    TokenKind::Component
                }
            }
            _ => TokenKind::Name,
        },
        _ => TokenKind::Name,
    };
    Some(kind)
}

// ── Tokenizer ─────────────────────────────────────────────────────────────

/// Rule-ordered tokenizer.
///
/// At every position the rules are tried in order; the first one that
/// consumes at least one character wins and scanning restarts from rule 0.
pub struct Tokenizer {
    rules: Vec<Rule>,
}

impl Tokenizer {
    pub fn new(rules: Vec<Rule>) -> Self {
        Self { rules }
    }

    /// The rule set of the GUML language.
    pub fn guml() -> Self {
        let mut rules = vec![
            Rule::skip(chars(&[' ', '\t'])),
            Rule::skip(chars(&['\r', '\n'])),
            Rule::skip(comment("//")),
            Rule::fixed(TokenKind::Str, string()),
            Rule::fixed(TokenKind::Float, number(true)),
            Rule::fixed(TokenKind::Integer, number(false)),
            Rule::fixed(TokenKind::Null, keyword("null")),
            Rule::fixed(TokenKind::Null, keyword("Null")),
            Rule::fixed(TokenKind::Boolean, keyword("false")),
            Rule::fixed(TokenKind::Boolean, keyword("true")),
        ];
        rules.extend(OPERATORS.iter().map(|op| Rule::fixed(TokenKind::Operator, literal(op))));
        rules.extend(SPECIALS.iter().map(|&(s, kind)| Rule::fixed(kind, literal(s))));
        rules.push(Rule::new(Box::new(classify_name), identifier()));
        Self::new(rules)
    }

    pub fn tokenize(&self, src: &str) -> Result<Vec<Token>, TokenizeError> {
        let mut cursor = Cursor::new(src);
        let mut tokens = Vec::new();

        'scan: while !cursor.at_end() {
            let start = cursor.index();
            for rule in &self.rules {
                match (rule.matcher)(&mut cursor) {
                    Some(text) if cursor.index() > start => {
                        if let Some(kind) = (rule.classify)(&text, &cursor, start) {
                            let (line, col) = cursor.position(start);
                            tokens.push(Token { kind, value: text, start, end: cursor.index(), line, col });
                        }
                        continue 'scan;
                    }
                    _ => cursor.reset(start),
                }
            }
            let ch = cursor.peek().unwrap_or('\0');
            let (line, col) = cursor.position(start);
            return Err(TokenizeError { ch, line, col });
        }

        let end = cursor.len();
        let (line, col) = cursor.position(end);
        tokens.push(Token { kind: TokenKind::Eof, value: String::new(), start: end, end, line, col });
        log::trace!("tokenized {} chars into {} tokens", end, tokens.len());
        Ok(tokens)
    }
}

impl Default for Tokenizer {
    fn default() -> Self {
        Self::guml()
    }
}
