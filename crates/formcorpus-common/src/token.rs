//! Formula token kinds and the token value carried through the corpus.
//!
//! - **`TokenKind`**   : closed set of lexical categories a formula token can have
//! - **`FormulaToken`**: one token, a kind plus its string rendering
//!
//! The discriminant order of `TokenKind` is part of the trie encoding
//! (`unknown = 0` … `value = 6`); do not reorder variants.

use std::fmt;
use std::str::FromStr;

/// Lexical category of a formula token.
///
/// `Display` renders the lowercase identifier used in the `type` attribute of
/// `<token>` elements.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum TokenKind {
    Unknown = 0,
    Error = 1,
    Function = 2,
    Name = 3,
    Operator = 4,
    Reference = 5,
    Value = 6,
}

impl TokenKind {
    pub const ALL: [TokenKind; 7] = [
        TokenKind::Unknown,
        TokenKind::Error,
        TokenKind::Function,
        TokenKind::Name,
        TokenKind::Operator,
        TokenKind::Reference,
        TokenKind::Value,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::Error => "error",
            Self::Function => "function",
            Self::Name => "name",
            Self::Operator => "operator",
            Self::Reference => "reference",
            Self::Value => "value",
        }
    }

    /// Numeric discriminant as used by the token encoding.
    pub const fn code(self) -> u8 {
        self as u8
    }

    pub fn from_code(code: u8) -> Option<Self> {
        Self::ALL.get(code as usize).copied()
    }

    /// Parse a possibly namespace-qualified kind name.
    ///
    /// `FormulaTokenType.Reference`, `Reference` and `reference` all map to
    /// [`TokenKind::Reference`]. Anything after the last `.` is matched
    /// case-insensitively.
    pub fn from_qualified(s: &str) -> Option<Self> {
        let tail = s.rsplit('.').next().unwrap_or(s);
        Self::ALL
            .iter()
            .copied()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(tail))
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownTokenKind(pub String);

impl fmt::Display for UnknownTokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown token type '{}'", self.0)
    }
}

impl std::error::Error for UnknownTokenKind {}

impl FromStr for TokenKind {
    type Err = UnknownTokenKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_qualified(s).ok_or_else(|| UnknownTokenKind(s.to_string()))
    }
}

/// A single formula token.
///
/// `Display` yields the token's string rendering, which is what ends up in the
/// `s` attribute of a `<token>` element.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FormulaToken {
    pub kind: TokenKind,
    pub text: String,
}

impl FormulaToken {
    pub fn new(kind: TokenKind, text: impl Into<String>) -> Self {
        Self {
            kind,
            text: text.into(),
        }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self::new(TokenKind::Error, text)
    }

    pub fn function(text: impl Into<String>) -> Self {
        Self::new(TokenKind::Function, text)
    }

    pub fn name(text: impl Into<String>) -> Self {
        Self::new(TokenKind::Name, text)
    }

    pub fn operator(text: impl Into<String>) -> Self {
        Self::new(TokenKind::Operator, text)
    }

    pub fn reference(text: impl Into<String>) -> Self {
        Self::new(TokenKind::Reference, text)
    }

    pub fn value(text: impl Into<String>) -> Self {
        Self::new(TokenKind::Value, text)
    }
}

impl fmt::Display for FormulaToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}
