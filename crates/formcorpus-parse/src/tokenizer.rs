//! Lexer for Excel worksheet formulas.
//!
//! Produces the raw token stream (`Operand`, `Func`, `Paren`, `Sep`, the three
//! operator positions, whitespace) that [`crate::lower`] turns into corpus
//! tokens. Spans are byte offsets into the formula text.

use std::error::Error;
use std::fmt;

const ERROR_CODES: [&str; 8] = [
    "#NULL!",
    "#DIV/0!",
    "#VALUE!",
    "#REF!",
    "#NAME?",
    "#NUM!",
    "#N/A",
    "#GETTING_DATA",
];

/// Bytes that terminate a pending operand.
fn ends_operand(b: u8) -> bool {
    matches!(
        b,
        b',' | b';'
            | b'}'
            | b')'
            | b' '
            | b'+'
            | b'-'
            | b'*'
            | b'/'
            | b'^'
            | b'&'
            | b'='
            | b'>'
            | b'<'
            | b'%'
    )
}

/// Error raised when a formula cannot be split into tokens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenizerError {
    pub message: String,
    pub pos: usize,
}

impl TokenizerError {
    fn new(message: impl Into<String>, pos: usize) -> Self {
        Self {
            message: message.into(),
            pos,
        }
    }
}

impl fmt::Display for TokenizerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (at byte {})", self.message, self.pos)
    }
}

impl Error for TokenizerError {}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenType {
    Literal,
    Operand,
    Func,
    Array,
    Paren,
    Sep,
    OpPrefix,
    OpInfix,
    OpPostfix,
    Whitespace,
}

impl fmt::Display for TokenType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenSubType {
    None,
    Text,
    Number,
    Logical,
    Error,
    Range,
    Open,
    Close,
    Arg,
    Row,
}

impl fmt::Display for TokenSubType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

/// A raw lexical token with its byte span.
#[derive(Debug, Clone, PartialEq, Hash)]
pub struct Token {
    pub value: String,
    pub token_type: TokenType,
    pub subtype: TokenSubType,
    pub start: usize,
    pub end: usize,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "<{} subtype: {:?} value: {}>",
            self.token_type, self.subtype, self.value
        )
    }
}

impl Token {
    pub fn is_operator(&self) -> bool {
        matches!(
            self.token_type,
            TokenType::OpPrefix | TokenType::OpInfix | TokenType::OpPostfix
        )
    }
}

fn operand_subtype(text: &str) -> TokenSubType {
    match text.as_bytes().first() {
        Some(b'"') => TokenSubType::Text,
        Some(b'#') => TokenSubType::Error,
        _ if text == "TRUE" || text == "FALSE" => TokenSubType::Logical,
        _ if text.parse::<f64>().is_ok() => TokenSubType::Number,
        _ => TokenSubType::Range,
    }
}

/// `1E`, `2.5e`: a mantissa waiting for a signed exponent.
fn is_exponent_prefix(bytes: &[u8]) -> bool {
    let Some((last, body)) = bytes.split_last() else {
        return false;
    };
    if !matches!(last, b'E' | b'e') || body.is_empty() || !body[0].is_ascii_digit() {
        return false;
    }
    let mut dots = 0;
    body[1..].iter().all(|&b| match b {
        b'0'..=b'9' => true,
        b'.' => {
            dots += 1;
            dots == 1
        }
        _ => false,
    })
}

struct Lexer<'a> {
    src: &'a str,
    pos: usize,
    /// Start of the operand being accumulated, if any.
    pending: Option<usize>,
    /// Types of the currently open `Func`, `Paren` and `Array` groups.
    groups: Vec<TokenType>,
    out: Vec<Token>,
}

impl<'a> Lexer<'a> {
    fn new(src: &'a str) -> Self {
        Self {
            src,
            pos: 0,
            pending: None,
            groups: Vec::with_capacity(8),
            out: Vec::with_capacity(src.len() / 2),
        }
    }

    fn bytes(&self) -> &'a [u8] {
        self.src.as_bytes()
    }

    fn peek(&self, ahead: usize) -> Option<u8> {
        self.bytes().get(self.pos + ahead).copied()
    }

    fn push(&mut self, token_type: TokenType, subtype: TokenSubType, start: usize, end: usize) {
        self.out.push(Token {
            value: self.src[start..end].to_string(),
            token_type,
            subtype,
            start,
            end,
        });
    }

    fn push_operand(&mut self, start: usize, end: usize) {
        let subtype = operand_subtype(&self.src[start..end]);
        self.push(TokenType::Operand, subtype, start, end);
    }

    /// Emit the pending operand, if any, ending at the cursor.
    fn flush(&mut self) {
        if let Some(start) = self.pending.take() {
            if start < self.pos {
                self.push_operand(start, self.pos);
            }
        }
    }

    fn mark(&mut self) {
        if self.pending.is_none() {
            self.pending = Some(self.pos);
        }
    }

    fn pending_text(&self) -> &'a str {
        match self.pending {
            Some(start) => &self.src[start..self.pos],
            None => "",
        }
    }

    fn run(mut self) -> Result<Vec<Token>, TokenizerError> {
        if self.src.is_empty() {
            return Ok(self.out);
        }
        if !self.src.starts_with('=') {
            self.push(TokenType::Literal, TokenSubType::None, 0, self.src.len());
            return Ok(self.out);
        }

        self.pos = 1;
        while let Some(b) = self.peek(0) {
            if matches!(b, b'+' | b'-') && is_exponent_prefix(self.pending_text().as_bytes()) {
                self.pos += 1;
                continue;
            }
            if ends_operand(b) {
                self.flush();
            }
            match b {
                b'"' => self.string()?,
                b'\'' => self.quoted_sheet()?,
                b'[' => self.bracketed()?,
                b'#' => self.error_literal()?,
                b' ' | b'\n' => self.whitespace(),
                b'+' | b'-' | b'*' | b'/' | b'^' | b'&' | b'=' | b'>' | b'<' | b'%' => {
                    self.operator()
                }
                b'(' => self.open_paren(),
                b'{' => {
                    self.flush();
                    self.open_group(TokenType::Array, self.pos);
                }
                b')' | b'}' => self.close_group(b)?,
                b',' | b';' => self.separator(b),
                _ => {
                    self.mark();
                    self.pos += 1;
                }
            }
        }
        self.flush();

        if !self.groups.is_empty() {
            return Err(TokenizerError::new(
                "Unmatched opening parenthesis or bracket",
                self.pos,
            ));
        }
        Ok(self.out)
    }

    /// Keep a pending operand only when it continues into what follows
    /// (`A1:'Other'!B2`).
    fn flush_unless_range(&mut self) {
        if !self.pending_text().ends_with(':') {
            self.flush();
        }
    }

    /// End offset of a quoted run starting at the cursor; doubled delimiters
    /// are escapes.
    fn scan_quoted(&self, delim: u8) -> Result<usize, TokenizerError> {
        let bytes = self.bytes();
        let mut i = self.pos + 1;
        while i < bytes.len() {
            if bytes[i] == delim {
                if bytes.get(i + 1) == Some(&delim) {
                    i += 2;
                    continue;
                }
                return Ok(i + 1);
            }
            i += 1;
        }
        Err(TokenizerError::new(
            "Reached end of formula while parsing string",
            bytes.len(),
        ))
    }

    fn string(&mut self) -> Result<(), TokenizerError> {
        self.flush();
        let start = self.pos;
        let end = self.scan_quoted(b'"')?;
        self.push_operand(start, end);
        self.pos = end;
        Ok(())
    }

    /// `'My Sheet'!A1` and `$'Sheet'!A1` stay one operand.
    fn quoted_sheet(&mut self) -> Result<(), TokenizerError> {
        if self.pending_text() != "$" {
            self.flush_unless_range();
        }
        let end = self.scan_quoted(b'\'')?;
        self.mark();
        self.pos = end;
        Ok(())
    }

    /// `[...]` with nesting, part of the pending operand.
    fn bracketed(&mut self) -> Result<(), TokenizerError> {
        self.mark();
        let bytes = self.bytes();
        let mut depth = 0usize;
        let mut i = self.pos;
        while i < bytes.len() {
            match bytes[i] {
                b'[' => depth += 1,
                b']' => {
                    depth -= 1;
                    if depth == 0 {
                        self.pos = i + 1;
                        return Ok(());
                    }
                }
                _ => {}
            }
            i += 1;
        }
        self.pos = bytes.len();
        Err(TokenizerError::new("Encountered unmatched '['", self.pos))
    }

    /// `#DIV/0!` and friends, keeping a `Sheet1!` prefix.
    fn error_literal(&mut self) -> Result<(), TokenizerError> {
        if !self.pending_text().ends_with('!') {
            self.flush();
        }
        let rest = &self.src[self.pos..];
        let Some(code) = ERROR_CODES.iter().find(|code| rest.starts_with(**code)) else {
            return Err(TokenizerError::new(
                format!("Invalid error code at position {}", self.pos),
                self.pos,
            ));
        };
        let start = self.pending.take().unwrap_or(self.pos);
        let end = self.pos + code.len();
        self.push_operand(start, end);
        self.pos = end;
        Ok(())
    }

    fn whitespace(&mut self) {
        self.flush();
        let start = self.pos;
        while matches!(self.peek(0), Some(b' ' | b'\n')) {
            self.pos += 1;
        }
        self.push(TokenType::Whitespace, TokenSubType::None, start, self.pos);
    }

    /// Whether a `+`/`-` at the cursor follows a complete operand.
    fn follows_operand(&self) -> bool {
        self.out
            .iter()
            .rev()
            .find(|t| t.token_type != TokenType::Whitespace)
            .is_some_and(|t| {
                t.subtype == TokenSubType::Close
                    || matches!(t.token_type, TokenType::OpPostfix | TokenType::Operand)
            })
    }

    fn operator(&mut self) {
        let start = self.pos;
        let pair = [self.peek(0), self.peek(1)];
        if matches!(
            pair,
            [Some(b'>'), Some(b'=')] | [Some(b'<'), Some(b'=')] | [Some(b'<'), Some(b'>')]
        ) {
            self.pos += 2;
            self.push(TokenType::OpInfix, TokenSubType::None, start, self.pos);
            return;
        }

        let token_type = match pair[0] {
            Some(b'%') => TokenType::OpPostfix,
            Some(b'+' | b'-') if !self.follows_operand() => TokenType::OpPrefix,
            _ => TokenType::OpInfix,
        };
        self.pos += 1;
        self.push(token_type, TokenSubType::None, start, self.pos);
    }

    fn open_group(&mut self, token_type: TokenType, start: usize) {
        self.pos += 1;
        self.push(token_type, TokenSubType::Open, start, self.pos);
        self.groups.push(token_type);
    }

    /// `(` after a pending operand opens a function call named by it.
    fn open_paren(&mut self) {
        match self.pending.take() {
            Some(start) if start < self.pos => self.open_group(TokenType::Func, start),
            _ => self.open_group(TokenType::Paren, self.pos),
        }
    }

    fn close_group(&mut self, closer: u8) -> Result<(), TokenizerError> {
        let Some(group) = self.groups.pop() else {
            return Err(TokenizerError::new(
                format!("No matching opener for closer at position {}", self.pos),
                self.pos,
            ));
        };
        if (group == TokenType::Array) != (closer == b'}') {
            return Err(TokenizerError::new("Mismatched ( and { pair", self.pos));
        }
        let start = self.pos;
        self.pos += 1;
        self.push(group, TokenSubType::Close, start, self.pos);
        Ok(())
    }

    /// `;` separates array rows; `,` separates arguments inside a call or
    /// array literal and is the union operator elsewhere.
    fn separator(&mut self, b: u8) {
        let (token_type, subtype) = match (b, self.groups.last()) {
            (b';', _) => (TokenType::Sep, TokenSubType::Row),
            (_, Some(TokenType::Func | TokenType::Array)) => (TokenType::Sep, TokenSubType::Arg),
            _ => (TokenType::OpInfix, TokenSubType::None),
        };
        let start = self.pos;
        self.pos += 1;
        self.push(token_type, subtype, start, self.pos);
    }
}

/// A tokenized formula.
pub struct Tokenizer {
    formula: String,
    pub items: Vec<Token>,
}

impl Tokenizer {
    pub fn new(formula: &str) -> Result<Self, TokenizerError> {
        let items = Lexer::new(formula).run()?;
        Ok(Self {
            formula: formula.to_string(),
            items,
        })
    }

    pub fn formula(&self) -> &str {
        &self.formula
    }

    pub fn into_tokens(self) -> Vec<Token> {
        self.items
    }

    /// Reassemble the formula from its tokens.
    pub fn render(&self) -> String {
        match self.items.first() {
            None => String::new(),
            Some(t) if t.token_type == TokenType::Literal => t.value.clone(),
            Some(_) => {
                let body: String = self.items.iter().map(|t| t.value.as_str()).collect();
                format!("={body}")
            }
        }
    }
}

impl TryFrom<&str> for Tokenizer {
    type Error = TokenizerError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Tokenizer::new(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(formula: &str) -> Vec<(TokenType, TokenSubType, String)> {
        Tokenizer::new(formula)
            .unwrap()
            .items
            .into_iter()
            .map(|t| (t.token_type, t.subtype, t.value))
            .collect()
    }

    #[test]
    fn function_call_with_range_argument() {
        let toks = kinds("=SUM(A1:B2,3)");
        assert_eq!(
            toks,
            vec![
                (TokenType::Func, TokenSubType::Open, "SUM(".to_string()),
                (TokenType::Operand, TokenSubType::Range, "A1:B2".to_string()),
                (TokenType::Sep, TokenSubType::Arg, ",".to_string()),
                (TokenType::Operand, TokenSubType::Number, "3".to_string()),
                (TokenType::Func, TokenSubType::Close, ")".to_string()),
            ]
        );
    }

    #[test]
    fn prefix_and_infix_minus() {
        let toks = kinds("=-A1-2");
        assert_eq!(toks[0].0, TokenType::OpPrefix);
        assert_eq!(toks[2].0, TokenType::OpInfix);
        let toks = kinds("=(1) -2");
        assert_eq!(toks[4].0, TokenType::OpInfix);
    }

    #[test]
    fn quoted_sheet_stays_in_operand() {
        let toks = kinds("='My Sheet'!A1*2");
        assert_eq!(toks[0].2, "'My Sheet'!A1");
        assert_eq!(toks[0].1, TokenSubType::Range);
        assert_eq!(kinds("=$'It''s'!B2")[0].2, "$'It''s'!B2");
    }

    #[test]
    fn scientific_notation_is_one_number() {
        let toks = kinds("=1.5E+3+1");
        assert_eq!(toks[0].2, "1.5E+3");
        assert_eq!(toks[0].1, TokenSubType::Number);
        assert_eq!(toks[1].0, TokenType::OpInfix);
        // not a mantissa: the sign is an operator
        assert_eq!(kinds("=RATE-1")[1].2, "-");
    }

    #[test]
    fn two_char_comparison_operators() {
        let toks = kinds("=A1<>B1");
        assert_eq!(toks[1].2, "<>");
        assert_eq!(kinds("=A1>=B1")[1].2, ">=");
    }

    #[test]
    fn errors_keep_sheet_prefix() {
        let toks = kinds("=Sheet1!#REF!+#N/A");
        assert_eq!(toks[0].2, "Sheet1!#REF!");
        assert_eq!(toks[1].0, TokenType::OpInfix);
        assert_eq!(toks[2].2, "#N/A");
        assert_eq!(toks[2].1, TokenSubType::Error);
    }

    #[test]
    fn structured_reference_brackets() {
        let toks = kinds("=SUM(Table1[[#This Row],[Qty]])");
        assert_eq!(toks[1].2, "Table1[[#This Row],[Qty]]");
    }

    #[test]
    fn separators_depend_on_enclosing_group() {
        let toks = kinds("={1,2;3,4}");
        assert_eq!(toks[0].0, TokenType::Array);
        assert_eq!(toks[2].1, TokenSubType::Arg);
        assert_eq!(toks[4].1, TokenSubType::Row);
        let union = kinds("=(A1,B1)");
        assert_eq!(union[2].0, TokenType::OpInfix);
    }

    #[test]
    fn unbalanced_input_is_rejected() {
        assert_eq!(
            Tokenizer::new("=SUM(A1").err().unwrap().message,
            "Unmatched opening parenthesis or bracket"
        );
        assert!(Tokenizer::new("=A1+)").is_err());
        assert!(Tokenizer::new("=(1}").is_err());
        assert!(Tokenizer::new("=\"open").is_err());
        assert!(Tokenizer::new("=#BAD").is_err());
        assert!(Tokenizer::new("=T[x").is_err());
    }

    #[test]
    fn non_formula_is_one_literal() {
        assert_eq!(
            kinds("plain text"),
            vec![(TokenType::Literal, TokenSubType::None, "plain text".to_string())]
        );
        assert!(kinds("").is_empty());
    }

    #[test]
    fn render_reproduces_input() {
        for f in ["=SUM(A1:B2, 3)", "=IF(A1>=2,\"x\",\"y\")", "={1,2;3,4}"] {
            assert_eq!(Tokenizer::new(f).unwrap().render(), f);
        }
    }
}
