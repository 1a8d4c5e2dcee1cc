//! Lowering raw tokenizer output into corpus [`FormulaToken`]s.
//!
//! Raw tokens keep Excel's lexical detail (function openers carry the `(`,
//! separators and parentheses have their own types, whitespace is a token).
//! Corpus tokens use the coarser categories of [`TokenKind`]:
//!
//! | raw                         | corpus                                   |
//! |-----------------------------|------------------------------------------|
//! | `Func/Open` `SUM(`          | `function` `SUM`, then `operator` `(`    |
//! | `Func/Paren/Array` closers  | `operator`                               |
//! | `Sep`, `Op*`                | `operator`                               |
//! | `Operand` text/number/bool  | `value`                                  |
//! | `Operand` error literal     | `error`                                  |
//! | `Operand` range             | `reference` or `name`                    |
//! | `Whitespace`                | dropped                                  |

use crate::reference::is_reference;
use crate::tokenizer::{Token, TokenSubType, TokenType, Tokenizer, TokenizerError};
use formcorpus_common::{CellKind, FormulaToken, TokenKind};

/// Rendering of the first token in a formula-with-error stream.
pub const ERROR_STREAM_MARKER: &str = "#ERR!";

/// A cell formula after tokenization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenizedFormula {
    /// `Formula` or `FormulaWithError`.
    pub kind: CellKind,
    /// Formula text without the leading `=`.
    pub formula: String,
    pub tokens: Vec<FormulaToken>,
}

/// Strip one leading `=` if present.
pub fn normalize_formula(formula: &str) -> &str {
    formula.strip_prefix('=').unwrap_or(formula)
}

/// Token stream for a formula that failed to tokenize:
/// `[marker, formula text, error message]`.
pub fn error_stream(formula: &str, message: &str) -> Vec<FormulaToken> {
    vec![
        FormulaToken::error(ERROR_STREAM_MARKER),
        FormulaToken::value(formula),
        FormulaToken::value(message),
    ]
}

fn lower_operand(token: &Token) -> FormulaToken {
    let kind = match token.subtype {
        TokenSubType::Text | TokenSubType::Number | TokenSubType::Logical => TokenKind::Value,
        TokenSubType::Error => TokenKind::Error,
        _ if token.value.contains("#REF!") => TokenKind::Error,
        _ if token.value.eq_ignore_ascii_case("TRUE")
            || token.value.eq_ignore_ascii_case("FALSE") =>
        {
            TokenKind::Value
        }
        _ if is_reference(&token.value) => TokenKind::Reference,
        _ => TokenKind::Name,
    };
    FormulaToken::new(kind, token.value.as_str())
}

/// Convert raw tokens to corpus tokens, preserving order.
pub fn lower_tokens(raw: &[Token]) -> Vec<FormulaToken> {
    let mut out = Vec::with_capacity(raw.len());
    for token in raw {
        match token.token_type {
            TokenType::Whitespace => {}
            TokenType::Literal => out.push(FormulaToken::value(token.value.as_str())),
            TokenType::Operand => out.push(lower_operand(token)),
            TokenType::Func if token.subtype == TokenSubType::Open => {
                let name = token.value.strip_suffix('(').unwrap_or(&token.value);
                out.push(FormulaToken::function(name));
                out.push(FormulaToken::operator("("));
            }
            TokenType::Func
            | TokenType::Paren
            | TokenType::Array
            | TokenType::Sep
            | TokenType::OpPrefix
            | TokenType::OpInfix
            | TokenType::OpPostfix => out.push(FormulaToken::operator(token.value.as_str())),
        }
    }
    out
}

/// Tokenize a formula, with or without its leading `=`.
pub fn tokenize_formula(formula: &str) -> Result<Vec<FormulaToken>, TokenizerError> {
    let body = normalize_formula(formula);
    if body.is_empty() {
        return Ok(Vec::new());
    }
    let tokenizer = Tokenizer::new(&format!("={body}"))?;
    Ok(lower_tokens(&tokenizer.items))
}

/// Classify a cell formula: a clean token stream, or an error stream when the
/// formula cannot be tokenized.
pub fn tokenize_cell_formula(formula: &str) -> TokenizedFormula {
    let body = normalize_formula(formula).to_string();
    match tokenize_formula(&body) {
        Ok(tokens) => TokenizedFormula {
            kind: CellKind::Formula,
            formula: body,
            tokens,
        },
        Err(err) => {
            let tokens = error_stream(&body, &err.message);
            TokenizedFormula {
                kind: CellKind::FormulaWithError,
                formula: body,
                tokens,
            }
        }
    }
}
