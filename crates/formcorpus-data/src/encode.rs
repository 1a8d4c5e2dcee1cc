//! Packed 16-bit token codes.
//!
//! ```text
//!  15                 3 2     0
//! +---------------------+-------+
//! |  payload            | kind  |
//! +---------------------+-------+
//! ```
//!
//! `kind` is the [`TokenKind`] discriminant minus one. Operators carry
//! `operator code - 1` in the payload (4 bits used), functions carry
//! `function id - 1` (9 bits used). Every other kind has a zero payload.

use crate::error::DataError;
use formcorpus_common::{MAX_FUNCTION_ID, OperatorKind, TokenKind, function_name};

const KIND_MASK: u16 = 0x0007;
const PAYLOAD_SHIFT: u16 = 3;

fn kind_bits(kind: TokenKind) -> u16 {
    u16::from(kind.code()) - 1
}

pub fn encode_operator(op: OperatorKind) -> u16 {
    ((u16::from(op.code()) - 1) << PAYLOAD_SHIFT) + kind_bits(TokenKind::Operator)
}

/// `None` when `id` is outside `1..=511`.
pub fn encode_function(id: u16) -> Option<u16> {
    if id == 0 || id > MAX_FUNCTION_ID {
        return None;
    }
    Some(((id - 1) << PAYLOAD_SHIFT) + kind_bits(TokenKind::Function))
}

/// Code for a kind without payload (`error`, `name`, `reference`, `value`).
pub fn encode_simple(kind: TokenKind) -> Option<u16> {
    match kind {
        TokenKind::Error | TokenKind::Name | TokenKind::Reference | TokenKind::Value => {
            Some(kind_bits(kind))
        }
        TokenKind::Unknown | TokenKind::Function | TokenKind::Operator => None,
    }
}

fn payload(code: u16) -> u16 {
    ((code & !KIND_MASK) >> PAYLOAD_SHIFT) + 1
}

/// Render one code: `<error>`, `<func:NAME>`, `<name>`, the operator symbol,
/// `<ref>` or `<value>`.
pub fn decode_token(code: u16) -> Result<String, DataError> {
    let kind = u8::try_from((code & KIND_MASK) + 1)
        .ok()
        .and_then(TokenKind::from_code)
        .ok_or(DataError::InvalidCode(code))?;

    let rendered = match kind {
        TokenKind::Error => "<error>".to_string(),
        TokenKind::Function => {
            let name = function_name(payload(code)).ok_or(DataError::InvalidCode(code))?;
            format!("<func:{name}>")
        }
        TokenKind::Name => "<name>".to_string(),
        TokenKind::Operator => {
            let op = u8::try_from(payload(code))
                .ok()
                .and_then(OperatorKind::from_code)
                .ok_or(DataError::InvalidCode(code))?;
            op.symbol().to_string()
        }
        TokenKind::Reference => "<ref>".to_string(),
        TokenKind::Value => "<value>".to_string(),
        TokenKind::Unknown => return Err(DataError::InvalidCode(code)),
    };
    Ok(rendered)
}

pub fn decode_tokens(codes: &[u16]) -> Result<Vec<String>, DataError> {
    codes.iter().map(|&c| decode_token(c)).collect()
}
