pub mod lower;
pub mod reference;
pub mod tokenizer;

pub use lower::{
    ERROR_STREAM_MARKER, TokenizedFormula, error_stream, lower_tokens, normalize_formula,
    tokenize_cell_formula, tokenize_formula,
};
pub use reference::is_reference;
pub use tokenizer::{Token, TokenSubType, TokenType, Tokenizer, TokenizerError};

// Re-export common types
pub use formcorpus_common::{CellKind, FormulaToken, TokenKind};
