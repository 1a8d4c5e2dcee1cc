use std::fmt;

/// What a cell holds, as far as formula extraction is concerned.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
pub enum CellKind {
    #[default]
    Empty,
    Boolean,
    Numeric,
    String,
    /// A formula that tokenized cleanly.
    Formula,
    /// A formula the source could not interpret; its token stream carries
    /// `[marker, formula text, error message]`.
    FormulaWithError,
}

impl CellKind {
    pub const fn is_formula(self) -> bool {
        matches!(self, Self::Formula | Self::FormulaWithError)
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Empty => "empty",
            Self::Boolean => "boolean",
            Self::Numeric => "numeric",
            Self::String => "string",
            Self::Formula => "formula",
            Self::FormulaWithError => "formula_with_error",
        }
    }
}

impl fmt::Display for CellKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
