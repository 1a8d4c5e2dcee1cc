use formcorpus_common::{CellKind, FormulaToken};
use formcorpus_parse::tokenize_cell_formula;
use std::borrow::Cow;

/// A single cell as seen by the extractor.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Cell {
    pub kind: CellKind,
    /// Formula text without the leading `=`; empty for non-formula cells.
    pub formula: String,
    /// Token stream of the formula. For `FormulaWithError` cells this is the
    /// diagnostic stream `[marker, formula text, error message]`.
    pub tokens: Vec<FormulaToken>,
}

impl Cell {
    pub fn empty() -> Self {
        Self::default()
    }

    /// A non-formula cell of the given kind.
    pub fn value(kind: CellKind) -> Self {
        Self {
            kind,
            ..Self::default()
        }
    }

    /// Tokenize `formula`; the cell is `FormulaWithError` if tokenizing fails.
    pub fn from_formula(formula: &str) -> Self {
        let tokenized = tokenize_cell_formula(formula);
        Self {
            kind: tokenized.kind,
            formula: tokenized.formula,
            tokens: tokenized.tokens,
        }
    }

    pub fn with_tokens(kind: CellKind, formula: impl Into<String>, tokens: Vec<FormulaToken>) -> Self {
        Self {
            kind,
            formula: formula.into(),
            tokens,
        }
    }

    pub fn kind(&self) -> CellKind {
        self.kind
    }

    pub fn formula(&self) -> &str {
        &self.formula
    }

    pub fn formula_tokens(&self) -> &[FormulaToken] {
        &self.tokens
    }
}

/// One populated row: its 0-based index and the cells it holds.
///
/// Only cells that are present in the source are stored, keyed by 0-based
/// column and kept in ascending column order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Row {
    pub index: u32,
    pub cells: Vec<(u32, Cell)>,
}

impl Row {
    pub fn new(index: u32) -> Self {
        Self {
            index,
            cells: Vec::new(),
        }
    }

    /// Cell at 0-based `column`, if the row holds one there.
    pub fn get(&self, column: u32) -> Option<&Cell> {
        self.cells
            .binary_search_by_key(&column, |(c, _)| *c)
            .ok()
            .map(|i| &self.cells[i].1)
    }

    pub fn iter(&self) -> impl Iterator<Item = (u32, &Cell)> {
        self.cells.iter().map(|(c, cell)| (*c, cell))
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

/// A user-defined name bound to a formula.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct NamedExpression {
    /// Base position the expression is anchored at, e.g. `Sheet1!$A$1`.
    pub origin: String,
    pub formula: String,
    pub tokens: Vec<FormulaToken>,
}

impl NamedExpression {
    pub fn new(origin: impl Into<String>, formula: &str) -> Self {
        let tokenized = tokenize_cell_formula(formula);
        Self {
            origin: origin.into(),
            formula: tokenized.formula,
            tokens: tokenized.tokens,
        }
    }

    pub fn formula_tokens(&self) -> &[FormulaToken] {
        &self.tokens
    }
}

/// A parsed spreadsheet document, read-only.
pub trait Document {
    type Error: std::error::Error + Send + Sync + 'static;
    type Sheet<'a>: Sheet<Error = Self::Error>
    where
        Self: 'a;

    /// Filesystem path the document was read from.
    fn path(&self) -> &str;

    /// Sheets in document order.
    fn sheets(&self) -> Result<Vec<Self::Sheet<'_>>, Self::Error>;

    /// Workbook-scoped named expressions in document order.
    fn named_expressions(&self) -> Result<Cow<'_, [(String, NamedExpression)]>, Self::Error>;
}

/// One sheet of a [`Document`].
pub trait Sheet {
    type Error: std::error::Error + Send + Sync + 'static;

    fn name(&self) -> &str;

    /// Populated rows in ascending row order. Rows and columns are 0-based;
    /// rows without cells are absent.
    fn rows(&self) -> Result<Cow<'_, [Row]>, Self::Error>;

    /// Named expressions scoped to this sheet.
    fn named_expressions(&self) -> Result<Cow<'_, [(String, NamedExpression)]>, Self::Error>;
}

impl<S: Sheet + ?Sized> Sheet for &S {
    type Error = S::Error;

    fn name(&self) -> &str {
        (**self).name()
    }

    fn rows(&self) -> Result<Cow<'_, [Row]>, Self::Error> {
        (**self).rows()
    }

    fn named_expressions(&self) -> Result<Cow<'_, [(String, NamedExpression)]>, Self::Error> {
        (**self).named_expressions()
    }
}
