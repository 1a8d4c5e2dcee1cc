//! In-memory [`Document`] implementation.
//!
//! Backends materialise a workbook into a [`MemoryDocument`]; tests build one
//! directly through [`MemoryDocument::builder`].

use crate::error::WorkbookError;
use crate::traits::{Cell, Document, NamedExpression, Row, Sheet};
use formcorpus_common::CellKind;
use std::borrow::Cow;
use std::collections::{BTreeMap, HashSet};

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MemorySheet {
    name: String,
    rows: Vec<Row>,
    named_expressions: Vec<(String, NamedExpression)>,
}

impl MemorySheet {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Group sparse 0-based `(row, col)` cells into rows.
    ///
    /// Only the given coordinates are stored; a later duplicate replaces an
    /// earlier one.
    pub fn from_cells(
        name: impl Into<String>,
        cells: impl IntoIterator<Item = ((u32, u32), Cell)>,
    ) -> Self {
        let sparse: BTreeMap<(u32, u32), Cell> = cells.into_iter().collect();
        let mut sheet = Self::new(name);
        for ((r, c), cell) in sparse {
            match sheet.rows.last_mut() {
                Some(row) if row.index == r => row.cells.push((c, cell)),
                _ => {
                    let mut row = Row::new(r);
                    row.cells.push((c, cell));
                    sheet.rows.push(row);
                }
            }
        }
        sheet
    }

    pub fn with_named_expressions(
        mut self,
        named_expressions: Vec<(String, NamedExpression)>,
    ) -> Self {
        self.named_expressions = named_expressions;
        self
    }

    pub fn push_named_expression(&mut self, name: impl Into<String>, expr: NamedExpression) {
        self.named_expressions.push((name.into(), expr));
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn cell(&self, row: u32, col: u32) -> Option<&Cell> {
        self.rows
            .binary_search_by_key(&row, |r| r.index)
            .ok()
            .and_then(|i| self.rows[i].get(col))
    }
}

impl Sheet for MemorySheet {
    type Error = WorkbookError;

    fn name(&self) -> &str {
        &self.name
    }

    fn rows(&self) -> Result<Cow<'_, [Row]>, Self::Error> {
        Ok(Cow::Borrowed(&self.rows))
    }

    fn named_expressions(&self) -> Result<Cow<'_, [(String, NamedExpression)]>, Self::Error> {
        Ok(Cow::Borrowed(&self.named_expressions))
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MemoryDocument {
    path: String,
    sheets: Vec<MemorySheet>,
    named_expressions: Vec<(String, NamedExpression)>,
}

impl MemoryDocument {
    /// Assemble a document, rejecting duplicate sheet names.
    pub fn new(
        path: impl Into<String>,
        sheets: Vec<MemorySheet>,
        named_expressions: Vec<(String, NamedExpression)>,
    ) -> Result<Self, WorkbookError> {
        let mut seen = HashSet::new();
        for sheet in &sheets {
            if !seen.insert(sheet.name.as_str()) {
                return Err(WorkbookError::DuplicateSheet(sheet.name.clone()));
            }
        }
        Ok(Self {
            path: path.into(),
            sheets,
            named_expressions,
        })
    }

    pub fn builder(path: impl Into<String>) -> MemoryDocumentBuilder {
        MemoryDocumentBuilder {
            path: path.into(),
            sheets: Vec::new(),
            named_expressions: Vec::new(),
        }
    }

    pub fn sheet(&self, name: &str) -> Option<&MemorySheet> {
        self.sheets.iter().find(|s| s.name == name)
    }

    pub fn sheet_count(&self) -> usize {
        self.sheets.len()
    }
}

impl Document for MemoryDocument {
    type Error = WorkbookError;
    type Sheet<'a> = &'a MemorySheet;

    fn path(&self) -> &str {
        &self.path
    }

    fn sheets(&self) -> Result<Vec<Self::Sheet<'_>>, Self::Error> {
        Ok(self.sheets.iter().collect())
    }

    fn named_expressions(&self) -> Result<Cow<'_, [(String, NamedExpression)]>, Self::Error> {
        Ok(Cow::Borrowed(&self.named_expressions))
    }
}

/// Default anchor for a named expression defined on `sheet`.
pub(crate) fn default_origin(sheet: &str) -> String {
    format!("{sheet}!$A$1")
}

pub struct MemoryDocumentBuilder {
    path: String,
    sheets: Vec<MemorySheet>,
    named_expressions: Vec<(String, Option<String>, String)>,
}

impl MemoryDocumentBuilder {
    pub fn sheet(mut self, name: &str, build: impl FnOnce(&mut SheetBuilder)) -> Self {
        let mut builder = SheetBuilder {
            name: name.to_string(),
            cells: BTreeMap::new(),
            named_expressions: Vec::new(),
        };
        build(&mut builder);
        let mut sheet = MemorySheet::from_cells(builder.name, builder.cells);
        sheet.named_expressions = builder.named_expressions;
        self.sheets.push(sheet);
        self
    }

    /// Add a workbook-scoped name. The origin defaults to `A1` of the first sheet.
    pub fn named_expression(mut self, name: &str, formula: &str) -> Self {
        self.named_expressions
            .push((name.to_string(), None, formula.to_string()));
        self
    }

    pub fn named_expression_at(mut self, name: &str, origin: &str, formula: &str) -> Self {
        self.named_expressions.push((
            name.to_string(),
            Some(origin.to_string()),
            formula.to_string(),
        ));
        self
    }

    pub fn build(self) -> Result<MemoryDocument, WorkbookError> {
        let first_sheet = self
            .sheets
            .first()
            .map(|s| s.name.clone())
            .unwrap_or_else(|| "Sheet1".to_string());
        let names = self
            .named_expressions
            .into_iter()
            .map(|(name, origin, formula)| {
                let origin = origin.unwrap_or_else(|| default_origin(&first_sheet));
                (name, NamedExpression::new(origin, &formula))
            })
            .collect();
        MemoryDocument::new(self.path, self.sheets, names)
    }
}

pub struct SheetBuilder {
    name: String,
    cells: BTreeMap<(u32, u32), Cell>,
    named_expressions: Vec<(String, NamedExpression)>,
}

impl SheetBuilder {
    /// Put a formula at 0-based `(row, col)`.
    pub fn formula(&mut self, row: u32, col: u32, formula: &str) -> &mut Self {
        self.cells.insert((row, col), Cell::from_formula(formula));
        self
    }

    pub fn value(&mut self, row: u32, col: u32, kind: CellKind) -> &mut Self {
        self.cells.insert((row, col), Cell::value(kind));
        self
    }

    pub fn cell(&mut self, row: u32, col: u32, cell: Cell) -> &mut Self {
        self.cells.insert((row, col), cell);
        self
    }

    /// Add a name scoped to this sheet, anchored at its `A1`.
    pub fn named_expression(&mut self, name: &str, formula: &str) -> &mut Self {
        let expr = NamedExpression::new(default_origin(&self.name), formula);
        self.named_expressions.push((name.to_string(), expr));
        self
    }
}
