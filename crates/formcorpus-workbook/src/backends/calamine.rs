#![cfg(feature = "calamine")]

use crate::error::WorkbookError;
use crate::memory::{MemoryDocument, MemorySheet, default_origin};
use crate::traits::{Cell, NamedExpression};
use calamine::{Data, Range, Reader, Sheets, open_workbook_auto};
use formcorpus_common::CellKind;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

const BACKEND: &str = "calamine";

/// Reads any format calamine understands (xlsx, xlsm, xlsb, xls, ods).
///
/// calamine does not report the scope of defined names, so every name is
/// treated as workbook-scoped.
pub struct CalamineAdapter {
    workbook: Sheets<BufReader<File>>,
    path: PathBuf,
}

impl CalamineAdapter {
    pub fn open_path<P: AsRef<Path>>(path: P) -> Result<Self, WorkbookError> {
        let path = path.as_ref();
        let workbook = open_workbook_auto(path).map_err(|e| WorkbookError::Open {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        Ok(Self {
            workbook,
            path: path.to_path_buf(),
        })
    }

    fn convert_kind(data: &Data) -> CellKind {
        match data {
            Data::Empty => CellKind::Empty,
            Data::String(s) if s.is_empty() => CellKind::Empty,
            Data::String(_) | Data::DateTimeIso(_) | Data::DurationIso(_) => CellKind::String,
            Data::Float(_) | Data::Int(_) | Data::DateTime(_) => CellKind::Numeric,
            Data::Bool(_) => CellKind::Boolean,
            // Cached error results are plain values, not formulas.
            Data::Error(_) => CellKind::String,
        }
    }

    /// Merge the value and formula ranges into 0-based absolute coordinates.
    fn range_to_cells(
        range: &Range<Data>,
        formulas: Option<&Range<String>>,
    ) -> BTreeMap<(u32, u32), Cell> {
        let mut cells = BTreeMap::new();

        let (start_row, start_col) = range.start().unwrap_or_default();
        for (row, col, val) in range.used_cells() {
            let kind = Self::convert_kind(val);
            if kind == CellKind::Empty {
                continue;
            }
            cells.insert(
                (row as u32 + start_row, col as u32 + start_col),
                Cell::value(kind),
            );
        }

        if let Some(frm_range) = formulas {
            let (start_row, start_col) = frm_range.start().unwrap_or_default();
            for (row, col, formula) in frm_range.used_cells() {
                if formula.is_empty() {
                    continue;
                }
                cells.insert(
                    (row as u32 + start_row, col as u32 + start_col),
                    Cell::from_formula(formula),
                );
            }
        }

        cells
    }

    fn backend_error(&self, message: impl Into<String>) -> WorkbookError {
        WorkbookError::Backend {
            backend: BACKEND,
            path: self.path.clone(),
            message: message.into(),
        }
    }

    pub fn into_document(mut self) -> Result<MemoryDocument, WorkbookError> {
        let names = self.workbook.sheet_names();
        let mut sheets = Vec::with_capacity(names.len());

        for name in &names {
            let range = self
                .workbook
                .worksheet_range(name)
                .map_err(|e| self.backend_error(format!("sheet '{name}': {e}")))?;
            // Formula ranges are optional; some formats do not carry them.
            let formulas = self.workbook.worksheet_formula(name).ok();
            let cells = Self::range_to_cells(&range, formulas.as_ref());
            tracing::debug!(sheet = name.as_str(), cells = cells.len(), "calamine sheet read");
            sheets.push(MemorySheet::from_cells(name.as_str(), cells));
        }

        let origin = default_origin(names.first().map(String::as_str).unwrap_or("Sheet1"));
        let globals = self
            .workbook
            .defined_names()
            .iter()
            .map(|(name, formula)| (name.clone(), NamedExpression::new(origin.as_str(), formula)))
            .collect();

        let path = self.path.to_string_lossy().into_owned();
        MemoryDocument::new(path, sheets, globals)
    }
}
