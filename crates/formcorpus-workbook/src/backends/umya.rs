#![cfg(feature = "umya")]

use crate::error::WorkbookError;
use crate::memory::{MemoryDocument, MemorySheet, default_origin};
use crate::traits::{Cell, NamedExpression, Sheet};
use formcorpus_common::CellKind;
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use umya_spreadsheet::{CellRawValue, CellValue, DefinedName, Spreadsheet, reader::xlsx};

const BACKEND: &str = "umya";

/// Reads `.xlsx`/`.xlsm` workbooks, including sheet-scoped defined names.
pub struct UmyaAdapter {
    workbook: Spreadsheet,
    path: PathBuf,
}

impl UmyaAdapter {
    pub fn open_path<P: AsRef<Path>>(path: P) -> Result<Self, WorkbookError> {
        let path = path.as_ref();
        let workbook = xlsx::read(path).map_err(|e| WorkbookError::Open {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        Ok(Self {
            workbook,
            path: path.to_path_buf(),
        })
    }

    fn cell_kind(cv: &CellValue) -> CellKind {
        match cv.get_raw_value() {
            CellRawValue::Numeric(_) => CellKind::Numeric,
            CellRawValue::Bool(_) => CellKind::Boolean,
            CellRawValue::String(_) | CellRawValue::RichText(_) => CellKind::String,
            CellRawValue::Lazy(s) => {
                let txt = s.as_ref();
                if txt.parse::<f64>().is_ok() {
                    CellKind::Numeric
                } else if txt.eq_ignore_ascii_case("TRUE") || txt.eq_ignore_ascii_case("FALSE") {
                    CellKind::Boolean
                } else {
                    CellKind::String
                }
            }
            // Cached error results are plain values, not formulas.
            CellRawValue::Error(_) => CellKind::String,
            CellRawValue::Empty => CellKind::Empty,
        }
    }

    fn convert_cell(cv: &CellValue) -> Cell {
        if cv.is_formula() {
            let formula = cv.get_formula();
            if !formula.is_empty() {
                return Cell::from_formula(formula);
            }
        }
        Cell::value(Self::cell_kind(cv))
    }

    fn backend_error(&self, message: impl Into<String>) -> WorkbookError {
        WorkbookError::Backend {
            backend: BACKEND,
            path: self.path.clone(),
            message: message.into(),
        }
    }

    /// Materialise every sheet and defined name.
    ///
    /// Names without a `localSheetId` are workbook-scoped; the rest belong to
    /// the sheet at that index. A global name stored on a sheet and on the
    /// workbook is reported once.
    pub fn into_document(mut self) -> Result<MemoryDocument, WorkbookError> {
        let count = self.workbook.get_sheet_count();
        let mut sheets = Vec::with_capacity(count);
        let mut globals: Vec<(String, NamedExpression)> = Vec::new();
        let mut seen_globals: HashSet<String> = HashSet::new();
        let mut scoped: Vec<(u32, String, String)> = Vec::new();

        let first_sheet = self
            .workbook
            .get_sheet(&0)
            .map(|ws| ws.get_name().to_string());

        let mut classify = |dn: &DefinedName,
                            globals: &mut Vec<(String, NamedExpression)>,
                            first: &Option<String>| {
            let name = dn.get_name().to_string();
            let formula = dn.get_address();
            if dn.has_local_sheet_id() {
                scoped.push((*dn.get_local_sheet_id(), name, formula));
            } else if seen_globals.insert(name.clone()) {
                let origin = default_origin(first.as_deref().unwrap_or("Sheet1"));
                globals.push((name, NamedExpression::new(origin, &formula)));
            }
        };

        for dn in self.workbook.get_defined_names() {
            classify(dn, &mut globals, &first_sheet);
        }

        for i in 0..count {
            self.workbook.read_sheet(i);
            let ws = self
                .workbook
                .get_sheet(&i)
                .ok_or_else(|| WorkbookError::SheetNotFound(format!("#{i}")))?;

            for dn in ws.get_defined_names() {
                classify(dn, &mut globals, &first_sheet);
            }

            let mut cells: BTreeMap<(u32, u32), Cell> = BTreeMap::new();
            for cell in ws.get_cell_collection() {
                let coord = cell.get_coordinate();
                let col = *coord.get_col_num();
                let row = *coord.get_row_num();
                if col == 0 || row == 0 {
                    continue;
                }
                cells.insert((row - 1, col - 1), Self::convert_cell(cell.get_cell_value()));
            }
            sheets.push(MemorySheet::from_cells(ws.get_name(), cells));
        }

        for (sheet_id, name, formula) in scoped {
            let Some(sheet) = sheets.get_mut(sheet_id as usize) else {
                return Err(self.backend_error(format!(
                    "name '{name}' is scoped to missing sheet #{sheet_id}"
                )));
            };
            let origin = default_origin(sheet.name());
            sheet.push_named_expression(name, NamedExpression::new(origin, &formula));
        }

        tracing::debug!(
            path = %self.path.display(),
            sheets = sheets.len(),
            names = globals.len(),
            "umya workbook loaded"
        );

        let path = self.path.to_string_lossy().into_owned();
        MemoryDocument::new(path, sheets, globals)
    }
}
