//! Fixture helpers shared by the formcorpus test suites.
//!
//! Workbooks are built with `umya-spreadsheet` and written into a fresh
//! temporary directory that lives as long as the returned [`Fixture`].

use std::path::{Path, PathBuf};
use tempfile::TempDir;
use umya_spreadsheet::Spreadsheet;

pub use umya_spreadsheet;

/// A temporary directory holding one or more generated files.
pub struct Fixture {
    dir: TempDir,
}

impl Fixture {
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().expect("temp dir"),
        }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Path of `relative` inside the fixture, creating parent directories.
    pub fn child(&self, relative: impl AsRef<Path>) -> PathBuf {
        let path = self.dir.path().join(relative);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("create fixture dirs");
        }
        path
    }

    /// Build a workbook starting from umya's default single-sheet file
    /// (`Sheet1`) and write it to `relative`.
    pub fn workbook(&self, relative: impl AsRef<Path>, build: impl FnOnce(&mut Spreadsheet)) -> PathBuf {
        let path = self.child(relative);
        let mut book = umya_spreadsheet::new_file();
        build(&mut book);
        umya_spreadsheet::writer::xlsx::write(&book, &path).expect("write workbook");
        path
    }

    /// Write raw bytes to `relative`.
    pub fn file(&self, relative: impl AsRef<Path>, contents: impl AsRef<[u8]>) -> PathBuf {
        let path = self.child(relative);
        std::fs::write(&path, contents).expect("write fixture file");
        path
    }
}

impl Default for Fixture {
    fn default() -> Self {
        Self::new()
    }
}

/// Put a formula (with or without `=`) at 1-based `(col, row)` of `sheet`.
pub fn set_formula(book: &mut Spreadsheet, sheet: &str, col_row: (u32, u32), formula: &str) {
    let ws = book.get_sheet_by_name_mut(sheet).expect("sheet exists");
    ws.get_cell_mut(col_row)
        .set_formula(formula.strip_prefix('=').unwrap_or(formula));
}

pub fn set_number(book: &mut Spreadsheet, sheet: &str, col_row: (u32, u32), value: f64) {
    let ws = book.get_sheet_by_name_mut(sheet).expect("sheet exists");
    ws.get_cell_mut(col_row).set_value_number(value);
}

pub fn set_text(book: &mut Spreadsheet, sheet: &str, col_row: (u32, u32), value: &str) {
    let ws = book.get_sheet_by_name_mut(sheet).expect("sheet exists");
    ws.get_cell_mut(col_row).set_value(value);
}

/// Add a defined name. `local_sheet` marks it as scoped to the sheet at that index.
pub fn add_name(
    book: &mut Spreadsheet,
    host_sheet: &str,
    name: &str,
    address: &str,
    local_sheet: Option<u32>,
) {
    let ws = book.get_sheet_by_name_mut(host_sheet).expect("sheet exists");
    ws.add_defined_name(name, address).expect("add name");
    if let Some(id) = local_sheet {
        if let Some(last) = ws.get_defined_names_mut().last_mut() {
            last.set_local_sheet_id(id);
        }
    }
}

/// Append sheets after the default `Sheet1`.
pub fn add_sheets(book: &mut Spreadsheet, names: &[&str]) {
    for name in names {
        book.new_sheet(*name).expect("new sheet");
    }
}
