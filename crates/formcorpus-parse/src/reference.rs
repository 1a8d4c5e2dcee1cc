//! Telling cell references apart from defined names.
//!
//! The raw tokenizer reports both as `Operand/Range`. A reference is an A1 or
//! R1C1 address, a range between two of them, a whole-column or whole-row
//! range, or a structured table reference, optionally qualified by a sheet
//! (`Sheet1!`, `'My Sheet'!`, `[1]Sheet1!`). Everything else is a name.

use once_cell::sync::Lazy;
use regex::Regex;

const MAX_ROW: u64 = 1_048_576;
const MAX_COL: u64 = 16_384;

static A1_CELL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\$?([A-Za-z]{1,3})\$?([0-9]{1,7})$").expect("valid regex"));
static A1_COLUMN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\$?([A-Za-z]{1,3})$").expect("valid regex"));
static A1_ROW: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\$?([0-9]{1,7})$").expect("valid regex"));
static R1C1: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?i:R)(\[-?[0-9]+\]|[0-9]+)?(?i:C)(\[-?[0-9]+\]|[0-9]+)?$").expect("valid regex")
});
static STRUCTURED: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z_\\][A-Za-z0-9_.\\]*\[.*\]$|^\[.*\]$").expect("valid regex")
});

fn column_number(letters: &str) -> u64 {
    letters
        .bytes()
        .fold(0u64, |acc, b| acc * 26 + u64::from(b.to_ascii_uppercase() - b'A' + 1))
}

fn is_a1_cell(s: &str) -> bool {
    A1_CELL.captures(s).is_some_and(|caps| {
        let col = column_number(&caps[1]);
        let row: u64 = caps[2].parse().unwrap_or(0);
        (1..=MAX_COL).contains(&col) && (1..=MAX_ROW).contains(&row)
    })
}

fn is_column(s: &str) -> bool {
    A1_COLUMN
        .captures(s)
        .is_some_and(|caps| (1..=MAX_COL).contains(&column_number(&caps[1])))
}

fn is_row(s: &str) -> bool {
    A1_ROW.captures(s).is_some_and(|caps| {
        caps[1]
            .parse::<u64>()
            .is_ok_and(|row| (1..=MAX_ROW).contains(&row))
    })
}

/// Drop a leading `Sheet!` / `'Quoted sheet'!` / `[book]Sheet!` qualifier.
fn strip_sheet(s: &str) -> &str {
    match s.rfind('!') {
        Some(pos) => &s[pos + 1..],
        None => s,
    }
}

fn is_single_area(part: &str) -> bool {
    is_a1_cell(part) || R1C1.is_match(part)
}

/// Whether an operand is a reference rather than a name.
pub fn is_reference(operand: &str) -> bool {
    if operand.is_empty() {
        return false;
    }

    let unqualified = strip_sheet(operand);
    if STRUCTURED.is_match(unqualified) {
        return true;
    }

    let parts: Vec<&str> = unqualified.split(':').map(strip_sheet).collect();
    match parts.as_slice() {
        [single] => is_single_area(single),
        [a, b] => {
            (is_single_area(a) && is_single_area(b))
                || (is_column(a) && is_column(b))
                || (is_row(a) && is_row(b))
        }
        _ => false,
    }
}
