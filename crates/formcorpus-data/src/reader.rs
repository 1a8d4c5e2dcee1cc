//! Reading extraction sidecars back.
//!
//! The reader checks element nesting, collects the sheet list and the named
//! expressions in scope, and encodes the tokens of every `valid="true"`
//! formula. Formulas that cannot be encoded are dropped and counted; only a
//! malformed file or an unknown token type in a formula still being encoded
//! fails the whole file.

use crate::encode::{encode_function, encode_operator, encode_simple};
use crate::error::DataError;
use crate::trie::FormulaTrie;
use formcorpus_common::{OperatorKind, TokenKind, function_id};
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use rustc_hash::{FxHashMap, FxHashSet};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Elem {
    Doc,
    Sheets,
    Sheet,
    NamedExpressions,
    NamedExpression,
    Formulas,
    Formula,
    Token,
    Other,
}

impl Elem {
    fn from_tag(tag: &[u8]) -> Self {
        match tag {
            b"doc" => Elem::Doc,
            b"sheets" => Elem::Sheets,
            b"sheet" => Elem::Sheet,
            b"named-expressions" => Elem::NamedExpressions,
            b"named-expression" => Elem::NamedExpression,
            b"formulas" => Elem::Formulas,
            b"formula" => Elem::Formula,
            b"token" => Elem::Token,
            _ => Elem::Other,
        }
    }

    fn tag(self) -> &'static str {
        match self {
            Elem::Doc => "doc",
            Elem::Sheets => "sheets",
            Elem::Sheet => "sheet",
            Elem::NamedExpressions => "named-expressions",
            Elem::NamedExpression => "named-expression",
            Elem::Formulas => "formulas",
            Elem::Formula => "formula",
            Elem::Token => "token",
            Elem::Other => "element",
        }
    }

    /// Whether `self` may appear directly under `parent` (`None` = root).
    fn allowed_under(self, parent: Option<Elem>) -> bool {
        match self {
            Elem::Doc => parent.is_none(),
            Elem::Sheets | Elem::NamedExpressions | Elem::Formulas => parent == Some(Elem::Doc),
            Elem::Sheet => parent == Some(Elem::Sheets),
            Elem::NamedExpression => parent == Some(Elem::NamedExpressions),
            Elem::Formula => parent == Some(Elem::Formulas),
            Elem::Token => matches!(parent, Some(Elem::Formula | Elem::NamedExpression)),
            Elem::Other => parent.is_some(),
        }
    }
}

/// Everything learned from one sidecar.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FileReport {
    /// Source workbook path from the `filepath` attribute of `<doc>`.
    pub document_path: String,
    pub sheets: Vec<String>,
    pub trie: FormulaTrie,
    /// `valid="false"` formulas by formula text.
    pub invalid_formulas: BTreeMap<String, u32>,
    /// Names that resolved neither globally nor on the formula's sheet.
    pub invalid_names: BTreeMap<String, u32>,
    /// Operator or function tokens without a code.
    pub unsupported: BTreeMap<String, u32>,
    pub valid_formulas: u32,
    pub dropped_formulas: u32,
}

fn write_counts(
    f: &mut fmt::Formatter<'_>,
    title: &str,
    counts: &BTreeMap<String, u32>,
) -> fmt::Result {
    if counts.is_empty() {
        return Ok(());
    }
    writeln!(f, "  {title}:")?;
    for (key, n) in counts {
        writeln!(f, "    - {key}: {n}")?;
    }
    Ok(())
}

impl fmt::Display for FileReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "  document path: {}", self.document_path)?;
        write_counts(f, "invalid formulas", &self.invalid_formulas)?;
        write_counts(f, "invalid names", &self.invalid_names)?;
        write_counts(f, "unsupported tokens", &self.unsupported)
    }
}

struct PendingFormula {
    sheet: String,
    codes: Vec<u16>,
    ok: bool,
}

struct Parse<'p> {
    path: &'p Path,
    stack: Vec<Elem>,
    report: FileReport,
    sheet_set: FxHashSet<String>,
    global_names: FxHashSet<String>,
    sheet_names: FxHashMap<String, FxHashSet<String>>,
    formula: Option<PendingFormula>,
}

fn name_key(name: &str) -> String {
    name.to_ascii_lowercase()
}

fn bump(counts: &mut BTreeMap<String, u32>, key: &str) {
    *counts.entry(key.to_string()).or_insert(0) += 1;
}

impl<'p> Parse<'p> {
    fn new(path: &'p Path) -> Self {
        Self {
            path,
            stack: Vec::new(),
            report: FileReport::default(),
            sheet_set: FxHashSet::default(),
            global_names: FxHashSet::default(),
            sheet_names: FxHashMap::default(),
            formula: None,
        }
    }

    fn structure(&self, message: impl Into<String>) -> DataError {
        DataError::Structure {
            path: self.path.to_path_buf(),
            message: message.into(),
        }
    }

    fn xml(&self, message: impl fmt::Display) -> DataError {
        DataError::Xml {
            path: self.path.to_path_buf(),
            message: message.to_string(),
        }
    }

    /// Unescaped attributes of `e`, keyed by name.
    fn attributes(&self, e: &BytesStart<'_>) -> Result<FxHashMap<String, String>, DataError> {
        let mut attrs = FxHashMap::default();
        for attr in e.attributes() {
            let attr = attr.map_err(|err| self.xml(err))?;
            let key = std::str::from_utf8(attr.key.as_ref()).map_err(|err| self.xml(err))?;
            let raw = std::str::from_utf8(&attr.value).map_err(|err| self.xml(err))?;
            let value = quick_xml::escape::unescape(raw).map_err(|err| self.xml(err))?;
            attrs.insert(key.to_string(), value.into_owned());
        }
        Ok(attrs)
    }

    fn required<'a>(
        &self,
        attrs: &'a FxHashMap<String, String>,
        elem: Elem,
        key: &str,
    ) -> Result<&'a str, DataError> {
        attrs
            .get(key)
            .map(String::as_str)
            .ok_or_else(|| self.structure(format!("<{}> is missing '{key}'", elem.tag())))
    }

    fn open(&mut self, e: &BytesStart<'_>) -> Result<(), DataError> {
        let elem = Elem::from_tag(e.name().as_ref());
        let parent = self.stack.last().copied();
        if !elem.allowed_under(parent) {
            let tag = String::from_utf8_lossy(e.name().as_ref()).into_owned();
            return Err(match parent {
                None => self.structure(format!("root element must be <doc>, found <{tag}>")),
                Some(p) => self.structure(format!("<{tag}> is not allowed inside <{}>", p.tag())),
            });
        }
        self.stack.push(elem);

        match elem {
            Elem::Doc => {
                let attrs = self.attributes(e)?;
                self.report.document_path = attrs.get("filepath").cloned().unwrap_or_default();
            }
            Elem::Sheet => {
                let attrs = self.attributes(e)?;
                let name = self.required(&attrs, elem, "name")?.to_string();
                self.sheet_set.insert(name.clone());
                self.report.sheets.push(name);
            }
            Elem::NamedExpression => self.named_expression(e)?,
            Elem::Formula => self.start_formula(e)?,
            Elem::Token => self.token(e)?,
            Elem::Sheets | Elem::NamedExpressions | Elem::Formulas | Elem::Other => {}
        }
        Ok(())
    }

    fn close(&mut self, tag: &[u8]) -> Result<(), DataError> {
        let elem = Elem::from_tag(tag);
        match self.stack.pop() {
            Some(open) if open == elem => {}
            Some(open) => {
                return Err(self.structure(format!(
                    "</{}> closes <{}>",
                    String::from_utf8_lossy(tag),
                    open.tag()
                )));
            }
            None => {
                return Err(self.structure(format!(
                    "unexpected </{}>",
                    String::from_utf8_lossy(tag)
                )));
            }
        }
        if elem == Elem::Formula {
            self.finish_formula();
        }
        Ok(())
    }

    fn named_expression(&mut self, e: &BytesStart<'_>) -> Result<(), DataError> {
        let attrs = self.attributes(e)?;
        let name = name_key(self.required(&attrs, Elem::NamedExpression, "name")?);
        match attrs.get("scope").map(String::as_str) {
            Some("sheet") => {
                let sheet = self.required(&attrs, Elem::NamedExpression, "sheet")?;
                if !self.sheet_set.contains(sheet) {
                    return Err(DataError::UnknownSheet {
                        path: self.path.to_path_buf(),
                        sheet: sheet.to_string(),
                    });
                }
                self.sheet_names
                    .entry(sheet.to_string())
                    .or_default()
                    .insert(name);
            }
            _ => {
                self.global_names.insert(name);
            }
        }
        Ok(())
    }

    fn start_formula(&mut self, e: &BytesStart<'_>) -> Result<(), DataError> {
        let attrs = self.attributes(e)?;
        let sheet = self.required(&attrs, Elem::Formula, "sheet")?.to_string();
        if attrs.get("valid").map(String::as_str) == Some("true") {
            self.formula = Some(PendingFormula {
                sheet,
                codes: Vec::new(),
                ok: true,
            });
        } else {
            let text = attrs.get("formula").map(String::as_str).unwrap_or_default();
            bump(&mut self.report.invalid_formulas, text);
        }
        Ok(())
    }

    fn resolves(&self, sheet: &str, name: &str) -> bool {
        let key = name_key(name);
        self.global_names.contains(&key)
            || self
                .sheet_names
                .get(sheet)
                .is_some_and(|names| names.contains(&key))
    }

    fn token(&mut self, e: &BytesStart<'_>) -> Result<(), DataError> {
        // tokens of named expressions and of already dropped formulas are not inspected
        let Some(sheet) = self
            .formula
            .as_ref()
            .filter(|f| f.ok)
            .map(|f| f.sheet.as_str())
        else {
            return Ok(());
        };

        let attrs = self.attributes(e)?;
        let token_type = self.required(&attrs, Elem::Token, "type")?;
        let kind = TokenKind::from_qualified(token_type)
            .filter(|kind| *kind != TokenKind::Unknown)
            .ok_or_else(|| DataError::UnknownTokenType {
                path: self.path.to_path_buf(),
                token_type: token_type.to_string(),
            })?;
        let text = attrs.get("s").map(String::as_str).unwrap_or_default();

        let code = match kind {
            TokenKind::Operator => OperatorKind::from_symbol(text).map(encode_operator),
            TokenKind::Function => function_id(text).and_then(encode_function),
            TokenKind::Name if !self.resolves(sheet, text) => {
                bump(&mut self.report.invalid_names, text);
                self.drop_formula();
                return Ok(());
            }
            TokenKind::Error => {
                self.drop_formula();
                return Ok(());
            }
            _ => encode_simple(kind),
        };

        match code {
            Some(code) => {
                if let Some(f) = self.formula.as_mut() {
                    f.codes.push(code);
                }
            }
            None => {
                bump(&mut self.report.unsupported, text);
                self.drop_formula();
            }
        }
        Ok(())
    }

    fn drop_formula(&mut self) {
        if let Some(f) = self.formula.as_mut() {
            f.ok = false;
        }
    }

    fn finish_formula(&mut self) {
        let Some(f) = self.formula.take() else {
            return;
        };
        if f.ok {
            self.report.valid_formulas += 1;
            self.report.trie.insert(&f.codes);
        } else {
            self.report.dropped_formulas += 1;
        }
    }
}

/// Parses sidecars into [`FileReport`]s.
#[derive(Clone, Copy, Debug, Default)]
pub struct FormulaXmlReader;

impl FormulaXmlReader {
    pub fn new() -> Self {
        Self
    }

    pub fn read_file(&self, path: impl AsRef<Path>) -> Result<FileReport, DataError> {
        let path = path.as_ref();
        let xml = std::fs::read_to_string(path).map_err(|source| DataError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        self.parse(&xml, path)
    }

    /// Parse sidecar text. `path` is only used in errors.
    pub fn parse(&self, xml: &str, path: &Path) -> Result<FileReport, DataError> {
        let mut reader = Reader::from_str(xml);
        let mut state = Parse::new(path);
        let mut seen_root = false;

        loop {
            let event = reader.read_event().map_err(|err| DataError::Xml {
                path: PathBuf::from(path),
                message: format!("at byte {}: {err}", reader.buffer_position()),
            })?;
            match event {
                Event::Start(e) => {
                    if state.stack.is_empty() && seen_root {
                        return Err(state.structure("more than one root element"));
                    }
                    state.open(&e)?;
                    seen_root = true;
                }
                Event::Empty(e) => {
                    if state.stack.is_empty() && seen_root {
                        return Err(state.structure("more than one root element"));
                    }
                    state.open(&e)?;
                    seen_root = true;
                    state.close(e.name().as_ref())?;
                }
                Event::End(e) => state.close(e.name().as_ref())?,
                Event::Eof => break,
                _ => {}
            }
        }

        if let Some(open) = state.stack.last() {
            return Err(state.structure(format!("<{}> is never closed", open.tag())));
        }
        if !seen_root {
            return Err(state.structure("no <doc> element"));
        }
        tracing::debug!(
            path = %path.display(),
            entries = state.report.trie.len(),
            valid = state.report.valid_formulas,
            dropped = state.report.dropped_formulas,
            "sidecar parsed"
        );
        Ok(state.report)
    }
}
