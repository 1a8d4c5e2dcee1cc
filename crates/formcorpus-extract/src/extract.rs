//! Formula extraction.
//!
//! One document becomes one single-line XML sidecar:
//!
//! ```text
//! <doc filepath="…">
//!   <sheets count="N"><sheet name="…"/>…</sheets>
//!   <named-expressions>
//!     <named-expression name="…" origin="…" formula="…" scope="global|sheet" [sheet="…"]>
//!       <token s="…" type="…"/>…
//!     </named-expression>…
//!   </named-expressions>
//!   <formulas>
//!     <formula sheet="…" row="R" column="C" formula="…" valid="true"><token …/>…</formula>
//!     <formula sheet="…" row="R" column="C" formula="…" error="…" valid="false"/>
//!   </formulas>
//! </doc>
//! ```
//!
//! (shown indented; the file itself has no whitespace between elements and no
//! XML declaration).

use crate::config::CorpusConfig;
use crate::error::ExtractError;
use crate::escape::escape_attr;
use formcorpus_common::{CellKind, FormulaToken};
use formcorpus_workbook::{Document, NamedExpression, Sheet};
use std::fmt;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ExtractOptions {
    /// Leave a partially written sidecar in place when extraction fails.
    pub keep_partial_output: bool,
}

/// Outcome of extracting one document.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ExtractReport {
    pub output: PathBuf,
    /// One `* sheet: <name>` line per sheet, in document order.
    pub log: Vec<String>,
    pub sheets: usize,
    pub named_expressions: usize,
    pub valid_formulas: usize,
    pub error_formulas: usize,
}

/// Writes through to the underlying sink, tagging I/O errors with the output path.
struct XmlSink<'p, W: Write> {
    out: W,
    path: &'p Path,
}

impl<W: Write> XmlSink<'_, W> {
    fn io_error(&self, source: std::io::Error) -> ExtractError {
        ExtractError::Io {
            path: self.path.to_path_buf(),
            source,
        }
    }

    fn emit(&mut self, args: fmt::Arguments<'_>) -> Result<(), ExtractError> {
        self.out.write_fmt(args).map_err(|e| self.io_error(e))
    }

    fn raw(&mut self, s: &str) -> Result<(), ExtractError> {
        self.out.write_all(s.as_bytes()).map_err(|e| self.io_error(e))
    }

    fn flush(&mut self) -> Result<(), ExtractError> {
        self.out.flush().map_err(|e| self.io_error(e))
    }

    fn tokens(&mut self, tokens: &[FormulaToken]) -> Result<(), ExtractError> {
        for token in tokens {
            self.emit(format_args!(
                r#"<token s="{}" type="{}"/>"#,
                escape_attr(&token.to_string()),
                token.kind.as_str()
            ))?;
        }
        Ok(())
    }

    fn named_expression(
        &mut self,
        name: &str,
        expr: &NamedExpression,
        sheet: Option<&str>,
    ) -> Result<(), ExtractError> {
        self.emit(format_args!(
            r#"<named-expression name="{}" origin="{}" formula="{}""#,
            escape_attr(name),
            escape_attr(&expr.origin),
            escape_attr(&expr.formula)
        ))?;
        match sheet {
            None => self.raw(r#" scope="global">"#)?,
            Some(sheet) => self.emit(format_args!(
                r#" scope="sheet" sheet="{}">"#,
                escape_attr(sheet)
            ))?,
        }
        self.tokens(expr.formula_tokens())?;
        self.raw("</named-expression>")
    }
}

/// Extracts formulas from documents into sidecar files.
#[derive(Clone, Debug, Default)]
pub struct FormulaExtractor {
    config: CorpusConfig,
    options: ExtractOptions,
}

impl FormulaExtractor {
    pub fn new(config: CorpusConfig) -> Self {
        Self {
            config,
            options: ExtractOptions::default(),
        }
    }

    pub fn with_options(mut self, options: ExtractOptions) -> Self {
        self.options = options;
        self
    }

    pub fn config(&self) -> &CorpusConfig {
        &self.config
    }

    /// `<document path><prefix>formulas.xml`
    pub fn output_path<D: Document>(&self, doc: &D) -> PathBuf {
        self.config.sidecar_path(doc.path())
    }

    /// Write the sidecar next to the document.
    ///
    /// The target directory must already exist. On failure the partial file
    /// is removed unless [`ExtractOptions::keep_partial_output`] is set.
    pub fn extract<D: Document>(&self, doc: &D) -> Result<ExtractReport, ExtractError> {
        let output = self.output_path(doc);
        let _span = tracing::info_span!("extract", path = doc.path()).entered();

        let file = File::create(&output).map_err(|source| ExtractError::Io {
            path: output.clone(),
            source,
        })?;

        match self.write_to(doc, BufWriter::new(file)) {
            Ok(report) => {
                tracing::debug!(
                    output = %output.display(),
                    sheets = report.sheets,
                    valid = report.valid_formulas,
                    errors = report.error_formulas,
                    "sidecar written"
                );
                Ok(report)
            }
            Err(err) => {
                if !self.options.keep_partial_output {
                    if let Err(e) = fs::remove_file(&output) {
                        tracing::warn!(output = %output.display(), error = %e, "could not remove partial sidecar");
                    }
                }
                Err(err)
            }
        }
    }

    /// Serialise `doc` into `out`. I/O errors are reported against
    /// [`Self::output_path`].
    pub fn write_to<D: Document, W: Write>(
        &self,
        doc: &D,
        out: W,
    ) -> Result<ExtractReport, ExtractError> {
        let output = self.output_path(doc);
        let mut sink = XmlSink {
            out,
            path: &output,
        };
        let mut report = write_document(doc, &mut sink)?;
        sink.flush()?;
        report.output = output.clone();
        Ok(report)
    }

    /// Serialise `doc` into a string.
    pub fn render<D: Document>(&self, doc: &D) -> Result<(String, ExtractReport), ExtractError> {
        let mut buf = Vec::new();
        let report = self.write_to(doc, &mut buf)?;
        let xml = String::from_utf8(buf).map_err(|e| ExtractError::Io {
            path: report.output.clone(),
            source: std::io::Error::new(std::io::ErrorKind::InvalidData, e),
        })?;
        Ok((xml, report))
    }
}

/// Extract `doc` with default options.
pub fn extract<D: Document>(doc: &D, config: &CorpusConfig) -> Result<ExtractReport, ExtractError> {
    FormulaExtractor::new(config.clone()).extract(doc)
}

fn write_document<D: Document, W: Write>(
    doc: &D,
    sink: &mut XmlSink<'_, W>,
) -> Result<ExtractReport, ExtractError> {
    let path = doc.path();
    let read_err = |e: D::Error| ExtractError::source_error(path, e);
    let mut report = ExtractReport::default();

    let sheets = doc.sheets().map_err(read_err)?;
    report.sheets = sheets.len();

    sink.emit(format_args!(
        r#"<doc filepath="{}"><sheets count="{}">"#,
        escape_attr(path),
        sheets.len()
    ))?;
    for sheet in &sheets {
        sink.emit(format_args!(r#"<sheet name="{}"/>"#, escape_attr(sheet.name())))?;
    }
    sink.raw("</sheets>")?;

    sink.raw("<named-expressions>")?;
    for (name, expr) in doc.named_expressions().map_err(read_err)?.iter() {
        sink.named_expression(name, expr, None)?;
        report.named_expressions += 1;
    }
    for sheet in &sheets {
        for (name, expr) in sheet.named_expressions().map_err(read_err)?.iter() {
            sink.named_expression(name, expr, Some(sheet.name()))?;
            report.named_expressions += 1;
        }
    }
    sink.raw("</named-expressions>")?;

    sink.raw("<formulas>")?;
    for sheet in &sheets {
        let sheet_name = sheet.name();
        report.log.push(format!("* sheet: {sheet_name}"));
        tracing::debug!(sheet = sheet_name, "extracting sheet");

        let rows = sheet.rows().map_err(read_err)?;
        for row in rows.iter() {
            let row_pos = row.index;
            for (col_pos, cell) in row.iter() {
                match cell.kind() {
                    CellKind::Formula => {
                        sink.emit(format_args!(
                            r#"<formula sheet="{}" row="{row_pos}" column="{col_pos}" formula="{}" valid="true">"#,
                            escape_attr(sheet_name),
                            escape_attr(cell.formula())
                        ))?;
                        sink.tokens(cell.formula_tokens())?;
                        sink.raw("</formula>")?;
                        report.valid_formulas += 1;
                    }
                    CellKind::FormulaWithError => {
                        // [marker, formula text, error message]
                        let rendered: Vec<String> =
                            cell.formula_tokens().iter().map(ToString::to_string).collect();
                        let [_, formula, error, ..] = rendered.as_slice() else {
                            return Err(ExtractError::MalformedErrorStream {
                                sheet: sheet_name.to_string(),
                                row: row_pos,
                                column: col_pos,
                                len: rendered.len(),
                            });
                        };
                        sink.emit(format_args!(
                            r#"<formula sheet="{}" row="{row_pos}" column="{col_pos}" formula="{}" error="{}" valid="false"/>"#,
                            escape_attr(sheet_name),
                            escape_attr(formula),
                            escape_attr(error)
                        ))?;
                        report.error_formulas += 1;
                    }
                    CellKind::Empty | CellKind::Boolean | CellKind::Numeric | CellKind::String => {}
                }
            }
        }
    }
    sink.raw("</formulas>")?;
    sink.raw("</doc>")?;

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use formcorpus_common::TokenKind;
    use formcorpus_workbook::{Cell, MemoryDocument, MemorySheet, Row, WorkbookError};
    use std::borrow::Cow;

    fn render(doc: &MemoryDocument) -> String {
        FormulaExtractor::default().render(doc).unwrap().0
    }

    #[test]
    fn full_document_shape() {
        let doc = MemoryDocument::builder("book.xlsx")
            .sheet("Sheet1", |s| {
                s.formula(0, 0, "=A1+1");
            })
            .named_expression("Rate", "Sheet1!$B$1")
            .build()
            .unwrap();
        assert_eq!(
            render(&doc),
            concat!(
                r#"<doc filepath="book.xlsx"><sheets count="1"><sheet name="Sheet1"/></sheets>"#,
                r#"<named-expressions><named-expression name="Rate" origin="Sheet1!$A$1" formula="Sheet1!$B$1" scope="global">"#,
                r#"<token s="Sheet1!$B$1" type="reference"/></named-expression></named-expressions>"#,
                r#"<formulas><formula sheet="Sheet1" row="0" column="0" formula="A1+1" valid="true">"#,
                r#"<token s="A1" type="reference"/><token s="+" type="operator"/><token s="1" type="value"/>"#,
                r#"</formula></formulas></doc>"#
            )
        );
    }

    #[test]
    fn sheet_count_matches_sheet_elements() {
        let mut builder = MemoryDocument::builder("five.xlsx");
        for name in ["A", "B", "C", "D", "E"] {
            builder = builder.sheet(name, |_| {});
        }
        let xml = render(&builder.build().unwrap());
        assert!(xml.contains(r#"<sheets count="5"><sheet name="A"/><sheet name="B"/><sheet name="C"/><sheet name="D"/><sheet name="E"/></sheets>"#));
        assert_eq!(xml.matches("<sheet ").count(), 5);
    }

    #[test]
    fn only_formula_cells_are_emitted_in_row_major_order() {
        let doc = MemoryDocument::builder("cells.xlsx")
            .sheet("S", |s| {
                s.value(0, 0, CellKind::Numeric)
                    .formula(0, 2, "=A1*2")
                    .formula(0, 1, "=SUM(A1")
                    .value(1, 0, CellKind::String)
                    .formula(1, 1, "=B1")
                    .value(2, 3, CellKind::Boolean);
            })
            .build()
            .unwrap();
        let (xml, report) = FormulaExtractor::default().render(&doc).unwrap();

        let positions: Vec<(usize, &str)> = ["row=\"0\" column=\"1\"", "row=\"0\" column=\"2\"", "row=\"1\" column=\"1\""]
            .iter()
            .map(|p| (xml.find(p).unwrap(), *p))
            .collect();
        assert!(positions.windows(2).all(|w| w[0].0 < w[1].0));
        assert_eq!(xml.matches("<formula ").count(), 3);
        assert_eq!(report.valid_formulas, 2);
        assert_eq!(report.error_formulas, 1);
        assert!(xml.contains(
            r#"<formula sheet="S" row="0" column="1" formula="SUM(A1" error="Unmatched opening parenthesis or bracket" valid="false"/>"#
        ));
    }

    #[test]
    fn named_expression_scopes() {
        let doc = MemoryDocument::builder("names.xlsx")
            .sheet("Sheet1", |_| {})
            .sheet("Sheet2", |s| {
                s.named_expression("Local", "Sheet2!$C$3");
            })
            .named_expression("Global", "Sheet1!$A$1")
            .build()
            .unwrap();
        let xml = render(&doc);
        assert_eq!(xml.matches(r#"scope="global""#).count(), 1);
        assert_eq!(xml.matches(r#"scope="sheet" sheet="Sheet2""#).count(), 1);
        assert!(xml.find(r#"name="Global""#).unwrap() < xml.find(r#"name="Local""#).unwrap());
        assert!(xml.contains(
            r#"<named-expression name="Local" origin="Sheet2!$A$1" formula="Sheet2!$C$3" scope="sheet" sheet="Sheet2">"#
        ));
    }

    #[test]
    fn error_cell_uses_stream_positions() {
        let cell = Cell::with_tokens(
            CellKind::FormulaWithError,
            "ignored",
            vec![
                FormulaToken::error("#ERR-MARKER#"),
                FormulaToken::value("=A1/0"),
                FormulaToken::value("#DIV/0!"),
            ],
        );
        let sheet = MemorySheet::from_cells("Sheet1", [((0, 0), cell)]);
        let doc = MemoryDocument::new("err.xlsx", vec![sheet], Vec::new()).unwrap();
        let xml = render(&doc);
        assert!(xml.contains(
            r##"<formula sheet="Sheet1" row="0" column="0" formula="=A1/0" error="#DIV/0!" valid="false"/>"##
        ));
        assert!(!xml.contains("<token"));
    }

    #[test]
    fn qualified_token_type_renders_lowercase() {
        let kind = TokenKind::from_qualified("FormulaTokenType.Reference").unwrap();
        let cell = Cell::with_tokens(CellKind::Formula, "A1", vec![FormulaToken::new(kind, "A1")]);
        let sheet = MemorySheet::from_cells("Sheet1", [((0, 0), cell)]);
        let doc = MemoryDocument::new("t.xlsx", vec![sheet], Vec::new()).unwrap();
        assert!(render(&doc).contains(r#"<token s="A1" type="reference"/>"#));
    }

    #[test]
    fn attributes_are_escaped() {
        let doc = MemoryDocument::builder(r#"dir/"quoted" & <odd>.xlsx"#)
            .sheet("Tom's", |s| {
                s.formula(0, 0, r#"=IF(A1<>"x",1,2)"#);
            })
            .build()
            .unwrap();
        let xml = render(&doc);
        assert!(xml.starts_with(r#"<doc filepath="dir/&quot;quoted&quot; &amp; &lt;odd&gt;.xlsx">"#));
        assert!(xml.contains(r#"<sheet name="Tom&apos;s"/>"#));
        assert!(xml.contains(r#"formula="IF(A1&lt;&gt;&quot;x&quot;,1,2)""#));
        assert!(xml.contains(r#"<token s="&quot;x&quot;" type="value"/>"#));
    }

    #[test]
    fn short_error_stream_is_rejected() {
        let cell = Cell::with_tokens(
            CellKind::FormulaWithError,
            "A1/0",
            vec![FormulaToken::error("#ERR!"), FormulaToken::value("A1/0")],
        );
        let sheet = MemorySheet::from_cells("Data", [((3, 1), cell)]);
        let doc = MemoryDocument::new("short.xlsx", vec![sheet], Vec::new()).unwrap();
        let err = FormulaExtractor::default().render(&doc).unwrap_err();
        match err {
            ExtractError::MalformedErrorStream { sheet, row, column, len } => {
                assert_eq!((sheet.as_str(), row, column, len), ("Data", 3, 1, 2));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn far_corner_cell_keeps_its_coordinates() {
        let sheet = MemorySheet::from_cells(
            "S",
            [
                ((0, 0), Cell::from_formula("=1")),
                ((1_048_575, 16_383), Cell::from_formula("=A1")),
            ],
        );
        let doc = MemoryDocument::new("wide.xlsx", vec![sheet], Vec::new()).unwrap();
        let (xml, report) = FormulaExtractor::default().render(&doc).unwrap();
        assert_eq!(report.valid_formulas, 2);
        assert!(xml.contains(
            r#"<formula sheet="S" row="0" column="0" formula="1" valid="true"><token s="1" type="value"/></formula>"#
        ));
        assert!(xml.contains(r#"<formula sheet="S" row="1048575" column="16383" formula="A1" valid="true">"#));
    }

    #[test]
    fn report_lists_sheets() {
        let doc = MemoryDocument::builder("log.xlsx")
            .sheet("First", |_| {})
            .sheet("Second", |_| {})
            .build()
            .unwrap();
        let (_, report) = FormulaExtractor::new(CorpusConfig::with_prefix(".")).render(&doc).unwrap();
        assert_eq!(report.log, vec!["* sheet: First", "* sheet: Second"]);
        assert_eq!(report.output, PathBuf::from("log.xlsx.formulas.xml"));
    }

    /// A document whose rows cannot be read.
    struct BrokenDocument {
        path: String,
        sheet: BrokenSheet,
    }

    struct BrokenSheet;

    impl Sheet for BrokenSheet {
        type Error = WorkbookError;

        fn name(&self) -> &str {
            "Broken"
        }

        fn rows(&self) -> Result<Cow<'_, [Row]>, Self::Error> {
            Err(WorkbookError::SheetNotFound("Broken".into()))
        }

        fn named_expressions(&self) -> Result<Cow<'_, [(String, NamedExpression)]>, Self::Error> {
            Ok(Cow::Borrowed(&[]))
        }
    }

    impl Document for BrokenDocument {
        type Error = WorkbookError;
        type Sheet<'a> = &'a BrokenSheet;

        fn path(&self) -> &str {
            &self.path
        }

        fn sheets(&self) -> Result<Vec<Self::Sheet<'_>>, Self::Error> {
            Ok(vec![&self.sheet])
        }

        fn named_expressions(&self) -> Result<Cow<'_, [(String, NamedExpression)]>, Self::Error> {
            Ok(Cow::Borrowed(&[]))
        }
    }

    #[test]
    fn failed_read_removes_partial_sidecar() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("broken.xlsx");
        let doc = BrokenDocument {
            path: source.to_string_lossy().into_owned(),
            sheet: BrokenSheet,
        };
        let extractor = FormulaExtractor::default();
        let err = extractor.extract(&doc).unwrap_err();
        assert!(matches!(err, ExtractError::Source { .. }));
        assert!(!extractor.output_path(&doc).exists());

        let keep = FormulaExtractor::default().with_options(ExtractOptions {
            keep_partial_output: true,
        });
        assert!(keep.extract(&doc).is_err());
        let partial = fs::read_to_string(keep.output_path(&doc)).unwrap();
        assert!(partial.starts_with("<doc filepath="));
        assert!(!partial.ends_with("</doc>"));
    }

    #[test]
    fn missing_directory_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("no-such-dir").join("book.xlsx");
        let doc = MemoryDocument::builder(path.to_string_lossy())
            .sheet("Sheet1", |_| {})
            .build()
            .unwrap();
        let err = extract(&doc, &CorpusConfig::default()).unwrap_err();
        match err {
            ExtractError::Io { path: failed, .. } => {
                assert!(failed.to_string_lossy().ends_with("book.xlsxformulas.xml"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
