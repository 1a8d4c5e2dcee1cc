use formcorpus_testkit::{Fixture, add_name, add_sheets, set_formula, set_number, set_text};
use formcorpus_workbook::{CellKind, Document, Sheet, TokenKind, UmyaAdapter};

#[test]
fn umya_reads_sparse_zero_based_cells() {
    let fx = Fixture::new();
    let path = fx.workbook("cells.xlsx", |book| {
        set_number(book, "Sheet1", (1, 1), 10.0);
        set_text(book, "Sheet1", (2, 1), "label");
        set_formula(book, "Sheet1", (3, 2), "=A1*2");
    });

    let doc = UmyaAdapter::open_path(&path)
        .expect("open")
        .into_document()
        .expect("materialise");
    let sheets = doc.sheets().expect("sheets");
    assert_eq!(sheets.len(), 1);
    assert_eq!(sheets[0].name(), "Sheet1");

    let rows = sheets[0].rows().expect("rows");
    let layout: Vec<(u32, Vec<u32>)> = rows
        .iter()
        .map(|r| (r.index, r.iter().map(|(c, _)| c).collect()))
        .collect();
    assert_eq!(layout, vec![(0, vec![0, 1]), (1, vec![2])]);
    assert_eq!(rows[0].get(0).unwrap().kind, CellKind::Numeric);
    assert_eq!(rows[0].get(1).unwrap().kind, CellKind::String);
    assert!(rows[1].get(0).is_none());

    let formula = rows[1].get(2).expect("formula cell");
    assert_eq!(formula.kind, CellKind::Formula);
    assert_eq!(formula.formula(), "A1*2");
    let kinds: Vec<TokenKind> = formula.formula_tokens().iter().map(|t| t.kind).collect();
    assert_eq!(
        kinds,
        vec![TokenKind::Reference, TokenKind::Operator, TokenKind::Value]
    );
}

#[test]
fn umya_keeps_far_corner_cell_sparse() {
    let fx = Fixture::new();
    let path = fx.workbook("wide.xlsx", |book| {
        set_formula(book, "Sheet1", (1, 1), "=1");
        set_number(book, "Sheet1", (16_384, 1_048_576), 1.0);
    });

    let doc = UmyaAdapter::open_path(&path).unwrap().into_document().unwrap();
    let sheets = doc.sheets().unwrap();
    let rows = sheets[0].rows().unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[1].index, 1_048_575);
    assert_eq!(rows[1].get(16_383).unwrap().kind, CellKind::Numeric);
}

#[test]
fn umya_keeps_sheet_order() {
    let fx = Fixture::new();
    let path = fx.workbook("order.xlsx", |book| {
        add_sheets(book, &["Inputs", "Zeta", "Alpha"]);
    });
    let doc = UmyaAdapter::open_path(&path).unwrap().into_document().unwrap();
    let names: Vec<String> = doc
        .sheets()
        .unwrap()
        .iter()
        .map(|s| s.name().to_string())
        .collect();
    assert_eq!(names, vec!["Sheet1", "Inputs", "Zeta", "Alpha"]);
}

#[test]
fn umya_splits_global_and_sheet_scoped_names() {
    let fx = Fixture::new();
    let path = fx.workbook("names.xlsx", |book| {
        add_sheets(book, &["Sheet2"]);
        add_name(book, "Sheet1", "GlobalName", "Sheet1!$A$1", None);
        add_name(book, "Sheet2", "LocalName", "Sheet2!$B$2", Some(1));
    });

    let doc = UmyaAdapter::open_path(&path).unwrap().into_document().unwrap();
    let globals = doc.named_expressions().unwrap();
    let global_names: Vec<&str> = globals.iter().map(|(n, _)| n.as_str()).collect();
    assert_eq!(global_names, vec!["GlobalName"]);
    assert_eq!(globals[0].1.origin, "Sheet1!$A$1");
    assert_eq!(globals[0].1.formula, "Sheet1!$A$1");
    assert_eq!(globals[0].1.formula_tokens()[0].kind, TokenKind::Reference);

    let sheets = doc.sheets().unwrap();
    assert!(sheets[0].named_expressions().unwrap().is_empty());
    let local = sheets[1].named_expressions().unwrap();
    assert_eq!(local.len(), 1);
    assert_eq!(local[0].0, "LocalName");
    assert_eq!(local[0].1.origin, "Sheet2!$A$1");
}

#[test]
fn umya_open_rejects_garbage() {
    let fx = Fixture::new();
    let path = fx.file("broken.xlsx", b"not a zip archive");
    assert!(UmyaAdapter::open_path(&path).is_err());
}
