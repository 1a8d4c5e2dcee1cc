//! Meta crate re-exporting the formcorpus building blocks, plus the
//! `formcorpus` command-line tool.
//!
//! The pipeline runs in three steps: extract one formula sidecar per
//! workbook, collate the sidecars into a numbered flat directory, then count
//! encoded token sequences across the collated files.

pub use formcorpus_common as common;
pub use formcorpus_data as data;
pub use formcorpus_extract as extract;
pub use formcorpus_parse as parse;
pub use formcorpus_workbook as workbook;

pub use formcorpus_data::{FormulaDataProcessor, FormulaTrie, ProcessorOptions, ThreadPolicy};
pub use formcorpus_extract::{CollateOptions, Collator, CorpusConfig, FormulaExtractor, LinkMode};
pub use formcorpus_workbook::{BackendKind, Document, MemoryDocument, open_document};
