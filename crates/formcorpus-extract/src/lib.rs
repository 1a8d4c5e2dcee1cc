pub mod collate;
pub mod config;
pub mod error;
pub mod escape;
pub mod extract;

pub use collate::{
    CollateOptions, CollateReport, CollatedFile, Collator, LinkMode, Materialised, SkippedFile,
    collate, numbered_name,
};
pub use config::CorpusConfig;
pub use error::{CollateError, ExtractError};
pub use escape::escape_attr;
pub use extract::{ExtractOptions, ExtractReport, FormulaExtractor, extract};
