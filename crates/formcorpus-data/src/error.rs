use std::io;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DataError {
    #[error("{path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("XML parse error in {path}: {message}")]
    Xml { path: PathBuf, message: String },

    #[error("invalid structure in {path}: {message}")]
    Structure { path: PathBuf, message: String },

    #[error("{path}: sheet name '{sheet}' does not exist in this document")]
    UnknownSheet { path: PathBuf, sheet: String },

    #[error("{path}: unknown token type '{token_type}'")]
    UnknownTokenType { path: PathBuf, token_type: String },

    #[error("invalid token code {0:#06x}")]
    InvalidCode(u16),

    #[error("invalid token store: {0}")]
    InvalidStore(String),

    #[error("cannot build thread pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}
