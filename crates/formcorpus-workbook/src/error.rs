use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum WorkbookError {
    #[error("failed to open {path}: {message}")]
    Open { path: PathBuf, message: String },

    #[error("{backend} backend failed reading {path}: {message}")]
    Backend {
        backend: &'static str,
        path: PathBuf,
        message: String,
    },

    #[error("sheet not found: {0}")]
    SheetNotFound(String),

    #[error("duplicate sheet name: {0}")]
    DuplicateSheet(String),

    #[error("no backend available for {0}")]
    UnsupportedFormat(PathBuf),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
