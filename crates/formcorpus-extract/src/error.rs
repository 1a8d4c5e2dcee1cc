use std::io;
use std::path::PathBuf;
use thiserror::Error;

type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("cannot write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed reading document {path}: {source}")]
    Source {
        path: String,
        #[source]
        source: BoxError,
    },

    #[error(
        "malformed error-cell token stream at sheet '{sheet}' row {row} column {column}: \
         expected at least 3 tokens, found {len}"
    )]
    MalformedErrorStream {
        sheet: String,
        row: u32,
        column: u32,
        len: usize,
    },
}

impl ExtractError {
    pub(crate) fn source_error<E>(path: &str, err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        ExtractError::Source {
            path: path.to_string(),
            source: Box::new(err),
        }
    }
}

#[derive(Debug, Error)]
pub enum CollateError {
    #[error("{path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("walking {root}: {source}")]
    Walk {
        root: PathBuf,
        #[source]
        source: walkdir::Error,
    },

    #[error("{path} already exists with different content")]
    AlreadyExists { path: PathBuf },
}
