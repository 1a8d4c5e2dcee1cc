use crate::error::WorkbookError;
use crate::memory::MemoryDocument;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// Which reader turns a file into a [`MemoryDocument`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum BackendKind {
    /// umya for `.xlsx`/`.xlsm`, calamine for everything else.
    #[default]
    Auto,
    Umya,
    Calamine,
}

impl BackendKind {
    pub fn as_str(self) -> &'static str {
        match self {
            BackendKind::Auto => "auto",
            BackendKind::Umya => "umya",
            BackendKind::Calamine => "calamine",
        }
    }

    /// Resolve `Auto` against the file extension.
    pub fn resolve(self, path: &Path) -> BackendKind {
        if self != BackendKind::Auto {
            return self;
        }
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);
        match ext.as_deref() {
            Some("xlsx") | Some("xlsm") if cfg!(feature = "umya") => BackendKind::Umya,
            _ => BackendKind::Calamine,
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "auto" => Ok(BackendKind::Auto),
            "umya" => Ok(BackendKind::Umya),
            "calamine" => Ok(BackendKind::Calamine),
            other => Err(format!("unknown backend '{other}'")),
        }
    }
}

/// Open and fully materialise a document.
pub fn open_document(
    path: impl AsRef<Path>,
    kind: BackendKind,
) -> Result<MemoryDocument, WorkbookError> {
    let path = path.as_ref();
    let backend = kind.resolve(path);
    let _span = tracing::debug_span!("open_document", path = %path.display(), backend = backend.as_str())
        .entered();
    match backend {
        #[cfg(feature = "umya")]
        BackendKind::Umya => crate::backends::UmyaAdapter::open_path(path)?.into_document(),
        #[cfg(feature = "calamine")]
        BackendKind::Calamine => crate::backends::CalamineAdapter::open_path(path)?.into_document(),
        _ => Err(WorkbookError::UnsupportedFormat(path.to_path_buf())),
    }
}
