use std::path::{Path, PathBuf};

/// Base name every sidecar ends with, after the configurable prefix.
pub const SIDECAR_BASENAME: &str = "formulas.xml";

/// Filename configuration shared by the extractor and the collator.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CorpusConfig {
    /// Inserted between the source path and `formulas.xml`. Empty is valid.
    pub filename_prefix: String,
}

impl CorpusConfig {
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            filename_prefix: prefix.into(),
        }
    }

    /// `<prefix>formulas.xml`
    pub fn sidecar_suffix(&self) -> String {
        format!("{}{SIDECAR_BASENAME}", self.filename_prefix)
    }

    /// Sidecar path for a source document: the suffix appended to the full
    /// source path, extension included.
    pub fn sidecar_path(&self, source: impl AsRef<Path>) -> PathBuf {
        let mut os = source.as_ref().as_os_str().to_owned();
        os.push(self.sidecar_suffix());
        PathBuf::from(os)
    }

    /// Whether `file_name` is a sidecar under this configuration.
    pub fn is_sidecar(&self, file_name: &str) -> bool {
        file_name.ends_with(&self.sidecar_suffix())
    }
}
