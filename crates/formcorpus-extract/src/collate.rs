//! Corpus collation: gather every sidecar under a root into one flat,
//! sequentially numbered directory (`0001.xml`, `0002.xml`, …).

use crate::config::CorpusConfig;
use crate::error::CollateError;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use walkdir::WalkDir;

/// How a sidecar is materialised in the output directory.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum LinkMode {
    HardLink,
    Copy,
    /// Hard link, falling back to a copy across filesystems or where links are unsupported.
    #[default]
    Auto,
}

impl LinkMode {
    pub fn as_str(self) -> &'static str {
        match self {
            LinkMode::HardLink => "hard-link",
            LinkMode::Copy => "copy",
            LinkMode::Auto => "auto",
        }
    }
}

impl fmt::Display for LinkMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LinkMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "hard-link" | "hardlink" => Ok(LinkMode::HardLink),
            "copy" => Ok(LinkMode::Copy),
            "auto" => Ok(LinkMode::Auto),
            other => Err(format!("unknown link mode '{other}'")),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CollateOptions {
    pub link_mode: LinkMode,
    /// Skip files that cannot be materialised instead of aborting. Skipped
    /// files do not consume an index.
    pub best_effort: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Materialised {
    Linked,
    Copied,
    /// The destination already held identical bytes.
    Unchanged,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CollatedFile {
    pub source: PathBuf,
    pub destination: PathBuf,
    pub how: Materialised,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SkippedFile {
    pub source: PathBuf,
    pub reason: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CollateReport {
    /// Materialised files in index order.
    pub files: Vec<CollatedFile>,
    pub skipped: Vec<SkippedFile>,
}

impl CollateReport {
    /// Number of files present in the output, idempotent re-links included.
    pub fn count(&self) -> usize {
        self.files.len()
    }

    pub fn count_by(&self, how: Materialised) -> usize {
        self.files.iter().filter(|f| f.how == how).count()
    }
}

/// Output file name for a 1-based index.
pub fn numbered_name(index: usize) -> String {
    format!("{index:04}.xml")
}

fn io_err(path: &Path) -> impl FnOnce(io::Error) -> CollateError + '_ {
    move |source| CollateError::Io {
        path: path.to_path_buf(),
        source,
    }
}

fn same_content(a: &Path, b: &Path) -> Result<bool, CollateError> {
    let left = fs::read(a).map_err(io_err(a))?;
    let right = fs::read(b).map_err(io_err(b))?;
    Ok(left == right)
}

fn can_fall_back(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::CrossesDevices | io::ErrorKind::Unsupported
    )
}

#[derive(Clone, Debug, Default)]
pub struct Collator {
    config: CorpusConfig,
    options: CollateOptions,
}

impl Collator {
    pub fn new(config: CorpusConfig) -> Self {
        Self {
            config,
            options: CollateOptions::default(),
        }
    }

    pub fn with_options(mut self, options: CollateOptions) -> Self {
        self.options = options;
        self
    }

    /// Place `source` at `destination`.
    ///
    /// An existing destination with identical bytes is left alone; any other
    /// existing destination is [`CollateError::AlreadyExists`].
    pub fn materialise(&self, source: &Path, destination: &Path) -> Result<Materialised, CollateError> {
        if fs::symlink_metadata(destination).is_ok() {
            return if same_content(source, destination)? {
                Ok(Materialised::Unchanged)
            } else {
                Err(CollateError::AlreadyExists {
                    path: destination.to_path_buf(),
                })
            };
        }

        match self.options.link_mode {
            LinkMode::HardLink => {
                fs::hard_link(source, destination).map_err(io_err(destination))?;
                Ok(Materialised::Linked)
            }
            LinkMode::Copy => {
                fs::copy(source, destination).map_err(io_err(destination))?;
                Ok(Materialised::Copied)
            }
            LinkMode::Auto => match fs::hard_link(source, destination) {
                Ok(()) => Ok(Materialised::Linked),
                Err(e) if can_fall_back(&e) => {
                    tracing::debug!(source = %source.display(), error = %e, "hard link unavailable, copying");
                    fs::copy(source, destination).map_err(io_err(destination))?;
                    Ok(Materialised::Copied)
                }
                Err(e) => Err(io_err(destination)(e)),
            },
        }
    }

    /// Walk `root` in file-name order and materialise every sidecar into
    /// `output` as `<index>.xml`. `output` is created if missing and is not
    /// descended into when it lies under `root`.
    pub fn collate(&self, root: impl AsRef<Path>, output: impl AsRef<Path>) -> Result<CollateReport, CollateError> {
        let root = root.as_ref();
        let output = output.as_ref();
        let _span = tracing::info_span!("collate", root = %root.display(), output = %output.display()).entered();

        fs::create_dir_all(output).map_err(io_err(output))?;
        let output_canonical = fs::canonicalize(output).map_err(io_err(output))?;
        let suffix = self.config.sidecar_suffix();

        let walker = WalkDir::new(root)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| {
                !(entry.file_type().is_dir()
                    && entry.depth() > 0
                    && fs::canonicalize(entry.path()).is_ok_and(|p| p == output_canonical))
            });

        let mut report = CollateReport::default();
        for entry in walker {
            let entry = entry.map_err(|source| CollateError::Walk {
                root: root.to_path_buf(),
                source,
            })?;
            if !entry.file_type().is_file() {
                continue;
            }
            if !entry.file_name().to_string_lossy().ends_with(&suffix) {
                continue;
            }

            let source = entry.path();
            let destination = output.join(numbered_name(report.count() + 1));
            match self.materialise(source, &destination) {
                Ok(how) => {
                    tracing::debug!(source = %source.display(), destination = %destination.display(), ?how, "collated");
                    report.files.push(CollatedFile {
                        source: source.to_path_buf(),
                        destination,
                        how,
                    });
                }
                Err(err) if self.options.best_effort => {
                    tracing::warn!(source = %source.display(), error = %err, "skipping");
                    report.skipped.push(SkippedFile {
                        source: source.to_path_buf(),
                        reason: err.to_string(),
                    });
                }
                Err(err) => return Err(err),
            }
        }

        tracing::info!(
            count = report.count(),
            skipped = report.skipped.len(),
            "collation finished"
        );
        Ok(report)
    }
}

/// Collate with default options and return the number of files materialised.
pub fn collate(
    root: impl AsRef<Path>,
    output: impl AsRef<Path>,
    config: &CorpusConfig,
) -> Result<usize, CollateError> {
    Collator::new(config.clone())
        .collate(root, output)
        .map(|report| report.count())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(root: &Path, relative: &str, contents: &str) -> PathBuf {
        let path = root.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, contents).unwrap();
        path
    }

    /// Three sidecars in nested directories and a few unrelated files.
    fn corpus() -> TempDir {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        write(root, "b/book.xlsxformulas.xml", "<doc b/>");
        write(root, "a/deep/one.xlsxformulas.xml", "<doc a/>");
        write(root, "a/deep/one.xlsx", "binary");
        write(root, "c.odsformulas.xml", "<doc c/>");
        write(root, "notes.txt", "ignore");
        write(root, "formulas.xml.bak", "ignore");
        dir
    }

    #[test]
    fn numbers_sidecars_in_sorted_order() {
        let dir = corpus();
        let out = tempfile::tempdir().unwrap();
        let count = collate(dir.path(), out.path(), &CorpusConfig::default()).unwrap();
        assert_eq!(count, 3);

        let mut names: Vec<String> = fs::read_dir(out.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        assert_eq!(names, vec!["0001.xml", "0002.xml", "0003.xml"]);

        let read = |n: &str| fs::read_to_string(out.path().join(n)).unwrap();
        assert_eq!(read("0001.xml"), "<doc a/>");
        assert_eq!(read("0002.xml"), "<doc b/>");
        assert_eq!(read("0003.xml"), "<doc c/>");
    }

    #[test]
    fn rerun_with_same_inputs_is_idempotent() {
        let dir = corpus();
        let out = tempfile::tempdir().unwrap();
        let collator = Collator::default();
        collator.collate(dir.path(), out.path()).unwrap();
        let again = collator.collate(dir.path(), out.path()).unwrap();
        assert_eq!(again.count(), 3);
        assert_eq!(again.count_by(Materialised::Unchanged), 3);
    }

    #[test]
    fn conflicting_destination_fails() {
        let dir = corpus();
        let out = tempfile::tempdir().unwrap();
        fs::write(out.path().join("0002.xml"), "something else").unwrap();
        let err = Collator::default().collate(dir.path(), out.path()).unwrap_err();
        match err {
            CollateError::AlreadyExists { path } => assert!(path.ends_with("0002.xml")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn best_effort_skips_without_consuming_index() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "1.xlsxformulas.xml", "first");
        write(dir.path(), "2.xlsxformulas.xml", "second");
        let out = tempfile::tempdir().unwrap();
        fs::write(out.path().join("0001.xml"), "second").unwrap();

        let report = Collator::default()
            .with_options(CollateOptions {
                best_effort: true,
                ..CollateOptions::default()
            })
            .collate(dir.path(), out.path())
            .unwrap();
        assert_eq!(report.count(), 1);
        assert_eq!(report.skipped.len(), 1);
        assert!(report.skipped[0].source.ends_with("1.xlsxformulas.xml"));
        assert!(report.files[0].source.ends_with("2.xlsxformulas.xml"));
        assert_eq!(report.files[0].how, Materialised::Unchanged);
    }

    #[test]
    fn prefix_selects_sidecars() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "a.xlsx.skip.formulas.xml", "a");
        write(dir.path(), "b.xlsxformulas.xml", "b");
        let out = tempfile::tempdir().unwrap();
        let count = collate(dir.path(), out.path(), &CorpusConfig::with_prefix(".skip.")).unwrap();
        assert_eq!(count, 1);
        assert_eq!(fs::read_to_string(out.path().join("0001.xml")).unwrap(), "a");
    }

    #[test]
    fn output_under_root_is_created_and_not_walked() {
        let dir = corpus();
        let out = dir.path().join("corpus").join("flat");
        // A sidecar inside the output directory must not be collated into itself.
        write(dir.path(), "corpus/flat/stale.xlsxformulas.xml", "stale");
        let count = collate(dir.path(), &out, &CorpusConfig::default()).unwrap();
        assert_eq!(count, 3);
        assert!(out.join("0003.xml").exists());
        assert!(!out.join("0004.xml").exists());
    }

    #[test]
    fn copy_mode_copies() {
        let dir = corpus();
        let out = tempfile::tempdir().unwrap();
        let report = Collator::default()
            .with_options(CollateOptions {
                link_mode: LinkMode::Copy,
                ..CollateOptions::default()
            })
            .collate(dir.path(), out.path())
            .unwrap();
        assert_eq!(report.count_by(Materialised::Copied), 3);
    }

    #[cfg(unix)]
    #[test]
    fn hard_link_shares_the_inode() {
        use std::os::unix::fs::MetadataExt;

        let dir = corpus();
        let out = tempfile::tempdir_in(dir.path()).unwrap();
        let report = Collator::default()
            .with_options(CollateOptions {
                link_mode: LinkMode::HardLink,
                ..CollateOptions::default()
            })
            .collate(dir.path(), out.path())
            .unwrap();
        let first = &report.files[0];
        assert_eq!(first.how, Materialised::Linked);
        let src = fs::metadata(&first.source).unwrap();
        let dst = fs::metadata(&first.destination).unwrap();
        assert_eq!(src.ino(), dst.ino());
    }

    #[test]
    fn index_widens_past_four_digits() {
        assert_eq!(numbered_name(1), "0001.xml");
        assert_eq!(numbered_name(9999), "9999.xml");
        assert_eq!(numbered_name(10000), "10000.xml");
    }

    #[test]
    fn link_mode_parses() {
        assert_eq!("hard-link".parse::<LinkMode>(), Ok(LinkMode::HardLink));
        assert_eq!(LinkMode::default(), LinkMode::Auto);
        assert!("symlink".parse::<LinkMode>().is_err());
    }
}
