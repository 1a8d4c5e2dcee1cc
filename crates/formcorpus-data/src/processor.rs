use crate::error::DataError;
use crate::reader::{FileReport, FormulaXmlReader};
use crate::store::save_file;
use crate::trie::FormulaTrie;
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::thread;

/// Name of the token store written into the output directory.
pub const TOKENS_FILENAME: &str = "formula-tokens.bin";

/// Files in flight at once under [`ThreadPolicy::LinearAsync`].
pub const QUEUE_DEPTH: usize = 32;

/// How input files are spread over threads.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ThreadPolicy {
    /// Parse every file on the calling thread.
    Disabled,
    /// A dispatcher thread starts one parse per file and queues up to
    /// [`QUEUE_DEPTH`] of them ahead of the calling thread, which merges the
    /// results in input order.
    LinearAsync,
    /// Split the file list into one contiguous chunk per worker and merge
    /// the per-chunk tries. `None` uses the number of available CPUs.
    SplitLoad { threads: Option<usize> },
}

impl Default for ThreadPolicy {
    fn default() -> Self {
        ThreadPolicy::SplitLoad { threads: None }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ProcessorOptions {
    /// Log every per-file report at info level instead of debug.
    pub verbose: bool,
    pub thread_policy: ThreadPolicy,
}

#[derive(Debug)]
pub enum FileOutcome {
    Parsed(FileReport),
    /// The file contributes nothing to the merged trie.
    Failed { path: PathBuf, error: DataError },
}

impl FileOutcome {
    pub fn is_failed(&self) -> bool {
        matches!(self, FileOutcome::Failed { .. })
    }
}

/// Merged result of a run, with one outcome per input in input order.
#[derive(Debug, Default)]
pub struct ProcessorReport {
    pub trie: FormulaTrie,
    pub files: Vec<FileOutcome>,
}

impl ProcessorReport {
    pub fn failed(&self) -> impl Iterator<Item = (&Path, &DataError)> {
        self.files.iter().filter_map(|outcome| match outcome {
            FileOutcome::Failed { path, error } => Some((path.as_path(), error)),
            FileOutcome::Parsed(_) => None,
        })
    }
}

/// Builds one [`FormulaTrie`] out of many sidecars.
#[derive(Clone, Debug)]
pub struct FormulaDataProcessor {
    outdir: PathBuf,
    options: ProcessorOptions,
    reader: FormulaXmlReader,
}

impl FormulaDataProcessor {
    pub fn new(outdir: impl Into<PathBuf>, options: ProcessorOptions) -> Self {
        Self {
            outdir: outdir.into(),
            options,
            reader: FormulaXmlReader::new(),
        }
    }

    pub fn outdir(&self) -> &Path {
        &self.outdir
    }

    pub fn tokens_path(&self) -> PathBuf {
        self.outdir.join(TOKENS_FILENAME)
    }

    fn parse_one(&self, path: &Path) -> (FormulaTrie, FileOutcome) {
        match self.reader.read_file(path) {
            Ok(mut report) => {
                if self.options.verbose {
                    tracing::info!("parsed {}\n{report}", path.display());
                } else {
                    tracing::debug!(path = %path.display(), entries = report.trie.len(), "parsed");
                }
                let trie = std::mem::take(&mut report.trie);
                (trie, FileOutcome::Parsed(report))
            }
            Err(error) => {
                tracing::warn!(path = %path.display(), %error, "failed to parse formula data");
                (
                    FormulaTrie::new(),
                    FileOutcome::Failed {
                        path: path.to_path_buf(),
                        error,
                    },
                )
            }
        }
    }

    fn parse_chunk(&self, paths: &[PathBuf]) -> ProcessorReport {
        let mut report = ProcessorReport::default();
        for path in paths {
            let (trie, outcome) = self.parse_one(path);
            report.trie.merge(trie);
            report.files.push(outcome);
        }
        report
    }

    fn parse_queued(&self, paths: &[PathBuf]) -> ProcessorReport {
        let (queue, pending) =
            mpsc::sync_channel::<mpsc::Receiver<(FormulaTrie, FileOutcome)>>(QUEUE_DEPTH);
        let mut report = ProcessorReport::default();
        thread::scope(|scope| {
            scope.spawn(move || {
                for path in paths {
                    let (done, result) = mpsc::sync_channel(1);
                    scope.spawn(move || {
                        // the receiver only goes away if the merge loop panicked
                        let _ = done.send(self.parse_one(path));
                    });
                    if queue.send(result).is_err() {
                        break;
                    }
                }
            });
            for result in pending {
                // a worker that panicked is re-raised when the scope joins
                let Ok((trie, outcome)) = result.recv() else {
                    continue;
                };
                report.trie.merge(trie);
                report.files.push(outcome);
            }
        });
        report
    }

    /// Parse `paths` into a merged trie.
    ///
    /// Per-file failures are recorded in the report. Only a thread pool that
    /// cannot be built is an error. The tries in [`FileOutcome::Parsed`] are
    /// left empty once merged.
    pub fn parse_files(&self, paths: &[PathBuf]) -> Result<ProcessorReport, DataError> {
        let _span = tracing::info_span!("formula_data", files = paths.len()).entered();

        let threads = match self.options.thread_policy {
            ThreadPolicy::Disabled => return Ok(self.parse_chunk(paths)),
            ThreadPolicy::LinearAsync => return Ok(self.parse_queued(paths)),
            ThreadPolicy::SplitLoad { threads } => threads
                .filter(|&n| n > 0)
                .unwrap_or_else(rayon::current_num_threads),
        };
        if threads <= 1 || paths.len() <= 1 {
            return Ok(self.parse_chunk(paths));
        }

        let chunk_size = paths.len().div_ceil(threads);
        tracing::debug!(threads, chunk_size, "splitting load");
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build()?;
        let chunks: Vec<ProcessorReport> =
            pool.install(|| paths.par_chunks(chunk_size).map(|c| self.parse_chunk(c)).collect());

        let mut merged = ProcessorReport::default();
        for chunk in chunks {
            merged.trie.merge(chunk.trie);
            merged.files.extend(chunk.files);
        }
        Ok(merged)
    }

    /// Write [`TOKENS_FILENAME`] into the output directory, creating it if needed.
    pub fn write_files(&self, trie: &FormulaTrie) -> Result<PathBuf, DataError> {
        std::fs::create_dir_all(&self.outdir).map_err(|source| DataError::Io {
            path: self.outdir.clone(),
            source,
        })?;
        let path = self.tokens_path();
        save_file(trie, &path)?;
        tracing::info!(path = %path.display(), entries = trie.len(), "token store written");
        Ok(path)
    }

    pub fn run(&self, paths: &[PathBuf]) -> Result<ProcessorReport, DataError> {
        let report = self.parse_files(paths)?;
        self.write_files(&report.trie)?;
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::load_file;
    use std::fs;

    fn sidecar(refs: usize) -> String {
        let mut formulas = String::new();
        for i in 0..refs {
            formulas.push_str(&format!(
                r#"<formula sheet="S" row="{i}" column="0" formula="A1" valid="true"><token s="A1" type="reference"/></formula>"#
            ));
        }
        format!(
            r#"<doc filepath="x.xlsx"><sheets count="1"><sheet name="S"/></sheets><named-expressions/><formulas>{formulas}</formulas></doc>"#
        )
    }

    fn inputs(dir: &Path) -> Vec<PathBuf> {
        let mut paths = Vec::new();
        for i in 0..7 {
            let path = dir.join(format!("{i:04}.xml"));
            fs::write(&path, sidecar(i + 1)).unwrap();
            paths.push(path);
        }
        let broken = dir.join("broken.xml");
        fs::write(&broken, "<doc><sheets>").unwrap();
        paths.insert(3, broken);
        paths
    }

    #[test]
    fn all_thread_policies_agree() {
        let dir = tempfile::tempdir().unwrap();
        let paths = inputs(dir.path());

        let run = |policy| {
            let options = ProcessorOptions {
                verbose: false,
                thread_policy: policy,
            };
            FormulaDataProcessor::new(dir.path().join("out"), options)
                .parse_files(&paths)
                .unwrap()
        };
        let sequential = run(ThreadPolicy::Disabled);
        let split = run(ThreadPolicy::SplitLoad { threads: Some(3) });
        let queued = run(ThreadPolicy::LinearAsync);

        assert_eq!(sequential.trie.get(&[4]), Some(28));
        assert_eq!(sequential.trie, split.trie);
        assert_eq!(sequential.trie, queued.trie);
        let order = |report: &ProcessorReport| -> Vec<bool> {
            report.files.iter().map(FileOutcome::is_failed).collect()
        };
        assert_eq!(order(&queued), order(&sequential));
        assert_eq!(split.files.len(), paths.len());
        assert!(split.files[3].is_failed());
        let failed: Vec<_> = split.failed().map(|(p, _)| p.to_path_buf()).collect();
        assert_eq!(failed, vec![dir.path().join("broken.xml")]);
    }

    #[test]
    fn queued_parsing_keeps_input_order_past_the_queue_depth() {
        let dir = tempfile::tempdir().unwrap();
        let mut paths = Vec::new();
        for i in 0..QUEUE_DEPTH * 2 + 3 {
            let path = dir.path().join(format!("{i:04}.xml"));
            fs::write(&path, sidecar(i % 4 + 1)).unwrap();
            paths.push(path);
        }
        let options = ProcessorOptions {
            verbose: false,
            thread_policy: ThreadPolicy::LinearAsync,
        };
        let report = FormulaDataProcessor::new(dir.path().join("out"), options)
            .parse_files(&paths)
            .unwrap();

        assert_eq!(report.files.len(), paths.len());
        let valid: Vec<u32> = report
            .files
            .iter()
            .map(|outcome| match outcome {
                FileOutcome::Parsed(file) => file.valid_formulas,
                FileOutcome::Failed { path, error } => panic!("{}: {error}", path.display()),
            })
            .collect();
        let expected: Vec<u32> = (0..paths.len()).map(|i| (i % 4 + 1) as u32).collect();
        assert_eq!(valid, expected);
        assert_eq!(report.trie.get(&[4]), Some(expected.iter().sum()));
    }

    #[test]
    fn queued_parsing_of_nothing_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let options = ProcessorOptions {
            verbose: false,
            thread_policy: ThreadPolicy::LinearAsync,
        };
        let report = FormulaDataProcessor::new(dir.path(), options)
            .parse_files(&[])
            .unwrap();
        assert!(report.files.is_empty());
        assert!(report.trie.is_empty());
    }

    #[test]
    fn missing_file_is_reported_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let processor = FormulaDataProcessor::new(dir.path(), ProcessorOptions::default());
        let report = processor
            .parse_files(&[dir.path().join("absent.xml")])
            .unwrap();
        assert!(report.trie.is_empty());
        assert!(matches!(
            &report.files[0],
            FileOutcome::Failed { error: DataError::Io { .. }, .. }
        ));
    }

    #[test]
    fn run_writes_the_token_store() {
        let dir = tempfile::tempdir().unwrap();
        let paths = inputs(dir.path());
        let outdir = dir.path().join("nested/out");
        let processor = FormulaDataProcessor::new(&outdir, ProcessorOptions::default());
        let report = processor.run(&paths).unwrap();

        let stored = load_file(outdir.join(TOKENS_FILENAME)).unwrap();
        assert_eq!(stored, report.trie);
        assert_eq!(processor.tokens_path(), outdir.join("formula-tokens.bin"));
    }
}
