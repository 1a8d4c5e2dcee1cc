use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use formcorpus::data::{FileOutcome, TOKENS_FILENAME, dump, load_file};
use formcorpus::extract::ExtractOptions;
use formcorpus::{
    BackendKind, CollateOptions, Collator, CorpusConfig, FormulaDataProcessor, FormulaExtractor,
    LinkMode, ProcessorOptions, ThreadPolicy, open_document,
};
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "formcorpus",
    version,
    about = "Build formula corpora from spreadsheet documents"
)]
struct Cli {
    /// Log at debug level and print per-file formula reports.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Write a `<file><prefix>formulas.xml` sidecar next to each document.
    Extract(ExtractArgs),
    /// Link every sidecar under a directory tree into `0001.xml`, `0002.xml`, ...
    Collate(CollateArgs),
    /// Count encoded formula token sequences across sidecars.
    BuildTrie(BuildTrieArgs),
    /// Print the entries of a token store.
    DumpTrie(DumpTrieArgs),
}

#[derive(Args, Debug)]
struct PrefixArg {
    /// Text inserted between the document path and `formulas.xml`.
    #[arg(long, env = "FORMCORPUS_PREFIX", default_value = "")]
    prefix: String,
}

#[derive(Args, Debug)]
struct ExtractArgs {
    #[command(flatten)]
    prefix: PrefixArg,

    /// Reader used to open documents.
    #[arg(long, default_value_t = BackendKind::Auto)]
    backend: BackendKind,

    /// Leave a partially written sidecar behind when extraction fails.
    #[arg(long)]
    keep_partial: bool,

    #[arg(required = true)]
    files: Vec<PathBuf>,
}

#[derive(Args, Debug)]
struct CollateArgs {
    /// Directory receiving the numbered files.
    #[arg(short, long)]
    output: PathBuf,

    #[command(flatten)]
    prefix: PrefixArg,

    #[arg(long, default_value_t = LinkMode::Auto)]
    link_mode: LinkMode,

    /// Skip files that cannot be linked or copied instead of stopping.
    #[arg(long)]
    best_effort: bool,

    root: PathBuf,
}

#[derive(Args, Debug)]
struct BuildTrieArgs {
    /// Directory receiving the token store.
    #[arg(short, long)]
    output: PathBuf,

    /// Worker threads for split loading (defaults to the CPU count).
    #[arg(long, conflicts_with_all = ["sequential", "queued"])]
    threads: Option<usize>,

    /// Parse every file on the main thread.
    #[arg(long, conflicts_with = "queued")]
    sequential: bool,

    /// Parse files concurrently through a bounded queue, merging in input order.
    #[arg(long)]
    queued: bool,

    #[arg(required = true)]
    files: Vec<PathBuf>,
}

#[derive(Args, Debug)]
struct DumpTrieArgs {
    /// Write the entries here instead of stdout.
    #[arg(short, long)]
    output: Option<PathBuf>,

    store: PathBuf,
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = if verbose {
        EnvFilter::new(default)
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

fn run_extract(args: ExtractArgs) -> Result<()> {
    let extractor = FormulaExtractor::new(CorpusConfig::with_prefix(args.prefix.prefix))
        .with_options(ExtractOptions {
            keep_partial_output: args.keep_partial,
        });
    let mut stdout = io::stdout().lock();
    for path in &args.files {
        let doc = open_document(path, args.backend)
            .with_context(|| format!("cannot open {}", path.display()))?;
        let report = extractor
            .extract(&doc)
            .with_context(|| format!("cannot extract formulas from {}", path.display()))?;
        tracing::info!(
            source = %path.display(),
            sheets = report.sheets,
            named_expressions = report.named_expressions,
            valid = report.valid_formulas,
            errors = report.error_formulas,
            "extracted"
        );
        writeln!(stdout, "{}", report.output.display())?;
        for line in &report.log {
            writeln!(stdout, "{line}")?;
        }
    }
    Ok(())
}

fn run_collate(args: CollateArgs) -> Result<()> {
    let collator = Collator::new(CorpusConfig::with_prefix(args.prefix.prefix)).with_options(
        CollateOptions {
            link_mode: args.link_mode,
            best_effort: args.best_effort,
        },
    );
    let report = collator.collate(&args.root, &args.output).with_context(|| {
        format!(
            "cannot collate {} into {}",
            args.root.display(),
            args.output.display()
        )
    })?;
    for skipped in &report.skipped {
        eprintln!("skipped {}: {}", skipped.source.display(), skipped.reason);
    }
    println!("{}", report.count());
    Ok(())
}

fn run_build_trie(args: BuildTrieArgs, verbose: bool) -> Result<()> {
    if args.threads == Some(0) {
        bail!("--threads must be at least 1");
    }
    let thread_policy = if args.sequential {
        ThreadPolicy::Disabled
    } else if args.queued {
        ThreadPolicy::LinearAsync
    } else {
        ThreadPolicy::SplitLoad {
            threads: args.threads,
        }
    };
    let processor = FormulaDataProcessor::new(
        &args.output,
        ProcessorOptions {
            verbose,
            thread_policy,
        },
    );
    let report = processor
        .parse_files(&args.files)
        .context("cannot parse formula data")?;

    let mut failed = 0;
    for outcome in &report.files {
        if let FileOutcome::Failed { path, error } = outcome {
            eprintln!("failed {}: {error}", path.display());
            failed += 1;
        }
    }
    if failed == report.files.len() {
        bail!("none of the {failed} input files could be parsed");
    }

    let path = processor
        .write_files(&report.trie)
        .with_context(|| format!("cannot write {TOKENS_FILENAME}"))?;
    println!(
        "{}: {} entries from {} files ({failed} failed)",
        path.display(),
        report.trie.len(),
        report.files.len()
    );
    Ok(())
}

fn run_dump_trie(args: DumpTrieArgs) -> Result<()> {
    let trie = load_file(&args.store)
        .with_context(|| format!("cannot load {}", args.store.display()))?;
    println!("number of entries: {}", trie.len());
    match &args.output {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("cannot create {}", path.display()))?;
            dump(&trie, BufWriter::new(file))
                .with_context(|| format!("cannot write {}", path.display()))?;
        }
        None => dump(&trie, io::stdout().lock()).context("cannot write to stdout")?,
    }
    Ok(())
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Extract(args) => run_extract(args),
        Command::Collate(args) => run_collate(args),
        Command::BuildTrie(args) => run_build_trie(args, cli.verbose),
        Command::DumpTrie(args) => run_dump_trie(args),
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}
