use clap::{Args, Parser, Subcommand};
use searchbench_common::{Autocompleter, BenchError, IndexOptions, SearchIndex};
use searchbench_runner::backend::{Backend, Engine};
use searchbench_runner::config::{BenchConfig, CommonArgs};
use searchbench_runner::ingest::{
    ingest_documents, spawn_file_reader, spawn_generator, DocumentGenerator, IngestStats,
    DEFAULT_CHUNK_SIZE,
};
use searchbench_runner::operation::{Operation, SearchOperation, SuggestOperation};
use searchbench_runner::queries::{build_prefixes, default_title, load_query_pool, parse_query_list};
use searchbench_runner::report::{append_record, print_report, BenchmarkRecord, OutputSink};
use searchbench_runner::runner::{self, RunConfig, RunError, RunSummary};
use std::io::Write;
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "searchbench", about = "Search and autocomplete benchmark driver")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Benchmark full-text queries
    Search(SearchArgs),
    /// Benchmark autocomplete lookups
    Suggest(SuggestArgs),
    /// Load documents from a file into a fresh index
    Ingest(IngestArgs),
    /// Load randomly generated documents into a fresh index
    Synth(SynthArgs),
}

#[derive(Args)]
struct QuerySource {
    /// Comma-separated list of queries
    #[arg(long, default_value = "hello world")]
    queries: String,

    /// File with one query per line; overrides --queries
    #[arg(long)]
    query_file: Option<PathBuf>,
}

#[derive(Args)]
struct PreloadArgs {
    /// Load this many synthetic documents before the benchmark starts
    #[arg(long)]
    preload: Option<u64>,

    /// Vocabulary size for preloaded documents
    #[arg(long, default_value_t = 1000)]
    preload_vocabulary: usize,
}

#[derive(Args)]
struct SearchArgs {
    #[command(flatten)]
    common: CommonArgs,
    #[command(flatten)]
    source: QuerySource,
    #[command(flatten)]
    preload: PreloadArgs,

    /// Title recorded in the CSV (default: "search: <source> <pool size>")
    #[arg(long)]
    title: Option<String>,
}

#[derive(Args)]
struct SuggestArgs {
    #[command(flatten)]
    common: CommonArgs,
    #[command(flatten)]
    source: QuerySource,
    #[command(flatten)]
    preload: PreloadArgs,

    /// Allow one edit of distance in the prefix
    #[arg(long)]
    fuzzy: bool,

    /// Leading characters of each query term used as a prefix
    #[arg(long, default_value_t = 3)]
    prefix_len: usize,
}

#[derive(Args)]
struct IngestArgs {
    #[command(flatten)]
    common: CommonArgs,

    /// Input file: one JSON document or plain-text body per line
    #[arg(long)]
    file: PathBuf,

    /// Documents per bulk request
    #[arg(long, default_value_t = DEFAULT_CHUNK_SIZE)]
    chunk_size: usize,
}

#[derive(Args)]
struct SynthArgs {
    #[command(flatten)]
    common: CommonArgs,

    /// Number of documents to generate
    #[arg(long, default_value_t = 10_000)]
    count: u64,

    /// Generate terms term0..term{N-1}
    #[arg(long, default_value_t = 1000)]
    vocabulary: usize,

    /// Documents per bulk request
    #[arg(long, default_value_t = DEFAULT_CHUNK_SIZE)]
    chunk_size: usize,
}

#[derive(Debug, Error)]
enum CliError {
    #[error("{0}")]
    Config(String),

    #[error(transparent)]
    Run(#[from] RunError),

    #[error("backend error: {0}")]
    Backend(#[from] BenchError),

    #[error("cannot write results to {path}: {source}")]
    Sink {
        path: String,
        source: std::io::Error,
    },
}

impl CliError {
    fn exit_code(&self) -> i32 {
        match self {
            CliError::Config(_) | CliError::Run(RunError::Config(_)) => 2,
            CliError::Backend(BenchError::Config(_) | BenchError::InvalidQuery(_)) => 2,
            CliError::Run(_) | CliError::Backend(_) => 1,
            CliError::Sink { .. } => 3,
        }
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let result = match cli.command {
        Command::Search(args) => search(args).await,
        Command::Suggest(args) => suggest(args).await,
        Command::Ingest(args) => ingest(args).await,
        Command::Synth(args) => synth(args).await,
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        process::exit(e.exit_code());
    }
}

impl QuerySource {
    /// The query pool and a label naming where it came from.
    async fn load(&self) -> Result<(Vec<String>, String), CliError> {
        let (queries, source) = match &self.query_file {
            Some(path) => (load_query_pool(path).await?, path.display().to_string()),
            None => (parse_query_list(&self.queries), self.queries.clone()),
        };
        if queries.is_empty() {
            return Err(CliError::Config("query pool is empty".to_string()));
        }
        Ok((queries, source))
    }
}

async fn search(args: SearchArgs) -> Result<(), CliError> {
    let config = BenchConfig::from_args(&args.common)?;
    let (queries, source) = args.source.load().await?;
    let title = args.title.unwrap_or_else(|| default_title(&source, queries.len()));

    let backend = Backend::select(config.engine, &config.host, &config.index);
    let operation = SearchOperation::new(
        backend.clone(),
        &queries,
        config.run.concurrency,
        config.engine.query_flags(),
    )?;
    prepare_backend(&backend, &args.preload).await?;

    let summary = run_with_progress(&config.run, Arc::new(operation)).await?;
    finish(&config, &title, &summary)
}

async fn suggest(args: SuggestArgs) -> Result<(), CliError> {
    let config = BenchConfig::from_args(&args.common)?;
    let (queries, _) = args.source.load().await?;
    let prefixes = build_prefixes(&queries, args.prefix_len);

    let backend = Backend::select(config.engine, &config.host, &config.index);
    let operation = SuggestOperation::new(backend.clone(), prefixes, args.fuzzy)?;
    prepare_backend(&backend, &args.preload).await?;

    let title = if args.fuzzy { "suggest fuzzy" } else { "suggest" };
    let summary = run_with_progress(&config.run, Arc::new(operation)).await?;
    finish(&config, title, &summary)
}

async fn ingest(args: IngestArgs) -> Result<(), CliError> {
    let config = BenchConfig::from_args(&args.common)?;
    let backend = Backend::select(config.engine, &config.host, &config.index);
    reset_index(&backend).await?;

    let (mut rx, reader) = spawn_file_reader(args.file.clone(), args.chunk_size);
    let stats = ingest_documents(
        &mut rx,
        &backend,
        Some(&backend),
        IndexOptions::default(),
        args.chunk_size,
    )
    .await?;
    drop(rx);
    reader
        .await
        .map_err(|e| BenchError::Io(format!("reader task failed: {e}")))??;

    print_ingest(&args.file.display().to_string(), &stats);
    Ok(())
}

async fn synth(args: SynthArgs) -> Result<(), CliError> {
    let config = BenchConfig::from_args(&args.common)?;
    if args.vocabulary == 0 {
        return Err(CliError::Config("--vocabulary must be at least 1".to_string()));
    }
    let backend = Backend::select(config.engine, &config.host, &config.index);
    reset_index(&backend).await?;

    let generator = DocumentGenerator::new(args.vocabulary, None);
    let mut rx = spawn_generator(generator, args.count, args.chunk_size);
    let stats = ingest_documents(
        &mut rx,
        &backend,
        Some(&backend),
        IndexOptions::default(),
        args.chunk_size,
    )
    .await?;

    print_ingest("synthetic", &stats);
    Ok(())
}

/// Drop the dictionary and index, then create an empty index.
async fn reset_index(backend: &Backend) -> Result<(), BenchError> {
    backend.delete().await?;
    backend.drop_index().await?;
    backend.create().await
}

/// Get the backend ready to serve the benchmark. An in-process index starts
/// out empty and has to be created; a remote one is used as found unless a
/// preload was requested.
async fn prepare_backend(backend: &Backend, preload: &PreloadArgs) -> Result<(), CliError> {
    match preload.preload {
        Some(count) => {
            if preload.preload_vocabulary == 0 {
                return Err(CliError::Config("--preload-vocabulary must be at least 1".to_string()));
            }
            reset_index(backend).await?;
            let generator = DocumentGenerator::new(preload.preload_vocabulary, None);
            let mut rx = spawn_generator(generator, count, DEFAULT_CHUNK_SIZE);
            ingest_documents(
                &mut rx,
                backend,
                Some(backend),
                IndexOptions::default(),
                DEFAULT_CHUNK_SIZE,
            )
            .await?;
        }
        None if backend.engine() == Engine::Memory => backend.create().await?,
        None => {}
    }
    Ok(())
}

async fn run_with_progress<O: Operation>(
    config: &RunConfig,
    operation: Arc<O>,
) -> Result<RunSummary, RunError> {
    eprint!("Running ");
    std::io::stderr().flush().ok();

    let dot_handle = tokio::spawn(async {
        let mut interval = tokio::time::interval(Duration::from_secs(1));
        interval.tick().await; // consume the immediate first tick
        loop {
            interval.tick().await;
            eprint!(".");
            std::io::stderr().flush().ok();
        }
    });

    let result = runner::run(config, operation).await;

    dot_handle.abort();
    eprintln!();
    result
}

/// Print the report, then write the CSV record. The console report always
/// comes first so a broken sink still leaves the numbers on screen.
fn finish(config: &BenchConfig, title: &str, summary: &RunSummary) -> Result<(), CliError> {
    print_report(title, summary);

    let record = BenchmarkRecord::from_summary(config.engine.as_name(), title, summary);
    append_record(&config.output, &record).map_err(|source| {
        let path = match &config.output {
            OutputSink::Stdout => "-".to_string(),
            OutputSink::File(path) => path.display().to_string(),
        };
        tracing::error!(path = %path, error = %source, "failed to write benchmark record");
        CliError::Sink { path, source }
    })
}

fn print_ingest(source: &str, stats: &IngestStats) {
    println!("Ingested {} documents from {} in {} chunks", stats.documents, source, stats.chunks);
    println!("Autocomplete terms:    {}", stats.terms);
}
