//! Command-line entry point for the catalog crawler.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use tracing::error;
use tracing_subscriber::EnvFilter;

use crawldex::{
    CrawlConfig, CrawlError, DEFAULT_BASE_DELAY_MS, DEFAULT_CONCURRENCY,
    DEFAULT_FETCH_TIMEOUT_SECS, DEFAULT_MAX_ATTEMPTS, DEFAULT_SAVE_INTERVAL, HttpCatalogSource,
    ManifestPublisher, Orchestrator, PROGRESS_FILE, ProgressRecord, TermCode, merge_existing,
};

#[derive(Parser, Debug)]
#[command(
    name = "crawldex",
    version,
    about = "Resumable catalog crawler with checkpointed encoding and merge pipeline"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Crawl the catalog, then merge and publish each completed term.
    Crawl(CrawlArgs),
    /// Re-run merge/publish over existing shards, without network access.
    Merge(StateArgs),
    /// Print checkpoint state per term.
    Status(StateArgs),
}

#[derive(Args, Debug, Clone)]
struct CrawlArgs {
    #[arg(long, default_value = "data")]
    data_dir: PathBuf,

    /// Base URL of the catalog source.
    #[arg(long)]
    base_url: String,

    #[arg(long, default_value_t = DEFAULT_CONCURRENCY)]
    concurrency: usize,

    /// Base pacing delay between fetches, in milliseconds.
    #[arg(long, default_value_t = DEFAULT_BASE_DELAY_MS)]
    delay_ms: u64,

    /// Shard checkpoint cadence, in newly-recorded entries.
    #[arg(long, default_value_t = DEFAULT_SAVE_INTERVAL)]
    save_interval: usize,

    #[arg(long, default_value_t = DEFAULT_MAX_ATTEMPTS)]
    max_attempts: u32,

    #[arg(long, default_value_t = DEFAULT_FETCH_TIMEOUT_SECS)]
    timeout_secs: u64,

    /// Explicit term code to process; repeatable. Omit for auto-discovery.
    #[arg(long = "term")]
    terms: Vec<String>,
}

#[derive(Args, Debug, Clone)]
struct StateArgs {
    #[arg(long, default_value = "data")]
    data_dir: PathBuf,
}

fn main() -> ExitCode {
    init_tracing();

    match run() {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(err) => {
            error!(error = %err, "command failed");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<bool, CrawlError> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Crawl(args) => crawl(args),
        Commands::Merge(args) => {
            let report = merge_existing(&CrawlConfig::new(args.data_dir))?;
            Ok(report.success())
        }
        Commands::Status(args) => {
            status(&args.data_dir)?;
            Ok(true)
        }
    }
}

fn crawl(args: CrawlArgs) -> Result<bool, CrawlError> {
    let mut config = CrawlConfig::new(args.data_dir);
    config.concurrency = args.concurrency;
    config.base_delay = Duration::from_millis(args.delay_ms);
    config.save_interval = args.save_interval;
    config.max_attempts = args.max_attempts;
    config.timeout = Duration::from_secs(args.timeout_secs);
    if !args.terms.is_empty() {
        config.terms = Some(args.terms.into_iter().map(TermCode::new).collect());
    }

    let source = HttpCatalogSource::new(args.base_url, config.timeout)?;
    let orchestrator = Orchestrator::new(config, &source);
    let report = orchestrator.run()?;
    Ok(report.success())
}

fn status(data_dir: &Path) -> Result<(), CrawlError> {
    let publisher = ManifestPublisher::new(data_dir);
    match publisher.load_canonical()? {
        Some(manifest) => {
            println!("canonical manifest: {} terms", manifest.terms.len());
            for entry in &manifest.terms {
                println!("  {} ({})", entry.code, entry.name);
            }
        }
        None => println!("no canonical manifest published yet"),
    }

    let entries = match fs_err::read_dir(data_dir) {
        Ok(entries) => entries,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            println!("no checkpoint data under {}", data_dir.display());
            return Ok(());
        }
        Err(err) => return Err(err.into()),
    };
    let mut term_dirs: Vec<PathBuf> = entries
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|path| path.join(PROGRESS_FILE).is_file())
        .collect();
    term_dirs.sort();

    if term_dirs.is_empty() {
        println!("no in-flight term checkpoints");
        return Ok(());
    }
    for term_dir in term_dirs {
        let bytes = fs_err::read(term_dir.join(PROGRESS_FILE))?;
        let record: ProgressRecord = match serde_json::from_slice(&bytes) {
            Ok(record) => record,
            Err(err) => {
                println!("{}: corrupt progress file ({err})", term_dir.display());
                continue;
            }
        };
        let discovered = record
            .subjects
            .as_ref()
            .map_or("?".to_string(), |subjects| subjects.len().to_string());
        println!(
            "{}: {}/{} subjects completed, {} partial, {} failed | {} records, {} failed keys, {} rate limits",
            record.term,
            record.completed.len(),
            discovered,
            record.partial.len(),
            record.failed.len(),
            record.stats.records,
            record.stats.failed_keys,
            record.stats.rate_limit_hits,
        );
    }
    Ok(())
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}
