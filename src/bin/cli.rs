//! talkscraper CLI
//!
//! Local execution entry point for the harvester stages and the state store
//! maintenance commands.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use talkscraper::{
    error::{AppError, Result},
    models::{Config, Language},
    pipeline::{self, ExtractOptions, PipelineContext},
    storage::StateStore,
};
use tokio_util::sync::CancellationToken;

/// talkscraper - resumable conference talk harvester
#[derive(Parser, Debug)]
#[command(
    name = "talkscraper",
    version,
    about = "Resumable harvester for conference talks and their footnotes"
)]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "talkscraper.toml")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args, Debug, Clone, Copy)]
struct LangArg {
    /// Language to process (eng, spa); all configured languages when omitted
    #[arg(short, long)]
    lang: Option<Language>,
}

impl LangArg {
    fn languages(&self) -> Vec<Language> {
        match self.lang {
            Some(lang) => vec![lang],
            None => Language::ALL.to_vec(),
        }
    }
}

#[derive(Args, Debug, Clone, Copy)]
struct BatchArgs {
    /// Maximum number of documents to process
    #[arg(long)]
    limit: Option<usize>,

    /// Documents per chunk (overrides batch.chunk_size)
    #[arg(long)]
    chunk_size: Option<usize>,

    /// Worker pool width (overrides batch.workers)
    #[arg(long)]
    workers: Option<usize>,
}

impl From<BatchArgs> for ExtractOptions {
    fn from(args: BatchArgs) -> Self {
        ExtractOptions {
            limit: args.limit,
            chunk_size: args.chunk_size,
            workers: args.workers,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Write the default configuration file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Validate the configuration file
    Validate,

    /// Stage 1: discover conference URLs
    Discover(LangArg),

    /// Stage 2: enumerate talk URLs of pending conferences
    Enumerate(LangArg),

    /// Stage 3: extract pending talks
    Extract {
        #[command(flatten)]
        lang: LangArg,
        #[command(flatten)]
        batch: BatchArgs,
    },

    /// Run full pipeline: Discover → Enumerate → Extract
    Pipeline {
        #[command(flatten)]
        lang: LangArg,
        #[command(flatten)]
        batch: BatchArgs,
    },

    /// Show state store totals
    Stats,

    /// Show recent processing log entries
    Log {
        /// Number of entries to show
        #[arg(long, default_value_t = 20)]
        limit: usize,

        /// Only failed entries
        #[arg(long)]
        failed: bool,

        /// Group failures by operation and message instead
        #[arg(long)]
        summary: bool,
    },

    /// Return failed documents to pending while under the attempt limit
    Requeue {
        #[command(flatten)]
        lang: LangArg,

        #[arg(long, default_value_t = 3)]
        max_attempts: u32,
    },

    /// Return every document of a language to pending
    Reset {
        #[command(flatten)]
        lang: LangArg,
    },

    /// Delete stored conferences that no longer match the URL grammar
    Prune(LangArg),
}

/// Initialize logging based on verbosity flag.
fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

/// Cancel the token on Ctrl-C. In-flight documents finish; nothing new starts.
fn install_interrupt_handler(token: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::warn!("Interrupt received, finishing in-flight documents...");
            token.cancel();
        }
    });
}

fn open_store(config: &Config) -> Result<StateStore> {
    StateStore::open(&config.paths.database)
}

/// Main entry point for the CLI application.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Command::Init { force } => {
            if cli.config.exists() && !force {
                log::warn!(
                    "Config already exists at {}. Use --force to overwrite.",
                    cli.config.display()
                );
                return Ok(());
            }
            std::fs::write(&cli.config, Config::default().to_toml()?)?;
            log::info!("Default configuration written to {}", cli.config.display());
            return Ok(());
        }
        Command::Validate => {
            pipeline::run_validate(&cli.config)?;
            log::info!("All validations passed!");
            return Ok(());
        }
        _ => {}
    }

    let config = Config::load(&cli.config)?;
    config.validate()?;
    log::info!("Loaded configuration from {}", cli.config.display());

    match cli.command {
        Command::Init { .. } | Command::Validate => {}

        Command::Discover(lang) => {
            let context = build_context(config)?;
            let stats = pipeline::run_discover(&context, &lang.languages()).await?;
            log::info!("{} new conferences", stats.inserted);
        }

        Command::Enumerate(lang) => {
            let context = build_context(config)?;
            let stats = pipeline::run_enumerate(&context, &lang.languages()).await?;
            log::info!("{} new talks", stats.inserted);
        }

        Command::Extract { lang, batch } => {
            let context = build_context(config)?;
            for language in lang.languages() {
                if context.cancel.is_cancelled() {
                    break;
                }
                let stats = pipeline::run_extract(&context, language, batch.into()).await?;
                print_batch(language, &stats);
            }
        }

        Command::Pipeline { lang, batch } => {
            let context = build_context(config)?;
            let results = pipeline::run_pipeline(&context, &lang.languages(), batch.into()).await?;
            for (language, stats) in &results {
                print_batch(*language, stats);
            }
        }

        Command::Stats => {
            let store = open_store(&config)?;
            print!("{}", store.stats()?);
        }

        Command::Log {
            limit,
            failed,
            summary,
        } => {
            let store = open_store(&config)?;
            if summary {
                for row in store.failure_summary()? {
                    println!("{:>6}  {}  {}", row.count, row.operation, row.message);
                }
            } else {
                for entry in store.recent_log(limit, failed)? {
                    println!(
                        "{}  {:<7}  {}  {}  {}  {}",
                        entry.timestamp,
                        entry.status,
                        entry.operation,
                        entry.language,
                        entry.url,
                        entry.message.unwrap_or_default()
                    );
                }
            }
        }

        Command::Requeue { lang, max_attempts } => {
            if max_attempts == 0 {
                return Err(AppError::validation("--max-attempts must be > 0"));
            }
            let store = open_store(&config)?;
            for language in lang.languages() {
                let n = store.requeue_failed_documents(language, max_attempts)?;
                log::info!("{}: {} failed documents returned to pending", language, n);
            }
        }

        Command::Reset { lang } => {
            let store = open_store(&config)?;
            for language in lang.languages() {
                let n = store.reset_documents(language)?;
                log::info!("{}: {} documents reset to pending", language, n);
            }
        }

        Command::Prune(lang) => {
            let store = open_store(&config)?;
            for language in lang.languages() {
                let n = store.prune_conference_urls(language, |url| config.urls.is_conference_url(url))?;
                log::info!("{}: {} invalid conference URLs removed", language, n);
            }
        }
    }

    log::info!("Done!");
    Ok(())
}

fn build_context(config: Config) -> Result<PipelineContext> {
    let token = CancellationToken::new();
    install_interrupt_handler(token.clone());
    PipelineContext::from_config(config, token)
}

fn print_batch(language: Language, stats: &talkscraper::models::BatchStats) {
    println!("[{}] {}", language, stats);
}
