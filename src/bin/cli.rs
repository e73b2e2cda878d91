//! SchoolScout CLI
//!
//! Local execution entry point for discovery, search, and the document
//! download pipeline. State lives in memory for the duration of one run,
//! so document operations discover first and then act on the registry.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use schoolscout::{
    aggregator::SearchService,
    connectors::default_connectors,
    crawler::{BatchOperation, CurriculumCrawler, DocumentFilter},
    error::Result,
    fetch::{FetchCache, HttpFetcher},
    models::{Config, DocumentStatus, Language, SearchParams},
    store::{MemoryImporter, MemoryStore},
};

/// SchoolScout - Curriculum Discovery Engine
#[derive(Parser, Debug)]
#[command(
    name = "schoolscout",
    version,
    about = "Discovers curriculum documents and searches teaching activities"
)]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "schoolscout.toml")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run one discovery pass over all configured sources
    Discover {
        /// Print the full document records instead of a summary
        #[arg(long)]
        full: bool,
    },

    /// Search activities across all active connectors
    Search {
        /// Free-text query
        query: Option<String>,

        /// Grade filter (0 = kindergarten)
        #[arg(short, long)]
        grade: Option<u8>,

        /// Subject filter
        #[arg(short, long)]
        subject: Option<String>,

        /// Language filter: en or fr
        #[arg(short, long)]
        language: Option<String>,

        /// Page size
        #[arg(long)]
        limit: Option<i64>,

        /// Page offset
        #[arg(long)]
        offset: Option<i64>,

        /// Include paid resources
        #[arg(long)]
        paid: bool,
    },

    /// Discover, then download the given document ids (all pending if none)
    Download {
        /// Document ids to download
        ids: Vec<String>,

        /// Also hand successful downloads to the import pipeline
        #[arg(long)]
        process: bool,

        /// User id recorded on import sessions
        #[arg(long, default_value = "cli")]
        user: String,
    },

    /// Discover, then check the given document ids still exist (all if none)
    Verify {
        /// Document ids to verify
        ids: Vec<String>,
    },

    /// List configured discovery sources and activity connectors
    Sources,

    /// Validate the configuration file
    Validate,
}

/// Initialize logging based on verbosity flag.
fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

fn build_crawler(config: &Config) -> Result<CurriculumCrawler> {
    let fetcher = Arc::new(HttpFetcher::new(&config.http)?);
    let cache = Arc::new(FetchCache::new(fetcher.clone(), &config.cache));
    Ok(CurriculumCrawler::new(
        cache,
        fetcher,
        Arc::new(MemoryImporter::new()),
        config.sources.clone(),
        config.crawler.clone(),
    ))
}

/// Main entry point for the CLI application.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    log::info!("SchoolScout starting...");

    let config = Config::load_or_default(&cli.config);

    match cli.command {
        Command::Discover { full } => {
            let crawler = build_crawler(&config)?;
            let outcome = crawler.discover().await;

            if full {
                println!("{}", serde_json::to_string_pretty(&outcome.documents)?);
            } else {
                for doc in &outcome.documents {
                    println!("{}  [{}] {}", doc.id, doc.source_name, doc.title);
                }
            }
            log::info!(
                "{} pages visited, {} new documents, {} updated, {} fetch failures",
                outcome.pages_visited,
                outcome.new_documents,
                outcome.updated_documents,
                outcome.fetch_failures
            );
        }

        Command::Search {
            query,
            grade,
            subject,
            language,
            limit,
            offset,
            paid,
        } => {
            let language = match language.as_deref() {
                Some("fr") => Some(Language::Fr),
                Some("en") => Some(Language::En),
                Some(other) => {
                    log::warn!("Unknown language '{other}', ignoring filter");
                    None
                }
                None => None,
            };
            let params = SearchParams {
                query,
                grade,
                grade_level: None,
                subject,
                language,
                limit,
                offset,
                free_only: !paid,
            };

            let fetcher = Arc::new(HttpFetcher::new(&config.http)?);
            let cache = Arc::new(FetchCache::new(fetcher, &config.cache));
            let service = SearchService::new(
                default_connectors(cache, &config),
                Arc::new(MemoryStore::new()),
                config.search.clone(),
            );

            let results = service.search(&params, "cli").await;
            println!("{}", serde_json::to_string_pretty(&results)?);
            log::info!(
                "{} of {} activities from {} sources in {}ms",
                results.activities.len(),
                results.total,
                results.sources.len(),
                results.execution_time_ms
            );
        }

        Command::Download { ids, process, user } => {
            let crawler = build_crawler(&config)?;
            let outcome = crawler.discover().await;
            log::info!("Discovered {} documents", outcome.documents.len());

            let ids = if ids.is_empty() {
                crawler
                    .filter_documents(&DocumentFilter {
                        status: Some(DocumentStatus::Pending),
                        ..DocumentFilter::default()
                    })
                    .into_iter()
                    .map(|d| d.id)
                    .collect()
            } else {
                ids
            };

            let operation = if process {
                BatchOperation::DownloadAndProcess
            } else {
                BatchOperation::Download
            };
            let summary = crawler.batch(&ids, operation, &user).await;
            println!("{}", serde_json::to_string_pretty(&summary)?);
            log::info!("{} succeeded, {} failed", summary.succeeded, summary.failed);
        }

        Command::Verify { ids } => {
            let crawler = build_crawler(&config)?;
            let outcome = crawler.discover().await;
            log::info!("Discovered {} documents", outcome.documents.len());

            let ids = if ids.is_empty() {
                outcome.documents.iter().map(|d| d.id.clone()).collect()
            } else {
                ids
            };

            let summary = crawler.batch(&ids, BatchOperation::Verify, "cli").await;
            for item in &summary.items {
                println!(
                    "{}  {}",
                    item.id,
                    if item.success { "alive" } else { "gone" }
                );
            }
        }

        Command::Sources => {
            println!("Discovery sources:");
            for source in &config.sources {
                println!(
                    "  {} ({}, {}) depth {} delay {}ms{}",
                    source.name,
                    source.province,
                    source.base_url,
                    source.max_depth,
                    source.crawl_delay_ms,
                    if source.active { "" } else { "  [inactive]" }
                );
            }

            let fetcher = Arc::new(HttpFetcher::new(&config.http)?);
            let cache = Arc::new(FetchCache::new(fetcher, &config.cache));
            println!("Activity connectors:");
            for connector in default_connectors(cache, &config) {
                println!("  {}", connector.source_id());
            }
        }

        Command::Validate => {
            log::info!("Validating configuration...");
            if let Err(e) = config.validate() {
                log::error!("Config validation failed: {}", e);
                return Err(e);
            }
            log::info!("✓ Config OK ({} sources)", config.sources.len());
        }
    }

    log::info!("Done!");

    Ok(())
}
