//! Tumbl-Tally main entry point
//!
//! This is the command-line interface for the Tumbl-Tally blog crawler.

use anyhow::{bail, Context};
use clap::Parser;
use std::path::{Path, PathBuf};
use tumbl_tally::config::{load_config_with_hash, Config, PostTypeFilter};
use tumbl_tally::crawler::{crawl, CancelHandle, CrawlEngine};
use tumbl_tally::output::{load_statistics, print_statistics, BlogStatistics, DEFAULT_TOP_TAGS};
use tumbl_tally::storage::{save_report, SqliteStorage};
use tumbl_tally::url::{display_blog_url, normalize_blog_url};
use tumbl_tally::CrawlStatus;
use tracing_subscriber::EnvFilter;

/// Tumbl-Tally: blog post-history crawler and tag census
///
/// Tumbl-Tally pages through a blog's entire post history via its read API,
/// counts posts per type, indexes every tag, and stores a snapshot of the
/// result in SQLite.
#[derive(Parser, Debug)]
#[command(name = "tumbl-tally")]
#[command(version = "1.0.0")]
#[command(about = "Blog post-history crawler and tag census", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Blog to crawl, e.g. staff.example.com
    #[arg(value_name = "BLOG_URL")]
    blog_url: String,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Only check that the blog exists and exit
    #[arg(long, conflicts_with = "stats")]
    check: bool,

    /// Show statistics from the stored snapshot and exit
    #[arg(long, conflicts_with = "check")]
    stats: bool,

    /// Stop after this many posts (overrides config)
    #[arg(long, value_name = "N")]
    max_posts: Option<u64>,

    /// Offset of the first post to fetch (overrides config)
    #[arg(long, value_name = "OFFSET")]
    start: Option<u64>,

    /// Only request photo posts (overrides config)
    #[arg(long)]
    photo_only: bool,

    /// Number of tags to list in the statistics
    #[arg(long, value_name = "N", default_value_t = DEFAULT_TOP_TAGS)]
    top_tags: usize,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (mut config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("failed to load {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    apply_overrides(&mut config, &cli);

    if cli.check {
        handle_check(&config, &cli.blog_url).await
    } else if cli.stats {
        handle_stats(&config, &cli.blog_url, cli.top_tags)
    } else {
        handle_crawl(&config, &config_hash, &cli.blog_url, cli.top_tags).await
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("tumbl_tally=info,warn"),
            1 => EnvFilter::new("tumbl_tally=debug,info"),
            2 => EnvFilter::new("tumbl_tally=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

fn apply_overrides(config: &mut Config, cli: &Cli) {
    if let Some(max_posts) = cli.max_posts {
        config.crawl.max_posts = max_posts;
    }
    if let Some(start) = cli.start {
        config.crawl.start_offset = start;
    }
    if cli.photo_only {
        config.crawl.post_type = PostTypeFilter::Photo;
    }
}

/// Handles --check: runs the existence probe only
async fn handle_check(config: &Config, blog_url: &str) -> anyhow::Result<()> {
    let engine = CrawlEngine::from_config(config).context("failed to build HTTP client")?;

    if engine.probe(blog_url).await {
        println!("✓ {} is a readable blog", blog_url);
        Ok(())
    } else {
        bail!("{} is not a readable blog", blog_url)
    }
}

/// Handles --stats: prints statistics from the stored snapshot
fn handle_stats(config: &Config, blog_url: &str, top: usize) -> anyhow::Result<()> {
    let key = display_blog_url(&normalize_blog_url(blog_url)?);

    println!("Database: {}\n", config.output.database_path);
    let storage = SqliteStorage::new(Path::new(&config.output.database_path))
        .context("failed to open database")?;

    match load_statistics(&storage, &key, top)? {
        Some(stats) => print_statistics(&stats),
        None => println!("No snapshot stored for {}", key),
    }

    Ok(())
}

/// Handles the main crawl operation
async fn handle_crawl(
    config: &Config,
    config_hash: &str,
    blog_url: &str,
    top: usize,
) -> anyhow::Result<()> {
    let engine = CrawlEngine::from_config(config).context("failed to build HTTP client")?;

    let cancel = CancelHandle::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        while tokio::signal::ctrl_c().await.is_ok() {
            if on_interrupt.is_cancelled() {
                tracing::error!("Second interrupt, exiting without saving");
                std::process::exit(130);
            }
            tracing::warn!("Interrupt received, stopping after the current page (Ctrl-C again to quit)");
            on_interrupt.cancel();
        }
    });

    let report = crawl(&engine, blog_url, cancel).await;

    let mut storage = SqliteStorage::new(Path::new(&config.output.database_path))
        .context("failed to open database")?;
    if save_report(&mut storage, &report, config_hash).context("failed to save snapshot")? {
        tracing::info!(
            "Saved {} posts to {}",
            report.blog.post_count(),
            config.output.database_path
        );
    }

    match report.status {
        CrawlStatus::InvalidSource => bail!("{} is not a readable blog", blog_url),
        CrawlStatus::UnableToDownload => {
            tracing::warn!(
                "Crawl stopped early at offset {}; partial results saved",
                report.progress.offset
            );
        }
        _ => tracing::info!("Crawl completed"),
    }

    print_statistics(&BlogStatistics::from_report(&report, top));
    Ok(())
}
