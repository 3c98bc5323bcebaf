mod browser;
mod config;
mod dedup;
mod errors;
mod export;
mod freshness;
mod models;
mod pipeline;
mod sources;
mod storage;
mod utils;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tracing::{error, info};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::AppConfig;
use crate::pipeline::{crawl_source, CrawlOutcome};
use crate::storage::Repository;

#[derive(Parser)]
#[command(name = "jobcrawl", about = "Incremental job & internship listing crawler", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Command {
    /// Crawl one source
    Crawl {
        /// Source adapter to run (see `jobcrawl sources`)
        #[arg(short, long, env = "SOURCE")]
        source: Option<String>,

        #[command(flatten)]
        overrides: Overrides,

        /// Also write accepted records to this CSV file
        #[arg(long)]
        csv: Option<PathBuf>,
    },

    /// Crawl every registered source once, one after another
    CrawlAll {
        #[command(flatten)]
        overrides: Overrides,

        /// Write `<source>.csv` per source into this directory
        #[arg(long)]
        csv_dir: Option<PathBuf>,
    },

    /// List registered sources
    Sources,

    /// Show per-source database statistics
    Stats,

    /// Print one stored listing as JSON
    Show {
        /// Source the listing was crawled from
        source: String,

        /// Detail page URL
        url: String,
    },

    /// Apply schema migrations without crawling
    Migrate,
}

/// Command-line overrides on top of the config files.
#[derive(Args, Debug, Default)]
struct Overrides {
    /// First page number / scroll increment
    #[arg(long, env = "START_PAGE")]
    start: Option<u32>,

    /// Page budget for paginated sources (0 = unlimited)
    #[arg(long, env = "MAX_PAGES")]
    max_pages: Option<u32>,

    /// Scroll budget for infinite-scroll sources (0 = unlimited)
    #[arg(long)]
    max_scrolls: Option<u32>,

    /// Reject listings posted more than this many days ago
    #[arg(long, env = "FRESHNESS_DAYS")]
    freshness_days: Option<u32>,

    /// Accept listings of any age
    #[arg(long)]
    no_freshness: bool,

    /// Run the browser without a window (accepts true/false, 1/0, yes/no)
    #[arg(
        long,
        env = "HEADLESS",
        value_name = "BOOL",
        value_parser = clap::builder::BoolishValueParser::new()
    )]
    headless: Option<bool>,

    /// Run without the database: nothing is known, nothing is written
    #[arg(long)]
    no_store: bool,

    #[arg(
        long,
        env = "DB_ENABLED",
        value_name = "BOOL",
        hide = true,
        value_parser = clap::builder::BoolishValueParser::new()
    )]
    db_enabled: Option<bool>,
}

impl Overrides {
    fn apply(&self, config: &mut AppConfig) {
        let crawl = &mut config.crawl;
        if let Some(start) = self.start {
            crawl.start_offset = start.max(1);
        }
        if let Some(n) = self.max_pages {
            crawl.max_pages = n;
        }
        if let Some(n) = self.max_scrolls {
            crawl.max_scrolls = n;
        }
        if self.no_freshness {
            crawl.freshness_window_days = None;
        } else if let Some(days) = self.freshness_days {
            crawl.freshness_window_days = Some(days);
        }
        if let Some(headless) = self.headless {
            config.browser.headless = headless;
        }
        if self.no_store || self.db_enabled == Some(false) {
            config.storage.enabled = false;
        }
    }
}

fn render_stored(
    record: &models::Record,
    first_seen: chrono::NaiveDateTime,
    last_seen: chrono::NaiveDateTime,
) -> Result<String> {
    let doc = serde_json::json!({
        "record": record,
        "first_seen": utils::fmt_seen(Some(first_seen)),
        "last_seen": utils::fmt_seen(Some(last_seen)),
    });
    Ok(serde_json::to_string_pretty(&doc)?)
}

fn print_outcome(outcome: &CrawlOutcome) {
    println!("─────────────────────────────────");
    println!("  {} crawl", outcome.source);
    println!("─────────────────────────────────");
    println!("  Iterations : {} ({})", outcome.iterations, outcome.termination);
    println!("  Took       : {}", utils::fmt_duration(outcome.elapsed));
    println!("  Known      : {}", utils::fmt_number(outcome.known as i64));
    println!("  Accepted   : {}", utils::fmt_number(outcome.tally.accepted as i64));
    println!("  Skipped    : {}", utils::fmt_number(outcome.tally.skipped() as i64));
    for reason in pipeline::SkipReason::ALL {
        let n = outcome.tally.count(reason);
        if n > 0 {
            println!("    {:<24} {}", reason.as_str(), n);
        }
    }
    if outcome.tally.upsert_failed > 0 {
        println!("  Not saved  : {}", outcome.tally.upsert_failed);
    }
    println!("─────────────────────────────────");
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "jobcrawl=info,warn",
        1 => "jobcrawl=debug,info",
        _ => "trace",
    };

    tracing_subscriber::registry()
        .with(fmt::layer().compact().with_target(false))
        .with(EnvFilter::new(filter))
        .init();

    let mut config = AppConfig::load()?;

    match cli.command {
        Command::Crawl { source, overrides, csv } => {
            overrides.apply(&mut config);
            let source = source.unwrap_or_else(|| config.crawl.source.clone());

            let outcome = crawl_source(&config, &source)
                .await
                .with_context(|| format!("{} crawl failed", source))?;
            print_outcome(&outcome);

            if let Some(path) = csv {
                export::write_csv(&path, &outcome.accepted)?;
            }
        }

        Command::CrawlAll { overrides, csv_dir } => {
            overrides.apply(&mut config);
            let _t = utils::Timer::start("All sources");
            let mut failed = 0usize;

            for source in sources::SOURCE_NAMES {
                info!("=== {} ===", source);
                match crawl_source(&config, source).await {
                    Ok(outcome) => {
                        print_outcome(&outcome);
                        if let Some(dir) = &csv_dir {
                            let path = dir.join(format!("{}.csv", source));
                            if let Err(e) = export::write_csv(&path, &outcome.accepted) {
                                error!("{}: {:#}", source, e);
                            }
                        }
                    }
                    Err(e) => {
                        error!("{}: {:#}", source, e);
                        failed += 1;
                    }
                }
            }

            info!(
                "Done: {} sources, {} failed",
                sources::SOURCE_NAMES.len(),
                failed
            );
        }

        Command::Sources => {
            for name in sources::SOURCE_NAMES {
                let adapter = sources::build(name, &config)?;
                println!("  {:<12} {:?}  {}", name, adapter.mode(), adapter.listing_url(1));
            }
        }

        Command::Stats => {
            let repo = Repository::open(&config.storage.db_path)?;
            repo.run_migrations()?;
            let stats = repo.stats()?;
            println!("─────────────────────────────────");
            println!("  jobcrawl — Database Stats");
            println!("─────────────────────────────────");
            if stats.is_empty() {
                println!("  No listings — run `jobcrawl crawl` first.");
            }
            for s in &stats {
                let runs = repo.run_count(&s.source)?;
                println!(
                    "  {:<12}: {} listings, {} runs",
                    s.source,
                    utils::fmt_number(s.records),
                    utils::fmt_number(runs),
                );
                println!(
                    "    first seen {}  last seen {}",
                    utils::fmt_seen(s.first_seen),
                    utils::fmt_seen(s.last_seen),
                );
            }
            println!("─────────────────────────────────");
        }

        Command::Show { source, url } => {
            let repo = Repository::open(&config.storage.db_path)?;
            repo.run_migrations()?;
            match repo.fetch(&source, &url)? {
                Some((record, first, last)) => println!("{}", render_stored(&record, first, last)?),
                None => anyhow::bail!("no {} listing stored for {}", source, url),
            }
        }

        Command::Migrate => {
            Repository::open(&config.storage.db_path)?.run_migrations()?;
            println!("Migrations applied.");
        }
    }

    Ok(())
}
