//! Crawl engine: ties browser → source adapter → dedup → storage together.
//!
//! One run is strictly sequential. Each detail page is loaded, extracted,
//! classified and written before the next card is looked at, and the
//! [`Controller`] decides after every iteration whether to go on.
//!
//! Per card, the checks run in this order; the first one that fails decides
//! the skip reason:
//!   1. the card has a detail link
//!   2. the link was not visited earlier in this run
//!   3. the detail page loads
//!   4. the record is inside the freshness window
//!   5. the record has a discovery key not seen earlier in this run
//!   6. the content fingerprint is new or changed

pub mod accountant;
pub mod controller;


use crate::browser::{open_session, BrowserSession, Navigator};
use crate::config::AppConfig;
use crate::dedup::{fingerprint, DiscoveryKeys};
use crate::errors::CrawlError;
use crate::freshness::is_fresh;
use crate::models::{fields, Card, CrawlMode, Page, Record};
use crate::sources::{self, SourceAdapter};
use crate::storage::{PersistenceGateway, RecordStore, Repository, RunSummary};
use crate::utils::Timer;
use anyhow::{Context, Result};
use std::collections::HashSet;
use std::time::Duration;
use tracing::{debug, info, warn};

pub use self::accountant::{RunTally, SkipReason};
pub use self::controller::{Controller, CrawlState, TerminationReason};

/// The knobs of one run, resolved from [`AppConfig`] for a given crawl mode.
#[derive(Debug, Clone, PartialEq)]
pub struct CrawlSettings {
    pub start_offset: u32,
    /// 0 = unlimited
    pub budget: u32,
    pub freshness_window_days: Option<u32>,
    pub zero_cards_threshold: u32,
    pub zero_new_threshold: u32,
    pub reload_empty_listing: bool,
    pub listing_attempts: u32,
    pub detail_attempts: u32,
}

impl CrawlSettings {
    pub fn from_config(config: &AppConfig, mode: CrawlMode) -> Self {
        let crawl = &config.crawl;
        Self {
            start_offset: crawl.start_offset.max(1),
            budget: match mode {
                CrawlMode::Paginated => crawl.max_pages,
                CrawlMode::InfiniteScroll => crawl.max_scrolls,
            },
            freshness_window_days: crawl.freshness_window_days,
            zero_cards_threshold: crawl.zero_cards_threshold,
            zero_new_threshold: crawl.zero_new_threshold,
            reload_empty_listing: crawl.reload_empty_listing,
            listing_attempts: config.navigation.listing_attempts,
            detail_attempts: config.navigation.detail_attempts,
        }
    }
}

/// Everything a finished run hands back to its caller.
#[derive(Debug)]
pub struct CrawlOutcome {
    pub source: String,
    pub accepted: Vec<Record>,
    pub tally: RunTally,
    pub iterations: u32,
    pub termination: TerminationReason,
    /// Stored fingerprints the run classified against (preloaded or looked up).
    pub known: usize,
    pub elapsed: Duration,
}

pub struct Pipeline<'a> {
    adapter: &'a dyn SourceAdapter,
    navigator: Navigator<'a>,
    gateway: PersistenceGateway<'a>,
    settings: CrawlSettings,
}

impl<'a> Pipeline<'a> {
    pub fn new(
        adapter: &'a dyn SourceAdapter,
        session: &'a dyn BrowserSession,
        store: Option<&'a dyn RecordStore>,
        config: &AppConfig,
    ) -> Self {
        Self {
            adapter,
            navigator: Navigator::new(session, &config.navigation),
            gateway: PersistenceGateway::new(store, adapter.name(), config.crawl.index_mode),
            settings: CrawlSettings::from_config(config, adapter.mode()),
        }
    }

    /// Run until the controller terminates. Only a store that cannot be read
    /// at start-up fails the run; everything per-page or per-record is skipped
    /// and counted.
    pub async fn run(mut self) -> Result<CrawlOutcome, CrawlError> {
        let adapter = self.adapter;
        let name = adapter.name();
        let timer = Timer::start(format!("{} crawl", name));

        if !self.gateway.is_enabled() {
            info!("{}: storage disabled, records will not be persisted", name);
        }
        self.gateway.preload()?;
        let run_id = self.gateway.begin_run();

        let mut controller = Controller::new(
            self.adapter.mode(),
            self.settings.start_offset,
            self.settings.budget,
            self.settings.zero_cards_threshold,
            self.settings.zero_new_threshold,
        );
        let mut tally = RunTally::default();
        let mut accepted: Vec<Record> = Vec::new();
        let mut visited: HashSet<String> = HashSet::new();
        let mut keys = DiscoveryKeys::default();
        let mut feed: Option<Page> = None;

        while let Some(offset) = controller.advance() {
            let listing = match self.adapter.mode() {
                CrawlMode::Paginated => self.load_listing(offset).await,
                CrawlMode::InfiniteScroll => self.scroll_feed(&mut feed, offset).await,
            };
            let Some(listing) = listing else {
                info!("{} #{}: listing unavailable", name, offset);
                controller.finish_iteration(0, 0);
                continue;
            };
            controller.listing_loaded();

            let cards = self.extract_cards(&listing, offset).await;
            controller.cards_extracted(cards.len());
            info!("{} #{}: {} cards", name, offset, cards.len());
            debug!("{} #{}: {:?}", name, offset, controller.state());

            let before = accepted.len();
            for card in &cards {
                let record = self
                    .visit(card, offset, &mut visited, &mut keys, &mut tally)
                    .await;
                if let Some(record) = record {
                    accepted.push(record);
                }
            }
            let fresh = accepted.len() - before;
            info!("{} #{}: {} new or changed records", name, offset, fresh);

            controller.finish_iteration(cards.len(), fresh);
        }

        let termination = controller
            .termination()
            .unwrap_or(TerminationReason::BudgetExhausted);
        let iterations = controller.iterations();
        info!("{}: stopped after {} iterations ({})", name, iterations, termination);
        tally.log_summary(name, iterations);
        let index = self.gateway.index();
        debug!(
            "{}: index held {} stored and {} accepted fingerprints, {} discovery keys",
            name,
            index.stored_len(),
            index.accepted_len(),
            keys.count(),
        );
        let known = index.stored_len();

        self.gateway.finish_run(
            run_id,
            &RunSummary {
                iterations,
                accepted: tally.accepted,
                skipped: tally.skipped(),
                termination: termination.to_string(),
                error: (tally.upsert_failed > 0)
                    .then(|| format!("{} records failed to save", tally.upsert_failed)),
            },
        );

        Ok(CrawlOutcome {
            source: name.to_string(),
            accepted,
            tally,
            iterations,
            termination,
            known,
            elapsed: timer.elapsed(),
        })
    }

    async fn load_listing(&self, offset: u32) -> Option<Page> {
        let url = self.adapter.listing_url(offset);
        debug!("Listing {}", url);
        self.navigator
            .load(&url, self.settings.listing_attempts)
            .await
            .ok()
    }

    /// First increment opens the feed, later ones grow it. A failed increment
    /// keeps the feed it had.
    async fn scroll_feed(&self, feed: &mut Option<Page>, offset: u32) -> Option<Page> {
        let attempts = self.settings.listing_attempts;
        let grown = match feed.as_ref() {
            None => {
                let url = self.adapter.listing_url(self.settings.start_offset);
                self.navigator.load(&url, attempts).await
            }
            Some(current) => {
                let next = self.adapter.listing_url(offset);
                self.navigator.extend(current, &next, attempts).await
            }
        };
        let page = grown.ok()?;
        *feed = Some(page.clone());
        Some(page)
    }

    async fn extract_cards(&self, listing: &Page, offset: u32) -> Vec<Card> {
        let cards = self.adapter.extract_cards(listing);
        if !cards.is_empty()
            || !self.settings.reload_empty_listing
            || self.adapter.mode() != CrawlMode::Paginated
        {
            return cards;
        }

        info!("{} #{}: no cards, reloading once", self.adapter.name(), offset);
        match self.navigator.reload(&listing.url).await {
            Ok(page) => self.adapter.extract_cards(&page),
            Err(e) => {
                warn!("Reload of {} failed: {}", listing.url, e);
                cards
            }
        }
    }

    async fn visit(
        &mut self,
        card: &Card,
        offset: u32,
        visited: &mut HashSet<String>,
        keys: &mut DiscoveryKeys,
        tally: &mut RunTally,
    ) -> Option<Record> {
        let Some(url) = card.url.as_deref() else {
            tally.skip(SkipReason::NoDetailLink);
            return None;
        };
        if !visited.insert(url.to_string()) {
            tally.skip(SkipReason::DuplicateUrl);
            return None;
        }

        let detail = match self
            .navigator
            .load(url, self.settings.detail_attempts)
            .await
        {
            Ok(page) => page,
            Err(e) => {
                debug!("Skipping {}: {}", e.url(), e);
                tally.skip(SkipReason::DetailFetchFailed);
                return None;
            }
        };
        let record = self.adapter.extract_detail(&detail, card, url, offset);

        if !is_fresh(record.posted_age_days, self.settings.freshness_window_days) {
            debug!("Stale ({:?} days): {}", record.posted_age_days, url);
            tally.skip(SkipReason::Stale);
            return None;
        }

        let Some(key) = self.adapter.discovery_key(&record) else {
            tally.skip(SkipReason::IncompleteRecord);
            return None;
        };
        if !keys.insert(key) {
            tally.skip(SkipReason::DuplicateDiscoveryKey);
            return None;
        }

        let fp = fingerprint(&record, self.adapter.material_fields());
        let class = self.gateway.classify(&record.url, &fp);
        if !class.is_accepted() {
            tally.skip(SkipReason::Unchanged);
            return None;
        }

        if self.gateway.upsert(&record, &fp).is_err() {
            tally.upsert_failed += 1;
        }
        self.gateway.mark_accepted(&record.url, &fp);
        tally.accepted += 1;

        info!(
            "✅ {:?} {} @ {}",
            class,
            record.get(fields::TITLE).unwrap_or("?"),
            record.get(fields::ORGANIZATION).unwrap_or("?"),
        );
        Some(record)
    }
}

/// Build session, adapter and store for `source` from config, then run it.
pub async fn crawl_source(config: &AppConfig, source: &str) -> Result<CrawlOutcome> {
    let adapter = sources::build(source, config)?;
    let session = open_session(&config.browser)
        .await
        .context("Failed to open browser session")?;

    let repo = if config.storage.enabled {
        let repo = Repository::open(&config.storage.db_path).context("Failed to open DuckDB")?;
        if config.storage.run_migrations {
            repo.run_migrations()?;
        }
        Some(repo)
    } else {
        None
    };

    let store = repo.as_ref().map(|r| r as &dyn RecordStore);
    let outcome = Pipeline::new(adapter.as_ref(), session.as_ref(), store, config)
        .run()
        .await?;
    debug!("{}: {} page loads this session", source, session.history().len());

    if let Some(repo) = &repo {
        match repo.listing_count(source) {
            Ok(n) => info!("{}: {} listings stored", source, n),
            Err(e) => warn!("{}: could not count stored listings: {:#}", source, e),
        }
    }
    Ok(outcome)
}
