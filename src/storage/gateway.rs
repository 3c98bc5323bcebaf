use super::{RecordStore, RunSummary};
use crate::config::IndexMode;
use crate::dedup::{Classification, KnownIndex};
use crate::errors::{CrawlError, PersistenceError};
use crate::models::Record;
use tracing::{info, warn};

/// Sits between the crawl loop and the store: owns the known-record index and
/// makes sure no single store error stops a run once it has started.
pub struct PersistenceGateway<'a> {
    store: Option<&'a dyn RecordStore>,
    source: String,
    mode: IndexMode,
    index: KnownIndex,
}

impl<'a> PersistenceGateway<'a> {
    /// `store = None` runs without persistence: nothing is known, nothing is written.
    pub fn new(store: Option<&'a dyn RecordStore>, source: &str, mode: IndexMode) -> Self {
        Self {
            store,
            source: source.to_string(),
            mode,
            index: KnownIndex::default(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.store.is_some()
    }

    /// Load the known-record snapshot. A store that cannot be read here is fatal.
    pub fn preload(&mut self) -> Result<usize, CrawlError> {
        let Some(store) = self.store else { return Ok(0) };
        if self.mode == IndexMode::PointLookup {
            info!("{}: point-lookup index, skipping preload", self.source);
            return Ok(0);
        }

        let known = store
            .preload(&self.source)
            .map_err(|e| PersistenceError::new(format!("preload {}", self.source), e))?;
        let n = known.len();
        self.index = KnownIndex::new(known);
        info!("{}: {} known records preloaded", self.source, n);
        Ok(n)
    }

    pub fn classify(&mut self, url: &str, fingerprint: &str) -> Classification {
        if self.mode == IndexMode::PointLookup && !self.index.contains(url) {
            if let Some(store) = self.store {
                match store.lookup(&self.source, url) {
                    Ok(Some(fp)) => self.index.insert_stored(url, &fp),
                    Ok(None) => {}
                    Err(e) => warn!("lookup {} failed, treating as new: {:#}", url, e),
                }
            }
        }
        self.index.classify(url, fingerprint)
    }

    /// Write one record. Errors are logged and handed back for counting.
    pub fn upsert(&self, record: &Record, fingerprint: &str) -> Result<(), PersistenceError> {
        let Some(store) = self.store else { return Ok(()) };
        store.upsert(&self.source, record, fingerprint).map_err(|e| {
            let err = PersistenceError::new(format!("upsert {}", record.url), e);
            warn!("{:#}", err);
            err
        })
    }

    pub fn mark_accepted(&mut self, url: &str, fingerprint: &str) {
        self.index.insert_accepted(url, fingerprint);
    }

    pub fn index(&self) -> &KnownIndex {
        &self.index
    }

    pub fn begin_run(&self) -> Option<i64> {
        let store = self.store?;
        store
            .begin_run(&self.source)
            .map_err(|e| warn!("could not log run start: {:#}", e))
            .ok()
    }

    pub fn finish_run(&self, run_id: Option<i64>, summary: &RunSummary) {
        let (Some(store), Some(id)) = (self.store, run_id) else { return };
        if let Err(e) = store.finish_run(id, summary) {
            warn!("could not log run end: {:#}", e);
        }
    }
}
