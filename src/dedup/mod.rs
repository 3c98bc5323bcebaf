//! Content fingerprints and change classification.

use crate::models::Record;
use sha2::{Digest, Sha256};
use std::collections::{HashMap, HashSet};

const DELIMITER: &str = "|";

/// SHA-256 (hex) over the material fields in the given order.
///
/// A missing field hashes as the empty string, so the fingerprint depends only
/// on field values, never on how the record's map was assembled.
pub fn fingerprint(record: &Record, material: &[&str]) -> String {
    let joined = material
        .iter()
        .map(|name| record.get(name).unwrap_or(""))
        .collect::<Vec<_>>()
        .join(DELIMITER);

    let mut hasher = Sha256::new();
    hasher.update(joined.as_bytes());
    hex::encode(hasher.finalize())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    New,
    Changed,
    Unchanged,
}

impl Classification {
    pub fn is_accepted(self) -> bool {
        !matches!(self, Self::Unchanged)
    }
}

pub fn classify(previous: Option<&str>, current: &str) -> Classification {
    match previous {
        None => Classification::New,
        Some(prev) if prev == current => Classification::Unchanged,
        Some(_) => Classification::Changed,
    }
}

// ── Known-record index ────────────────────────────────────────────────────────

/// Snapshot of stored fingerprints plus what this run has accepted.
///
/// Preloaded entries are never removed; accepted records are layered on top
/// and win over the snapshot.
#[derive(Debug, Default)]
pub struct KnownIndex {
    stored: HashMap<String, String>,
    accepted: HashMap<String, String>,
}

impl KnownIndex {
    pub fn new(stored: HashMap<String, String>) -> Self {
        Self {
            stored,
            accepted: HashMap::new(),
        }
    }

    pub fn fingerprint_of(&self, url: &str) -> Option<&str> {
        self.accepted
            .get(url)
            .or_else(|| self.stored.get(url))
            .map(String::as_str)
    }

    pub fn contains(&self, url: &str) -> bool {
        self.fingerprint_of(url).is_some()
    }

    pub fn classify(&self, url: &str, fingerprint: &str) -> Classification {
        classify(self.fingerprint_of(url), fingerprint)
    }

    pub fn insert_accepted(&mut self, url: &str, fingerprint: &str) {
        self.accepted.insert(url.to_string(), fingerprint.to_string());
    }

    /// Cache a fingerprint fetched by point lookup.
    pub fn insert_stored(&mut self, url: &str, fingerprint: &str) {
        self.stored.insert(url.to_string(), fingerprint.to_string());
    }

    pub fn stored_len(&self) -> usize {
        self.stored.len()
    }

    pub fn accepted_len(&self) -> usize {
        self.accepted.len()
    }
}

/// Intra-run discovery keys; only ever suppresses repeats inside one run.
#[derive(Debug, Default)]
pub struct DiscoveryKeys {
    seen: HashSet<String>,
}

impl DiscoveryKeys {
    /// Returns false if the key was already seen this run.
    pub fn insert(&mut self, key: String) -> bool {
        self.seen.insert(key)
    }

    pub fn count(&self) -> usize {
        self.seen.len()
    }
}
