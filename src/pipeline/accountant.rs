use std::fmt;
use tracing::info;

/// Why a card did not turn into an accepted record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SkipReason {
    NoDetailLink,
    DuplicateUrl,
    DuplicateDiscoveryKey,
    Stale,
    Unchanged,
    DetailFetchFailed,
    IncompleteRecord,
}

impl SkipReason {
    pub const ALL: [SkipReason; 7] = [
        Self::NoDetailLink,
        Self::DuplicateUrl,
        Self::DuplicateDiscoveryKey,
        Self::Stale,
        Self::Unchanged,
        Self::DetailFetchFailed,
        Self::IncompleteRecord,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NoDetailLink => "no_detail_link",
            Self::DuplicateUrl => "duplicate_url",
            Self::DuplicateDiscoveryKey => "duplicate_discovery_key",
            Self::Stale => "stale",
            Self::Unchanged => "unchanged",
            Self::DetailFetchFailed => "detail_fetch_failed",
            Self::IncompleteRecord => "incomplete_record",
        }
    }
}

/// Counters for one run. Observational only; nothing reads them to steer the crawl.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunTally {
    pub no_detail_link: usize,
    pub duplicate_url: usize,
    pub duplicate_discovery_key: usize,
    pub stale: usize,
    pub unchanged: usize,
    pub detail_fetch_failed: usize,
    pub incomplete_record: usize,
    pub accepted: usize,
    /// Accepted records whose write failed.
    pub upsert_failed: usize,
}

impl RunTally {
    pub fn skip(&mut self, reason: SkipReason) {
        *self.slot(reason) += 1;
    }

    pub fn count(&self, reason: SkipReason) -> usize {
        match reason {
            SkipReason::NoDetailLink => self.no_detail_link,
            SkipReason::DuplicateUrl => self.duplicate_url,
            SkipReason::DuplicateDiscoveryKey => self.duplicate_discovery_key,
            SkipReason::Stale => self.stale,
            SkipReason::Unchanged => self.unchanged,
            SkipReason::DetailFetchFailed => self.detail_fetch_failed,
            SkipReason::IncompleteRecord => self.incomplete_record,
        }
    }

    fn slot(&mut self, reason: SkipReason) -> &mut usize {
        match reason {
            SkipReason::NoDetailLink => &mut self.no_detail_link,
            SkipReason::DuplicateUrl => &mut self.duplicate_url,
            SkipReason::DuplicateDiscoveryKey => &mut self.duplicate_discovery_key,
            SkipReason::Stale => &mut self.stale,
            SkipReason::Unchanged => &mut self.unchanged,
            SkipReason::DetailFetchFailed => &mut self.detail_fetch_failed,
            SkipReason::IncompleteRecord => &mut self.incomplete_record,
        }
    }

    pub fn skipped(&self) -> usize {
        SkipReason::ALL.iter().map(|r| self.count(*r)).sum()
    }

    pub fn log_summary(&self, source: &str, iterations: u32) {
        info!(
            "{}: {} iterations | {} accepted | {} skipped | {} write errors",
            source,
            iterations,
            self.accepted,
            self.skipped(),
            self.upsert_failed
        );
        for reason in SkipReason::ALL {
            info!("   · {:<24} {}", reason.as_str(), self.count(reason));
        }
    }
}

impl fmt::Display for RunTally {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "accepted={}", self.accepted)?;
        for reason in SkipReason::ALL {
            write!(f, " {}={}", reason.as_str(), self.count(reason))?;
        }
        write!(f, " upsert_failed={}", self.upsert_failed)
    }
}
