//! Error taxonomy for a crawl run.
//!
//! Only [`CrawlError::Initialization`] escapes a run. Navigation and
//! persistence failures are handled where they happen and end up as
//! counters in the run tally.

use thiserror::Error;

/// A single URL could not be loaded.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum NavigationError {
    #[error("timed out loading {url}")]
    Timeout { url: String },

    #[error("HTTP {status} from {url}")]
    Status { url: String, status: u16 },

    #[error("request to {url} failed: {reason}")]
    Transport { url: String, reason: String },

    #[error("document at {url} did not finish loading")]
    Incomplete { url: String },
}

impl NavigationError {
    pub fn url(&self) -> &str {
        match self {
            Self::Timeout { url }
            | Self::Status { url, .. }
            | Self::Transport { url, .. }
            | Self::Incomplete { url } => url,
        }
    }
}

/// The store rejected a read or write.
#[derive(Debug, Error)]
#[error("store error for {context}: {source}")]
pub struct PersistenceError {
    pub context: String,
    #[source]
    pub source: anyhow::Error,
}

impl PersistenceError {
    pub fn new(context: impl Into<String>, source: impl Into<anyhow::Error>) -> Self {
        Self {
            context: context.into(),
            source: source.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum CrawlError {
    /// Browser session or store could not be brought up.
    #[error("initialization failed: {0}")]
    Initialization(String),

    #[error("unknown source '{0}'")]
    UnknownSource(String),

    #[error(transparent)]
    Persistence(#[from] PersistenceError),
}
