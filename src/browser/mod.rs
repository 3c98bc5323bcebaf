//! Browser session abstraction and the retrying navigator built on it.

#[cfg(feature = "browser")]
pub mod chrome_session;
pub mod http_session;
pub mod navigator;

use crate::config::{BrowserConfig, BrowserEngine};
use crate::errors::{CrawlError, NavigationError};
use crate::models::Page;
use async_trait::async_trait;
use rand::Rng;
use std::path::PathBuf;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{info, warn};

#[cfg(feature = "browser")]
pub use self::chrome_session::ChromeSession;
pub use self::http_session::HttpSession;
pub use self::navigator::Navigator;

/// How far a load must progress before the page counts as loaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    /// Full document received.
    NetworkIdle,
    /// Content arrived and parses, may be truncated.
    DomContentLoaded,
}

/// A controlled browsing session shared by every navigation of a run.
///
/// Methods take `&self`; implementations keep cookies and history behind
/// interior mutability so the navigator can retry through shared borrows.
#[async_trait]
pub trait BrowserSession: Send + Sync {
    async fn goto(&self, url: &str, readiness: Readiness) -> Result<Page, NavigationError>;

    /// Load the next increment of a continuous feed and return the grown feed.
    async fn scroll(&self, feed: &Page, next_url: &str) -> Result<Page, NavigationError>;

    /// URLs requested so far, oldest first.
    fn history(&self) -> Vec<String>;
}

/// Open the session selected by `browser.engine`.
pub async fn open_session(config: &BrowserConfig) -> Result<Box<dyn BrowserSession>, CrawlError> {
    info!("Opening {:?} browser session (headless: {})", config.engine, config.headless);
    match config.engine {
        BrowserEngine::Http => Ok(Box::new(HttpSession::new(config)?)),
        #[cfg(feature = "browser")]
        BrowserEngine::Chrome => Ok(Box::new(ChromeSession::launch(config).await?)),
        #[cfg(not(feature = "browser"))]
        BrowserEngine::Chrome => Err(CrawlError::Initialization(
            "chrome engine not compiled in, rebuild with `--features browser`".to_string(),
        )),
    }
}

/// Sleep for the configured delay + random jitter.
pub(crate) async fn polite_delay(config: &BrowserConfig) {
    let jitter = if config.jitter_ms > 0 {
        rand::rng().random_range(0..=config.jitter_ms)
    } else {
        0
    };
    let total = Duration::from_millis(config.request_delay_ms + jitter);
    if !total.is_zero() {
        sleep(total).await;
    }
}

/// Write `page` as the `n`-th snapshot when a debug directory is configured.
pub(crate) fn snapshot(config: &BrowserConfig, n: usize, page: &Page) {
    let Some(dir) = &config.debug_dir else { return };
    let path: PathBuf = dir.join(format!("{n:05}.html"));
    if let Err(e) = std::fs::write(&path, &page.html) {
        warn!("Could not write debug snapshot {:?}: {}", path, e);
    }
}

pub(crate) fn ensure_debug_dir(config: &BrowserConfig) -> Result<(), CrawlError> {
    if let Some(dir) = &config.debug_dir {
        std::fs::create_dir_all(dir).map_err(|e| {
            CrawlError::Initialization(format!("debug dir {}: {e}", dir.display()))
        })?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quiet() -> BrowserConfig {
        BrowserConfig {
            request_delay_ms: 0,
            jitter_ms: 0,
            ..BrowserConfig::default()
        }
    }

    #[tokio::test]
    async fn test_default_engine_opens_http_session() {
        let session = open_session(&quiet()).await.unwrap();
        assert!(session.history().is_empty());
    }

    #[cfg(not(feature = "browser"))]
    #[tokio::test]
    async fn test_chrome_engine_requires_feature() {
        let cfg = BrowserConfig {
            engine: BrowserEngine::Chrome,
            ..quiet()
        };
        let err = open_session(&cfg).await.err().unwrap();
        assert!(matches!(err, CrawlError::Initialization(ref m) if m.contains("--features browser")));
    }

    #[test]
    fn test_snapshot_writes_numbered_file() {
        let dir = std::env::temp_dir().join(format!("jobcrawl-snap-{}", std::process::id()));
        let cfg = BrowserConfig {
            debug_dir: Some(dir.clone()),
            ..quiet()
        };
        ensure_debug_dir(&cfg).unwrap();

        snapshot(&cfg, 3, &Page::new("https://x/1", 200, "<html></html>"));

        let written = std::fs::read_to_string(dir.join("00003.html")).unwrap();
        assert_eq!(written, "<html></html>");
        std::fs::remove_dir_all(&dir).ok();
    }
}
