use super::{ensure_debug_dir, polite_delay, snapshot, BrowserSession, Readiness};
use crate::config::BrowserConfig;
use crate::errors::{CrawlError, NavigationError};
use crate::models::Page;
use async_trait::async_trait;
use std::sync::Mutex;
use std::time::Duration;
use tracing::{debug, warn};

/// Cookie-carrying HTTP session standing in for a headless browser tab.
pub struct HttpSession {
    inner: reqwest::Client,
    config: BrowserConfig,
    history: Mutex<Vec<String>>,
}

impl HttpSession {
    pub fn new(config: &BrowserConfig) -> Result<Self, CrawlError> {
        if !config.headless {
            warn!("HTTP sessions have no visible window, set browser.engine = \"chrome\" to watch the crawl");
        }

        let inner = reqwest::Client::builder()
            .user_agent(&config.user_agent)
            .timeout(Duration::from_secs(config.timeout_secs))
            .gzip(true)
            // Accept cookies so session-based pages work
            .cookie_store(true)
            .build()
            .map_err(|e| CrawlError::Initialization(format!("HTTP client: {e}")))?;

        ensure_debug_dir(config)?;

        Ok(Self {
            inner,
            config: config.clone(),
            history: Mutex::new(Vec::new()),
        })
    }

    async fn fetch(&self, url: &str) -> Result<Page, NavigationError> {
        polite_delay(&self.config).await;
        self.remember(url);
        debug!("GET {}", url);

        let resp = self.inner.get(url).send().await.map_err(|e| map_err(url, e))?;
        let status = resp.status();
        let final_url = resp.url().to_string();

        if !status.is_success() {
            return Err(NavigationError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let html = resp.text().await.map_err(|e| map_err(url, e))?;
        Ok(Page::new(final_url, status.as_u16(), html))
    }

    fn remember(&self, url: &str) {
        if let Ok(mut h) = self.history.lock() {
            h.push(url.to_string());
        }
    }

    fn dump(&self, page: &Page) {
        let n = self.history.lock().map(|h| h.len()).unwrap_or(0);
        snapshot(&self.config, n, page);
    }
}

fn map_err(url: &str, e: reqwest::Error) -> NavigationError {
    if e.is_timeout() {
        NavigationError::Timeout { url: url.to_string() }
    } else {
        NavigationError::Transport {
            url: url.to_string(),
            reason: e.to_string(),
        }
    }
}

/// True once the closing html tag has arrived.
pub fn is_complete_document(html: &str) -> bool {
    html.to_ascii_lowercase().contains("</html>")
}

#[async_trait]
impl BrowserSession for HttpSession {
    async fn goto(&self, url: &str, readiness: Readiness) -> Result<Page, NavigationError> {
        let page = self.fetch(url).await?;

        if readiness == Readiness::NetworkIdle && !is_complete_document(&page.html) {
            return Err(NavigationError::Incomplete { url: url.to_string() });
        }

        self.dump(&page);
        Ok(page)
    }

    async fn scroll(&self, feed: &Page, next_url: &str) -> Result<Page, NavigationError> {
        let chunk = self.fetch(next_url).await?;
        let grown = Page::new(
            feed.url.clone(),
            feed.status,
            format!("{}\n{}", feed.html, chunk.html),
        );
        self.dump(&grown);
        Ok(grown)
    }

    fn history(&self) -> Vec<String> {
        self.history.lock().map(|h| h.clone()).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_complete_document_detection() {
        assert!(is_complete_document("<html><body>x</body></HTML>"));
        assert!(!is_complete_document("<html><body>x"));
    }

    #[test]
    fn test_new_session_starts_with_empty_history() {
        let cfg = BrowserConfig {
            request_delay_ms: 0,
            jitter_ms: 0,
            ..BrowserConfig::default()
        };
        let session = HttpSession::new(&cfg).unwrap();
        assert!(session.history().is_empty());
    }
}
