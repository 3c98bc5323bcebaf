//! Chromium session driven over the DevTools protocol.
//!
//! Pages are rendered by a real browser, so client-side listings show up in
//! the returned markup. Infinite-scroll feeds live in their own tab and grow
//! by scrolling it, the way a visitor would.

use super::{ensure_debug_dir, polite_delay, snapshot, BrowserSession, Readiness};
use crate::config::BrowserConfig;
use crate::errors::{CrawlError, NavigationError};
use crate::models::Page;
use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::network::SetUserAgentOverrideParams;
use chromiumoxide::error::CdpError;
use chromiumoxide::{Browser, BrowserConfig as LaunchConfig, Page as Tab};
use futures::StreamExt;
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::Mutex as AsyncMutex;
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout, Instant};
use tracing::{debug, info, warn};

/// Resolves after the load event once no new resources arrived for 500ms.
const NETWORK_IDLE_JS: &str = r#"
    new Promise((resolve) => {
        const settle = () => {
            let last = performance.getEntriesByType('resource').length;
            const poll = setInterval(() => {
                const now = performance.getEntriesByType('resource').length;
                if (now === last) {
                    clearInterval(poll);
                    resolve('idle');
                }
                last = now;
            }, 500);
        };
        if (document.readyState === 'complete') {
            settle();
        } else {
            window.addEventListener('load', settle, { once: true });
        }
    })
"#;

const DOM_READY_JS: &str = r#"
    new Promise((resolve) => {
        if (document.readyState !== 'loading') {
            resolve(document.readyState);
        } else {
            document.addEventListener('DOMContentLoaded', () => resolve(document.readyState), { once: true });
        }
    })
"#;

const SCROLL_HEIGHT_JS: &str = "document.body ? document.body.scrollHeight : 0";
const SCROLL_TO_END_JS: &str =
    "window.scrollTo(0, document.body.scrollHeight); document.body.scrollHeight";

const SCROLL_POLL: Duration = Duration::from_millis(250);
const SCROLL_SETTLE_MAX: Duration = Duration::from_secs(10);

pub struct ChromeSession {
    browser: AsyncMutex<Browser>,
    tab: AsyncMutex<Tab>,
    /// Feed URL and the tab scrolled through it.
    feed_tab: AsyncMutex<Option<(String, Tab)>>,
    handler: JoinHandle<()>,
    config: BrowserConfig,
    history: Mutex<Vec<String>>,
}

impl ChromeSession {
    pub async fn launch(config: &BrowserConfig) -> Result<Self, CrawlError> {
        ensure_debug_dir(config)?;

        let mut builder =
            LaunchConfig::builder().request_timeout(Duration::from_secs(config.timeout_secs));
        if let Some(path) = &config.chrome_executable {
            builder = builder.chrome_executable(path);
        }
        // with_head means a visible window
        if !config.headless {
            builder = builder.with_head();
        }
        let launch = builder
            .arg("--disable-blink-features=AutomationControlled")
            .arg("--disable-dev-shm-usage")
            .arg("--no-first-run")
            .arg("--no-default-browser-check")
            .arg("--no-sandbox")
            .arg("--disable-gpu")
            .build()
            .map_err(|e| CrawlError::Initialization(format!("chrome config: {e}")))?;

        let (browser, mut events) = Browser::launch(launch)
            .await
            .map_err(|e| CrawlError::Initialization(format!("chrome launch: {e}")))?;

        let handler = tokio::spawn(async move {
            while let Some(event) = events.next().await {
                if event.is_err() {
                    break;
                }
            }
        });

        let tab = match open_tab(&browser, &config.user_agent).await {
            Ok(tab) => tab,
            Err(e) => {
                handler.abort();
                return Err(CrawlError::Initialization(format!("chrome tab: {e}")));
            }
        };
        info!("Chrome launched (headless: {})", config.headless);

        Ok(Self {
            browser: AsyncMutex::new(browser),
            tab: AsyncMutex::new(tab),
            feed_tab: AsyncMutex::new(None),
            handler,
            config: config.clone(),
            history: Mutex::new(Vec::new()),
        })
    }

    fn load_timeout(&self) -> Duration {
        Duration::from_secs(self.config.timeout_secs)
    }

    async fn wait_ready(
        &self,
        tab: &Tab,
        url: &str,
        readiness: Readiness,
    ) -> Result<(), NavigationError> {
        let script = match readiness {
            Readiness::NetworkIdle => NETWORK_IDLE_JS,
            Readiness::DomContentLoaded => DOM_READY_JS,
        };
        match timeout(self.load_timeout(), tab.evaluate(script.to_string())).await {
            Ok(Ok(result)) => {
                let state: String = result.into_value().unwrap_or_else(|_| "unknown".to_string());
                debug!("{} ready ({})", url, state);
                Ok(())
            }
            Ok(Err(e)) => Err(map_err(url, e)),
            Err(_) => Err(NavigationError::Timeout { url: url.to_string() }),
        }
    }

    async fn open_feed(&self, url: &str) -> Result<Tab, NavigationError> {
        debug!("Opening feed tab at {}", url);
        let tab = {
            let browser = self.browser.lock().await;
            open_tab(&browser, &self.config.user_agent)
                .await
                .map_err(|e| map_err(url, e))?
        };
        tab.goto(url).await.map_err(|e| map_err(url, e))?;
        self.wait_ready(&tab, url, Readiness::DomContentLoaded).await?;
        Ok(tab)
    }

    /// Scroll to the bottom and wait for the document to grow. A feed that
    /// stops growing is returned as is; the crawl loop sees no new cards.
    async fn scroll_to_end(
        &self,
        tab: &Tab,
        feed_url: &str,
        next_url: &str,
    ) -> Result<Page, NavigationError> {
        let before = height(tab, next_url).await?;
        tab.evaluate(SCROLL_TO_END_JS.to_string())
            .await
            .map_err(|e| map_err(next_url, e))?;

        let deadline = Instant::now() + self.load_timeout().min(SCROLL_SETTLE_MAX);
        loop {
            sleep(SCROLL_POLL).await;
            let now = height(tab, next_url).await?;
            if now > before {
                debug!("Feed grew {}px -> {}px", before, now);
                break;
            }
            if Instant::now() >= deadline {
                debug!("Feed at {} stopped growing at {}px", feed_url, now);
                break;
            }
        }

        let html = tab.content().await.map_err(|e| map_err(next_url, e))?;
        let page = Page::new(feed_url, 200, html);
        self.dump(&page);
        Ok(page)
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

impl Drop for ChromeSession {
    fn drop(&mut self) {
        self.handler.abort();
    }
}

async fn open_tab(browser: &Browser, user_agent: &str) -> Result<Tab, CdpError> {
    let tab = browser.new_page("about:blank").await?;
    tab.execute(SetUserAgentOverrideParams::new(user_agent.to_string()))
        .await?;
    Ok(tab)
}

async fn height(tab: &Tab, url: &str) -> Result<i64, NavigationError> {
    tab.evaluate(SCROLL_HEIGHT_JS.to_string())
        .await
        .map_err(|e| map_err(url, e))?
        .into_value::<i64>()
        .map_err(|e| NavigationError::Transport {
            url: url.to_string(),
            reason: format!("scroll height: {e}"),
        })
}

fn map_err(url: &str, e: CdpError) -> NavigationError {
    match e {
        CdpError::Timeout => NavigationError::Timeout { url: url.to_string() },
        other => NavigationError::Transport {
            url: url.to_string(),
            reason: other.to_string(),
        },
    }
}

#[async_trait]
impl BrowserSession for ChromeSession {
    async fn goto(&self, url: &str, readiness: Readiness) -> Result<Page, NavigationError> {
        polite_delay(&self.config).await;
        self.remember(url);
        debug!("Chrome {} ({:?})", url, readiness);

        let tab = self.tab.lock().await;
        tab.goto(url).await.map_err(|e| map_err(url, e))?;
        self.wait_ready(&tab, url, readiness).await?;

        let html = tab.content().await.map_err(|e| map_err(url, e))?;
        let final_url = tab
            .url()
            .await
            .map_err(|e| map_err(url, e))?
            .unwrap_or_else(|| url.to_string());

        let page = Page::new(final_url, 200, html);
        self.dump(&page);
        Ok(page)
    }

    async fn scroll(&self, feed: &Page, next_url: &str) -> Result<Page, NavigationError> {
        polite_delay(&self.config).await;
        self.remember(next_url);

        let mut slot = self.feed_tab.lock().await;
        let tab = match slot.take() {
            Some((url, tab)) if url == feed.url => tab,
            stale => {
                if let Some((_, old)) = stale {
                    if let Err(e) = old.close().await {
                        warn!("Could not close old feed tab: {}", e);
                    }
                }
                self.open_feed(&feed.url).await?
            }
        };

        let grown = self.scroll_to_end(&tab, &feed.url, next_url).await;
        *slot = Some((feed.url.clone(), tab));
        grown
    }

    fn history(&self) -> Vec<String> {
        self.history.lock().map(|h| h.clone()).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cdp_timeout_maps_to_navigation_timeout() {
        let err = map_err("https://example.com/a", CdpError::Timeout);
        assert_eq!(err, NavigationError::Timeout { url: "https://example.com/a".into() });
    }

    // needs a local Chromium
    #[tokio::test]
    #[ignore]
    async fn test_renders_and_scrolls_with_local_chrome() {
        let cfg = BrowserConfig {
            request_delay_ms: 0,
            jitter_ms: 0,
            ..BrowserConfig::default()
        };
        let session = ChromeSession::launch(&cfg).await.unwrap();

        let url = "data:text/html,<html><body><p id='x'>hi</p><script>document.getElementById('x').textContent='rendered'</script></body></html>";
        let page = session.goto(url, Readiness::NetworkIdle).await.unwrap();
        assert!(page.html.contains("rendered"));

        let grown = session.scroll(&page, url).await.unwrap();
        assert_eq!(grown.url, page.url);
        assert_eq!(session.history().len(), 2);
    }
}
