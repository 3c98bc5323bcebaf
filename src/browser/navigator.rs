use super::{BrowserSession, Readiness};
use crate::config::NavigationConfig;
use crate::errors::NavigationError;
use crate::models::Page;
use std::time::Duration;
use tokio_retry::Retry;
use tracing::{debug, warn};

/// Loads URLs through a session with bounded, linearly backed-off retries.
///
/// Every attempt first waits for a full load and, if that fails, immediately
/// tries once more with the lighter `DomContentLoaded` condition. Only when
/// both fail does the attempt count as failed.
pub struct Navigator<'a> {
    session: &'a dyn BrowserSession,
    retry_base: Duration,
    retry_step: Duration,
}

impl<'a> Navigator<'a> {
    pub fn new(session: &'a dyn BrowserSession, config: &NavigationConfig) -> Self {
        Self {
            session,
            retry_base: Duration::from_millis(config.retry_base_ms),
            retry_step: Duration::from_millis(config.retry_step_ms),
        }
    }

    /// Delays slept between attempts: base, base + step, base + 2·step …
    fn backoff(&self, attempts: u32) -> Vec<Duration> {
        (0..attempts.saturating_sub(1))
            .map(|i| self.retry_base + self.retry_step * i)
            .collect()
    }

    pub async fn load(&self, url: &str, attempts: u32) -> Result<Page, NavigationError> {
        let session = self.session;
        let result = Retry::spawn(self.backoff(attempts), || async move {
            match session.goto(url, Readiness::NetworkIdle).await {
                Ok(page) => Ok(page),
                Err(e) => {
                    debug!("Full load of {} failed ({}), retrying lighter", url, e);
                    session.goto(url, Readiness::DomContentLoaded).await
                }
            }
        })
        .await;

        if let Err(e) = &result {
            warn!("Failed to load {} after {} attempt(s): {}", url, attempts.max(1), e);
        }
        result
    }

    /// Single lighter-readiness reload, used when a listing rendered without cards.
    pub async fn reload(&self, url: &str) -> Result<Page, NavigationError> {
        debug!("Reloading {}", url);
        self.session.goto(url, Readiness::DomContentLoaded).await
    }

    /// Grow a feed page by one scroll increment, same retry policy as `load`.
    pub async fn extend(
        &self,
        feed: &Page,
        next_url: &str,
        attempts: u32,
    ) -> Result<Page, NavigationError> {
        let session = self.session;
        let result = Retry::spawn(self.backoff(attempts), || async move {
            session.scroll(feed, next_url).await
        })
        .await;

        if let Err(e) = &result {
            warn!("Failed to scroll to {} after {} attempt(s): {}", next_url, attempts.max(1), e);
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Fails a scripted number of calls, then serves a page.
    struct FlakySession {
        failures: Mutex<u32>,
        calls: Mutex<Vec<(String, Readiness)>>,
    }

    impl FlakySession {
        fn failing(n: u32) -> Self {
            Self {
                failures: Mutex::new(n),
                calls: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> Vec<(String, Readiness)> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl BrowserSession for FlakySession {
        async fn goto(&self, url: &str, readiness: Readiness) -> Result<Page, NavigationError> {
            self.calls.lock().unwrap().push((url.to_string(), readiness));
            let mut left = self.failures.lock().unwrap();
            if *left > 0 {
                *left -= 1;
                return Err(NavigationError::Timeout { url: url.to_string() });
            }
            Ok(Page::new(url, 200, "<html></html>"))
        }

        async fn scroll(&self, feed: &Page, next_url: &str) -> Result<Page, NavigationError> {
            self.goto(next_url, Readiness::DomContentLoaded)
                .await
                .map(|p| Page::new(feed.url.clone(), 200, format!("{}{}", feed.html, p.html)))
        }

        fn history(&self) -> Vec<String> {
            self.calls().into_iter().map(|(u, _)| u).collect()
        }
    }

    fn instant() -> NavigationConfig {
        NavigationConfig {
            retry_base_ms: 0,
            retry_step_ms: 0,
            ..NavigationConfig::default()
        }
    }

    #[tokio::test]
    async fn test_lighter_readiness_rescues_attempt() {
        let session = FlakySession::failing(1);
        let nav = Navigator::new(&session, &instant());

        let page = nav.load("https://example.com/p", 3).await.unwrap();
        assert_eq!(page.url, "https://example.com/p");

        let calls = session.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].1, Readiness::NetworkIdle);
        assert_eq!(calls[1].1, Readiness::DomContentLoaded);
    }

    #[tokio::test]
    async fn test_gives_up_after_all_attempts() {
        let session = FlakySession::failing(100);
        let nav = Navigator::new(&session, &instant());

        let err = nav.load("https://example.com/p", 2).await.unwrap_err();
        assert_eq!(err.url(), "https://example.com/p");
        // two attempts, each full + lighter
        assert_eq!(session.calls().len(), 4);
    }

    #[tokio::test]
    async fn test_second_attempt_succeeds() {
        let session = FlakySession::failing(2);
        let nav = Navigator::new(&session, &instant());

        assert!(nav.load("https://example.com/p", 2).await.is_ok());
        assert_eq!(session.calls().len(), 3);
    }

    #[test]
    fn test_backoff_is_linear() {
        let session = FlakySession::failing(0);
        let nav = Navigator::new(&session, &NavigationConfig::default());
        assert_eq!(
            nav.backoff(3),
            vec![Duration::from_millis(1000), Duration::from_millis(2000)]
        );
        assert!(nav.backoff(1).is_empty());
        assert!(nav.backoff(0).is_empty());
    }

    #[tokio::test]
    async fn test_extend_appends_feed() {
        let session = FlakySession::failing(0);
        let nav = Navigator::new(&session, &instant());
        let feed = Page::new("https://example.com/feed", 200, "<a>");

        let grown = nav.extend(&feed, "https://example.com/feed?page=2", 1).await.unwrap();
        assert_eq!(grown.url, "https://example.com/feed");
        assert!(grown.html.starts_with("<a>"));
    }
}
