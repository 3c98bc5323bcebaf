pub mod cleaner;
pub mod internshala;
pub mod naukri;
pub mod parsers;
pub mod unstop;

use crate::config::AppConfig;
use crate::errors::CrawlError;
use crate::models::{fields, Card, CrawlMode, Page, Record};

pub use self::internshala::Internshala;
pub use self::naukri::Naukri;
pub use self::unstop::Unstop;

// ── Source trait ──────────────────────────────────────────────────────────────

/// Everything the crawl engine needs to know about one listing site.
///
/// Extraction is synchronous: pages arrive fully loaded and `scraper::Html`
/// documents never live across an await point.
pub trait SourceAdapter: Send + Sync {
    fn name(&self) -> &'static str;

    fn mode(&self) -> CrawlMode;

    /// Listing URL for a page number or scroll increment.
    fn listing_url(&self, offset: u32) -> String;

    fn extract_cards(&self, page: &Page) -> Vec<Card>;

    /// Enrich a card with its detail page. `url` is the card's detail link.
    fn extract_detail(&self, page: &Page, card: &Card, url: &str, offset: u32) -> Record;

    /// Fields whose change makes a stored record stale, in hashing order.
    fn material_fields(&self) -> &'static [&'static str];

    /// Intra-run duplicate key. `None` marks the record as incomplete.
    fn discovery_key(&self, record: &Record) -> Option<String> {
        let title = record.available(fields::TITLE)?;
        let org = record.available(fields::ORGANIZATION)?;
        let location = record.available(fields::LOCATION).unwrap_or("");
        Some(format!("{title}|{org}|{location}"))
    }
}

// ── Registry ──────────────────────────────────────────────────────────────────

pub const SOURCE_NAMES: &[&str] = &[internshala::NAME, unstop::NAME, naukri::NAME];

/// Build the adapter registered under `name`.
pub fn build(name: &str, config: &AppConfig) -> Result<Box<dyn SourceAdapter>, CrawlError> {
    let sources = &config.sources;
    match name.trim().to_lowercase().as_str() {
        internshala::NAME => Ok(Box::new(Internshala::new(&sources.internshala))),
        unstop::NAME => Ok(Box::new(Unstop::new(&sources.unstop))),
        naukri::NAME => Ok(Box::new(Naukri::new(
            &sources.naukri,
            config.crawl.freshness_window_days,
        ))),
        other => Err(CrawlError::UnknownSource(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_builds_every_source() {
        let cfg = AppConfig::default();
        for name in SOURCE_NAMES {
            let adapter = build(name, &cfg).unwrap();
            assert_eq!(adapter.name(), *name);
            assert!(!adapter.material_fields().is_empty());
        }
        assert!(matches!(
            build("monster", &cfg),
            Err(CrawlError::UnknownSource(_))
        ));
    }

    #[test]
    fn test_default_discovery_key() {
        let cfg = AppConfig::default();
        let adapter = build("internshala", &cfg).unwrap();

        let full = Record::new("https://x/1", 1)
            .with(fields::TITLE, "Web Dev")
            .with(fields::ORGANIZATION, "Acme")
            .with(fields::LOCATION, "Pune");
        assert_eq!(adapter.discovery_key(&full).as_deref(), Some("Web Dev|Acme|Pune"));

        let no_loc = Record::new("https://x/2", 1)
            .with(fields::TITLE, "Web Dev")
            .with(fields::ORGANIZATION, "Acme");
        assert_eq!(adapter.discovery_key(&no_loc).as_deref(), Some("Web Dev|Acme|"));

        let no_org = Record::new("https://x/3", 1).with(fields::TITLE, "Web Dev");
        assert_eq!(adapter.discovery_key(&no_org), None);
    }
}
