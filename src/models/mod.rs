use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Placeholder stored when a selector finds nothing on the page.
pub const NOT_AVAILABLE: &str = "N/A";

// ── Field names ───────────────────────────────────────────────────────────────

/// Canonical field names shared by every source adapter.
pub mod fields {
    pub const TITLE: &str = "title";
    pub const ORGANIZATION: &str = "organization";
    pub const LOCATION: &str = "location";
    pub const STIPEND: &str = "stipend";
    pub const SALARY: &str = "salary";
    pub const DURATION: &str = "duration";
    pub const START_DATE: &str = "start_date";
    pub const APPLY_BY: &str = "apply_by";
    pub const DEADLINE: &str = "deadline";
    pub const APPLICANTS: &str = "applicants";
    pub const OPENINGS: &str = "openings";
    pub const CATEGORY: &str = "category";
    pub const SKILLS: &str = "skills";
    pub const EXPERIENCE: &str = "experience";
    pub const DESCRIPTION: &str = "description";
    pub const POSTED: &str = "posted";
    pub const RATING: &str = "rating";
    pub const REVIEWS: &str = "reviews";
    pub const KIND: &str = "kind";
}

// ── Page ──────────────────────────────────────────────────────────────────────

/// A document loaded by the browser session.
#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    pub url: String,
    pub status: u16,
    pub html: String,
}

impl Page {
    pub fn new(url: impl Into<String>, status: u16, html: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            status,
            html: html.into(),
        }
    }
}

// ── Card ──────────────────────────────────────────────────────────────────────

/// One listing entry as it appears on an overview page.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Card {
    /// Absolute detail-page URL, when the card carries a usable link.
    pub url: Option<String>,
    pub fields: BTreeMap<String, String>,
}

impl Card {
    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    pub fn set(&mut self, name: &str, value: impl Into<String>) {
        self.fields.insert(name.to_string(), value.into());
    }
}

// ── Record ────────────────────────────────────────────────────────────────────

/// A fully enriched listing, keyed by its canonical URL.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Record {
    pub url: String,
    pub fields: BTreeMap<String, String>,
    /// Crawl offset (page number or scroll increment) the record was found at.
    pub page: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub posted_age_days: Option<u32>,
}

impl Record {
    pub fn new(url: impl Into<String>, page: u32) -> Self {
        Self {
            url: url.into(),
            fields: BTreeMap::new(),
            page,
            posted_age_days: None,
        }
    }

    /// Start from the fields the card already carried.
    pub fn from_card(url: impl Into<String>, card: &Card, page: u32) -> Self {
        Self {
            fields: card.fields.clone(),
            ..Self::new(url, page)
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    /// Field value with the sentinel treated as missing.
    pub fn available(&self, name: &str) -> Option<&str> {
        self.get(name)
            .map(str::trim)
            .filter(|v| !v.is_empty() && *v != NOT_AVAILABLE)
    }

    pub fn set(&mut self, name: &str, value: impl Into<String>) {
        self.fields.insert(name.to_string(), value.into());
    }

    #[cfg(test)]
    pub fn with(mut self, name: &str, value: impl Into<String>) -> Self {
        self.set(name, value);
        self
    }
}

// ── Crawl mode ────────────────────────────────────────────────────────────────

/// How a source exposes more content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CrawlMode {
    /// Discrete numbered pages.
    Paginated,
    /// A single feed that grows as it is scrolled.
    InfiniteScroll,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_available_ignores_sentinel() {
        let r = Record::new("https://example.com/a", 1)
            .with(fields::TITLE, "  Rust Intern ")
            .with(fields::ORGANIZATION, NOT_AVAILABLE)
            .with(fields::LOCATION, "");

        assert_eq!(r.available(fields::TITLE), Some("Rust Intern"));
        assert_eq!(r.available(fields::ORGANIZATION), None);
        assert_eq!(r.available(fields::LOCATION), None);
        assert_eq!(r.available(fields::SKILLS), None);
    }

    #[test]
    fn test_from_card_copies_fields() {
        let mut card = Card::default();
        card.set(fields::TITLE, "Backend Developer");
        let r = Record::from_card("https://example.com/job/1", &card, 4);
        assert_eq!(r.get(fields::TITLE), Some("Backend Developer"));
        assert_eq!(r.page, 4);
        assert!(r.posted_age_days.is_none());
    }
}
