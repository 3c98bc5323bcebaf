//! Unstop: a single opportunity feed that grows as it is scrolled.

use super::cleaner::{absolutize, or_not_available, parse_posted_age};
use super::parsers::{all_texts, doc_text, first_text, selector};
use super::SourceAdapter;
use crate::config::UnstopConfig;
use crate::models::{fields, Card, CrawlMode, Page, Record, NOT_AVAILABLE};
use scraper::Html;

pub const NAME: &str = "unstop";

const CARD_SEL: &str = "a.item[class*='opp_']";

const MATERIAL: &[&str] = &[
    fields::TITLE,
    fields::ORGANIZATION,
    fields::LOCATION,
    fields::DEADLINE,
    fields::SALARY,
    fields::EXPERIENCE,
];

/// Card chips that describe the offer rather than where it is.
const NON_LOCATION_CHIPS: &[&str] = &[
    "full time",
    "part time",
    "internship",
    "in office",
    "remote",
    "hybrid",
];

pub struct Unstop {
    base_url: String,
    content_type: String,
}

impl Unstop {
    pub fn new(config: &UnstopConfig) -> Self {
        Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            content_type: config.content_type.trim().to_lowercase(),
        }
    }

    /// "jobs" → "Jobs"
    fn kind(&self) -> String {
        let mut chars = self.content_type.chars();
        match chars.next() {
            Some(first) => first.to_uppercase().chain(chars).collect(),
            None => String::new(),
        }
    }
}

/// Last chip that is neither pay, experience nor work mode.
fn location_from_chips(chips: &[String]) -> Option<String> {
    chips
        .iter()
        .filter(|t| {
            let l = t.to_lowercase();
            !(l.contains("salary")
                || l.contains("stipend")
                || l.contains("experience")
                || NON_LOCATION_CHIPS.contains(&l.as_str()))
        })
        .last()
        .cloned()
}

impl SourceAdapter for Unstop {
    fn name(&self) -> &'static str {
        NAME
    }

    fn mode(&self) -> CrawlMode {
        CrawlMode::InfiniteScroll
    }

    fn listing_url(&self, offset: u32) -> String {
        let url = format!("{}/{}?oppstatus=open", self.base_url, self.content_type);
        if offset > 1 {
            format!("{url}&page={offset}")
        } else {
            url
        }
    }

    fn extract_cards(&self, page: &Page) -> Vec<Card> {
        let doc = Html::parse_document(&page.html);
        let Some(card_sel) = selector(CARD_SEL) else {
            return Vec::new();
        };

        doc.select(&card_sel)
            .map(|el| {
                let mut card = Card {
                    url: el
                        .value()
                        .attr("href")
                        .and_then(|h| absolutize(&self.base_url, h)),
                    ..Card::default()
                };
                if let Some(t) = first_text(el, "h2") {
                    card.set(fields::TITLE, t);
                }
                if let Some(org) = first_text(el, "p.single-wrap") {
                    card.set(fields::ORGANIZATION, org);
                }
                let chips = all_texts(el, ".other_fields > div", 16);
                if let Some(loc) = location_from_chips(&chips) {
                    card.set(fields::LOCATION, loc);
                }
                card
            })
            .collect()
    }

    fn extract_detail(&self, page: &Page, card: &Card, url: &str, offset: u32) -> Record {
        let doc = Html::parse_document(&page.html);
        let mut record = Record::new(url, offset);

        for name in [
            fields::TITLE,
            fields::ORGANIZATION,
            fields::LOCATION,
            fields::DEADLINE,
            fields::APPLICANTS,
        ] {
            record.set(name, or_not_available(card.get(name)));
        }
        record.set(fields::KIND, self.kind());

        let detail = [
            (fields::SALARY, "[class*='salary'], [class*='stipend']"),
            (fields::EXPERIENCE, "[class*='experience']"),
            (fields::POSTED, "[class*='posted']"),
            (fields::DESCRIPTION, "[class*='description'], [class*='about']"),
        ];
        for (name, css) in detail {
            record.set(name, or_not_available(doc_text(&doc, css).as_deref()));
        }

        let skills = all_texts(doc.root_element(), "[class*='skill'], [class*='tag']", 20);
        record.set(
            fields::SKILLS,
            if skills.is_empty() {
                NOT_AVAILABLE.to_string()
            } else {
                skills.join(", ")
            },
        );

        record.posted_age_days = record
            .available(fields::POSTED)
            .and_then(parse_posted_age);

        record
    }

    fn material_fields(&self) -> &'static [&'static str] {
        MATERIAL
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FEED: &str = r#"
    <html><body><div class="user_list">
      <a class="item opp_1001" href="/jobs/backend-engineer-acme-1001">
        <h2>Backend Engineer</h2>
        <p class="single-wrap">Acme Corp</p>
        <div class="other_fields">
          <div>Full Time</div><div>Salary: 6 LPA</div><div>Hyderabad</div><div>In Office</div>
        </div>
      </a>
      <a class="item opp_1002" href="https://unstop.com/jobs/qa-1002"><h2>QA</h2></a>
      <a class="item banner" href="/promo">Promo</a>
    </div></body></html>"#;

    const DETAIL: &str = r#"
    <html><body>
      <div class="job-salary">₹ 6,00,000 /year</div>
      <div class="experience-box">0-1 years</div>
      <span class="posted-on">Posted 5 days ago</span>
      <div class="skill-chip">Go</div><div class="skill-chip">Postgres</div>
    </body></html>"#;

    fn adapter() -> Unstop {
        Unstop::new(&UnstopConfig::default())
    }

    #[test]
    fn test_listing_url_scroll_increments() {
        let a = adapter();
        assert_eq!(a.listing_url(1), "https://unstop.com/jobs?oppstatus=open");
        assert_eq!(a.listing_url(4), "https://unstop.com/jobs?oppstatus=open&page=4");
        assert_eq!(a.mode(), CrawlMode::InfiniteScroll);
    }

    #[test]
    fn test_extract_cards() {
        let cards = adapter().extract_cards(&Page::new("", 200, FEED));
        assert_eq!(cards.len(), 2);
        assert_eq!(
            cards[0].url.as_deref(),
            Some("https://unstop.com/jobs/backend-engineer-acme-1001")
        );
        assert_eq!(cards[0].get(fields::ORGANIZATION), Some("Acme Corp"));
        assert_eq!(cards[0].get(fields::LOCATION), Some("Hyderabad"));
        assert_eq!(cards[1].get(fields::ORGANIZATION), None);
    }

    #[test]
    fn test_extract_detail() {
        let a = adapter();
        let cards = a.extract_cards(&Page::new("", 200, FEED));
        let url = cards[0].url.clone().unwrap();
        let r = a.extract_detail(&Page::new(url.clone(), 200, DETAIL), &cards[0], &url, 2);

        assert_eq!(r.get(fields::SALARY), Some("₹ 6,00,000 /year"));
        assert_eq!(r.get(fields::EXPERIENCE), Some("0-1 years"));
        assert_eq!(r.get(fields::DEADLINE), Some(NOT_AVAILABLE));
        assert_eq!(r.get(fields::DESCRIPTION), Some(NOT_AVAILABLE));
        assert_eq!(r.get(fields::SKILLS), Some("Go, Postgres"));
        assert_eq!(r.get(fields::KIND), Some("Jobs"));
        assert_eq!(r.posted_age_days, Some(5));
        assert_eq!(r.page, 2);
    }
}
