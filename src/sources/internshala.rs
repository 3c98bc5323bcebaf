//! Internshala: numbered internship listing pages.

use super::cleaner::{absolutize, find_posted_days, or_not_available, parse_posted_age};
use super::parsers::{all_texts, body_text_lower, doc_text, first_attr, first_text, selector};
use super::SourceAdapter;
use crate::config::InternshalaConfig;
use crate::models::{fields, Card, CrawlMode, Page, Record, NOT_AVAILABLE};
use scraper::Html;

pub const NAME: &str = "internshala";

const CARD_SEL: &str = "div.individual_internship, .internship_list_container li, li.internship";
const TITLE_SEL: &str = ".heading_4_5, .profile, h3, .job-internship-name, a[href*='/internship/']";
const COMPANY_SEL: &str = ".company_name a, .company, .company_name, a.company_name";
const LOCATION_SEL: &str = ".location, .location_link, .internship_location";
const STIPEND_SEL: &str = ".stipend, .stp";

const MATERIAL: &[&str] = &[
    fields::TITLE,
    fields::ORGANIZATION,
    fields::LOCATION,
    fields::STIPEND,
    fields::DURATION,
    fields::START_DATE,
    fields::APPLY_BY,
];

pub struct Internshala {
    base_url: String,
    search_path: String,
}

impl Internshala {
    pub fn new(config: &InternshalaConfig) -> Self {
        Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            search_path: config.search_path.trim_matches('/').to_string(),
        }
    }
}

/// Duration is not reliably classed; fall back to any "N months/weeks" span.
fn card_duration(card: scraper::ElementRef<'_>) -> Option<String> {
    first_text(card, ".duration").or_else(|| {
        all_texts(card, "span, div.item_body", 64)
            .into_iter()
            .find(|t| {
                let t = t.to_lowercase();
                t.starts_with(|c: char| c.is_ascii_digit())
                    && !t.contains('/')
                    && (t.contains("month") || t.contains("week"))
            })
    })
}

impl SourceAdapter for Internshala {
    fn name(&self) -> &'static str {
        NAME
    }

    fn mode(&self) -> CrawlMode {
        CrawlMode::Paginated
    }

    /// `/internships[/<search>]` for the first page, `/page-N/` after that.
    fn listing_url(&self, offset: u32) -> String {
        let mut url = format!("{}/internships", self.base_url);
        if !self.search_path.is_empty() {
            url.push('/');
            url.push_str(&self.search_path);
        }
        if offset > 1 {
            url.push_str(&format!("/page-{offset}/"));
        }
        url
    }

    fn extract_cards(&self, page: &Page) -> Vec<Card> {
        let doc = Html::parse_document(&page.html);
        let Some(card_sel) = selector(CARD_SEL) else {
            return Vec::new();
        };

        doc.select(&card_sel)
            .map(|el| {
                let mut card = Card {
                    url: first_attr(el, "a", "href", |h| h.contains("/internship/"))
                        .and_then(|h| absolutize(&self.base_url, &h)),
                    ..Card::default()
                };
                let found = [
                    (fields::TITLE, first_text(el, TITLE_SEL)),
                    (fields::ORGANIZATION, first_text(el, COMPANY_SEL)),
                    (fields::LOCATION, first_text(el, LOCATION_SEL)),
                    (fields::STIPEND, first_text(el, STIPEND_SEL)),
                    (fields::DURATION, card_duration(el)),
                ];
                for (name, value) in found {
                    if let Some(v) = value {
                        card.set(name, v);
                    }
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
            fields::STIPEND,
            fields::DURATION,
        ] {
            record.set(name, or_not_available(card.get(name)));
        }

        let detail = [
            (fields::START_DATE, ".start-date-container .item_body, .start_date"),
            (fields::APPLY_BY, ".apply_by .item_body"),
            (fields::APPLICANTS, ".applications_message .message, .total_applications"),
            (fields::OPENINGS, ".openings .item_body"),
            (fields::CATEGORY, ".profile_on_detail_page, h1.profile"),
        ];
        for (name, css) in detail {
            record.set(name, or_not_available(doc_text(&doc, css).as_deref()));
        }

        let skills = all_texts(doc.root_element(), ".round_tabs_container .round_tabs", 64);
        record.set(
            fields::SKILLS,
            if skills.is_empty() {
                NOT_AVAILABLE.to_string()
            } else {
                skills.join(", ")
            },
        );

        record.posted_age_days = doc_text(&doc, ".status-container, .posted_by_container")
            .and_then(|t| parse_posted_age(&t))
            .or_else(|| find_posted_days(&body_text_lower(&doc)));

        record
    }

    fn material_fields(&self) -> &'static [&'static str] {
        MATERIAL
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LISTING: &str = r#"
    <html><body><div class="internship_list_container">
      <div class="container-fluid individual_internship">
        <h3 class="job-internship-name"><a href="/internship/detail/rust-intern-at-acme123">Rust Intern</a></h3>
        <p class="company_name"><a href="/company/acme">Acme Labs</a></p>
        <div class="location"><a class="location_link">Bangalore</a></div>
        <span class="stipend">₹ 15,000 /month</span>
        <div class="item_body">3 Months</div>
      </div>
      <div class="container-fluid individual_internship">
        <h3 class="job-internship-name">Promoted banner</h3>
      </div>
    </div></body></html>"#;

    const DETAIL: &str = r#"
    <html><body>
      <div class="status-container"><div class="status">Posted 2 days ago</div></div>
      <div class="start-date-container"><div class="item_body"> Immediately </div></div>
      <div class="apply_by"><div class="item_body">12 Jul' 26</div></div>
      <div class="round_tabs_container"><span class="round_tabs">Rust</span><span class="round_tabs">SQL</span></div>
    </body></html>"#;

    fn adapter() -> Internshala {
        Internshala::new(&InternshalaConfig {
            base_url: "https://internshala.com/".into(),
            search_path: "/computer-science-internship/".into(),
        })
    }

    #[test]
    fn test_listing_url() {
        let a = adapter();
        assert_eq!(
            a.listing_url(1),
            "https://internshala.com/internships/computer-science-internship"
        );
        assert_eq!(
            a.listing_url(3),
            "https://internshala.com/internships/computer-science-internship/page-3/"
        );
        let all = Internshala::new(&InternshalaConfig::default());
        assert_eq!(all.listing_url(2), "https://internshala.com/internships/page-2/");
    }

    #[test]
    fn test_extract_cards() {
        let cards = adapter().extract_cards(&Page::new("https://internshala.com/internships", 200, LISTING));
        assert_eq!(cards.len(), 2);

        let c = &cards[0];
        assert_eq!(
            c.url.as_deref(),
            Some("https://internshala.com/internship/detail/rust-intern-at-acme123")
        );
        assert_eq!(c.get(fields::TITLE), Some("Rust Intern"));
        assert_eq!(c.get(fields::ORGANIZATION), Some("Acme Labs"));
        assert_eq!(c.get(fields::LOCATION), Some("Bangalore"));
        assert_eq!(c.get(fields::STIPEND), Some("₹ 15,000 /month"));
        assert_eq!(c.get(fields::DURATION), Some("3 Months"));

        // a card without a detail link still surfaces so it can be counted
        assert_eq!(cards[1].url, None);
    }

    #[test]
    fn test_extract_detail_defaults_missing_fields() {
        let a = adapter();
        let cards = a.extract_cards(&Page::new("", 200, LISTING));
        let url = cards[0].url.clone().unwrap();
        let r = a.extract_detail(&Page::new(url.clone(), 200, DETAIL), &cards[0], &url, 1);

        assert_eq!(r.url, url);
        assert_eq!(r.get(fields::START_DATE), Some("Immediately"));
        assert_eq!(r.get(fields::APPLY_BY), Some("12 Jul' 26"));
        assert_eq!(r.get(fields::OPENINGS), Some(NOT_AVAILABLE));
        assert_eq!(r.get(fields::SKILLS), Some("Rust, SQL"));
        assert_eq!(r.get(fields::TITLE), Some("Rust Intern"));
        assert_eq!(r.posted_age_days, Some(2));
    }
}
