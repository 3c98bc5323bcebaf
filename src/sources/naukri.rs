//! Naukri: numbered fresher job search pages.

use super::cleaner::{absolutize, or_not_available, parse_posted_age, strip_label};
use super::parsers::{all_texts, body_text_lower, doc_text, element_text, selector};
use super::SourceAdapter;
use crate::config::NaukriConfig;
use crate::models::{fields, Card, CrawlMode, Page, Record};
use scraper::Html;

pub const NAME: &str = "naukri";

/// Tried in order; the first that matches anything wins.
const CARD_SELS: &[&str] = &["div.srp-jobtuple-wrapper", "div.cust-job-tuple"];
const CARD_LINK_SELS: &[&str] = &["a[title]", ".title a", "h3 a", "h2 a", "a.title"];
const NO_RESULT_SEL: &str = ".noResultContainer, .no-result, .emptyResults";
const NO_RESULT_TEXT: &[&str] = &["no jobs found", "no results found"];

const MATERIAL: &[&str] = &[
    fields::TITLE,
    fields::ORGANIZATION,
    fields::RATING,
    fields::REVIEWS,
    fields::EXPERIENCE,
    fields::SALARY,
    fields::LOCATION,
    fields::POSTED,
    fields::OPENINGS,
    fields::APPLICANTS,
];

pub struct Naukri {
    base_url: String,
    function_gid: Option<String>,
    job_age_days: Option<u32>,
}

impl Naukri {
    /// `freshness_window` seeds the server-side age filter when none is set.
    pub fn new(config: &NaukriConfig, freshness_window: Option<u32>) -> Self {
        Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            function_gid: config.function_gid.clone().filter(|g| !g.trim().is_empty()),
            job_age_days: config.job_age_days.or(freshness_window),
        }
    }

    fn is_empty_result(doc: &Html) -> bool {
        if selector(NO_RESULT_SEL).is_some_and(|s| doc.select(&s).next().is_some()) {
            return true;
        }
        let body = body_text_lower(doc);
        NO_RESULT_TEXT.iter().any(|t| body.contains(t))
    }
}

impl SourceAdapter for Naukri {
    fn name(&self) -> &'static str {
        NAME
    }

    fn mode(&self) -> CrawlMode {
        CrawlMode::Paginated
    }

    /// `/jobs-in-india` then `/jobs-in-india-N`, fresher filters in the query.
    fn listing_url(&self, offset: u32) -> String {
        let path = if offset <= 1 {
            format!("{}/jobs-in-india", self.base_url)
        } else {
            format!("{}/jobs-in-india-{}", self.base_url, offset)
        };

        let mut params = vec![
            "clusters=experience%2CFreshness".to_string(),
            "experience=0".to_string(),
        ];
        if let Some(days) = self.job_age_days {
            params.push(format!("jobAge={days}"));
        }
        if let Some(gid) = &self.function_gid {
            params.push(format!("functionAreaIdGid={gid}"));
        }
        format!("{}?{}", path, params.join("&"))
    }

    fn extract_cards(&self, page: &Page) -> Vec<Card> {
        let doc = Html::parse_document(&page.html);
        if Self::is_empty_result(&doc) {
            return Vec::new();
        }

        let Some(card_sel) = CARD_SELS
            .iter()
            .filter_map(|css| selector(css))
            .find(|s| doc.select(s).next().is_some())
        else {
            return Vec::new();
        };

        doc.select(&card_sel)
            .map(|el| {
                let mut card = Card::default();
                let link = CARD_LINK_SELS
                    .iter()
                    .filter_map(|css| selector(css))
                    .find_map(|s| el.select(&s).next());
                if let Some(a) = link {
                    let title = element_text(a);
                    if !title.is_empty() {
                        card.set(fields::TITLE, title);
                    }
                    card.url = a
                        .value()
                        .attr("href")
                        .and_then(|h| absolutize(&self.base_url, h));
                }
                card
            })
            .collect()
    }

    fn extract_detail(&self, page: &Page, card: &Card, url: &str, offset: u32) -> Record {
        let doc = Html::parse_document(&page.html);
        let mut record = Record::new(url, offset);

        let header = [
            (fields::TITLE, "h1[class*='jd-header-title']"),
            (fields::ORGANIZATION, "div[class*='jd-header-comp-name'] a"),
            (fields::RATING, "span[class*='amb-rating']"),
            (fields::REVIEWS, "span[class*='amb-reviews']"),
            (fields::EXPERIENCE, "div[class*='jhc__exp'] span"),
            (fields::SALARY, "div[class*='jhc__salary'] span"),
            (fields::LOCATION, "span[class*='jhc__location']"),
        ];
        for (name, css) in header {
            record.set(name, or_not_available(doc_text(&doc, css).as_deref()));
        }
        if record.available(fields::TITLE).is_none() {
            record.set(fields::TITLE, or_not_available(card.get(fields::TITLE)));
        }

        let mut posted = None;
        let mut openings = None;
        let mut applicants = None;
        for stat in all_texts(doc.root_element(), "span[class*='jhc__stat']", 16) {
            if stat.contains("Posted:") {
                posted = Some(strip_label(&stat, "Posted"));
            } else if stat.contains("Openings:") {
                openings = Some(strip_label(&stat, "Openings"));
            } else if stat.contains("Applicants:") {
                applicants = Some(strip_label(&stat, "Applicants"));
            }
        }
        record.set(fields::POSTED, or_not_available(posted.as_deref()));
        record.set(fields::OPENINGS, or_not_available(openings.as_deref()));
        record.set(fields::APPLICANTS, or_not_available(applicants.as_deref()));

        record.posted_age_days = posted.as_deref().and_then(parse_posted_age);
        record
    }

    fn material_fields(&self) -> &'static [&'static str] {
        MATERIAL
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NOT_AVAILABLE;

    const LISTING: &str = r#"
    <html><body>
      <div class="srp-jobtuple-wrapper"><div class="cust-job-tuple">
        <h2><a class="title" title="Graduate Engineer Trainee" href="https://www.naukri.com/job-listings-get-123">Graduate Engineer Trainee</a></h2>
      </div></div>
      <div class="srp-jobtuple-wrapper"><div class="cust-job-tuple">
        <a title="Support Associate" href="/job-listings-support-456">Support Associate</a>
      </div></div>
    </body></html>"#;

    const DETAIL: &str = r#"
    <html><body>
      <h1 class="styles_jd-header-title__rZwM1">Graduate Engineer Trainee</h1>
      <div class="styles_jd-header-comp-name__MvqAI"><a href="/c">Initech</a></div>
      <span class="styles_amb-rating__4UyFL">3.9</span>
      <div class="styles_jhc__exp__k_giM"><span>0-1 Yrs</span></div>
      <span class="styles_jhc__location__W_pVs">Chennai</span>
      <span class="styles_jhc__stat__PgY67">Posted: 3 days ago</span>
      <span class="styles_jhc__stat__PgY67">Openings: 10</span>
      <span class="styles_jhc__stat__PgY67">Applicants: 100+</span>
    </body></html>"#;

    fn adapter() -> Naukri {
        Naukri::new(
            &NaukriConfig {
                function_gid: Some("3".into()),
                ..NaukriConfig::default()
            },
            Some(1),
        )
    }

    #[test]
    fn test_listing_url() {
        let a = adapter();
        assert_eq!(
            a.listing_url(1),
            "https://www.naukri.com/jobs-in-india?clusters=experience%2CFreshness&experience=0&jobAge=1&functionAreaIdGid=3"
        );
        assert!(a.listing_url(2).starts_with("https://www.naukri.com/jobs-in-india-2?"));

        let open = Naukri::new(&NaukriConfig::default(), None);
        assert_eq!(
            open.listing_url(1),
            "https://www.naukri.com/jobs-in-india?clusters=experience%2CFreshness&experience=0"
        );
    }

    #[test]
    fn test_extract_cards_uses_outer_wrapper_once() {
        let cards = adapter().extract_cards(&Page::new("", 200, LISTING));
        assert_eq!(cards.len(), 2);
        assert_eq!(cards[0].get(fields::TITLE), Some("Graduate Engineer Trainee"));
        assert_eq!(
            cards[1].url.as_deref(),
            Some("https://www.naukri.com/job-listings-support-456")
        );
    }

    #[test]
    fn test_no_result_page_has_no_cards() {
        let html = r#"<html><body><div class="noResultContainer">No jobs found</div>
            <div class="srp-jobtuple-wrapper"><a title="x" href="/y">x</a></div></body></html>"#;
        assert!(adapter().extract_cards(&Page::new("", 200, html)).is_empty());
    }

    #[test]
    fn test_extract_detail_stats() {
        let a = adapter();
        let card = Card::default();
        let r = a.extract_detail(&Page::new("", 200, DETAIL), &card, "https://www.naukri.com/j/1", 1);

        assert_eq!(r.get(fields::TITLE), Some("Graduate Engineer Trainee"));
        assert_eq!(r.get(fields::ORGANIZATION), Some("Initech"));
        assert_eq!(r.get(fields::RATING), Some("3.9"));
        assert_eq!(r.get(fields::REVIEWS), Some(NOT_AVAILABLE));
        assert_eq!(r.get(fields::EXPERIENCE), Some("0-1 Yrs"));
        assert_eq!(r.get(fields::OPENINGS), Some("10"));
        assert_eq!(r.get(fields::APPLICANTS), Some("100+"));
        assert_eq!(r.get(fields::POSTED), Some("3 days ago"));
        assert_eq!(r.posted_age_days, Some(3));
    }
}
