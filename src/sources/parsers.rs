//! Selector helpers shared by the site adapters.
//!
//! Extraction never fails: a selector that does not parse or matches nothing
//! yields `None`, which adapters turn into the "N/A" sentinel.

use super::cleaner::clean_text;
use scraper::{ElementRef, Html, Selector};
use tracing::warn;

/// Parse a selector list, logging instead of failing on bad syntax.
pub fn selector(css: &str) -> Option<Selector> {
    match Selector::parse(css) {
        Ok(sel) => Some(sel),
        Err(e) => {
            warn!("bad selector {:?}: {:?}", css, e);
            None
        }
    }
}

/// Visible text of an element, whitespace collapsed.
pub fn element_text(el: ElementRef<'_>) -> String {
    clean_text(&el.text().collect::<String>())
}

/// Text of the first non-empty match under `el`.
pub fn first_text(el: ElementRef<'_>, css: &str) -> Option<String> {
    let sel = selector(css)?;
    el.select(&sel)
        .map(element_text)
        .find(|t| !t.is_empty())
}

/// Text of the first non-empty match anywhere in the document.
pub fn doc_text(doc: &Html, css: &str) -> Option<String> {
    first_text(doc.root_element(), css)
}

/// Texts of every non-empty match, in document order, capped at `limit`.
pub fn all_texts(el: ElementRef<'_>, css: &str, limit: usize) -> Vec<String> {
    let Some(sel) = selector(css) else {
        return Vec::new();
    };
    el.select(&sel)
        .map(element_text)
        .filter(|t| !t.is_empty())
        .take(limit)
        .collect()
}

/// First `attr` value among matches of `css`, optionally filtered.
pub fn first_attr(
    el: ElementRef<'_>,
    css: &str,
    attr: &str,
    accept: impl Fn(&str) -> bool,
) -> Option<String> {
    let sel = selector(css)?;
    el.select(&sel)
        .filter_map(|e| e.value().attr(attr))
        .find(|v| accept(v))
        .map(|v| v.to_string())
}

/// Whole-page text, lower-cased, for signal sniffing.
pub fn body_text_lower(doc: &Html) -> String {
    let text = match selector("body").and_then(|s| doc.select(&s).next()) {
        Some(body) => body.text().collect::<String>(),
        None => doc.root_element().text().collect::<String>(),
    };
    clean_text(&text).to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    const HTML: &str = r#"
        <html><body>
          <div class="card">
            <h3> </h3>
            <h3>  Data
                Analyst </h3>
            <a href="/about">About</a>
            <a href="/job/42">Apply</a>
            <span class="tag">SQL</span><span class="tag">Python</span><span class="tag"></span>
          </div>
        </body></html>
    "#;

    #[test]
    fn test_first_text_skips_empty_matches() {
        let doc = Html::parse_document(HTML);
        assert_eq!(doc_text(&doc, "h3").as_deref(), Some("Data Analyst"));
        assert_eq!(doc_text(&doc, ".missing"), None);
    }

    #[test]
    fn test_bad_selector_is_none() {
        let doc = Html::parse_document(HTML);
        assert_eq!(doc_text(&doc, "div[[["), None);
    }

    #[test]
    fn test_all_texts_and_attr() {
        let doc = Html::parse_document(HTML);
        let root = doc.root_element();
        assert_eq!(all_texts(root, ".tag", 10), vec!["SQL", "Python"]);
        assert_eq!(all_texts(root, ".tag", 1), vec!["SQL"]);
        assert_eq!(
            first_attr(root, "a", "href", |h| h.contains("/job/")).as_deref(),
            Some("/job/42")
        );
    }

    #[test]
    fn test_body_text_lower() {
        let doc = Html::parse_document("<html><body><p>Posted 2 DAYS ago</p></body></html>");
        assert_eq!(body_text_lower(&doc), "posted 2 days ago");
    }
}
