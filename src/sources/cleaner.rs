use crate::models::NOT_AVAILABLE;
use regex::Regex;
use std::sync::LazyLock;
use url::Url;

// ── Text ──────────────────────────────────────────────────────────────────────

/// Collapse runs of whitespace (including newlines from nested tags).
/// "  Work from\n   home " → "Work from home"
pub fn clean_text(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Cleaned text, or the sentinel when nothing is left.
pub fn or_not_available(s: Option<&str>) -> String {
    match s.map(clean_text) {
        Some(t) if !t.is_empty() => t,
        _ => NOT_AVAILABLE.to_string(),
    }
}

/// Strip a leading "Label:" from stat lines. "Openings: 4" → "4"
pub fn strip_label(s: &str, label: &str) -> String {
    let s = clean_text(s);
    match s.find(label) {
        Some(i) => s[i + label.len()..].trim_start_matches(':').trim().to_string(),
        None => s,
    }
}

// ── URLs ──────────────────────────────────────────────────────────────────────

/// Resolve a possibly relative href against the site root.
/// ("https://unstop.com", "jobs/abc") → "https://unstop.com/jobs/abc"
pub fn absolutize(base: &str, href: &str) -> Option<String> {
    let href = href.trim();
    if href.is_empty() || href.starts_with('#') || href.starts_with("javascript:") {
        return None;
    }
    if let Ok(u) = Url::parse(href) {
        return Some(u.to_string());
    }
    let root = Url::parse(&format!("{}/", base.trim_end_matches('/'))).ok()?;
    let path = if href.starts_with('/') {
        href.to_string()
    } else {
        format!("/{href}")
    };
    root.join(&path).ok().map(|u| u.to_string())
}

// ── Freshness signal ──────────────────────────────────────────────────────────

static AGE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(\d{1,3})\s*\+?\s*(day|week|month)s?\s*ago").expect("valid age regex")
});

static POSTED_DAYS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)posted\s*(\d{1,3})\s*day").expect("valid posted regex"));

static RECENT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(today|just now|few hours ago|\d{1,2}\s*hours?\s*ago|few minutes ago)\b")
        .expect("valid recent regex")
});

/// Only the explicit "posted N day(s)" phrase; safe to run over a whole page.
pub fn find_posted_days(s: &str) -> Option<u32> {
    POSTED_DAYS_RE.captures(s).and_then(|c| c[1].parse().ok())
}

/// Parse "posted N days ago" style text into an age in days.
///
/// "Posted 3 days ago" → 3 | "30+ days ago" → 30 | "2 weeks ago" → 14
/// "1 month ago" → 30 | "Today" / "few hours ago" → 0 | anything else → None
pub fn parse_posted_age(s: &str) -> Option<u32> {
    if let Some(days) = find_posted_days(s) {
        return Some(days);
    }
    if let Some(c) = AGE_RE.captures(s) {
        let n: u32 = c[1].parse().ok()?;
        let unit = c[2].to_ascii_lowercase();
        return Some(match unit.as_str() {
            "week" => n * 7,
            "month" => n * 30,
            _ => n,
        });
    }
    if RECENT_RE.is_match(s) {
        return Some(0);
    }
    None
}
