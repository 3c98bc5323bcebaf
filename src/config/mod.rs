use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Top-level application configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default)]
    pub crawl: CrawlConfig,
    #[serde(default)]
    pub browser: BrowserConfig,
    #[serde(default)]
    pub navigation: NavigationConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub sources: SourcesConfig,
}

/// Crawl loop configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CrawlConfig {
    #[serde(default = "default_source")]
    pub source: String,

    /// First page number (or scroll increment) to visit.
    #[serde(default = "default_start_offset")]
    pub start_offset: u32,

    /// Page budget for paginated sources. 0 = unlimited.
    #[serde(default = "default_max_pages")]
    pub max_pages: u32,

    /// Scroll budget for infinite-scroll sources. 0 = unlimited.
    #[serde(default = "default_max_scrolls")]
    pub max_scrolls: u32,

    #[serde(default = "default_freshness_window_days")]
    pub freshness_window_days: Option<u32>,

    #[serde(default = "default_zero_cards_threshold")]
    pub zero_cards_threshold: u32,

    #[serde(default = "default_zero_new_threshold")]
    pub zero_new_threshold: u32,

    #[serde(default = "default_true")]
    pub reload_empty_listing: bool,

    #[serde(default)]
    pub index_mode: IndexMode,
}

/// How the known-record index answers "have we stored this URL before".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexMode {
    /// Load every URL + fingerprint of the source once at run start.
    #[default]
    Preload,
    /// Ask the store for one URL at a time.
    PointLookup,
}

/// Which session implementation drives page loads.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BrowserEngine {
    /// Plain HTTP client; server-rendered markup only.
    #[default]
    Http,
    /// Chromium over CDP (needs the `browser` cargo feature).
    Chrome,
}

/// Browser session configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BrowserConfig {
    #[serde(default)]
    pub engine: BrowserEngine,

    #[serde(default = "default_true")]
    pub headless: bool,

    /// Chromium binary; auto-detected when unset.
    #[serde(default)]
    pub chrome_executable: Option<PathBuf>,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default = "default_request_delay_ms")]
    pub request_delay_ms: u64,

    #[serde(default = "default_jitter_ms")]
    pub jitter_ms: u64,

    /// Write every loaded document here for inspection.
    #[serde(default)]
    pub debug_dir: Option<PathBuf>,
}

/// Retry policy for page loads
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NavigationConfig {
    #[serde(default = "default_listing_attempts")]
    pub listing_attempts: u32,

    #[serde(default = "default_detail_attempts")]
    pub detail_attempts: u32,

    #[serde(default = "default_retry_base_ms")]
    pub retry_base_ms: u64,

    #[serde(default = "default_retry_step_ms")]
    pub retry_step_ms: u64,
}

/// Storage configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    #[serde(default = "default_true")]
    pub run_migrations: bool,
}

/// Per-site settings for the bundled adapters
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct SourcesConfig {
    #[serde(default)]
    pub internshala: InternshalaConfig,
    #[serde(default)]
    pub unstop: UnstopConfig,
    #[serde(default)]
    pub naukri: NaukriConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct InternshalaConfig {
    #[serde(default = "default_internshala_url")]
    pub base_url: String,

    /// e.g. `computer-science-internship`; empty for all listings.
    #[serde(default)]
    pub search_path: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct UnstopConfig {
    #[serde(default = "default_unstop_url")]
    pub base_url: String,

    /// `jobs` or `internships`
    #[serde(default = "default_unstop_content_type")]
    pub content_type: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NaukriConfig {
    #[serde(default = "default_naukri_url")]
    pub base_url: String,

    #[serde(default)]
    pub function_gid: Option<String>,

    /// Server-side `jobAge` filter; falls back to the freshness window.
    #[serde(default)]
    pub job_age_days: Option<u32>,
}

// ── Defaults ─────────────────────────────────────────────────────────────────

fn default_source() -> String {
    "internshala".to_string()
}
fn default_start_offset() -> u32 {
    1
}
fn default_max_pages() -> u32 {
    5
}
fn default_max_scrolls() -> u32 {
    15
}
fn default_freshness_window_days() -> Option<u32> {
    Some(30)
}
fn default_zero_cards_threshold() -> u32 {
    2
}
fn default_zero_new_threshold() -> u32 {
    3
}
fn default_user_agent() -> String {
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/122.0.0.0 Safari/537.36".to_string()
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_request_delay_ms() -> u64 {
    1000
}
fn default_jitter_ms() -> u64 {
    500
}
fn default_listing_attempts() -> u32 {
    3
}
fn default_detail_attempts() -> u32 {
    2
}
fn default_retry_base_ms() -> u64 {
    1000
}
fn default_retry_step_ms() -> u64 {
    1000
}
fn default_db_path() -> PathBuf {
    PathBuf::from("data/jobcrawl.duckdb")
}
fn default_internshala_url() -> String {
    "https://internshala.com".to_string()
}
fn default_unstop_url() -> String {
    "https://unstop.com".to_string()
}
fn default_unstop_content_type() -> String {
    "jobs".to_string()
}
fn default_naukri_url() -> String {
    "https://www.naukri.com".to_string()
}
fn default_true() -> bool {
    true
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            source: default_source(),
            start_offset: default_start_offset(),
            max_pages: default_max_pages(),
            max_scrolls: default_max_scrolls(),
            freshness_window_days: default_freshness_window_days(),
            zero_cards_threshold: default_zero_cards_threshold(),
            zero_new_threshold: default_zero_new_threshold(),
            reload_empty_listing: true,
            index_mode: IndexMode::default(),
        }
    }
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            engine: BrowserEngine::default(),
            headless: true,
            chrome_executable: None,
            user_agent: default_user_agent(),
            timeout_secs: default_timeout_secs(),
            request_delay_ms: default_request_delay_ms(),
            jitter_ms: default_jitter_ms(),
            debug_dir: None,
        }
    }
}

impl Default for NavigationConfig {
    fn default() -> Self {
        Self {
            listing_attempts: default_listing_attempts(),
            detail_attempts: default_detail_attempts(),
            retry_base_ms: default_retry_base_ms(),
            retry_step_ms: default_retry_step_ms(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            db_path: default_db_path(),
            run_migrations: true,
        }
    }
}

impl Default for InternshalaConfig {
    fn default() -> Self {
        Self {
            base_url: default_internshala_url(),
            search_path: String::new(),
        }
    }
}

impl Default for UnstopConfig {
    fn default() -> Self {
        Self {
            base_url: default_unstop_url(),
            content_type: default_unstop_content_type(),
        }
    }
}

impl Default for NaukriConfig {
    fn default() -> Self {
        Self {
            base_url: default_naukri_url(),
            function_gid: None,
            job_age_days: None,
        }
    }
}

// ── Loader ───────────────────────────────────────────────────────────────────

impl AppConfig {
    /// Load configuration from file + environment overrides
    pub fn load() -> Result<Self> {
        dotenv::dotenv().ok();

        let cfg = config::Config::builder()
            .add_source(
                config::File::with_name("config/default")
                    .required(false)
                    .format(config::FileFormat::Toml),
            )
            .add_source(
                config::File::with_name("config/local")
                    .required(false)
                    .format(config::FileFormat::Toml),
            )
            .add_source(
                config::Environment::with_prefix("JOBCRAWL")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("Failed to assemble configuration")?;

        cfg.try_deserialize().context("Invalid configuration")
    }
}
