use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::time::Duration;

use crate::error::{CrawlError, Result};
use crate::utils;

/// Category crawled when no start URL is given
pub const DEFAULT_START_URL: &str =
    "https://fix-price.com/catalog/kosmetika-i-gigiena/ukhod-za-polostyu-rta";

/// Configuration for one crawl run
///
/// Built once and handed to the crawler; every randomized value that stays
/// fixed for the run (the Chrome version) is drawn when this is constructed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogConfig {
    /// Category pages to start from, crawled one after another
    #[serde(default = "default_start_urls")]
    pub start_urls: Vec<String>,

    /// Domains pagination may follow into (sub-domains included, empty = any)
    #[serde(default = "default_allowed_domains")]
    pub allowed_domains: Vec<String>,

    /// Regex patterns a next-page URL must match (empty = all)
    #[serde(default)]
    pub include_patterns: Vec<String>,

    /// Regex patterns that reject a next-page URL
    #[serde(default)]
    pub exclude_patterns: Vec<String>,

    /// Cookies installed for each start URL's host before the first load
    #[serde(default = "default_cookies")]
    pub cookies: Vec<CookieConfig>,

    /// URL for the WebDriver instance
    #[serde(default = "default_webdriver_url")]
    pub webdriver_url: String,

    #[serde(default)]
    pub browser: BrowserConfig,

    #[serde(default)]
    pub pacing: PacingConfig,

    #[serde(default)]
    pub selectors: Selectors,

    #[serde(default)]
    pub diagnostics: DiagnosticsConfig,

    /// What to do with a card whose price text is not a number
    #[serde(default)]
    pub price_policy: PricePolicy,

    /// Stop a branch after this many pages
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_pages: Option<usize>,

    /// Records buffered ahead of the consumer
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

/// A request cookie selecting the storefront variant
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CookieConfig {
    pub name: String,
    pub value: String,
}

/// Browser launch and context options
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowserConfig {
    #[serde(default = "default_true")]
    pub headless: bool,

    #[serde(default = "default_viewport_width")]
    pub viewport_width: u32,

    #[serde(default = "default_viewport_height")]
    pub viewport_height: u32,

    /// Browser UI/content language
    #[serde(default = "default_locale")]
    pub locale: String,

    /// Chrome major version advertised in the user agent
    #[serde(default = "utils::random_chrome_version")]
    pub chrome_version: u32,

    #[serde(default = "default_true")]
    pub accept_insecure_certs: bool,

    /// Bound on establishing the WebDriver session
    #[serde(default = "default_navigation_timeout_ms")]
    pub launch_timeout_ms: u64,

    /// Extra Chrome flags, e.g. "--proxy-server=..."
    #[serde(default)]
    pub extra_args: Vec<String>,
}

/// Timeouts and the human-pacing delays
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PacingConfig {
    /// Upper bound for a page load plus settle wait
    #[serde(default = "default_navigation_timeout_ms")]
    pub navigation_timeout_ms: u64,

    /// How long the network must stay quiet before a page counts as settled
    #[serde(default = "default_settle_idle_ms")]
    pub settle_idle_ms: u64,

    #[serde(default = "default_settle_poll_ms")]
    pub settle_poll_ms: u64,

    /// Scroll applied to the first page of a branch
    #[serde(default = "default_initial_scroll_px")]
    pub initial_scroll_px: u32,

    /// Pause after the first page of a branch has settled
    #[serde(default = "default_initial_delay")]
    pub initial_delay: DelayRange,

    /// Pause after each emitted record
    #[serde(default = "default_card_delay")]
    pub card_delay: DelayRange,

    /// Pause before every navigation after the first
    #[serde(default = "default_request_delay")]
    pub request_delay: DelayRange,
}

/// Inclusive millisecond range a delay is drawn from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelayRange {
    pub min_ms: u64,
    pub max_ms: u64,
}

/// CSS selectors for the listing markup
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Selectors {
    #[serde(default = "default_card_selector")]
    pub card: String,

    /// Link inside a card; cards without one are skipped
    #[serde(default = "default_link_selector")]
    pub link: String,

    #[serde(default = "default_title_selector")]
    pub title: String,

    #[serde(default = "default_price_selector")]
    pub price: String,

    #[serde(default = "default_next_page_selector")]
    pub next_page: String,
}

/// Where diagnostic screenshots go; files are overwritten on each capture
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiagnosticsConfig {
    #[serde(default = "default_no_products_screenshot")]
    pub no_products_screenshot: String,

    #[serde(default = "default_error_screenshot")]
    pub error_screenshot: String,
}

/// Handling of price text that cannot be converted to a number
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PricePolicy {
    /// Emit the record with a price of 0.0
    #[default]
    EmitZero,
    /// Drop the record, continue with the next card
    SkipRecord,
    /// Fail the whole page
    AbortPage,
}

fn default_start_urls() -> Vec<String> {
    vec![DEFAULT_START_URL.to_string()]
}

fn default_allowed_domains() -> Vec<String> {
    vec!["fix-price.com".to_string()]
}

fn default_cookies() -> Vec<CookieConfig> {
    vec![CookieConfig {
        name: "selectedCity".to_string(),
        value: "Екатеринбург".to_string(),
    }]
}

/// Default value for webdriver_url
fn default_webdriver_url() -> String {
    "http://localhost:4444".to_string()
}

fn default_channel_capacity() -> usize {
    1
}

fn default_true() -> bool {
    true
}

fn default_viewport_width() -> u32 {
    1920
}

fn default_viewport_height() -> u32 {
    1080
}

fn default_locale() -> String {
    "ru-RU".to_string()
}

fn default_navigation_timeout_ms() -> u64 {
    180_000
}

fn default_settle_idle_ms() -> u64 {
    500
}

fn default_settle_poll_ms() -> u64 {
    250
}

fn default_initial_scroll_px() -> u32 {
    500
}

fn default_initial_delay() -> DelayRange {
    DelayRange::new(2_000, 5_000)
}

fn default_card_delay() -> DelayRange {
    DelayRange::new(1_000, 3_000)
}

fn default_request_delay() -> DelayRange {
    DelayRange::new(3_000, 7_000)
}

fn default_card_selector() -> String {
    "div.product-card".to_string()
}

fn default_link_selector() -> String {
    "a.product-card__link".to_string()
}

fn default_title_selector() -> String {
    ".product-card__title".to_string()
}

fn default_price_selector() -> String {
    ".product-card__price".to_string()
}

fn default_next_page_selector() -> String {
    "a.pagination__item--arrow_right".to_string()
}

fn default_no_products_screenshot() -> String {
    "debug_no_products.png".to_string()
}

fn default_error_screenshot() -> String {
    "error_screenshot.png".to_string()
}

impl CatalogConfig {
    /// Create a configuration for a single start URL with default values
    pub fn new(start_url: &str) -> Self {
        Self {
            start_urls: vec![start_url.to_string()],
            allowed_domains: default_allowed_domains(),
            include_patterns: Vec::new(),
            exclude_patterns: Vec::new(),
            cookies: default_cookies(),
            webdriver_url: default_webdriver_url(),
            browser: BrowserConfig::default(),
            pacing: PacingConfig::default(),
            selectors: Selectors::default(),
            diagnostics: DiagnosticsConfig::default(),
            price_policy: PricePolicy::default(),
            max_pages: None,
            channel_capacity: default_channel_capacity(),
        }
    }

    /// Load configuration from a JSON file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut file = File::open(path)?;
        let mut contents = String::new();
        file.read_to_string(&mut contents)?;

        Self::from_json(&contents)
    }

    /// Load configuration from a JSON string
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the crawler cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.start_urls.is_empty() {
            return Err(CrawlError::Config("no start URLs".into()));
        }
        if self.channel_capacity == 0 {
            return Err(CrawlError::Config("channel_capacity must be at least 1".into()));
        }
        if self.max_pages == Some(0) {
            return Err(CrawlError::Config("max_pages must be at least 1".into()));
        }
        for (name, range) in [
            ("initial_delay", &self.pacing.initial_delay),
            ("card_delay", &self.pacing.card_delay),
            ("request_delay", &self.pacing.request_delay),
        ] {
            if range.min_ms > range.max_ms {
                return Err(CrawlError::Config(format!(
                    "{name}: min_ms {} exceeds max_ms {}",
                    range.min_ms, range.max_ms
                )));
            }
        }
        Ok(())
    }

    /// User agent string sent by the browser
    pub fn user_agent(&self) -> String {
        utils::chrome_user_agent(self.browser.chrome_version)
    }
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self::new(DEFAULT_START_URL)
    }
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: true,
            viewport_width: default_viewport_width(),
            viewport_height: default_viewport_height(),
            locale: default_locale(),
            chrome_version: utils::random_chrome_version(),
            accept_insecure_certs: true,
            launch_timeout_ms: default_navigation_timeout_ms(),
            extra_args: Vec::new(),
        }
    }
}

impl PacingConfig {
    pub fn navigation_timeout(&self) -> Duration {
        Duration::from_millis(self.navigation_timeout_ms)
    }

    pub fn settle_idle(&self) -> Duration {
        Duration::from_millis(self.settle_idle_ms)
    }

    pub fn settle_poll(&self) -> Duration {
        Duration::from_millis(self.settle_poll_ms)
    }

    /// No pauses at all, for tests and replaying local fixtures
    pub fn immediate() -> Self {
        Self {
            initial_delay: DelayRange::ZERO,
            card_delay: DelayRange::ZERO,
            request_delay: DelayRange::ZERO,
            ..Self::default()
        }
    }
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self {
            navigation_timeout_ms: default_navigation_timeout_ms(),
            settle_idle_ms: default_settle_idle_ms(),
            settle_poll_ms: default_settle_poll_ms(),
            initial_scroll_px: default_initial_scroll_px(),
            initial_delay: default_initial_delay(),
            card_delay: default_card_delay(),
            request_delay: default_request_delay(),
        }
    }
}

impl DelayRange {
    pub const ZERO: DelayRange = DelayRange { min_ms: 0, max_ms: 0 };

    pub const fn new(min_ms: u64, max_ms: u64) -> Self {
        Self { min_ms, max_ms }
    }

    /// Draw a delay from the range
    pub fn sample(&self) -> Duration {
        utils::random_delay(self.min_ms, self.max_ms)
    }
}

impl Default for Selectors {
    fn default() -> Self {
        Self {
            card: default_card_selector(),
            link: default_link_selector(),
            title: default_title_selector(),
            price: default_price_selector(),
            next_page: default_next_page_selector(),
        }
    }
}

impl Default for DiagnosticsConfig {
    fn default() -> Self {
        Self {
            no_products_screenshot: default_no_products_screenshot(),
            error_screenshot: default_error_screenshot(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_empty_json_uses_defaults() {
        let config = CatalogConfig::from_json("{}").unwrap();

        assert_eq!(config.start_urls, vec![DEFAULT_START_URL.to_string()]);
        assert_eq!(config.allowed_domains, vec!["fix-price.com".to_string()]);
        assert_eq!(config.cookies[0].name, "selectedCity");
        assert_eq!(config.cookies[0].value, "Екатеринбург");
        assert_eq!(config.pacing.navigation_timeout_ms, 180_000);
        assert_eq!(config.pacing.card_delay, DelayRange::new(1_000, 3_000));
        assert_eq!(config.pacing.request_delay, DelayRange::new(3_000, 7_000));
        assert_eq!(config.browser.viewport_width, 1920);
        assert_eq!(config.browser.viewport_height, 1080);
        assert_eq!(config.selectors.card, "div.product-card");
        assert_eq!(config.diagnostics.error_screenshot, "error_screenshot.png");
        assert_eq!(config.price_policy, PricePolicy::EmitZero);
        assert_eq!(config.channel_capacity, 1);
        assert!(config.max_pages.is_none());
    }

    #[test]
    fn test_chrome_version_in_range() {
        for _ in 0..50 {
            let config = CatalogConfig::default();
            assert!((100..=115).contains(&config.browser.chrome_version));
        }
    }

    #[test]
    fn test_user_agent_is_fixed_per_config() {
        let config = CatalogConfig::default();
        assert_eq!(config.user_agent(), config.user_agent());
        assert!(
            config
                .user_agent()
                .contains(&format!("Chrome/{}.0.0.0", config.browser.chrome_version))
        );
    }

    #[test]
    fn test_partial_sections() {
        let json = r#"{
            "start_urls": ["https://fix-price.com/catalog/a", "https://fix-price.com/catalog/b"],
            "price_policy": "abort-page",
            "max_pages": 3,
            "pacing": { "card_delay": { "min_ms": 0, "max_ms": 0 } },
            "browser": { "headless": false, "chrome_version": 110 }
        }"#;
        let config = CatalogConfig::from_json(json).unwrap();

        assert_eq!(config.start_urls.len(), 2);
        assert_eq!(config.price_policy, PricePolicy::AbortPage);
        assert_eq!(config.max_pages, Some(3));
        assert_eq!(config.pacing.card_delay, DelayRange::ZERO);
        // Untouched fields in a partially given section keep their defaults
        assert_eq!(config.pacing.initial_delay, DelayRange::new(2_000, 5_000));
        assert!(!config.browser.headless);
        assert_eq!(config.browser.chrome_version, 110);
        assert_eq!(config.browser.locale, "ru-RU");
    }

    #[test]
    fn test_validation_errors() {
        assert!(matches!(
            CatalogConfig::from_json(r#"{"start_urls": []}"#),
            Err(CrawlError::Config(_))
        ));
        assert!(matches!(
            CatalogConfig::from_json(r#"{"channel_capacity": 0}"#),
            Err(CrawlError::Config(_))
        ));
        assert!(matches!(
            CatalogConfig::from_json(r#"{"pacing": {"card_delay": {"min_ms": 5, "max_ms": 1}}}"#),
            Err(CrawlError::Config(_))
        ));
        assert!(matches!(
            CatalogConfig::from_json("not json"),
            Err(CrawlError::Json(_))
        ));
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"webdriver_url": "http://localhost:9515"}}"#).unwrap();

        let config = CatalogConfig::from_file(file.path()).unwrap();
        assert_eq!(config.webdriver_url, "http://localhost:9515");

        let missing = CatalogConfig::from_file("/nonexistent/catalog.json");
        assert!(matches!(missing, Err(CrawlError::Io(_))));
    }
}
