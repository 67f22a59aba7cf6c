// Re-export modules
pub mod config;
pub mod crawlers;
pub mod error;
pub mod filter;
pub mod output;
pub mod parsers;
pub mod results;
pub mod utils;

// Re-export commonly used types for convenience
pub use config::{CatalogConfig, PricePolicy};
pub use error::{CrawlError, Result};
pub use results::{CrawlSummary, ProductRecord, StopReason};

use std::path::Path;
use tokio::sync::mpsc;

use crawlers::WebDriverBrowser;
use crawlers::category;

/// Main builder for a category crawl against a WebDriver browser
pub struct Catalog {
    config: CatalogConfig,
    webdriver_url: Option<String>,
}

impl Catalog {
    /// Crawl a single category with default settings
    pub fn new(start_url: &str) -> Self {
        Self::from_config(CatalogConfig::new(start_url))
    }

    pub fn from_config(config: CatalogConfig) -> Self {
        Self {
            config,
            webdriver_url: None,
        }
    }

    /// Load configuration from a JSON file, replacing the current one
    pub fn with_config_file(self, path: impl AsRef<Path>) -> Result<Self> {
        let config = CatalogConfig::from_file(path)?;
        Ok(Self { config, ..self })
    }

    /// Replace the start URLs; an empty list keeps the configured ones
    pub fn with_start_urls(mut self, urls: Vec<String>) -> Self {
        if !urls.is_empty() {
            self.config.start_urls = urls;
        }
        self
    }

    /// Takes precedence over both the config file and `WEBDRIVER_URL`
    pub fn with_webdriver_url(mut self, url: impl Into<String>) -> Self {
        self.webdriver_url = Some(url.into());
        self
    }

    /// Stop each category after this many pages
    pub fn with_max_pages(mut self, max_pages: usize) -> Self {
        self.config.max_pages = Some(max_pages);
        self
    }

    pub fn with_price_policy(mut self, policy: PricePolicy) -> Self {
        self.config.price_policy = policy;
        self
    }

    pub fn with_headless(mut self, headless: bool) -> Self {
        self.config.browser.headless = headless;
        self
    }

    pub fn config(&self) -> &CatalogConfig {
        &self.config
    }

    /// Resolve the WebDriver URL and check everything that can fail before a browser exists
    fn prepare(mut self) -> Result<CatalogConfig> {
        if let Some(url) = self.webdriver_url {
            self.config.webdriver_url = url;
        } else if let Ok(url) = std::env::var("WEBDRIVER_URL") {
            if !url.is_empty() {
                self.config.webdriver_url = url;
            }
        }

        self.config.validate()?;
        parsers::CatalogSelectors::new(&self.config.selectors)?;
        filter::UrlFilter::from_config(&self.config)
            .map_err(|e| CrawlError::Config(format!("invalid URL pattern: {e}")))?;
        for url in &self.config.start_urls {
            error::parse_url(url)?;
        }
        Ok(self.config)
    }

    /// Start the crawler and get a receiver for product records
    pub async fn generate(self) -> Result<mpsc::Receiver<ProductRecord>> {
        let config = self.prepare()?;
        ::log::info!("Connecting to WebDriver at {}", config.webdriver_url);
        let browser = WebDriverBrowser::connect(&config).await?;
        category::start(config, browser)
    }
}
