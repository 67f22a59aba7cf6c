use async_trait::async_trait;
use std::path::Path;
use std::time::Duration;
use url::Url;

use crate::config::CookieConfig;
use crate::error::Result;

/// A browser that hands out one page (tab) at a time
#[async_trait]
pub trait Browser: Send + Sync + 'static {
    type Page: CatalogPage + 'static;

    /// Install cookies for the host of `origin` before anything is loaded from it
    async fn set_cookies(&self, origin: &Url, cookies: &[CookieConfig]) -> Result<()>;

    /// Open a fresh, blank page
    async fn open_page(&self) -> Result<Self::Page>;

    /// End the browser session
    async fn shutdown(self) -> Result<()>;
}

/// The primitives the category crawler needs from a loaded page
#[async_trait]
pub trait CatalogPage: Send {
    /// Navigate to `url`; returns once the document has loaded
    async fn goto(&mut self, url: &Url) -> Result<()>;

    /// Block until network activity has been quiet for `idle`, checking every
    /// `poll`, or fail once `timeout` has passed
    async fn wait_for_settle(&mut self, timeout: Duration, idle: Duration, poll: Duration)
    -> Result<()>;

    async fn scroll_by(&mut self, pixels: u32) -> Result<()>;

    /// Scroll the first element matching `selector` into view; false if absent
    async fn scroll_into_view(&mut self, selector: &str) -> Result<bool>;

    async fn current_url(&mut self) -> Result<Url>;

    /// Serialized rendered DOM
    async fn content(&mut self) -> Result<String>;

    /// Capture the whole document (not only the viewport) as PNG
    async fn screenshot_full_page(&mut self, path: &Path) -> Result<()>;

    /// Release the page
    async fn close(self) -> Result<()>;
}
