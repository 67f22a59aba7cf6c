use async_trait::async_trait;
use fantoccini::cookies::Cookie;
use fantoccini::error::CmdError;
use fantoccini::wd::{TimeoutConfiguration, WindowHandle};
use fantoccini::{Client, ClientBuilder};
use serde_json::{Map, Value, json};
use std::path::Path;
use std::time::{Duration, Instant};
use tokio::time::timeout;
use url::Url;

use crate::config::{CatalogConfig, CookieConfig};
use crate::crawlers::crawler::{Browser, CatalogPage};
use crate::error::{CrawlError, Result};

/// Chrome flags carried over from the storefront's scraping profile.
/// Headless, user agent, window size and language are added per config.
const CHROME_ARGS: &[&str] = &[
    "--disable-blink-features=AutomationControlled",
    "--disable-web-security",
    "--disable-extensions",
    "--disable-popup-blocking",
    "--disable-notifications",
    "--no-sandbox",
    "--disable-setuid-sandbox",
    "--disable-dev-shm-usage",
    "--disable-gpu",
];

/// Other places a WebDriver server commonly listens on
const FALLBACK_WEBDRIVER_URLS: &[&str] = &[
    "http://localhost:9515", // ChromeDriver default
    "http://127.0.0.1:4444",
];

/// Counts resource loads through an observer kept on `window`; the
/// resource-timing buffer alone stops growing once it is full
const SETTLE_PROBE_JS: &str = r#"
    if (window.__fixpriceResources === undefined) {
        window.__fixpriceResources = performance.getEntriesByType('resource').length;
        performance.setResourceTimingBufferSize(100000);
        new PerformanceObserver((list) => {
            window.__fixpriceResources += list.getEntries().length;
        }).observe({ type: 'resource' });
    }
    return {
        ready: document.readyState === 'complete',
        resources: window.__fixpriceResources
    };
"#;

const SCROLL_INTO_VIEW_JS: &str = r#"
    const el = document.querySelector(arguments[0]);
    if (el) {
        el.scrollIntoView();
        return true;
    }
    return false;
"#;

const DOCUMENT_HEIGHT_JS: &str = r#"
    return Math.max(
        document.body ? document.body.scrollHeight : 0,
        document.documentElement.scrollHeight
    );
"#;

/// Builds the W3C capabilities for a Chrome session
pub fn capabilities(config: &CatalogConfig) -> Map<String, Value> {
    let browser = &config.browser;

    let mut args: Vec<String> = Vec::new();
    if browser.headless {
        args.push("--headless=new".to_string());
    }
    args.extend(CHROME_ARGS.iter().map(|arg| arg.to_string()));
    args.push(format!("--user-agent={}", config.user_agent()));
    args.push(format!(
        "--window-size={},{}",
        browser.viewport_width, browser.viewport_height
    ));
    args.push(format!("--lang={}", browser.locale));
    args.extend(browser.extra_args.iter().cloned());

    let mut caps = Map::new();
    caps.insert("browserName".to_string(), json!("chrome"));
    caps.insert(
        "acceptInsecureCerts".to_string(),
        json!(browser.accept_insecure_certs),
    );
    caps.insert(
        "goog:chromeOptions".to_string(),
        json!({
            "args": args,
            "excludeSwitches": ["enable-automation"],
            "prefs": { "intl.accept_languages": browser.locale },
        }),
    );
    caps
}

/// A Chrome session driven over WebDriver
pub struct WebDriverBrowser {
    client: Client,
    main_window: WindowHandle,
}

impl WebDriverBrowser {
    /// Start a session against the configured WebDriver server
    pub async fn connect(config: &CatalogConfig) -> Result<Self> {
        let launch_timeout = Duration::from_millis(config.browser.launch_timeout_ms);
        let client = timeout(launch_timeout, connect_to_webdriver(config))
            .await
            .map_err(|_| {
                CrawlError::Timeout(format!(
                    "WebDriver session after {} ms",
                    config.browser.launch_timeout_ms
                ))
            })??;

        let navigation_timeout = config.pacing.navigation_timeout();
        client
            .update_timeouts(TimeoutConfiguration::new(
                Some(navigation_timeout),
                Some(navigation_timeout),
                None,
            ))
            .await
            .map_err(|e| cmd_error("setting timeouts", e))?;

        client
            .set_window_size(config.browser.viewport_width, config.browser.viewport_height)
            .await
            .map_err(|e| cmd_error("sizing window", e))?;

        let main_window = client
            .window()
            .await
            .map_err(|e| cmd_error("reading window handle", e))?;

        ::log::info!(
            "Browser session ready ({}x{}, Chrome/{})",
            config.browser.viewport_width,
            config.browser.viewport_height,
            config.browser.chrome_version
        );

        Ok(Self {
            client,
            main_window,
        })
    }
}

/// Connects to the configured WebDriver URL, then to the common fallbacks
async fn connect_to_webdriver(config: &CatalogConfig) -> Result<Client> {
    let webdriver_url = config.webdriver_url.as_str();
    let mut builder = ClientBuilder::native();
    builder.capabilities(capabilities(config));

    let first_error = match builder.connect(webdriver_url).await {
        Ok(client) => {
            ::log::debug!("Connected to WebDriver at {}", webdriver_url);
            return Ok(client);
        }
        Err(e) => {
            ::log::error!("Failed to connect to WebDriver at {}: {}", webdriver_url, e);
            e.to_string()
        }
    };

    for url in FALLBACK_WEBDRIVER_URLS.iter() {
        if *url == webdriver_url {
            continue;
        }

        ::log::info!("Trying fallback WebDriver URL: {}", url);
        if let Ok(client) = builder.connect(url).await {
            ::log::debug!("Connected to fallback WebDriver at {}", url);
            return Ok(client);
        }
    }

    ::log::error!(
        "Make sure a WebDriver server is running or set the WEBDRIVER_URL environment variable"
    );
    Err(CrawlError::Session(first_error))
}

/// Maps a WebDriver command failure, singling out a lost session
fn cmd_error(context: &str, error: CmdError) -> CrawlError {
    let message = error.to_string();
    if message.contains("Unable to find session") || message.contains("invalid session id") {
        ::log::warn!("Lost WebDriver session while {}", context);
        CrawlError::Session(format!("{context}: {message}"))
    } else {
        CrawlError::Navigation(format!("{context}: {message}"))
    }
}

fn script_error(context: &str, error: CmdError) -> CrawlError {
    match cmd_error(context, error) {
        CrawlError::Navigation(message) => CrawlError::Script(message),
        other => other,
    }
}

/// Quiet-period bookkeeping for the settle wait
#[derive(Debug)]
struct SettleTracker {
    idle: Duration,
    last_count: Option<u64>,
    quiet_since: Instant,
}

impl SettleTracker {
    fn new(idle: Duration, now: Instant) -> Self {
        Self {
            idle,
            last_count: None,
            quiet_since: now,
        }
    }

    /// True once the document is complete and the resource count has not
    /// moved for `idle`
    fn observe(&mut self, ready: bool, resources: Option<u64>, now: Instant) -> bool {
        if !ready || resources.is_none() || resources != self.last_count {
            self.last_count = resources;
            self.quiet_since = now;
            return false;
        }
        now.duration_since(self.quiet_since) >= self.idle
    }
}

/// Polls until the document is complete and no new resources have
/// appeared for `idle`
async fn settle_loop(client: &Client, idle: Duration, poll: Duration) -> Result<()> {
    let mut tracker = SettleTracker::new(idle, Instant::now());
    loop {
        let probe = client
            .execute(SETTLE_PROBE_JS, Vec::new())
            .await
            .map_err(|e| script_error("probing page state", e))?;
        let ready = probe.get("ready").and_then(Value::as_bool).unwrap_or(false);
        let resources = probe.get("resources").and_then(Value::as_u64);

        if tracker.observe(ready, resources, Instant::now()) {
            ::log::trace!("Page settled with {:?} resources", resources);
            return Ok(());
        }
        tokio::time::sleep(poll).await;
    }
}

/// Combines the two steps of closing a tab; the close error wins
fn release_result(closed: Result<()>, switched: Result<()>) -> Result<()> {
    match (closed, switched) {
        (Err(close), Err(switch)) => {
            ::log::warn!("Also failed to return to main window: {}", switch);
            Err(close)
        }
        (closed, switched) => closed.and(switched),
    }
}

#[async_trait]
impl Browser for WebDriverBrowser {
    type Page = WebDriverPage;

    async fn set_cookies(&self, origin: &Url, cookies: &[CookieConfig]) -> Result<()> {
        if cookies.is_empty() {
            return Ok(());
        }

        // WebDriver only accepts cookies for the domain currently loaded
        let mut root = origin.clone();
        root.set_path("/");
        root.set_query(None);
        root.set_fragment(None);
        self.client
            .goto(root.as_str())
            .await
            .map_err(|e| cmd_error("loading origin for cookies", e))?;

        for cookie in cookies {
            let mut wd_cookie = Cookie::new(cookie.name.clone(), cookie.value.clone());
            if let Some(host) = origin.host_str() {
                wd_cookie.set_domain(host.to_string());
            }
            wd_cookie.set_path("/");
            self.client
                .add_cookie(wd_cookie)
                .await
                .map_err(|e| cmd_error("adding cookie", e))?;
            ::log::debug!("Installed cookie {} for {}", cookie.name, root);
        }
        Ok(())
    }

    async fn open_page(&self) -> Result<WebDriverPage> {
        let window = self
            .client
            .new_window(true)
            .await
            .map_err(|e| cmd_error("opening tab", e))?;
        self.client
            .switch_to_window(window.handle.clone())
            .await
            .map_err(|e| cmd_error("switching to tab", e))?;

        Ok(WebDriverPage {
            client: self.client.clone(),
            parent: self.main_window.clone(),
        })
    }

    async fn shutdown(self) -> Result<()> {
        self.client
            .close()
            .await
            .map_err(|e| cmd_error("closing session", e))
    }
}

/// One browser tab owned by the crawl
pub struct WebDriverPage {
    client: Client,
    parent: WindowHandle,
}

#[async_trait]
impl CatalogPage for WebDriverPage {
    async fn goto(&mut self, url: &Url) -> Result<()> {
        self.client
            .goto(url.as_str())
            .await
            .map_err(|e| cmd_error(&format!("navigating to {url}"), e))
    }

    async fn wait_for_settle(
        &mut self,
        limit: Duration,
        idle: Duration,
        poll: Duration,
    ) -> Result<()> {
        let settle = settle_loop(&self.client, idle, poll);

        timeout(limit, settle).await.map_err(|_| {
            CrawlError::Timeout(format!("network idle after {} ms", limit.as_millis()))
        })?
    }

    async fn scroll_by(&mut self, pixels: u32) -> Result<()> {
        self.client
            .execute("window.scrollBy(0, arguments[0]); return true;", vec![json!(pixels)])
            .await
            .map_err(|e| script_error("scrolling", e))?;
        Ok(())
    }

    async fn scroll_into_view(&mut self, selector: &str) -> Result<bool> {
        let found = self
            .client
            .execute(SCROLL_INTO_VIEW_JS, vec![json!(selector)])
            .await
            .map_err(|e| script_error("scrolling to element", e))?;
        Ok(found.as_bool().unwrap_or(false))
    }

    async fn current_url(&mut self) -> Result<Url> {
        self.client
            .current_url()
            .await
            .map_err(|e| cmd_error("reading current URL", e))
    }

    async fn content(&mut self) -> Result<String> {
        self.client
            .source()
            .await
            .map_err(|e| script_error("reading page source", e))
    }

    async fn screenshot_full_page(&mut self, path: &Path) -> Result<()> {
        let (width, height) = self
            .client
            .get_window_size()
            .await
            .map_err(|e| CrawlError::Screenshot(e.to_string()))?;
        let document_height = self
            .client
            .execute(DOCUMENT_HEIGHT_JS, Vec::new())
            .await
            .map_err(|e| CrawlError::Screenshot(e.to_string()))?
            .as_u64()
            .unwrap_or(height);

        // WebDriver captures the viewport only; stretch it over the document
        let grown = document_height > height;
        if grown {
            self.client
                .set_window_size(width as u32, document_height as u32)
                .await
                .map_err(|e| CrawlError::Screenshot(e.to_string()))?;
        }

        let png = self.client.screenshot().await;

        if grown {
            if let Err(e) = self.client.set_window_size(width as u32, height as u32).await {
                ::log::warn!("Failed to restore window size after screenshot: {}", e);
            }
        }

        let png = png.map_err(|e| CrawlError::Screenshot(e.to_string()))?;
        tokio::fs::write(path, png).await?;
        ::log::debug!("Saved screenshot to {}", path.display());
        Ok(())
    }

    async fn close(self) -> Result<()> {
        // Switch back even if the tab did not close, or the session stays on a dead handle
        let closed = self
            .client
            .close_window()
            .await
            .map_err(|e| cmd_error("closing tab", e));
        let switched = self
            .client
            .switch_to_window(self.parent)
            .await
            .map_err(|e| cmd_error("switching back to main window", e));
        release_result(closed, switched)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chrome_args(caps: &Map<String, Value>) -> Vec<String> {
        caps["goog:chromeOptions"]["args"]
            .as_array()
            .unwrap()
            .iter()
            .map(|v| v.as_str().unwrap().to_string())
            .collect()
    }

    #[test]
    fn test_capabilities_default_profile() {
        let mut config = CatalogConfig::default();
        config.browser.chrome_version = 112;
        let caps = capabilities(&config);

        assert_eq!(caps["browserName"], "chrome");
        assert_eq!(caps["acceptInsecureCerts"], true);
        assert_eq!(
            caps["goog:chromeOptions"]["prefs"]["intl.accept_languages"],
            "ru-RU"
        );

        let args = chrome_args(&caps);
        assert!(args.contains(&"--headless=new".to_string()));
        assert!(args.contains(&"--no-sandbox".to_string()));
        assert!(args.contains(&"--disable-blink-features=AutomationControlled".to_string()));
        assert!(args.contains(&"--window-size=1920,1080".to_string()));
        assert!(args.contains(&"--lang=ru-RU".to_string()));
        assert!(
            args.iter()
                .any(|a| a.starts_with("--user-agent=") && a.contains("Chrome/112.0.0.0"))
        );
    }

    #[test]
    fn test_capabilities_headed_with_extra_args() {
        let mut config = CatalogConfig::default();
        config.browser.headless = false;
        config.browser.accept_insecure_certs = false;
        config.browser.extra_args = vec!["--proxy-server=socks5://127.0.0.1:1080".into()];
        let caps = capabilities(&config);

        let args = chrome_args(&caps);
        assert!(!args.iter().any(|a| a.starts_with("--headless")));
        assert_eq!(args.last().unwrap(), "--proxy-server=socks5://127.0.0.1:1080");
        assert_eq!(caps["acceptInsecureCerts"], false);
    }

    #[test]
    fn test_settle_probe_outlives_timing_buffer() {
        assert!(SETTLE_PROBE_JS.contains("setResourceTimingBufferSize"));
        assert!(SETTLE_PROBE_JS.contains("PerformanceObserver"));
        assert!(SETTLE_PROBE_JS.contains("observe({ type: 'resource' })"));
    }

    #[test]
    fn test_settle_waits_for_quiet_period() {
        let idle = Duration::from_millis(500);
        let t0 = Instant::now();
        let at = |ms: u64| t0 + Duration::from_millis(ms);
        let mut tracker = SettleTracker::new(idle, t0);

        // Still loading
        assert!(!tracker.observe(false, Some(10), at(0)));
        // Complete, but resources keep arriving past the old 250-entry cap
        assert!(!tracker.observe(true, Some(250), at(250)));
        assert!(!tracker.observe(true, Some(400), at(500)));
        assert!(!tracker.observe(true, Some(400), at(750)));
        // Quiet for the full idle period
        assert!(tracker.observe(true, Some(400), at(1000)));
    }

    #[test]
    fn test_settle_needs_a_resource_count() {
        let t0 = Instant::now();
        let mut tracker = SettleTracker::new(Duration::ZERO, t0);
        assert!(!tracker.observe(true, None, t0));
        assert!(!tracker.observe(true, None, t0 + Duration::from_secs(5)));
    }

    #[test]
    fn test_release_tries_both_steps() {
        let closed_ok = || Ok(());
        let close_err = || Err(CrawlError::Navigation("closing tab: no such window".into()));
        let switch_err = || Err(CrawlError::Session("switching back: invalid session id".into()));

        assert!(release_result(closed_ok(), closed_ok()).is_ok());
        assert!(matches!(
            release_result(closed_ok(), switch_err()),
            Err(CrawlError::Session(_))
        ));
        assert!(matches!(
            release_result(close_err(), closed_ok()),
            Err(CrawlError::Navigation(_))
        ));
        assert!(matches!(
            release_result(close_err(), switch_err()),
            Err(CrawlError::Navigation(_))
        ));
    }
}
