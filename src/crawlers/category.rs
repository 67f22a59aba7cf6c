use std::collections::HashSet;
use std::path::Path;
use tokio::sync::mpsc;
use url::Url;

use crate::config::CatalogConfig;
use crate::crawlers::crawler::{Browser, CatalogPage};
use crate::error::{CrawlError, Result, parse_url};
use crate::filter::UrlFilter;
use crate::parsers::{CatalogSelectors, extract_cards, next_page_link, normalize_card};
use crate::results::{CrawlSummary, ProductRecord, StopReason};
use crate::utils::pause;

/// Starts an async category crawl and returns a receiver that yields records as they are found.
///
/// The receiver closes once every start URL has been crawled to its end.
pub fn start<B: Browser>(config: CatalogConfig, browser: B) -> Result<mpsc::Receiver<ProductRecord>> {
    Ok(CategoryCrawler::new(config, browser)?.start())
}

/// How a page is reached; only the first page of a branch gets the scroll
/// nudge and the longer human pause
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Visit {
    First,
    Followup,
}

#[derive(Debug)]
enum PageOutcome {
    Next(Url),
    Stop(StopReason),
}

/// Walks category listings page by page, strictly one page at a time
pub struct CategoryCrawler<B: Browser> {
    browser: B,
    config: CatalogConfig,
    start_urls: Vec<Url>,
    selectors: CatalogSelectors,
    filter: UrlFilter,
    visited: HashSet<String>,
    requests_made: usize,
}

impl<B: Browser> CategoryCrawler<B> {
    /// Validate the configuration and prepare a crawler; no browser work happens here
    pub fn new(config: CatalogConfig, browser: B) -> Result<Self> {
        config.validate()?;
        let selectors = CatalogSelectors::new(&config.selectors)?;
        let filter = UrlFilter::from_config(&config)
            .map_err(|e| CrawlError::Config(format!("invalid URL pattern: {e}")))?;
        let start_urls = config
            .start_urls
            .iter()
            .map(|url| parse_url(url))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            browser,
            config,
            start_urls,
            selectors,
            filter,
            visited: HashSet::new(),
            requests_made: 0,
        })
    }

    /// Run the crawl in the background, yielding records through the returned receiver
    pub fn start(self) -> mpsc::Receiver<ProductRecord> {
        let (tx, rx) = mpsc::channel(self.config.channel_capacity);

        tokio::spawn(async move {
            let summaries = self.run(&tx).await;
            let records: usize = summaries.iter().map(|s| s.records_emitted).sum();
            ::log::info!(
                "Crawl finished: {} categories, {} records",
                summaries.len(),
                records
            );
        });

        rx
    }

    /// Crawl every start URL in order, then end the browser session
    pub async fn run(mut self, tx: &mpsc::Sender<ProductRecord>) -> Vec<CrawlSummary> {
        let mut summaries = Vec::with_capacity(self.start_urls.len());

        for start_url in self.start_urls.clone() {
            let summary = self.crawl_category(&start_url, tx).await;
            let consumer_gone = summary.stop == StopReason::ConsumerGone;
            summaries.push(summary);
            if consumer_gone {
                break;
            }
        }

        if let Err(e) = self.browser.shutdown().await {
            ::log::warn!("Failed to close browser session: {}", e);
        }
        summaries
    }

    /// Follow one category from `start_url` until it runs out of pages or stops
    pub async fn crawl_category(
        &mut self,
        start_url: &Url,
        tx: &mpsc::Sender<ProductRecord>,
    ) -> CrawlSummary {
        ::log::info!("Starting category crawl for: {}", start_url);

        let mut summary = CrawlSummary {
            start_url: start_url.to_string(),
            pages_visited: 0,
            records_emitted: 0,
            stop: StopReason::LastPage,
        };

        if let Err(e) = self
            .browser
            .set_cookies(start_url, &self.config.cookies)
            .await
        {
            ::log::error!("Failed to install cookies for {}: {}", start_url, e);
            summary.stop = StopReason::Failed(e.to_string());
            return summary;
        }

        let mut url = self.filter.normalize_url(start_url);
        let mut visit = Visit::First;

        loop {
            if self.visited.contains(url.as_str()) {
                ::log::debug!("Skipping already visited page: {}", url);
                summary.stop = StopReason::AlreadyVisited;
                break;
            }
            if self
                .config
                .max_pages
                .is_some_and(|max| summary.pages_visited >= max)
            {
                ::log::info!("Page limit reached before {}", url);
                summary.stop = StopReason::PageLimit;
                break;
            }

            self.visited.insert(url.to_string());
            summary.pages_visited += 1;

            match self
                .process_page(&url, visit, tx, &mut summary.records_emitted)
                .await
            {
                PageOutcome::Next(next) => {
                    ::log::info!("Following next page: {}", next);
                    url = next;
                    visit = Visit::Followup;
                }
                PageOutcome::Stop(reason) => {
                    summary.stop = reason;
                    break;
                }
            }
        }

        ::log::info!(
            "Category {} done: {} pages, {} records, stopped on {}",
            summary.start_url,
            summary.pages_visited,
            summary.records_emitted,
            summary.stop
        );
        summary
    }

    /// Detail pages are accepted but nothing is extracted from them
    pub async fn parse_product(&self, _page: &mut B::Page) {}

    /// Open a page, extract it, and close it again on every path
    async fn process_page(
        &mut self,
        url: &Url,
        visit: Visit,
        tx: &mpsc::Sender<ProductRecord>,
        emitted: &mut usize,
    ) -> PageOutcome {
        if self.requests_made > 0 {
            pause(self.config.pacing.request_delay.sample()).await;
        }
        self.requests_made += 1;

        let mut page = match self.browser.open_page().await {
            Ok(page) => page,
            Err(e) => {
                ::log::error!("Failed to open page for {}: {}", url, e);
                return PageOutcome::Stop(StopReason::Failed(e.to_string()));
            }
        };

        let outcome = match self.extract_page(&mut page, url, visit, tx, emitted).await {
            Ok(outcome) => outcome,
            Err(e) => {
                ::log::error!("Error parsing category {}: {}", url, e);
                self.capture(&mut page, &self.config.diagnostics.error_screenshot)
                    .await;
                PageOutcome::Stop(StopReason::Failed(e.to_string()))
            }
        };

        if let Err(e) = page.close().await {
            ::log::warn!("Failed to close page for {}: {}", url, e);
        }
        outcome
    }

    async fn extract_page(
        &self,
        page: &mut B::Page,
        url: &Url,
        visit: Visit,
        tx: &mpsc::Sender<ProductRecord>,
        emitted: &mut usize,
    ) -> Result<PageOutcome> {
        let pacing = &self.config.pacing;

        page.goto(url).await?;
        page.wait_for_settle(
            pacing.navigation_timeout(),
            pacing.settle_idle(),
            pacing.settle_poll(),
        )
        .await?;

        if visit == Visit::First {
            page.scroll_by(pacing.initial_scroll_px).await?;
            pause(pacing.initial_delay.sample()).await;
        }

        let page_url = page.current_url().await?;
        let html = page.content().await?;
        let cards = extract_cards(&html, &self.selectors);

        if cards.is_empty() {
            ::log::warn!("No products found at {}", page_url);
            self.capture(page, &self.config.diagnostics.no_products_screenshot)
                .await;
            return Ok(PageOutcome::Stop(StopReason::NoProducts));
        }
        ::log::info!("Found {} products at {}", cards.len(), page_url);

        for card in cards {
            let Some(record) = normalize_card(card, &page_url, self.config.price_policy)? else {
                continue;
            };

            ::log::trace!("Emitting {}", record.url);
            if tx.send(record).await.is_err() {
                ::log::info!("Record receiver dropped, stopping at {}", page_url);
                return Ok(PageOutcome::Stop(StopReason::ConsumerGone));
            }
            *emitted += 1;

            pause(pacing.card_delay.sample()).await;
        }

        if !page.scroll_into_view(self.selectors.next_page_css()).await? {
            ::log::debug!("No next page control at {}", page_url);
            return Ok(PageOutcome::Stop(StopReason::LastPage));
        }

        let html = page.content().await?;
        match next_page_link(&html, &self.selectors) {
            Some(href) => Ok(self.follow(&page_url, &href)),
            None => {
                ::log::debug!("Next page control at {} has no link", page_url);
                Ok(PageOutcome::Stop(StopReason::LastPage))
            }
        }
    }

    /// Decide whether the next-page link is crawled
    fn follow(&self, page_url: &Url, href: &str) -> PageOutcome {
        let next = match page_url.join(href) {
            Ok(next) => self.filter.normalize_url(&next),
            Err(e) => {
                ::log::warn!("Unresolvable next page link {:?} at {}: {}", href, page_url, e);
                return PageOutcome::Stop(StopReason::LastPage);
            }
        };

        if !self.filter.should_crawl(&next) {
            ::log::info!("Not following offsite next page: {}", next);
            return PageOutcome::Stop(StopReason::Offsite);
        }
        if self.visited.contains(next.as_str()) {
            ::log::info!("Next page already visited: {}", next);
            return PageOutcome::Stop(StopReason::AlreadyVisited);
        }
        PageOutcome::Next(next)
    }

    /// Best-effort diagnostic screenshot
    async fn capture(&self, page: &mut B::Page, path: &str) {
        match page.screenshot_full_page(Path::new(path)).await {
            Ok(()) => ::log::info!("Saved diagnostic screenshot to {}", path),
            Err(e) => ::log::warn!("Failed to capture screenshot {}: {}", path, e),
        }
    }
}
