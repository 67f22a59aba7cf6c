use serde::{Deserialize, Serialize};
use std::fmt;

/// One product card, normalized
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductRecord {
    /// Absolute URL of the product page
    pub url: String,

    /// Trimmed card title, empty when the card has none
    pub title: String,

    /// Current price, 0.0 when absent
    pub price_current: f64,

    /// Reserved, always 0.0
    pub price_original: f64,

    /// Reserved, always empty
    pub sale_tag: String,
}

impl ProductRecord {
    /// Create a record with the reserved fields left empty
    pub fn new(url: String, title: String, price_current: f64) -> Self {
        Self {
            url,
            title,
            price_current,
            price_original: 0.0,
            sale_tag: String::new(),
        }
    }
}

/// Why a crawl branch stopped
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    /// No next-page control on the last page
    LastPage,
    /// A page rendered without any product cards
    NoProducts,
    /// A contained failure (navigation, script, timeout, price)
    Failed(String),
    /// The configured page cap was reached
    PageLimit,
    /// The next page had already been visited in this run
    AlreadyVisited,
    /// The next page lies outside the allowed domains or patterns
    Offsite,
    /// The receiver was dropped
    ConsumerGone,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopReason::LastPage => write!(f, "no next page"),
            StopReason::NoProducts => write!(f, "no products found"),
            StopReason::Failed(message) => write!(f, "failed: {message}"),
            StopReason::PageLimit => write!(f, "page limit reached"),
            StopReason::AlreadyVisited => write!(f, "next page already visited"),
            StopReason::Offsite => write!(f, "next page is offsite"),
            StopReason::ConsumerGone => write!(f, "consumer went away"),
        }
    }
}

/// What one crawl branch did
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlSummary {
    pub start_url: String,
    pub pages_visited: usize,
    pub records_emitted: usize,
    pub stop: StopReason,
}
