use scraper::{ElementRef, Html, Selector};
use url::Url;

use crate::config::{PricePolicy, Selectors};
use crate::error::{CrawlError, Result};
use crate::parsers::price::parse_price;
use crate::results::ProductRecord;

/// A product card as found in the DOM, before normalization
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawCard {
    /// Link target as written in the markup, possibly relative
    pub href: String,
    pub title: Option<String>,
    pub price: Option<String>,
}

/// Compiled form of [`Selectors`]
#[derive(Debug, Clone)]
pub struct CatalogSelectors {
    card: Selector,
    link: Selector,
    title: Selector,
    price: Selector,
    next_page: Selector,
    next_page_css: String,
}

impl CatalogSelectors {
    pub fn new(selectors: &Selectors) -> Result<Self> {
        Ok(Self {
            card: compile("card", &selectors.card)?,
            link: compile("link", &selectors.link)?,
            title: compile("title", &selectors.title)?,
            price: compile("price", &selectors.price)?,
            next_page: compile("next_page", &selectors.next_page)?,
            next_page_css: selectors.next_page.clone(),
        })
    }

    /// The next-page selector as CSS text, for use inside the browser
    pub fn next_page_css(&self) -> &str {
        &self.next_page_css
    }
}

fn compile(name: &str, css: &str) -> Result<Selector> {
    Selector::parse(css)
        .map_err(|e| CrawlError::Config(format!("invalid {name} selector {css:?}: {e:?}")))
}

/// Extracts every product card that carries a link
pub fn extract_cards(html: &str, selectors: &CatalogSelectors) -> Vec<RawCard> {
    let doc = Html::parse_document(html);

    let cards = doc
        .select(&selectors.card)
        .filter_map(|card| {
            let href = card
                .select(&selectors.link)
                .next()
                .and_then(|link| link.value().attr("href"))
                .map(str::trim)
                .filter(|href| !href.is_empty())?;

            Some(RawCard {
                href: href.to_string(),
                title: first_text(card, &selectors.title),
                price: first_text(card, &selectors.price),
            })
        })
        .collect::<Vec<_>>();

    ::log::debug!("Catalog parser found {} cards", cards.len());
    cards
}

/// Link target of the next-page control, if the page has one
pub fn next_page_link(html: &str, selectors: &CatalogSelectors) -> Option<String> {
    let doc = Html::parse_document(html);
    doc.select(&selectors.next_page)
        .next()
        .and_then(|el| el.value().attr("href"))
        .map(str::trim)
        .filter(|href| !href.is_empty())
        .map(str::to_string)
}

fn first_text(scope: ElementRef<'_>, selector: &Selector) -> Option<String> {
    scope
        .select(selector)
        .next()
        .map(|el| el.text().collect::<String>())
}

/// Turns a raw card into a record
///
/// Returns `Ok(None)` for cards that must not be emitted: links that do not
/// resolve against `page_url`, and unparseable prices under
/// [`PricePolicy::SkipRecord`]. Under [`PricePolicy::AbortPage`] an
/// unparseable price is an error.
pub fn normalize_card(
    card: RawCard,
    page_url: &Url,
    policy: PricePolicy,
) -> Result<Option<ProductRecord>> {
    let url = match page_url.join(&card.href) {
        Ok(url) => url,
        Err(e) => {
            ::log::warn!("Skipping card with unresolvable link {:?}: {}", card.href, e);
            return Ok(None);
        }
    };

    let title = card
        .title
        .as_deref()
        .map(str::trim)
        .unwrap_or_default()
        .to_string();

    let price = match parse_price(card.price.as_deref()) {
        Ok(price) => price,
        Err(e) => match policy {
            PricePolicy::EmitZero => {
                ::log::warn!("{} at {}, emitting price 0.0", e, url);
                0.0
            }
            PricePolicy::SkipRecord => {
                ::log::warn!("{} at {}, skipping record", e, url);
                return Ok(None);
            }
            PricePolicy::AbortPage => return Err(e),
        },
    };

    Ok(Some(ProductRecord::new(url.to_string(), title, price)))
}
