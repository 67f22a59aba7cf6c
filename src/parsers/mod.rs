pub mod catalog;
pub mod price;


pub use catalog::{CatalogSelectors, RawCard, extract_cards, next_page_link, normalize_card};
pub use price::parse_price;
