pub mod category;
pub mod crawler;
pub mod web;


pub use category::CategoryCrawler;
pub use crawler::{Browser, CatalogPage};
pub use web::{WebDriverBrowser, WebDriverPage};
