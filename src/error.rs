use thiserror::Error;

#[derive(Debug, Error)]
pub enum CrawlError {
    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Invalid URL {url}: {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("WebDriver session failed: {0}")]
    Session(String),

    #[error("Navigation failed: {0}")]
    Navigation(String),

    #[error("Script evaluation failed: {0}")]
    Script(String),

    #[error("Timeout waiting for: {0}")]
    Timeout(String),

    #[error("Screenshot failed: {0}")]
    Screenshot(String),

    #[error("Malformed price text: {0:?}")]
    MalformedPrice(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, CrawlError>;

/// Parse an absolute URL, keeping the offending string in the error
pub fn parse_url(url: &str) -> Result<url::Url> {
    url::Url::parse(url).map_err(|source| CrawlError::InvalidUrl {
        url: url.to_string(),
        source,
    })
}
