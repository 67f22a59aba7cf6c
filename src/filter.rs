use regex::Regex;
use url::Url;

use crate::config::CatalogConfig;

/// Decides whether a pagination link may be followed
#[derive(Debug, Default)]
pub struct UrlFilter {
    allowed_domains: Vec<String>,
    include_regexes: Vec<Regex>,
    exclude_regexes: Vec<Regex>,
}

impl UrlFilter {
    /// Create a new URL filter from allowed domains and regex patterns
    pub fn new(
        allowed_domains: &[String],
        include_patterns: &[String],
        exclude_patterns: &[String],
    ) -> Result<Self, regex::Error> {
        let mut include_regexes = Vec::with_capacity(include_patterns.len());
        for pattern in include_patterns {
            include_regexes.push(Regex::new(pattern)?);
        }

        let mut exclude_regexes = Vec::with_capacity(exclude_patterns.len());
        for pattern in exclude_patterns {
            exclude_regexes.push(Regex::new(pattern)?);
        }

        Ok(Self {
            allowed_domains: allowed_domains
                .iter()
                .map(|d| d.trim_start_matches('.').to_ascii_lowercase())
                .collect(),
            include_regexes,
            exclude_regexes,
        })
    }

    /// Build the filter described by a crawl configuration
    pub fn from_config(config: &CatalogConfig) -> Result<Self, regex::Error> {
        Self::new(
            &config.allowed_domains,
            &config.include_patterns,
            &config.exclude_patterns,
        )
    }

    /// Determine if a URL should be crawled based on all filtering rules
    pub fn should_crawl(&self, url: &Url) -> bool {
        if !matches!(url.scheme(), "http" | "https") {
            return false;
        }

        if !self.is_in_domain_scope(url) {
            return false;
        }

        // Exclusions take precedence
        let url_str = url.as_str();
        if self.exclude_regexes.iter().any(|re| re.is_match(url_str)) {
            return false;
        }

        self.include_regexes.is_empty() || self.include_regexes.iter().any(|re| re.is_match(url_str))
    }

    /// A host is in scope when it equals an allowed domain or is a sub-domain of one
    fn is_in_domain_scope(&self, url: &Url) -> bool {
        if self.allowed_domains.is_empty() {
            return true;
        }

        let Some(host) = url.host_str() else {
            return false;
        };
        let host = host.to_ascii_lowercase();

        self.allowed_domains.iter().any(|domain| {
            host == *domain
                || host
                    .strip_suffix(domain.as_str())
                    .is_some_and(|prefix| prefix.ends_with('.'))
        })
    }

    /// Create a normalized version of the URL (e.g., removing fragments)
    pub fn normalize_url(&self, url: &Url) -> Url {
        let mut normalized = url.clone();
        normalized.set_fragment(None);
        normalized
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn domains(list: &[&str]) -> Vec<String> {
        list.iter().map(|d| d.to_string()).collect()
    }

    #[test]
    fn test_default_filter_allows_any_http_url() {
        let filter = UrlFilter::default();

        let url = Url::parse("https://example.com/page").unwrap();
        assert!(filter.should_crawl(&url));

        let mailto = Url::parse("mailto:shop@example.com").unwrap();
        assert!(!filter.should_crawl(&mailto));

        let script = Url::parse("javascript:void(0)").unwrap();
        assert!(!filter.should_crawl(&script));
    }

    #[test]
    fn test_domain_restriction() {
        let filter = UrlFilter::new(&domains(&["fix-price.com"]), &[], &[]).unwrap();

        let same = Url::parse("https://fix-price.com/catalog/x?page=2").unwrap();
        assert!(filter.should_crawl(&same));

        let sub = Url::parse("https://m.fix-price.com/catalog/x").unwrap();
        assert!(filter.should_crawl(&sub));

        let lookalike = Url::parse("https://notfix-price.com/catalog/x").unwrap();
        assert!(!filter.should_crawl(&lookalike));

        let other = Url::parse("https://other.com/catalog/x").unwrap();
        assert!(!filter.should_crawl(&other));
    }

    #[test]
    fn test_regex_patterns() {
        let filter = UrlFilter::new(
            &[],
            &[r"/catalog/".to_string()],
            &[r"page=99".to_string()],
        )
        .unwrap();

        let included = Url::parse("https://fix-price.com/catalog/x?page=2").unwrap();
        assert!(filter.should_crawl(&included));

        let not_included = Url::parse("https://fix-price.com/promo").unwrap();
        assert!(!filter.should_crawl(&not_included));

        let excluded = Url::parse("https://fix-price.com/catalog/x?page=99").unwrap();
        assert!(!filter.should_crawl(&excluded));
    }

    #[test]
    fn test_invalid_pattern() {
        assert!(UrlFilter::new(&[], &["(".to_string()], &[]).is_err());
    }

    #[test]
    fn test_normalize_url_drops_fragment() {
        let filter = UrlFilter::default();
        let url = Url::parse("https://fix-price.com/catalog/x?page=2#top").unwrap();
        assert_eq!(
            filter.normalize_url(&url).as_str(),
            "https://fix-price.com/catalog/x?page=2"
        );
    }
}
