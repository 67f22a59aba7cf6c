use clap::{Parser, ValueEnum};
use fixprice_crawl::PricePolicy;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "fixprice-crawl")]
#[command(about = "Crawler that yields products from fix-price.com category listings")]
#[command(version)]
pub struct Args {
    /// Category URLs to crawl (replace the configured start URLs)
    pub urls: Vec<String>,

    /// JSON configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// WebDriver server URL (overrides WEBDRIVER_URL)
    #[arg(long)]
    pub webdriver_url: Option<String>,

    /// Write JSON Lines here instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Maximum pages per category
    #[arg(long)]
    pub max_pages: Option<usize>,

    /// What to do with unparseable price text
    #[arg(long, value_enum)]
    pub price_policy: Option<PricePolicyArg>,

    /// Show the browser window
    #[arg(long)]
    pub headed: bool,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum PricePolicyArg {
    EmitZero,
    SkipRecord,
    AbortPage,
}

/// Convert from CLI argument policy to the crawler's policy
pub fn convert_price_policy(arg: PricePolicyArg) -> PricePolicy {
    match arg {
        PricePolicyArg::EmitZero => PricePolicy::EmitZero,
        PricePolicyArg::SkipRecord => PricePolicy::SkipRecord,
        PricePolicyArg::AbortPage => PricePolicy::AbortPage,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let args = Args::try_parse_from(["fixprice-crawl"]).unwrap();
        assert!(args.urls.is_empty());
        assert!(args.config.is_none());
        assert!(args.output.is_none());
        assert!(args.price_policy.is_none());
        assert!(!args.headed);
    }

    #[test]
    fn test_full_command_line() {
        let args = Args::try_parse_from([
            "fixprice-crawl",
            "https://fix-price.com/catalog/x",
            "https://fix-price.com/catalog/y",
            "-c",
            "catalog.json",
            "--webdriver-url",
            "http://localhost:9515",
            "-o",
            "out.jsonl",
            "--max-pages",
            "5",
            "--price-policy",
            "skip-record",
            "--headed",
        ])
        .unwrap();

        assert_eq!(args.urls.len(), 2);
        assert_eq!(args.config, Some(PathBuf::from("catalog.json")));
        assert_eq!(args.webdriver_url.as_deref(), Some("http://localhost:9515"));
        assert_eq!(args.output, Some(PathBuf::from("out.jsonl")));
        assert_eq!(args.max_pages, Some(5));
        assert_eq!(
            args.price_policy.map(convert_price_policy),
            Some(PricePolicy::SkipRecord)
        );
        assert!(args.headed);
    }

    #[test]
    fn test_unknown_policy_rejected() {
        let result = Args::try_parse_from(["fixprice-crawl", "--price-policy", "guess"]);
        assert!(result.is_err());
    }
}
