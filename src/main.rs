use clap::Parser;
use fixprice_crawl::output::RecordWriter;
use fixprice_crawl::{Catalog, CatalogConfig};
use std::process::ExitCode;

mod args;
use args::{Args, convert_price_policy};

fn build_catalog(args: &Args) -> fixprice_crawl::Result<Catalog> {
    let mut catalog = Catalog::from_config(CatalogConfig::default());
    if let Some(path) = &args.config {
        catalog = catalog.with_config_file(path)?;
    }
    catalog = catalog.with_start_urls(args.urls.clone());

    if let Some(url) = &args.webdriver_url {
        catalog = catalog.with_webdriver_url(url);
    }
    if let Some(max_pages) = args.max_pages {
        catalog = catalog.with_max_pages(max_pages);
    }
    if let Some(policy) = args.price_policy {
        catalog = catalog.with_price_policy(convert_price_policy(policy));
    }
    if args.headed {
        catalog = catalog.with_headless(false);
    }
    Ok(catalog)
}

#[tokio::main]
async fn main() -> ExitCode {
    // Initialize logging
    env_logger::init();

    let args = Args::parse();

    let catalog = match build_catalog(&args) {
        Ok(catalog) => catalog,
        Err(e) => {
            ::log::error!("Failed to load configuration: {}", e);
            return ExitCode::FAILURE;
        }
    };
    ::log::info!(
        "Starting crawler for: {}",
        catalog.config().start_urls.join(", ")
    );

    let mut writer = match RecordWriter::open(args.output.as_deref()) {
        Ok(writer) => writer,
        Err(e) => {
            ::log::error!("Failed to open output: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let mut rx = match catalog.generate().await {
        Ok(rx) => rx,
        Err(e) => {
            ::log::error!("Failed to start crawler: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let start_time = std::time::Instant::now();
    while let Some(record) = rx.recv().await {
        if let Err(e) = writer.write(&record) {
            ::log::error!("Failed to write record {}: {}", record.url, e);
            return ExitCode::FAILURE;
        }
        ::log::debug!("Record {}: {}", writer.written(), record.url);
    }

    let records = match writer.finish() {
        Ok(records) => records,
        Err(e) => {
            ::log::error!("Failed to flush output: {}", e);
            return ExitCode::FAILURE;
        }
    };
    ::log::info!(
        "Crawling complete - {} records in {:.2} seconds",
        records,
        start_time.elapsed().as_secs_f64()
    );
    ExitCode::SUCCESS
}
