use log::info;
use std::sync::Arc;

use crate::api::CamaraClient;
use crate::cli::args::CrawlArgs;
use crate::cli::OutputFormat;
use crate::config::Config;
use crate::crawl::{shutdown_on_ctrl_c, CrawlDriver};
use crate::error::Result;
use crate::output::Formatter;
use crate::progress::ProgressManager;
use crate::store::open_store;

/// Execute crawl command
pub async fn execute(args: CrawlArgs, format: OutputFormat, quiet: bool, verbose: bool) -> Result<()> {
    let mut config = Config::load()?;
    apply_overrides(&mut config, &args)?;

    let client = CamaraClient::new(config.client_config())?;
    let store_path = config.storage.store_path();
    info!("Using {} store at {}", config.storage.backend, store_path.display());
    let mut store = open_store(config.storage.backend, &store_path, config.storage.flush_every).await?;

    let progress = Arc::new(ProgressManager::new(quiet, verbose));
    let driver = CrawlDriver::new(client, config.run_config())
        .with_shutdown(shutdown_on_ctrl_c())
        .with_progress(progress);

    let summary = driver.run(store.as_mut()).await?;
    if summary.interrupted {
        info!("Interrupted; progress so far has been saved");
    }

    println!("{}", Formatter::new(format).format_run_summary(&summary)?);
    Ok(())
}

/// Fold command-line flags into the loaded configuration.
fn apply_overrides(config: &mut Config, args: &CrawlArgs) -> Result<()> {
    if let Some(max_pages) = args.max_pages {
        config.crawl.max_pages = max_pages;
    }
    if args.download {
        config.crawl.download_documents = true;
    }
    if let Some(backend) = args.backend {
        config.storage.backend = backend;
    }
    if let Some(dir) = &args.data_dir {
        config.storage.data_dir = dir.clone();
    }
    if let Some(delay) = args.page_delay_ms {
        config.crawl.page_delay_ms = delay;
    }
    if let Some(base_url) = &args.base_url {
        config.set("http.base_url", base_url)?;
    }
    if let Some(category) = &args.category {
        config.set("crawl.category", category)?;
    }
    Ok(())
}
