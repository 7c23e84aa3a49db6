//! The crawl driver: paginate the search, pick out new records, extract and
//! commit them one at a time.

pub mod links;
pub mod record;

use log::{error, info, warn};
use serde::Serialize;
use std::collections::HashSet;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

use crate::api::client::CouncilSource;
use crate::api::types::{RecordUrl, SearchFilters};
use crate::error::Result;
use crate::progress::{messages, ProgressManager};
use crate::store::{CommitOutcome, KnownIndex, RecordStore};

use record::{extract_record, ExtractOptions};

/// Everything one run needs to know; nothing is read from globals.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub filters: SearchFilters,
    /// Last result page to request (1-based, inclusive).
    pub max_pages: u32,
    pub page_delay: Duration,
    pub record_delay: Duration,
    /// Consecutive failed pages after which pagination stops.
    pub max_page_failures: u32,
    pub download_documents: bool,
    pub documents_dir: PathBuf,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            filters: SearchFilters::default(),
            max_pages: 10,
            page_delay: Duration::from_millis(500),
            record_delay: Duration::from_millis(200),
            max_page_failures: 3,
            download_documents: false,
            documents_dir: PathBuf::from("data/pdfs"),
        }
    }
}

/// New record URLs found by paginating the search.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Discovery {
    /// In discovery order, without known or repeated ids.
    pub urls: Vec<RecordUrl>,
    pub pages_fetched: u32,
    pub page_failures: u32,
    /// A page with zero entries was reached.
    pub exhausted: bool,
    pub interrupted: bool,
}

/// Outcome of a whole run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub pages_fetched: u32,
    pub page_failures: u32,
    pub exhausted: bool,
    pub discovered: usize,
    pub committed: usize,
    pub duplicates: usize,
    pub failed: usize,
    pub interrupted: bool,
}

/// Resolves once the flag is set. Never resolves if the sender is gone.
async fn wait_for_shutdown(rx: &mut watch::Receiver<bool>) {
    loop {
        if *rx.borrow_and_update() {
            return;
        }
        if rx.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

/// Flip the returned flag on the first Ctrl-C; a second Ctrl-C exits at once.
pub fn shutdown_on_ctrl_c() -> watch::Receiver<bool> {
    let (tx, rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted; saving progress (press Ctrl-C again to quit immediately)");
            let _ = tx.send(true);

            if tokio::signal::ctrl_c().await.is_ok() {
                eprintln!("\nForce quit requested, exiting immediately...");
                std::process::exit(130);
            }
        }
    });
    rx
}

pub struct CrawlDriver<S: CouncilSource> {
    source: S,
    config: RunConfig,
    shutdown: watch::Receiver<bool>,
    progress: Arc<ProgressManager>,
}

impl<S: CouncilSource> CrawlDriver<S> {
    pub fn new(source: S, config: RunConfig) -> Self {
        let (_never, shutdown) = watch::channel(false);
        Self {
            source,
            config,
            shutdown,
            progress: Arc::new(ProgressManager::disabled()),
        }
    }

    pub fn with_shutdown(mut self, shutdown: watch::Receiver<bool>) -> Self {
        self.shutdown = shutdown;
        self
    }

    pub fn with_progress(mut self, progress: Arc<ProgressManager>) -> Self {
        self.progress = progress;
        self
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    fn is_interrupted(&self) -> bool {
        *self.shutdown.borrow()
    }

    /// Await `fut` unless the shutdown flag is raised first.
    async fn interruptible<F: Future>(&self, fut: F) -> Option<F::Output> {
        let mut shutdown = self.shutdown.clone();
        if *shutdown.borrow() {
            return None;
        }
        tokio::select! {
            biased;
            out = fut => Some(out),
            _ = wait_for_shutdown(&mut shutdown) => None,
        }
    }

    /// Sleep for `delay`; false if interrupted meanwhile.
    async fn pause(&self, delay: Duration) -> bool {
        if delay.is_zero() {
            return !self.is_interrupted();
        }
        self.interruptible(tokio::time::sleep(delay)).await.is_some()
    }

    /// Walk result pages `1..=max_pages` collecting record URLs not in `known`.
    ///
    /// A failed page is skipped; a page with zero entries ends the walk.
    pub async fn discover(&self, known: &KnownIndex) -> Discovery {
        let filters = &self.config.filters;
        let base = self.source.base_url().clone();
        let spinner = self.progress.spinner(&messages::discovering(1));

        let mut discovery = Discovery::default();
        let mut seen: HashSet<u64> = HashSet::new();
        let mut consecutive_failures = 0u32;

        for page in 1..=self.config.max_pages {
            if page > 1 && !self.pause(self.config.page_delay).await {
                discovery.interrupted = true;
                break;
            }
            if let Some(pb) = &spinner {
                pb.set_message(messages::discovering(page));
            }
            info!("Scraping page {}...", page);

            let Some(fetched) = self
                .interruptible(self.source.fetch_search_page(page, filters))
                .await
            else {
                discovery.interrupted = true;
                break;
            };

            let scan = fetched.and_then(|body| links::scan_page(&body, &base, &filters.category));
            let scan = match scan {
                Ok(scan) => scan,
                Err(e) => {
                    discovery.page_failures += 1;
                    consecutive_failures += 1;
                    warn!("Page {} failed: {}", page, e);
                    if consecutive_failures >= self.config.max_page_failures.max(1) {
                        warn!("{} consecutive page failures; stopping pagination", consecutive_failures);
                        break;
                    }
                    continue;
                }
            };

            consecutive_failures = 0;
            discovery.pages_fetched += 1;

            if scan.is_exhausted() {
                info!("No entries on page {}; end of results", page);
                discovery.exhausted = true;
                break;
            }

            let mut new_on_page = 0;
            for link in scan.links {
                let id = link.url.id();
                if known.contains(id) || !seen.insert(id) {
                    continue;
                }
                discovery.urls.push(link.url);
                new_on_page += 1;
            }
            info!(
                "Found {} new {} records on page {} ({} entries, {} in sidebar)",
                new_on_page, filters.category, page, scan.entry_count, scan.sidebar_skipped
            );
        }

        if let Some(pb) = spinner {
            pb.finish_and_clear();
        }
        info!("Total new unique {} records to process: {}", filters.category, discovery.urls.len());
        discovery
    }

    /// Full run: warm up, discover, then extract and commit each new record.
    ///
    /// The store is flushed before returning, also when interrupted.
    pub async fn run(&self, store: &mut dyn RecordStore) -> Result<RunSummary> {
        let mut summary = RunSummary::default();

        match self.interruptible(self.source.warm_up()).await {
            Some(result) => result?,
            None => {
                summary.interrupted = true;
                return Ok(summary);
            }
        }

        let mut known = KnownIndex::load(store).await?;
        info!("{} records already stored", known.len());

        let discovery = self.discover(&known).await;
        summary.pages_fetched = discovery.pages_fetched;
        summary.page_failures = discovery.page_failures;
        summary.exhausted = discovery.exhausted;
        summary.discovered = discovery.urls.len();
        summary.interrupted = discovery.interrupted;

        let options = ExtractOptions {
            download_documents: self.config.download_documents,
            documents_dir: self.config.documents_dir.clone(),
        };

        if !summary.interrupted {
            let bar = self
                .progress
                .bar(discovery.urls.len() as u64, messages::EXTRACTING);

            for (i, url) in discovery.urls.iter().enumerate() {
                if i > 0 && !self.pause(self.config.record_delay).await {
                    summary.interrupted = true;
                    break;
                }
                if known.contains(url.id()) {
                    continue;
                }

                info!("Processing: {}", url);
                let Some(extracted) = self.interruptible(extract_record(&self.source, url, &options)).await
                else {
                    summary.interrupted = true;
                    break;
                };

                match extracted {
                    Ok(record) => match store.commit(&record).await {
                        Ok(CommitOutcome::Inserted) => {
                            known.insert(record.external_id);
                            summary.committed += 1;
                        }
                        Ok(CommitOutcome::Duplicate) => {
                            known.insert(record.external_id);
                            summary.duplicates += 1;
                        }
                        Err(e) => {
                            error!("Failed to persist {}: {}", url, e);
                            summary.failed += 1;
                        }
                    },
                    Err(e) => {
                        warn!("Failed to process {}: {}", url, e);
                        summary.failed += 1;
                    }
                }

                if let Some(pb) = &bar {
                    pb.inc(1);
                }
            }

            if let Some(pb) = bar {
                pb.finish_and_clear();
            }
        }

        store.flush().await?;
        if summary.interrupted {
            warn!("Run interrupted; {} records saved", summary.committed);
        } else {
            info!(
                "Run finished: {} committed, {} failed, {} duplicates",
                summary.committed, summary.failed, summary.duplicates
            );
        }
        Ok(summary)
    }
}
