use async_trait::async_trait;
use chrono::Utc;
use futures::StreamExt;
use log::{debug, info, warn};
use reqwest::header::{ACCEPT, CONTENT_TYPE, REFERER};
use reqwest::{Client, RequestBuilder, Response};
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::time::sleep;
use url::Url;

use super::client::{ClientConfig, CouncilSource};
use super::http_client::create_session_client;
use super::types::{RecordUrl, SearchFilters};
use crate::error::{HarvestError, Result};
use crate::html::{Document, TreeNode};
use crate::text::{clean, looks_scripted};

const SEARCH_PATH: &str = "/processos";
const REFERER_PATH: &str = "/projetos";
const SESSION_COOKIE: &str = "_session_id";
const HTML_ACCEPT: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8";

/// Client for camarapoa.rs.gov.br
pub struct CamaraClient {
    config: ClientConfig,
    http_client: Client,
    base_url: Url,
    search_url: Url,
    referer_url: Url,
    csrf_token: RwLock<Option<String>>,
}

impl CamaraClient {
    /// Create a new client with its own cookie session
    pub fn new(config: ClientConfig) -> Result<Self> {
        let base_url = Url::parse(&config.base_url)
            .map_err(|e| HarvestError::Config(format!("invalid base_url '{}': {}", config.base_url, e)))?;
        let search_url = join(&base_url, SEARCH_PATH)?;
        let referer_url = join(&base_url, REFERER_PATH)?;
        let http_client = create_session_client(&config)?;

        Ok(Self {
            config,
            http_client,
            base_url,
            search_url,
            referer_url,
            csrf_token: RwLock::new(None),
        })
    }

    /// URL of the search endpoint
    pub fn search_url(&self) -> &Url {
        &self.search_url
    }

    fn csrf_token(&self) -> Option<String> {
        self.csrf_token.read().ok().and_then(|token| token.clone())
    }

    /// Execute request with retry logic
    ///
    /// `build` is called once per attempt since a sent request cannot be reused.
    async fn execute_with_retry<F>(&self, build: F) -> Result<Response>
    where
        F: Fn() -> RequestBuilder + Send + Sync,
    {
        let mut last_error = None;
        let mut retry_delay = Duration::from_millis(self.config.retry_base_delay);
        let attempts = self.config.max_retries.max(1);

        for attempt in 0..attempts {
            if attempt > 0 {
                sleep(retry_delay).await;
                retry_delay *= 2; // Exponential backoff
            }

            match build().send().await {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        return Ok(response);
                    }
                    let url = response.url().to_string();
                    let error = if status.as_u16() == 429 {
                        HarvestError::RateLimit
                    } else if status.is_server_error() {
                        HarvestError::ServerError(format!("{} returned status {}", url, status))
                    } else {
                        return Err(HarvestError::HttpStatus {
                            status: status.as_u16(),
                            url,
                        });
                    };
                    warn!("Attempt {}/{} failed: {}", attempt + 1, attempts, error);
                    last_error = Some(error);
                }
                Err(e) => {
                    warn!("Attempt {}/{} failed: {}", attempt + 1, attempts, e);
                    let error = HarvestError::Network(e);
                    if !error.is_retryable() {
                        return Err(error);
                    }
                    last_error = Some(error);
                }
            }
        }

        Err(last_error
            .unwrap_or_else(|| HarvestError::Other("Request failed after all retries".to_string())))
    }

    /// Read a body as UTF-8 regardless of the declared charset.
    async fn read_utf8(response: Response) -> Result<String> {
        let bytes = response.bytes().await?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}

fn join(base: &Url, path: &str) -> Result<Url> {
    base.join(path)
        .map_err(|e| HarvestError::Config(format!("cannot build {} from {}: {}", path, base, e)))
}

/// Pull the Rails CSRF token out of a page's `<meta name="csrf-token">`.
pub fn extract_csrf_token(body: &str) -> Option<String> {
    let document = Document::parse(body);
    TreeNode::select_first(&document.root(), r#"meta[name="csrf-token"]"#)
        .ok()
        .flatten()
        .and_then(|meta| TreeNode::attr(&meta, "content"))
        .filter(|token| !token.is_empty())
}

fn part_path(dest: &Path) -> PathBuf {
    let mut part = dest.as_os_str().to_owned();
    part.push(".part");
    PathBuf::from(part)
}

#[async_trait]
impl CouncilSource for CamaraClient {
    async fn warm_up(&self) -> Result<()> {
        info!("Opening session at {}", self.referer_url);
        let response = self
            .execute_with_retry(|| {
                self.http_client
                    .get(self.referer_url.clone())
                    .header(ACCEPT, HTML_ACCEPT)
            })
            .await?;

        if response.cookies().any(|c| c.name() == SESSION_COOKIE) {
            debug!("Session cookie {} established", SESSION_COOKIE);
        } else {
            debug!("No {} cookie in warm-up response", SESSION_COOKIE);
        }

        let body = Self::read_utf8(response).await?;
        let token = extract_csrf_token(&body);
        match &token {
            Some(_) => debug!("CSRF token found on warm-up page"),
            None => debug!("No CSRF token on warm-up page"),
        }
        if let Ok(mut slot) = self.csrf_token.write() {
            *slot = token;
        }
        Ok(())
    }

    async fn fetch_search_page(&self, page: u32, filters: &SearchFilters) -> Result<String> {
        let params = filters.query_params(page, Utc::now().timestamp_millis());
        let csrf_token = self.csrf_token();

        debug!("GET {} page={}", self.search_url, page);
        let response = self
            .execute_with_retry(|| {
                let request = self
                    .http_client
                    .get(self.search_url.clone())
                    .query(&params)
                    .header(REFERER, self.referer_url.as_str());
                match &csrf_token {
                    Some(token) => request.header("X-CSRF-Token", token.as_str()),
                    None => request,
                }
            })
            .await?;

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();

        let body = Self::read_utf8(response).await?;
        if body.trim().is_empty() {
            return Err(HarvestError::EmptyResponse(format!("search page {}", page)));
        }

        if looks_scripted(&content_type, &body) {
            debug!("Search page {} came back as script; cleaning", page);
            Ok(clean(&body))
        } else {
            Ok(body)
        }
    }

    async fn fetch_record_page(&self, url: &RecordUrl) -> Result<String> {
        debug!("GET {}", url);
        let response = self
            .execute_with_retry(|| {
                self.http_client
                    .get(url.url().clone())
                    .header(ACCEPT, HTML_ACCEPT)
                    .header(REFERER, self.search_url.as_str())
            })
            .await?;

        let body = Self::read_utf8(response).await?;
        if body.trim().is_empty() {
            return Err(HarvestError::EmptyResponse(url.to_string()));
        }
        Ok(body)
    }

    async fn download(&self, url: &str, dest: &Path) -> Result<u64> {
        let response = self
            .execute_with_retry(|| self.http_client.get(url))
            .await?;

        let part = part_path(dest);
        let written = async {
            let mut file = tokio::fs::File::create(&part).await?;
            let mut stream = response.bytes_stream();
            let mut written = 0u64;
            while let Some(chunk) = stream.next().await {
                let chunk = chunk?;
                file.write_all(&chunk).await?;
                written += chunk.len() as u64;
            }
            file.flush().await?;
            file.sync_all().await?;
            Ok::<u64, HarvestError>(written)
        }
        .await;

        match written {
            Ok(written) => {
                tokio::fs::rename(&part, dest).await?;
                Ok(written)
            }
            Err(e) => {
                let _ = tokio::fs::remove_file(&part).await;
                Err(e)
            }
        }
    }

    fn base_url(&self) -> &Url {
        &self.base_url
    }
}
