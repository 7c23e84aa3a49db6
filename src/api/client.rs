use async_trait::async_trait;
use std::path::Path;
use url::Url;

use super::types::{RecordUrl, SearchFilters};
use crate::error::Result;

/// Default origin of the Porto Alegre city council site
pub const DEFAULT_BASE_URL: &str = "https://www.camarapoa.rs.gov.br";

/// Browser-like user agent; the site answers bare clients with an error page
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Everything the crawl driver needs from the council site.
///
/// Implementations return page bodies as text. Parsing happens in the
/// extractors, synchronously, because parsed documents are not `Send`.
#[async_trait]
pub trait CouncilSource: Send + Sync {
    /// Establish the session (cookies, CSRF token) that the search endpoint checks.
    async fn warm_up(&self) -> Result<()>;

    /// Fetch one page of search results, already cleaned if it came back as script.
    ///
    /// An empty body is an error, never "no results".
    async fn fetch_search_page(&self, page: u32, filters: &SearchFilters) -> Result<String>;

    /// Fetch a record detail page
    async fn fetch_record_page(&self, url: &RecordUrl) -> Result<String>;

    /// Stream a remote file to `dest`, returning the number of bytes written.
    async fn download(&self, url: &str, dest: &Path) -> Result<u64>;

    /// Site origin used to resolve relative links
    fn base_url(&self) -> &Url;
}

/// Client configuration
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Site origin
    pub base_url: String,
    /// Request timeout in seconds
    pub timeout: u64,
    /// Maximum number of attempts per request
    pub max_retries: u32,
    /// Base delay for exponential backoff (milliseconds)
    pub retry_base_delay: u64,
    /// User agent string
    pub user_agent: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: 30,
            max_retries: 3,
            retry_base_delay: 100,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}
