use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::{Client, ClientBuilder};
use std::time::Duration;

use super::client::ClientConfig;
use crate::error::Result;

/// Build the session client shared by every request of a run.
///
/// Cookies set by the warm-up request persist in the client's store, which
/// is what lets the search endpoint accept later requests.
pub fn create_session_client(config: &ClientConfig) -> Result<Client> {
    let mut headers = HeaderMap::new();
    headers.insert("X-Requested-With", HeaderValue::from_static("XMLHttpRequest"));

    let client = ClientBuilder::new()
        .cookie_store(true)
        .default_headers(headers)
        .user_agent(config.user_agent.clone())
        .timeout(Duration::from_secs(config.timeout))
        .connect_timeout(Duration::from_secs(config.timeout.min(10)))
        // Connection pool settings
        .pool_max_idle_per_host(2)
        .pool_idle_timeout(Duration::from_secs(30))
        .tcp_keepalive(Duration::from_secs(60))
        .redirect(reqwest::redirect::Policy::limited(10))
        .use_rustls_tls()
        .build()?;

    Ok(client)
}

/// Plain client for third-party APIs (no cookie store, no XHR header)
pub fn create_api_client(timeout_secs: u64, user_agent: &str) -> Result<Client> {
    let client = ClientBuilder::new()
        .user_agent(user_agent.to_string())
        .timeout(Duration::from_secs(timeout_secs))
        .tcp_nodelay(true)
        .use_rustls_tls()
        .build()?;

    Ok(client)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_client_creation() {
        let client = create_session_client(&ClientConfig::default());
        assert!(client.is_ok());
    }

    #[test]
    fn test_api_client_creation() {
        let client = create_api_client(10, "test-agent/1.0");
        assert!(client.is_ok());
    }
}
