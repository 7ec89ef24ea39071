use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

use crate::{warn_time, Error, Result, FETCH_TIMEOUT_SECS, USER_AGENT};

/// Anything that can turn a URL into page HTML.
/// Implementations are shared between workers, so they have to be reentrant.
#[async_trait]
pub trait Fetch: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<String>;
}

/// Plain HTTP fetcher. `Client` uses an `Arc` internally so clones share one connection pool.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(FETCH_TIMEOUT_SECS))
            .gzip(true)
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Fetch for HttpFetcher {
    /// Requests a page and returns the HTML. Any non-success status counts as a failure.
    async fn fetch(&self, url: &str) -> Result<String> {
        let fetch_err = |e: reqwest::Error| {
            let class = error_class(&e);
            warn_time!("Request to {} failed ({}): {}", url, class, e);
            Error::Fetch {
                url: url.to_string(),
                reason: format!("{class}: {e}"),
            }
        };
        let res = self
            .client
            .get(url)
            .send()
            .await
            .and_then(|res| res.error_for_status())
            .map_err(fetch_err)?;
        let html = res.text().await.map_err(fetch_err)?;
        Ok(html)
    }
}

/// Rough kind of a transport failure, for logs.
fn error_class(err: &reqwest::Error) -> &'static str {
    if err.is_timeout() {
        "timeout"
    } else if err.is_connect() {
        "connect"
    } else if err.is_status() {
        "status"
    } else if err.is_decode() || err.is_body() {
        "body"
    } else if err.is_builder() {
        "invalid request"
    } else {
        "request"
    }
}
