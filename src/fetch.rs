//! HTML fetching.
//!
//! Every component that reads a web page goes through [`PageFetcher`] so the
//! pipeline can be exercised against canned HTML in tests.

use reqwest::Client;
use std::error::Error;
use std::time::{Duration, Instant};
use tracing::{debug, instrument};

/// Browser-like user agent; several outlets refuse obvious bot agents.
pub const USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36";

/// Default per-request timeout for page fetches.
pub const FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Timeout for the quick title lookup done after resolving a section page.
pub const TITLE_FETCH_TIMEOUT: Duration = Duration::from_secs(5);

/// Something that can GET a URL and hand back its body.
pub trait PageFetcher {
    /// Fetch `url` with the default timeout.
    async fn fetch(&self, url: &str) -> Result<String, Box<dyn Error>>;

    /// Fetch `url` with an explicit timeout.
    async fn fetch_with_timeout(
        &self,
        url: &str,
        timeout: Duration,
    ) -> Result<String, Box<dyn Error>>;
}

/// [`PageFetcher`] backed by a shared `reqwest` client.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new() -> Result<Self, Box<dyn Error>> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(FETCH_TIMEOUT)
            .build()?;
        Ok(Self { client })
    }

    /// The underlying client, shared with the search adapter.
    pub fn client(&self) -> &Client {
        &self.client
    }
}

impl PageFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<String, Box<dyn Error>> {
        self.fetch_with_timeout(url, FETCH_TIMEOUT).await
    }

    #[instrument(level = "debug", skip_all, fields(%url))]
    async fn fetch_with_timeout(
        &self,
        url: &str,
        timeout: Duration,
    ) -> Result<String, Box<dyn Error>> {
        let t0 = Instant::now();
        let body = self
            .client
            .get(url)
            .timeout(timeout)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        debug!(
            bytes = body.len(),
            elapsed_ms = t0.elapsed().as_millis() as u64,
            "Fetched page"
        );
        Ok(body)
    }
}
