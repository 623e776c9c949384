use crate::config::ScrapingConfig;
use crate::types::{DigestError, FetchError, Result};
use reqwest::Client;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

/// Owns the shared HTTP client used by every fetch adapter.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
    rate_limit_delay: Duration,
}

impl HttpFetcher {
    pub fn new(config: &ScrapingConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.timeout())
            .gzip(true)
            .deflate(true)
            .brotli(true)
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()
            .map_err(|e| DigestError::Config(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            rate_limit_delay: config.rate_limit_delay(),
        })
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    /// A client that serializes and spaces out requests for one source.
    pub fn throttled(&self) -> ThrottledClient {
        ThrottledClient::new(self.client.clone(), self.rate_limit_delay)
    }
}

/// Requests made through one `ThrottledClient` never start closer together
/// than `delay`.
#[derive(Debug)]
pub struct ThrottledClient {
    client: Client,
    delay: Duration,
    last_request: Mutex<Option<Instant>>,
}

impl ThrottledClient {
    pub fn new(client: Client, delay: Duration) -> Self {
        Self {
            client,
            delay,
            last_request: Mutex::new(None),
        }
    }

    async fn wait_turn(&self) {
        let mut last = self.last_request.lock().await;
        if let Some(previous) = *last {
            let elapsed = previous.elapsed();
            if elapsed < self.delay {
                let wait = self.delay - elapsed;
                debug!("Rate limiting: waiting {:?}", wait);
                tokio::time::sleep(wait).await;
            }
        }
        *last = Some(Instant::now());
    }

    pub async fn get_text(&self, url: &str) -> std::result::Result<String, FetchError> {
        self.wait_turn().await;
        debug!("GET {}", url);

        let response = self.client.get(url).send().await.map_err(|e| {
            if e.is_timeout() {
                FetchError::Timeout {
                    url: url.to_string(),
                }
            } else {
                FetchError::Http(e)
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        response.text().await.map_err(|e| {
            if e.is_timeout() {
                FetchError::Timeout {
                    url: url.to_string(),
                }
            } else {
                FetchError::Http(e)
            }
        })
    }
}
