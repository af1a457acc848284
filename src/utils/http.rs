// src/utils/http.rs

//! HTTP client utilities.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::{FetchError, Result};
use crate::models::CrawlerConfig;

/// Create a configured asynchronous HTTP client.
///
/// One client is shared by every stage so connections are reused.
pub fn create_async_client(config: &CrawlerConfig) -> Result<reqwest::Client> {
    let client = reqwest::Client::builder()
        .user_agent(&config.user_agent)
        .timeout(Duration::from_secs(config.timeout_secs))
        .pool_max_idle_per_host(config.pool_max_idle_per_host)
        .build()?;
    Ok(client)
}

/// Source of page markup.
///
/// Implementations return the raw body; callers parse it with
/// `scraper::Html` inside a synchronous scope, since `Html` is not `Send`.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch_text(&self, url: &str) -> std::result::Result<String, FetchError>;
}

/// `PageFetcher` over reqwest with bounded, fixed-delay retries.
#[derive(Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
    attempts: u32,
    retry_delay: Duration,
}

impl HttpFetcher {
    pub fn new(config: &CrawlerConfig) -> Result<Self> {
        Ok(Self::with_client(create_async_client(config)?, config))
    }

    pub fn with_client(client: reqwest::Client, config: &CrawlerConfig) -> Self {
        Self {
            client,
            attempts: config.retry_attempts.max(1),
            retry_delay: Duration::from_millis(config.retry_delay_ms),
        }
    }

    async fn fetch_once(&self, url: &str) -> std::result::Result<String, FetchError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| classify(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        response.text().await.map_err(|e| classify(url, e))
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch_text(&self, url: &str) -> std::result::Result<String, FetchError> {
        if let Err(e) = url::Url::parse(url) {
            return Err(FetchError::InvalidUrl {
                url: url.to_string(),
                message: e.to_string(),
            });
        }

        let mut attempt = 1;
        loop {
            match self.fetch_once(url).await {
                Ok(text) => return Ok(text),
                Err(e) if e.is_transient() && attempt < self.attempts => {
                    log::warn!(
                        "GET {} failed (attempt {}/{}): {}",
                        url,
                        attempt,
                        self.attempts,
                        e
                    );
                    tokio::time::sleep(self.retry_delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    log::debug!("GET {} gave up after {} attempt(s): {}", url, attempt, e);
                    return Err(e);
                }
            }
        }
    }
}

fn classify(url: &str, err: reqwest::Error) -> FetchError {
    if err.is_builder() {
        return FetchError::InvalidUrl {
            url: url.to_string(),
            message: err.to_string(),
        };
    }
    if let Some(status) = err.status() {
        return FetchError::Status {
            url: url.to_string(),
            status: status.as_u16(),
        };
    }
    FetchError::network(url, err)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    use super::*;

    /// Answers every request with `status` and counts connections.
    async fn serve_status(status: &'static str) -> (String, Arc<AtomicUsize>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                counter.fetch_add(1, Ordering::SeqCst);
                let mut buf = [0u8; 4096];
                let _ = socket.read(&mut buf).await;
                let response = format!(
                    "HTTP/1.1 {status}\r\nContent-Length: 0\r\nConnection: close\r\n\r\n"
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            }
        });
        (format!("http://{addr}/talk"), hits)
    }

    fn retrying_fetcher() -> HttpFetcher {
        let config = CrawlerConfig {
            retry_attempts: 3,
            retry_delay_ms: 10,
            timeout_secs: 5,
            ..CrawlerConfig::default()
        };
        HttpFetcher::new(&config).unwrap()
    }

    #[tokio::test]
    async fn test_server_error_is_retried_up_to_limit() {
        let (url, hits) = serve_status("503 Service Unavailable").await;
        let err = retrying_fetcher().fetch_text(&url).await.unwrap_err();
        assert!(matches!(err, FetchError::Status { status: 503, .. }));
        assert_eq!(hits.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_not_found_is_attempted_once() {
        let (url, hits) = serve_status("404 Not Found").await;
        let err = retrying_fetcher().fetch_text(&url).await.unwrap_err();
        assert!(matches!(err, FetchError::Status { status: 404, .. }));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_invalid_url_is_not_retried() {
        let fetcher = HttpFetcher::new(&CrawlerConfig::default()).unwrap();
        let err = fetcher.fetch_text("not a url").await.unwrap_err();
        assert!(matches!(err, FetchError::InvalidUrl { .. }));
        assert!(!err.is_transient());
    }

    #[tokio::test]
    async fn test_unreachable_host_is_network_error() {
        let config = CrawlerConfig {
            retry_attempts: 2,
            retry_delay_ms: 1,
            timeout_secs: 2,
            ..CrawlerConfig::default()
        };
        let fetcher = HttpFetcher::new(&config).unwrap();
        // Port 9 on loopback is the discard service, closed on test hosts
        let err = fetcher.fetch_text("http://127.0.0.1:9/").await.unwrap_err();
        assert!(matches!(err, FetchError::Network { .. }));
    }
}
