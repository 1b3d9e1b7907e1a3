//! Remote document retrieval
//!
//! A fetch is a single GET without retries. Every failure is returned as a
//! [`FetchFailure`] value so the caller can decide to keep serving the stale
//! cache.

use crate::config::IndexConfig;
use std::future::Future;
use thiserror::Error;
use tracing::{debug, info};

/// Why a fetch did not produce a usable document
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchFailure {
    #[error("Request to {url} failed: {message}")]
    Transport { url: String, message: String },

    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("{url} returned an empty document")]
    EmptyBody { url: String },

    #[error("Failed to build HTTP client: {message}")]
    Client { message: String },
}

/// Source of raw index documents
pub trait DocumentFetcher: Send + Sync {
    /// Retrieve the document at `url`
    fn fetch(&self, url: &str) -> impl Future<Output = Result<Vec<u8>, FetchFailure>> + Send;
}

/// HTTP fetcher with connection pooling, user agent and request timeout
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn from_config(config: &IndexConfig) -> Result<Self, FetchFailure> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.as_str())
            .pool_max_idle_per_host(1)
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| FetchFailure::Client {
                message: e.to_string(),
            })?;

        Ok(Self { client })
    }
}

impl DocumentFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchFailure> {
        debug!(url, "Fetching index document");

        let transport = |e: reqwest::Error| FetchFailure::Transport {
            url: url.to_string(),
            message: if e.is_timeout() {
                "request timed out".to_string()
            } else {
                e.to_string()
            },
        };

        let response = self
            .client
            .get(url)
            .header("Accept", "application/xml, text/xml")
            .send()
            .await
            .map_err(transport)?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchFailure::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let body = response.bytes().await.map_err(transport)?;
        if body.iter().all(u8::is_ascii_whitespace) {
            return Err(FetchFailure::EmptyBody {
                url: url.to_string(),
            });
        }

        info!(url, bytes = body.len(), "Fetched index document");
        Ok(body.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serve one canned HTTP response on a local port and return its URL
    async fn serve_once(status_line: &'static str, body: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 1024];
            let _ = socket.read(&mut buf).await;
            let response = format!(
                "HTTP/1.1 {status_line}\r\nContent-Type: text/xml\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.unwrap();
        });

        format!("http://{addr}/wgs.xml")
    }

    fn fetcher() -> HttpFetcher {
        let config = IndexConfig {
            request_timeout_secs: 5,
            ..IndexConfig::default()
        };
        HttpFetcher::from_config(&config).unwrap()
    }

    #[tokio::test]
    async fn test_fetch_success() {
        let url = serve_once("200 OK", "<wbs><tag/></wbs>").await;
        let body = fetcher().fetch(&url).await.unwrap();
        assert_eq!(body, b"<wbs><tag/></wbs>");
    }

    #[tokio::test]
    async fn test_fetch_http_error_status() {
        let url = serve_once("503 Service Unavailable", "down").await;
        let err = fetcher().fetch(&url).await.unwrap_err();
        assert_eq!(
            err,
            FetchFailure::Status {
                url: url.clone(),
                status: 503
            }
        );
    }

    #[tokio::test]
    async fn test_fetch_empty_body() {
        let url = serve_once("200 OK", "  \n").await;
        let err = fetcher().fetch(&url).await.unwrap_err();
        assert!(matches!(err, FetchFailure::EmptyBody { .. }));
    }

    #[tokio::test]
    async fn test_fetch_connection_refused() {
        // Bind then drop to get a port nobody listens on
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let err = fetcher()
            .fetch(&format!("http://{addr}/wgs.xml"))
            .await
            .unwrap_err();
        assert!(matches!(err, FetchFailure::Transport { .. }));
    }
}
