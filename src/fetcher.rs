use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use hyper::client::HttpConnector;
use hyper::{Body, Client, Request, StatusCode};
use hyper_tls::HttpsConnector;
use tracing::debug;

use crate::error::ProxyError;
use crate::Result;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Fetches an upstream calendar as opaque bytes. The body is not validated;
/// whatever the upstream serves with a 200 is returned as-is.
#[async_trait]
pub trait CalendarFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Bytes>;
}

pub struct HttpFetcher {
    client: Client<HttpsConnector<HttpConnector>, Body>,
    timeout: Duration,
}

impl HttpFetcher {
    pub fn new() -> Self {
        Self::with_timeout(REQUEST_TIMEOUT)
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        let https = HttpsConnector::new();
        Self {
            client: Client::builder().build::<_, Body>(https),
            timeout,
        }
    }
}

impl Default for HttpFetcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CalendarFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<Bytes> {
        if url.is_empty() {
            return Err(ProxyError::InvalidInput("empty URL".into()));
        }

        let req = Request::builder()
            .method("GET")
            .uri(url)
            .body(Body::empty())
            .map_err(|e| ProxyError::InvalidInput(e.to_string()))?;

        let resp = tokio::time::timeout(self.timeout, self.client.request(req))
            .await
            .map_err(|_| ProxyError::Network(format!("request to {} timed out", url)))?
            .map_err(|e| ProxyError::Network(e.to_string()))?;

        let status = resp.status();
        if status != StatusCode::OK {
            return Err(ProxyError::UpstreamStatus(status));
        }

        // Dropping the response on any early return releases the connection.
        let body = tokio::time::timeout(self.timeout, hyper::body::to_bytes(resp.into_body()))
            .await
            .map_err(|_| ProxyError::Read(format!("reading body from {} timed out", url)))?
            .map_err(|e| ProxyError::Read(e.to_string()))?;

        debug!("Fetched {} bytes from {}", body.len(), url);
        Ok(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_empty_url_is_rejected() {
        let fetcher = HttpFetcher::new();
        let err = fetcher.fetch("").await.unwrap_err();
        assert!(matches!(err, ProxyError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_unparsable_url_is_rejected() {
        let fetcher = HttpFetcher::new();
        let err = fetcher.fetch("not a url").await.unwrap_err();
        assert!(matches!(err, ProxyError::InvalidInput(_)));
    }
}
