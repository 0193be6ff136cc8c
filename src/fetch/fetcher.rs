//! Network Retrieval
//!
//! The request/response abstraction consumed by the cache-aware fetch
//! wrapper, and its HTTP implementation over reqwest.

use async_trait::async_trait;
use reqwest::header::ACCEPT;
use serde::de::DeserializeOwned;

use crate::error::{CacheError, Result};

// == Fetch Response ==
/// Status and raw body of a retrieval.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl FetchResponse {
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// True for 2xx statuses.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Parses the body as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_slice(&self.body).map_err(|e| CacheError::Parse(e.to_string()))
    }
}

/// Anything that can retrieve a resource by locator.
///
/// Transport failures are reported as `CacheError::Network` with no status;
/// non-success statuses are returned as responses and judged by the caller.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, locator: &str) -> Result<FetchResponse>;
}

// == HTTP Fetcher ==
/// Issues `GET` requests with reqwest.
///
/// Relative locators are joined onto the base URL when one is configured.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
    base_url: Option<String>,
}

impl HttpFetcher {
    pub fn new(base_url: Option<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| CacheError::Config(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self::with_client(client, base_url))
    }

    pub fn with_client(client: reqwest::Client, base_url: Option<String>) -> Self {
        Self { client, base_url }
    }

    /// Resolves `locator` to an absolute URL.
    pub fn resolve(&self, locator: &str) -> String {
        if locator.starts_with("http://") || locator.starts_with("https://") {
            return locator.to_string();
        }
        match &self.base_url {
            Some(base) => format!(
                "{}/{}",
                base.trim_end_matches('/'),
                locator.trim_start_matches('/')
            ),
            None => locator.to_string(),
        }
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, locator: &str) -> Result<FetchResponse> {
        let url = self.resolve(locator);

        let response = self
            .client
            .get(&url)
            .header(ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| CacheError::transport(format!("GET {}: {}", url, e)))?;

        let status = response.status().as_u16();
        let body = response
            .bytes()
            .await
            .map_err(|e| CacheError::transport(format!("reading body of {}: {}", url, e)))?;

        Ok(FetchResponse::new(status, body.to_vec()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_success_range() {
        assert!(FetchResponse::new(200, "").is_success());
        assert!(FetchResponse::new(204, "").is_success());
        assert!(!FetchResponse::new(304, "").is_success());
        assert!(!FetchResponse::new(500, "").is_success());
    }

    #[test]
    fn test_response_json() {
        let response = FetchResponse::new(200, r#"{"id":3}"#);
        let value: serde_json::Value = response.json().unwrap();
        assert_eq!(value["id"], 3);

        let bad = FetchResponse::new(200, "<html>");
        assert!(matches!(
            bad.json::<serde_json::Value>(),
            Err(CacheError::Parse(_))
        ));
    }

    #[test]
    fn test_resolve_locators() {
        let fetcher = HttpFetcher::new(Some("http://localhost:8080/".to_string())).unwrap();

        assert_eq!(
            fetcher.resolve("/api/properties"),
            "http://localhost:8080/api/properties"
        );
        assert_eq!(fetcher.resolve("api/blog"), "http://localhost:8080/api/blog");
        assert_eq!(
            fetcher.resolve("https://cdn.example.com/a.json"),
            "https://cdn.example.com/a.json"
        );

        let bare = HttpFetcher::new(None).unwrap();
        assert_eq!(bare.resolve("/api/x"), "/api/x");
    }
}
