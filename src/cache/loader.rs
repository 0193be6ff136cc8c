//! Loader Module
//!
//! Async data loaders used by `preload` and `refresh_expired`, and the
//! reports those operations return.

use std::future::Future;
use std::time::Duration;

use futures::future::BoxFuture;
use serde::Serialize;

/// Future produced by a loader.
pub type LoadFuture<T> = BoxFuture<'static, anyhow::Result<T>>;

/// One-shot async data source for a single cache key.
pub type Loader<T> = Box<dyn FnOnce() -> LoadFuture<T> + Send>;

/// Boxes an async closure into a [`Loader`].
///
/// # Example
/// ```ignore
/// let load = loader(|| async { Ok(fetch_profile().await?) });
/// ```
pub fn loader<T, F, Fut>(f: F) -> Loader<T>
where
    F: FnOnce() -> Fut + Send + 'static,
    Fut: Future<Output = anyhow::Result<T>> + Send + 'static,
{
    Box::new(move || Box::pin(f()))
}

// == Preload Request ==
/// A key to warm and how to load it.
pub struct PreloadRequest<T> {
    pub key: String,
    pub loader: Loader<T>,
    pub priority: Option<i32>,
    pub ttl: Option<Duration>,
}

impl<T> PreloadRequest<T> {
    pub fn new(key: impl Into<String>, loader: Loader<T>) -> Self {
        Self {
            key: key.into(),
            loader,
            priority: None,
            ttl: None,
        }
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = Some(priority);
        self
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }
}

impl<T> std::fmt::Debug for PreloadRequest<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PreloadRequest")
            .field("key", &self.key)
            .field("priority", &self.priority)
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

// == Reports ==
/// Outcome of a `preload` batch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PreloadReport {
    /// Keys loaded and stored
    pub loaded: Vec<String>,
    /// Keys already present, loader not invoked
    pub skipped: Vec<String>,
    /// Keys whose loader failed
    pub failed: Vec<String>,
}

/// Outcome of a `refresh_expired` pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RefreshReport {
    /// Keys replaced with fresh data
    pub refreshed: Vec<String>,
    /// Keys whose refresher failed; the stale entry was kept
    pub failed: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_loader_runs_closure() {
        let load: Loader<u32> = loader(|| async { Ok(7) });
        assert_eq!(load().await.unwrap(), 7);
    }

    #[tokio::test]
    async fn test_loader_propagates_error() {
        let load: Loader<u32> = loader(|| async { Err(anyhow::anyhow!("backend down")) });
        let err = load().await.unwrap_err();
        assert_eq!(err.to_string(), "backend down");
    }

    #[test]
    fn test_preload_request_builder() {
        let request = PreloadRequest::new("k", loader(|| async { Ok(()) }))
            .with_priority(9)
            .with_ttl(Duration::from_secs(5));

        assert_eq!(request.key, "k");
        assert_eq!(request.priority, Some(9));
        assert_eq!(request.ttl, Some(Duration::from_secs(5)));
        assert!(format!("{:?}", request).contains("PreloadRequest"));
    }
}
