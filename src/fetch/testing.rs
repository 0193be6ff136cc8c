//! Scripted fetcher for unit tests.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::{CacheError, Result};
use crate::fetch::{FetchResponse, Fetcher};

/// Returns canned responses per locator and counts calls.
///
/// Unscripted locators fail with a transport error.
#[derive(Debug, Default)]
pub struct ScriptedFetcher {
    responses: Mutex<HashMap<String, FetchResponse>>,
    calls: Mutex<HashMap<String, usize>>,
}

impl ScriptedFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(&self, locator: &str, response: FetchResponse) {
        self.responses
            .lock()
            .unwrap()
            .insert(locator.to_string(), response);
    }

    /// Makes `locator` fail at the transport level from now on.
    pub fn fail(&self, locator: &str) {
        self.responses.lock().unwrap().remove(locator);
    }

    pub fn calls(&self, locator: &str) -> usize {
        self.calls.lock().unwrap().get(locator).copied().unwrap_or(0)
    }
}

#[async_trait]
impl Fetcher for ScriptedFetcher {
    async fn fetch(&self, locator: &str) -> Result<FetchResponse> {
        *self
            .calls
            .lock()
            .unwrap()
            .entry(locator.to_string())
            .or_insert(0) += 1;

        self.responses
            .lock()
            .unwrap()
            .get(locator)
            .cloned()
            .ok_or_else(|| CacheError::transport(format!("connection refused: {}", locator)))
    }
}
