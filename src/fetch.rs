use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::sync::Semaphore;
use tracing::warn;

use crate::xml;

const MAX_RETRIES: u32 = 3;
const BASE_BACKOFF_MS: u64 = 2000;
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// HTTP collaborator for the catalog's XML endpoints. Cheap to clone; the
/// semaphore caps total in-flight requests across every term being harvested.
#[derive(Clone)]
pub struct Fetcher {
    client: reqwest::Client,
    permits: Arc<Semaphore>,
}

impl Fetcher {
    pub fn new(max_in_flight: usize) -> Self {
        Fetcher {
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
                .build()
                .expect("failed to build HTTP client"),
            permits: Arc::new(Semaphore::new(max_in_flight)),
        }
    }

    /// Fetch and decode one catalog document. Any transport or decode
    /// failure is an absence, logged with the URL; it never propagates, so
    /// callers treat the subtree as missing and move on.
    pub async fn fetch_tree(&self, url: &str) -> Option<Value> {
        let _permit = self.permits.acquire().await.ok()?;

        for attempt in 0..=MAX_RETRIES {
            match self.get_text(url).await {
                Ok(body) => match xml::decode(&body) {
                    Ok(tree) => return Some(tree),
                    Err(e) => {
                        warn!("undecodable document at {}: {}", url, e);
                        return None;
                    }
                },
                Err(FetchError::Retryable(reason)) if attempt < MAX_RETRIES => {
                    let backoff = Duration::from_millis(BASE_BACKOFF_MS * 2u64.pow(attempt));
                    warn!(
                        "{} on {} (attempt {}/{}), backing off {:.1}s",
                        reason,
                        url,
                        attempt + 1,
                        MAX_RETRIES,
                        backoff.as_secs_f64()
                    );
                    tokio::time::sleep(backoff).await;
                }
                Err(e) => {
                    warn!("fetch failed for {}: {}", url, e.reason());
                    return None;
                }
            }
        }
        None
    }

    async fn get_text(&self, url: &str) -> Result<String, FetchError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| FetchError::Fatal(e.to_string()))?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
            return Err(FetchError::Retryable(format!("HTTP {}", status.as_u16())));
        }
        if !status.is_success() {
            return Err(FetchError::Fatal(format!("HTTP {}", status.as_u16())));
        }
        response
            .text()
            .await
            .map_err(|e| FetchError::Fatal(e.to_string()))
    }
}

enum FetchError {
    /// 429 and 5xx: the endpoint rate-limits aggressively during registration.
    Retryable(String),
    Fatal(String),
}

impl FetchError {
    fn reason(&self) -> &str {
        match self {
            FetchError::Retryable(s) | FetchError::Fatal(s) => s,
        }
    }
}
