//! Reaction GIFs from nekos.best.

use crate::error::BackendError;
use async_trait::async_trait;

const SERVICE: &str = "gif";

/// Categories offered by the gif command.
pub const GIF_CATEGORIES: &[&str] = &[
    "baka", "bite", "blush", "bored", "cry", "cuddle", "dance", "facepalm", "feed", "handhold",
    "happy", "highfive", "hug", "kick", "kiss", "laugh", "nod", "nom", "nope", "pat", "poke",
    "pout", "punch", "shoot", "shrug",
];

/// A service mapping a category to an image URL.
#[async_trait]
pub trait GifBackend: Send + Sync + 'static {
    /// URL of the first result, `None` when the category returned nothing.
    async fn fetch(&self, category: &str) -> Result<Option<String>, BackendError>;
}

#[derive(Debug, Clone)]
pub struct NekosBest {
    http_client: reqwest::Client,
    base_url: String,
}

impl NekosBest {
    pub fn new(http_client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            http_client,
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl GifBackend for NekosBest {
    async fn fetch(&self, category: &str) -> Result<Option<String>, BackendError> {
        let url = format!("{}/{category}", self.base_url.trim_end_matches('/'));
        let response = self
            .http_client
            .get(&url)
            .send()
            .await
            .map_err(|source| BackendError::Request {
                service: SERVICE,
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(BackendError::Status {
                service: SERVICE,
                status: status.as_u16(),
                message: status.canonical_reason().unwrap_or("unknown").to_string(),
            });
        }

        let body: serde_json::Value = response.json().await.map_err(|source| BackendError::Request {
            service: SERVICE,
            source,
        })?;

        Ok(body["results"][0]["url"].as_str().map(str::to_string))
    }
}
