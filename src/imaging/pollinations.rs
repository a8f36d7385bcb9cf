//! pollinations.ai prompt-to-image endpoint and batched generation.

use super::{ImageBackend, image_bytes};
use crate::error::BackendError;
use async_trait::async_trait;
use rand::Rng as _;

const SERVICE: &str = "pollinations";

/// Default images per batch.
pub const DEFAULT_BATCH: i64 = 4;

/// Most images one batch may request.
pub const MAX_BATCH: i64 = 18;

#[derive(Debug, Clone)]
pub struct Pollinations {
    http_client: reqwest::Client,
    base_url: String,
}

impl Pollinations {
    pub fn new(http_client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            http_client,
            base_url: base_url.into(),
        }
    }

    fn image_url(&self, prompt: &str, seed: u32) -> String {
        format!(
            "{}/prompt/{}?seed={seed}",
            self.base_url.trim_end_matches('/'),
            urlencoding::encode(prompt)
        )
    }
}

#[async_trait]
impl ImageBackend for Pollinations {
    async fn generate(&self, prompt: &str) -> Result<Vec<u8>, BackendError> {
        let seed = rand::rng().random_range(0..1_000_000_000u32);
        let response = self
            .http_client
            .get(self.image_url(prompt, seed))
            .send()
            .await
            .map_err(|source| BackendError::Request {
                service: SERVICE,
                source,
            })?;

        image_bytes(SERVICE, response).await
    }
}

/// Clamp a requested batch size to `1..=18`.
pub fn clamp_batch(requested: Option<i64>) -> usize {
    requested.unwrap_or(DEFAULT_BATCH).clamp(1, MAX_BATCH) as usize
}

/// Run `count` generations concurrently. The first failure fails the batch.
pub async fn generate_batch(
    backend: &dyn ImageBackend,
    prompt: &str,
    count: usize,
) -> Result<Vec<Vec<u8>>, BackendError> {
    let requests = (0..count).map(|_| backend.generate(prompt));
    futures::future::try_join_all(requests).await
}
