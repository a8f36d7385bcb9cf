//! Free-tier diffusion inference endpoint.

use super::{ImageBackend, image_bytes};
use crate::error::BackendError;
use async_trait::async_trait;

const SERVICE: &str = "diffusion";

/// Posts `{"inputs": prompt}` and receives the image bytes.
#[derive(Debug, Clone)]
pub struct Diffusion {
    http_client: reqwest::Client,
    url: String,
    api_key: Option<String>,
}

impl Diffusion {
    pub fn new(http_client: reqwest::Client, url: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            http_client,
            url: url.into(),
            api_key,
        }
    }
}

#[async_trait]
impl ImageBackend for Diffusion {
    async fn generate(&self, prompt: &str) -> Result<Vec<u8>, BackendError> {
        let mut request = self
            .http_client
            .post(&self.url)
            .json(&serde_json::json!({ "inputs": prompt }));

        if let Some(api_key) = &self.api_key {
            request = request.header("authorization", format!("Bearer {api_key}"));
        }

        let response = request
            .send()
            .await
            .map_err(|source| BackendError::Request {
                service: SERVICE,
                source,
            })?;

        image_bytes(SERVICE, response).await
    }
}
