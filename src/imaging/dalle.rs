//! DALL-E image generation over the OpenAI images API.

use crate::error::BackendError;
use base64::Engine as _;

const SERVICE: &str = "dall-e";

/// Most images one request may ask for.
pub const MAX_DALLE_IMAGES: u32 = 4;

/// Sizes offered by the command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DallESize {
    Small,
    #[default]
    Medium,
    Large,
}

impl DallESize {
    pub const ALL: [DallESize; 3] = [DallESize::Small, DallESize::Medium, DallESize::Large];

    pub fn as_str(&self) -> &'static str {
        match self {
            DallESize::Small => "256x256",
            DallESize::Medium => "512x512",
            DallESize::Large => "1024x1024",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            DallESize::Small => "Small",
            DallESize::Medium => "Medium",
            DallESize::Large => "Large",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|size| size.as_str() == value)
    }
}

/// Clamp a requested image count to `1..=4`.
pub fn clamp_count(requested: i64) -> u32 {
    requested.clamp(1, i64::from(MAX_DALLE_IMAGES)) as u32
}

#[derive(Debug, Clone)]
pub struct DallE {
    http_client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl DallE {
    pub fn new(http_client: reqwest::Client, base_url: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            http_client,
            base_url: base_url.into(),
            api_key,
        }
    }

    /// Generate up to four images of `size`.
    pub async fn generate(
        &self,
        prompt: &str,
        size: DallESize,
        count: u32,
    ) -> Result<Vec<Vec<u8>>, BackendError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or(BackendError::MissingKey(SERVICE))?;

        let url = format!(
            "{}/v1/images/generations",
            self.base_url.trim_end_matches('/')
        );
        let body = serde_json::json!({
            "prompt": prompt,
            "n": count.clamp(1, MAX_DALLE_IMAGES),
            "size": size.as_str(),
            "response_format": "b64_json",
        });

        let response = self
            .http_client
            .post(&url)
            .header("authorization", format!("Bearer {api_key}"))
            .json(&body)
            .send()
            .await
            .map_err(|source| BackendError::Request {
                service: SERVICE,
                source,
            })?;

        let status = response.status();
        let response_body: serde_json::Value =
            response.json().await.map_err(|source| BackendError::Request {
                service: SERVICE,
                source,
            })?;

        if !status.is_success() {
            let message = response_body["error"]["message"]
                .as_str()
                .unwrap_or("unknown error");
            return Err(BackendError::Status {
                service: SERVICE,
                status: status.as_u16(),
                message: message.to_string(),
            });
        }

        let images = response_body["data"]
            .as_array()
            .map(|data| data.as_slice())
            .unwrap_or_default()
            .iter()
            .filter_map(|item| item["b64_json"].as_str())
            .map(|encoded| {
                base64::engine::general_purpose::STANDARD
                    .decode(encoded)
                    .map_err(|error| BackendError::InvalidResponse {
                        service: SERVICE,
                        message: error.to_string(),
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        if images.is_empty() {
            return Err(BackendError::Empty(SERVICE));
        }
        Ok(images)
    }
}
