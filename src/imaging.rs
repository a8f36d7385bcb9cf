//! Image and reaction-GIF generation services.

pub mod dalle;
pub mod diffusion;
pub mod gif;
pub mod pollinations;

pub use dalle::{DallE, DallESize};
pub use diffusion::Diffusion;
pub use gif::{GIF_CATEGORIES, GifBackend, NekosBest};
pub use pollinations::{Pollinations, generate_batch};

use crate::config::ImageConfig;
use crate::error::BackendError;
use async_trait::async_trait;
use std::sync::Arc;

/// An image service that returns one image per call.
#[async_trait]
pub trait ImageBackend: Send + Sync + 'static {
    async fn generate(&self, prompt: &str) -> Result<Vec<u8>, BackendError>;
}

/// Every image collaborator the commands use.
pub struct ImageServices {
    pub diffusion: Arc<dyn ImageBackend>,
    pub dalle: DallE,
    pub pollinations: Arc<dyn ImageBackend>,
    pub gif: Arc<dyn GifBackend>,
    pub filter: PromptFilter,
}

impl ImageServices {
    /// `generation_client` serves the image services, `lookup_client` the GIF lookup.
    pub fn from_config(
        config: &ImageConfig,
        openai_api_key: Option<String>,
        generation_client: reqwest::Client,
        lookup_client: reqwest::Client,
    ) -> Self {
        Self {
            diffusion: Arc::new(Diffusion::new(
                generation_client.clone(),
                &config.diffusion_url,
                config.diffusion_api_key.clone(),
            )),
            dalle: DallE::new(
                generation_client.clone(),
                &config.dalle_base_url,
                openai_api_key,
            ),
            pollinations: Arc::new(Pollinations::new(
                generation_client,
                &config.pollinations_base_url,
            )),
            gif: Arc::new(NekosBest::new(lookup_client, &config.gif_base_url)),
            filter: PromptFilter::new(config.nsfw_filter, &config.blacklist_words),
        }
    }
}

/// Refuses image prompts that contain blacklisted words.
#[derive(Debug, Clone, Default)]
pub struct PromptFilter {
    enabled: bool,
    words: Vec<String>,
}

impl PromptFilter {
    pub fn new(enabled: bool, words: &[String]) -> Self {
        Self {
            enabled,
            words: words
                .iter()
                .map(|word| word.trim().to_lowercase())
                .filter(|word| !word.is_empty())
                .collect(),
        }
    }

    /// Whether `prompt` contains a blacklisted word (case-insensitive).
    pub fn is_blocked(&self, prompt: &str) -> bool {
        if !self.enabled {
            return false;
        }
        let prompt = prompt.to_lowercase();
        self.words.iter().any(|word| prompt.contains(word.as_str()))
    }
}

/// Read a successful response body as bytes, mapping failures for `service`.
pub(crate) async fn image_bytes(
    service: &'static str,
    response: reqwest::Response,
) -> Result<Vec<u8>, BackendError> {
    let status = response.status();
    if !status.is_success() {
        let message = response.text().await.unwrap_or_default();
        return Err(BackendError::Status {
            service,
            status: status.as_u16(),
            message: crate::llm::completion::truncate_body(&message).to_string(),
        });
    }

    let bytes = response
        .bytes()
        .await
        .map_err(|source| BackendError::Request { service, source })?;

    if bytes.is_empty() {
        return Err(BackendError::Empty(service));
    }
    Ok(bytes.to_vec())
}
