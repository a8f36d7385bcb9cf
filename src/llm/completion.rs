//! OpenAI-compatible chat completion backend.

use crate::conversation::Turn;
use crate::error::BackendError;
use async_trait::async_trait;

const SERVICE: &str = "completion";

/// Everything a completion needs: preamble, optional search context, transcript.
#[derive(Debug, Clone, Copy)]
pub struct CompletionRequest<'a> {
    pub instructions: Option<&'a str>,
    pub search_context: Option<&'a str>,
    pub transcript: &'a [Turn],
}

/// A language-model completion service.
#[async_trait]
pub trait CompletionBackend: Send + Sync + 'static {
    /// Produce the assistant's reply. Empty output is an error.
    async fn complete(&self, request: CompletionRequest<'_>) -> Result<String, BackendError>;
}

/// Chat completions over `POST {base_url}/v1/chat/completions`.
#[derive(Debug, Clone)]
pub struct OpenAiChat {
    http_client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
}

impl OpenAiChat {
    pub fn new(
        http_client: reqwest::Client,
        base_url: impl Into<String>,
        api_key: Option<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            http_client,
            base_url: base_url.into(),
            api_key,
            model: model.into(),
        }
    }

    fn build_body(&self, request: &CompletionRequest<'_>) -> serde_json::Value {
        let mut messages = Vec::new();

        if let Some(instructions) = request.instructions {
            messages.push(serde_json::json!({
                "role": "system",
                "content": instructions,
            }));
        }

        if let Some(search) = request.search_context.filter(|s| !s.trim().is_empty()) {
            messages.push(serde_json::json!({
                "role": "system",
                "content": search,
            }));
        }

        for turn in request.transcript {
            let mut message = serde_json::json!({
                "role": turn.role.as_str(),
                "content": turn.text,
            });
            if let Some(name) = turn.author_label.as_deref().map(sanitize_name)
                && !name.is_empty()
            {
                message["name"] = serde_json::json!(name);
            }
            messages.push(message);
        }

        serde_json::json!({
            "model": self.model,
            "messages": messages,
        })
    }
}

#[async_trait]
impl CompletionBackend for OpenAiChat {
    async fn complete(&self, request: CompletionRequest<'_>) -> Result<String, BackendError> {
        let body = self.build_body(&request);

        let chat_completions_url = format!(
            "{}/v1/chat/completions",
            self.base_url.trim_end_matches('/')
        );

        let mut request_builder = self
            .http_client
            .post(&chat_completions_url)
            .header("content-type", "application/json");

        if let Some(api_key) = &self.api_key {
            request_builder = request_builder.header("authorization", format!("Bearer {api_key}"));
        }

        let response = request_builder
            .json(&body)
            .send()
            .await
            .map_err(|source| BackendError::Request {
                service: SERVICE,
                source,
            })?;

        let status = response.status();
        let response_text = response.text().await.map_err(|source| BackendError::Request {
            service: SERVICE,
            source,
        })?;

        let response_body: serde_json::Value =
            serde_json::from_str(&response_text).map_err(|error| BackendError::InvalidResponse {
                service: SERVICE,
                message: format!("({status}) not valid JSON: {error}: {}", truncate_body(&response_text)),
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

        let content = response_body["choices"][0]["message"]["content"]
            .as_str()
            .map(str::trim)
            .unwrap_or_default();

        if content.is_empty() {
            return Err(BackendError::Empty(SERVICE));
        }

        tracing::debug!(model = %self.model, chars = content.chars().count(), "completion received");

        Ok(content.to_string())
    }
}

/// Restrict an author label to the characters accepted in a message `name`.
pub fn sanitize_name(label: &str) -> String {
    label
        .chars()
        .map(|c| if c == ' ' { '_' } else { c })
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_' || *c == '-')
        .take(64)
        .collect()
}

pub(crate) fn truncate_body(body: &str) -> &str {
    match body.char_indices().nth(500) {
        Some((index, _)) => &body[..index],
        None => body,
    }
}
