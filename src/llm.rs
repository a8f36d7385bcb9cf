//! Text generation collaborators: chat completion and web search.

pub mod completion;
pub mod search;

pub use completion::{CompletionBackend, CompletionRequest, OpenAiChat};
pub use search::{DuckDuckGo, SearchBackend};

use std::time::Duration;

/// Timeout for completion and image requests.
pub const GENERATION_TIMEOUT: Duration = Duration::from_secs(120);

/// Timeout for search and GIF lookups.
pub const LOOKUP_TIMEOUT: Duration = Duration::from_secs(30);

/// Build a shared HTTP client with the given request timeout.
pub fn http_client(timeout: Duration) -> crate::Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(concat!("relaybot/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|error| anyhow::anyhow!("failed to build HTTP client: {error}").into())
}
