//! Top-level error types for Relaybot.

/// Crate-wide result type alias.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error enum wrapping domain-specific errors.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error("discord error: {0}")]
    Discord(#[from] Box<serenity::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<serenity::Error> for Error {
    fn from(error: serenity::Error) -> Self {
        Error::Discord(Box::new(error))
    }
}

/// Configuration loading errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to load config from {path}: {source}")]
    Load {
        path: String,
        source: std::io::Error,
    },

    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: String,
        source: toml::de::Error,
    },

    #[error("invalid configuration: {0}")]
    Invalid(String),

    #[error("missing required config key: {0}")]
    MissingKey(String),
}

/// Errors from the external generation, search and image services.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("{service} request failed: {source}")]
    Request {
        service: &'static str,
        source: reqwest::Error,
    },

    #[error("{service} returned {status}: {message}")]
    Status {
        service: &'static str,
        status: u16,
        message: String,
    },

    #[error("{service} returned an unexpected payload: {message}")]
    InvalidResponse {
        service: &'static str,
        message: String,
    },

    #[error("{0} returned no result")]
    Empty(&'static str),

    #[error("missing API key for {0}")]
    MissingKey(&'static str),
}

/// Session store errors surfaced to users.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("no message history for this channel")]
    NoHistory,
}
