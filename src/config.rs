//! Configuration loading and validation.

use crate::error::{ConfigError, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// File name looked up in the working directory when no path is given.
const LOCAL_CONFIG_FILE: &str = "relaybot.toml";

/// Relaybot configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Chat behaviour: triggers, history, persona.
    pub bot: BotConfig,

    /// Rotating status strings.
    pub presence: PresenceConfig,

    /// Chat completion provider.
    pub llm: LlmConfig,

    /// Web search provider.
    pub search: SearchConfig,

    /// Image generation providers and prompt filtering.
    pub images: ImageConfig,

    /// Links shown by the support command.
    pub support: SupportConfig,

    /// Discord bot token (from `DISCORD_TOKEN`, never from the file).
    #[serde(skip)]
    pub discord_token: Option<String>,
}

/// Chat behaviour settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BotConfig {
    /// Substrings that make any message addressed to the bot.
    pub trigger_words: Vec<String>,

    /// Initial value of the DM toggle.
    pub allow_dm: bool,

    /// Respond to mentions, replies and the bot's own name.
    pub smart_mention: bool,

    /// Maximum number of turns kept per session.
    pub max_history: usize,

    /// Name of the instruction template (file stem in `instructions_dir`).
    pub instructions: String,

    /// Augment prompts with web search results.
    pub internet_access: bool,

    /// Language code of the localization table.
    pub language: String,

    pub active_channels_file: PathBuf,
    pub instructions_dir: PathBuf,
    pub lang_dir: PathBuf,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            trigger_words: Vec::new(),
            allow_dm: true,
            smart_mention: true,
            max_history: 8,
            instructions: "assist".into(),
            internet_access: true,
            language: "en".into(),
            active_channels_file: PathBuf::from("channels.txt"),
            instructions_dir: PathBuf::from("instructions"),
            lang_dir: PathBuf::from("lang"),
        }
    }
}

/// Presence rotation settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PresenceConfig {
    /// Status strings; `{guild_count}` is replaced with the live guild count.
    pub statuses: Vec<String>,
    pub change_delay_secs: u64,
}

impl Default for PresenceConfig {
    fn default() -> Self {
        Self {
            statuses: vec!["/help".into(), "in {guild_count} servers".into()],
            change_delay_secs: 60,
        }
    }
}

/// Chat completion provider configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// OpenAI-compatible base URL (without `/v1`).
    pub base_url: String,

    /// Model used for conversations.
    pub model: String,

    /// Model used by the stateless `ask` command. Falls back to `model`.
    pub oneshot_model: Option<String>,

    /// API key (from `OPENAI_API_KEY`).
    #[serde(skip)]
    pub api_key: Option<String>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com".into(),
            model: "gpt-3.5-turbo".into(),
            oneshot_model: Some("gpt-4".into()),
            api_key: None,
        }
    }
}

impl LlmConfig {
    pub fn oneshot_model(&self) -> &str {
        self.oneshot_model.as_deref().unwrap_or(&self.model)
    }
}

/// Web search provider configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub base_url: String,
    pub max_results: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.duckduckgo.com".into(),
            max_results: 5,
        }
    }
}

/// Image generation configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ImageConfig {
    /// Words that make a prompt refused when `nsfw_filter` is on.
    pub blacklist_words: Vec<String>,
    pub nsfw_filter: bool,

    /// Free-tier diffusion inference endpoint.
    pub diffusion_url: String,

    /// API key for the diffusion endpoint (from `DIFFUSION_API_KEY`).
    #[serde(skip)]
    pub diffusion_api_key: Option<String>,

    /// OpenAI-compatible base URL for DALL-E.
    pub dalle_base_url: String,

    pub pollinations_base_url: String,
    pub gif_base_url: String,
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            blacklist_words: Vec::new(),
            nsfw_filter: false,
            diffusion_url:
                "https://api-inference.huggingface.co/models/stabilityai/stable-diffusion-2-1"
                    .into(),
            diffusion_api_key: None,
            dalle_base_url: "https://api.openai.com".into(),
            pollinations_base_url: "https://image.pollinations.ai".into(),
            gif_base_url: "https://nekos.best/api/v2".into(),
        }
    }
}

/// Support links.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SupportConfig {
    pub discord_invite: String,
    pub github_repo: String,
}

impl Default for SupportConfig {
    fn default() -> Self {
        Self {
            discord_invite: "https://discord.gg/".into(),
            github_repo: "https://github.com/".into(),
        }
    }
}

impl Config {
    /// Load configuration from the first config file found, then the environment.
    ///
    /// Looks for `./relaybot.toml`, then `<config dir>/relaybot/config.toml`,
    /// and falls back to built-in defaults when neither exists.
    pub fn load() -> Result<Self> {
        let candidates = [
            Some(PathBuf::from(LOCAL_CONFIG_FILE)),
            dirs::config_dir().map(|dir| dir.join("relaybot").join("config.toml")),
        ];

        for path in candidates.into_iter().flatten() {
            if path.is_file() {
                return Self::load_from_path(&path);
            }
        }

        tracing::info!("no config file found, using defaults");
        let mut config = Self::default();
        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    /// Load from a specific config file path.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Load {
            path: path.display().to_string(),
            source,
        })?;

        let mut config = Self::from_toml(&raw, path)?;
        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    fn from_toml(raw: &str, path: &Path) -> Result<Self> {
        toml::from_str(raw).map_err(|source| {
            ConfigError::Parse {
                path: path.display().to_string(),
                source,
            }
            .into()
        })
    }

    /// Pull secrets from the environment.
    fn apply_env(&mut self) {
        self.discord_token = non_empty_env("DISCORD_TOKEN");
        self.llm.api_key = non_empty_env("OPENAI_API_KEY");
        self.images.diffusion_api_key = non_empty_env("DIFFUSION_API_KEY");
    }

    /// Reject settings the bot cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.bot.max_history == 0 {
            return Err(ConfigError::Invalid("bot.max_history must be at least 1".into()).into());
        }
        if self.presence.change_delay_secs == 0 {
            return Err(ConfigError::Invalid(
                "presence.change_delay_secs must be at least 1".into(),
            )
            .into());
        }
        if self.bot.instructions.trim().is_empty() {
            return Err(ConfigError::MissingKey("bot.instructions".into()).into());
        }
        Ok(())
    }

    /// The Discord token, required to connect.
    pub fn discord_token(&self) -> Result<&str> {
        self.discord_token
            .as_deref()
            .ok_or_else(|| ConfigError::MissingKey("DISCORD_TOKEN".into()).into())
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(raw: &str) -> Config {
        Config::from_toml(raw, Path::new("test.toml")).expect("config should parse")
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let config = parse(
            r#"
            [bot]
            trigger_words = ["bot", "hey"]
            max_history = 4

            [llm]
            model = "gpt-4o-mini"
            "#,
        );

        assert_eq!(config.bot.trigger_words, vec!["bot", "hey"]);
        assert_eq!(config.bot.max_history, 4);
        assert!(config.bot.smart_mention);
        assert_eq!(config.llm.model, "gpt-4o-mini");
        assert_eq!(config.llm.oneshot_model(), "gpt-4");
        assert_eq!(config.presence.change_delay_secs, 60);
        tokio_test::assert_ok!(config.validate());
    }

    #[test]
    fn oneshot_model_falls_back_to_model() {
        let mut config = Config::default();
        config.llm.oneshot_model = None;
        assert_eq!(config.llm.oneshot_model(), config.llm.model);
    }

    #[test]
    fn zero_history_is_rejected() {
        let config = parse("[bot]\nmax_history = 0\n");
        tokio_test::assert_err!(config.validate());
    }

    #[test]
    fn zero_presence_delay_is_rejected() {
        let config = parse("[presence]\nchange_delay_secs = 0\n");
        assert!(config.validate().is_err());
    }

    #[test]
    fn malformed_file_reports_path() {
        let error = Config::from_toml("[bot\n", Path::new("broken.toml")).unwrap_err();
        assert!(error.to_string().contains("broken.toml"));
    }

    #[test]
    fn missing_token_is_an_error() {
        let config = Config::default();
        assert!(config.discord_token().is_err());
    }
}
