//! Relaybot: a Discord bot that relays conversations to a language model.

pub mod agent;
pub mod commands;
pub mod config;
pub mod conversation;
pub mod error;
pub mod imaging;
pub mod llm;
pub mod locale;
pub mod messaging;
pub mod prompts;

pub use error::{Error, Result};

use agent::Responder;
use config::Config;
use conversation::ChannelStore;
use imaging::ImageServices;
use locale::Locale;
use prompts::Instructions;
use serenity::gateway::ShardManager;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

/// The bot account, known once the gateway is ready.
#[derive(Debug, Clone)]
pub struct BotIdentity {
    pub user_id: u64,
    pub name: String,
}

/// Shared state handed to every event and command handler.
pub struct AppState {
    pub config: Config,
    pub locale: Locale,
    pub responder: Responder,
    pub channels: ChannelStore,
    pub images: ImageServices,
    allow_dm: AtomicBool,
    identity: OnceLock<BotIdentity>,
    owner_id: OnceLock<u64>,
    shard_manager: OnceLock<Arc<ShardManager>>,
    presence_started: AtomicBool,
}

impl AppState {
    /// Load every file-backed resource and build the HTTP collaborators.
    pub async fn build(config: Config) -> Result<Self> {
        let locale = Locale::load(&config.bot.lang_dir, &config.bot.language).await;
        let instructions = Instructions::load(&config.bot).await;
        let channels = ChannelStore::load(&config.bot.active_channels_file).await?;

        let generation_client = llm::http_client(llm::GENERATION_TIMEOUT)?;
        let lookup_client = llm::http_client(llm::LOOKUP_TIMEOUT)?;

        let completion = Arc::new(llm::OpenAiChat::new(
            generation_client.clone(),
            &config.llm.base_url,
            config.llm.api_key.clone(),
            &config.llm.model,
        ));
        let oneshot = Arc::new(llm::OpenAiChat::new(
            generation_client.clone(),
            &config.llm.base_url,
            config.llm.api_key.clone(),
            config.llm.oneshot_model(),
        ));
        let search: Option<Arc<dyn llm::SearchBackend>> = if config.bot.internet_access {
            Some(Arc::new(llm::DuckDuckGo::new(
                lookup_client.clone(),
                &config.search.base_url,
                config.search.max_results,
            )))
        } else {
            None
        };

        let images = ImageServices::from_config(
            &config.images,
            config.llm.api_key.clone(),
            generation_client,
            lookup_client,
        );

        let responder = Responder::new(
            completion,
            oneshot,
            search,
            config.bot.max_history,
            instructions,
            &locale,
        );

        Ok(Self::new(config, locale, responder, channels, images))
    }

    pub fn new(
        config: Config,
        locale: Locale,
        responder: Responder,
        channels: ChannelStore,
        images: ImageServices,
    ) -> Self {
        let allow_dm = AtomicBool::new(config.bot.allow_dm);
        Self {
            config,
            locale,
            responder,
            channels,
            images,
            allow_dm,
            identity: OnceLock::new(),
            owner_id: OnceLock::new(),
            shard_manager: OnceLock::new(),
            presence_started: AtomicBool::new(false),
        }
    }

    pub fn allow_dm(&self) -> bool {
        self.allow_dm.load(Ordering::Relaxed)
    }

    /// Flip the DM toggle and return the new value.
    pub fn toggle_dm(&self) -> bool {
        !self.allow_dm.fetch_xor(true, Ordering::Relaxed)
    }

    pub fn identity(&self) -> Option<&BotIdentity> {
        self.identity.get()
    }

    pub fn set_identity(&self, identity: BotIdentity) {
        if self.identity.set(identity).is_err() {
            tracing::debug!("bot identity already recorded");
        }
    }

    pub fn owner_id(&self) -> Option<u64> {
        self.owner_id.get().copied()
    }

    pub fn set_owner_id(&self, owner_id: u64) {
        if self.owner_id.set(owner_id).is_err() {
            tracing::debug!("bot owner already recorded");
        }
    }

    pub fn shard_manager(&self) -> Option<&Arc<ShardManager>> {
        self.shard_manager.get()
    }

    pub fn set_shard_manager(&self, shard_manager: Arc<ShardManager>) {
        if self.shard_manager.set(shard_manager).is_err() {
            tracing::debug!("shard manager already recorded");
        }
    }

    /// True the first time it is called, false afterwards.
    pub fn claim_presence_loop(&self) -> bool {
        !self.presence_started.swap(true, Ordering::AcqRel)
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::error::BackendError;
    use crate::llm::{CompletionBackend, CompletionRequest};
    use async_trait::async_trait;

    pub struct EchoCompletion;

    #[async_trait]
    impl CompletionBackend for EchoCompletion {
        async fn complete(&self, request: CompletionRequest<'_>) -> std::result::Result<String, BackendError> {
            request
                .transcript
                .last()
                .map(|turn| turn.text.clone())
                .ok_or(BackendError::Empty("completion"))
        }
    }

    /// State with offline backends and a channel file under `dir`.
    pub async fn state(dir: &std::path::Path) -> AppState {
        let config = Config::default();
        let locale = Locale::default();
        let channels = ChannelStore::load(dir.join("channels.txt")).await.unwrap();
        let responder = Responder::new(
            Arc::new(EchoCompletion),
            Arc::new(EchoCompletion),
            None,
            config.bot.max_history,
            Instructions {
                persona_name: "Assist".into(),
                preamble: "System : test.".into(),
            },
            &locale,
        );
        let images = ImageServices::from_config(
            &config.images,
            None,
            reqwest::Client::new(),
            reqwest::Client::new(),
        );
        AppState::new(config, locale, responder, channels, images)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn dm_toggle_flips_and_reports_new_value() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_support::state(dir.path()).await;

        assert!(state.allow_dm());
        assert!(!state.toggle_dm());
        assert!(!state.allow_dm());
        assert!(state.toggle_dm());
    }

    #[tokio::test]
    async fn presence_loop_is_claimed_once() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_support::state(dir.path()).await;

        assert!(state.claim_presence_loop());
        assert!(!state.claim_presence_loop());
    }
}
