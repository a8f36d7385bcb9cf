//! Localization table: command descriptions and fixed user-facing messages.

use serde::Deserialize;
use std::path::Path;

/// Localized strings. Missing keys in a language file fall back to English.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Locale {
    // Command descriptions
    pub ping: String,
    pub help: String,
    pub support: String,
    pub clear: String,
    pub toggle_dm: String,
    pub toggle_active: String,
    pub ask: String,
    pub change_username: String,
    pub avatar: String,
    pub imagine: String,
    pub imagine_dalle: String,
    pub imagine_pollinations: String,
    pub gif: String,
    pub list_invites: String,

    // Messages
    pub ping_message: String,
    pub help_footer: String,
    pub help_support_hint: String,
    pub channel_deactivated: String,
    pub channel_activated: String,
    pub dm_enabled: String,
    pub dm_disabled: String,
    pub history_cleared: String,
    pub no_history: String,
    pub username_taken_prefix: String,
    pub username_taken_suffix: String,
    pub username_changed: String,
    pub avatar_changing: String,
    pub avatar_not_image: String,
    pub image_generated_by: String,
    pub prompt_blocked: String,
    pub image_failed: String,
    pub gif_fetch_failed: String,
    pub gif_not_found: String,
    pub generation_failed: String,
    pub delivery_failed: String,
    pub command_failed: String,
    pub missing_permissions: String,
    pub owner_only: String,
    pub guild_only: String,
    pub no_invite_permission: String,
}

impl Default for Locale {
    fn default() -> Self {
        Self {
            ping: "Check the bot's latency".into(),
            help: "Show all available commands".into(),
            support: "Provides support information".into(),
            clear: "Clear your message history with the bot in this channel".into(),
            toggle_dm: "Toggle whether the bot answers direct messages".into(),
            toggle_active: "Toggle whether the bot answers every message in this channel".into(),
            ask: "Ask a single question without conversation history".into(),
            change_username: "Change the bot's username".into(),
            avatar: "Change the bot's avatar".into(),
            imagine: "Generate an image from a prompt".into(),
            imagine_dalle: "Create images using DALL-E".into(),
            imagine_pollinations: "Bring your imagination into reality with pollinations.ai".into(),
            gif: "Send a reaction GIF".into(),
            list_invites: "List servers with invites".into(),

            ping_message: "Pong! Latency: ".into(),
            help_footer: "Use /help to see every command".into(),
            help_support_hint: "For further assistance or support, run `/support` command.".into(),
            channel_deactivated: "has been removed from the active channels.".into(),
            channel_activated: "has been set as an active channel.".into(),
            dm_enabled: "DMs are now on".into(),
            dm_disabled: "DMs are now off".into(),
            history_cleared: "Message history has been cleared".into(),
            no_history: "⚠️ There is no message history to be cleared".into(),
            username_taken_prefix: "Sorry, the username '".into(),
            username_taken_suffix: "' is already taken.".into(),
            username_changed: "Username changed to ".into(),
            avatar_changing: "Changing the avatar...".into(),
            avatar_not_image: "Please upload an image file.".into(),
            image_generated_by: "🎨 Generated Image by".into(),
            prompt_blocked: "Your prompt contains a blocked word.".into(),
            image_failed: "Sorry, the image could not be generated.".into(),
            gif_fetch_failed: "Failed to fetch the image.".into(),
            gif_not_found: "No image found.".into(),
            generation_failed: "I apologize for any inconvenience caused. It seems that there was \
                an error preventing the delivery of my message."
                .into(),
            delivery_failed: "I apologize for any inconvenience caused. It seems that there was \
                an error preventing the delivery of my message. Additionally, it appears that the \
                message I was replying to has been deleted, which could be the reason for the \
                issue. If you have any further questions or if there's anything else I can assist \
                you with, please let me know and I'll be happy to help."
                .into(),
            command_failed: "Something went wrong while running this command.".into(),
            missing_permissions: "You do not have permission to use this command.".into(),
            owner_only: "Only the owner of the bot can use this command.".into(),
            guild_only: "This command can only be used in a server.".into(),
            no_invite_permission: "*[No invite permission]*".into(),
        }
    }
}

impl Locale {
    /// Load `<lang_dir>/<language>.json`, falling back to English.
    pub async fn load(lang_dir: &Path, language: &str) -> Self {
        let path = lang_dir.join(format!("{language}.json"));
        match tokio::fs::read_to_string(&path).await {
            Ok(raw) => Self::from_json(&raw).unwrap_or_else(|error| {
                tracing::warn!(path = %path.display(), %error, "invalid language file, using English");
                Self::default()
            }),
            Err(error) => {
                if language != "en" {
                    tracing::warn!(path = %path.display(), %error, "language file not found, using English");
                }
                Self::default()
            }
        }
    }

    pub fn from_json(raw: &str) -> serde_json::Result<Self> {
        serde_json::from_str(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_language_file_falls_back_to_english() {
        let locale = Locale::from_json(r#"{"ping": "Latenz prüfen"}"#).unwrap();
        assert_eq!(locale.ping, "Latenz prüfen");
        assert_eq!(locale.help, Locale::default().help);
    }

    #[tokio::test]
    async fn missing_file_yields_english() {
        let dir = tempfile::tempdir().unwrap();
        let locale = Locale::load(dir.path(), "fr").await;
        assert_eq!(locale.dm_enabled, "DMs are now on");
    }

    #[tokio::test]
    async fn loads_language_file_from_directory() {
        let dir = tempfile::tempdir().unwrap();
        tokio::fs::write(dir.path().join("es.json"), r#"{"dm_enabled": "DMs activados"}"#)
            .await
            .unwrap();
        let locale = Locale::load(dir.path(), "es").await;
        assert_eq!(locale.dm_enabled, "DMs activados");
    }
}
