//! Help and support embeds.

use super::{SlashCommand, registry};
use crate::AppState;
use crate::config::SupportConfig;
use crate::error::Result;
use crate::locale::Locale;
use async_trait::async_trait;
use serenity::all::{
    CommandInteraction, Context, CreateEmbed, CreateEmbedFooter, CreateInteractionResponse,
    CreateInteractionResponseMessage,
};

const EMBED_COLOUR: u32 = 0x03a64b;

async fn send_embed(ctx: &Context, command: &CommandInteraction, embed: CreateEmbed) -> Result<()> {
    command
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Message(CreateInteractionResponseMessage::new().embed(embed)),
        )
        .await?;
    Ok(())
}

pub struct Help;

#[async_trait]
impl SlashCommand for Help {
    fn name(&self) -> &'static str {
        "help"
    }

    fn description<'a>(&self, locale: &'a Locale) -> &'a str {
        &locale.help
    }

    async fn execute(&self, ctx: &Context, command: &CommandInteraction, state: &AppState) -> Result<()> {
        let avatar_url = ctx.cache.current_user().avatar_url();

        let mut embed = CreateEmbed::new()
            .title("Bot Commands")
            .colour(EMBED_COLOUR)
            .fields(help_fields(&state.locale))
            .field("Need Support?", &state.locale.help_support_hint, false)
            .footer(CreateEmbedFooter::new(&state.locale.help_footer));
        if let Some(avatar_url) = avatar_url {
            embed = embed.thumbnail(avatar_url);
        }

        send_embed(ctx, command, embed).await
    }
}

/// One `(name, description, inline)` field per registered command.
fn help_fields(locale: &Locale) -> Vec<(&'static str, &str, bool)> {
    registry()
        .iter()
        .map(|command| (command.name(), command.description(locale), false))
        .collect()
}

pub struct Support;

#[async_trait]
impl SlashCommand for Support {
    fn name(&self) -> &'static str {
        "support"
    }

    fn description<'a>(&self, locale: &'a Locale) -> &'a str {
        &locale.support
    }

    async fn execute(&self, ctx: &Context, command: &CommandInteraction, state: &AppState) -> Result<()> {
        let embed = support_fields(&state.config.support).into_iter().fold(
            CreateEmbed::new()
                .title("Support Information")
                .colour(EMBED_COLOUR),
            |embed, (name, value)| embed.field(name, value, false),
        );
        send_embed(ctx, command, embed).await
    }
}

fn support_fields(support: &SupportConfig) -> [(&'static str, String); 2] {
    [
        (
            "Discord Server",
            format!(
                "[Join Here]({})\nCheck out our Discord server for community discussions, support, and updates.",
                support.discord_invite
            ),
        ),
        (
            "GitHub Repository",
            format!(
                "[GitHub Repo]({})\nExplore our GitHub repository for the source code, documentation, and contribution opportunities.",
                support.github_repo
            ),
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn help_lists_every_command() {
        let locale = Locale::default();
        let fields = help_fields(&locale);

        assert_eq!(fields.len(), registry().len());
        assert!(fields.iter().any(|(name, description, _)| *name == "ask" && *description == locale.ask));
    }

    #[test]
    fn support_links_come_from_config() {
        let support = SupportConfig {
            discord_invite: "https://discord.gg/relay".into(),
            github_repo: "https://github.com/relay/relaybot".into(),
        };
        let fields = support_fields(&support);

        assert!(fields[0].1.starts_with("[Join Here](https://discord.gg/relay)"));
        assert!(fields[1].1.contains("https://github.com/relay/relaybot"));
    }
}
