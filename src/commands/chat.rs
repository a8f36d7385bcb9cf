//! Conversation commands: ping, clear, ask.

use super::{SlashCommand, follow_up, respond, string_option};
use crate::AppState;
use crate::conversation::SessionKey;
use crate::error::{Result, SessionError};
use crate::locale::Locale;
use async_trait::async_trait;
use serenity::all::{
    CommandInteraction, CommandOptionType, Context, CreateAllowedMentions, CreateCommandOption,
    CreateInteractionResponseFollowup, MessageFlags,
};
use std::time::Duration;

pub struct Ping;

#[async_trait]
impl SlashCommand for Ping {
    fn name(&self) -> &'static str {
        "ping"
    }

    fn description<'a>(&self, locale: &'a Locale) -> &'a str {
        &locale.ping
    }

    async fn execute(&self, ctx: &Context, command: &CommandInteraction, state: &AppState) -> Result<()> {
        let latency = gateway_latency(ctx, state).await;
        respond(ctx, command, &ping_message(&state.locale, latency), false).await
    }
}

async fn gateway_latency(ctx: &Context, state: &AppState) -> Option<Duration> {
    let manager = state.shard_manager()?;
    let runners = manager.runners.lock().await;
    runners.get(&ctx.shard_id).and_then(|runner| runner.latency)
}

fn ping_message(locale: &Locale, latency: Option<Duration>) -> String {
    match latency {
        Some(latency) => format!("{}{:.2} ms", locale.ping_message, latency.as_secs_f64() * 1000.0),
        // No heartbeat acknowledged yet.
        None => format!("{}n/a", locale.ping_message),
    }
}

pub struct Clear;

#[async_trait]
impl SlashCommand for Clear {
    fn name(&self) -> &'static str {
        "clear"
    }

    fn description<'a>(&self, locale: &'a Locale) -> &'a str {
        &locale.clear
    }

    async fn execute(&self, ctx: &Context, command: &CommandInteraction, state: &AppState) -> Result<()> {
        let key = SessionKey::new(command.user.id.get(), command.channel_id.get());
        let notice = match state.responder.sessions().clear(key).await {
            Ok(()) => &state.locale.history_cleared,
            Err(SessionError::NoHistory) => &state.locale.no_history,
        };
        respond(ctx, command, notice, true).await
    }
}

pub struct Ask;

#[async_trait]
impl SlashCommand for Ask {
    fn name(&self) -> &'static str {
        "ask"
    }

    fn description<'a>(&self, locale: &'a Locale) -> &'a str {
        &locale.ask
    }

    fn options(&self) -> Vec<CreateCommandOption> {
        vec![
            CreateCommandOption::new(CommandOptionType::String, "prompt", "Your question")
                .required(true),
        ]
    }

    async fn execute(&self, ctx: &Context, command: &CommandInteraction, state: &AppState) -> Result<()> {
        let prompt = string_option(command, "prompt").unwrap_or_default();
        command.defer(&ctx.http).await?;

        let chunks = match state.responder.ask(command.user.display_name(), prompt).await {
            Ok(chunks) => chunks,
            Err(error) => {
                tracing::warn!(%error, "ask completion failed");
                return follow_up(ctx, command, &state.locale.generation_failed).await;
            }
        };

        for chunk in chunks {
            command.create_followup(&ctx.http, answer_chunk(chunk)).await?;
        }
        Ok(())
    }
}

/// One chunk of an answer, with mentions disabled and embeds suppressed.
fn answer_chunk(chunk: String) -> CreateInteractionResponseFollowup {
    CreateInteractionResponseFollowup::new()
        .content(chunk)
        .allowed_mentions(CreateAllowedMentions::new())
        .flags(MessageFlags::SUPPRESS_EMBEDS)
}
