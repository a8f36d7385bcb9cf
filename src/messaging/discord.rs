//! Discord gateway adapter: event handler and reply sink.

use crate::agent::{
    Inbound, MessageFacts, RepliedTo, ReplyRemover, ReplySink, ResponsePolicy, TypingGuard, should_respond,
};
use crate::conversation::{SentReply, SessionKey};
use crate::messaging::presence::{rotation, run_presence_loop};
use crate::{AppState, BotIdentity, commands};
use async_trait::async_trait;
use regex::Regex;
use serenity::all::{
    ChannelId, Command, Context, CreateAllowedMentions, CreateMessage, EventHandler, GuildId, Http,
    Interaction, Message, MessageFlags, MessageId, ReactionType, Ready,
};
use std::sync::{Arc, LazyLock};
use std::time::Duration;

static MENTION_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<@!?(\d+)>").expect("hardcoded regex"));

/// Replace `<@id>` and `<@!id>` with the display name of a known user.
///
/// Mentions of users not in `names` are left untouched.
pub fn resolve_mentions(text: &str, names: &[(u64, String)]) -> String {
    MENTION_PATTERN
        .replace_all(text, |captures: &regex::Captures<'_>| {
            let id = captures[1].parse::<u64>().ok();
            names
                .iter()
                .find(|(user_id, _)| Some(*user_id) == id)
                .map(|(_, name)| name.clone())
                .unwrap_or_else(|| captures[0].to_string())
        })
        .into_owned()
}

/// OAuth2 URL that adds the bot with slash commands.
pub fn invite_url(application_id: u64) -> String {
    format!(
        "https://discord.com/api/oauth2/authorize?client_id={application_id}&permissions=0&scope=bot%20applications.commands"
    )
}

/// serenity event handler for the bot.
pub struct Handler {
    state: Arc<AppState>,
}

impl Handler {
    pub fn new(state: Arc<AppState>) -> Self {
        Self { state }
    }

    async fn record_owner(&self, ctx: &Context) {
        match ctx.http.get_current_application_info().await {
            Ok(info) => {
                let owner = info
                    .owner
                    .map(|owner| owner.id)
                    .or_else(|| info.team.map(|team| team.owner_user_id));
                match owner {
                    Some(owner_id) => self.state.set_owner_id(owner_id.get()),
                    None => tracing::warn!("application has no owner, owner commands are disabled"),
                }
            }
            Err(error) => tracing::warn!(%error, "failed to fetch application info"),
        }
    }

    async fn register_commands(&self, ctx: &Context) {
        let definitions = commands::definitions(&self.state.locale);
        match Command::set_global_commands(&ctx.http, definitions).await {
            Ok(registered) => tracing::info!(count = registered.len(), "slash commands registered"),
            Err(error) => tracing::error!(%error, "failed to register slash commands"),
        }
    }

    fn facts<'a>(&self, msg: &Message, text: &'a str, channel_is_active: bool, bot_id: u64) -> MessageFacts<'a> {
        MessageFacts {
            author_is_bot: msg.author.bot,
            has_stickers: !msg.sticker_items.is_empty(),
            is_dm: msg.guild_id.is_none(),
            channel_is_active,
            text,
            mentions_bot: msg.mentions.iter().any(|user| user.id.get() == bot_id),
            mentions_everyone: msg.mention_everyone,
            replied_to: msg.referenced_message.as_deref().map(|replied| RepliedTo {
                author_is_self: replied.author.id.get() == bot_id,
                has_embeds: !replied.embeds.is_empty(),
            }),
        }
    }
}

/// Mentioned users with their guild nickname, or display name outside guilds.
fn mention_names(msg: &Message) -> Vec<(u64, String)> {
    msg.mentions
        .iter()
        .map(|user| {
            let name = user
                .member
                .as_ref()
                .and_then(|member| member.nick.clone())
                .unwrap_or_else(|| user.display_name().to_string());
            (user.id.get(), name)
        })
        .collect()
}

fn author_label(msg: &Message) -> String {
    msg.member
        .as_ref()
        .and_then(|member| member.nick.clone())
        .unwrap_or_else(|| msg.author.display_name().to_string())
}

#[async_trait]
impl EventHandler for Handler {
    async fn ready(&self, ctx: Context, ready: Ready) {
        tracing::info!(
            user = %ready.user.name,
            guilds = ready.guilds.len(),
            "connected to Discord"
        );

        self.state.set_identity(BotIdentity {
            user_id: ready.user.id.get(),
            name: ready.user.name.clone(),
        });
        self.record_owner(&ctx).await;
        self.register_commands(&ctx).await;

        tracing::info!(invite_url = %invite_url(ready.application.id.get()), "invite link");
        tracing::info!(model = %self.state.config.llm.model, "current model");

        if self.state.claim_presence_loop() {
            let statuses = rotation(
                &self.state.config.presence.statuses,
                &self.state.locale.help_footer,
            );
            let delay = Duration::from_secs(self.state.config.presence.change_delay_secs);
            tokio::spawn(run_presence_loop(ctx, statuses, delay));
        }
    }

    async fn message(&self, ctx: Context, msg: Message) {
        let Some(identity) = self.state.identity() else {
            return;
        };

        let text = resolve_mentions(&msg.content, &mention_names(&msg));
        let channel_is_active = self.state.channels.contains(msg.channel_id.get()).await;
        let facts = self.facts(&msg, &text, channel_is_active, identity.user_id);

        let config = &self.state.config.bot;
        let policy = ResponsePolicy {
            allow_dm: self.state.allow_dm(),
            smart_mention: config.smart_mention,
            trigger_words: &config.trigger_words,
            bot_name: &identity.name,
        };

        if !should_respond(&facts, &policy) {
            return;
        }

        tracing::debug!(
            message_id = msg.id.get(),
            channel_id = msg.channel_id.get(),
            user_id = msg.author.id.get(),
            "responding to message"
        );

        let label = author_label(&msg);
        let inbound = Inbound {
            message_id: msg.id.get(),
            key: SessionKey::new(msg.author.id.get(), msg.channel_id.get()),
            author_label: &label,
            text: &text,
        };
        let sink = DiscordReplySink {
            http: ctx.http.clone(),
            channel_id: msg.channel_id,
            message_id: msg.id,
        };

        let outcome = self.state.responder.respond(&inbound, &sink).await;
        tracing::debug!(message_id = msg.id.get(), ?outcome, "message handled");
    }

    async fn message_delete(
        &self,
        ctx: Context,
        _channel_id: ChannelId,
        deleted_message_id: MessageId,
        _guild_id: Option<GuildId>,
    ) {
        self.state
            .responder
            .retract(deleted_message_id.get(), ctx.http.as_ref())
            .await;
    }

    async fn interaction_create(&self, ctx: Context, interaction: Interaction) {
        if let Interaction::Command(command) = interaction {
            commands::dispatch(&ctx, &command, &self.state).await;
        }
    }
}

#[async_trait]
impl ReplyRemover for Http {
    async fn delete(&self, reply: SentReply) -> crate::Result<()> {
        ChannelId::new(reply.channel_id)
            .delete_message(self, MessageId::new(reply.message_id))
            .await?;
        Ok(())
    }
}

/// Replies to one Discord message.
pub struct DiscordReplySink {
    http: Arc<Http>,
    channel_id: ChannelId,
    message_id: MessageId,
}

#[async_trait]
impl ReplySink for DiscordReplySink {
    async fn add_reaction(&self, emoji: &str) -> crate::Result<()> {
        self.channel_id
            .create_reaction(&self.http, self.message_id, ReactionType::Unicode(emoji.to_string()))
            .await?;
        Ok(())
    }

    async fn remove_reaction(&self, emoji: &str) -> crate::Result<()> {
        self.channel_id
            .delete_reaction(
                &self.http,
                self.message_id,
                None,
                ReactionType::Unicode(emoji.to_string()),
            )
            .await?;
        Ok(())
    }

    fn start_typing(&self) -> TypingGuard {
        TypingGuard::new(self.channel_id.start_typing(&self.http))
    }

    async fn reply(&self, text: &str) -> crate::Result<u64> {
        let message = self
            .channel_id
            .send_message(
                &self.http,
                CreateMessage::new()
                    .content(text)
                    .reference_message((self.channel_id, self.message_id))
                    .allowed_mentions(CreateAllowedMentions::new())
                    .flags(MessageFlags::SUPPRESS_EMBEDS),
            )
            .await?;
        Ok(message.id.get())
    }

    async fn send(&self, text: &str) -> crate::Result<u64> {
        let message = self.channel_id.say(&self.http, text).await?;
        Ok(message.id.get())
    }
}
