//! Slash commands: registry, permission checks and dispatch.

pub mod admin;
pub mod chat;
pub mod images;
pub mod info;

use crate::AppState;
use crate::error::Result;
use crate::locale::Locale;
use async_trait::async_trait;
use serenity::all::{
    CommandInteraction, Context, CreateCommand, CreateCommandOption,
    CreateInteractionResponse, CreateInteractionResponseFollowup, CreateInteractionResponseMessage,
    ResolvedValue,
};

/// Who may run a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permission {
    Everyone,
    Administrator,
    Owner,
}

/// A slash command.
#[async_trait]
pub trait SlashCommand: Send + Sync {
    fn name(&self) -> &'static str;

    fn description<'a>(&self, locale: &'a Locale) -> &'a str;

    fn options(&self) -> Vec<CreateCommandOption> {
        Vec::new()
    }

    fn permission(&self) -> Permission {
        Permission::Everyone
    }

    fn guild_only(&self) -> bool {
        false
    }

    async fn execute(&self, ctx: &Context, command: &CommandInteraction, state: &AppState) -> Result<()>;
}

static COMMANDS: &[&dyn SlashCommand] = &[
    &chat::Ping,
    &info::Help,
    &info::Support,
    &chat::Clear,
    &admin::ToggleDm,
    &admin::ToggleActive,
    &chat::Ask,
    &admin::ChangeUsername,
    &admin::Avatar,
    &images::Imagine,
    &images::ImagineDallE,
    &images::ImaginePollinations,
    &images::Gif,
    &admin::Backdoor,
];

/// Every registered command, in help order.
pub fn registry() -> &'static [&'static dyn SlashCommand] {
    COMMANDS
}

pub fn find(name: &str) -> Option<&'static dyn SlashCommand> {
    COMMANDS.iter().copied().find(|command| command.name() == name)
}

/// Builders for global command registration.
pub fn definitions(locale: &Locale) -> Vec<CreateCommand> {
    COMMANDS
        .iter()
        .map(|command| {
            CreateCommand::new(command.name())
                .description(command.description(locale))
                .set_options(command.options())
                .dm_permission(!command.guild_only())
        })
        .collect()
}

/// Facts about the invoking user that permission checks need.
#[derive(Debug, Clone, Copy, Default)]
pub struct Caller {
    pub in_guild: bool,
    pub is_administrator: bool,
    pub is_owner: bool,
}

/// Why a command was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Denial {
    GuildOnly,
    MissingPermissions,
    OwnerOnly,
}

impl Denial {
    pub fn message<'a>(&self, locale: &'a Locale) -> &'a str {
        match self {
            Denial::GuildOnly => locale.guild_only.as_str(),
            Denial::MissingPermissions => locale.missing_permissions.as_str(),
            Denial::OwnerOnly => locale.owner_only.as_str(),
        }
    }
}

/// Check a caller against a command's requirements.
pub fn authorize(command: &dyn SlashCommand, caller: Caller) -> std::result::Result<(), Denial> {
    if command.guild_only() && !caller.in_guild {
        return Err(Denial::GuildOnly);
    }
    match command.permission() {
        Permission::Everyone => Ok(()),
        Permission::Administrator if caller.is_administrator => Ok(()),
        Permission::Administrator => Err(Denial::MissingPermissions),
        Permission::Owner if caller.is_owner => Ok(()),
        Permission::Owner => Err(Denial::OwnerOnly),
    }
}

fn caller(command: &CommandInteraction, state: &AppState) -> Caller {
    Caller {
        in_guild: command.guild_id.is_some(),
        is_administrator: command
            .member
            .as_ref()
            .and_then(|member| member.permissions)
            .is_some_and(|permissions| permissions.administrator()),
        is_owner: state.owner_id() == Some(command.user.id.get()),
    }
}

/// Route an interaction to its command.
pub async fn dispatch(ctx: &Context, command: &CommandInteraction, state: &AppState) {
    let name = command.data.name.as_str();
    let Some(handler) = find(name) else {
        tracing::warn!(command = name, "unknown command");
        return;
    };

    tracing::info!(
        command = name,
        user_id = command.user.id.get(),
        channel_id = command.channel_id.get(),
        "slash command received"
    );

    if let Err(denial) = authorize(handler, caller(command, state)) {
        tracing::debug!(command = name, ?denial, "command refused");
        let message = format!("<@{}> {}", command.user.id, denial.message(&state.locale));
        if let Err(error) = respond(ctx, command, &message, true).await {
            tracing::warn!(%error, "failed to report refused command");
        }
        return;
    }

    if let Err(error) = handler.execute(ctx, command, state).await {
        tracing::error!(command = name, %error, "command failed");
        report_failure(&InteractionNotice { ctx, command }, &state.locale.command_failed).await;
    }
}

/// Where a failure notice for an interaction can be delivered.
#[async_trait]
trait NoticeTarget: Send + Sync {
    async fn create_response(&self, content: &str) -> Result<()>;

    async fn create_followup(&self, content: &str) -> Result<()>;
}

struct InteractionNotice<'a> {
    ctx: &'a Context,
    command: &'a CommandInteraction,
}

#[async_trait]
impl NoticeTarget for InteractionNotice<'_> {
    async fn create_response(&self, content: &str) -> Result<()> {
        respond(self.ctx, self.command, content, true).await
    }

    async fn create_followup(&self, content: &str) -> Result<()> {
        self.command
            .create_followup(
                &self.ctx.http,
                CreateInteractionResponseFollowup::new()
                    .content(content)
                    .ephemeral(true),
            )
            .await?;
        Ok(())
    }
}

/// Tell the user their command failed. Acknowledged interactions only take follow-ups.
async fn report_failure(target: &dyn NoticeTarget, content: &str) {
    if let Err(error) = target.create_response(content).await {
        tracing::debug!(%error, "interaction already acknowledged, sending failure as follow-up");
        if let Err(error) = target.create_followup(content).await {
            tracing::warn!(%error, "failed to report command failure");
        }
    }
}

/// Send the initial response to an interaction.
pub(crate) async fn respond(
    ctx: &Context,
    command: &CommandInteraction,
    content: &str,
    ephemeral: bool,
) -> Result<()> {
    command
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Message(
                CreateInteractionResponseMessage::new()
                    .content(content)
                    .ephemeral(ephemeral),
            ),
        )
        .await?;
    Ok(())
}

/// Respond, then remove the response after a few seconds.
pub(crate) async fn respond_transient(
    ctx: &Context,
    command: &CommandInteraction,
    content: &str,
) -> Result<()> {
    respond(ctx, command, content, false).await?;
    tokio::time::sleep(TRANSIENT_DELAY).await;
    command.delete_response(&ctx.http).await?;
    Ok(())
}

/// How long transient confirmations stay visible.
pub(crate) const TRANSIENT_DELAY: std::time::Duration = std::time::Duration::from_secs(3);

/// Send a follow-up after deferring.
pub(crate) async fn follow_up(ctx: &Context, command: &CommandInteraction, content: &str) -> Result<()> {
    command
        .create_followup(
            &ctx.http,
            CreateInteractionResponseFollowup::new().content(content),
        )
        .await?;
    Ok(())
}

pub(crate) fn string_option<'a>(command: &'a CommandInteraction, name: &str) -> Option<&'a str> {
    command
        .data
        .options()
        .into_iter()
        .find(|option| option.name == name)
        .and_then(|option| match option.value {
            ResolvedValue::String(value) => Some(value),
            _ => None,
        })
}

pub(crate) fn integer_option(command: &CommandInteraction, name: &str) -> Option<i64> {
    command
        .data
        .options()
        .into_iter()
        .find(|option| option.name == name)
        .and_then(|option| match option.value {
            ResolvedValue::Integer(value) => Some(value),
            _ => None,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Mutex;

    /// Records notices; the initial response fails once the interaction is acknowledged.
    struct RecordingTarget {
        acknowledged: bool,
        sent: Mutex<Vec<(&'static str, String)>>,
    }

    impl RecordingTarget {
        fn new(acknowledged: bool) -> Self {
            Self {
                acknowledged,
                sent: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl NoticeTarget for RecordingTarget {
        async fn create_response(&self, content: &str) -> Result<()> {
            if self.acknowledged {
                return Err(anyhow::anyhow!("interaction has already been acknowledged").into());
            }
            self.sent.lock().unwrap().push(("response", content.to_string()));
            Ok(())
        }

        async fn create_followup(&self, content: &str) -> Result<()> {
            self.sent.lock().unwrap().push(("followup", content.to_string()));
            Ok(())
        }
    }

    #[test]
    fn registry_covers_the_catalogue_once() {
        let names: Vec<_> = registry().iter().map(|command| command.name()).collect();
        let unique: HashSet<_> = names.iter().collect();
        assert_eq!(unique.len(), names.len());

        for expected in [
            "ping",
            "help",
            "support",
            "clear",
            "toggledm",
            "toggleactive",
            "ask",
            "changeusr",
            "pfp",
            "imagine",
            "imagine-dalle",
            "imagine-pollinations",
            "gif",
            "backdoor",
        ] {
            assert!(find(expected).is_some(), "missing {expected}");
        }
        assert!(find("nope").is_none());
    }

    #[test]
    fn every_command_has_a_description() {
        let locale = Locale::default();
        for command in registry() {
            assert!(!command.description(&locale).is_empty(), "{}", command.name());
        }
    }

    #[test]
    fn administrator_commands_refuse_members() {
        let toggle = find("toggleactive").unwrap();
        let member = Caller {
            in_guild: true,
            ..Default::default()
        };
        assert_eq!(authorize(toggle, member), Err(Denial::MissingPermissions));

        let admin = Caller {
            is_administrator: true,
            ..member
        };
        assert_eq!(authorize(toggle, admin), Ok(()));
    }

    #[test]
    fn owner_commands_need_the_owner() {
        let rename = find("changeusr").unwrap();
        let admin = Caller {
            in_guild: true,
            is_administrator: true,
            is_owner: false,
        };
        assert_eq!(authorize(rename, admin), Err(Denial::OwnerOnly));
        assert_eq!(
            authorize(rename, Caller { is_owner: true, ..admin }),
            Ok(())
        );
    }

    #[test]
    fn guild_only_commands_refuse_dms() {
        let imagine = find("imagine").unwrap();
        let dm = Caller {
            is_owner: true,
            ..Default::default()
        };
        assert_eq!(authorize(imagine, dm), Err(Denial::GuildOnly));
        assert_eq!(authorize(find("ping").unwrap(), dm), Ok(()));
    }

    #[tokio::test]
    async fn failure_before_acknowledging_gets_a_response() {
        let target = RecordingTarget::new(false);
        report_failure(&target, "boom").await;
        assert_eq!(*target.sent.lock().unwrap(), vec![("response", "boom".to_string())]);
    }

    #[tokio::test]
    async fn failure_after_deferring_gets_a_followup() {
        let target = RecordingTarget::new(true);
        report_failure(&target, "boom").await;
        assert_eq!(*target.sent.lock().unwrap(), vec![("followup", "boom".to_string())]);
    }
}
