//! Image generation and reaction GIF commands.

use super::{SlashCommand, follow_up, integer_option, respond, string_option};
use crate::AppState;
use crate::error::Result;
use crate::imaging::dalle::clamp_count;
use crate::imaging::pollinations::{MAX_BATCH, clamp_batch};
use crate::imaging::{DallESize, GIF_CATEGORIES, generate_batch};
use crate::locale::Locale;
use async_trait::async_trait;
use serenity::all::{
    CommandInteraction, CommandOptionType, Context, CreateAttachment, CreateCommandOption,
    CreateEmbed, CreateInteractionResponseFollowup, Message, ReactionType,
};

/// Votes added under every generated image.
const VOTE_REACTIONS: [&str; 2] = ["⬆️", "⬇️"];

fn prompt_option() -> CreateCommandOption {
    CreateCommandOption::new(
        CommandOptionType::String,
        "prompt",
        "Write an amazing prompt for an image",
    )
    .required(true)
}

/// Read the prompt, refusing blacklisted ones. `None` means a refusal was sent.
async fn checked_prompt<'a>(
    ctx: &Context,
    command: &'a CommandInteraction,
    state: &AppState,
) -> Result<Option<&'a str>> {
    let prompt = string_option(command, "prompt").unwrap_or_default();
    if state.images.filter.is_blocked(prompt) {
        tracing::info!(user_id = command.user.id.get(), "image prompt refused by filter");
        respond(ctx, command, &state.locale.prompt_blocked, true).await?;
        return Ok(None);
    }
    Ok(Some(prompt))
}

fn spoiler_image(bytes: Vec<u8>, prompt: &str) -> CreateAttachment {
    CreateAttachment::bytes(bytes, "SPOILER_image.png").description(prompt)
}

async fn add_votes(ctx: &Context, message: &Message) {
    for emoji in VOTE_REACTIONS {
        if let Err(error) = message
            .react(&ctx.http, ReactionType::Unicode(emoji.to_string()))
            .await
        {
            tracing::debug!(%error, "failed to add vote reaction");
        }
    }
}

fn generated_by(locale: &Locale, command: &CommandInteraction) -> String {
    format!("{} {}", locale.image_generated_by, command.user.name)
}

pub struct Imagine;

#[async_trait]
impl SlashCommand for Imagine {
    fn name(&self) -> &'static str {
        "imagine"
    }

    fn description<'a>(&self, locale: &'a Locale) -> &'a str {
        &locale.imagine
    }

    fn options(&self) -> Vec<CreateCommandOption> {
        vec![prompt_option()]
    }

    fn guild_only(&self) -> bool {
        true
    }

    async fn execute(&self, ctx: &Context, command: &CommandInteraction, state: &AppState) -> Result<()> {
        let Some(prompt) = checked_prompt(ctx, command, state).await? else {
            return Ok(());
        };
        command.defer(&ctx.http).await?;

        let image = match state.images.diffusion.generate(prompt).await {
            Ok(image) => image,
            Err(error) => {
                tracing::warn!(%error, "diffusion generation failed");
                return follow_up(ctx, command, &state.locale.image_failed).await;
            }
        };

        let message = command
            .create_followup(
                &ctx.http,
                CreateInteractionResponseFollowup::new()
                    .content(generated_by(&state.locale, command))
                    .add_file(spoiler_image(image, prompt)),
            )
            .await?;
        add_votes(ctx, &message).await;
        Ok(())
    }
}

pub struct ImagineDallE;

#[async_trait]
impl SlashCommand for ImagineDallE {
    fn name(&self) -> &'static str {
        "imagine-dalle"
    }

    fn description<'a>(&self, locale: &'a Locale) -> &'a str {
        &locale.imagine_dalle
    }

    fn options(&self) -> Vec<CreateCommandOption> {
        let size = DallESize::ALL.into_iter().fold(
            CreateCommandOption::new(CommandOptionType::String, "size", "Choose the size of the image")
                .required(true),
            |option, size| option.add_string_choice(format!("🔳 {}", size.label()), size.as_str()),
        );
        vec![
            prompt_option(),
            size,
            CreateCommandOption::new(CommandOptionType::Integer, "num_images", "Number of images")
                .min_int_value(1)
                .max_int_value(u64::from(crate::imaging::dalle::MAX_DALLE_IMAGES)),
        ]
    }

    fn guild_only(&self) -> bool {
        true
    }

    async fn execute(&self, ctx: &Context, command: &CommandInteraction, state: &AppState) -> Result<()> {
        let Some(prompt) = checked_prompt(ctx, command, state).await? else {
            return Ok(());
        };
        let size = string_option(command, "size")
            .and_then(DallESize::parse)
            .unwrap_or_default();
        let count = clamp_count(integer_option(command, "num_images").unwrap_or(1));
        command.defer(&ctx.http).await?;

        let images = match state.images.dalle.generate(prompt, size, count).await {
            Ok(images) => images,
            Err(error) => {
                tracing::warn!(%error, "DALL-E generation failed");
                return follow_up(ctx, command, &state.locale.image_failed).await;
            }
        };

        follow_up(ctx, command, &generated_by(&state.locale, command)).await?;
        for image in images {
            let message = command
                .create_followup(
                    &ctx.http,
                    CreateInteractionResponseFollowup::new().add_file(spoiler_image(image, prompt)),
                )
                .await?;
            add_votes(ctx, &message).await;
        }
        Ok(())
    }
}

pub struct ImaginePollinations;

#[async_trait]
impl SlashCommand for ImaginePollinations {
    fn name(&self) -> &'static str {
        "imagine-pollinations"
    }

    fn description<'a>(&self, locale: &'a Locale) -> &'a str {
        &locale.imagine_pollinations
    }

    fn options(&self) -> Vec<CreateCommandOption> {
        vec![
            prompt_option(),
            CreateCommandOption::new(CommandOptionType::Integer, "images", "Choose the amount of your image")
                .min_int_value(1)
                .max_int_value(MAX_BATCH as u64),
        ]
    }

    fn guild_only(&self) -> bool {
        true
    }

    async fn execute(&self, ctx: &Context, command: &CommandInteraction, state: &AppState) -> Result<()> {
        let Some(prompt) = checked_prompt(ctx, command, state).await? else {
            return Ok(());
        };
        let count = clamp_batch(integer_option(command, "images"));
        command.defer_ephemeral(&ctx.http).await?;

        let images = match generate_batch(state.images.pollinations.as_ref(), prompt, count).await {
            Ok(images) => images,
            Err(error) => {
                tracing::warn!(%error, count, "pollinations batch failed");
                return follow_up(ctx, command, &state.locale.image_failed).await;
            }
        };

        for files in attachment_batches(images) {
            command
                .create_followup(
                    &ctx.http,
                    CreateInteractionResponseFollowup::new()
                        .add_files(files)
                        .ephemeral(true),
                )
                .await?;
        }
        Ok(())
    }
}

/// Discord accepts at most this many files per message.
const ATTACHMENTS_PER_MESSAGE: usize = 10;

/// Number the images and group them into messages Discord will accept.
fn attachment_batches(images: Vec<Vec<u8>>) -> Vec<Vec<CreateAttachment>> {
    let files: Vec<_> = images
        .into_iter()
        .enumerate()
        .map(|(index, image)| CreateAttachment::bytes(image, format!("image_{}.png", index + 1)))
        .collect();
    files
        .chunks(ATTACHMENTS_PER_MESSAGE)
        .map(<[CreateAttachment]>::to_vec)
        .collect()
}

pub struct Gif;

#[async_trait]
impl SlashCommand for Gif {
    fn name(&self) -> &'static str {
        "gif"
    }

    fn description<'a>(&self, locale: &'a Locale) -> &'a str {
        &locale.gif
    }

    fn options(&self) -> Vec<CreateCommandOption> {
        let category = GIF_CATEGORIES.iter().fold(
            CreateCommandOption::new(CommandOptionType::String, "category", "Reaction category")
                .required(true),
            |option, category| option.add_string_choice(capitalize(category), *category),
        );
        vec![category]
    }

    fn guild_only(&self) -> bool {
        true
    }

    async fn execute(&self, ctx: &Context, command: &CommandInteraction, state: &AppState) -> Result<()> {
        let category = string_option(command, "category").unwrap_or_default();
        if !GIF_CATEGORIES.contains(&category) {
            return respond(ctx, command, &state.locale.gif_not_found, true).await;
        }
        command.defer(&ctx.http).await?;

        match state.images.gif.fetch(category).await {
            Ok(Some(url)) => {
                let embed = CreateEmbed::new().colour(0x141414).image(url);
                command
                    .create_followup(&ctx.http, CreateInteractionResponseFollowup::new().embed(embed))
                    .await?;
                Ok(())
            }
            Ok(None) => follow_up(ctx, command, &state.locale.gif_not_found).await,
            Err(error) => {
                tracing::warn!(category, %error, "gif lookup failed");
                follow_up(ctx, command, &state.locale.gif_fetch_failed).await
            }
        }
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
