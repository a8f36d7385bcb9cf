//! Rotating "playing" status.

use serenity::all::{ActivityData, Context};
use std::time::Duration;

/// Substitute the live guild count into a status template.
pub fn render_presence(template: &str, guild_count: usize) -> String {
    template.replace("{guild_count}", &guild_count.to_string())
}

/// Status strings in rotation order: configured ones, then the help footer.
pub fn rotation(statuses: &[String], help_footer: &str) -> Vec<String> {
    statuses
        .iter()
        .filter(|status| !status.trim().is_empty())
        .cloned()
        .chain(std::iter::once(help_footer.to_string()))
        .collect()
}

/// Cycle through `statuses` forever, one every `delay`.
pub async fn run_presence_loop(ctx: Context, statuses: Vec<String>, delay: Duration) {
    if statuses.is_empty() {
        return;
    }

    for template in statuses.iter().cycle() {
        let status = render_presence(template, ctx.cache.guild_count());
        tracing::trace!(%status, "updating presence");
        ctx.set_activity(Some(ActivityData::playing(status)));
        tokio::time::sleep(delay).await;
    }
}
