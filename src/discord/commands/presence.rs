// Bot presence shown in the member list.

use poise::serenity_prelude as serenity;

/// Called once the bot is ready.
pub fn on_ready(ctx: &serenity::Context) {
    let activity = serenity::ActivityData::watching("over servers");
    ctx.set_presence(Some(activity), serenity::OnlineStatus::Online);
}
