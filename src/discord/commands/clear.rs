// Manual cleanup command - bulk removal of recent messages in a channel.

use crate::discord::{Context, Error};
use poise::serenity_prelude as serenity;

/// Delete the most recent messages in this channel.
#[poise::command(
    slash_command,
    guild_only,
    required_permissions = "MANAGE_MESSAGES",
    required_bot_permissions = "MANAGE_MESSAGES"
)]
pub async fn clear(
    ctx: Context<'_>,
    #[description = "Number of messages to delete (1-100)"]
    #[min = 1]
    #[max = 100]
    amount: u8,
) -> Result<(), Error> {
    ctx.defer_ephemeral().await?;

    let channel_id = ctx.channel_id();
    let messages = channel_id
        .messages(ctx.http(), serenity::GetMessages::new().limit(amount))
        .await?;

    // One request per message: bulk delete refuses anything older than two weeks.
    let mut deleted = 0usize;
    for message in &messages {
        match channel_id.delete_message(ctx.http(), message.id).await {
            Ok(()) => deleted += 1,
            Err(e) => tracing::warn!(
                channel_id = channel_id.get(),
                message_id = message.id.get(),
                "Failed to delete message: {}",
                e
            ),
        }
    }

    tracing::info!(
        channel_id = channel_id.get(),
        requested = amount,
        deleted,
        "Cleared messages"
    );

    ctx.send(
        poise::CreateReply::default()
            .content(format!("🧹 Deleted {} message(s).", deleted))
            .ephemeral(true),
    )
    .await?;
    Ok(())
}
