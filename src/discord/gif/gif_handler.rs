// Discord-specific GIF filtering - builds GifEvents from messages and deletes
// what the filter rejects.

use crate::core::gif::{dispatch_gif_action, GifEvent};
use crate::core::moderation::MessageRef;
use crate::discord::{Data, Error};
use poise::serenity_prelude as serenity;
use std::sync::Arc;

fn is_gif_attachment(attachment: &serenity::Attachment) -> bool {
    attachment.content_type.as_deref() == Some("image/gif")
        || attachment.filename.to_ascii_lowercase().ends_with(".gif")
}

/// Build the GIF filter's view of a guild message, or `None` if it shouldn't
/// be checked (bots, system messages, DMs).
pub fn to_gif_event(msg: &serenity::Message, exempt: bool) -> Option<GifEvent> {
    if msg.author.bot || msg.author.system {
        return None;
    }
    let guild_id = msg.guild_id?;

    let media_urls = msg
        .attachments
        .iter()
        .map(|a| a.url.clone())
        .chain(msg.embeds.iter().filter_map(|e| e.url.clone()))
        .collect();
    let has_gif_media = msg.attachments.iter().any(is_gif_attachment)
        || msg.embeds.iter().any(|e| e.kind.as_deref() == Some("gifv"));

    Some(GifEvent {
        community_id: guild_id.get(),
        channel_id: msg.channel_id.get(),
        user_id: msg.author.id.get(),
        message_ref: MessageRef {
            channel_id: msg.channel_id.get(),
            message_id: msg.id.get(),
        },
        content: msg.content.clone(),
        media_urls,
        has_gif_media,
        exempt,
        timestamp: chrono::Utc::now(),
    })
}

/// Check a message against the GIF limit and the banned GIF list.
///
/// Returns `true` if the message is being removed.
pub async fn handle_message_for_gifs(
    ctx: &serenity::Context,
    msg: &serenity::Message,
    data: &Data,
) -> Result<bool, Error> {
    // Needs the guild in cache; unknown permissions mean "not an admin".
    let exempt = msg
        .author_permissions(ctx)
        .is_some_and(|p| p.contains(serenity::Permissions::ADMINISTRATOR));

    let Some(event) = to_gif_event(msg, exempt) else {
        return Ok(false);
    };

    let action = data
        .gifs
        .check_message(&event)
        .await
        .map_err(|e| Error::from(e.to_string()))?;

    if !action.is_actionable() {
        return Ok(false);
    }

    let dispatcher = Arc::clone(&data.dispatcher);
    tokio::spawn(async move {
        let report = dispatch_gif_action(dispatcher.as_ref(), &event, &action).await;
        if report.failed > 0 {
            tracing::warn!(
                community_id = event.community_id,
                user_id = event.user_id,
                failed = report.failed,
                "Some GIF moderation actions could not be completed"
            );
        }
    });

    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn guild_message(content: &str) -> serenity::Message {
        let mut msg = serenity::Message::default();
        msg.guild_id = Some(serenity::GuildId::new(1));
        msg.channel_id = serenity::ChannelId::new(2);
        msg.id = serenity::MessageId::new(3);
        msg.author.id = serenity::UserId::new(4);
        msg.content = content.to_string();
        msg
    }

    #[test]
    fn test_bots_and_dms_skipped() {
        let mut bot = guild_message("https://tenor.com/view/a-gif-1");
        bot.author.bot = true;
        assert!(to_gif_event(&bot, false).is_none());

        let mut dm = guild_message("https://tenor.com/view/a-gif-1");
        dm.guild_id = None;
        assert!(to_gif_event(&dm, false).is_none());
    }

    #[test]
    fn test_event_fields() {
        let event = to_gif_event(&guild_message("hi"), true).unwrap();

        assert_eq!(event.community_id, 1);
        assert_eq!(event.channel_id, 2);
        assert_eq!(event.user_id, 4);
        assert_eq!(event.message_ref.message_id, 3);
        assert!(event.exempt);
        assert!(!event.contains_gif());
    }

    #[test]
    fn test_gifv_embed_counts_as_gif() {
        let mut msg = guild_message("");
        let mut embed = serenity::Embed::default();
        embed.kind = Some("gifv".to_string());
        embed.url = Some("https://tenor.com/view/b-1".to_string());
        msg.embeds.push(embed);

        let event = to_gif_event(&msg, false).unwrap();
        assert!(event.has_gif_media);
        assert_eq!(event.media_urls, vec!["https://tenor.com/view/b-1".to_string()]);
    }
}
