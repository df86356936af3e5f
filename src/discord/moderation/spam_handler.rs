// Discord-specific spam handling - turns serenity messages into core events and
// hands actionable verdicts to the dispatcher.

use crate::core::moderation::{dispatch_decision, MessageEvent, MessageRef};
use crate::discord::{Data, Error};
use poise::serenity_prelude as serenity;
use std::sync::Arc;

/// Build the core event for a guild message, or `None` if it shouldn't be checked.
///
/// Bots, system messages, DMs and messages with no text (attachments only)
/// never reach the detector.
pub fn to_message_event(msg: &serenity::Message) -> Option<MessageEvent> {
    if msg.author.bot || msg.author.system || msg.content.is_empty() {
        return None;
    }
    let guild_id = msg.guild_id?;

    Some(MessageEvent {
        community_id: guild_id.get(),
        user_id: msg.author.id.get(),
        channel_id: msg.channel_id.get(),
        content: msg.content.clone(),
        message_ref: MessageRef {
            channel_id: msg.channel_id.get(),
            message_id: msg.id.get(),
        },
        // Arrival time, not the message's own timestamp, so client clock
        // drift can't stretch or shrink the window.
        timestamp: chrono::Utc::now(),
    })
}

/// Check a message for spam and start the resulting actions.
///
/// Returns `true` if the message triggered an action. The actions themselves
/// run on a separate task so later messages are evaluated without waiting on
/// Discord's API.
pub async fn handle_message_for_spam(msg: &serenity::Message, data: &Data) -> Result<bool, Error> {
    let Some(event) = to_message_event(msg) else {
        return Ok(false);
    };

    let verdict = data
        .anti_spam
        .process_message(&event)
        .await
        .map_err(|e| Error::from(e.to_string()))?;

    if !verdict.decision.is_actionable() {
        return Ok(false);
    }

    let dispatcher = Arc::clone(&data.dispatcher);
    tokio::spawn(async move {
        let report = dispatch_decision(dispatcher.as_ref(), &event, &verdict).await;
        if report.failed > 0 {
            tracing::warn!(
                community_id = event.community_id,
                user_id = event.user_id,
                failed = report.failed,
                attempted = report.attempted,
                "Some anti-spam actions could not be completed"
            );
        }
    });

    Ok(true)
}
