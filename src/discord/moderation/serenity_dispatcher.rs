// Discord implementation of ActionDispatcher - deletes, bans and posts through
// the serenity HTTP client.

use crate::core::moderation::{
    ActionDispatcher, DispatchError, MessageRef, ModerationAction, Notification, NotifyTarget,
};
use async_trait::async_trait;
use poise::serenity_prelude as serenity;
use ::serenity::http::Http;
use std::sync::Arc;
use std::time::Duration;

// Discord rejects messages over 2000 characters. The quote, the channel list
// (about 25 characters per mention) and the template must fit together.
const MAX_QUOTED_CONTENT: usize = 1000;
const MAX_LISTED_CHANNELS: usize = 20;

pub struct SerenityDispatcher {
    http: Arc<Http>,
    /// How long the "slow down" notice stays in the channel
    notice_ttl: Duration,
}

impl SerenityDispatcher {
    pub fn new(http: Arc<Http>, notice_ttl: Duration) -> Self {
        Self { http, notice_ttl }
    }
}

/// Map a serenity error to the dispatch taxonomy by HTTP status.
fn classify(err: ::serenity::Error) -> DispatchError {
    let status = match &err {
        ::serenity::Error::Http(http_err) => http_err.status_code().map(|s| s.as_u16()),
        _ => None,
    };
    match status {
        Some(403) => DispatchError::Forbidden(err.to_string()),
        Some(404) => DispatchError::TargetMissing(err.to_string()),
        _ => DispatchError::Platform(err.to_string()),
    }
}

// Serenity ids are non-zero; a zero id can only come from a bad policy row.
fn channel_id(id: u64) -> Result<serenity::ChannelId, DispatchError> {
    if id == 0 {
        return Err(DispatchError::TargetMissing("channel id 0".to_string()));
    }
    Ok(serenity::ChannelId::new(id))
}

fn nonzero_ids(ids: impl IntoIterator<Item = u64>) -> impl Iterator<Item = u64> {
    ids.into_iter().filter(|id| *id != 0)
}

/// Quote user content without letting it break out of the code span.
fn quote(content: &str) -> String {
    let cleaned: String = content
        .chars()
        .take(MAX_QUOTED_CONTENT)
        .map(|c| if c == '`' { '\'' } else { c })
        .collect();
    format!("`{}`", cleaned)
}

/// Channel mentions, with anything past `MAX_LISTED_CHANNELS` summarized.
fn channel_list(channels: &[u64]) -> String {
    let mut list = channels
        .iter()
        .take(MAX_LISTED_CHANNELS)
        .map(|c| format!("<#{}>", c))
        .collect::<Vec<_>>()
        .join(", ");
    if channels.len() > MAX_LISTED_CHANNELS {
        list.push_str(&format!(" and {} more", channels.len() - MAX_LISTED_CHANNELS));
    }
    list
}

/// Render a notification as Discord message text.
pub fn render_notification(notification: &Notification) -> String {
    match notification {
        Notification::SlowDown { user_id } => format!(
            "<@{}>, you have been flagged for spamming. Please slow down.",
            user_id
        ),
        Notification::GifLimitReached { user_id } => format!(
            "<@{}>, this channel's GIF limit has been reached. Please wait before posting more GIFs.",
            user_id
        ),
        Notification::BannedGif { user_id } => {
            format!("<@{}>, that GIF is banned on this server.", user_id)
        }
        Notification::StaffAlert {
            user_id,
            action,
            exclusion_succeeded,
            repeated_content,
            channels,
            staff_role,
            ..
        } => {
            let staff = staff_role
                .map(|role| format!("<@&{}>", role))
                .unwrap_or_else(|| "Staff".to_string());
            let listed = channel_list(channels);

            match action {
                ModerationAction::Exclude if *exclusion_succeeded => format!(
                    "🔔 **Anti-spam alert** 🔔\n\
                     {}, <@{}> has been **banned** for spamming in **{} channels**.\n\
                     **Repeated message**: {}\n\
                     **Channels**: {}",
                    staff,
                    user_id,
                    channels.len(),
                    quote(repeated_content),
                    listed
                ),
                ModerationAction::Exclude => format!(
                    "🔔 **Anti-spam alert** 🔔\n\
                     {}, <@{}> (`{}`) spammed in **{} channels** but could **not** be banned. \
                     Please ban them manually.\n\
                     **Repeated message**: {}\n\
                     **Channels**: {}",
                    staff,
                    user_id,
                    user_id,
                    channels.len(),
                    quote(repeated_content),
                    listed
                ),
                _ => format!(
                    "🔔 **Anti-spam alert** 🔔\n\
                     {}, suspicious activity detected.\n\
                     **User**: <@{}> (`{}`)\n\
                     **Repeated message**: {}\n\
                     **Channels**: {}\n\
                     Please review this user's activity.",
                    staff,
                    user_id,
                    user_id,
                    quote(repeated_content),
                    listed
                ),
            }
        }
    }
}

/// Only ping the people the notification is about, never whatever the
/// spammer put in their message (e.g. @everyone).
fn allowed_mentions(notification: &Notification) -> serenity::CreateAllowedMentions {
    match notification {
        Notification::SlowDown { user_id }
        | Notification::GifLimitReached { user_id }
        | Notification::BannedGif { user_id } => serenity::CreateAllowedMentions::new()
            .users(nonzero_ids([*user_id]).map(serenity::UserId::new)),
        Notification::StaffAlert {
            user_id,
            staff_role,
            ..
        } => serenity::CreateAllowedMentions::new()
            .users(nonzero_ids([*user_id]).map(serenity::UserId::new))
            .roles(nonzero_ids(*staff_role).map(serenity::RoleId::new)),
    }
}

#[async_trait]
impl ActionDispatcher for SerenityDispatcher {
    async fn retract(&self, message: MessageRef) -> Result<(), DispatchError> {
        if message.message_id == 0 {
            return Err(DispatchError::TargetMissing("message id 0".to_string()));
        }
        channel_id(message.channel_id)?
            .delete_message(&self.http, serenity::MessageId::new(message.message_id))
            .await
            .map_err(classify)
    }

    async fn exclude(
        &self,
        community_id: u64,
        user_id: u64,
        reason: &str,
    ) -> Result<(), DispatchError> {
        if community_id == 0 || user_id == 0 {
            return Err(DispatchError::TargetMissing("guild or user id 0".to_string()));
        }
        serenity::GuildId::new(community_id)
            .ban_with_reason(&self.http, serenity::UserId::new(user_id), 0, reason)
            .await
            .map_err(classify)?;

        tracing::info!(community_id, user_id, "Banned user for cross-channel spam");
        Ok(())
    }

    async fn notify(
        &self,
        target: NotifyTarget,
        notification: Notification,
    ) -> Result<(), DispatchError> {
        let message = serenity::CreateMessage::new()
            .content(render_notification(&notification))
            .allowed_mentions(allowed_mentions(&notification));

        match target {
            NotifyTarget::StaffChannel(id) => {
                channel_id(id)?
                    .send_message(&self.http, message)
                    .await
                    .map_err(classify)?;
            }
            NotifyTarget::AuthorChannel(id) => {
                let channel = channel_id(id)?;
                let sent = channel
                    .send_message(&self.http, message)
                    .await
                    .map_err(classify)?;

                // Self-expiring notice
                let http = Arc::clone(&self.http);
                let ttl = self.notice_ttl;
                tokio::spawn(async move {
                    tokio::time::sleep(ttl).await;
                    if let Err(e) = channel.delete_message(&http, sent.id).await {
                        tracing::debug!("Failed to remove slow-down notice: {}", e);
                    }
                });
            }
        }
        Ok(())
    }
}
