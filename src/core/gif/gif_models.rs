// GIF moderation models - per-channel rate limits and the banned GIF list.
//
// Pure domain types. The Discord layer fills in `GifEvent` from a message,
// its attachments and its embeds.

use crate::core::moderation::MessageRef;
use chrono::{DateTime, Utc};

/// Channel id under which a guild's server-wide GIF defaults are kept.
/// Discord never hands out 0 as a real channel id.
pub const SERVER_DEFAULTS_CHANNEL: u64 = 0;

/// Per-channel GIF rate limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GifPolicy {
    /// GIFs allowed per window. The next one is deleted.
    pub limit: u32,
    /// Length of the counting window in seconds
    pub window_seconds: u64,
    pub enabled: bool,
}

impl Default for GifPolicy {
    fn default() -> Self {
        Self {
            limit: 5,
            window_seconds: 60,
            enabled: false,
        }
    }
}

/// Partial update of a channel's GIF policy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GifPolicyUpdate {
    pub limit: Option<u32>,
    pub window_seconds: Option<u64>,
    pub enabled: Option<bool>,
}

impl GifPolicyUpdate {
    pub fn enabled(enabled: bool) -> Self {
        Self {
            enabled: Some(enabled),
            ..Default::default()
        }
    }

    /// A zero limit is allowed and blocks GIFs in the channel entirely.
    pub fn validate(&self) -> Result<(), String> {
        if self.window_seconds == Some(0) {
            return Err("window must be at least 1 second".to_string());
        }
        Ok(())
    }

    pub fn apply_to(&self, policy: &mut GifPolicy) {
        if let Some(v) = self.limit {
            policy.limit = v;
        }
        if let Some(v) = self.window_seconds {
            policy.window_seconds = v;
        }
        if let Some(v) = self.enabled {
            policy.enabled = v;
        }
    }
}

/// A guild message as seen by the GIF filter.
#[derive(Debug, Clone)]
pub struct GifEvent {
    pub community_id: u64,
    pub channel_id: u64,
    pub user_id: u64,
    pub message_ref: MessageRef,
    pub content: String,
    /// Attachment and embed URLs
    pub media_urls: Vec<String>,
    /// An attachment or embed that Discord itself reports as a GIF
    pub has_gif_media: bool,
    /// Administrators are not rate limited. Banned GIFs still apply to them.
    pub exempt: bool,
    pub timestamp: DateTime<Utc>,
}

impl GifEvent {
    /// Whether the message posts a GIF at all.
    pub fn contains_gif(&self) -> bool {
        self.has_gif_media
            || is_gif_link_text(&self.content)
            || self.media_urls.iter().any(|url| is_gif_link_text(url))
    }

    /// The first banned URL that appears in the message, if any.
    pub fn find_banned<'a>(&self, banned: &'a [String]) -> Option<&'a str> {
        banned
            .iter()
            .map(String::as_str)
            .filter(|url| !url.is_empty())
            .find(|url| {
                self.content.contains(url) || self.media_urls.iter().any(|m| m.contains(url))
            })
    }
}

/// True if any link in `text` looks like a GIF (tenor, giphy, `.gif` files).
///
/// Only links count, so words like "gift" in plain text don't.
pub fn is_gif_link_text(text: &str) -> bool {
    text.split_whitespace().any(|token| {
        let token = token.to_ascii_lowercase();
        (token.starts_with("http://") || token.starts_with("https://")) && token.contains("gif")
    })
}

/// What to do about a message's GIFs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GifAction {
    None,
    /// Over the channel's rate limit
    OverLimit { count: u32, limit: u32 },
    /// Contains a GIF banned in this guild
    Banned { url: String },
}

impl GifAction {
    pub fn is_actionable(&self) -> bool {
        *self != GifAction::None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(content: &str) -> GifEvent {
        GifEvent {
            community_id: 1,
            channel_id: 2,
            user_id: 3,
            message_ref: MessageRef {
                channel_id: 2,
                message_id: 4,
            },
            content: content.to_string(),
            media_urls: Vec::new(),
            has_gif_media: false,
            exempt: false,
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn test_gif_links_detected() {
        assert!(is_gif_link_text("look https://tenor.com/view/cat-dance-gif-123"));
        assert!(is_gif_link_text("https://media.giphy.com/media/abc/giphy.webp"));
        assert!(is_gif_link_text("HTTPS://EXAMPLE.COM/FUNNY.GIF"));
    }

    #[test]
    fn test_plain_text_is_not_a_gif() {
        assert!(!is_gif_link_text("thanks for the gift"));
        assert!(!is_gif_link_text("gif"));
        assert!(!is_gif_link_text("https://example.com/picture.png"));
    }

    #[test]
    fn test_contains_gif_sources() {
        assert!(!event("hello").contains_gif());

        let mut attachment = event("");
        attachment.has_gif_media = true;
        assert!(attachment.contains_gif());

        let mut embed = event("");
        embed.media_urls = vec!["https://cdn.example.com/x.gif".to_string()];
        assert!(embed.contains_gif());
    }

    #[test]
    fn test_find_banned_checks_content_and_media() {
        let banned = vec![
            "".to_string(),
            "https://tenor.com/view/bad-gif-1".to_string(),
        ];

        assert_eq!(event("nothing to see").find_banned(&banned), None);
        assert_eq!(
            event("lol https://tenor.com/view/bad-gif-1").find_banned(&banned),
            Some("https://tenor.com/view/bad-gif-1")
        );

        let mut embed = event("");
        embed.media_urls = vec!["https://tenor.com/view/bad-gif-1?x=1".to_string()];
        assert!(embed.find_banned(&banned).is_some());
    }

    #[test]
    fn test_update_validation() {
        let zero_window = GifPolicyUpdate {
            window_seconds: Some(0),
            ..Default::default()
        };
        assert!(zero_window.validate().is_err());

        let zero_limit = GifPolicyUpdate {
            limit: Some(0),
            ..Default::default()
        };
        assert!(zero_limit.validate().is_ok());
    }

    #[test]
    fn test_update_applies_only_set_fields() {
        let mut policy = GifPolicy::default();
        GifPolicyUpdate {
            limit: Some(2),
            ..Default::default()
        }
        .apply_to(&mut policy);

        assert_eq!(policy.limit, 2);
        assert_eq!(policy.window_seconds, 60);
        assert!(!policy.enabled);
    }
}
