// GIF filter service - per-channel rate limits and per-guild banned GIFs.
//
// Runs next to the anti-spam service on every guild message. A banned GIF is
// removed for everyone; the rate limit only applies to channels where it is
// enabled and never to administrators.

use super::gif_counter::GifCounter;
use super::gif_models::{GifAction, GifEvent, GifPolicy, GifPolicyUpdate};
use crate::core::moderation::{ActionDispatcher, DispatchReport, Notification, NotifyTarget};
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

// ============================================================================
// ERRORS
// ============================================================================

#[derive(Debug, Error)]
pub enum GifError {
    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("Invalid GIF setting: {0}")]
    InvalidValue(String),
}

// ============================================================================
// PORTS
// ============================================================================

/// Per-channel GIF limit persistence.
#[async_trait]
pub trait GifPolicyStore: Send + Sync {
    /// Get a channel's policy, creating it from the server-wide defaults if
    /// the channel has none yet.
    async fn get_channel_policy(
        &self,
        community_id: u64,
        channel_id: u64,
    ) -> Result<GifPolicy, GifError>;

    async fn update_channel_policy(
        &self,
        community_id: u64,
        channel_id: u64,
        update: GifPolicyUpdate,
    ) -> Result<GifPolicy, GifError>;

    /// Turn the limit on or off for every known channel of a guild and for
    /// channels seen later. Returns how many existing channels changed.
    async fn set_server_enabled(&self, community_id: u64, enabled: bool) -> Result<u64, GifError>;
}

/// Per-guild list of banned GIF URLs.
#[async_trait]
pub trait BannedGifStore: Send + Sync {
    /// Returns false if the URL was already banned.
    async fn ban(&self, community_id: u64, url: &str) -> Result<bool, GifError>;

    /// Returns false if the URL wasn't banned.
    async fn unban(&self, community_id: u64, url: &str) -> Result<bool, GifError>;

    /// Banned URLs, oldest first.
    async fn banned(&self, community_id: u64) -> Result<Vec<String>, GifError>;
}

#[async_trait]
impl<T: GifPolicyStore + ?Sized> GifPolicyStore for Arc<T> {
    async fn get_channel_policy(
        &self,
        community_id: u64,
        channel_id: u64,
    ) -> Result<GifPolicy, GifError> {
        (**self).get_channel_policy(community_id, channel_id).await
    }

    async fn update_channel_policy(
        &self,
        community_id: u64,
        channel_id: u64,
        update: GifPolicyUpdate,
    ) -> Result<GifPolicy, GifError> {
        (**self)
            .update_channel_policy(community_id, channel_id, update)
            .await
    }

    async fn set_server_enabled(&self, community_id: u64, enabled: bool) -> Result<u64, GifError> {
        (**self).set_server_enabled(community_id, enabled).await
    }
}

#[async_trait]
impl<T: BannedGifStore + ?Sized> BannedGifStore for Arc<T> {
    async fn ban(&self, community_id: u64, url: &str) -> Result<bool, GifError> {
        (**self).ban(community_id, url).await
    }

    async fn unban(&self, community_id: u64, url: &str) -> Result<bool, GifError> {
        (**self).unban(community_id, url).await
    }

    async fn banned(&self, community_id: u64) -> Result<Vec<String>, GifError> {
        (**self).banned(community_id).await
    }
}

// ============================================================================
// CORE SERVICE
// ============================================================================

pub struct GifService<P: GifPolicyStore, B: BannedGifStore> {
    policies: P,
    banned: B,
    counter: GifCounter,
}

impl<P: GifPolicyStore, B: BannedGifStore> GifService<P, B> {
    pub fn new(policies: P, banned: B) -> Self {
        Self {
            policies,
            banned,
            counter: GifCounter::new(),
        }
    }

    /// Decide what to do about a message's GIFs.
    ///
    /// Banned GIFs are checked first and don't count toward the rate limit.
    pub async fn check_message(&self, event: &GifEvent) -> Result<GifAction, GifError> {
        let banned = self.banned.banned(event.community_id).await?;
        if let Some(url) = event.find_banned(&banned) {
            tracing::info!(
                community_id = event.community_id,
                channel_id = event.channel_id,
                user_id = event.user_id,
                url,
                "Banned GIF posted"
            );
            return Ok(GifAction::Banned {
                url: url.to_string(),
            });
        }

        if event.exempt || !event.contains_gif() {
            return Ok(GifAction::None);
        }

        let policy = self
            .policies
            .get_channel_policy(event.community_id, event.channel_id)
            .await?;
        if !policy.enabled {
            return Ok(GifAction::None);
        }

        let count = self.counter.hit(
            event.community_id,
            event.channel_id,
            event.timestamp,
            policy.window_seconds,
        );
        if count > policy.limit {
            tracing::info!(
                community_id = event.community_id,
                channel_id = event.channel_id,
                user_id = event.user_id,
                count,
                limit = policy.limit,
                "GIF limit exceeded"
            );
            return Ok(GifAction::OverLimit {
                count,
                limit: policy.limit,
            });
        }

        Ok(GifAction::None)
    }

    pub async fn get_channel_policy(
        &self,
        community_id: u64,
        channel_id: u64,
    ) -> Result<GifPolicy, GifError> {
        self.policies.get_channel_policy(community_id, channel_id).await
    }

    pub async fn update_channel_policy(
        &self,
        community_id: u64,
        channel_id: u64,
        update: GifPolicyUpdate,
    ) -> Result<GifPolicy, GifError> {
        update.validate().map_err(GifError::InvalidValue)?;
        let policy = self
            .policies
            .update_channel_policy(community_id, channel_id, update)
            .await?;

        tracing::info!(
            community_id,
            channel_id,
            enabled = policy.enabled,
            limit = policy.limit,
            window_seconds = policy.window_seconds,
            "GIF limit updated"
        );
        Ok(policy)
    }

    pub async fn set_server_enabled(&self, community_id: u64, enabled: bool) -> Result<u64, GifError> {
        let changed = self.policies.set_server_enabled(community_id, enabled).await?;
        tracing::info!(community_id, enabled, changed, "GIF limit toggled server-wide");
        Ok(changed)
    }

    pub async fn ban_gif(&self, community_id: u64, url: &str) -> Result<bool, GifError> {
        let url = url.trim();
        if url.is_empty() {
            return Err(GifError::InvalidValue("URL must not be empty".to_string()));
        }
        let added = self.banned.ban(community_id, url).await?;
        tracing::info!(community_id, url, added, "GIF banned");
        Ok(added)
    }

    pub async fn unban_gif(&self, community_id: u64, url: &str) -> Result<bool, GifError> {
        let removed = self.banned.unban(community_id, url.trim()).await?;
        tracing::info!(community_id, url, removed, "GIF unbanned");
        Ok(removed)
    }

    pub async fn banned_gifs(&self, community_id: u64) -> Result<Vec<String>, GifError> {
        self.banned.banned(community_id).await
    }
}

/// Delete the offending message and leave a self-expiring notice for its author.
pub async fn dispatch_gif_action<D: ActionDispatcher + ?Sized>(
    dispatcher: &D,
    event: &GifEvent,
    action: &GifAction,
) -> DispatchReport {
    let mut report = DispatchReport::default();

    let notice = match action {
        GifAction::None => return report,
        GifAction::OverLimit { .. } => Notification::GifLimitReached {
            user_id: event.user_id,
        },
        GifAction::Banned { .. } => Notification::BannedGif {
            user_id: event.user_id,
        },
    };

    let results = [
        ("retract", dispatcher.retract(event.message_ref).await),
        (
            "notify_author",
            dispatcher
                .notify(NotifyTarget::AuthorChannel(event.channel_id), notice)
                .await,
        ),
    ];

    for (operation, result) in results {
        report.attempted += 1;
        if let Err(e) = result {
            report.failed += 1;
            tracing::warn!(
                community_id = event.community_id,
                user_id = event.user_id,
                operation,
                error = %e,
                "GIF moderation side effect failed"
            );
        }
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::moderation::{DispatchError, MessageRef};
    use chrono::{DateTime, TimeZone, Utc};
    use dashmap::DashMap;
    use std::sync::Mutex;

    /// In-memory stores for testing
    #[derive(Default)]
    struct MockGifStore {
        policies: DashMap<(u64, u64), GifPolicy>,
        banned: Mutex<Vec<(u64, String)>>,
    }

    #[async_trait]
    impl GifPolicyStore for MockGifStore {
        async fn get_channel_policy(
            &self,
            community_id: u64,
            channel_id: u64,
        ) -> Result<GifPolicy, GifError> {
            Ok(*self.policies.entry((community_id, channel_id)).or_default())
        }

        async fn update_channel_policy(
            &self,
            community_id: u64,
            channel_id: u64,
            update: GifPolicyUpdate,
        ) -> Result<GifPolicy, GifError> {
            let mut policy = self.policies.entry((community_id, channel_id)).or_default();
            update.apply_to(&mut policy);
            Ok(*policy)
        }

        async fn set_server_enabled(&self, community_id: u64, enabled: bool) -> Result<u64, GifError> {
            let mut changed = 0;
            for mut entry in self.policies.iter_mut() {
                if entry.key().0 == community_id {
                    entry.enabled = enabled;
                    changed += 1;
                }
            }
            Ok(changed)
        }
    }

    #[async_trait]
    impl BannedGifStore for MockGifStore {
        async fn ban(&self, community_id: u64, url: &str) -> Result<bool, GifError> {
            let mut banned = self.banned.lock().unwrap();
            let entry = (community_id, url.to_string());
            if banned.contains(&entry) {
                return Ok(false);
            }
            banned.push(entry);
            Ok(true)
        }

        async fn unban(&self, community_id: u64, url: &str) -> Result<bool, GifError> {
            let mut banned = self.banned.lock().unwrap();
            let before = banned.len();
            banned.retain(|(c, u)| !(*c == community_id && u == url));
            Ok(banned.len() < before)
        }

        async fn banned(&self, community_id: u64) -> Result<Vec<String>, GifError> {
            Ok(self
                .banned
                .lock()
                .unwrap()
                .iter()
                .filter(|(c, _)| *c == community_id)
                .map(|(_, u)| u.clone())
                .collect())
        }
    }

    type TestService = GifService<Arc<MockGifStore>, Arc<MockGifStore>>;

    const GUILD: u64 = 1;
    const CHANNEL: u64 = 10;
    const TENOR: &str = "https://tenor.com/view/party-gif-42";

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn gif(message_id: u64, content: &str, secs: i64) -> GifEvent {
        GifEvent {
            community_id: GUILD,
            channel_id: CHANNEL,
            user_id: 5,
            message_ref: MessageRef {
                channel_id: CHANNEL,
                message_id,
            },
            content: content.to_string(),
            media_urls: Vec::new(),
            has_gif_media: false,
            exempt: false,
            timestamp: at(secs),
        }
    }

    async fn service_with_limit(limit: u32, window_seconds: u64) -> TestService {
        let store = Arc::new(MockGifStore::default());
        let service = GifService::new(Arc::clone(&store), store);
        service
            .update_channel_policy(
                GUILD,
                CHANNEL,
                GifPolicyUpdate {
                    limit: Some(limit),
                    window_seconds: Some(window_seconds),
                    enabled: Some(true),
                },
            )
            .await
            .unwrap();
        service
    }

    #[tokio::test]
    async fn test_limit_allows_then_blocks() {
        let service = service_with_limit(2, 60).await;

        for i in 0..2 {
            let action = service.check_message(&gif(i, TENOR, i as i64)).await.unwrap();
            assert_eq!(action, GifAction::None);
        }

        let action = service.check_message(&gif(3, TENOR, 3)).await.unwrap();
        assert_eq!(action, GifAction::OverLimit { count: 3, limit: 2 });
    }

    #[tokio::test]
    async fn test_window_expiry_resets_limit() {
        let service = service_with_limit(1, 60).await;

        service.check_message(&gif(1, TENOR, 0)).await.unwrap();
        assert!(service.check_message(&gif(2, TENOR, 5)).await.unwrap().is_actionable());

        let action = service.check_message(&gif(3, TENOR, 61)).await.unwrap();
        assert_eq!(action, GifAction::None);
    }

    #[tokio::test]
    async fn test_disabled_channel_never_limits() {
        let store = Arc::new(MockGifStore::default());
        let service: TestService = GifService::new(Arc::clone(&store), store);

        for i in 0..20 {
            let action = service.check_message(&gif(i, TENOR, 0)).await.unwrap();
            assert_eq!(action, GifAction::None);
        }
    }

    #[tokio::test]
    async fn test_text_messages_do_not_count() {
        let service = service_with_limit(1, 60).await;

        for i in 0..5 {
            service
                .check_message(&gif(i, "a gift for you", 0))
                .await
                .unwrap();
        }

        let action = service.check_message(&gif(9, TENOR, 0)).await.unwrap();
        assert_eq!(action, GifAction::None);
    }

    #[tokio::test]
    async fn test_admins_are_exempt_from_limit() {
        let service = service_with_limit(0, 60).await;

        let mut admin = gif(1, TENOR, 0);
        admin.exempt = true;
        assert_eq!(service.check_message(&admin).await.unwrap(), GifAction::None);

        let action = service.check_message(&gif(2, TENOR, 0)).await.unwrap();
        assert!(matches!(action, GifAction::OverLimit { .. }));
    }

    #[tokio::test]
    async fn test_banned_gif_applies_everywhere_and_to_admins() {
        let store = Arc::new(MockGifStore::default());
        let service: TestService = GifService::new(Arc::clone(&store), store);
        assert!(service.ban_gif(GUILD, &format!("  {}  ", TENOR)).await.unwrap());
        assert!(!service.ban_gif(GUILD, TENOR).await.unwrap());

        let mut admin = gif(1, &format!("look {}", TENOR), 0);
        admin.exempt = true;
        assert_eq!(
            service.check_message(&admin).await.unwrap(),
            GifAction::Banned {
                url: TENOR.to_string()
            }
        );

        let mut other_guild = gif(2, TENOR, 0);
        other_guild.community_id = GUILD + 1;
        assert_eq!(service.check_message(&other_guild).await.unwrap(), GifAction::None);

        assert!(service.unban_gif(GUILD, TENOR).await.unwrap());
        assert_eq!(service.check_message(&gif(3, TENOR, 0)).await.unwrap(), GifAction::None);
        assert!(service.banned_gifs(GUILD).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_empty_ban_rejected() {
        let store = Arc::new(MockGifStore::default());
        let service: TestService = GifService::new(Arc::clone(&store), store);

        let result = service.ban_gif(GUILD, "   ").await;
        assert!(matches!(result, Err(GifError::InvalidValue(_))));
    }

    #[tokio::test]
    async fn test_zero_window_rejected() {
        let service = service_with_limit(5, 60).await;

        let result = service
            .update_channel_policy(
                GUILD,
                CHANNEL,
                GifPolicyUpdate {
                    window_seconds: Some(0),
                    ..Default::default()
                },
            )
            .await;

        assert!(matches!(result, Err(GifError::InvalidValue(_))));
        assert_eq!(
            service.get_channel_policy(GUILD, CHANNEL).await.unwrap().window_seconds,
            60
        );
    }

    /// Records retractions and notices; optionally fails retractions.
    #[derive(Default)]
    struct RecordingDispatcher {
        retracted: Mutex<Vec<MessageRef>>,
        notices: Mutex<Vec<(NotifyTarget, Notification)>>,
        fail_retract: bool,
    }

    #[async_trait]
    impl ActionDispatcher for RecordingDispatcher {
        async fn retract(&self, message: MessageRef) -> Result<(), DispatchError> {
            self.retracted.lock().unwrap().push(message);
            if self.fail_retract {
                return Err(DispatchError::Forbidden("Missing Permissions".to_string()));
            }
            Ok(())
        }

        async fn exclude(
            &self,
            _community_id: u64,
            _user_id: u64,
            _reason: &str,
        ) -> Result<(), DispatchError> {
            unreachable!("GIF moderation never bans")
        }

        async fn notify(
            &self,
            target: NotifyTarget,
            notification: Notification,
        ) -> Result<(), DispatchError> {
            self.notices.lock().unwrap().push((target, notification));
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_dispatch_deletes_and_warns_author() {
        let dispatcher = RecordingDispatcher::default();
        let event = gif(7, TENOR, 0);

        let report = dispatch_gif_action(
            &dispatcher,
            &event,
            &GifAction::Banned {
                url: TENOR.to_string(),
            },
        )
        .await;

        assert_eq!(report, DispatchReport { attempted: 2, failed: 0 });
        assert_eq!(*dispatcher.retracted.lock().unwrap(), vec![event.message_ref]);
        assert_eq!(
            *dispatcher.notices.lock().unwrap(),
            vec![(
                NotifyTarget::AuthorChannel(CHANNEL),
                Notification::BannedGif { user_id: 5 }
            )]
        );
    }

    #[tokio::test]
    async fn test_dispatch_notifies_even_if_delete_fails() {
        let dispatcher = RecordingDispatcher {
            fail_retract: true,
            ..Default::default()
        };
        let event = gif(7, TENOR, 0);

        let report = dispatch_gif_action(
            &dispatcher,
            &event,
            &GifAction::OverLimit { count: 6, limit: 5 },
        )
        .await;

        assert_eq!(report, DispatchReport { attempted: 2, failed: 1 });
        assert_eq!(dispatcher.notices.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_dispatch_none_does_nothing() {
        let dispatcher = RecordingDispatcher::default();

        let report = dispatch_gif_action(&dispatcher, &gif(1, TENOR, 0), &GifAction::None).await;

        assert_eq!(report, DispatchReport::default());
        assert!(dispatcher.retracted.lock().unwrap().is_empty());
    }
}
