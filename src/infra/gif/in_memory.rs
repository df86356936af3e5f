// In-memory implementation of the GIF stores.
//
// Used with ANTISPAM_STORE=memory. Everything is lost on restart.

use crate::core::gif::{
    BannedGifStore, GifError, GifPolicy, GifPolicyStore, GifPolicyUpdate, SERVER_DEFAULTS_CHANNEL,
};
use async_trait::async_trait;
use dashmap::DashMap;

/// Maps (guild_id, channel_id) -> policy, and guild_id -> banned URLs.
///
/// The server-wide defaults live under `SERVER_DEFAULTS_CHANNEL`.
pub struct InMemoryGifStore {
    policies: DashMap<(u64, u64), GifPolicy>,
    banned: DashMap<u64, Vec<String>>,
}

impl InMemoryGifStore {
    pub fn new() -> Self {
        Self {
            policies: DashMap::new(),
            banned: DashMap::new(),
        }
    }

    fn server_defaults(&self, community_id: u64) -> GifPolicy {
        self.policies
            .get(&(community_id, SERVER_DEFAULTS_CHANNEL))
            .map(|p| *p)
            .unwrap_or_default()
    }
}

impl Default for InMemoryGifStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl GifPolicyStore for InMemoryGifStore {
    async fn get_channel_policy(
        &self,
        community_id: u64,
        channel_id: u64,
    ) -> Result<GifPolicy, GifError> {
        // Read the defaults first: the entry below locks a shard that may hold them.
        let defaults = self.server_defaults(community_id);
        let policy = *self
            .policies
            .entry((community_id, channel_id))
            .or_insert(defaults);
        Ok(policy)
    }

    async fn update_channel_policy(
        &self,
        community_id: u64,
        channel_id: u64,
        update: GifPolicyUpdate,
    ) -> Result<GifPolicy, GifError> {
        let defaults = self.server_defaults(community_id);
        let mut policy = self
            .policies
            .entry((community_id, channel_id))
            .or_insert(defaults);
        update.apply_to(&mut policy);
        Ok(*policy)
    }

    async fn set_server_enabled(&self, community_id: u64, enabled: bool) -> Result<u64, GifError> {
        self.policies
            .entry((community_id, SERVER_DEFAULTS_CHANNEL))
            .or_default()
            .enabled = enabled;

        let mut updated = 0;
        for mut entry in self.policies.iter_mut() {
            let (guild_id, channel_id) = *entry.key();
            if guild_id == community_id && channel_id != SERVER_DEFAULTS_CHANNEL {
                entry.enabled = enabled;
                updated += 1;
            }
        }
        Ok(updated)
    }
}

#[async_trait]
impl BannedGifStore for InMemoryGifStore {
    async fn ban(&self, community_id: u64, url: &str) -> Result<bool, GifError> {
        let mut urls = self.banned.entry(community_id).or_default();
        if urls.iter().any(|u| u == url) {
            return Ok(false);
        }
        urls.push(url.to_string());
        Ok(true)
    }

    async fn unban(&self, community_id: u64, url: &str) -> Result<bool, GifError> {
        let Some(mut urls) = self.banned.get_mut(&community_id) else {
            return Ok(false);
        };
        let before = urls.len();
        urls.retain(|u| u != url);
        Ok(urls.len() < before)
    }

    async fn banned(&self, community_id: u64) -> Result<Vec<String>, GifError> {
        Ok(self
            .banned
            .get(&community_id)
            .map(|urls| urls.clone())
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_channel_defaults() {
        let store = InMemoryGifStore::new();

        let policy = store.get_channel_policy(1, 10).await.unwrap();
        assert_eq!(policy, GifPolicy::default());
        assert_eq!(store.policies.len(), 1);
    }

    #[tokio::test]
    async fn test_server_toggle_covers_existing_and_new_channels() {
        let store = InMemoryGifStore::new();
        store
            .update_channel_policy(
                1,
                10,
                GifPolicyUpdate {
                    limit: Some(2),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        store.get_channel_policy(1, 11).await.unwrap();
        store.get_channel_policy(2, 10).await.unwrap();

        assert_eq!(store.set_server_enabled(1, true).await.unwrap(), 2);

        let existing = store.get_channel_policy(1, 10).await.unwrap();
        assert!(existing.enabled);
        assert_eq!(existing.limit, 2);
        assert!(store.get_channel_policy(1, 99).await.unwrap().enabled);
        assert!(!store.get_channel_policy(2, 10).await.unwrap().enabled);
    }

    #[tokio::test]
    async fn test_ban_list_is_per_guild_and_ordered() {
        let store = InMemoryGifStore::new();

        assert!(store.ban(1, "https://a.gif").await.unwrap());
        assert!(store.ban(1, "https://b.gif").await.unwrap());
        assert!(!store.ban(1, "https://a.gif").await.unwrap());

        assert_eq!(
            store.banned(1).await.unwrap(),
            vec!["https://a.gif".to_string(), "https://b.gif".to_string()]
        );
        assert!(store.banned(2).await.unwrap().is_empty());

        assert!(store.unban(1, "https://a.gif").await.unwrap());
        assert!(!store.unban(1, "https://a.gif").await.unwrap());
        assert!(!store.unban(2, "https://b.gif").await.unwrap());
    }
}
