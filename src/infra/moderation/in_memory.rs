// In-memory implementation of PolicyStore.
//
// Useful for tests and for running the bot without a database. Policies are
// lost on restart.

use crate::core::moderation::{CommunityPolicy, PolicyError, PolicyStore, PolicyUpdate};
use async_trait::async_trait;
use dashmap::DashMap;

/// Maps guild_id -> policy.
///
/// `DashMap::entry` holds the shard lock while the default is inserted, so two
/// racing first reads for a guild can't create two different rows.
pub struct InMemoryPolicyStore {
    policies: DashMap<u64, CommunityPolicy>,
}

impl InMemoryPolicyStore {
    pub fn new() -> Self {
        Self {
            policies: DashMap::new(),
        }
    }
}

impl Default for InMemoryPolicyStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PolicyStore for InMemoryPolicyStore {
    async fn get_policy(&self, community_id: u64) -> Result<CommunityPolicy, PolicyError> {
        let policy = self
            .policies
            .entry(community_id)
            .or_insert_with(|| {
                tracing::debug!(community_id, "Materialized default anti-spam policy");
                CommunityPolicy::default()
            })
            .clone();
        Ok(policy)
    }

    async fn update_policy(
        &self,
        community_id: u64,
        update: PolicyUpdate,
    ) -> Result<CommunityPolicy, PolicyError> {
        let mut policy = self.policies.entry(community_id).or_default();
        update.apply_to(&mut policy);
        Ok(policy.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_first_access_creates_defaults() {
        let store = InMemoryPolicyStore::new();

        let first = store.get_policy(1).await.unwrap();
        let second = store.get_policy(1).await.unwrap();

        assert_eq!(first, CommunityPolicy::default());
        assert_eq!(first, second);
        assert_eq!(store.policies.len(), 1);
    }

    #[tokio::test]
    async fn test_partial_update() {
        let store = InMemoryPolicyStore::new();

        store
            .update_policy(
                1,
                PolicyUpdate {
                    notify_target: Some(Some(99)),
                    enabled: Some(true),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        let policy = store
            .update_policy(
                1,
                PolicyUpdate {
                    spread_threshold: Some(2),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(policy.notify_target, Some(99));
        assert!(policy.enabled);
        assert_eq!(policy.spread_threshold, 2);
        assert_eq!(store.get_policy(1).await.unwrap(), policy);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_first_access_converges() {
        let store = Arc::new(InMemoryPolicyStore::new());

        let handles: Vec<_> = (0..32)
            .map(|_| {
                let store = Arc::clone(&store);
                tokio::spawn(async move { store.get_policy(7).await.unwrap() })
            })
            .collect();

        for handle in handles {
            assert_eq!(handle.await.unwrap(), CommunityPolicy::default());
        }
        assert_eq!(store.policies.len(), 1);
    }
}
