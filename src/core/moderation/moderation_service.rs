// Anti-spam service - core business logic for repetition and spread detection.
//
// This service handles:
// - Reading the guild's policy on every message (no caching)
// - Recording the message in the author's sliding window
// - Evaluating the escalation rules while that window is still locked
//
// NO Discord dependencies here - just pure domain logic.

use super::escalation_engine::EscalationEngine;
use super::moderation_models::{
    CommunityPolicy, Decision, MessageEvent, MessageRef, ModerationAction, Notification,
    NotifyTarget, PolicyUpdate, Verdict,
};
use super::window_tracker::WindowTracker;
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

// ============================================================================
// ERRORS
// ============================================================================

#[derive(Debug, Error)]
pub enum PolicyError {
    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("Invalid policy value: {0}")]
    InvalidValue(String),
}

/// A side effect that could not be carried out. Logged, never retried.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("Missing permissions: {0}")]
    Forbidden(String),

    #[error("Platform error: {0}")]
    Platform(String),

    #[error("Target not found: {0}")]
    TargetMissing(String),
}

#[derive(Debug, Error)]
pub enum SpamError {
    #[error(transparent)]
    Policy(#[from] PolicyError),
}

// ============================================================================
// PORTS
// ============================================================================

/// Per-guild policy persistence.
///
/// Following the same pattern as the other stores: the core owns the trait,
/// infra provides SQLite and in-memory implementations.
#[async_trait]
pub trait PolicyStore: Send + Sync {
    /// Get the guild's policy, creating the default row if there is none.
    ///
    /// Two racing first calls for the same guild must end up with one row.
    async fn get_policy(&self, community_id: u64) -> Result<CommunityPolicy, PolicyError>;

    /// Apply a partial update and return the stored result.
    async fn update_policy(
        &self,
        community_id: u64,
        update: PolicyUpdate,
    ) -> Result<CommunityPolicy, PolicyError>;
}

// Lets the composition root pick a store at runtime.
#[async_trait]
impl<T: PolicyStore + ?Sized> PolicyStore for Arc<T> {
    async fn get_policy(&self, community_id: u64) -> Result<CommunityPolicy, PolicyError> {
        (**self).get_policy(community_id).await
    }

    async fn update_policy(
        &self,
        community_id: u64,
        update: PolicyUpdate,
    ) -> Result<CommunityPolicy, PolicyError> {
        (**self).update_policy(community_id, update).await
    }
}

/// Carries out moderation side effects on the chat platform.
#[async_trait]
pub trait ActionDispatcher: Send + Sync {
    /// Delete a message.
    async fn retract(&self, message: MessageRef) -> Result<(), DispatchError>;

    /// Ban a user from a guild.
    async fn exclude(&self, community_id: u64, user_id: u64, reason: &str)
        -> Result<(), DispatchError>;

    /// Post a notification.
    async fn notify(
        &self,
        target: NotifyTarget,
        notification: Notification,
    ) -> Result<(), DispatchError>;
}

// ============================================================================
// CORE SERVICE
// ============================================================================

/// Anti-spam service for detecting repeated and spread content.
pub struct AntiSpamService<S: PolicyStore> {
    store: S,
    tracker: WindowTracker,
    engine: EscalationEngine,
}

impl<S: PolicyStore> AntiSpamService<S> {
    /// Create a new anti-spam service with the given store.
    pub fn new(store: S) -> Self {
        Self {
            store,
            tracker: WindowTracker::new(),
            engine: EscalationEngine::new(),
        }
    }

    /// Check a message and decide what to do about it.
    ///
    /// Messages in guilds with detection disabled are not recorded at all.
    pub async fn process_message(&self, event: &MessageEvent) -> Result<Verdict, SpamError> {
        let policy = self.store.get_policy(event.community_id).await?;

        if !policy.enabled {
            return Ok(Verdict {
                decision: Decision::none(),
                policy,
            });
        }

        let decision = self
            .tracker
            .record_with(event, policy.window_seconds, |summary| {
                self.engine.evaluate(event, summary, &policy)
            });

        if decision.is_actionable() {
            tracing::info!(
                community_id = event.community_id,
                user_id = event.user_id,
                channel_id = event.channel_id,
                action = %decision.action,
                messages = decision.messages_to_retract.len(),
                channels = decision.channels_involved.len(),
                "Repeated content detected"
            );
        }

        Ok(Verdict { decision, policy })
    }

    /// Get the current policy for a guild.
    pub async fn get_policy(&self, community_id: u64) -> Result<CommunityPolicy, PolicyError> {
        self.store.get_policy(community_id).await
    }

    /// Validate and apply an administrative update.
    pub async fn update_policy(
        &self,
        community_id: u64,
        update: PolicyUpdate,
    ) -> Result<CommunityPolicy, PolicyError> {
        update.validate().map_err(PolicyError::InvalidValue)?;
        let policy = self.store.update_policy(community_id, update).await?;

        tracing::info!(
            community_id,
            enabled = policy.enabled,
            repetition_threshold = policy.repetition_threshold,
            window_seconds = policy.window_seconds,
            spread_threshold = policy.spread_threshold,
            "Anti-spam policy updated"
        );
        Ok(policy)
    }

    /// Enable or disable anti-spam for a guild.
    pub async fn set_enabled(
        &self,
        community_id: u64,
        enabled: bool,
    ) -> Result<CommunityPolicy, PolicyError> {
        self.update_policy(community_id, PolicyUpdate::enabled(enabled))
            .await
    }
}

// ============================================================================
// TESTS
// ============================================================================
