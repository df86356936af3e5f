// Moderation domain models - data structures for the repetition/spread detector.
//
// These are pure domain types with no Discord dependencies.
// The Discord layer converts serenity messages into `MessageEvent`s and turns
// `Decision`s back into Discord actions.

use chrono::{DateTime, Utc};
use std::collections::BTreeSet;

// ============================================================================
// POLICY
// ============================================================================

/// Per-community anti-spam policy.
///
/// One row per guild, created with these defaults on first access and only
/// ever overwritten afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommunityPolicy {
    /// Identical messages tolerated inside the window. The (N+1)th escalates.
    pub repetition_threshold: u32,
    /// Length of the trailing window in seconds
    pub window_seconds: u64,
    /// Distinct channels tolerated before the author is banned
    pub spread_threshold: u32,
    /// Whether detection runs at all for this guild
    pub enabled: bool,
    /// Channel that receives staff alerts
    pub notify_target: Option<u64>,
    /// Role mentioned in staff alerts
    pub escalation_role: Option<u64>,
}

impl Default for CommunityPolicy {
    fn default() -> Self {
        Self {
            repetition_threshold: 3, // 3 identical messages are fine...
            window_seconds: 10,      // ...inside 10 seconds
            spread_threshold: 5,     // more than 5 channels means a ban
            enabled: false,
            notify_target: None,
            escalation_role: None,
        }
    }
}

/// Partial policy update. `None` leaves the stored value untouched.
///
/// The optional references are doubly wrapped so an update can clear them:
/// `Some(None)` removes the alert channel, `Some(Some(id))` sets it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PolicyUpdate {
    pub repetition_threshold: Option<u32>,
    pub window_seconds: Option<u64>,
    pub spread_threshold: Option<u32>,
    pub enabled: Option<bool>,
    pub notify_target: Option<Option<u64>>,
    pub escalation_role: Option<Option<u64>>,
}

impl PolicyUpdate {
    /// Shorthand for an update that only toggles `enabled`.
    pub fn enabled(enabled: bool) -> Self {
        Self {
            enabled: Some(enabled),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Reject values that would make the detector meaningless.
    ///
    /// A zero spread threshold is accepted: it is the most aggressive setting,
    /// not an invalid one.
    pub fn validate(&self) -> Result<(), String> {
        if self.repetition_threshold == Some(0) {
            return Err("repetition threshold must be at least 1".to_string());
        }
        if self.window_seconds == Some(0) {
            return Err("window must be at least 1 second".to_string());
        }
        Ok(())
    }

    /// Write every specified field into `policy`.
    pub fn apply_to(&self, policy: &mut CommunityPolicy) {
        if let Some(v) = self.repetition_threshold {
            policy.repetition_threshold = v;
        }
        if let Some(v) = self.window_seconds {
            policy.window_seconds = v;
        }
        if let Some(v) = self.spread_threshold {
            policy.spread_threshold = v;
        }
        if let Some(v) = self.enabled {
            policy.enabled = v;
        }
        if let Some(v) = self.notify_target {
            policy.notify_target = v;
        }
        if let Some(v) = self.escalation_role {
            policy.escalation_role = v;
        }
    }
}

// ============================================================================
// MESSAGES AND WINDOWS
// ============================================================================

/// Locates a single message so it can be retracted later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MessageRef {
    pub channel_id: u64,
    pub message_id: u64,
}

/// One authored message as seen by the detector.
#[derive(Debug, Clone)]
pub struct MessageEvent {
    pub community_id: u64,
    pub user_id: u64,
    pub channel_id: u64,
    pub content: String,
    pub message_ref: MessageRef,
    pub timestamp: DateTime<Utc>,
}

/// A message retained in a user's sliding window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Occurrence {
    /// Exact message text. Case and whitespace are significant.
    pub content: String,
    pub channel_id: u64,
    pub message_ref: MessageRef,
    pub timestamp: DateTime<Utc>,
}

impl From<&MessageEvent> for Occurrence {
    fn from(event: &MessageEvent) -> Self {
        Self {
            content: event.content.clone(),
            channel_id: event.channel_id,
            message_ref: event.message_ref,
            timestamp: event.timestamp,
        }
    }
}

/// What the tracker saw for the latest message's content.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OccurrenceSummary {
    /// Occurrences with the same content, oldest first, including the new one
    pub matching: Vec<Occurrence>,
    /// Channels those occurrences were posted in
    pub distinct_channels: BTreeSet<u64>,
}

// ============================================================================
// DECISIONS
// ============================================================================

/// What should happen to the author of a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModerationAction {
    /// Nothing to do
    None,
    /// Warn the author only. Reserved for manual moderation; repetition
    /// detection signals the author through `Decision::notify_author`.
    #[allow(dead_code)]
    Warn,
    /// Clean up and tell staff
    AlertStaff,
    /// Clean up and ban the author
    Exclude,
}

impl std::fmt::Display for ModerationAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ModerationAction::None => write!(f, "None"),
            ModerationAction::Warn => write!(f, "Warn"),
            ModerationAction::AlertStaff => write!(f, "Alert Staff"),
            ModerationAction::Exclude => write!(f, "Exclude"),
        }
    }
}

/// Outcome of evaluating one message. Consumed once by the dispatcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decision {
    pub action: ModerationAction,
    pub messages_to_retract: BTreeSet<MessageRef>,
    pub channels_involved: BTreeSet<u64>,
    pub repeated_content: String,
    /// Send the self-expiring "slow down" notice to the author
    pub notify_author: bool,
}

impl Decision {
    /// A decision that does nothing.
    pub fn none() -> Self {
        Self {
            action: ModerationAction::None,
            messages_to_retract: BTreeSet::new(),
            channels_involved: BTreeSet::new(),
            repeated_content: String::new(),
            notify_author: false,
        }
    }

    pub fn is_actionable(&self) -> bool {
        self.action != ModerationAction::None
    }
}

/// A decision together with the policy snapshot it was made under.
///
/// The dispatcher needs the alert channel and staff role from the same read,
/// so it never sees a policy newer than the one that produced the decision.
#[derive(Debug, Clone)]
pub struct Verdict {
    pub decision: Decision,
    pub policy: CommunityPolicy,
}

// ============================================================================
// NOTIFICATIONS
// ============================================================================

/// Where a notification goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotifyTarget {
    /// The configured staff alert channel
    StaffChannel(u64),
    /// The channel the triggering message was posted in. Notices sent here
    /// expire on their own.
    AuthorChannel(u64),
}

/// Payload for `ActionDispatcher::notify`. Rendering is left to the platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    StaffAlert {
        community_id: u64,
        user_id: u64,
        action: ModerationAction,
        /// False when the ban was attempted and failed
        exclusion_succeeded: bool,
        repeated_content: String,
        channels: Vec<u64>,
        staff_role: Option<u64>,
    },
    SlowDown {
        user_id: u64,
    },
    /// The channel's GIF limit was reached
    GifLimitReached {
        user_id: u64,
    },
    /// The message contained a GIF banned in the guild
    BannedGif {
        user_id: u64,
    },
}
