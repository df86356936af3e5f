// Escalation rules - turns a window summary into a moderation decision.
//
// Pure and total: no I/O, no state, no errors. The policy is trusted as
// configured; a spread threshold of 0 bans on the first triggering message.

use super::moderation_models::{
    CommunityPolicy, Decision, MessageEvent, ModerationAction, OccurrenceSummary,
};

#[derive(Debug, Default, Clone, Copy)]
pub struct EscalationEngine;

impl EscalationEngine {
    pub fn new() -> Self {
        Self
    }

    /// Decide what to do about `event` given what the tracker has seen.
    ///
    /// The first `repetition_threshold` identical messages are tolerated. Once
    /// the next one arrives inside the window, every matching message is
    /// retracted, not just the overflow. Spreading the same content across
    /// more than `spread_threshold` channels escalates to a ban.
    pub fn evaluate(
        &self,
        event: &MessageEvent,
        summary: &OccurrenceSummary,
        policy: &CommunityPolicy,
    ) -> Decision {
        if !policy.enabled || summary.matching.len() <= policy.repetition_threshold as usize {
            return Decision::none();
        }

        let channels_involved = summary.distinct_channels.clone();
        let action = if channels_involved.len() > policy.spread_threshold as usize {
            ModerationAction::Exclude
        } else {
            ModerationAction::AlertStaff
        };

        Decision {
            action,
            messages_to_retract: summary.matching.iter().map(|o| o.message_ref).collect(),
            channels_involved,
            repeated_content: event.content.clone(),
            notify_author: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::moderation::{MessageRef, Occurrence};
    use chrono::Utc;

    fn event(channel_id: u64, message_id: u64) -> MessageEvent {
        MessageEvent {
            community_id: 1,
            user_id: 2,
            channel_id,
            content: "buy now".to_string(),
            message_ref: MessageRef {
                channel_id,
                message_id,
            },
            timestamp: Utc::now(),
        }
    }

    /// Summary with one matching occurrence per (channel, message) pair.
    fn summary(messages: &[(u64, u64)]) -> OccurrenceSummary {
        let matching: Vec<Occurrence> = messages
            .iter()
            .map(|&(c, m)| Occurrence::from(&event(c, m)))
            .collect();
        let distinct_channels = matching.iter().map(|o| o.channel_id).collect();
        OccurrenceSummary {
            matching,
            distinct_channels,
        }
    }

    fn enabled_policy() -> CommunityPolicy {
        CommunityPolicy {
            enabled: true,
            ..Default::default()
        }
    }

    #[test]
    fn test_disabled_policy_never_acts() {
        let policy = CommunityPolicy::default();
        let flood: Vec<(u64, u64)> = (0..50).map(|i| (i, i)).collect();

        let decision = EscalationEngine::new().evaluate(&event(0, 0), &summary(&flood), &policy);

        assert_eq!(decision, Decision::none());
    }

    #[test]
    fn test_threshold_is_tolerated() {
        let decision = EscalationEngine::new().evaluate(
            &event(10, 3),
            &summary(&[(10, 1), (10, 2), (10, 3)]),
            &enabled_policy(),
        );

        assert_eq!(decision.action, ModerationAction::None);
        assert!(decision.messages_to_retract.is_empty());
        assert!(!decision.notify_author);
    }

    #[test]
    fn test_overflow_retracts_everything() {
        let decision = EscalationEngine::new().evaluate(
            &event(10, 4),
            &summary(&[(10, 1), (10, 2), (10, 3), (10, 4)]),
            &enabled_policy(),
        );

        assert_eq!(decision.action, ModerationAction::AlertStaff);
        assert_eq!(decision.messages_to_retract.len(), 4);
        assert_eq!(decision.channels_involved.len(), 1);
        assert_eq!(decision.repeated_content, "buy now");
        assert!(decision.notify_author);
    }

    #[test]
    fn test_spread_at_threshold_alerts_staff() {
        let policy = CommunityPolicy {
            spread_threshold: 4,
            ..enabled_policy()
        };
        let decision = EscalationEngine::new().evaluate(
            &event(13, 4),
            &summary(&[(10, 1), (11, 2), (12, 3), (13, 4)]),
            &policy,
        );

        assert_eq!(decision.action, ModerationAction::AlertStaff);
    }

    #[test]
    fn test_spread_above_threshold_excludes() {
        let policy = CommunityPolicy {
            spread_threshold: 4,
            ..enabled_policy()
        };
        let decision = EscalationEngine::new().evaluate(
            &event(14, 5),
            &summary(&[(10, 1), (11, 2), (12, 3), (13, 4), (14, 5)]),
            &policy,
        );

        assert_eq!(decision.action, ModerationAction::Exclude);
        assert_eq!(decision.messages_to_retract.len(), 5);
        assert!(decision.notify_author);
    }

    #[test]
    fn test_zero_spread_threshold_excludes_immediately() {
        let policy = CommunityPolicy {
            spread_threshold: 0,
            repetition_threshold: 1,
            ..enabled_policy()
        };
        let decision = EscalationEngine::new().evaluate(
            &event(10, 2),
            &summary(&[(10, 1), (10, 2)]),
            &policy,
        );

        assert_eq!(decision.action, ModerationAction::Exclude);
    }
}
