// Carries a decision out through an ActionDispatcher.
//
// Side effects are best-effort and at-most-once: every failure is logged with
// its context and then dropped. A failed delete or ban never changes the
// decision and is never retried.

use super::moderation_models::{MessageEvent, ModerationAction, Notification, NotifyTarget, Verdict};
use super::moderation_service::{ActionDispatcher, DispatchError};

pub const EXCLUSION_REASON: &str = "Spam detected across multiple channels";

/// How many side effects were attempted and how many failed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchReport {
    pub attempted: usize,
    pub failed: usize,
}

impl DispatchReport {
    fn track(
        &mut self,
        event: &MessageEvent,
        action: ModerationAction,
        operation: &str,
        result: Result<(), DispatchError>,
    ) -> bool {
        self.attempted += 1;
        match result {
            Ok(()) => true,
            Err(e) => {
                self.failed += 1;
                tracing::warn!(
                    community_id = event.community_id,
                    user_id = event.user_id,
                    action = %action,
                    operation,
                    error = %e,
                    "Moderation side effect failed"
                );
                false
            }
        }
    }
}

/// Apply every side effect a verdict calls for.
///
/// Order: retract all matching messages, ban if excluding, alert staff if an
/// alert channel is configured, then post the slow-down notice to the author.
pub async fn dispatch_decision<D: ActionDispatcher + ?Sized>(
    dispatcher: &D,
    event: &MessageEvent,
    verdict: &Verdict,
) -> DispatchReport {
    let decision = &verdict.decision;
    let mut report = DispatchReport::default();

    if !decision.is_actionable() {
        return report;
    }

    for message in &decision.messages_to_retract {
        let result = dispatcher.retract(*message).await;
        report.track(event, decision.action, "retract", result);
    }

    let mut exclusion_succeeded = true;
    if decision.action == ModerationAction::Exclude {
        let result = dispatcher
            .exclude(event.community_id, event.user_id, EXCLUSION_REASON)
            .await;
        exclusion_succeeded = report.track(event, decision.action, "exclude", result);
    }

    if let Some(channel_id) = verdict.policy.notify_target {
        let alert = Notification::StaffAlert {
            community_id: event.community_id,
            user_id: event.user_id,
            action: decision.action,
            exclusion_succeeded,
            repeated_content: decision.repeated_content.clone(),
            channels: decision.channels_involved.iter().copied().collect(),
            staff_role: verdict.policy.escalation_role,
        };
        let result = dispatcher
            .notify(NotifyTarget::StaffChannel(channel_id), alert)
            .await;
        report.track(event, decision.action, "notify_staff", result);
    }

    if decision.notify_author {
        let notice = Notification::SlowDown {
            user_id: event.user_id,
        };
        let result = dispatcher
            .notify(NotifyTarget::AuthorChannel(event.channel_id), notice)
            .await;
        report.track(event, decision.action, "notify_author", result);
    }

    tracing::debug!(
        community_id = event.community_id,
        user_id = event.user_id,
        attempted = report.attempted,
        failed = report.failed,
        "Moderation decision dispatched"
    );

    report
}
