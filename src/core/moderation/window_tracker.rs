// Sliding-window message log, one per (guild, user).
//
// Windows are pruned lazily whenever a user posts; nothing sweeps them in the
// background. Windows that have emptied out are dropped by whichever message
// happens to trigger the periodic sweep, so memory follows recent traffic.
// Each window sits behind its own mutex so two messages from the same user are
// counted strictly one after the other, while different users never wait on
// each other.

use super::moderation_models::{MessageEvent, Occurrence, OccurrenceSummary};
use chrono::{DateTime, TimeDelta, Utc};
use dashmap::DashMap;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

/// Every this many recorded messages, the recording task also drops the
/// expired windows of its guild.
const SWEEP_INTERVAL: u64 = 1024;

/// A composite key for looking up a window.
/// Users are tracked separately in every guild they post in.
#[derive(Hash, Eq, PartialEq, Clone, Copy, Debug)]
struct WindowKey {
    community_id: u64,
    user_id: u64,
}

/// Retained occurrences for one user, oldest first.
#[derive(Debug, Default)]
struct UserWindow {
    occurrences: VecDeque<Occurrence>,
}

impl UserWindow {
    /// Drop everything older than `window` relative to `now`.
    /// An occurrence exactly `window` old is kept.
    fn prune(&mut self, now: DateTime<Utc>, window: Option<TimeDelta>) {
        let Some(window) = window else {
            return;
        };
        self.occurrences.retain(|o| now - o.timestamp <= window);
    }

    fn summarize(&self, content: &str) -> OccurrenceSummary {
        let matching: Vec<Occurrence> = self
            .occurrences
            .iter()
            .filter(|o| o.content == content)
            .cloned()
            .collect();
        let distinct_channels = matching.iter().map(|o| o.channel_id).collect();

        OccurrenceSummary {
            matching,
            distinct_channels,
        }
    }
}

/// Window length as a `TimeDelta`. `None` means "too large to ever expire".
fn window_length(window_seconds: u64) -> Option<TimeDelta> {
    i64::try_from(window_seconds)
        .ok()
        .and_then(TimeDelta::try_seconds)
}

/// Per-user sliding windows for every guild the bot serves.
pub struct WindowTracker {
    windows: DashMap<WindowKey, Arc<Mutex<UserWindow>>>,
    recorded: AtomicU64,
}

impl WindowTracker {
    pub fn new() -> Self {
        Self {
            windows: DashMap::new(),
            recorded: AtomicU64::new(0),
        }
    }

    /// Record `event` and summarize the matching occurrences in its window.
    #[allow(dead_code)]
    pub fn record(&self, event: &MessageEvent, window_seconds: u64) -> OccurrenceSummary {
        self.record_with(event, window_seconds, |summary| summary.clone())
    }

    /// Record `event`, then run `f` on the summary while the user's window is
    /// still locked.
    ///
    /// Anything `f` computes is therefore ordered with respect to every other
    /// message from the same user.
    pub fn record_with<R>(
        &self,
        event: &MessageEvent,
        window_seconds: u64,
        f: impl FnOnce(&OccurrenceSummary) -> R,
    ) -> R {
        let key = WindowKey {
            community_id: event.community_id,
            user_id: event.user_id,
        };

        let result = {
            // Clone the Arc out so the DashMap shard lock is released before we
            // take the per-user lock.
            let handle = self.windows.entry(key).or_default().clone();
            let mut window = handle.lock().unwrap_or_else(PoisonError::into_inner);

            window.prune(event.timestamp, window_length(window_seconds));
            window.occurrences.push_back(Occurrence::from(event));

            let summary = window.summarize(&event.content);
            f(&summary)
        };

        // Our own handle is released by now, so the sweep can't skip this window
        // just because we were holding it.
        let recorded = self.recorded.fetch_add(1, Ordering::Relaxed) + 1;
        if recorded % SWEEP_INTERVAL == 0 {
            let dropped = self.drop_expired(event.community_id, event.timestamp, window_seconds);
            if dropped > 0 {
                tracing::debug!(
                    community_id = event.community_id,
                    dropped,
                    "Dropped expired message windows"
                );
            }
        }

        result
    }

    /// Number of occurrences currently retained for a user.
    #[allow(dead_code)]
    pub fn window_len(&self, community_id: u64, user_id: u64) -> usize {
        let key = WindowKey {
            community_id,
            user_id,
        };
        let Some(handle) = self.windows.get(&key).map(|w| Arc::clone(&w)) else {
            return 0;
        };
        let window = handle.lock().unwrap_or_else(PoisonError::into_inner);
        window.occurrences.len()
    }

    /// Drop every window in `community_id` with nothing left inside the window
    /// at `now`. Returns how many were dropped.
    ///
    /// Windows another task is holding are skipped, so an in-flight message
    /// never lands in a detached window.
    pub fn drop_expired(&self, community_id: u64, now: DateTime<Utc>, window_seconds: u64) -> usize {
        let Some(length) = window_length(window_seconds) else {
            return 0;
        };

        let mut dropped = 0;
        self.windows.retain(|key, handle| {
            if key.community_id != community_id || Arc::strong_count(handle) > 1 {
                return true;
            }
            let Ok(mut window) = handle.try_lock() else {
                return true;
            };
            window.prune(now, Some(length));
            if window.occurrences.is_empty() {
                dropped += 1;
                false
            } else {
                true
            }
        });
        dropped
    }

    /// Number of (guild, user) windows held in memory.
    #[allow(dead_code)]
    pub fn tracked_users(&self) -> usize {
        self.windows.len()
    }
}

impl Default for WindowTracker {
    fn default() -> Self {
        Self::new()
    }
}
