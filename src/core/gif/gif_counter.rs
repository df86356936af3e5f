// Fixed-window GIF counter, one per channel.
//
// The first GIF after a window has run out opens a new window; every GIF in
// the window counts, whoever posts it.

use chrono::{DateTime, TimeDelta, Utc};
use dashmap::DashMap;

#[derive(Hash, Eq, PartialEq, Clone, Copy, Debug)]
struct ChannelKey {
    community_id: u64,
    channel_id: u64,
}

#[derive(Debug, Clone, Copy)]
struct ChannelWindow {
    started: DateTime<Utc>,
    count: u32,
}

pub struct GifCounter {
    channels: DashMap<ChannelKey, ChannelWindow>,
}

impl GifCounter {
    pub fn new() -> Self {
        Self {
            channels: DashMap::new(),
        }
    }

    /// Count one GIF in a channel and return the count in the current window.
    ///
    /// The update happens under the DashMap entry lock, so concurrent GIFs in
    /// one channel are each counted once.
    pub fn hit(
        &self,
        community_id: u64,
        channel_id: u64,
        now: DateTime<Utc>,
        window_seconds: u64,
    ) -> u32 {
        let key = ChannelKey {
            community_id,
            channel_id,
        };
        let window = i64::try_from(window_seconds)
            .ok()
            .and_then(TimeDelta::try_seconds);

        let mut entry = self.channels.entry(key).or_insert(ChannelWindow {
            started: now,
            count: 0,
        });
        let expired = window.is_some_and(|length| now - entry.started > length);
        if expired {
            entry.started = now;
            entry.count = 0;
        }
        entry.count = entry.count.saturating_add(1);
        entry.count
    }
}

impl Default for GifCounter {
    fn default() -> Self {
        Self::new()
    }
}
