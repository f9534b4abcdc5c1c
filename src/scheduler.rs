//! Randomized publication scheduling.
//!
//! A fixed cron trigger would publish at the same wall-clock minute every
//! run. Spreading the selected topics across sorted random offsets inside a
//! bounded window decorrelates publication times from the trigger. This is
//! a policy knob only; nothing here synchronizes anything.

use chrono::Local;
use rand::Rng;
use std::time::Duration;
use tracing::info;

/// Window the randomized offsets fall into.
pub const POSTING_WINDOW: Duration = Duration::from_secs(2 * 60 * 60);

/// Sorted random offsets from now, one per selected topic.
pub fn posting_schedule(count: usize, window: Duration) -> Vec<Duration> {
    let mut rng = rand::rng();
    let mut offsets: Vec<Duration> = (0..count)
        .map(|_| Duration::from_secs(rng.random_range(0..=window.as_secs())))
        .collect();
    offsets.sort();
    offsets
}

/// Log the planned wall-clock time of each slot.
pub fn announce(schedule: &[Duration]) {
    for (i, offset) in schedule.iter().enumerate() {
        let at = Local::now() + chrono::Duration::from_std(*offset).unwrap_or_default();
        info!(
            slot = i + 1,
            minutes_from_now = offset.as_secs() / 60,
            at = %at.format("%H:%M"),
            "Publication slot planned"
        );
    }
}
