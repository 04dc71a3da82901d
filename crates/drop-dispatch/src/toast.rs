use std::collections::VecDeque;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::drop_types::ReservationDrop;

/// An ephemeral toast popup entry.
///
/// Carries its own expiry timestamp; nothing schedules per-entry timers.
#[derive(Debug, Clone, Serialize)]
pub struct ToastEntry {
    /// Drop id this toast announces
    pub id: String,
    /// Snapshot of the drop at dispatch time
    pub drop: ReservationDrop,
    /// Instant the toast stops being shown
    pub expires_at: DateTime<Utc>,
}

/// Session-scoped queue of active toasts.
///
/// Holds at most `cap` concurrently active entries; the oldest is evicted
/// first. Entries expire `ttl` after creation and are swept by `tick` or
/// filtered out lazily on read, so a caller can never observe an expired
/// toast either way.
#[derive(Debug)]
pub struct ToastQueue {
    entries: VecDeque<ToastEntry>,
    cap: usize,
    ttl: Duration,
}

impl ToastQueue {
    /// Create an empty queue.
    pub fn new(cap: usize, ttl: Duration) -> Self {
        Self {
            entries: VecDeque::new(),
            cap,
            ttl,
        }
    }

    /// Enqueue a toast for `drop`, evicting expired entries and, if the
    /// queue is still full, the oldest active one.
    pub fn push(&mut self, drop: &ReservationDrop, now: DateTime<Utc>) {
        self.tick(now);

        self.entries.push_back(ToastEntry {
            id: drop.id.clone(),
            drop: drop.clone(),
            expires_at: now + self.ttl,
        });

        while self.entries.len() > self.cap {
            self.entries.pop_front();
        }
    }

    /// Sweep expired entries. Returns how many were removed.
    pub fn tick(&mut self, now: DateTime<Utc>) -> usize {
        let before = self.entries.len();
        self.entries.retain(|entry| now < entry.expires_at);
        before - self.entries.len()
    }

    /// Snapshot of the currently active entries, oldest first.
    pub fn active(&self, now: DateTime<Utc>) -> Vec<ToastEntry> {
        self.entries
            .iter()
            .filter(|entry| now < entry.expires_at)
            .cloned()
            .collect()
    }

    /// Number of active entries at `now`.
    pub fn active_len(&self, now: DateTime<Utc>) -> usize {
        self.entries
            .iter()
            .filter(|entry| now < entry.expires_at)
            .count()
    }
}
