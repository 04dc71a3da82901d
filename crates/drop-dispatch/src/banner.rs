use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

/// Singleton page-level banner summarizing the drops from one dispatch batch.
///
/// A new batch replaces whatever is showing. The banner clears itself `ttl`
/// after it was shown; `tick` performs the sweep and reads are filtered by
/// the same rule so a stale banner is never observable.
#[derive(Debug, Serialize)]
pub struct BannerState {
    visible_drop_ids: Vec<String>,
    shown_at: Option<DateTime<Utc>>,
    #[serde(skip)]
    ttl: Duration,
}

impl BannerState {
    /// Create a hidden banner.
    pub fn new(ttl: Duration) -> Self {
        Self {
            visible_drop_ids: Vec::new(),
            shown_at: None,
            ttl,
        }
    }

    /// Show a banner for `ids`, replacing any current one and restarting
    /// the display clock. An empty batch hides the banner instead.
    pub fn show(&mut self, ids: Vec<String>, now: DateTime<Utc>) {
        if ids.is_empty() {
            self.clear();
            return;
        }
        self.visible_drop_ids = ids;
        self.shown_at = Some(now);
    }

    /// Hide the banner immediately.
    pub fn clear(&mut self) {
        self.visible_drop_ids.clear();
        self.shown_at = None;
    }

    /// Auto-clear once the display duration has elapsed. Returns true if
    /// the banner was cleared by this call.
    pub fn tick(&mut self, now: DateTime<Utc>) -> bool {
        match self.shown_at {
            Some(at) if now - at >= self.ttl => {
                self.clear();
                true
            }
            _ => false,
        }
    }

    /// Whether the banner is showing at `now`.
    pub fn is_visible(&self, now: DateTime<Utc>) -> bool {
        match self.shown_at {
            Some(at) => now - at < self.ttl && !self.visible_drop_ids.is_empty(),
            None => false,
        }
    }

    /// Drop ids on the banner, or an empty slice when hidden.
    pub fn visible_ids(&self, now: DateTime<Utc>) -> &[String] {
        if self.is_visible(now) {
            &self.visible_drop_ids
        } else {
            &[]
        }
    }
}
