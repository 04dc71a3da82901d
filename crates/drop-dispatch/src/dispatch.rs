use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use kv_store::KvStore;
use serde::Serialize;

use crate::banner::BannerState;
use crate::bell::NotificationList;
use crate::engine::{Channel, DedupEngine};
use crate::feed_client::DropBatch;
use crate::toast::ToastQueue;

/// Tuning for the dedup engine and the three dispatch channels.
#[derive(Debug, Clone)]
pub struct DispatchConfig {
    /// First-sync freshness window (default: 90 seconds)
    pub freshness_window: Duration,
    /// Ids remembered per channel before the oldest are evicted (default: 300)
    pub seen_cap: usize,
    /// Concurrently active toasts (default: 8)
    pub toast_cap: usize,
    /// Toast display duration (default: 7 seconds)
    pub toast_ttl: Duration,
    /// Bell records kept and persisted (default: 80)
    pub bell_cap: usize,
    /// Banner display duration (default: 8 seconds)
    pub banner_ttl: Duration,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            freshness_window: Duration::seconds(90),
            seen_cap: 300,
            toast_cap: 8,
            toast_ttl: Duration::seconds(7),
            bell_cap: 80,
            banner_ttl: Duration::seconds(8),
        }
    }
}

/// Joined fetch results of one poll cycle. `None` marks a failed fetch.
#[derive(Debug, Default)]
pub struct FeedSnapshot {
    /// Search result with the configured filters applied
    pub primary: Option<DropBatch>,
    /// Search result across all dates
    pub all_dates: Option<DropBatch>,
    /// Recently detected drops
    pub recent: Option<DropBatch>,
}

impl FeedSnapshot {
    /// Batch the banner reads from: the all-dates result when non-empty,
    /// else the filtered result. `None` when either fetch failed.
    pub fn banner_source(&self) -> Option<&DropBatch> {
        let all_dates = self.all_dates.as_ref()?;
        let primary = self.primary.as_ref()?;
        if all_dates.drops.is_empty() {
            Some(primary)
        } else {
            Some(all_dates)
        }
    }
}

/// Per-cycle ingest outcome, folded into the poller stats.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct IngestSummary {
    /// Toasts enqueued this cycle
    pub toasts_emitted: usize,
    /// Bell records appended this cycle
    pub bell_appended: usize,
    /// Whether a banner was shown this cycle
    pub banner_shown: bool,
    /// Drops in the filtered search batch
    pub primary_count: usize,
    /// Drops in the recent batch
    pub recent_count: usize,
    /// Malformed records skipped across this cycle's fetches
    pub records_skipped: usize,
}

/// Fans one cycle's feed snapshot out to the three channels.
///
/// Owns the dedup engine and all channel state. Mutated only on the poller
/// task's processing path, one cycle at a time.
pub struct DropDispatcher {
    engine: DedupEngine,
    toasts: ToastQueue,
    bell: NotificationList,
    banner: BannerState,
}

impl DropDispatcher {
    /// Build a dispatcher, loading the persisted bell list from `store`.
    pub async fn new(config: &DispatchConfig, store: Arc<dyn KvStore>) -> Self {
        Self {
            engine: DedupEngine::new(config.seen_cap, config.freshness_window),
            toasts: ToastQueue::new(config.toast_cap, config.toast_ttl),
            bell: NotificationList::load(store, config.bell_cap).await,
            banner: BannerState::new(config.banner_ttl),
        }
    }

    /// Run one cycle's snapshot through dedup and dispatch.
    ///
    /// Toast and bell consume the recent batch followed by the filtered
    /// batch; both fetches must have succeeded or the two channels sit the
    /// cycle out, first-sync transition included. The banner consumes its
    /// own source list under the same rule.
    pub async fn ingest(&mut self, snapshot: &FeedSnapshot, now: DateTime<Utc>) -> IngestSummary {
        let mut summary = IngestSummary::default();

        if let (Some(recent), Some(primary)) = (&snapshot.recent, &snapshot.primary) {
            summary.recent_count = recent.drops.len();
            summary.primary_count = primary.drops.len();
            summary.records_skipped += recent.skipped + primary.skipped;

            for drop in recent.drops.iter().chain(primary.drops.iter()) {
                if self.engine.admit(Channel::Toast, drop, now) {
                    self.toasts.push(drop, now);
                    summary.toasts_emitted += 1;
                }
                if self.engine.admit(Channel::Bell, drop, now) {
                    self.bell.append(drop, now).await;
                    summary.bell_appended += 1;
                }
            }
            self.engine.mark_synced(Channel::Toast);
            self.engine.mark_synced(Channel::Bell);
        }

        if let Some(source) = snapshot.banner_source() {
            summary.records_skipped += snapshot
                .all_dates
                .as_ref()
                .map(|batch| batch.skipped)
                .unwrap_or(0);

            let mut new_ids = Vec::new();
            for drop in &source.drops {
                if self.engine.admit(Channel::Banner, drop, now) {
                    new_ids.push(drop.id.clone());
                }
            }
            self.engine.mark_synced(Channel::Banner);

            if !new_ids.is_empty() {
                self.banner.show(new_ids, now);
                summary.banner_shown = true;
            }
        }

        summary
    }

    /// Sweep expired toasts and auto-clear the banner.
    pub fn tick(&mut self, now: DateTime<Utc>) {
        self.toasts.tick(now);
        self.banner.tick(now);
    }

    /// Active toast queue.
    pub fn toasts(&self) -> &ToastQueue {
        &self.toasts
    }

    /// Bell notification list.
    pub fn bell(&self) -> &NotificationList {
        &self.bell
    }

    /// Bell notification list, for the read/dismiss/clear operations.
    pub fn bell_mut(&mut self) -> &mut NotificationList {
        &mut self.bell
    }

    /// Page banner.
    pub fn banner(&self) -> &BannerState {
        &self.banner
    }

    /// Dedup engine, for sync-state and seen-set introspection.
    pub fn engine(&self) -> &DedupEngine {
        &self.engine
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drop_types::{ReservationDrop, SourceFeed, drop_id};
    use chrono::NaiveDate;
    use kv_store::MemoryStore;

    fn now() -> DateTime<Utc> {
        "2026-02-18T12:00:00Z".parse().unwrap()
    }

    fn drop_named(name: &str, detected_at: Option<DateTime<Utc>>) -> ReservationDrop {
        let date = NaiveDate::from_ymd_opt(2026, 2, 18).unwrap();
        ReservationDrop {
            id: drop_id(date, name),
            date,
            name: name.to_string(),
            location: None,
            slots: vec![],
            detected_at,
            source: SourceFeed::Primary,
            metadata: serde_json::Map::new(),
        }
    }

    fn batch(drops: Vec<ReservationDrop>) -> DropBatch {
        DropBatch {
            drops,
            last_scan_at: Some(now()),
            total_scanned: 100,
            skipped: 0,
        }
    }

    async fn dispatcher() -> DropDispatcher {
        DropDispatcher::new(&DispatchConfig::default(), Arc::new(MemoryStore::new())).await
    }

    #[tokio::test]
    async fn test_first_sync_dispatches_fresh_drop_to_all_channels() {
        let mut dispatch = dispatcher().await;
        let fresh = drop_named("Balthazar", Some(now() - Duration::seconds(30)));
        let stale = drop_named("Via Carota", Some(now() - Duration::seconds(200)));

        let snapshot = FeedSnapshot {
            primary: Some(batch(vec![fresh.clone(), stale.clone()])),
            all_dates: Some(batch(vec![fresh.clone(), stale.clone()])),
            recent: Some(batch(vec![fresh.clone()])),
        };

        let summary = dispatch.ingest(&snapshot, now()).await;
        assert_eq!(summary.toasts_emitted, 1);
        assert_eq!(summary.bell_appended, 1);
        assert!(summary.banner_shown);

        assert_eq!(dispatch.toasts().active(now()).len(), 1);
        assert_eq!(dispatch.bell().records().next().unwrap().id, fresh.id);
        assert_eq!(dispatch.banner().visible_ids(now()), &[fresh.id.clone()]);

        // Same snapshot next cycle, nothing new on any channel
        let later = now() + Duration::seconds(15);
        let summary = dispatch.ingest(&snapshot, later).await;
        assert_eq!(summary.toasts_emitted, 0);
        assert_eq!(summary.bell_appended, 0);
        assert!(!summary.banner_shown);
    }

    #[tokio::test]
    async fn test_duplicate_across_feeds_emits_once() {
        let mut dispatch = dispatcher().await;
        let fresh = drop_named("Balthazar", Some(now() - Duration::seconds(10)));

        let snapshot = FeedSnapshot {
            primary: Some(batch(vec![fresh.clone()])),
            all_dates: Some(batch(vec![])),
            recent: Some(batch(vec![fresh])),
        };

        let summary = dispatch.ingest(&snapshot, now()).await;
        assert_eq!(summary.toasts_emitted, 1);
        assert_eq!(summary.bell_appended, 1);
        assert_eq!(dispatch.bell().len(), 1);
    }

    #[tokio::test]
    async fn test_synced_channels_emit_unseen_regardless_of_age() {
        let mut dispatch = dispatcher().await;

        // Empty first cycle flips every channel to synced
        let empty = FeedSnapshot {
            primary: Some(batch(vec![])),
            all_dates: Some(batch(vec![])),
            recent: Some(batch(vec![])),
        };
        dispatch.ingest(&empty, now()).await;

        let old = drop_named("Balthazar", Some(now() - Duration::seconds(3600)));
        let snapshot = FeedSnapshot {
            primary: Some(batch(vec![old.clone()])),
            all_dates: Some(batch(vec![old])),
            recent: Some(batch(vec![])),
        };

        let later = now() + Duration::seconds(15);
        let summary = dispatch.ingest(&snapshot, later).await;
        assert_eq!(summary.toasts_emitted, 1);
        assert_eq!(summary.bell_appended, 1);
        assert!(summary.banner_shown);
    }

    #[tokio::test]
    async fn test_failed_recent_fetch_skips_toast_and_bell_cycle() {
        let mut dispatch = dispatcher().await;
        let fresh = drop_named("Balthazar", Some(now() - Duration::seconds(10)));

        let snapshot = FeedSnapshot {
            primary: Some(batch(vec![fresh.clone()])),
            all_dates: Some(batch(vec![fresh.clone()])),
            recent: None,
        };

        let summary = dispatch.ingest(&snapshot, now()).await;
        assert_eq!(summary.toasts_emitted, 0);
        assert_eq!(summary.bell_appended, 0);
        // Banner still ran, toast and bell did not sync
        assert!(summary.banner_shown);
        assert!(!dispatch.engine().is_synced(Channel::Toast));
        assert!(!dispatch.engine().is_synced(Channel::Bell));
        assert!(dispatch.engine().is_synced(Channel::Banner));

        // Recovery cycle still applies first-sync freshness gating
        let later = now() + Duration::seconds(300);
        let recovered = FeedSnapshot {
            primary: Some(batch(vec![fresh.clone()])),
            all_dates: Some(batch(vec![fresh])),
            recent: Some(batch(vec![])),
        };
        let summary = dispatch.ingest(&recovered, later).await;
        assert_eq!(summary.toasts_emitted, 0);
        assert!(dispatch.engine().is_synced(Channel::Toast));
    }

    #[tokio::test]
    async fn test_banner_prefers_all_dates_and_falls_back_to_filtered() {
        let mut dispatch = dispatcher().await;
        let general = drop_named("Lilia", Some(now() - Duration::seconds(5)));
        let filtered = drop_named("Balthazar", Some(now() - Duration::seconds(5)));

        let snapshot = FeedSnapshot {
            primary: Some(batch(vec![filtered.clone()])),
            all_dates: Some(batch(vec![general.clone()])),
            recent: Some(batch(vec![])),
        };
        dispatch.ingest(&snapshot, now()).await;
        assert_eq!(dispatch.banner().visible_ids(now()), &[general.id.clone()]);

        // All-dates fetch empty, banner reads the filtered result
        let later = now() + Duration::seconds(15);
        let fallback = FeedSnapshot {
            primary: Some(batch(vec![filtered.clone()])),
            all_dates: Some(batch(vec![])),
            recent: Some(batch(vec![])),
        };
        dispatch.ingest(&fallback, later).await;
        assert_eq!(dispatch.banner().visible_ids(later), &[filtered.id.clone()]);
    }

    #[tokio::test]
    async fn test_tick_expires_toasts_and_banner() {
        let mut dispatch = dispatcher().await;
        let fresh = drop_named("Balthazar", Some(now() - Duration::seconds(10)));

        let snapshot = FeedSnapshot {
            primary: Some(batch(vec![fresh.clone()])),
            all_dates: Some(batch(vec![fresh])),
            recent: Some(batch(vec![])),
        };
        dispatch.ingest(&snapshot, now()).await;

        let later = now() + Duration::seconds(10);
        dispatch.tick(later);
        assert!(dispatch.toasts().active(later).is_empty());
        assert!(!dispatch.banner().is_visible(later));
    }

    #[tokio::test]
    async fn test_summary_counts_batch_sizes_and_skips() {
        let mut dispatch = dispatcher().await;
        let fresh = drop_named("Balthazar", Some(now() - Duration::seconds(10)));

        let snapshot = FeedSnapshot {
            primary: Some(DropBatch {
                skipped: 2,
                ..batch(vec![fresh.clone()])
            }),
            all_dates: Some(DropBatch {
                skipped: 1,
                ..batch(vec![fresh])
            }),
            recent: Some(batch(vec![])),
        };

        let summary = dispatch.ingest(&snapshot, now()).await;
        assert_eq!(summary.primary_count, 1);
        assert_eq!(summary.recent_count, 0);
        assert_eq!(summary.records_skipped, 3);
    }
}
