use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{Mutex, Notify, RwLock};
use tokio::time::interval;
use tracing::{debug, info, warn};

use crate::dispatch::{DropDispatcher, FeedSnapshot};
use crate::drop_types::WatchError;
use crate::feed_client::{DropBatch, DropFeed, FeedFilters};

/// Tuning for the poll loop.
#[derive(Debug, Clone)]
pub struct WatchExecutorConfig {
    /// Interval between poll cycles (default: 15 seconds)
    pub poll_interval: Duration,

    /// Interval between toast/banner expiry sweeps (default: 1 second)
    pub tick_interval: Duration,

    /// Trailing window requested from the recent feed (default: 30 minutes)
    pub recent_window: Duration,
}

impl Default for WatchExecutorConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(15),
            tick_interval: Duration::from_secs(1),
            recent_window: Duration::from_secs(30 * 60),
        }
    }
}

/// Snapshot of poller health and dispatch counters.
#[derive(Debug, Clone, Default, Serialize)]
pub struct WatchStats {
    /// Whether a cycle's fetches are currently in flight
    pub is_fetching: bool,
    /// Completed poll cycles since start
    pub cycles_completed: u64,
    /// When the last cycle finished
    pub last_cycle_at: Option<DateTime<Utc>>,
    /// When the last fully successful cycle finished
    pub last_success_at: Option<DateTime<Utc>>,
    /// Cycles in a row with at least one failed fetch
    pub consecutive_failures: u32,
    /// Failure description from the last cycle, if any
    pub last_error: Option<String>,
    /// Malformed feed records skipped since start
    pub malformed_records_skipped: u64,
    /// Toasts dispatched since start
    pub toasts_emitted: u64,
    /// Bell records appended since start
    pub bell_appended: u64,
    /// Banners shown since start
    pub banner_shown: u64,
    /// Current unread bell records
    pub unread_notifications: usize,
}

/// Drives the poll loop: periodic cycles, activity wakes and expiry sweeps.
///
/// Every fetch happens outside the dispatch lock; the lock is taken only to
/// run the joined snapshot through `ingest`, so reads from the serving layer
/// never wait on the network.
pub struct WatchExecutor {
    feed: Arc<dyn DropFeed>,
    filters: FeedFilters,
    dispatch: Arc<Mutex<DropDispatcher>>,
    stats: Arc<RwLock<WatchStats>>,
    wake: Notify,
    config: WatchExecutorConfig,
}

impl WatchExecutor {
    /// Create an executor over a feed and a shared dispatcher.
    pub fn new(
        feed: Arc<dyn DropFeed>,
        filters: FeedFilters,
        dispatch: Arc<Mutex<DropDispatcher>>,
        config: Option<WatchExecutorConfig>,
    ) -> Self {
        Self {
            feed,
            filters,
            dispatch,
            stats: Arc::new(RwLock::new(WatchStats::default())),
            wake: Notify::new(),
            config: config.unwrap_or_default(),
        }
    }

    /// Run the poll loop until the owning task is aborted.
    ///
    /// The first cycle fires immediately and doubles as the channels'
    /// first sync. A wake arriving mid-cycle is held as a single pending
    /// permit, so bursts coalesce into at most one follow-up cycle.
    pub async fn run(&self) {
        info!(
            "Starting watch executor with {}s poll interval",
            self.config.poll_interval.as_secs()
        );

        let mut poll_interval = interval(self.config.poll_interval);
        let mut tick_interval = interval(self.config.tick_interval);

        loop {
            tokio::select! {
                _ = poll_interval.tick() => {
                    self.poll_once().await;
                }
                _ = self.wake.notified() => {
                    debug!("Woken by activity trigger");
                    self.poll_once().await;
                    poll_interval.reset();
                }
                _ = tick_interval.tick() => {
                    self.dispatch.lock().await.tick(Utc::now());
                }
            }
        }
    }

    /// Request an immediate poll cycle (the became-active trigger).
    pub fn wake(&self) {
        self.wake.notify_one();
    }

    /// Execute one poll cycle: fetch, join, dedup, dispatch, record stats.
    pub async fn poll_once(&self) {
        self.stats.write().await.is_fetching = true;

        let (snapshot, errors) = self.fetch_snapshot().await;
        let now = Utc::now();

        let (summary, unread) = {
            let mut dispatch = self.dispatch.lock().await;
            let summary = dispatch.ingest(&snapshot, now).await;
            (summary, dispatch.bell().unread_count())
        };

        if summary.toasts_emitted > 0 || summary.bell_appended > 0 || summary.banner_shown {
            info!(
                "Cycle dispatched {} toast(s), {} bell record(s), banner shown: {}",
                summary.toasts_emitted, summary.bell_appended, summary.banner_shown
            );
        } else {
            debug!("Cycle completed with nothing new");
        }

        let mut stats = self.stats.write().await;
        stats.is_fetching = false;
        stats.cycles_completed += 1;
        stats.last_cycle_at = Some(now);
        stats.toasts_emitted += summary.toasts_emitted as u64;
        stats.bell_appended += summary.bell_appended as u64;
        if summary.banner_shown {
            stats.banner_shown += 1;
        }
        stats.malformed_records_skipped += summary.records_skipped as u64;
        stats.unread_notifications = unread;

        if errors.is_empty() {
            stats.consecutive_failures = 0;
            stats.last_success_at = Some(now);
            stats.last_error = None;
        } else {
            stats.consecutive_failures += 1;
            stats.last_error = Some(errors.join("; "));
        }
    }

    /// Current poller stats.
    pub async fn stats(&self) -> WatchStats {
        self.stats.read().await.clone()
    }

    /// Fetch this cycle's batches concurrently and join them.
    ///
    /// With a date filter configured the cycle issues three fetches;
    /// without one, the filtered and all-dates searches coincide and the
    /// result is shared (its skip count charged once).
    async fn fetch_snapshot(&self) -> (FeedSnapshot, Vec<String>) {
        let recent_window = chrono::Duration::from_std(self.config.recent_window)
            .unwrap_or_else(|_| chrono::Duration::minutes(30));

        let mut errors = Vec::new();
        let mut snapshot = FeedSnapshot::default();

        if self.filters.has_dates() {
            let dateless_filters = self.filters.without_dates();
            let (primary, all_dates, recent) = tokio::join!(
                self.feed.search_drops(&self.filters),
                self.feed.search_drops(&dateless_filters),
                self.feed.recent_drops(recent_window),
            );
            snapshot.primary = batch_or_log(primary, "filtered search", &mut errors);
            snapshot.all_dates = batch_or_log(all_dates, "all-dates search", &mut errors);
            snapshot.recent = batch_or_log(recent, "recent feed", &mut errors);
        } else {
            let (primary, recent) = tokio::join!(
                self.feed.search_drops(&self.filters),
                self.feed.recent_drops(recent_window),
            );
            snapshot.primary = batch_or_log(primary, "search", &mut errors);
            snapshot.recent = batch_or_log(recent, "recent feed", &mut errors);
            snapshot.all_dates = snapshot
                .primary
                .clone()
                .map(|batch| DropBatch { skipped: 0, ..batch });
        }

        (snapshot, errors)
    }
}

fn batch_or_log(
    result: Result<DropBatch, WatchError>,
    feed: &str,
    errors: &mut Vec<String>,
) -> Option<DropBatch> {
    match result {
        Ok(batch) => Some(batch),
        Err(e) => {
            warn!("Fetch of the {} failed: {}", feed, e);
            errors.push(format!("{}: {}", feed, e));
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::DispatchConfig;
    use crate::drop_types::{ReservationDrop, SourceFeed, drop_id};
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use kv_store::MemoryStore;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct MockFeed {
        search: std::sync::Mutex<Option<DropBatch>>,
        recent: std::sync::Mutex<Option<DropBatch>>,
        search_calls: AtomicUsize,
        recent_calls: AtomicUsize,
    }

    impl MockFeed {
        fn new(search: Option<DropBatch>, recent: Option<DropBatch>) -> Self {
            Self {
                search: std::sync::Mutex::new(search),
                recent: std::sync::Mutex::new(recent),
                search_calls: AtomicUsize::new(0),
                recent_calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl DropFeed for MockFeed {
        async fn search_drops(&self, _filters: &FeedFilters) -> Result<DropBatch, WatchError> {
            self.search_calls.fetch_add(1, Ordering::SeqCst);
            self.search
                .lock()
                .unwrap()
                .clone()
                .ok_or_else(|| WatchError::Transport("connection refused".to_string()))
        }

        async fn recent_drops(&self, _within: chrono::Duration) -> Result<DropBatch, WatchError> {
            self.recent_calls.fetch_add(1, Ordering::SeqCst);
            self.recent
                .lock()
                .unwrap()
                .clone()
                .ok_or_else(|| WatchError::Transport("connection refused".to_string()))
        }
    }

    fn fresh_drop(name: &str) -> ReservationDrop {
        let date = NaiveDate::from_ymd_opt(2026, 2, 18).unwrap();
        ReservationDrop {
            id: drop_id(date, name),
            date,
            name: name.to_string(),
            location: None,
            slots: vec![],
            detected_at: Some(Utc::now()),
            source: SourceFeed::Recent,
            metadata: serde_json::Map::new(),
        }
    }

    fn batch(drops: Vec<ReservationDrop>) -> DropBatch {
        DropBatch {
            drops,
            last_scan_at: Some(Utc::now()),
            total_scanned: 10,
            skipped: 0,
        }
    }

    async fn make_executor(feed: MockFeed, filters: FeedFilters) -> (WatchExecutor, Arc<MockFeed>) {
        let feed = Arc::new(feed);
        let dispatch = DropDispatcher::new(&DispatchConfig::default(), Arc::new(MemoryStore::new()))
            .await;
        let executor = WatchExecutor::new(
            feed.clone(),
            filters,
            Arc::new(Mutex::new(dispatch)),
            None,
        );
        (executor, feed)
    }

    #[tokio::test]
    async fn test_poll_once_dispatches_and_records_stats() {
        let feed = MockFeed::new(Some(batch(vec![])), Some(batch(vec![fresh_drop("Balthazar")])));
        let (executor, _feed) = make_executor(feed, FeedFilters::default()).await;

        executor.poll_once().await;

        let stats = executor.stats().await;
        assert_eq!(stats.cycles_completed, 1);
        assert_eq!(stats.toasts_emitted, 1);
        assert_eq!(stats.bell_appended, 1);
        assert_eq!(stats.unread_notifications, 1);
        assert_eq!(stats.consecutive_failures, 0);
        assert!(stats.last_success_at.is_some());
        assert!(stats.last_error.is_none());
        assert!(!stats.is_fetching);
    }

    #[tokio::test]
    async fn test_fetch_count_depends_on_date_filter() {
        let feed = MockFeed::new(Some(batch(vec![])), Some(batch(vec![])));
        let (executor, feed) = make_executor(feed, FeedFilters::default()).await;
        executor.poll_once().await;
        assert_eq!(feed.search_calls.load(Ordering::SeqCst), 1);
        assert_eq!(feed.recent_calls.load(Ordering::SeqCst), 1);

        let filters = FeedFilters {
            dates: vec![NaiveDate::from_ymd_opt(2026, 2, 18).unwrap()],
            ..FeedFilters::default()
        };
        let (executor, feed) = make_executor(MockFeed::new(Some(batch(vec![])), Some(batch(vec![]))), filters).await;
        executor.poll_once().await;
        assert_eq!(feed.search_calls.load(Ordering::SeqCst), 2);
        assert_eq!(feed.recent_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failed_fetch_tracks_consecutive_failures() {
        let feed = MockFeed::new(Some(batch(vec![fresh_drop("Balthazar")])), None);
        let (executor, _feed) = make_executor(feed, FeedFilters::default()).await;

        executor.poll_once().await;
        executor.poll_once().await;

        let stats = executor.stats().await;
        assert_eq!(stats.cycles_completed, 2);
        assert_eq!(stats.consecutive_failures, 2);
        assert!(stats.last_error.as_deref().unwrap().contains("recent feed"));
        assert!(stats.last_success_at.is_none());
        // Toast and bell sat both cycles out
        assert_eq!(stats.toasts_emitted, 0);
        assert_eq!(stats.bell_appended, 0);
    }

    #[tokio::test]
    async fn test_recovery_resets_failure_streak() {
        let feed = MockFeed::new(Some(batch(vec![])), None);
        let (executor, feed) = make_executor(feed, FeedFilters::default()).await;
        executor.poll_once().await;
        assert_eq!(executor.stats().await.consecutive_failures, 1);

        // Recent feed comes back, next cycle clears the streak
        *feed.recent.lock().unwrap() = Some(batch(vec![]));
        executor.poll_once().await;

        let stats = executor.stats().await;
        assert_eq!(stats.consecutive_failures, 0);
        assert!(stats.last_error.is_none());
        assert!(stats.last_success_at.is_some());
    }
}
