use std::collections::VecDeque;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use kv_store::KvStore;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::drop_types::ReservationDrop;

const STORE_KEY: &str = "notifications";

/// One entry in the bell dropdown.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NotificationRecord {
    /// Drop id this notification announces
    pub id: String,
    /// Snapshot of the drop at dispatch time
    pub drop: ReservationDrop,
    /// Whether the user has read this entry
    pub read: bool,
    /// Instant the notification was created
    pub shown_at: DateTime<Utc>,
}

/// Persistent bell notification list, newest first.
///
/// Every mutation writes the full list back to the store. A failed write is
/// logged and the in-memory state kept, so the next mutation retries it;
/// persistence trouble never takes down the dispatch path.
pub struct NotificationList {
    records: VecDeque<NotificationRecord>,
    cap: usize,
    store: Arc<dyn KvStore>,
}

impl NotificationList {
    /// Load the list from the store. A missing or undecodable value starts
    /// the list empty rather than failing startup.
    pub async fn load(store: Arc<dyn KvStore>, cap: usize) -> Self {
        let records = match store.get(STORE_KEY).await {
            Ok(Some(value)) => match serde_json::from_value::<Vec<NotificationRecord>>(value) {
                Ok(records) => {
                    debug!("Loaded {} stored notifications", records.len());
                    records
                }
                Err(e) => {
                    warn!("Discarding undecodable stored notifications: {}", e);
                    Vec::new()
                }
            },
            Ok(None) => Vec::new(),
            Err(e) => {
                warn!("Failed to read stored notifications: {}", e);
                Vec::new()
            }
        };

        let mut records = VecDeque::from(records);
        records.truncate(cap);

        Self {
            records,
            cap,
            store,
        }
    }

    /// Prepend an unread notification for `drop`, evicting the oldest
    /// entries beyond capacity.
    pub async fn append(&mut self, drop: &ReservationDrop, now: DateTime<Utc>) {
        self.records.push_front(NotificationRecord {
            id: drop.id.clone(),
            drop: drop.clone(),
            read: false,
            shown_at: now,
        });
        self.records.truncate(self.cap);
        self.persist().await;
    }

    /// Mark one notification read. Returns false if the id is unknown.
    pub async fn mark_read(&mut self, id: &str) -> bool {
        let Some(record) = self.records.iter_mut().find(|r| r.id == id) else {
            return false;
        };
        record.read = true;
        self.persist().await;
        true
    }

    /// Mark every notification read.
    pub async fn mark_all_read(&mut self) {
        for record in &mut self.records {
            record.read = true;
        }
        self.persist().await;
    }

    /// Remove one notification. Returns false if the id is unknown.
    pub async fn dismiss(&mut self, id: &str) -> bool {
        let before = self.records.len();
        self.records.retain(|r| r.id != id);
        if self.records.len() == before {
            return false;
        }
        self.persist().await;
        true
    }

    /// Remove every notification.
    pub async fn clear_all(&mut self) {
        self.records.clear();
        self.persist().await;
    }

    /// Current records, newest first.
    pub fn records(&self) -> impl Iterator<Item = &NotificationRecord> {
        self.records.iter()
    }

    /// Number of unread records.
    pub fn unread_count(&self) -> usize {
        self.records.iter().filter(|r| !r.read).count()
    }

    /// Total number of records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the list is empty.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    async fn persist(&self) {
        let records: Vec<&NotificationRecord> = self.records.iter().collect();
        let value = match serde_json::to_value(&records) {
            Ok(value) => value,
            Err(e) => {
                warn!("Failed to encode notifications: {}", e);
                return;
            }
        };
        if let Err(e) = self.store.put(STORE_KEY, &value).await {
            warn!("Failed to persist notifications: {}", e);
        }
    }
}
