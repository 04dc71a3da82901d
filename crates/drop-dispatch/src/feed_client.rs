use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::drop_types::{DropSlot, ReservationDrop, SourceFeed, WatchError, drop_id};

/// Filters forwarded to the drop search endpoint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeedFilters {
    /// Reservation dates to watch, empty means all upcoming dates
    #[serde(default)]
    pub dates: Vec<NaiveDate>,
    /// Acceptable party sizes, empty means any
    #[serde(default)]
    pub party_sizes: Vec<u32>,
    /// Earliest acceptable slot time
    #[serde(default)]
    pub time_after: Option<NaiveTime>,
    /// Latest acceptable slot time
    #[serde(default)]
    pub time_before: Option<NaiveTime>,
}

impl FeedFilters {
    /// Whether any date filter is set.
    pub fn has_dates(&self) -> bool {
        !self.dates.is_empty()
    }

    /// Same filters with the date restriction removed.
    pub fn without_dates(&self) -> Self {
        Self {
            dates: Vec::new(),
            ..self.clone()
        }
    }
}

/// One decoded feed response.
#[derive(Debug, Clone, Default)]
pub struct DropBatch {
    /// Drops that decoded cleanly, upstream order preserved
    pub drops: Vec<ReservationDrop>,
    /// Upstream scan completion time, if reported
    pub last_scan_at: Option<DateTime<Utc>>,
    /// How many venues the upstream scan covered
    pub total_scanned: usize,
    /// Records skipped because they failed to decode
    pub skipped: usize,
}

/// Response envelope from the drop feed API
#[derive(Debug, Deserialize)]
struct FeedEnvelope {
    #[serde(default)]
    drops: Option<Vec<serde_json::Value>>,
    #[serde(default)]
    last_scan_at: Option<DateTime<Utc>>,
    #[serde(default)]
    total_scanned: Option<usize>,
}

/// Individual drop record from the feed API
#[derive(Debug, Deserialize)]
struct RawDrop {
    #[serde(alias = "venue_name", alias = "restaurant")]
    name: String,

    date: NaiveDate,

    #[serde(default)]
    location: Option<String>,

    #[serde(default)]
    slots: Vec<RawSlot>,

    #[serde(default)]
    detected_at: Option<DateTime<Utc>>,

    #[serde(flatten)]
    metadata: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct RawSlot {
    #[serde(default)]
    date: Option<NaiveDate>,

    time: NaiveTime,

    #[serde(alias = "url")]
    booking_url: String,
}

impl RawDrop {
    fn into_drop(self, source: SourceFeed) -> ReservationDrop {
        let date = self.date;
        ReservationDrop {
            id: drop_id(date, &self.name),
            date,
            name: self.name,
            location: self.location,
            slots: self
                .slots
                .into_iter()
                .map(|slot| DropSlot {
                    date: slot.date.unwrap_or(date),
                    time: slot.time,
                    booking_url: slot.booking_url,
                })
                .collect(),
            detected_at: self.detected_at,
            source,
            metadata: self.metadata,
        }
    }
}

/// Decode an envelope record by record, skipping anything malformed.
fn decode_batch(envelope: FeedEnvelope, source: SourceFeed) -> DropBatch {
    let raw_drops = envelope.drops.unwrap_or_default();
    let mut drops = Vec::with_capacity(raw_drops.len());
    let mut skipped = 0;

    for raw in raw_drops {
        match serde_json::from_value::<RawDrop>(raw) {
            Ok(record) => drops.push(record.into_drop(source)),
            Err(e) => {
                warn!("Skipping undecodable drop record: {}", e);
                skipped += 1;
            }
        }
    }

    DropBatch {
        drops,
        last_scan_at: envelope.last_scan_at,
        total_scanned: envelope.total_scanned.unwrap_or(0),
        skipped,
    }
}

fn search_params(filters: &FeedFilters) -> Vec<(&'static str, String)> {
    let mut params = Vec::new();

    if !filters.dates.is_empty() {
        let dates: Vec<String> = filters
            .dates
            .iter()
            .map(|d| d.format("%Y-%m-%d").to_string())
            .collect();
        params.push(("dates", dates.join(",")));
    }

    if !filters.party_sizes.is_empty() {
        let sizes: Vec<String> = filters.party_sizes.iter().map(|s| s.to_string()).collect();
        params.push(("party_sizes", sizes.join(",")));
    }

    if let Some(after) = filters.time_after {
        params.push(("time_after", after.format("%H:%M").to_string()));
    }

    if let Some(before) = filters.time_before {
        params.push(("time_before", before.format("%H:%M").to_string()));
    }

    params
}

/// Read access to the upstream drop feed.
#[async_trait]
pub trait DropFeed: Send + Sync {
    /// Filtered search across upcoming reservation drops.
    async fn search_drops(&self, filters: &FeedFilters) -> Result<DropBatch, WatchError>;

    /// Drops first detected within the trailing window.
    async fn recent_drops(&self, within: Duration) -> Result<DropBatch, WatchError>;
}

/// Client for the reservation drop feed API
pub struct HttpDropFeed {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl HttpDropFeed {
    /// Create a new feed client with a per-request timeout.
    pub fn new(
        base_url: &str,
        api_key: Option<String>,
        timeout: std::time::Duration,
    ) -> Result<Self, WatchError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| WatchError::Transport(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        })
    }

    async fn fetch(
        &self,
        url: &str,
        params: &[(&str, String)],
        source: SourceFeed,
    ) -> Result<DropBatch, WatchError> {
        let mut request = self.client.get(url).query(params);

        if let Some(ref api_key) = self.api_key {
            request = request.bearer_auth(api_key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| WatchError::Transport(format!("HTTP request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(WatchError::UpstreamStatus(response.status().as_u16()));
        }

        let envelope: FeedEnvelope = response
            .json()
            .await
            .map_err(|e| WatchError::Decode(format!("Failed to parse feed response: {}", e)))?;

        Ok(decode_batch(envelope, source))
    }
}

#[async_trait]
impl DropFeed for HttpDropFeed {
    async fn search_drops(&self, filters: &FeedFilters) -> Result<DropBatch, WatchError> {
        debug!(
            "Searching drops with {} date filter(s)",
            filters.dates.len()
        );

        let url = format!("{}/v1/drops/search", self.base_url);
        let params = search_params(filters);
        self.fetch(&url, &params, SourceFeed::Primary).await
    }

    async fn recent_drops(&self, within: Duration) -> Result<DropBatch, WatchError> {
        debug!(
            "Fetching drops detected in the last {} minute(s)",
            within.num_minutes()
        );

        let url = format!("{}/v1/drops/recent", self.base_url);
        let params = vec![("within_minutes", within.num_minutes().max(1).to_string())];
        self.fetch(&url, &params, SourceFeed::Recent).await
    }
}
