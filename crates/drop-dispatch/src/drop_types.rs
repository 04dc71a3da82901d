use std::sync::LazyLock;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Which upstream feed produced a drop. Diagnostics only; never part of
/// identity or dedup decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceFeed {
    /// Ranked search feed over the full scan result
    Primary,
    /// Trailing-window feed of drops detected just now
    Recent,
}

/// A single bookable slot within a drop
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DropSlot {
    /// Date of the reservation
    pub date: NaiveDate,
    /// Time of the reservation
    pub time: NaiveTime,
    /// Deep link into the external booking platform
    pub booking_url: String,
}

/// A reservation opportunity surfaced by the upstream scanner.
///
/// Two values with equal `id` are the same notification event, regardless of
/// which feed produced them or what metadata they carry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReservationDrop {
    /// Canonical identity: `"{date}-{venue slug}"`, identical across feeds
    pub id: String,
    /// Date the availability applies to
    pub date: NaiveDate,
    /// Venue name as reported by the feed
    pub name: String,
    /// Venue location, when the feed provides one
    pub location: Option<String>,
    /// Bookable slots, in feed order; may be empty
    pub slots: Vec<DropSlot>,
    /// When the upstream scanner first observed this availability
    pub detected_at: Option<DateTime<Utc>>,
    /// Feed provenance
    pub source: SourceFeed,
    /// Opaque passthrough metadata (rating, popularity, ...)
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

static NON_SLUG_CHARS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^a-z0-9]+").unwrap());

/// Reduce a venue name to a url-safe slug: lowercase, runs of anything
/// outside `[a-z0-9]` collapsed to a single `-`, no leading/trailing `-`.
pub fn slugify(name: &str) -> String {
    let lowered = name.to_lowercase();
    NON_SLUG_CHARS
        .replace_all(&lowered, "-")
        .trim_matches('-')
        .to_string()
}

/// Canonical drop identity for a `(date, venue name)` pair.
///
/// Both feeds must collapse the same real-world slot to this id, so it
/// depends only on the date and the slugified name, never on the source
/// feed or metadata.
pub fn drop_id(date: NaiveDate, name: &str) -> String {
    format!("{}-{}", date.format("%Y-%m-%d"), slugify(name))
}

/// Custom error type for watch operations
#[derive(thiserror::Error, Debug)]
pub enum WatchError {
    /// Feed could not be reached (connect, timeout, body read)
    #[error("Feed transport failure: {0}")]
    Transport(String),

    /// Feed answered with a non-success status
    #[error("Feed returned HTTP {0}")]
    UpstreamStatus(u16),

    /// Feed response envelope could not be decoded
    #[error("Feed decode failure: {0}")]
    Decode(String),

    /// Key-value store operation failed
    #[error("Persistence failure: {0}")]
    Persistence(#[from] kv_store::StoreError),

    /// Referenced notification does not exist
    #[error("Notification not found")]
    NotFound,

    /// Invalid request payload
    #[error("Validation error: {0}")]
    Validation(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl actix_web::ResponseError for WatchError {
    fn error_response(&self) -> actix_web::HttpResponse {
        use actix_web::HttpResponse;

        match self {
            WatchError::Transport(msg) => HttpResponse::BadGateway().json(serde_json::json!({
                "error": "feed_transport_failure",
                "message": format!("Feed transport failure: {}", msg)
            })),
            WatchError::UpstreamStatus(status) => {
                HttpResponse::BadGateway().json(serde_json::json!({
                    "error": "feed_status",
                    "message": format!("Feed returned HTTP {}", status)
                }))
            }
            WatchError::Decode(msg) => HttpResponse::BadGateway().json(serde_json::json!({
                "error": "feed_decode_failure",
                "message": format!("Feed decode failure: {}", msg)
            })),
            WatchError::NotFound => HttpResponse::NotFound().json(serde_json::json!({
                "error": "notification_not_found",
                "message": "Notification not found"
            })),
            WatchError::Validation(msg) => HttpResponse::BadRequest().json(serde_json::json!({
                "error": "validation_error",
                "message": msg
            })),
            _ => HttpResponse::InternalServerError().json(serde_json::json!({
                "error": "internal_error",
                "message": "An internal error occurred"
            })),
        }
    }
}
