//! # Drop Dispatch
//!
//! This crate provides the dedup-and-dispatch core for restaurant
//! reservation drops. It normalizes the two upstream feeds into canonical
//! drops, decides per channel which drops the user has not seen yet, and
//! drives the three presentation channels (toast queue, bell notification
//! list, page banner) from a single poll loop.

/// Canonical drop types, identity and errors
mod drop_types;
pub use drop_types::*;

/// Freshness classification for first-sync gating
mod freshness;
pub use freshness::*;

/// Bounded per-channel record of surfaced drop ids
mod seen_set;
pub use seen_set::*;

/// Per-channel dedup decisions
mod engine;
pub use engine::*;

/// Ephemeral toast queue
mod toast;
pub use toast::*;

/// Persistent bell notification list
mod bell;
pub use bell::*;

/// Page banner state
mod banner;
pub use banner::*;

/// Clients for the two drop feeds
mod feed_client;
pub use feed_client::*;

/// Fan-out of one poll cycle to the channels
mod dispatch;
pub use dispatch::*;

/// Poll loop driving fetch, dedup and dispatch
mod executor;
pub use executor::*;

/// Fire-and-forget push token registration
mod push;
pub use push::*;
