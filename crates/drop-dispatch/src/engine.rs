use chrono::{DateTime, Duration, Utc};
use tracing::debug;

use crate::drop_types::ReservationDrop;
use crate::freshness::is_fresh;
use crate::seen_set::SeenSet;

/// The three presentation channels a drop can surface on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    /// Ephemeral toast popup
    Toast,
    /// Persistent notification list behind the bell icon
    Bell,
    /// Dismissible banner over the result list
    Banner,
}

impl Channel {
    /// Lowercase name for logs.
    pub fn name(&self) -> &'static str {
        match self {
            Channel::Toast => "toast",
            Channel::Bell => "bell",
            Channel::Banner => "banner",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SyncState {
    /// No batch processed yet; emissions are freshness-gated
    Uninitialized,
    /// First batch absorbed; every unseen id emits
    Synced,
}

#[derive(Debug)]
struct ChannelState {
    seen: SeenSet,
    sync: SyncState,
}

/// Per-channel admission state machine.
///
/// Each channel owns its own seen-set and syncs independently, so the same
/// real-world drop may be admitted by one channel and not another. That
/// divergence is a property of the two-feed design, not an accident.
#[derive(Debug)]
pub struct DedupEngine {
    freshness_window: Duration,
    toast: ChannelState,
    bell: ChannelState,
    banner: ChannelState,
}

impl DedupEngine {
    /// Create an engine with empty, unsynced channels.
    pub fn new(seen_cap: usize, freshness_window: Duration) -> Self {
        let channel = || ChannelState {
            seen: SeenSet::new(seen_cap),
            sync: SyncState::Uninitialized,
        };

        Self {
            freshness_window,
            toast: channel(),
            bell: channel(),
            banner: channel(),
        }
    }

    fn state(&self, channel: Channel) -> &ChannelState {
        match channel {
            Channel::Toast => &self.toast,
            Channel::Bell => &self.bell,
            Channel::Banner => &self.banner,
        }
    }

    fn state_mut(&mut self, channel: Channel) -> &mut ChannelState {
        match channel {
            Channel::Toast => &mut self.toast,
            Channel::Bell => &mut self.bell,
            Channel::Banner => &mut self.banner,
        }
    }

    /// Decide whether `drop` should surface on `channel`.
    ///
    /// The drop's id is recorded in the channel's seen-set either way.
    /// Returns true at most once per distinct id for as long as the id
    /// stays unevicted. Before the channel's first sync completes, only
    /// drops passing the freshness window are emitted; afterwards every
    /// first-appearance emits regardless of age.
    pub fn admit(&mut self, channel: Channel, drop: &ReservationDrop, now: DateTime<Utc>) -> bool {
        let window = self.freshness_window;
        let state = self.state_mut(channel);
        let newly_seen = state.seen.insert(&drop.id, now);

        let emit = match state.sync {
            SyncState::Uninitialized => newly_seen && is_fresh(drop.detected_at, now, window),
            SyncState::Synced => newly_seen,
        };

        if emit {
            debug!(
                "Admitting {} to {} channel (source: {:?})",
                drop.id,
                channel.name(),
                drop.source
            );
        }

        emit
    }

    /// Complete the channel's first sync after its first batch has been fed
    /// through `admit`. Idempotent.
    pub fn mark_synced(&mut self, channel: Channel) {
        let state = self.state_mut(channel);
        if state.sync == SyncState::Uninitialized {
            debug!(
                "Channel {} synced with {} known ids",
                channel.name(),
                state.seen.len()
            );
            state.sync = SyncState::Synced;
        }
    }

    /// Whether the channel has completed its first sync.
    pub fn is_synced(&self, channel: Channel) -> bool {
        self.state(channel).sync == SyncState::Synced
    }

    /// Number of ids the channel currently remembers.
    pub fn seen_len(&self, channel: Channel) -> usize {
        self.state(channel).seen.len()
    }
}
