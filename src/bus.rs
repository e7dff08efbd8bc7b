//! Broadcast event bus.
//!
//! The dashboard core is headless; whatever renders it subscribes here.
//! Delivery is lossy under lag - the latest state is always available from
//! the snapshot getters on [`crate::dashboard::Dashboard`] and
//! [`crate::player::PlayerHandle`], so a missed event is never fatal.

use tokio::sync::broadcast;

use crate::models::{Device, PlayerStatus, User};

/// Broadcast capacity. Slow subscribers lag past this and must fall back to
/// snapshot reads.
const BUS_CAPACITY: usize = 64;

/// Events published by the auth client and the fleet supervision tasks.
#[derive(Debug, Clone)]
pub enum BusEvent {
    /// A session was opened (fresh login or restored credential).
    SessionStarted { user: User },
    /// The session ended locally.
    SessionEnded,
    /// The registry device list was (re)loaded.
    PlayersRefreshed { devices: Vec<Device> },
    /// A device answered a status poll; `status` is the full new snapshot.
    PlayerStatusChanged {
        device_id: String,
        status: PlayerStatus,
    },
    /// A status poll failed or timed out; the device displays as offline.
    PlayerUnreachable { device_id: String, error: String },
}

impl BusEvent {
    /// Stable name for logging and filtering.
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::SessionStarted { .. } => "session_started",
            Self::SessionEnded => "session_ended",
            Self::PlayersRefreshed { .. } => "players_refreshed",
            Self::PlayerStatusChanged { .. } => "player_status_changed",
            Self::PlayerUnreachable { .. } => "player_unreachable",
        }
    }
}

/// Cloneable handle to the broadcast channel.
#[derive(Debug, Clone)]
pub struct SharedBus {
    tx: broadcast::Sender<BusEvent>,
}

impl SharedBus {
    /// Publish an event. A send with no subscribers is fine; state getters
    /// remain authoritative.
    pub fn publish(&self, event: BusEvent) {
        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<BusEvent> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

/// Create a new bus.
pub fn create_bus() -> SharedBus {
    let (tx, _) = broadcast::channel(BUS_CAPACITY);
    SharedBus { tx }
}
