//! Event types for the tracksync event system
//!
//! Two event families flow through the scheduler:
//! - **EngineEvent**: transport events delivered *from* the playback engine
//!   (active track changes, errors, remote-control commands). These drive
//!   reconciliation; handlers only read state and schedule further work.
//! - **SyncEvent**: events broadcast *to* consumers (UI, casting mirrors)
//!   via the [`EventBus`]. Serializable for transmission.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::model::QueueEntry;

/// Transport state reported by the playback engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum TransportState {
    Idle,
    Loading,
    Buffering,
    Ready,
    Playing,
    Paused,
}

impl TransportState {
    /// Whether the engine will honor a seek in this state
    pub fn is_seekable(&self) -> bool {
        matches!(self, TransportState::Ready | TransportState::Playing)
    }
}

/// Events delivered from the playback engine to the scheduler
///
/// The host wires the engine's callback path to
/// `QueueSyncScheduler::handle_engine_event`. Remote-control commands arrive
/// on the same path; casting surfaces mirror transport state but never bypass
/// the scheduler.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    /// The engine's active queue index changed (natural end of track,
    /// auto-advance, or an explicit skip it performed on its own)
    ActiveTrackChanged {
        index: usize,
        /// Last playback position of the outgoing track, in seconds
        last_position_secs: f64,
    },

    /// The engine failed to play the active track
    PlaybackError { code: String },

    /// Transport state transition
    PlaybackStateChanged { state: TransportState },

    RemotePlay,
    RemotePause,
    RemoteNext,
    RemotePrevious,
    RemoteSeek { position_secs: f64 },
    RemoteJumpForward,
    RemoteJumpBackward,
}

/// Events broadcast to scheduler consumers
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum SyncEvent {
    /// A generation finished syncing the full logical queue into the engine
    QueueSynced {
        generation: u64,
        entry_count: usize,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// An append-only sync added entries to the tail of the engine queue
    QueueAppended {
        generation: u64,
        added: usize,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// The logically-active track changed
    TrackChanged {
        uid: Uuid,
        track_id: String,
        index: usize,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Transport state changed (mirrored for casting surfaces)
    TransportChanged {
        state: TransportState,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// An engine mutation failed; the queue is stale until the next reconcile
    QueueStalled {
        reason: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A failed active track was re-resolved and reloaded in place
    TrackRecovered {
        track_id: String,
        retry_count: u32,
        timestamp: chrono::DateTime<chrono::Utc>,
    },
}

/// Current effective queue state, for display by UI and casting consumers
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueView {
    pub entries: Vec<QueueEntry>,
    pub current_index: Option<usize>,
    pub transport: TransportState,
}

/// Event broadcaster for scheduler consumers
///
/// Thin wrapper over `tokio::sync::broadcast`; one-to-many, lossy for slow
/// receivers.
pub struct EventBus {
    tx: broadcast::Sender<SyncEvent>,
    capacity: usize,
}

impl EventBus {
    /// Create a new EventBus buffering up to `capacity` events
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.tx.subscribe()
    }

    /// Emit an event; returns Err when no subscribers are listening
    pub fn emit(&self, event: SyncEvent) -> Result<usize, broadcast::error::SendError<SyncEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring the no-subscribers case
    pub fn emit_lossy(&self, event: SyncEvent) {
        let _ = self.tx.send(event);
    }

    /// Configured channel capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}
