//! Shared scheduler state
//!
//! Thread-safe state shared between the scheduler, the position poller, and
//! read-only consumers. Uses RwLock for concurrent read access with rare
//! writes, same pattern as the rest of the workspace.

use tokio::sync::RwLock;
use tracksync_common::events::TransportState;
use tracksync_common::model::QueueEntry;

/// The logically-active track, as last reconciled
#[derive(Debug, Clone)]
pub struct ActiveTrack {
    /// Index into the logical queue
    pub index: usize,
    pub entry: QueueEntry,
}

/// State readable by all components
pub struct SharedState {
    /// Last transport state reported by the engine
    transport: RwLock<TransportState>,

    /// Currently active track (None when no queue is loaded)
    active: RwLock<Option<ActiveTrack>>,

    /// Current playback rate multiplier
    rate: RwLock<f64>,
}

impl SharedState {
    pub fn new() -> Self {
        Self {
            transport: RwLock::new(TransportState::Idle),
            active: RwLock::new(None),
            rate: RwLock::new(1.0),
        }
    }

    pub async fn transport(&self) -> TransportState {
        *self.transport.read().await
    }

    pub async fn set_transport(&self, state: TransportState) {
        *self.transport.write().await = state;
    }

    pub async fn active(&self) -> Option<ActiveTrack> {
        self.active.read().await.clone()
    }

    pub async fn set_active(&self, active: Option<ActiveTrack>) {
        *self.active.write().await = active;
    }

    pub async fn rate(&self) -> f64 {
        *self.rate.read().await
    }

    pub async fn set_rate(&self, rate: f64) {
        *self.rate.write().await = rate;
    }
}

impl Default for SharedState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracksync_common::model::{PlayerBehavior, TrackKind};
    use uuid::Uuid;

    #[tokio::test]
    async fn test_transport_state() {
        let state = SharedState::new();
        assert_eq!(state.transport().await, TransportState::Idle);

        state.set_transport(TransportState::Playing).await;
        assert_eq!(state.transport().await, TransportState::Playing);
    }

    #[tokio::test]
    async fn test_active_track() {
        let state = SharedState::new();
        assert!(state.active().await.is_none());

        let entry = QueueEntry {
            track_id: "t1".to_string(),
            uid: Uuid::new_v4(),
            behavior: PlayerBehavior::FullPlay,
            kind: TrackKind::Music,
            offline_available: false,
        };
        state
            .set_active(Some(ActiveTrack {
                index: 2,
                entry: entry.clone(),
            }))
            .await;

        let active = state.active().await.unwrap();
        assert_eq!(active.index, 2);
        assert_eq!(active.entry.uid, entry.uid);
    }

    #[tokio::test]
    async fn test_rate() {
        let state = SharedState::new();
        assert_eq!(state.rate().await, 1.0);
        state.set_rate(1.5).await;
        assert_eq!(state.rate().await, 1.5);
    }
}
